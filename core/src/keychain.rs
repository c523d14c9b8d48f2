//! Secret store lookups for keychain referenced credentials.
use crate::error::{Error, Result};
use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
	collections::HashMap,
	fmt::{self, Debug, Formatter},
	sync::RwLock,
};
use zeroize::Zeroizing;

/// Secret value which is zeroed on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
	pub fn new(value: String) -> Self {
		Self(Zeroizing::new(value))
	}

	pub fn expose_secret(&self) -> &str {
		&self.0
	}
}

impl Debug for SecretString {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "SecretString(***REDACTED***)")
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Self::new(value.to_string())
	}
}

impl Serialize for SecretString {
	fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		serializer.serialize_str(self.expose_secret())
	}
}

impl<'de> Deserialize<'de> for SecretString {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
		String::deserialize(deserializer).map(SecretString::new)
	}
}

#[automock]
#[async_trait]
pub trait SecretStore: Send + Sync {
	/// Returns the secret stored under `entry_key` of the given keychain.
	async fn lookup(&self, keychain_id: &str, entry_key: &str) -> Result<SecretString>;
}

pub type Keychains = HashMap<String, HashMap<String, SecretString>>;

/// In-process secret store holding multiple keychains.
#[derive(Default)]
pub struct MemoryKeychain {
	keychains: RwLock<Keychains>,
}

impl MemoryKeychain {
	pub fn new(keychains: Keychains) -> Self {
		Self {
			keychains: RwLock::new(keychains),
		}
	}

	pub fn insert(&self, keychain_id: &str, entry_key: &str, secret: SecretString) {
		let mut keychains = self.keychains.write().unwrap_or_else(|error| error.into_inner());
		keychains
			.entry(keychain_id.to_string())
			.or_default()
			.insert(entry_key.to_string(), secret);
	}
}

#[async_trait]
impl SecretStore for MemoryKeychain {
	async fn lookup(&self, keychain_id: &str, entry_key: &str) -> Result<SecretString> {
		let keychains = self.keychains.read().unwrap_or_else(|error| error.into_inner());
		let keychain = keychains
			.get(keychain_id)
			.ok_or_else(|| Error::CredentialNotFound(format!("Keychain {keychain_id} not found")))?;

		keychain.get(entry_key).cloned().ok_or_else(|| {
			Error::CredentialNotFound(format!(
				"Entry {entry_key} not found in keychain {keychain_id}"
			))
		})
	}
}
