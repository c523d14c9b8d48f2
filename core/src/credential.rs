//! Signing credentials and their resolution into keypairs.
use crate::{
	error::{Error, Result},
	keychain::{SecretStore, SecretString},
};
use avail_rust::{subxt_signer::SecretUri, Keypair};
use serde::{Deserialize, Serialize};
use sp_core::crypto::AccountId32;
use std::str::FromStr;
use tracing::debug;

/// How the connector obtains a signature for a request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SigningCredential {
	#[serde(rename = "MNEMONIC_STRING")]
	MnemonicString { mnemonic: SecretString },
	#[serde(
		rename = "KEYCHAIN_REFERENCE",
		alias = "CACTUS_KEYCHAIN_REF",
		rename_all = "camelCase"
	)]
	KeychainReference {
		keychain_id: String,
		keychain_entry_key: String,
	},
	/// Payload is signed by the caller
	#[serde(rename = "NONE", alias = "PRE_SIGNED")]
	PreSigned,
}

impl SigningCredential {
	pub fn from_value(value: serde_json::Value) -> Result<Self> {
		serde_json::from_value(value).map_err(|error| Error::InvalidCredential(error.to_string()))
	}

	pub fn kind(&self) -> &'static str {
		match self {
			SigningCredential::MnemonicString { .. } => "MNEMONIC_STRING",
			SigningCredential::KeychainReference { .. } => "KEYCHAIN_REFERENCE",
			SigningCredential::PreSigned => "NONE",
		}
	}

	pub fn is_pre_signed(&self) -> bool {
		matches!(self, SigningCredential::PreSigned)
	}

	/// Fails for credentials which cannot produce a signature.
	pub fn ensure_signing(&self, operation: &'static str) -> Result<()> {
		if self.is_pre_signed() {
			return Err(Error::UnsupportedCredentialForOperation {
				credential: self.kind(),
				operation,
			});
		}
		Ok(())
	}
}

pub enum ResolvedSigner {
	Keypair(Box<Keypair>),
	AlreadySigned,
}

impl ResolvedSigner {
	pub fn into_keypair(self, operation: &'static str) -> Result<Keypair> {
		match self {
			ResolvedSigner::Keypair(keypair) => Ok(*keypair),
			ResolvedSigner::AlreadySigned => Err(Error::UnsupportedCredentialForOperation {
				credential: SigningCredential::PreSigned.kind(),
				operation,
			}),
		}
	}
}

pub fn account_id(keypair: &Keypair) -> AccountId32 {
	AccountId32::from(keypair.public_key().0)
}

/// Derives sr25519 keypair from a mnemonic or secret URI (e.g. `//Alice`).
pub fn keypair_from_mnemonic(mnemonic: &SecretString) -> Result<Keypair> {
	let mnemonic = mnemonic.expose_secret().trim();
	if mnemonic.is_empty() {
		return Err(Error::InvalidCredential("Mnemonic is empty".to_string()));
	}
	let uri = SecretUri::from_str(mnemonic).map_err(|error| Error::InvalidMnemonic(error.to_string()))?;
	Keypair::from_uri(&uri).map_err(|error| Error::InvalidMnemonic(error.to_string()))
}

/// Resolves credential into a keypair, keychain references are looked up on every call.
pub async fn resolve<S: SecretStore + ?Sized>(
	credential: &SigningCredential,
	store: &S,
) -> Result<ResolvedSigner> {
	match credential {
		SigningCredential::MnemonicString { mnemonic } => {
			keypair_from_mnemonic(mnemonic).map(|keypair| ResolvedSigner::Keypair(Box::new(keypair)))
		},
		SigningCredential::KeychainReference {
			keychain_id,
			keychain_entry_key,
		} => {
			if keychain_id.is_empty() || keychain_entry_key.is_empty() {
				return Err(Error::InvalidCredential(
					"Keychain reference requires keychain id and entry key".to_string(),
				));
			}
			debug!(keychain_id, keychain_entry_key, "Resolving keychain reference");
			let mnemonic = store.lookup(keychain_id, keychain_entry_key).await?;
			keypair_from_mnemonic(&mnemonic).map(|keypair| ResolvedSigner::Keypair(Box::new(keypair)))
		},
		SigningCredential::PreSigned => Ok(ResolvedSigner::AlreadySigned),
	}
}

/// Resolves credential of an operation which has to sign on its own.
pub async fn resolve_keypair<S: SecretStore + ?Sized>(
	credential: &SigningCredential,
	store: &S,
	operation: &'static str,
) -> Result<Keypair> {
	credential.ensure_signing(operation)?;
	resolve(credential, store).await?.into_keypair(operation)
}
