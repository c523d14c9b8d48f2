//! Request and response contracts of the connector operations, and shared serde helpers.
use crate::{
	chain::Weight,
	credential::SigningCredential,
	error::{Error, Result},
};
use base64::{engine::general_purpose, DecodeError, Engine};
use serde::{Deserialize, Serialize};
use sp_core::{
	crypto::{AccountId32, Ss58Codec},
	H256,
};
use std::str::FromStr;
use strum::Display;

/// Parses account given either as SS58 address or as `0x` prefixed public key.
pub fn parse_account(address: &str) -> Result<AccountId32> {
	if let Some(hex_key) = address.strip_prefix("0x") {
		let bytes = hex::decode(hex_key).map_err(|error| Error::InvalidAddress(error.to_string()))?;
		let key = <[u8; 32]>::try_from(bytes.as_slice())
			.map_err(|_| Error::InvalidAddress(format!("expected 32 bytes, got {}", bytes.len())))?;
		return Ok(AccountId32::from(key));
	}

	AccountId32::from_ss58check(address)
		.map_err(|error| Error::InvalidAddress(format!("{address}: {error:?}")))
}

pub fn format_account(account: &AccountId32) -> String {
	account.to_ss58check()
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct Base64(pub Vec<u8>);

impl From<Base64> for Vec<u8> {
	fn from(val: Base64) -> Self {
		val.0
	}
}

impl TryFrom<String> for Base64 {
	type Error = DecodeError;

	fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
		general_purpose::STANDARD.decode(value).map(Base64)
	}
}

impl From<Base64> for String {
	fn from(value: Base64) -> Self {
		general_purpose::STANDARD.encode(value.0)
	}
}

/// Bytes in `0x` prefixed hex form.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct HexBytes(pub Vec<u8>);

impl FromStr for HexBytes {
	type Err = Error;

	fn from_str(value: &str) -> Result<Self> {
		let value = value.strip_prefix("0x").unwrap_or(value);
		hex::decode(value)
			.map(HexBytes)
			.map_err(|error| Error::InvalidRequest(format!("Invalid hex value: {error}")))
	}
}

impl TryFrom<String> for HexBytes {
	type Error = Error;

	fn try_from(value: String) -> Result<Self> {
		value.parse()
	}
}

impl From<HexBytes> for String {
	fn from(value: HexBytes) -> Self {
		format!("0x{}", hex::encode(value.0))
	}
}

pub mod hex_bytes_format {
	use serde::{self, Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = String::deserialize(deserializer)?;
		let value = value.strip_prefix("0x").unwrap_or(&value);
		hex::decode(value).map_err(serde::de::Error::custom)
	}
}

/// Balances are accepted as JSON numbers or decimal strings and written as strings.
pub mod balance_format {
	use serde::{self, de, Deserializer, Serializer};
	use std::fmt;

	struct BalanceVisitor;

	impl<'de> de::Visitor<'de> for BalanceVisitor {
		type Value = u128;

		fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
			formatter.write_str("a non-negative integer or a decimal string")
		}

		fn visit_u64<E: de::Error>(self, value: u64) -> Result<u128, E> {
			Ok(value.into())
		}

		fn visit_u128<E: de::Error>(self, value: u128) -> Result<u128, E> {
			Ok(value)
		}

		fn visit_i64<E: de::Error>(self, value: i64) -> Result<u128, E> {
			u128::try_from(value).map_err(E::custom)
		}

		fn visit_str<E: de::Error>(self, value: &str) -> Result<u128, E> {
			value.parse().map_err(E::custom)
		}
	}

	pub fn serialize<S>(value: &u128, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&value.to_string())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
	where
		D: Deserializer<'de>,
	{
		deserializer.deserialize_any(BalanceVisitor)
	}
}

pub mod option_balance_format {
	use serde::{self, Deserialize, Deserializer, Serializer};

	#[derive(Deserialize)]
	struct Wrapper(#[serde(with = "super::balance_format")] u128);

	pub fn serialize<S>(value: &Option<u128>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			Some(value) => super::balance_format::serialize(value, serializer),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u128>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = Option::<Wrapper>::deserialize(deserializer)?;
		Ok(value.map(|Wrapper(value)| value))
	}
}

pub mod tracing_level_format {
	use serde::{self, Deserialize, Deserializer, Serializer};
	use std::str::FromStr;
	use tracing::Level;

	pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&level.to_string())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = String::deserialize(deserializer)?;
		Level::from_str(&value).map_err(serde::de::Error::custom)
	}
}

pub mod duration_millis_format {
	use serde::{self, Deserialize, Deserializer, Serializer};
	use std::time::Duration;

	pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_u64(duration.as_millis() as u64)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = u64::deserialize(deserializer)?;
		Ok(Duration::from_millis(value))
	}
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransferParams {
	pub to: String,
	#[serde(with = "balance_format")]
	pub value: u128,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTransactionRequest {
	pub signing_credential: SigningCredential,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transfer: Option<TransferParams>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pre_signed_payload: Option<String>,
}

/// Terminal result of a single submission.
///
/// Only constructed through [`SubmissionOutcome::included`], so a successful
/// outcome always carries both hashes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
	success: bool,
	tx_hash: Option<H256>,
	block_hash: Option<H256>,
}

impl SubmissionOutcome {
	pub fn included(tx_hash: H256, block_hash: H256) -> Self {
		Self {
			success: true,
			tx_hash: Some(tx_hash),
			block_hash: Some(block_hash),
		}
	}

	pub fn success(&self) -> bool {
		self.success
	}

	pub fn tx_hash(&self) -> Option<H256> {
		self.tx_hash
	}

	pub fn block_hash(&self) -> Option<H256> {
		self.block_hash
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployContractRequest {
	/// Contract code, taken from `source.wasm` of the metadata when omitted
	#[serde(default)]
	pub wasm: Option<Base64>,
	pub metadata: serde_json::Value,
	pub gas_limit: Weight,
	#[serde(default, with = "option_balance_format")]
	pub storage_deposit_limit: Option<u128>,
	#[serde(default)]
	pub salt: Option<HexBytes>,
	#[serde(default, with = "option_balance_format")]
	pub balance: Option<u128>,
	#[serde(default)]
	pub constructor_args: Vec<serde_json::Value>,
	pub signing_credential: SigningCredential,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentOutcome {
	pub success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub contract_address: Option<String>,
}

#[derive(Clone, Copy, Debug, Display, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvocationType {
	Send,
	Query,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeContractRequest {
	pub metadata: serde_json::Value,
	pub contract_address: String,
	pub method_name: String,
	pub invocation_type: InvocationType,
	pub gas_limit: Weight,
	#[serde(default, with = "option_balance_format")]
	pub storage_deposit_limit: Option<u128>,
	#[serde(default, with = "option_balance_format")]
	pub balance: Option<u128>,
	#[serde(default)]
	pub params: Vec<serde_json::Value>,
	pub signing_credential: SigningCredential,
	/// Origin of query dry runs, defaults to the credential's account
	#[serde(default)]
	pub account_address: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvokeContractResponse {
	pub success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tx_hash: Option<H256>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub block_hash: Option<H256>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub call_output: Option<serde_json::Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub gas_consumed: Option<Weight>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawTransactionResponse {
	/// Hex encoded unsigned call
	pub raw_transaction: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningOptions {
	pub nonce: u64,
	pub block_hash: H256,
	pub era: crate::info::EraWindow,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRawTransactionRequest {
	pub raw_transaction: String,
	pub signing_credential: SigningCredential,
	pub signing_options: SigningOptions,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignRawTransactionResponse {
	pub success: bool,
	pub signed_transaction: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfoRequest {
	pub account_address: String,
	#[serde(default)]
	pub validity_window: Option<u64>,
}
