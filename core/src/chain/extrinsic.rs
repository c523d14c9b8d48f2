//! Offline decoding of serialized extrinsics.
//!
//! Only the envelope is decoded: length prefix, version byte and, for signed
//! extrinsics, the signer address and signature. Signed extensions and the call
//! itself stay opaque since their layout depends on runtime metadata.
use crate::error::{Error, Result};
use codec::{Compact, Decode, Encode, Input};
use sp_core::{crypto::AccountId32, hashing::blake2_256, H256};

const SIGNED_FLAG: u8 = 0b1000_0000;
const VERSION_MASK: u8 = 0b0011_1111;
const SUPPORTED_VERSIONS: [u8; 2] = [4, 5];

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum MultiAddress {
	#[codec(index = 0)]
	Id([u8; 32]),
	#[codec(index = 1)]
	Index(#[codec(compact)] u32),
	#[codec(index = 2)]
	Raw(Vec<u8>),
	#[codec(index = 3)]
	Address32([u8; 32]),
	#[codec(index = 4)]
	Address20([u8; 20]),
}

impl MultiAddress {
	pub fn account(&self) -> Option<AccountId32> {
		match self {
			MultiAddress::Id(key) | MultiAddress::Address32(key) => Some(AccountId32::from(*key)),
			_ => None,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum MultiSignature {
	#[codec(index = 0)]
	Ed25519([u8; 64]),
	#[codec(index = 1)]
	Sr25519([u8; 64]),
	#[codec(index = 2)]
	Ecdsa([u8; 65]),
}

impl MultiSignature {
	pub fn as_bytes(&self) -> &[u8] {
		match self {
			MultiSignature::Ed25519(signature) | MultiSignature::Sr25519(signature) => signature,
			MultiSignature::Ecdsa(signature) => signature,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
	pub address: MultiAddress,
	pub signature: MultiSignature,
}

/// Serialized extrinsic, decoded to the point where it can be validated and submitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RehydratedExtrinsic {
	encoded: Vec<u8>,
	version: u8,
	signature: Option<Signature>,
}

impl RehydratedExtrinsic {
	pub fn version(&self) -> u8 {
		self.version
	}

	pub fn signature(&self) -> Option<&Signature> {
		self.signature.as_ref()
	}

	pub fn signer(&self) -> Option<AccountId32> {
		self.signature.as_ref()?.address.account()
	}

	pub fn encoded(&self) -> &[u8] {
		&self.encoded
	}

	/// Hash of the encoded extrinsic as reported by the node.
	pub fn hash(&self) -> H256 {
		H256(blake2_256(&self.encoded))
	}

	/// Signature bytes in `0x` prefixed hex form.
	pub fn signature_hex(&self) -> Option<String> {
		let signature = self.signature.as_ref()?;
		Some(format!("0x{}", hex::encode(signature.signature.as_bytes())))
	}
}

/// Decodes a hex serialized extrinsic without contacting the node.
pub fn rehydrate(payload: &str) -> Result<RehydratedExtrinsic> {
	let payload = payload.trim();
	let digits = payload.strip_prefix("0x").unwrap_or(payload);
	let encoded = hex::decode(digits)
		.map_err(|error| Error::InvalidRequest(format!("Payload is not hex encoded: {error}")))?;

	let input = &mut &encoded[..];
	let Compact(length) = Compact::<u32>::decode(input)
		.map_err(|error| Error::codec(format!("Invalid extrinsic length prefix: {error}")))?;
	if input.remaining_len().ok().flatten() != Some(length as usize) {
		return Err(Error::codec(format!(
			"Extrinsic length prefix {length} does not match payload length {}",
			input.len()
		)));
	}

	let version_byte = u8::decode(input).map_err(Error::codec)?;
	let version = version_byte & VERSION_MASK;
	if !SUPPORTED_VERSIONS.contains(&version) {
		return Err(Error::codec(format!("Unsupported extrinsic version {version}")));
	}

	if version_byte & SIGNED_FLAG == 0 {
		return Ok(RehydratedExtrinsic {
			encoded,
			version,
			signature: None,
		});
	}

	let address = MultiAddress::decode(input)
		.map_err(|error| Error::codec(format!("Invalid signer address: {error}")))?;
	let signature = MultiSignature::decode(input)
		.map_err(|error| Error::InvalidSignatureEncoding(error.to_string()))?;

	Ok(RehydratedExtrinsic {
		encoded,
		version,
		signature: Some(Signature { address, signature }),
	})
}
