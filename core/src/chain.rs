//! Boundary to the node: call construction, signing, submission and state queries.
//!
//! Everything that needs a live connection goes through [`ChainClient`], so the
//! orchestration logic can be driven by a mock in tests. Submissions are exposed
//! as a stream of [`TxNotification`]s in node emission order.
use crate::{
	error::{DispatchFailure, Result},
	info::EraWindow,
	types::hex_bytes_format,
};
use async_trait::async_trait;
use avail_rust::Keypair;
use codec::{Decode, Encode};
use futures::stream::BoxStream;
use mockall::automock;
use serde::{Deserialize, Serialize};
use sp_core::{crypto::AccountId32, H256};
use std::fmt::{self, Display, Formatter};
use strum::Display;

mod client;
pub mod configuration;
pub mod extrinsic;

pub use client::Client;
pub use extrinsic::RehydratedExtrinsic;

pub const SYSTEM_PALLET: &str = "System";
pub const EXTRINSIC_SUCCESS: &str = "ExtrinsicSuccess";

/// Status tag of a single submission notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "camelCase")]
pub enum TxStatus {
	Ready,
	Broadcast,
	InBlock,
	Retracted,
	Finalized,
	Usurped,
	Dropped,
	Invalid,
	Error,
}

impl TxStatus {
	/// Transaction is part of a block (best or finalized).
	pub fn is_inclusion(&self) -> bool {
		matches!(self, TxStatus::InBlock | TxStatus::Finalized)
	}

	/// Node will never include the transaction.
	pub fn is_rejection(&self) -> bool {
		matches!(
			self,
			TxStatus::Usurped | TxStatus::Dropped | TxStatus::Invalid | TxStatus::Error
		)
	}
}

/// Event emitted in the block which included a submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainEvent {
	pub pallet: String,
	pub variant: String,
	/// SCALE encoded event fields
	#[serde(with = "hex_bytes_format")]
	pub data: Vec<u8>,
}

impl ChainEvent {
	pub fn new(pallet: &str, variant: &str, data: Vec<u8>) -> Self {
		Self {
			pallet: pallet.to_string(),
			variant: variant.to_string(),
			data,
		}
	}

	pub fn is(&self, pallet: &str, variant: &str) -> bool {
		self.pallet == pallet && self.variant == variant
	}
}

impl Display for ChainEvent {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}", self.pallet, self.variant)
	}
}

/// Single status update of a watched submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxNotification {
	pub status: TxStatus,
	pub tx_hash: H256,
	pub block_hash: Option<H256>,
	/// Reason reported by the node for error statuses
	pub message: Option<String>,
	/// Events of the including block, only fetched on the keypair submission path
	pub events: Option<Vec<ChainEvent>>,
	pub dispatch_error: Option<DispatchFailure>,
}

impl TxNotification {
	pub fn new(status: TxStatus, tx_hash: H256) -> Self {
		Self {
			status,
			tx_hash,
			block_hash: None,
			message: None,
			events: None,
			dispatch_error: None,
		}
	}

	pub fn in_block(mut self, block_hash: H256) -> Self {
		self.block_hash = Some(block_hash);
		self
	}

	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());
		self
	}

	pub fn with_events(mut self, events: Vec<ChainEvent>) -> Self {
		self.events = Some(events);
		self
	}

	pub fn with_dispatch_error(mut self, dispatch_error: DispatchFailure) -> Self {
		self.dispatch_error = Some(dispatch_error);
		self
	}
}

pub type NotificationStream = BoxStream<'static, Result<TxNotification>>;

/// SCALE encoded runtime call, not yet signed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call(pub Vec<u8>);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockRef {
	pub number: u64,
	pub hash: H256,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mortality {
	pub era: EraWindow,
	/// Hash of the block the era is anchored to
	pub block_hash: H256,
}

/// Overrides used when signing, unset values are fetched from the chain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SigningParams {
	pub nonce: Option<u64>,
	pub mortality: Option<Mortality>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "camelCase")]
pub struct Weight {
	#[codec(compact)]
	pub ref_time: u64,
	#[codec(compact)]
	pub proof_size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstantiateParams {
	pub value: u128,
	pub gas_limit: Weight,
	pub storage_deposit_limit: Option<u128>,
	pub code: Vec<u8>,
	/// Constructor selector followed by encoded arguments
	pub data: Vec<u8>,
	pub salt: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractCallParams {
	pub dest: AccountId32,
	pub value: u128,
	pub gas_limit: Weight,
	pub storage_deposit_limit: Option<u128>,
	/// Message selector followed by encoded arguments
	pub data: Vec<u8>,
}

#[automock]
#[async_trait]
pub trait ChainClient: Send + Sync {
	async fn transfer_call(&self, to: &AccountId32, value: u128) -> Result<Call>;

	async fn instantiate_call(&self, params: &InstantiateParams) -> Result<Call>;

	async fn contract_call(&self, params: &ContractCallParams) -> Result<Call>;

	/// Signs the call and returns the encoded extrinsic.
	async fn sign(&self, call: &Call, signer: &Keypair, params: &SigningParams) -> Result<Vec<u8>>;

	/// Decodes a serialized extrinsic without contacting the node.
	fn rehydrate(&self, payload: &str) -> Result<RehydratedExtrinsic>;

	/// Submits an extrinsic signed by this connector, notifications carry block events.
	async fn submit_and_watch(&self, extrinsic: &[u8]) -> Result<NotificationStream>;

	/// Broadcasts an extrinsic signed elsewhere, notifications carry no events.
	async fn submit_raw_and_watch(&self, extrinsic: &[u8]) -> Result<NotificationStream>;

	async fn account_nonce(&self, account: &AccountId32) -> Result<u64>;

	async fn latest_block(&self) -> Result<BlockRef>;

	/// Executes a contract call as a dry run and returns the raw runtime API result.
	async fn dry_run(&self, origin: &AccountId32, params: &ContractCallParams) -> Result<Vec<u8>>;
}

pub fn has_extrinsic_success(events: &[ChainEvent]) -> bool {
	events
		.iter()
		.any(|event| event.is(SYSTEM_PALLET, EXTRINSIC_SUCCESS))
}
