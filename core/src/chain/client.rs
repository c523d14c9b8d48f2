use avail_rust::{
	subxt::{
		self,
		backend::TransactionStatus,
		config::DefaultExtrinsicParamsBuilder,
		dynamic::Value,
		error::DispatchError,
		ext::subxt_core,
		tx::{Payload, SubmittableExtrinsic, TxInBlock, TxStatus as SubxtTxStatus},
		Metadata, OnlineClient, SubstrateConfig,
	},
	Keypair,
};
use codec::{Decode, Encode, Input};
use futures::StreamExt;
use sp_core::{crypto::AccountId32, hashing::blake2_256, H256};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_retry::Retry;
use tracing::{debug, info, warn};

use super::{
	configuration::NodeConfig, extrinsic, BlockRef, Call, ChainClient, ChainEvent,
	ContractCallParams, InstantiateParams, NotificationStream, RehydratedExtrinsic,
	SigningParams, TxNotification, TxStatus, Weight,
};
use crate::error::{DispatchFailure, Error, Operation, Result};

type Api = OnlineClient<SubstrateConfig>;

const CONTRACTS_CALL_API: &str = "ContractsApi_call";

/// Chain adapter backed by a single node connection.
///
/// The connection is shared by all clones, so concurrent submissions reuse it.
#[derive(Clone)]
pub struct Client {
	api: Arc<RwLock<Option<Api>>>,
	config: NodeConfig,
}

impl Client {
	/// Creates a client without connecting, every operation fails with `NotConnected` until [`Client::connect`].
	pub fn new(config: NodeConfig) -> Self {
		Self {
			api: Arc::new(RwLock::new(None)),
			config,
		}
	}

	pub async fn connect(&self) -> Result<()> {
		let url = self.config.ws_endpoint.clone();
		let api = Retry::spawn(self.config.connect_retry.clone(), || async {
			Self::create_subxt_client(&url)
				.await
				.inspect_err(|error| warn!(host = %url, %error, "Connection attempt failed"))
		})
		.await?;

		*self.api.write().await = Some(api);
		Ok(())
	}

	pub async fn disconnect(&self) {
		if self.api.write().await.take().is_some() {
			info!("Disconnected from {}", self.config.ws_endpoint);
		}
	}

	pub async fn is_connected(&self) -> bool {
		self.api.read().await.is_some()
	}

	async fn create_subxt_client(host: &str) -> Result<Api> {
		let api = Api::from_insecure_url(host)
			.await
			.map_err(|error| Error::chain(Operation::Connect, error))?;

		let genesis_hash = api.genesis_hash();
		let runtime_version = api.runtime_version();
		info!(
			host,
			?genesis_hash,
			spec_version = runtime_version.spec_version,
			"Connected to RPC"
		);
		Ok(api)
	}

	async fn current(&self) -> Result<Api> {
		self.api.read().await.clone().ok_or(Error::NotConnected)
	}

	async fn call_data(&self, pallet: &str, call: &str, fields: Vec<Value>) -> Result<Call> {
		let api = self.current().await?;
		let payload = subxt::dynamic::tx(pallet, call, fields);
		api.tx()
			.call_data(&payload)
			.map(Call)
			.map_err(|error| Error::chain(Operation::BuildCall, error))
	}
}

/// Call bytes built ahead of time, signed as they are.
struct RawCall<'a>(&'a [u8]);

impl Payload for RawCall<'_> {
	fn encode_call_data_to(
		&self,
		_metadata: &Metadata,
		out: &mut Vec<u8>,
	) -> std::result::Result<(), subxt_core::Error> {
		out.extend_from_slice(self.0);
		Ok(())
	}
}

/// Runtime API response kept undecoded.
struct RemainingBytes(Vec<u8>);

impl Decode for RemainingBytes {
	fn decode<I: Input>(input: &mut I) -> std::result::Result<Self, codec::Error> {
		let length = input.remaining_len()?.unwrap_or_default();
		let mut bytes = vec![0u8; length];
		input.read(&mut bytes)?;
		Ok(RemainingBytes(bytes))
	}
}

fn account_value(account: &AccountId32) -> Value {
	let bytes: &[u8] = account.as_ref();
	Value::unnamed_variant("Id", [Value::from_bytes(bytes)])
}

fn weight_value(weight: Weight) -> Value {
	Value::named_composite([
		("ref_time", Value::u128(weight.ref_time.into())),
		("proof_size", Value::u128(weight.proof_size.into())),
	])
}

fn option_value(value: Option<Value>) -> Value {
	match value {
		Some(value) => Value::unnamed_variant("Some", [value]),
		None => Value::unnamed_variant("None", Vec::<Value>::new()),
	}
}

fn subxt_account(account: &AccountId32) -> subxt::utils::AccountId32 {
	subxt::utils::AccountId32(<[u8; 32]>::from(account.clone()))
}

fn dispatch_failure(error: DispatchError) -> DispatchFailure {
	match error {
		DispatchError::Module(module) => match module.details() {
			Ok(details) => DispatchFailure::Module {
				section: details.pallet.name().to_string(),
				name: details.variant.name.clone(),
				docs: details.variant.docs.clone(),
			},
			Err(_) => DispatchFailure::Other {
				message: module.to_string(),
			},
		},
		other => DispatchFailure::Other {
			message: other.to_string(),
		},
	}
}

async fn included(
	api: &Api,
	status: TxStatus,
	tx_hash: H256,
	in_block: TxInBlock<SubstrateConfig, Api>,
) -> Result<TxNotification> {
	let block_hash = H256(in_block.block_hash().0);
	let mut notification = TxNotification::new(status, tx_hash).in_block(block_hash);

	let events = in_block
		.fetch_events()
		.await
		.map_err(|error| Error::chain(Operation::Watch, error))?;

	let mut chain_events = vec![];
	for event in events.iter() {
		let event = event.map_err(|error| Error::chain(Operation::Watch, error))?;
		if event.pallet_name() == "System" && event.variant_name() == "ExtrinsicFailed" {
			let dispatch_error = DispatchError::decode_from(event.field_bytes(), api.metadata())
				.map(dispatch_failure)
				.unwrap_or_else(|error| DispatchFailure::Other {
					message: format!(
						"undecodable dispatch error 0x{} ({error})",
						hex::encode(event.field_bytes())
					),
				});
			notification = notification.with_dispatch_error(dispatch_error);
		}
		chain_events.push(ChainEvent::new(
			event.pallet_name(),
			event.variant_name(),
			event.field_bytes().to_vec(),
		));
	}

	Ok(notification.with_events(chain_events))
}

async fn notification(
	api: Api,
	tx_hash: H256,
	status: SubxtTxStatus<SubstrateConfig, Api>,
) -> Result<TxNotification> {
	let notification = match status {
		SubxtTxStatus::Validated => TxNotification::new(TxStatus::Ready, tx_hash),
		SubxtTxStatus::Broadcasted { .. } => TxNotification::new(TxStatus::Broadcast, tx_hash),
		SubxtTxStatus::NoLongerInBestBlock => TxNotification::new(TxStatus::Retracted, tx_hash),
		SubxtTxStatus::InBestBlock(in_block) => {
			return included(&api, TxStatus::InBlock, tx_hash, in_block).await
		},
		SubxtTxStatus::InFinalizedBlock(in_block) => {
			return included(&api, TxStatus::Finalized, tx_hash, in_block).await
		},
		SubxtTxStatus::Error { message } => {
			TxNotification::new(TxStatus::Error, tx_hash).with_message(message)
		},
		SubxtTxStatus::Invalid { message } => {
			TxNotification::new(TxStatus::Invalid, tx_hash).with_message(message)
		},
		SubxtTxStatus::Dropped { message } => {
			TxNotification::new(TxStatus::Dropped, tx_hash).with_message(message)
		},
	};
	Ok(notification)
}

fn raw_notification(
	tx_hash: H256,
	status: TransactionStatus<<SubstrateConfig as subxt::Config>::Hash>,
) -> TxNotification {
	match status {
		TransactionStatus::Validated => TxNotification::new(TxStatus::Ready, tx_hash),
		TransactionStatus::Broadcasted { .. } => TxNotification::new(TxStatus::Broadcast, tx_hash),
		TransactionStatus::NoLongerInBestBlock => {
			TxNotification::new(TxStatus::Retracted, tx_hash)
		},
		TransactionStatus::InBestBlock { hash } => {
			TxNotification::new(TxStatus::InBlock, tx_hash).in_block(H256(hash.hash().0))
		},
		TransactionStatus::InFinalizedBlock { hash } => {
			TxNotification::new(TxStatus::Finalized, tx_hash).in_block(H256(hash.hash().0))
		},
		TransactionStatus::Error { message } => {
			TxNotification::new(TxStatus::Error, tx_hash).with_message(message)
		},
		TransactionStatus::Invalid { message } => {
			TxNotification::new(TxStatus::Invalid, tx_hash).with_message(message)
		},
		TransactionStatus::Dropped { message } => {
			TxNotification::new(TxStatus::Dropped, tx_hash).with_message(message)
		},
	}
}

#[async_trait::async_trait]
impl ChainClient for Client {
	async fn transfer_call(&self, to: &AccountId32, value: u128) -> Result<Call> {
		self.call_data(
			"Balances",
			"transfer_allow_death",
			vec![account_value(to), Value::u128(value)],
		)
		.await
	}

	async fn instantiate_call(&self, params: &InstantiateParams) -> Result<Call> {
		self.call_data(
			"Contracts",
			"instantiate_with_code",
			vec![
				Value::u128(params.value),
				weight_value(params.gas_limit),
				option_value(params.storage_deposit_limit.map(Value::u128)),
				Value::from_bytes(&params.code),
				Value::from_bytes(&params.data),
				Value::from_bytes(&params.salt),
			],
		)
		.await
	}

	async fn contract_call(&self, params: &ContractCallParams) -> Result<Call> {
		self.call_data(
			"Contracts",
			"call",
			vec![
				account_value(&params.dest),
				Value::u128(params.value),
				weight_value(params.gas_limit),
				option_value(params.storage_deposit_limit.map(Value::u128)),
				Value::from_bytes(&params.data),
			],
		)
		.await
	}

	async fn sign(&self, call: &Call, signer: &Keypair, params: &SigningParams) -> Result<Vec<u8>> {
		let api = self.current().await?;
		let nonce = match params.nonce {
			Some(nonce) => nonce,
			None => {
				let account = subxt::utils::AccountId32(signer.public_key().0);
				api.tx()
					.account_nonce(&account)
					.await
					.map_err(|error| Error::chain(Operation::QueryState, error))?
			},
		};

		let mut builder = DefaultExtrinsicParamsBuilder::<SubstrateConfig>::new().nonce(nonce);
		if let Some(mortality) = params.mortality {
			builder = builder.mortal_unchecked(
				mortality.era.current,
				subxt::utils::H256::from(mortality.block_hash.0),
				mortality.era.period,
			);
		}

		let extrinsic = api
			.tx()
			.create_signed_offline(&RawCall(&call.0), signer, builder.build())
			.map_err(|error| Error::chain(Operation::Sign, error))?;
		debug!(nonce, "Call signed");
		Ok(extrinsic.encoded().to_vec())
	}

	fn rehydrate(&self, payload: &str) -> Result<RehydratedExtrinsic> {
		extrinsic::rehydrate(payload)
	}

	async fn submit_and_watch(&self, extrinsic: &[u8]) -> Result<NotificationStream> {
		let api = self.current().await?;
		let progress = SubmittableExtrinsic::from_bytes(api.clone(), extrinsic.to_vec())
			.submit_and_watch()
			.await
			.map_err(|error| Error::chain(Operation::Submit, error))?;
		let tx_hash = H256(progress.extrinsic_hash().0);

		let stream = progress.then(move |status| {
			let api = api.clone();
			async move {
				match status {
					Ok(status) => notification(api, tx_hash, status).await,
					Err(error) => Err(Error::chain(Operation::Watch, error)),
				}
			}
		});
		Ok(stream.boxed())
	}

	async fn submit_raw_and_watch(&self, extrinsic: &[u8]) -> Result<NotificationStream> {
		let api = self.current().await?;
		let tx_hash = H256(blake2_256(extrinsic));
		let statuses = api
			.backend()
			.submit_transaction(extrinsic)
			.await
			.map_err(|error| Error::chain(Operation::Submit, error))?;

		let stream = statuses.map(move |status| {
			status
				.map(|status| raw_notification(tx_hash, status))
				.map_err(|error| Error::chain(Operation::Watch, error))
		});
		Ok(stream.boxed())
	}

	async fn account_nonce(&self, account: &AccountId32) -> Result<u64> {
		let api = self.current().await?;
		api.tx()
			.account_nonce(&subxt_account(account))
			.await
			.map_err(|error| Error::chain(Operation::QueryState, error))
	}

	async fn latest_block(&self) -> Result<BlockRef> {
		let api = self.current().await?;
		let block = api
			.blocks()
			.at_latest()
			.await
			.map_err(|error| Error::chain(Operation::QueryState, error))?;
		Ok(BlockRef {
			number: u64::from(block.number()),
			hash: H256(block.hash().0),
		})
	}

	async fn dry_run(&self, origin: &AccountId32, params: &ContractCallParams) -> Result<Vec<u8>> {
		let api = self.current().await?;
		let arguments = (
			<[u8; 32]>::from(origin.clone()),
			<[u8; 32]>::from(params.dest.clone()),
			params.value,
			Some(params.gas_limit),
			params.storage_deposit_limit,
			params.data.clone(),
		)
			.encode();

		let RemainingBytes(result) = api
			.runtime_api()
			.at_latest()
			.await
			.map_err(|error| Error::chain(Operation::DryRun, error))?
			.call_raw::<RemainingBytes>(CONTRACTS_CALL_API, Some(&arguments))
			.await
			.map_err(|error| Error::chain(Operation::DryRun, error))?;
		Ok(result)
	}
}
