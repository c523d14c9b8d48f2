//! Entry point bundling the chain client, secret store and metrics sink.
use crate::{
	chain::ChainClient,
	contract,
	error::Result,
	info::{self, TransactionInfo},
	keychain::SecretStore,
	telemetry::{MetricCounter, Metrics},
	transactions,
	types::{
		DeployContractRequest, DeploymentOutcome, InvokeContractRequest, InvokeContractResponse,
		RawTransactionResponse, RunTransactionRequest, SignRawTransactionRequest,
		SignRawTransactionResponse, SubmissionOutcome, TransactionInfoRequest, TransferParams,
	},
};
use std::sync::Arc;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct Connector {
	chain: Arc<dyn ChainClient>,
	keychain: Arc<dyn SecretStore>,
	metrics: Arc<dyn Metrics>,
}

impl Connector {
	pub fn new(
		chain: Arc<dyn ChainClient>,
		keychain: Arc<dyn SecretStore>,
		metrics: Arc<dyn Metrics>,
	) -> Self {
		Self {
			chain,
			keychain,
			metrics,
		}
	}

	fn record<T>(&self, result: &Result<T>, success: MetricCounter) {
		match result {
			Ok(_) => self.metrics.count(success),
			Err(error) => {
				warn!(%error, "Request failed");
				self.metrics.count(MetricCounter::TransactionsFailed);
			},
		}
	}

	/// Submits a transfer signed by the connector, or a pre-signed extrinsic.
	pub async fn run_transaction(&self, request: &RunTransactionRequest) -> Result<SubmissionOutcome> {
		let span = info_span!("run_transaction", request_id = %Uuid::new_v4(), credential = request.signing_credential.kind());
		async {
			self.metrics.count(MetricCounter::TransactionsSubmitted);
			let result =
				transactions::run_transaction(self.chain.as_ref(), self.keychain.as_ref(), request)
					.await;
			self.record(&result, MetricCounter::TransactionsSucceeded);
			result
		}
		.instrument(span)
		.await
	}

	pub async fn deploy_contract(&self, request: &DeployContractRequest) -> Result<DeploymentOutcome> {
		let span = info_span!("deploy_contract", request_id = %Uuid::new_v4());
		async {
			self.metrics.count(MetricCounter::TransactionsSubmitted);
			let result =
				contract::deploy(self.chain.as_ref(), self.keychain.as_ref(), request).await;
			self.record(&result, MetricCounter::ContractsDeployed);
			result
		}
		.instrument(span)
		.await
	}

	pub async fn invoke_contract(
		&self,
		request: &InvokeContractRequest,
	) -> Result<InvokeContractResponse> {
		let span = info_span!(
			"invoke_contract",
			request_id = %Uuid::new_v4(),
			method = %request.method_name,
			invocation = %request.invocation_type
		);
		async {
			let result =
				contract::invoke(self.chain.as_ref(), self.keychain.as_ref(), request).await;
			self.record(&result, MetricCounter::ContractInvocations);
			result
		}
		.instrument(span)
		.await
	}

	/// Unsigned transfer call, hex encoded.
	pub async fn get_raw_transaction(&self, transfer: &TransferParams) -> Result<RawTransactionResponse> {
		transactions::build_raw(self.chain.as_ref(), transfer)
			.instrument(info_span!("get_raw_transaction", request_id = %Uuid::new_v4()))
			.await
	}

	pub async fn sign_raw_transaction(
		&self,
		request: &SignRawTransactionRequest,
	) -> Result<SignRawTransactionResponse> {
		transactions::sign_raw(self.chain.as_ref(), self.keychain.as_ref(), request)
			.instrument(info_span!("sign_raw_transaction", request_id = %Uuid::new_v4()))
			.await
	}

	pub async fn get_transaction_info(
		&self,
		request: &TransactionInfoRequest,
	) -> Result<TransactionInfo> {
		info::get_info(
			self.chain.as_ref(),
			&request.account_address,
			request.validity_window,
		)
		.instrument(info_span!(
			"get_transaction_info",
			request_id = %Uuid::new_v4(),
			account = %request.account_address
		))
		.await
	}
}
