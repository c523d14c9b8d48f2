//! ink! contract deployment and invocation.
use crate::{
	bridge::{settle, Settlement},
	chain::{ChainClient, ContractCallParams, InstantiateParams, SigningParams, Weight},
	credential::{account_id, resolve_keypair},
	error::{DispatchFailure, Error, Result},
	keychain::SecretStore,
	types::{
		format_account, parse_account, DeployContractRequest, DeploymentOutcome, InvocationType,
		InvokeContractRequest, InvokeContractResponse,
	},
	utils::random_salt,
};
use codec::Decode;
use tracing::{debug, info};

pub mod abi;

use abi::ContractAbi;

/// Execution reverted, state changes are discarded.
const REVERT_FLAG: u32 = 1;

#[derive(Decode)]
#[allow(dead_code)]
enum StorageDeposit {
	Refund(u128),
	Charge(u128),
}

#[derive(Debug, Decode)]
struct ExecReturnValue {
	flags: u32,
	data: Vec<u8>,
}

impl ExecReturnValue {
	fn reverted(&self) -> bool {
		self.flags & REVERT_FLAG != 0
	}
}

/// Leading fields of `ContractsApi_call` result, trailing events are ignored.
struct ExecResult {
	gas_consumed: Weight,
	result: std::result::Result<ExecReturnValue, Vec<u8>>,
}

impl ExecResult {
	fn decode(bytes: &[u8]) -> Result<Self> {
		let input = &mut &bytes[..];
		let gas_consumed = Weight::decode(input).map_err(Error::codec)?;
		let _gas_required = Weight::decode(input).map_err(Error::codec)?;
		let _storage_deposit = StorageDeposit::decode(input).map_err(Error::codec)?;
		let _debug_message = Vec::<u8>::decode(input).map_err(Error::codec)?;
		let result = match u8::decode(input).map_err(Error::codec)? {
			0 => Ok(ExecReturnValue::decode(input).map_err(Error::codec)?),
			1 => Err(input.to_vec()),
			tag => return Err(Error::codec(format!("Invalid result tag {tag}"))),
		};
		Ok(ExecResult {
			gas_consumed,
			result,
		})
	}
}

/// Instantiates the contract through its first constructor and reports the new address.
pub async fn deploy<C, S>(
	chain: &C,
	store: &S,
	request: &DeployContractRequest,
) -> Result<DeploymentOutcome>
where
	C: ChainClient + ?Sized,
	S: SecretStore + ?Sized,
{
	let keypair = resolve_keypair(&request.signing_credential, store, "deploy a contract").await?;

	let abi = ContractAbi::parse(&request.metadata)?;
	let constructor = abi.default_constructor()?;
	let data = abi.encode_constructor(constructor, request.constructor_args.as_slice().into())?;
	let code = match (&request.wasm, &abi.wasm) {
		(Some(wasm), _) => wasm.0.clone(),
		(None, Some(wasm)) => wasm.clone(),
		(None, None) => return Err(Error::InvalidRequest("Contract code is missing".to_string())),
	};
	let salt = request
		.salt
		.as_ref()
		.map(|salt| salt.0.clone())
		.unwrap_or_else(random_salt);

	debug!(constructor, code_size = code.len(), "Instantiating contract");
	let call = chain
		.instantiate_call(&InstantiateParams {
			value: request.balance.unwrap_or_default(),
			gas_limit: request.gas_limit,
			storage_deposit_limit: request.storage_deposit_limit,
			code,
			data,
			salt,
		})
		.await?;
	let extrinsic = chain
		.sign(&call, &keypair, &SigningParams::default())
		.await?;
	let notifications = chain.submit_and_watch(&extrinsic).await?;
	let settled = settle(notifications, Settlement::Instantiation).await?;

	let contract_address = settled.contract.as_ref().map(format_account);
	info!(tx_hash = ?settled.tx_hash, ?contract_address, "Contract deployed");
	Ok(DeploymentOutcome {
		success: true,
		contract_address,
	})
}

/// Sends a message as a signed transaction or dry runs it as a query.
pub async fn invoke<C, S>(
	chain: &C,
	store: &S,
	request: &InvokeContractRequest,
) -> Result<InvokeContractResponse>
where
	C: ChainClient + ?Sized,
	S: SecretStore + ?Sized,
{
	let abi = ContractAbi::parse(&request.metadata)?;
	let params = ContractCallParams {
		dest: parse_account(&request.contract_address)?,
		value: request.balance.unwrap_or_default(),
		gas_limit: request.gas_limit,
		storage_deposit_limit: request.storage_deposit_limit,
		data: abi.encode_message(&request.method_name, &request.params)?,
	};
	debug!(
		method = %request.method_name,
		invocation = %request.invocation_type,
		contract = %request.contract_address,
		"Invoking contract"
	);

	match request.invocation_type {
		InvocationType::Send => send(chain, store, request, &params).await,
		InvocationType::Query => query(chain, store, request, &abi, &params).await,
	}
}

async fn send<C, S>(
	chain: &C,
	store: &S,
	request: &InvokeContractRequest,
	params: &ContractCallParams,
) -> Result<InvokeContractResponse>
where
	C: ChainClient + ?Sized,
	S: SecretStore + ?Sized,
{
	let keypair = resolve_keypair(&request.signing_credential, store, "invoke a contract").await?;
	let call = chain.contract_call(params).await?;
	let extrinsic = chain
		.sign(&call, &keypair, &SigningParams::default())
		.await?;
	let notifications = chain.submit_and_watch(&extrinsic).await?;
	let settled = settle(notifications, Settlement::Events).await?;

	Ok(InvokeContractResponse {
		success: true,
		tx_hash: Some(settled.tx_hash),
		block_hash: Some(settled.block_hash),
		..Default::default()
	})
}

async fn query<C, S>(
	chain: &C,
	store: &S,
	request: &InvokeContractRequest,
	abi: &ContractAbi,
	params: &ContractCallParams,
) -> Result<InvokeContractResponse>
where
	C: ChainClient + ?Sized,
	S: SecretStore + ?Sized,
{
	let origin = match &request.account_address {
		Some(address) => parse_account(address)?,
		None => account_id(
			&resolve_keypair(&request.signing_credential, store, "query a contract").await?,
		),
	};

	let ExecResult {
		gas_consumed,
		result,
	} = ExecResult::decode(&chain.dry_run(&origin, params).await?)?;
	let value = result.map_err(|error| Error::ExtrinsicFailed {
		dispatch_error: Some(DispatchFailure::Other {
			message: format!("0x{}", hex::encode(error)),
		}),
		events: vec![],
	})?;

	Ok(InvokeContractResponse {
		success: !value.reverted(),
		call_output: Some(abi.decode_output(&request.method_name, &value.data)?),
		gas_consumed: Some(gas_consumed),
		..Default::default()
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		chain::{
			test_utils::{included, signed_extrinsic, success_events, ALICE_KEY, CALL},
			Call, ChainEvent, MockChainClient, TxNotification, TxStatus,
		},
		credential::SigningCredential,
		keychain::{MemoryKeychain, SecretString},
		types::{Base64, HexBytes},
	};
	use abi::tests::{metadata, no_arg_metadata};
	use codec::Encode;
	use futures::{stream, StreamExt};
	use serde_json::{json, Value};
	use sp_core::{crypto::AccountId32, H256};

	const TX: H256 = H256::repeat_byte(1);
	const BLOCK: H256 = H256::repeat_byte(2);
	const CONTRACT: [u8; 32] = [9; 32];
	const GAS: Weight = Weight {
		ref_time: 1_000_000,
		proof_size: 4_096,
	};

	fn alice() -> SigningCredential {
		SigningCredential::MnemonicString {
			mnemonic: SecretString::from("//Alice"),
		}
	}

	fn deploy_request(metadata: Value, constructor_args: Vec<Value>) -> DeployContractRequest {
		DeployContractRequest {
			wasm: None,
			metadata,
			gas_limit: GAS,
			storage_deposit_limit: None,
			salt: None,
			balance: None,
			constructor_args,
			signing_credential: alice(),
		}
	}

	fn invoke_request(method: &str, invocation_type: InvocationType) -> InvokeContractRequest {
		InvokeContractRequest {
			metadata: metadata(),
			contract_address: format_account(&AccountId32::from(CONTRACT)),
			method_name: method.to_string(),
			invocation_type,
			gas_limit: GAS,
			storage_deposit_limit: None,
			balance: None,
			params: vec![],
			signing_credential: alice(),
			account_address: None,
		}
	}

	fn instantiated_events() -> Vec<ChainEvent> {
		let mut events = success_events();
		events.push(ChainEvent::new(
			"Contracts",
			"Instantiated",
			(ALICE_KEY, CONTRACT).encode(),
		));
		events
	}

	fn submitting(chain: &mut MockChainClient, events: Vec<ChainEvent>) {
		chain
			.expect_sign()
			.times(1)
			.returning(|_, _, _| Ok(signed_extrinsic()));
		chain
			.expect_submit_and_watch()
			.times(1)
			.returning(move |_| Ok(included(TX, BLOCK, Some(events.clone()))));
	}

	fn output_contains(response: &InvokeContractResponse, text: &str) -> bool {
		matches!(&response.call_output, Some(Value::String(output)) if output.contains(text))
	}

	fn exec_result(flags: u32, data: Vec<u8>) -> Vec<u8> {
		(GAS, GAS, 1u8, 0u128, Vec::<u8>::new(), 0u8, flags, data, 0u8).encode()
	}

	#[tokio::test]
	async fn deploy_reports_contract_address() {
		let mut chain = MockChainClient::new();
		chain
			.expect_instantiate_call()
			.withf(|params| {
				params.code == [0x00, 0x61, 0x73, 0x6d]
					&& params.data == [0x9b, 0xae, 0x9d, 0x5e, 0x01]
					&& params.salt.len() == 32
					&& params.gas_limit == GAS
			})
			.times(1)
			.returning(|_| Ok(Call(CALL.to_vec())));
		submitting(&mut chain, instantiated_events());

		let request = deploy_request(metadata(), vec![json!(true)]);
		let outcome = deploy(&chain, &MemoryKeychain::default(), &request)
			.await
			.unwrap();
		assert!(outcome.success);
		assert_eq!(
			outcome.contract_address,
			Some(format_account(&AccountId32::from(CONTRACT)))
		);
	}

	#[tokio::test]
	async fn deploy_without_arguments_sends_selector_and_given_code() {
		let mut chain = MockChainClient::new();
		chain
			.expect_instantiate_call()
			.withf(|params| {
				params.code == [1, 2, 3] && params.data == [0x9b, 0xae, 0x9d, 0x5e] && params.salt == [5]
			})
			.times(1)
			.returning(|_| Ok(Call(CALL.to_vec())));
		submitting(&mut chain, instantiated_events());

		let mut request = deploy_request(no_arg_metadata(), vec![]);
		request.wasm = Some(Base64(vec![1, 2, 3]));
		request.salt = Some(HexBytes(vec![5]));
		let outcome = deploy(&chain, &MemoryKeychain::default(), &request)
			.await
			.unwrap();
		assert!(outcome.success);
		assert!(outcome.contract_address.is_some());
	}

	#[tokio::test]
	async fn deploy_surfaces_module_dispatch_error() {
		let failure = DispatchFailure::Module {
			section: "Contracts".to_string(),
			name: "CodeRejected".to_string(),
			docs: vec!["The contract's code was found to be invalid.".to_string()],
		};
		let mut chain = MockChainClient::new();
		chain
			.expect_instantiate_call()
			.times(1)
			.returning(|_| Ok(Call(CALL.to_vec())));
		chain
			.expect_sign()
			.times(1)
			.returning(|_, _, _| Ok(signed_extrinsic()));
		let notification = TxNotification::new(TxStatus::InBlock, TX)
			.in_block(BLOCK)
			.with_events(vec![ChainEvent::new("System", "ExtrinsicFailed", vec![])])
			.with_dispatch_error(failure.clone());
		chain.expect_submit_and_watch().times(1).returning(move |_| {
			Ok(stream::iter(vec![Ok(notification.clone())]).boxed())
		});

		let request = deploy_request(metadata(), vec![json!(true)]);
		let result = deploy(&chain, &MemoryKeychain::default(), &request).await;
		assert!(matches!(
			result,
			Err(Error::ExtrinsicFailed { dispatch_error: Some(ref decoded), .. }) if *decoded == failure
		));
	}

	#[tokio::test]
	async fn deploy_rejects_pre_signed_before_touching_chain() {
		let chain = MockChainClient::new();
		let mut request = deploy_request(metadata(), vec![json!(true)]);
		request.signing_credential = SigningCredential::PreSigned;
		assert!(matches!(
			deploy(&chain, &MemoryKeychain::default(), &request).await,
			Err(Error::UnsupportedCredentialForOperation { .. })
		));
	}

	#[tokio::test]
	async fn deploy_requires_code() {
		let chain = MockChainClient::new();
		let mut metadata = metadata();
		metadata["source"] = json!({});
		let request = deploy_request(metadata, vec![json!(false)]);
		assert!(matches!(
			deploy(&chain, &MemoryKeychain::default(), &request).await,
			Err(Error::InvalidRequest(_))
		));
	}

	#[tokio::test]
	async fn deploy_fails_when_constructor_expects_arguments() {
		let chain = MockChainClient::new();
		let request = deploy_request(metadata(), vec![]);
		assert!(matches!(
			deploy(&chain, &MemoryKeychain::default(), &request).await,
			Err(Error::CodecError(_))
		));
	}

	#[tokio::test]
	async fn send_settles_like_transfer() {
		let mut chain = MockChainClient::new();
		chain
			.expect_contract_call()
			.withf(|params| {
				params.dest == AccountId32::from(CONTRACT) && params.data == [0x63, 0x3a, 0xa5, 0x51]
			})
			.times(1)
			.returning(|_| Ok(Call(CALL.to_vec())));
		submitting(&mut chain, success_events());

		let response = invoke(
			&chain,
			&MemoryKeychain::default(),
			&invoke_request("flip", InvocationType::Send),
		)
		.await
		.unwrap();
		assert!(response.success);
		assert_eq!(response.tx_hash, Some(TX));
		assert_eq!(response.block_hash, Some(BLOCK));
		assert_eq!(response.call_output, None);
	}

	#[tokio::test]
	async fn query_decodes_output_and_gas() {
		let mut chain = MockChainClient::new();
		chain
			.expect_dry_run()
			.withf(|origin, params| {
				*origin == AccountId32::from(ALICE_KEY) && params.data == [0x2f, 0x86, 0x5b, 0xd9]
			})
			.times(1)
			.returning(|_, _| Ok(exec_result(0, vec![0x00, 0x01])));

		let response = invoke(
			&chain,
			&MemoryKeychain::default(),
			&invoke_request("get", InvocationType::Query),
		)
		.await
		.unwrap();
		assert!(response.success);
		assert!(output_contains(&response, "true"));
		assert_eq!(response.gas_consumed, Some(GAS));
		assert_eq!(response.tx_hash, None);
	}

	#[tokio::test]
	async fn reverted_query_is_not_successful() {
		let mut chain = MockChainClient::new();
		chain
			.expect_dry_run()
			.returning(|_, _| Ok(exec_result(REVERT_FLAG, vec![0x00, 0x00])));

		let mut request = invoke_request("get", InvocationType::Query);
		request.signing_credential = SigningCredential::PreSigned;
		request.account_address = Some(format_account(&AccountId32::from([3u8; 32])));
		let response = invoke(&chain, &MemoryKeychain::default(), &request)
			.await
			.unwrap();
		assert!(!response.success);
		assert!(output_contains(&response, "false"));
	}

	#[tokio::test]
	async fn query_without_origin_needs_signing_credential() {
		let chain = MockChainClient::new();
		let mut request = invoke_request("get", InvocationType::Query);
		request.signing_credential = SigningCredential::PreSigned;
		assert!(matches!(
			invoke(&chain, &MemoryKeychain::default(), &request).await,
			Err(Error::UnsupportedCredentialForOperation { .. })
		));
	}

	#[test]
	fn dispatch_error_of_dry_run_is_kept_raw() {
		let bytes = (GAS, GAS, 0u8, 0u128, Vec::<u8>::new(), 1u8, 3u8, 0u8).encode();
		let result = ExecResult::decode(&bytes).unwrap();
		assert_eq!(result.result.unwrap_err(), vec![3, 0]);
	}
}
