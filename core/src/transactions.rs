//! Balance transfers signed by the connector, pre-signed submissions and offline signing.
use crate::{
	bridge::{settle, Settlement},
	chain::{Call, ChainClient, Mortality, SigningParams},
	credential::{resolve_keypair, SigningCredential},
	error::{Error, Result},
	keychain::SecretStore,
	types::{
		parse_account, HexBytes, RawTransactionResponse, RunTransactionRequest,
		SignRawTransactionRequest, SignRawTransactionResponse, SubmissionOutcome, TransferParams,
	},
};
use tracing::{debug, info};

/// Resolves the credential, then builds, signs and submits a balance transfer.
pub async fn submit_by_credential<C, S>(
	chain: &C,
	store: &S,
	transfer: &TransferParams,
	credential: &SigningCredential,
) -> Result<SubmissionOutcome>
where
	C: ChainClient + ?Sized,
	S: SecretStore + ?Sized,
{
	let keypair = resolve_keypair(credential, store, "submit a transfer").await?;
	let to = parse_account(&transfer.to)?;

	let call = chain.transfer_call(&to, transfer.value).await?;
	let extrinsic = chain
		.sign(&call, &keypair, &SigningParams::default())
		.await?;
	debug!(to = %transfer.to, value = transfer.value, "Submitting transfer");

	let notifications = chain.submit_and_watch(&extrinsic).await?;
	let settled = settle(notifications, Settlement::Events).await?;
	Ok(SubmissionOutcome::included(settled.tx_hash, settled.block_hash))
}

/// Broadcasts an extrinsic signed elsewhere.
///
/// The payload is validated offline, unsigned payloads never reach the node.
pub async fn submit_pre_signed<C: ChainClient + ?Sized>(
	chain: &C,
	payload: &str,
) -> Result<SubmissionOutcome> {
	let extrinsic = chain.rehydrate(payload)?;
	if extrinsic.signature().is_none() {
		return Err(Error::UnsignedTransaction);
	}
	info!(
		tx_hash = ?extrinsic.hash(),
		signer = ?extrinsic.signer(),
		signature = ?extrinsic.signature_hex(),
		"Submitting pre-signed extrinsic"
	);

	let notifications = chain.submit_raw_and_watch(extrinsic.encoded()).await?;
	let settled = settle(notifications, Settlement::Inclusion).await?;
	Ok(SubmissionOutcome::included(settled.tx_hash, settled.block_hash))
}

pub async fn run_transaction<C, S>(
	chain: &C,
	store: &S,
	request: &RunTransactionRequest,
) -> Result<SubmissionOutcome>
where
	C: ChainClient + ?Sized,
	S: SecretStore + ?Sized,
{
	let RunTransactionRequest {
		signing_credential,
		transfer,
		pre_signed_payload,
	} = request;

	match (signing_credential, pre_signed_payload, transfer) {
		(SigningCredential::PreSigned, Some(payload), _) => submit_pre_signed(chain, payload).await,
		(SigningCredential::PreSigned, None, _) => {
			Err(Error::MissingTransactionPayload("preSignedPayload"))
		},
		(credential, _, Some(transfer)) => {
			submit_by_credential(chain, store, transfer, credential).await
		},
		(_, _, None) => Err(Error::MissingTransactionPayload("transfer")),
	}
}

/// Builds an unsigned transfer call for signing out of band.
pub async fn build_raw<C: ChainClient + ?Sized>(
	chain: &C,
	transfer: &TransferParams,
) -> Result<RawTransactionResponse> {
	let to = parse_account(&transfer.to)?;
	let Call(call) = chain.transfer_call(&to, transfer.value).await?;
	Ok(RawTransactionResponse {
		raw_transaction: HexBytes(call).into(),
	})
}

/// Signs a raw call with caller supplied nonce and era, without querying the chain.
pub async fn sign_raw<C, S>(
	chain: &C,
	store: &S,
	request: &SignRawTransactionRequest,
) -> Result<SignRawTransactionResponse>
where
	C: ChainClient + ?Sized,
	S: SecretStore + ?Sized,
{
	let keypair =
		resolve_keypair(&request.signing_credential, store, "sign a raw transaction").await?;
	let HexBytes(call) = request.raw_transaction.parse()?;
	if call.is_empty() {
		return Err(Error::InvalidRequest("Raw transaction is empty".to_string()));
	}

	let options = &request.signing_options;
	options.era.validate()?;
	let params = SigningParams {
		nonce: Some(options.nonce),
		mortality: Some(Mortality {
			era: options.era,
			block_hash: options.block_hash,
		}),
	};
	let signed = chain.sign(&Call(call), &keypair, &params).await?;

	Ok(SignRawTransactionResponse {
		success: true,
		signed_transaction: HexBytes(signed).into(),
	})
}
