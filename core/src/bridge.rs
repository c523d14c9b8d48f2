//! Collapses the notification stream of a submission into a single outcome.
//!
//! The first decisive notification (inclusion, rejection or dispatch error)
//! resolves the submission. Later notifications are not observed and the
//! subscription is dropped, so an outcome means "included", not "finalized".
use crate::{
	chain::{has_extrinsic_success, ChainEvent, NotificationStream, TxNotification, TxStatus},
	error::{Error, Operation, Result},
	utils::spawn_in_span,
};
use codec::Decode;
use futures::StreamExt;
use sp_core::{crypto::AccountId32, H256};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

const CONTRACTS_PALLET: &str = "Contracts";
const INSTANTIATED: &str = "Instantiated";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeState {
	Pending,
	Included,
	Failed,
	Rejected,
}

/// What an inclusion has to show to count as success.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settlement {
	/// `System.ExtrinsicSuccess` among the extrinsic events
	Events,
	/// Inclusion itself, used for payloads signed elsewhere
	Inclusion,
	/// `Contracts.Instantiated` carrying the deployed contract address
	Instantiation,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settled {
	pub tx_hash: H256,
	pub block_hash: H256,
	pub contract: Option<AccountId32>,
	pub events: Vec<ChainEvent>,
}

#[derive(Decode)]
struct Instantiated {
	_deployer: [u8; 32],
	contract: [u8; 32],
}

fn instantiated_contract(events: &[ChainEvent]) -> Option<AccountId32> {
	events
		.iter()
		.find(|event| event.is(CONTRACTS_PALLET, INSTANTIATED))
		.and_then(|event| Instantiated::decode(&mut &event.data[..]).ok())
		.map(|instantiated| AccountId32::from(instantiated.contract))
}

struct Bridge {
	settlement: Settlement,
	state: BridgeState,
	last_status: Option<TxStatus>,
	completion: Option<oneshot::Sender<Result<Settled>>>,
}

impl Bridge {
	fn new(settlement: Settlement, completion: oneshot::Sender<Result<Settled>>) -> Self {
		Self {
			settlement,
			state: BridgeState::Pending,
			last_status: None,
			completion: Some(completion),
		}
	}

	fn is_resolved(&self) -> bool {
		self.state != BridgeState::Pending
	}

	/// Writes the outcome, only the first call has any effect.
	fn resolve(&mut self, state: BridgeState, result: Result<Settled>) {
		let Some(completion) = self.completion.take() else {
			return;
		};
		self.state = state;
		if completion.send(result).is_err() {
			debug!("Submission outcome receiver dropped");
		}
	}

	fn observe(&mut self, notification: TxNotification) {
		if self.is_resolved() {
			return;
		}
		let TxNotification {
			status,
			tx_hash,
			block_hash,
			message,
			events,
			dispatch_error,
		} = notification;
		self.last_status = Some(status);
		debug!(%status, ?tx_hash, ?block_hash, "Submission status");

		if let Some(dispatch_error) = dispatch_error {
			warn!(?tx_hash, %dispatch_error, "Extrinsic dispatch failed");
			let events = events.unwrap_or_default();
			return self.resolve(
				BridgeState::Failed,
				Err(Error::ExtrinsicFailed {
					dispatch_error: Some(dispatch_error),
					events,
				}),
			);
		}

		if status.is_rejection() {
			warn!(?tx_hash, %status, ?message, "Submission not accepted");
			return self.resolve(
				BridgeState::Rejected,
				Err(Error::SubmissionNotAccepted { status, message }),
			);
		}

		if !status.is_inclusion() {
			return;
		}

		let Some(block_hash) = block_hash else {
			return self.resolve(
				BridgeState::Failed,
				Err(Error::chain(Operation::Watch, "inclusion reported without block hash")),
			);
		};
		let events = events.unwrap_or_default();

		let contract = match self.settlement {
			Settlement::Inclusion => None,
			Settlement::Events if has_extrinsic_success(&events) => None,
			Settlement::Events => return self.fail_without_success(events),
			Settlement::Instantiation => match instantiated_contract(&events) {
				Some(contract) => Some(contract),
				None => return self.fail_without_success(events),
			},
		};

		info!(?tx_hash, ?block_hash, %status, "Transaction included");
		self.resolve(
			BridgeState::Included,
			Ok(Settled {
				tx_hash,
				block_hash,
				contract,
				events,
			}),
		);
	}

	fn fail_without_success(&mut self, events: Vec<ChainEvent>) {
		warn!(event_count = events.len(), "Included extrinsic has no success event");
		self.resolve(
			BridgeState::Failed,
			Err(Error::ExtrinsicFailed {
				dispatch_error: None,
				events,
			}),
		);
	}

	fn fail(&mut self, error: Error) {
		self.resolve(BridgeState::Failed, Err(error));
	}

	/// Resolves a submission whose stream ended without a decision.
	fn finish(&mut self) {
		let status = self.last_status.unwrap_or(TxStatus::Dropped);
		self.resolve(
			BridgeState::Rejected,
			Err(Error::SubmissionNotAccepted {
				status,
				message: Some("subscription ended before inclusion".to_string()),
			}),
		);
	}
}

/// Waits for the first decisive notification of a submission.
///
/// Waiting is unbounded, a node that never reports a decisive status keeps the caller pending.
pub async fn settle(notifications: NotificationStream, settlement: Settlement) -> Result<Settled> {
	let (sender, receiver) = oneshot::channel();
	let mut bridge = Bridge::new(settlement, sender);

	spawn_in_span(async move {
		let mut notifications = notifications;
		while let Some(notification) = notifications.next().await {
			match notification {
				Ok(notification) => bridge.observe(notification),
				Err(error) => bridge.fail(error),
			}
			if bridge.is_resolved() {
				return;
			}
		}
		bridge.finish();
	});

	receiver
		.await
		.map_err(|_| Error::chain(Operation::Watch, "submission watcher stopped"))?
}
