//! Connector error taxonomy.
use crate::chain::{ChainEvent, TxStatus};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use strum::Display;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Chain adapter operation an error originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
	Connect,
	BuildCall,
	Sign,
	Submit,
	Watch,
	QueryState,
	DryRun,
}

/// Node reported dispatch error, decoded when runtime metadata allows it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DispatchFailure {
	Module {
		section: String,
		name: String,
		docs: Vec<String>,
	},
	Other {
		message: String,
	},
}

impl Display for DispatchFailure {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			DispatchFailure::Module {
				section,
				name,
				docs,
			} if docs.is_empty() => write!(f, "{section}.{name}"),
			DispatchFailure::Module {
				section,
				name,
				docs,
			} => write!(f, "{section}.{name}: {}", docs.join(" ")),
			DispatchFailure::Other { message } => write!(f, "{message}"),
		}
	}
}

#[derive(Debug, Error)]
pub enum Error {
	#[error("No active connection to the chain node")]
	NotConnected,
	#[error("Invalid signing credential: {0}")]
	InvalidCredential(String),
	#[error("Invalid mnemonic: {0}")]
	InvalidMnemonic(String),
	#[error("Credential not found: {0}")]
	CredentialNotFound(String),
	#[error("Signing credential of type {credential} cannot be used to {operation}")]
	UnsupportedCredentialForOperation {
		credential: &'static str,
		operation: &'static str,
	},
	#[error("Missing transaction payload: {0}")]
	MissingTransactionPayload(&'static str),
	#[error("Transaction is not signed")]
	UnsignedTransaction,
	#[error("Transaction signature is not hex encoded: {0}")]
	InvalidSignatureEncoding(String),
	#[error("Submission not accepted by the node ({status}){}", message_suffix(.message))]
	SubmissionNotAccepted {
		status: TxStatus,
		message: Option<String>,
	},
	#[error("Extrinsic failed: {}", failure_reason(.dispatch_error, .events))]
	ExtrinsicFailed {
		dispatch_error: Option<DispatchFailure>,
		events: Vec<ChainEvent>,
	},
	#[error("Codec error: {0}")]
	CodecError(String),
	#[error("Invalid address: {0}")]
	InvalidAddress(String),
	#[error("Invalid request: {0}")]
	InvalidRequest(String),
	#[error("Chain operation {operation} failed: {reason}")]
	Chain { operation: Operation, reason: String },
}

impl Error {
	pub fn chain(operation: Operation, reason: impl Display) -> Self {
		Error::Chain {
			operation,
			reason: reason.to_string(),
		}
	}

	pub fn codec(reason: impl Display) -> Self {
		Error::CodecError(reason.to_string())
	}
}

fn message_suffix(message: &Option<String>) -> String {
	message
		.as_ref()
		.map(|message| format!(": {message}"))
		.unwrap_or_default()
}

fn failure_reason(dispatch_error: &Option<DispatchFailure>, events: &[ChainEvent]) -> String {
	match dispatch_error {
		Some(dispatch_error) => dispatch_error.to_string(),
		None => {
			let events = events
				.iter()
				.map(ToString::to_string)
				.collect::<Vec<_>>()
				.join(", ");
			format!("no success event among block events [{events}]")
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn module_dispatch_failure_is_rendered_with_docs() {
		let failure = DispatchFailure::Module {
			section: "balances".to_string(),
			name: "InsufficientBalance".to_string(),
			docs: vec!["Balance too low to send value.".to_string()],
		};
		assert_eq!(
			failure.to_string(),
			"balances.InsufficientBalance: Balance too low to send value."
		);

		let error = Error::ExtrinsicFailed {
			dispatch_error: Some(failure),
			events: vec![],
		};
		assert!(error.to_string().contains("balances.InsufficientBalance"));
	}

	#[test]
	fn extrinsic_failure_without_dispatch_error_lists_events() {
		let error = Error::ExtrinsicFailed {
			dispatch_error: None,
			events: vec![ChainEvent::new("Balances", "Withdraw", vec![])],
		};
		assert_eq!(
			error.to_string(),
			"Extrinsic failed: no success event among block events [Balances.Withdraw]"
		);
	}

	#[test]
	fn not_accepted_includes_status_and_message() {
		let error = Error::SubmissionNotAccepted {
			status: TxStatus::Invalid,
			message: Some("bad proof".to_string()),
		};
		assert_eq!(
			error.to_string(),
			"Submission not accepted by the node (invalid): bad proof"
		);
	}
}
