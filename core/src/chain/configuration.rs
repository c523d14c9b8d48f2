//! Node endpoint and the backoff used while connecting to it.
use crate::types::duration_millis_format;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff, FibonacciBackoff};

pub const LOCAL_WS_ENDPOINT: &str = "ws://127.0.0.1:9944";

#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct NodeConfig {
	/// WebSocket endpoint of the node (default: ws://127.0.0.1:9944).
	pub ws_endpoint: String,
	/// Backoff between connection attempts. Submissions are never retried.
	pub connect_retry: ConnectRetry,
}

impl Default for NodeConfig {
	fn default() -> Self {
		Self {
			ws_endpoint: LOCAL_WS_ENDPOINT.into(),
			connect_retry: ConnectRetry::default(),
		}
	}
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
	Exponential,
	#[default]
	Fibonacci,
}

/// Delays between connection attempts, in seconds multiplied by `base`, capped at `max_delay`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectRetry {
	pub backoff: Backoff,
	pub base: u64,
	#[serde(with = "duration_millis_format")]
	pub max_delay: Duration,
	pub attempts: usize,
}

impl Default for ConnectRetry {
	fn default() -> Self {
		Self {
			backoff: Backoff::Fibonacci,
			base: 1,
			max_delay: Duration::from_secs(10),
			attempts: 6,
		}
	}
}

impl IntoIterator for ConnectRetry {
	type Item = Duration;
	type IntoIter = std::vec::IntoIter<Duration>;

	fn into_iter(self) -> Self::IntoIter {
		let delays: Box<dyn Iterator<Item = Duration>> = match self.backoff {
			Backoff::Exponential => Box::new(
				ExponentialBackoff::from_millis(self.base)
					.factor(1000)
					.max_delay(self.max_delay),
			),
			Backoff::Fibonacci => Box::new(
				FibonacciBackoff::from_millis(self.base)
					.factor(1000)
					.max_delay(self.max_delay),
			),
		};
		delays
			.map(jitter)
			.take(self.attempts)
			.collect::<Vec<_>>()
			.into_iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn delays_are_capped() {
		let retry = ConnectRetry {
			backoff: Backoff::Exponential,
			base: 2,
			max_delay: Duration::from_millis(3000),
			attempts: 4,
		};
		let delays = retry.into_iter().collect::<Vec<_>>();
		assert_eq!(delays.len(), 4);
		assert!(delays.iter().all(|delay| *delay <= Duration::from_millis(3000)));
	}

	#[test]
	fn partial_config_keeps_defaults() {
		let config: NodeConfig = serde_json::from_str(
			r#"{"connect_retry": {"backoff": "exponential", "max_delay": 500}}"#,
		)
		.unwrap();
		assert_eq!(config.ws_endpoint, LOCAL_WS_ENDPOINT);
		assert_eq!(
			config.connect_retry,
			ConnectRetry {
				backoff: Backoff::Exponential,
				max_delay: Duration::from_millis(500),
				..Default::default()
			}
		);
	}

	#[test]
	fn zero_attempts_never_retries() {
		let retry = ConnectRetry {
			attempts: 0,
			..Default::default()
		};
		assert_eq!(retry.into_iter().count(), 0);
	}
}
