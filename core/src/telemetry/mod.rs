use mockall::automock;
use strum::{EnumIter, IntoStaticStr};

pub mod otlp;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum MetricCounter {
	TransactionsSubmitted,
	TransactionsSucceeded,
	TransactionsFailed,
	ContractsDeployed,
	ContractInvocations,
}

impl MetricCounter {
	pub fn name(&self, project_name: &str) -> String {
		let name: &'static str = self.into();
		format!("{project_name}.connector.{name}")
	}
}

/// Counter sink, counting never fails or blocks the caller.
#[automock]
pub trait Metrics: Send + Sync {
	fn count(&self, counter: MetricCounter);
}

/// Sink used when telemetry is disabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
	fn count(&self, _counter: MetricCounter) {}
}
