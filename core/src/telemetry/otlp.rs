use super::MetricCounter;
use color_eyre::Result;
use opentelemetry::{
	global,
	metrics::{Counter, Meter},
	KeyValue,
};
use opentelemetry_otlp::{MetricExporter, Protocol, WithExportConfig};
use opentelemetry_sdk::{
	metrics::{PeriodicReader, SdkMeterProvider},
	runtime::Tokio,
	Resource,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};
use strum::IntoEnumIterator;
use tracing::warn;

const PROJECT_NAME: &str = "substrate";

pub struct Metrics {
	counters: HashMap<MetricCounter, Counter<u64>>,
	attributes: Vec<KeyValue>,
	provider: SdkMeterProvider,
}

impl Metrics {
	/// Flushes pending measurements to the collector.
	pub fn shutdown(&self) {
		if let Err(error) = self.provider.shutdown() {
			warn!(%error, "Failed to shut down metrics provider");
		}
	}
}

impl super::Metrics for Metrics {
	fn count(&self, counter: MetricCounter) {
		if let Some(otel_counter) = self.counters.get(&counter) {
			otel_counter.add(1, &self.attributes);
		}
	}
}

fn init_counters(meter: &Meter) -> HashMap<MetricCounter, Counter<u64>> {
	MetricCounter::iter()
		.map(|counter| (counter, meter.u64_counter(counter.name(PROJECT_NAME)).build()))
		.collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OtelConfig {
	/// OpenTelemetry Collector endpoint (default: `http://127.0.0.1:4317`)
	pub ot_collector_endpoint: String,
	/// Export period in seconds (default: 60)
	pub ot_export_period: u64,
	/// Export timeout in seconds (default: 10)
	pub ot_export_timeout: u64,
}

impl Default for OtelConfig {
	fn default() -> Self {
		Self {
			ot_collector_endpoint: "http://127.0.0.1:4317".to_string(),
			ot_export_period: 60,
			ot_export_timeout: 10,
		}
	}
}

pub fn initialize(attributes: Vec<(&str, String)>, ot_config: OtelConfig) -> Result<Metrics> {
	let exporter = MetricExporter::builder()
		.with_tonic()
		.with_endpoint(&ot_config.ot_collector_endpoint)
		.with_protocol(Protocol::Grpc)
		.with_timeout(Duration::from_secs(ot_config.ot_export_timeout))
		.build()?;

	let reader = PeriodicReader::builder(exporter, Tokio)
		.with_interval(Duration::from_secs(ot_config.ot_export_period))
		.with_timeout(Duration::from_secs(ot_config.ot_export_timeout))
		.build();

	let provider = SdkMeterProvider::builder()
		.with_reader(reader)
		.with_resource(Resource::new(vec![KeyValue::new(
			"service.name",
			"substrate-connector".to_string(),
		)]))
		.build();

	global::set_meter_provider(provider.clone());
	let meter = global::meter("substrate_connector");

	let attributes = attributes
		.into_iter()
		.map(|(k, v)| KeyValue::new(k.to_string(), v))
		.collect();

	Ok(Metrics {
		counters: init_counters(&meter),
		attributes,
		provider,
	})
}
