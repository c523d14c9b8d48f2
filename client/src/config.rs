use serde::{Deserialize, Serialize};
use substrate_connector_core::{
	chain::configuration::NodeConfig,
	keychain::Keychains,
	telemetry::otlp::OtelConfig,
	types::tracing_level_format,
};
use tracing::Level;

/// Representation of a configuration used by this project.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct RuntimeConfig {
	/// Log level, default is `INFO`. See `<https://docs.rs/log/0.4.14/log/enum.LevelFilter.html>` for possible log level values. (default: `INFO`).
	#[serde(with = "tracing_level_format")]
	pub log_level: Level,
	/// If set to true, logs are displayed in JSON format, which is used for structured logging. Otherwise, plain text format is used (default: false).
	pub log_format_json: bool,
	#[serde(flatten)]
	pub node: NodeConfig,
	/// OpenTelemetry exporter, metrics are disabled when omitted (default: None).
	pub otel: Option<OtelConfig>,
	/// Secrets available to keychain references, keyed by keychain id and entry key.
	pub keychains: Keychains,
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		RuntimeConfig {
			log_level: Level::INFO,
			log_format_json: false,
			node: Default::default(),
			otel: None,
			keychains: Default::default(),
		}
	}
}
