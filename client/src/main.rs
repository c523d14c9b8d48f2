use crate::{
	cli::{CliOpts, Command, RequestFile},
	config::RuntimeConfig,
};
use clap::Parser;
use color_eyre::{
	eyre::{eyre, WrapErr},
	Result,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{fs, sync::Arc};
use substrate_connector_core::{
	chain::Client,
	credential::SigningCredential,
	keychain::MemoryKeychain,
	telemetry::{self, Metrics, NoopMetrics},
	types::{RunTransactionRequest, TransactionInfoRequest, TransferParams},
	utils::{default_subscriber, install_panic_hooks, json_subscriber},
	Connector,
};
use tracing::{error, info, span, Level};
use uuid::Uuid;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod cli;
mod config;

fn read_request<T: DeserializeOwned>(path: &str) -> Result<T> {
	let body = fs::read_to_string(path).wrap_err(format!("Failed to read request from {path}"))?;
	serde_json::from_str(&body).wrap_err(format!("Invalid request in {path}"))
}

fn to_json(response: impl Serialize) -> Result<Value> {
	serde_json::to_value(response).wrap_err("Failed to serialize response")
}

async fn execute(connector: &Connector, command: Command) -> Result<Value> {
	match command {
		Command::Transfer(RequestFile { request }) => {
			to_json(connector.run_transaction(&read_request(&request)?).await?)
		},
		Command::Submit { payload } => {
			let request = RunTransactionRequest {
				signing_credential: SigningCredential::PreSigned,
				transfer: None,
				pre_signed_payload: Some(payload),
			};
			to_json(connector.run_transaction(&request).await?)
		},
		Command::Deploy(RequestFile { request }) => {
			to_json(connector.deploy_contract(&read_request(&request)?).await?)
		},
		Command::Invoke(RequestFile { request }) => {
			to_json(connector.invoke_contract(&read_request(&request)?).await?)
		},
		Command::RawTransaction { to, value } => {
			to_json(connector.get_raw_transaction(&TransferParams { to, value }).await?)
		},
		Command::SignRaw(RequestFile { request }) => {
			to_json(connector.sign_raw_transaction(&read_request(&request)?).await?)
		},
		Command::TransactionInfo {
			account,
			validity_window,
		} => {
			let request = TransactionInfoRequest {
				account_address: account,
				validity_window,
			};
			to_json(connector.get_transaction_info(&request).await?)
		},
	}
}

async fn run(cfg: RuntimeConfig, command: Command, execution_id: Uuid) -> Result<()> {
	let version = clap::crate_version!();
	info!("Running Substrate Connector version: {version}.");

	let client = Client::new(cfg.node.clone());
	client
		.connect()
		.await
		.wrap_err("Unable to connect to the node")?;

	let ot_metrics = cfg
		.otel
		.clone()
		.map(|otel| {
			let attributes = vec![
				("version", version.to_string()),
				("execution_id", execution_id.to_string()),
			];
			telemetry::otlp::initialize(attributes, otel)
				.wrap_err("Unable to initialize OpenTelemetry service")
		})
		.transpose()?
		.map(Arc::new);
	let metrics: Arc<dyn Metrics> = match &ot_metrics {
		Some(ot_metrics) => ot_metrics.clone(),
		None => Arc::new(NoopMetrics),
	};

	let connector = Connector::new(
		Arc::new(client.clone()),
		Arc::new(MemoryKeychain::new(cfg.keychains)),
		metrics,
	);
	let response = execute(&connector, command).await;

	if let Some(ot_metrics) = ot_metrics {
		ot_metrics.shutdown();
	}
	client.disconnect().await;

	println!("{}", serde_json::to_string_pretty(&response?)?);
	Ok(())
}

pub fn load_runtime_config(opts: &CliOpts) -> Result<RuntimeConfig> {
	let mut cfg = if let Some(config_path) = &opts.config {
		fs::metadata(config_path).map_err(|_| eyre!("Provided config file doesn't exist."))?;
		confy::load_path(config_path)
			.wrap_err(format!("Failed to load configuration from {}", config_path))?
	} else {
		RuntimeConfig::default()
	};

	cfg.log_format_json = opts.logs_json || cfg.log_format_json;
	cfg.log_level = opts.verbosity.unwrap_or(cfg.log_level);

	// Flags override the config parameters
	if let Some(ws_endpoint) = &opts.ws_endpoint {
		cfg.node.ws_endpoint = ws_endpoint.clone();
	}

	Ok(cfg)
}

#[tokio::main]
pub async fn main() -> Result<()> {
	let opts = CliOpts::parse();
	let cfg = load_runtime_config(&opts)?;

	if cfg.log_format_json {
		tracing::subscriber::set_global_default(json_subscriber(cfg.log_level))?;
	} else {
		tracing::subscriber::set_global_default(default_subscriber(cfg.log_level))?;
	};

	// install custom panic hooks
	install_panic_hooks()?;

	let execution_id = Uuid::new_v4();
	let span = span!(Level::INFO, "run", execution_id = execution_id.to_string());
	// Do not enter span if logs format is not JSON
	let _enter = if cfg.log_format_json {
		Some(span.enter())
	} else {
		None
	};

	if let Err(error) = run(cfg, opts.command, execution_id).await {
		error!("{error:#}");
		return Err(error.wrap_err("Running Substrate Connector failed"));
	};
	Ok(())
}
