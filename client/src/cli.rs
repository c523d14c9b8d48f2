use clap::{command, Args, Parser, Subcommand};
use tracing::Level;

#[derive(Parser)]
#[command(version)]
pub struct CliOpts {
	/// Path to the toml configuration file
	#[arg(short, long, value_name = "FILE")]
	pub config: Option<String>,
	/// Log level
	#[arg(long)]
	pub verbosity: Option<Level>,
	/// Set logs format to JSON
	#[arg(long)]
	pub logs_json: bool,
	/// WebSocket endpoint of the full node, overrides the configuration file
	#[arg(long, value_name = "URL")]
	pub ws_endpoint: Option<String>,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Args, Debug)]
pub struct RequestFile {
	/// Path to the JSON request body
	#[arg(short, long, value_name = "FILE")]
	pub request: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Submit a balance transfer signed with the request's credential
	Transfer(RequestFile),
	/// Broadcast an extrinsic signed elsewhere
	Submit {
		/// Hex encoded signed extrinsic
		#[arg(long, value_name = "HEX")]
		payload: String,
	},
	/// Deploy an ink! contract
	Deploy(RequestFile),
	/// Send a message to a contract or query it
	Invoke(RequestFile),
	/// Build an unsigned transfer call
	RawTransaction {
		/// Recipient address, SS58 or hex public key
		#[arg(long)]
		to: String,
		/// Amount in the chain's smallest unit
		#[arg(long)]
		value: u128,
	},
	/// Sign a raw call offline with given nonce and era
	SignRaw(RequestFile),
	/// Nonce, latest block hash and era for offline signing
	TransactionInfo {
		/// Account address, SS58 or hex public key
		#[arg(long)]
		account: String,
		/// Blocks the transaction stays valid for
		#[arg(long)]
		validity_window: Option<u64>,
	},
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_global_flags_and_subcommand() {
		let opts = CliOpts::try_parse_from([
			"substrate-connector",
			"--verbosity",
			"debug",
			"--ws-endpoint",
			"ws://node:9944",
			"transaction-info",
			"--account",
			"5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY",
			"--validity-window",
			"64",
		])
		.unwrap();
		assert_eq!(opts.verbosity, Some(Level::DEBUG));
		assert_eq!(opts.ws_endpoint.as_deref(), Some("ws://node:9944"));
		assert!(matches!(
			opts.command,
			Command::TransactionInfo {
				validity_window: Some(64),
				..
			}
		));
	}

	#[test]
	fn request_file_is_required() {
		assert!(CliOpts::try_parse_from(["substrate-connector", "deploy"]).is_err());
		let opts =
			CliOpts::try_parse_from(["substrate-connector", "deploy", "--request", "deploy.json"])
				.unwrap();
		assert!(matches!(opts.command, Command::Deploy(RequestFile { request }) if request == "deploy.json"));
	}
}
