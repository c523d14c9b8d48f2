//! Chain state needed to sign a transaction offline.
use crate::{
	chain::ChainClient,
	error::{Error, Result},
	types::{parse_account, HexBytes},
};
use serde::{Deserialize, Serialize};
use sp_core::H256;
use tracing::debug;

pub const DEFAULT_VALIDITY_WINDOW: u64 = 50;

/// Largest window whose era phase is not quantized, so the era is born at `current`.
pub const MAX_VALIDITY_WINDOW: u64 = 1 << 12;

const MIN_PERIOD: u64 = 4;
const MAX_PERIOD: u64 = 1 << 16;

/// Mortal era anchored at `current`, valid for `period` blocks.
///
/// The encoded form rounds the period up to the next power of two, so a
/// window of 50 blocks is encoded as 64.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraWindow {
	pub current: u64,
	pub period: u64,
}

impl EraWindow {
	pub fn new(current: u64, period: u64) -> Self {
		Self { current, period }
	}

	pub fn encoded_period(&self) -> u64 {
		self.period
			.checked_next_power_of_two()
			.unwrap_or(MAX_PERIOD)
			.clamp(MIN_PERIOD, MAX_PERIOD)
	}

	fn quantize_factor(period: u64) -> u64 {
		(period >> 12).max(1)
	}

	pub fn phase(&self) -> u64 {
		let period = self.encoded_period();
		let quantize_factor = Self::quantize_factor(period);
		self.current % period / quantize_factor * quantize_factor
	}

	/// First block in which a transaction signed with this era is valid.
	pub fn birth(&self) -> u64 {
		let period = self.encoded_period();
		let phase = self.phase();
		(self.current.max(phase) - phase) / period * period + phase
	}

	/// First block in which a transaction signed with this era is no longer valid.
	pub fn death(&self) -> u64 {
		self.birth() + self.encoded_period()
	}

	pub fn encode(&self) -> [u8; 2] {
		let period = self.encoded_period();
		let quantize_factor = Self::quantize_factor(period);
		let low = (period.trailing_zeros() - 1).clamp(1, 15) as u16;
		let high = (self.phase() / quantize_factor) << 4;
		(low | high as u16).to_le_bytes()
	}

	/// Rejects windows that cannot be signed against the block at `current`.
	pub fn validate(&self) -> Result<()> {
		if self.period == 0 {
			return Err(Error::InvalidRequest(
				"Validity window must be at least one block".to_string(),
			));
		}
		if self.period > MAX_VALIDITY_WINDOW {
			return Err(Error::InvalidRequest(format!(
				"Validity window must not exceed {MAX_VALIDITY_WINDOW} blocks"
			)));
		}
		Ok(())
	}

	/// Returns `(period, phase)` of an encoded mortal era.
	pub fn decode(encoded: [u8; 2]) -> (u64, u64) {
		let encoded = u16::from_le_bytes(encoded) as u64;
		let period = 2 << (encoded % (1 << 4));
		let quantize_factor = Self::quantize_factor(period);
		let phase = (encoded >> 4) * quantize_factor;
		(period, phase)
	}
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
	pub nonce: u64,
	pub block_hash: H256,
	pub era: EraWindow,
	pub encoded_era: HexBytes,
}

/// Collects nonce, latest block hash and era for offline signing.
pub async fn get_info<C: ChainClient + ?Sized>(
	chain: &C,
	account_address: &str,
	validity_window: Option<u64>,
) -> Result<TransactionInfo> {
	let validity_window = validity_window.unwrap_or(DEFAULT_VALIDITY_WINDOW);
	EraWindow::new(0, validity_window).validate()?;
	let account = parse_account(account_address)?;

	let block = chain.latest_block().await?;
	let nonce = chain.account_nonce(&account).await?;
	let era = EraWindow::new(block.number, validity_window);
	debug!(nonce, block_number = block.number, validity_window, "Transaction info");

	Ok(TransactionInfo {
		nonce,
		block_hash: block.hash,
		era,
		encoded_era: HexBytes(era.encode().to_vec()),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::chain::{BlockRef, MockChainClient};
	use proptest::prelude::*;
	use test_case::test_case;

	const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";

	fn chain_at(number: u64) -> MockChainClient {
		let mut chain = MockChainClient::new();
		chain.expect_latest_block().returning(move || {
			Ok(BlockRef {
				number,
				hash: H256::repeat_byte(9),
			})
		});
		chain.expect_account_nonce().returning(|_| Ok(7));
		chain
	}

	#[test_case(42, 64 => [0xa5, 0x02] ; "window of 64 at block 42")]
	#[test_case(0, 4 => [0x01, 0x00] ; "minimal window")]
	#[test_case(1000, 50 => [0x85, 0x02] ; "window of 50 rounds to 64")]
	fn era_encoding(current: u64, period: u64) -> [u8; 2] {
		EraWindow::new(current, period).encode()
	}

	#[test]
	fn era_window_bounds_validity() {
		let era = EraWindow::new(1000, 50);
		assert_eq!(era.encoded_period(), 64);
		assert_eq!(era.birth(), 1000);
		assert_eq!(era.death(), 1064);
	}

	#[tokio::test]
	async fn info_uses_default_window() {
		let info = get_info(&chain_at(1000), ALICE, None).await.unwrap();
		assert_eq!(info.nonce, 7);
		assert_eq!(info.block_hash, H256::repeat_byte(9));
		assert_eq!(info.era, EraWindow::new(1000, DEFAULT_VALIDITY_WINDOW));
		assert_eq!(EraWindow::decode([info.encoded_era.0[0], info.encoded_era.0[1]]).0, 64);
	}

	#[tokio::test]
	async fn window_only_changes_era() {
		let chain = chain_at(5000);
		let short = get_info(&chain, ALICE, Some(50)).await.unwrap();
		let long = get_info(&chain, ALICE, Some(500)).await.unwrap();
		assert_eq!(short.nonce, long.nonce);
		assert_eq!(short.block_hash, long.block_hash);
		assert_ne!(short.encoded_era, long.encoded_era);
		assert_eq!(long.era.encoded_period(), 512);
	}

	#[tokio::test]
	async fn invalid_requests_are_rejected_before_querying() {
		let chain = MockChainClient::new();
		assert!(matches!(
			get_info(&chain, ALICE, Some(0)).await,
			Err(Error::InvalidRequest(_))
		));
		assert!(matches!(
			get_info(&chain, ALICE, Some(MAX_VALIDITY_WINDOW + 1)).await,
			Err(Error::InvalidRequest(_))
		));
		assert!(matches!(
			get_info(&chain, "nope", None).await,
			Err(Error::InvalidAddress(_))
		));
	}

	#[test_case(0 ; "first block")]
	#[test_case(4095 ; "just before a period boundary")]
	#[test_case(1_234_567 ; "far into the chain")]
	fn largest_window_is_born_at_current(current: u64) {
		let era = EraWindow::new(current, MAX_VALIDITY_WINDOW);
		era.validate().unwrap();
		assert_eq!(era.birth(), current);
		assert_eq!(era.death(), current + MAX_VALIDITY_WINDOW);
	}

	#[test]
	fn quantized_windows_are_rejected() {
		let era = EraWindow::new(1_234_567, 5000);
		assert_ne!(era.birth(), 1_234_567);
		assert!(matches!(era.validate(), Err(Error::InvalidRequest(_))));
	}

	proptest! {
		#[test]
		fn accepted_windows_are_born_at_current(current in 0u64..10_000_000, period in 1u64..=MAX_VALIDITY_WINDOW) {
			let era = EraWindow::new(current, period);
			prop_assert!(era.validate().is_ok());
			prop_assert_eq!(era.birth(), current);
		}


		#[test]
		fn encoded_era_round_trips(current in 0u64..10_000_000, period in 1u64..100_000) {
			let era = EraWindow::new(current, period);
			let (decoded_period, decoded_phase) = EraWindow::decode(era.encode());
			prop_assert_eq!(decoded_period, era.encoded_period());
			prop_assert_eq!(decoded_phase, era.phase());
			prop_assert!(era.birth() <= current);
			prop_assert!(current < era.death());
		}
	}
}
