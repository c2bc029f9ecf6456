//! Seam traits the donation flow is driven through.
//!
//! The flow never talks to reqwest or the chain directly; it sees these
//! two capabilities. Production implementations live in lifeline-backend
//! and lifeline-transfer, tests substitute mocks.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::common::WalletAddress;
use crate::donation::{DonationCheck, DonationIntent};
use crate::errors::{BackendError, TransferError};

/// The platform backend, source of truth for donation state.
#[async_trait]
pub trait DonationBackend: Send + Sync {
	/// Fetches the pending donation by its opaque id.
	async fn donation_info(&self, donate_id: &str) -> Result<DonationIntent, BackendError>;

	/// Asks the backend to verify and finalize the donation.
	async fn check_donation(&self, donate_id: &str) -> Result<DonationCheck, BackendError>;
}

/// The wallet-signed transfer capability.
#[async_trait]
pub trait TransferSubmitter: Send + Sync {
	fn wallet_connected(&self) -> bool;

	fn wallet_address(&self) -> Option<WalletAddress>;

	/// Builds, signs, submits and confirms a USDC transfer to `recipient`.
	///
	/// Suspends through wallet approval and on-chain confirmation; any
	/// failure aborts the attempt without partial state.
	async fn submit_usdc_transfer(
		&self,
		recipient: &WalletAddress,
		amount: Decimal,
	) -> Result<TransferReceipt, TransferError>;
}

/// Outcome of a confirmed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
	pub signature: String,
	/// Whether the recipient's token account was created in the same
	/// transaction.
	pub recipient_account_created: bool,
}
