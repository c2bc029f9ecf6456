//! Shared types for the lifeline payment system.
//!
//! This crate holds the domain types exchanged between the relay, the
//! transfer service, and the donation flow, the seam traits the flow is
//! driven through, and the error enums shared across those seams.

pub mod common;
pub mod donation;
pub mod errors;
pub mod events;
pub mod traits;
pub mod usdc;

pub use common::WalletAddress;
pub use donation::{DonationCheck, DonationIntent, FundraiserSummary};
pub use errors::{AddressError, AmountError, BackendError, TransferError};
pub use events::RelayEvent;
pub use traits::{DonationBackend, TransferReceipt, TransferSubmitter};
