use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::WalletAddress;

/// Events the relay pushes to downstream wallet listeners.
///
/// A closed set: the provider payload is decoded and validated before any
/// of these is constructed, so consumers never see partial fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
	UsdcDeposit {
		wallet: WalletAddress,
		/// Human-readable token amount as reported by the provider.
		amount: Decimal,
	},
}
