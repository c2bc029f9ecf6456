use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::WalletAddress;

/// A pending donation issued by the backend, identified by an opaque id.
///
/// Immutable from this side until the backend marks it paid; the flow
/// fetches it once at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationIntent {
	pub donate_id: String,
	/// The fundraiser's receiving wallet.
	pub wallet_address: WalletAddress,
	/// USD-denominated amount, paid in the stablecoin token.
	pub amount: Decimal,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub email: Option<String>,
	#[serde(default)]
	pub note: Option<String>,
	#[serde(default)]
	pub anonymous: bool,
	#[serde(default)]
	pub fundraiser: Option<FundraiserSummary>,
}

/// The slice of fundraiser data cached for the post-payment redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundraiserSummary {
	pub id: String,
	pub title: String,
	#[serde(default)]
	pub image: Option<String>,
}

/// Result of the backend's payment verification call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationCheck {
	pub success: bool,
	#[serde(default)]
	pub message: Option<String>,
}

#[cfg(test)]
mod tests {
	use std::str::FromStr;

	use super::*;

	#[test]
	fn decodes_backend_intent_payload() {
		let intent: DonationIntent = serde_json::from_value(serde_json::json!({
			"donateId": "d-123",
			"walletAddress": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
			"amount": 42.5,
			"name": "Ada",
			"anonymous": false,
			"fundraiser": { "id": "f-9", "title": "Flood relief" }
		}))
		.unwrap();

		assert_eq!(intent.donate_id, "d-123");
		assert_eq!(intent.amount, Decimal::from_str("42.5").unwrap());
		assert_eq!(intent.fundraiser.unwrap().id, "f-9");
		assert_eq!(intent.note, None);
	}

	#[test]
	fn rejects_invalid_wallet_in_payload() {
		let result: Result<DonationIntent, _> = serde_json::from_value(serde_json::json!({
			"donateId": "d-123",
			"walletAddress": "bogus",
			"amount": 1,
		}));
		assert!(result.is_err());
	}
}
