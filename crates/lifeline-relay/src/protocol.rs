//! Upstream subscription protocol: JSON-RPC 2.0 envelopes over the
//! provider's `transactionSubscribe` method.
//!
//! Inbound payloads are decoded into a closed set of typed messages at
//! this boundary. A payload that does not validate is an error the caller
//! logs and drops; it never produces a half-filled event.

use lifeline_types::WalletAddress;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
	#[error("invalid json: {0}")]
	Json(String),

	#[error("malformed {what}: {detail}")]
	Malformed {
		what: &'static str,
		detail: String,
	},
}

/// Builds the subscription request for one wallet address.
pub fn subscribe_request(id: u64, wallet: &WalletAddress) -> String {
	json!({
		"jsonrpc": "2.0",
		"id": id,
		"method": "transactionSubscribe",
		"params": [
			{
				"accountInclude": [wallet.as_str()],
				"failed": false
			},
			{
				"commitment": "confirmed",
				"encoding": "jsonParsed",
				"transactionDetails": "full",
				"maxSupportedTransactionVersion": 0
			}
		]
	})
	.to_string()
}

/// Messages the provider sends us.
#[derive(Debug)]
pub enum Inbound {
	/// Acknowledgment of a subscribe request.
	SubscriptionAck { id: u64, subscription: u64 },
	/// A transaction touching a subscribed address.
	Transaction(TransactionNotification),
	/// Anything else the provider emits that we do not consume.
	Unhandled,
}

#[derive(Debug, Deserialize)]
pub struct TransactionNotification {
	transaction: TransactionEnvelope,
}

#[derive(Debug, Deserialize)]
struct TransactionEnvelope {
	#[serde(default)]
	meta: Option<TransactionMeta>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionMeta {
	#[serde(default)]
	post_token_balances: Vec<TokenBalance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenBalance {
	mint: String,
	#[serde(default)]
	owner: Option<String>,
	ui_token_amount: UiTokenAmount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiTokenAmount {
	ui_amount_string: String,
}

/// A deposit observed in a transaction's post-balances.
#[derive(Debug, Clone, PartialEq)]
pub struct Deposit {
	pub wallet: WalletAddress,
	pub amount: Decimal,
}

pub fn parse_inbound(text: &str) -> Result<Inbound, ProtocolError> {
	let value: Value =
		serde_json::from_str(text).map_err(|e| ProtocolError::Json(e.to_string()))?;

	if let Some(method) = value.get("method").and_then(Value::as_str) {
		if method != "transactionNotification" {
			return Ok(Inbound::Unhandled);
		}
		let result = value
			.pointer("/params/result")
			.cloned()
			.ok_or(ProtocolError::Malformed {
				what: "transaction notification",
				detail: "missing params.result".to_string(),
			})?;
		let notification: TransactionNotification =
			serde_json::from_value(result).map_err(|e| ProtocolError::Malformed {
				what: "transaction notification",
				detail: e.to_string(),
			})?;
		return Ok(Inbound::Transaction(notification));
	}

	if let (Some(id), Some(subscription)) = (
		value.get("id").and_then(Value::as_u64),
		value.get("result").and_then(Value::as_u64),
	) {
		return Ok(Inbound::SubscriptionAck { id, subscription });
	}

	Ok(Inbound::Unhandled)
}

impl TransactionNotification {
	/// Extracts the deposits for `mint` from the post-transaction token
	/// balances: one entry per matching balance with a resolvable owner.
	///
	/// Entries for other mints are ignored; a matching entry that cannot
	/// be resolved (bad owner, unparseable amount) fails the whole
	/// notification.
	pub fn deposits(&self, mint: &str) -> Result<Vec<Deposit>, ProtocolError> {
		let Some(meta) = &self.transaction.meta else {
			return Ok(Vec::new());
		};

		let mut deposits = Vec::new();
		for balance in &meta.post_token_balances {
			if balance.mint != mint {
				continue;
			}
			let Some(owner) = &balance.owner else {
				continue;
			};
			let wallet =
				WalletAddress::new(owner.clone()).map_err(|e| ProtocolError::Malformed {
					what: "token balance owner",
					detail: e.to_string(),
				})?;
			let amount = balance
				.ui_token_amount
				.ui_amount_string
				.parse::<Decimal>()
				.map_err(|e| ProtocolError::Malformed {
					what: "token balance amount",
					detail: e.to_string(),
				})?;
			deposits.push(Deposit { wallet, amount });
		}

		Ok(deposits)
	}
}
