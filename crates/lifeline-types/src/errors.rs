//! Error types shared across the lifeline seams.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AddressError {
	#[error("not a base58 string: {0}")]
	NotBase58(String),

	#[error("{address} decodes to {len} bytes, expected 32")]
	WrongLength { address: String, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
	#[error("amount must not be negative")]
	Negative,

	#[error("amount must be greater than zero")]
	Zero,

	#[error("amount has more than {max} decimal places")]
	TooPrecise { max: u32 },

	#[error("amount does not fit in token base units")]
	Overflow,
}

/// Failures talking to the platform backend.
///
/// `Timeout` is distinct from `Network` so callers can decide to prompt a
/// retry; no layer below the user retries automatically.
#[derive(Debug, Error)]
pub enum BackendError {
	#[error("backend request timed out")]
	Timeout,

	#[error("backend returned {status}: {message}")]
	Api { status: u16, message: String },

	#[error("backend network error: {0}")]
	Network(String),

	#[error("invalid backend response: {0}")]
	Decode(String),
}

/// Failures submitting or confirming an on-chain transfer.
#[derive(Debug, Error)]
pub enum TransferError {
	#[error("no wallet connected")]
	WalletNotConnected,

	#[error("wallet rejected the transaction: {0}")]
	WalletRejected(String),

	#[error(transparent)]
	Amount(#[from] AmountError),

	#[error(transparent)]
	Address(#[from] AddressError),

	#[error("insufficient funds")]
	InsufficientFunds,

	#[error("chain rpc error: {0}")]
	Rpc(String),

	#[error("transaction {signature} failed on chain: {reason}")]
	TransactionFailed { signature: String, reason: String },

	#[error("transaction {signature} not confirmed within {timeout_secs}s")]
	ConfirmationTimeout { signature: String, timeout_secs: u64 },
}
