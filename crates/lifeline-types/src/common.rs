use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::AddressError;

/// A base58-encoded Solana wallet address.
///
/// Validated on construction: the string must decode to exactly 32 bytes.
/// Derived token accounts are not wallet addresses for our purposes; the
/// relay and the transfer service both key on the owning wallet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
	pub fn new(address: impl Into<String>) -> Result<Self, AddressError> {
		let address = address.into();
		let decoded = bs58::decode(&address)
			.into_vec()
			.map_err(|_| AddressError::NotBase58(address.clone()))?;
		if decoded.len() != 32 {
			return Err(AddressError::WrongLength {
				address,
				len: decoded.len(),
			});
		}
		Ok(Self(address))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for WalletAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for WalletAddress {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl TryFrom<String> for WalletAddress {
	type Error = AddressError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl From<WalletAddress> for String {
	fn from(value: WalletAddress) -> Self {
		value.0
	}
}
