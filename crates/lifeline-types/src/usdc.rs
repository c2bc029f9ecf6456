//! USDC amount handling.
//!
//! Donation amounts are USD-denominated decimals; on chain they move as
//! integer base units of a 6-decimal token. The conversion must be exact:
//! any value with at most [`DECIMALS`] fractional digits maps to base
//! units without rounding.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::errors::AmountError;

/// Decimal places of the stablecoin mint.
pub const DECIMALS: u32 = 6;

/// Converts a decimal USD amount into token base units (amount x 10^6).
pub fn to_base_units(amount: Decimal) -> Result<u64, AmountError> {
	if amount.is_sign_negative() && !amount.is_zero() {
		return Err(AmountError::Negative);
	}
	let scaled = amount
		.checked_mul(Decimal::from(10u64.pow(DECIMALS)))
		.ok_or(AmountError::Overflow)?;
	if !scaled.fract().is_zero() {
		return Err(AmountError::TooPrecise { max: DECIMALS });
	}
	scaled.to_u64().ok_or(AmountError::Overflow)
}

#[cfg(test)]
mod tests {
	use std::str::FromStr;

	use super::*;

	#[test]
	fn converts_whole_amounts() {
		assert_eq!(to_base_units(Decimal::from(10)).unwrap(), 10_000_000);
	}

	#[test]
	fn converts_fractional_amounts_exactly() {
		let amount = Decimal::from_str("42.50").unwrap();
		assert_eq!(to_base_units(amount).unwrap(), 42_500_000);
	}

	#[test]
	fn converts_six_decimal_places() {
		let amount = Decimal::from_str("0.000001").unwrap();
		assert_eq!(to_base_units(amount).unwrap(), 1);
	}

	#[test]
	fn rejects_seven_decimal_places() {
		let amount = Decimal::from_str("1.0000001").unwrap();
		assert_eq!(
			to_base_units(amount),
			Err(AmountError::TooPrecise { max: 6 })
		);
	}

	#[test]
	fn rejects_negative_amounts() {
		let amount = Decimal::from_str("-5").unwrap();
		assert_eq!(to_base_units(amount), Err(AmountError::Negative));
	}

	#[test]
	fn rejects_amounts_past_u64() {
		let amount = Decimal::from_str("20000000000000").unwrap();
		assert_eq!(to_base_units(amount), Err(AmountError::Overflow));
	}
}
