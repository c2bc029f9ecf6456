//! Transfer transaction assembly.
//!
//! Token accounts are derived deterministically from wallet + mint. When
//! the recipient has no token account yet, its creation rides in the same
//! transaction (funded by the sender) so a first-time recipient costs one
//! round trip, not two.

use lifeline_types::{usdc, TransferError};
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;

/// Builds the instruction sequence for one USDC transfer: an optional
/// recipient token-account creation followed by exactly one transfer of
/// `base_units`.
pub fn build_transfer(
	sender: &Pubkey,
	recipient: &Pubkey,
	mint: &Pubkey,
	base_units: u64,
	create_recipient_account: bool,
) -> Result<Vec<Instruction>, TransferError> {
	let source = get_associated_token_address(sender, mint);
	let destination = get_associated_token_address(recipient, mint);

	let mut instructions = Vec::with_capacity(2);
	if create_recipient_account {
		// Idempotent: does not fail if the account appears between our
		// existence check and execution.
		instructions.push(create_associated_token_account_idempotent(
			sender,
			recipient,
			mint,
			&spl_token::id(),
		));
	}

	instructions.push(
		spl_token::instruction::transfer_checked(
			&spl_token::id(),
			&source,
			mint,
			&destination,
			sender,
			&[],
			base_units,
			usdc::DECIMALS as u8,
		)
		.map_err(|e| TransferError::Rpc(e.to_string()))?,
	);

	Ok(instructions)
}
