//! Wallet signing seam.
//!
//! The signing capability is pre-built (a local keypair here, a remote
//! wallet in other deployments); the transfer service only depends on the
//! trait. Signing suspends until the wallet approves or rejects.

use async_trait::async_trait;
use lifeline_types::TransferError;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;

#[async_trait]
pub trait WalletSigner: Send + Sync {
	fn is_connected(&self) -> bool;

	fn pubkey(&self) -> Option<Pubkey>;

	/// Signs the transaction in place, setting the recent blockhash.
	async fn sign_transaction(
		&self,
		tx: &mut Transaction,
		recent_blockhash: Hash,
	) -> Result<(), TransferError>;
}

/// Signer backed by a locally held keypair.
pub struct KeypairSigner {
	keypair: Keypair,
}

impl KeypairSigner {
	pub fn new(keypair: Keypair) -> Self {
		Self { keypair }
	}
}

#[async_trait]
impl WalletSigner for KeypairSigner {
	fn is_connected(&self) -> bool {
		true
	}

	fn pubkey(&self) -> Option<Pubkey> {
		Some(self.keypair.pubkey())
	}

	async fn sign_transaction(
		&self,
		tx: &mut Transaction,
		recent_blockhash: Hash,
	) -> Result<(), TransferError> {
		tx.try_sign(&[&self.keypair], recent_blockhash)
			.map_err(|e| TransferError::WalletRejected(e.to_string()))
	}
}
