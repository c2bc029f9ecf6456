//! Transfer Submission: build, sign, submit and confirm a single USDC
//! transfer from the donor wallet to the fundraiser wallet.
//!
//! Steps run strictly in sequence (derive accounts, check recipient
//! account, build, blockhash, sign, submit, confirm); any failure aborts
//! the attempt and leaves no partial state. Retry is the caller's call.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lifeline_types::{
	usdc, AddressError, AmountError, TransferError, TransferReceipt, TransferSubmitter,
	WalletAddress,
};
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use spl_associated_token_account::get_associated_token_address;
use tokio::time::Instant;
use tracing::{debug, info};

mod chain;
mod instructions;
mod signer;

pub use chain::{ChainClient, RpcChainClient};
pub use instructions::build_transfer;
pub use signer::{KeypairSigner, WalletSigner};

pub struct TransferService {
	signer: Arc<dyn WalletSigner>,
	chain: Arc<dyn ChainClient>,
	usdc_mint: Pubkey,
	confirmation_timeout: Duration,
	confirmation_poll: Duration,
}

impl TransferService {
	pub fn new(
		signer: Arc<dyn WalletSigner>,
		chain: Arc<dyn ChainClient>,
		usdc_mint: Pubkey,
		confirmation_timeout: Duration,
		confirmation_poll: Duration,
	) -> Self {
		Self {
			signer,
			chain,
			usdc_mint,
			confirmation_timeout,
			confirmation_poll,
		}
	}

	async fn await_confirmation(&self, signature: &Signature) -> Result<(), TransferError> {
		let deadline = Instant::now() + self.confirmation_timeout;

		loop {
			match self.chain.signature_status(signature).await {
				Ok(Some(Ok(()))) => {
					info!(signature = %signature, "transfer confirmed");
					return Ok(());
				}
				Ok(Some(Err(reason))) => {
					return Err(TransferError::TransactionFailed {
						signature: signature.to_string(),
						reason,
					});
				}
				Ok(None) => {
					debug!(signature = %signature, "transfer not yet confirmed");
				}
				Err(e) => {
					// Transient status-poll failure; the deadline bounds it.
					debug!(signature = %signature, error = %e, "status poll failed");
				}
			}

			if Instant::now() >= deadline {
				return Err(TransferError::ConfirmationTimeout {
					signature: signature.to_string(),
					timeout_secs: self.confirmation_timeout.as_secs(),
				});
			}
			tokio::time::sleep(self.confirmation_poll).await;
		}
	}
}

#[async_trait]
impl TransferSubmitter for TransferService {
	fn wallet_connected(&self) -> bool {
		self.signer.is_connected()
	}

	fn wallet_address(&self) -> Option<WalletAddress> {
		self.signer
			.pubkey()
			.and_then(|pk| WalletAddress::new(pk.to_string()).ok())
	}

	async fn submit_usdc_transfer(
		&self,
		recipient: &WalletAddress,
		amount: Decimal,
	) -> Result<TransferReceipt, TransferError> {
		let sender = self
			.signer
			.pubkey()
			.ok_or(TransferError::WalletNotConnected)?;

		let base_units = usdc::to_base_units(amount)?;
		if base_units == 0 {
			return Err(AmountError::Zero.into());
		}

		let recipient_pk = Pubkey::from_str(recipient.as_str())
			.map_err(|_| AddressError::NotBase58(recipient.to_string()))?;

		let destination = get_associated_token_address(&recipient_pk, &self.usdc_mint);
		let create_recipient_account = !self.chain.account_exists(&destination).await?;

		let instructions = instructions::build_transfer(
			&sender,
			&recipient_pk,
			&self.usdc_mint,
			base_units,
			create_recipient_account,
		)?;

		let mut tx = Transaction::new_with_payer(&instructions, Some(&sender));
		let blockhash = self.chain.latest_blockhash().await?;

		// Suspends until the wallet approves or rejects.
		self.signer.sign_transaction(&mut tx, blockhash).await?;

		let signature = self.chain.send_transaction(&tx).await?;
		info!(
			signature = %signature,
			recipient = %recipient,
			base_units,
			create_recipient_account,
			"transfer submitted"
		);

		self.await_confirmation(&signature).await?;

		Ok(TransferReceipt {
			signature: signature.to_string(),
			recipient_account_created: create_recipient_account,
		})
	}
}
