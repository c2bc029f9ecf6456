//! Chain RPC seam and the production client over solana-client.

use async_trait::async_trait;
use lifeline_types::TransferError;
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

/// Chain operations the transfer service needs, at confirmed commitment.
#[async_trait]
pub trait ChainClient: Send + Sync {
	async fn account_exists(&self, address: &Pubkey) -> Result<bool, TransferError>;

	async fn latest_blockhash(&self) -> Result<Hash, TransferError>;

	async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, TransferError>;

	/// `None` while the network has not yet reported the signature,
	/// `Some(Err)` when the transaction landed but failed.
	async fn signature_status(
		&self,
		signature: &Signature,
	) -> Result<Option<Result<(), String>>, TransferError>;
}

pub struct RpcChainClient {
	rpc: RpcClient,
	commitment: CommitmentConfig,
}

impl RpcChainClient {
	pub fn new(rpc_url: impl Into<String>) -> Self {
		let commitment = CommitmentConfig::confirmed();
		Self {
			rpc: RpcClient::new_with_commitment(rpc_url.into(), commitment),
			commitment,
		}
	}
}

fn map_rpc_error(error: ClientError) -> TransferError {
	let message = error.to_string();
	if message.contains("insufficient") {
		TransferError::InsufficientFunds
	} else {
		TransferError::Rpc(message)
	}
}

#[async_trait]
impl ChainClient for RpcChainClient {
	async fn account_exists(&self, address: &Pubkey) -> Result<bool, TransferError> {
		let response = self
			.rpc
			.get_account_with_commitment(address, self.commitment)
			.await
			.map_err(map_rpc_error)?;
		Ok(response.value.is_some())
	}

	async fn latest_blockhash(&self) -> Result<Hash, TransferError> {
		self.rpc.get_latest_blockhash().await.map_err(map_rpc_error)
	}

	async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, TransferError> {
		self.rpc.send_transaction(tx).await.map_err(map_rpc_error)
	}

	async fn signature_status(
		&self,
		signature: &Signature,
	) -> Result<Option<Result<(), String>>, TransferError> {
		let response = self
			.rpc
			.get_signature_statuses(&[*signature])
			.await
			.map_err(map_rpc_error)?;

		Ok(match response.value.first() {
			Some(Some(status)) => {
				if let Some(err) = &status.err {
					Some(Err(err.to_string()))
				} else if status.satisfies_commitment(self.commitment) {
					Some(Ok(()))
				} else {
					None
				}
			}
			_ => None,
		})
	}
}
