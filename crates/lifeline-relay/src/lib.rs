//! Chain Notification Relay.
//!
//! One upstream subscription feed from the RPC provider, fanned out to
//! many downstream per-wallet listeners. The relay owns all of its state:
//! a tracked-address set that survives reconnects and a per-wallet client
//! registry that lives and dies with downstream connections.
//!
//! The relay is a best-effort notifier. Backend verification remains the
//! source of truth for crediting funds; consumers watch [`RelayHealth`]
//! to know when the feed is degraded.

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use lifeline_types::{RelayEvent, WalletAddress};
use tokio::sync::{mpsc, watch, Mutex};
use tokio_tungstenite::connect_async;
use tracing::{debug, error, info, warn};

mod connection;
mod protocol;
mod state;

pub use protocol::{Deposit, ProtocolError};
pub use state::{ClientId, RelayState};

use connection::{SessionEnd, UpstreamCommand};

/// Observable condition of the upstream feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayHealth {
	/// First connection attempt in progress.
	Connecting,
	/// Upstream socket is live.
	Connected,
	/// Upstream lost; reconnecting with backoff.
	Degraded,
	/// Retry budget exhausted. Terminal.
	Failed,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
	pub ws_url: String,
	pub usdc_mint: String,
	pub reconnect_initial: Duration,
	pub reconnect_max: Duration,
	/// Total time to keep retrying a down upstream before giving up.
	/// `None` retries forever.
	pub give_up_after: Option<Duration>,
}

/// Handle to the relay. Cheap to clone; all clones share one upstream
/// connection and one state.
#[derive(Clone)]
pub struct Relay {
	state: Arc<Mutex<RelayState>>,
	commands: mpsc::UnboundedSender<UpstreamCommand>,
	health: watch::Receiver<RelayHealth>,
}

impl Relay {
	/// Spawns the upstream supervisor and returns the handle.
	pub fn spawn(config: RelayConfig) -> Self {
		let state = Arc::new(Mutex::new(RelayState::new()));
		let (command_tx, command_rx) = mpsc::unbounded_channel();
		let (health_tx, health_rx) = watch::channel(RelayHealth::Connecting);

		tokio::spawn(supervise(config, state.clone(), command_rx, health_tx));

		Self {
			state,
			commands: command_tx,
			health: health_rx,
		}
	}

	/// Ensures an upstream subscription exists for `wallet`. Idempotent:
	/// repeated calls for the same address produce at most one upstream
	/// subscribe request.
	pub async fn subscribe_to_wallet(&self, wallet: WalletAddress) {
		let newly_tracked = self.state.lock().await.track(wallet.clone());
		if newly_tracked {
			// If the session is down, the replay on the next connect
			// covers it; the send failing is not an error.
			let _ = self.commands.send(UpstreamCommand::Subscribe(wallet));
		}
	}

	/// Registers a downstream listener for `wallet` and returns its id
	/// together with the event stream.
	pub async fn add_client(
		&self,
		wallet: WalletAddress,
	) -> (ClientId, mpsc::UnboundedReceiver<RelayEvent>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let id = self.state.lock().await.register_client(wallet, tx);
		(id, rx)
	}

	/// Drops a downstream listener; the upstream subscription stays.
	pub async fn remove_client(&self, wallet: &WalletAddress, id: ClientId) {
		self.state.lock().await.unregister_client(wallet, id);
	}

	pub fn health(&self) -> RelayHealth {
		*self.health.borrow()
	}

	pub fn health_stream(&self) -> watch::Receiver<RelayHealth> {
		self.health.clone()
	}
}

fn reconnect_backoff(config: &RelayConfig) -> ExponentialBackoff {
	backoff::ExponentialBackoffBuilder::new()
		.with_initial_interval(config.reconnect_initial)
		.with_max_interval(config.reconnect_max)
		.with_max_elapsed_time(config.give_up_after)
		.build()
}

async fn supervise(
	config: RelayConfig,
	state: Arc<Mutex<RelayState>>,
	mut commands: mpsc::UnboundedReceiver<UpstreamCommand>,
	health: watch::Sender<RelayHealth>,
) {
	let mut backoff = reconnect_backoff(&config);
	let mut request_id = 0u64;

	loop {
		match connect_async(config.ws_url.as_str()).await {
			Ok((socket, _response)) => {
				info!(url = %config.ws_url, "upstream connected");
				health.send_replace(RelayHealth::Connected);
				backoff.reset();

				let result = connection::run_connection(
					socket,
					&state,
					&mut commands,
					&config.usdc_mint,
					&mut request_id,
				)
				.await;

				match result {
					Ok(SessionEnd::CommandsClosed) => {
						debug!("all relay handles dropped, stopping upstream supervisor");
						return;
					}
					Ok(SessionEnd::SocketClosed) => warn!("upstream session ended"),
					Err(e) => warn!(error = %e, "upstream session failed"),
				}
			}
			Err(e) => warn!(url = %config.ws_url, error = %e, "upstream connect failed"),
		}

		health.send_replace(RelayHealth::Degraded);
		match backoff.next_backoff() {
			Some(delay) => {
				debug!(delay_ms = delay.as_millis() as u64, "scheduling reconnect");
				tokio::time::sleep(delay).await;
			}
			None => {
				error!(
					give_up_after_secs = config.give_up_after.map(|d| d.as_secs()),
					"upstream retry budget exhausted, relay failed"
				);
				health.send_replace(RelayHealth::Failed);
				return;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn health_serializes_snake_case() {
		assert_eq!(
			serde_json::to_value(RelayHealth::Degraded).unwrap(),
			serde_json::json!("degraded")
		);
	}

	#[test]
	fn backoff_is_capped_and_bounded() {
		let config = RelayConfig {
			ws_url: "wss://example.org".to_string(),
			usdc_mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
			reconnect_initial: Duration::from_millis(1),
			reconnect_max: Duration::from_millis(4),
			give_up_after: Some(Duration::from_millis(50)),
		};

		let mut backoff = reconnect_backoff(&config);
		let mut gave_up = false;
		for _ in 0..100 {
			match backoff.next_backoff() {
				Some(delay) => {
					// max_interval plus the default 50% randomization
					assert!(delay <= Duration::from_millis(6));
					std::thread::sleep(Duration::from_millis(5));
				}
				None => {
					gave_up = true;
					break;
				}
			}
		}
		assert!(gave_up, "retry budget should eventually exhaust");
	}
}
