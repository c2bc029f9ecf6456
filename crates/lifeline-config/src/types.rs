//! Configuration types for the lifeline service.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Complete service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LifelineConfig {
	/// Service identity and HTTP settings
	pub service: ServiceSettings,
	/// Platform backend API
	pub backend: BackendSettings,
	/// Chain RPC endpoints and wallet
	pub chain: ChainSettings,
	/// Relay reconnection policy
	#[serde(default)]
	pub relay: RelaySettings,
	/// Donation flow timers
	#[serde(default)]
	pub flow: FlowSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceSettings {
	/// Service name for logging
	pub name: String,
	/// Port the HTTP/WebSocket server binds
	pub http_port: u16,
	/// Default log level when RUST_LOG is not set
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendSettings {
	/// Base URL of the platform backend API
	pub base_url: String,
	/// Bearer token forwarded on every request
	#[serde(default)]
	pub auth_token: Option<String>,
	/// Fixed request timeout
	#[serde(default = "default_backend_timeout_secs")]
	pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainSettings {
	/// HTTP RPC endpoint
	pub rpc_url: String,
	/// WebSocket endpoint for the notification relay
	pub ws_url: String,
	/// Mint address of the tracked stablecoin
	pub usdc_mint: String,
	/// Path to the service wallet keypair file
	pub wallet_keypair: PathBuf,
	/// Hard ceiling on waiting for on-chain confirmation
	#[serde(default = "default_confirmation_timeout_secs")]
	pub confirmation_timeout_secs: u64,
	/// Poll interval while waiting for confirmation
	#[serde(default = "default_confirmation_poll_ms")]
	pub confirmation_poll_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelaySettings {
	#[serde(default = "default_reconnect_initial_ms")]
	pub reconnect_initial_ms: u64,
	#[serde(default = "default_reconnect_max_ms")]
	pub reconnect_max_ms: u64,
	/// Total retry budget; once exhausted the relay reports itself failed.
	/// Absent means retry forever.
	#[serde(default)]
	pub give_up_after_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlowSettings {
	/// Buffer between on-chain confirmation and backend verification
	#[serde(default = "default_countdown_secs")]
	pub countdown_secs: u64,
	/// Pause on the completed screen before redirecting
	#[serde(default = "default_redirect_delay_secs")]
	pub redirect_delay_secs: u64,
}

impl Default for RelaySettings {
	fn default() -> Self {
		Self {
			reconnect_initial_ms: default_reconnect_initial_ms(),
			reconnect_max_ms: default_reconnect_max_ms(),
			give_up_after_secs: None,
		}
	}
}

impl Default for FlowSettings {
	fn default() -> Self {
		Self {
			countdown_secs: default_countdown_secs(),
			redirect_delay_secs: default_redirect_delay_secs(),
		}
	}
}

impl FlowSettings {
	pub fn countdown(&self) -> Duration {
		Duration::from_secs(self.countdown_secs)
	}

	pub fn redirect_delay(&self) -> Duration {
		Duration::from_secs(self.redirect_delay_secs)
	}
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_backend_timeout_secs() -> u64 {
	30
}

fn default_confirmation_timeout_secs() -> u64 {
	60
}

fn default_confirmation_poll_ms() -> u64 {
	500
}

fn default_reconnect_initial_ms() -> u64 {
	1_000
}

fn default_reconnect_max_ms() -> u64 {
	30_000
}

fn default_countdown_secs() -> u64 {
	15
}

fn default_redirect_delay_secs() -> u64 {
	5
}
