use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use lifeline_backend::BackendClient;
use lifeline_config::{ConfigLoader, LifelineConfig};
use lifeline_flow::FlowTimers;
use lifeline_relay::{Relay, RelayConfig};
use lifeline_store::{MemoryStore, SessionStore};
use lifeline_transfer::{KeypairSigner, RpcChainClient, TransferService};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::read_keypair_file;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod flows;
mod server;

use flows::FlowManager;
use server::AppState;

#[derive(Parser)]
#[command(name = "lifeline")]
#[command(about = "Lifeline payment relay service", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", default_value = "config/local.toml")]
	config: PathBuf,

	#[arg(long, env = "LIFELINE_LOG_LEVEL", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Start the payment service
	Start,
	/// Validate the configuration file
	Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	setup_tracing(&cli.log_level)?;

	match cli.command {
		Some(Commands::Start) | None => start_service(cli).await,
		Some(Commands::Validate) => validate_config(cli).await,
	}
}

async fn start_service(cli: Cli) -> Result<()> {
	info!("Starting lifeline payment service");
	info!("Loading configuration from: {:?}", cli.config);

	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")?;

	info!("Service name: {}", config.service.name);
	info!("HTTP port: {}", config.service.http_port);

	let state = build_state(&config)?;

	let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.service.http_port))
		.await
		.context("Failed to bind HTTP listener")?;
	info!("Listening on port {}", config.service.http_port);

	let flows = state.flows.clone();
	axum::serve(listener, server::router(state))
		.with_graceful_shutdown(shutdown_signal())
		.await
		.context("HTTP server failed")?;

	info!("Shutdown signal received, stopping sessions");
	flows.shutdown().await;

	info!("Lifeline payment service stopped");
	Ok(())
}

fn build_state(config: &LifelineConfig) -> Result<AppState> {
	let relay = Relay::spawn(RelayConfig {
		ws_url: config.chain.ws_url.clone(),
		usdc_mint: config.chain.usdc_mint.clone(),
		reconnect_initial: Duration::from_millis(config.relay.reconnect_initial_ms),
		reconnect_max: Duration::from_millis(config.relay.reconnect_max_ms),
		give_up_after: config.relay.give_up_after_secs.map(Duration::from_secs),
	});

	let backend =
		Arc::new(BackendClient::new(&config.backend).context("Failed to build backend client")?);

	let keypair = read_keypair_file(&config.chain.wallet_keypair)
		.map_err(|e| anyhow!("Failed to read wallet keypair: {}", e))?;
	let usdc_mint = Pubkey::from_str(&config.chain.usdc_mint)
		.context("Configured usdc_mint is not a valid public key")?;

	let transfer = Arc::new(TransferService::new(
		Arc::new(KeypairSigner::new(keypair)),
		Arc::new(RpcChainClient::new(config.chain.rpc_url.clone())),
		usdc_mint,
		Duration::from_secs(config.chain.confirmation_timeout_secs),
		Duration::from_millis(config.chain.confirmation_poll_ms),
	));

	let store = Arc::new(SessionStore::new(Box::new(MemoryStore::new())));
	let flows = Arc::new(FlowManager::new(
		backend,
		transfer,
		store,
		FlowTimers {
			countdown: config.flow.countdown(),
			redirect_delay: config.flow.redirect_delay(),
		},
	));

	Ok(AppState { relay, flows })
}

async fn validate_config(cli: Cli) -> Result<()> {
	info!("Validating configuration file: {:?}", cli.config);

	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")?;

	info!("Configuration is valid");
	info!("Service name: {}", config.service.name);
	info!("Backend: {}", config.backend.base_url);
	info!("Chain RPC: {}", config.chain.rpc_url);
	info!("Chain WS: {}", config.chain.ws_url);
	info!("USDC mint: {}", config.chain.usdc_mint);
	info!(
		"Flow timers: countdown {}s, redirect {}s",
		config.flow.countdown_secs, config.flow.redirect_delay_secs
	);

	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.init();

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c()
			.await
			.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install signal handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
