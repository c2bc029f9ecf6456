//! Donation Confirmation Flow.
//!
//! Orchestrates one donation session from "intent fetched" to "payment
//! verified and redirected". Each session runs on its own task, driven by
//! commands and observed through a watch channel; the countdown and
//! redirect timers are raced against the command channel so cancelling a
//! session reliably prevents the pending finalize call.
//!
//! State machine:
//!
//! ```text
//! Loading -> AwaitingWalletConnection -> ReadyToPay -> Processing
//!     -> Countdown -> Completed -> Redirecting
//! ReadyToPay -> AwaitingManualConfirmation -> Completed (no countdown)
//! ```
//!
//! A failed backend verification never advances past the retryable
//! `AwaitingManualConfirmation` state; the backend stays the source of
//! truth.

use std::sync::Arc;
use std::time::Duration;

use lifeline_store::SessionStore;
use lifeline_types::{
	DonationBackend, DonationIntent, FundraiserSummary, TransferSubmitter,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const SESSION_NAMESPACE: &str = "donation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
	Loading,
	AwaitingWalletConnection,
	ReadyToPay,
	Processing,
	Countdown,
	AwaitingManualConfirmation,
	Completed,
	Redirecting,
	Cancelled,
	Failed,
}

impl FlowState {
	/// Terminal states accept no further commands.
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Redirecting | Self::Cancelled | Self::Failed)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowCommand {
	ConnectWallet,
	Pay,
	ConfirmManual,
	Cancel,
}

/// Timer durations for one session.
#[derive(Debug, Clone, Copy)]
pub struct FlowTimers {
	/// Buffer between on-chain confirmation and backend verification,
	/// covering the backend's own indexing lag.
	pub countdown: Duration,
	/// Pause on the completed screen before the redirect.
	pub redirect_delay: Duration,
}

impl Default for FlowTimers {
	fn default() -> Self {
		Self {
			countdown: Duration::from_secs(15),
			redirect_delay: Duration::from_secs(5),
		}
	}
}

/// Point-in-time view of a session, published on every change.
#[derive(Debug, Clone, Serialize)]
pub struct FlowSnapshot {
	pub donate_id: String,
	pub state: FlowState,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub intent: Option<DonationIntent>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub signature: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub redirect: Option<String>,
}

/// Transient per-donation blob, cleared on completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionBlob {
	donate_id: String,
	fundraiser: Option<FundraiserSummary>,
}

/// Handle to a running session.
pub struct FlowHandle {
	commands: mpsc::UnboundedSender<FlowCommand>,
	snapshot: watch::Receiver<FlowSnapshot>,
	task: JoinHandle<()>,
}

impl FlowHandle {
	/// Dispatches a command. Returns false when the session is finished.
	pub fn send(&self, command: FlowCommand) -> bool {
		self.commands.send(command).is_ok()
	}

	pub fn snapshot(&self) -> FlowSnapshot {
		self.snapshot.borrow().clone()
	}

	pub fn watch(&self) -> watch::Receiver<FlowSnapshot> {
		self.snapshot.clone()
	}

	pub fn is_finished(&self) -> bool {
		self.snapshot.borrow().state.is_terminal()
	}

	/// Hard-stops the driver task. [`FlowCommand::Cancel`] is the clean
	/// way to end a session; this is for service shutdown.
	pub fn abort(&self) {
		self.task.abort();
	}
}

pub struct DonationFlow {
	donate_id: String,
	backend: Arc<dyn DonationBackend>,
	transfer: Arc<dyn TransferSubmitter>,
	store: Arc<SessionStore>,
	timers: FlowTimers,
}

impl DonationFlow {
	pub fn spawn(
		donate_id: impl Into<String>,
		backend: Arc<dyn DonationBackend>,
		transfer: Arc<dyn TransferSubmitter>,
		store: Arc<SessionStore>,
		timers: FlowTimers,
	) -> FlowHandle {
		let donate_id = donate_id.into();
		let (command_tx, command_rx) = mpsc::unbounded_channel();
		let (snapshot_tx, snapshot_rx) = watch::channel(FlowSnapshot {
			donate_id: donate_id.clone(),
			state: FlowState::Loading,
			intent: None,
			error: None,
			signature: None,
			redirect: None,
		});

		let flow = Self {
			donate_id,
			backend,
			transfer,
			store,
			timers,
		};
		let task = tokio::spawn(flow.run(command_rx, snapshot_tx));

		FlowHandle {
			commands: command_tx,
			snapshot: snapshot_rx,
			task,
		}
	}

	async fn run(
		self,
		mut commands: mpsc::UnboundedReceiver<FlowCommand>,
		snapshot: watch::Sender<FlowSnapshot>,
	) {
		let intent = match self.backend.donation_info(&self.donate_id).await {
			Ok(intent) => intent,
			Err(e) => {
				warn!(donate_id = %self.donate_id, error = %e, "failed to load donation intent");
				snapshot.send_modify(|s| {
					s.state = FlowState::Failed;
					s.error = Some(e.to_string());
				});
				return;
			}
		};

		if let Err(e) = self
			.store
			.store(
				SESSION_NAMESPACE,
				&self.donate_id,
				&SessionBlob {
					donate_id: self.donate_id.clone(),
					fundraiser: intent.fundraiser.clone(),
				},
			)
			.await
		{
			warn!(donate_id = %self.donate_id, error = %e, "failed to persist session blob");
		}

		let ready_state = if self.transfer.wallet_connected() {
			FlowState::ReadyToPay
		} else {
			FlowState::AwaitingWalletConnection
		};
		snapshot.send_modify(|s| {
			s.intent = Some(intent.clone());
			s.state = ready_state;
		});
		info!(donate_id = %self.donate_id, amount = %intent.amount, "donation intent loaded");

		loop {
			let Some(command) = commands.recv().await else {
				debug!(donate_id = %self.donate_id, "flow handle dropped");
				return;
			};
			let state = snapshot.borrow().state;

			match (state, command) {
				(_, FlowCommand::Cancel) => {
					snapshot.send_modify(|s| s.state = FlowState::Cancelled);
					return;
				}

				(FlowState::AwaitingWalletConnection, FlowCommand::ConnectWallet) => {
					if self.transfer.wallet_connected() {
						snapshot.send_modify(|s| {
							s.state = FlowState::ReadyToPay;
							s.error = None;
						});
					} else {
						snapshot.send_modify(|s| {
							s.error = Some("wallet is not connected".to_string());
						});
					}
				}

				(FlowState::ReadyToPay, FlowCommand::Pay) => {
					if self
						.pay_with_wallet(&intent, &mut commands, &snapshot)
						.await
					{
						return;
					}
				}

				(
					FlowState::ReadyToPay
					| FlowState::AwaitingWalletConnection
					| FlowState::AwaitingManualConfirmation,
					FlowCommand::ConfirmManual,
				) => {
					// Manual path: verify immediately, no countdown.
					snapshot.send_modify(|s| s.state = FlowState::AwaitingManualConfirmation);
					if self.verify(&intent, &mut commands, &snapshot).await {
						return;
					}
				}

				(state, command) => {
					debug!(donate_id = %self.donate_id, ?state, ?command, "command ignored in current state");
				}
			}
		}
	}

	/// Wallet-signed path. Returns true when the session reached a
	/// terminal state.
	async fn pay_with_wallet(
		&self,
		intent: &DonationIntent,
		commands: &mut mpsc::UnboundedReceiver<FlowCommand>,
		snapshot: &watch::Sender<FlowSnapshot>,
	) -> bool {
		snapshot.send_modify(|s| {
			s.state = FlowState::Processing;
			s.error = None;
		});

		match self
			.transfer
			.submit_usdc_transfer(&intent.wallet_address, intent.amount)
			.await
		{
			Ok(receipt) => {
				info!(
					donate_id = %self.donate_id,
					signature = %receipt.signature,
					"transfer confirmed, starting countdown"
				);
				snapshot.send_modify(|s| {
					s.state = FlowState::Countdown;
					s.signature = Some(receipt.signature);
				});

				if !self.wait_or_cancel(self.timers.countdown, commands).await {
					snapshot.send_modify(|s| s.state = FlowState::Cancelled);
					return true;
				}

				self.verify(intent, commands, snapshot).await
			}
			Err(e) => {
				warn!(donate_id = %self.donate_id, error = %e, "transfer failed");
				let next = if self.transfer.wallet_connected() {
					FlowState::ReadyToPay
				} else {
					FlowState::AwaitingWalletConnection
				};
				snapshot.send_modify(|s| {
					s.state = next;
					s.error = Some(e.to_string());
				});
				false
			}
		}
	}

	/// Backend verification plus the completion sequence. Returns true
	/// when the session reached a terminal state.
	async fn verify(
		&self,
		intent: &DonationIntent,
		commands: &mut mpsc::UnboundedReceiver<FlowCommand>,
		snapshot: &watch::Sender<FlowSnapshot>,
	) -> bool {
		let failure = match self.backend.check_donation(&self.donate_id).await {
			Ok(check) if check.success => None,
			Ok(check) => Some(
				check
					.message
					.unwrap_or_else(|| "payment not verified".to_string()),
			),
			Err(e) => Some(e.to_string()),
		};

		if let Some(message) = failure {
			warn!(donate_id = %self.donate_id, message = %message, "donation verification failed");
			snapshot.send_modify(|s| {
				s.state = FlowState::AwaitingManualConfirmation;
				s.error = Some(message);
			});
			return false;
		}

		info!(donate_id = %self.donate_id, "donation verified");
		snapshot.send_modify(|s| {
			s.state = FlowState::Completed;
			s.error = None;
		});

		if let Err(e) = self.store.remove(SESSION_NAMESPACE, &self.donate_id).await {
			warn!(donate_id = %self.donate_id, error = %e, "failed to clear session blob");
		}

		if !self.wait_or_cancel(self.timers.redirect_delay, commands).await {
			snapshot.send_modify(|s| s.state = FlowState::Cancelled);
			return true;
		}

		let fundraiser_id = intent
			.fundraiser
			.as_ref()
			.map(|f| f.id.clone())
			.unwrap_or_else(|| self.donate_id.clone());
		snapshot.send_modify(|s| {
			s.state = FlowState::Redirecting;
			s.redirect = Some(format!("/fundraise/{}?payment=success", fundraiser_id));
		});
		true
	}

	/// Sleeps for `duration` unless the session is cancelled first.
	/// Returns true when the timer elapsed.
	async fn wait_or_cancel(
		&self,
		duration: Duration,
		commands: &mut mpsc::UnboundedReceiver<FlowCommand>,
	) -> bool {
		let sleep = tokio::time::sleep(duration);
		tokio::pin!(sleep);

		loop {
			tokio::select! {
				_ = &mut sleep => return true,
				command = commands.recv() => match command {
					Some(FlowCommand::Cancel) | None => return false,
					Some(other) => {
						debug!(donate_id = %self.donate_id, ?other, "command ignored during timer");
					}
				},
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::collections::VecDeque;
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
	use std::sync::Mutex;

	use async_trait::async_trait;
	use lifeline_store::MemoryStore;
	use lifeline_types::{
		BackendError, DonationCheck, TransferError, TransferReceipt, WalletAddress,
	};
	use rust_decimal::Decimal;
	use tokio::time::Instant;

	use super::*;

	struct MockBackend {
		intent: Option<DonationIntent>,
		check_queue: Mutex<VecDeque<DonationCheck>>,
		check_calls: AtomicUsize,
	}

	impl MockBackend {
		fn with_intent() -> Self {
			Self {
				intent: Some(intent()),
				check_queue: Mutex::new(VecDeque::new()),
				check_calls: AtomicUsize::new(0),
			}
		}

		fn failing_info() -> Self {
			Self {
				intent: None,
				check_queue: Mutex::new(VecDeque::new()),
				check_calls: AtomicUsize::new(0),
			}
		}

		fn queue_check(&self, check: DonationCheck) {
			self.check_queue.lock().unwrap().push_back(check);
		}
	}

	#[async_trait]
	impl DonationBackend for MockBackend {
		async fn donation_info(&self, _donate_id: &str) -> Result<DonationIntent, BackendError> {
			self.intent.clone().ok_or(BackendError::Api {
				status: 404,
				message: "donation not found".to_string(),
			})
		}

		async fn check_donation(&self, _donate_id: &str) -> Result<DonationCheck, BackendError> {
			self.check_calls.fetch_add(1, Ordering::SeqCst);
			Ok(self
				.check_queue
				.lock()
				.unwrap()
				.pop_front()
				.unwrap_or(DonationCheck {
					success: true,
					message: None,
				}))
		}
	}

	struct MockTransfer {
		connected: AtomicBool,
		reject_with: Option<String>,
		submissions: AtomicUsize,
	}

	impl MockTransfer {
		fn connected() -> Self {
			Self {
				connected: AtomicBool::new(true),
				reject_with: None,
				submissions: AtomicUsize::new(0),
			}
		}

		fn disconnected() -> Self {
			Self {
				connected: AtomicBool::new(false),
				reject_with: None,
				submissions: AtomicUsize::new(0),
			}
		}

		fn rejecting(message: &str) -> Self {
			Self {
				connected: AtomicBool::new(true),
				reject_with: Some(message.to_string()),
				submissions: AtomicUsize::new(0),
			}
		}
	}

	#[async_trait]
	impl TransferSubmitter for MockTransfer {
		fn wallet_connected(&self) -> bool {
			self.connected.load(Ordering::SeqCst)
		}

		fn wallet_address(&self) -> Option<WalletAddress> {
			Some(wallet(9))
		}

		async fn submit_usdc_transfer(
			&self,
			_recipient: &WalletAddress,
			_amount: Decimal,
		) -> Result<TransferReceipt, TransferError> {
			self.submissions.fetch_add(1, Ordering::SeqCst);
			match &self.reject_with {
				Some(message) => Err(TransferError::WalletRejected(message.clone())),
				None => Ok(TransferReceipt {
					signature: "sig-1".to_string(),
					recipient_account_created: false,
				}),
			}
		}
	}

	fn wallet(seed: u8) -> WalletAddress {
		WalletAddress::new(bs58::encode([seed; 32]).into_string()).unwrap()
	}

	fn intent() -> DonationIntent {
		DonationIntent {
			donate_id: "d-1".to_string(),
			wallet_address: wallet(1),
			amount: Decimal::from(10),
			name: Some("Ada".to_string()),
			email: None,
			note: None,
			anonymous: false,
			fundraiser: Some(FundraiserSummary {
				id: "f-1".to_string(),
				title: "Flood relief".to_string(),
				image: None,
			}),
		}
	}

	fn store() -> Arc<SessionStore> {
		Arc::new(SessionStore::new(Box::new(MemoryStore::new())))
	}

	fn spawn(
		backend: Arc<MockBackend>,
		transfer: Arc<MockTransfer>,
		store: Arc<SessionStore>,
	) -> FlowHandle {
		DonationFlow::spawn("d-1", backend, transfer, store, FlowTimers::default())
	}

	async fn wait_for_state(
		rx: &mut watch::Receiver<FlowSnapshot>,
		state: FlowState,
	) -> FlowSnapshot {
		rx.wait_for(|snapshot| snapshot.state == state)
			.await
			.unwrap()
			.clone()
	}

	#[tokio::test(start_paused = true)]
	async fn wallet_path_counts_down_verifies_and_redirects() {
		let backend = Arc::new(MockBackend::with_intent());
		let transfer = Arc::new(MockTransfer::connected());
		let store = store();
		let handle = spawn(backend.clone(), transfer.clone(), store.clone());
		let mut rx = handle.watch();

		wait_for_state(&mut rx, FlowState::ReadyToPay).await;
		assert!(store.contains("donation", "d-1").await.unwrap());

		let started = Instant::now();
		assert!(handle.send(FlowCommand::Pay));

		let completed = wait_for_state(&mut rx, FlowState::Completed).await;
		assert!(started.elapsed() >= Duration::from_secs(15));
		assert_eq!(completed.signature.as_deref(), Some("sig-1"));
		assert_eq!(backend.check_calls.load(Ordering::SeqCst), 1);
		assert!(!store.contains("donation", "d-1").await.unwrap());

		let redirecting = wait_for_state(&mut rx, FlowState::Redirecting).await;
		assert!(started.elapsed() >= Duration::from_secs(20));
		assert_eq!(
			redirecting.redirect.as_deref(),
			Some("/fundraise/f-1?payment=success")
		);
		assert_eq!(transfer.submissions.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn manual_path_verifies_without_the_countdown() {
		let backend = Arc::new(MockBackend::with_intent());
		let transfer = Arc::new(MockTransfer::connected());
		let handle = spawn(backend.clone(), transfer.clone(), store());
		let mut rx = handle.watch();

		wait_for_state(&mut rx, FlowState::ReadyToPay).await;

		let started = Instant::now();
		assert!(handle.send(FlowCommand::ConfirmManual));
		wait_for_state(&mut rx, FlowState::Completed).await;

		assert!(started.elapsed() < Duration::from_secs(15));
		assert_eq!(backend.check_calls.load(Ordering::SeqCst), 1);
		assert_eq!(transfer.submissions.load(Ordering::SeqCst), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn failed_verification_stays_retryable() {
		let backend = Arc::new(MockBackend::with_intent());
		backend.queue_check(DonationCheck {
			success: false,
			message: Some("payment not yet indexed".to_string()),
		});
		let transfer = Arc::new(MockTransfer::connected());
		let handle = spawn(backend.clone(), transfer, store());
		let mut rx = handle.watch();

		wait_for_state(&mut rx, FlowState::ReadyToPay).await;
		handle.send(FlowCommand::Pay);

		let snapshot = wait_for_state(&mut rx, FlowState::AwaitingManualConfirmation).await;
		assert_eq!(snapshot.error.as_deref(), Some("payment not yet indexed"));

		// Retry succeeds once the backend catches up.
		handle.send(FlowCommand::ConfirmManual);
		wait_for_state(&mut rx, FlowState::Completed).await;
		assert_eq!(backend.check_calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn cancel_during_countdown_prevents_the_finalize_call() {
		let backend = Arc::new(MockBackend::with_intent());
		let transfer = Arc::new(MockTransfer::connected());
		let handle = spawn(backend.clone(), transfer, store());
		let mut rx = handle.watch();

		wait_for_state(&mut rx, FlowState::ReadyToPay).await;
		handle.send(FlowCommand::Pay);
		wait_for_state(&mut rx, FlowState::Countdown).await;

		handle.send(FlowCommand::Cancel);
		wait_for_state(&mut rx, FlowState::Cancelled).await;

		// Even well past the countdown, no verification happened.
		tokio::time::sleep(Duration::from_secs(30)).await;
		assert_eq!(backend.check_calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn transfer_failure_returns_to_ready() {
		let backend = Arc::new(MockBackend::with_intent());
		let transfer = Arc::new(MockTransfer::rejecting("user declined"));
		let handle = spawn(backend.clone(), transfer, store());
		let mut rx = handle.watch();

		wait_for_state(&mut rx, FlowState::ReadyToPay).await;
		handle.send(FlowCommand::Pay);

		let snapshot = rx
			.wait_for(|s| s.state == FlowState::ReadyToPay && s.error.is_some())
			.await
			.unwrap()
			.clone();
		assert!(snapshot.error.unwrap().contains("user declined"));
		assert_eq!(backend.check_calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn disconnected_wallet_waits_but_allows_manual_confirmation() {
		let backend = Arc::new(MockBackend::with_intent());
		let transfer = Arc::new(MockTransfer::disconnected());
		let handle = spawn(backend.clone(), transfer.clone(), store());
		let mut rx = handle.watch();

		wait_for_state(&mut rx, FlowState::AwaitingWalletConnection).await;

		// Pay has no wallet to sign with; it must be ignored.
		handle.send(FlowCommand::Pay);
		assert_eq!(transfer.submissions.load(Ordering::SeqCst), 0);

		handle.send(FlowCommand::ConfirmManual);
		wait_for_state(&mut rx, FlowState::Completed).await;
		assert_eq!(backend.check_calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn reconnecting_the_wallet_unblocks_payment() {
		let backend = Arc::new(MockBackend::with_intent());
		let transfer = Arc::new(MockTransfer::disconnected());
		let handle = spawn(backend, transfer.clone(), store());
		let mut rx = handle.watch();

		wait_for_state(&mut rx, FlowState::AwaitingWalletConnection).await;
		transfer.connected.store(true, Ordering::SeqCst);
		handle.send(FlowCommand::ConnectWallet);
		wait_for_state(&mut rx, FlowState::ReadyToPay).await;
	}

	#[tokio::test(start_paused = true)]
	async fn load_failure_is_terminal() {
		let backend = Arc::new(MockBackend::failing_info());
		let transfer = Arc::new(MockTransfer::connected());
		let handle = spawn(backend, transfer, store());
		let mut rx = handle.watch();

		let snapshot = wait_for_state(&mut rx, FlowState::Failed).await;
		assert!(snapshot.error.unwrap().contains("donation not found"));
		assert!(handle.is_finished());
	}
}
