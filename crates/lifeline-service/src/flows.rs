//! Live donation sessions, keyed by donate id.

use std::collections::HashMap;
use std::sync::Arc;

use lifeline_flow::{DonationFlow, FlowCommand, FlowHandle, FlowSnapshot, FlowTimers};
use lifeline_store::SessionStore;
use lifeline_types::{DonationBackend, TransferSubmitter};
use tokio::sync::{watch, Mutex};
use tracing::info;

/// Outcome of dispatching a command to a session.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandOutcome {
	Sent,
	NotFound,
	Finished,
}

pub struct FlowManager {
	backend: Arc<dyn DonationBackend>,
	transfer: Arc<dyn TransferSubmitter>,
	store: Arc<SessionStore>,
	timers: FlowTimers,
	sessions: Mutex<HashMap<String, FlowHandle>>,
}

impl FlowManager {
	pub fn new(
		backend: Arc<dyn DonationBackend>,
		transfer: Arc<dyn TransferSubmitter>,
		store: Arc<SessionStore>,
		timers: FlowTimers,
	) -> Self {
		Self {
			backend,
			transfer,
			store,
			timers,
			sessions: Mutex::new(HashMap::new()),
		}
	}

	/// Starts a session for `donate_id`. A finished session is replaced;
	/// a live one is an error.
	pub async fn start(&self, donate_id: &str) -> Option<watch::Receiver<FlowSnapshot>> {
		let mut sessions = self.sessions.lock().await;
		if let Some(existing) = sessions.get(donate_id) {
			if !existing.is_finished() {
				return None;
			}
		}

		let handle = DonationFlow::spawn(
			donate_id,
			self.backend.clone(),
			self.transfer.clone(),
			self.store.clone(),
			self.timers,
		);
		let watcher = handle.watch();
		sessions.insert(donate_id.to_string(), handle);
		info!(donate_id, "donation session started");
		Some(watcher)
	}

	pub async fn snapshot(&self, donate_id: &str) -> Option<FlowSnapshot> {
		let sessions = self.sessions.lock().await;
		sessions.get(donate_id).map(FlowHandle::snapshot)
	}

	pub async fn command(&self, donate_id: &str, command: FlowCommand) -> CommandOutcome {
		let sessions = self.sessions.lock().await;
		match sessions.get(donate_id) {
			None => CommandOutcome::NotFound,
			Some(handle) if handle.is_finished() => CommandOutcome::Finished,
			Some(handle) => {
				if handle.send(command) {
					CommandOutcome::Sent
				} else {
					CommandOutcome::Finished
				}
			}
		}
	}

	/// Cancels and forgets a session. Returns whether one existed.
	pub async fn cancel(&self, donate_id: &str) -> bool {
		let mut sessions = self.sessions.lock().await;
		match sessions.remove(donate_id) {
			Some(handle) => {
				handle.send(FlowCommand::Cancel);
				info!(donate_id, "donation session cancelled");
				true
			}
			None => false,
		}
	}

	/// Hard-stops every live session; used at service shutdown.
	pub async fn shutdown(&self) {
		let mut sessions = self.sessions.lock().await;
		for (donate_id, handle) in sessions.drain() {
			if !handle.is_finished() {
				info!(donate_id = %donate_id, "aborting donation session");
			}
			handle.abort();
		}
	}
}
