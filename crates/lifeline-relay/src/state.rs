//! Owned relay state: tracked upstream subscriptions and downstream
//! listeners.
//!
//! All mutation happens synchronously under the relay's lock; nothing in
//! here awaits. The tracked set outlives any single upstream socket (it is
//! replayed on every reconnect), while clients live exactly as long as
//! their downstream connection.

use std::collections::{HashMap, HashSet};

use lifeline_types::{RelayEvent, WalletAddress};
use tokio::sync::mpsc;

/// Identifies one downstream listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

struct DownstreamClient {
	id: ClientId,
	sender: mpsc::UnboundedSender<RelayEvent>,
}

#[derive(Default)]
pub struct RelayState {
	tracked: HashSet<WalletAddress>,
	clients: HashMap<WalletAddress, Vec<DownstreamClient>>,
	next_client_id: u64,
}

impl RelayState {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an address to the tracked set. Returns whether it was newly
	/// added; an already-tracked address is a no-op.
	pub fn track(&mut self, address: WalletAddress) -> bool {
		self.tracked.insert(address)
	}

	pub fn tracked(&self) -> Vec<WalletAddress> {
		self.tracked.iter().cloned().collect()
	}

	pub fn is_tracked(&self, address: &WalletAddress) -> bool {
		self.tracked.contains(address)
	}

	/// Registers a downstream listener for deposit events on `address`.
	/// Multiple listeners per address are expected (browser tabs).
	pub fn register_client(
		&mut self,
		address: WalletAddress,
		sender: mpsc::UnboundedSender<RelayEvent>,
	) -> ClientId {
		self.next_client_id += 1;
		let id = ClientId(self.next_client_id);
		self.clients
			.entry(address)
			.or_default()
			.push(DownstreamClient { id, sender });
		id
	}

	/// Drops one listener registration. The upstream subscription is
	/// unaffected.
	pub fn unregister_client(&mut self, address: &WalletAddress, id: ClientId) {
		if let Some(listeners) = self.clients.get_mut(address) {
			listeners.retain(|client| client.id != id);
			if listeners.is_empty() {
				self.clients.remove(address);
			}
		}
	}

	pub fn client_count(&self, address: &WalletAddress) -> usize {
		self.clients.get(address).map_or(0, Vec::len)
	}

	/// Delivers an event to every listener of `address`, pruning listeners
	/// whose receiving side is gone. Returns the number delivered.
	pub fn broadcast(&mut self, address: &WalletAddress, event: &RelayEvent) -> usize {
		let Some(listeners) = self.clients.get_mut(address) else {
			return 0;
		};

		listeners.retain(|client| client.sender.send(event.clone()).is_ok());
		let delivered = listeners.len();
		if listeners.is_empty() {
			self.clients.remove(address);
		}
		delivered
	}
}
