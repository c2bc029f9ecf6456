//! In-memory store backend with lazy TTL eviction.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::{StoreBackend, StoreError};

struct Entry {
	value: Vec<u8>,
	expires_at: Option<Instant>,
}

impl Entry {
	fn expired(&self) -> bool {
		self.expires_at.is_some_and(|at| Instant::now() >= at)
	}
}

/// HashMap-backed store. Expired entries are evicted on access.
#[derive(Default)]
pub struct MemoryStore {
	entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StoreBackend for MemoryStore {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StoreError> {
		let mut entries = self
			.entries
			.lock()
			.map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
		match entries.get(key) {
			Some(entry) if entry.expired() => {
				entries.remove(key);
				Err(StoreError::NotFound)
			}
			Some(entry) => Ok(entry.value.clone()),
			None => Err(StoreError::NotFound),
		}
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StoreError> {
		let mut entries = self
			.entries
			.lock()
			.map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
		entries.insert(
			key.to_string(),
			Entry {
				value,
				expires_at: ttl.map(|ttl| Instant::now() + ttl),
			},
		);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StoreError> {
		let mut entries = self
			.entries
			.lock()
			.map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
		entries.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StoreError> {
		let mut entries = self
			.entries
			.lock()
			.map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
		match entries.get(key) {
			Some(entry) if entry.expired() => {
				entries.remove(key);
				Ok(false)
			}
			Some(_) => Ok(true),
			None => Ok(false),
		}
	}
}
