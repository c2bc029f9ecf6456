//! Session storage for the lifeline service.
//!
//! Holds the transient per-donation blobs (donation id, cached fundraiser
//! summary) that the confirmation flow clears on completion. The backend
//! is pluggable; the in-memory implementation is the only one the service
//! currently wires.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod implementations {
	pub mod memory;
}

pub use implementations::memory::MemoryStore;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
	/// The requested item does not exist (or its TTL expired).
	#[error("Not found")]
	NotFound,
	/// Serialization/deserialization failure.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Failure in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
}

/// Low-level interface a storage backend must provide.
#[async_trait]
pub trait StoreBackend: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StoreError>;

	/// Stores raw bytes with optional time-to-live.
	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StoreError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StoreError>;

	/// Checks if a key exists.
	async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

/// Typed store over a backend, with JSON serialization and namespaced keys.
pub struct SessionStore {
	backend: Box<dyn StoreBackend>,
}

impl SessionStore {
	pub fn new(backend: Box<dyn StoreBackend>) -> Self {
		Self { backend }
	}

	pub async fn store<T: Serialize + Sync>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StoreError> {
		self.store_with_ttl(namespace, id, data, None).await
	}

	pub async fn store_with_ttl<T: Serialize + Sync>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
		ttl: Option<Duration>,
	) -> Result<(), StoreError> {
		let key = format!("{}:{}", namespace, id);
		let bytes =
			serde_json::to_vec(data).map_err(|e| StoreError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&key, bytes, ttl).await
	}

	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StoreError> {
		let key = format!("{}:{}", namespace, id);
		let bytes = self.backend.get_bytes(&key).await?;
		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))
	}

	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StoreError> {
		let key = format!("{}:{}", namespace, id);
		self.backend.delete(&key).await
	}

	pub async fn contains(&self, namespace: &str, id: &str) -> Result<bool, StoreError> {
		let key = format!("{}:{}", namespace, id);
		self.backend.exists(&key).await
	}
}
