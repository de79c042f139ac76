//! Memory port — phase-tagged read/write contract
//!
//! The only shared resource crossing this core's boundary. Both
//! operations must be idempotent under repetition and must never block
//! indefinitely. Callers wrap them so store failures are logged and
//! swallowed and retrieve failures return a safe default.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by a memory backend
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Memory store unavailable: {0}")]
    Unavailable(String),

    #[error("Memory backend error: {0}")]
    Backend(String),
}

/// Phase-tagged storage consumed by the coordinator and reasoning loop
pub trait MemoryStore: Send + Sync {
    /// Store `item` tagged with its type and EDRR phase.
    ///
    /// Returns an identifier for the stored item. Must be idempotent:
    /// storing the same item/type/phase/metadata twice is harmless.
    fn store_with_edrr_phase(
        &self,
        item: Value,
        item_type: &str,
        phase: &str,
        metadata: &Map<String, Value>,
    ) -> Result<String, MemoryError>;

    /// Retrieve the most recent item matching type, phase, and metadata.
    fn retrieve_with_edrr_phase(
        &self,
        item_type: &str,
        phase: &str,
        metadata: &Map<String, Value>,
    ) -> Result<Option<Value>, MemoryError>;
}

/// Key for the in-memory reference store: (item_type, phase, cycle_id)
type StoreKey = (String, String, String);

/// In-memory reference implementation of [`MemoryStore`]
///
/// Keyed by item type, phase, and the `cycle_id` metadata entry; later
/// writes to the same key replace earlier ones. Suitable for tests and
/// hosts without a persistence layer.
#[derive(Default)]
pub struct InMemoryStore {
    items: Mutex<BTreeMap<StoreKey, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(item_type: &str, phase: &str, metadata: &Map<String, Value>) -> StoreKey {
        let cycle_id = metadata
            .get("cycle_id")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        (item_type.to_string(), phase.to_string(), cycle_id)
    }

    /// Number of distinct keys held.
    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MemoryStore for InMemoryStore {
    fn store_with_edrr_phase(
        &self,
        item: Value,
        item_type: &str,
        phase: &str,
        metadata: &Map<String, Value>,
    ) -> Result<String, MemoryError> {
        let key = Self::key(item_type, phase, metadata);
        let mut items = self
            .items
            .lock()
            .map_err(|e| MemoryError::Backend(e.to_string()))?;
        items.insert(key, item);
        Ok(Uuid::new_v4().to_string())
    }

    fn retrieve_with_edrr_phase(
        &self,
        item_type: &str,
        phase: &str,
        metadata: &Map<String, Value>,
    ) -> Result<Option<Value>, MemoryError> {
        let key = Self::key(item_type, phase, metadata);
        let items = self
            .items
            .lock()
            .map_err(|e| MemoryError::Backend(e.to_string()))?;
        Ok(items.get(&key).cloned())
    }
}
