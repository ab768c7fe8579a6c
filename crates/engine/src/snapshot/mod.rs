// Copyright 2025 flint developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub mod snapshotter;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use flint_sdk::types::Side;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use snapshotter::{Snapshotter, SnapshotterConfig};

/// Error types for snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
	#[error("failed to write snapshot: {0}")]
	WriteFailed(String),
	#[error("failed to read snapshot: {0}")]
	ReadFailed(String),
	#[error("snapshot corrupt: {0}")]
	Corrupt(String),
}

impl SnapshotError {
	/// Write/read failures are retried; a corrupt snapshot is not
	pub fn is_fatal(&self) -> bool {
		matches!(self, SnapshotError::Corrupt(_))
	}
}

/// One resting order as persisted in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotOrder {
	pub order_id: String,
	pub user_id: String,
	pub side: Side,
	pub price: f64,
	pub size: f64,
	pub arrival_ts: u64,
}

/// Recoverable serialisation of book state
///
/// `order_offset` is the last input offset whose effects are fully
/// contained in `orders`; a restarted engine resumes reading at
/// `order_offset + 1`. Per-level sequence counters are not persisted -
/// after restore, tie-breaking falls through to arrival timestamp and
/// re-insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
	pub order_offset: u64,
	pub orders: Vec<SnapshotOrder>,
}

/// Snapshot persistence - one keyed blob per pair
///
/// `store` must be atomic at the granularity of a full snapshot: a
/// partially written snapshot must never be readable. Backing stores
/// range from the in-memory map below to object stores or databases.
pub trait SnapshotStore: Send {
	/// Persist the snapshot, replacing any previous one for the pair
	fn store(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError>;

	/// Load the latest snapshot for the pair, if any
	fn load(&self) -> Result<Option<Snapshot>, SnapshotError>;
}

/// In-memory snapshot store
///
/// Keyed by pair identifier. Clones share the same underlying map, so a
/// test can hold one end while the engine writes through the other.
#[derive(Clone)]
pub struct MemorySnapshotStore {
	pair: String,
	blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemorySnapshotStore {
	pub fn new(pair: impl Into<String>) -> Self {
		Self {
			pair: pair.into(),
			blobs: Arc::new(Mutex::new(HashMap::new())),
		}
	}
}

impl SnapshotStore for MemorySnapshotStore {
	fn store(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
		let blob = serde_json::to_vec(snapshot)
			.map_err(|e| SnapshotError::WriteFailed(e.to_string()))?;

		let mut blobs = self
			.blobs
			.lock()
			.map_err(|_| SnapshotError::WriteFailed("store lock poisoned".to_string()))?;
		blobs.insert(self.pair.clone(), blob);
		Ok(())
	}

	fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
		let blobs = self
			.blobs
			.lock()
			.map_err(|_| SnapshotError::ReadFailed("store lock poisoned".to_string()))?;

		match blobs.get(&self.pair) {
			Some(blob) => {
				let snapshot = serde_json::from_slice(blob)
					.map_err(|e| SnapshotError::Corrupt(e.to_string()))?;
				Ok(Some(snapshot))
			}
			None => Ok(None),
		}
	}
}
