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

//! Boot-time recovery
//!
//! A restarting engine loads the latest snapshot, rebuilds the book
//! from it, and resumes reading the input log at the offset after the
//! snapshot point. A snapshot that cannot be decoded, or whose orders
//! fail validation on re-insert, means the persisted state cannot be
//! trusted - the engine refuses to start rather than risk diverging
//! from the log.

use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::book::OrderBook;
use crate::snapshot::{SnapshotError, SnapshotStore};

const LOAD_ATTEMPTS: u32 = 3;
const LOAD_BACKOFF: Duration = Duration::from_millis(200);

/// Restore book state from the latest snapshot, if one exists
///
/// Returns the snapshot's `order_offset`, or `None` on a cold start.
/// Transient read failures are retried a bounded number of times; a
/// corrupt snapshot (or an exhausted retry budget) aborts startup.
pub fn recover(
	book: &mut OrderBook,
	store: &dyn SnapshotStore,
) -> Result<Option<u64>, SnapshotError> {
	let mut attempt = 0;
	let snapshot = loop {
		match store.load() {
			Ok(snapshot) => break snapshot,
			Err(e) if e.is_fatal() => return Err(e),
			Err(e) => {
				attempt += 1;
				if attempt >= LOAD_ATTEMPTS {
					return Err(e);
				}
				warn!(target: "recovery", error = %e, attempt, "snapshot load failed, retrying");
				thread::sleep(LOAD_BACKOFF * attempt);
			}
		}
	};

	match snapshot {
		None => {
			info!(target: "recovery", "no snapshot found, starting from empty book");
			Ok(None)
		}
		Some(snapshot) => {
			book.restore(&snapshot).map_err(|e| {
				SnapshotError::Corrupt(format!(
					"restore at offset {} failed: {e}",
					snapshot.order_offset
				))
			})?;

			info!(
				target: "recovery",
				offset = snapshot.order_offset,
				orders = snapshot.orders.len(),
				"book restored from snapshot"
			);
			Ok(Some(snapshot.order_offset))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::snapshot::{MemorySnapshotStore, Snapshot, SnapshotOrder};
	use flint_sdk::types::Side;

	#[test]
	fn test_cold_start_without_snapshot() {
		let mut book = OrderBook::new();
		let store = MemorySnapshotStore::new("BTC-USD");

		let restored = recover(&mut book, &store).unwrap();
		assert_eq!(restored, None);
		assert_eq!(book.resting_orders(), 0);
	}

	#[test]
	fn test_restore_from_snapshot() {
		let mut store = MemorySnapshotStore::new("BTC-USD");
		store
			.store(&Snapshot {
				order_offset: 17,
				orders: vec![SnapshotOrder {
					order_id: "a-1".to_string(),
					user_id: "u-1".to_string(),
					side: Side::Ask,
					price: 100.0,
					size: 5.0,
					arrival_ts: 1_000,
				}],
			})
			.unwrap();

		let mut book = OrderBook::new();
		let restored = recover(&mut book, &store).unwrap();

		assert_eq!(restored, Some(17));
		assert_eq!(book.resting_orders(), 1);
		assert_eq!(book.best_ask(), Some(100.0));
	}

	#[test]
	fn test_invalid_snapshot_refuses_startup() {
		let mut store = MemorySnapshotStore::new("BTC-USD");
		store
			.store(&Snapshot {
				order_offset: 17,
				orders: vec![SnapshotOrder {
					order_id: "a-1".to_string(),
					user_id: "u-1".to_string(),
					side: Side::Ask,
					price: 100.0,
					size: -5.0,
					arrival_ts: 1_000,
				}],
			})
			.unwrap();

		let mut book = OrderBook::new();
		let err = recover(&mut book, &store).unwrap_err();
		assert!(err.is_fatal());
	}
}
