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

use std::sync::{
	Arc, Mutex, RwLock,
	atomic::{AtomicBool, Ordering},
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::SnapshotStore;
use crate::book::OrderBook;
use crate::engine::{EngineState, Progress};

/// Configuration for the snapshot task
#[derive(Debug, Clone)]
pub struct SnapshotterConfig {
	/// Wall-time tick between snapshot checks
	pub interval: Duration,
	/// Minimum processed-offset advance between snapshots
	pub offset_delta: u64,
}

/// Periodic snapshot task
///
/// Runs concurrently with the matching loop. On each tick it checks
/// whether the processed offset has advanced far enough since the last
/// snapshot; if so it takes a shared read lock on the book just long
/// enough to serialise, stamps the snapshot with the processed offset,
/// and writes it to the store outside the lock. A failed write is
/// logged and retried on the next tick; the last-snapshot watermark
/// only ever moves forward.
///
/// The snapshotter never mutates the book and stops snapshotting as
/// soon as the engine has failed.
pub struct Snapshotter {
	thread_handle: Option<JoinHandle<()>>,
	shutdown: Arc<AtomicBool>,
}

impl Snapshotter {
	pub(crate) fn start(
		book: Arc<RwLock<OrderBook>>,
		store: Arc<Mutex<Box<dyn SnapshotStore>>>,
		progress: Arc<Mutex<Progress>>,
		config: SnapshotterConfig,
		shutdown: Arc<AtomicBool>,
	) -> Self {
		let shutdown_clone = shutdown.clone();
		let thread_handle = thread::Builder::new()
			.name("snapshotter".to_string())
			.spawn(move || {
				info!(target: "snapshotter", "snapshotter started");
				Self::run_snapshot_loop(&book, &store, &progress, &config, &shutdown_clone);
				info!(target: "snapshotter", "snapshotter stopped");
			})
			.expect("failed to spawn snapshotter thread");

		Self {
			thread_handle: Some(thread_handle),
			shutdown,
		}
	}

	fn run_snapshot_loop(
		book: &RwLock<OrderBook>,
		store: &Mutex<Box<dyn SnapshotStore>>,
		progress: &Mutex<Progress>,
		config: &SnapshotterConfig,
		shutdown: &AtomicBool,
	) {
		loop {
			// Sleep in short slices so cancellation is honoured promptly
			let tick_start = Instant::now();
			while tick_start.elapsed() < config.interval {
				if shutdown.load(Ordering::Relaxed) {
					return;
				}
				thread::sleep(Duration::from_millis(20).min(config.interval));
			}
			if shutdown.load(Ordering::Relaxed) {
				return;
			}

			let due = {
				let progress = progress.lock().expect("progress lock poisoned");
				if progress.state() == EngineState::Failed {
					return;
				}
				progress.snapshot_due(config.offset_delta)
			};
			if due.is_none() {
				continue;
			}

			// Shared lock only while serialising; the processed offset
			// is re-read under the same lock the writer advances it
			// under, so the stamp always matches the book contents.
			let snapshot = {
				let book = book.read().expect("book lock poisoned");
				let offset = progress
					.lock()
					.expect("progress lock poisoned")
					.processed_offset();
				let Some(offset) = offset else { continue };
				let mut snapshot = book.snapshot();
				snapshot.order_offset = offset;
				snapshot
			};

			let write_start = Instant::now();
			let result = store
				.lock()
				.expect("store lock poisoned")
				.store(&snapshot);
			match result {
				Ok(()) => {
					progress
						.lock()
						.expect("progress lock poisoned")
						.record_snapshot(snapshot.order_offset);
					debug!(
						target: "snapshotter",
						offset = snapshot.order_offset,
						orders = snapshot.orders.len(),
						write_ms = write_start.elapsed().as_millis() as u64,
						"snapshot persisted"
					);
				}
				Err(e) => {
					warn!(
						target: "snapshotter",
						offset = snapshot.order_offset,
						error = %e,
						"snapshot write failed, will retry next tick"
					);
				}
			}
		}
	}

	pub(crate) fn join(mut self) {
		if let Some(handle) = self.thread_handle.take()
			&& let Err(e) = handle.join()
		{
			warn!(target: "snapshotter", error = ?e, "snapshotter thread panicked");
		}
	}
}

impl Drop for Snapshotter {
	fn drop(&mut self) {
		self.shutdown.store(true, Ordering::Relaxed);
		if let Some(handle) = self.thread_handle.take() {
			let _ = handle.join();
		}
	}
}
