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

mod progress;

pub use progress::{EngineState, Progress, ProgressView};

use std::sync::{
	Arc, Mutex, RwLock,
	atomic::{AtomicBool, Ordering},
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flint_sdk::types::{MatchEvent, OrderCommand};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
	book::{BookError, Match, Order, OrderBook},
	config::EngineConfig,
	publish::MatchPublisher,
	recovery,
	snapshot::{SnapshotStore, Snapshotter, SnapshotterConfig},
	source::{OrderSource, SeekPosition},
};

/// Error types for engine operations
#[derive(Debug, Error)]
pub enum EngineError {
	#[error(transparent)]
	Book(#[from] BookError),
	#[error(transparent)]
	Source(#[from] crate::source::SourceError),
	#[error(transparent)]
	Publish(#[from] crate::publish::PublishError),
	#[error(transparent)]
	Snapshot(#[from] crate::snapshot::SnapshotError),
	#[error("offset gap: expected {expected}, found {found}")]
	OffsetGap { expected: u64, found: u64 },
}

const POLL_TIMEOUT: Duration = Duration::from_millis(50);
const RETRY_BACKOFF_MIN: Duration = Duration::from_millis(20);
const RETRY_BACKOFF_MAX: Duration = Duration::from_millis(500);

/// Single-writer matching engine
///
/// `start` restores the book from the latest snapshot, positions the
/// source cursor at the next unprocessed offset, and spawns two
/// threads: the matching loop (sole book writer) and the snapshot task.
/// The loop reads one command at a time, applies it to the book,
/// forwards any matches to the publisher in production order, advances
/// the processed offset, and acknowledges the input.
///
/// Delivery semantics: matches are emitted at-least-once (a crash
/// between publish and snapshot replays them), book state advances
/// at-most-once (duplicate offsets are filtered against the processed
/// offset).
///
/// Apply, publish and the offset advance all happen under the book's
/// exclusive lock. That keeps the snapshot task's `(book state,
/// processed offset)` pair consistent: a snapshot stamped with offset k
/// contains exactly the effects of offsets 0..=k.
pub struct Engine {
	thread_handle: Option<JoinHandle<()>>,
	snapshotter: Option<Snapshotter>,
	shutdown: Arc<AtomicBool>,
	book: Arc<RwLock<OrderBook>>,
	progress: Arc<Mutex<Progress>>,
}

impl Engine {
	/// Recover state and start the engine threads
	///
	/// Fails instead of starting when the persisted snapshot cannot be
	/// read after retries or does not survive a restore.
	pub fn start(
		config: EngineConfig,
		mut source: Box<dyn OrderSource>,
		publisher: Box<dyn MatchPublisher>,
		store: Box<dyn SnapshotStore>,
	) -> Result<Self, EngineError> {
		let mut book = OrderBook::new();
		let restored = recovery::recover(&mut book, store.as_ref())?;

		match restored {
			Some(offset) => source.seek(SeekPosition::Offset(offset + 1))?,
			None => source.seek(config.source_start_policy.seek_position())?,
		}

		let book = Arc::new(RwLock::new(book));
		let progress = Arc::new(Mutex::new(Progress::new(restored)));
		let store = Arc::new(Mutex::new(store));
		let shutdown = Arc::new(AtomicBool::new(false));

		let snapshotter = Snapshotter::start(
			book.clone(),
			store.clone(),
			progress.clone(),
			SnapshotterConfig {
				interval: config.snapshot_interval(),
				offset_delta: config.snapshot_offset_delta,
			},
			shutdown.clone(),
		);

		let worker = Worker {
			config,
			book: book.clone(),
			source,
			publisher,
			store,
			progress: progress.clone(),
			shutdown: shutdown.clone(),
		};

		let thread_handle = thread::Builder::new()
			.name("matching-loop".to_string())
			.spawn(move || worker.run())
			.expect("failed to spawn matching loop thread");

		Ok(Self {
			thread_handle: Some(thread_handle),
			snapshotter: Some(snapshotter),
			shutdown,
			book,
			progress,
		})
	}

	/// Current progress counters and state
	pub fn progress(&self) -> ProgressView {
		self.progress.lock().expect("progress lock poisoned").view()
	}

	pub fn state(&self) -> EngineState {
		self.progress.lock().expect("progress lock poisoned").state()
	}

	/// Shared handle to the book, for read-only inspection
	pub fn book(&self) -> Arc<RwLock<OrderBook>> {
		self.book.clone()
	}

	/// Cancel both tasks and wait for the drain to complete
	pub fn shutdown(mut self) {
		info!(target: "engine", "shutting down engine");
		self.shutdown.store(true, Ordering::Relaxed);

		if let Some(handle) = self.thread_handle.take()
			&& let Err(e) = handle.join()
		{
			warn!(target: "engine", error = ?e, "matching loop thread panicked");
		}
		if let Some(snapshotter) = self.snapshotter.take() {
			snapshotter.join();
		}
	}
}

impl Drop for Engine {
	fn drop(&mut self) {
		self.shutdown.store(true, Ordering::Relaxed);
		if let Some(handle) = self.thread_handle.take() {
			let _ = handle.join();
		}
	}
}

/// The moving parts owned by the matching loop thread
struct Worker {
	config: EngineConfig,
	book: Arc<RwLock<OrderBook>>,
	source: Box<dyn OrderSource>,
	publisher: Box<dyn MatchPublisher>,
	store: Arc<Mutex<Box<dyn SnapshotStore>>>,
	progress: Arc<Mutex<Progress>>,
	shutdown: Arc<AtomicBool>,
}

impl Worker {
	fn run(mut self) {
		self.set_state(EngineState::Running);
		info!(target: "engine", pair = %self.config.pair, "matching loop started");

		let mut source_backoff = RETRY_BACKOFF_MIN;
		loop {
			if self.shutdown.load(Ordering::Relaxed) {
				self.drain();
				return;
			}

			let record = match self.source.poll(POLL_TIMEOUT) {
				Ok(Some(record)) => {
					source_backoff = RETRY_BACKOFF_MIN;
					record
				}
				Ok(None) => continue,
				Err(e) => {
					warn!(target: "engine", error = %e, "source read failed, backing off");
					thread::sleep(source_backoff);
					source_backoff = (source_backoff * 2).min(RETRY_BACKOFF_MAX);
					continue;
				}
			};

			let (offset, cmd) = record;
			if let Err(e) = self.process(offset, &cmd) {
				self.fail(offset, &cmd, &e);
				return;
			}
		}
	}

	/// Handle one `(offset, command)` record
	///
	/// Returns an error only for fatal conditions; validation failures
	/// are logged, skipped and still advance the offset.
	fn process(&mut self, offset: u64, cmd: &OrderCommand) -> Result<(), EngineError> {
		let processed = self
			.progress
			.lock()
			.expect("progress lock poisoned")
			.processed_offset();
		if let Some(p) = processed {
			if offset <= p {
				debug!(target: "engine", offset, "duplicate delivery ignored");
				let _ = self.source.ack(offset);
				return Ok(());
			}
			if offset > p + 1 {
				return Err(EngineError::OffsetGap {
					expected: p + 1,
					found: offset,
				});
			}
		}

		let book_handle = self.book.clone();
		{
			let mut book = book_handle.write().expect("book lock poisoned");
			match apply(&mut book, cmd) {
				Ok(matches) => {
					if !self.publish_matches(offset, &matches) {
						// Abandoned mid-drain; the offset stays
						// unprocessed and will be redelivered.
						return Ok(());
					}
					let mut progress = self.progress.lock().expect("progress lock poisoned");
					progress.record_processed(offset);
					progress.add_matches(matches.len() as u64);
				}
				Err(e) if e.is_invariant() => return Err(e.into()),
				Err(e) => {
					warn!(
						target: "engine",
						offset,
						command = %cmd.summary(),
						error = %e,
						"command rejected, skipping"
					);
					self.progress
						.lock()
						.expect("progress lock poisoned")
						.record_processed(offset);
				}
			}
		}

		if let Err(e) = self.source.ack(offset) {
			warn!(
				target: "engine",
				offset,
				error = %e,
				"ack failed; duplicate filtering covers redelivery"
			);
		}
		Ok(())
	}

	/// Forward matches to the publisher in order, retrying transient
	/// failures with bounded backoff
	///
	/// Returns false when cancellation fires while a publish is still
	/// failing; the caller then leaves the offset unprocessed.
	fn publish_matches(&mut self, offset: u64, matches: &[Match]) -> bool {
		for (i, m) in matches.iter().enumerate() {
			let event = MatchEvent {
				match_id: format!("{}-{}", m.taker_order_id(), i),
				timestamp: m.timestamp,
				symbol: self.config.pair.clone(),
				price: m.price,
				volume: m.size_filled,
				buy_order_id: m.bid_order_id.clone(),
				sell_order_id: m.ask_order_id.clone(),
				taker_side: m.taker_side,
			};

			let mut backoff = RETRY_BACKOFF_MIN;
			loop {
				match self.publisher.publish(&event) {
					Ok(()) => break,
					Err(e) => {
						if self.shutdown.load(Ordering::Relaxed) {
							warn!(
								target: "engine",
								offset,
								match_id = %event.match_id,
								error = %e,
								"publish abandoned during drain; offset will be redelivered"
							);
							return false;
						}
						warn!(
							target: "engine",
							offset,
							match_id = %event.match_id,
							error = %e,
							"publish failed, retrying"
						);
						thread::sleep(backoff);
						backoff = (backoff * 2).min(RETRY_BACKOFF_MAX);
					}
				}
			}
		}
		true
	}

	/// Stop reading, write a final snapshot, and stop
	fn drain(&mut self) {
		self.set_state(EngineState::Draining);
		info!(target: "engine", "draining matching loop");

		let snapshot = {
			let book = self.book.read().expect("book lock poisoned");
			let offset = self
				.progress
				.lock()
				.expect("progress lock poisoned")
				.processed_offset();
			offset.map(|offset| {
				let mut snapshot = book.snapshot();
				snapshot.order_offset = offset;
				snapshot
			})
		};

		if let Some(snapshot) = snapshot {
			let result = self
				.store
				.lock()
				.expect("store lock poisoned")
				.store(&snapshot);
			match result {
				Ok(()) => {
					self.progress
						.lock()
						.expect("progress lock poisoned")
						.record_snapshot(snapshot.order_offset);
					info!(
						target: "engine",
						offset = snapshot.order_offset,
						orders = snapshot.orders.len(),
						"final snapshot written"
					);
				}
				Err(e) => {
					warn!(target: "engine", error = %e, "final snapshot failed");
				}
			}
		}

		self.set_state(EngineState::Stopped);
		info!(target: "engine", "matching loop stopped");
	}

	/// Terminal failure: structured diagnostic, no further snapshots
	fn fail(&mut self, offset: u64, cmd: &OrderCommand, error: &EngineError) {
		error!(
			target: "engine",
			offset,
			command = %cmd.summary(),
			error = %error,
			"fatal engine error, halting"
		);
		self.set_state(EngineState::Failed);
		self.shutdown.store(true, Ordering::Relaxed);
	}

	fn set_state(&self, state: EngineState) {
		self.progress
			.lock()
			.expect("progress lock poisoned")
			.set_state(state);
	}
}

/// Dispatch one command against the book
fn apply(book: &mut OrderBook, cmd: &OrderCommand) -> Result<Vec<Match>, BookError> {
	match cmd {
		OrderCommand::Limit {
			order_id,
			user_id,
			side,
			size,
			price,
			timestamp,
		} => {
			let order = Order::new(order_id.clone(), user_id.clone(), *side, *size, *timestamp);
			book.place_limit(*price, order)?;
			Ok(Vec::new())
		}
		OrderCommand::Market {
			order_id,
			user_id,
			side,
			size,
			timestamp,
		} => {
			let mut order = Order::new(order_id.clone(), user_id.clone(), *side, *size, *timestamp);
			let matches = book.place_market(&mut order)?;
			if !order.is_filled() {
				// Unfilled remainder is dropped, never promoted to a
				// resting limit.
				debug!(
					target: "engine",
					order_id = %order.id,
					remaining = order.size,
					"market order exhausted the book"
				);
			}
			Ok(matches)
		}
		OrderCommand::Cancel { order_id } => {
			book.cancel(order_id)?;
			Ok(Vec::new())
		}
	}
}
