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

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam::channel::{Receiver, Sender, unbounded};
use flint_sdk::types::OrderCommand;
use thiserror::Error;

/// Errors surfaced by the order source
#[derive(Debug, Error)]
pub enum SourceError {
	#[error("source unavailable: {0}")]
	Unavailable(String),
	#[error("seek out of range: {0}")]
	SeekOutOfRange(u64),
}

/// Where to position the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekPosition {
	/// Oldest retained record
	Earliest,
	/// Past the end; only records appended after the seek are read
	Latest,
	/// A specific offset; the next poll returns that record
	Offset(u64),
}

/// Cursor over the totally-ordered input command log
///
/// Delivery is at-least-once with stable ordering: a record may be
/// handed out again after a reconnect, always tagged with its original
/// offset. The engine filters duplicates against its processed offset.
///
/// `poll` returns within roughly `timeout` even when no data arrives,
/// so the caller can observe cancellation between polls. `ack` marks a
/// record consumed; what the source does with that is backend-specific
/// (commit, watermark advance, nothing).
pub trait OrderSource: Send {
	/// Position the cursor
	fn seek(&mut self, position: SeekPosition) -> Result<(), SourceError>;

	/// Next record at or after the cursor, or `None` on timeout
	fn poll(&mut self, timeout: Duration) -> Result<Option<(u64, OrderCommand)>, SourceError>;

	/// Acknowledge a fully processed offset
	fn ack(&mut self, offset: u64) -> Result<(), SourceError>;
}

/// In-memory order source backed by a shared append-only log
///
/// `MemoryOrderSource::new` returns the consumer half plus a cloneable
/// [`MemorySourceHandle`] producers append through. Offsets are log
/// positions, assigned at append. `redeliver_from` rewinds the cursor
/// to simulate the at-least-once redelivery real sources exhibit.
pub struct MemoryOrderSource {
	log: Arc<Mutex<Vec<OrderCommand>>>,
	wakeup_rx: Receiver<()>,
	cursor: u64,
	acked: Option<u64>,
}

/// Producer half of [`MemoryOrderSource`]
#[derive(Clone)]
pub struct MemorySourceHandle {
	log: Arc<Mutex<Vec<OrderCommand>>>,
	wakeup_tx: Sender<()>,
}

impl MemoryOrderSource {
	pub fn new() -> (Self, MemorySourceHandle) {
		let log = Arc::new(Mutex::new(Vec::new()));
		let (wakeup_tx, wakeup_rx) = unbounded();

		(
			Self {
				log: log.clone(),
				wakeup_rx,
				cursor: 0,
				acked: None,
			},
			MemorySourceHandle { log, wakeup_tx },
		)
	}

	/// Rewind the cursor so already-delivered records are handed out
	/// again with their original offsets
	pub fn redeliver_from(&mut self, offset: u64) {
		self.cursor = self.cursor.min(offset);
	}

	/// Highest acknowledged offset, if any
	pub fn acked(&self) -> Option<u64> {
		self.acked
	}

	fn read_at_cursor(&mut self) -> Option<(u64, OrderCommand)> {
		let log = self.log.lock().expect("source log lock poisoned");
		let at = self.cursor as usize;
		if at < log.len() {
			let record = (self.cursor, log[at].clone());
			self.cursor += 1;
			Some(record)
		} else {
			None
		}
	}
}

impl OrderSource for MemoryOrderSource {
	fn seek(&mut self, position: SeekPosition) -> Result<(), SourceError> {
		let len = self.log.lock().expect("source log lock poisoned").len() as u64;
		self.cursor = match position {
			SeekPosition::Earliest => 0,
			SeekPosition::Latest => len,
			SeekPosition::Offset(offset) => offset,
		};
		Ok(())
	}

	fn poll(&mut self, timeout: Duration) -> Result<Option<(u64, OrderCommand)>, SourceError> {
		if let Some(record) = self.read_at_cursor() {
			return Ok(Some(record));
		}

		// Park until a producer appends or the timeout lapses; a
		// disconnected wakeup channel just means no more producers.
		let _ = self.wakeup_rx.recv_timeout(timeout);
		Ok(self.read_at_cursor())
	}

	fn ack(&mut self, offset: u64) -> Result<(), SourceError> {
		if self.acked.is_none_or(|a| offset > a) {
			self.acked = Some(offset);
		}
		Ok(())
	}
}

impl MemorySourceHandle {
	/// Append a command, returning its assigned offset
	pub fn append(&self, cmd: OrderCommand) -> u64 {
		let mut log = self.log.lock().expect("source log lock poisoned");
		let offset = log.len() as u64;
		log.push(cmd);
		let _ = self.wakeup_tx.send(());
		offset
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use flint_sdk::types::Side;

	fn create_test_command(order_id: &str) -> OrderCommand {
		OrderCommand::Limit {
			order_id: order_id.to_string(),
			user_id: "u-1".to_string(),
			side: Side::Bid,
			size: 1.0,
			price: 100.0,
			timestamp: 1_000,
		}
	}

	const POLL: Duration = Duration::from_millis(10);

	#[test]
	fn test_offsets_assigned_in_append_order() {
		let (mut source, handle) = MemoryOrderSource::new();
		assert_eq!(handle.append(create_test_command("o-0")), 0);
		assert_eq!(handle.append(create_test_command("o-1")), 1);

		let (offset, cmd) = source.poll(POLL).unwrap().unwrap();
		assert_eq!(offset, 0);
		assert_eq!(cmd.order_id(), "o-0");

		let (offset, _) = source.poll(POLL).unwrap().unwrap();
		assert_eq!(offset, 1);
	}

	#[test]
	fn test_poll_times_out_when_empty() {
		let (mut source, _handle) = MemoryOrderSource::new();
		assert!(source.poll(POLL).unwrap().is_none());
	}

	#[test]
	fn test_seek_positions_cursor() {
		let (mut source, handle) = MemoryOrderSource::new();
		handle.append(create_test_command("o-0"));
		handle.append(create_test_command("o-1"));
		handle.append(create_test_command("o-2"));

		source.seek(SeekPosition::Offset(2)).unwrap();
		let (offset, _) = source.poll(POLL).unwrap().unwrap();
		assert_eq!(offset, 2);

		source.seek(SeekPosition::Earliest).unwrap();
		let (offset, _) = source.poll(POLL).unwrap().unwrap();
		assert_eq!(offset, 0);

		source.seek(SeekPosition::Latest).unwrap();
		assert!(source.poll(POLL).unwrap().is_none());
	}

	#[test]
	fn test_redelivery_repeats_offsets() {
		let (mut source, handle) = MemoryOrderSource::new();
		handle.append(create_test_command("o-0"));
		handle.append(create_test_command("o-1"));

		source.poll(POLL).unwrap().unwrap();
		source.poll(POLL).unwrap().unwrap();

		source.redeliver_from(0);
		let (offset, cmd) = source.poll(POLL).unwrap().unwrap();
		assert_eq!(offset, 0);
		assert_eq!(cmd.order_id(), "o-0");
	}

	#[test]
	fn test_ack_tracks_high_water_mark() {
		let (mut source, _handle) = MemoryOrderSource::new();
		assert_eq!(source.acked(), None);

		source.ack(3).unwrap();
		source.ack(1).unwrap();
		assert_eq!(source.acked(), Some(3));
	}
}
