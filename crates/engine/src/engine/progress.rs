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

/// Lifecycle of the engine
///
/// `Initialising` covers snapshot load and source seek. `Running` is
/// the main loop. Cancellation moves the loop to `Draining` (flush,
/// final snapshot) and then `Stopped`. An invariant violation moves it
/// to `Failed`, which is terminal: no further snapshots are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
	Initialising,
	Running,
	Draining,
	Stopped,
	Failed,
}

/// Stream-progress counters shared between the writer loop and the
/// snapshot task
///
/// Guarded by its own mutex so diagnostic readers never touch the book
/// lock. `processed_offset` is `None` until the first command has been
/// applied on a cold start with no snapshot.
#[derive(Debug)]
pub struct Progress {
	processed_offset: Option<u64>,
	last_snapshot_offset: Option<u64>,
	total_matches: u64,
	state: EngineState,
}

/// Point-in-time copy of the progress counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressView {
	pub state: EngineState,
	pub processed_offset: Option<u64>,
	pub last_snapshot_offset: Option<u64>,
	pub total_matches: u64,
}

impl Progress {
	pub fn new(restored_offset: Option<u64>) -> Self {
		Self {
			processed_offset: restored_offset,
			last_snapshot_offset: restored_offset,
			total_matches: 0,
			state: EngineState::Initialising,
		}
	}

	pub fn view(&self) -> ProgressView {
		ProgressView {
			state: self.state,
			processed_offset: self.processed_offset,
			last_snapshot_offset: self.last_snapshot_offset,
			total_matches: self.total_matches,
		}
	}

	pub fn state(&self) -> EngineState {
		self.state
	}

	pub fn set_state(&mut self, state: EngineState) {
		self.state = state;
	}

	pub fn processed_offset(&self) -> Option<u64> {
		self.processed_offset
	}

	/// Advance the processed offset; never moves backwards
	pub fn record_processed(&mut self, offset: u64) {
		if self.processed_offset.is_none_or(|p| offset > p) {
			self.processed_offset = Some(offset);
		}
	}

	/// Record a successfully persisted snapshot; never rolls back
	pub fn record_snapshot(&mut self, offset: u64) {
		if self.last_snapshot_offset.is_none_or(|s| offset > s) {
			self.last_snapshot_offset = Some(offset);
		}
	}

	pub fn add_matches(&mut self, count: u64) {
		self.total_matches += count;
	}

	/// Whether the offset delta since the last snapshot warrants a new
	/// one; `None` while nothing has been processed
	pub fn snapshot_due(&self, offset_delta: u64) -> Option<u64> {
		let processed = self.processed_offset?;
		match self.last_snapshot_offset {
			None => Some(processed),
			Some(last) if processed.saturating_sub(last) >= offset_delta => Some(processed),
			Some(_) => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_processed_offset_is_monotonic() {
		let mut progress = Progress::new(None);
		progress.record_processed(5);
		progress.record_processed(3);
		assert_eq!(progress.processed_offset(), Some(5));
	}

	#[test]
	fn test_snapshot_offset_never_rolls_back() {
		let mut progress = Progress::new(Some(10));
		progress.record_snapshot(4);
		assert_eq!(progress.view().last_snapshot_offset, Some(10));
	}

	#[test]
	fn test_snapshot_due_respects_delta() {
		let mut progress = Progress::new(None);
		assert_eq!(progress.snapshot_due(10), None);

		progress.record_processed(0);
		// First snapshot is always due once something has been applied
		assert_eq!(progress.snapshot_due(10), Some(0));

		progress.record_snapshot(0);
		progress.record_processed(5);
		assert_eq!(progress.snapshot_due(10), None);

		progress.record_processed(10);
		assert_eq!(progress.snapshot_due(10), Some(10));
	}

	#[test]
	fn test_restored_offset_seeds_both_counters() {
		let progress = Progress::new(Some(42));
		let view = progress.view();
		assert_eq!(view.processed_offset, Some(42));
		assert_eq!(view.last_snapshot_offset, Some(42));
		assert_eq!(view.state, EngineState::Initialising);
	}
}
