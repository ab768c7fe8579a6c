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

use flint_sdk::types::MatchEvent;
use thiserror::Error;

/// Errors surfaced by the match publisher; all transient
#[derive(Debug, Error)]
pub enum PublishError {
	#[error("publisher unavailable: {0}")]
	Unavailable(String),
}

/// Sink for the output match stream
///
/// The engine calls `publish` in the exact order matches are produced
/// and exactly once per match per successful apply. A transient error
/// makes the engine retry the same event; across restarts the stream is
/// at-least-once, so consumers dedup on the event's identifying fields.
/// Durability beyond a successful return is the publisher's problem.
pub trait MatchPublisher: Send {
	fn publish(&mut self, event: &MatchEvent) -> Result<(), PublishError>;
}

/// In-memory publisher collecting events into a shared vector
///
/// Clones share the same vector, so a test can hand one end to the
/// engine and read the stream through the other.
#[derive(Clone, Default)]
pub struct MemoryMatchPublisher {
	events: Arc<Mutex<Vec<MatchEvent>>>,
}

impl MemoryMatchPublisher {
	pub fn new() -> Self {
		Self::default()
	}

	/// Copy of the published stream, in publish order
	pub fn events(&self) -> Vec<MatchEvent> {
		self.events.lock().expect("publisher lock poisoned").clone()
	}

	pub fn len(&self) -> usize {
		self.events.lock().expect("publisher lock poisoned").len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl MatchPublisher for MemoryMatchPublisher {
	fn publish(&mut self, event: &MatchEvent) -> Result<(), PublishError> {
		self.events
			.lock()
			.map_err(|_| PublishError::Unavailable("publisher lock poisoned".to_string()))?
			.push(event.clone());
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use flint_sdk::types::Side;

	fn create_test_event(match_id: &str) -> MatchEvent {
		MatchEvent {
			match_id: match_id.to_string(),
			timestamp: 1_000,
			symbol: "BTC-USD".to_string(),
			price: 100.0,
			volume: 2.0,
			buy_order_id: "b-1".to_string(),
			sell_order_id: "a-1".to_string(),
			taker_side: Side::Bid,
		}
	}

	#[test]
	fn test_publish_preserves_order() {
		let mut publisher = MemoryMatchPublisher::new();
		publisher.publish(&create_test_event("m-1")).unwrap();
		publisher.publish(&create_test_event("m-2")).unwrap();

		let events = publisher.events();
		assert_eq!(events.len(), 2);
		assert_eq!(events[0].match_id, "m-1");
		assert_eq!(events[1].match_id, "m-2");
	}

	#[test]
	fn test_clones_share_stream() {
		let mut publisher = MemoryMatchPublisher::new();
		let reader = publisher.clone();

		publisher.publish(&create_test_event("m-1")).unwrap();
		assert_eq!(reader.len(), 1);
	}
}
