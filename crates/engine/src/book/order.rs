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

use flint_sdk::types::Side;

/// A single order resting in (or matching against) the book
///
/// Identity is fixed at construction; `size` is the remaining quantity
/// and only the matching algorithm decrements it. `sequence` is stamped
/// by the owning price level at insertion and breaks ties between
/// orders with equal arrival timestamps.
#[derive(Debug, Clone)]
pub struct Order {
	pub id: String,
	pub user_id: String,
	pub side: Side,
	/// Remaining size; strictly positive while resting
	pub size: f64,
	/// Arrival timestamp in nanoseconds (time-priority key)
	pub arrival_ts: u64,
	/// Insertion sequence within the owning price level
	pub(crate) sequence: u64,
}

impl Order {
	pub fn new(id: impl Into<String>, user_id: impl Into<String>, side: Side, size: f64, arrival_ts: u64) -> Self {
		Self {
			id: id.into(),
			user_id: user_id.into(),
			side,
			size,
			arrival_ts,
			sequence: 0,
		}
	}

	/// Whether the order has been fully consumed
	///
	/// Terminal: a filled order is removed from its level and never
	/// observed again.
	pub fn is_filled(&self) -> bool {
		self.size == 0.0
	}

	/// Time-priority key: earlier arrival first, insertion order on ties
	pub(crate) fn priority(&self) -> (u64, u64) {
		(self.arrival_ts, self.sequence)
	}
}
