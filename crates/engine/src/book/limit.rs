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

use super::{BookError, Match, order::Order};

/// A single price level: the resting orders at one price plus a cached
/// total volume
///
/// Orders are kept in `(arrival_ts, sequence)` order. The level stamps
/// each incoming order with its next insertion sequence, so two orders
/// with the same arrival timestamp are consumed in the order they were
/// added.
#[derive(Debug, Clone)]
pub struct Limit {
	price: f64,
	orders: Vec<Order>,
	total_volume: f64,
	next_sequence: u64,
}

impl Limit {
	pub(crate) fn new(price: f64) -> Self {
		Self {
			price,
			orders: Vec::new(),
			total_volume: 0.0,
			next_sequence: 0,
		}
	}

	pub fn price(&self) -> f64 {
		self.price
	}

	/// Cached sum of resting order sizes at this level
	pub fn total_volume(&self) -> f64 {
		self.total_volume
	}

	pub fn len(&self) -> usize {
		self.orders.len()
	}

	pub fn is_empty(&self) -> bool {
		self.orders.is_empty()
	}

	pub fn contains(&self, order_id: &str) -> bool {
		self.orders.iter().any(|o| o.id == order_id)
	}

	/// Resting orders in time priority
	pub fn orders(&self) -> impl Iterator<Item = &Order> {
		self.orders.iter()
	}

	/// Append an order to the level
	///
	/// The order is stamped with the level's next sequence and placed at
	/// its time-priority position.
	pub(crate) fn add(&mut self, mut order: Order) -> Result<(), BookError> {
		if order.size <= 0.0 {
			return Err(BookError::InvalidSize(order.size));
		}

		order.sequence = self.next_sequence;
		self.next_sequence += 1;

		let at = self
			.orders
			.partition_point(|resting| resting.priority() <= order.priority());
		self.total_volume += order.size;
		self.orders.insert(at, order);
		Ok(())
	}

	/// Remove a resting order by id
	pub(crate) fn remove(&mut self, order_id: &str) -> Result<Order, BookError> {
		let at = self
			.orders
			.iter()
			.position(|o| o.id == order_id)
			.ok_or_else(|| BookError::UnknownOrderId(order_id.to_string()))?;

		let order = self.orders.remove(at);
		self.total_volume -= order.size;
		Ok(order)
	}

	/// Match an incoming order against this level
	///
	/// Consumes resting orders strictly in `(arrival_ts, sequence)`
	/// order while the incoming order has size left. Fully filled
	/// resting orders are swept out after the loop. Returns the matches
	/// in the order they were produced.
	pub(crate) fn fill(&mut self, incoming: &mut Order) -> Vec<Match> {
		let mut matches = Vec::new();

		for resting in self.orders.iter_mut() {
			if incoming.size <= 0.0 {
				break;
			}

			let trade_size = incoming.size.min(resting.size);
			let (ask_order_id, bid_order_id) = match incoming.side {
				Side::Bid => (resting.id.clone(), incoming.id.clone()),
				Side::Ask => (incoming.id.clone(), resting.id.clone()),
			};

			matches.push(Match {
				ask_order_id,
				bid_order_id,
				size_filled: trade_size,
				price: self.price,
				taker_side: incoming.side,
				timestamp: incoming.arrival_ts,
			});

			incoming.size -= trade_size;
			resting.size -= trade_size;
			self.total_volume -= trade_size;
		}

		self.orders.retain(|o| !o.is_filled());
		matches
	}
}
