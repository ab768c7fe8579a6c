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

mod limit;
mod order;

pub use limit::Limit;
pub use order::Order;

use std::collections::{BTreeMap, HashMap};

use flint_sdk::types::Side;
use ordered_float::OrderedFloat;
use thiserror::Error;

use crate::snapshot::{Snapshot, SnapshotOrder};

/// Tolerance for floating-point volume comparisons
pub const VOLUME_EPSILON: f64 = 1e-9;

/// Errors surfaced by order book operations
///
/// Validation errors reject a single command and are recoverable;
/// invariant errors mean the book's internal state is no longer
/// trustworthy and the engine must stop.
#[derive(Debug, Error)]
pub enum BookError {
	#[error("invalid price: {0}")]
	InvalidPrice(f64),
	#[error("invalid size: {0}")]
	InvalidSize(f64),
	#[error("empty order id")]
	EmptyOrderId,
	#[error("duplicate order id: {0}")]
	DuplicateOrderId(String),
	#[error("unknown order id: {0}")]
	UnknownOrderId(String),
	#[error("volume mismatch at price {price}: cached {cached}, actual {actual}")]
	VolumeMismatch {
		price: f64,
		cached: f64,
		actual: f64,
	},
	#[error("limit state corrupt at price {price}: {reason}")]
	LimitStateCorrupt { price: f64, reason: String },
	#[error("order id index desynchronized: {0}")]
	IdIndexDesync(String),
}

impl BookError {
	/// Whether this error indicates corrupted book state rather than a
	/// rejected command
	pub fn is_invariant(&self) -> bool {
		matches!(
			self,
			BookError::VolumeMismatch { .. }
				| BookError::LimitStateCorrupt { .. }
				| BookError::IdIndexDesync(_)
		)
	}
}

/// A single fill between a resting and an incoming order
///
/// `price` is always the resting side's price; `timestamp` is the taker
/// order's arrival time so replaying the log reproduces it exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
	pub ask_order_id: String,
	pub bid_order_id: String,
	pub size_filled: f64,
	pub price: f64,
	pub taker_side: Side,
	pub timestamp: u64,
}

impl Match {
	/// Id of the resting (maker) order
	pub fn maker_order_id(&self) -> &str {
		match self.taker_side {
			Side::Bid => &self.ask_order_id,
			Side::Ask => &self.bid_order_id,
		}
	}

	/// Id of the incoming (taker) order
	pub fn taker_order_id(&self) -> &str {
		match self.taker_side {
			Side::Bid => &self.bid_order_id,
			Side::Ask => &self.ask_order_id,
		}
	}
}

/// Where a resting order lives; the id index stores this instead of a
/// back-pointer into the owning level
#[derive(Debug, Clone, Copy, PartialEq)]
struct OrderLocation {
	side: Side,
	price: OrderedFloat<f64>,
}

/// Limit order book for a single pair
///
/// Two sorted price maps (asks ascending, bids iterated descending)
/// plus an id index over every resting order. All mutation goes through
/// `place_limit`, `place_market` and `cancel`; empty levels are removed
/// eagerly so every retained `Limit` is non-empty.
#[derive(Debug, Default)]
pub struct OrderBook {
	bids: BTreeMap<OrderedFloat<f64>, Limit>,
	asks: BTreeMap<OrderedFloat<f64>, Limit>,
	orders: HashMap<String, OrderLocation>,
}

impl OrderBook {
	pub fn new() -> Self {
		Self::default()
	}

	/// Rest a limit order at `price` on the order's side
	///
	/// The caller decides whether the order should have crossed first;
	/// by the time it reaches the book it rests unconditionally.
	pub fn place_limit(&mut self, price: f64, order: Order) -> Result<(), BookError> {
		if !price.is_finite() || price <= 0.0 {
			return Err(BookError::InvalidPrice(price));
		}
		if order.id.is_empty() {
			return Err(BookError::EmptyOrderId);
		}
		if !order.size.is_finite() || order.size <= 0.0 {
			return Err(BookError::InvalidSize(order.size));
		}
		if self.orders.contains_key(&order.id) {
			return Err(BookError::DuplicateOrderId(order.id));
		}

		let key = OrderedFloat(price);
		let side = order.side;
		let order_id = order.id.clone();

		let map = match side {
			Side::Bid => &mut self.bids,
			Side::Ask => &mut self.asks,
		};
		let limit = map.entry(key).or_insert_with(|| Limit::new(price));
		if let Err(e) = limit.add(order) {
			if limit.is_empty() {
				map.remove(&key);
			}
			return Err(e);
		}

		self.orders.insert(order_id, OrderLocation { side, price: key });
		Ok(())
	}

	/// Match an order against opposite-side liquidity, best price first
	///
	/// Walks ask levels ascending for a bid taker, bid levels descending
	/// for an ask taker, until the order is filled or the side is
	/// exhausted. An unfilled remainder stays on the order and is NOT
	/// promoted to a resting limit. No liquidity at all is not an error:
	/// the call returns an empty match list.
	pub fn place_market(&mut self, order: &mut Order) -> Result<Vec<Match>, BookError> {
		if order.id.is_empty() {
			return Err(BookError::EmptyOrderId);
		}
		if !order.size.is_finite() || order.size <= 0.0 {
			return Err(BookError::InvalidSize(order.size));
		}

		let book_side = order.side.opposite();
		let mut matches = Vec::new();

		while !order.is_filled() {
			let best = match book_side {
				Side::Ask => self.asks.keys().next().copied(),
				Side::Bid => self.bids.keys().next_back().copied(),
			};
			let Some(key) = best else { break };

			let map = match book_side {
				Side::Ask => &mut self.asks,
				Side::Bid => &mut self.bids,
			};
			let Some(limit) = map.get_mut(&key) else { break };

			let fills = limit.fill(order);
			if fills.is_empty() {
				break;
			}

			for m in &fills {
				let maker_id = m.maker_order_id();
				if !limit.contains(maker_id) {
					self.orders.remove(maker_id);
				}
			}
			if limit.is_empty() {
				map.remove(&key);
			}

			matches.extend(fills);
		}

		Ok(matches)
	}

	/// Remove a resting order; drops its level if that empties it
	pub fn cancel(&mut self, order_id: &str) -> Result<Order, BookError> {
		let loc = self
			.orders
			.get(order_id)
			.copied()
			.ok_or_else(|| BookError::UnknownOrderId(order_id.to_string()))?;

		let map = match loc.side {
			Side::Bid => &mut self.bids,
			Side::Ask => &mut self.asks,
		};
		let limit = map
			.get_mut(&loc.price)
			.ok_or_else(|| BookError::IdIndexDesync(order_id.to_string()))?;

		let order = limit
			.remove(order_id)
			.map_err(|_| BookError::IdIndexDesync(order_id.to_string()))?;
		if limit.is_empty() {
			map.remove(&loc.price);
		}
		self.orders.remove(order_id);
		Ok(order)
	}

	/// Ask levels, best (lowest) price first
	pub fn asks(&self) -> impl Iterator<Item = &Limit> {
		self.asks.values()
	}

	/// Bid levels, best (highest) price first
	pub fn bids(&self) -> impl Iterator<Item = &Limit> {
		self.bids.values().rev()
	}

	pub fn best_ask(&self) -> Option<f64> {
		self.asks.keys().next().map(|p| p.into_inner())
	}

	pub fn best_bid(&self) -> Option<f64> {
		self.bids.keys().next_back().map(|p| p.into_inner())
	}

	pub fn ask_total_volume(&self) -> f64 {
		self.asks.values().map(Limit::total_volume).sum()
	}

	pub fn bid_total_volume(&self) -> f64 {
		self.bids.values().map(Limit::total_volume).sum()
	}

	/// Number of resting orders across both sides
	pub fn resting_orders(&self) -> usize {
		self.orders.len()
	}

	/// Look up a resting order by id
	pub fn order(&self, order_id: &str) -> Option<&Order> {
		let loc = self.orders.get(order_id)?;
		let map = match loc.side {
			Side::Bid => &self.bids,
			Side::Ask => &self.asks,
		};
		map.get(&loc.price)?.orders().find(|o| o.id == order_id)
	}

	/// Export every resting order
	///
	/// `order_offset` is left at zero; the engine stamps it with the
	/// processed offset before persisting. Entry order is unspecified.
	pub fn snapshot(&self) -> Snapshot {
		let mut orders = Vec::with_capacity(self.orders.len());
		for limit in self.asks.values().chain(self.bids.values()) {
			for o in limit.orders() {
				orders.push(SnapshotOrder {
					order_id: o.id.clone(),
					user_id: o.user_id.clone(),
					side: o.side,
					price: limit.price(),
					size: o.size,
					arrival_ts: o.arrival_ts,
				});
			}
		}
		Snapshot {
			order_offset: 0,
			orders,
		}
	}

	/// Rebuild the book from a snapshot
	///
	/// Clears all state, then re-inserts every entry through the same
	/// append path as `place_limit`. Any failure leaves the book
	/// unusable and must be treated as fatal by the caller.
	pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), BookError> {
		self.bids.clear();
		self.asks.clear();
		self.orders.clear();

		for entry in &snapshot.orders {
			let order = Order::new(
				entry.order_id.clone(),
				entry.user_id.clone(),
				entry.side,
				entry.size,
				entry.arrival_ts,
			);
			self.place_limit(entry.price, order)?;
		}
		self.check_invariants()
	}

	/// Verify the structural invariants of the book
	///
	/// Recomputes per-level volumes against the caches, checks that
	/// every level is non-empty and keyed by its own price, and that
	/// the id index covers exactly the resting orders.
	pub fn check_invariants(&self) -> Result<(), BookError> {
		let ask_count = Self::check_side(Side::Ask, &self.asks, &self.orders)?;
		let bid_count = Self::check_side(Side::Bid, &self.bids, &self.orders)?;

		if ask_count + bid_count != self.orders.len() {
			return Err(BookError::IdIndexDesync(format!(
				"index holds {} orders, book holds {}",
				self.orders.len(),
				ask_count + bid_count
			)));
		}
		Ok(())
	}

	fn check_side(
		side: Side,
		map: &BTreeMap<OrderedFloat<f64>, Limit>,
		index: &HashMap<String, OrderLocation>,
	) -> Result<usize, BookError> {
		let mut count = 0;
		for (key, limit) in map {
			let price = key.into_inner();
			if price <= 0.0 || limit.price() != price {
				return Err(BookError::LimitStateCorrupt {
					price,
					reason: format!("level keyed at {price} reports price {}", limit.price()),
				});
			}
			if limit.is_empty() {
				return Err(BookError::LimitStateCorrupt {
					price,
					reason: "empty level retained in side map".to_string(),
				});
			}

			let actual: f64 = limit.orders().map(|o| o.size).sum();
			if (actual - limit.total_volume()).abs() > VOLUME_EPSILON {
				return Err(BookError::VolumeMismatch {
					price,
					cached: limit.total_volume(),
					actual,
				});
			}

			for o in limit.orders() {
				if o.size <= 0.0 {
					return Err(BookError::LimitStateCorrupt {
						price,
						reason: format!("resting order {} has size {}", o.id, o.size),
					});
				}
				match index.get(&o.id) {
					Some(loc) if loc.side == side && loc.price == *key => {}
					_ => return Err(BookError::IdIndexDesync(o.id.clone())),
				}
				count += 1;
			}
		}
		Ok(count)
	}
}
