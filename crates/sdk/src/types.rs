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

use serde::{Deserialize, Serialize};

/// Order side (bid or ask)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
	Bid,
	Ask,
}

impl Side {
	/// The side a taker order matches against
	pub fn opposite(self) -> Side {
		match self {
			Side::Bid => Side::Ask,
			Side::Ask => Side::Bid,
		}
	}
}

/// Command consumed from the ordered input log
///
/// Each record is tagged by the source with a monotonic offset; the
/// offset travels next to the command, not inside it. Delivery is
/// at-least-once with stable ordering - the engine filters duplicates
/// by offset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OrderCommand {
	/// Place a limit order that rests in the book
	Limit {
		order_id: String,
		user_id: String,
		side: Side,
		size: f64,
		price: f64,
		/// Arrival timestamp in nanoseconds (time-priority key)
		timestamp: u64,
	},
	/// Place a market order that consumes opposite-side liquidity
	Market {
		order_id: String,
		user_id: String,
		side: Side,
		size: f64,
		timestamp: u64,
	},
	/// Cancel a resting order by id
	Cancel { order_id: String },
}

impl OrderCommand {
	/// The order id this command refers to
	pub fn order_id(&self) -> &str {
		match self {
			OrderCommand::Limit { order_id, .. } => order_id,
			OrderCommand::Market { order_id, .. } => order_id,
			OrderCommand::Cancel { order_id } => order_id,
		}
	}

	/// Short human-readable summary for diagnostics
	pub fn summary(&self) -> String {
		match self {
			OrderCommand::Limit {
				order_id,
				side,
				size,
				price,
				..
			} => format!("limit {order_id} {side:?} {size} @ {price}"),
			OrderCommand::Market {
				order_id,
				side,
				size,
				..
			} => format!("market {order_id} {side:?} {size}"),
			OrderCommand::Cancel { order_id } => format!("cancel {order_id}"),
		}
	}
}

/// Match event published to the output stream
///
/// One event per fill. The `match_id` is derived from the taker order id
/// and the fill index within that taker's apply, so replaying the same
/// input log reproduces identical ids. `timestamp` is the taker order's
/// arrival time, kept deterministic under replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
	pub match_id: String,
	/// Taker arrival timestamp in nanoseconds
	pub timestamp: u64,
	/// Engine's configured pair, e.g. "BTC-USD"
	pub symbol: String,
	pub price: f64,
	pub volume: f64,
	pub buy_order_id: String,
	pub sell_order_id: String,
	/// Side of the incoming (taker) order
	pub taker_side: Side,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_command_wire_shape() {
		let cmd = OrderCommand::Limit {
			order_id: "o-1".to_string(),
			user_id: "u-1".to_string(),
			side: Side::Bid,
			size: 2.5,
			price: 100.0,
			timestamp: 1_000,
		};

		let json = serde_json::to_value(&cmd).unwrap();
		assert_eq!(json["type"], "limit");
		assert_eq!(json["side"], "bid");
		assert_eq!(json["price"], 100.0);

		let back: OrderCommand = serde_json::from_value(json).unwrap();
		assert_eq!(back.order_id(), "o-1");
	}

	#[test]
	fn test_cancel_has_no_side() {
		let cmd = OrderCommand::Cancel {
			order_id: "o-9".to_string(),
		};
		let json = serde_json::to_value(&cmd).unwrap();
		assert_eq!(json["type"], "cancel");
		assert!(json.get("side").is_none());
	}

	#[test]
	fn test_opposite_side() {
		assert_eq!(Side::Bid.opposite(), Side::Ask);
		assert_eq!(Side::Ask.opposite(), Side::Bid);
	}
}
