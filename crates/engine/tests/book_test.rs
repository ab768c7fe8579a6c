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

//! Order book property tests
//!
//! These exercise the book through its public API:
//! - volume accounting stays consistent under arbitrary operation mixes
//! - FIFO priority within a level, price priority across levels
//! - matching conserves size
//! - snapshot/restore round-trips to an equivalent book

use flint_engine::{Order, OrderBook, VOLUME_EPSILON};
use flint_sdk::types::Side;
use rand::{Rng, SeedableRng, rngs::StdRng};

fn order(id: &str, side: Side, size: f64, arrival_ts: u64) -> Order {
	Order::new(id, "u-1", side, size, arrival_ts)
}

/// Recompute every cached volume from the resting orders and compare
fn assert_volumes_consistent(book: &OrderBook) {
	for limit in book.asks().chain(book.bids()) {
		let actual: f64 = limit.orders().map(|o| o.size).sum();
		assert!(
			(actual - limit.total_volume()).abs() <= VOLUME_EPSILON,
			"volume drifted at price {}: cached {} actual {}",
			limit.price(),
			limit.total_volume(),
			actual
		);
	}
}

#[test]
fn test_fifo_priority_within_level() {
	let mut book = OrderBook::new();
	book.place_limit(100.0, order("early", Side::Ask, 5.0, 1_000))
		.unwrap();
	book.place_limit(100.0, order("late", Side::Ask, 5.0, 2_000))
		.unwrap();

	let mut taker = order("taker", Side::Bid, 6.0, 9_000);
	let matches = book.place_market(&mut taker).unwrap();

	assert_eq!(matches.len(), 2);
	assert_eq!(matches[0].ask_order_id, "early");
	assert_eq!(matches[0].size_filled, 5.0);
	assert_eq!(matches[1].ask_order_id, "late");
	assert_eq!(matches[1].size_filled, 1.0);
}

#[test]
fn test_fifo_tie_broken_by_insertion() {
	let mut book = OrderBook::new();
	book.place_limit(100.0, order("first", Side::Bid, 2.0, 1_000))
		.unwrap();
	book.place_limit(100.0, order("second", Side::Bid, 2.0, 1_000))
		.unwrap();

	let mut taker = order("taker", Side::Ask, 2.0, 9_000);
	let matches = book.place_market(&mut taker).unwrap();

	assert_eq!(matches.len(), 1);
	assert_eq!(matches[0].bid_order_id, "first");
}

#[test]
fn test_price_priority_for_bid_taker() {
	let mut book = OrderBook::new();
	book.place_limit(101.0, order("worse", Side::Ask, 5.0, 1_000))
		.unwrap();
	book.place_limit(100.0, order("best", Side::Ask, 5.0, 2_000))
		.unwrap();

	let mut taker = order("taker", Side::Bid, 1.0, 9_000);
	let matches = book.place_market(&mut taker).unwrap();

	assert_eq!(matches.len(), 1);
	assert_eq!(matches[0].ask_order_id, "best");
	assert_eq!(matches[0].price, 100.0);
}

#[test]
fn test_price_priority_for_ask_taker() {
	let mut book = OrderBook::new();
	book.place_limit(99.0, order("worse", Side::Bid, 5.0, 1_000))
		.unwrap();
	book.place_limit(100.0, order("best", Side::Bid, 5.0, 2_000))
		.unwrap();

	let mut taker = order("taker", Side::Ask, 1.0, 9_000);
	let matches = book.place_market(&mut taker).unwrap();

	assert_eq!(matches.len(), 1);
	assert_eq!(matches[0].bid_order_id, "best");
	assert_eq!(matches[0].price, 100.0);
}

#[test]
fn test_matching_conserves_size() {
	let mut book = OrderBook::new();
	book.place_limit(100.0, order("a-1", Side::Ask, 4.0, 1_000))
		.unwrap();
	book.place_limit(101.0, order("a-2", Side::Ask, 6.0, 2_000))
		.unwrap();
	let resting_before = book.ask_total_volume();

	let mut taker = order("taker", Side::Bid, 7.0, 9_000);
	let taker_before = taker.size;
	let matches = book.place_market(&mut taker).unwrap();

	let filled: f64 = matches.iter().map(|m| m.size_filled).sum();
	assert!((filled - (taker_before - taker.size)).abs() <= VOLUME_EPSILON);
	assert!((filled - (resting_before - book.ask_total_volume())).abs() <= VOLUME_EPSILON);
	assert_volumes_consistent(&book);
}

#[test]
fn test_snapshot_restore_preserves_matching_behaviour() {
	let mut book = OrderBook::new();
	book.place_limit(9_900.0, order("b-1", Side::Bid, 8.0, 1_000))
		.unwrap();
	book.place_limit(9_800.0, order("b-2", Side::Bid, 3.0, 2_000))
		.unwrap();
	book.place_limit(10_100.0, order("a-1", Side::Ask, 10.0, 3_000))
		.unwrap();
	book.place_limit(10_100.0, order("a-2", Side::Ask, 5.0, 4_000))
		.unwrap();

	let mut restored = OrderBook::new();
	restored.restore(&book.snapshot()).unwrap();

	// Same shape on both sides
	let levels = |b: &OrderBook| -> Vec<(f64, f64, usize)> {
		b.asks()
			.chain(b.bids())
			.map(|l| (l.price(), l.total_volume(), l.len()))
			.collect()
	};
	assert_eq!(levels(&restored), levels(&book));

	// Same orders, identity included
	for original in book.asks().chain(book.bids()).flat_map(|l| l.orders()) {
		let twin = restored.order(&original.id).expect("order lost in restore");
		assert_eq!(twin.user_id, original.user_id);
		assert_eq!(twin.side, original.side);
		assert_eq!(twin.arrival_ts, original.arrival_ts);
		assert!((twin.size - original.size).abs() <= VOLUME_EPSILON);
	}

	// Same subsequent match stream
	let mut taker_a = order("t-1", Side::Bid, 12.0, 9_000);
	let mut taker_b = order("t-1", Side::Bid, 12.0, 9_000);
	let original_matches = book.place_market(&mut taker_a).unwrap();
	let restored_matches = restored.place_market(&mut taker_b).unwrap();
	assert_eq!(original_matches, restored_matches);
}

#[test]
fn test_random_operation_sweep_keeps_invariants() {
	let mut rng = StdRng::seed_from_u64(7);
	let mut book = OrderBook::new();
	let mut live: Vec<String> = Vec::new();
	let mut next_id = 0u64;

	for step in 0..2_000 {
		let roll: f64 = rng.random();
		if roll < 0.55 {
			let id = format!("o-{next_id}");
			next_id += 1;
			let side = if rng.random_bool(0.5) {
				Side::Bid
			} else {
				Side::Ask
			};
			let price = rng.random_range(90..110) as f64;
			let size = rng.random_range(1..50) as f64 / 4.0;
			book.place_limit(price, order(&id, side, size, step as u64))
				.unwrap();
			live.push(id);
		} else if roll < 0.8 {
			let id = format!("t-{next_id}");
			next_id += 1;
			let side = if rng.random_bool(0.5) {
				Side::Bid
			} else {
				Side::Ask
			};
			let size = rng.random_range(1..80) as f64 / 4.0;
			let mut taker = order(&id, side, size, step as u64);
			let matches = book.place_market(&mut taker).unwrap();
			for m in &matches {
				assert!(m.size_filled > 0.0);
				assert!(m.price > 0.0);
			}
			live.retain(|id| book.order(id).is_some());
		} else if !live.is_empty() {
			let at = rng.random_range(0..live.len());
			let id = live.swap_remove(at);
			book.cancel(&id).unwrap();
		}

		book.check_invariants().unwrap();
		assert_volumes_consistent(&book);
	}
}
