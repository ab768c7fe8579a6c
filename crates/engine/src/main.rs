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

//! Matching engine service entry point
//!
//! Wires the engine to the in-memory reference backends and runs until
//! ctrl-c. Deployment shells replace the backends with their own
//! OrderSource / MatchPublisher / SnapshotStore implementations.

use std::time::{SystemTime, UNIX_EPOCH};

use flint_engine::{
	Engine, EngineConfig, MemoryMatchPublisher, MemoryOrderSource, MemorySnapshotStore,
};
use flint_sdk::types::{OrderCommand, Side};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let config = EngineConfig::from_env()?;
	let pair = config.pair.clone();
	info!(target: "main", pair = %pair, "starting flint matching engine");

	let (source, feed) = MemoryOrderSource::new();
	let publisher = MemoryMatchPublisher::new();
	let store = MemorySnapshotStore::new(&pair);

	let engine = Engine::start(
		config,
		Box::new(source),
		Box::new(publisher.clone()),
		Box::new(store),
	)?;

	// Seed a little two-sided demo flow so the loop has something to
	// chew on until a real source is wired in.
	let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos() as u64;
	for (side, size, price) in [
		(Side::Ask, 2.0, 100.5),
		(Side::Ask, 1.0, 100.0),
		(Side::Bid, 3.0, 99.5),
	] {
		feed.append(OrderCommand::Limit {
			order_id: format!("demo-{}", Uuid::new_v4()),
			user_id: "demo".to_string(),
			side,
			size,
			price,
			timestamp: now,
		});
	}
	feed.append(OrderCommand::Market {
		order_id: format!("demo-{}", Uuid::new_v4()),
		user_id: "demo".to_string(),
		side: Side::Bid,
		size: 1.5,
		timestamp: now,
	});

	signal::ctrl_c().await?;
	info!(target: "main", matches = publisher.len(), "shutting down");
	engine.shutdown();

	Ok(())
}
