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

//! Flint Matching Engine
//!
//! A single-pair spot matching engine: it consumes a totally-ordered
//! stream of order commands, maintains an in-memory limit order book
//! with price-time priority, publishes one match event per fill, and
//! periodically persists a recoverable snapshot keyed to the input
//! stream offset.
//!
//! Architecture:
//! - Single-threaded matching loop: the only writer to the book
//! - Snapshot task on a wall-clock tick, reading through a shared lock
//! - Collaborators behind three traits: OrderSource, MatchPublisher,
//!   SnapshotStore (in-memory reference implementations included)
//! - At-least-once match emission, at-most-once book-state advance

pub mod book;
pub mod config;
pub mod engine;
pub mod publish;
pub mod recovery;
pub mod snapshot;
pub mod source;

pub use book::{BookError, Limit, Match, Order, OrderBook, VOLUME_EPSILON};
pub use config::{EngineConfig, SourceStartPolicy};
pub use engine::{Engine, EngineError, EngineState, ProgressView};
pub use publish::{MatchPublisher, MemoryMatchPublisher, PublishError};
pub use snapshot::{
	MemorySnapshotStore, Snapshot, SnapshotError, SnapshotOrder, SnapshotStore, Snapshotter,
};
pub use source::{MemoryOrderSource, MemorySourceHandle, OrderSource, SeekPosition, SourceError};
