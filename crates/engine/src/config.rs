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

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::source::SeekPosition;

/// Where to position the source cursor on a cold start with no snapshot
///
/// Serialised as `"earliest"`, `"latest"`, or a literal offset number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStartPolicy {
	Earliest,
	Latest,
	Offset(u64),
}

impl SourceStartPolicy {
	pub fn seek_position(self) -> SeekPosition {
		match self {
			SourceStartPolicy::Earliest => SeekPosition::Earliest,
			SourceStartPolicy::Latest => SeekPosition::Latest,
			SourceStartPolicy::Offset(offset) => SeekPosition::Offset(offset),
		}
	}
}

impl FromStr for SourceStartPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"earliest" => Ok(SourceStartPolicy::Earliest),
			"latest" => Ok(SourceStartPolicy::Latest),
			other => other
				.parse::<u64>()
				.map(SourceStartPolicy::Offset)
				.map_err(|_| format!("expected \"earliest\", \"latest\" or an offset, got {other:?}")),
		}
	}
}

impl fmt::Display for SourceStartPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SourceStartPolicy::Earliest => write!(f, "earliest"),
			SourceStartPolicy::Latest => write!(f, "latest"),
			SourceStartPolicy::Offset(offset) => write!(f, "{offset}"),
		}
	}
}

impl Serialize for SourceStartPolicy {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for SourceStartPolicy {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = String::deserialize(deserializer)?;
		raw.parse().map_err(de::Error::custom)
	}
}

/// Matching engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
	/// Pair symbol embedded in match events
	pub pair: String,
	/// Minimum advance in processed offset between snapshots
	pub snapshot_offset_delta: u64,
	/// Wall-time tick for the snapshot task, in seconds
	pub snapshot_interval_secs: u64,
	/// Seek target on a cold start with no snapshot
	pub source_start_policy: SourceStartPolicy,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			pair: "BTC-USD".to_string(),
			snapshot_offset_delta: 1_000,
			snapshot_interval_secs: 30,
			source_start_policy: SourceStartPolicy::Earliest,
		}
	}
}

impl EngineConfig {
	pub fn snapshot_interval(&self) -> Duration {
		Duration::from_secs(self.snapshot_interval_secs)
	}

	/// Load configuration from environment variables
	pub fn from_env() -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::Environment::with_prefix("FLINT"))
			.build()?;

		cfg.try_deserialize()
	}

	/// Load configuration from file, with environment overrides
	pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::File::with_name(path))
			.add_source(config::Environment::with_prefix("FLINT"))
			.build()?;

		cfg.try_deserialize()
	}
}
