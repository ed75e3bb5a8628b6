// Copyright 2025 eraflo
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

//! Tunables for an [`EventContext`](crate::context::EventContext).

use crate::error::BusResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the event queue.
///
/// Every field has a default, so a partial JSON document such as
/// `{ "log_tick_summary": true }` is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Number of queue slots reserved up front.
    pub initial_capacity: usize,
    /// Logs a warning when the queue grows past this many pending events.
    pub queue_depth_warning: Option<usize>,
    /// Emits a debug summary at the end of every tick.
    pub log_tick_summary: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 64,
            queue_depth_warning: Some(4096),
            log_tick_summary: false,
        }
    }
}

impl BusConfig {
    /// Parses a configuration from a JSON document.
    pub fn from_json_str(json: &str) -> BusResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> BusResult<Self> {
        let path = path.as_ref();
        log::debug!("Loading bus configuration from {}.", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}
