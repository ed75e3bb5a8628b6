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

//! Error types for the event bus.
//!
//! Only resource exhaustion and configuration problems are errors. Removing
//! something that is not there (an unknown callback handle, a producer with no
//! queued events) is routine and never reported.

use std::collections::TryReserveError;
use thiserror::Error;

/// Errors raised at the allocation and configuration boundaries of the bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// Memory could not be reserved for a queued event or an event struct.
    #[error("allocation failed while building {what}: {source}")]
    OutOfMemory {
        /// What was being allocated.
        what: &'static str,
        /// The underlying reservation failure.
        #[source]
        source: TryReserveError,
    },

    /// A configuration document could not be parsed.
    #[error("invalid bus configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A configuration file could not be read.
    #[error("failed to read bus configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl BusError {
    pub(crate) fn out_of_memory(what: &'static str, source: TryReserveError) -> Self {
        Self::OutOfMemory { what, source }
    }
}

/// A specialized `Result` for bus operations.
pub type BusResult<T> = Result<T, BusError>;
