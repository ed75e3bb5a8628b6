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

//! Process-wide identifier allocation.
//!
//! Every identifier handed out by this crate, whether it tags the producer of
//! an event or names a callback registration, comes from the same monotonic
//! counter. Two identifiers obtained from [`next_id`] are therefore never
//! equal, even when one is a [`ProducerId`] and the other a
//! [`CallbackHandle`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Zero is never handed out, so it can stand for "no identifier" in logs.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates the next raw identifier.
///
/// Safe to call from any thread; each call returns a distinct value.
pub fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Identifies the origin of an event, used for bulk cancellation with
/// [`EventQueue::remove_by_producer`](crate::queue::EventQueue::remove_by_producer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProducerId(u64);

impl ProducerId {
    /// Allocates a fresh producer identifier.
    pub fn next() -> Self {
        Self(next_id())
    }

    /// Returns the raw counter value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProducerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "producer#{}", self.0)
    }
}

/// Names a callback registration inside a
/// [`CallbackRegistry`](crate::registry::CallbackRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackHandle(u64);

impl CallbackHandle {
    pub(crate) fn next() -> Self {
        Self(next_id())
    }

    /// Returns the raw counter value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "callback#{}", self.0)
    }
}
