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

//! RAII frame timer. (RAII = Resource Acquisition Is Initialization)

use crate::stats::TickStats;
use std::time::{Duration, Instant};

/// Times a scope and records the result in a [`TickStats`] when dropped.
///
/// The sample is recorded on every exit path, including early returns and
/// unwinding out of a panicking callback.
pub struct ScopedTickTimer<'a> {
    started: Instant,
    budget: Option<Duration>,
    stats: &'a TickStats,
}

impl<'a> ScopedTickTimer<'a> {
    /// Starts timing immediately.
    pub fn new(stats: &'a TickStats) -> Self {
        Self {
            started: Instant::now(),
            budget: None,
            stats,
        }
    }

    /// Logs a warning on drop if the scope took longer than `budget`.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Time elapsed since the timer started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for ScopedTickTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.elapsed();
        if let Some(budget) = self.budget {
            if elapsed > budget {
                log::warn!("[ScopedTickTimer] Frame took {elapsed:?} (budget {budget:?}).");
            }
        }
        self.stats.record_frame_time(elapsed);
    }
}
