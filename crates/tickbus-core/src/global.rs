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

//! An optional process-wide [`EventContext`] slot.
//!
//! Applications that cannot thread a context through every producer can
//! install one here at startup with [`init`] and tear it down with
//! [`shutdown`]. Everything else goes through [`context`], which hands out a
//! clone of the installed handle.
//!
//! ```ignore
//! // At startup:
//! tickbus_core::global::init(BusConfig::default())?;
//!
//! // Anywhere:
//! if let Some(bus) = tickbus_core::global::context() {
//!     bus.post(EventType(7), Payload::Empty)?;
//! }
//!
//! // At exit:
//! tickbus_core::global::shutdown();
//! ```

use crate::config::BusConfig;
use crate::context::EventContext;
use crate::error::BusResult;
use std::sync::{Mutex, PoisonError};

static GLOBAL: Mutex<Option<EventContext>> = Mutex::new(None);

/// Installs a fresh context and returns a handle to it.
///
/// A context that was already installed is shut down and replaced.
pub fn init(config: BusConfig) -> BusResult<EventContext> {
    let context = EventContext::init(config)?;
    let previous = GLOBAL
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(context.clone());

    if let Some(previous) = previous {
        log::warn!("Global event context initialized twice; shutting down the previous one.");
        previous.shutdown();
    }
    Ok(context)
}

/// Returns the installed context, if any.
pub fn context() -> Option<EventContext> {
    GLOBAL
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Shuts down and uninstalls the global context.
///
/// Returns `false` if none was installed.
pub fn shutdown() -> bool {
    let installed = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner).take();
    match installed {
        Some(context) => {
            context.shutdown();
            true
        }
        None => false,
    }
}
