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

//! # Tickbus Core
//!
//! A thread-safe, in-process event queue drained once per frame on a single
//! tick thread.
//!
//! Any thread may [`enqueue`](EventQueue::enqueue) events or register
//! callbacks. The tick thread calls [`tick`](EventQueue::tick), which
//! broadcasts [`EventType::PRE_TICK`], delivers every queued event in FIFO
//! order, then broadcasts [`EventType::POST_TICK`]. Registry changes are
//! staged as commands and applied at the start of each dispatch, so
//! callbacks may freely register, unregister, enqueue or cancel events while
//! they run.

#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod event_struct;
pub mod global;
pub mod id;
pub mod queue;
pub mod registry;

pub use config::BusConfig;
pub use context::{EventContext, WeakEventContext};
pub use error::{BusError, BusResult};
pub use event::{callback, CallbackFn, Delivery, Event, EventType, Payload, UserData};
pub use event_struct::{create_event_struct1, create_event_struct2, create_event_struct3, EventStruct};
pub use id::{next_id, CallbackHandle, ProducerId};
pub use queue::{EventQueue, TickSummary};
pub use registry::CallbackRegistry;
