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

//! The handle an application threads through its producers and its frame loop.

use crate::config::BusConfig;
use crate::error::BusResult;
use crate::event::{CallbackFn, Event, EventType, Payload, UserData};
use crate::id::{CallbackHandle, ProducerId};
use crate::queue::{EventQueue, TickSummary};
use std::sync::{Arc, Weak};

/// A cheaply cloneable handle to one event queue and its callback registry.
///
/// Clones share the same queue, so a clone can be moved into a producer
/// thread or captured by a callback. Only one thread should call
/// [`tick`](Self::tick).
///
/// # Example
///
/// ```rust
/// use tickbus_core::{callback, BusConfig, Event, EventContext, EventType, Payload};
///
/// let bus = EventContext::init(BusConfig::default()).unwrap();
/// bus.register(callback(|delivery| {
///     if let Some(text) = delivery.payload_as::<String>() {
///         println!("{} -> {text}", delivery.event_type);
///     }
/// }), None);
///
/// bus.enqueue(Event::new(EventType(1)).with_payload(Payload::owned(String::from("hi"))))
///     .unwrap();
/// assert_eq!(bus.tick().delivered, 1);
/// bus.shutdown();
/// ```
#[derive(Debug, Clone)]
pub struct EventContext {
    queue: Arc<EventQueue>,
}

impl EventContext {
    /// Creates a new queue and registry pair.
    pub fn init(config: BusConfig) -> BusResult<Self> {
        let queue = EventQueue::new(&config)?;
        log::info!("Event context initialized ({config:?}).");
        Ok(Self {
            queue: Arc::new(queue),
        })
    }

    /// Releases every queued event and drops every callback.
    ///
    /// Clearing the registry breaks reference cycles formed by callbacks that
    /// captured a clone of this context. The context stays usable afterwards.
    pub fn shutdown(&self) {
        let events = self.queue.clear();
        let callbacks = self.queue.registry().clear();
        log::info!("Event context shut down ({events} undelivered events, {callbacks} callbacks dropped).");
    }

    /// Allocates a producer identifier for tagging events.
    pub fn next_producer_id(&self) -> ProducerId {
        ProducerId::next()
    }

    /// Appends an event to the queue. See [`EventQueue::enqueue`].
    pub fn enqueue(&self, event: Event) -> BusResult<()> {
        self.queue.enqueue(event)
    }

    /// Enqueues a broadcast event with the given type and payload.
    pub fn post(&self, event_type: EventType, payload: Payload) -> BusResult<()> {
        self.queue.enqueue(Event::new(event_type).with_payload(payload))
    }

    /// Removes queued events from `producer`. See [`EventQueue::remove_by_producer`].
    pub fn remove_by_producer(&self, producer: ProducerId) -> usize {
        self.queue.remove_by_producer(producer)
    }

    /// Removes queued events of `event_type`. See [`EventQueue::remove_by_type`].
    pub fn remove_by_type(&self, event_type: EventType) -> usize {
        self.queue.remove_by_type(event_type)
    }

    /// Stages a broadcast callback. Active from the next dispatch.
    pub fn register(&self, callback: CallbackFn, user_data: UserData) -> CallbackHandle {
        self.queue.registry().register(callback, user_data)
    }

    /// Stages removal of registrations matching `callback` and `user_data`.
    pub fn unregister(&self, callback: &CallbackFn, user_data: &UserData) {
        self.queue.registry().unregister(callback, user_data)
    }

    /// Stages removal of the registration named by `handle`.
    pub fn unregister_by_handle(&self, handle: CallbackHandle) {
        self.queue.registry().unregister_by_handle(handle)
    }

    /// Drains the queue on the calling thread. See [`EventQueue::tick`].
    pub fn tick(&self) -> TickSummary {
        self.queue.tick()
    }

    /// Number of events waiting for the next tick.
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Number of callbacks active as of the last dispatch.
    pub fn active_callbacks(&self) -> usize {
        self.queue.registry().active_len()
    }

    /// The underlying queue.
    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// A handle that does not keep the queue alive.
    ///
    /// Callbacks stored in the registry should capture this instead of a
    /// full clone when the context is dropped rather than shut down.
    pub fn downgrade(&self) -> WeakEventContext {
        WeakEventContext {
            queue: Arc::downgrade(&self.queue),
        }
    }
}

/// A non-owning [`EventContext`] reference.
#[derive(Debug, Clone)]
pub struct WeakEventContext {
    queue: Weak<EventQueue>,
}

impl WeakEventContext {
    /// Returns the context if it is still alive.
    pub fn upgrade(&self) -> Option<EventContext> {
        self.queue.upgrade().map(|queue| EventContext { queue })
    }
}
