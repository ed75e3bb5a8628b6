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

//! The pending-event FIFO and the tick that drains it.
//!
//! Producers on any thread append to the queue under a single mutex. The tick
//! thread pops one event at a time, releasing the lock before anything is
//! invoked, so callbacks are free to enqueue, remove events or touch the
//! registry while they run.

use crate::config::BusConfig;
use crate::error::{BusError, BusResult};
use crate::event::{Event, EventType};
use crate::id::ProducerId;
use crate::registry::CallbackRegistry;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Counters describing a single call to [`EventQueue::tick`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    /// Sequence number of the tick, starting at 1. Zero for a rejected tick.
    pub tick: u64,
    /// Events popped from the queue and delivered.
    pub delivered: usize,
    /// Events delivered to their own direct handler.
    pub direct: usize,
    /// Events broadcast through the registry.
    pub broadcast: usize,
    /// Callback invocations, including the tick sentinels.
    pub invocations: usize,
}

/// Resets the ticking flag when a tick ends, even by unwinding.
struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A thread-safe FIFO of events paired with the registry that broadcasts them.
pub struct EventQueue {
    events: Mutex<VecDeque<Event>>,
    registry: CallbackRegistry,
    ticking: AtomicBool,
    ticks: AtomicU64,
    depth_warning: Option<usize>,
    depth_warned: AtomicBool,
    log_tick_summary: bool,
}

impl EventQueue {
    /// Creates an empty queue, reserving `config.initial_capacity` slots.
    pub fn new(config: &BusConfig) -> BusResult<Self> {
        let mut events = VecDeque::new();
        events
            .try_reserve(config.initial_capacity)
            .map_err(|e| BusError::out_of_memory("event queue", e))?;

        Ok(Self {
            events: Mutex::new(events),
            registry: CallbackRegistry::new(),
            ticking: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
            depth_warning: config.queue_depth_warning,
            depth_warned: AtomicBool::new(false),
            log_tick_summary: config.log_tick_summary,
        })
    }

    /// The registry queued events are broadcast through.
    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    /// Appends an event to the tail of the queue.
    ///
    /// Callable from any thread. Fails only if the queue cannot grow, in which
    /// case the event (and an owned payload) is dropped.
    pub fn enqueue(&self, event: Event) -> BusResult<()> {
        log::trace!("Enqueuing {} from {:?}.", event.event_type, event.producer);

        let depth = {
            let mut events = self.lock_events();
            events
                .try_reserve(1)
                .map_err(|e| BusError::out_of_memory("queued event", e))?;
            events.push_back(event);
            events.len()
        };

        self.track_depth(depth);
        Ok(())
    }

    /// Removes every queued event posted by `producer`.
    ///
    /// Owned payloads of the removed events are released before this returns.
    /// Returns how many events were removed.
    pub fn remove_by_producer(&self, producer: ProducerId) -> usize {
        let removed = self.remove_where(|event| event.producer == Some(producer));
        if removed > 0 {
            log::debug!("Removed {removed} queued events from {producer}.");
        }
        removed
    }

    /// Removes every queued event of `event_type`.
    ///
    /// Owned payloads of the removed events are released before this returns.
    /// Returns how many events were removed.
    pub fn remove_by_type(&self, event_type: EventType) -> usize {
        let removed = self.remove_where(|event| event.event_type == event_type);
        if removed > 0 {
            log::debug!("Removed {removed} queued events of {event_type}.");
        }
        removed
    }

    /// Delivers every queued event, bracketed by the tick sentinels.
    ///
    /// Must be called from a single thread. Events enqueued by callbacks while
    /// the tick runs are delivered in the same tick. A nested or concurrent
    /// call is ignored and returns an empty summary.
    pub fn tick(&self) -> TickSummary {
        if self.ticking.swap(true, Ordering::Acquire) {
            log::warn!("Ignoring nested or concurrent tick.");
            return TickSummary::default();
        }
        let _guard = TickGuard(&self.ticking);

        let mut summary = TickSummary {
            tick: self.ticks.fetch_add(1, Ordering::Relaxed) + 1,
            ..TickSummary::default()
        };

        summary.invocations += self.registry.dispatch(EventType::PRE_TICK, None);

        while let Some(event) = self.pop_front() {
            match &event.handler {
                Some(handler) => {
                    handler(&event.delivery());
                    summary.direct += 1;
                    summary.invocations += 1;
                }
                None => {
                    summary.invocations += self
                        .registry
                        .dispatch(event.event_type, event.payload.as_any());
                    summary.broadcast += 1;
                }
            }
            summary.delivered += 1;
            // Owned payloads go here, or during unwinding if a callback panicked.
            drop(event);
        }

        summary.invocations += self.registry.dispatch(EventType::POST_TICK, None);

        if self.log_tick_summary {
            log::debug!(
                "Tick {} delivered {} events ({} direct, {} broadcast), {} callback invocations.",
                summary.tick,
                summary.delivered,
                summary.direct,
                summary.broadcast,
                summary.invocations
            );
        }
        summary
    }

    /// Number of events waiting for the next tick.
    pub fn len(&self) -> usize {
        self.lock_events().len()
    }

    /// Returns `true` if no events are waiting.
    pub fn is_empty(&self) -> bool {
        self.lock_events().is_empty()
    }

    /// Drops every queued event without delivering it.
    pub fn clear(&self) -> usize {
        self.remove_where(|_| true)
    }

    fn pop_front(&self) -> Option<Event> {
        let (event, depth) = {
            let mut events = self.lock_events();
            let event = events.pop_front();
            (event, events.len())
        };
        self.track_depth(depth);
        event
    }

    /// Warns once each time the depth crosses the threshold upwards, and
    /// re-arms as soon as the depth is seen back at or under it.
    fn track_depth(&self, depth: usize) {
        let Some(limit) = self.depth_warning else {
            return;
        };
        if depth <= limit {
            self.depth_warned.store(false, Ordering::Relaxed);
        } else if !self.depth_warned.swap(true, Ordering::Relaxed) {
            log::warn!("Event queue holds {depth} pending events (warning threshold {limit}).");
        }
    }

    /// Takes matching events out of the queue in one locked pass, then drops
    /// them once the lock is released. The remainder keeps its order.
    fn remove_where(&self, mut matches: impl FnMut(&Event) -> bool) -> usize {
        let (removed, depth) = {
            let mut events = self.lock_events();
            let mut removed = Vec::new();
            for _ in 0..events.len() {
                let Some(event) = events.pop_front() else {
                    break;
                };
                if matches(&event) {
                    removed.push(event);
                } else {
                    events.push_back(event);
                }
            }
            (removed, events.len())
        };
        self.track_depth(depth);

        let count = removed.len();
        let owned = removed.iter().filter(|e| e.payload.is_owned()).count();
        drop(removed);
        if owned > 0 {
            log::trace!("Released {owned} owned payloads.");
        }
        count
    }

    fn lock_events(&self) -> MutexGuard<'_, VecDeque<Event>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("pending", &self.len())
            .field("registry", &self.registry)
            .field("ticks", &self.ticks.load(Ordering::Relaxed))
            .finish()
    }
}
