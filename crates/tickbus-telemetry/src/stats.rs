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

//! Per-tick delivery statistics collected by an ordinary registry callback.
//!
//! [`TickStats`] subscribes to the bus like any other consumer and uses the
//! `PRE_TICK`/`POST_TICK` sentinels to cut the stream of broadcast events
//! into per-tick [`TickReport`]s. Events routed to a direct handler never
//! reach the registry and are not counted.

use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tickbus_core::{callback, CallbackHandle, EventContext, EventType};

/// What one tick delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Number of ticks observed so far, including this one.
    pub tick: u64,
    /// Broadcast events delivered between the sentinels.
    pub delivered: usize,
    /// Deliveries keyed by raw event type.
    pub per_type: BTreeMap<i32, usize>,
    /// Wall time from `PRE_TICK` to `POST_TICK`, in microseconds.
    pub duration_us: u64,
}

/// Aggregate of the frame times recorded with [`ScopedTickTimer`](crate::ScopedTickTimer).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameTime {
    /// Number of recorded frames.
    pub samples: u64,
    /// Sum of all recorded frame times, in microseconds.
    pub total_us: u64,
    /// Longest recorded frame, in microseconds.
    pub max_us: u64,
}

impl FrameTime {
    /// Mean frame time in microseconds, or zero if nothing was recorded.
    pub fn mean_us(&self) -> u64 {
        self.total_us.checked_div(self.samples).unwrap_or(0)
    }
}

struct InFlight {
    started: Instant,
    delivered: usize,
    per_type: BTreeMap<i32, usize>,
}

struct StatsState {
    in_flight: Option<InFlight>,
    history: VecDeque<TickReport>,
    capacity: usize,
    ticks: u64,
    total_delivered: u64,
    frame_time: FrameTime,
}

impl StatsState {
    fn observe(&mut self, event_type: EventType) {
        match event_type {
            EventType::PRE_TICK => {
                self.in_flight = Some(InFlight {
                    started: Instant::now(),
                    delivered: 0,
                    per_type: BTreeMap::new(),
                });
            }
            EventType::POST_TICK => {
                // Attached mid-tick: nothing to close.
                let Some(flight) = self.in_flight.take() else {
                    return;
                };
                self.ticks += 1;
                if self.history.len() == self.capacity {
                    self.history.pop_front();
                }
                self.history.push_back(TickReport {
                    tick: self.ticks,
                    delivered: flight.delivered,
                    per_type: flight.per_type,
                    duration_us: micros(flight.started.elapsed()),
                });
            }
            EventType(raw) => {
                if let Some(flight) = self.in_flight.as_mut() {
                    flight.delivered += 1;
                    *flight.per_type.entry(raw).or_default() += 1;
                    self.total_delivered += 1;
                }
            }
        }
    }
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

/// Collects a bounded history of [`TickReport`]s from a bus.
pub struct TickStats {
    state: Arc<Mutex<StatsState>>,
    handle: CallbackHandle,
}

impl TickStats {
    /// Subscribes to `bus`, keeping at most `capacity` reports.
    ///
    /// Like any registration, collection starts with the next dispatch.
    pub fn attach(bus: &EventContext, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let state = Arc::new(Mutex::new(StatsState {
            in_flight: None,
            history: VecDeque::with_capacity(capacity),
            capacity,
            ticks: 0,
            total_delivered: 0,
            frame_time: FrameTime::default(),
        }));

        let sink = Arc::clone(&state);
        let handle = bus.register(
            callback(move |delivery| {
                sink.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .observe(delivery.event_type)
            }),
            None,
        );
        log::debug!("Tick statistics attached as {handle}.");

        Self { state, handle }
    }

    /// Stops collecting. Reports gathered so far stay available.
    pub fn detach(&self, bus: &EventContext) {
        bus.unregister_by_handle(self.handle);
    }

    /// The report of the most recent complete tick.
    pub fn latest(&self) -> Option<TickReport> {
        self.lock().history.back().cloned()
    }

    /// Retained reports, oldest first.
    pub fn history(&self) -> Vec<TickReport> {
        self.lock().history.iter().cloned().collect()
    }

    /// Number of complete ticks observed.
    pub fn ticks_observed(&self) -> u64 {
        self.lock().ticks
    }

    /// Broadcast events delivered across all observed ticks.
    pub fn total_delivered(&self) -> u64 {
        self.lock().total_delivered
    }

    /// Frame-time aggregate.
    pub fn frame_time(&self) -> FrameTime {
        self.lock().frame_time
    }

    /// Adds one frame-time sample.
    pub fn record_frame_time(&self, elapsed: Duration) {
        let us = micros(elapsed);
        let mut state = self.lock();
        state.frame_time.samples += 1;
        state.frame_time.total_us = state.frame_time.total_us.saturating_add(us);
        state.frame_time.max_us = state.frame_time.max_us.max(us);
    }

    /// Serializes the retained history as a JSON array.
    pub fn history_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.history())
    }

    fn lock(&self) -> MutexGuard<'_, StatsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickbus_core::{BusConfig, Event, Payload};

    fn bus() -> EventContext {
        EventContext::init(BusConfig::default()).unwrap()
    }

    #[test]
    fn reports_count_broadcast_events_per_type() {
        let bus = bus();
        let stats = TickStats::attach(&bus, 8);

        bus.post(EventType(1), Payload::Empty).unwrap();
        bus.post(EventType(2), Payload::Empty).unwrap();
        bus.post(EventType(1), Payload::Empty).unwrap();
        bus.tick();

        let report = stats.latest().expect("one tick should be reported");
        assert_eq!(report.tick, 1);
        assert_eq!(report.delivered, 3);
        assert_eq!(report.per_type.get(&1), Some(&2));
        assert_eq!(report.per_type.get(&2), Some(&1));
        assert_eq!(stats.total_delivered(), 3);
    }

    #[test]
    fn direct_handler_events_are_not_counted() {
        let bus = bus();
        let stats = TickStats::attach(&bus, 8);

        bus.enqueue(Event::new(EventType(1)).with_handler(callback(|_| {})))
            .unwrap();
        bus.tick();

        assert_eq!(stats.latest().map(|r| r.delivered), Some(0));
    }

    #[test]
    fn history_is_bounded() {
        let bus = bus();
        let stats = TickStats::attach(&bus, 2);

        for _ in 0..5 {
            bus.tick();
        }

        let ticks: Vec<u64> = stats.history().iter().map(|r| r.tick).collect();
        assert_eq!(ticks, vec![4, 5]);
        assert_eq!(stats.ticks_observed(), 5);
    }

    #[test]
    fn detach_stops_collection() {
        let bus = bus();
        let stats = TickStats::attach(&bus, 4);
        bus.tick();

        stats.detach(&bus);
        bus.post(EventType(1), Payload::Empty).unwrap();
        bus.tick();

        assert_eq!(stats.ticks_observed(), 1);
        assert_eq!(stats.total_delivered(), 0);
    }

    #[test]
    fn history_serializes_to_json() {
        let bus = bus();
        let stats = TickStats::attach(&bus, 4);
        bus.post(EventType(7), Payload::Empty).unwrap();
        bus.tick();

        let json = stats.history_json().unwrap();
        assert!(json.contains(r#""delivered":1"#));
        assert!(json.contains(r#""7":1"#));
    }

    #[test]
    fn frame_time_aggregates_samples() {
        let bus = bus();
        let stats = TickStats::attach(&bus, 1);
        stats.record_frame_time(Duration::from_micros(100));
        stats.record_frame_time(Duration::from_micros(300));

        let frame = stats.frame_time();
        assert_eq!(frame.samples, 2);
        assert_eq!(frame.max_us, 300);
        assert_eq!(frame.mean_us(), 200);
    }
}
