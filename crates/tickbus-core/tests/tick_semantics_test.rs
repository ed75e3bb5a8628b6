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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tickbus_core::{
    callback, create_event_struct2, BusConfig, CallbackHandle, Event, EventContext, EventStruct,
    EventType, Payload,
};

type Log = Arc<Mutex<Vec<(&'static str, EventType)>>>;

/// Counts how many times it has been dropped.
struct DropProbe(Arc<AtomicUsize>);

impl Drop for DropProbe {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn bus() -> EventContext {
    EventContext::init(BusConfig::default()).expect("context should initialize")
}

fn record(bus: &EventContext, log: &Log, tag: &'static str) -> CallbackHandle {
    let log = Arc::clone(log);
    bus.register(
        callback(move |d| log.lock().unwrap().push((tag, d.event_type))),
        None,
    )
}

fn types_seen_by(log: &Log, tag: &str) -> Vec<EventType> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|(t, _)| *t == tag)
        .map(|(_, ty)| *ty)
        .collect()
}

#[test]
fn events_arrive_in_fifo_order_bracketed_by_one_pair_of_sentinels() {
    // --- 1. ARRANGE ---
    let bus = bus();
    let log: Log = Arc::default();
    record(&bus, &log, "c");

    bus.post(EventType(10), Payload::Empty).unwrap();
    bus.post(EventType(20), Payload::Empty).unwrap();
    bus.post(EventType(30), Payload::Empty).unwrap();

    // --- 2. ACT ---
    bus.tick();

    // --- 3. ASSERT ---
    assert_eq!(
        types_seen_by(&log, "c"),
        vec![
            EventType::PRE_TICK,
            EventType(10),
            EventType(20),
            EventType(30),
            EventType::POST_TICK
        ]
    );
}

#[test]
fn every_callback_sees_the_event_once_in_registration_order() {
    let bus = bus();
    let log: Log = Arc::default();
    record(&bus, &log, "a");
    record(&bus, &log, "b");

    bus.post(EventType(1), Payload::Empty).unwrap();
    bus.tick();

    let deliveries: Vec<_> = log
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, ty)| *ty == EventType(1))
        .map(|(tag, _)| *tag)
        .collect();
    assert_eq!(deliveries, vec!["a", "b"]);
}

#[test]
fn removed_owned_event_is_released_once_and_never_delivered() {
    let bus = bus();
    let log: Log = Arc::default();
    record(&bus, &log, "c");
    let drops = Arc::new(AtomicUsize::new(0));
    let producer = bus.next_producer_id();

    bus.enqueue(
        Event::new(EventType(1))
            .from_producer(producer)
            .with_payload(Payload::owned(DropProbe(drops.clone()))),
    )
    .unwrap();
    let untouched = Arc::new(AtomicUsize::new(0));
    bus.enqueue(
        Event::new(EventType(2)).with_payload(Payload::owned(DropProbe(untouched.clone()))),
    )
    .unwrap();

    assert_eq!(bus.remove_by_producer(producer), 1);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(
        untouched.load(Ordering::SeqCst),
        0,
        "an event neither removed nor ticked must not be released"
    );

    bus.tick();
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(untouched.load(Ordering::SeqCst), 1);
    assert!(!types_seen_by(&log, "c").contains(&EventType(1)));
}

#[test]
fn callback_registered_mid_tick_waits_for_the_next_tick() {
    let bus = bus();
    let log: Log = Arc::default();
    let trigger = EventType(1);

    // Registers "late" the first time it sees the trigger.
    let registered = Arc::new(AtomicUsize::new(0));
    {
        let inner_bus = bus.clone();
        let log = Arc::clone(&log);
        let registered = Arc::clone(&registered);
        bus.register(
            callback(move |d| {
                if d.event_type == trigger && registered.fetch_add(1, Ordering::SeqCst) == 0 {
                    let log = Arc::clone(&log);
                    inner_bus.register(
                        callback(move |d| {
                            if !d.event_type.is_reserved() {
                                log.lock().unwrap().push(("late", d.event_type));
                            }
                        }),
                        None,
                    );
                }
            }),
            None,
        );
    }

    // Tick N: the only queued event triggers the registration.
    bus.post(trigger, Payload::Empty).unwrap();
    bus.tick();
    assert!(types_seen_by(&log, "late").is_empty());

    // Tick N+1: everything is delivered.
    bus.post(EventType(2), Payload::Empty).unwrap();
    bus.post(EventType(3), Payload::Empty).unwrap();
    bus.tick();
    assert_eq!(types_seen_by(&log, "late"), vec![EventType(2), EventType(3)]);

    bus.shutdown();
}

#[test]
fn late_registration_sees_the_closing_sentinel_of_its_tick() {
    let bus = bus();
    let log: Log = Arc::default();

    {
        let inner_bus = bus.clone();
        let log = Arc::clone(&log);
        let done = AtomicUsize::new(0);
        bus.register(
            callback(move |d| {
                if d.event_type == EventType(1) && done.fetch_add(1, Ordering::SeqCst) == 0 {
                    let log = Arc::clone(&log);
                    inner_bus.register(
                        callback(move |d| log.lock().unwrap().push(("late", d.event_type))),
                        None,
                    );
                }
            }),
            None,
        );
    }

    bus.post(EventType(1), Payload::Empty).unwrap();
    bus.tick();

    // Commands are replayed at every dispatch, and POST_TICK is a dispatch.
    assert_eq!(types_seen_by(&log, "late"), vec![EventType::POST_TICK]);
    bus.shutdown();
}

#[test]
fn callback_removing_itself_does_not_disturb_its_siblings() {
    let bus = bus();
    let log: Log = Arc::default();
    record(&bus, &log, "first");

    let own_handle: Arc<Mutex<Option<CallbackHandle>>> = Arc::default();
    {
        let inner_bus = bus.clone();
        let log = Arc::clone(&log);
        let own_handle_cb = Arc::clone(&own_handle);
        let handle = bus.register(
            callback(move |d| {
                log.lock().unwrap().push(("quitter", d.event_type));
                if d.event_type == EventType(1) {
                    if let Some(handle) = *own_handle_cb.lock().unwrap() {
                        inner_bus.unregister_by_handle(handle);
                    }
                }
            }),
            None,
        );
        *own_handle.lock().unwrap() = Some(handle);
    }
    record(&bus, &log, "last");

    // Tick N: the quitter removes itself while handling the only event.
    bus.post(EventType(1), Payload::Empty).unwrap();
    bus.tick();

    let round: Vec<_> = log
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, ty)| *ty == EventType(1))
        .map(|(tag, _)| *tag)
        .collect();
    assert_eq!(round, vec!["first", "quitter", "last"]);

    // Tick N+1: the quitter is gone, the others are untouched.
    log.lock().unwrap().clear();
    bus.post(EventType(2), Payload::Empty).unwrap();
    bus.tick();
    assert!(types_seen_by(&log, "quitter").is_empty());
    assert_eq!(
        types_seen_by(&log, "first"),
        vec![EventType::PRE_TICK, EventType(2), EventType::POST_TICK]
    );
    assert_eq!(types_seen_by(&log, "first"), types_seen_by(&log, "last"));

    bus.shutdown();
}

#[test]
fn unregistering_a_handle_twice_is_harmless() {
    let bus = bus();
    let log: Log = Arc::default();
    let a = record(&bus, &log, "a");
    record(&bus, &log, "b");
    bus.tick();
    assert_eq!(bus.active_callbacks(), 2);

    bus.unregister_by_handle(a);
    bus.tick();
    bus.unregister_by_handle(a);
    bus.tick();

    assert_eq!(bus.active_callbacks(), 1);
    assert_eq!(types_seen_by(&log, "b").len(), 6);
}

#[test]
fn remove_by_type_after_concurrent_enqueue_releases_at_removal() {
    let bus = bus();
    let log: Log = Arc::default();
    record(&bus, &log, "c");

    let released_a = Arc::new(AtomicUsize::new(0));
    let released_b = Arc::new(AtomicUsize::new(0));

    let producers = [
        (EventType(5), "a", Arc::clone(&released_a)),
        (EventType(7), "b", Arc::clone(&released_b)),
    ]
    .map(|(ty, text, probe)| {
        let bus = bus.clone();
        thread::spawn(move || {
            bus.post(ty, Payload::owned((text, DropProbe(probe)))).unwrap();
        })
    });
    for producer in producers {
        producer.join().expect("producer thread panicked");
    }

    bus.remove_by_type(EventType(5));
    assert_eq!(released_a.load(Ordering::SeqCst), 1, "released during removal");
    assert_eq!(released_b.load(Ordering::SeqCst), 0);

    let summary = bus.tick();
    assert_eq!(summary.delivered, 1);
    assert_eq!(
        types_seen_by(&log, "c"),
        vec![EventType::PRE_TICK, EventType(7), EventType::POST_TICK]
    );
    assert_eq!(released_a.load(Ordering::SeqCst), 1);
    assert_eq!(released_b.load(Ordering::SeqCst), 1);
}

#[test]
fn event_struct_payload_travels_through_the_queue() {
    #[derive(Debug)]
    struct Download {
        status: u16,
    }

    let bus = bus();
    let seen = Arc::new(Mutex::new(None));
    {
        let seen = Arc::clone(&seen);
        bus.register(
            callback(move |d| {
                if let Some(event) = d.payload_as::<EventStruct<Download, 2>>() {
                    *seen.lock().unwrap() = Some((
                        event.body.status,
                        event.field(0).map(str::to_owned),
                        event.field(1).map(str::to_owned),
                    ));
                }
            }),
            None,
        );
    }

    let payload = create_event_struct2(Download { status: 404 }, Some("http://x/y"), None)
        .unwrap()
        .into_payload();
    bus.post(EventType(3), payload).unwrap();
    bus.tick();

    assert_eq!(
        *seen.lock().unwrap(),
        Some((404, Some(String::from("http://x/y")), None))
    );
}
