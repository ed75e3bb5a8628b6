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

//! Event values and the types callbacks receive when an event is delivered.

use crate::id::ProducerId;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Integer tag identifying the kind of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventType(pub i32);

impl EventType {
    /// Dispatched once at the start of every tick, before any queued event.
    pub const PRE_TICK: EventType = EventType(i32::MIN);
    /// Dispatched once at the end of every tick, after the queue is drained.
    pub const POST_TICK: EventType = EventType(i32::MIN + 1);

    /// Returns `true` for the tick sentinels, which never travel through the queue.
    pub fn is_reserved(self) -> bool {
        self == Self::PRE_TICK || self == Self::POST_TICK
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::PRE_TICK => f.write_str("PRE_TICK"),
            Self::POST_TICK => f.write_str("POST_TICK"),
            EventType(raw) => write!(f, "type({raw})"),
        }
    }
}

/// Opaque data attached to a registration or an event and handed back on delivery.
pub type UserData = Option<Arc<dyn Any + Send + Sync>>;

/// A callback invoked on the tick thread.
///
/// Callbacks must be `Send + Sync` because they may be registered from any
/// thread, even though they only ever run on the tick thread.
pub type CallbackFn = Arc<dyn Fn(&Delivery<'_>) + Send + Sync>;

/// Wraps a closure into a [`CallbackFn`].
///
/// Keep the returned `Arc` around if the callback will later be removed with
/// [`CallbackRegistry::unregister`](crate::registry::CallbackRegistry::unregister):
/// removal matches on the identity of the `Arc`, not on the closure's behaviour.
pub fn callback<F>(f: F) -> CallbackFn
where
    F: Fn(&Delivery<'_>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The data carried by an event.
///
/// Ownership decides who releases the value. A [`Payload::Owned`] value is
/// moved into the queue and dropped exactly once: after delivery during a
/// tick, or when the event is removed before delivery. A
/// [`Payload::Shared`] value stays alive for as long as the producer keeps
/// its own reference.
#[derive(Default)]
pub enum Payload {
    /// No payload. Used by the tick sentinels.
    #[default]
    Empty,
    /// A value the producer keeps a reference to.
    Shared(Arc<dyn Any + Send + Sync>),
    /// A value the queue owns and releases.
    Owned(Box<dyn Any + Send>),
}

impl Payload {
    /// Moves `value` into an owned payload.
    pub fn owned<T: Any + Send>(value: T) -> Self {
        Payload::Owned(Box::new(value))
    }

    /// Wraps a producer-held value.
    pub fn shared<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Payload::Shared(value)
    }

    /// Whether the queue is responsible for releasing this payload.
    pub fn is_owned(&self) -> bool {
        matches!(self, Payload::Owned(_))
    }

    /// Returns the payload as a type-erased reference, or `None` for [`Payload::Empty`].
    pub fn as_any(&self) -> Option<&dyn Any> {
        match self {
            Payload::Empty => None,
            Payload::Shared(value) => Some(&**value as &dyn Any),
            Payload::Owned(value) => Some(&**value as &dyn Any),
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Empty => f.write_str("Empty"),
            Payload::Shared(_) => f.write_str("Shared(..)"),
            Payload::Owned(_) => f.write_str("Owned(..)"),
        }
    }
}

/// What a callback sees when an event is delivered to it.
pub struct Delivery<'a> {
    /// The type tag of the event.
    pub event_type: EventType,
    /// The event's payload, if any.
    pub payload: Option<&'a dyn Any>,
    /// The user data attached to the registration (broadcast) or to the event (direct handler).
    pub user_data: Option<&'a (dyn Any + Send + Sync)>,
}

impl<'a> Delivery<'a> {
    /// Downcasts the payload to a concrete type.
    pub fn payload_as<T: Any>(&self) -> Option<&'a T> {
        self.payload.and_then(|payload| payload.downcast_ref::<T>())
    }

    /// Downcasts the user data to a concrete type.
    pub fn user_data_as<T: Any>(&self) -> Option<&'a T> {
        let user_data: &'a dyn Any = self.user_data?;
        user_data.downcast_ref::<T>()
    }
}

/// An item in the pending-event queue.
///
/// Build one with [`Event::new`] and the `with_*` methods, then hand it to
/// [`EventQueue::enqueue`](crate::queue::EventQueue::enqueue).
pub struct Event {
    /// The producer that posted the event, used for bulk cancellation.
    pub producer: Option<ProducerId>,
    /// A direct handler. When set, the event bypasses the registry.
    pub handler: Option<CallbackFn>,
    /// The type tag.
    pub event_type: EventType,
    /// The payload.
    pub payload: Payload,
    /// Data handed to the direct handler.
    pub user_data: UserData,
}

impl Event {
    /// Creates an event of the given type with no producer, handler or payload.
    pub fn new(event_type: EventType) -> Self {
        Self {
            producer: None,
            handler: None,
            event_type,
            payload: Payload::Empty,
            user_data: None,
        }
    }

    /// Tags the event with its producer.
    pub fn from_producer(mut self, producer: ProducerId) -> Self {
        self.producer = Some(producer);
        self
    }

    /// Routes the event to `handler` instead of broadcasting it.
    pub fn with_handler(mut self, handler: CallbackFn) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Attaches a payload.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Attaches user data for the direct handler.
    pub fn with_user_data(mut self, user_data: Arc<dyn Any + Send + Sync>) -> Self {
        self.user_data = Some(user_data);
        self
    }

    pub(crate) fn delivery(&self) -> Delivery<'_> {
        Delivery {
            event_type: self.event_type,
            payload: self.payload.as_any(),
            user_data: self.user_data.as_deref(),
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("producer", &self.producer)
            .field("handler", &self.handler.is_some())
            .field("event_type", &self.event_type)
            .field("payload", &self.payload)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_reserved() {
        assert!(EventType::PRE_TICK.is_reserved());
        assert!(EventType::POST_TICK.is_reserved());
        assert!(!EventType(0).is_reserved());
        assert_ne!(EventType::PRE_TICK, EventType::POST_TICK);
    }

    #[test]
    fn payload_downcasts_through_delivery() {
        let event = Event::new(EventType(3))
            .with_payload(Payload::owned(String::from("hello")))
            .with_user_data(Arc::new(42u32));

        let delivery = event.delivery();
        assert_eq!(delivery.event_type, EventType(3));
        assert_eq!(delivery.payload_as::<String>().map(String::as_str), Some("hello"));
        assert_eq!(delivery.user_data_as::<u32>(), Some(&42));
        assert!(delivery.payload_as::<u32>().is_none());
    }

    #[test]
    fn shared_payload_is_not_owned() {
        let value = Arc::new(7i64);
        let payload = Payload::shared(value.clone());
        assert!(!payload.is_owned());
        drop(payload);
        assert_eq!(Arc::strong_count(&value), 1);
    }

    #[test]
    fn empty_payload_has_no_view() {
        assert!(Payload::Empty.as_any().is_none());
        assert!(!Payload::default().is_owned());
    }
}
