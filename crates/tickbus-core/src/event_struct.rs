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

//! Self-contained event payloads with trailing text fields.
//!
//! Producers often post a small fixed-shape body together with a few strings
//! (a file name, an error message, a URL). [`EventStruct`] owns copies of
//! those strings next to the body, so the whole value can be moved into an
//! owned [`Payload`] and released in one drop on delivery.

use crate::error::{BusError, BusResult};
use crate::event::Payload;
use std::any::Any;

/// A payload body of type `T` with `N` optional text fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStruct<T, const N: usize> {
    /// The fixed-shape part of the payload.
    pub body: T,
    fields: [Option<String>; N],
}

impl<T, const N: usize> EventStruct<T, N> {
    /// Copies every present value into the new struct.
    ///
    /// A `None` value leaves its field empty and copies nothing. Fails only if
    /// memory for a copy cannot be reserved.
    pub fn new(body: T, values: [Option<&str>; N]) -> BusResult<Self> {
        let mut fields: [Option<String>; N] = std::array::from_fn(|_| None);
        for (field, value) in fields.iter_mut().zip(values) {
            if let Some(text) = value {
                *field = Some(copy_text(text)?);
            }
        }
        Ok(Self { body, fields })
    }

    /// Returns the text stored at `index`, or `None` if it was not provided
    /// or `index` is out of range.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index)?.as_deref()
    }

    /// Total bytes of text held, counting only present fields.
    pub fn text_len(&self) -> usize {
        self.fields.iter().flatten().map(String::len).sum()
    }

    /// Moves the struct into an owned payload.
    pub fn into_payload(self) -> Payload
    where
        T: Any + Send,
    {
        Payload::owned(self)
    }
}

fn copy_text(text: &str) -> BusResult<String> {
    let mut copy = String::new();
    copy.try_reserve_exact(text.len())
        .map_err(|e| BusError::out_of_memory("event struct field", e))?;
    copy.push_str(text);
    Ok(copy)
}

/// Builds an event struct with one text field.
pub fn create_event_struct1<T>(body: T, value1: Option<&str>) -> BusResult<EventStruct<T, 1>> {
    EventStruct::new(body, [value1])
}

/// Builds an event struct with two text fields.
pub fn create_event_struct2<T>(
    body: T,
    value1: Option<&str>,
    value2: Option<&str>,
) -> BusResult<EventStruct<T, 2>> {
    EventStruct::new(body, [value1, value2])
}

/// Builds an event struct with three text fields.
pub fn create_event_struct3<T>(
    body: T,
    value1: Option<&str>,
    value2: Option<&str>,
    value3: Option<&str>,
) -> BusResult<EventStruct<T, 3>> {
    EventStruct::new(body, [value1, value2, value3])
}
