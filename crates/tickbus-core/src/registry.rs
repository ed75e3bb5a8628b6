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

//! The set of broadcast callbacks and its deferred command log.
//!
//! Any thread may register or unregister a callback, but those calls never
//! touch the active set directly. They are appended to a command channel and
//! replayed, in arrival order, at the start of the next [`dispatch`]. The
//! active set is then iterated as it stood after the replay, so a callback
//! that registers or removes callbacks while it runs only affects later
//! dispatches.
//!
//! [`dispatch`]: CallbackRegistry::dispatch

use crate::event::{CallbackFn, Delivery, EventType, UserData};
use crate::id::CallbackHandle;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// An active callback and the data handed back to it on every delivery.
#[derive(Clone)]
struct Registration {
    handle: CallbackHandle,
    callback: CallbackFn,
    user_data: UserData,
}

/// A staged mutation of the active set.
enum Command {
    Add(Registration),
    RemoveByFunction {
        callback: CallbackFn,
        user_data: UserData,
    },
    RemoveByHandle(CallbackHandle),
}

/// Holds the active callbacks and the commands waiting to be applied to them.
///
/// `register`, `unregister` and `unregister_by_handle` are safe from any
/// thread. `dispatch` must only be called from the tick thread.
pub struct CallbackRegistry {
    commands_tx: flume::Sender<Command>,
    commands_rx: flume::Receiver<Command>,
    // Copy-on-write so a dispatch can iterate a snapshot without holding the lock.
    active: Mutex<Arc<Vec<Registration>>>,
}

impl CallbackRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        let (commands_tx, commands_rx) = flume::unbounded();
        Self {
            commands_tx,
            commands_rx,
            active: Mutex::new(Arc::new(Vec::new())),
        }
    }

    /// Stages a new registration and returns its handle immediately.
    ///
    /// The callback becomes active at the start of the next dispatch.
    pub fn register(&self, callback: CallbackFn, user_data: UserData) -> CallbackHandle {
        let handle = CallbackHandle::next();
        log::trace!("Staging registration of {handle}.");
        self.push(Command::Add(Registration {
            handle,
            callback,
            user_data,
        }));
        handle
    }

    /// Stages removal of every registration whose callback and user data are
    /// the same allocations as `callback` and `user_data`.
    pub fn unregister(&self, callback: &CallbackFn, user_data: &UserData) {
        self.push(Command::RemoveByFunction {
            callback: callback.clone(),
            user_data: user_data.clone(),
        });
    }

    /// Stages removal of the registration named by `handle`.
    ///
    /// Unknown or already removed handles match nothing.
    pub fn unregister_by_handle(&self, handle: CallbackHandle) {
        log::trace!("Staging removal of {handle}.");
        self.push(Command::RemoveByHandle(handle));
    }

    /// Applies pending commands, then invokes every active callback with the event.
    ///
    /// Returns how many callbacks were invoked.
    pub fn dispatch(&self, event_type: EventType, payload: Option<&dyn Any>) -> usize {
        let (snapshot, released) = {
            let mut active = self.lock_active();
            let released = self.replay(&mut active);
            (Arc::clone(&active), released)
        };
        // Captured state of removed callbacks never drops under the lock.
        drop(released);

        for registration in snapshot.iter() {
            let delivery = Delivery {
                event_type,
                payload,
                user_data: registration.user_data.as_deref(),
            };
            (registration.callback)(&delivery);
        }
        snapshot.len()
    }

    /// Number of callbacks active as of the last replay.
    pub fn active_len(&self) -> usize {
        self.lock_active().len()
    }

    /// Number of commands waiting for the next dispatch.
    pub fn pending_commands(&self) -> usize {
        self.commands_rx.len()
    }

    /// Drops every active registration and every pending command.
    ///
    /// Returns how many registrations were active.
    pub fn clear(&self) -> usize {
        let discarded = self.commands_rx.drain().count();
        // Released after the guard so captured state never drops under the lock.
        let previous = std::mem::take(&mut *self.lock_active());
        let cleared = previous.len();
        drop(previous);
        if discarded > 0 {
            log::debug!("Discarded {discarded} pending registry commands.");
        }
        cleared
    }

    fn push(&self, command: Command) {
        if let Err(e) = self.commands_tx.send(command) {
            log::error!("Failed to stage registry command: {e}. Receiver likely disconnected.");
        }
    }

    /// Applies the commands pending right now and hands back everything they
    /// released, for the caller to drop once the lock is gone.
    fn replay(&self, active: &mut Arc<Vec<Registration>>) -> Vec<(CallbackFn, UserData)> {
        let mut released = Vec::new();
        // Commands staged while we replay wait for the next dispatch.
        let pending = self.commands_rx.len();
        if pending == 0 {
            return released;
        }

        let callbacks = Arc::make_mut(active);
        for command in self.commands_rx.try_iter().take(pending) {
            match command {
                Command::Add(registration) => {
                    log::trace!("Activating {}.", registration.handle);
                    callbacks.push(registration);
                }
                Command::RemoveByFunction {
                    callback,
                    user_data,
                } => {
                    take_matching(callbacks, &mut released, |r| {
                        same_callback(&r.callback, &callback)
                            && same_user_data(&r.user_data, &user_data)
                    });
                    released.push((callback, user_data));
                }
                Command::RemoveByHandle(handle) => {
                    take_matching(callbacks, &mut released, |r| r.handle == handle)
                }
            }
        }
        released
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Arc<Vec<Registration>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("active", &self.active_len())
            .field("pending_commands", &self.pending_commands())
            .finish()
    }
}

/// Moves every registration matching `pred` out of `callbacks`, keeping the
/// order of the rest.
fn take_matching(
    callbacks: &mut Vec<Registration>,
    released: &mut Vec<(CallbackFn, UserData)>,
    pred: impl Fn(&Registration) -> bool,
) {
    let mut i = 0;
    while i < callbacks.len() {
        if pred(&callbacks[i]) {
            let gone = callbacks.remove(i);
            log::trace!("Deactivating {}.", gone.handle);
            released.push((gone.callback, gone.user_data));
        } else {
            i += 1;
        }
    }
}

fn same_callback(a: &CallbackFn, b: &CallbackFn) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn same_user_data(a: &UserData, b: &UserData) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
        _ => false,
    }
}
