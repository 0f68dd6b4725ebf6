//! `enoki` adapts a timed-scheduler abstraction onto a host environment that
//! provides only a single-threaded, message-ordered [dispatch
//! queue](crate::dispatch): post a callback, optionally delayed; cancel by
//! identity; no native periodic-timer primitive.
//!
//! From that one primitive, this crate synthesizes:
//!
//! - **one-shot delayed execution** ([`Scheduler::schedule_after`]),
//! - **drift-corrected periodic execution**
//!   ([`Scheduler::schedule_periodic`]),
//! - **per-task cancellation** (every scheduling call returns a
//!   [`Cancellation`] handle),
//! - **bulk cancellation** ([`Worker::shutdown`] stops every task submitted
//!   through that [`Worker`], even tasks already enqueued).
//!
//! # Roles
//!
//! A [`Scheduler`] is the process-lifetime entry point bound to one dispatch
//! queue and one [`Clock`]. It creates [`Worker`]s on demand, and also
//! accepts scheduling calls directly (against an implicit default worker
//! that is never shut down).
//!
//! A [`Worker`] is a cancellable scope: zero or more tasks scheduled against
//! the same queue, sharing fate. Once [`Worker::shutdown`] has been called,
//! no task scheduled through that worker runs again, and subsequent
//! submissions are *rejected* — they return a pre-cancelled handle and
//! submit nothing. Rejection is not an error: callers cannot (and need not)
//! distinguish "accepted and already disposed" from "rejected".
//!
//! # Drift correction
//!
//! Periodic tasks compute each fire time as `start + n * period` from a
//! fixed start time, rather than `last_fire + period`, so scheduling latency
//! and body execution time never accumulate into drift. A body that overruns
//! its period is resubmitted for *immediate* dispatch — the schedule catches
//! up by running back-to-back, one tick at a time, never by firing a backlog
//! burst.
//!
//! # The dispatch queue
//!
//! This crate never implements the queue; it only consumes the [`Dispatch`]
//! trait. The host's queue must deliver callbacks in time order, one at a
//! time, on one logical thread, and must support removal by entry identity
//! and by grouping token. See the [`dispatch`] module for the full contract.
//!
//! # Example
//!
//! ```
//! use enoki::{Clock, Dispatch, Entry, EntryId, Scheduler, Token};
//! use std::sync::{
//!     atomic::{AtomicBool, Ordering},
//!     Arc, Mutex,
//! };
//! use std::time::Duration;
//!
//! // A toy host queue that runs everything posted to it when drained.
//! #[derive(Default)]
//! struct Inline(Mutex<Vec<Entry>>);
//!
//! impl Inline {
//!     fn drain(&self) {
//!         let entries: Vec<Entry> = self.0.lock().unwrap().drain(..).collect();
//!         for entry in entries {
//!             entry.run();
//!         }
//!     }
//! }
//!
//! impl Dispatch for Inline {
//!     fn post(&self, entry: Entry) {
//!         self.0.lock().unwrap().push(entry);
//!     }
//!     fn post_delayed(&self, entry: Entry, _delay: Duration) {
//!         self.post(entry);
//!     }
//!     fn remove(&self, id: EntryId) {
//!         self.0.lock().unwrap().retain(|e| e.id() != id);
//!     }
//!     fn remove_all(&self, token: Token) {
//!         self.0.lock().unwrap().retain(|e| e.token() != Some(token));
//!     }
//! }
//!
//! let queue = Arc::new(Inline::default());
//! let scheduler = Scheduler::new(queue.clone(), Clock::new(|| 0).named("zero"));
//!
//! let ran = Arc::new(AtomicBool::new(false));
//! let flag = ran.clone();
//! let handle = scheduler.schedule(move || flag.store(true, Ordering::Release));
//!
//! // `schedule` is asynchronous: nothing runs until the host queue does.
//! assert!(!ran.load(Ordering::Acquire));
//! queue.drain();
//! assert!(ran.load(Ordering::Acquire));
//!
//! // Disposing after the task has run is a no-op, not an error.
//! handle.dispose();
//! ```
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub(crate) mod loom;

pub mod cancel;
pub mod clock;
pub mod dispatch;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod test_util;

pub use self::{
    cancel::Cancellation,
    clock::{Clock, Instant, Millis},
    dispatch::{Dispatch, Entry, EntryId, Token},
    scheduler::{Scheduler, Worker},
};
