//! Cancellation handles for scheduled work.
//!
//! Every scheduling call on a [`Scheduler`](crate::Scheduler) or
//! [`Worker`](crate::Worker) returns a [`Cancellation`], even when the
//! submission was rejected — a rejected handle's [`dispose`] is a safe
//! no-op, so callers can treat scheduling as always-succeeding.
//!
//! [`dispose`]: Cancellation::dispose
use crate::{
    dispatch::{Dispatch, EntryId},
    scheduler::periodic::Periodic,
};
use alloc::sync::Arc;
use core::fmt;

/// An opaque handle that stops future execution of one scheduled task.
///
/// `dispose` may be called from any thread, any number of times. Dropping a
/// `Cancellation` does *not* dispose it; a handle can be discarded freely
/// while its task keeps running.
pub struct Cancellation {
    inner: Inner,
}

enum Inner {
    /// The shared no-op handle returned when a shut-down worker rejects a
    /// submission. Dataless, so rejection allocates nothing.
    Rejected,
    /// Cancels a pending one-shot entry by identity.
    OneShot {
        queue: Arc<dyn Dispatch>,
        id: EntryId,
    },
    /// Permanently stops a periodic task's resubmission cycle.
    Periodic(Arc<Periodic>),
}

// === impl Cancellation ===

impl Cancellation {
    /// Returns the pre-cancelled handle representing a rejected submission.
    pub(crate) fn rejected() -> Self {
        Self {
            inner: Inner::Rejected,
        }
    }

    pub(crate) fn one_shot(queue: Arc<dyn Dispatch>, id: EntryId) -> Self {
        Self {
            inner: Inner::OneShot { queue, id },
        }
    }

    pub(crate) fn periodic(periodic: Arc<Periodic>) -> Self {
        Self {
            inner: Inner::Periodic(periodic),
        }
    }

    /// Stops future execution of the associated task.
    ///
    /// - For a one-shot task, removes it from the dispatch queue if it has
    ///   not yet run.
    /// - For a periodic task, permanently stops resubmission. An execution
    ///   already in flight completes (task bodies are never interrupted),
    ///   but no further execution follows.
    ///
    /// Idempotent and infallible: disposing a handle whose task has already
    /// run, or whose owning worker has been shut down, is a no-op.
    pub fn dispose(&self) {
        match self.inner {
            Inner::Rejected => {}
            Inner::OneShot { ref queue, id } => {
                tracing::trace!(target: "enoki::cancel", ?id, "dispose one-shot");
                queue.remove(id);
            }
            Inner::Periodic(ref periodic) => periodic.dispose(),
        }
    }
}

impl fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner {
            Inner::Rejected => f.debug_struct("Cancellation::Rejected").finish(),
            Inner::OneShot { id, .. } => f
                .debug_struct("Cancellation::OneShot")
                .field("id", &id)
                .finish(),
            Inner::Periodic(ref periodic) => f
                .debug_struct("Cancellation::Periodic")
                .field("task", periodic)
                .finish(),
        }
    }
}
