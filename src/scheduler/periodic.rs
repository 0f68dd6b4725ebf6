//! The self-resubmitting, drift-corrected periodic task.
use super::Core;
use crate::{
    clock::{Clock, Millis},
    dispatch::{Dispatch, Entry, EntryId},
    loom::sync::atomic::{AtomicBool, AtomicU64, Ordering::*},
};
use alloc::{boxed::Box, sync::Arc};
use core::{fmt, time::Duration};

/// One still-active periodic schedule.
///
/// Each time the dispatch queue fires it, a `Periodic` runs its task body,
/// computes the next absolute fire time from its fixed `start` and `period`
/// (never from "now + period"), and resubmits itself under the same
/// [`EntryId`]. Reusing one id per schedule means at most one entry for
/// this task is pending at any moment, and removal by that id always
/// removes the current resubmission — identity is fixed up front, then
/// closed over by each resubmission closure.
pub(crate) struct Periodic {
    task: Box<dyn Fn() + Send + Sync>,
    owner: Arc<Core>,
    queue: Arc<dyn Dispatch>,
    clock: Clock,
    id: EntryId,

    /// Absolute time the first execution was due.
    start: Millis,
    period: Millis,

    /// Completed executions. Only the dispatch thread writes this, so plain
    /// load/store suffice; it is atomic only because the handle shares the
    /// allocation across threads.
    count: AtomicU64,

    /// Set exactly once, possibly from a thread other than the dispatch
    /// thread, so it is re-checked with acquire loads at several points of
    /// the fire transition.
    cancelled: AtomicBool,
}

// === impl Periodic ===

impl Periodic {
    pub(crate) fn new(
        task: Box<dyn Fn() + Send + Sync>,
        owner: Arc<Core>,
        queue: Arc<dyn Dispatch>,
        clock: Clock,
        start: Millis,
        period: Millis,
    ) -> Self {
        Self {
            task,
            owner,
            queue,
            clock,
            id: EntryId::next(),
            start,
            period,
            count: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> EntryId {
        self.id
    }

    /// Builds the dispatch entry for this task's next execution.
    pub(crate) fn resubmission(self: &Arc<Self>) -> Entry {
        let this = self.clone();
        Entry::new(
            self.id,
            Some(self.owner.token()),
            Box::new(move || this.fire()),
        )
    }

    /// One fire of the periodic state machine. Runs on the dispatch thread.
    fn fire(self: &Arc<Self>) {
        if self.is_stopped() {
            tracing::trace!(target: "enoki::periodic", id = ?self.id, "fire: stopped, not running");
            return;
        }

        (self.task)();

        // cancellation or shutdown requested while the body was running:
        // complete this execution but do not resubmit.
        if self.is_stopped() {
            tracing::trace!(target: "enoki::periodic", id = ?self.id, "fire: stopped during body");
            return;
        }

        let count = self.count.load(Relaxed) + 1;
        self.count.store(count, Relaxed);

        let next = self.start.saturating_add(count.saturating_mul(self.period));
        let now = self.clock.now_millis();
        let entry = self.resubmission();
        if next <= now {
            // the body overran one or more periods: catch up by running
            // back-to-back, never by scheduling a stale or negative delay.
            tracing::trace!(
                target: "enoki::periodic",
                id = ?self.id,
                count,
                next,
                now,
                "fire: overran period, resubmitting immediately",
            );
            self.queue.post(entry);
        } else {
            tracing::trace!(
                target: "enoki::periodic",
                id = ?self.id,
                count,
                next,
                delta = next - now,
                "fire: resubmitted",
            );
            self.queue.post_delayed(entry, Duration::from_millis(next - now));
        }

        // cancellation may also land between the post-body check and the
        // resubmission above; the just-made entry must not fire.
        if self.is_stopped() {
            self.queue.remove(self.id);
        }
    }

    /// Permanently stops resubmission, then removes whatever resubmission
    /// is currently pending. Idempotent; callable from any thread.
    pub(crate) fn dispose(&self) {
        if self.cancelled.swap(true, AcqRel) {
            return;
        }
        tracing::trace!(target: "enoki::periodic", id = ?self.id, "dispose");
        self.queue.remove(self.id);
    }

    #[inline]
    fn is_stopped(&self) -> bool {
        self.cancelled.load(Acquire) || self.owner.is_shutdown()
    }
}

impl fmt::Debug for Periodic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Periodic")
            .field("id", &self.id)
            .field("start", &self.start)
            .field("period", &self.period)
            .field("count", &self.count.load(Relaxed))
            .field("cancelled", &self.cancelled.load(Acquire))
            .finish()
    }
}
