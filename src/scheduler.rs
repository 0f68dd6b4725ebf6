//! [`Scheduler`]s and [`Worker`]s: the scheduling surface bound to one
//! dispatch queue.
//!
//! A [`Scheduler`] is the process-lifetime entry point. It is a factory for
//! [`Worker`]s and a pass-through scheduling surface with no mutable state
//! of its own beyond the queue and clock it is bound to (direct scheduling
//! goes through an implicit default worker that is never shut down).
//!
//! A [`Worker`] is a cancellable scope for a group of tasks sharing fate:
//! shutting a worker down prevents every task submitted through it — past
//! or future — from running again.
use crate::{
    cancel::Cancellation,
    clock::{dur_to_millis, Clock, Instant},
    dispatch::{Dispatch, Entry, EntryId, Token},
    loom::sync::atomic::{AtomicBool, Ordering::*},
};
use alloc::{boxed::Box, sync::Arc};
use core::{fmt, time::Duration};

pub(crate) mod periodic;
use self::periodic::Periodic;


/// The top-level scheduling surface bound to one dispatch queue and one
/// [`Clock`].
///
/// Cloning a `Scheduler` is cheap and yields a handle to the same queue;
/// none of its operations can fail. Rejection can only occur at the
/// [`Worker`] level, once a worker has been shut down.
#[derive(Clone)]
pub struct Scheduler {
    default: Worker,
}

/// A cancellable scope for scheduling tasks against a shared dispatch
/// queue.
///
/// Every submission made through a `Worker` is tagged with the worker's
/// identity, so [`shutdown`](Worker::shutdown) can purge all of them from
/// the queue in one bulk operation. Clones of a `Worker` share fate: they
/// submit under the same token and observe the same shutdown flag.
///
/// A `Worker` does not own the dispatch queue; it shares it with its
/// creating [`Scheduler`] and with sibling workers.
#[derive(Clone)]
pub struct Worker {
    queue: Arc<dyn Dispatch>,
    clock: Clock,
    core: Arc<Core>,
}

/// State shared between a [`Worker`], its clones, and the tasks it has
/// submitted.
pub(crate) struct Core {
    /// Monotonic: set once by [`Worker::shutdown`], never reset. Written
    /// from arbitrary caller threads, read from the dispatch thread, so
    /// release/acquire orderings are required for prompt visibility.
    shutdown: AtomicBool,
    token: Token,
}

// === impl Scheduler ===

impl Scheduler {
    /// Returns a new `Scheduler` bound to the given dispatch `queue` and
    /// `clock`.
    #[must_use]
    pub fn new<Q>(queue: Arc<Q>, clock: Clock) -> Self
    where
        Q: Dispatch + 'static,
    {
        let queue: Arc<dyn Dispatch> = queue;
        Self {
            default: Worker::new(queue, clock),
        }
    }

    /// Submits `task` for immediate dispatch.
    ///
    /// "Immediate" is still asynchronous: the task runs on the dispatch
    /// thread, never inline in the caller. The returned handle cancels the
    /// pending invocation if it has not yet run.
    pub fn schedule<F>(&self, task: F) -> Cancellation
    where
        F: FnOnce() + Send + 'static,
    {
        self.default.schedule(task)
    }

    /// Submits `task` for dispatch no earlier than `delay` from now.
    ///
    /// A zero delay behaves as immediate dispatch.
    pub fn schedule_after<F>(&self, task: F, delay: Duration) -> Cancellation
    where
        F: FnOnce() + Send + 'static,
    {
        self.default.schedule_after(task, delay)
    }

    /// Submits `task` to run repeatedly, first at `now + initial_delay` and
    /// then every `period`, drift-corrected.
    ///
    /// See [`Worker::schedule_periodic`] for the full semantics.
    pub fn schedule_periodic<F>(
        &self,
        task: F,
        initial_delay: Duration,
        period: Duration,
    ) -> Cancellation
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.default.schedule_periodic(task, initial_delay, period)
    }

    /// Returns the current time according to this scheduler's [`Clock`].
    #[must_use]
    pub fn now(&self) -> Instant {
        self.default.now()
    }

    /// Borrows the [`Clock`] this scheduler reads.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.default.clock
    }

    /// Returns a new [`Worker`] sharing this scheduler's dispatch queue and
    /// clock.
    #[must_use]
    pub fn create_worker(&self) -> Worker {
        Worker::new(self.default.queue.clone(), self.default.clock.clone())
    }

    /// Starting the scheduler is a no-op at this layer: the dispatch
    /// queue's lifecycle is externally owned, and it typically predates the
    /// `Scheduler` bound to it.
    pub fn start(&self) {}

    /// Shutting down the scheduler is a no-op at this layer: the dispatch
    /// queue outlives the `Scheduler`, and tasks scheduled directly against
    /// the scheduler remain cancellable only through their own handles.
    pub fn shutdown(&self) {}
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("clock", &self.default.clock)
            .field("default", &self.default)
            .finish()
    }
}

// === impl Worker ===

impl Worker {
    fn new(queue: Arc<dyn Dispatch>, clock: Clock) -> Self {
        Self {
            queue,
            clock,
            core: Arc::new(Core {
                shutdown: AtomicBool::new(false),
                token: Token::next(),
            }),
        }
    }

    /// Submits `task` for immediate (but still asynchronous) dispatch.
    ///
    /// Returns a handle that cancels the pending invocation if it has not
    /// yet run. If this worker has been shut down, nothing is submitted and
    /// the returned handle is the no-op rejected handle.
    pub fn schedule<F>(&self, task: F) -> Cancellation
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(task, None)
    }

    /// Submits `task` for dispatch no earlier than `delay` from now.
    ///
    /// A zero delay behaves as immediate dispatch. The delay is a lower
    /// bound, not a deadline: the queue may run the task later than
    /// requested.
    pub fn schedule_after<F>(&self, task: F, delay: Duration) -> Cancellation
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(task, Some(delay))
    }

    /// Submits `task` to run repeatedly, first at `now + initial_delay` and
    /// then every `period`.
    ///
    /// Each fire time is computed as `start + n * period` from the fixed
    /// start time, so scheduling latency and body execution time never
    /// accumulate into drift. If an execution overruns one or more periods,
    /// the next execution is resubmitted for immediate dispatch — the
    /// schedule catches up by running back-to-back, one tick at a time,
    /// with at most one pending resubmission in the queue at any moment. A
    /// zero `period` therefore reposts back-to-back indefinitely.
    ///
    /// The returned handle permanently stops resubmission. An execution in
    /// flight when the handle is disposed completes, but no further
    /// execution follows.
    ///
    /// # Panics in the task body
    ///
    /// A panic unwinding out of `task` is not caught: it propagates into
    /// the dispatch queue's fault boundary, and the resubmission step never
    /// runs, silently ending the periodic schedule.
    pub fn schedule_periodic<F>(
        &self,
        task: F,
        initial_delay: Duration,
        period: Duration,
    ) -> Cancellation
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.core.is_shutdown() {
            tracing::trace!(target: "enoki::worker", token = ?self.core.token, "rejected periodic: worker shut down");
            return Cancellation::rejected();
        }

        let initial = dur_to_millis(initial_delay);
        let start = self.clock.now_millis().saturating_add(initial);
        let periodic = Arc::new(Periodic::new(
            Box::new(task),
            self.core.clone(),
            self.queue.clone(),
            self.clock.clone(),
            start,
            dur_to_millis(period),
        ));

        tracing::trace!(
            target: "enoki::worker",
            id = ?periodic.id(),
            token = ?self.core.token,
            start,
            period = dur_to_millis(period),
            "schedule periodic",
        );
        let entry = periodic.resubmission();
        if initial == 0 {
            self.queue.post(entry);
        } else {
            self.queue.post_delayed(entry, initial_delay);
        }

        // a shutdown may have raced the post above; the purge it performed
        // cannot have seen an entry that was not yet enqueued, so remove it
        // here and honor the rejection.
        if self.core.is_shutdown() {
            self.queue.remove(periodic.id());
            return Cancellation::rejected();
        }

        Cancellation::periodic(periodic)
    }

    /// Shuts this worker down.
    ///
    /// Sets the shutdown flag irrevocably, then purges every pending
    /// submission tagged with this worker's token from the queue in one
    /// bulk operation. After `shutdown` returns, no task scheduled through
    /// this worker (or any clone of it) executes its body again, and
    /// subsequent submissions are rejected.
    ///
    /// Idempotent, and callable from any thread.
    pub fn shutdown(&self) {
        tracing::debug!(target: "enoki::worker", token = ?self.core.token, "shutdown");
        self.core.shutdown.store(true, Release);
        self.queue.remove_all(self.core.token);
    }

    /// Returns the current time according to this worker's [`Clock`].
    #[must_use]
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    fn submit<F>(&self, task: F, delay: Option<Duration>) -> Cancellation
    where
        F: FnOnce() + Send + 'static,
    {
        if self.core.is_shutdown() {
            tracing::trace!(target: "enoki::worker", token = ?self.core.token, "rejected: worker shut down");
            return Cancellation::rejected();
        }

        let id = EntryId::next();
        let core = self.core.clone();
        let entry = Entry::new(
            id,
            Some(core.token),
            Box::new(move || {
                // the shutdown purge cannot reach an entry the queue has
                // already dequeued, so liveness is re-checked here, on the
                // dispatch thread.
                if core.is_shutdown() {
                    tracing::trace!(target: "enoki::worker", ?id, "skipping: worker shut down");
                    return;
                }
                task();
            }),
        );

        tracing::trace!(
            target: "enoki::worker",
            ?id,
            token = ?self.core.token,
            ?delay,
            "schedule",
        );
        match delay {
            Some(delay) if !delay.is_zero() => self.queue.post_delayed(entry, delay),
            _ => self.queue.post(entry),
        }

        // the queue has no atomic "check-and-enqueue", so a shutdown racing
        // the post above may have purged before the entry landed. Re-check
        // and remove the just-posted entry so the rejection is honored.
        if self.core.is_shutdown() {
            self.queue.remove(id);
            return Cancellation::rejected();
        }

        Cancellation::one_shot(self.queue.clone(), id)
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("token", &self.core.token)
            .field("shutdown", &self.core.is_shutdown())
            .finish()
    }
}

// === impl Core ===

impl Core {
    #[inline]
    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Acquire)
    }

    pub(crate) fn token(&self) -> Token {
        self.token
    }
}

impl fmt::Debug for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Core")
            .field("token", &self.token)
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}
