//! The dispatch-queue contract consumed by [`Scheduler`]s.
//!
//! This crate never implements the queue itself; the host environment
//! supplies one by implementing the [`Dispatch`] trait. The queue is the
//! only shared mutable resource between a [`Scheduler`], its [`Worker`]s,
//! and their tasks, and this layer treats it as append-only: post and remove
//! operations, nothing else.
//!
//! [`Scheduler`]: crate::Scheduler
//! [`Worker`]: crate::Worker
use alloc::boxed::Box;
use core::{
    fmt,
    sync::atomic::{AtomicU64, Ordering::Relaxed},
    time::Duration,
};

/// A single-threaded, time-ordered callback execution primitive.
///
/// # Contract
///
/// Implementations MUST guarantee:
///
/// - **Ordering**: entries run in time order; entries with the same target
///   time run in submission order.
/// - **Single-threaded delivery**: entries run one at a time, on one logical
///   thread, never overlapping. All scheduling state transitions in this
///   crate rely on this for their correctness.
/// - **Delays are lower bounds**: an entry posted with a delay runs no
///   earlier than that delay, but may run later. No starvation guarantee is
///   required of this layer's callers, and none is provided to them.
/// - **Removal**: [`remove`](Dispatch::remove) discards the pending entry
///   with the given id, if any; [`remove_all`](Dispatch::remove_all)
///   discards every pending entry carrying the given token. Both are no-ops
///   when nothing matches, and neither affects an entry the queue has
///   already dequeued for execution.
///
/// The queue's lifecycle is externally owned: it typically predates and
/// outlives any [`Scheduler`](crate::Scheduler) bound to it.
pub trait Dispatch: Send + Sync {
    /// Submit `entry` for execution as soon as possible.
    ///
    /// Even an entry posted with no delay runs asynchronously, on the
    /// queue's dispatch thread — never inline in the caller.
    fn post(&self, entry: Entry);

    /// Submit `entry` for execution no earlier than `delay` from now.
    fn post_delayed(&self, entry: Entry, delay: Duration);

    /// Discard the pending entry with the given `id`, if one exists.
    fn remove(&self, id: EntryId);

    /// Discard every pending entry tagged with `token`.
    fn remove_all(&self, token: Token);
}

/// Identifies one logical submission for removal by identity.
///
/// A periodic task reuses a single `EntryId` for every resubmission it
/// makes, so removing that id always removes whichever resubmission is
/// currently pending.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(u64);

/// An opaque grouping token enabling bulk removal.
///
/// Every [`Worker`](crate::Worker) tags its submissions with its own token,
/// so [`Worker::shutdown`](crate::Worker::shutdown) can purge all of them in
/// one [`remove_all`](Dispatch::remove_all) call.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Token(u64);

/// One unit of work submitted to a [`Dispatch`] queue.
///
/// Entries are constructed only by this crate; the host queue stores them,
/// orders them by target time, and eventually [`run`](Entry::run)s them on
/// its dispatch thread.
pub struct Entry {
    id: EntryId,
    token: Option<Token>,
    job: Box<dyn FnOnce() + Send>,
}

// === impl EntryId ===

impl EntryId {
    /// Mints a fresh, process-unique id.
    pub(crate) fn next() -> Self {
        // ids only need uniqueness, not modeled memory ordering, so this
        // stays a `core` atomic even under loom (which cannot place its
        // atomics in a static).
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Relaxed))
    }
}

// === impl Token ===

impl Token {
    /// Mints a fresh, process-unique token.
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Relaxed))
    }
}

// === impl Entry ===

impl Entry {
    pub(crate) fn new(id: EntryId, token: Option<Token>, job: Box<dyn FnOnce() + Send>) -> Self {
        Self { id, token, job }
    }

    /// Returns the id identifying this entry for removal.
    #[must_use]
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Returns the grouping token for bulk removal, if this entry has one.
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        self.token
    }

    /// Runs this entry's job, consuming the entry.
    ///
    /// Must be called on the queue's dispatch thread. A panic unwinding out
    /// of the job is the queue's fault boundary to deal with; this layer
    /// neither catches nor retries.
    pub fn run(self) {
        (self.job)()
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("token", &self.token)
            .finish()
    }
}
