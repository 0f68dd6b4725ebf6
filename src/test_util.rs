//! A deterministic, virtual-time dispatch queue for tests.
//!
//! Time only moves when a test calls [`TestQueue::advance`] (or
//! [`TestQueue::sleep`], which simulates a task body consuming time), so
//! every test observes exact, reproducible fire times.
use crate::{
    clock::{dur_to_millis, Clock, Millis},
    dispatch::{Dispatch, Entry, EntryId, Token},
};
use std::sync::Arc;

#[cfg(loom)]
use loom::sync::Mutex;
#[cfg(not(loom))]
use std::sync::Mutex;

/// The virtual-time queue. Entries run strictly in `(due, submission)`
/// order, on whichever thread calls [`advance`](Self::advance) — one at a
/// time, like the host primitive this crate adapts.
pub(crate) struct TestQueue {
    state: Mutex<State>,
}

struct State {
    now: Millis,
    seq: u64,
    entries: Vec<Pending>,
}

struct Pending {
    due: Millis,
    seq: u64,
    entry: Entry,
}

impl TestQueue {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                now: 0,
                seq: 0,
                entries: Vec::new(),
            }),
        })
    }

    /// Returns a [`Clock`] reading this queue's virtual time.
    pub(crate) fn clock(self: &Arc<Self>) -> Clock {
        let queue = self.clone();
        Clock::new(move || queue.now()).named("test-queue")
    }

    /// The current virtual time, in milliseconds.
    pub(crate) fn now(&self) -> Millis {
        self.lock().now
    }

    /// The number of currently pending entries.
    pub(crate) fn pending(&self) -> usize {
        self.lock().entries.len()
    }

    /// Advances virtual time by `ms`, running every entry that falls due —
    /// including entries posted *while* advancing, so periodic catch-up
    /// chains play out exactly as they would on a live queue.
    pub(crate) fn advance(&self, ms: Millis) {
        let target = self.lock().now.saturating_add(ms);
        loop {
            let entry = {
                let mut state = self.lock();
                let next = state
                    .entries
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(_, p)| (p.due, p.seq))
                    .map(|(i, _)| i);
                match next {
                    Some(i) => {
                        let pending = state.entries.remove(i);
                        if pending.due > state.now {
                            state.now = pending.due;
                        }
                        pending.entry
                    }
                    None => {
                        if target > state.now {
                            state.now = target;
                        }
                        break;
                    }
                }
            };
            // run with the lock released: entries re-post themselves.
            entry.run();
        }
    }

    /// Moves virtual time forward *without* running due entries, simulating
    /// a task body that takes `ms` of wall time to execute.
    pub(crate) fn sleep(&self, ms: Millis) {
        let mut state = self.lock();
        state.now = state.now.saturating_add(ms);
    }

    fn insert(&self, entry: Entry, delay: Millis) {
        let mut state = self.lock();
        // the scheduler never leaves more than one pending entry per id
        // (one-shot ids are unique; a periodic reuses its id but has at
        // most one resubmission in flight).
        assert!(
            state.entries.iter().all(|p| p.entry.id() != entry.id()),
            "duplicate pending entry id {:?}",
            entry.id()
        );
        let due = state.now.saturating_add(delay);
        let seq = state.seq;
        state.seq += 1;
        state.entries.push(Pending { due, seq, entry });
    }

    fn lock(&self) -> impl core::ops::DerefMut<Target = State> + '_ {
        self.state.lock().expect("test queue mutex will never poison")
    }
}

impl Dispatch for TestQueue {
    fn post(&self, entry: Entry) {
        self.insert(entry, 0);
    }

    fn post_delayed(&self, entry: Entry, delay: core::time::Duration) {
        self.insert(entry, dur_to_millis(delay));
    }

    fn remove(&self, id: EntryId) {
        self.lock().entries.retain(|p| p.entry.id() != id);
    }

    fn remove_all(&self, token: Token) {
        self.lock().entries.retain(|p| p.entry.token() != Some(token));
    }
}

#[cfg(not(loom))]
pub(crate) fn trace_init() {
    use tracing_subscriber::filter::LevelFilter;
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .try_init();
}
