//! End-to-end tests against a real host queue: one dispatch thread, real
//! sleeps, real cross-thread cancellation.
//!
//! The queue implemented here is the kind of collaborator `enoki` is meant
//! to be embedded on: a single-consumer, time-ordered callback queue with
//! removal by identity and by token. Timing assertions use generous margins
//! since delays are lower bounds, not deadlines.
use enoki::{Cancellation, Clock, Dispatch, Entry, EntryId, Millis, Scheduler, Token};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Condvar, Mutex,
};
use std::thread;
use std::time::{Duration, Instant};

struct HostQueue {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    cv: Condvar,
}

struct State {
    entries: Vec<(Instant, u64, Entry)>,
    seq: u64,
    closed: bool,
}

impl HostQueue {
    /// Starts the dispatch thread and returns the queue plus a clock
    /// reading the same time base.
    fn start() -> (Arc<Self>, Clock) {
        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                entries: Vec::new(),
                seq: 0,
                closed: false,
            }),
            cv: Condvar::new(),
        });

        let dispatch = inner.clone();
        thread::spawn(move || dispatch_loop(dispatch));

        let epoch = Instant::now();
        let clock =
            Clock::new(move || epoch.elapsed().as_millis() as Millis).named("host-queue");

        (Arc::new(Self { inner }), clock)
    }

    /// Stops the dispatch thread, discarding pending entries.
    fn close(&self) {
        self.inner.state.lock().unwrap().closed = true;
        self.inner.cv.notify_one();
    }

    fn insert(&self, entry: Entry, delay: Duration) {
        let mut state = self.inner.state.lock().unwrap();
        let seq = state.seq;
        state.seq += 1;
        state.entries.push((Instant::now() + delay, seq, entry));
        self.inner.cv.notify_one();
    }
}

fn dispatch_loop(inner: Arc<Inner>) {
    let mut state = inner.state.lock().unwrap();
    loop {
        if state.closed {
            return;
        }

        let next = state
            .entries
            .iter()
            .enumerate()
            .min_by_key(|(_, (due, seq, _))| (*due, *seq))
            .map(|(i, (due, _, _))| (i, *due));

        match next {
            None => {
                state = inner.cv.wait(state).unwrap();
            }
            Some((i, due)) => {
                let now = Instant::now();
                if due <= now {
                    let (_, _, entry) = state.entries.remove(i);
                    // run with the lock released: entries re-post, and
                    // callers remove, concurrently.
                    drop(state);
                    entry.run();
                    state = inner.state.lock().unwrap();
                } else {
                    let (guard, _timeout) = inner.cv.wait_timeout(state, due - now).unwrap();
                    state = guard;
                }
            }
        }
    }
}

impl Dispatch for HostQueue {
    fn post(&self, entry: Entry) {
        self.insert(entry, Duration::ZERO);
    }

    fn post_delayed(&self, entry: Entry, delay: Duration) {
        self.insert(entry, delay);
    }

    fn remove(&self, id: EntryId) {
        let mut state = self.inner.state.lock().unwrap();
        state.entries.retain(|(_, _, e)| e.id() != id);
        self.inner.cv.notify_one();
    }

    fn remove_all(&self, token: Token) {
        let mut state = self.inner.state.lock().unwrap();
        state.entries.retain(|(_, _, e)| e.token() != Some(token));
        self.inner.cv.notify_one();
    }
}

fn trace_init() {
    use tracing_subscriber::filter::LevelFilter;
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .try_init();
}

/// Spins until `predicate` holds or the timeout elapses.
fn wait_for(predicate: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    predicate()
}

#[test]
fn one_shot_fires_once_at_or_after_delay() {
    trace_init();
    let (queue, clock) = HostQueue::start();
    let scheduler = Scheduler::new(queue.clone(), clock.clone());

    let fired_at = Arc::new(Mutex::new(Vec::new()));
    let _handle: Cancellation = scheduler.schedule_after(
        {
            let fired_at = fired_at.clone();
            let clock = clock.clone();
            move || fired_at.lock().unwrap().push(clock.now_millis())
        },
        Duration::from_millis(30),
    );

    assert!(
        wait_for(|| !fired_at.lock().unwrap().is_empty(), Duration::from_secs(5)),
        "one-shot never fired"
    );
    thread::sleep(Duration::from_millis(150));

    let fired_at = fired_at.lock().unwrap();
    assert_eq!(fired_at.len(), 1, "one-shot fired more than once");
    assert!(fired_at[0] >= 30, "fired at {}ms, before its 30ms delay", fired_at[0]);

    queue.close();
}

#[test]
fn disposed_one_shot_never_fires() {
    trace_init();
    let (queue, clock) = HostQueue::start();
    let scheduler = Scheduler::new(queue.clone(), clock);
    let worker = scheduler.create_worker();

    let count = Arc::new(AtomicUsize::new(0));
    let handle = worker.schedule_after(
        {
            let count = count.clone();
            move || {
                count.fetch_add(1, Ordering::SeqCst);
            }
        },
        Duration::from_millis(100),
    );
    handle.dispose();

    thread::sleep(Duration::from_millis(300));
    assert_eq!(count.load(Ordering::SeqCst), 0, "disposed one-shot fired");

    queue.close();
}

#[test]
fn periodic_runs_until_disposed() {
    trace_init();
    let (queue, clock) = HostQueue::start();
    let scheduler = Scheduler::new(queue.clone(), clock);
    let worker = scheduler.create_worker();

    let count = Arc::new(AtomicUsize::new(0));
    let handle = worker.schedule_periodic(
        {
            let count = count.clone();
            move || {
                count.fetch_add(1, Ordering::SeqCst);
            }
        },
        Duration::ZERO,
        Duration::from_millis(50),
    );

    assert!(
        wait_for(|| count.load(Ordering::SeqCst) >= 3, Duration::from_secs(5)),
        "periodic task never reached 3 executions"
    );
    handle.dispose();

    let settled = count.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(500));
    assert_eq!(
        count.load(Ordering::SeqCst),
        settled,
        "periodic fired after dispose"
    );

    queue.close();
}

#[test]
fn shutdown_cancels_already_pending_task() {
    trace_init();
    let (queue, clock) = HostQueue::start();
    let scheduler = Scheduler::new(queue.clone(), clock);
    let worker = scheduler.create_worker();

    let count = Arc::new(AtomicUsize::new(0));
    worker.schedule_after(
        {
            let count = count.clone();
            move || {
                count.fetch_add(1, Ordering::SeqCst);
            }
        },
        Duration::from_millis(50),
    );
    worker.shutdown();

    thread::sleep(Duration::from_millis(300));
    assert_eq!(count.load(Ordering::SeqCst), 0, "task ran after worker shutdown");

    queue.close();
}
