//! Backoff schedules and the shared retry timer
//!
//! A `RetrySchedule` is a finite sequence of delays applied to transient
//! backend failures. Commit conflicts are not governed by it — those retry
//! immediately and unbounded inside the database loop.
//!
//! `RetryTimer` is a single timer thread with a deadline-ordered queue.
//! One shared instance serves the whole process; it is never joined
//! implicitly, so it cannot block process exit, and `shutdown()` tears it
//! down cleanly where that matters (tests, embedders with strict thread
//! hygiene).

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};
use tracing::error;

/// A finite sequence of delays for transient-failure retries.
#[derive(Debug, Clone, Default)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

impl RetrySchedule {
    /// No retries: the first transient failure surfaces.
    pub fn none() -> Self {
        Self::default()
    }

    /// The same delay, `attempts` times.
    pub fn fixed(attempts: usize, delay: Duration) -> Self {
        RetrySchedule {
            delays: vec![delay; attempts],
        }
    }

    /// Exponential backoff: `base`, doubling each attempt, capped at `max`.
    pub fn exponential(attempts: usize, base: Duration, max: Duration) -> Self {
        let delays = (0..attempts)
            .map(|i| {
                // cap the shift to prevent overflow
                let factor = 1u32 << i.min(31);
                base.saturating_mul(factor).min(max)
            })
            .collect();
        RetrySchedule { delays }
    }

    /// An explicit delay sequence.
    pub fn from_delays(delays: Vec<Duration>) -> Self {
        RetrySchedule { delays }
    }

    /// The delay sequence.
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Number of retries this schedule allows.
    pub fn len(&self) -> usize {
        self.delays.len()
    }

    /// Whether the schedule allows no retries.
    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }
}

struct TimerEntry {
    deadline: Instant,
    sequence: u64,
    work: Box<dyn FnOnce() + Send>,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.sequence == other.sequence
    }
}

// Earliest deadline first, then submission order
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then(other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct TimerInner {
    queue: Mutex<BinaryHeap<TimerEntry>>,
    wakeup: Condvar,
    shutdown: AtomicBool,
    sequence: AtomicU64,
}

/// A single timer thread scheduling delayed work.
pub struct RetryTimer {
    inner: Arc<TimerInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

static SHARED: Lazy<Arc<RetryTimer>> = Lazy::new(|| Arc::new(RetryTimer::new()));

impl RetryTimer {
    /// Spawn a dedicated timer. Most callers want [`RetryTimer::shared`].
    pub fn new() -> Self {
        let inner = Arc::new(TimerInner {
            queue: Mutex::new(BinaryHeap::new()),
            wakeup: Condvar::new(),
            shutdown: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
        });

        let inner_clone = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name("trellis-retry-timer".to_string())
            .spawn(move || timer_loop(&inner_clone))
            .expect("failed to spawn retry timer thread");

        RetryTimer {
            inner,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// The process-wide timer instance.
    pub fn shared() -> Arc<RetryTimer> {
        Arc::clone(&SHARED)
    }

    /// Run `work` after `delay`. After shutdown the work runs inline on the
    /// caller's thread instead of silently disappearing.
    pub fn schedule(&self, delay: Duration, work: impl FnOnce() + Send + 'static) {
        if self.inner.shutdown.load(AtomicOrdering::Acquire) {
            work();
            return;
        }

        let sequence = self.inner.sequence.fetch_add(1, AtomicOrdering::Relaxed);
        let entry = TimerEntry {
            deadline: Instant::now() + delay,
            sequence,
            work: Box::new(work),
        };

        {
            let mut queue = self.inner.queue.lock();
            queue.push(entry);
        }
        self.inner.wakeup.notify_one();
    }

    /// Block the calling thread for `delay` using the timer.
    pub fn sleep(&self, delay: Duration) {
        let (tx, rx) = mpsc::sync_channel(1);
        self.schedule(delay, move || {
            let _ = tx.send(());
        });
        let _ = rx.recv();
    }

    /// Stop the timer thread. Entries still queued fire immediately on the
    /// timer thread before it exits.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, AtomicOrdering::Release);
        {
            let _queue = self.inner.queue.lock();
            self.inner.wakeup.notify_all();
        }
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Default for RetryTimer {
    fn default() -> Self {
        Self::new()
    }
}

fn timer_loop(inner: &TimerInner) {
    loop {
        let entry = {
            let mut queue = inner.queue.lock();
            loop {
                let shutting_down = inner.shutdown.load(AtomicOrdering::Acquire);
                let wait = match queue.peek() {
                    Some(head) => {
                        let now = Instant::now();
                        if shutting_down || head.deadline <= now {
                            None
                        } else {
                            Some(head.deadline - now)
                        }
                    }
                    None => {
                        if shutting_down {
                            return;
                        }
                        inner.wakeup.wait(&mut queue);
                        continue;
                    }
                };
                match wait {
                    None => {
                        if let Some(entry) = queue.pop() {
                            break entry;
                        }
                    }
                    Some(wait) => {
                        let _ = inner.wakeup.wait_for(&mut queue, wait);
                    }
                }
            }
        };

        // Run outside the lock. A panicking callback must not kill the timer.
        if std::panic::catch_unwind(std::panic::AssertUnwindSafe(entry.work)).is_err() {
            error!("scheduled retry callback panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_schedule_constructors() {
        assert!(RetrySchedule::none().is_empty());
        assert_eq!(
            RetrySchedule::fixed(3, Duration::from_millis(5)).len(),
            3
        );

        let exp = RetrySchedule::exponential(
            4,
            Duration::from_millis(10),
            Duration::from_millis(50),
        );
        assert_eq!(
            exp.delays(),
            &[
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(40),
                Duration::from_millis(50),
            ]
        );
    }

    #[test]
    fn test_timer_runs_work() {
        let timer = RetryTimer::new();
        let (tx, rx) = mpsc::channel();
        timer.schedule(Duration::from_millis(5), move || {
            tx.send(42).unwrap();
        });
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 42);
        timer.shutdown();
    }

    #[test]
    fn test_timer_orders_by_deadline() {
        let timer = RetryTimer::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = Arc::clone(&order);
        timer.schedule(Duration::from_millis(40), move || o.lock().push("late"));
        let o = Arc::clone(&order);
        timer.schedule(Duration::from_millis(5), move || o.lock().push("early"));

        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(*order.lock(), vec!["early", "late"]);
        timer.shutdown();
    }

    #[test]
    fn test_sleep_blocks_roughly_the_delay() {
        let timer = RetryTimer::new();
        let start = Instant::now();
        timer.sleep(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
        timer.shutdown();
    }

    #[test]
    fn test_shutdown_fires_pending_entries() {
        let timer = RetryTimer::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);
        timer.schedule(Duration::from_secs(60), move || {
            r.fetch_add(1, AtomicOrdering::Relaxed);
        });
        timer.shutdown();
        assert_eq!(ran.load(AtomicOrdering::Relaxed), 1);
    }

    #[test]
    fn test_schedule_after_shutdown_runs_inline() {
        let timer = RetryTimer::new();
        timer.shutdown();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);
        timer.schedule(Duration::from_secs(60), move || {
            r.fetch_add(1, AtomicOrdering::Relaxed);
        });
        assert_eq!(ran.load(AtomicOrdering::Relaxed), 1);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let timer = RetryTimer::new();
        timer.shutdown();
        timer.shutdown();
    }

    #[test]
    fn test_panicking_work_does_not_kill_the_timer() {
        let timer = RetryTimer::new();
        timer.schedule(Duration::from_millis(1), || panic!("intentional"));
        let (tx, rx) = mpsc::channel();
        timer.schedule(Duration::from_millis(10), move || {
            tx.send(()).unwrap();
        });
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
        timer.shutdown();
    }
}
