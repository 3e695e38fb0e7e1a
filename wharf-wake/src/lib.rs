/*! A condition-variable wakeup pool for bursty worker threads.

This is the same trade-off the original `burst-chan` SPMC handoff made
(most of the time nothing is happening; occasionally every worker needs
waking at once) ported from a single-value eventfd handoff onto a
counted condition variable, because the runtime this crate now serves
doesn't hand a value to a specific woken thread: it hands a *global
ready-queue* to whichever thread wakes up first. The workers race to
pop from that queue themselves; `WakePool` only answers "is it worth
paying for a syscall to wake someone up?"

```
use wharf_wake::WakePool;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

let pool = Arc::new(WakePool::new(4));
let seen = Arc::new(AtomicUsize::new(0));
let mut handles = vec![];
for _ in 0..4 {
    let pool = pool.clone();
    let seen = seen.clone();
    handles.push(thread::spawn(move || {
        pool.park_while(|| seen.load(Ordering::SeqCst) == 0);
    }));
}
seen.store(1, Ordering::SeqCst);
pool.wake(0);
for h in handles { h.join().unwrap(); }
```
*/

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

/// Shared wakeup state for a fixed-size pool of worker threads.
///
/// A worker calls [`park_while`](WakePool::park_while) when it has run out of
/// work; a producer calls [`wake`](WakePool::wake) after making new work
/// available. `wake` only issues `notify_one` when enough threads are
/// already asleep, which keeps a steady stream of single-item pushes from
/// causing a wakeup storm.
pub struct WakePool {
    count: usize,
    sleeping: AtomicUsize,
    quit: AtomicBool,
    gate: Mutex<()>,
    condvar: Condvar,
}

impl WakePool {
    /// Create a pool sized for `count` worker threads.
    pub fn new(count: usize) -> WakePool {
        WakePool {
            count,
            sleeping: AtomicUsize::new(0),
            quit: AtomicBool::new(false),
            gate: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    /// Number of worker threads this pool was sized for.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of threads currently parked in [`park_while`](Self::park_while).
    pub fn sleeping(&self) -> usize {
        self.sleeping.load(Ordering::SeqCst)
    }

    /// Wake one sleeping thread if at least `count - busy` threads are
    /// asleep.
    ///
    /// `busy` is the number of threads the caller already knows are awake
    /// and won't need waking (e.g. the timer thread always treats all but
    /// itself as potentially sleeping; the I/O thread treats none of them
    /// as busy, since it can't tell). A spurious wakeup is harmless: a
    /// worker that finds nothing to do just goes back to sleep.
    pub fn wake(&self, busy: usize) {
        if self.sleeping.load(Ordering::SeqCst) + busy >= self.count {
            let _g = self.gate.lock().unwrap();
            self.condvar.notify_one();
        }
    }

    /// Wake every sleeping thread. Used on shutdown.
    pub fn wake_all(&self) {
        let _g = self.gate.lock().unwrap();
        self.condvar.notify_all();
    }

    /// Signal all current and future callers of [`park_while`](Self::park_while)
    /// to stop blocking and return immediately.
    pub fn quit(&self) {
        self.quit.store(true, Ordering::SeqCst);
        self.wake_all();
    }

    pub fn should_quit(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }

    /// Park the calling thread while `still_idle` returns `true`, unless
    /// [`quit`](Self::quit) has been called.
    ///
    /// `still_idle` is re-checked under the gate mutex each time the
    /// condition variable wakes up, so spurious wakeups (including the ones
    /// `wake`'s heuristic deliberately allows) are harmless: the thread just
    /// calls `still_idle` again and parks again if there's really nothing to
    /// do. Returns `true` if woken normally, `false` if woken by `quit`.
    pub fn park_while<F: FnMut() -> bool>(&self, mut still_idle: F) -> bool {
        let mut guard = self.gate.lock().unwrap();
        self.sleeping.fetch_add(1, Ordering::SeqCst);
        while !self.quit.load(Ordering::SeqCst) && still_idle() {
            guard = self.condvar.wait(guard).unwrap();
        }
        self.sleeping.fetch_sub(1, Ordering::SeqCst);
        !self.quit.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wakes_a_parked_thread() {
        let pool = Arc::new(WakePool::new(1));
        let flag = Arc::new(AtomicBool::new(false));
        let p2 = pool.clone();
        let f2 = flag.clone();
        let h = thread::spawn(move || {
            p2.park_while(|| !f2.load(Ordering::SeqCst));
        });
        thread::sleep(Duration::from_millis(20));
        assert_eq!(pool.sleeping(), 1);
        flag.store(true, Ordering::SeqCst);
        pool.wake(0);
        h.join().unwrap();
        assert_eq!(pool.sleeping(), 0);
    }

    #[test]
    fn quit_releases_all_parked_threads() {
        let pool = Arc::new(WakePool::new(3));
        let mut handles = vec![];
        for _ in 0..3 {
            let p = pool.clone();
            handles.push(thread::spawn(move || {
                p.park_while(|| true);
            }));
        }
        thread::sleep(Duration::from_millis(20));
        pool.quit();
        for h in handles {
            h.join().unwrap();
        }
        assert!(pool.should_quit());
    }

    #[test]
    fn wake_heuristic_skips_notify_when_workers_are_busy() {
        let pool = WakePool::new(4);
        // No one is asleep and none are marked busy below the threshold.
        pool.wake(0);
        assert_eq!(pool.sleeping(), 0);
    }
}
