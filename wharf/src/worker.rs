//! Thread pool: N worker threads draining the ready-queue, one timer
//! thread ticking the wheel every 10ms, one monitor thread sweeping for
//! endless loops. Grounded on `skynet_start.c`'s `_start`: it spawns
//! `thread_worker` × N, `thread_timer`, and `thread_monitor`, and uses the
//! same "wake one sleeper if there's more work than busy threads can
//! cover" heuristic this crate pulled out into `wharf_wake::WakePool`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::dispatcher::{self, DispatchOutcome};
use crate::runtime::RuntimeInner;
use crate::timer::TICK_MS;

/// Per-worker dispatch weight, indexed by worker id and clamped to
/// however many workers were configured. Mirrors `skynet_start.c`'s
/// `weight[]` table: the first few workers drain aggressively (they see
/// the busiest services), the rest take one message at a time.
const WEIGHT_TABLE: &[i32] = &[
    -1, -1, -1, -1, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 3, 3, 3, 3, 3, 3, 3, 3,
];

pub fn weight_for(worker_id: usize) -> i32 {
    WEIGHT_TABLE.get(worker_id).copied().unwrap_or(3)
}

pub struct WorkerPool {
    handles: Vec<thread::JoinHandle<()>>,
    quit: Arc<AtomicBool>,
}

impl WorkerPool {
    /// `runtime.wake` and `runtime.busy` must already exist; this just
    /// spawns the threads that drive them.
    pub fn spawn(runtime: Arc<RuntimeInner>, worker_count: usize) -> WorkerPool {
        let quit = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(worker_count + 2);

        for worker_id in 0..worker_count {
            let runtime = runtime.clone();
            handles.push(
                thread::Builder::new()
                    .name(format!("wharf-worker-{worker_id}"))
                    .spawn(move || worker_loop(runtime, worker_id))
                    .expect("spawn worker thread"),
            );
        }
        {
            let runtime = runtime.clone();
            let quit = quit.clone();
            handles.push(
                thread::Builder::new()
                    .name("wharf-timer".to_string())
                    .spawn(move || timer_loop(runtime, quit))
                    .expect("spawn timer thread"),
            );
        }
        {
            let quit = quit.clone();
            handles.push(
                thread::Builder::new()
                    .name("wharf-monitor".to_string())
                    .spawn(move || monitor_loop(runtime, quit))
                    .expect("spawn monitor thread"),
            );
        }

        WorkerPool { handles, quit }
    }

    pub fn shutdown(mut self, runtime: &RuntimeInner) {
        self.quit.store(true, Ordering::SeqCst);
        runtime.wake.quit();
        for h in self.handles.drain(..) {
            let _ = h.join();
        }
    }
}

fn worker_loop(runtime: Arc<RuntimeInner>, worker_id: usize) {
    let weight = weight_for(worker_id);
    loop {
        runtime.busy.fetch_add(1, Ordering::Relaxed);
        let outcome = dispatcher::dispatch_once(
            &runtime.ready,
            &runtime.registry,
            &runtime.monitor,
            worker_id,
            weight,
        );
        runtime.busy.fetch_sub(1, Ordering::Relaxed);
        match outcome {
            DispatchOutcome::Worked { .. } => continue,
            DispatchOutcome::Idle => {
                let woken = runtime.wake.park_while(|| runtime.ready.is_empty());
                if !woken {
                    return; // quit() was called
                }
            }
        }
    }
}

fn timer_loop(runtime: Arc<RuntimeInner>, quit: Arc<AtomicBool>) {
    while !quit.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(TICK_MS));
        for (handle, session) in runtime.timer.tick() {
            runtime.deliver_timeout(handle, session);
        }
    }
}

fn monitor_loop(runtime: Arc<RuntimeInner>, quit: Arc<AtomicBool>) {
    // `skynet_start.c` checks every 5 seconds; same cadence here.
    const CHECK_INTERVAL: Duration = Duration::from_secs(5);
    while !quit.load(Ordering::Relaxed) {
        thread::sleep(CHECK_INTERVAL);
        for (source, dest) in runtime.monitor.sweep() {
            if let Ok(ctx) = runtime.registry.grab(dest) {
                ctx.mark_endless();
            }
            log::error!(
                "service :{dest:08x} has not responded in {CHECK_INTERVAL:?}, last message from :{source:08x}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_table_is_monotonically_non_decreasing() {
        for pair in WEIGHT_TABLE.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn out_of_range_worker_gets_the_heaviest_weight() {
        assert_eq!(weight_for(1000), *WEIGHT_TABLE.last().unwrap());
    }
}
