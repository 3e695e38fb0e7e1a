//! Endless-loop detection: each worker owns one slot recording the
//! message it's currently dispatching and a version counter bumped before
//! and after every dispatch. A separate thread samples all slots on an
//! interval; if a slot's version hasn't moved since the last sample, that
//! worker has been stuck in a single callback across the whole interval.
//! Grounded on `skynet_monitor.c`'s `skynet_monitor` struct and
//! `skynet_monitor_check`.
//!
//! Also carries the small "who watches whom" table backing the `MONITOR`
//! command: a watcher handle is sent `PType::Error` when its watched
//! handle is retired, same as `skynet_server.c`'s exit notification.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::handle::Handle;

struct Slot {
    source: AtomicU64,
    dest: AtomicU64,
    version: AtomicU32,
    /// Latched by the checker thread: version observed last sweep.
    checked_version: AtomicU32,
}

impl Slot {
    fn new() -> Slot {
        Slot {
            source: AtomicU64::new(0),
            dest: AtomicU64::new(0),
            version: AtomicU32::new(0),
            checked_version: AtomicU32::new(0),
        }
    }
}

pub struct Monitor {
    slots: Vec<Slot>,
    watchers: Mutex<Vec<(Handle, Handle)>>, // (watcher, watched)
}

impl Monitor {
    pub fn new(worker_count: usize) -> Monitor {
        Monitor {
            slots: (0..worker_count).map(|_| Slot::new()).collect(),
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// Called by a worker right before handing a message to a service's
    /// callback. `worker_id` indexes this worker's slot.
    pub fn begin(&self, worker_id: usize, source: Handle, dest: Handle) {
        let slot = &self.slots[worker_id];
        slot.source.store(source as u64, Ordering::Relaxed);
        slot.dest.store(dest as u64, Ordering::Relaxed);
        slot.version.fetch_add(1, Ordering::Relaxed);
    }

    /// Called right after the callback returns.
    pub fn end(&self, worker_id: usize) {
        self.slots[worker_id].version.fetch_add(1, Ordering::Relaxed);
    }

    /// Samples every slot; an odd version means a dispatch is mid-flight,
    /// and an unchanged version since the last sweep means it's been
    /// mid-flight for a whole interval. Returns the `(source, dest)` pairs
    /// judged stuck. Mirrors `skynet_monitor_check`.
    pub fn sweep(&self) -> Vec<(Handle, Handle)> {
        let mut stuck = Vec::new();
        for slot in &self.slots {
            let version = slot.version.load(Ordering::Relaxed);
            let last = slot.checked_version.swap(version, Ordering::Relaxed);
            if version == last && version % 2 == 1 {
                stuck.push((
                    slot.source.load(Ordering::Relaxed) as Handle,
                    slot.dest.load(Ordering::Relaxed) as Handle,
                ));
            }
        }
        stuck
    }

    pub fn watch(&self, watcher: Handle, watched: Handle) {
        self.watchers.lock().push((watcher, watched));
    }

    /// Returns every watcher registered against `watched`, removing them
    /// (a watch fires at most once, same as an exit monitor in the
    /// original).
    pub fn take_watchers(&self, watched: Handle) -> Vec<Handle> {
        let mut watchers = self.watchers.lock();
        let mut hit = Vec::new();
        watchers.retain(|&(w, d)| {
            if d == watched {
                hit.push(w);
                false
            } else {
                true
            }
        });
        hit
    }
}
