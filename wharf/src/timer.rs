//! Hierarchical timing wheel: a 256-slot near wheel ticked every 10ms plus
//! four 64-slot far wheels for longer delays, cascaded down as the near
//! wheel wraps. Grounded on `skynet_timer.c`'s `TI_NEAR`/`TI_FAR`/
//! `TI_FAR_N`/`TI_FAR_LEVEL` layout and `timer_shift`/`timer_execute`
//! algorithm, translated from intrusive linked lists to `VecDeque` buckets
//! under one [`SpinLock`] (the original takes a single global spinlock for
//! the whole wheel too).

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use nix::time::{clock_gettime, ClockId};

use crate::handle::Handle;
use crate::sync::SpinLock;

/// Reads the wall clock via `clock_gettime(CLOCK_REALTIME)` rather than
/// `std::time::SystemTime`, matching `skynet_timer.c`'s own use of
/// `clock_gettime` to seed `starttime`.
fn wall_clock_seconds() -> u64 {
    clock_gettime(ClockId::CLOCK_REALTIME)
        .map(|ts| ts.tv_sec().max(0) as u64)
        .unwrap_or(0)
}

const TI_NEAR_SHIFT: u32 = 8;
const TI_NEAR: usize = 1 << TI_NEAR_SHIFT; // 256
const TI_NEAR_MASK: u32 = (TI_NEAR as u32) - 1;

const TI_FAR_SHIFT: u32 = 6;
const TI_FAR: usize = 1 << TI_FAR_SHIFT; // 64
const TI_FAR_MASK: u32 = (TI_FAR as u32) - 1;
const TI_FAR_LEVELS: usize = 4;

/// A single pending timeout: the service to notify and the session it
/// expects the wakeup reply under.
#[derive(Debug, Clone)]
struct TimerEvent {
    handle: Handle,
    session: i32,
    /// Absolute tick this event was filed under, kept so re-cascading into
    /// a near-wheel slot recomputes the wait correctly.
    expire: u32,
}

struct Wheel {
    near: Vec<Vec<TimerEvent>>,
    far: [Vec<Vec<TimerEvent>>; TI_FAR_LEVELS],
    tick: u32,
}

impl Wheel {
    fn new() -> Wheel {
        Wheel {
            near: (0..TI_NEAR).map(|_| Vec::new()).collect(),
            far: std::array::from_fn(|_| (0..TI_FAR).map(|_| Vec::new()).collect()),
            tick: 0,
        }
    }

    fn add(&mut self, ev: TimerEvent) {
        let current = self.tick;
        let diff = ev.expire.wrapping_sub(current);
        if diff < TI_NEAR as u32 {
            let slot = (ev.expire & TI_NEAR_MASK) as usize;
            self.near[slot].push(ev);
            return;
        }
        for level in 0..TI_FAR_LEVELS {
            let shift = TI_NEAR_SHIFT + TI_FAR_SHIFT * (level as u32 + 1);
            if diff < 1u32 << shift || level == TI_FAR_LEVELS - 1 {
                let slot = ((ev.expire >> (TI_NEAR_SHIFT + TI_FAR_SHIFT * level as u32)) & TI_FAR_MASK) as usize;
                self.far[level][slot].push(ev);
                return;
            }
        }
    }

    /// Moves every event from one far-wheel slot down into the near wheel
    /// (or a lower far level), the "cascade" step `skynet_timer.c` runs
    /// whenever a higher wheel's slot counter wraps to zero.
    fn cascade(&mut self, level: usize, slot: usize) {
        let events = std::mem::take(&mut self.far[level][slot]);
        for ev in events {
            self.add(ev);
        }
    }

    /// Advances one tick, returning every event that just expired. A
    /// cascade can drop an event straight into the new current slot (it
    /// was filed for exactly this tick but lived in a far wheel until now),
    /// so the near slot is drained again after cascading, matching
    /// `skynet_timer.c`'s `timer_update` calling `timer_execute` both
    /// before and after `timer_shift`.
    fn advance(&mut self) -> Vec<TimerEvent> {
        let slot = (self.tick & TI_NEAR_MASK) as usize;
        let mut fired = std::mem::take(&mut self.near[slot]);
        self.tick = self.tick.wrapping_add(1);
        if self.tick & TI_NEAR_MASK == 0 {
            let mut carry = (self.tick >> TI_NEAR_SHIFT) as usize;
            for level in 0..TI_FAR_LEVELS {
                let far_slot = carry & (TI_FAR - 1);
                self.cascade(level, far_slot);
                carry >>= TI_FAR_SHIFT;
                if carry == 0 {
                    break;
                }
            }
        }
        let new_slot = (self.tick & TI_NEAR_MASK) as usize;
        fired.append(&mut self.near[new_slot]);
        fired
    }
}

/// One tick is 10ms, matching `skynet_timer.c`'s `TIME_NEAR` granularity.
pub const TICK_MS: u64 = 10;

pub struct TimingWheel {
    wheel: SpinLock<Wheel>,
    /// Monotonic tick counter, exposed in milliseconds via `now_ms`.
    ticks: AtomicU32,
    /// Wall-clock seconds, latched once per tick by the timer thread so
    /// readers never need a syscall.
    wall_seconds: AtomicU64,
    start_wall_seconds: u64,
}

impl TimingWheel {
    pub fn new() -> TimingWheel {
        let start_wall_seconds = wall_clock_seconds();
        TimingWheel {
            wheel: SpinLock::new(Wheel::new()),
            ticks: AtomicU32::new(0),
            wall_seconds: AtomicU64::new(start_wall_seconds),
            start_wall_seconds,
        }
    }

    /// Files an event `centiseconds` hundredths-of-a-second from now, the
    /// same unit `skynet_timeout` uses.
    pub fn add(&self, handle: Handle, centiseconds: u32, session: i32) {
        let now = self.ticks.load(Ordering::Relaxed);
        let ticks = centiseconds; // 1 centisecond == 1 tick at 10ms/tick
        let expire = now.wrapping_add(ticks);
        self.wheel.lock().add(TimerEvent {
            handle,
            session,
            expire,
        });
    }

    /// Advances the wheel by one tick and returns `(handle, session)` for
    /// everything that just fired.
    pub fn tick(&self) -> Vec<(Handle, i32)> {
        let fired = self.wheel.lock().advance();
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.wall_seconds.store(
            self.start_wall_seconds + self.now_ms() / 1000,
            Ordering::Relaxed,
        );
        fired.into_iter().map(|e| (e.handle, e.session)).collect()
    }

    pub fn now_ms(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed) as u64 * TICK_MS
    }

    pub fn wall_seconds(&self) -> u64 {
        self.wall_seconds.load(Ordering::Relaxed)
    }

    pub fn start_wall_seconds(&self) -> u64 {
        self.start_wall_seconds
    }
}

impl Default for TimingWheel {
    fn default() -> TimingWheel {
        TimingWheel::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_wheel_fires_on_exact_tick() {
        let w = TimingWheel::new();
        w.add(1, 3, 99);
        assert!(w.tick().is_empty());
        assert!(w.tick().is_empty());
        let fired = w.tick();
        assert_eq!(fired, vec![(1, 99)]);
    }

    #[test]
    fn far_wheel_event_cascades_down_and_fires() {
        let w = TimingWheel::new();
        // past TI_NEAR (256) ticks forces the far wheel.
        w.add(7, 300, 5);
        let mut fired = Vec::new();
        for _ in 0..301 {
            fired.extend(w.tick());
        }
        assert_eq!(fired, vec![(7, 5)]);
    }

    #[test]
    fn event_landing_on_the_cascade_tick_fires_the_same_tick_it_lands() {
        let w = TimingWheel::new();
        // expire == TI_NEAR lands in far[0][1] from tick 0; the 256th
        // `tick()` call cascades far[0][1] into near[0] and must also
        // drain that slot before returning, not on the call after.
        w.add(9, TI_NEAR as u32, 11);
        let mut fired = Vec::new();
        for _ in 0..(TI_NEAR as u32) {
            fired.extend(w.tick());
        }
        assert_eq!(fired, vec![(9, 11)]);
    }

    #[test]
    fn now_ms_advances_by_tick_granularity() {
        let w = TimingWheel::new();
        assert_eq!(w.now_ms(), 0);
        w.tick();
        assert_eq!(w.now_ms(), TICK_MS);
    }

    #[test]
    fn many_events_in_same_slot_all_fire() {
        let w = TimingWheel::new();
        for s in 0..10 {
            w.add(1, 5, s);
        }
        let mut fired = Vec::new();
        for _ in 0..6 {
            fired.extend(w.tick());
        }
        assert_eq!(fired.len(), 10);
    }
}
