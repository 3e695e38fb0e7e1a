//! Per-service mailbox: a FIFO of pending messages guarded by a spin-lock,
//! plus the bookkeeping the dispatcher needs to push it on and off the
//! global ready-queue exactly once at a time. Grounded on `skynet_mq.c`'s
//! `message_queue`, with the hand-rolled circular buffer swapped for
//! `VecDeque` (it already amortises growth the same way, without manual
//! pointer arithmetic).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::handle::Handle;
use crate::message::Message;
use crate::sync::SpinLock;

/// Above this many queued messages a warning is logged once per doubling,
/// mirroring `skynet_mq.c`'s overload detection.
pub const OVERLOAD_WARN_THRESHOLD: usize = 1024;

struct Inner {
    queue: VecDeque<Message>,
    overload_threshold: usize,
}

pub struct Mailbox {
    pub handle: Handle,
    inner: SpinLock<Inner>,
    /// Set once the owning service has been retired; the mailbox is drained
    /// one last time (replying error to anything left) and then dropped.
    releasing: AtomicBool,
    /// True while this mailbox is linked into the ready-queue, so the
    /// dispatcher never double-enqueues it: a mailbox is never queued more
    /// than once.
    in_ready_queue: AtomicBool,
}

impl Mailbox {
    pub fn new(handle: Handle) -> Mailbox {
        Mailbox {
            handle,
            inner: SpinLock::new(Inner {
                queue: VecDeque::new(),
                overload_threshold: OVERLOAD_WARN_THRESHOLD,
            }),
            releasing: AtomicBool::new(false),
            in_ready_queue: AtomicBool::new(false),
        }
    }

    pub fn push(&self, msg: Message) {
        self.inner.lock().queue.push_back(msg);
    }

    pub fn pop(&self) -> Option<Message> {
        let mut inner = self.inner.lock();
        let msg = inner.queue.pop_front();
        if inner.queue.is_empty() {
            inner.overload_threshold = OVERLOAD_WARN_THRESHOLD;
        }
        msg
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Doubles the overload threshold and returns the queue length that
    /// tripped it, if it has been tripped since the last call. Mirrors
    /// `skynet_mq.c`'s `MQ_OVERLOAD` logic: a one-shot warning per
    /// doubling, not a warning on every push past the line.
    pub fn check_overload(&self) -> Option<usize> {
        let mut inner = self.inner.lock();
        let len = inner.queue.len();
        if len > inner.overload_threshold {
            let warn_at = inner.overload_threshold;
            inner.overload_threshold *= 2;
            Some(warn_at)
        } else {
            None
        }
    }

    pub fn mark_releasing(&self) {
        self.releasing.store(true, Ordering::Release);
    }

    pub fn is_releasing(&self) -> bool {
        self.releasing.load(Ordering::Acquire)
    }

    /// Drains every remaining message, invoking `on_drop` for each (the
    /// caller replies `PType::Error` to anyone still waiting on a session).
    pub fn release(&self, mut on_drop: impl FnMut(Message)) {
        let mut inner = self.inner.lock();
        while let Some(msg) = inner.queue.pop_front() {
            on_drop(msg);
        }
    }

    /// Claims exclusive right to enqueue this mailbox on the ready-queue.
    /// Returns `false` if it's already linked in, matching `skynet_mq.c`'s
    /// "never queue the same mailbox twice" invariant.
    pub fn try_claim_ready(&self) -> bool {
        self.in_ready_queue
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release_ready_claim(&self) {
        self.in_ready_queue.store(false, Ordering::Release);
    }
}
