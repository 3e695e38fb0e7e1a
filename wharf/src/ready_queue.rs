//! The global queue of mailboxes with pending work. `skynet_mq.c` links
//! queues into an intrusive singly-linked list under a spin-lock; here a
//! `Mutex<VecDeque<_>>` gets the same FIFO-of-mailboxes behaviour without
//! unsafe intrusive-list code, and `parking_lot::Mutex` lets workers block
//! on it cheaply via [`crate::worker`]'s wake pool instead of spinning.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::mailbox::Mailbox;

#[derive(Default)]
pub struct ReadyQueue {
    queue: Mutex<VecDeque<Arc<Mailbox>>>,
}

impl ReadyQueue {
    pub fn new() -> ReadyQueue {
        ReadyQueue::default()
    }

    /// Enqueues `mailbox` unless it's already linked in. Call this after
    /// pushing a message; the mailbox tracks its own ready-queue membership
    /// so callers never need to check first.
    pub fn push_if_absent(&self, mailbox: &Arc<Mailbox>) {
        if mailbox.try_claim_ready() {
            self.queue.lock().push_back(mailbox.clone());
        }
    }

    /// Pops the next mailbox with work, releasing its ready-queue claim so
    /// a future push can re-enqueue it. Returns `None` if the queue is
    /// empty right now.
    pub fn pop(&self) -> Option<Arc<Mailbox>> {
        let mailbox = self.queue.lock().pop_front()?;
        mailbox.release_ready_claim();
        Some(mailbox)
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_pop_round_trips() {
        let rq = ReadyQueue::new();
        let mb = Arc::new(Mailbox::new(1));
        rq.push_if_absent(&mb);
        assert_eq!(rq.len(), 1);
        let popped = rq.pop().unwrap();
        assert_eq!(popped.handle, 1);
        assert!(rq.is_empty());
    }

    #[test]
    fn double_push_before_pop_enqueues_once() {
        let rq = ReadyQueue::new();
        let mb = Arc::new(Mailbox::new(1));
        rq.push_if_absent(&mb);
        rq.push_if_absent(&mb);
        assert_eq!(rq.len(), 1);
    }

    #[test]
    fn push_after_pop_reenqueues() {
        let rq = ReadyQueue::new();
        let mb = Arc::new(Mailbox::new(1));
        rq.push_if_absent(&mb);
        rq.pop().unwrap();
        rq.push_if_absent(&mb);
        assert_eq!(rq.len(), 1);
    }
}
