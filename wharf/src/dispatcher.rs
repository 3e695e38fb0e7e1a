//! The per-turn dispatch algorithm: pop a ready mailbox, run some number
//! of its messages through the owning service's callback, then decide
//! whether to re-enqueue it. Grounded on `skynet_server.c`'s
//! `skynet_context_message_dispatch` and the weight table in
//! `skynet_start.c`'s `_start` (`weight[]`, indexed by worker id, clamped
//! to how many worker threads are configured).

use std::sync::Arc;

use crate::context::ServiceContext;
use crate::mailbox::Mailbox;
use crate::message::Message;
use crate::monitor::Monitor;
use crate::ready_queue::ReadyQueue;
use crate::registry::Registry;

/// How many messages a worker drains from one mailbox per turn before
/// yielding it back to the ready-queue, as a function of its configured
/// `weight`. `-1` means "one message and yield"; `0` means "drain the
/// whole backlog"; positive `n` means "roughly `backlog / 2^n`, at least
/// one".
pub fn batch_size(weight: i32, backlog: usize) -> usize {
    if backlog == 0 {
        return 0;
    }
    match weight {
        w if w < 0 => 1,
        0 => backlog,
        w => (backlog >> w).max(1),
    }
}

pub enum DispatchOutcome {
    /// The ready-queue was empty; the caller should consider parking.
    Idle,
    /// One mailbox was serviced. `requeued` is true if it still had work
    /// left and was pushed back onto the ready-queue.
    Worked { requeued: bool },
}

/// Services one mailbox's turn. `worker_id` and `weight` come from the
/// calling worker thread; `monitor` is told about the span so the
/// endless-loop checker can see it.
pub fn dispatch_once(
    ready: &ReadyQueue,
    registry: &Registry,
    monitor: &Monitor,
    worker_id: usize,
    weight: i32,
) -> DispatchOutcome {
    let mailbox = match ready.pop() {
        Some(mb) => mb,
        None => return DispatchOutcome::Idle,
    };

    let ctx = match registry.grab(mailbox.handle) {
        Ok(ctx) => ctx,
        Err(_) => {
            // Handle was retired between being marked ready and being
            // popped; nothing to dispatch. Don't requeue: the mailbox is
            // on its way out with the context.
            return DispatchOutcome::Worked { requeued: false };
        }
    };

    run_batch(&ctx, &mailbox, monitor, worker_id, weight);

    let requeued = if mailbox.is_empty() {
        false
    } else {
        ready.push_if_absent(&mailbox);
        true
    };
    DispatchOutcome::Worked { requeued }
}

fn run_batch(
    ctx: &Arc<ServiceContext>,
    mailbox: &Arc<Mailbox>,
    monitor: &Monitor,
    worker_id: usize,
    weight: i32,
) {
    // The first message is popped unconditionally; only once it's gone do we
    // know the real remaining backlog to size the rest of the batch from.
    // Sampling `mailbox.len()` beforehand (as if nothing had been popped yet)
    // overcounts by exactly one message on every batch.
    let first = match mailbox.pop() {
        Some(m) => m,
        None => return,
    };
    dispatch_one(ctx, mailbox, monitor, worker_id, first);

    // A negative weight never recomputes the budget past the first message,
    // matching `skynet_context_message_dispatch`'s `i == 0 && weight >= 0`
    // guard around the recompute.
    if weight < 0 {
        return;
    }

    let budget = batch_size(weight, mailbox.len());
    for _ in 0..budget {
        let msg = match mailbox.pop() {
            Some(m) => m,
            None => break,
        };
        dispatch_one(ctx, mailbox, monitor, worker_id, msg);
    }
}

fn dispatch_one(
    ctx: &Arc<ServiceContext>,
    mailbox: &Arc<Mailbox>,
    monitor: &Monitor,
    worker_id: usize,
    msg: Message,
) {
    if let Some(warn_at) = mailbox.check_overload() {
        log::warn!("handle :{:08x} mailbox overloaded, now > {}", ctx.handle, warn_at);
    }
    monitor.begin(worker_id, msg.source, ctx.handle);
    ctx.dispatch_one(msg);
    monitor.end(worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_minus_one_takes_one_message() {
        assert_eq!(batch_size(-1, 100), 1);
    }

    #[test]
    fn weight_zero_drains_everything() {
        assert_eq!(batch_size(0, 100), 100);
    }

    #[test]
    fn positive_weight_halves_backlog_per_step() {
        assert_eq!(batch_size(1, 100), 50);
        assert_eq!(batch_size(2, 100), 25);
        assert_eq!(batch_size(3, 7), 1.max(7 >> 3));
    }

    #[test]
    fn empty_backlog_is_always_zero() {
        assert_eq!(batch_size(0, 0), 0);
        assert_eq!(batch_size(-1, 0), 0);
    }
}
