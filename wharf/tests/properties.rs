//! Property tests for the invariants the rest of the suite only spot-checks:
//! mailbox FIFO order, batch sizing staying within the backlog, and timer
//! firing happening on the exact tick it was filed for.

use proptest::prelude::*;

use wharf::dispatcher::batch_size;
use wharf::handle::{is_local, node_of, HANDLE_REMOTE_SHIFT};
use wharf::mailbox::Mailbox;
use wharf::message::{Message, PType};
use wharf::timer::TimingWheel;

fn msg(session: i32) -> Message {
    Message {
        source: 1,
        session,
        ptype: PType::Text,
        data: None,
    }
}

proptest! {
    #[test]
    fn mailbox_preserves_fifo_order(sessions in prop::collection::vec(any::<i32>(), 0..200)) {
        let mb = Mailbox::new(1);
        for &s in &sessions {
            mb.push(msg(s));
        }
        let mut popped = Vec::new();
        while let Some(m) = mb.pop() {
            popped.push(m.session);
        }
        prop_assert_eq!(popped, sessions);
    }

    #[test]
    fn batch_size_never_exceeds_backlog(weight in -3i32..6, backlog in 0usize..10_000) {
        let b = batch_size(weight, backlog);
        prop_assert!(b <= backlog);
        if backlog > 0 {
            prop_assert!(b >= 1);
        } else {
            prop_assert_eq!(b, 0);
        }
    }

    #[test]
    fn near_wheel_event_fires_on_the_exact_tick(delay in 0u32..600) {
        let w = TimingWheel::new();
        w.add(42, delay, 7);
        let mut fired_at = None;
        for tick in 0..delay + 2 {
            let fired = w.tick();
            if !fired.is_empty() {
                fired_at = Some(tick);
                prop_assert_eq!(fired, vec![(42, 7)]);
            }
        }
        prop_assert_eq!(fired_at, Some(delay));
    }

    #[test]
    fn node_of_round_trips_for_any_handle(node in 0u8..=255, local in 0u32..=0x00ff_ffff) {
        let handle = ((node as u32) << HANDLE_REMOTE_SHIFT) | local;
        prop_assert_eq!(node_of(handle), node);
        prop_assert!(is_local(handle, node));
        if node != 0 {
            prop_assert!(!is_local(handle, 0));
        }
    }
}
