/*!
 * Sequence Number Property Tests
 *
 * Single-thread model checking of the read/wait/change/woke state machine
 */

use pollseq::sync::pending;
use pollseq::{poll, woke, Seq, INITIAL_VALUE};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Change,
    WaitCurrent,
    WaitStale,
    Woke,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Change),
        3 => Just(Op::WaitCurrent),
        1 => Just(Op::WaitStale),
        2 => Just(Op::Woke),
    ]
}

/// What the calling thread should observe after each operation
#[derive(Debug, Default)]
struct Model {
    value: u64,
    /// Thread is in the seq's waiter set
    registered: bool,
    /// Thread's registry still holds an entry for the seq
    recorded: bool,
    /// Thread's wake channel is signalled
    signaled: bool,
}

impl Model {
    fn apply(&mut self, op: &Op) {
        match op {
            Op::Change => {
                self.value = self.value.wrapping_add(1);
                if self.registered {
                    self.signaled = true;
                    self.registered = false;
                }
            }
            Op::WaitCurrent => {
                self.registered = true;
                self.recorded = true;
            }
            Op::WaitStale => self.signaled = true,
            Op::Woke => {
                self.registered = false;
                self.recorded = false;
                self.signaled = false;
            }
        }
    }
}

proptest! {
    #[test]
    fn prop_matches_model(ops in prop::collection::vec(op_strategy(), 1..64)) {
        woke();
        let seq = Seq::new();
        let channel = poll::current_channel();
        let mut model = Model { value: INITIAL_VALUE, ..Model::default() };

        for op in &ops {
            match op {
                Op::Change => seq.change(),
                Op::WaitCurrent => seq.wait(seq.read()),
                Op::WaitStale => seq.wait(seq.read().wrapping_sub(1)),
                Op::Woke => woke(),
            }
            model.apply(op);

            prop_assert_eq!(seq.read(), model.value);
            prop_assert_eq!(seq.waiter_count(), usize::from(model.registered));
            prop_assert_eq!(pending().len(), usize::from(model.recorded));
            prop_assert_eq!(channel.is_signaled(), model.signaled);
        }

        woke();
    }

    #[test]
    fn prop_reads_advance_by_one_per_change(changes in 0usize..500) {
        let seq = Seq::new();
        let mut previous = seq.read();
        for _ in 0..changes {
            seq.change();
            let current = seq.read();
            prop_assert_eq!(current, previous.wrapping_add(1));
            previous = current;
        }
        prop_assert_eq!(seq.read(), INITIAL_VALUE + changes as u64);
    }

    #[test]
    fn prop_woke_without_registrations_changes_nothing(repeats in 1usize..8) {
        let seq = Seq::new();
        let before = seq.read();
        for _ in 0..repeats {
            woke();
        }
        prop_assert_eq!(seq.read(), before);
        prop_assert_eq!(seq.waiter_count(), 0);
        prop_assert!(pending().is_empty());
    }
}
