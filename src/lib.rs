/*!
 * pollseq
 * Thread-safe, pollable sequence numbers
 *
 * Attach a [`Seq`] to an object and bump it on every observable change.
 * Any thread can read it, arm a wait for "value differs from what I read",
 * and block in its event loop; the change (or the seq's destruction) wakes
 * it, with no window in which an update can slip by unnoticed.
 */

pub mod errors;
pub mod monitoring;
pub mod poll;
pub mod sync;

// Re-exports
pub use errors::{PollError, PollResult};
pub use monitoring::init_tracing;
pub use sync::{
    woke, Latch, PendingWait, Seq, SeqGuard, SeqId, StrategyType, SyncConfig, WakeChannel,
    INITIAL_VALUE,
};
