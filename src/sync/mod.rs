/*!
 * Synchronization Primitives
 *
 * Pollable sequence numbers and the per-thread machinery that wakes
 * event loops when they change:
 * - `Seq`: the counter, its lock, and its waiter set
 * - Wait registry: thread-local record of armed waits
 * - `WakeChannel`: level-triggered cross-thread signal (default `Latch`)
 *
 * # Architecture
 *
 * An observer reads a `Seq`, calls `wait` with the value it read, and blocks
 * in its event loop. `wait` decides under the seq's lock whether to signal
 * the thread's channel at once (the value already moved) or to register the
 * thread. `change` and destroy signal every registered thread. After the
 * blocking call returns, `woke` drops all of the thread's registrations.
 */

mod config;
mod latch;
mod registry;
mod seq;
mod traits;

pub use config::{set_thread_default, thread_default, StrategyType, SyncConfig, STRATEGY_ENV};
pub use latch::Latch;
pub use registry::{current_channel, pending, woke, PendingWait};
pub use seq::{Seq, SeqGuard, SeqId, INITIAL_VALUE};
pub use traits::WakeChannel;

pub(crate) use registry::replace_channel;
