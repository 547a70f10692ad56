/*!
 * Blocking Wait
 *
 * Minimal event-loop side of sequence numbers: block the calling thread on
 * its wake channel, wake it immediately, or swap the channel for one an
 * external loop can observe.
 *
 * A thread that runs its own reactor installs a channel that the reactor
 * polls (for example an eventfd in its poll set) and calls [`crate::woke`]
 * after every return from its own wait call instead of using [`block`].
 */

use crate::errors::{PollError, PollResult};
use crate::monitoring::BlockSpan;
use crate::sync::{self, SyncConfig, WakeChannel};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use crate::sync::{pending, PendingWait};

/// Block until the calling thread's wake channel is signalled
///
/// Returns `Ok(())` if signalled and `Err(PollError::Timeout)` if `timeout`
/// elapsed first. Either way the thread's registrations are cleared with
/// [`woke`](crate::woke) before returning, so the caller re-reads and re-waits.
///
/// # Examples
///
/// ```
/// use pollseq::{poll, PollError, Seq};
/// use std::time::Duration;
///
/// let seq = Seq::new();
/// seq.wait(seq.read());
/// assert_eq!(poll::block(Some(Duration::from_millis(5))), Err(PollError::Timeout));
///
/// let stale = seq.read();
/// seq.change();
/// seq.wait(stale);
/// assert_eq!(poll::block(Some(Duration::from_secs(5))), Ok(()));
/// ```
pub fn block(timeout: Option<Duration>) -> PollResult<()> {
    let channel = sync::current_channel();
    let deadline = timeout.map(|t| Instant::now() + t);

    let mut span = BlockSpan::new(channel.name(), timeout, sync::pending().len());
    let woken = {
        let _entered = span.enter();
        channel.wait(deadline)
    };
    span.record_outcome(woken);
    drop(span);

    sync::woke();

    if woken {
        Ok(())
    } else {
        Err(PollError::Timeout)
    }
}

/// Make the calling thread's next blocking wait return without delay
pub fn immediate_wake() {
    sync::current_channel().signal();
}

/// The calling thread's wake channel
pub fn current_channel() -> Arc<dyn WakeChannel> {
    sync::current_channel()
}

/// Replace the calling thread's wake channel
///
/// Fails with [`PollError::RegistrationsPending`] while the thread is
/// registered on any sequence number; call [`woke`](crate::woke) first.
pub fn install_channel(channel: Arc<dyn WakeChannel>) -> PollResult<()> {
    let name = channel.name();
    sync::replace_channel(channel).map_err(PollError::RegistrationsPending)?;
    tracing::debug!(channel = name, "wake channel installed");
    Ok(())
}

/// Set the latch configuration for threads that have not created a channel yet
pub fn set_default_config(config: SyncConfig) {
    sync::set_thread_default(config);
}
