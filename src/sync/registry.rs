/*!
 * Wait Registry
 *
 * Per-thread record of the sequence numbers a thread is registered on, and
 * the wake channel those sequence numbers signal.
 *
 * Lives in thread-local storage: a thread's registrations are invisible to
 * every other thread. Entries hold weak references, so a sequence number that
 * is destroyed while registered is simply skipped on cleanup.
 */

use super::config;
use super::latch::Latch;
use super::seq::{SeqId, SeqShared};
use super::traits::WakeChannel;
use ahash::RandomState;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::Location;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use tracing::trace;

/// One live registration
struct Registration {
    seq: Weak<SeqShared>,
    expected: u64,
    location: &'static Location<'static>,
}

/// A registration as reported by [`pending`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWait {
    /// Sequence number waited on
    pub seq: SeqId,
    /// Value the thread read before waiting
    pub expected: u64,
    /// Where `wait` was called
    pub location: &'static Location<'static>,
}

/// The calling thread's wait state
pub(crate) struct ThreadWaits {
    id: ThreadId,
    channel: Arc<dyn WakeChannel>,
    entries: HashMap<SeqId, Registration, RandomState>,
}

impl ThreadWaits {
    fn new(channel: Arc<dyn WakeChannel>) -> Self {
        Self {
            id: thread::current().id(),
            channel,
            entries: HashMap::with_hasher(RandomState::new()),
        }
    }

    fn with_default_channel() -> Self {
        Self::new(Arc::new(Latch::with_config(&config::thread_default())))
    }

    pub(crate) fn id(&self) -> ThreadId {
        self.id
    }

    pub(crate) fn channel(&self) -> &Arc<dyn WakeChannel> {
        &self.channel
    }

    /// Record a registration, replacing any earlier one for the same seq
    pub(crate) fn record(
        &mut self,
        seq: &Arc<SeqShared>,
        expected: u64,
        location: &'static Location<'static>,
    ) {
        self.entries.insert(
            seq.id,
            Registration {
                seq: Arc::downgrade(seq),
                expected,
                location,
            },
        );
    }

    /// Remove this thread from every seq it is registered on
    fn unregister_all(&mut self) -> usize {
        let count = self.entries.len();
        for (id, registration) in self.entries.drain() {
            if let Some(seq) = registration.seq.upgrade() {
                let removed = seq.state.lock().remove_waiter(self.id);
                trace!(seq = %id, removed, "seq wait cleared");
            }
        }
        count
    }

    fn woke(&mut self) {
        let cleared = self.unregister_all();
        // Reset last: a change racing with unregistration has already signalled
        self.channel.reset();
        if cleared > 0 {
            trace!(cleared, "thread woke");
        }
    }
}

impl Drop for ThreadWaits {
    fn drop(&mut self) {
        // Thread exit: drop out of every waiter set so none keeps a dead thread
        let cleared = self.unregister_all();
        if cleared > 0 {
            trace!(cleared, "exiting thread cleared its seq waits");
        }
    }
}

thread_local! {
    static CURRENT: RefCell<Option<ThreadWaits>> = const { RefCell::new(None) };
}

/// Run `f` with the calling thread's wait state, creating it on first use
pub(crate) fn with_current<R>(f: impl FnOnce(&mut ThreadWaits) -> R) -> R {
    CURRENT.with(|cell| {
        let mut slot = cell.borrow_mut();
        f(slot.get_or_insert_with(ThreadWaits::with_default_channel))
    })
}

/// Clear the calling thread's registrations after a blocking wait returns
///
/// Must be called after every return from the blocking wait, whatever woke
/// it: a change, a destroy, a timeout, or an unrelated event. Also resets the
/// thread's wake channel. A no-op for a thread with no registrations.
pub fn woke() {
    // Ignore calls made while the thread-local is being torn down; the
    // registry's own drop does the cleanup then.
    let _ = CURRENT.try_with(|cell| {
        if let Some(waits) = cell.borrow_mut().as_mut() {
            waits.woke();
        }
    });
}

/// The calling thread's wake channel
pub fn current_channel() -> Arc<dyn WakeChannel> {
    with_current(|waits| waits.channel.clone())
}

/// Replace the calling thread's wake channel
///
/// Returns the number of live registrations instead if there are any, since
/// those sequence numbers would keep signalling the old channel.
pub(crate) fn replace_channel(channel: Arc<dyn WakeChannel>) -> Result<(), usize> {
    CURRENT.with(|cell| {
        let mut slot = cell.borrow_mut();
        match slot.as_mut() {
            Some(waits) if !waits.entries.is_empty() => Err(waits.entries.len()),
            Some(waits) => {
                waits.channel = channel;
                Ok(())
            }
            None => {
                *slot = Some(ThreadWaits::new(channel));
                Ok(())
            }
        }
    })
}

/// The calling thread's live registrations, ordered by seq id
pub fn pending() -> Vec<PendingWait> {
    CURRENT.with(|cell| {
        let slot = cell.borrow();
        let mut waits: Vec<PendingWait> = slot
            .iter()
            .flat_map(|thread| thread.entries.iter())
            .map(|(id, registration)| PendingWait {
                seq: *id,
                expected: registration.expected,
                location: registration.location,
            })
            .collect();
        waits.sort_by_key(|w| w.seq);
        waits
    })
}
