/*!
 * Sequence Numbers
 *
 * A counter attached to an observable object, bumped whenever the object
 * changes, that can wake threads blocked in their event loop.
 *
 * # Usage
 *
 * The owner creates a [`Seq`] next to the state it guards and calls
 * [`Seq::change`] after every observable mutation. An observer loops:
 *
 * ```
 * use pollseq::{poll, Seq};
 * use std::time::Duration;
 *
 * let seq = Seq::new();
 * let mut last_seen = seq.read();
 *
 * for _ in 0..2 {
 *     let current = seq.read();
 *     if current != last_seen {
 *         // ...process changes...
 *         last_seen = current;
 *     }
 *     seq.wait(current);
 *     let _ = poll::block(Some(Duration::from_millis(10)));
 * }
 * ```
 *
 * # Locking
 *
 * Each `Seq` has its own mutex guarding the value and its waiter set. No
 * operation ever holds two of these at once.
 */

use super::registry;
use super::traits::WakeChannel;
use ahash::RandomState;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::fmt;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use tracing::{debug, trace};

/// Value of every freshly created sequence number
///
/// Non-zero so that a zero-initialised "last seen" never matches a live counter.
pub const INITIAL_VALUE: u64 = 1;

static NEXT_SEQ_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeqId(u64);

impl SeqId {
    fn next() -> Self {
        SeqId(NEXT_SEQ_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SeqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq#{}", self.0)
    }
}

/// A thread registered on a sequence number
pub(crate) struct Waiter {
    pub(crate) channel: Arc<dyn WakeChannel>,
    pub(crate) expected: u64,
}

/// Everything guarded by a sequence number's lock
pub(crate) struct SeqState {
    pub(crate) value: u64,
    pub(crate) waiters: HashMap<ThreadId, Waiter, RandomState>,
    pub(crate) destroyed: bool,
}

impl SeqState {
    fn new() -> Self {
        Self {
            value: INITIAL_VALUE,
            waiters: HashMap::with_hasher(RandomState::new()),
            destroyed: false,
        }
    }

    /// Signal and forget every waiter, returning how many there were
    fn wake_waiters(&mut self) -> usize {
        let count = self.waiters.len();
        for (_, waiter) in self.waiters.drain() {
            waiter.channel.signal();
        }
        count
    }

    fn change(&mut self, id: SeqId) {
        debug_assert!(!self.destroyed, "{id} changed after destroy");
        self.value = self.value.wrapping_add(1);
        let woken = self.wake_waiters();
        trace!(seq = %id, value = self.value, woken, "seq changed");
    }

    pub(crate) fn remove_waiter(&mut self, thread: ThreadId) -> bool {
        self.waiters.remove(&thread).is_some()
    }
}

/// Shared between the owning [`Seq`] and weak references in thread registries
pub(crate) struct SeqShared {
    pub(crate) id: SeqId,
    pub(crate) state: Mutex<SeqState>,
}

/// Thread-safe, pollable sequence number
///
/// Exclusively owned by the object it describes. Observers borrow it; dropping
/// (or [`destroy`](Seq::destroy)ing) it wakes every thread still registered so
/// none of them stays blocked on a counter that no longer exists.
pub struct Seq {
    shared: Arc<SeqShared>,
}

impl Seq {
    /// Create a sequence number with value [`INITIAL_VALUE`] and no waiters
    pub fn new() -> Self {
        let shared = Arc::new(SeqShared {
            id: SeqId::next(),
            state: Mutex::new(SeqState::new()),
        });
        debug!(seq = %shared.id, "seq created");
        Self { shared }
    }

    /// Process-unique identity
    pub fn id(&self) -> SeqId {
        self.shared.id
    }

    /// Record that the observed object changed
    ///
    /// Increments the value and wakes every thread waiting on this sequence
    /// number. Each woken thread must call [`Seq::wait`] again to stay interested.
    pub fn change(&self) {
        self.shared.state.lock().change(self.shared.id);
    }

    /// Current value
    pub fn read(&self) -> u64 {
        self.shared.state.lock().value
    }

    /// Arrange for the calling thread's next blocking wait to return once the
    /// value differs from `value`
    ///
    /// If the value already differs, the thread's wake channel is signalled
    /// right away. Otherwise the thread is registered until a change, destroy,
    /// or its next [`woke`](crate::woke). Calling this again for the same
    /// sequence number before `woke` replaces the earlier registration.
    #[track_caller]
    pub fn wait(&self, value: u64) {
        let location = Location::caller();
        registry::with_current(|thread| {
            let mut state = self.shared.state.lock();
            debug_assert!(!state.destroyed, "{} waited on after destroy", self.shared.id);

            if state.value != value {
                thread.channel().signal();
                trace!(
                    seq = %self.shared.id,
                    expected = value,
                    value = state.value,
                    at = %location,
                    "seq already changed, waking immediately"
                );
                return;
            }

            state.waiters.insert(
                thread.id(),
                Waiter {
                    channel: thread.channel().clone(),
                    expected: value,
                },
            );
            thread.record(&self.shared, value, location);
            trace!(seq = %self.shared.id, expected = value, at = %location, "seq wait registered");
        });
    }

    /// Hold this sequence number's lock to read and change it atomically
    ///
    /// Do not call [`Seq::wait`], [`Seq::read`], or [`Seq::change`] on the same
    /// sequence number, or [`woke`](crate::woke), while the guard is alive.
    pub fn lock(&self) -> SeqGuard<'_> {
        SeqGuard {
            id: self.shared.id,
            state: self.shared.state.lock(),
        }
    }

    /// Number of threads currently registered (for diagnostics)
    pub fn waiter_count(&self) -> usize {
        self.shared.state.lock().waiters.len()
    }

    /// Destroy the sequence number, waking every registered thread
    pub fn destroy(self) {
        drop(self);
    }
}

impl Default for Seq {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Seq")
            .field("id", &self.shared.id)
            .field("value", &state.value)
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

impl Drop for Seq {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        debug_assert!(!state.destroyed);
        state.destroyed = true;
        let woken = state.wake_waiters();
        debug!(seq = %self.shared.id, value = state.value, woken, "seq destroyed");
    }
}

/// Exclusive access to a sequence number's value
///
/// Other threads' `read`, `change`, and `wait` on the same sequence number
/// block until the guard is dropped.
pub struct SeqGuard<'a> {
    id: SeqId,
    state: MutexGuard<'a, SeqState>,
}

impl SeqGuard<'_> {
    /// Current value
    pub fn read(&self) -> u64 {
        self.state.value
    }

    /// Increment the value and wake current waiters
    pub fn change(&mut self) {
        self.state.change(self.id);
    }

    /// Number of registered threads
    pub fn waiter_count(&self) -> usize {
        self.state.waiters.len()
    }

    /// Values the registered threads expect, for diagnostics
    pub fn expected_values(&self) -> Vec<u64> {
        self.state.waiters.values().map(|w| w.expected).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::registry::{pending, woke};

    #[test]
    fn test_new_seq_starts_at_initial_value() {
        let seq = Seq::new();
        assert_eq!(seq.read(), INITIAL_VALUE);
        assert_eq!(seq.waiter_count(), 0);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Seq::new();
        let b = Seq::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_change_increments_by_one() {
        let seq = Seq::new();
        seq.change();
        seq.change();
        assert_eq!(seq.read(), INITIAL_VALUE + 2);
    }

    #[test]
    fn test_change_wraps_around() {
        let mut state = SeqState::new();
        state.value = u64::MAX;
        state.change(SeqId(0));
        assert_eq!(state.value, 0);
        state.change(SeqId(0));
        assert_eq!(state.value, 1);
    }

    #[test]
    fn test_wait_on_current_value_registers() {
        let seq = Seq::new();
        seq.wait(seq.read());
        assert_eq!(seq.waiter_count(), 1);
        assert_eq!(pending().len(), 1);

        woke();
        assert_eq!(seq.waiter_count(), 0);
        assert!(pending().is_empty());
    }

    #[test]
    fn test_wait_on_stale_value_does_not_register() {
        let seq = Seq::new();
        let stale = seq.read();
        seq.change();

        seq.wait(stale);
        assert_eq!(seq.waiter_count(), 0);
        assert!(registry::current_channel().is_signaled());
        woke();
    }

    #[test]
    fn test_change_clears_waiters() {
        let seq = Seq::new();
        seq.wait(seq.read());
        seq.change();

        assert_eq!(seq.waiter_count(), 0);
        assert!(registry::current_channel().is_signaled());
        woke();
        assert!(!registry::current_channel().is_signaled());
    }

    #[test]
    fn test_repeated_wait_replaces_registration() {
        let seq = Seq::new();
        let value = seq.read();
        seq.wait(value);
        seq.wait(value);

        assert_eq!(seq.waiter_count(), 1);
        assert_eq!(pending().len(), 1);
        woke();
    }

    #[test]
    fn test_guard_batches_changes() {
        let seq = Seq::new();
        seq.wait(seq.read());
        {
            let mut guard = seq.lock();
            assert_eq!(guard.expected_values(), vec![INITIAL_VALUE]);
            guard.change();
            assert_eq!(guard.waiter_count(), 0);
            guard.change();
            assert_eq!(guard.read(), INITIAL_VALUE + 2);
        }
        assert_eq!(seq.read(), INITIAL_VALUE + 2);
        woke();
    }

    #[test]
    fn test_destroy_signals_waiters() {
        let seq = Seq::new();
        seq.wait(seq.read());
        seq.destroy();

        assert!(registry::current_channel().is_signaled());
        // Registry entry refers to a destroyed seq; cleanup must still succeed
        woke();
        assert!(pending().is_empty());
    }
}
