/*!
 * Synchronization Traits
 *
 * The seam between sequence numbers and whatever event loop a thread runs.
 *
 * # Design: Level-Triggered Wake Channels
 *
 * A sequence number never knows how a waiting thread blocks. It only holds
 * that thread's channel and signals it. Any number of signals between two
 * resets collapse into one pending wake, so rapid changes can never be
 * "used up" by counting.
 */

use std::time::Instant;

/// Cross-thread, level-triggered signal that interrupts a thread's blocking wait
///
/// Implementations must be:
/// - **Thread-safe**: `signal` is called from arbitrary threads
/// - **Non-blocking to signal**: `signal` is called while a sequence number's
///   lock is held, so it must never wait on the owning thread
/// - **Level-triggered**: once signalled, the channel stays signalled until `reset`
///
/// The default implementation is [`Latch`](super::Latch). Event loops that block
/// in `epoll`, `poll`, or similar can install their own channel (for example one
/// backed by an eventfd that is part of their poll set).
pub trait WakeChannel: Send + Sync + 'static {
    /// Mark the channel signalled and wake its thread if it is blocked
    fn signal(&self);

    /// Whether a signal is pending
    fn is_signaled(&self) -> bool;

    /// Clear any pending signal
    ///
    /// Returns `true` if a signal was pending.
    fn reset(&self) -> bool;

    /// Block until signalled or until `deadline` passes
    ///
    /// Returns `true` if a signal is pending on return. Does not clear it.
    fn wait(&self, deadline: Option<Instant>) -> bool;

    /// Get channel name for debugging
    fn name(&self) -> &'static str;
}
