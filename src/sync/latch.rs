/*!
 * Latch Wake Channel
 *
 * Default per-thread wake channel: an atomic flag plus parking_lot_core parking.
 *
 * # Design
 *
 * - `signal` is a single atomic swap, plus one `unpark_all` on the
 *   false -> true edge. It never waits on the thread being signalled.
 * - The parked thread re-validates the flag under the parking lot's bucket
 *   lock, so a signal landing between the check and the park is never lost.
 * - The latch address is stable for as long as an `Arc<Latch>` is alive,
 *   which is what parking keys on.
 */

use super::config::{StrategyType, SyncConfig};
use super::traits::WakeChannel;
use parking_lot_core::{park, unpark_all, ParkResult, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Level-triggered latch
///
/// # Examples
///
/// ```
/// use pollseq::{Latch, WakeChannel};
/// use std::sync::Arc;
/// use std::thread;
///
/// let latch = Arc::new(Latch::new());
/// let remote = latch.clone();
/// thread::spawn(move || remote.signal());
///
/// assert!(latch.wait(None));
/// assert!(latch.reset());
/// ```
#[derive(Debug)]
#[repr(C, align(64))] // Cache-line aligned to prevent false sharing
pub struct Latch {
    signaled: AtomicBool,
    strategy: StrategyType,
    spin_duration: Duration,
    max_spins: u32,
}

impl Latch {
    /// Create an unsignaled latch with the default configuration
    pub fn new() -> Self {
        Self::with_config(&SyncConfig::default())
    }

    /// Create an unsignaled latch, resolving the configured strategy now
    pub fn with_config(config: &SyncConfig) -> Self {
        Self {
            signaled: AtomicBool::new(false),
            strategy: config.select_strategy(),
            spin_duration: config.spin_duration,
            max_spins: config.max_spins,
        }
    }

    /// Strategy this latch resolved to at creation
    pub fn strategy(&self) -> StrategyType {
        self.strategy
    }

    /// Parking key (address of the flag)
    #[inline]
    fn key(&self) -> usize {
        &self.signaled as *const AtomicBool as usize
    }

    /// Spin until signalled, the spin budget runs out, or the deadline passes
    ///
    /// Returns true if the latch was signalled while spinning
    fn spin(&self, deadline: Option<Instant>) -> bool {
        let start = Instant::now();
        let mut spin_count = 0u32;

        loop {
            if self.signaled.load(Ordering::Acquire) {
                return true;
            }

            if start.elapsed() >= self.spin_duration || spin_count >= self.max_spins {
                return false;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return false;
            }

            // Yield to scheduler occasionally
            if spin_count % 10 == 0 {
                thread::yield_now();
            } else {
                std::hint::spin_loop();
            }

            spin_count += 1;
        }
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeChannel for Latch {
    #[inline]
    fn signal(&self) {
        if !self.signaled.swap(true, Ordering::AcqRel) {
            // SAFETY: the key is the address of our own flag, which stays valid
            // while `self` is borrowed; the token carries no data.
            unsafe {
                unpark_all(self.key(), DEFAULT_UNPARK_TOKEN);
            }
        }
    }

    #[inline]
    fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }

    #[inline]
    fn reset(&self) -> bool {
        self.signaled.swap(false, Ordering::AcqRel)
    }

    fn wait(&self, deadline: Option<Instant>) -> bool {
        if self.is_signaled() {
            return true;
        }

        if self.strategy == StrategyType::SpinThenPark && self.spin(deadline) {
            return true;
        }

        loop {
            if self.is_signaled() {
                return true;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return false;
            }

            // SAFETY: the key is our own flag's address; the callbacks neither
            // panic nor call back into parking_lot.
            let result = unsafe {
                park(
                    self.key(),
                    || !self.signaled.load(Ordering::Acquire),
                    || {},
                    |_, _| {},
                    DEFAULT_PARK_TOKEN,
                    deadline,
                )
            };

            match result {
                ParkResult::TimedOut => return self.is_signaled(),
                // Unparked by a signal, or the flag was already set when validated
                ParkResult::Unparked(_) | ParkResult::Invalid => continue,
            }
        }
    }

    fn name(&self) -> &'static str {
        match self.strategy {
            StrategyType::SpinThenPark => "latch-spin",
            _ => "latch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_latch_signal_wakes_parked_thread() {
        let latch = Arc::new(Latch::with_config(&SyncConfig::long_wait()));
        let waiter = latch.clone();

        let handle = thread::spawn(move || {
            let start = Instant::now();
            let woken = waiter.wait(Some(Instant::now() + Duration::from_secs(5)));
            (woken, start.elapsed())
        });

        // Give thread time to park
        thread::sleep(Duration::from_millis(50));
        latch.signal();

        let (woken, elapsed) = handle.join().unwrap();
        assert!(woken);
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_latch_timeout() {
        let latch = Latch::new();
        let start = Instant::now();
        let woken = latch.wait(Some(Instant::now() + Duration::from_millis(50)));

        assert!(!woken); // Should timeout
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_latch_is_level_triggered() {
        let latch = Latch::new();
        latch.signal();
        latch.signal();
        latch.signal();

        // Signals coalesce and stay pending until reset
        assert!(latch.wait(None));
        assert!(latch.wait(None));
        assert!(latch.reset());
        assert!(!latch.reset());
        assert!(!latch.is_signaled());
    }

    #[test]
    fn test_latch_spin_strategy_sees_signal() {
        let latch = Arc::new(Latch::with_config(&SyncConfig::low_latency()));
        assert_eq!(latch.name(), "latch-spin");
        let remote = latch.clone();

        let handle = thread::spawn(move || remote.signal());
        assert!(latch.wait(Some(Instant::now() + Duration::from_secs(5))));
        handle.join().unwrap();
    }
}
