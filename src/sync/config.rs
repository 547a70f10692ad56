/*!
 * Synchronization Configuration
 *
 * Runtime configuration for how a thread's latch blocks
 */

use parking_lot::Mutex;
use std::time::Duration;

/// Environment variable consulted by [`SyncConfig::from_env`]
pub const STRATEGY_ENV: &str = "POLLSEQ_WAIT_STRATEGY";

/// Configuration for latches created lazily on threads without a channel
static THREAD_DEFAULT: Mutex<Option<SyncConfig>> = parking_lot::const_mutex(None);

/// Strategy type selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyType {
    /// Park the thread as soon as the latch is found unsignaled
    Park,
    /// Spin briefly before parking (low-latency, burns CPU for short waits)
    SpinThenPark,
    /// Spin only when there is another CPU that could signal us meanwhile
    Auto,
}

impl StrategyType {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "park" => Some(StrategyType::Park),
            "spin" | "spin_then_park" => Some(StrategyType::SpinThenPark),
            "auto" => Some(StrategyType::Auto),
            _ => None,
        }
    }
}

/// Synchronization configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Preferred strategy
    pub strategy: StrategyType,
    /// Spin duration before parking
    pub spin_duration: Duration,
    /// Maximum spin iterations before parking
    pub max_spins: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyType::Auto,
            spin_duration: Duration::from_micros(10),
            max_spins: 100,
        }
    }
}

impl SyncConfig {
    /// Configuration optimized for low-latency (< 1ms wait expected)
    pub const fn low_latency() -> Self {
        Self {
            strategy: StrategyType::SpinThenPark,
            spin_duration: Duration::from_micros(50),
            max_spins: 500,
        }
    }

    /// Configuration optimized for long waits (> 1ms expected)
    pub const fn long_wait() -> Self {
        Self {
            strategy: StrategyType::Park,
            spin_duration: Duration::from_micros(1),
            max_spins: 10,
        }
    }

    /// Default configuration with the strategy overridden by `POLLSEQ_WAIT_STRATEGY`
    ///
    /// Unknown values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(STRATEGY_ENV) {
            match StrategyType::parse(&raw) {
                Some(strategy) => config.strategy = strategy,
                None => tracing::warn!(
                    value = %raw,
                    env = STRATEGY_ENV,
                    "unknown wait strategy, keeping default"
                ),
            }
        }
        config
    }

    /// Resolve `Auto` against the current machine
    pub fn select_strategy(&self) -> StrategyType {
        match self.strategy {
            StrategyType::Auto => {
                let cpus = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1);
                if cpus > 1 {
                    StrategyType::SpinThenPark
                } else {
                    StrategyType::Park
                }
            }
            other => other,
        }
    }
}

/// Set the configuration used for latches created lazily from now on
///
/// Threads that already have a channel keep it.
pub fn set_thread_default(config: SyncConfig) {
    *THREAD_DEFAULT.lock() = Some(config);
}

/// Configuration for the next lazily created latch
///
/// Falls back to [`SyncConfig::from_env`] until [`set_thread_default`] is called.
pub fn thread_default() -> SyncConfig {
    THREAD_DEFAULT
        .lock()
        .get_or_insert_with(SyncConfig::from_env)
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_strategy_passes_through_explicit_choice() {
        assert_eq!(SyncConfig::long_wait().select_strategy(), StrategyType::Park);
        assert_eq!(
            SyncConfig::low_latency().select_strategy(),
            StrategyType::SpinThenPark
        );
    }

    #[test]
    fn test_auto_never_resolves_to_auto() {
        let resolved = SyncConfig::default().select_strategy();
        assert_ne!(resolved, StrategyType::Auto);
    }

    #[test]
    fn test_parse_strategy_names() {
        assert_eq!(StrategyType::parse("park"), Some(StrategyType::Park));
        assert_eq!(StrategyType::parse(" SPIN "), Some(StrategyType::SpinThenPark));
        assert_eq!(StrategyType::parse("auto"), Some(StrategyType::Auto));
        assert_eq!(StrategyType::parse("futex"), None);
    }
}
