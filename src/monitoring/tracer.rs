/*!
 * Structured Tracing
 * Subscriber setup and spans for blocking waits using the tracing crate
 *
 * Features:
 * - JSON-formatted logs for structured parsing
 * - Thread ids and names on every event, since every interesting event here
 *   is one thread waking another
 * - Per-wait spans recording duration and outcome
 */

use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Environment variable enabling JSON output
pub const TRACE_JSON_ENV: &str = "POLLSEQ_TRACE_JSON";

/// How far past its deadline a wait may return before it is reported
const OVERSLEEP_WARN: Duration = Duration::from_millis(10);

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - POLLSEQ_TRACE_JSON: Enable JSON output (default: false)
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(TRACE_JSON_ENV)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
    };

    if installed.is_ok() {
        info!(json = use_json, "Structured tracing initialized");
    }
}

/// How long past its deadline a wait that timed out returned
///
/// Zero for signalled waits, untimed waits, and waits whose outcome was never
/// recorded: only a timeout has a deadline to compare against.
fn overslept(woken: Option<bool>, timeout: Option<Duration>, duration: Duration) -> Duration {
    match (woken, timeout) {
        (Some(false), Some(timeout)) => duration.saturating_sub(timeout),
        _ => Duration::ZERO,
    }
}

/// Span around one blocking wait
///
/// Records the wait's duration and outcome when dropped, and warns if a
/// timed wait returned well after its deadline.
pub struct BlockSpan {
    span: tracing::Span,
    start: Instant,
    timeout: Option<Duration>,
    woken: Option<bool>,
}

impl BlockSpan {
    pub fn new(channel: &'static str, timeout: Option<Duration>, registrations: usize) -> Self {
        let span = span!(
            Level::TRACE,
            "poll_block",
            channel,
            registrations,
            timeout_us = timeout.map(|t| t.as_micros() as u64),
            duration_us = tracing::field::Empty,
            woken = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            timeout,
            woken: None,
        }
    }

    /// Record whether the wait ended because the channel was signalled
    pub fn record_outcome(&mut self, woken: bool) {
        self.woken = Some(woken);
        self.span.record("woken", woken);
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for BlockSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", duration.as_micros() as u64);

        let overslept = overslept(self.woken, self.timeout, duration);

        if overslept > OVERSLEEP_WARN {
            warn!(
                duration_ms = duration.as_millis() as u64,
                overslept_ms = overslept.as_millis() as u64,
                "blocking wait returned late"
            );
        } else {
            debug!(
                duration_us = duration.as_micros() as u64,
                woken = ?self.woken,
                "blocking wait returned"
            );
        }
    }
}
