/*!
 * Monitoring
 * Structured tracing setup and spans around blocking waits
 */

mod tracer;

pub use tracer::{init_tracing, BlockSpan, TRACE_JSON_ENV};
