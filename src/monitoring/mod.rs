/*!
 * Monitoring
 * Lock-free statistics and tracing setup
 */

mod stats;
mod tracer;

pub use stats::{AtomicShaperStats, ShaperStats};
pub use tracer::{init_tracing, span_install, TRACE_JSON_ENV};
