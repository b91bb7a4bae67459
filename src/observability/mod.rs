//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher and forwarder produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a request
//! - Unmatched routes are logged at debug, not as errors

pub mod logging;
pub mod metrics;
