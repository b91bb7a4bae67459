//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (connect / header deadline / pool idle)
//!     → On expiry: 504 Gateway Timeout
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - No retries: each inbound request maps to at most one upstream request

pub mod timeouts;

pub use timeouts::{within_header_deadline, DeadlineElapsed, UpstreamTimeouts};
