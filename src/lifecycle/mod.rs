//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Compile routes → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain in-flight requests → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: an invalid configuration never starts serving
//! - Listener starts last (traffic only when routes are compiled)

pub mod shutdown;
pub mod signals;

pub use shutdown::{recv_shutdown, Shutdown};
pub use signals::wait_for_signal;
