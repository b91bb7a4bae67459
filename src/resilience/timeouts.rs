//! Timeout enforcement for upstream calls.
//!
//! # Design Decisions
//! - Every upstream call has a header deadline; the body is not bounded
//! - Timeouts are per request, never shared
//! - Timed-out requests return 504 Gateway Timeout

use std::future::Future;
use std::time::Duration;

use crate::config::TimeoutConfig;

/// Resolved upstream timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamTimeouts {
    /// TCP/TLS connection establishment.
    pub connect: Duration,
    /// Until upstream response headers arrive, connect included.
    pub headers: Duration,
    /// How long an unused pooled connection is kept.
    pub idle: Duration,
}

impl From<&TimeoutConfig> for UpstreamTimeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            connect: Duration::from_secs(config.connect_secs),
            headers: Duration::from_secs(config.header_secs),
            idle: Duration::from_secs(config.idle_secs),
        }
    }
}

/// The header deadline elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineElapsed(pub Duration);

/// Run `fut` under the header deadline. Dropping the future on expiry
/// aborts the outbound request.
pub async fn within_header_deadline<F>(
    timeouts: &UpstreamTimeouts,
    fut: F,
) -> Result<F::Output, DeadlineElapsed>
where
    F: Future,
{
    tokio::time::timeout(timeouts.headers, fut)
        .await
        .map_err(|_| DeadlineElapsed(timeouts.headers))
}
