//! Proxy outcomes and their translation into caller responses.
//!
//! # Design Decisions
//! - Upstream responses are relayed as-is, 4xx and 5xx included
//! - Bodies are streamed, never buffered
//! - Transport failures become 502, header deadline expiry becomes 504

use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::ProxyError;
use crate::routing::RouteDescriptor;
use crate::security::Rejection;

/// Response received from the upstream, headers already filtered.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Why no upstream response could be obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamFailure {
    /// Connection refused, DNS or TLS failure, or a broken connection
    /// before headers.
    Unreachable { cause: String },
    /// No response headers within the deadline.
    TimedOut { after: Duration },
}

/// Result of handling one admitted or rejected request.
#[derive(Debug)]
pub enum ProxyOutcome {
    Forwarded(UpstreamResponse),
    Rejected(Rejection),
    UpstreamUnavailable(UpstreamFailure),
    /// The suffix would resolve outside the route's target path.
    PathEscapesTarget { suffix: String },
}

impl ProxyOutcome {
    /// Resolve into the response for the caller, or the error to report.
    pub fn into_result(self, route: &RouteDescriptor) -> Result<Response, ProxyError> {
        match self {
            ProxyOutcome::Forwarded(upstream) => Ok(upstream.into_response()),
            ProxyOutcome::Rejected(Rejection::Unauthenticated) => {
                Err(ProxyError::Unauthenticated {
                    prefix: route.prefix.clone(),
                })
            }
            ProxyOutcome::Rejected(Rejection::Unauthorized { subject }) => {
                Err(ProxyError::Unauthorized {
                    subject,
                    prefix: route.prefix.clone(),
                })
            }
            ProxyOutcome::PathEscapesTarget { suffix } => Err(ProxyError::InvalidPath {
                path: format!("{}{}", route.prefix, suffix),
            }),
            ProxyOutcome::UpstreamUnavailable(UpstreamFailure::Unreachable { cause }) => {
                Err(ProxyError::UpstreamUnavailable {
                    target: route.target.to_string(),
                    cause,
                })
            }
            ProxyOutcome::UpstreamUnavailable(UpstreamFailure::TimedOut { after }) => {
                Err(ProxyError::UpstreamTimeout {
                    target: route.target.to_string(),
                    after,
                })
            }
        }
    }
}
