//! Credential gate.
//!
//! Decides, before any upstream contact, whether a caller may use a route.
//! Policies are resolved from their configuration strings once, when the
//! route table is compiled.

use std::fmt;
use std::str::FromStr;

use axum::http::StatusCode;

use crate::routing::RouteDescriptor;
use crate::security::identity::Identity;

/// Configuration value that disables authentication for a route.
pub const ALLOW_UNAUTHENTICATED: &str = "dangerously-allow-unauthenticated";

/// Authenticated policy flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticatedPolicy {
    /// Caller must authenticate; its credentials stay at the proxy.
    Require,
    /// Caller must authenticate; its credentials are passed upstream.
    Forward,
}

/// Per-route credential policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialPolicy {
    AllowUnauthenticated,
    RequireAuthenticated(AuthenticatedPolicy),
}

impl CredentialPolicy {
    /// Whether a verified identity is needed before forwarding.
    pub fn requires_identity(&self) -> bool {
        matches!(self, CredentialPolicy::RequireAuthenticated(_))
    }

    /// Whether the caller's `Authorization` header reaches the upstream.
    pub fn forwards_credentials(&self) -> bool {
        !matches!(
            self,
            CredentialPolicy::RequireAuthenticated(AuthenticatedPolicy::Require)
        )
    }
}

impl FromStr for CredentialPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ALLOW_UNAUTHENTICATED => Ok(CredentialPolicy::AllowUnauthenticated),
            "require" => Ok(CredentialPolicy::RequireAuthenticated(
                AuthenticatedPolicy::Require,
            )),
            "forward" => Ok(CredentialPolicy::RequireAuthenticated(
                AuthenticatedPolicy::Forward,
            )),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for CredentialPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialPolicy::AllowUnauthenticated => f.write_str(ALLOW_UNAUTHENTICATED),
            CredentialPolicy::RequireAuthenticated(AuthenticatedPolicy::Require) => {
                f.write_str("require")
            }
            CredentialPolicy::RequireAuthenticated(AuthenticatedPolicy::Forward) => {
                f.write_str("forward")
            }
        }
    }
}

/// Why the gate turned a caller away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// No verified identity was presented.
    Unauthenticated,
    /// An identity was presented but the route does not accept it.
    Unauthorized { subject: String },
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::Unauthenticated => StatusCode::UNAUTHORIZED,
            Rejection::Unauthorized { .. } => StatusCode::FORBIDDEN,
        }
    }
}

/// Gate decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected(Rejection),
}

/// Evaluate the route's credential policy against the caller identity.
pub fn admit(route: &RouteDescriptor, identity: Option<&Identity>) -> Admission {
    if !route.credential_policy.requires_identity() {
        return Admission::Admitted;
    }

    let Some(identity) = identity else {
        return Admission::Rejected(Rejection::Unauthenticated);
    };

    match &route.allowed_subjects {
        Some(subjects) if !subjects.iter().any(|s| s == &identity.subject) => {
            Admission::Rejected(Rejection::Unauthorized {
                subject: identity.subject.clone(),
            })
        }
        _ => Admission::Admitted,
    }
}
