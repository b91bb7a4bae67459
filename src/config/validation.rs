//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics. All errors are
//! collected rather than stopping at the first, and endpoint checks are
//! delegated to route table compilation so the running table and the
//! validator can never disagree.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::routing::RouteTable;

/// A single semantic configuration problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("mount path {0:?} must start with '/' and must not end with '/'")]
    InvalidMountPath(String),

    #[error("bind address {0:?} is not a socket address")]
    InvalidBindAddress(String),

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("upstream.pipe_capacity must be greater than zero")]
    ZeroPipeCapacity,

    #[error("static token for subject {0:?} is empty")]
    EmptyStaticToken(String),

    #[error("endpoint {prefix:?}: invalid prefix, {reason}")]
    InvalidPrefix { prefix: String, reason: &'static str },

    #[error("endpoint {0:?} is configured more than once")]
    DuplicatePrefix(String),

    #[error("endpoint {prefix:?}: invalid target {target:?}, {reason}")]
    InvalidTarget {
        prefix: String,
        target: String,
        reason: String,
    },

    #[error("endpoint {prefix:?}: unknown credentials policy {policy:?}")]
    UnknownCredentialPolicy { prefix: String, policy: String },

    #[error("endpoint {prefix:?}: allowed_subjects requires an authenticated credentials policy")]
    SubjectsWithoutAuthentication { prefix: String },

    #[error("endpoint {prefix:?}: invalid method {method:?}")]
    InvalidMethod { prefix: String, method: String },

    #[error("endpoint {prefix:?}: header rule {name:?} {reason}")]
    InvalidHeaderRule {
        prefix: String,
        name: String,
        reason: String,
    },
}

/// Validate a parsed configuration, returning every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mount = &config.mount_path;
    if !mount.starts_with('/') || (mount.len() > 1 && mount.ends_with('/')) {
        errors.push(ValidationError::InvalidMountPath(mount.clone()));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let timeouts = &config.timeouts;
    for (name, value) in [
        ("connect_secs", timeouts.connect_secs),
        ("header_secs", timeouts.header_secs),
        ("idle_secs", timeouts.idle_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    if config.upstream.pipe_capacity == 0 {
        errors.push(ValidationError::ZeroPipeCapacity);
    }

    for token in &config.auth.static_tokens {
        if token.token.trim().is_empty() {
            errors.push(ValidationError::EmptyStaticToken(token.subject.clone()));
        }
    }

    if let Err(route_errors) = RouteTable::from_config(config) {
        errors.extend(route_errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
