//! Route descriptors and the immutable route table.
//!
//! # Responsibilities
//! - Compile configured endpoints into typed route descriptors
//! - Reject malformed or duplicate prefixes before serving
//! - Look up the route for a request path
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Explicit NoMatch rather than silent default
//! - Missing leading `/` is added, a trailing `/` is an error

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::Method;
use url::Url;

use crate::config::{EndpointConfig, ProxyConfig, ValidationError};
use crate::routing::matcher::{MatchResult, PathMatcher};
use crate::security::{CredentialPolicy, HeaderRule};

/// A compiled proxy route.
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    /// Normalized route prefix.
    pub prefix: String,
    /// Upstream base URL.
    pub target: Url,
    pub credential_policy: CredentialPolicy,
    /// Applied in order to outbound request headers.
    pub header_rules: Vec<HeaderRule>,
    /// `None` accepts every method.
    pub allowed_methods: Option<Vec<Method>>,
    /// `None` accepts every authenticated subject.
    pub allowed_subjects: Option<Vec<String>>,
}

impl RouteDescriptor {
    /// Compile an endpoint definition, collecting every problem found.
    pub fn compile(prefix: &str, endpoint: &EndpointConfig) -> Result<Self, Vec<ValidationError>> {
        let mut errors = Vec::new();

        let normalized = match normalize_prefix(prefix) {
            Ok(p) => p,
            Err(reason) => {
                errors.push(ValidationError::InvalidPrefix {
                    prefix: prefix.to_string(),
                    reason,
                });
                prefix.to_string()
            }
        };

        let target = match parse_target(&endpoint.target) {
            Ok(url) => Some(url),
            Err(reason) => {
                errors.push(ValidationError::InvalidTarget {
                    prefix: prefix.to_string(),
                    target: endpoint.target.clone(),
                    reason,
                });
                None
            }
        };

        let credential_policy = match endpoint.credentials.parse::<CredentialPolicy>() {
            Ok(policy) => Some(policy),
            Err(policy) => {
                errors.push(ValidationError::UnknownCredentialPolicy {
                    prefix: prefix.to_string(),
                    policy,
                });
                None
            }
        };

        if endpoint.allowed_subjects.is_some()
            && credential_policy == Some(CredentialPolicy::AllowUnauthenticated)
        {
            errors.push(ValidationError::SubjectsWithoutAuthentication {
                prefix: prefix.to_string(),
            });
        }

        let allowed_methods = endpoint.allowed_methods.as_ref().map(|methods| {
            methods
                .iter()
                .filter_map(|m| match Method::from_bytes(m.to_ascii_uppercase().as_bytes()) {
                    Ok(method) => Some(method),
                    Err(_) => {
                        errors.push(ValidationError::InvalidMethod {
                            prefix: prefix.to_string(),
                            method: m.clone(),
                        });
                        None
                    }
                })
                .collect::<Vec<_>>()
        });

        let header_rules = endpoint
            .headers
            .iter()
            .filter_map(|rule| match HeaderRule::compile(rule) {
                Ok(compiled) => Some(compiled),
                Err(reason) => {
                    errors.push(ValidationError::InvalidHeaderRule {
                        prefix: prefix.to_string(),
                        name: rule.name.clone(),
                        reason,
                    });
                    None
                }
            })
            .collect::<Vec<_>>();

        match (target, credential_policy) {
            (Some(target), Some(credential_policy)) if errors.is_empty() => Ok(Self {
                prefix: normalized,
                target,
                credential_policy,
                header_rules,
                allowed_methods,
                allowed_subjects: endpoint.allowed_subjects.clone(),
            }),
            _ => Err(errors),
        }
    }

    pub fn allows_method(&self, method: &Method) -> bool {
        self.allowed_methods
            .as_ref()
            .map_or(true, |methods| methods.contains(method))
    }
}

fn normalize_prefix(raw: &str) -> Result<String, &'static str> {
    if raw.is_empty() {
        return Err("must not be empty");
    }
    let prefix = if raw.starts_with('/') {
        raw.to_string()
    } else {
        format!("/{}", raw)
    };
    if prefix.len() > 1 && prefix.ends_with('/') {
        return Err("must not end with '/'");
    }
    if prefix.contains("//") {
        return Err("must not contain empty segments");
    }
    if prefix.contains(['?', '#']) {
        return Err("must not contain '?' or '#'");
    }
    Ok(prefix)
}

fn parse_target(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err("scheme must be http or https".to_string());
    }
    if url.host().is_none() {
        return Err("must include a host".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("must not carry a query or fragment".to_string());
    }
    Ok(url)
}

/// Immutable set of routes for one configuration generation.
#[derive(Debug, Default)]
pub struct RouteTable {
    matcher: PathMatcher,
}

impl RouteTable {
    /// Build a table, rejecting duplicate prefixes.
    pub fn new(routes: Vec<RouteDescriptor>) -> Result<Self, Vec<ValidationError>> {
        let mut seen = HashSet::new();
        let mut errors = Vec::new();
        for route in &routes {
            if !seen.insert(route.prefix.as_str()) {
                errors.push(ValidationError::DuplicatePrefix(route.prefix.clone()));
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            matcher: PathMatcher::new(routes.into_iter().map(Arc::new).collect()),
        })
    }

    /// Compile every configured endpoint.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, Vec<ValidationError>> {
        let mut routes = Vec::with_capacity(config.endpoints.len());
        let mut errors = Vec::new();

        for (prefix, entry) in &config.endpoints {
            match RouteDescriptor::compile(prefix, &entry.to_endpoint()) {
                Ok(route) => routes.push(route),
                Err(e) => errors.extend(e),
            }
        }

        match Self::new(routes) {
            Ok(table) if errors.is_empty() => Ok(table),
            Ok(_) => Err(errors),
            Err(duplicates) => {
                errors.extend(duplicates);
                Err(errors)
            }
        }
    }

    /// Resolve a mount-relative path to a route and residual suffix.
    pub fn lookup(&self, path: &str) -> Option<MatchResult> {
        self.matcher.resolve(path)
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteDescriptor> {
        self.matcher.routes().map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.matcher.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matcher.is_empty()
    }
}
