//! Caller identity verification.
//!
//! The proxy never inspects credential material itself; it asks an
//! [`Authenticator`] whether the request carries a verified identity.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::config::AuthConfig;

/// A verified caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
}

/// Verification interface provided by the identity subsystem.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Return the caller identity, or `None` when the request carries no
    /// valid credentials.
    async fn verify(&self, headers: &HeaderMap) -> Option<Identity>;
}

/// Accepts a fixed set of bearer tokens from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, String>,
}

impl StaticTokenAuthenticator {
    pub fn new(tokens: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config
                .static_tokens
                .iter()
                .map(|t| (t.token.clone(), t.subject.clone())),
        )
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn verify(&self, headers: &HeaderMap) -> Option<Identity> {
        let token = bearer_token(headers)?;
        self.tokens.get(token).map(|subject| Identity {
            subject: subject.clone(),
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
