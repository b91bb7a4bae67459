//! Per-request proxy errors.
//!
//! Every error is handled inside the dispatcher and turned into an HTTP
//! response; none of them escape as process-level failures. Responses
//! relayed from an upstream are never represented here, whatever their
//! status.

use std::time::Duration;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no proxy route matches {path}")]
    RouteNotFound { path: String },

    #[error("path {path} contains a dot segment")]
    InvalidPath { path: String },

    #[error("method {method} is not allowed on {prefix}")]
    MethodNotAllowed {
        method: Method,
        prefix: String,
        allowed: Vec<Method>,
    },

    #[error("authentication is required for {prefix}")]
    Unauthenticated { prefix: String },

    #[error("{subject} is not permitted to access {prefix}")]
    Unauthorized { subject: String, prefix: String },

    #[error("upstream {target} is unavailable: {cause}")]
    UpstreamUnavailable { target: String, cause: String },

    #[error("upstream {target} did not respond within {after:?}")]
    UpstreamTimeout { target: String, after: Duration },
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            ProxyError::InvalidPath { .. } => StatusCode::BAD_REQUEST,
            ProxyError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            ProxyError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            ProxyError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Error name reported in the response body.
    pub fn name(&self) -> &'static str {
        match self {
            ProxyError::RouteNotFound { .. } => "NotFoundError",
            ProxyError::InvalidPath { .. } => "InputError",
            ProxyError::MethodNotAllowed { .. } => "MethodNotAllowedError",
            ProxyError::Unauthenticated { .. } => "AuthenticationError",
            ProxyError::Unauthorized { .. } => "NotAllowedError",
            ProxyError::UpstreamUnavailable { .. } => "UpstreamUnavailableError",
            ProxyError::UpstreamTimeout { .. } => "UpstreamTimeoutError",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "error": {
                "name": self.name(),
                "message": self.to_string(),
            },
            "response": {
                "statusCode": status.as_u16(),
            },
        });

        let mut response = (status, Json(body)).into_response();

        if let ProxyError::MethodNotAllowed { allowed, .. } = &self {
            let allow = allowed
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            if let Ok(value) = HeaderValue::from_str(&allow) {
                response.headers_mut().insert(header::ALLOW, value);
            }
        }

        response
    }
}
