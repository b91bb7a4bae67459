//! Per-request orchestration.
//!
//! ```text
//! Received
//!     → outside mount / unmatched      → 404
//!     → dot segment in the path        → 400
//!     → matched, method not allowed    → 405
//!     → matched → gate rejected        → 401 / 403
//!     → matched → admitted → forward   → upstream response | 502 | 504
//! ```
//!
//! The route table snapshot is taken once per request, so a reload never
//! changes the route of a request already being handled. Nothing is retried.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};

use crate::error::ProxyError;
use crate::http::forwarder::{ForwardRequest, UpstreamForwarder};
use crate::http::request::RequestIdExt;
use crate::http::response::ProxyOutcome;
use crate::observability::metrics;
use crate::routing::{has_dot_segment, residual, SharedRouteTable};
use crate::security::{admit, Admission, Authenticator};

/// Single entry point handed every inbound request by the server.
pub struct Dispatcher {
    mount_path: String,
    routes: SharedRouteTable,
    authenticator: Arc<dyn Authenticator>,
    forwarder: UpstreamForwarder,
}

impl Dispatcher {
    pub fn new(
        mount_path: impl Into<String>,
        routes: SharedRouteTable,
        authenticator: Arc<dyn Authenticator>,
        forwarder: UpstreamForwarder,
    ) -> Self {
        Self {
            mount_path: mount_path.into(),
            routes,
            authenticator,
            forwarder,
        }
    }

    /// Handle to the route table, used for reloads.
    pub fn routes(&self) -> &SharedRouteTable {
        &self.routes
    }

    /// Dispatch one request and produce the caller's response.
    pub async fn dispatch(&self, request: Request<Body>, client_addr: Option<SocketAddr>) -> Response {
        let start = Instant::now();
        let request_id = request.request_id().to_string();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let mut route_label = metrics::NO_ROUTE.to_string();
        let response = match self.route_request(request, client_addr, &mut route_label).await {
            Ok(response) => {
                tracing::debug!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    route = %route_label,
                    status = response.status().as_u16(),
                    "Relaying upstream response"
                );
                response
            }
            Err(error) => {
                match &error {
                    ProxyError::RouteNotFound { .. }
                    | ProxyError::InvalidPath { .. }
                    | ProxyError::MethodNotAllowed { .. } => {
                        tracing::debug!(request_id = %request_id, method = %method, path = %path, error = %error, "Request not routed");
                    }
                    ProxyError::Unauthenticated { .. } | ProxyError::Unauthorized { .. } => {
                        tracing::info!(request_id = %request_id, method = %method, path = %path, error = %error, "Request rejected");
                    }
                    ProxyError::UpstreamUnavailable { .. } => {
                        metrics::record_upstream_failure(&route_label, "unavailable");
                        tracing::warn!(request_id = %request_id, method = %method, path = %path, error = %error, "Upstream unavailable");
                    }
                    ProxyError::UpstreamTimeout { .. } => {
                        metrics::record_upstream_failure(&route_label, "timeout");
                        tracing::warn!(request_id = %request_id, method = %method, path = %path, error = %error, "Upstream timed out");
                    }
                }
                error.into_response()
            }
        };

        metrics::record_request(method.as_str(), response.status().as_u16(), &route_label, start);
        response
    }

    async fn route_request(
        &self,
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
        route_label: &mut String,
    ) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();
        let path = parts.uri.path();

        let not_found = || ProxyError::RouteNotFound {
            path: path.to_string(),
        };

        let relative = residual(&self.mount_path, path).ok_or_else(not_found)?;
        if has_dot_segment(relative) {
            return Err(ProxyError::InvalidPath {
                path: path.to_string(),
            });
        }

        let table = self.routes.snapshot();
        let matched = table.lookup(relative).ok_or_else(not_found)?;
        let route = matched.route;
        route_label.clone_from(&route.prefix);

        if !route.allows_method(&parts.method) {
            return Err(ProxyError::MethodNotAllowed {
                method: parts.method,
                prefix: route.prefix.clone(),
                allowed: route.allowed_methods.clone().unwrap_or_default(),
            });
        }

        let identity = if route.credential_policy.requires_identity() {
            self.authenticator.verify(&parts.headers).await
        } else {
            None
        };

        let outcome = match admit(&route, identity.as_ref()) {
            Admission::Rejected(rejection) => ProxyOutcome::Rejected(rejection),
            Admission::Admitted => {
                self.forwarder
                    .forward(
                        &route,
                        ForwardRequest {
                            query: parts.uri.query().map(str::to_string),
                            method: parts.method,
                            suffix: matched.suffix,
                            headers: parts.headers,
                            client_addr,
                            body,
                        },
                    )
                    .await
            }
        };

        outcome.into_result(&route)
    }
}
