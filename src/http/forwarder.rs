//! Upstream request forwarding.
//!
//! # Responsibilities
//! - Build the outbound URL from the route target, residual suffix and query
//! - Stream the caller's body to the upstream through a bounded pipe
//! - Stream the upstream body back without buffering it
//! - Classify transport failures as unreachable (502) or timed out (504)
//!
//! # Design Decisions
//! - Redirects are relayed to the caller, never followed
//! - No retries; a request body can only be consumed once
//! - Dropping the forward future aborts the upstream request

use std::error::Error as StdError;
use std::net::SocketAddr;

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{HeaderMap, Method};
use futures_util::{StreamExt, TryStreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use url::Url;

use crate::http::response::{ProxyOutcome, UpstreamFailure, UpstreamResponse};
use crate::resilience::{within_header_deadline, UpstreamTimeouts};
use crate::routing::RouteDescriptor;
use crate::security::headers::{downstream_response_headers, upstream_request_headers};

/// The parts of an admitted inbound request that travel upstream.
#[derive(Debug)]
pub struct ForwardRequest {
    pub method: Method,
    /// Mount- and prefix-relative path, starting with `/`.
    pub suffix: String,
    pub query: Option<String>,
    /// Inbound headers, unfiltered.
    pub headers: HeaderMap,
    pub client_addr: Option<SocketAddr>,
    pub body: Body,
}

/// Issues outbound requests on behalf of the dispatcher.
#[derive(Debug, Clone)]
pub struct UpstreamForwarder {
    client: reqwest::Client,
    timeouts: UpstreamTimeouts,
    pipe_capacity: usize,
}

impl UpstreamForwarder {
    pub fn new(timeouts: UpstreamTimeouts, pipe_capacity: usize) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .pool_idle_timeout(timeouts.idle)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            timeouts,
            pipe_capacity: pipe_capacity.max(1),
        })
    }

    /// Forward an admitted request to the route's upstream.
    pub async fn forward(&self, route: &RouteDescriptor, request: ForwardRequest) -> ProxyOutcome {
        let Some(url) = upstream_url(&route.target, &request.suffix, request.query.as_deref())
        else {
            tracing::warn!(
                route = %route.prefix,
                suffix = %request.suffix,
                "Suffix escapes the target path, not forwarding"
            );
            return ProxyOutcome::PathEscapesTarget {
                suffix: request.suffix,
            };
        };
        let headers = upstream_request_headers(&request.headers, route, request.client_addr);

        tracing::debug!(
            route = %route.prefix,
            method = %request.method,
            upstream = %url,
            "Forwarding request"
        );

        let mut builder = self.client.request(request.method, url).headers(headers);
        if !request.body.is_end_stream() {
            builder = builder.body(pipe_body(request.body, self.pipe_capacity));
        }

        let response = match within_header_deadline(&self.timeouts, builder.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_timeout() => {
                tracing::warn!(route = %route.prefix, error = %e, "Upstream connect timed out");
                return ProxyOutcome::UpstreamUnavailable(UpstreamFailure::TimedOut {
                    after: self.timeouts.connect,
                });
            }
            Ok(Err(e)) => {
                let cause = describe(&e);
                tracing::warn!(
                    route = %route.prefix,
                    connect = e.is_connect(),
                    error = %cause,
                    "Upstream request failed"
                );
                return ProxyOutcome::UpstreamUnavailable(UpstreamFailure::Unreachable { cause });
            }
            Err(elapsed) => {
                tracing::warn!(route = %route.prefix, after = ?elapsed.0, "Upstream response headers timed out");
                return ProxyOutcome::UpstreamUnavailable(UpstreamFailure::TimedOut {
                    after: elapsed.0,
                });
            }
        };

        let status = response.status();
        let headers = downstream_response_headers(response.headers());
        let prefix = route.prefix.clone();
        let body = response.bytes_stream().inspect_err(move |e| {
            tracing::warn!(
                route = %prefix,
                error = %e,
                "Upstream body broke after headers were sent, terminating connection"
            );
        });

        ProxyOutcome::Forwarded(UpstreamResponse {
            status,
            headers,
            body: Body::from_stream(body),
        })
    }
}

/// Join the target base URL, residual suffix and caller query.
///
/// Returns `None` when URL normalisation would move the path outside the
/// target's base path.
pub fn upstream_url(target: &Url, suffix: &str, query: Option<&str>) -> Option<Url> {
    let base = target.path().trim_end_matches('/');
    let mut url = target.clone();
    url.set_path(&format!("{}{}", base, suffix));
    url.set_query(query);

    let path = url.path();
    let inside = path == base
        || path
            .strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('/'));
    inside.then_some(url)
}

/// Copy the caller's body into a bounded channel drained by the client.
///
/// The pump stops when the body ends, fails, or the upstream side hangs up.
fn pipe_body(body: Body, capacity: usize) -> reqwest::Body {
    let (tx, rx) = mpsc::channel::<Result<Bytes, axum::Error>>(capacity);

    tokio::spawn(async move {
        let mut chunks = body.into_data_stream();
        while let Some(chunk) = chunks.next().await {
            let failed = chunk.is_err();
            if tx.send(chunk).await.is_err() || failed {
                break;
            }
        }
    });

    reqwest::Body::wrap_stream(ReceiverStream::new(rx))
}

fn describe(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn joins_root_target_and_suffix() {
        assert_eq!(
            upstream_url(&url("http://127.0.0.1:3000"), "/", None).unwrap().as_str(),
            "http://127.0.0.1:3000/"
        );
        assert_eq!(
            upstream_url(&url("http://127.0.0.1:3000"), "/not-found", None).unwrap().as_str(),
            "http://127.0.0.1:3000/not-found"
        );
    }

    #[test]
    fn keeps_target_base_path() {
        assert_eq!(
            upstream_url(&url("https://api.local/v1"), "/users/7", None).unwrap().as_str(),
            "https://api.local/v1/users/7"
        );
        assert_eq!(
            upstream_url(&url("https://api.local/v1/"), "/", None).unwrap().as_str(),
            "https://api.local/v1/"
        );
    }

    #[test]
    fn preserves_query_and_encoding() {
        assert_eq!(
            upstream_url(&url("http://a.local"), "/search%20all", Some("q=a%26b&page=2"))
                .unwrap()
                .as_str(),
            "http://a.local/search%20all?q=a%26b&page=2"
        );
    }

    #[test]
    fn refuses_suffixes_that_leave_the_base_path() {
        let target = url("http://shared.local/public");
        assert!(upstream_url(&target, "/../admin/secret", None).is_none());
        assert!(upstream_url(&target, "/%2e%2e/admin", None).is_none());
        assert!(upstream_url(&target, "/a/../../admin", None).is_none());
        assert_eq!(
            upstream_url(&target, "/a/../b", None).unwrap().as_str(),
            "http://shared.local/public/b"
        );
    }

    #[tokio::test]
    async fn builds_client_from_timeouts() {
        let timeouts = UpstreamTimeouts::from(&crate::config::TimeoutConfig::default());
        let forwarder = UpstreamForwarder::new(timeouts, 0).unwrap();
        assert_eq!(forwarder.pipe_capacity, 1);
        assert_eq!(forwarder.timeouts, timeouts);
    }
}
