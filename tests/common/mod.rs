//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use route_proxy::config::{EndpointConfig, ProxyConfig, StaticTokenConfig};
use route_proxy::http::HttpServer;
use route_proxy::lifecycle::Shutdown;
use route_proxy::routing::SharedRouteTable;

pub const TOKEN: &str = "test-token";
pub const SUBJECT: &str = "test-subject";
pub const OTHER_TOKEN: &str = "other-token";
pub const OTHER_SUBJECT: &str = "other-subject";

/// A mock upstream that describes every request it receives.
///
/// Path conventions:
/// - `.../status/{code}` answers with that status
/// - `.../slow/{ms}` waits before answering
/// - `.../echo` streams the request body back
/// - `.../hold` never answers; dropping the handler counts as abandoned
/// - anything else answers 200 with a JSON description of the request
pub struct MockUpstream {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    abandoned: Arc<AtomicUsize>,
}

impl MockUpstream {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Held requests whose handler was dropped before answering.
    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct UpstreamState {
    name: &'static str,
    hits: Arc<AtomicUsize>,
    abandoned: Arc<AtomicUsize>,
}

struct CountOnDrop(Arc<AtomicUsize>);

impl Drop for CountOnDrop {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub async fn start_upstream(name: &'static str) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let abandoned = Arc::new(AtomicUsize::new(0));

    let app = Router::new().fallback(describe).with_state(UpstreamState {
        name,
        hits: Arc::clone(&hits),
        abandoned: Arc::clone(&abandoned),
    });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockUpstream {
        addr,
        hits,
        abandoned,
    }
}

async fn describe(State(state): State<UpstreamState>, request: Request<Body>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let path = request.uri().path().to_string();

    if path.ends_with("/echo") {
        return Response::new(request.into_body());
    }

    if path.ends_with("/hold") {
        let _guard = CountOnDrop(Arc::clone(&state.abandoned));
        std::future::pending::<()>().await;
    }

    if let Some(ms) = trailing_number(&path, "/slow/") {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let body = json!({
        "upstream": state.name,
        "method": request.method().as_str(),
        "path": path,
        "query": request.uri().query(),
        "authorization": header("authorization"),
        "host": header("host"),
        "x-forwarded-for": header("x-forwarded-for"),
        "x-forwarded-host": header("x-forwarded-host"),
        "x-static": header("x-static"),
        "x-secret": header("x-secret"),
        "x-custom": header("x-custom"),
    });

    let status = trailing_number(&path, "/status/")
        .and_then(|code| StatusCode::from_u16(code as u16).ok())
        .unwrap_or(StatusCode::OK);

    (status, [("x-upstream", state.name)], Json(body)).into_response()
}

fn trailing_number(path: &str, marker: &str) -> Option<u64> {
    let (_, tail) = path.rsplit_once(marker)?;
    tail.parse().ok()
}

/// Endpoint open to everyone.
pub fn open_endpoint(target: &str) -> EndpointConfig {
    EndpointConfig {
        target: target.to_string(),
        credentials: "dangerously-allow-unauthenticated".to_string(),
        ..EndpointConfig::default()
    }
}

/// Endpoint that requires a verified caller.
pub fn secured_endpoint(target: &str) -> EndpointConfig {
    EndpointConfig {
        target: target.to_string(),
        ..EndpointConfig::default()
    }
}

/// Configuration with the given endpoints and two known static tokens.
pub fn proxy_config(endpoints: Vec<(&str, EndpointConfig)>) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.auth.static_tokens = vec![
        StaticTokenConfig {
            token: TOKEN.to_string(),
            subject: SUBJECT.to_string(),
        },
        StaticTokenConfig {
            token: OTHER_TOKEN.to_string(),
            subject: OTHER_SUBJECT.to_string(),
        },
    ];
    for (prefix, endpoint) in endpoints {
        config.endpoints.insert(prefix.to_string(), endpoint.into());
    }
    config
}

/// A proxy serving on an ephemeral port.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub routes: SharedRouteTable,
    pub updates: mpsc::UnboundedSender<ProxyConfig>,
    pub shutdown: Shutdown,
}

impl RunningProxy {
    /// URL of `path` under the default mount path.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}/api/proxy{}", self.addr, path)
    }

    pub fn raw_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for RunningProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_proxy(config: ProxyConfig) -> RunningProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config).expect("valid proxy config");
    let routes = server.routes();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    RunningProxy {
        addr,
        routes,
        updates,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
