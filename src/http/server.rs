//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the catch-all proxy handler
//! - Wire up middleware (request ID, tracing)
//! - Build the dispatcher from configuration
//! - Publish reloaded route tables
//! - Serve until shutdown, draining in-flight requests

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::{ProxyConfig, ValidationError};
use crate::http::dispatcher::Dispatcher;
use crate::http::forwarder::UpstreamForwarder;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::recv_shutdown;
use crate::resilience::UpstreamTimeouts;
use crate::routing::{RouteTable, SharedRouteTable};
use crate::security::{Authenticator, StaticTokenAuthenticator};

/// Startup failures. None of these can happen while serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid route configuration: {0:?}")]
    Routes(Vec<ValidationError>),
    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// HTTP server for the route proxy.
pub struct HttpServer {
    router: Router,
    mount_path: String,
    dispatcher: Arc<Dispatcher>,
}

impl HttpServer {
    /// Create a server using the configured static-token authenticator.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let authenticator = Arc::new(StaticTokenAuthenticator::from_config(&config.auth));
        Self::with_authenticator(config, authenticator)
    }

    /// Create a server with a caller-supplied authentication collaborator.
    pub fn with_authenticator(
        config: ProxyConfig,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self, ServerError> {
        let table = RouteTable::from_config(&config).map_err(ServerError::Routes)?;
        let forwarder = UpstreamForwarder::new(
            UpstreamTimeouts::from(&config.timeouts),
            config.upstream.pipe_capacity,
        )?;

        let dispatcher = Arc::new(Dispatcher::new(
            config.mount_path.clone(),
            SharedRouteTable::new(table),
            authenticator,
            forwarder,
        ));

        let router = Self::build_router(AppState {
            dispatcher: Arc::clone(&dispatcher),
        });

        Ok(Self {
            router,
            mount_path: config.mount_path,
            dispatcher,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer()),
            )
    }

    /// The router, for embedding into a host application or testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Handle to the route table in service.
    pub fn routes(&self) -> SharedRouteTable {
        self.dispatcher.routes().clone()
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Route tables received on `config_updates` replace the current one;
    /// other settings require a restart.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mount_path = %self.mount_path,
            routes = self.dispatcher.routes().snapshot().len(),
            "HTTP server starting"
        );

        tokio::spawn(apply_route_updates(
            self.dispatcher.routes().clone(),
            config_updates,
            shutdown.resubscribe(),
        ));

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(recv_shutdown(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Compile each received configuration and publish its route table.
async fn apply_route_updates(
    routes: SharedRouteTable,
    mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = config_updates.recv() => match update {
                Some(config) => match RouteTable::from_config(&config) {
                    Ok(table) => routes.publish(table),
                    Err(errors) => tracing::error!(
                        errors = ?errors,
                        "Rejected route table update, keeping current routes"
                    ),
                },
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}

/// Catch-all handler: every request goes through the dispatcher.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    state.dispatcher.dispatch(request, client_addr).await
}
