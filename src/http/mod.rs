//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID and trace layers)
//!     → dispatcher.rs (match → gate → forward)
//!     → forwarder.rs (outbound request, streamed bodies)
//!     → response.rs (outcome → caller response)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod forwarder;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::Dispatcher;
pub use forwarder::{ForwardRequest, UpstreamForwarder};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::{ProxyOutcome, UpstreamFailure, UpstreamResponse};
pub use server::{AppState, HttpServer, ServerError};
