//! Configurable reverse-proxy routing service.
//!
//! Requests under the mount path are matched against a table of path
//! prefixes, gated by the route's credential policy, and streamed to the
//! route's upstream target.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
