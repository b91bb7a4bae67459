//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Mount-relative request path
//!     → shared.rs (snapshot of the table in service)
//!     → table.rs (route lookup)
//!     → matcher.rs (longest segment-aligned prefix)
//!     → Return: MatchResult { route, suffix } or NoMatch
//!
//! Route Compilation (at startup and on reload):
//!     endpoints from ProxyConfig
//!     → Compile descriptors (policy, header rules, methods)
//!     → Sort by prefix length
//!     → Freeze as immutable RouteTable
//! ```

pub mod matcher;
pub mod shared;
pub mod table;

pub use matcher::{has_dot_segment, residual, MatchResult, PathMatcher};
pub use shared::SharedRouteTable;
pub use table::{RouteDescriptor, RouteTable};
