//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Matched request:
//!     → identity.rs (ask the authenticator who the caller is)
//!     → credentials.rs (admit or reject against the route policy)
//!     → headers.rs (strip hop-by-hop, withhold credentials, header rules)
//!     → Pass to forwarder
//! ```
//!
//! # Design Decisions
//! - Fail closed: a route requiring identity rejects when verification fails
//! - The gate runs before any upstream contact
//! - Credential material is only ever parsed by the authenticator

pub mod credentials;
pub mod headers;
pub mod identity;

pub use credentials::{admit, Admission, AuthenticatedPolicy, CredentialPolicy, Rejection};
pub use headers::{HeaderAction, HeaderRule};
pub use identity::{Authenticator, Identity, StaticTokenAuthenticator};
