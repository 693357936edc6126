//! Route table and handler types.
//!
//! # Data Flow
//! ```text
//! Registration (at startup):
//!     RouterBuilder::route / ::prefix
//!     → exact table   (path → method → handler)
//!     → prefix table  (prefix → method → handler)
//!     → build(): prefixes sorted longest first, frozen as Router
//!
//! Dispatch (per request):
//!     exact table hit   → Found | MethodNotAllowed
//!     prefix table hit  → Found | MethodNotAllowed
//!     neither           → NotFound
//! ```
//!
//! # Design Decisions
//! - Routes registered on a builder, immutable once built (no locks on lookup)
//! - Registering the same (method, path) twice keeps the later handler
//! - Overlapping prefixes: the longest one wins

pub mod handler;
pub mod router;

pub use handler::{BoxFuture, Handler, HandlerResult};
pub use router::{RouteMatch, Router, RouterBuilder};
