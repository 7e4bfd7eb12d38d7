//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (App setup):
//!     (method, pattern, target)
//!     → pattern.rs (expand optional tails, split into segments)
//!     → matcher.rs (literal / constrained parameter segments)
//!     → RouteTable (ordered, first registration wins)
//!
//! Compilation (App::build):
//!     RouteTable
//!     → one segment trie per method
//!     → Freeze as immutable Router
//!
//! Dispatch (per request):
//!     (method, path) → Router::dispatch
//!     → Found { target, params } | MethodNotAllowed { allowed } | NotFound
//! ```
//!
//! # Design Decisions
//! - Routes compiled once at startup, immutable at runtime
//! - Deterministic: the lowest registration index wins on overlap
//! - Trailing slash is significant (`/users` and `/users/` differ)
//! - Captured parameters are raw path substrings (no percent-decoding)

pub mod matcher;
pub mod pattern;
pub mod router;

pub use matcher::Segment;
pub use pattern::{Pattern, PatternError};
pub use router::{Outcome, Params, RouteMatch, RouteTable, Router, TargetId};
