//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, query, headers)
//!     → probes.rs (canned responders, before authentication)
//!         matcher.rs evaluates each probe's condition
//!     → router.rs (classify path into exactly one destination)
//!         /.api/**      → External-API guard stack
//!         /.internal/** → 404 here; served only by the internal listener
//!         assets mount  → static files
//!         anything else → External-App guard stack
//! ```
//!
//! # Design Decisions
//! - Stacks and probes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - First matching probe wins, in configuration order

pub mod matcher;
pub mod probes;
pub mod router;
