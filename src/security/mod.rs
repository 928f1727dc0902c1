//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! External request:
//!     → headers.rs (hardening headers, CORS, pre-flight short-circuit)
//!     → API:  access_token.rs → cookie_auth.rs (marker header) → auth chain
//!     → App:  cookie_auth.rs → override auth → auth chain → csrf.rs
//!
//! trust.rs is consulted by headers.rs and the API cookie guard.
//! nonce.rs remembers the login states and anti-forgery tokens handed out.
//! ```
//!
//! # Design Decisions
//! - Fail closed: a guard that cannot decide rejects
//! - No trust in client input: origins match exactly, tokens compare in constant time
//! - Trust settings come from the request's runtime snapshot

pub mod access_token;
pub mod cookie_auth;
pub mod csrf;
pub mod headers;
pub mod nonce;
pub mod trust;
