//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (external or internal listener)
//!     → server.rs (axum serve, graceful shutdown, reload loop)
//!     → routing::router (pre-auth layers, classification, guard stacks)
//!     → handlers.rs (terminal handlers per surface)
//!
//! Any guard may stop early:
//!     → rejection.rs (fixed, generic failure responses)
//! ```

pub mod handlers;
pub mod rejection;
pub mod server;

pub use handlers::Surfaces;
pub use rejection::Rejection;
pub use server::HttpServer;
