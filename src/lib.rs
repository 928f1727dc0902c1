//! Front door of a multi-tenant code-search service.
//!
//! Every inbound request passes through an ordered pipeline that picks the
//! applicable authentication provider, enforces cross-origin and CSRF trust
//! boundaries, and routes the result to one of three isolated surfaces:
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!   public listener ───▶│ snapshot → forbid-all → request id → trace  │
//!                       │ → probes → security headers → timeout        │
//!                       │        │                                     │
//!                       │        ├─ /.api/**   token → cookie → chain  │──▶ External-API
//!                       │        ├─ /.assets/** static files           │
//!                       │        ├─ /.internal/** 404                  │
//!                       │        └─ *          cookie → override →     │──▶ External-App
//!                       │                      chain → csrf            │
//!                       └──────────────────────────────────────────────┘
//!   internal listener ──▶ snapshot → forbid-all → trace → /.internal/** ──▶ Internal-API
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod routing;

// Trust boundaries
pub mod auth;
pub mod security;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use config::schema::FrontendConfig;
pub use error::Error;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
