//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → FrontendConfig (validated, immutable)
//!     → providers, chains and allow-lists built once at startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → snapshot.rs publishes a new RuntimeSnapshot (atomic swap)
//!     → next requests observe the new [security] section
//! ```
//!
//! # Design Decisions
//! - Only `[security]` is live; everything else requires a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod snapshot;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AssetsConfig, AuthConfig, FrontendConfig, HttpHeaderConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, OidcConfig, ProbeConfig, ProbeRule, RequireAuthConfig, SamlConfig,
    SecurityConfig, SurfaceToggle, TimeoutConfig, DEV_EXTENSION_ORIGIN, PROD_EXTENSION_ORIGIN,
};
pub use snapshot::{ConfigHandle, RuntimeSnapshot};
