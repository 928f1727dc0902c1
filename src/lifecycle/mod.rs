//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → both listeners stop accepting → in-flight requests drain → exit
//! ```
//!
//! # Design Decisions
//! - One broadcast channel fans the signal out to every listener
//! - Config reloads come from the file watcher, not from SIGHUP

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
