//! Kiosk server library: a LAN-only voice-interaction kiosk backend built
//! around a pure orchestrator reducer, an impure effect executor, and the
//! HTTP/SSE surfaces that feed events in and commands out.
//!
//! # Example
//!
//! ```ignore
//! use kiosk_server::config::KioskConfig;
//! use kiosk_server::orchestrator::OrchestratorState;
//!
//! let config = KioskConfig::default();
//! let state = OrchestratorState::initial(0);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod providers;
pub mod server;
pub mod store;
pub mod text;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
