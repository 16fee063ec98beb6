//! HTTP router, SSE transport, staff cookie auth, and static file serving
//! (spec §4.11). All external collaborators; the core never imports this
//! module.

pub mod auth;
pub mod http;
pub mod sse;
pub mod static_files;

pub use http::{build_router, AppState};
pub use sse::{FanoutKioskSink, KioskBroadcaster, StaffBroadcaster};
