//! The Effect Executor (spec §4.2): the impure boundary where reducer
//! effects meet providers, the kiosk wire protocol, and persistence.

pub mod correlation;
pub mod executor;
pub mod kiosk_command;
pub mod providers;
pub mod streaming;

pub use correlation::StreamCorrelationTable;
pub use executor::{EventSink, Executor, StoreWriter};
pub use kiosk_command::{KioskCommand, KioskCommandSink, MetricsObserver, TtfaObservation};
pub use providers::{ChatProvider, InnerTaskProvider, SttProvider, TtsProvider};
