//! The Orchestrator: a pure state reducer over conversational phases,
//! paired with the data types it reads and produces (spec §3, §4.1).

pub mod effect;
pub mod event;
pub mod queue;
pub mod reducer;
pub mod session_buffer;
pub mod state;

pub use effect::{CallChatInput, Effect, InnerTask, Mode};
pub use event::{ConsentAnswer, Event, PttSource, ToolCall};
pub use queue::{EffectSink, EventQueue};
pub use reducer::reduce;
pub use session_buffer::SessionBuffer;
pub use state::{InFlight, MemoryCandidate, MemoryKind, OrchestratorState, Phase};
