//! Provider surface consumed by the Effect Executor (spec §4.2, §6).
//! Providers may answer synchronously or asynchronously; both shapes are
//! just `async fn` here — an already-resolved value is simply a future
//! that completes immediately, which is how the spec's "normalize at the
//! boundary" note is satisfied without two code paths.

use crate::error::KioskError;
use crate::orchestrator::effect::{CallChatInput, InnerTask};
use crate::orchestrator::event::ToolCall;
use async_trait::async_trait;
use futures::stream::BoxStream;

#[derive(Debug, Clone)]
pub struct SttInput {
    pub mode: String,
    pub wav: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct SttOutput {
    pub text: String,
}

#[async_trait]
pub trait SttProvider: Send + Sync {
    async fn transcribe(&self, input: SttInput) -> Result<SttOutput, KioskError>;
}

#[derive(Debug, Clone)]
pub struct ChatOutput {
    pub assistant_text: String,
    pub expression: String,
    pub motion_id: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// A stream of incremental assistant-text deltas. Ends when the provider's
/// response is exhausted, errors out, or is dropped by the caller.
pub type ChatDeltaStream = BoxStream<'static, String>;

#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn call(&self, input: &CallChatInput) -> Result<ChatOutput, KioskError>;

    /// `None` when this provider has no streaming path; the executor
    /// falls back to running only the non-streaming call.
    fn stream(&self, input: &CallChatInput) -> Option<ChatDeltaStream>;
}

#[async_trait]
pub trait InnerTaskProvider: Send + Sync {
    async fn call(&self, task: &InnerTask) -> Result<String, KioskError>;
}

#[async_trait]
pub trait TtsProvider: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, KioskError>;
}
