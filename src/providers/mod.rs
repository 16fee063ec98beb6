//! Concrete STT/LLM/TTS HTTP adapters (spec §4.12) implementing the
//! provider traits the executor consumes.

pub mod llm_http;
pub mod stt_http;
pub mod tts_http;

pub use llm_http::HttpLlmProvider;
pub use stt_http::HttpSttProvider;
pub use tts_http::HttpTtsProvider;
