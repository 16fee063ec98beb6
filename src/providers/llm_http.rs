//! Chat and inner-task LLM provider adapters: thin `reqwest` clients over
//! a LAN-local gateway (spec §4.12, §6 Provider interface). `stream_chat`'s
//! response body is treated as a raw sequence of UTF-8 text chunks, each
//! chunk one delta — the gateway this talks to is purpose-built for this
//! kiosk, so there's no existing framed-SSE chat protocol to match.

use crate::error::KioskError;
use crate::executor::providers::{ChatDeltaStream, ChatOutput, ChatProvider, InnerTaskProvider};
use crate::orchestrator::effect::{CallChatInput, InnerTask};
use crate::orchestrator::event::ToolCall;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

pub struct HttpLlmProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpLlmProvider {
    pub fn new(client: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        Self { client, base_url, api_key }
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    session_buffer: &'a [(String, String)],
    user_text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    assistant_text: String,
    expression: String,
    #[serde(default)]
    motion_id: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallBody>,
}

#[derive(Debug, Deserialize)]
struct ToolCallBody {
    id: String,
    function_name: String,
}

#[async_trait]
impl ChatProvider for HttpLlmProvider {
    async fn call(&self, input: &CallChatInput) -> Result<ChatOutput, KioskError> {
        let body = ChatRequestBody { session_buffer: &input.session_buffer, user_text: &input.user_text };
        let request = self.authed(self.client.post(format!("{}/chat", self.base_url)).json(&body));
        let response = request.send().await.map_err(|e| KioskError::ProviderUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(KioskError::ProviderUnavailable(format!("chat provider returned {}", response.status())));
        }
        let parsed: ChatResponseBody = response.json().await.map_err(|e| KioskError::ProviderUnavailable(e.to_string()))?;
        Ok(ChatOutput {
            assistant_text: parsed.assistant_text,
            expression: parsed.expression,
            motion_id: parsed.motion_id,
            tool_calls: parsed.tool_calls.into_iter().map(|t| ToolCall { id: t.id, function_name: t.function_name }).collect(),
        })
    }

    fn stream(&self, input: &CallChatInput) -> Option<ChatDeltaStream> {
        let body = ChatRequestBody { session_buffer: &input.session_buffer, user_text: &input.user_text };
        let request = self.authed(self.client.post(format!("{}/chat/stream", self.base_url)).json(&body));

        let byte_stream = async_stream::stream! {
            let response = match request.send().await {
                Ok(r) if r.status().is_success() => r,
                _ => return,
            };
            let mut bytes = response.bytes_stream();
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(bytes) => {
                        if let Ok(text) = String::from_utf8(bytes.to_vec()) {
                            yield text;
                        }
                    }
                    Err(_) => return,
                }
            }
        };

        Some(Box::pin(byte_stream))
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind")]
enum InnerTaskRequestBody<'a> {
    #[serde(rename = "consent_decision")]
    ConsentDecision { utterance: &'a str },
    #[serde(rename = "memory_extract")]
    MemoryExtract { assistant_text: &'a str },
    #[serde(rename = "session_summary")]
    SessionSummary { messages: &'a [(String, String)] },
}

impl<'a> From<&'a InnerTask> for InnerTaskRequestBody<'a> {
    fn from(task: &'a InnerTask) -> Self {
        match task {
            InnerTask::ConsentDecision { utterance } => InnerTaskRequestBody::ConsentDecision { utterance },
            InnerTask::MemoryExtract { assistant_text } => InnerTaskRequestBody::MemoryExtract { assistant_text },
            InnerTask::SessionSummary { messages } => InnerTaskRequestBody::SessionSummary { messages },
        }
    }
}

#[async_trait]
impl InnerTaskProvider for HttpLlmProvider {
    async fn call(&self, task: &InnerTask) -> Result<String, KioskError> {
        let body: InnerTaskRequestBody = task.into();
        let request = self.authed(self.client.post(format!("{}/inner_task", self.base_url)).json(&body));
        let response = request.send().await.map_err(|e| KioskError::ProviderUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(KioskError::ProviderUnavailable(format!("inner task provider returned {}", response.status())));
        }
        response.text().await.map_err(|e| KioskError::ProviderUnavailable(e.to_string()))
    }
}
