//! TTS provider adapter: a thin `reqwest` client over a LAN-local speech
//! synthesis HTTP gateway (spec §4.12, §6 Provider interface). Reached
//! only from the `/api/tts` convenience route, never from the
//! orchestrator/executor core directly (TTS is downstream of
//! `kiosk.command.speak`, not a reducer effect).

use crate::error::KioskError;
use crate::executor::providers::TtsProvider;
use async_trait::async_trait;
use serde::Serialize;

pub struct HttpTtsProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTtsProvider {
    pub fn new(client: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        Self { client, base_url, api_key }
    }
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
}

#[async_trait]
impl TtsProvider for HttpTtsProvider {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, KioskError> {
        let mut request = self.client.post(format!("{}/synthesize", self.base_url)).json(&SynthesizeRequest { text });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(|e| KioskError::ProviderUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(KioskError::ProviderUnavailable(format!("tts provider returned {}", response.status())));
        }
        let bytes = response.bytes().await.map_err(|e| KioskError::ProviderUnavailable(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
