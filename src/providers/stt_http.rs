//! STT provider adapter: a thin `reqwest` client over a LAN-local speech
//! recognition HTTP gateway (spec §4.12, §6 Provider interface).

use crate::error::KioskError;
use crate::executor::providers::{SttInput, SttOutput, SttProvider};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

pub struct HttpSttProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSttProvider {
    pub fn new(client: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        Self { client, base_url, api_key }
    }
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    text: String,
}

#[async_trait]
impl SttProvider for HttpSttProvider {
    async fn transcribe(&self, input: SttInput) -> Result<SttOutput, KioskError> {
        let audio_part = Part::bytes(input.wav).file_name("utterance.wav").mime_str("audio/wav").map_err(|e| KioskError::Internal(e.to_string()))?;
        let form = Form::new().text("mode", input.mode).part("audio", audio_part);

        let mut request = self.client.post(format!("{}/transcribe", self.base_url)).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| KioskError::ProviderUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(KioskError::ProviderUnavailable(format!("stt provider returned {}", response.status())));
        }
        let parsed: TranscribeResponse = response.json().await.map_err(|e| KioskError::ProviderUnavailable(e.to_string()))?;
        Ok(SttOutput { text: parsed.text })
    }
}
