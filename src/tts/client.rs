//! Gemini generateContent client for speech synthesis and text generation.
//!
//! - Text goes in `contents[0].parts[0].text`.
//! - Speech requests set `generationConfig.responseModalities = ["AUDIO"]` and a
//!   `speechConfig` (single prebuilt voice, or a multi-speaker voice map).
//! - Audio comes back base64-encoded in `candidates[0].content.parts[*].inlineData.data`.
//! - The API key is sent in the `x-goog-api-key` header.

use async_trait::async_trait;
use serde_json::Value;
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use super::types::{validate_speakers, SpeakerVoice, Voice};
use super::{require_text, SpeechSynthesizer, TextGenerator};
use crate::config::{StudioConfig, DEFAULT_BASE_URL, DEFAULT_SPEECH_MODEL, DEFAULT_TEXT_MODEL, DEFAULT_TONE_PREFIX};
use crate::{Error, ErrorContext, Result};

/// Client for the Gemini speech and text models.
pub struct GeminiClient {
    http_client: reqwest::Client,
    base_url: Url,
    api_key: String,
    speech_model: String,
    text_model: String,
    tone_prefix: String,
}

impl GeminiClient {
    pub fn builder() -> GeminiClientBuilder {
        GeminiClientBuilder::new()
    }

    pub fn speech_model(&self) -> &str {
        &self.speech_model
    }

    pub fn text_model(&self) -> &str {
        &self.text_model
    }

    fn endpoint(&self, model: &str) -> Result<Url> {
        self.base_url
            .join(&format!("v1beta/models/{}:generateContent", model))
            .map_err(|e| {
                Error::configuration_with_context(
                    format!("cannot build endpoint url: {}", e),
                    ErrorContext::new().with_field_path("base_url"),
                )
            })
    }

    /// Request body for single-voice narration.
    pub(crate) fn speech_body(&self, text: &str, voice: Voice) -> Value {
        serde_json::json!({
            "contents": [{ "parts": [{ "text": format!("{}{}", self.tone_prefix, text) }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": voice.as_str() }
                    }
                }
            }
        })
    }

    /// Request body for a two-speaker script.
    pub(crate) fn dialogue_body(script: &str, speakers: &[SpeakerVoice; 2]) -> Value {
        let configs: Vec<Value> = speakers
            .iter()
            .map(|s| {
                serde_json::json!({
                    "speaker": s.speaker.trim(),
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": s.voice.as_str() }
                    }
                })
            })
            .collect();
        serde_json::json!({
            "contents": [{ "parts": [{ "text": script }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "multiSpeakerVoiceConfig": { "speakerVoiceConfigs": configs }
                }
            }
        })
    }

    pub(crate) fn text_body(prompt: &str) -> Value {
        serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        })
    }

    /// First inline audio payload in the response.
    pub(crate) fn extract_audio(body: &Value) -> Option<String> {
        body.pointer("/candidates/0/content/parts")
            .and_then(|p| p.as_array())?
            .iter()
            .filter_map(|part| part.pointer("/inlineData/data").and_then(|d| d.as_str()))
            .find(|data| !data.is_empty())
            .map(String::from)
    }

    /// All text parts of the first candidate, concatenated.
    pub(crate) fn extract_text(body: &Value) -> Option<String> {
        let text: String = body
            .pointer("/candidates/0/content/parts")
            .and_then(|p| p.as_array())?
            .iter()
            .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
            .collect();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    async fn generate_content(&self, model: &str, body: &Value) -> Result<Value> {
        let endpoint = self.endpoint(model)?;
        let span = tracing::info_span!("gemini_request", request_id = %Uuid::new_v4(), model);
        async {
            tracing::debug!(url = %endpoint, "sending generateContent request");
            let response = self
                .http_client
                .post(endpoint)
                .header("x-goog-api-key", &self.api_key)
                .json(body)
                .send()
                .await
                .map_err(|e| {
                    tracing::warn!(error = %e, "request failed");
                    Error::Transport(e)
                })?;
            let status = response.status();
            let bytes = response.bytes().await?;
            if !status.is_success() {
                let message = serde_json::from_slice::<Value>(&bytes)
                    .ok()
                    .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(String::from))
                    .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned());
                tracing::warn!(status = status.as_u16(), %message, "remote error");
                return Err(Error::Remote {
                    status: status.as_u16(),
                    message,
                });
            }
            let json: Value = serde_json::from_slice(&bytes)?;
            tracing::debug!(bytes = bytes.len(), "received response");
            Ok::<Value, Error>(json)
        }
        .instrument(span)
        .await
    }

    async fn request_audio(&self, body: Value) -> Result<String> {
        let json = self.generate_content(&self.speech_model, &body).await?;
        Self::extract_audio(&json).ok_or_else(|| {
            Error::generation_with_context(
                "no audio data received from the API",
                ErrorContext::new()
                    .with_source("gemini")
                    .with_details(finish_reason(&json)),
            )
        })
    }
}

fn finish_reason(body: &Value) -> String {
    body.pointer("/candidates/0/finishReason")
        .and_then(|r| r.as_str())
        .map(|r| format!("finish reason {}", r))
        .unwrap_or_else(|| "no candidates".to_string())
}

#[async_trait]
impl SpeechSynthesizer for GeminiClient {
    async fn synthesize(&self, text: &str, voice: Voice) -> Result<String> {
        let text = require_text(text, "text")?;
        let audio = self.request_audio(self.speech_body(text, voice)).await?;
        tracing::info!(voice = %voice, payload_len = audio.len(), "speech synthesized");
        Ok(audio)
    }

    async fn synthesize_dialogue(&self, script: &str, speakers: &[SpeakerVoice; 2]) -> Result<String> {
        let script = require_text(script, "dialogue")?;
        validate_speakers(speakers)?;
        let audio = self.request_audio(Self::dialogue_body(script, speakers)).await?;
        tracing::info!(
            first = %speakers[0].speaker,
            second = %speakers[1].speaker,
            payload_len = audio.len(),
            "dialogue synthesized"
        );
        Ok(audio)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let prompt = require_text(prompt, "prompt")?;
        let json = self
            .generate_content(&self.text_model, &Self::text_body(prompt))
            .await?;
        Self::extract_text(&json).ok_or_else(|| {
            Error::generation_with_context(
                "no text received from the API",
                ErrorContext::new()
                    .with_source("gemini")
                    .with_details(finish_reason(&json)),
            )
        })
    }
}

pub struct GeminiClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    speech_model: Option<String>,
    text_model: Option<String>,
    tone_prefix: Option<String>,
    timeout_secs: Option<u64>,
}

impl GeminiClientBuilder {
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: None,
            speech_model: None,
            text_model: None,
            tone_prefix: None,
            timeout_secs: None,
        }
    }

    /// Seed every field from a loaded configuration.
    pub fn from_config(config: &StudioConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: Some(config.base_url.clone()),
            speech_model: Some(config.speech_model.clone()),
            text_model: Some(config.text_model.clone()),
            tone_prefix: Some(config.tone_prefix.clone()),
            timeout_secs: config.timeout_secs,
        }
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
    pub fn speech_model(mut self, model: impl Into<String>) -> Self {
        self.speech_model = Some(model.into());
        self
    }
    pub fn text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = Some(model.into());
        self
    }
    pub fn tone_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tone_prefix = Some(prefix.into());
        self
    }
    /// Bound each request. Without this, requests wait indefinitely.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> Result<GeminiClient> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .or_else(|| std::env::var("API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::configuration_with_context(
                    "API key required",
                    ErrorContext::new()
                        .with_field_path("api_key")
                        .with_details("set GEMINI_API_KEY or API_KEY"),
                )
            })?;
        let raw_base = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        // Url::join drops the last path segment unless it ends with '/'.
        let base = if raw_base.ends_with('/') {
            raw_base
        } else {
            format!("{}/", raw_base)
        };
        let base_url = Url::parse(&base).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base url: {}", e),
                ErrorContext::new().with_field_path("base_url"),
            )
        })?;

        let mut http = reqwest::Client::builder();
        if let Some(secs) = self.timeout_secs {
            http = http.timeout(std::time::Duration::from_secs(secs));
        }
        let http_client = http
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(GeminiClient {
            http_client,
            base_url,
            api_key,
            speech_model: self
                .speech_model
                .unwrap_or_else(|| DEFAULT_SPEECH_MODEL.to_string()),
            text_model: self
                .text_model
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            tone_prefix: self
                .tone_prefix
                .unwrap_or_else(|| DEFAULT_TONE_PREFIX.to_string()),
        })
    }
}

impl Default for GeminiClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::builder()
            .api_key("test-key")
            .tone_prefix("Calmly: ")
            .build()
            .unwrap()
    }

    #[test]
    fn test_speech_body_shape() {
        let body = client().speech_body("Hello", Voice::Charon);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Calmly: Hello");
        assert_eq!(body["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            body["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Charon"
        );
    }

    #[test]
    fn test_dialogue_body_shape() {
        let speakers = [
            SpeakerVoice::new("Joe", Voice::Kore),
            SpeakerVoice::new("Jane", Voice::Puck),
        ];
        let body = GeminiClient::dialogue_body("Joe: Hi\nJane: Hey", &speakers);
        let configs = &body["generationConfig"]["speechConfig"]["multiSpeakerVoiceConfig"]["speakerVoiceConfigs"];
        assert_eq!(configs.as_array().unwrap().len(), 2);
        assert_eq!(configs[1]["speaker"], "Jane");
        assert_eq!(configs[1]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"], "Puck");
        assert!(body["generationConfig"]["speechConfig"].get("voiceConfig").is_none());
    }

    #[test]
    fn test_extract_audio_skips_non_audio_parts() {
        let body = serde_json::json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "ignored" },
                    { "inlineData": { "mimeType": "audio/L16;rate=24000", "data": "AAD/fw==" } }
                ]}
            }]
        });
        assert_eq!(GeminiClient::extract_audio(&body).as_deref(), Some("AAD/fw=="));
        assert!(GeminiClient::extract_audio(&serde_json::json!({ "candidates": [] })).is_none());
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "Once upon " }, { "text": "a time." }] } }]
        });
        assert_eq!(GeminiClient::extract_text(&body).as_deref(), Some("Once upon a time."));
        let empty = serde_json::json!({ "candidates": [{ "content": { "parts": [{ "text": "  " }] } }] });
        assert!(GeminiClient::extract_text(&empty).is_none());
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let c = GeminiClient::builder()
            .api_key("k")
            .base_url("http://localhost:8080/proxy")
            .build()
            .unwrap();
        assert_eq!(
            c.endpoint("gemini-2.5-flash").unwrap().as_str(),
            "http://localhost:8080/proxy/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = GeminiClient::builder().api_key("k").base_url("::nope").build();
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_empty_text_rejected_before_request() {
        // Unroutable base URL: any attempted request would surface as a transport error.
        let c = GeminiClient::builder()
            .api_key("k")
            .base_url("http://127.0.0.1:9")
            .build()
            .unwrap();
        let err = c.synthesize("   ", Voice::Kore).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        let err = c.generate_text("").await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
}
