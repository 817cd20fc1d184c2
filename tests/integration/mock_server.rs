//! Mock HTTP server setup for integration tests

use mockito::{Matcher, Mock, Server, ServerGuard};
use speech_studio::GeminiClient;

pub const TEST_API_KEY: &str = "test-key";
pub const SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const TEXT_MODEL: &str = "gemini-2.5-flash";

/// Test fixture that manages a mock Gemini server
pub struct MockServerFixture {
    pub server: ServerGuard,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self { server, base_url }
    }

    /// Create a client pointed at the mock server
    pub fn client(&self) -> GeminiClient {
        GeminiClient::builder()
            .api_key(TEST_API_KEY)
            .base_url(&self.base_url)
            .tone_prefix("Say warmly: ")
            .timeout_secs(10)
            .build()
            .expect("client should build")
    }

    pub fn path(model: &str) -> String {
        format!("/v1beta/models/{}:generateContent", model)
    }

    /// Mock a generateContent call for `model` whose request body matches `body`
    pub async fn mock_generate(&mut self, model: &str, body: Matcher, status: usize, response: &str) -> Mock {
        self.server
            .mock("POST", Self::path(model).as_str())
            .match_header("x-goog-api-key", TEST_API_KEY)
            .match_body(body)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(response)
            .create_async()
            .await
    }

    /// Mock a successful speech response carrying `audio` as inline data
    pub async fn mock_audio(&mut self, body: Matcher, audio: &str) -> Mock {
        let response = serde_json::json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "inlineData": { "mimeType": "audio/L16;codec=pcm;rate=24000", "data": audio } }]
                },
                "finishReason": "STOP"
            }]
        });
        self.mock_generate(SPEECH_MODEL, body, 200, &response.to_string())
            .await
    }

    /// Mock a successful text response
    pub async fn mock_text(&mut self, body: Matcher, text: &str) -> Mock {
        let response = serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        });
        self.mock_generate(TEXT_MODEL, body, 200, &response.to_string())
            .await
    }
}
