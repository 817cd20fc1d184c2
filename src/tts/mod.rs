//! TTS（文字转语音）模块：通过 Gemini API 合成语音与生成文本。
//!
//! The remote collaborators sit behind two traits so the studio can be driven
//! by a fake in tests; [`GeminiClient`] implements both over HTTP.

mod client;
mod types;

use async_trait::async_trait;

pub use client::{GeminiClient, GeminiClientBuilder};
pub use types::{validate_speakers, SpeakerVoice, Voice};

use crate::{Error, ErrorContext, Result};

/// Synthesizes speech; returns a base64 mono 16-bit PCM payload at 24 kHz.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: Voice) -> Result<String>;

    /// Read a two-speaker script, each speaker with their own voice.
    async fn synthesize_dialogue(&self, script: &str, speakers: &[SpeakerVoice; 2]) -> Result<String>;
}

/// Generates text from a natural-language prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String>;
}

/// Reject empty or whitespace-only input before any remote call.
pub fn require_text<'a>(text: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::validation_with_context(
            format!("Please enter some {} to convert.", field),
            ErrorContext::new().with_field_path(field),
        ));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("  hi \n", "text").unwrap(), "hi");
        let err = require_text(" \t\n", "text").unwrap_err();
        assert_eq!(err.user_message(), "Please enter some text to convert.");
        assert!(require_text("", "prompt").is_err());
    }

    struct Echoing;

    #[async_trait]
    impl TextGenerator for Echoing {
        async fn generate_text(&self, prompt: &str) -> Result<String> {
            Ok(require_text(prompt, "prompt")?.to_uppercase())
        }
    }

    #[test]
    fn test_text_generator_as_trait_object() {
        let generator: Box<dyn TextGenerator> = Box::new(Echoing);
        let text = tokio_test::block_on(generator.generate_text(" once upon a time ")).unwrap();
        assert_eq!(text, "ONCE UPON A TIME");
        assert!(tokio_test::block_on(generator.generate_text("")).is_err());
    }
}
