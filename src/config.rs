//! Studio configuration: YAML file, environment overrides, defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audio::{Effect, SPEECH_SAMPLE_RATE};
use crate::tts::Voice;
use crate::{Error, ErrorContext, Result};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TONE_PREFIX: &str = "Say in a natural, friendly tone: ";

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub speech_model: String,
    pub text_model: String,
    /// Unset means requests wait as long as the service takes.
    pub timeout_secs: Option<u64>,
    /// Instruction prepended to single-voice narration.
    pub tone_prefix: String,
    pub sample_rate: u32,
    pub default_voice: Voice,
    pub default_effect: Effect,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            speech_model: DEFAULT_SPEECH_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            timeout_secs: None,
            tone_prefix: DEFAULT_TONE_PREFIX.to_string(),
            sample_rate: SPEECH_SAMPLE_RATE,
            default_voice: Voice::default(),
            default_effect: Effect::default(),
        }
    }
}

impl std::fmt::Debug for StudioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudioConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("speech_model", &self.speech_model)
            .field("text_model", &self.text_model)
            .field("timeout_secs", &self.timeout_secs)
            .field("tone_prefix", &self.tone_prefix)
            .field("sample_rate", &self.sample_rate)
            .field("default_voice", &self.default_voice)
            .field("default_effect", &self.default_effect)
            .finish()
    }
}

impl StudioConfig {
    /// Load a YAML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read config file: {}", e),
                ErrorContext::new().with_field_path(path.display().to_string()),
            )
        })?;
        let config = Self::from_yaml(&raw)?.with_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid config: {}", e),
                ErrorContext::new().with_source("config"),
            )
        })
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self> {
        let config = Self::default().with_env();
        config.validate()?;
        Ok(config)
    }

    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (an environment-like key/value source).
    ///
    /// `GEMINI_API_KEY` wins over `API_KEY`; a key already set in the file is
    /// only replaced when one of them is present.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(url) = non_empty("SPEECH_STUDIO_BASE_URL") {
            self.base_url = url;
        }
        if let Some(model) = non_empty("SPEECH_STUDIO_SPEECH_MODEL") {
            self.speech_model = model;
        }
        if let Some(model) = non_empty("SPEECH_STUDIO_TEXT_MODEL") {
            self.text_model = model;
        }
        if let Some(secs) = non_empty("SPEECH_STUDIO_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok()) {
            self.timeout_secs = Some(secs);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        // Payloads are never resampled, so the session must run at their rate.
        if self.sample_rate != SPEECH_SAMPLE_RATE {
            return Err(Error::configuration_with_context(
                format!("sample rate {} is not supported", self.sample_rate),
                ErrorContext::new()
                    .with_field_path("sample_rate")
                    .with_details(format!("speech payloads are {} Hz", SPEECH_SAMPLE_RATE)),
            ));
        }
        url::Url::parse(&self.base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base url: {}", e),
                ErrorContext::new().with_field_path("base_url"),
            )
        })?;
        if self.speech_model.trim().is_empty() || self.text_model.trim().is_empty() {
            return Err(Error::configuration("model names must not be empty"));
        }
        Ok(())
    }
}
