use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "config.api_key", "payload[3]")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected value, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "gemini", "wav_encoder", "audio_session")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the speech studio.
///
/// Every variant is non-fatal to a running [`Studio`](crate::Studio): the controller
/// records [`Error::user_message`] and stays ready for the next action.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Audio output not ready: {message}")]
    DeviceNotReady { message: String },

    #[error("Generation error: {message}{}", format_context(.context))]
    Generation {
        message: String,
        context: ErrorContext,
    },

    #[error("Decode error: {message}{}", format_context(.context))]
    Decode {
        message: String,
        context: ErrorContext,
    },

    #[error("Playback error: {message}{}", format_context(.context))]
    Playback {
        message: String,
        context: ErrorContext,
    },

    #[error("Export error: {message}{}", format_context(.context))]
    Export {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Remote error: HTTP {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

pub(crate) const MSG_DEVICE_NOT_READY: &str =
    "Audio output is not active. Click anywhere on the page (or activate the studio) first.";
const MSG_GENERATION_FAILED: &str = "Failed to generate audio. Please try again.";
const MSG_PLAYBACK_FAILED: &str = "Failed to play audio. The data may be invalid.";
const MSG_EXPORT_FAILED: &str = "Failed to create the download file.";

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::validation_with_context(msg, ErrorContext::new())
    }

    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    pub fn device_not_ready() -> Self {
        Error::DeviceNotReady {
            message: MSG_DEVICE_NOT_READY.to_string(),
        }
    }

    pub fn generation(msg: impl Into<String>) -> Self {
        Self::generation_with_context(msg, ErrorContext::new())
    }

    pub fn generation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Generation {
            message: msg.into(),
            context,
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::decode_with_context(msg, ErrorContext::new())
    }

    pub fn decode_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Decode {
            message: msg.into(),
            context,
        }
    }

    pub fn playback(msg: impl Into<String>) -> Self {
        Self::playback_with_context(msg, ErrorContext::new())
    }

    pub fn playback_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Playback {
            message: msg.into(),
            context,
        }
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Error::Export {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::configuration_with_context(msg, ErrorContext::new())
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Validation { context, .. }
            | Error::Generation { context, .. }
            | Error::Decode { context, .. }
            | Error::Playback { context, .. }
            | Error::Export { context, .. }
            | Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Text suitable for showing to the person who triggered the action.
    ///
    /// Validation and configuration messages pass through unchanged; every other
    /// kind collapses to a generic message for its category.
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { message, .. } | Error::Configuration { message, .. } => {
                message.clone()
            }
            Error::DeviceNotReady { message } => message.clone(),
            Error::Generation { .. } | Error::Remote { .. } | Error::Transport(_) => {
                MSG_GENERATION_FAILED.to_string()
            }
            Error::Decode { .. } | Error::Playback { .. } => MSG_PLAYBACK_FAILED.to_string(),
            Error::Export { .. } | Error::Io(_) => MSG_EXPORT_FAILED.to_string(),
            Error::Serialization(e) => format!("Invalid data: {}", e),
        }
    }
}
