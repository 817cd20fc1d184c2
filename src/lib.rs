//! # speech-studio
//!
//! 文字转语音工作室：单人朗读、AI 生成故事、双人对话，支持音效播放与 WAV 导出。
//!
//! Text-to-speech studio built on the Gemini API: single-voice narration,
//! AI-generated short stories read aloud and two-speaker dialogues, with
//! playback effects (reverb, echo) and WAV export.
//!
//! ## Overview
//!
//! The remote service returns speech as a base64 payload of 16-bit mono PCM at
//! 24 kHz. This crate decodes it, routes it through an optional effect into an
//! [`audio::OutputSink`], and wraps the raw PCM in a WAV container for download.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use speech_studio::audio::{Effect, WavFileSink};
//! use speech_studio::{Studio, StudioConfig, Voice};
//!
//! #[tokio::main]
//! async fn main() -> speech_studio::Result<()> {
//!     let mut studio = Studio::with_gemini(StudioConfig::from_env()?)?;
//!     studio.activate(Box::new(WavFileSink::new("renders")?))?;
//!
//!     studio.speak("Hello there!", Voice::Kore, Effect::Echo).await?;
//!     studio.export_wav_to("speech.wav")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`audio`] | Base64/PCM decoding, WAV encoding, reverb kernel, effect graph, sinks, session |
//! | [`tts`] | Remote collaborator traits and the Gemini client |
//! | [`studio`] | Application controller with visible error state |
//! | [`config`] | YAML + environment configuration |

pub mod audio;
pub mod config;
pub mod studio;
pub mod tts;

pub use audio::{AudioBuffer, AudioSession, Effect, WavFile};
pub use config::StudioConfig;
pub use studio::{Dialogue, Story, Studio};
pub use tts::{GeminiClient, GeminiClientBuilder, SpeakerVoice, SpeechSynthesizer, TextGenerator, Voice};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
