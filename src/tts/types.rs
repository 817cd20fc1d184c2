//! TTS (Text-to-Speech) types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, ErrorContext, Result};

/// Prebuilt voices offered by the speech service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Voice {
    #[default]
    Kore,
    Puck,
    Charon,
    Fenrir,
    Zephyr,
}

impl Voice {
    pub const ALL: [Voice; 5] = [
        Voice::Kore,
        Voice::Puck,
        Voice::Charon,
        Voice::Fenrir,
        Voice::Zephyr,
    ];

    /// Identifier sent to the service as `voiceName`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kore => "Kore",
            Self::Puck => "Puck",
            Self::Charon => "Charon",
            Self::Fenrir => "Fenrir",
            Self::Zephyr => "Zephyr",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Kore => "Clear female voice",
            Self::Puck => "Friendly male voice",
            Self::Charon => "Formal male voice",
            Self::Fenrir => "Deep, engaging voice",
            Self::Zephyr => "Calm, soothing voice",
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Voice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                Error::validation_with_context(
                    format!("unknown voice '{}'", wanted),
                    ErrorContext::new()
                        .with_field_path("voice")
                        .with_details("expected one of: Kore, Puck, Charon, Fenrir, Zephyr"),
                )
            })
    }
}

/// A named speaker in a dialogue and the voice that reads their lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerVoice {
    pub speaker: String,
    pub voice: Voice,
}

impl SpeakerVoice {
    pub fn new(speaker: impl Into<String>, voice: Voice) -> Self {
        Self {
            speaker: speaker.into(),
            voice,
        }
    }
}

/// Parse `Name=Voice` as used on the command line.
impl FromStr for SpeakerVoice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (speaker, voice) = s.split_once('=').ok_or_else(|| {
            Error::validation(format!("expected SPEAKER=VOICE, got '{}'", s))
        })?;
        let speaker = speaker.trim();
        if speaker.is_empty() {
            return Err(Error::validation("speaker name must not be empty"));
        }
        Ok(Self::new(speaker, voice.parse()?))
    }
}

/// Check a pair of dialogue speakers: both named, names distinct.
pub fn validate_speakers(speakers: &[SpeakerVoice; 2]) -> Result<()> {
    for (i, s) in speakers.iter().enumerate() {
        if s.speaker.trim().is_empty() {
            return Err(Error::validation_with_context(
                "speaker name must not be empty",
                ErrorContext::new().with_field_path(format!("speakers[{}].speaker", i)),
            ));
        }
    }
    if speakers[0].speaker.trim() == speakers[1].speaker.trim() {
        return Err(Error::validation("the two speakers need different names"));
    }
    Ok(())
}
