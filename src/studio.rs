//! 应用控制器：串联生成、播放、导出，并记录用户可见的错误状态。
//!
//! Application controller.
//!
//! [`Studio`] owns the optional [`AudioSession`], the last generated payload and
//! the visible error state. Every operation is non-fatal: a failure sets
//! [`Studio::last_error`] and the studio stays ready for the next action.

use std::path::Path;

use crate::audio::{
    decode_base64, decode_pcm16, encode_wav, AudioSession, Effect, OutputSink, PlaybackReport, WavFile,
    WavSpec, SPEECH_CHANNELS, SPEECH_SAMPLE_RATE,
};
use crate::config::StudioConfig;
use crate::tts::{require_text, validate_speakers, GeminiClient, GeminiClientBuilder, SpeakerVoice, SpeechSynthesizer, TextGenerator, Voice};
use crate::{Error, Result};

/// A generated story and how it was played.
#[derive(Debug, Clone, PartialEq)]
pub struct Story {
    pub text: String,
    pub playback: PlaybackReport,
}

/// A generated two-speaker script and how it was played.
#[derive(Debug, Clone, PartialEq)]
pub struct Dialogue {
    pub script: String,
    pub playback: PlaybackReport,
}

pub fn story_prompt(topic: &str) -> String {
    format!(
        "Write a short story of about 150 words about: {}. \
         Return only the story text, written to be read aloud.",
        topic
    )
}

pub fn dialogue_prompt(topic: &str, speakers: &[SpeakerVoice; 2]) -> String {
    let (a, b) = (speakers[0].speaker.trim(), speakers[1].speaker.trim());
    format!(
        "Write a short, natural conversation between {a} and {b} about: {topic}. \
         Put every line on its own row formatted as 'Name: line', using only the names {a} and {b}. \
         Return only the conversation."
    )
}

pub struct Studio<B> {
    backend: B,
    config: StudioConfig,
    session: Option<AudioSession>,
    last_audio: Option<String>,
    last_error: Option<String>,
    loading: bool,
}

impl Studio<GeminiClient> {
    /// Studio backed by the Gemini API, configured from `config`.
    pub fn with_gemini(config: StudioConfig) -> Result<Self> {
        config.validate()?;
        let client = GeminiClientBuilder::from_config(&config).build()?;
        Ok(Self::new(client, config))
    }
}

impl<B> Studio<B>
where
    B: SpeechSynthesizer + TextGenerator,
{
    pub fn new(backend: B, config: StudioConfig) -> Self {
        Self {
            backend,
            config,
            session: None,
            last_audio: None,
            last_error: None,
            loading: false,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&AudioSession> {
        self.session.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn has_audio(&self) -> bool {
        self.last_audio.is_some()
    }

    pub fn last_audio(&self) -> Option<&str> {
        self.last_audio.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.is_closed())
    }

    /// First user interaction: open the output session and prepare the reverb kernel.
    ///
    /// Does nothing if a session is already active.
    pub fn activate(&mut self, sink: Box<dyn OutputSink>) -> Result<()> {
        if self.is_active() {
            return Ok(());
        }
        let session = AudioSession::open(self.config.sample_rate, sink)?;
        self.attach_session(session)
    }

    /// Use an already opened session (for example one with a seeded noise source).
    pub fn attach_session(&mut self, mut session: AudioSession) -> Result<()> {
        let result = session.reverb_kernel().map(|_| ());
        self.session = Some(session);
        self.record(result)
    }

    /// Close the session. The reverb kernel is discarded with it.
    pub fn deactivate(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }

    /// Narrate `text` with `voice` and play it.
    pub async fn speak(&mut self, text: &str, voice: Voice, effect: Effect) -> Result<PlaybackReport> {
        let result = self.speak_inner(text, voice, effect).await;
        self.record(result)
    }

    async fn speak_inner(&mut self, text: &str, voice: Voice, effect: Effect) -> Result<PlaybackReport> {
        let text = require_text(text, "text")?;
        self.ensure_ready()?;
        self.begin();
        let outcome = self.backend.synthesize(text, voice).await;
        self.loading = false;
        self.last_audio = Some(outcome?);
        self.play_stored(effect)
    }

    /// Generate a short story about `topic`, read it with `voice` and play it.
    pub async fn tell_story(&mut self, topic: &str, voice: Voice, effect: Effect) -> Result<Story> {
        let result = self.tell_story_inner(topic, voice, effect).await;
        self.record(result)
    }

    async fn tell_story_inner(&mut self, topic: &str, voice: Voice, effect: Effect) -> Result<Story> {
        let topic = require_text(topic, "prompt")?;
        self.ensure_ready()?;
        self.begin();
        let outcome = generate_story_audio(&self.backend, topic, voice).await;
        self.loading = false;
        let (text, audio) = outcome?;
        self.last_audio = Some(audio);
        let playback = self.play_stored(effect)?;
        Ok(Story { text, playback })
    }

    /// Generate a two-speaker conversation about `topic` and play it.
    pub async fn perform_dialogue(
        &mut self,
        topic: &str,
        speakers: &[SpeakerVoice; 2],
        effect: Effect,
    ) -> Result<Dialogue> {
        let result = self.perform_dialogue_inner(topic, speakers, effect).await;
        self.record(result)
    }

    async fn perform_dialogue_inner(
        &mut self,
        topic: &str,
        speakers: &[SpeakerVoice; 2],
        effect: Effect,
    ) -> Result<Dialogue> {
        let topic = require_text(topic, "prompt")?;
        validate_speakers(speakers)?;
        self.ensure_ready()?;
        self.begin();
        let outcome = generate_dialogue_audio(&self.backend, topic, speakers).await;
        self.loading = false;
        let (script, audio) = outcome?;
        self.last_audio = Some(audio);
        let playback = self.play_stored(effect)?;
        Ok(Dialogue { script, playback })
    }

    /// Play the stored payload again, with any effect.
    pub fn replay(&mut self, effect: Effect) -> Result<PlaybackReport> {
        let result = self.play_stored(effect);
        self.record(result)
    }

    /// WAV file for the stored payload (mono, 24 kHz, 16-bit).
    pub fn export_wav(&mut self) -> Result<WavFile> {
        let result = self.build_wav();
        self.record(result)
    }

    /// Write the stored payload to `path` as a WAV file.
    pub fn export_wav_to(&mut self, path: impl AsRef<Path>) -> Result<WavFile> {
        let result = self
            .build_wav()
            .and_then(|wav| wav.write_to(path.as_ref()).map(|_| wav));
        self.record(result)
    }

    fn build_wav(&self) -> Result<WavFile> {
        let payload = self.stored_payload()?;
        let bytes = decode_base64(payload).map_err(|e| Error::export(e.to_string()))?;
        let wav = encode_wav(&bytes, WavSpec::speech(SPEECH_SAMPLE_RATE))?;
        tracing::info!(bytes = wav.bytes().len(), file = wav.file_name(), "wav export ready");
        Ok(wav)
    }

    fn play_stored(&mut self, effect: Effect) -> Result<PlaybackReport> {
        let payload = self.stored_payload()?;
        let bytes = decode_base64(payload)?;
        let buffer = decode_pcm16(&bytes, SPEECH_SAMPLE_RATE, SPEECH_CHANNELS)?;
        let session = self
            .session
            .as_mut()
            .filter(|s| !s.is_closed())
            .ok_or_else(Error::device_not_ready)?;
        session.play(&buffer, effect)
    }

    fn stored_payload(&self) -> Result<&str> {
        self.last_audio
            .as_deref()
            .ok_or_else(|| Error::validation("Generate some audio first."))
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::device_not_ready())
        }
    }

    /// A new generation replaces the stored payload; sounds already playing are untouched.
    fn begin(&mut self) {
        self.loading = true;
        self.last_error = None;
        self.last_audio = None;
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        self.loading = false;
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => {
                tracing::warn!(error = %e, "studio action failed");
                self.last_error = Some(e.user_message());
            }
        }
        result
    }
}

// Only the backend is borrowed across awaits; the session need not be Sync.
async fn generate_story_audio<B>(backend: &B, topic: &str, voice: Voice) -> Result<(String, String)>
where
    B: SpeechSynthesizer + TextGenerator,
{
    let text = backend.generate_text(&story_prompt(topic)).await?;
    tracing::info!(chars = text.len(), "story generated");
    let audio = backend.synthesize(&text, voice).await?;
    Ok((text, audio))
}

async fn generate_dialogue_audio<B>(
    backend: &B,
    topic: &str,
    speakers: &[SpeakerVoice; 2],
) -> Result<(String, String)>
where
    B: SpeechSynthesizer + TextGenerator,
{
    let script = backend.generate_text(&dialogue_prompt(topic, speakers)).await?;
    tracing::info!(lines = script.lines().count(), "dialogue script generated");
    let audio = backend.synthesize_dialogue(&script, speakers).await?;
    Ok((script, audio))
}
