//! The audio output session: one owned object instead of ambient global state.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use uuid::Uuid;

use super::encoding::decode_base64;
use super::graph::{render, Effect, SignalPath};
use super::pcm::{decode_pcm16, AudioBuffer};
use super::reverb::ReverbKernel;
use super::sink::OutputSink;
use crate::{Error, ErrorContext, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Suspended,
    Closed,
}

/// Summary of one playback handed to the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackReport {
    pub effect: Effect,
    pub input_frames: usize,
    pub output_frames: usize,
    pub output_channels: usize,
    pub duration_secs: f64,
}

/// An active output session.
///
/// Created on the first user interaction and torn down with [`close`](Self::close).
/// The reverb kernel is generated lazily, cached for the session's lifetime and
/// dropped with it.
pub struct AudioSession {
    id: Uuid,
    sample_rate: u32,
    state: SessionState,
    sink: Box<dyn OutputSink>,
    reverb: Option<ReverbKernel>,
    rng: Box<dyn RngCore + Send>,
    playbacks: usize,
}

impl AudioSession {
    pub fn open(sample_rate: u32, sink: Box<dyn OutputSink>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::configuration_with_context(
                "session sample rate must be greater than 0",
                ErrorContext::new().with_field_path("sample_rate"),
            ));
        }
        let id = Uuid::new_v4();
        tracing::info!(session = %id, sample_rate, sink = sink.name(), "audio session opened");
        Ok(Self {
            id,
            sample_rate,
            state: SessionState::Running,
            sink,
            reverb: None,
            rng: Box::new(StdRng::from_entropy()),
            playbacks: 0,
        })
    }

    /// Replace the noise source used for the reverb kernel.
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn playbacks(&self) -> usize {
        self.playbacks
    }

    pub fn has_reverb_kernel(&self) -> bool {
        self.reverb.is_some()
    }

    pub fn suspend(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.state = SessionState::Suspended;
        tracing::debug!(session = %self.id, "audio session suspended");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.state == SessionState::Suspended {
            self.state = SessionState::Running;
            tracing::debug!(session = %self.id, "audio session resumed");
        }
        Ok(())
    }

    /// Tear the session down. The cached kernel goes with it.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.state = SessionState::Closed;
            self.reverb = None;
            tracing::info!(session = %self.id, playbacks = self.playbacks, "audio session closed");
        }
    }

    /// The session's reverb kernel, generating it on first use.
    pub fn reverb_kernel(&mut self) -> Result<&ReverbKernel> {
        self.ensure_open()?;
        if self.reverb.is_none() {
            let kernel = ReverbKernel::generate(self.sample_rate, &mut *self.rng)?;
            self.reverb = Some(kernel);
        }
        self.reverb
            .as_ref()
            .ok_or_else(|| Error::playback("reverb kernel unavailable"))
    }

    /// Route `buffer` through `effect` to the sink. Playback starts immediately.
    pub fn play(&mut self, buffer: &AudioBuffer, effect: Effect) -> Result<PlaybackReport> {
        self.ensure_open()?;
        if self.state == SessionState::Suspended {
            self.resume()?;
        }
        if buffer.sample_rate() != self.sample_rate {
            return Err(Error::playback_with_context(
                format!(
                    "buffer sample rate {} does not match session rate {}",
                    buffer.sample_rate(),
                    self.sample_rate
                ),
                ErrorContext::new().with_source("audio_session"),
            ));
        }

        let path = SignalPath::for_effect(effect);
        if path.needs_kernel() {
            self.reverb_kernel()?;
        }
        let rendered = render(&path, buffer, self.reverb.as_ref())?;
        self.sink.play(&rendered)?;
        self.playbacks += 1;

        let report = PlaybackReport {
            effect,
            input_frames: buffer.frames(),
            output_frames: rendered.frames(),
            output_channels: rendered.channel_count(),
            duration_secs: rendered.duration_secs(),
        };
        tracing::info!(
            session = %self.id,
            effect = %effect,
            frames = report.output_frames,
            channels = report.output_channels,
            "playback started"
        );
        Ok(report)
    }

    /// Decode a base64 mono PCM payload at the session rate and play it.
    pub fn play_payload(&mut self, payload: &str, effect: Effect) -> Result<PlaybackReport> {
        let bytes = decode_base64(payload)?;
        let buffer = decode_pcm16(&bytes, self.sample_rate, 1)?;
        self.play(&buffer, effect)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::device_not_ready());
        }
        Ok(())
    }
}

impl std::fmt::Debug for AudioSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSession")
            .field("id", &self.id)
            .field("sample_rate", &self.sample_rate)
            .field("state", &self.state)
            .field("sink", &self.sink.name())
            .field("has_reverb_kernel", &self.reverb.is_some())
            .field("playbacks", &self.playbacks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encoding::encode_base64;
    use crate::audio::sink::MemorySink;

    fn session(sink: &MemorySink) -> AudioSession {
        AudioSession::open(1000, Box::new(sink.clone()))
            .unwrap()
            .with_rng(StdRng::seed_from_u64(5))
    }

    #[test]
    fn test_kernel_is_lazy_and_cached() {
        let sink = MemorySink::new();
        let mut s = session(&sink);
        assert!(!s.has_reverb_kernel());
        let first = s.reverb_kernel().unwrap().clone();
        assert_eq!(first.frames(), 1500);
        let second = s.reverb_kernel().unwrap().clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_close_drops_kernel_and_rejects_playback() {
        let sink = MemorySink::new();
        let mut s = session(&sink);
        s.reverb_kernel().unwrap();
        s.close();
        assert!(!s.has_reverb_kernel());
        let buf = AudioBuffer::silent(1000, 1, 10).unwrap();
        assert!(matches!(s.play(&buf, Effect::None), Err(Error::DeviceNotReady { .. })));
        assert!(matches!(s.resume(), Err(Error::DeviceNotReady { .. })));
        assert_eq!(sink.play_count(), 0);
    }

    #[test]
    fn test_play_resumes_suspended_session() {
        let sink = MemorySink::new();
        let mut s = session(&sink);
        s.suspend().unwrap();
        let buf = AudioBuffer::silent(1000, 1, 10).unwrap();
        s.play(&buf, Effect::None).unwrap();
        assert_eq!(s.state(), SessionState::Running);
        assert_eq!(sink.play_count(), 1);
    }

    #[test]
    fn test_reverb_playback_generates_kernel() {
        let sink = MemorySink::new();
        let mut s = session(&sink);
        let buf = AudioBuffer::from_channels(1000, vec![vec![1.0, 0.0, 0.0]]).unwrap();
        let report = s.play(&buf, Effect::Reverb).unwrap();
        assert!(s.has_reverb_kernel());
        assert_eq!(report.output_channels, 2);
        assert_eq!(report.output_frames, 3 + 1500 - 1);
    }

    #[test]
    fn test_overlapping_playbacks_are_independent() {
        let sink = MemorySink::new();
        let mut s = session(&sink);
        let buf = AudioBuffer::silent(1000, 1, 10).unwrap();
        s.play(&buf, Effect::None).unwrap();
        s.play(&buf, Effect::Echo).unwrap();
        assert_eq!(s.playbacks(), 2);
        assert_eq!(sink.play_count(), 2);
    }

    #[test]
    fn test_sample_rate_mismatch_rejected() {
        let sink = MemorySink::new();
        let mut s = session(&sink);
        let buf = AudioBuffer::silent(24000, 1, 10).unwrap();
        assert!(matches!(s.play(&buf, Effect::None), Err(Error::Playback { .. })));
    }

    #[test]
    fn test_play_payload_decodes_mono() {
        let sink = MemorySink::new();
        let mut s = session(&sink);
        let report = s
            .play_payload(&encode_base64(&[0x00, 0x00, 0xFF, 0x7F]), Effect::None)
            .unwrap();
        assert_eq!(report.input_frames, 2);
        assert!(matches!(
            s.play_payload("not base64!", Effect::None),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        assert!(AudioSession::open(0, Box::new(MemorySink::new())).is_err());
    }
}
