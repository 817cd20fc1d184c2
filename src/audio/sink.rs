//! Output sinks: where rendered playbacks end up.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::pcm::AudioBuffer;
use super::wav::{encode_wav, WavSpec};
use crate::{Error, ErrorContext, Result};

/// Destination for rendered audio.
///
/// `play` is called once per playback and must return promptly; every call is
/// an independent source, so overlapping playbacks are simply delivered in turn.
pub trait OutputSink: Send {
    fn play(&mut self, rendered: &AudioBuffer) -> Result<()>;

    fn name(&self) -> &str;
}

/// Sink that keeps every rendered buffer in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    played: Arc<Mutex<Vec<AudioBuffer>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything played so far. Clones share the same log.
    pub fn played(&self) -> Vec<AudioBuffer> {
        self.played
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    pub fn play_count(&self) -> usize {
        self.played.lock().map(|log| log.len()).unwrap_or(0)
    }
}

impl OutputSink for MemorySink {
    fn play(&mut self, rendered: &AudioBuffer) -> Result<()> {
        let mut log = self
            .played
            .lock()
            .map_err(|_| Error::playback("memory sink lock poisoned"))?;
        log.push(rendered.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Sink that writes each playback as a numbered 16-bit WAV file.
#[derive(Debug)]
pub struct WavFileSink {
    dir: PathBuf,
    next_index: usize,
    written: Vec<PathBuf>,
}

impl WavFileSink {
    /// Create the sink, creating `dir` if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot create render directory: {}", e),
                ErrorContext::new().with_field_path(dir.display().to_string()),
            )
        })?;
        Ok(Self {
            dir,
            next_index: 1,
            written: Vec::new(),
        })
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl OutputSink for WavFileSink {
    fn play(&mut self, rendered: &AudioBuffer) -> Result<()> {
        let channels = u16::try_from(rendered.channel_count()).map_err(|_| {
            Error::playback_with_context(
                format!("{} channels do not fit a WAV file", rendered.channel_count()),
                ErrorContext::new().with_source("wav_file_sink"),
            )
        })?;
        let spec = WavSpec {
            channels,
            sample_rate: rendered.sample_rate(),
            bits_per_sample: 16,
        };
        let wav = encode_wav(&rendered.to_pcm16_bytes(), spec)?;
        let path = self.dir.join(format!("playback-{:03}.wav", self.next_index));
        wav.write_to(&path).map_err(|e| Error::playback(e.to_string()))?;
        tracing::info!(path = %path.display(), secs = rendered.duration_secs(), "rendered playback");
        self.next_index += 1;
        self.written.push(path);
        Ok(())
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}
