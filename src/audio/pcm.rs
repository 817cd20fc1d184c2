//! PCM 帧解码：16 位小端有符号 PCM 与归一化浮点采样之间的转换。
//!
//! 16-bit signed little-endian PCM framing and the playable buffer type.

use crate::{Error, ErrorContext, Result};

/// Divisor that maps `i16` onto `[-1.0, 1.0)`.
const I16_SCALE: f32 = 32768.0;

/// Per-channel normalized samples plus the metadata needed to play them.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Build a buffer from planar channel data.
    ///
    /// All channels must have the same length and there must be at least one.
    pub fn from_channels(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::decode("sample rate must be greater than 0"));
        }
        let Some(first) = channels.first() else {
            return Err(Error::decode("audio buffer needs at least one channel"));
        };
        let frames = first.len();
        if let Some(idx) = channels.iter().position(|c| c.len() != frames) {
            return Err(Error::decode_with_context(
                "channel lengths differ",
                ErrorContext::new()
                    .with_field_path(format!("channels[{}]", idx))
                    .with_details(format!("expected {} frames", frames)),
            ));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// A silent buffer of the given shape.
    pub fn silent(sample_rate: u32, channel_count: usize, frames: usize) -> Result<Self> {
        Self::from_channels(sample_rate, vec![vec![0.0; frames]; channel_count])
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Frames per channel.
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Average of all channels, frame by frame.
    pub fn downmix(&self) -> Vec<f32> {
        downmix(&self.channels)
    }

    /// Largest absolute sample value across all channels.
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Interleave and quantize back to 16-bit little-endian PCM.
    ///
    /// Samples outside `[-1.0, 1.0]` are clipped.
    pub fn to_pcm16_bytes(&self) -> Vec<u8> {
        let frames = self.frames();
        let mut out = Vec::with_capacity(frames * self.channels.len() * 2);
        for i in 0..frames {
            for channel in &self.channels {
                let scaled = (channel[i] * I16_SCALE).round().clamp(i16::MIN as f32, i16::MAX as f32);
                out.extend_from_slice(&(scaled as i16).to_le_bytes());
            }
        }
        out
    }
}

/// Frame-by-frame average of equally long planar channels.
pub(crate) fn downmix(channels: &[Vec<f32>]) -> Vec<f32> {
    match channels {
        [] => Vec::new(),
        [only] => only.clone(),
        _ => {
            let n = channels.len() as f32;
            (0..channels[0].len())
                .map(|i| channels.iter().map(|c| c[i]).sum::<f32>() / n)
                .collect()
        }
    }
}

/// Interpret `bytes` as interleaved 16-bit LE PCM and normalize it.
///
/// A trailing odd byte is ignored, and samples that do not fill a whole frame
/// are dropped (`frames = samples / channels`).
pub fn decode_pcm16(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<AudioBuffer> {
    if channels == 0 {
        return Err(Error::decode_with_context(
            "channel count must be greater than 0",
            ErrorContext::new().with_field_path("channels").with_source("pcm"),
        ));
    }
    let channel_count = channels as usize;
    let samples: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let frames = samples.len() / channel_count;

    let mut planar = vec![Vec::with_capacity(frames); channel_count];
    for (c, channel) in planar.iter_mut().enumerate() {
        channel.extend((0..frames).map(|i| samples[i * channel_count + c] as f32 / I16_SCALE));
    }
    AudioBuffer::from_channels(sample_rate, planar)
}
