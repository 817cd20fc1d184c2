//! Synthetic reverb impulse response.

use rand::Rng;

use super::pcm::AudioBuffer;
use crate::Result;

/// Length of the generated impulse response in seconds.
pub const REVERB_DURATION_SECS: f64 = 1.5;
/// Exponent of the `(1 - t)^decay` envelope.
pub const REVERB_DECAY: f64 = 2.5;
const REVERB_CHANNELS: usize = 2;

/// A stereo decaying-noise impulse response used as a convolution kernel.
///
/// Left and right channels are drawn independently so the tail sounds wide.
#[derive(Debug, Clone, PartialEq)]
pub struct ReverbKernel {
    buffer: AudioBuffer,
}

impl ReverbKernel {
    /// Generate a kernel for `sample_rate` using `rng` as the noise source.
    pub fn generate<R: Rng + ?Sized>(sample_rate: u32, rng: &mut R) -> Result<Self> {
        let length = kernel_length(sample_rate);
        let mut channels = vec![Vec::with_capacity(length); REVERB_CHANNELS];
        for i in 0..length {
            let env = envelope(i, length);
            for channel in channels.iter_mut() {
                channel.push(rng.gen_range(-1.0f32..1.0) * env);
            }
        }
        let buffer = AudioBuffer::from_channels(sample_rate, channels)?;
        tracing::debug!(sample_rate, frames = length, "generated reverb kernel");
        Ok(Self { buffer })
    }

    pub fn generate_with_thread_rng(sample_rate: u32) -> Result<Self> {
        Self::generate(sample_rate, &mut rand::thread_rng())
    }

    /// Use a recorded or hand-built impulse response instead of generated noise.
    pub fn from_buffer(buffer: AudioBuffer) -> Self {
        Self { buffer }
    }

    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    pub fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate()
    }

    pub fn frames(&self) -> usize {
        self.buffer.frames()
    }
}

/// Number of frames in a kernel generated at `sample_rate`.
pub fn kernel_length(sample_rate: u32) -> usize {
    (sample_rate as f64 * REVERB_DURATION_SECS).round() as usize
}

/// Decay envelope at frame `i` of a kernel `length` frames long.
pub fn envelope(i: usize, length: usize) -> f32 {
    (1.0 - i as f64 / length as f64).powf(REVERB_DECAY) as f32
}
