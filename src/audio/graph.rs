//! 播放信号图：把效果选择描述为有序处理阶段，并离线渲染。
//!
//! Playback graph construction.
//!
//! An [`Effect`] is first turned into a declarative [`SignalPath`] (an ordered
//! list of [`Stage`]s) and then executed by [`render`]. Keeping the wiring as
//! data means effect routing is testable without any output device.

use std::fmt;
use std::str::FromStr;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};

use super::pcm::{downmix, AudioBuffer};
use super::reverb::ReverbKernel;
use crate::{Error, ErrorContext, Result};

/// Delay between echo repeats.
pub const ECHO_DELAY_SECS: f64 = 0.4;
/// Attenuation applied on every pass through the echo feedback loop.
pub const ECHO_FEEDBACK_GAIN: f32 = 0.5;
/// The echo tail is rendered until repeats fall below this level (-60 dB).
const ECHO_TAIL_FLOOR: f32 = 1.0e-3;

// Convolver normalization constants (RMS power normalization, -58 dB calibration
// referenced to 44.1 kHz).
const GAIN_CALIBRATION: f32 = 0.001_258_925_4;
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44100.0;
const MIN_POWER: f32 = 0.000_125;

/// Effect applied to a playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    #[default]
    None,
    Reverb,
    Echo,
}

impl Effect {
    pub const ALL: [Effect; 3] = [Effect::None, Effect::Reverb, Effect::Echo];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Reverb => "reverb",
            Self::Echo => "echo",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "No effect",
            Self::Reverb => "Wide reverb",
            Self::Echo => "Echo",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Effect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "reverb" => Ok(Self::Reverb),
            "echo" => Ok(Self::Echo),
            other => Err(Error::validation_with_context(
                format!("unknown effect '{}'", other),
                ErrorContext::new()
                    .with_field_path("effect")
                    .with_details("expected one of: none, reverb, echo"),
            )),
        }
    }
}

/// One processing step in a signal path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage {
    /// Load the input buffer; it is also kept as the dry signal.
    Source,
    /// Convolve with the session's reverb kernel, replacing the signal with the wet output.
    Convolve,
    /// Feedback delay line; replaces the signal with the delay-line output.
    FeedbackDelay { delay_secs: f64, feedback_gain: f32 },
    /// Sum the dry signal back in.
    MixDry,
    /// Deliver to the output sink.
    Sink,
}

/// Ordered description of how a buffer reaches the output.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalPath {
    stages: Vec<Stage>,
}

impl SignalPath {
    /// Validate and wrap a custom stage list.
    ///
    /// The path must start with [`Stage::Source`], end with [`Stage::Sink`] and
    /// contain neither in between. Feedback delays must be stable.
    pub fn new(stages: Vec<Stage>) -> Result<Self> {
        let invalid = |msg: &str| {
            Error::playback_with_context(msg, ErrorContext::new().with_source("signal_path"))
        };
        if stages.first() != Some(&Stage::Source) {
            return Err(invalid("signal path must start at the source"));
        }
        if stages.len() < 2 || stages.last() != Some(&Stage::Sink) {
            return Err(invalid("signal path must end at the sink"));
        }
        let inner = &stages[1..stages.len() - 1];
        if inner.iter().any(|s| matches!(s, Stage::Source | Stage::Sink)) {
            return Err(invalid("source and sink may only appear at the ends"));
        }
        for stage in inner {
            if let Stage::FeedbackDelay {
                delay_secs,
                feedback_gain,
            } = *stage
            {
                check_feedback_delay(delay_secs, feedback_gain)?;
            }
        }
        Ok(Self { stages })
    }

    /// The canned wiring for each effect.
    pub fn for_effect(effect: Effect) -> Self {
        let stages = match effect {
            Effect::None => vec![Stage::Source, Stage::Sink],
            Effect::Reverb => vec![Stage::Source, Stage::Convolve, Stage::Sink],
            Effect::Echo => vec![
                Stage::Source,
                Stage::FeedbackDelay {
                    delay_secs: ECHO_DELAY_SECS,
                    feedback_gain: ECHO_FEEDBACK_GAIN,
                },
                Stage::MixDry,
                Stage::Sink,
            ],
        };
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn needs_kernel(&self) -> bool {
        self.stages.contains(&Stage::Convolve)
    }
}

fn check_feedback_delay(delay_secs: f64, feedback_gain: f32) -> Result<()> {
    if !delay_secs.is_finite() || delay_secs <= 0.0 {
        return Err(Error::playback_with_context(
            format!("echo delay must be positive, got {}", delay_secs),
            ErrorContext::new().with_field_path("delay_secs"),
        ));
    }
    // A loop gain of 1 or more never decays.
    if !feedback_gain.is_finite() || !(0.0..1.0).contains(&feedback_gain) {
        return Err(Error::playback_with_context(
            format!("feedback gain {} would make the echo loop unstable", feedback_gain),
            ErrorContext::new()
                .with_field_path("feedback_gain")
                .with_details("expected 0.0 <= gain < 1.0"),
        ));
    }
    Ok(())
}

/// Execute `path` over `input`.
///
/// `kernel` is required when the path contains [`Stage::Convolve`]; passing
/// `None` there is a caller error.
pub fn render(path: &SignalPath, input: &AudioBuffer, kernel: Option<&ReverbKernel>) -> Result<AudioBuffer> {
    let sample_rate = input.sample_rate();
    let dry = input.channels().to_vec();
    let mut signal = dry.clone();

    for stage in path.stages() {
        match *stage {
            Stage::Source | Stage::Sink => {}
            Stage::Convolve => {
                let kernel = kernel.ok_or_else(|| {
                    Error::playback_with_context(
                        "reverb requested before the kernel was generated",
                        ErrorContext::new().with_source("audio_session"),
                    )
                })?;
                signal = convolve(&signal, kernel);
            }
            Stage::FeedbackDelay {
                delay_secs,
                feedback_gain,
            } => {
                check_feedback_delay(delay_secs, feedback_gain)?;
                let delay = ((delay_secs * sample_rate as f64).round() as usize).max(1);
                signal = signal
                    .iter()
                    .map(|ch| feedback_delay(ch, delay, feedback_gain))
                    .collect();
            }
            Stage::MixDry => mix_into(&mut signal, &dry),
        }
    }

    AudioBuffer::from_channels(sample_rate, signal)
}

/// Output of a delay line whose output is fed back into its input through `gain`.
///
/// `d[n] = x[n - delay] + gain * d[n - delay]`; the tail runs until the repeats
/// drop below -60 dB.
fn feedback_delay(input: &[f32], delay: usize, gain: f32) -> Vec<f32> {
    if input.is_empty() {
        return Vec::new();
    }
    let repeats = if gain > 0.0 {
        (ECHO_TAIL_FLOOR.ln() / gain.ln()).ceil().max(1.0) as usize
    } else {
        1
    };
    let len = input.len() + repeats * delay;
    let mut out = vec![0.0f32; len];
    for n in delay..len {
        let x = input.get(n - delay).copied().unwrap_or(0.0);
        out[n] = x + gain * out[n - delay];
    }
    out
}

/// Add `dry` into `wet`, channel by channel, extending with the longer of the two.
fn mix_into(wet: &mut Vec<Vec<f32>>, dry: &[Vec<f32>]) {
    if wet.len() < dry.len() {
        wet.resize(dry.len(), Vec::new());
    }
    let frames = wet
        .iter()
        .chain(dry.iter())
        .map(Vec::len)
        .max()
        .unwrap_or(0);
    for (i, channel) in wet.iter_mut().enumerate() {
        channel.resize(frames, 0.0);
        // A mono dry signal feeds every wet channel.
        let source = &dry[i.min(dry.len() - 1)];
        for (out, s) in channel.iter_mut().zip(source.iter()) {
            *out += s;
        }
    }
}

/// Convolve with every kernel channel.
///
/// When the signal and kernel have the same channel count they are paired up;
/// otherwise the signal is downmixed and fed to each kernel channel, so a mono
/// voice through a stereo kernel comes out stereo.
fn convolve(signal: &[Vec<f32>], kernel: &ReverbKernel) -> Vec<Vec<f32>> {
    let ir = kernel.buffer();
    let scale = normalization_scale(ir);
    if signal.len() == ir.channel_count() {
        signal
            .iter()
            .zip(ir.channels())
            .map(|(s, k)| scaled(fft_convolve(s, k), scale))
            .collect()
    } else {
        let mono = downmix(signal);
        ir.channels()
            .iter()
            .map(|k| scaled(fft_convolve(&mono, k), scale))
            .collect()
    }
}

fn scaled(mut samples: Vec<f32>, scale: f32) -> Vec<f32> {
    samples.iter_mut().for_each(|s| *s *= scale);
    samples
}

/// RMS-power normalization applied to impulse responses before convolution.
pub fn normalization_scale(ir: &AudioBuffer) -> f32 {
    let count = (ir.channel_count() * ir.frames()) as f32;
    let energy: f32 = ir.channels().iter().flatten().map(|s| s * s).sum();
    let mut power = (energy / count).sqrt();
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }
    let mut scale = GAIN_CALIBRATION / power;
    scale *= GAIN_CALIBRATION_SAMPLE_RATE / ir.sample_rate() as f32;
    if ir.channel_count() == 4 {
        scale *= 0.5;
    }
    scale
}

/// Linear convolution via zero-padded FFT. Output length is `a + b - 1`.
fn fft_convolve(a: &[f32], b: &[f32]) -> Vec<f32> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let out_len = a.len() + b.len() - 1;
    let size = out_len.next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(size);
    let inverse = planner.plan_fft_inverse(size);

    let pad = |x: &[f32]| -> Vec<Complex<f64>> {
        let mut v: Vec<Complex<f64>> = x.iter().map(|&s| Complex::new(s as f64, 0.0)).collect();
        v.resize(size, Complex::new(0.0, 0.0));
        v
    };
    let mut fa = pad(a);
    let mut fb = pad(b);
    forward.process(&mut fa);
    forward.process(&mut fb);
    for (x, y) in fa.iter_mut().zip(fb.iter()) {
        *x *= y;
    }
    inverse.process(&mut fa);

    let norm = 1.0 / size as f64;
    fa.iter().take(out_len).map(|c| (c.re * norm) as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono(samples: Vec<f32>) -> AudioBuffer {
        AudioBuffer::from_channels(10, vec![samples]).unwrap()
    }

    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len(), "length mismatch: {:?} vs {:?}", a, b);
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-5, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_effect_paths() {
        assert_eq!(
            SignalPath::for_effect(Effect::None).stages(),
            &[Stage::Source, Stage::Sink]
        );
        assert_eq!(
            SignalPath::for_effect(Effect::Reverb).stages(),
            &[Stage::Source, Stage::Convolve, Stage::Sink]
        );
        let echo = SignalPath::for_effect(Effect::Echo);
        assert_eq!(
            echo.stages()[1],
            Stage::FeedbackDelay {
                delay_secs: 0.4,
                feedback_gain: 0.5
            }
        );
        assert_eq!(echo.stages()[2], Stage::MixDry);
        assert!(!echo.needs_kernel());
        assert!(SignalPath::for_effect(Effect::Reverb).needs_kernel());
    }

    #[test]
    fn test_effect_parse_and_display() {
        for effect in Effect::ALL {
            assert_eq!(effect.to_string().parse::<Effect>().unwrap(), effect);
        }
        assert_eq!(" Reverb ".parse::<Effect>().unwrap(), Effect::Reverb);
        assert!(matches!("chorus".parse::<Effect>(), Err(Error::Validation { .. })));
        assert_eq!(Effect::default(), Effect::None);
        assert_eq!(serde_json::to_string(&Effect::Echo).unwrap(), "\"echo\"");
    }

    #[test]
    fn test_none_passes_through() {
        let input = mono(vec![0.1, -0.2, 0.3]);
        let out = render(&SignalPath::for_effect(Effect::None), &input, None).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_echo_sums_dry_and_decaying_repeats() {
        // 10 Hz sample rate -> 0.4 s delay is 4 frames.
        let input = mono(vec![1.0]);
        let out = render(&SignalPath::for_effect(Effect::Echo), &input, None).unwrap();
        let ch = out.channel(0).unwrap();
        assert_eq!(ch[0], 1.0);
        assert_eq!(ch[4], 1.0);
        assert_eq!(ch[8], 0.5);
        assert_eq!(ch[12], 0.25);
        assert_eq!(ch[1], 0.0);
        // 10 repeats of the tail at gain 0.5 reach -60 dB.
        assert_eq!(ch.len(), 1 + 10 * 4);
        assert!(ch[40] < ECHO_TAIL_FLOOR * 2.0);
    }

    #[test]
    fn test_unstable_feedback_rejected() {
        let stages = |gain| {
            vec![
                Stage::Source,
                Stage::FeedbackDelay {
                    delay_secs: 0.4,
                    feedback_gain: gain,
                },
                Stage::MixDry,
                Stage::Sink,
            ]
        };
        assert!(SignalPath::new(stages(0.5)).is_ok());
        assert!(SignalPath::new(stages(0.0)).is_ok());
        assert!(matches!(SignalPath::new(stages(1.0)), Err(Error::Playback { .. })));
        assert!(SignalPath::new(stages(1.5)).is_err());
        assert!(SignalPath::new(stages(f32::NAN)).is_err());
    }

    #[test]
    fn test_malformed_paths_rejected() {
        assert!(SignalPath::new(vec![]).is_err());
        assert!(SignalPath::new(vec![Stage::Source]).is_err());
        assert!(SignalPath::new(vec![Stage::Convolve, Stage::Sink]).is_err());
        assert!(SignalPath::new(vec![Stage::Source, Stage::Sink, Stage::Sink]).is_err());
    }

    #[test]
    fn test_reverb_without_kernel_is_error() {
        let input = mono(vec![0.5]);
        let err = render(&SignalPath::for_effect(Effect::Reverb), &input, None).unwrap_err();
        assert!(matches!(err, Error::Playback { .. }));
    }

    #[test]
    fn test_reverb_is_wet_only_and_stereo() {
        let ir = AudioBuffer::from_channels(10, vec![vec![0.0, 1.0], vec![0.0, 0.0]]).unwrap();
        let kernel = ReverbKernel::from_buffer(ir.clone());
        let scale = normalization_scale(&ir);
        let input = mono(vec![1.0, 0.5]);
        let out = render(&SignalPath::for_effect(Effect::Reverb), &input, Some(&kernel)).unwrap();
        assert_eq!(out.channel_count(), 2);
        // Left kernel is a one-frame delay: no dry signal at frame 0.
        assert_close(out.channel(0).unwrap(), &[0.0, scale, 0.5 * scale]);
        assert_close(out.channel(1).unwrap(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_fft_convolve_matches_direct() {
        let a = [1.0, 2.0, 3.0];
        let b = [0.0, 1.0, 0.5];
        assert_close(&fft_convolve(&a, &b), &[0.0, 1.0, 2.5, 4.0, 1.5]);
        assert!(fft_convolve(&[], &b).is_empty());
    }

    #[test]
    fn test_normalization_floor() {
        let silent = AudioBuffer::silent(44100, 2, 8).unwrap();
        let scale = normalization_scale(&silent);
        assert!((scale - GAIN_CALIBRATION / MIN_POWER).abs() < 1e-3);
    }
}
