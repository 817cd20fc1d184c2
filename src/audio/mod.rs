//! 音频管线模块：解码、播放效果与 WAV 导出。
//!
//! # Audio Pipeline Module
//!
//! Turns a base64 PCM payload from the speech service into something playable
//! and into a downloadable WAV file.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`encoding`] | Strict base64 decoding of payloads |
//! | [`pcm`] | 16-bit LE PCM framing and [`AudioBuffer`] |
//! | [`wav`] | Canonical 44-byte RIFF/WAVE header wrapping |
//! | [`reverb`] | Stereo decaying-noise impulse response |
//! | [`graph`] | Effect → [`SignalPath`] → rendered buffer |
//! | [`sink`] | Output destinations for rendered audio |
//! | [`session`] | Owned output session with cached reverb kernel |
//!
//! ```rust
//! use speech_studio::audio::{decode_base64, decode_pcm16, encode_wav, WavSpec};
//!
//! let bytes = decode_base64("AAD/fw==").unwrap();
//! let buffer = decode_pcm16(&bytes, 24000, 1).unwrap();
//! assert_eq!(buffer.frames(), 2);
//!
//! let wav = encode_wav(&bytes, WavSpec::speech(24000)).unwrap();
//! assert_eq!(wav.bytes().len(), 48);
//! ```

pub mod encoding;
pub mod graph;
pub mod pcm;
pub mod reverb;
pub mod session;
pub mod sink;
pub mod wav;

pub use encoding::{decode_base64, encode_base64};
pub use graph::{render, Effect, SignalPath, Stage};
pub use pcm::{decode_pcm16, AudioBuffer};
pub use reverb::ReverbKernel;
pub use session::{AudioSession, PlaybackReport, SessionState};
pub use sink::{MemorySink, OutputSink, WavFileSink};
pub use wav::{encode_wav, WavFile, WavSpec};

/// Sample rate of payloads returned by the speech service.
pub const SPEECH_SAMPLE_RATE: u32 = 24000;
/// Generated speech is mono.
pub const SPEECH_CHANNELS: u16 = 1;
pub const SPEECH_BITS_PER_SAMPLE: u16 = 16;
