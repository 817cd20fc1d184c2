//! WAV (RIFF/WAVE) container framing for raw PCM.

use std::path::Path;

use super::{SPEECH_BITS_PER_SAMPLE, SPEECH_CHANNELS};
use crate::{Error, ErrorContext, Result};

/// Size of the canonical PCM WAV header.
pub const WAV_HEADER_LEN: usize = 44;
pub const WAV_FILE_NAME: &str = "speech.wav";
pub const WAV_MIME_TYPE: &str = "audio/wav";

const FMT_CHUNK_LEN: u32 = 16;
const FORMAT_PCM: u16 = 1;

/// Layout of the PCM data being wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WavSpec {
    /// 16-bit mono, the shape of generated speech.
    pub fn speech(sample_rate: u32) -> Self {
        Self {
            channels: SPEECH_CHANNELS,
            sample_rate,
            bits_per_sample: SPEECH_BITS_PER_SAMPLE,
        }
    }

    /// Bytes per frame, or `None` if it does not fit the 16-bit header field.
    pub fn block_align(&self) -> Option<u16> {
        let bits = u32::from(self.channels) * u32::from(self.bits_per_sample);
        u16::try_from(bits / 8).ok()
    }

    /// Bytes per second, or `None` if it does not fit the 32-bit header field.
    pub fn byte_rate(&self) -> Option<u32> {
        self.block_align()
            .and_then(|align| self.sample_rate.checked_mul(u32::from(align)))
    }
}

/// A complete WAV file, ready to be offered for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavFile {
    bytes: Vec<u8>,
    spec: WavSpec,
}

impl WavFile {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }

    pub fn data_len(&self) -> usize {
        self.bytes.len() - WAV_HEADER_LEN
    }

    pub fn file_name(&self) -> &'static str {
        WAV_FILE_NAME
    }

    pub fn mime_type(&self) -> &'static str {
        WAV_MIME_TYPE
    }

    /// Write the file to `path`, creating or truncating it.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, &self.bytes).map_err(|e| Error::Export {
            message: format!("failed to write {}: {}", path.display(), e),
            context: ErrorContext::new().with_source("wav"),
        })?;
        tracing::debug!(path = %path.display(), bytes = self.bytes.len(), "wrote wav file");
        Ok(())
    }
}

/// Wrap `pcm` in a canonical 44-byte RIFF/WAVE header.
///
/// The PCM bytes are copied unmodified; no resampling or channel conversion
/// takes place.
pub fn encode_wav(pcm: &[u8], spec: WavSpec) -> Result<WavFile> {
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(Error::Export {
            message: "channels and sample rate must be greater than 0".into(),
            context: ErrorContext::new().with_source("wav"),
        });
    }
    if spec.bits_per_sample == 0 || spec.bits_per_sample % 8 != 0 {
        return Err(Error::Export {
            message: format!("unsupported bits per sample: {}", spec.bits_per_sample),
            context: ErrorContext::new().with_field_path("bits_per_sample"),
        });
    }
    let (block_align, byte_rate) = spec
        .block_align()
        .zip(spec.byte_rate())
        .ok_or_else(|| Error::Export {
            message: format!(
                "{} channels of {} bits at {} Hz overflow the WAV header",
                spec.channels, spec.bits_per_sample, spec.sample_rate
            ),
            context: ErrorContext::new()
                .with_field_path("byte_rate")
                .with_source("wav"),
        })?;
    let data_len = u32::try_from(pcm.len())
        .ok()
        .filter(|len| len.checked_add(36).is_some())
        .ok_or_else(|| Error::Export {
            message: format!("PCM payload of {} bytes exceeds the RIFF size limit", pcm.len()),
            context: ErrorContext::new().with_source("wav"),
        })?;

    let mut bytes = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");

    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    bytes.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    bytes.extend_from_slice(&spec.channels.to_le_bytes());
    bytes.extend_from_slice(&spec.sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&spec.bits_per_sample.to_le_bytes());

    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.extend_from_slice(pcm);

    Ok(WavFile { bytes, spec })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap())
    }

    #[test]
    fn test_header_layout() {
        let pcm = vec![0u8; 10];
        let wav = encode_wav(&pcm, WavSpec::speech(24000)).unwrap();
        let b = wav.bytes();
        assert_eq!(b.len(), 44 + 10);
        assert_eq!(&b[0..4], b"RIFF");
        assert_eq!(u32_at(b, 4), 36 + 10);
        assert_eq!(&b[8..12], b"WAVE");
        assert_eq!(&b[12..16], b"fmt ");
        assert_eq!(u32_at(b, 16), 16);
        assert_eq!(u16_at(b, 20), 1);
        assert_eq!(u16_at(b, 22), 1);
        assert_eq!(u32_at(b, 24), 24000);
        assert_eq!(u32_at(b, 28), 48000);
        assert_eq!(u16_at(b, 32), 2);
        assert_eq!(u16_at(b, 34), 16);
        assert_eq!(&b[36..40], b"data");
        assert_eq!(u32_at(b, 40), 10);
    }

    #[test]
    fn test_stereo_byte_rate() {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
        };
        assert_eq!(spec.block_align(), Some(4));
        assert_eq!(spec.byte_rate(), Some(176_400));
    }

    #[test]
    fn test_payload_copied_verbatim() {
        let pcm = [0x00, 0x00, 0xFF, 0x7F];
        let wav = encode_wav(&pcm, WavSpec::speech(24000)).unwrap();
        assert_eq!(&wav.bytes()[44..], &pcm);
        assert_eq!(wav.data_len(), 4);
        assert_eq!(wav.file_name(), "speech.wav");
        assert_eq!(wav.mime_type(), "audio/wav");
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let pcm: Vec<u8> = (0..200u8).collect();
        let a = encode_wav(&pcm, WavSpec::speech(24000)).unwrap();
        let b = encode_wav(&pcm, WavSpec::speech(24000)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_payload() {
        let wav = encode_wav(&[], WavSpec::speech(24000)).unwrap();
        assert_eq!(wav.bytes().len(), 44);
        assert_eq!(u32_at(wav.bytes(), 4), 36);
    }

    #[test]
    fn test_header_field_overflow_rejected() {
        let wide_frames = WavSpec {
            channels: 2,
            sample_rate: 24000,
            bits_per_sample: 32768,
        };
        assert_eq!(wide_frames.block_align(), None);
        assert!(matches!(encode_wav(&[0; 4], wide_frames), Err(Error::Export { .. })));

        let fast = WavSpec {
            channels: 2,
            sample_rate: 3_000_000_000,
            bits_per_sample: 16,
        };
        assert_eq!(fast.block_align(), Some(4));
        assert_eq!(fast.byte_rate(), None);
        let err = encode_wav(&[0; 4], fast).unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("byte_rate")
        );
    }

    #[test]
    fn test_invalid_spec_rejected() {
        let bad = WavSpec {
            channels: 0,
            sample_rate: 24000,
            bits_per_sample: 16,
        };
        assert!(matches!(encode_wav(&[0, 0], bad), Err(Error::Export { .. })));
        let odd_bits = WavSpec {
            bits_per_sample: 12,
            ..WavSpec::speech(24000)
        };
        assert!(encode_wav(&[0, 0], odd_bits).is_err());
    }
}
