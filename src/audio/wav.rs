//! 16-bit PCM WAV encoding of a finished recording.

use std::io::Cursor;

use tracing::debug;

use crate::error::EncodeError;

/// Size of the canonical RIFF/WAVE/fmt/data header.
pub const WAV_HEADER_LEN: usize = 44;

pub const BITS_PER_SAMPLE: u16 = 16;

/// PCM layout of an encoded buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFormat {
    pub fn mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
        }
    }

    pub fn block_align(&self) -> u16 {
        self.channels * BITS_PER_SAMPLE / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }
}

/// Complete WAV file: 44-byte header followed by PCM16LE samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavBuffer(Vec<u8>);

impl WavBuffer {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// PCM payload length (`Subchunk2Size`).
    pub fn data_len(&self) -> usize {
        self.0.len().saturating_sub(WAV_HEADER_LEN)
    }
}

impl AsRef<[u8]> for WavBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Full-scale PCM16 quantization.
///
/// Input is clipped to [-1.0, 1.0]; positive values scale by 32767 and
/// negative values by 32768, so both rails are reachable. The fraction is
/// truncated toward zero.
pub fn quantize(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}

/// Encode mono samples at `sample_rate`.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Option<WavBuffer>, EncodeError> {
    encode(samples, PcmFormat::mono(sample_rate))
}

/// Encode interleaved samples as a 16-bit PCM WAV file.
///
/// Returns `None` for an empty input: a header-only file is never produced.
/// A trailing partial frame (fewer samples than channels) is dropped.
pub fn encode(samples: &[f32], format: PcmFormat) -> Result<Option<WavBuffer>, EncodeError> {
    if format.channels == 0 || format.channels > 2 {
        return Err(EncodeError::Channels(format.channels));
    }

    let whole_frames = samples.len() / format.channels as usize;
    let samples = &samples[..whole_frames * format.channels as usize];
    if samples.is_empty() {
        return Ok(None);
    }

    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        let mut pcm = writer.get_i16_writer(samples.len() as u32);
        for &sample in samples {
            pcm.write_sample(quantize(sample));
        }
        pcm.flush()?;
        writer.finalize()?;
    }

    let bytes = cursor.into_inner();
    debug!(
        "Encoded WAV: {} bytes ({} byte header + {} bytes PCM)",
        bytes.len(),
        WAV_HEADER_LEN,
        samples.len() * 2
    );

    Ok(Some(WavBuffer(bytes)))
}
