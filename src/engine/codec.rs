//! PCM Container Codec
//!
//! Reads and writes the canonical 44-byte RIFF/WAVE layout with 16-bit
//! signed little-endian samples:
//!
//! ```text
//!  0  "RIFF"          4  u32 total size - 8     8  "WAVE"
//! 12  "fmt "         16  u32 16                20  u16 1 (PCM)
//! 22  u16 channels   24  u32 sample rate       28  u32 byte rate
//! 32  u16 block      34  u16 16 (bits)         36  "data"
//! 40  u32 data length, then interleaved samples
//! ```
//!
//! The decoder also accepts containers with extra chunks (e.g. `LIST`)
//! between `fmt ` and `data`, as written by common tools.

use crate::engine::buffer::AudioBuffer;
use crate::error::{Result, VoxpostError};

/// MIME type of encoded output
pub const MIME_TYPE: &str = "audio/wav";

/// Size of the canonical header written by [`encode`]
pub const HEADER_LEN: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;
const BYTES_PER_SAMPLE: usize = 2;
const FORMAT_PCM: u16 = 1;
const FMT_CHUNK_LEN: u32 = 16;

/// Header fields of a decoded container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Byte offset of the first sample
    pub data_offset: usize,
    /// Length of the sample data in bytes
    pub data_len: usize,
}

impl ContainerInfo {
    /// Frames in the data chunk
    pub fn frame_count(&self) -> usize {
        self.data_len / self.block_align()
    }

    /// Bytes per frame
    pub fn block_align(&self) -> usize {
        self.channels as usize * BYTES_PER_SAMPLE
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Quantize one float sample to 16-bit PCM
///
/// Clamps to [-1, 1]; negative values scale by 32768, non-negative by 32767.
#[inline]
pub fn quantize(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
    scaled.round() as i16
}

/// Inverse of [`quantize`]
#[inline]
pub fn dequantize(raw: i16) -> f32 {
    if raw < 0 {
        raw as f32 / 32768.0
    } else {
        raw as f32 / 32767.0
    }
}

/// RIFF size and data length for `frames` frames of `channels` channels
///
/// # Errors
/// * `Encoding` - the sizes do not fit the 32-bit header fields
fn container_sizes(frames: usize, channels: u16) -> Result<(u32, u32)> {
    let block_align = channels as u64 * BYTES_PER_SAMPLE as u64;
    let data_len = (frames as u64).checked_mul(block_align);
    let riff_len = data_len.and_then(|len| len.checked_add(HEADER_LEN as u64 - 8));
    match (data_len, riff_len) {
        (Some(data_len), Some(riff_len)) if riff_len <= u32::MAX as u64 => {
            Ok((riff_len as u32, data_len as u32))
        }
        _ => Err(VoxpostError::Encoding {
            reason: format!(
                "{} frames x {} channels overflow the 32-bit size fields",
                frames, channels
            ),
        }),
    }
}

/// Encode a buffer into container bytes
///
/// # Errors
/// * `Encoding` - the data length does not fit the 32-bit size fields, or the
///   channel count does not fit 16 bits
pub fn encode(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let channels = u16::try_from(buffer.channel_count()).map_err(|_| VoxpostError::Encoding {
        reason: format!("{} channels exceed the container limit", buffer.channel_count()),
    })?;
    let frames = buffer.frame_count();
    let (riff_len, data_len) = container_sizes(frames, channels)?;

    let block_align = channels as u32 * BYTES_PER_SAMPLE as u32;
    let block_align = u16::try_from(block_align).map_err(|_| VoxpostError::Encoding {
        reason: format!("block align {} overflows 16 bits", block_align),
    })?;
    let byte_rate = (buffer.sample_rate() as u64) * block_align as u64;
    let byte_rate = u32::try_from(byte_rate).map_err(|_| VoxpostError::Encoding {
        reason: format!("byte rate {} overflows 32 bits", byte_rate),
    })?;

    let mut out = Vec::with_capacity(HEADER_LEN + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_len.to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&buffer.sample_rate().to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());

    for frame in 0..frames {
        for channel in buffer.channels() {
            out.extend_from_slice(&quantize(channel[frame]).to_le_bytes());
        }
    }

    debug_assert_eq!(out.len(), HEADER_LEN + data_len as usize);
    Ok(out)
}

// ============================================================================
// Decoding
// ============================================================================

fn malformed(reason: impl Into<String>) -> VoxpostError {
    VoxpostError::MalformedContainer {
        reason: reason.into(),
    }
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Parse and validate the container header without touching sample data
///
/// # Errors
/// * `MalformedContainer` - missing magic or chunk, truncated chunk, or a
///   format other than 16-bit linear PCM
pub fn inspect(bytes: &[u8]) -> Result<ContainerInfo> {
    if bytes.len() < 12 {
        return Err(malformed(format!(
            "{} bytes is too short for a RIFF header",
            bytes.len()
        )));
    }
    if &bytes[0..4] != b"RIFF" {
        return Err(malformed("missing 'RIFF' identifier"));
    }
    if &bytes[8..12] != b"WAVE" {
        return Err(malformed("missing 'WAVE' identifier"));
    }
    let riff_len = read_u32(bytes, 4) as usize;
    if riff_len.checked_add(8).map_or(true, |end| end > bytes.len()) {
        return Err(malformed(format!(
            "RIFF size {} exceeds the {} bytes provided",
            riff_len,
            bytes.len()
        )));
    }
    let end = riff_len + 8;

    let mut format: Option<(u16, u16, u32, u16)> = None;
    let mut pos = 12;
    while pos + 8 <= end {
        let id = &bytes[pos..pos + 4];
        let len = read_u32(bytes, pos + 4) as usize;
        let body = pos + 8;
        if body.checked_add(len).map_or(true, |chunk_end| chunk_end > end) {
            return Err(malformed(format!(
                "chunk '{}' declares {} bytes but only {} remain",
                String::from_utf8_lossy(id),
                len,
                end.saturating_sub(body)
            )));
        }

        match id {
            b"fmt " => {
                if len < FMT_CHUNK_LEN as usize {
                    return Err(malformed(format!("'fmt ' chunk too short ({} bytes)", len)));
                }
                format = Some((
                    read_u16(bytes, body),
                    read_u16(bytes, body + 2),
                    read_u32(bytes, body + 4),
                    read_u16(bytes, body + 14),
                ));
            }
            b"data" => {
                let (code, channels, sample_rate, bits) =
                    format.ok_or_else(|| malformed("'data' chunk before 'fmt ' chunk"))?;
                if code != FORMAT_PCM {
                    return Err(malformed(format!("unsupported format code {}", code)));
                }
                if bits != BITS_PER_SAMPLE {
                    return Err(malformed(format!(
                        "unsupported bit depth {} (only 16-bit PCM)",
                        bits
                    )));
                }
                if channels == 0 {
                    return Err(malformed("zero channels declared"));
                }
                if sample_rate == 0 {
                    return Err(malformed("zero sample rate declared"));
                }
                let info = ContainerInfo {
                    channels,
                    sample_rate,
                    bits_per_sample: bits,
                    data_offset: body,
                    data_len: len,
                };
                if len % info.block_align() != 0 {
                    return Err(malformed(format!(
                        "data length {} is not a whole number of {}-byte frames",
                        len,
                        info.block_align()
                    )));
                }
                return Ok(info);
            }
            _ => {}
        }

        // Chunks are word aligned
        pos = body + len + (len & 1);
    }

    if format.is_none() {
        Err(malformed("missing 'fmt ' chunk"))
    } else {
        Err(malformed("missing 'data' chunk"))
    }
}

/// Decode container bytes into a buffer
///
/// # Errors
/// * `MalformedContainer` - see [`inspect`]
pub fn decode(bytes: &[u8]) -> Result<AudioBuffer> {
    let info = inspect(bytes)?;
    let channels = info.channels as usize;
    let frames = info.frame_count();
    let data = &bytes[info.data_offset..info.data_offset + info.data_len];

    let mut planar = vec![Vec::with_capacity(frames); channels];
    for (i, pair) in data.chunks_exact(BYTES_PER_SAMPLE).enumerate() {
        let raw = i16::from_le_bytes([pair[0], pair[1]]);
        planar[i % channels].push(dequantize(raw));
    }

    AudioBuffer::from_channels(planar, info.sample_rate)
}
