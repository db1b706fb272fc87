//! Per-frame metadata and the location of each frame's bitstream inside the
//! accumulated bytes.

use std::ops::Range;
use std::time::Duration;

use smallvec::SmallVec;

use super::chunk::{read_u24_le, sub_chunks, SubChunk, ALPH, ANMF, VP8, VP8L};
use super::header::{parse_vp8_size, Vp8lInfo};
use crate::error::DecodeError;
use crate::render::Size;

const ANMF_FIELDS_SIZE: usize = 16;
const ANMF_NO_BLEND_FLAG: u8 = 0x02;
const ANMF_DISPOSE_FLAG: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMethod {
    /// Alpha-blend onto the previous canvas.
    AlphaBlend,
    /// Overwrite the covered rectangle.
    NoBlend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposeMethod {
    None,
    /// Clear the covered rectangle to the background before the next frame.
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMetadata {
    pub index: u32,
    /// Duration as stored in the stream, before any playback floor.
    pub duration: Duration,
    pub width: u32,
    pub height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub blend: BlendMethod,
    pub dispose: DisposeMethod,
}

impl FrameMetadata {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitstreamKind {
    Lossy,
    Lossless,
}

/// Absolute byte ranges of one frame's compressed data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitstreamRef {
    pub kind: BitstreamKind,
    pub data: Range<usize>,
    pub alpha: Option<Range<usize>>,
    /// `None` when the frame does not say and the image header decides.
    pub has_alpha: Option<bool>,
}

/// A located frame. A frame whose nested structure is broken still counts
/// and keeps its timing, but cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameEntry {
    pub metadata: FrameMetadata,
    pub source: Result<BitstreamRef, String>,
}

/// Parse a complete `ANMF` payload starting at absolute offset `base`.
pub fn parse_anmf(
    index: u32,
    payload: &[u8],
    base: usize,
    canvas: Size,
) -> Result<FrameEntry, DecodeError> {
    if payload.len() < ANMF_FIELDS_SIZE {
        return Err(DecodeError::malformed_chunk(
            &ANMF,
            format!("payload is {} bytes", payload.len()),
        ));
    }
    let flags = payload[15];
    let metadata = FrameMetadata {
        index,
        offset_x: read_u24_le(&payload[0..3]) * 2,
        offset_y: read_u24_le(&payload[3..6]) * 2,
        width: read_u24_le(&payload[6..9]) + 1,
        height: read_u24_le(&payload[9..12]) + 1,
        duration: Duration::from_millis(u64::from(read_u24_le(&payload[12..15]))),
        blend: if flags & ANMF_NO_BLEND_FLAG != 0 {
            BlendMethod::NoBlend
        } else {
            BlendMethod::AlphaBlend
        },
        dispose: if flags & ANMF_DISPOSE_FLAG != 0 {
            DisposeMethod::Background
        } else {
            DisposeMethod::None
        },
    };

    let source = if metadata.offset_x + metadata.width > canvas.width
        || metadata.offset_y + metadata.height > canvas.height
    {
        Err(format!(
            "frame {} at ({}, {}) exceeds the {} canvas",
            metadata.size(),
            metadata.offset_x,
            metadata.offset_y,
            canvas
        ))
    } else {
        let nested_base = base + ANMF_FIELDS_SIZE;
        let nested = &payload[ANMF_FIELDS_SIZE..];
        sub_chunks(nested, nested_base).and_then(|chunks| {
            locate_bitstream(&chunks, nested, nested_base, metadata.size())
        })
    };

    if let Err(reason) = &source {
        log::warn!("Frame {} is not decodable: {}", index, reason);
    }
    Ok(FrameEntry { metadata, source })
}

/// Build the single entry of a still image from its bitstream chunk.
pub fn still_entry(
    fourcc: [u8; 4],
    data: Range<usize>,
    data_bytes: &[u8],
    alpha: Option<Range<usize>>,
    canvas: Size,
) -> FrameEntry {
    let metadata = FrameMetadata {
        index: 0,
        duration: Duration::ZERO,
        width: canvas.width,
        height: canvas.height,
        offset_x: 0,
        offset_y: 0,
        blend: BlendMethod::NoBlend,
        dispose: DisposeMethod::None,
    };
    let source = bitstream_ref(fourcc, data, data_bytes, alpha, canvas);
    if let Err(reason) = &source {
        log::warn!("Still image is not decodable: {}", reason);
    }
    FrameEntry { metadata, source }
}

/// Pick `ALPH` and `VP8 `/`VP8L` out of the nested chunks of a frame.
fn locate_bitstream(
    chunks: &[SubChunk],
    bytes: &[u8],
    base: usize,
    expected: Size,
) -> Result<BitstreamRef, String> {
    let mut alpha = None;
    let mut known: SmallVec<[&SubChunk; 2]> = SmallVec::new();
    for chunk in chunks {
        match chunk.fourcc {
            ALPH if alpha.is_none() => alpha = Some(chunk.payload.clone()),
            VP8 | VP8L => known.push(chunk),
            _ => log::debug!(
                "Skipping {:?} sub-chunk",
                String::from_utf8_lossy(&chunk.fourcc)
            ),
        }
    }
    let chunk = match known.as_slice() {
        [] => return Err("no VP8/VP8L bitstream".to_string()),
        [chunk] => *chunk,
        _ => return Err(format!("{} bitstreams in one frame", known.len())),
    };
    let local = chunk.payload.start - base..chunk.payload.end - base;
    bitstream_ref(chunk.fourcc, chunk.payload.clone(), &bytes[local], alpha, expected)
}

fn bitstream_ref(
    fourcc: [u8; 4],
    data: Range<usize>,
    data_bytes: &[u8],
    alpha: Option<Range<usize>>,
    expected: Size,
) -> Result<BitstreamRef, String> {
    let (kind, size, has_alpha) = match fourcc {
        VP8 => {
            let size = parse_vp8_size(data_bytes).map_err(|e| e.to_string())?;
            (BitstreamKind::Lossy, size, Some(alpha.is_some()))
        }
        VP8L => {
            let info = Vp8lInfo::parse(data_bytes).map_err(|e| e.to_string())?;
            // ALPH does not apply to lossless data; the header decides.
            (BitstreamKind::Lossless, info.size, None)
        }
        other => return Err(format!("unknown bitstream {:?}", String::from_utf8_lossy(&other))),
    };
    if size != expected {
        return Err(format!("bitstream is {}, frame is {}", size, expected));
    }
    Ok(BitstreamRef {
        kind,
        data,
        alpha: if kind == BitstreamKind::Lossy { alpha } else { None },
        has_alpha,
    })
}
