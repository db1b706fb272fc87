//! Stream builders and collaborator doubles shared by the unit tests.

use std::cell::Cell;

use crate::decoder::chunk::{ANIM, ANMF, RIFF, VP8L, VP8X, WEBP};
use crate::decoder::codec::{FrameBitstream, FrameCodec};
use crate::error::CodecError;
use crate::render::{AlphaFormat, Image, ImageData, PixelFormat, ResourceProvider, Size};

pub fn chunk(fourcc: [u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 9);
    out.extend_from_slice(&fourcc);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
    out
}

fn u24(value: u32) -> [u8; 3] {
    let b = value.to_le_bytes();
    [b[0], b[1], b[2]]
}

/// A lossless header followed by filler; good enough for the container
/// layer, not for a real codec.
pub fn vp8l_bitstream(width: u32, height: u32, alpha: bool) -> Vec<u8> {
    let bits = (width - 1) | ((height - 1) << 14) | (u32::from(alpha) << 28);
    let mut out = vec![0x2f];
    out.extend_from_slice(&bits.to_le_bytes());
    out.extend_from_slice(&[0, 0, 0]);
    out
}

pub fn vp8l_chunk(width: u32, height: u32, alpha: bool) -> Vec<u8> {
    chunk(VP8L, &vp8l_bitstream(width, height, alpha))
}

pub fn anmf_payload(
    offset_x: u32,
    offset_y: u32,
    width: u32,
    height: u32,
    duration_ms: u32,
    flags: u8,
    nested: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&u24(offset_x / 2));
    out.extend_from_slice(&u24(offset_y / 2));
    out.extend_from_slice(&u24(width - 1));
    out.extend_from_slice(&u24(height - 1));
    out.extend_from_slice(&u24(duration_ms));
    out.push(flags);
    out.extend_from_slice(nested);
    out
}

pub fn riff(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 12);
    out.extend_from_slice(&RIFF);
    out.extend_from_slice(&((body.len() + 4) as u32).to_le_bytes());
    out.extend_from_slice(&WEBP);
    out.extend_from_slice(body);
    out
}

pub fn still_vp8l_webp(width: u32, height: u32) -> Vec<u8> {
    riff(&vp8l_chunk(width, height, false))
}

#[derive(Debug, Clone, Copy)]
pub struct TestFrame {
    pub width: u32,
    pub height: u32,
    pub duration_ms: u32,
}

impl TestFrame {
    pub fn new(width: u32, height: u32, duration_ms: u32) -> Self {
        Self {
            width,
            height,
            duration_ms,
        }
    }
}

pub fn vp8x_payload(width: u32, height: u32, flags: u8) -> Vec<u8> {
    let mut out = vec![flags, 0, 0, 0];
    out.extend_from_slice(&u24(width - 1));
    out.extend_from_slice(&u24(height - 1));
    out
}

pub fn anim_payload(loop_count: u16) -> Vec<u8> {
    let mut out = vec![0xff, 0xff, 0xff, 0xff];
    out.extend_from_slice(&loop_count.to_le_bytes());
    out
}

/// Key frame header of a lossy bitstream followed by filler.
pub fn vp8_bitstream(width: u16, height: u16) -> Vec<u8> {
    let mut out = vec![0x10, 0x02, 0x00, 0x9d, 0x01, 0x2a];
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&[0, 0]);
    out
}

/// Animated container with lossless frames placed at the origin.
pub fn animated_webp(
    width: u32,
    height: u32,
    loop_count: u16,
    alpha: bool,
    frames: &[TestFrame],
) -> Vec<u8> {
    let flags = 0x02 | if alpha { 0x10 } else { 0 };
    let mut body = chunk(VP8X, &vp8x_payload(width, height, flags));
    body.extend_from_slice(&chunk(ANIM, &anim_payload(loop_count)));
    for frame in frames {
        let nested = vp8l_chunk(frame.width, frame.height, alpha);
        let payload = anmf_payload(0, 0, frame.width, frame.height, frame.duration_ms, 0, &nested);
        body.extend_from_slice(&chunk(ANMF, &payload));
    }
    riff(&body)
}

/// Resource provider that records how it is used.
pub struct CountingProvider {
    unsupported_alpha: Option<AlphaFormat>,
    unsupported_pixel: Option<PixelFormat>,
    allocations: Cell<usize>,
    images_created: Cell<usize>,
}

impl Default for CountingProvider {
    fn default() -> Self {
        Self {
            unsupported_alpha: None,
            unsupported_pixel: None,
            allocations: Cell::new(0),
            images_created: Cell::new(0),
        }
    }
}

impl CountingProvider {
    pub fn without_alpha(format: AlphaFormat) -> Self {
        Self {
            unsupported_alpha: Some(format),
            ..Self::default()
        }
    }

    pub fn without_pixel(format: PixelFormat) -> Self {
        Self {
            unsupported_pixel: Some(format),
            ..Self::default()
        }
    }

    pub fn allocations(&self) -> usize {
        self.allocations.get()
    }

    pub fn images_created(&self) -> usize {
        self.images_created.get()
    }
}

impl ResourceProvider for CountingProvider {
    fn pixel_format_supported(&self, format: PixelFormat) -> bool {
        self.unsupported_pixel != Some(format)
    }

    fn alpha_format_supported(&self, format: AlphaFormat) -> bool {
        self.unsupported_alpha != Some(format)
    }

    fn allocate_image_data(
        &self,
        size: Size,
        pixel_format: PixelFormat,
        alpha_format: AlphaFormat,
    ) -> Option<ImageData> {
        assert!(self.pixel_format_supported(pixel_format));
        assert!(self.alpha_format_supported(alpha_format));
        self.allocations.set(self.allocations.get() + 1);
        Some(ImageData::zeroed(size, pixel_format, alpha_format))
    }

    fn create_image(&self, data: ImageData) -> Image {
        self.images_created.set(self.images_created.get() + 1);
        Image::new(data)
    }
}

/// Codec that paints every byte with the first byte after the bitstream
/// signature and header.
pub struct FillCodec;

impl FrameCodec for FillCodec {
    fn decode(
        &self,
        bitstream: &FrameBitstream<'_>,
        target: &mut ImageData,
    ) -> Result<(), CodecError> {
        let value = bitstream.data.get(5).copied().unwrap_or(0xab);
        target.memory_mut().fill(value);
        Ok(())
    }
}

/// Codec that rejects every frame.
pub struct FailingCodec;

impl FrameCodec for FailingCodec {
    fn decode(
        &self,
        bitstream: &FrameBitstream<'_>,
        _target: &mut ImageData,
    ) -> Result<(), CodecError> {
        Err(CodecError::SizeMismatch {
            expected: (bitstream.size.width, bitstream.size.height),
            actual: (0, 0),
        })
    }
}
