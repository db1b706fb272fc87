//! Pixel codec collaborator.
//!
//! The container layer never touches compressed pixels. It hands each frame's
//! bitstream to a [`FrameCodec`] together with a target buffer.

use image::ImageFormat;

use super::chunk::{ALPH, RIFF, VP8, VP8L, VP8X, WEBP};
use super::frame::BitstreamKind;
use super::rgb_conversion::write_rgba8;
use crate::error::CodecError;
use crate::render::{ImageData, Size};

/// Compressed data of one frame, borrowed from the accumulated bytes.
#[derive(Debug, Clone, Copy)]
pub struct FrameBitstream<'a> {
    pub kind: BitstreamKind,
    pub data: &'a [u8],
    /// `ALPH` payload for lossy frames.
    pub alpha: Option<&'a [u8]>,
    pub size: Size,
}

pub trait FrameCodec {
    /// Decode `bitstream` into `target`, whose descriptor has the frame's
    /// size and the pixel/alpha formats to produce.
    fn decode(
        &self,
        bitstream: &FrameBitstream<'_>,
        target: &mut ImageData,
    ) -> Result<(), CodecError>;
}

/// Decodes frames with the `image` crate's WebP decoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebPCodec;

impl WebPCodec {
    /// Re-wrap a frame bitstream as a standalone still WebP file.
    pub fn wrap(bitstream: &FrameBitstream<'_>) -> Vec<u8> {
        let mut body = Vec::with_capacity(bitstream.data.len() + 64);
        body.extend_from_slice(&WEBP);

        match (bitstream.kind, bitstream.alpha) {
            (BitstreamKind::Lossy, Some(alpha)) => {
                let mut vp8x = [0u8; 10];
                vp8x[0] = 0x10;
                vp8x[4..7].copy_from_slice(&(bitstream.size.width - 1).to_le_bytes()[..3]);
                vp8x[7..10].copy_from_slice(&(bitstream.size.height - 1).to_le_bytes()[..3]);
                push_chunk(&mut body, VP8X, &vp8x);
                push_chunk(&mut body, ALPH, alpha);
                push_chunk(&mut body, VP8, bitstream.data);
            }
            (BitstreamKind::Lossy, None) => push_chunk(&mut body, VP8, bitstream.data),
            (BitstreamKind::Lossless, _) => push_chunk(&mut body, VP8L, bitstream.data),
        }

        let mut file = Vec::with_capacity(body.len() + 8);
        file.extend_from_slice(&RIFF);
        file.extend_from_slice(&(body.len() as u32).to_le_bytes());
        file.extend_from_slice(&body);
        file
    }
}

fn push_chunk(out: &mut Vec<u8>, fourcc: [u8; 4], payload: &[u8]) {
    out.extend_from_slice(&fourcc);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
}

impl FrameCodec for WebPCodec {
    fn decode(
        &self,
        bitstream: &FrameBitstream<'_>,
        target: &mut ImageData,
    ) -> Result<(), CodecError> {
        let descriptor = *target.descriptor();
        let expected = (bitstream.size.width, bitstream.size.height);
        if descriptor.size != bitstream.size {
            return Err(CodecError::SizeMismatch {
                expected,
                actual: (descriptor.size.width, descriptor.size.height),
            });
        }
        if target.memory().len() < descriptor.required_bytes() {
            return Err(CodecError::BufferTooSmall {
                required: descriptor.required_bytes(),
                actual: target.memory().len(),
            });
        }

        let file = Self::wrap(bitstream);
        let rgba = image::load_from_memory_with_format(&file, ImageFormat::WebP)?.to_rgba8();
        if rgba.dimensions() != expected {
            return Err(CodecError::SizeMismatch {
                expected,
                actual: rgba.dimensions(),
            });
        }

        write_rgba8(
            rgba.as_raw(),
            expected.0 as usize,
            expected.1 as usize,
            &descriptor,
            target.memory_mut(),
        );
        Ok(())
    }
}
