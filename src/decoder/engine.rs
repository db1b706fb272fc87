//! Frame decode engine: turns one located frame into an [`Image`].

use std::rc::Rc;
use std::time::Instant;

use super::buffer::ByteBuffer;
use super::codec::{FrameBitstream, FrameCodec};
use super::frame::FrameEntry;
use super::header::ImageHeader;
use crate::error::DecodeError;
use crate::render::{AlphaFormat, Image, PixelFormat, ResourceProvider};

/// Decodes frames on demand. Frames are independent: any located frame can
/// be decoded without decoding the ones before it.
pub struct FrameDecoder {
    provider: Rc<dyn ResourceProvider>,
    codec: Box<dyn FrameCodec>,
    premultiply_alpha: bool,
}

impl FrameDecoder {
    pub fn new(
        provider: Rc<dyn ResourceProvider>,
        codec: Box<dyn FrameCodec>,
        premultiply_alpha: bool,
    ) -> Self {
        Self {
            provider,
            codec,
            premultiply_alpha,
        }
    }

    /// Pick pixel and alpha formats the provider supports.
    ///
    /// Fails with `UnsupportedFormat` without allocating anything.
    pub fn select_formats(
        &self,
        has_alpha: bool,
    ) -> Result<(PixelFormat, AlphaFormat), DecodeError> {
        let alpha_format = match (has_alpha, self.premultiply_alpha) {
            (false, _) => AlphaFormat::Opaque,
            (true, true) => AlphaFormat::Premultiplied,
            (true, false) => AlphaFormat::Unpremultiplied,
        };
        if !self.provider.alpha_format_supported(alpha_format) {
            return Err(DecodeError::UnsupportedFormat(format!(
                "alpha format {:?} not supported by the resource provider",
                alpha_format
            )));
        }

        let pixel_format = [PixelFormat::Rgba8, PixelFormat::Bgra8]
            .into_iter()
            .find(|format| self.provider.pixel_format_supported(*format))
            .ok_or_else(|| {
                DecodeError::UnsupportedFormat("neither RGBA8 nor BGRA8 is supported".to_string())
            })?;

        Ok((pixel_format, alpha_format))
    }

    pub fn decode_frame(
        &self,
        entry: &FrameEntry,
        header: &ImageHeader,
        buffer: &ByteBuffer,
    ) -> Result<Image, DecodeError> {
        let index = entry.metadata.index;
        let failure = |reason: String| DecodeError::FrameDecodeFailure { index, reason };

        let source = entry.source.as_ref().map_err(|reason| failure(reason.clone()))?;
        let has_alpha = source.has_alpha.unwrap_or(header.has_alpha);
        let (pixel_format, alpha_format) = self.select_formats(has_alpha)?;

        let data = buffer.slice(source.data.clone()).ok_or(DecodeError::InsufficientData)?;
        let alpha = match &source.alpha {
            Some(range) => Some(buffer.slice(range.clone()).ok_or(DecodeError::InsufficientData)?),
            None => None,
        };

        let size = entry.metadata.size();
        let mut image_data = self
            .provider
            .allocate_image_data(size, pixel_format, alpha_format)
            .ok_or_else(|| failure(format!("could not allocate {} image data", size)))?;

        let start = Instant::now();
        let bitstream = FrameBitstream {
            kind: source.kind,
            data,
            alpha,
            size,
        };
        self.codec
            .decode(&bitstream, &mut image_data)
            .map_err(|e| failure(e.to_string()))?;

        log::debug!(
            "Decoded frame {} ({}, {:?}, {:?}) in {:?}",
            index,
            size,
            pixel_format,
            alpha_format,
            start.elapsed()
        );
        Ok(self.provider.create_image(image_data))
    }
}
