//! Resumable container header parser.
//!
//! Recognizes the RIFF signature and the first chunk, which is either a bare
//! still-image bitstream (`VP8 `/`VP8L`) or an extended `VP8X` header. The
//! `ANIM` chunk of an animated image is left to the frame parser, which
//! fills in the loop count and background colour once it arrives.

use super::buffer::ByteBuffer;
use super::chunk::{
    read_u16_le, read_u24_le, read_u32_le, ChunkHeader, ANIM, CHUNK_HEADER_SIZE, RIFF,
    RIFF_HEADER_SIZE, VP8, VP8L, VP8X, WEBP,
};
use crate::error::DecodeError;
use crate::render::Size;

const VP8X_ALPHA_FLAG: u8 = 0x10;
const VP8X_ANIMATION_FLAG: u8 = 0x02;
const VP8X_PAYLOAD_SIZE: usize = 10;
const ANIM_PAYLOAD_SIZE: usize = 6;
const VP8_HEADER_SIZE: usize = 10;
const VP8_START_CODE: [u8; 3] = [0x9d, 0x01, 0x2a];
const VP8L_HEADER_SIZE: usize = 5;
const VP8L_SIGNATURE: u8 = 0x2f;

/// Image-wide properties, fixed once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub is_animated: bool,
    pub has_alpha: bool,
    /// Zero loops forever, and is also reported by an animated image
    /// until its `ANIM` chunk arrives. Still images report 1.
    pub loop_count: u32,
    /// Canvas background hint in B, G, R, A order, from `ANIM`.
    pub background_color: Option<[u8; 4]>,
}

impl ImageHeader {
    pub fn canvas_size(&self) -> Size {
        Size::new(self.canvas_width, self.canvas_height)
    }
}

/// How frames are stored after the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// The first chunk is the still bitstream itself and has not been
    /// consumed.
    Simple,
    /// `VP8X` still image: optional `ALPH` then `VP8 `/`VP8L` follow.
    ExtendedStill,
    /// Animated `VP8X`: `ANIM` then `ANMF` chunks follow.
    Animated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedHeader {
    pub header: ImageHeader,
    pub layout: Layout,
    /// Absolute offset one past the last byte of the container.
    pub riff_end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Signature,
    FirstChunk,
    Done,
}

/// Parses the header across arbitrary chunk boundaries, consuming bytes
/// only once a whole unit has arrived.
#[derive(Debug)]
pub struct HeaderParser {
    step: Step,
    riff_end: usize,
}

impl Default for HeaderParser {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderParser {
    pub fn new() -> Self {
        Self {
            step: Step::Signature,
            riff_end: 0,
        }
    }

    /// Make as much progress as the buffered bytes allow.
    ///
    /// Returns `Ok(None)` while more bytes are needed.
    pub fn advance(
        &mut self,
        buffer: &mut ByteBuffer,
    ) -> Result<Option<ParsedHeader>, DecodeError> {
        loop {
            match self.step {
                Step::Signature => {
                    let Some(bytes) = buffer.peek(RIFF_HEADER_SIZE) else {
                        return Ok(None);
                    };
                    let riff_size = parse_signature(bytes)?;
                    self.riff_end = buffer.position() + CHUNK_HEADER_SIZE + riff_size as usize;
                    buffer.consume(RIFF_HEADER_SIZE);
                    self.step = Step::FirstChunk;
                }
                Step::FirstChunk => {
                    let Some(chunk) = ChunkHeader::parse(buffer.unconsumed()) else {
                        return Ok(None);
                    };
                    self.check_bounds(buffer.position(), &chunk)?;
                    let payload = &buffer.unconsumed()[CHUNK_HEADER_SIZE..];
                    match chunk.fourcc {
                        VP8 => {
                            if (chunk.size as usize) < VP8_HEADER_SIZE {
                                return Err(DecodeError::malformed_chunk(
                                    &VP8,
                                    "payload shorter than the frame header",
                                ));
                            }
                            let Some(bytes) = payload.get(..VP8_HEADER_SIZE) else {
                                return Ok(None);
                            };
                            let size = parse_vp8_size(bytes)?;
                            return Ok(Some(self.finish(still_header(size, false), Layout::Simple)));
                        }
                        VP8L => {
                            if (chunk.size as usize) < VP8L_HEADER_SIZE {
                                return Err(DecodeError::malformed_chunk(
                                    &VP8L,
                                    "payload shorter than the bitstream header",
                                ));
                            }
                            let Some(bytes) = payload.get(..VP8L_HEADER_SIZE) else {
                                return Ok(None);
                            };
                            let info = Vp8lInfo::parse(bytes)?;
                            let header = still_header(info.size, info.alpha_hint);
                            return Ok(Some(self.finish(header, Layout::Simple)));
                        }
                        VP8X => {
                            if (chunk.size as usize) < VP8X_PAYLOAD_SIZE {
                                return Err(DecodeError::MalformedHeader(format!(
                                    "VP8X payload is {} bytes",
                                    chunk.size
                                )));
                            }
                            if buffer.unconsumed().len() < chunk.total_size() {
                                return Ok(None);
                            }
                            let vp8x = Vp8xHeader::parse(&payload[..VP8X_PAYLOAD_SIZE])?;
                            buffer.consume(chunk.total_size());
                            let layout = if vp8x.animated {
                                Layout::Animated
                            } else {
                                Layout::ExtendedStill
                            };
                            return Ok(Some(self.finish(vp8x.header(), layout)));
                        }
                        other => {
                            return Err(DecodeError::MalformedHeader(format!(
                                "unexpected first chunk {:?}",
                                String::from_utf8_lossy(&other)
                            )));
                        }
                    }
                }
                Step::Done => return Ok(None),
            }
        }
    }

    fn check_bounds(&self, position: usize, chunk: &ChunkHeader) -> Result<(), DecodeError> {
        if position + CHUNK_HEADER_SIZE + chunk.size as usize > self.riff_end {
            return Err(DecodeError::malformed_chunk(
                &chunk.fourcc,
                "chunk extends past the end of the container",
            ));
        }
        Ok(())
    }

    fn finish(&mut self, header: ImageHeader, layout: Layout) -> ParsedHeader {
        self.step = Step::Done;
        log::info!(
            "Header: {}x{}, animated: {}, alpha: {}, loops: {}, layout: {:?}",
            header.canvas_width,
            header.canvas_height,
            header.is_animated,
            header.has_alpha,
            header.loop_count,
            layout
        );
        ParsedHeader {
            header,
            layout,
            riff_end: self.riff_end,
        }
    }
}

fn still_header(size: Size, has_alpha: bool) -> ImageHeader {
    ImageHeader {
        canvas_width: size.width,
        canvas_height: size.height,
        is_animated: false,
        has_alpha,
        loop_count: 1,
        background_color: None,
    }
}

/// Check the 12-byte signature and return the RIFF payload size.
fn parse_signature(bytes: &[u8]) -> Result<u32, DecodeError> {
    if bytes[0..4] != RIFF || bytes[8..12] != WEBP {
        return Err(DecodeError::MalformedHeader("missing RIFF/WEBP signature".into()));
    }
    let riff_size = read_u32_le(&bytes[4..8]);
    if (riff_size as usize) < 4 + CHUNK_HEADER_SIZE {
        return Err(DecodeError::MalformedHeader(format!(
            "RIFF size {} cannot hold a chunk",
            riff_size
        )));
    }
    Ok(riff_size)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Vp8xHeader {
    canvas: Size,
    alpha: bool,
    animated: bool,
}

impl Vp8xHeader {
    fn header(&self) -> ImageHeader {
        if !self.animated {
            return still_header(self.canvas, self.alpha);
        }
        ImageHeader {
            canvas_width: self.canvas.width,
            canvas_height: self.canvas.height,
            is_animated: true,
            has_alpha: self.alpha,
            loop_count: 0,
            background_color: None,
        }
    }

    fn parse(payload: &[u8]) -> Result<Self, DecodeError> {
        let flags = payload[0];
        let width = read_u24_le(&payload[4..7]) + 1;
        let height = read_u24_le(&payload[7..10]) + 1;
        if u64::from(width) * u64::from(height) > u64::from(u32::MAX) {
            return Err(DecodeError::MalformedHeader(format!(
                "canvas {}x{} is too large",
                width, height
            )));
        }
        Ok(Self {
            canvas: Size::new(width, height),
            alpha: flags & VP8X_ALPHA_FLAG != 0,
            animated: flags & VP8X_ANIMATION_FLAG != 0,
        })
    }
}

/// Payload of the `ANIM` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimInfo {
    pub background_color: [u8; 4],
    pub loop_count: u32,
}

impl AnimInfo {
    pub fn parse(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < ANIM_PAYLOAD_SIZE {
            return Err(DecodeError::malformed_chunk(&ANIM, "payload too short"));
        }
        Ok(Self {
            background_color: [payload[0], payload[1], payload[2], payload[3]],
            loop_count: u32::from(read_u16_le(&payload[4..6])),
        })
    }
}

/// Dimensions from the key frame header of a lossy bitstream.
pub fn parse_vp8_size(payload: &[u8]) -> Result<Size, DecodeError> {
    if payload.len() < VP8_HEADER_SIZE {
        return Err(DecodeError::malformed_chunk(&VP8, "frame header is truncated"));
    }
    if payload[0] & 1 != 0 {
        return Err(DecodeError::malformed_chunk(&VP8, "not a key frame"));
    }
    if payload[3..6] != VP8_START_CODE {
        return Err(DecodeError::malformed_chunk(&VP8, "bad start code"));
    }
    let width = u32::from(read_u16_le(&payload[6..8]) & 0x3fff);
    let height = u32::from(read_u16_le(&payload[8..10]) & 0x3fff);
    if width == 0 || height == 0 {
        return Err(DecodeError::malformed_chunk(&VP8, "zero dimension"));
    }
    Ok(Size::new(width, height))
}

/// Header fields of a lossless bitstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vp8lInfo {
    pub size: Size,
    pub alpha_hint: bool,
}

impl Vp8lInfo {
    pub fn parse(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < VP8L_HEADER_SIZE {
            return Err(DecodeError::malformed_chunk(&VP8L, "header is truncated"));
        }
        if payload[0] != VP8L_SIGNATURE {
            return Err(DecodeError::malformed_chunk(&VP8L, "bad signature"));
        }
        let bits = read_u32_le(&payload[1..5]);
        if bits >> 29 != 0 {
            return Err(DecodeError::malformed_chunk(&VP8L, "unknown version"));
        }
        Ok(Self {
            size: Size::new((bits & 0x3fff) + 1, ((bits >> 14) & 0x3fff) + 1),
            alpha_hint: (bits >> 28) & 1 != 0,
        })
    }
}
