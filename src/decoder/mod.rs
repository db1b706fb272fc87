pub mod buffer;
pub mod chunk;
pub mod codec;
pub mod engine;
pub mod frame;
pub mod header;
pub mod rgb_conversion;

use std::ops::Range;

use buffer::ByteBuffer;
use chunk::{ChunkHeader, ALPH, ANIM, ANMF, CHUNK_HEADER_SIZE, VP8, VP8L, VP8X};
use frame::{parse_anmf, still_entry, FrameEntry};
use header::{AnimInfo, HeaderParser, Layout, ParsedHeader};

use crate::error::DecodeError;

pub use frame::FrameMetadata;
pub use header::ImageHeader;

/// Where the incremental decoder is in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    WaitingForHeader,
    ReadingFrames,
    Error,
    Finished,
}

/// Incremental container decoder.
///
/// Accumulates appended bytes, parses the header once enough of it has
/// arrived, then locates frames as their chunks complete. Pixel decoding is
/// left to [`engine::FrameDecoder`].
#[derive(Debug)]
pub struct ContainerDecoder {
    buffer: ByteBuffer,
    header_parser: HeaderParser,
    parsed: Option<ParsedHeader>,
    state: DecoderState,
    error: Option<DecodeError>,
    frames: Vec<FrameEntry>,
    /// `ALPH` payload waiting for the still bitstream that follows it.
    pending_alpha: Option<Range<usize>>,
    /// The `ANIM` chunk of an animated image has been read.
    anim_seen: bool,
    /// Every byte of the container has been parsed.
    complete: bool,
}

impl Default for ContainerDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerDecoder {
    pub fn new() -> Self {
        Self {
            buffer: ByteBuffer::new(),
            header_parser: HeaderParser::new(),
            parsed: None,
            state: DecoderState::WaitingForHeader,
            error: None,
            frames: Vec::new(),
            pending_alpha: None,
            anim_seen: false,
            complete: false,
        }
    }

    /// Append a chunk of the stream and parse whatever it completes.
    ///
    /// Once in the error state every call returns the same error.
    pub fn append_chunk(&mut self, bytes: &[u8]) -> Result<DecoderState, DecodeError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if self.state == DecoderState::Finished {
            log::debug!("Ignoring {} bytes appended after finish", bytes.len());
            return Ok(self.state);
        }
        if bytes.is_empty() {
            return Ok(self.state);
        }

        self.buffer.append(bytes);
        if let Err(err) = self.parse() {
            self.fail(err.clone());
            return Err(err);
        }
        Ok(self.state)
    }

    /// Signal that no more bytes will arrive.
    pub fn finish(&mut self) -> Result<DecoderState, DecodeError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        match self.state {
            DecoderState::WaitingForHeader => {
                self.fail(DecodeError::Truncated);
                Err(DecodeError::Truncated)
            }
            DecoderState::ReadingFrames => {
                let still = self.header().is_some_and(|h| !h.is_animated);
                if still && self.frames.is_empty() {
                    self.fail(DecodeError::Truncated);
                    return Err(DecodeError::Truncated);
                }
                if !self.complete && !self.buffer.unconsumed().is_empty() {
                    log::warn!(
                        "Stream finished inside a chunk, dropping {} trailing bytes",
                        self.buffer.unconsumed().len()
                    );
                }
                self.complete = true;
                self.state = DecoderState::Finished;
                log::info!("Stream finished with {} frame(s)", self.frame_count());
                Ok(self.state)
            }
            DecoderState::Finished | DecoderState::Error => Ok(self.state),
        }
    }

    /// Move to the terminal error state.
    pub fn fail(&mut self, err: DecodeError) {
        if self.error.is_none() {
            log::error!("Decoder failed: {}", err);
            self.error = Some(err);
        }
        self.state = DecoderState::Error;
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn error(&self) -> Option<&DecodeError> {
        self.error.as_ref()
    }

    pub fn header(&self) -> Option<&ImageHeader> {
        self.parsed.as_ref().map(|p| &p.header)
    }

    /// No more frames can appear: the container end was reached or the
    /// stream was finished.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Zero before the header, 1 for stills, located frames for animations.
    pub fn frame_count(&self) -> u32 {
        match self.header() {
            None => 0,
            Some(header) if !header.is_animated => 1,
            Some(_) => self.frames.len() as u32,
        }
    }

    pub fn frame(&self, index: u32) -> Option<&FrameEntry> {
        self.frames.get(index as usize)
    }

    pub fn frames(&self) -> &[FrameEntry] {
        &self.frames
    }

    pub fn buffer(&self) -> &ByteBuffer {
        &self.buffer
    }

    fn parse(&mut self) -> Result<(), DecodeError> {
        if self.parsed.is_none() {
            match self.header_parser.advance(&mut self.buffer)? {
                Some(parsed) => {
                    self.parsed = Some(parsed);
                    self.state = DecoderState::ReadingFrames;
                }
                None => return Ok(()),
            }
        }
        self.parse_frames()
    }

    fn parse_frames(&mut self) -> Result<(), DecodeError> {
        let Some(parsed) = self.parsed else {
            return Ok(());
        };
        while !self.complete {
            let start = self.buffer.position();
            if start >= parsed.riff_end {
                self.complete = true;
                if !parsed.header.is_animated && self.frames.is_empty() {
                    return Err(DecodeError::MalformedHeader(
                        "still image has no bitstream chunk".to_string(),
                    ));
                }
                if parsed.header.is_animated && !self.anim_seen {
                    return Err(DecodeError::MalformedHeader(
                        "animated image has no ANIM chunk".to_string(),
                    ));
                }
                log::info!("Container complete, {} frame(s)", self.frame_count());
                break;
            }

            let Some(chunk) = ChunkHeader::parse(self.buffer.unconsumed()) else {
                break;
            };
            let payload_start = start + CHUNK_HEADER_SIZE;
            let payload = payload_start..payload_start + chunk.size as usize;
            if payload.end > parsed.riff_end {
                return Err(DecodeError::malformed_chunk(
                    &chunk.fourcc,
                    "chunk extends past the end of the container",
                ));
            }
            // The final pad byte may be cut off by the container size.
            let needed = chunk.total_size().min(parsed.riff_end - start);
            if self.buffer.unconsumed().len() < needed {
                break;
            }

            self.handle_chunk(&parsed, chunk.fourcc, payload)?;
            self.buffer.consume(needed);
        }
        Ok(())
    }

    fn handle_chunk(
        &mut self,
        parsed: &ParsedHeader,
        fourcc: chunk::FourCc,
        payload: Range<usize>,
    ) -> Result<(), DecodeError> {
        let bytes = self
            .buffer
            .slice(payload.clone())
            .ok_or(DecodeError::InsufficientData)?;
        let canvas = parsed.header.canvas_size();

        match (parsed.layout, fourcc) {
            (Layout::Animated, ANIM) if !self.anim_seen => {
                let anim = AnimInfo::parse(bytes)?;
                if let Some(parsed) = self.parsed.as_mut() {
                    parsed.header.loop_count = anim.loop_count;
                    parsed.header.background_color = Some(anim.background_color);
                }
                self.anim_seen = true;
                log::info!("Animation loops: {}", anim.loop_count);
            }
            (Layout::Animated, ANMF) if !self.anim_seen => {
                return Err(DecodeError::malformed_chunk(&ANMF, "frame before the ANIM chunk"));
            }
            (Layout::Animated, ANMF) => {
                let index = self.frames.len() as u32;
                let entry = parse_anmf(index, bytes, payload.start, canvas)?;
                log::debug!(
                    "Located frame {}: {} at ({}, {}), {:?}",
                    index,
                    entry.metadata.size(),
                    entry.metadata.offset_x,
                    entry.metadata.offset_y,
                    entry.metadata.duration
                );
                self.frames.push(entry);
            }
            (Layout::Animated, VP8 | VP8L | ALPH) => {
                return Err(DecodeError::malformed_chunk(
                    &fourcc,
                    "bitstream outside of an ANMF chunk",
                ));
            }
            (Layout::Simple | Layout::ExtendedStill, _) if !self.frames.is_empty() => {
                log::debug!("Skipping trailing {:?} chunk", String::from_utf8_lossy(&fourcc));
            }
            (Layout::ExtendedStill, ALPH) => {
                self.pending_alpha = Some(payload);
            }
            (Layout::Simple | Layout::ExtendedStill, VP8 | VP8L) => {
                let alpha = self.pending_alpha.take();
                self.frames.push(still_entry(fourcc, payload, bytes, alpha, canvas));
                log::debug!("Located still bitstream");
            }
            (_, ANIM | VP8X) => {
                log::warn!("Ignoring duplicate {:?} chunk", String::from_utf8_lossy(&fourcc));
            }
            _ => {
                log::debug!("Skipping {:?} chunk", String::from_utf8_lossy(&fourcc));
            }
        }
        Ok(())
    }
}
