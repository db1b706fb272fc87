//! RIFF chunk primitives

use std::ops::Range;

pub type FourCc = [u8; 4];

pub const RIFF: FourCc = *b"RIFF";
pub const WEBP: FourCc = *b"WEBP";
pub const VP8: FourCc = *b"VP8 ";
pub const VP8L: FourCc = *b"VP8L";
pub const VP8X: FourCc = *b"VP8X";
pub const ALPH: FourCc = *b"ALPH";
pub const ANIM: FourCc = *b"ANIM";
pub const ANMF: FourCc = *b"ANMF";

/// "RIFF" + size + "WEBP"
pub const RIFF_HEADER_SIZE: usize = 12;
/// FourCC + size
pub const CHUNK_HEADER_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub fourcc: FourCc,
    /// Payload size as stored, without the pad byte.
    pub size: u32,
}

impl ChunkHeader {
    /// Parse the 8-byte header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let header = bytes.get(..CHUNK_HEADER_SIZE)?;
        let fourcc = [header[0], header[1], header[2], header[3]];
        Some(Self {
            fourcc,
            size: read_u32_le(&header[4..8]),
        })
    }

    /// Payload size including the pad byte.
    pub fn padded_size(&self) -> usize {
        let size = self.size as usize;
        size + (size & 1)
    }

    /// Header plus padded payload.
    pub fn total_size(&self) -> usize {
        CHUNK_HEADER_SIZE + self.padded_size()
    }
}

/// A chunk found inside a larger payload; ranges are absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubChunk {
    pub fourcc: FourCc,
    pub payload: Range<usize>,
}

/// Walk the chunks packed into `bytes`, which starts at absolute `base`.
///
/// Stops with an error if a chunk claims more bytes than remain.
pub fn sub_chunks(bytes: &[u8], base: usize) -> Result<Vec<SubChunk>, String> {
    let mut chunks = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let header = ChunkHeader::parse(&bytes[offset..])
            .ok_or_else(|| format!("{} stray bytes after last sub-chunk", bytes.len() - offset))?;
        let start = offset + CHUNK_HEADER_SIZE;
        let end = start + header.size as usize;
        if end > bytes.len() {
            return Err(format!(
                "{} sub-chunk claims {} bytes, only {} left",
                String::from_utf8_lossy(&header.fourcc),
                header.size,
                bytes.len() - start
            ));
        }
        chunks.push(SubChunk {
            fourcc: header.fourcc,
            payload: base + start..base + end,
        });
        // The pad byte of the last sub-chunk may be missing.
        offset = (offset + header.total_size()).min(bytes.len());
    }
    Ok(chunks)
}

pub fn read_u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

pub fn read_u24_le(bytes: &[u8]) -> u32 {
    u32::from(bytes[0]) | u32::from(bytes[1]) << 8 | u32::from(bytes[2]) << 16
}

pub fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_header_padding() {
        let header = ChunkHeader::parse(b"VP8L\x05\x00\x00\x00").unwrap();
        assert_eq!(header.fourcc, VP8L);
        assert_eq!(header.size, 5);
        assert_eq!(header.padded_size(), 6);
        assert_eq!(header.total_size(), 14);

        assert_eq!(ChunkHeader::parse(b"VP8L\x05\x00"), None);
    }

    #[test]
    fn test_little_endian_readers() {
        assert_eq!(read_u16_le(&[0x34, 0x12]), 0x1234);
        assert_eq!(read_u24_le(&[0xdf, 0x01, 0x00]), 479);
        assert_eq!(read_u32_le(&[0x86, 0x60, 0x00, 0x00]), 0x6086);
    }

    #[test]
    fn test_sub_chunks_walk() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"ALPH\x03\x00\x00\x00abc\x00");
        bytes.extend_from_slice(b"VP8 \x02\x00\x00\x00xy");
        let chunks = sub_chunks(&bytes, 100).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].fourcc, ALPH);
        assert_eq!(chunks[0].payload, 108..111);
        assert_eq!(chunks[1].fourcc, VP8);
        assert_eq!(chunks[1].payload, 120..122);
    }

    #[test]
    fn test_sub_chunks_overrun() {
        let err = sub_chunks(b"VP8L\xff\x00\x00\x00ab", 0).unwrap_err();
        assert!(err.contains("claims 255 bytes"));
    }
}
