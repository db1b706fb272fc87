//! Error types for the decoder and playback engine

use thiserror::Error;

/// Errors surfaced by the incremental decoder and the frame provider.
///
/// `InsufficientData` is recoverable: more bytes may make the operation
/// succeed. `FrameDecodeFailure` is local to a single frame. Everything else
/// puts the image into its terminal error state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("not enough data yet")]
    InsufficientData,

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("malformed {fourcc} chunk: {reason}")]
    MalformedChunk { fourcc: String, reason: String },

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to decode frame {index}: {reason}")]
    FrameDecodeFailure { index: u32, reason: String },

    #[error("stream ended before the image was complete")]
    Truncated,
}

impl DecodeError {
    /// Whether this error moves the whole image into the `Error` state.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            DecodeError::InsufficientData | DecodeError::FrameDecodeFailure { .. }
        )
    }

    pub(crate) fn malformed_chunk(fourcc: &[u8; 4], reason: impl Into<String>) -> Self {
        DecodeError::MalformedChunk {
            fourcc: String::from_utf8_lossy(fourcc).trim_end().to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors reported by a [`FrameCodec`](crate::decoder::codec::FrameCodec).
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("decoded frame is {actual:?}, expected {expected:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("target buffer holds {actual} bytes, {required} required")]
    BufferTooSmall { required: usize, actual: usize },
}

/// Errors from streaming a reader or file into an image.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
