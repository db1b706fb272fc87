use std::time::Duration;

/// Minimum time a frame stays on screen (60fps)
pub const DEFAULT_MIN_FRAME_DURATION: Duration = Duration::from_millis(16);

/// Chunk size used when streaming from a reader
pub const DEFAULT_READ_CHUNK_SIZE: usize = 16 * 1024;

/// Tunables for decoding and playback of a single image.
#[derive(Debug, Clone)]
pub struct DecoderOptions {
    /// Frame durations shorter than this (including zero) are raised to it.
    pub min_frame_duration: Duration,
    /// Frames with alpha are produced premultiplied instead of straight.
    pub premultiply_alpha: bool,
    /// Pull the new current frame through the frame provider on every
    /// playback advance instead of waiting for a consumer to ask.
    pub decode_on_advance: bool,
    /// Bytes per `append_chunk` call in [`AnimatedImage::append_reader`].
    ///
    /// [`AnimatedImage::append_reader`]: crate::AnimatedImage::append_reader
    pub read_chunk_size: usize,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            min_frame_duration: DEFAULT_MIN_FRAME_DURATION,
            premultiply_alpha: true,
            decode_on_advance: false,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

impl DecoderOptions {
    /// Apply the duration floor.
    pub fn clamp_duration(&self, duration: Duration) -> Duration {
        duration.max(self.min_frame_duration)
    }
}
