//! Incremental animated WebP decoding and timer-driven playback.
//!
//! Bytes are appended to an [`AnimatedImage`] as they arrive. The container
//! header and frame boundaries are parsed as soon as they are complete,
//! frames are decoded lazily through a [`FrameProvider`], and playback
//! advances frames with delayed tasks on a [`TaskScheduler`].

pub mod animated_image;
pub mod decoder;
pub mod error;
pub mod frame_provider;
pub mod options;
pub mod playback;
pub mod render;

#[cfg(test)]
mod test_support;

pub use animated_image::AnimatedImage;
pub use decoder::codec::{FrameBitstream, FrameCodec, WebPCodec};
pub use decoder::{DecoderState, FrameMetadata, ImageHeader};
pub use error::{CodecError, DecodeError, LoadError};
pub use frame_provider::FrameProvider;
pub use options::DecoderOptions;
pub use playback::local::LocalTimerScheduler;
pub use playback::scheduler::{ManualScheduler, TaskHandle, TaskScheduler};
pub use playback::PlaybackTimeline;
pub use render::{
    AlphaFormat, Image, ImageData, ImageDataDescriptor, PixelFormat, ResourceProvider, Size,
    SoftwareResourceProvider,
};
