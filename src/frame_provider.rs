//! Pull-based access to the current frame.
//!
//! Decoding is deferred until a consumer asks for pixels, and at most one
//! decoded frame is kept alive by the cache.

use std::cell::RefCell;
use std::rc::Rc;

use crate::animated_image::ImageState;
use crate::error::DecodeError;
use crate::render::Image;

/// Single-slot cache of the last decoded frame, plus the last frame that
/// failed so it is not decoded again.
#[derive(Debug, Default)]
pub(crate) struct FrameCache {
    slot: Option<(u32, Image)>,
    failed: Option<(u32, DecodeError)>,
}

impl FrameCache {
    fn get(&self, index: u32) -> Option<Image> {
        match &self.slot {
            Some((cached, image)) if *cached == index => Some(image.clone()),
            _ => None,
        }
    }

    fn failure(&self, index: u32) -> Option<DecodeError> {
        match &self.failed {
            Some((failed, err)) if *failed == index => Some(err.clone()),
            _ => None,
        }
    }

    /// Replace the occupant, releasing the previous frame's pixels.
    fn store(&mut self, index: u32, image: Image) {
        self.slot = Some((index, image));
        self.failed = None;
    }

    fn record_failure(&mut self, index: u32, err: DecodeError) {
        self.failed = Some((index, err));
    }

    pub(crate) fn cached_index(&self) -> Option<u32> {
        self.slot.as_ref().map(|(index, _)| *index)
    }
}

/// Handle renderers poll for the frame that is due now.
///
/// A returned [`Image`] should be treated as valid only until the next
/// [`get_frame`](FrameProvider::get_frame) call.
#[derive(Clone)]
pub struct FrameProvider {
    state: Rc<RefCell<ImageState>>,
}

impl FrameProvider {
    pub(crate) fn new(state: Rc<RefCell<ImageState>>) -> Self {
        Self { state }
    }

    /// The decoded current frame, decoding it only if the cache holds a
    /// different one.
    pub fn get_frame(&self) -> Result<Image, DecodeError> {
        pull_frame(&mut self.state.borrow_mut())
    }

    pub fn current_frame_index(&self) -> u32 {
        self.state.borrow().playback.current_frame_index()
    }

    /// Index of the frame currently held in the cache, if any.
    pub fn cached_frame_index(&self) -> Option<u32> {
        self.state.borrow().cache.cached_index()
    }
}

pub(crate) fn pull_frame(state: &mut ImageState) -> Result<Image, DecodeError> {
    if let Some(err) = state.decoder.error() {
        return Err(err.clone());
    }
    let Some(header) = state.decoder.header().copied() else {
        return Err(DecodeError::InsufficientData);
    };

    let index = state.playback.current_frame_index();
    if let Some(image) = state.cache.get(index) {
        return Ok(image);
    }
    if let Some(err) = state.cache.failure(index) {
        return Err(err);
    }
    let Some(entry) = state.decoder.frame(index) else {
        if state.decoder.is_complete() {
            return Err(DecodeError::FrameDecodeFailure {
                index,
                reason: "stream completed without this frame".to_string(),
            });
        }
        return Err(DecodeError::InsufficientData);
    };

    match state.engine.decode_frame(entry, &header, state.decoder.buffer()) {
        Ok(image) => {
            state.cache.store(index, image.clone());
            Ok(image)
        }
        Err(DecodeError::InsufficientData) => Err(DecodeError::InsufficientData),
        Err(err @ DecodeError::FrameDecodeFailure { .. }) => {
            log::warn!("{}", err);
            state.cache.record_failure(index, err.clone());
            Err(err)
        }
        Err(err) => {
            state.decoder.fail(err.clone());
            let now = state.scheduler.now();
            state.playback.stop(now);
            Err(err)
        }
    }
}
