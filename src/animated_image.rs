//! The image object: an incrementally fed container, a frame decoder, a
//! playback timeline, and the frame provider renderers pull from.
//!
//! Everything runs on the caller's sequence. Frame transitions are delayed
//! tasks posted to a [`TaskScheduler`]; the only asynchronous entry point is
//! the timer callback, which holds a weak reference and is revoked when the
//! image is dropped or stopped.

use std::cell::RefCell;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::decoder::codec::{FrameCodec, WebPCodec};
use crate::decoder::engine::FrameDecoder;
use crate::decoder::{ContainerDecoder, DecoderState, FrameMetadata, ImageHeader};
use crate::error::{DecodeError, LoadError};
use crate::frame_provider::{pull_frame, FrameCache, FrameProvider};
use crate::options::DecoderOptions;
use crate::playback::scheduler::TaskScheduler;
use crate::playback::{Advance, Playback, PlaybackTimeline};
use crate::render::ResourceProvider;

pub(crate) struct ImageState {
    pub(crate) decoder: ContainerDecoder,
    pub(crate) engine: FrameDecoder,
    pub(crate) playback: Playback,
    pub(crate) cache: FrameCache,
    pub(crate) scheduler: Rc<dyn TaskScheduler>,
    options: DecoderOptions,
}

impl ImageState {
    fn now(&self) -> Instant {
        self.scheduler.now()
    }

    fn loop_count(&self) -> u32 {
        self.decoder.header().map_or(0, |h| h.loop_count)
    }
}

/// An animated (or still) image fed incrementally.
pub struct AnimatedImage {
    state: Rc<RefCell<ImageState>>,
}

impl AnimatedImage {
    /// Image decoding with [`WebPCodec`] and default options.
    pub fn new(provider: Rc<dyn ResourceProvider>, scheduler: Rc<dyn TaskScheduler>) -> Self {
        Self::with_options(provider, scheduler, Box::new(WebPCodec), DecoderOptions::default())
    }

    pub fn with_options(
        provider: Rc<dyn ResourceProvider>,
        scheduler: Rc<dyn TaskScheduler>,
        codec: Box<dyn FrameCodec>,
        options: DecoderOptions,
    ) -> Self {
        let state = ImageState {
            decoder: ContainerDecoder::new(),
            engine: FrameDecoder::new(provider, codec, options.premultiply_alpha),
            playback: Playback::new(),
            cache: FrameCache::default(),
            scheduler,
            options,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Feed the next piece of the stream. Chunk boundaries are arbitrary and
    /// empty chunks are ignored.
    pub fn append_chunk(&self, bytes: &[u8]) -> Result<DecoderState, DecodeError> {
        let mut state = self.state.borrow_mut();
        let result = state.decoder.append_chunk(bytes);
        Self::sync_frames(&self.state, &mut state);
        if result.is_err() {
            let now = state.now();
            state.playback.stop(now);
        }
        result
    }

    /// No more bytes will arrive.
    pub fn finish(&self) -> Result<DecoderState, DecodeError> {
        let mut state = self.state.borrow_mut();
        let result = state.decoder.finish();
        Self::sync_frames(&self.state, &mut state);
        if result.is_err() {
            let now = state.now();
            state.playback.stop(now);
        }
        result
    }

    /// Stream `reader` into the image in `read_chunk_size` pieces.
    pub fn append_reader<R: Read>(&self, mut reader: R) -> Result<DecoderState, LoadError> {
        let chunk_size = self.state.borrow().options.read_chunk_size.max(1);
        let mut chunk = vec![0u8; chunk_size];
        let mut total = 0usize;
        let mut decoder_state = self.state();
        loop {
            let read = reader.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            total += read;
            decoder_state = self.append_chunk(&chunk[..read])?;
        }
        log::debug!("Streamed {} bytes in {} byte chunks", total, chunk_size);
        Ok(decoder_state)
    }

    /// Stream a whole file and finish the image.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<DecoderState, LoadError> {
        log::info!("Opening WebP file: {:?}", path.as_ref());
        let file = File::open(path.as_ref())?;
        self.append_reader(file)?;
        Ok(self.finish()?)
    }

    /// Start advancing frames. Does nothing for stills, single-frame
    /// animations, or if already playing.
    pub fn play(&self) {
        let mut state = self.state.borrow_mut();
        if state.decoder.error().is_some() {
            log::debug!("Play ignored, image is in the error state");
            return;
        }
        let Some(header) = state.decoder.header().copied() else {
            log::debug!("Play ignored, header not parsed yet");
            return;
        };
        if !header.is_animated || state.decoder.frame_count() <= 1 {
            log::debug!("Play ignored, nothing to animate");
            return;
        }

        let now = state.now();
        if let Some(delay) = state.playback.start(now) {
            log::info!(
                "Animation playback: PLAYING from frame {} ({:?})",
                state.playback.current_frame_index(),
                delay
            );
            Self::schedule(&self.state, &mut state, delay);
        }
    }

    /// Cancel the pending transition. The position is kept.
    pub fn stop(&self) {
        let mut state = self.state.borrow_mut();
        let now = state.now();
        if state.playback.stop(now) {
            log::info!(
                "Animation playback: STOPPED at frame {}",
                state.playback.current_frame_index()
            );
        }
    }

    pub fn frame_provider(&self) -> FrameProvider {
        FrameProvider::new(self.state.clone())
    }

    /// Zero until the header is known. A complete single-frame animation
    /// reports 1.
    pub fn loop_count(&self) -> u32 {
        let state = self.state.borrow();
        match state.decoder.header() {
            None => 0,
            Some(header)
                if header.is_animated
                    && state.decoder.is_complete()
                    && state.decoder.frame_count() == 1 =>
            {
                1
            }
            Some(header) => header.loop_count,
        }
    }

    pub fn frame_count(&self) -> u32 {
        self.state.borrow().decoder.frame_count()
    }

    pub fn current_frame_index(&self) -> u32 {
        self.state.borrow().playback.current_frame_index()
    }

    pub fn loop_iteration(&self) -> u32 {
        self.state.borrow().playback.loop_iteration()
    }

    pub fn is_playing(&self) -> bool {
        self.state.borrow().playback.is_playing()
    }

    pub fn time_in_current_frame(&self) -> Duration {
        let state = self.state.borrow();
        state.playback.time_in_current_frame(state.now())
    }

    pub fn timeline(&self) -> PlaybackTimeline {
        let state = self.state.borrow();
        state.playback.timeline(state.now())
    }

    pub fn header(&self) -> Option<ImageHeader> {
        self.state.borrow().decoder.header().copied()
    }

    pub fn state(&self) -> DecoderState {
        self.state.borrow().decoder.state()
    }

    pub fn error(&self) -> Option<DecodeError> {
        self.state.borrow().decoder.error().cloned()
    }

    pub fn frame_metadata(&self, index: u32) -> Option<FrameMetadata> {
        self.state.borrow().decoder.frame(index).map(|f| f.metadata)
    }

    /// Bring the duration table up to date and resume a parked timeline.
    fn sync_frames(rc: &Rc<RefCell<ImageState>>, state: &mut ImageState) {
        if !state.decoder.header().is_some_and(|h| h.is_animated) {
            return;
        }
        let known = state.playback.frame_count() as usize;
        let fresh: Vec<Duration> = state.decoder.frames()[known..]
            .iter()
            .map(|frame| state.options.clamp_duration(frame.metadata.duration))
            .collect();
        for duration in fresh {
            state.playback.push_duration(duration);
        }

        let now = state.now();
        let complete = state.decoder.is_complete();
        let loop_count = state.loop_count();
        if let Some(advance) = state.playback.resume(now, complete, loop_count) {
            Self::apply_advance(rc, state, advance);
        }
    }

    fn schedule(rc: &Rc<RefCell<ImageState>>, state: &mut ImageState, delay: Duration) {
        let weak = Rc::downgrade(rc);
        let handle = state.scheduler.post_delayed_task(
            delay,
            Box::new(move || {
                if let Some(rc) = weak.upgrade() {
                    Self::on_frame_timer(&rc);
                }
            }),
        );
        state.playback.set_pending(handle);
    }

    fn on_frame_timer(rc: &Rc<RefCell<ImageState>>) {
        let Ok(mut state) = rc.try_borrow_mut() else {
            log::error!("Frame timer fired while the image was busy, skipping");
            return;
        };
        let now = state.now();
        let complete = state.decoder.is_complete();
        let loop_count = state.loop_count();
        let advance = state.playback.on_timer(now, complete, loop_count);
        Self::apply_advance(rc, &mut state, advance);
    }

    fn apply_advance(rc: &Rc<RefCell<ImageState>>, state: &mut ImageState, advance: Advance) {
        match advance {
            Advance::Next(delay) => {
                log::trace!(
                    "Frame {} for {:?}",
                    state.playback.current_frame_index(),
                    delay
                );
                Self::schedule(rc, state, delay);
                if state.options.decode_on_advance {
                    if let Err(err) = pull_frame(state) {
                        log::warn!(
                            "Frame {} unavailable: {}",
                            state.playback.current_frame_index(),
                            err
                        );
                    }
                }
            }
            Advance::Park => {
                log::debug!(
                    "Waiting for frame {} to arrive",
                    state.playback.current_frame_index() + 1
                );
            }
            Advance::Halt => {
                log::info!(
                    "Animation finished after {} loop(s) on frame {}",
                    state.playback.loop_iteration(),
                    state.playback.current_frame_index()
                );
            }
            Advance::Idle => {}
        }
    }
}

impl Drop for AnimatedImage {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            let now = state.now();
            state.playback.stop(now);
            state.playback.cancel_pending();
        }
    }
}
