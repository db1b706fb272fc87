//! Animation timeline: which frame is current, for how long, and what
//! happens when its time is up.

pub mod local;
pub mod scheduler;

use std::time::{Duration, Instant};

use scheduler::TaskHandle;

/// Observable playback position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackTimeline {
    pub current_frame_index: u32,
    pub time_in_current_frame: Duration,
    pub loop_iteration: u32,
    pub playing: bool,
}

/// Outcome of a frame timer firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved to a new frame; schedule the next transition after this delay.
    Next(Duration),
    /// Reached the last located frame of an incomplete stream.
    Park,
    /// Loop count exhausted, stopped on the last frame.
    Halt,
    /// Not playing; nothing happened.
    Idle,
}

/// Playback state machine (`Stopped <-> Playing`).
///
/// Owns the per-frame duration table. It decides transitions but does not
/// post tasks itself; the owner schedules [`Advance::Next`] delays and hands
/// back the resulting [`TaskHandle`].
#[derive(Debug, Default)]
pub struct Playback {
    timeline: PlaybackTimeline,
    durations: Vec<Duration>,
    frame_started_at: Option<Instant>,
    pending: Option<TaskHandle>,
    parked: bool,
}

impl Playback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the (already floored) duration of the next located frame.
    pub fn push_duration(&mut self, duration: Duration) {
        self.durations.push(duration);
    }

    pub fn frame_count(&self) -> u32 {
        self.durations.len() as u32
    }

    pub fn duration_of(&self, index: u32) -> Option<Duration> {
        self.durations.get(index as usize).copied()
    }

    pub fn is_playing(&self) -> bool {
        self.timeline.playing
    }

    pub fn is_parked(&self) -> bool {
        self.parked
    }

    pub fn current_frame_index(&self) -> u32 {
        self.timeline.current_frame_index
    }

    pub fn loop_iteration(&self) -> u32 {
        self.timeline.loop_iteration
    }

    pub fn timeline(&self, now: Instant) -> PlaybackTimeline {
        PlaybackTimeline {
            time_in_current_frame: self.time_in_current_frame(now),
            ..self.timeline
        }
    }

    pub fn time_in_current_frame(&self, now: Instant) -> Duration {
        match (self.timeline.playing, self.frame_started_at) {
            (true, Some(started)) => now.saturating_duration_since(started),
            _ => self.timeline.time_in_current_frame,
        }
    }

    /// Start playing. Returns the delay to schedule, or `None` if already
    /// playing.
    pub fn start(&mut self, now: Instant) -> Option<Duration> {
        if self.timeline.playing {
            return None;
        }
        let delay = self.duration_of(self.timeline.current_frame_index)?;
        self.timeline.playing = true;
        self.timeline.time_in_current_frame = Duration::ZERO;
        self.frame_started_at = Some(now);
        Some(delay)
    }

    /// Stop and cancel any pending transition. The position is kept.
    /// Returns whether anything changed.
    pub fn stop(&mut self, now: Instant) -> bool {
        if !self.timeline.playing {
            return false;
        }
        self.timeline.time_in_current_frame = self.time_in_current_frame(now);
        self.timeline.playing = false;
        self.parked = false;
        self.cancel_pending();
        true
    }

    pub fn set_pending(&mut self, handle: TaskHandle) {
        self.cancel_pending();
        self.pending = Some(handle);
    }

    pub fn has_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(TaskHandle::is_pending)
    }

    pub fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.cancel();
        }
    }

    /// The current frame's time is up.
    ///
    /// `complete` says whether more frames can still arrive; `loop_count`
    /// of zero loops forever.
    pub fn on_timer(&mut self, now: Instant, complete: bool, loop_count: u32) -> Advance {
        self.pending = None;
        if !self.timeline.playing {
            return Advance::Idle;
        }

        let next = self.timeline.current_frame_index + 1;
        if next < self.frame_count() {
            return self.enter_frame(next, now);
        }
        if !complete {
            self.parked = true;
            return Advance::Park;
        }

        self.timeline.loop_iteration += 1;
        if loop_count != 0 && self.timeline.loop_iteration >= loop_count {
            self.timeline.time_in_current_frame = self.time_in_current_frame(now);
            self.timeline.playing = false;
            return Advance::Halt;
        }
        self.enter_frame(0, now)
    }

    /// Retry a parked transition after new frames arrived or the stream
    /// completed.
    pub fn resume(&mut self, now: Instant, complete: bool, loop_count: u32) -> Option<Advance> {
        if !self.parked {
            return None;
        }
        self.parked = false;
        Some(self.on_timer(now, complete, loop_count))
    }

    fn enter_frame(&mut self, index: u32, now: Instant) -> Advance {
        self.timeline.current_frame_index = index;
        self.timeline.time_in_current_frame = Duration::ZERO;
        self.frame_started_at = Some(now);
        // Every index below frame_count() has a duration.
        Advance::Next(self.durations[index as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn playback(durations: &[u64]) -> Playback {
        let mut playback = Playback::new();
        for &d in durations {
            playback.push_duration(ms(d));
        }
        playback
    }

    #[test]
    fn test_start_is_idempotent() {
        let now = Instant::now();
        let mut playback = playback(&[100, 200]);
        assert_eq!(playback.start(now), Some(ms(100)));
        assert_eq!(playback.start(now), None);
        assert!(playback.is_playing());
    }

    #[test]
    fn test_stop_keeps_position() {
        let now = Instant::now();
        let mut playback = playback(&[100, 200, 300]);
        playback.start(now);
        assert_eq!(playback.on_timer(now, true, 0), Advance::Next(ms(200)));

        assert!(playback.stop(now + ms(50)));
        assert!(!playback.stop(now + ms(80)));
        assert_eq!(playback.current_frame_index(), 1);
        assert_eq!(playback.time_in_current_frame(now + ms(500)), ms(50));
    }

    #[test]
    fn test_wraps_and_counts_loops() {
        let now = Instant::now();
        let mut playback = playback(&[10, 20]);
        playback.start(now);
        assert_eq!(playback.on_timer(now, true, 0), Advance::Next(ms(20)));
        assert_eq!(playback.on_timer(now, true, 0), Advance::Next(ms(10)));
        assert_eq!(playback.current_frame_index(), 0);
        assert_eq!(playback.loop_iteration(), 1);
    }

    #[test]
    fn test_halts_on_last_frame_after_loop_count() {
        let now = Instant::now();
        let mut playback = playback(&[10, 20, 30]);
        playback.start(now);
        let mut advances = Vec::new();
        loop {
            let advance = playback.on_timer(now, true, 2);
            advances.push(advance);
            if advance == Advance::Halt {
                break;
            }
        }

        // Two full traversals: 0->1->2->0->1->2, then halt.
        assert_eq!(advances.len(), 6);
        assert_eq!(playback.current_frame_index(), 2);
        assert_eq!(playback.loop_iteration(), 2);
        assert!(!playback.is_playing());
        assert_eq!(playback.on_timer(now, true, 2), Advance::Idle);
    }

    #[test]
    fn test_parks_until_complete() {
        let now = Instant::now();
        let mut playback = playback(&[10, 20]);
        playback.start(now);
        playback.on_timer(now, false, 0);
        assert_eq!(playback.on_timer(now, false, 0), Advance::Park);
        assert!(playback.is_parked());
        assert_eq!(playback.current_frame_index(), 1);

        playback.push_duration(ms(30));
        assert_eq!(playback.resume(now, false, 0), Some(Advance::Next(ms(30))));
        assert_eq!(playback.current_frame_index(), 2);
        assert_eq!(playback.resume(now, false, 0), None);
    }

    #[test]
    fn test_stop_cancels_pending_task() {
        let now = Instant::now();
        let mut playback = playback(&[10, 20]);
        playback.start(now);
        assert!(!playback.has_pending());

        let (_task, handle) = scheduler::ScheduledTask::new(Box::new(|| {}));
        playback.set_pending(handle.clone());
        assert!(playback.has_pending());

        assert!(playback.stop(now));
        assert!(!playback.has_pending());
        assert!(!handle.is_pending());
    }
}
