//! Ping-pong texture slots and the crossfade between them.
//!
//! `SlotManager` is pure bookkeeping: it decides which slot receives which
//! pixels and what the mix uniform is this frame. The GPU side applies the
//! resulting [`SlotFrame`] and never mutates slot state itself.

use std::fmt;
use std::time::{Duration, Instant};

use image::RgbaImage;
use tracing::{debug, info};

use crate::media::VideoFeed;
use crate::timeline::Transition;
use crate::types::{CrossfadeCurve, SourceDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotId {
    A,
    B,
}

impl SlotId {
    pub fn other(self) -> Self {
        match self {
            SlotId::A => SlotId::B,
            SlotId::B => SlotId::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            SlotId::A => 0,
            SlotId::B => 1,
        }
    }

    /// Mix value at which this slot is fully shown.
    pub fn resting_mix(self) -> f32 {
        match self {
            SlotId::A => 0.0,
            SlotId::B => 1.0,
        }
    }
}

pub enum SlotContent {
    Still(RgbaImage),
    Video(Box<dyn VideoFeed>),
}

impl fmt::Debug for SlotContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotContent::Still(image) => {
                write!(f, "Still({}x{})", image.width(), image.height())
            }
            SlotContent::Video(_) => f.write_str("Video"),
        }
    }
}

/// A source whose pixels are ready to be committed to a slot.
#[derive(Debug)]
pub struct LoadedSource {
    pub generation: u64,
    pub source: SourceDescriptor,
    pub content: SlotContent,
}

impl LoadedSource {
    /// Drops the content, stopping the decoder of a video.
    pub fn release(self) {
        if let SlotContent::Video(mut feed) = self.content {
            feed.stop();
        }
    }
}

/// Pixels to write into one slot texture this frame.
pub struct SlotUpload {
    pub slot: SlotId,
    pub image: RgbaImage,
}

impl fmt::Debug for SlotUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotUpload")
            .field("slot", &self.slot)
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish()
    }
}

/// Everything the GPU needs from the slot manager for one frame.
#[derive(Debug)]
pub struct SlotFrame {
    pub mix: f32,
    pub has_image: bool,
    pub active: SlotId,
    pub uploads: Vec<SlotUpload>,
    pub transition_started: bool,
    pub transition_finished: bool,
}

pub struct SlotManager {
    active: SlotId,
    has_image: bool,
    mix: f32,
    transition: Option<Transition>,
    staged: Option<LoadedSource>,
    videos: [Option<Box<dyn VideoFeed>>; 2],
    sources: [Option<SourceDescriptor>; 2],
    duration: Duration,
    curve: CrossfadeCurve,
}

impl SlotManager {
    pub fn new(duration: Duration, curve: CrossfadeCurve) -> Self {
        Self {
            active: SlotId::A,
            has_image: false,
            mix: SlotId::A.resting_mix(),
            transition: None,
            staged: None,
            videos: [None, None],
            sources: [None, None],
            duration,
            curve,
        }
    }

    pub fn active(&self) -> SlotId {
        self.active
    }

    pub fn has_image(&self) -> bool {
        self.has_image
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    pub fn source(&self, slot: SlotId) -> Option<&SourceDescriptor> {
        self.sources[slot.index()].as_ref()
    }

    pub fn has_staged(&self) -> bool {
        self.staged.is_some()
    }

    /// Queues a loaded source. It is committed on the next idle frame; a newer
    /// offer replaces one that has not been committed yet.
    pub fn offer(&mut self, loaded: LoadedSource) {
        if let Some(previous) = self.staged.replace(loaded) {
            debug!(source = %previous.source, "staged source superseded before commit");
            previous.release();
        }
    }

    /// Advances one frame.
    pub fn advance(&mut self, now: Instant) -> SlotFrame {
        let mut uploads = Vec::new();
        let mut transition_started = false;
        let mut transition_finished = false;

        if let Some(transition) = self.transition {
            if transition.is_finished(now) {
                self.finish_transition();
                transition_finished = true;
            } else {
                self.mix = transition.mix(now);
            }
        }

        if self.transition.is_none() {
            if let Some(loaded) = self.staged.take() {
                transition_started = self.commit(loaded, now, &mut uploads);
            }
        }

        for slot in [SlotId::A, SlotId::B] {
            if let Some(feed) = self.videos[slot.index()].as_mut() {
                if feed.is_ready() {
                    if let Some(image) = feed.take_frame() {
                        uploads.push(SlotUpload { slot, image });
                    }
                }
            }
        }

        if let Some(feed) = self.videos[self.active.index()].as_mut() {
            if feed.is_paused() && feed.is_ready() {
                feed.play();
            }
        }

        SlotFrame {
            mix: self.mix,
            has_image: self.has_image,
            active: self.active,
            uploads,
            transition_started,
            transition_finished,
        }
    }

    /// Stops every video and forgets all slot content.
    pub fn teardown(&mut self) {
        if let Some(staged) = self.staged.take() {
            staged.release();
        }
        for slot in [SlotId::A, SlotId::B] {
            self.clear_slot(slot);
        }
        self.transition = None;
        self.has_image = false;
        self.active = SlotId::A;
        self.mix = SlotId::A.resting_mix();
    }

    fn finish_transition(&mut self) {
        if let Some(transition) = self.transition.take() {
            self.active = self.active.other();
            self.mix = self.active.resting_mix();
            debug_assert!((transition.target() - self.mix).abs() < f32::EPSILON);
            let inactive = self.active.other();
            if let Some(feed) = self.videos[inactive.index()].as_mut() {
                feed.pause();
            }
            debug!(active = ?self.active, "slot transition finished");
        }
    }

    /// Writes `loaded` into a slot. Returns true when a crossfade started.
    fn commit(
        &mut self,
        loaded: LoadedSource,
        now: Instant,
        uploads: &mut Vec<SlotUpload>,
    ) -> bool {
        let first = !self.has_image;
        let target = if first {
            self.active
        } else {
            self.active.other()
        };
        self.clear_slot(target);

        match loaded.content {
            SlotContent::Still(image) => uploads.push(SlotUpload {
                slot: target,
                image,
            }),
            SlotContent::Video(mut feed) => {
                feed.play();
                self.videos[target.index()] = Some(feed);
            }
        }
        info!(source = %loaded.source, slot = ?target, first, "committed source to slot");
        self.sources[target.index()] = Some(loaded.source);

        if first {
            self.has_image = true;
            self.mix = self.active.resting_mix();
            false
        } else {
            let transition = Transition::new(
                self.active.resting_mix(),
                target.resting_mix(),
                self.duration,
                self.curve,
                now,
            );
            self.mix = transition.mix(now);
            self.transition = Some(transition);
            true
        }
    }

    fn clear_slot(&mut self, slot: SlotId) {
        if let Some(mut feed) = self.videos[slot.index()].take() {
            feed.stop();
        }
        self.sources[slot.index()] = None;
    }
}

impl Drop for SlotManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{solid, MockFeed};

    const TRANSITION: Duration = Duration::from_millis(2000);

    fn still(generation: u64, url: &str) -> LoadedSource {
        LoadedSource {
            generation,
            source: SourceDescriptor::image(url),
            content: SlotContent::Still(solid([generation as u8, 0, 0, 255])),
        }
    }

    fn manager() -> SlotManager {
        SlotManager::new(TRANSITION, CrossfadeCurve::Linear)
    }

    #[test]
    fn first_source_activates_immediately() {
        let mut slots = manager();
        let start = Instant::now();
        slots.offer(still(1, "a.jpg"));
        let frame = slots.advance(start);
        assert!(frame.has_image);
        assert_eq!(frame.mix, 0.0);
        assert_eq!(frame.active, SlotId::A);
        assert!(!frame.transition_started);
        assert_eq!(frame.uploads.len(), 1);
        assert_eq!(frame.uploads[0].slot, SlotId::A);
        assert!(!slots.is_transitioning());
    }

    #[test]
    fn second_source_fades_into_inactive_slot() {
        let mut slots = manager();
        let start = Instant::now();
        slots.offer(still(1, "a.jpg"));
        slots.advance(start);

        slots.offer(still(2, "b.jpg"));
        let frame = slots.advance(start);
        assert!(frame.transition_started);
        assert_eq!(frame.uploads[0].slot, SlotId::B);
        assert_eq!(frame.mix, 0.0);

        let mut previous = 0.0;
        for ms in (0..2000).step_by(100) {
            let frame = slots.advance(start + Duration::from_millis(ms));
            assert!((0.0..=1.0).contains(&frame.mix));
            assert!(frame.mix >= previous);
            previous = frame.mix;
        }

        let frame = slots.advance(start + Duration::from_millis(2001));
        assert!(frame.transition_finished);
        assert_eq!(frame.mix, 1.0);
        assert_eq!(frame.active, SlotId::B);
        assert_eq!(slots.source(SlotId::B).unwrap().url, "b.jpg");
    }

    #[test]
    fn third_source_fades_back_to_slot_a() {
        let mut slots = manager();
        let start = Instant::now();
        slots.offer(still(1, "a.jpg"));
        slots.advance(start);
        slots.offer(still(2, "b.jpg"));
        slots.advance(start);
        slots.advance(start + TRANSITION);

        let later = start + Duration::from_secs(5);
        slots.offer(still(3, "c.jpg"));
        let frame = slots.advance(later);
        assert_eq!(frame.uploads[0].slot, SlotId::A);
        assert_eq!(frame.mix, 1.0);
        let frame = slots.advance(later + Duration::from_millis(1000));
        assert!((frame.mix - 0.5).abs() < 1e-3);
        let frame = slots.advance(later + TRANSITION);
        assert_eq!(frame.mix, 0.0);
        assert_eq!(frame.active, SlotId::A);
    }

    #[test]
    fn source_change_mid_transition_waits_for_completion() {
        let mut slots = manager();
        let start = Instant::now();
        slots.offer(still(1, "a.jpg"));
        slots.advance(start);
        slots.offer(still(2, "b.jpg"));
        slots.advance(start);

        slots.offer(still(3, "c.jpg"));
        slots.offer(still(4, "d.jpg"));
        let frame = slots.advance(start + Duration::from_millis(500));
        assert!(frame.uploads.is_empty());
        assert!(slots.has_staged());

        let frame = slots.advance(start + TRANSITION);
        assert!(frame.transition_finished);
        assert!(frame.transition_started);
        assert_eq!(frame.uploads.len(), 1);
        assert_eq!(frame.uploads[0].slot, SlotId::A);
        assert_eq!(slots.source(SlotId::A).unwrap().url, "d.jpg");
    }

    #[test]
    fn outgoing_video_is_paused_then_stopped_on_reuse() {
        let mut slots = manager();
        let start = Instant::now();
        let (feed, handle) = MockFeed::with_frame(solid([0, 255, 0, 255]));
        slots.offer(LoadedSource {
            generation: 1,
            source: SourceDescriptor::video("clip.mp4"),
            content: SlotContent::Video(Box::new(feed)),
        });
        let frame = slots.advance(start);
        assert_eq!(frame.uploads.len(), 1);
        assert_eq!(frame.uploads[0].slot, SlotId::A);
        assert!(!handle.is_paused());

        slots.offer(still(2, "b.jpg"));
        slots.advance(start);
        handle.push_frame(solid([0, 0, 0, 255]));
        let frame = slots.advance(start + Duration::from_millis(1000));
        assert_eq!(frame.uploads.len(), 1, "outgoing video keeps streaming mid-fade");

        slots.advance(start + Duration::from_millis(2001));
        assert!(handle.is_paused());
        assert!(!handle.is_stopped());

        slots.offer(still(3, "c.jpg"));
        slots.advance(start + Duration::from_millis(3000));
        assert!(handle.is_stopped());
    }

    #[test]
    fn paused_active_video_is_resumed() {
        let mut slots = manager();
        let start = Instant::now();
        let (feed, handle) = MockFeed::with_frame(solid([1, 1, 1, 255]));
        slots.offer(LoadedSource {
            generation: 1,
            source: SourceDescriptor::video("clip.mp4"),
            content: SlotContent::Video(Box::new(feed)),
        });
        slots.advance(start);
        let plays = handle.plays();
        if let Some(feed) = slots.videos[0].as_mut() {
            feed.pause();
        }
        slots.advance(start + Duration::from_millis(16));
        assert!(!handle.is_paused());
        assert_eq!(handle.plays(), plays + 1);
    }

    #[test]
    fn superseded_staged_video_is_stopped() {
        let mut slots = manager();
        let (feed, handle) = MockFeed::with_frame(solid([1, 1, 1, 255]));
        slots.offer(LoadedSource {
            generation: 1,
            source: SourceDescriptor::video("clip.mp4"),
            content: SlotContent::Video(Box::new(feed)),
        });
        slots.offer(still(2, "b.jpg"));
        assert!(handle.is_stopped());
    }

    #[test]
    fn teardown_stops_videos_and_is_repeatable() {
        let mut slots = manager();
        let (feed, handle) = MockFeed::with_frame(solid([1, 1, 1, 255]));
        slots.offer(LoadedSource {
            generation: 1,
            source: SourceDescriptor::video("clip.mp4"),
            content: SlotContent::Video(Box::new(feed)),
        });
        slots.advance(Instant::now());
        slots.teardown();
        slots.teardown();
        assert!(handle.is_stopped());
        assert!(!slots.has_image());
    }
}
