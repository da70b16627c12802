//! In-memory media backend with controllable load ordering.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use image::RgbaImage;

use crate::media::{MediaBackend, MediaError, VideoFeed};

#[derive(Default)]
struct FeedFlags {
    paused: bool,
    stopped: bool,
    ready: bool,
    plays: u32,
    pending: Option<RgbaImage>,
}

/// Shared view into a [`MockFeed`] for assertions.
#[derive(Clone, Default)]
pub(crate) struct FeedHandle(Arc<Mutex<FeedFlags>>);

impl FeedHandle {
    pub fn is_paused(&self) -> bool {
        self.0.lock().unwrap().paused
    }

    pub fn is_stopped(&self) -> bool {
        self.0.lock().unwrap().stopped
    }

    pub fn plays(&self) -> u32 {
        self.0.lock().unwrap().plays
    }

    pub fn push_frame(&self, frame: RgbaImage) {
        let mut flags = self.0.lock().unwrap();
        flags.pending = Some(frame);
        flags.ready = true;
    }
}

pub(crate) struct MockFeed {
    handle: FeedHandle,
}

impl MockFeed {
    pub fn with_frame(frame: RgbaImage) -> (Self, FeedHandle) {
        let handle = FeedHandle::default();
        handle.push_frame(frame);
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl VideoFeed for MockFeed {
    fn is_ready(&self) -> bool {
        let flags = self.handle.0.lock().unwrap();
        flags.ready && !flags.stopped
    }

    fn take_frame(&mut self) -> Option<RgbaImage> {
        self.handle.0.lock().unwrap().pending.take()
    }

    fn play(&mut self) {
        let mut flags = self.handle.0.lock().unwrap();
        flags.paused = false;
        flags.plays += 1;
    }

    fn pause(&mut self) {
        self.handle.0.lock().unwrap().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.handle.0.lock().unwrap().paused
    }

    fn has_ended(&self) -> bool {
        self.handle.0.lock().unwrap().stopped
    }

    fn stop(&mut self) {
        let mut flags = self.handle.0.lock().unwrap();
        flags.stopped = true;
        flags.ready = false;
        flags.pending = None;
    }
}

#[derive(Default)]
struct MockState {
    images: HashMap<String, RgbaImage>,
    videos: HashMap<String, (RgbaImage, FeedHandle)>,
    gated: HashSet<String>,
    loaded: HashSet<String>,
    seeks: Vec<Duration>,
}

#[derive(Default)]
pub(crate) struct MockMedia {
    state: Mutex<MockState>,
    changed: Condvar,
}

impl MockMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_image(&self, url: &str, image: RgbaImage) {
        self.state
            .lock()
            .unwrap()
            .images
            .insert(url.to_string(), image);
    }

    /// Registers an image whose load blocks until [`MockMedia::release`].
    pub fn add_gated_image(&self, url: &str, image: RgbaImage) {
        let mut state = self.state.lock().unwrap();
        state.images.insert(url.to_string(), image);
        state.gated.insert(url.to_string());
    }

    pub fn add_video(&self, url: &str, frame: RgbaImage) -> FeedHandle {
        let handle = FeedHandle::default();
        self.state
            .lock()
            .unwrap()
            .videos
            .insert(url.to_string(), (frame, handle.clone()));
        handle
    }

    pub fn release(&self, url: &str) {
        self.state.lock().unwrap().gated.remove(url);
        self.changed.notify_all();
    }

    pub fn wait_for_load(&self, url: &str, timeout: Duration) {
        let state = self.state.lock().unwrap();
        let _ = self
            .changed
            .wait_timeout_while(state, timeout, |state| !state.loaded.contains(url))
            .unwrap();
    }

    pub fn seeks(&self) -> Vec<Duration> {
        self.state.lock().unwrap().seeks.clone()
    }

    fn fetch(&self, url: &str) -> Result<RgbaImage, MediaError> {
        let state = self.state.lock().unwrap();
        let mut state = self
            .changed
            .wait_while(state, |state| state.gated.contains(url))
            .unwrap();
        state.loaded.insert(url.to_string());
        let result = state
            .images
            .get(url)
            .cloned()
            .ok_or_else(|| MediaError::Unsupported(url.to_string()));
        drop(state);
        self.changed.notify_all();
        result
    }
}

impl MediaBackend for MockMedia {
    fn load_image(&self, url: &str) -> Result<RgbaImage, MediaError> {
        self.fetch(url)
    }

    fn video_frame_at(&self, url: &str, offset: Duration) -> Result<RgbaImage, MediaError> {
        self.state.lock().unwrap().seeks.push(offset);
        self.fetch(url)
    }

    fn open_video(&self, url: &str) -> Result<Box<dyn VideoFeed>, MediaError> {
        let state = self.state.lock().unwrap();
        let (frame, handle) = state
            .videos
            .get(url)
            .cloned()
            .ok_or_else(|| MediaError::Unsupported(url.to_string()))?;
        drop(state);
        handle.push_frame(frame);
        Ok(Box::new(MockFeed { handle }))
    }
}

pub(crate) fn solid(color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(4, 4, image::Rgba(color))
}
