//! Cheap palette extraction from a still image or one video frame.
//!
//! The source is squeezed into a 50x50 raster and five fixed pixels are read
//! straight out of it: the center and one interior point per quadrant. No
//! clustering or averaging happens, so the same image always yields the same
//! palette.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::debug;

use crate::media::{MediaBackend, MediaError};
use crate::palette::{Palette, Rgb, PALETTE_SIZE};
use crate::request::{RequestToken, RequestTracker};
use crate::types::SourceDescriptor;

pub const RASTER_SIZE: u32 = 50;

/// Center first, then the four quadrant interior points.
pub const SAMPLE_POINTS: [(u32, u32); PALETTE_SIZE] =
    [(25, 25), (10, 10), (40, 40), (10, 40), (40, 10)];

/// Samples the five fixed points. `None` for an image with no pixels.
pub fn sample_palette(image: &RgbaImage) -> Option<Palette> {
    if image.width() == 0 || image.height() == 0 {
        return None;
    }
    let raster = if image.dimensions() == (RASTER_SIZE, RASTER_SIZE) {
        image.clone()
    } else {
        imageops::resize(image, RASTER_SIZE, RASTER_SIZE, FilterType::Triangle)
    };
    let colors = SAMPLE_POINTS.map(|(x, y)| {
        let [r, g, b, _] = raster.get_pixel(x, y).0;
        Rgb::from_bytes([r, g, b])
    });
    Some(Palette(colors))
}

/// Loads `source` and extracts its palette, blocking the calling thread.
pub fn extract_palette(
    media: &dyn MediaBackend,
    source: &SourceDescriptor,
    video_seek: Duration,
) -> Result<Palette, MediaError> {
    let image = if source.is_video {
        media.video_frame_at(&source.url, video_seek)?
    } else {
        media.load_image(&source.url)?
    };
    sample_palette(&image).ok_or_else(|| MediaError::NoFrame {
        url: source.url.clone(),
    })
}

/// One delivered extraction, in both shader and CSS form.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub generation: u64,
    pub source: SourceDescriptor,
    pub palette: Palette,
    pub css: [String; PALETTE_SIZE],
}

/// Runs extractions on worker threads and hands back only the newest result.
pub struct ColorExtractor {
    media: Arc<dyn MediaBackend>,
    video_seek: Duration,
    tracker: RequestTracker,
    tx: Sender<Extraction>,
    rx: Receiver<Extraction>,
}

impl ColorExtractor {
    pub fn new(media: Arc<dyn MediaBackend>, video_seek: Duration) -> Self {
        let (tx, rx) = unbounded();
        Self {
            media,
            video_seek,
            tracker: RequestTracker::new(),
            tx,
            rx,
        }
    }

    /// Starts an extraction and supersedes any still in flight.
    pub fn request(&mut self, source: SourceDescriptor, now: Instant) -> u64 {
        let token = self.tracker.issue(now);
        let generation = token.generation();
        let media = Arc::clone(&self.media);
        let tx = self.tx.clone();
        let seek = self.video_seek;
        let spawned = thread::Builder::new()
            .name("moodwall-extract".into())
            .spawn(move || run_extraction(media.as_ref(), source, seek, token, tx));
        if let Err(err) = spawned {
            debug!(generation, error = %err, "failed to spawn extraction worker");
        }
        generation
    }

    /// Newest current extraction delivered since the last poll.
    pub fn poll(&mut self) -> Option<Extraction> {
        let mut newest = None;
        while let Ok(extraction) = self.rx.try_recv() {
            if let Some(accepted) = self.accept(extraction) {
                newest = Some(accepted);
            }
        }
        newest
    }

    /// Blocks up to `timeout` for the current request's result.
    pub fn wait(&mut self, timeout: Duration) -> Option<Extraction> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(extraction) => {
                    if let Some(accepted) = self.accept(extraction) {
                        return Some(accepted);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.tracker.is_pending()
    }

    pub fn expire(&mut self, now: Instant, timeout: Duration) -> Option<u64> {
        self.tracker.expire(now, timeout)
    }

    pub fn cancel(&mut self) {
        self.tracker.cancel_all();
        while self.rx.try_recv().is_ok() {}
    }

    fn accept(&mut self, extraction: Extraction) -> Option<Extraction> {
        if self.tracker.accepts(extraction.generation) {
            self.tracker.settle(extraction.generation);
            Some(extraction)
        } else {
            debug!(
                generation = extraction.generation,
                source = %extraction.source,
                "discarding stale palette"
            );
            None
        }
    }
}

fn run_extraction(
    media: &dyn MediaBackend,
    source: SourceDescriptor,
    seek: Duration,
    token: RequestToken,
    tx: Sender<Extraction>,
) {
    let result = extract_palette(media, &source, seek);
    if !token.is_current() {
        return;
    }
    match result {
        Ok(palette) => {
            let css = palette.css();
            let _ = tx.send(Extraction {
                generation: token.generation(),
                source,
                palette,
                css,
            });
        }
        Err(err) => {
            debug!(source = %source, error = %err, "palette extraction failed");
        }
    }
}
