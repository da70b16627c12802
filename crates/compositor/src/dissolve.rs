//! Departure overlays shown when an item leaves the board.
//!
//! Each effect owns one texture that starts as a 1x1 placeholder of the
//! item's initial color and is replaced once the image decodes. Its palette
//! is taken straight from that image without easing.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use image::RgbaImage;
use tracing::{debug, info};

use crate::extract::sample_palette;
use crate::media::MediaBackend;
use crate::palette::{parse_css_rgb, Palette};
use crate::timeline::DissolveTimeline;

/// State of one overlay for the current frame.
#[derive(Debug)]
pub struct DissolveFrame {
    pub id: u64,
    pub progress: f32,
    pub alpha: f32,
    /// Seconds since the effect started.
    pub time: f32,
    pub palette: Palette,
    pub placeholder: [u8; 4],
    /// Decoded image, delivered once.
    pub upload: Option<RgbaImage>,
    /// Last frame of this effect; its GPU resources can be dropped afterwards.
    pub finished: bool,
}

struct DissolveEffect {
    id: u64,
    url: String,
    start: Instant,
    timeline: DissolveTimeline,
    placeholder: [u8; 4],
    palette: Palette,
    loaded: Option<Receiver<(RgbaImage, Palette)>>,
}

pub struct DissolveSet {
    media: Arc<dyn MediaBackend>,
    duration: Duration,
    next_id: u64,
    effects: Vec<DissolveEffect>,
}

impl DissolveSet {
    pub fn new(media: Arc<dyn MediaBackend>, duration: Duration) -> Self {
        Self {
            media,
            duration,
            next_id: 0,
            effects: Vec::new(),
        }
    }

    /// Starts an overlay for `url`. `initial_color` is a CSS `rgb(...)` or
    /// `rgba(...)` string; anything else falls back to white.
    pub fn start(&mut self, url: &str, initial_color: Option<&str>, now: Instant) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        let [r, g, b] = initial_color
            .and_then(parse_css_rgb)
            .unwrap_or([255, 255, 255]);

        let (tx, rx) = bounded(1);
        let media = Arc::clone(&self.media);
        let target = url.to_string();
        let spawned = thread::Builder::new()
            .name("moodwall-dissolve".into())
            .spawn(move || match media.load_image(&target) {
                Ok(image) => {
                    let palette = sample_palette(&image).unwrap_or(Palette::DISSOLVE);
                    let _ = tx.send((image, palette));
                }
                Err(err) => debug!(url = %target, error = %err, "dissolve image failed to load"),
            });
        let loaded = match spawned {
            Ok(_) => Some(rx),
            Err(err) => {
                debug!(id, error = %err, "failed to spawn dissolve worker");
                None
            }
        };

        info!(id, url, "dissolve started");
        self.effects.push(DissolveEffect {
            id,
            url: url.to_string(),
            start: now,
            timeline: DissolveTimeline::new(self.duration, now),
            placeholder: [r, g, b, 255],
            palette: Palette::DISSOLVE,
            loaded,
        });
        id
    }

    /// Number of overlays still animating.
    pub fn active(&self) -> usize {
        self.effects.len()
    }

    pub fn is_active(&self, id: u64) -> bool {
        self.effects.iter().any(|effect| effect.id == id)
    }

    /// Advances every overlay. Finished ones report once with `finished` set
    /// and are then forgotten.
    pub fn step(&mut self, now: Instant) -> Vec<DissolveFrame> {
        let mut frames = Vec::with_capacity(self.effects.len());
        for effect in &mut self.effects {
            let mut upload = None;
            if let Some(rx) = effect.loaded.as_ref() {
                match rx.try_recv() {
                    Ok((image, palette)) => {
                        effect.palette = palette;
                        upload = Some(image);
                        effect.loaded = None;
                    }
                    Err(TryRecvError::Disconnected) => effect.loaded = None,
                    Err(TryRecvError::Empty) => {}
                }
            }
            let finished = effect.timeline.is_finished(now);
            frames.push(DissolveFrame {
                id: effect.id,
                progress: effect.timeline.progress(now),
                alpha: effect.timeline.alpha(now),
                time: now.saturating_duration_since(effect.start).as_secs_f32(),
                palette: effect.palette,
                placeholder: effect.placeholder,
                upload,
                finished,
            });
        }
        self.effects.retain(|effect| {
            let done = effect.timeline.is_finished(now);
            if done {
                debug!(id = effect.id, url = %effect.url, "dissolve finished");
            }
            !done
        });
        frames
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }
}
