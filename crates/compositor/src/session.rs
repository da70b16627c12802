//! Everything the render loop does that does not touch the GPU.
//!
//! A `Session` exists from [`RenderLoop::new`](crate::RenderLoop::new) on, so
//! palette extraction and the color callback keep working when no GPU surface
//! could be created.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::dissolve::{DissolveFrame, DissolveSet};
use crate::extract::{ColorExtractor, Extraction};
use crate::loader::SourceLoader;
use crate::media::MediaBackend;
use crate::scene::{SceneFrame, SceneState};
use crate::types::{ColorCallback, CompositorConfig, SourceDescriptor, SurfaceProps};

pub struct SessionFrame {
    pub scene: SceneFrame,
    pub dissolves: Vec<DissolveFrame>,
}

pub struct Session {
    load_timeout: Option<Duration>,
    extractor: ColorExtractor,
    loader: SourceLoader,
    scene: SceneState,
    dissolves: DissolveSet,
    source: Option<SourceDescriptor>,
    paused: bool,
    on_colors: Option<ColorCallback>,
    last_extraction: Option<Extraction>,
}

impl Session {
    pub fn new(config: &CompositorConfig, media: Arc<dyn MediaBackend>) -> Self {
        Self {
            load_timeout: config.load_timeout,
            extractor: ColorExtractor::new(Arc::clone(&media), config.video_seek),
            loader: SourceLoader::new(Arc::clone(&media)),
            scene: SceneState::new(config),
            dissolves: DissolveSet::new(media, config.dissolve_duration),
            source: None,
            paused: false,
            on_colors: None,
            last_extraction: None,
        }
    }

    pub fn set_color_callback(&mut self, callback: ColorCallback) {
        self.on_colors = Some(callback);
    }

    pub fn source(&self) -> Option<&SourceDescriptor> {
        self.source.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    /// The most recent palette delivered to the callback.
    pub fn last_extraction(&self) -> Option<&Extraction> {
        self.last_extraction.as_ref()
    }

    /// Applies new props. A changed source starts exactly one extraction and
    /// one load; returns whether that happened.
    pub fn set_props(&mut self, props: &SurfaceProps, now: Instant) -> bool {
        self.scene.apply_props(props);
        self.paused = props.paused;

        if props.source == self.source {
            return false;
        }
        self.source = props.source.clone();
        match &self.source {
            Some(source) => {
                info!(source = %source, "source changed");
                self.extractor.request(source.clone(), now);
                self.loader.request(source.clone(), now);
                true
            }
            None => {
                debug!("source cleared; keeping current slots");
                self.extractor.cancel();
                self.loader.cancel();
                false
            }
        }
    }

    /// Drains finished background work and advances the scene by one frame.
    pub fn pump(&mut self, now: Instant) -> SessionFrame {
        if let Some(timeout) = self.load_timeout {
            if let Some(generation) = self.extractor.expire(now, timeout) {
                warn!(generation, ?timeout, "palette extraction timed out");
            }
            if let Some(generation) = self.loader.expire(now, timeout) {
                warn!(generation, ?timeout, "source load timed out");
            }
        }

        if let Some(extraction) = self.extractor.poll() {
            self.deliver(extraction);
        }
        if let Some(loaded) = self.loader.poll() {
            self.scene.offer(loaded);
        }

        SessionFrame {
            scene: self.scene.step(now),
            dissolves: self.dissolves.step(now),
        }
    }

    pub fn dissolve(&mut self, url: &str, initial_color: Option<&str>, now: Instant) -> u64 {
        self.dissolves.start(url, initial_color, now)
    }

    pub fn active_dissolves(&self) -> usize {
        self.dissolves.active()
    }

    pub fn is_dissolving(&self, id: u64) -> bool {
        self.dissolves.is_active(id)
    }

    /// Cancels in-flight work and stops every video. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        self.extractor.cancel();
        self.loader.cancel();
        self.scene.teardown();
        self.dissolves.clear();
    }

    fn deliver(&mut self, extraction: Extraction) {
        debug!(source = %extraction.source, colors = ?extraction.css, "palette extracted");
        self.scene.set_target_palette(extraction.palette);
        if let Some(callback) = self.on_colors.as_mut() {
            callback(&extraction.css);
        }
        self.last_extraction = Some(extraction);
    }
}
