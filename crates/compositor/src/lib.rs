//! Generative mood-board background compositor.
//!
//! The crate renders an animated fluid-noise field tinted by a five-color
//! palette and layers the current board item on top of it, crossfading
//! between two texture slots whenever the item changes:
//!
//! ```text
//!   host ──SurfaceProps──▶ RenderLoop ──▶ Session ──┬─▶ ColorExtractor (worker) ─▶ palette target
//!                              │                     ├─▶ SourceLoader   (worker) ─▶ SlotManager
//!                              │                     └─▶ DissolveSet    (worker) ─▶ overlays
//!                              ▼
//!                         GpuState ──▶ background.wgsl + dissolve.wgsl
//! ```
//!
//! Loads and extractions run on short-lived worker threads and report back over
//! channels. Every request carries a generation number, and results from a
//! superseded request are discarded before they can touch the scene. The
//! render loop itself never blocks on media.

mod dissolve;
mod extract;
mod gpu;
mod loader;
mod media;
mod palette;
mod request;
mod scene;
mod session;
mod slots;
mod style;
mod surface;
mod timeline;
mod types;

#[cfg(test)]
mod testing;

pub use dissolve::{DissolveFrame, DissolveSet};
pub use extract::{
    extract_palette, sample_palette, ColorExtractor, Extraction, RASTER_SIZE, SAMPLE_POINTS,
};
pub use loader::SourceLoader;
pub use media::{FfmpegFeed, MediaBackend, MediaError, SystemMedia, VideoFeed};
pub use palette::{parse_css_rgb, Palette, Rgb, PALETTE_SIZE};
pub use request::{RequestToken, RequestTracker};
pub use scene::{SceneFrame, SceneState};
pub use session::{Session, SessionFrame};
pub use slots::{LoadedSource, SlotContent, SlotFrame, SlotId, SlotManager, SlotUpload};
pub use style::{Smoothed, StylePreset};
pub use surface::{LoopPhase, RenderLoop};
pub use types::{
    ColorCallback, CompositorConfig, CrossfadeCurve, SourceDescriptor, StyleMode, SurfaceProps,
};
