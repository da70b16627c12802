//! Per-frame CPU state of the background: clock, palette easing, style easing
//! and the texture slots.

use std::time::Instant;

use tracing::trace;

use crate::palette::Palette;
use crate::slots::{LoadedSource, SlotFrame, SlotManager};
use crate::style::{Smoothed, StylePreset};
use crate::types::{CompositorConfig, StyleMode, SurfaceProps};

/// Values the shader needs for one frame, plus the slot work to apply first.
#[derive(Debug)]
pub struct SceneFrame {
    /// Accumulated seconds since the scene started.
    pub time: f32,
    pub palette: Palette,
    pub style: f32,
    pub motion_blur: bool,
    pub motion_blur_intensity: f32,
    pub slots: SlotFrame,
}

impl SceneFrame {
    pub fn preset(&self) -> StylePreset {
        StylePreset::at(self.style)
    }
}

pub struct SceneState {
    time: f32,
    last_step: Option<Instant>,
    target_palette: Palette,
    palette: Palette,
    palette_rate: f32,
    style_target: StyleMode,
    style: Smoothed,
    style_rate: f32,
    motion_blur: bool,
    motion_blur_intensity: f32,
    slots: SlotManager,
}

impl SceneState {
    pub fn new(config: &CompositorConfig) -> Self {
        let defaults = SurfaceProps::default();
        Self {
            time: 0.0,
            last_step: None,
            target_palette: Palette::PASTEL,
            palette: Palette::PASTEL,
            palette_rate: config.palette_rate,
            style_target: defaults.style,
            style: Smoothed::new(defaults.style.target()),
            style_rate: config.style_rate,
            motion_blur: defaults.motion_blur,
            motion_blur_intensity: defaults.motion_blur_intensity,
            slots: SlotManager::new(config.transition, config.curve),
        }
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn target_palette(&self) -> &Palette {
        &self.target_palette
    }

    pub fn style(&self) -> f32 {
        self.style.value()
    }

    pub fn slots(&self) -> &SlotManager {
        &self.slots
    }

    /// Only the extractor writes the target; the current palette eases toward it.
    pub fn set_target_palette(&mut self, palette: Palette) {
        self.target_palette = palette;
    }

    /// Applies the visual props. Source changes are handled by the caller.
    pub fn apply_props(&mut self, props: &SurfaceProps) {
        self.motion_blur = props.motion_blur;
        self.motion_blur_intensity = if props.motion_blur_intensity.is_finite() {
            props.motion_blur_intensity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.style_target = props.style;
    }

    pub fn offer(&mut self, loaded: LoadedSource) {
        self.slots.offer(loaded);
    }

    /// One tick. The clock always advances; pausing is the host's concern.
    pub fn step(&mut self, now: Instant) -> SceneFrame {
        if let Some(last) = self.last_step {
            self.time += now.saturating_duration_since(last).as_secs_f32();
        }
        self.last_step = Some(now);

        self.palette
            .step_toward(&self.target_palette, self.palette_rate);
        self.style
            .step_toward(self.style_target.target(), self.style_rate);

        let slots = self.slots.advance(now);
        trace!(time = self.time, mix = slots.mix, style = self.style.value(), "scene step");

        SceneFrame {
            time: self.time,
            palette: self.palette,
            style: self.style.value(),
            motion_blur: self.motion_blur,
            motion_blur_intensity: self.motion_blur_intensity,
            slots,
        }
    }

    pub fn teardown(&mut self) {
        self.slots.teardown();
    }
}
