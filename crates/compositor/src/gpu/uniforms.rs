use bytemuck::{Pod, Zeroable};

use crate::dissolve::DissolveFrame;
use crate::palette::PALETTE_SIZE;
use crate::scene::SceneFrame;

/// Mirrors `struct Background` in `background.wgsl`.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug)]
pub(crate) struct BackgroundUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub img_mix: f32,
    pub has_image: f32,
    pub motion_blur: f32,
    pub blur_intensity: f32,
    pub mode: f32,
    pub colors: [[f32; 4]; PALETTE_SIZE],
}

unsafe impl Zeroable for BackgroundUniforms {}
unsafe impl Pod for BackgroundUniforms {}

impl BackgroundUniforms {
    pub fn from_frame(frame: &SceneFrame, width: u32, height: u32) -> Self {
        Self {
            resolution: [width.max(1) as f32, height.max(1) as f32],
            time: frame.time,
            img_mix: frame.slots.mix,
            has_image: flag(frame.slots.has_image),
            motion_blur: flag(frame.motion_blur),
            blur_intensity: frame.motion_blur_intensity,
            mode: frame.style,
            colors: frame.palette.as_uniform(),
        }
    }
}

/// Mirrors `struct Dissolve` in `dissolve.wgsl`.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug)]
pub(crate) struct DissolveUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub progress: f32,
    pub colors: [[f32; 4]; PALETTE_SIZE],
}

unsafe impl Zeroable for DissolveUniforms {}
unsafe impl Pod for DissolveUniforms {}

impl DissolveUniforms {
    pub fn from_frame(frame: &DissolveFrame, width: u32, height: u32) -> Self {
        Self {
            resolution: [width.max(1) as f32, height.max(1) as f32],
            time: frame.time,
            progress: frame.progress,
            colors: frame.palette.as_uniform(),
        }
    }
}

fn flag(value: bool) -> f32 {
    if value {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn background_layout_matches_wgsl() {
        assert_eq!(size_of::<BackgroundUniforms>(), 112);
        assert_eq!(offset_of!(BackgroundUniforms, has_image), 16);
        assert_eq!(offset_of!(BackgroundUniforms, mode), 28);
        assert_eq!(offset_of!(BackgroundUniforms, colors), 32);
    }

    #[test]
    fn dissolve_layout_matches_wgsl() {
        assert_eq!(size_of::<DissolveUniforms>(), 96);
        assert_eq!(offset_of!(DissolveUniforms, progress), 12);
        assert_eq!(offset_of!(DissolveUniforms, colors), 16);
    }
}
