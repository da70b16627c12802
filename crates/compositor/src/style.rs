use crate::palette::lerp;

/// Low-pass filtered scalar that chases a discrete target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothed {
    value: f32,
}

impl Smoothed {
    pub fn new(value: f32) -> Self {
        Self { value }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// One frame of easing. `rate` outside `(0, 1]` is clamped so the value
    /// can never pass the target.
    pub fn step_toward(&mut self, target: f32, rate: f32) -> f32 {
        let rate = rate.clamp(0.0, 1.0);
        self.value = lerp(self.value, target, rate);
        self.value
    }
}

/// Noise and image parameters resolved for one style scalar.
///
/// The shader evaluates the same interpolation on the GPU; this mirror exists
/// for logging and for tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StylePreset {
    pub speed: f32,
    pub wave_amplitude: f32,
    pub wave_frequency: [f32; 2],
    pub mask_edge: f32,
    pub mask_softness: f32,
    pub image_distortion: f32,
    pub image_opacity: f32,
}

impl StylePreset {
    pub const SOFT: StylePreset = StylePreset {
        speed: 0.05,
        wave_amplitude: 0.1,
        wave_frequency: [1.5, 1.5],
        mask_edge: 0.7,
        mask_softness: 0.1,
        image_distortion: 0.015,
        image_opacity: 0.9,
    };

    pub const EXTREME: StylePreset = StylePreset {
        speed: 0.25,
        wave_amplitude: 0.4,
        wave_frequency: [3.0, 0.5],
        mask_edge: 0.6,
        mask_softness: 0.3,
        image_distortion: 0.04,
        image_opacity: 0.7,
    };

    pub fn at(mode: f32) -> Self {
        let soft = Self::SOFT;
        let extreme = Self::EXTREME;
        let t = mode.clamp(0.0, 1.0);
        StylePreset {
            speed: lerp(soft.speed, extreme.speed, t),
            wave_amplitude: lerp(soft.wave_amplitude, extreme.wave_amplitude, t),
            wave_frequency: [
                lerp(soft.wave_frequency[0], extreme.wave_frequency[0], t),
                lerp(soft.wave_frequency[1], extreme.wave_frequency[1], t),
            ],
            mask_edge: lerp(soft.mask_edge, extreme.mask_edge, t),
            mask_softness: lerp(soft.mask_softness, extreme.mask_softness, t),
            image_distortion: lerp(soft.image_distortion, extreme.image_distortion, t),
            image_opacity: lerp(soft.image_opacity, extreme.image_opacity, t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepping_up_is_monotone_and_bounded() {
        let mut style = Smoothed::new(0.0);
        let mut previous = 0.0;
        for _ in 0..5000 {
            let value = style.step_toward(1.0, 0.005);
            assert!(value >= previous);
            assert!(value <= 1.0);
            previous = value;
        }
        assert!(previous > 0.99);
    }

    #[test]
    fn stepping_down_is_monotone_and_bounded() {
        let mut style = Smoothed::new(1.0);
        let mut previous = 1.0;
        for _ in 0..2000 {
            let value = style.step_toward(0.0, 0.005);
            assert!(value <= previous);
            assert!(value >= 0.0);
            previous = value;
        }
    }

    #[test]
    fn oversized_rate_lands_on_target() {
        let mut style = Smoothed::new(0.25);
        assert_eq!(style.step_toward(1.0, 4.0), 1.0);
    }

    #[test]
    fn preset_endpoints_match_modes() {
        assert_eq!(StylePreset::at(0.0), StylePreset::SOFT);
        let extreme = StylePreset::at(1.0);
        assert!((extreme.wave_amplitude - 0.4).abs() < 1e-6);
        assert!((extreme.image_opacity - 0.7).abs() < 1e-6);
        let mid = StylePreset::at(0.5);
        assert!((mid.speed - 0.15).abs() < 1e-6);
        assert!((mid.wave_frequency[1] - 1.0).abs() < 1e-6);
    }
}
