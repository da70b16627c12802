use std::time::{Duration, Instant};

use crate::types::CrossfadeCurve;

impl CrossfadeCurve {
    pub fn sample(self, t: f32) -> f32 {
        let clamped = t.clamp(0.0, 1.0);
        match self {
            CrossfadeCurve::Linear => clamped,
            CrossfadeCurve::Smoothstep => clamped * clamped * (3.0 - 2.0 * clamped),
            CrossfadeCurve::EaseInOut => {
                if clamped < 0.5 {
                    2.0 * clamped * clamped
                } else {
                    -1.0 + (4.0 - 2.0 * clamped) * clamped
                }
            }
        }
    }
}

/// One running slot crossfade. `from` and `to` are the resting mix values of
/// the outgoing and incoming slots.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Transition {
    start: Instant,
    duration: Duration,
    curve: CrossfadeCurve,
    from: f32,
    to: f32,
}

impl Transition {
    pub fn new(
        from: f32,
        to: f32,
        duration: Duration,
        curve: CrossfadeCurve,
        now: Instant,
    ) -> Self {
        Self {
            start: now,
            duration,
            curve,
            from,
            to,
        }
    }

    /// Linear progress in `[0, 1]`.
    pub fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.start);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    pub fn mix(&self, now: Instant) -> f32 {
        let eased = self.curve.sample(self.progress(now));
        (self.from + (self.to - self.from) * eased).clamp(0.0, 1.0)
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.start) >= self.duration
    }

    pub fn target(&self) -> f32 {
        self.to
    }
}

pub(crate) fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Fixed-length progress timer of the dissolve overlay.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DissolveTimeline {
    start: Instant,
    duration: Duration,
}

impl DissolveTimeline {
    pub fn new(duration: Duration, now: Instant) -> Self {
        Self {
            start: now,
            duration,
        }
    }

    pub fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.start);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }

    /// Opaque until 80% of the way through, then fades out.
    pub fn alpha(&self, now: Instant) -> f32 {
        1.0 - smoothstep(0.8, 1.0, self.progress(now))
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_curve_increases_monotonically() {
        let curve = CrossfadeCurve::Linear;
        let mut last = 0.0;
        for step in 0..=10 {
            let sample = curve.sample(step as f32 / 10.0);
            assert!(sample >= last - f32::EPSILON);
            last = sample;
        }
    }

    #[test]
    fn smoothstep_matches_expected_values() {
        let curve = CrossfadeCurve::Smoothstep;
        assert!((curve.sample(0.0) - 0.0).abs() < 1e-6);
        assert!((curve.sample(0.5) - 0.5).abs() < 1e-6);
        assert!((curve.sample(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ease_in_out_accelerates_then_decelerates() {
        let curve = CrossfadeCurve::EaseInOut;
        assert!(curve.sample(0.25) < curve.sample(0.5));
        assert!(curve.sample(0.75) > curve.sample(0.5));
        assert!((curve.sample(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn transition_ramps_down_toward_slot_a() {
        let start = Instant::now();
        let transition = Transition::new(
            1.0,
            0.0,
            Duration::from_millis(2000),
            CrossfadeCurve::Linear,
            start,
        );
        let halfway = transition.mix(start + Duration::from_millis(1000));
        assert!((halfway - 0.5).abs() < 1e-3);
        assert!(!transition.is_finished(start + Duration::from_millis(1999)));
        assert!(transition.is_finished(start + Duration::from_millis(2000)));
    }

    #[test]
    fn transition_never_leaves_unit_range() {
        let start = Instant::now();
        let transition = Transition::new(
            0.0,
            1.0,
            Duration::from_millis(2000),
            CrossfadeCurve::Linear,
            start,
        );
        let mut previous = 0.0;
        for ms in (0..=4000).step_by(37) {
            let mix = transition.mix(start + Duration::from_millis(ms));
            assert!((0.0..=1.0).contains(&mix));
            assert!(mix >= previous);
            previous = mix;
        }
        assert_eq!(transition.mix(start + Duration::from_millis(2001)), 1.0);
    }

    #[test]
    fn dissolve_alpha_fades_in_last_fifth() {
        let start = Instant::now();
        let timeline = DissolveTimeline::new(Duration::from_millis(2000), start);
        assert_eq!(timeline.alpha(start + Duration::from_millis(1500)), 1.0);
        let late = timeline.alpha(start + Duration::from_millis(1800));
        assert!(late < 1.0 && late > 0.0);
        assert_eq!(timeline.alpha(start + Duration::from_millis(2000)), 0.0);
        assert!(timeline.is_finished(start + Duration::from_millis(2000)));
    }
}
