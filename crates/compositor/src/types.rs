use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Easing shape applied to slot crossfades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossfadeCurve {
    #[default]
    Linear,
    Smoothstep,
    EaseInOut,
}

/// The currently displayed input, as handed over by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceDescriptor {
    pub url: String,
    pub is_video: bool,
}

impl SourceDescriptor {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_video: false,
        }
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_video: true,
        }
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_video { "video" } else { "image" };
        write!(f, "{kind}:{}", self.url)
    }
}

/// Discrete visual preset; the compositor smooths toward its scalar target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StyleMode {
    #[default]
    Soft,
    Extreme,
}

impl StyleMode {
    pub fn target(self) -> f32 {
        match self {
            StyleMode::Soft => 0.0,
            StyleMode::Extreme => 1.0,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            StyleMode::Soft => StyleMode::Extreme,
            StyleMode::Extreme => StyleMode::Soft,
        }
    }
}

impl fmt::Display for StyleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleMode::Soft => f.write_str("soft"),
            StyleMode::Extreme => f.write_str("extreme"),
        }
    }
}

impl FromStr for StyleMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "soft" => Ok(StyleMode::Soft),
            "extreme" => Ok(StyleMode::Extreme),
            other => Err(format!(
                "unknown style mode '{other}' (expected 'soft' or 'extreme')"
            )),
        }
    }
}

/// Inputs passed by the host every time its view of the board changes.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceProps {
    /// Mounts or unmounts the GPU surface entirely.
    pub active: bool,
    pub source: Option<SourceDescriptor>,
    pub motion_blur: bool,
    /// Clamped to `[0, 1]` before it reaches the shader.
    pub motion_blur_intensity: f32,
    /// Host-level slideshow pause. The generative animation keeps running.
    pub paused: bool,
    pub style: StyleMode,
}

impl Default for SurfaceProps {
    fn default() -> Self {
        Self {
            active: true,
            source: None,
            motion_blur: false,
            motion_blur_intensity: 0.5,
            paused: false,
            style: StyleMode::Soft,
        }
    }
}

/// Tunables for one compositor instance.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositorConfig {
    pub transition: Duration,
    pub curve: CrossfadeCurve,
    /// Fraction of the remaining palette distance covered per frame.
    pub palette_rate: f32,
    /// Fraction of the remaining style distance covered per frame.
    pub style_rate: f32,
    /// Offset used when grabbing a single video frame for extraction.
    pub video_seek: Duration,
    /// Cancels pending loads older than this. `None` keeps them pending forever.
    pub load_timeout: Option<Duration>,
    pub dissolve_duration: Duration,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            transition: Duration::from_millis(2000),
            curve: CrossfadeCurve::Linear,
            palette_rate: 0.02,
            style_rate: 0.005,
            video_seek: Duration::from_millis(500),
            load_timeout: None,
            dissolve_duration: Duration::from_millis(2000),
        }
    }
}

/// Receives the five extracted colors as CSS `rgb(...)` strings.
pub type ColorCallback = Box<dyn FnMut(&[String; 5]) + Send>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_mode_parses_case_insensitively() {
        assert_eq!("Extreme".parse::<StyleMode>().unwrap(), StyleMode::Extreme);
        assert_eq!(" soft ".parse::<StyleMode>().unwrap(), StyleMode::Soft);
        assert!("wild".parse::<StyleMode>().is_err());
    }

    #[test]
    fn style_targets_are_binary() {
        assert_eq!(StyleMode::Soft.target(), 0.0);
        assert_eq!(StyleMode::Extreme.target(), 1.0);
        assert_eq!(StyleMode::Soft.toggled(), StyleMode::Extreme);
    }

    #[test]
    fn default_config_matches_two_second_transition() {
        let config = CompositorConfig::default();
        assert_eq!(config.transition, Duration::from_secs(2));
        assert_eq!(config.curve, CrossfadeCurve::Linear);
        assert!(config.load_timeout.is_none());
    }
}
