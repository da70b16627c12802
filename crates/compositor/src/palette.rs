//! Five-color palettes shared by the extractor, the render loop and the shader.

/// Normalized RGB triple, each channel in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self {
            r: f32::from(bytes[0]) / 255.0,
            g: f32::from(bytes[1]) / 255.0,
            b: f32::from(bytes[2]) / 255.0,
        }
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [to_byte(self.r), to_byte(self.g), to_byte(self.b)]
    }

    pub fn to_css(self) -> String {
        let [r, g, b] = self.to_bytes();
        format!("rgb({r}, {g}, {b})")
    }

    pub fn lerp(self, target: Rgb, t: f32) -> Rgb {
        Rgb {
            r: lerp(self.r, target.r, t),
            g: lerp(self.g, target.g, t),
            b: lerp(self.b, target.b, t),
        }
    }

    fn as_vec4(self) -> [f32; 4] {
        [self.r, self.g, self.b, 1.0]
    }
}

fn to_byte(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

pub(crate) fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

pub const PALETTE_SIZE: usize = 5;

/// Ordered set of exactly five colors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette(pub [Rgb; PALETTE_SIZE]);

impl Palette {
    /// Soft pastel palette shown before any extraction completes.
    pub const PASTEL: Palette = Palette([
        Rgb::new(0.88, 0.91, 1.0),
        Rgb::new(0.96, 0.98, 1.0),
        Rgb::new(0.80, 0.85, 1.0),
        Rgb::new(0.90, 0.95, 1.0),
        Rgb::new(0.85, 0.90, 1.0),
    ]);

    /// Starting palette of the dissolve overlay.
    pub const DISSOLVE: Palette = Palette([
        Rgb::new(0.88, 0.91, 1.0),
        Rgb::new(0.98, 0.91, 1.0),
        Rgb::new(0.95, 0.96, 0.98),
        Rgb::new(0.90, 0.95, 1.0),
        Rgb::new(0.95, 0.90, 0.95),
    ]);

    pub fn colors(&self) -> &[Rgb; PALETTE_SIZE] {
        &self.0
    }

    /// Moves every channel `rate` of the way toward `target`.
    pub fn step_toward(&mut self, target: &Palette, rate: f32) {
        for (current, goal) in self.0.iter_mut().zip(target.0.iter()) {
            *current = current.lerp(*goal, rate);
        }
    }

    pub fn css(&self) -> [String; PALETTE_SIZE] {
        std::array::from_fn(|index| self.0[index].to_css())
    }

    pub fn as_uniform(&self) -> [[f32; 4]; PALETTE_SIZE] {
        std::array::from_fn(|index| self.0[index].as_vec4())
    }
}

impl Default for Palette {
    fn default() -> Self {
        Palette::PASTEL
    }
}

/// Parses the leading `r, g, b` of a CSS `rgb(...)` or `rgba(...)` color.
pub fn parse_css_rgb(value: &str) -> Option<[u8; 3]> {
    let value = value.trim();
    let body = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))?;
    let body = body.strip_suffix(')').unwrap_or(body);
    let mut parts = body.split(',').map(str::trim);
    let mut channel = || -> Option<u8> {
        let raw: f32 = parts.next()?.parse().ok()?;
        Some(raw.clamp(0.0, 255.0).round() as u8)
    };
    Some([channel()?, channel()?, channel()?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_rounds_channels() {
        assert_eq!(Rgb::new(1.0, 0.5, 0.0).to_css(), "rgb(255, 128, 0)");
        assert_eq!(Rgb::from_bytes([12, 34, 56]).to_css(), "rgb(12, 34, 56)");
    }

    #[test]
    fn step_toward_converges_without_overshoot() {
        let target = Palette([Rgb::new(0.0, 0.0, 0.0); PALETTE_SIZE]);
        let mut current = Palette::PASTEL;
        let mut previous = current.0[0].r;
        for _ in 0..500 {
            current.step_toward(&target, 0.02);
            let now = current.0[0].r;
            assert!(now <= previous);
            assert!(now >= 0.0);
            previous = now;
        }
        assert!(previous < 0.0001);
    }

    #[test]
    fn two_percent_step_moves_two_percent() {
        let target = Palette([Rgb::new(0.0, 0.0, 0.0); PALETTE_SIZE]);
        let mut current = Palette([Rgb::new(1.0, 1.0, 1.0); PALETTE_SIZE]);
        current.step_toward(&target, 0.02);
        assert!((current.0[3].g - 0.98).abs() < 1e-6);
    }

    #[test]
    fn uniform_layout_pads_alpha() {
        let uniform = Palette::PASTEL.as_uniform();
        assert_eq!(uniform[2], [0.80, 0.85, 1.0, 1.0]);
    }

    #[test]
    fn parses_css_colors() {
        assert_eq!(parse_css_rgb("rgb(10, 20, 30)"), Some([10, 20, 30]));
        assert_eq!(parse_css_rgb("rgba(255,128,0,0.4)"), Some([255, 128, 0]));
        assert_eq!(parse_css_rgb("  rgb(300, -4, 7.6) "), Some([255, 0, 8]));
        assert_eq!(parse_css_rgb("#ffffff"), None);
        assert_eq!(parse_css_rgb("rgb(1, 2)"), None);
    }
}
