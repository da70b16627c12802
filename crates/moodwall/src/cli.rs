use std::path::PathBuf;
use std::time::Duration;

use boardconfig::{parse_duration, ShaderMode};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "moodwall",
    author,
    version,
    about = "Mood-board preview with a palette-driven fluid background",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Board file to open; defaults to `board.toml` in the config directory.
    #[arg(value_name = "BOARD")]
    pub board: Option<PathBuf>,

    /// Show this image or video instead of a board file. Repeat for a slideshow.
    #[arg(long = "source", value_name = "URL", conflicts_with = "board")]
    pub sources: Vec<String>,

    /// Background style: `soft` or `extreme`.
    #[arg(long, value_name = "MODE", value_parser = parse_mode)]
    pub mode: Option<ShaderMode>,

    /// Enable directional motion blur on the displayed item.
    #[arg(long)]
    pub motion_blur: bool,

    /// Motion blur strength in `[0, 1]`.
    #[arg(long, value_name = "AMOUNT", value_parser = parse_intensity)]
    pub blur_intensity: Option<f32>,

    /// Time each item stays on screen (seconds or e.g. `12s`, `1m`).
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Start with the slideshow paused.
    #[arg(long)]
    pub paused: bool,

    /// Preview window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Seed for shuffled slideshow order.
    #[arg(long, value_name = "SEED", env = "MOODWALL_SEED")]
    pub seed: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the five palette colours extracted from an image or video.
    Palette(PaletteArgs),
    /// Validate a board file and print a summary.
    Check(CheckArgs),
}

#[derive(Parser, Debug)]
pub struct PaletteArgs {
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Treat the source as a video and sample a frame from it.
    #[arg(long)]
    pub video: bool,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    #[arg(value_name = "BOARD")]
    pub board: PathBuf,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_mode(value: &str) -> Result<ShaderMode, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "soft" => Ok(ShaderMode::Soft),
        "extreme" => Ok(ShaderMode::Extreme),
        other => Err(format!("unknown style mode '{other}'; expected soft or extreme")),
    }
}

pub fn parse_intensity(value: &str) -> Result<f32, String> {
    let amount: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid blur intensity '{value}'"))?;
    if !(0.0..=1.0).contains(&amount) {
        return Err(format!("blur intensity must be within 0 and 1, got {amount}"));
    }
    Ok(amount)
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid width in window size".to_string())?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid height in window size".to_string())?;
    if width == 0 || height == 0 {
        return Err("window size must be greater than zero".into());
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_window_size() {
        assert_eq!(parse_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_size(" 640X480 ").unwrap(), (640, 480));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("0x720").is_err());
    }

    #[test]
    fn parses_mode_and_intensity() {
        assert_eq!(parse_mode("Extreme").unwrap(), ShaderMode::Extreme);
        assert!(parse_mode("loud").is_err());
        assert_eq!(parse_intensity("0.25").unwrap(), 0.25);
        assert!(parse_intensity("1.5").is_err());
        assert!(parse_intensity("lots").is_err());
    }

    #[test]
    fn sources_conflict_with_board() {
        let result = Cli::try_parse_from(["moodwall", "board.toml", "--source", "a.jpg"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "moodwall",
            "--source",
            "a.jpg",
            "--source",
            "b.mp4",
            "--interval",
            "5s",
        ])
        .unwrap();
        assert_eq!(cli.run.sources, ["a.jpg", "b.mp4"]);
        assert_eq!(cli.run.interval, Some(Duration::from_secs(5)));
    }

    #[test]
    fn palette_subcommand() {
        let cli = Cli::try_parse_from(["moodwall", "palette", "clip.mp4", "--video"]).unwrap();
        match cli.command {
            Some(Command::Palette(args)) => {
                assert_eq!(args.source, "clip.mp4");
                assert!(args.video);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
