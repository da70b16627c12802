use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use boardconfig::{BoardConfig, BoardItem, ShaderMode, TransitionCurve};
use compositor::{
    extract_palette, CompositorConfig, CrossfadeCurve, MediaBackend, SourceDescriptor, StyleMode,
    SurfaceProps, SystemMedia,
};
use tracing_subscriber::EnvFilter;

use crate::cli::{CheckArgs, PaletteArgs, RunArgs};
use crate::paths::AppPaths;
use crate::preview::{run_preview, PreviewConfig};

const DEFAULT_WINDOW_SIZE: (u32, u32) = (1280, 720);

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(args: RunArgs) -> Result<()> {
    let mut board = if args.sources.is_empty() {
        let path = match &args.board {
            Some(path) => path.clone(),
            None => AppPaths::discover()?.board_file(),
        };
        read_board(&path)?
    } else {
        BoardConfig::from_sources(args.sources.iter().cloned())
    };
    apply_overrides(&mut board, &args);
    board
        .validate()
        .context("command-line overrides produced an invalid board")?;

    let seed = args.seed.unwrap_or_else(rand::random);
    let size = args.size.unwrap_or(DEFAULT_WINDOW_SIZE);
    tracing::info!(
        title = board.title.as_deref().unwrap_or("untitled"),
        items = board.items.len(),
        visual = board.visual_items().count(),
        mode = ?board.shader.mode,
        interval_ms = board.slideshow.interval.as_millis() as u64,
        seed,
        "starting moodwall preview"
    );

    let media: Arc<dyn MediaBackend> =
        Arc::new(SystemMedia::new().context("failed to initialise media backend")?);
    let compositor = compositor_config(&board);
    run_preview(
        PreviewConfig {
            board,
            compositor,
            size,
            seed,
        },
        media,
    )
}

pub fn print_palette(args: PaletteArgs) -> Result<()> {
    let media = SystemMedia::new().context("failed to initialise media backend")?;
    let source = if args.video {
        SourceDescriptor::video(args.source)
    } else {
        SourceDescriptor::image(args.source)
    };
    let palette = extract_palette(&media, &source, CompositorConfig::default().video_seek)
        .with_context(|| format!("failed to extract a palette from {source}"))?;
    for color in palette.css() {
        println!("{color}");
    }
    Ok(())
}

pub fn check_board(args: CheckArgs) -> Result<()> {
    let board = read_board(&args.board)?;
    let count = |kind: &str| board.items.iter().filter(|item| item.kind() == kind).count();

    println!("Board: {}", args.board.display());
    println!("  title:      {}", board.title.as_deref().unwrap_or("(untitled)"));
    if let Some(author) = &board.author {
        println!("  author:     {author}");
    }
    println!(
        "  items:      {} (image {}, video {}, text {}, audio {}, pdf {})",
        board.items.len(),
        count("image"),
        count("video"),
        count("text"),
        count("audio"),
        count("pdf"),
    );
    println!("  slideshow:  {} visual items", board.visual_items().count());
    println!(
        "  interval:   {:.1}s ({:?}{})",
        board.slideshow.interval.as_secs_f32(),
        board.slideshow.order,
        if board.slideshow.paused { ", paused" } else { "" },
    );
    println!(
        "  shader:     {:?}, motion blur {} ({:.2})",
        board.shader.mode,
        if board.shader.motion_blur { "on" } else { "off" },
        board.shader.motion_blur_intensity,
    );
    println!(
        "  transition: {:.1}s ({:?})",
        board.shader.transition.as_secs_f32(),
        board.shader.curve,
    );
    Ok(())
}

fn read_board(path: &Path) -> Result<BoardConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read board file {}", path.display()))?;
    let mut board = BoardConfig::from_toml_str(&contents)
        .with_context(|| format!("failed to load board file {}", path.display()))?;
    if let Some(base) = path.parent() {
        resolve_relative_urls(&mut board, base);
    }
    Ok(board)
}

/// Local paths in a board file are relative to the file itself.
fn resolve_relative_urls(board: &mut BoardConfig, base: &Path) {
    for item in &mut board.items {
        let url = match item {
            BoardItem::Image { url }
            | BoardItem::Video { url }
            | BoardItem::Audio { url, .. }
            | BoardItem::Pdf { url, .. } => url,
            BoardItem::Text { .. } => continue,
        };
        if url.contains("://") || Path::new(url.as_str()).is_absolute() {
            continue;
        }
        let resolved: PathBuf = base.join(url.as_str());
        *url = resolved.to_string_lossy().into_owned();
    }
}

fn apply_overrides(board: &mut BoardConfig, args: &RunArgs) {
    if let Some(mode) = args.mode {
        board.shader.mode = mode;
    }
    if args.motion_blur {
        board.shader.motion_blur = true;
    }
    if let Some(intensity) = args.blur_intensity {
        board.shader.motion_blur_intensity = intensity;
    }
    if let Some(interval) = args.interval {
        board.slideshow.interval = interval;
    }
    if args.paused {
        board.slideshow.paused = true;
    }
}

pub fn style_mode(mode: ShaderMode) -> StyleMode {
    match mode {
        ShaderMode::Soft => StyleMode::Soft,
        ShaderMode::Extreme => StyleMode::Extreme,
    }
}

pub fn crossfade_curve(curve: TransitionCurve) -> CrossfadeCurve {
    match curve {
        TransitionCurve::Linear => CrossfadeCurve::Linear,
        TransitionCurve::Smoothstep => CrossfadeCurve::Smoothstep,
        TransitionCurve::EaseInOut => CrossfadeCurve::EaseInOut,
    }
}

pub fn compositor_config(board: &BoardConfig) -> CompositorConfig {
    CompositorConfig {
        transition: board.shader.transition,
        curve: crossfade_curve(board.shader.curve),
        load_timeout: board.shader.load_timeout,
        ..CompositorConfig::default()
    }
}

pub fn initial_props(board: &BoardConfig) -> SurfaceProps {
    SurfaceProps {
        active: true,
        source: None,
        motion_blur: board.shader.motion_blur,
        motion_blur_intensity: board.shader.motion_blur_intensity,
        paused: board.slideshow.paused,
        style: style_mode(board.shader.mode),
    }
}
