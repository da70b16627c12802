use std::fs;
use std::process::Command;

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

fn moodwall() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_moodwall"));
    command.env("RUST_LOG", "error");
    command
}

fn rgb_lines(stdout: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|line| line.starts_with("rgb("))
        .map(str::to_string)
        .collect()
}

#[test]
fn palette_prints_five_css_colours() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("swatch.png");
    RgbaImage::from_pixel(50, 50, Rgba([10, 20, 30, 255]))
        .save(&path)
        .unwrap();

    let output = moodwall()
        .arg("palette")
        .arg(&path)
        .output()
        .expect("failed to run moodwall palette");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let colours = rgb_lines(&output.stdout);
    assert_eq!(colours.len(), 5);
    assert!(colours.iter().all(|colour| colour == "rgb(10, 20, 30)"));
}

#[test]
fn palette_fails_for_missing_source() {
    let root = TempDir::new().unwrap();
    let output = moodwall()
        .arg("palette")
        .arg(root.path().join("missing.png"))
        .output()
        .expect("failed to run moodwall palette");

    assert!(!output.status.success());
    assert!(rgb_lines(&output.stdout).is_empty());
}

#[test]
fn check_summarises_a_valid_board() {
    let root = TempDir::new().unwrap();
    let board = root.path().join("board.toml");
    fs::write(
        &board,
        r#"
version = 1
title = "Coastline"

[shader]
mode = "extreme"
transition = "1500ms"
curve = "smoothstep"

[slideshow]
interval = "12s"
order = "shuffle"

[[items]]
kind = "image"
url = "shore.jpg"

[[items]]
kind = "video"
url = "https://example.com/waves.mp4"

[[items]]
kind = "text"
text = "salt and wind"
"#,
    )
    .unwrap();

    let output = moodwall()
        .arg("check")
        .arg(&board)
        .output()
        .expect("failed to run moodwall check");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Coastline"));
    assert!(stdout.contains("items:      3 (image 1, video 1, text 1, audio 0, pdf 0)"));
    assert!(stdout.contains("2 visual items"));
    assert!(stdout.contains("12.0s (Shuffle)"));
    assert!(stdout.contains("Extreme"));
    assert!(stdout.contains("1.5s (Smoothstep)"));
}

#[test]
fn check_rejects_an_invalid_board() {
    let root = TempDir::new().unwrap();
    let board = root.path().join("board.toml");
    fs::write(&board, "version = 1\n[shader]\nmotion_blur_intensity = 3.0\n").unwrap();

    let status = moodwall()
        .arg("check")
        .arg(&board)
        .status()
        .expect("failed to run moodwall check");

    assert!(!status.success());
}
