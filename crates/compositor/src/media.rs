//! Image and video access behind the [`MediaBackend`] seam.
//!
//! Still images are decoded with `image`, fetched over blocking `reqwest` when
//! the url is remote. Video goes through `ffprobe`/`ffmpeg` child processes
//! streaming raw RGBA frames; a [`VideoFeed`] keeps the newest decoded frame
//! around for the render loop to upload.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use image::RgbaImage;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, warn};

const PAUSE_POLL: Duration = Duration::from_millis(15);

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("failed to read {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: image::ImageError,
    },
    #[error("ffmpeg failed for {url}: {message}")]
    Ffmpeg { url: String, message: String },
    #[error("{url} did not produce a video frame")]
    NoFrame { url: String },
    #[error("unsupported source url '{0}'")]
    Unsupported(String),
}

/// A decoding video stream owned by one texture slot.
pub trait VideoFeed: Send {
    /// A decoded frame exists (the stream has current data).
    fn is_ready(&self) -> bool;
    /// The newest frame not yet handed out.
    fn take_frame(&mut self) -> Option<RgbaImage>;
    fn play(&mut self);
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    /// The decoder exited and no further frames will arrive.
    fn has_ended(&self) -> bool;
    /// Tears down the decoder. The feed produces nothing afterwards.
    fn stop(&mut self);
}

/// Loads pixels for the extractor and the slot manager.
pub trait MediaBackend: Send + Sync {
    fn load_image(&self, url: &str) -> Result<RgbaImage, MediaError>;
    /// Decodes a single frame at `offset` and releases the decoder.
    fn video_frame_at(&self, url: &str, offset: Duration) -> Result<RgbaImage, MediaError>;
    /// Starts a looping, muted stream.
    fn open_video(&self, url: &str) -> Result<Box<dyn VideoFeed>, MediaError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    File(PathBuf),
    Remote(String),
}

fn locate(url: &str) -> Result<Location, MediaError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(MediaError::Unsupported(url.to_string()));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Ok(Location::Remote(trimmed.to_string()));
    }
    if let Some(path) = trimmed.strip_prefix("file://") {
        return Ok(Location::File(PathBuf::from(path)));
    }
    if trimmed.contains("://") {
        return Err(MediaError::Unsupported(url.to_string()));
    }
    Ok(Location::File(PathBuf::from(trimmed)))
}

/// Default backend: local files, http(s) downloads and ffmpeg for video.
#[derive(Debug, Clone)]
pub struct SystemMedia {
    http: Client,
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl SystemMedia {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_binaries("ffmpeg", "ffprobe")
    }

    pub fn with_binaries(
        ffmpeg: impl Into<PathBuf>,
        ffprobe: impl Into<PathBuf>,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(concat!("moodwall/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        })
    }

    fn read_bytes(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        match locate(url)? {
            Location::File(path) => std::fs::read(&path).map_err(|source| MediaError::Io {
                url: url.to_string(),
                source,
            }),
            Location::Remote(remote) => {
                debug!(url = %remote, "fetching remote image");
                let http_err = |source| MediaError::Http {
                    url: url.to_string(),
                    source,
                };
                let response = self
                    .http
                    .get(&remote)
                    .send()
                    .and_then(|response| response.error_for_status())
                    .map_err(http_err)?;
                let bytes = response.bytes().map_err(http_err)?;
                Ok(bytes.to_vec())
            }
        }
    }

    /// ffmpeg accepts paths and http(s) urls directly.
    fn ffmpeg_input(url: &str) -> Result<String, MediaError> {
        match locate(url)? {
            Location::File(path) => {
                if !path.exists() {
                    return Err(MediaError::Io {
                        url: url.to_string(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "no such file",
                        ),
                    });
                }
                Ok(path.to_string_lossy().into_owned())
            }
            Location::Remote(remote) => Ok(remote),
        }
    }

    fn video_dimensions(&self, url: &str, input: &str) -> Result<(u32, u32), MediaError> {
        #[derive(Deserialize)]
        struct StreamInfo {
            codec_type: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
        }
        #[derive(Deserialize)]
        struct StreamList {
            #[serde(default)]
            streams: Vec<StreamInfo>,
        }

        let ffmpeg_err = |message: String| MediaError::Ffmpeg {
            url: url.to_string(),
            message,
        };
        let out = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-print_format",
                "json",
                "-show_streams",
            ])
            .arg(input)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| ffmpeg_err(format!("failed to run ffprobe: {err}")))?;
        if !out.status.success() {
            return Err(ffmpeg_err(format!(
                "ffprobe exited with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        let parsed: StreamList = serde_json::from_slice(&out.stdout)
            .map_err(|err| ffmpeg_err(format!("ffprobe json parse failed: {err}")))?;
        let stream = parsed
            .streams
            .iter()
            .find(|stream| stream.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| ffmpeg_err("no video stream found".to_string()))?;
        match (stream.width, stream.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Ok((width, height)),
            _ => Err(ffmpeg_err("ffprobe reported no frame size".to_string())),
        }
    }

    fn decode_single_frame(
        &self,
        url: &str,
        input: &str,
        (width, height): (u32, u32),
        offset: Duration,
    ) -> Result<Option<RgbaImage>, MediaError> {
        let out = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-ss", &format!("{:.3}", offset.as_secs_f64())])
            .arg("-i")
            .arg(input)
            .args(["-an", "-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
            .stdin(Stdio::null())
            .output()
            .map_err(|err| MediaError::Ffmpeg {
                url: url.to_string(),
                message: format!("failed to run ffmpeg: {err}"),
            })?;
        if !out.status.success() {
            return Err(MediaError::Ffmpeg {
                url: url.to_string(),
                message: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        let expected = width as usize * height as usize * 4;
        if out.stdout.len() < expected {
            return Ok(None);
        }
        let mut pixels = out.stdout;
        pixels.truncate(expected);
        Ok(RgbaImage::from_raw(width, height, pixels))
    }
}

impl MediaBackend for SystemMedia {
    fn load_image(&self, url: &str) -> Result<RgbaImage, MediaError> {
        let bytes = self.read_bytes(url)?;
        let image = image::load_from_memory(&bytes).map_err(|source| MediaError::Decode {
            url: url.to_string(),
            source,
        })?;
        Ok(image.to_rgba8())
    }

    fn video_frame_at(&self, url: &str, offset: Duration) -> Result<RgbaImage, MediaError> {
        let input = Self::ffmpeg_input(url)?;
        let size = self.video_dimensions(url, &input)?;
        if let Some(frame) = self.decode_single_frame(url, &input, size, offset)? {
            return Ok(frame);
        }
        // Clips shorter than the seek offset yield nothing; use their first frame.
        debug!(url, "seek offset past end of clip; sampling first frame");
        self.decode_single_frame(url, &input, size, Duration::ZERO)?
            .ok_or_else(|| MediaError::NoFrame {
                url: url.to_string(),
            })
    }

    fn open_video(&self, url: &str) -> Result<Box<dyn VideoFeed>, MediaError> {
        let input = Self::ffmpeg_input(url)?;
        let size = self.video_dimensions(url, &input)?;
        let feed = FfmpegFeed::spawn(&self.ffmpeg, url, &input, size)?;
        Ok(Box::new(feed))
    }
}

#[derive(Default)]
struct FeedShared {
    latest: Mutex<Option<RgbaImage>>,
    ready: AtomicBool,
    paused: AtomicBool,
    stopped: AtomicBool,
    ended: AtomicBool,
}

/// `ffmpeg -re -stream_loop -1` piping raw RGBA frames to a reader thread.
pub struct FfmpegFeed {
    url: String,
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
    shared: Arc<FeedShared>,
}

impl FfmpegFeed {
    fn spawn(
        ffmpeg: &Path,
        url: &str,
        input: &str,
        (width, height): (u32, u32),
    ) -> Result<Self, MediaError> {
        let mut child = Command::new(ffmpeg)
            .args(["-v", "error", "-re", "-stream_loop", "-1", "-i"])
            .arg(input)
            .args(["-an", "-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| MediaError::Ffmpeg {
                url: url.to_string(),
                message: format!("failed to spawn ffmpeg: {err}"),
            })?;
        let mut stdout = child.stdout.take().ok_or_else(|| MediaError::Ffmpeg {
            url: url.to_string(),
            message: "ffmpeg stdout was not captured".to_string(),
        })?;

        let shared = Arc::new(FeedShared::default());
        let thread_shared = Arc::clone(&shared);
        let thread_url = url.to_string();
        let frame_len = width as usize * height as usize * 4;
        let reader = thread::Builder::new()
            .name("moodwall-video".into())
            .spawn(move || {
                let mut buffer = vec![0u8; frame_len];
                loop {
                    if thread_shared.stopped.load(Ordering::Acquire) {
                        break;
                    }
                    if thread_shared.paused.load(Ordering::Acquire) {
                        thread::sleep(PAUSE_POLL);
                        continue;
                    }
                    if let Err(err) = stdout.read_exact(&mut buffer) {
                        if !thread_shared.stopped.load(Ordering::Acquire) {
                            debug!(url = %thread_url, error = %err, "video stream ended");
                        }
                        break;
                    }
                    let Some(frame) = RgbaImage::from_raw(width, height, buffer.clone()) else {
                        break;
                    };
                    if let Ok(mut latest) = thread_shared.latest.lock() {
                        *latest = Some(frame);
                    }
                    thread_shared.ready.store(true, Ordering::Release);
                }
                thread_shared.ended.store(true, Ordering::Release);
            })
            .map_err(|err| MediaError::Ffmpeg {
                url: url.to_string(),
                message: format!("failed to spawn video reader: {err}"),
            })?;

        debug!(url, width, height, "video stream started");
        Ok(Self {
            url: url.to_string(),
            child: Some(child),
            reader: Some(reader),
            shared,
        })
    }
}

impl VideoFeed for FfmpegFeed {
    fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::Acquire)
    }

    fn take_frame(&mut self) -> Option<RgbaImage> {
        self.shared.latest.lock().ok()?.take()
    }

    fn play(&mut self) {
        self.shared.paused.store(false, Ordering::Release);
    }

    fn pause(&mut self) {
        self.shared.paused.store(true, Ordering::Release);
    }

    fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    fn has_ended(&self) -> bool {
        self.shared.ended.load(Ordering::Acquire)
    }

    fn stop(&mut self) {
        self.shared.stopped.store(true, Ordering::Release);
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.kill() {
                debug!(url = %self.url, error = %err, "ffmpeg already exited");
            }
            let _ = child.wait();
        }
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!(url = %self.url, "video reader thread panicked");
            }
        }
        if let Ok(mut latest) = self.shared.latest.lock() {
            latest.take();
        }
        self.shared.ready.store(false, Ordering::Release);
    }
}

impl Drop for FfmpegFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_paths_and_urls() {
        assert_eq!(
            locate("/tmp/a.jpg").unwrap(),
            Location::File(PathBuf::from("/tmp/a.jpg"))
        );
        assert_eq!(
            locate("file:///tmp/a.jpg").unwrap(),
            Location::File(PathBuf::from("/tmp/a.jpg"))
        );
        assert_eq!(
            locate("https://example.com/b.png").unwrap(),
            Location::Remote("https://example.com/b.png".into())
        );
        assert!(matches!(locate("ftp://host/c.png"), Err(MediaError::Unsupported(_))));
        assert!(matches!(locate("   "), Err(MediaError::Unsupported(_))));
    }

    #[test]
    fn loads_local_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swatch.png");
        RgbaImage::from_pixel(4, 3, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let media = SystemMedia::new().unwrap();
        let image = media.load_image(path.to_str().unwrap()).unwrap();
        assert_eq!(image.dimensions(), (4, 3));
        assert_eq!(image.get_pixel(2, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let media = SystemMedia::new().unwrap();
        let err = media.load_image("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, MediaError::Io { .. }));
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();
        let media = SystemMedia::new().unwrap();
        let err = media.load_image(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, MediaError::Decode { .. }));
    }
}
