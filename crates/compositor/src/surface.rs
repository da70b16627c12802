//! The embeddable render loop.
//!
//! `RenderLoop` is a three-state machine: it starts `Uninitialized`, becomes
//! `Running` once a window has been mounted and the GPU is ready, and ends in
//! `TornDown`. Teardown is idempotent and also runs on drop; nothing is
//! defined after it, so a host that wants to show the surface again creates a
//! new loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use winit::window::Window;

use crate::gpu::GpuState;
use crate::media::MediaBackend;
use crate::session::Session;
use crate::types::{CompositorConfig, SurfaceProps};

const STATS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Uninitialized,
    Running,
    TornDown,
}

struct Mounted {
    // Dropped before `window`; the surface borrows its handles.
    gpu: GpuState,
    window: Arc<Window>,
}

enum LoopState {
    Uninitialized,
    Running(Box<Mounted>),
    TornDown,
}

pub struct RenderLoop {
    session: Session,
    state: LoopState,
    frames: u64,
    last_stats: Instant,
}

impl RenderLoop {
    pub fn new(config: CompositorConfig, media: Arc<dyn MediaBackend>) -> Self {
        Self {
            session: Session::new(&config, media),
            state: LoopState::Uninitialized,
            frames: 0,
            last_stats: Instant::now(),
        }
    }

    /// Registers the host's palette listener. It receives the five CSS colors
    /// once per accepted extraction.
    pub fn on_colors<F>(&mut self, callback: F)
    where
        F: FnMut(&[String; 5]) + Send + 'static,
    {
        self.session.set_color_callback(Box::new(callback));
    }

    pub fn phase(&self) -> LoopPhase {
        match self.state {
            LoopState::Uninitialized => LoopPhase::Uninitialized,
            LoopState::Running(_) => LoopPhase::Running,
            LoopState::TornDown => LoopPhase::TornDown,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Creates the GPU surface for `window`. On failure the error is logged and
    /// the loop keeps running without drawing anything.
    pub fn mount(&mut self, window: Arc<Window>) -> bool {
        match self.state {
            LoopState::Uninitialized => {}
            LoopState::Running(_) => {
                warn!("render loop already mounted");
                return true;
            }
            LoopState::TornDown => {
                warn!("cannot mount a torn-down render loop");
                return false;
            }
        }

        match GpuState::new(window.as_ref(), window.inner_size()) {
            Ok(gpu) => {
                let size = gpu.size();
                info!(width = size.width, height = size.height, "GPU surface ready");
                self.state = LoopState::Running(Box::new(Mounted { gpu, window }));
                true
            }
            Err(err) => {
                error!(error = %format!("{err:#}"), "GPU setup failed; rendering nothing");
                false
            }
        }
    }

    /// Accepts new host props. `active == false` tears the surface down.
    pub fn set_props(&mut self, props: SurfaceProps) {
        if self.phase() == LoopPhase::TornDown {
            debug!("ignoring props after teardown");
            return;
        }
        if !props.active {
            self.teardown();
            return;
        }
        self.session.set_props(&props, Instant::now());
    }

    /// Starts a dissolve overlay for an item leaving the board.
    pub fn dissolve(&mut self, url: &str, initial_color: Option<&str>) -> Option<u64> {
        if self.phase() == LoopPhase::TornDown {
            return None;
        }
        Some(self.session.dissolve(url, initial_color, Instant::now()))
    }

    pub fn active_dissolves(&self) -> usize {
        self.session.active_dissolves()
    }

    pub fn is_dissolving(&self, id: u64) -> bool {
        self.session.is_dissolving(id)
    }

    pub fn frame(&mut self) {
        self.frame_at(Instant::now());
    }

    /// One iteration of the loop at `now`.
    pub fn frame_at(&mut self, now: Instant) {
        if matches!(self.state, LoopState::TornDown) {
            return;
        }
        let frame = self.session.pump(now);

        let LoopState::Running(mounted) = &mut self.state else {
            return;
        };
        let size = mounted.window.inner_size();
        mounted.gpu.resize(size);

        match mounted.gpu.render(&frame) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                debug!("surface lost or outdated; reconfiguring");
                mounted.gpu.reconfigure();
            }
            Err(wgpu::SurfaceError::Timeout) => {
                debug!("surface timeout; retrying next frame");
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                error!("surface out of memory; releasing GPU resources");
                self.state = LoopState::Uninitialized;
                return;
            }
            Err(other) => {
                warn!(error = ?other, "surface error; retrying next frame");
            }
        }

        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.last_stats);
        if elapsed >= STATS_INTERVAL {
            let preset = frame.scene.preset();
            debug!(
                fps = (self.frames as f32 / elapsed.as_secs_f32()).round(),
                time = frame.scene.time,
                mix = frame.scene.slots.mix,
                style = frame.scene.style,
                speed = preset.speed,
                image_opacity = preset.image_opacity,
                dissolves = frame.dissolves.len(),
                "render stats"
            );
            self.frames = 0;
            self.last_stats = now;
        }
    }

    /// Cancels pending work, stops every video and drops GPU objects.
    pub fn teardown(&mut self) {
        if matches!(self.state, LoopState::TornDown) {
            return;
        }
        self.session.teardown();
        self.state = LoopState::TornDown;
        info!("render loop torn down");
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{solid, MockMedia};
    use crate::types::SourceDescriptor;
    use std::sync::Mutex;
    use std::thread;

    fn render_loop(media: Arc<MockMedia>) -> RenderLoop {
        RenderLoop::new(CompositorConfig::default(), media)
    }

    #[test]
    fn teardown_without_frames_is_idempotent() {
        let mut render = render_loop(Arc::new(MockMedia::new()));
        assert_eq!(render.phase(), LoopPhase::Uninitialized);
        render.teardown();
        render.teardown();
        assert_eq!(render.phase(), LoopPhase::TornDown);
        render.frame();
        render.set_props(SurfaceProps::default());
        assert!(render.dissolve("x.jpg", None).is_none());
    }

    #[test]
    fn inactive_props_tear_down() {
        let mut render = render_loop(Arc::new(MockMedia::new()));
        render.set_props(SurfaceProps {
            active: false,
            ..SurfaceProps::default()
        });
        assert_eq!(render.phase(), LoopPhase::TornDown);
    }

    #[test]
    fn palette_flows_without_a_gpu() {
        let media = Arc::new(MockMedia::new());
        media.add_image("a.jpg", solid([40, 50, 60, 255]));
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);

        let mut render = render_loop(media);
        render.on_colors(move |colors| {
            *sink.lock().unwrap() = Some(colors[0].clone());
        });
        render.set_props(SurfaceProps {
            source: Some(SourceDescriptor::image("a.jpg")),
            ..SurfaceProps::default()
        });

        let deadline = Instant::now() + Duration::from_secs(5);
        while seen.lock().unwrap().is_none() && Instant::now() < deadline {
            render.frame();
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(seen.lock().unwrap().as_deref(), Some("rgb(40, 50, 60)"));
        assert_eq!(render.phase(), LoopPhase::Uninitialized);
    }

    #[test]
    fn dissolves_are_tracked_until_finished() {
        let mut render = render_loop(Arc::new(MockMedia::new()));
        let id = render.dissolve("gone.jpg", Some("rgb(1, 2, 3)")).unwrap();
        assert!(render.is_dissolving(id));
        assert_eq!(render.active_dissolves(), 1);
        render.frame_at(Instant::now() + Duration::from_secs(3));
        assert!(!render.is_dissolving(id));
    }
}
