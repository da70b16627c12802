use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use boardconfig::BoardConfig;
use compositor::{
    CompositorConfig, LoopPhase, MediaBackend, RenderLoop, SourceDescriptor, SurfaceProps,
};
use slideshow::{Slide, SlideChange, Slideshow};
use tracing::{debug, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use crate::run::initial_props;

pub struct PreviewConfig {
    pub board: BoardConfig,
    pub compositor: CompositorConfig,
    pub size: (u32, u32),
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Quit,
}

/// Slideshow and surface props driven by keyboard input, independent of any window.
struct Controls {
    render: RenderLoop,
    slideshow: Slideshow,
    props: SurfaceProps,
}

impl Controls {
    fn new(render: RenderLoop, slideshow: Slideshow, props: SurfaceProps) -> Self {
        Self {
            render,
            slideshow,
            props,
        }
    }

    fn show_current(&mut self) {
        let current = self.slideshow.current();
        self.show(current);
    }

    fn show(&mut self, change: Option<SlideChange>) {
        match &change {
            Some(change) => info!(
                index = change.index,
                url = %change.slide.url,
                video = change.slide.is_video,
                "showing item"
            ),
            None => info!("board is empty"),
        }
        self.props.source = change.map(|change| descriptor(&change.slide));
        self.push_props();
    }

    fn push_props(&mut self) {
        self.render.set_props(self.props.clone());
    }

    fn tick(&mut self, now: Instant) {
        if let Some(change) = self.slideshow.tick(now) {
            self.show(Some(change));
        }
    }

    fn handle_key(&mut self, key: &Key, now: Instant) -> KeyOutcome {
        match key {
            Key::Named(NamedKey::Escape) => return KeyOutcome::Quit,
            Key::Named(NamedKey::Space) => self.toggle_pause(now),
            Key::Named(NamedKey::ArrowRight) => {
                if let Some(change) = self.slideshow.skip(now) {
                    self.show(Some(change));
                }
            }
            Key::Named(NamedKey::Delete) => self.remove_current(now),
            Key::Character(value) => match value.to_ascii_lowercase().as_str() {
                " " => self.toggle_pause(now),
                "m" => {
                    self.props.style = self.props.style.toggled();
                    info!(style = ?self.props.style, "style mode changed");
                    self.push_props();
                }
                "b" => {
                    self.props.motion_blur = !self.props.motion_blur;
                    info!(enabled = self.props.motion_blur, "motion blur toggled");
                    self.push_props();
                }
                _ => {}
            },
            _ => {}
        }
        KeyOutcome::Continue
    }

    fn toggle_pause(&mut self, now: Instant) {
        let paused = !self.slideshow.is_paused();
        self.slideshow.set_paused(paused, now);
        self.props.paused = paused;
        info!(paused, "slideshow pause toggled");
        self.push_props();
    }

    fn remove_current(&mut self, now: Instant) {
        let Some(current) = self.slideshow.current() else {
            return;
        };
        if !current.slide.is_video {
            let color = self
                .render
                .session()
                .last_extraction()
                .map(|extraction| extraction.css[0].clone());
            if let Some(id) = self.render.dissolve(&current.slide.url, color.as_deref()) {
                debug!(id, url = %current.slide.url, "dissolving removed item");
            }
        }
        let next = self.slideshow.remove_current(now);
        self.show(next);
    }
}

fn descriptor(slide: &Slide) -> SourceDescriptor {
    if slide.is_video {
        SourceDescriptor::video(slide.url.clone())
    } else {
        SourceDescriptor::image(slide.url.clone())
    }
}

pub fn run_preview(config: PreviewConfig, media: Arc<dyn MediaBackend>) -> Result<()> {
    let PreviewConfig {
        board,
        compositor,
        size,
        seed,
    } = config;

    let slideshow = Slideshow::new(&board.items, &board.slideshow, seed, Instant::now())
        .context("board cannot be shown")?;

    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let title = board.title.clone().unwrap_or_else(|| "moodwall".to_string());
    let window = WindowBuilder::new()
        .with_title(title)
        .with_inner_size(PhysicalSize::new(size.0, size.1))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let mut render = RenderLoop::new(compositor, media);
    render.on_colors(|colors| {
        info!(colors = ?colors, "palette updated");
    });
    if !render.mount(Arc::clone(&window)) {
        warn!("continuing without GPU output");
    }

    let mut controls = Controls::new(render, slideshow, initial_props(&board));
    controls.show_current();
    window.request_redraw();

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                elwt.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed
                    && !event.repeat
                    && controls.handle_key(&event.logical_key, Instant::now()) == KeyOutcome::Quit
                {
                    elwt.exit();
                }
            }
            WindowEvent::RedrawRequested => {
                controls.render.frame();
                if controls.render.phase() == LoopPhase::TornDown {
                    elwt.exit();
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            controls.tick(Instant::now());
            window.request_redraw();
            elwt.set_control_flow(ControlFlow::Wait);
        }
        Event::LoopExiting => {
            controls.render.teardown();
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("preview event loop error: {err}"))
}
