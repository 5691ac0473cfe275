//! objview - a Vulkan viewer for Wavefront OBJ models.
//!
//! Usage: `objview [MODEL.obj] [--size WxH] [--tiling X,Y] [--scroll X,Y]
//! [--fade START,END] [--validation | --no-validation]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowId;

use objview_core::{Timer, ViewerConfig};
use objview_platform::{InputState, KeyCode, MouseButton, Window};
use objview_renderer::{Renderer, RendererResult};

struct App {
    config: ViewerConfig,
    // Dropped before the window it presents into
    renderer: Option<Renderer>,
    window: Option<Window>,
    input: InputState,
    timer: Timer,
}

impl App {
    fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            renderer: None,
            window: None,
            input: InputState::new(),
            timer: Timer::new(),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Window::new(
            event_loop,
            self.config.width,
            self.config.height,
            &self.config.title,
        )?;
        let mut renderer =
            Renderer::new(&window, &self.config).context("renderer initialization failed")?;

        let [tx, ty] = self.config.tex_tiling;
        renderer.set_tex_tiling(tx, ty);
        let [sx, sy] = self.config.tex_scroll;
        renderer.set_tex_scroll(sx, sy);

        load_first_model(&mut renderer, &self.config.model_candidates(exe_dir().as_deref()));

        self.timer.reset();
        self.renderer = Some(renderer);
        self.window = Some(window);
        info!("Initialization complete, entering main loop");
        Ok(())
    }

    fn redraw(&mut self) {
        let (Some(window), Some(renderer)) = (&self.window, &mut self.renderer) else {
            return;
        };
        if window.is_minimized() {
            return;
        }

        self.timer.tick();
        if let Err(e) = render_frame(renderer, &self.timer, self.config.clear_color) {
            error!("Frame failed: {}", e);
        }

        self.input.end_frame();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            error!("{:#}", e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(window) = &mut self.window {
                    window.resize(size.width, size.height);
                }
                if let Some(renderer) = &mut self.renderer {
                    if let Err(e) = renderer.on_resize(size.width, size.height) {
                        error!("Resize to {}x{} failed: {}", size.width, size.height, e);
                    }
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(key) = event.physical_key else {
                    return;
                };
                match event.state {
                    ElementState::Pressed => self.input.on_key_pressed(key),
                    ElementState::Released => self.input.on_key_released(key),
                }
                if self.input.is_key_down(KeyCode::Escape) {
                    info!("Escape pressed, shutting down");
                    event_loop.exit();
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input
                    .on_mouse_moved(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if let Some(button) = MouseButton::from_winit(button) {
                    match state {
                        ElementState::Pressed => self.input.on_mouse_pressed(button),
                        ElementState::Released => self.input.on_mouse_released(button),
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn render_frame(renderer: &mut Renderer, timer: &Timer, clear_color: [f32; 4]) -> RendererResult<()> {
    renderer.begin_frame(clear_color)?;
    renderer.draw_scene(timer.total_secs(), timer.delta_secs())?;
    renderer.end_frame()
}

fn exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
}

/// Loads the first candidate that succeeds; the default cube stays otherwise.
fn load_first_model(renderer: &mut Renderer, candidates: &[PathBuf]) {
    for path in candidates {
        if !path.exists() {
            warn!("Model not found at '{}'", path.display());
            continue;
        }
        if renderer.load_obj(path) {
            return;
        }
    }
    error!(
        "No model could be loaded (tried {} location(s)); showing the default cube",
        candidates.len()
    );
}

fn main() -> Result<()> {
    let config = ViewerConfig::from_env();
    objview_core::init_logging();

    info!("Starting objview");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
