//! Native window shell built on winit
//!
//! Translates window events into core events and executes the commands the
//! core returns. Asset loads run synchronously on the event loop thread.

use crate::ShellError;
use crate::asset_loader::AssetLoader;
use crate::renderer::Renderer;
use relic::*;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

/// Scroll distance of one wheel "line", matching browser `deltaY` units
const LINE_HEIGHT_PX: f32 = 100.0;

/// Open a window and run the viewer until it is closed.
pub fn run(config: ViewerConfig, base_path: Option<PathBuf>) -> Result<(), ShellError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut loader = AssetLoader::new();
    if let Some(base) = base_path {
        loader.set_base_path(base);
    }

    let mut app = NativeApp::new(config, loader);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct NativeApp {
    core: SceneBootstrap,
    loader: AssetLoader,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    start: Instant,
    last_frame: Instant,
    frame: u64,
    /// Last pointer position in CSS pixels
    cursor: (f32, f32),
    error: Option<ShellError>,
}

impl NativeApp {
    fn new(config: ViewerConfig, loader: AssetLoader) -> Self {
        let now = Instant::now();
        Self {
            core: SceneBootstrap::new(config),
            loader,
            window: None,
            renderer: None,
            start: now,
            last_frame: now,
            frame: 0,
            cursor: (0.0, 0.0),
            error: None,
        }
    }

    fn scale_factor(&self) -> f64 {
        self.window.as_ref().map(|w| w.scale_factor()).unwrap_or(1.0)
    }

    fn logical(&self, size: PhysicalSize<u32>) -> (u32, u32, f32) {
        let dpr = self.scale_factor();
        let logical: LogicalSize<f64> = size.to_logical(dpr);
        (logical.width.round() as u32, logical.height.round() as u32, dpr as f32)
    }

    fn pointer(&self, position: PhysicalPosition<f64>) -> (f32, f32) {
        let logical = position.to_logical::<f64>(self.scale_factor());
        (logical.x as f32, logical.y as f32)
    }

    fn dispatch(&mut self, event_loop: &ActiveEventLoop, event: Event) {
        let commands = self.core.handle(event);
        self.execute(event_loop, commands);
    }

    fn execute(&mut self, event_loop: &ActiveEventLoop, commands: Vec<Command>) {
        let mut queue: VecDeque<Command> = commands.into();
        while let Some(command) = queue.pop_front() {
            match command {
                Command::Renderer(RendererCommand::Configure(settings)) => {
                    if let Some(renderer) = &mut self.renderer {
                        renderer.configure(settings);
                        continue;
                    }
                    let Some(window) = self.window.clone() else { continue };
                    match pollster::block_on(Renderer::new(window, settings, wgpu::Backends::all())) {
                        Ok(renderer) => self.renderer = Some(renderer),
                        Err(e) => return self.fail(event_loop, e),
                    }
                }
                Command::Renderer(RendererCommand::SetSize { width, height }) => {
                    let dpr = self.scale_factor() as f32;
                    if let Some(renderer) = &mut self.renderer {
                        renderer.resize(width, height, dpr);
                    }
                }
                Command::Renderer(RendererCommand::Render) => {
                    if let Some(renderer) = &mut self.renderer {
                        if let Err(e) = renderer.render(self.core.scene(), self.core.camera()) {
                            return self.fail(event_loop, e);
                        }
                    }
                }
                Command::Asset(AssetCommand::Load { asset_id, path }) => {
                    for event in self.loader.load(&asset_id, &path) {
                        queue.extend(self.core.handle(Event::Asset(event)));
                    }
                }
                Command::Page(PageCommand::HideLoader) => {
                    if let Some(window) = &self.window {
                        window.set_title(&format!("relic - {}", self.core.config().model_path));
                    }
                }
            }
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: ShellError) {
        log::error!("Shell error: {}", error);
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for NativeApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title("relic - loading")
            .with_inner_size(LogicalSize::new(1280.0, 720.0));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };
        let size = window.inner_size();
        self.window = Some(window);

        let (width, height, dpr) = self.logical(size);
        self.dispatch(
            event_loop,
            Event::Lifecycle(LifecycleEvent::Init(InitEvent {
                platform: Platform::Desktop,
                viewport_width: width,
                viewport_height: height,
                dpr,
            })),
        );
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.dispatch(event_loop, Event::Lifecycle(LifecycleEvent::Shutdown));
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                let (width, height, dpr) = self.logical(size);
                self.dispatch(
                    event_loop,
                    Event::Lifecycle(LifecycleEvent::Resize(ResizeEvent { width, height, dpr })),
                );
            }

            WindowEvent::CursorMoved { position, .. } => {
                let (x, y) = self.pointer(position);
                self.cursor = (x, y);
                self.dispatch(event_loop, Event::Input(InputEvent::Mouse(MouseEvent::Move(MouseMoveData { x, y }))));
            }

            WindowEvent::MouseInput { state, button, .. } => {
                let button = match button {
                    winit::event::MouseButton::Left => MouseButton::Left,
                    winit::event::MouseButton::Middle => MouseButton::Middle,
                    winit::event::MouseButton::Right => MouseButton::Right,
                    _ => return,
                };
                // winit button events carry no position
                let (x, y) = self.cursor;
                let data = MouseButtonData { x, y, button };
                let mouse = match state {
                    ElementState::Pressed => MouseEvent::Down(data),
                    ElementState::Released => MouseEvent::Up(data),
                };
                self.dispatch(event_loop, Event::Input(InputEvent::Mouse(mouse)));
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let (dx, dy) = match delta {
                    MouseScrollDelta::LineDelta(x, y) => (-x * LINE_HEIGHT_PX, -y * LINE_HEIGHT_PX),
                    MouseScrollDelta::PixelDelta(p) => (-p.x as f32, -p.y as f32),
                };
                self.dispatch(event_loop, Event::Input(InputEvent::Mouse(MouseEvent::Wheel(MouseWheelData { dx, dy }))));
            }

            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.last_frame).as_secs_f32();
                self.last_frame = now;
                let time = (now - self.start).as_secs_f64();

                self.dispatch(
                    event_loop,
                    Event::Lifecycle(LifecycleEvent::Frame(FrameEvent { time, dt, frame: self.frame })),
                );
                self.frame += 1;
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
