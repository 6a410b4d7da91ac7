//! Artifact viewer: a canvas driven by the scene bootstrap
//!
//! All viewer state lives in one `Rc<RefCell<ViewerState>>` shared by the
//! animation frame, DOM listeners and the model fetch. Borrows never span
//! an await point.

use crate::WebError;
use crate::render_loop::RenderLoop;
use relic::*;
use relic_shell::{Renderer, instance_descriptor};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, EventTarget, HtmlCanvasElement, HtmlElement, PointerEvent, WheelEvent};

struct ViewerState {
    core: SceneBootstrap,
    renderer: Option<Renderer>,
    canvas: HtmlCanvasElement,
    container: HtmlElement,
    start_time: f64,
    last_time: f64,
    frame: u64,
}

type Shared = Rc<RefCell<ViewerState>>;

/// A DOM listener removed again on drop.
struct Listener {
    target: EventTarget,
    kind: &'static str,
    callback: Closure<dyn FnMut(web_sys::Event)>,
}

impl Listener {
    fn add(
        target: &EventTarget,
        kind: &'static str,
        passive: bool,
        handler: impl FnMut(web_sys::Event) + 'static,
    ) -> Result<Self, WebError> {
        let callback = Closure::<dyn FnMut(web_sys::Event)>::new(handler);
        let options = web_sys::AddEventListenerOptions::new();
        options.set_passive(passive);
        target.add_event_listener_with_callback_and_add_event_listener_options(
            kind,
            callback.as_ref().unchecked_ref(),
            &options,
        )?;
        Ok(Self {
            target: target.clone(),
            kind,
            callback,
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Err(e) = self
            .target
            .remove_event_listener_with_callback(self.kind, self.callback.as_ref().unchecked_ref())
        {
            log::warn!("Failed to remove {} listener: {:?}", self.kind, e);
        }
    }
}

/// Running viewer. Dropping it or calling `stop()` ends the render loop.
#[wasm_bindgen]
pub struct ViewerHandle {
    state: Shared,
    render_loop: RenderLoop,
    listeners: Vec<Listener>,
}

#[wasm_bindgen]
impl ViewerHandle {
    /// Cancel the pending animation frame and detach all listeners.
    pub fn stop(&mut self) {
        if !self.render_loop.is_running() {
            return;
        }
        self.render_loop.cancel();
        self.listeners.clear();
        dispatch(&self.state, Event::Lifecycle(LifecycleEvent::Shutdown));
        log::info!("Viewer stopped");
    }

    /// Bootstrap state: `Initializing`, `Ready` or `Degraded`.
    pub fn state(&self) -> String {
        format!("{:?}", self.state.borrow().core.state())
    }
}

/// Start the 3D viewer.
///
/// `config` is optional [`ViewerConfig`] JSON. Without it the config is
/// read from the `data-config` attribute of `#model-canvas`.
#[wasm_bindgen]
pub async fn start_viewer(config: Option<String>) -> Result<ViewerHandle, JsValue> {
    Ok(start(config).await?)
}

async fn start(config_json: Option<String>) -> Result<ViewerHandle, WebError> {
    let window = web_sys::window().ok_or(WebError::MissingApi("window"))?;
    let document = window.document().ok_or(WebError::MissingApi("document"))?;

    let (config, canvas) = match config_json {
        Some(json) => {
            let config = ViewerConfig::from_json(&json)?;
            let canvas = query::<HtmlCanvasElement>(&document, &config.canvas_selector)?;
            (config, canvas)
        }
        None => {
            let canvas = query::<HtmlCanvasElement>(&document, &ViewerConfig::default().canvas_selector)?;
            let config = match canvas.dataset().get("config") {
                Some(json) => ViewerConfig::from_json(&json)?,
                None => ViewerConfig::default(),
            };
            (config, canvas)
        }
    };

    let container = match query::<HtmlElement>(&document, &config.container_selector) {
        Ok(container) => container,
        Err(_) => {
            log::warn!("No {} found, sizing from the canvas", config.container_selector);
            canvas.clone().into()
        }
    };

    let (width, height) = element_size(&container);
    let platform = if has_webgpu(&window) { Platform::WebGPU } else { Platform::WebGL };

    let mut core = SceneBootstrap::new(config);
    let commands = core.handle(Event::Lifecycle(LifecycleEvent::Init(InitEvent {
        platform,
        viewport_width: width,
        viewport_height: height,
        dpr: window.device_pixel_ratio() as f32,
    })));

    // Renderer creation is async, so the first Configure is handled here
    let mut renderer = None;
    let mut deferred = Vec::new();
    for command in commands {
        match command {
            Command::Renderer(RendererCommand::Configure(settings)) if renderer.is_none() => {
                size_canvas(&canvas, &settings)?;
                let target = wgpu::SurfaceTarget::Canvas(canvas.clone());
                // Falls back to WebGL when navigator.gpu exists but yields no adapter
                let descriptor = instance_descriptor(wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL);
                let instance = wgpu::util::new_instance_with_webgpu_detection(&descriptor).await;
                renderer = Some(Renderer::with_instance(instance, target, settings).await?);
            }
            other => deferred.push(other),
        }
    }

    let now = window.performance().map(|p| p.now()).unwrap_or(0.0);
    let state = Rc::new(RefCell::new(ViewerState {
        core,
        renderer,
        canvas,
        container,
        start_time: now,
        last_time: now,
        frame: 0,
    }));
    execute(&state, deferred);

    let listeners = install_listeners(&window, &state)?;
    let render_loop = {
        let state = state.clone();
        RenderLoop::start(move |timestamp| tick(&state, timestamp))?
    };

    log::info!("Viewer started on {:?}: {}x{}", platform, width, height);

    Ok(ViewerHandle {
        state,
        render_loop,
        listeners,
    })
}

fn tick(state: &Shared, timestamp: f64) {
    let frame = {
        let mut s = state.borrow_mut();
        let dt = ((timestamp - s.last_time) / 1000.0).max(0.0) as f32;
        s.last_time = timestamp;
        let frame = FrameEvent {
            time: (timestamp - s.start_time) / 1000.0,
            dt,
            frame: s.frame,
        };
        s.frame += 1;
        frame
    };
    dispatch(state, Event::Lifecycle(LifecycleEvent::Frame(frame)));
}

fn dispatch(state: &Shared, event: Event) {
    let commands = state.borrow_mut().core.handle(event);
    execute(state, commands);
}

fn execute(state: &Shared, commands: Vec<Command>) {
    for command in commands {
        match command {
            Command::Renderer(RendererCommand::Configure(settings)) => {
                let mut guard = state.borrow_mut();
                let s = &mut *guard;
                if let Err(e) = size_canvas(&s.canvas, &settings) {
                    log::warn!("Failed to size canvas: {}", e);
                }
                if let Some(renderer) = s.renderer.as_mut() {
                    renderer.configure(settings);
                }
            }
            Command::Renderer(RendererCommand::SetSize { width, height }) => {
                let dpr = web_sys::window().map(|w| w.device_pixel_ratio() as f32).unwrap_or(1.0);
                let mut guard = state.borrow_mut();
                let s = &mut *guard;
                if let Some(renderer) = s.renderer.as_mut() {
                    renderer.resize(width, height, dpr);
                    if let Err(e) = size_canvas(&s.canvas, renderer.settings()) {
                        log::warn!("Failed to size canvas: {}", e);
                    }
                }
            }
            Command::Renderer(RendererCommand::Render) => {
                let mut guard = state.borrow_mut();
                let ViewerState { core, renderer, .. } = &mut *guard;
                if let Some(renderer) = renderer {
                    if let Err(e) = renderer.render(core.scene(), core.camera()) {
                        log::error!("Render failed: {}", e);
                    }
                }
            }
            Command::Asset(AssetCommand::Load { asset_id, path }) => {
                wasm_bindgen_futures::spawn_local(load_asset(state.clone(), asset_id, path));
            }
            Command::Page(PageCommand::HideLoader) => {
                let loader_id = state.borrow().core.config().loader_id.clone();
                hide_element(&loader_id);
            }
        }
    }
}

async fn load_asset(state: Shared, asset_id: AssetId, path: String) {
    dispatch(
        &state,
        Event::Asset(AssetEvent::LoadStarted {
            asset_id: asset_id.clone(),
            path: path.clone(),
        }),
    );

    match fetch_bytes(&path).await {
        Ok((bytes, total)) => {
            dispatch(
                &state,
                Event::Asset(AssetEvent::LoadProgress {
                    asset_id: asset_id.clone(),
                    loaded: bytes.len() as u64,
                    total,
                }),
            );
            dispatch(
                &state,
                Event::Asset(AssetEvent::Loaded(AssetLoadedData {
                    asset_id,
                    asset_type: AssetType::from_path(&path),
                    path,
                    bytes,
                })),
            );
        }
        Err(e) => dispatch(
            &state,
            Event::Asset(AssetEvent::LoadFailed {
                asset_id,
                error: e.to_string(),
            }),
        ),
    }
}

/// Fetch `url`, returning the body and the advertised content length.
async fn fetch_bytes(url: &str) -> Result<(Vec<u8>, Option<u64>), WebError> {
    let window = web_sys::window().ok_or(WebError::MissingApi("window"))?;
    let response: web_sys::Response = JsFuture::from(window.fetch_with_str(url)).await?.dyn_into()?;

    if !response.ok() {
        return Err(WebError::Http {
            url: url.to_string(),
            status: response.status(),
        });
    }

    let total = response
        .headers()
        .get("content-length")?
        .and_then(|v| v.parse::<u64>().ok());
    let buffer = JsFuture::from(response.array_buffer()?).await?;
    Ok((js_sys::Uint8Array::new(&buffer).to_vec(), total))
}

fn install_listeners(window: &web_sys::Window, state: &Shared) -> Result<Vec<Listener>, WebError> {
    let canvas: EventTarget = state.borrow().canvas.clone().into();
    let mut listeners = Vec::new();

    {
        let state = state.clone();
        listeners.push(Listener::add(window, "resize", true, move |_| {
            let (width, height) = element_size(&state.borrow().container);
            let dpr = web_sys::window().map(|w| w.device_pixel_ratio() as f32).unwrap_or(1.0);
            dispatch(&state, Event::Lifecycle(LifecycleEvent::Resize(ResizeEvent { width, height, dpr })));
        })?);
    }

    {
        let state = state.clone();
        listeners.push(Listener::add(&canvas, "pointerdown", true, move |event| {
            let Some(event) = event.dyn_ref::<PointerEvent>() else { return };
            let Some(button) = mouse_button(event.button()) else { return };
            if let Err(e) = state.borrow().canvas.set_pointer_capture(event.pointer_id()) {
                log::debug!("Pointer capture failed: {:?}", e);
            }
            let data = MouseButtonData {
                x: event.offset_x() as f32,
                y: event.offset_y() as f32,
                button,
            };
            dispatch(&state, Event::Input(InputEvent::Mouse(MouseEvent::Down(data))));
        })?);
    }

    {
        let state = state.clone();
        listeners.push(Listener::add(&canvas, "pointermove", true, move |event| {
            let Some(event) = event.dyn_ref::<PointerEvent>() else { return };
            let data = MouseMoveData {
                x: event.offset_x() as f32,
                y: event.offset_y() as f32,
            };
            dispatch(&state, Event::Input(InputEvent::Mouse(MouseEvent::Move(data))));
        })?);
    }

    {
        let state = state.clone();
        listeners.push(Listener::add(&canvas, "pointerup", true, move |event| {
            let Some(event) = event.dyn_ref::<PointerEvent>() else { return };
            let Some(button) = mouse_button(event.button()) else { return };
            let data = MouseButtonData {
                x: event.offset_x() as f32,
                y: event.offset_y() as f32,
                button,
            };
            dispatch(&state, Event::Input(InputEvent::Mouse(MouseEvent::Up(data))));
        })?);
    }

    {
        let state = state.clone();
        // Not passive: the page must not scroll while zooming the model
        listeners.push(Listener::add(&canvas, "wheel", false, move |event| {
            let Some(event) = event.dyn_ref::<WheelEvent>() else { return };
            event.prevent_default();
            let data = MouseWheelData {
                dx: event.delta_x() as f32,
                dy: event.delta_y() as f32,
            };
            dispatch(&state, Event::Input(InputEvent::Mouse(MouseEvent::Wheel(data))));
        })?);
    }

    Ok(listeners)
}

fn mouse_button(button: i16) -> Option<MouseButton> {
    match button {
        0 => Some(MouseButton::Left),
        1 => Some(MouseButton::Middle),
        2 => Some(MouseButton::Right),
        _ => None,
    }
}

fn query<T: JsCast>(document: &Document, selector: &str) -> Result<T, WebError> {
    document
        .query_selector(selector)?
        .and_then(|element| element.dyn_into::<T>().ok())
        .ok_or_else(|| WebError::MissingElement(selector.to_string()))
}

/// Layout size in CSS pixels.
fn element_size(element: &HtmlElement) -> (u32, u32) {
    (element.client_width().max(0) as u32, element.client_height().max(0) as u32)
}

/// Match the drawing buffer to the physical size and the CSS box to the
/// logical size.
fn size_canvas(canvas: &HtmlCanvasElement, settings: &RendererSettings) -> Result<(), WebError> {
    let (width, height) = settings.physical_size();
    canvas.set_width(width);
    canvas.set_height(height);
    let style = canvas.style();
    style.set_property("width", &format!("{}px", settings.width))?;
    style.set_property("height", &format!("{}px", settings.height))?;
    Ok(())
}

fn hide_element(id: &str) {
    let element = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(id))
        .and_then(|e| e.dyn_into::<HtmlElement>().ok());
    match element {
        Some(element) => {
            if let Err(e) = element.style().set_property("display", "none") {
                log::warn!("Failed to hide #{}: {:?}", id, e);
            }
        }
        None => log::debug!("No #{} element to hide", id),
    }
}

fn has_webgpu(window: &web_sys::Window) -> bool {
    js_sys::Reflect::has(&window.navigator(), &JsValue::from_str("gpu")).unwrap_or(false)
}
