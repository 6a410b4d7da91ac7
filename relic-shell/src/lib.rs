//! relic-shell - wgpu renderer and native window shell
//!
//! The renderer is shared with the browser shell (`relic-web`); the winit
//! event loop and file-based asset loading are native only.

#[cfg(not(target_arch = "wasm32"))]
pub mod asset_loader;
#[cfg(not(target_arch = "wasm32"))]
mod native;
pub mod renderer;

#[cfg(not(target_arch = "wasm32"))]
pub use native::run;
pub use renderer::{Renderer, instance_descriptor};

#[derive(thiserror::Error, Debug)]
pub enum ShellError {
    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable GPU adapter: {0}")]
    RequestAdapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("surface has no supported formats")]
    UnsupportedSurface,

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("config error: {0}")]
    Config(#[from] relic::ConfigError),

    #[cfg(not(target_arch = "wasm32"))]
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[cfg(not(target_arch = "wasm32"))]
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
}
