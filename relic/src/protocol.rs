//! Shell-Core Protocol
//!
//! The viewer uses a shell-core architecture:
//! - **Shell**: Platform-specific (browser canvas, native window)
//!   - Owns the GPU surface and the render loop
//!   - Captures input and resize notifications
//!   - Fetches the model file and reports progress
//!   - Executes the commands the core returns
//!
//! - **Core**: Platform-agnostic Rust code
//!   - Receives Events from shell
//!   - Owns the scene graph and the bootstrap state machine
//!   - Emits Commands for shell to execute
//!   - No threads, purely event-driven
//!
//! Events and Commands use an enum-of-enums pattern so handlers only see
//! the categories relevant to them.

use serde::{Deserialize, Serialize};

/// Unique identifier for assets (files being loaded)
pub type AssetId = String;

// ============================================================================
// EVENTS (Shell -> Core)
// ============================================================================

/// Top-level events sent from Shell to Core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "category", content = "event")]
pub enum Event {
    /// Application lifecycle events
    Lifecycle(LifecycleEvent),
    /// Pointer input driving the orbit controls
    Input(InputEvent),
    /// Asset loading events
    Asset(AssetEvent),
}

// ----------------------------------------------------------------------------
// Lifecycle Events
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LifecycleEvent {
    /// Shell initialized, provides the container size
    Init(InitEvent),
    /// Render frame requested (called every display refresh)
    Frame(FrameEvent),
    /// Container resized
    Resize(ResizeEvent),
    /// Viewer torn down, no further frames will be rendered
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitEvent {
    pub platform: Platform,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub dpr: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    WebGL,
    WebGPU,
    Desktop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameEvent {
    pub time: f64,
    pub dt: f32,
    pub frame: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResizeEvent {
    pub width: u32,
    pub height: u32,
    pub dpr: f32,
}

// ----------------------------------------------------------------------------
// Input Events
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InputEvent {
    Mouse(MouseEvent),
}

/// Mouse / pointer events, in CSS pixels relative to the canvas
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum MouseEvent {
    Move(MouseMoveData),
    Down(MouseButtonData),
    Up(MouseButtonData),
    Wheel(MouseWheelData),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MouseMoveData {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MouseButtonData {
    pub x: f32,
    pub y: f32,
    pub button: MouseButton,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MouseWheelData {
    pub dx: f32,
    pub dy: f32,
}

// ----------------------------------------------------------------------------
// Asset Events
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssetEvent {
    LoadStarted { asset_id: AssetId, path: String },
    LoadProgress { asset_id: AssetId, loaded: u64, total: Option<u64> },
    Loaded(AssetLoadedData),
    LoadFailed { asset_id: AssetId, error: String },
}

/// Raw bytes of a fetched asset. Decoding happens in the core so a
/// malformed file takes the same fallback path as a failed fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetLoadedData {
    pub asset_id: AssetId,
    pub path: String,
    pub asset_type: AssetType,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetType {
    Glb,
    Gltf,
}

impl AssetType {
    /// Guess the asset type from a file path.
    pub fn from_path(path: &str) -> Self {
        if path.to_ascii_lowercase().ends_with(".gltf") {
            AssetType::Gltf
        } else {
            AssetType::Glb
        }
    }
}

// ============================================================================
// COMMANDS (Core -> Shell)
// ============================================================================

/// Top-level commands sent from Core to Shell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", content = "command")]
pub enum Command {
    /// Asset management commands
    Asset(AssetCommand),
    /// Render surface commands
    Renderer(RendererCommand),
    /// Host page commands
    Page(PageCommand),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum AssetCommand {
    Load { asset_id: AssetId, path: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum RendererCommand {
    /// Create or reconfigure the render surface
    Configure(RendererSettings),
    /// Resize the output to the container size (CSS pixels)
    SetSize { width: u32, height: u32 },
    /// Draw the current scene from the current camera
    Render,
}

/// Renderer creation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererSettings {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    pub antialias: bool,
    /// Composite the canvas over the page instead of an opaque surface
    pub transparent: bool,
    pub shadows: bool,
}

impl RendererSettings {
    /// Drawing buffer size in physical pixels, never zero.
    pub fn physical_size(&self) -> (u32, u32) {
        let scale = |v: u32| ((v as f32 * self.pixel_ratio).round() as u32).max(1);
        (scale(self.width), scale(self.height))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum PageCommand {
    /// Hide the loading indicator element
    HideLoader,
}

// ============================================================================
// CORE TRAIT
// ============================================================================

/// Trait that the viewer core implements
pub trait Core {
    /// Handle an event from the shell
    /// Returns commands for the shell to execute
    fn handle(&mut self, event: Event) -> Vec<Command>;
}

// ============================================================================
// HELPER TRAITS FOR MODULAR HANDLERS
// ============================================================================

/// Handler for lifecycle events
pub trait LifecycleHandler {
    fn handle_lifecycle(&mut self, event: LifecycleEvent) -> Vec<Command>;
}

/// Handler for input events
pub trait InputHandler {
    fn handle_input(&mut self, event: InputEvent) -> Vec<Command>;
}

/// Handler for asset events
pub trait AssetHandler {
    fn handle_asset(&mut self, event: AssetEvent) -> Vec<Command>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_init_json() {
        let json = r#"{"category":"Lifecycle","event":{"type":"Init","platform":"WebGL","viewport_width":1280,"viewport_height":720,"dpr":2.0}}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        match event {
            Event::Lifecycle(LifecycleEvent::Init(data)) => {
                assert_eq!(data.viewport_width, 1280);
                assert_eq!(data.platform, Platform::WebGL);
            }
            _ => panic!("Expected Lifecycle::Init event"),
        }
    }

    #[test]
    fn test_asset_failed_json() {
        let json = r#"{"category":"Asset","event":{"type":"LoadFailed","asset_id":"subject","error":"404"}}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        match event {
            Event::Asset(AssetEvent::LoadFailed { asset_id, error }) => {
                assert_eq!(asset_id, "subject");
                assert_eq!(error, "404");
            }
            _ => panic!("Expected Asset::LoadFailed event"),
        }
    }

    #[test]
    fn test_command_json_shape() {
        let json = serde_json::to_string(&Command::Page(PageCommand::HideLoader)).unwrap();
        assert_eq!(json, r#"{"category":"Page","command":{"action":"HideLoader"}}"#);
    }

    #[test]
    fn test_physical_size_scales_by_pixel_ratio() {
        let settings = RendererSettings {
            width: 400,
            height: 300,
            pixel_ratio: 2.0,
            antialias: true,
            transparent: true,
            shadows: true,
        };
        assert_eq!(settings.physical_size(), (800, 600));

        let collapsed = RendererSettings { width: 0, ..settings };
        assert_eq!(collapsed.physical_size(), (1, 600));
    }

    #[test]
    fn test_asset_type_from_path() {
        assert_eq!(AssetType::from_path("romes_colosseum.glb"), AssetType::Glb);
        assert_eq!(AssetType::from_path("scene.GLTF"), AssetType::Gltf);
    }
}
