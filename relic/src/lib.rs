//! relic - scroll reveal and 3D artifact viewer core
//!
//! Platform-agnostic half of the viewer. Shells (`relic-shell` for native
//! windows, `relic-web` for browser canvases) feed [`Event`]s into a
//! [`SceneBootstrap`] and execute the [`Command`]s it returns.
//!
//! ```ignore
//! let mut viewer = SceneBootstrap::new(ViewerConfig::default());
//! for command in viewer.handle(Event::Lifecycle(LifecycleEvent::Init(init))) {
//!     shell.execute(command);
//! }
//! ```

pub mod asset;
pub mod bootstrap;
pub mod camera;
pub mod config;
pub mod environment;
pub mod material;
pub mod mesh;
pub mod placeholder;
pub mod protocol;
pub mod reveal;
pub mod scene;

pub use asset::{AssetError, decode_model};
pub use bootstrap::{BootstrapState, SceneBootstrap};
pub use camera::{OrbitControls, PerspectiveCamera};
pub use config::{ConfigError, RevealConfig, ViewerConfig};
pub use material::{Material, PointsMaterial, Shading};
pub use mesh::{Geometry, GeometryId, MeshResource};
pub use protocol::*;
pub use reveal::{Intersection, RevealState, RevealTracker, SectionId, SectionStyle};
pub use scene::{Fog, Light, LightKind, Object3D, ObjectKind, Scene, Transform};
