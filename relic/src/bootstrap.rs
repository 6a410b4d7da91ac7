//! Scene bootstrap - the viewer's state machine
//!
//! ```text
//! Uninitialized --Init--> Initializing --Loaded--> Ready
//!                              |
//!                              +--LoadFailed / undecodable--> Degraded
//! ```
//!
//! Frames are rendered in every state after `Init`, so the environment is
//! visible while the model is still downloading. The subject model (loaded
//! or placeholder) is installed exactly once.

use crate::asset::decode_model;
use crate::camera::{DEFAULT_FAR, DEFAULT_FOV_DEGREES, DEFAULT_NEAR, OrbitControls, PerspectiveCamera};
use crate::config::ViewerConfig;
use crate::environment::{add_environment, add_lights, create_scene};
use crate::placeholder::create_placeholder;
use crate::protocol::*;
use crate::scene::{Object3D, Scene};
use glam::{Quat, Vec3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::f32::consts::FRAC_PI_4;

pub const SUBJECT_SCALE: f32 = 1.5;
pub const SUBJECT_POSITION: Vec3 = Vec3::new(0.0, -1.5, 0.0);
pub const SUBJECT_YAW: f32 = FRAC_PI_4;
pub const SUBJECT_METALNESS: f32 = 0.2;
pub const SUBJECT_ROUGHNESS: f32 = 0.8;
/// Subject yaw added every frame, in radians
pub const SPIN_PER_FRAME: f32 = 0.002;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Uninitialized,
    Initializing,
    Ready,
    /// Model unavailable, placeholder shown
    Degraded,
}

/// Owns the scene, camera and controls for one viewer instance.
pub struct SceneBootstrap {
    config: ViewerConfig,
    state: BootstrapState,
    scene: Scene,
    camera: PerspectiveCamera,
    controls: OrbitControls,
    settings: Option<RendererSettings>,
    rng: StdRng,
    shut_down: bool,
    frames_rendered: u64,
}

impl SceneBootstrap {
    pub fn new(config: ViewerConfig) -> Self {
        let rng = match config.star_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            state: BootstrapState::Uninitialized,
            scene: create_scene(),
            camera: PerspectiveCamera::default(),
            controls: OrbitControls::new(),
            settings: None,
            rng,
            shut_down: false,
            frames_rendered: 0,
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn controls(&self) -> &OrbitControls {
        &self.controls
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Current renderer configuration; `None` before `Init`.
    pub fn renderer_settings(&self) -> Option<&RendererSettings> {
        self.settings.as_ref()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    fn initialize(&mut self, init: InitEvent) -> Vec<Command> {
        if self.state != BootstrapState::Uninitialized {
            log::warn!("Ignoring repeated Init in state {:?}", self.state);
            return vec![];
        }
        self.state = BootstrapState::Initializing;

        let mut camera = PerspectiveCamera::new(DEFAULT_FOV_DEGREES, 1.0, DEFAULT_NEAR, DEFAULT_FAR);
        camera.set_viewport(init.viewport_width, init.viewport_height);
        self.camera = camera;
        self.controls = OrbitControls::new();
        self.controls.update(&mut self.camera);

        let mut scene = create_scene();
        add_lights(&mut scene);
        add_environment(&mut scene, self.config.star_count, &mut self.rng);
        self.scene = scene;

        let settings = RendererSettings {
            width: init.viewport_width,
            height: init.viewport_height,
            pixel_ratio: init.dpr,
            antialias: true,
            transparent: true,
            shadows: true,
        };
        self.settings = Some(settings.clone());

        log::info!(
            "Viewer initialized on {:?}, viewport: {}x{} @{}x",
            init.platform,
            init.viewport_width,
            init.viewport_height,
            init.dpr
        );

        vec![
            Command::Renderer(RendererCommand::Configure(settings)),
            Command::Asset(AssetCommand::Load {
                asset_id: self.config.asset_id.clone(),
                path: self.config.model_path.clone(),
            }),
        ]
    }

    fn resize(&mut self, resize: ResizeEvent) -> Vec<Command> {
        let Some(settings) = self.settings.as_mut() else {
            return vec![];
        };
        self.camera.set_viewport(resize.width, resize.height);
        settings.width = resize.width;
        settings.height = resize.height;
        settings.pixel_ratio = resize.dpr;
        vec![Command::Renderer(RendererCommand::SetSize {
            width: resize.width,
            height: resize.height,
        })]
    }

    fn frame(&mut self, _frame: FrameEvent) -> Vec<Command> {
        if self.state == BootstrapState::Uninitialized || self.shut_down {
            return vec![];
        }
        if let Some(subject) = self.scene.subject_mut() {
            subject.transform.rotate_y(SPIN_PER_FRAME);
        }
        self.controls.update(&mut self.camera);
        self.frames_rendered += 1;
        vec![Command::Renderer(RendererCommand::Render)]
    }

    /// Whether an asset event should still be acted on.
    fn awaiting(&self, asset_id: &str) -> bool {
        self.state == BootstrapState::Initializing && asset_id == self.config.asset_id
    }

    fn attach_model(&mut self, mut model: Object3D) {
        model.transform.scale = Vec3::splat(SUBJECT_SCALE);
        model.transform.position = SUBJECT_POSITION;
        model.transform.rotation = Quat::from_rotation_y(SUBJECT_YAW);
        model.traverse_mut(&mut |node| {
            if let crate::scene::ObjectKind::Mesh(mesh) = &mut node.kind {
                node.cast_shadow = true;
                node.receive_shadow = true;
                mesh.material.metalness = SUBJECT_METALNESS;
                mesh.material.roughness = SUBJECT_ROUGHNESS;
            }
        });

        if let Some((min, max)) = model.world_bounds() {
            log::info!("Model dimensions: {:?}", max - min);
        }
        log::info!("Model position: {:?}", model.transform.position);

        self.scene.set_subject(model);
        self.state = BootstrapState::Ready;
    }

    fn fall_back(&mut self) {
        self.scene.set_subject(create_placeholder());
        self.state = BootstrapState::Degraded;
    }
}

impl Core for SceneBootstrap {
    fn handle(&mut self, event: Event) -> Vec<Command> {
        match event {
            Event::Lifecycle(e) => self.handle_lifecycle(e),
            Event::Input(e) => self.handle_input(e),
            Event::Asset(e) => self.handle_asset(e),
        }
    }
}

impl LifecycleHandler for SceneBootstrap {
    fn handle_lifecycle(&mut self, event: LifecycleEvent) -> Vec<Command> {
        match event {
            LifecycleEvent::Init(init) => self.initialize(init),
            LifecycleEvent::Frame(frame) => self.frame(frame),
            LifecycleEvent::Resize(resize) => self.resize(resize),
            LifecycleEvent::Shutdown => {
                log::info!("Viewer shut down after {} frames", self.frames_rendered);
                self.shut_down = true;
                vec![]
            }
        }
    }
}

impl InputHandler for SceneBootstrap {
    fn handle_input(&mut self, event: InputEvent) -> Vec<Command> {
        let height = self.settings.as_ref().map(|s| s.height).unwrap_or(1);
        self.controls.handle_input(&event, height);
        vec![]
    }
}

impl AssetHandler for SceneBootstrap {
    fn handle_asset(&mut self, event: AssetEvent) -> Vec<Command> {
        match event {
            AssetEvent::LoadStarted { asset_id, path } => {
                log::info!("Loading {} from {}", asset_id, path);
                vec![]
            }

            AssetEvent::LoadProgress { asset_id, loaded, total } => {
                if self.awaiting(&asset_id) {
                    match total {
                        Some(total) if total > 0 => {
                            log::info!("{}% loaded", loaded as f64 / total as f64 * 100.0)
                        }
                        _ => log::info!("{} bytes loaded", loaded),
                    }
                }
                vec![]
            }

            AssetEvent::Loaded(data) => {
                if !self.awaiting(&data.asset_id) {
                    log::debug!("Ignoring late load of {}", data.asset_id);
                    return vec![];
                }
                match decode_model(&data.path, &data.bytes) {
                    Ok(model) => {
                        log::info!("Model loaded successfully: {}", data.path);
                        self.attach_model(model);
                    }
                    Err(e) => {
                        log::error!("Error loading model: {}", e);
                        self.fall_back();
                    }
                }
                vec![Command::Page(PageCommand::HideLoader)]
            }

            AssetEvent::LoadFailed { asset_id, error } => {
                if !self.awaiting(&asset_id) {
                    return vec![];
                }
                log::error!("Error loading model: {}", error);
                self.fall_back();
                vec![Command::Page(PageCommand::HideLoader)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_event(width: u32, height: u32) -> Event {
        Event::Lifecycle(LifecycleEvent::Init(InitEvent {
            platform: Platform::Desktop,
            viewport_width: width,
            viewport_height: height,
            dpr: 1.0,
        }))
    }

    fn frame_event(frame: u64) -> Event {
        Event::Lifecycle(LifecycleEvent::Frame(FrameEvent {
            time: frame as f64 / 60.0,
            dt: 1.0 / 60.0,
            frame,
        }))
    }

    fn seeded() -> SceneBootstrap {
        SceneBootstrap::new(ViewerConfig {
            star_seed: Some(3),
            ..Default::default()
        })
    }

    #[test]
    fn test_init_configures_and_requests_model() {
        let mut viewer = seeded();
        let commands = viewer.handle(init_event(800, 600));
        assert_eq!(viewer.state(), BootstrapState::Initializing);
        assert!(matches!(
            &commands[0],
            Command::Renderer(RendererCommand::Configure(s)) if s.antialias && s.transparent && s.shadows
        ));
        assert_eq!(
            commands[1],
            Command::Asset(AssetCommand::Load {
                asset_id: "subject".to_string(),
                path: "model.glb".to_string()
            })
        );
        assert_eq!(viewer.camera().fov_degrees, 75.0);
        assert_eq!(viewer.camera().aspect, 800.0 / 600.0);
        assert!(viewer.scene().subject().is_none());
    }

    #[test]
    fn test_repeated_init_ignored() {
        let mut viewer = seeded();
        viewer.handle(init_event(800, 600));
        assert!(viewer.handle(init_event(10, 10)).is_empty());
        assert_eq!(viewer.camera().aspect, 800.0 / 600.0);
    }

    #[test]
    fn test_frames_before_init_do_nothing() {
        let mut viewer = seeded();
        assert!(viewer.handle(frame_event(0)).is_empty());
        assert_eq!(viewer.frames_rendered(), 0);
    }

    #[test]
    fn test_frames_render_while_loading() {
        let mut viewer = seeded();
        viewer.handle(init_event(800, 600));
        let commands = viewer.handle(frame_event(1));
        assert_eq!(commands, vec![Command::Renderer(RendererCommand::Render)]);
    }

    #[test]
    fn test_progress_does_not_change_state() {
        let mut viewer = seeded();
        viewer.handle(init_event(800, 600));
        let commands = viewer.handle(Event::Asset(AssetEvent::LoadProgress {
            asset_id: "subject".to_string(),
            loaded: 50,
            total: Some(100),
        }));
        assert!(commands.is_empty());
        assert_eq!(viewer.state(), BootstrapState::Initializing);
    }

    #[test]
    fn test_undecodable_bytes_degrade() {
        let mut viewer = seeded();
        viewer.handle(init_event(800, 600));
        let commands = viewer.handle(Event::Asset(AssetEvent::Loaded(AssetLoadedData {
            asset_id: "subject".to_string(),
            path: "model.glb".to_string(),
            asset_type: AssetType::Glb,
            bytes: b"<html>404</html>".to_vec(),
        })));
        assert_eq!(commands, vec![Command::Page(PageCommand::HideLoader)]);
        assert_eq!(viewer.state(), BootstrapState::Degraded);
        assert_eq!(viewer.scene().subject().unwrap().mesh_count(), 4);
    }

    #[test]
    fn test_shutdown_stops_frames() {
        let mut viewer = seeded();
        viewer.handle(init_event(800, 600));
        viewer.handle(Event::Lifecycle(LifecycleEvent::Shutdown));
        assert!(viewer.handle(frame_event(1)).is_empty());
        assert!(viewer.is_shut_down());
    }
}
