//! End-to-end tests for the viewer bootstrap, driven purely through events.

use relic::environment::STARFIELD_NAME;
use relic::*;
use std::f32::consts::FRAC_PI_4;

/// Two-node GLB: an "arena" group holding a single-triangle "wall" mesh.
fn sample_glb() -> Vec<u8> {
    build_glb(None)
}

/// The sample GLB, optionally embedding `image` as an unreferenced WebP.
fn build_glb(image: Option<&[u8]>) -> Vec<u8> {
    let mut bin: Vec<u8> = Vec::new();
    for v in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        for c in v {
            bin.extend_from_slice(&c.to_le_bytes());
        }
    }
    for i in [0u16, 1, 2] {
        bin.extend_from_slice(&i.to_le_bytes());
    }
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let mut images = String::new();
    let mut image_view = String::new();
    if let Some(image) = image {
        image_view = format!(
            r#", {{"buffer": 0, "byteOffset": {}, "byteLength": {}}}"#,
            bin.len(),
            image.len()
        );
        images = r#""images": [{"bufferView": 2, "mimeType": "image/webp"}],"#.to_string();
        bin.extend_from_slice(image);
        while bin.len() % 4 != 0 {
            bin.push(0);
        }
    }

    let json = format!(
        r#"{{
            "asset": {{"version": "2.0"}},
            "scene": 0,
            "scenes": [{{"nodes": [0]}}],
            "nodes": [
                {{"name": "arena", "children": [1]}},
                {{"name": "wall", "mesh": 0, "translation": [0.0, 0.5, 0.0]}}
            ],
            "meshes": [{{"name": "wall", "primitives": [{{"attributes": {{"POSITION": 0}}, "indices": 1, "material": 0}}]}}],
            "materials": [{{"pbrMetallicRoughness": {{"baseColorFactor": [0.8, 0.6, 0.4, 1.0], "metallicFactor": 0.0, "roughnessFactor": 0.5}}}}],
            {images}
            "buffers": [{{"byteLength": {len}}}],
            "bufferViews": [
                {{"buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962}},
                {{"buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963}}{image_view}
            ],
            "accessors": [
                {{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]}},
                {{"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}}
            ]
        }}"#,
        len = bin.len(),
        images = images,
        image_view = image_view,
    );
    let mut json = json.into_bytes();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&json);
    glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"BIN\0");
    glb.extend_from_slice(&bin);
    glb
}

fn viewer() -> SceneBootstrap {
    let mut viewer = SceneBootstrap::new(ViewerConfig {
        model_path: "romes_colosseum.glb".to_string(),
        star_seed: Some(2024),
        ..Default::default()
    });
    viewer.handle(Event::Lifecycle(LifecycleEvent::Init(InitEvent {
        platform: Platform::WebGL,
        viewport_width: 800,
        viewport_height: 600,
        dpr: 2.0,
    })));
    viewer
}

fn loaded(asset_id: &str, bytes: Vec<u8>) -> Event {
    Event::Asset(AssetEvent::Loaded(AssetLoadedData {
        asset_id: asset_id.to_string(),
        path: "romes_colosseum.glb".to_string(),
        asset_type: AssetType::Glb,
        bytes,
    }))
}

fn failed(asset_id: &str) -> Event {
    Event::Asset(AssetEvent::LoadFailed {
        asset_id: asset_id.to_string(),
        error: "HTTP 404".to_string(),
    })
}

fn frame(n: u64) -> Event {
    Event::Lifecycle(LifecycleEvent::Frame(FrameEvent {
        time: n as f64 / 60.0,
        dt: 1.0 / 60.0,
        frame: n,
    }))
}

fn mouse(event: MouseEvent) -> Event {
    Event::Input(InputEvent::Mouse(event))
}

#[test]
fn test_init_requests_configured_model() {
    let mut viewer = SceneBootstrap::new(ViewerConfig {
        model_path: "romes_colosseum.glb".to_string(),
        ..Default::default()
    });
    let commands = viewer.handle(Event::Lifecycle(LifecycleEvent::Init(InitEvent {
        platform: Platform::Desktop,
        viewport_width: 1024,
        viewport_height: 768,
        dpr: 1.0,
    })));
    assert!(commands.contains(&Command::Asset(AssetCommand::Load {
        asset_id: "subject".to_string(),
        path: "romes_colosseum.glb".to_string(),
    })));
}

#[test]
fn test_loaded_model_is_installed_and_styled() {
    let mut viewer = viewer();
    let commands = viewer.handle(loaded("subject", sample_glb()));

    assert_eq!(commands, vec![Command::Page(PageCommand::HideLoader)]);
    assert_eq!(viewer.state(), BootstrapState::Ready);

    let subject = viewer.scene().subject().expect("subject installed");
    assert_eq!(subject.transform.scale, glam::Vec3::splat(1.5));
    assert_eq!(subject.transform.position, glam::Vec3::new(0.0, -1.5, 0.0));
    assert!((subject.transform.yaw() - FRAC_PI_4).abs() < 1e-5);
    assert_eq!(subject.mesh_count(), 1);

    let mut meshes = 0;
    subject.traverse(&mut |node| {
        if let Some(mesh) = node.as_mesh() {
            meshes += 1;
            assert!(node.cast_shadow && node.receive_shadow);
            assert_eq!(mesh.material.metalness, 0.2);
            assert_eq!(mesh.material.roughness, 0.8);
            // Base color survives the material override
            assert_eq!(mesh.material.color, [0.8, 0.6, 0.4]);
        }
    });
    assert_eq!(meshes, 1);
}

#[test]
fn test_model_hierarchy_is_kept() {
    let mut viewer = viewer();
    viewer.handle(loaded("subject", sample_glb()));
    let subject = viewer.scene().subject().unwrap();

    let arena = &subject.children()[0];
    assert_eq!(arena.name, "arena");
    let wall = &arena.children()[0];
    assert_eq!(wall.name, "wall");
    assert_eq!(wall.transform.position, glam::Vec3::new(0.0, 0.5, 0.0));

    let (min, max) = subject.world_bounds().unwrap();
    assert!(max.y > min.y);
}

#[test]
fn test_model_with_webp_texture_still_loads() {
    let glb = build_glb(Some(b"RIFF\x0c\0\0\0WEBPVP8 "));
    let decoded = decode_model("colosseum", &glb).expect("meshes decode without the image");
    assert_eq!(decoded.mesh_count(), 1);

    let mut viewer = viewer();
    viewer.handle(loaded("subject", glb));
    assert_eq!(viewer.state(), BootstrapState::Ready);
    assert_eq!(viewer.scene().subject().map(|s| s.mesh_count()), Some(1));
}

#[test]
fn test_load_failure_installs_placeholder() {
    let mut viewer = viewer();
    let commands = viewer.handle(failed("subject"));

    assert_eq!(commands, vec![Command::Page(PageCommand::HideLoader)]);
    assert_eq!(viewer.state(), BootstrapState::Degraded);
    let subject = viewer.scene().subject().unwrap();
    assert_eq!(subject.name, placeholder::PLACEHOLDER_NAME);
    assert_eq!(subject.mesh_count(), 4);
}

#[test]
fn test_exactly_one_subject_after_late_events() {
    let mut viewer = viewer();
    viewer.handle(failed("subject"));
    let placeholder_id = viewer.scene().subject().unwrap().id().to_string();

    assert!(viewer.handle(loaded("subject", sample_glb())).is_empty());
    assert!(viewer.handle(failed("subject")).is_empty());

    assert_eq!(viewer.state(), BootstrapState::Degraded);
    assert_eq!(viewer.scene().subject().unwrap().id(), placeholder_id);
}

#[test]
fn test_events_for_other_assets_are_ignored() {
    let mut viewer = viewer();
    assert!(viewer.handle(failed("texture")).is_empty());
    assert!(viewer.handle(loaded("texture", sample_glb())).is_empty());
    assert_eq!(viewer.state(), BootstrapState::Initializing);
    assert!(viewer.scene().subject().is_none());
}

#[test]
fn test_starfield_has_configured_count_within_bounds() {
    let viewer = viewer();
    let stars = viewer.scene().find_object(STARFIELD_NAME).unwrap();
    let ObjectKind::Points(points) = &stars.kind else {
        panic!("starfield should be a point cloud");
    };
    assert_eq!(points.geometry.vertex_count(), 1000);
    let (min, max) = points.geometry.bounds().unwrap();
    assert!(min.x >= -50.0 && max.x <= 50.0);
    assert!(min.y >= -20.0 && max.y <= 20.0);
    assert!(min.z >= -50.0 && max.z <= 50.0);
}

#[test]
fn test_seeded_starfield_is_reproducible() {
    let a = viewer();
    let b = viewer();
    let positions = |v: &SceneBootstrap| match &v.scene().find_object(STARFIELD_NAME).unwrap().kind {
        ObjectKind::Points(p) => p.geometry.positions.clone(),
        _ => unreachable!(),
    };
    assert_eq!(positions(&a), positions(&b));
}

#[test]
fn test_resize_updates_aspect_and_output_size() {
    let mut viewer = viewer();
    let commands = viewer.handle(Event::Lifecycle(LifecycleEvent::Resize(ResizeEvent {
        width: 1000,
        height: 500,
        dpr: 2.0,
    })));

    assert_eq!(
        commands,
        vec![Command::Renderer(RendererCommand::SetSize { width: 1000, height: 500 })]
    );
    assert_eq!(viewer.camera().aspect, 2.0);
    assert_eq!(viewer.renderer_settings().unwrap().physical_size(), (2000, 1000));
}

#[test]
fn test_zero_height_resize_keeps_aspect() {
    let mut viewer = viewer();
    viewer.handle(Event::Lifecycle(LifecycleEvent::Resize(ResizeEvent {
        width: 640,
        height: 0,
        dpr: 1.0,
    })));
    assert_eq!(viewer.camera().aspect, 800.0 / 600.0);
    assert!(viewer.camera().aspect.is_finite());
}

#[test]
fn test_subject_spins_each_frame() {
    let mut viewer = viewer();
    viewer.handle(loaded("subject", sample_glb()));
    for n in 0..10 {
        assert_eq!(viewer.handle(frame(n)), vec![Command::Renderer(RendererCommand::Render)]);
    }
    let yaw = viewer.scene().subject().unwrap().transform.yaw();
    assert!((yaw - (FRAC_PI_4 + 0.02)).abs() < 1e-4);
    assert_eq!(viewer.frames_rendered(), 10);
}

#[test]
fn test_drag_orbits_within_limits() {
    let mut viewer = viewer();
    let start = viewer.camera().position;

    viewer.handle(mouse(MouseEvent::Down(MouseButtonData { x: 100.0, y: 100.0, button: MouseButton::Left })));
    viewer.handle(mouse(MouseEvent::Move(MouseMoveData { x: 400.0, y: -300.0 })));
    viewer.handle(mouse(MouseEvent::Up(MouseButtonData { x: 400.0, y: -300.0, button: MouseButton::Left })));
    for _ in 0..20 {
        viewer.handle(Event::Input(InputEvent::Mouse(MouseEvent::Wheel(MouseWheelData { dx: 0.0, dy: 120.0 }))));
        viewer.handle(frame(0));
    }

    let camera = viewer.camera();
    assert_ne!(camera.position, start);
    let distance = viewer.controls().distance(camera);
    assert!((3.0 - 1e-4..=10.0 + 1e-4).contains(&distance));
    assert!(viewer.controls().polar_angle(camera) <= std::f32::consts::FRAC_PI_2 - 0.1 + 1e-4);
    // Camera never dips below the ground plane's horizon
    assert!(camera.position.y > 0.0);
}

#[test]
fn test_frames_ignored_after_shutdown() {
    let mut viewer = viewer();
    viewer.handle(Event::Lifecycle(LifecycleEvent::Shutdown));
    assert!(viewer.handle(frame(1)).is_empty());
    assert_eq!(viewer.frames_rendered(), 0);
}
