//! Camera and orbit controls
//!
//! `OrbitControls` rotates and dollies a [`PerspectiveCamera`] around a
//! fixed target. Input deltas accumulate between frames and are applied in
//! [`OrbitControls::update`], which runs once per frame; with damping
//! enabled only a fraction of the pending delta is applied each frame.

use crate::protocol::{InputEvent, MouseButton, MouseEvent};
use glam::{Mat4, Vec3};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

/// Default camera settings
pub const DEFAULT_FOV_DEGREES: f32 = 75.0;
pub const DEFAULT_NEAR: f32 = 0.1;
pub const DEFAULT_FAR: f32 = 1000.0;
const DEFAULT_CAMERA_POSITION: Vec3 = Vec3::new(0.0, 1.5, 5.0);

/// Keeps phi away from the poles so the view basis stays defined.
const POLAR_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
}

impl PerspectiveCamera {
    pub fn new(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov_degrees,
            aspect,
            near,
            far,
            position: DEFAULT_CAMERA_POSITION,
            target: Vec3::ZERO,
        }
    }

    /// Update the aspect ratio from a container size. Zero-height
    /// containers keep the previous aspect.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self::new(DEFAULT_FOV_DEGREES, 1.0, DEFAULT_NEAR, DEFAULT_FAR)
    }
}

/// Spherical coordinates around the target: `phi` from +Y, `theta` around Y
/// measured from +Z toward +X.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spherical {
    pub radius: f32,
    pub phi: f32,
    pub theta: f32,
}

impl Spherical {
    pub fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius == 0.0 {
            return Self { radius, phi: 0.0, theta: 0.0 };
        }
        Self {
            radius,
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
            theta: offset.x.atan2(offset.z),
        }
    }

    pub fn to_offset(self) -> Vec3 {
        let sin_phi = self.phi.sin();
        Vec3::new(
            self.radius * sin_phi * self.theta.sin(),
            self.radius * self.phi.cos(),
            self.radius * sin_phi * self.theta.cos(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragState {
    Idle,
    Rotate,
}

/// Orbit-style camera controller.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub enable_pan: bool,
    pub screen_space_panning: bool,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    /// Pending rotation, consumed by `update`
    delta_theta: f32,
    delta_phi: f32,
    /// Pending dolly scale, consumed by `update`
    scale: f32,
    drag: DragState,
    last_pointer: (f32, f32),
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            enable_damping: true,
            damping_factor: 0.05,
            enable_pan: false,
            screen_space_panning: false,
            min_distance: 3.0,
            max_distance: 10.0,
            min_polar_angle: 0.0,
            max_polar_angle: FRAC_PI_2 - 0.1,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            drag: DragState::Idle,
            last_pointer: (0.0, 0.0),
        }
    }
}

impl OrbitControls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a rotation around the vertical axis.
    pub fn rotate_left(&mut self, angle: f32) {
        self.delta_theta -= angle;
    }

    /// Queue a rotation toward the pole.
    pub fn rotate_up(&mut self, angle: f32) {
        self.delta_phi -= angle;
    }

    /// Move toward the target by `factor` (> 1 zooms in).
    pub fn dolly_in(&mut self, factor: f32) {
        if factor > 0.0 {
            self.scale /= factor;
        }
    }

    /// Move away from the target by `factor` (> 1 zooms out).
    pub fn dolly_out(&mut self, factor: f32) {
        if factor > 0.0 {
            self.scale *= factor;
        }
    }

    fn zoom_scale(&self) -> f32 {
        0.95f32.powf(self.zoom_speed)
    }

    /// Process pointer input. `viewport_height` is the canvas height in CSS
    /// pixels; a drag across the full height turns the camera a full circle.
    pub fn handle_input(&mut self, event: &InputEvent, viewport_height: u32) {
        let InputEvent::Mouse(mouse) = event;
        let height = viewport_height.max(1) as f32;
        match mouse {
            MouseEvent::Down(data) => match data.button {
                MouseButton::Left => {
                    self.drag = DragState::Rotate;
                    self.last_pointer = (data.x, data.y);
                }
                // Right/middle drag would pan or dolly; panning is disabled
                MouseButton::Middle | MouseButton::Right => {}
            },
            MouseEvent::Move(data) => {
                if self.drag == DragState::Rotate {
                    let dx = data.x - self.last_pointer.0;
                    let dy = data.y - self.last_pointer.1;
                    self.rotate_left(TAU * dx / height * self.rotate_speed);
                    self.rotate_up(TAU * dy / height * self.rotate_speed);
                    self.last_pointer = (data.x, data.y);
                }
            }
            MouseEvent::Up(_) => {
                self.drag = DragState::Idle;
            }
            MouseEvent::Wheel(data) => {
                if data.dy < 0.0 {
                    self.dolly_in(1.0 / self.zoom_scale());
                } else if data.dy > 0.0 {
                    self.dolly_out(1.0 / self.zoom_scale());
                }
            }
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag != DragState::Idle
    }

    /// Apply pending input to the camera. Returns true if the camera moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let offset = camera.position - self.target;
        let mut spherical = Spherical::from_offset(offset);

        if self.enable_damping {
            spherical.theta += self.delta_theta * self.damping_factor;
            spherical.phi += self.delta_phi * self.damping_factor;
        } else {
            spherical.theta += self.delta_theta;
            spherical.phi += self.delta_phi;
        }

        spherical.phi = spherical
            .phi
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        let previous = camera.position;
        camera.position = self.target + spherical.to_offset();
        camera.target = self.target;

        if self.enable_damping {
            self.delta_theta *= 1.0 - self.damping_factor;
            self.delta_phi *= 1.0 - self.damping_factor;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
        }
        self.scale = 1.0;

        previous.distance_squared(camera.position) > 1e-12
    }

    /// Angle between +Y and the camera offset.
    pub fn polar_angle(&self, camera: &PerspectiveCamera) -> f32 {
        Spherical::from_offset(camera.position - self.target).phi
    }

    pub fn distance(&self, camera: &PerspectiveCamera) -> f32 {
        camera.position.distance(self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MouseButtonData, MouseMoveData, MouseWheelData};

    fn drag(controls: &mut OrbitControls, from: (f32, f32), to: (f32, f32)) {
        let down = MouseButtonData { x: from.0, y: from.1, button: MouseButton::Left };
        controls.handle_input(&InputEvent::Mouse(MouseEvent::Down(down.clone())), 600);
        controls.handle_input(&InputEvent::Mouse(MouseEvent::Move(MouseMoveData { x: to.0, y: to.1 })), 600);
        controls.handle_input(&InputEvent::Mouse(MouseEvent::Up(down)), 600);
    }

    #[test]
    fn test_spherical_roundtrip() {
        let offset = Vec3::new(1.0, 2.0, -3.0);
        let back = Spherical::from_offset(offset).to_offset();
        assert!((back - offset).length() < 1e-5);
    }

    #[test]
    fn test_aspect_follows_viewport() {
        let mut camera = PerspectiveCamera::default();
        camera.set_viewport(1600, 900);
        assert_eq!(camera.aspect, 1600.0 / 900.0);
        camera.set_viewport(800, 0);
        assert_eq!(camera.aspect, 1600.0 / 900.0);
    }

    #[test]
    fn test_update_without_input_keeps_initial_pose() {
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls::new();
        let before = camera.position;
        controls.update(&mut camera);
        assert!((camera.position - before).length() < 1e-5);
    }

    #[test]
    fn test_distance_clamped() {
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls::new();
        for _ in 0..200 {
            controls.handle_input(&InputEvent::Mouse(MouseEvent::Wheel(MouseWheelData { dx: 0.0, dy: -100.0 })), 600);
            controls.update(&mut camera);
        }
        assert!((controls.distance(&camera) - 3.0).abs() < 1e-4);

        for _ in 0..400 {
            controls.handle_input(&InputEvent::Mouse(MouseEvent::Wheel(MouseWheelData { dx: 0.0, dy: 100.0 })), 600);
            controls.update(&mut camera);
        }
        assert!((controls.distance(&camera) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_polar_angle_capped_above_horizon() {
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls::new();
        // Dragging upward pushes the camera below the target
        for _ in 0..50 {
            drag(&mut controls, (0.0, 0.0), (0.0, -600.0));
            for _ in 0..10 {
                controls.update(&mut camera);
            }
        }
        assert!(controls.polar_angle(&camera) <= controls.max_polar_angle + 1e-5);
        assert!(camera.position.y > 0.0);
    }

    #[test]
    fn test_damping_decays_rotation() {
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls::new();
        drag(&mut controls, (0.0, 0.0), (60.0, 0.0));

        let start = camera.position;
        controls.update(&mut camera);
        let first_step = camera.position.distance(start);
        assert!(first_step > 0.0);

        for _ in 0..500 {
            controls.update(&mut camera);
        }
        let settled = camera.position;
        assert!(!controls.update(&mut camera) || camera.position.distance(settled) < 1e-6);
    }

    #[test]
    fn test_right_drag_does_not_pan() {
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls::new();
        let down = MouseButtonData { x: 0.0, y: 0.0, button: MouseButton::Right };
        controls.handle_input(&InputEvent::Mouse(MouseEvent::Down(down)), 600);
        controls.handle_input(&InputEvent::Mouse(MouseEvent::Move(MouseMoveData { x: 300.0, y: 300.0 })), 600);
        assert!(!controls.is_dragging());
        controls.update(&mut camera);
        assert_eq!(controls.target, Vec3::ZERO);
        assert_eq!(camera.target, Vec3::ZERO);
    }
}
