//! Orbit controls
//!
//! Rotates the camera around a target point on a sphere, dollies with the
//! wheel and optionally spins on its own while idle. Input only accumulates
//! deltas; [`OrbitControls::update`] integrates them into the camera once per
//! frame, spreading the motion over several frames when damping is on.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Vector3, Zero};

use super::orbit_camera::PerspectiveCamera;
use crate::config::ControlsConfig;
use crate::interaction::AutoRotateTarget;

const EPS: f32 = 1e-6;

/// Gesture boundaries reported to whoever tracks interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlsEvent {
    Start,
    End,
}

/// Spherical coordinates with +Y as the pole.
///
/// `theta` is the azimuth measured from +Z towards +X, `phi` the polar angle
/// from +Y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spherical {
    pub radius: f32,
    pub phi: f32,
    pub theta: f32,
}

impl Spherical {
    pub fn from_vector(v: Vector3<f32>) -> Self {
        let radius = v.magnitude();
        if radius == 0.0 {
            return Self {
                radius,
                phi: 0.0,
                theta: 0.0,
            };
        }
        Self {
            radius,
            theta: v.x.atan2(v.z),
            phi: (v.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    pub fn to_vector(self) -> Vector3<f32> {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vector3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }

    /// Keeps the polar angle away from the poles.
    pub fn make_safe(&mut self) {
        self.phi = self.phi.clamp(EPS, PI - EPS);
    }
}

pub struct OrbitControls {
    pub target: Vector3<f32>,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub auto_rotate: bool,
    pub auto_rotate_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,

    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    dragging: bool,
    last_pointer: Option<(f32, f32)>,
    viewport_height: f32,
}

impl OrbitControls {
    pub fn new(config: &ControlsConfig) -> Self {
        if config.enable_pan {
            log::warn!("panning is not supported, ignoring enable_pan");
        }
        Self {
            target: Vector3::zero(),
            enable_damping: config.enable_damping,
            damping_factor: config.damping_factor,
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            auto_rotate: config.auto_rotate,
            auto_rotate_speed: config.auto_rotate_speed,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            min_polar_angle: config.min_polar_angle,
            max_polar_angle: config.max_polar_angle,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            dragging: false,
            last_pointer: None,
            viewport_height: 1.0,
        }
    }

    /// Height in the same units as pointer coordinates. Rotation speed is
    /// relative to it, so a drag across the full height turns one full orbit
    /// at `rotate_speed = 1`.
    pub fn set_viewport_height(&mut self, height: f32) {
        if height > 0.0 {
            self.viewport_height = height;
        }
    }

    pub fn set_target(&mut self, target: Vector3<f32>) {
        self.target = target;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) -> Option<ControlsEvent> {
        self.last_pointer = Some((x, y));
        if self.dragging {
            return None;
        }
        self.dragging = true;
        Some(ControlsEvent::Start)
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if !self.dragging {
            return;
        }
        if let Some((last_x, last_y)) = self.last_pointer {
            let dx = (x - last_x) * self.rotate_speed;
            let dy = (y - last_y) * self.rotate_speed;
            self.rotate_left(2.0 * PI * dx / self.viewport_height);
            self.rotate_up(2.0 * PI * dy / self.viewport_height);
        }
        self.last_pointer = Some((x, y));
    }

    /// Pointer released or cancelled.
    pub fn pointer_up(&mut self) -> Option<ControlsEvent> {
        self.last_pointer = None;
        if !self.dragging {
            return None;
        }
        self.dragging = false;
        Some(ControlsEvent::End)
    }

    /// One wheel step. Positive `delta_y` scrolls away from the user and
    /// moves the camera closer.
    pub fn wheel(&mut self, delta_y: f32) -> [ControlsEvent; 2] {
        if delta_y > 0.0 {
            self.dolly_in(self.zoom_scale());
        } else if delta_y < 0.0 {
            self.dolly_out(self.zoom_scale());
        }
        [ControlsEvent::Start, ControlsEvent::End]
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.delta_theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.delta_phi -= angle;
    }

    fn zoom_scale(&self) -> f32 {
        0.95f32.powf(self.zoom_speed)
    }

    fn dolly_in(&mut self, dolly_scale: f32) {
        self.scale *= dolly_scale;
    }

    fn dolly_out(&mut self, dolly_scale: f32) {
        self.scale /= dolly_scale;
    }

    fn auto_rotation_angle(&self, delta_seconds: Option<f32>) -> f32 {
        match delta_seconds {
            Some(dt) => 2.0 * PI / 60.0 * self.auto_rotate_speed * dt,
            None => 2.0 * PI / 60.0 / 60.0 * self.auto_rotate_speed,
        }
    }

    /// Integrates pending rotation, dolly and auto-rotation into `camera`.
    ///
    /// Without `delta_seconds` auto-rotation advances a fixed step per call,
    /// which is one orbit per minute at 60 calls per second and speed 1.
    /// Returns true when the camera moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera, delta_seconds: Option<f32>) -> bool {
        let last_eye = camera.eye;
        let offset = camera.eye - self.target;
        let mut spherical = Spherical::from_vector(offset);

        if self.auto_rotate && !self.dragging {
            self.rotate_left(self.auto_rotation_angle(delta_seconds));
        }

        if self.enable_damping {
            spherical.theta += self.delta_theta * self.damping_factor;
            spherical.phi += self.delta_phi * self.damping_factor;
        } else {
            spherical.theta += self.delta_theta;
            spherical.phi += self.delta_phi;
        }

        spherical.phi = spherical
            .phi
            .clamp(self.min_polar_angle, self.max_polar_angle);
        spherical.make_safe();

        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        camera.eye = self.target + spherical.to_vector();
        camera.look_at(self.target);

        if self.enable_damping {
            self.delta_theta *= 1.0 - self.damping_factor;
            self.delta_phi *= 1.0 - self.damping_factor;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
        }
        self.scale = 1.0;

        (camera.eye - last_eye).magnitude2() > EPS
    }
}

impl AutoRotateTarget for OrbitControls {
    fn set_auto_rotate(&mut self, enabled: bool) {
        self.auto_rotate = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraConfig;

    fn setup() -> (OrbitControls, PerspectiveCamera) {
        let controls = OrbitControls::new(&ControlsConfig::default());
        let camera = PerspectiveCamera::new(&CameraConfig::default(), 1.0);
        (controls, camera)
    }

    fn distance(camera: &PerspectiveCamera) -> f32 {
        camera.eye.magnitude()
    }

    #[test]
    fn test_spherical_round_trip() {
        let v = Vector3::new(0.3, 1.2, 2.8);
        let back = Spherical::from_vector(v).to_vector();
        assert!((back - v).magnitude() < 1e-5);
    }

    #[test]
    fn test_idle_update_auto_rotates_around_target() {
        let (mut controls, mut camera) = setup();
        let start = camera.eye;
        let radius = distance(&camera);

        controls.update(&mut camera, None);
        assert!((camera.eye - start).magnitude() > 0.0);
        assert!((distance(&camera) - radius).abs() < 1e-4);
        assert!((camera.eye.y - start.y).abs() < 1e-4);
        assert_eq!(camera.target, Vector3::zero());
    }

    #[test]
    fn test_no_auto_rotate_while_dragging() {
        let (mut controls, mut camera) = setup();
        controls.pointer_down(10.0, 10.0);
        let start = camera.eye;
        assert!(!controls.update(&mut camera, None));
        assert!((camera.eye - start).magnitude() < 1e-5);
    }

    #[test]
    fn test_disabled_auto_rotate_keeps_camera_still() {
        let (mut controls, mut camera) = setup();
        controls.set_auto_rotate(false);
        let start = camera.eye;
        assert!(!controls.update(&mut camera, None));
        assert!((camera.eye - start).magnitude() < 1e-5);
    }

    #[test]
    fn test_damping_spreads_rotation_over_frames() {
        let (mut controls, mut camera) = setup();
        controls.set_auto_rotate(false);
        controls.rotate_left(1.0);

        let theta0 = Spherical::from_vector(camera.eye).theta;
        controls.update(&mut camera, None);
        let theta1 = Spherical::from_vector(camera.eye).theta;
        assert!((theta1 - (theta0 - 0.07)).abs() < 1e-4);

        controls.update(&mut camera, None);
        let theta2 = Spherical::from_vector(camera.eye).theta;
        assert!((theta2 - (theta1 - 0.07 * 0.93)).abs() < 1e-4);
    }

    #[test]
    fn test_drag_never_pans_even_when_requested() {
        let config = ControlsConfig {
            enable_pan: true,
            auto_rotate: false,
            ..ControlsConfig::default()
        };
        let mut controls = OrbitControls::new(&config);
        let mut camera = PerspectiveCamera::new(&CameraConfig::default(), 1.0);
        let radius = distance(&camera);

        controls.pointer_down(100.0, 100.0);
        controls.pointer_move(180.0, 140.0);
        controls.update(&mut camera, None);

        assert_eq!(controls.target, Vector3::zero());
        assert_eq!(camera.target, Vector3::zero());
        assert!((distance(&camera) - radius).abs() < 1e-4);
    }

    #[test]
    fn test_drag_rotation_scales_with_viewport_height() {
        let (mut controls, mut camera) = setup();
        controls.set_auto_rotate(false);
        controls.enable_damping = false;
        controls.set_viewport_height(600.0);

        let theta0 = Spherical::from_vector(camera.eye).theta;
        assert_eq!(controls.pointer_down(100.0, 100.0), Some(ControlsEvent::Start));
        controls.pointer_move(130.0, 100.0);
        controls.update(&mut camera, None);

        let expected = 2.0 * PI * 30.0 * 0.8 / 600.0;
        let theta1 = Spherical::from_vector(camera.eye).theta;
        assert!((theta0 - theta1 - expected).abs() < 1e-4);
        assert_eq!(controls.pointer_up(), Some(ControlsEvent::End));
        assert_eq!(controls.pointer_up(), None);
    }

    #[test]
    fn test_polar_angle_is_clamped_away_from_pole() {
        let (mut controls, mut camera) = setup();
        controls.enable_damping = false;
        controls.set_auto_rotate(false);
        controls.rotate_up(10.0);
        controls.update(&mut camera, None);

        let horizontal = (camera.eye.x * camera.eye.x + camera.eye.z * camera.eye.z).sqrt();
        assert!(horizontal < 1e-3);
        assert!(camera.eye.y > 0.0);
    }

    #[test]
    fn test_wheel_dollies_within_distance_limits() {
        let (mut controls, mut camera) = setup();
        controls.set_auto_rotate(false);
        let start = distance(&camera);

        assert_eq!(controls.wheel(1.0), [ControlsEvent::Start, ControlsEvent::End]);
        controls.update(&mut camera, None);
        assert!((distance(&camera) - start * 0.95).abs() < 1e-4);

        for _ in 0..200 {
            controls.wheel(1.0);
            controls.update(&mut camera, None);
        }
        assert!((distance(&camera) - 0.6).abs() < 1e-4);

        for _ in 0..200 {
            controls.wheel(-1.0);
            controls.update(&mut camera, None);
        }
        assert!((distance(&camera) - 8.0).abs() < 1e-3);
    }

    #[test]
    fn test_auto_rotation_step() {
        let controls = OrbitControls::new(&ControlsConfig::default());
        let fixed = controls.auto_rotation_angle(None);
        assert!((fixed - 2.0 * PI / 3600.0 * 0.6).abs() < 1e-7);
        let timed = controls.auto_rotation_angle(Some(1.0 / 60.0));
        assert!((timed - fixed).abs() < 1e-7);
    }
}
