//! Viewer context
//!
//! [`Viewer`] holds everything the window needs between events: the scene,
//! the camera and its orbit controls, the idle-rotation state machine and the
//! viewport size. It has no GPU state, so the whole event and frame logic can
//! be exercised without a window.

use std::time::{Duration, Instant};

use crate::assets::AssetEvent;
use crate::config::ViewerConfig;
use crate::gfx::{
    camera::{
        orbit_camera::PerspectiveCamera,
        orbit_controls::{ControlsEvent, OrbitControls},
    },
    scene::{composer::SceneComposer, scene::Scene},
};
use crate::interaction::{InteractionEvent, InteractionStateMachine};

/// Size of the drawable area.
///
/// Sizes are kept in logical pixels; the drawable surface is that size times
/// the window scale factor, with the factor capped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub logical_width: f64,
    pub logical_height: f64,
    pub scale_factor: f64,
    pub pixel_ratio_cap: f64,
}

impl Viewport {
    pub fn new(logical_width: f64, logical_height: f64, scale_factor: f64, pixel_ratio_cap: f64) -> Self {
        Self {
            logical_width,
            logical_height,
            scale_factor,
            pixel_ratio_cap,
        }
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.scale_factor.min(self.pixel_ratio_cap)
    }

    /// Surface size in device pixels, never smaller than 1x1.
    pub fn drawable_size(&self) -> (u32, u32) {
        let ratio = self.pixel_ratio();
        let width = (self.logical_width * ratio).round().max(1.0) as u32;
        let height = (self.logical_height * ratio).round().max(1.0) as u32;
        (width, height)
    }

    pub fn aspect(&self) -> f32 {
        if self.logical_height > 0.0 {
            (self.logical_width / self.logical_height) as f32
        } else {
            1.0
        }
    }
}

/// Pointer input in logical window coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerInput {
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up,
    Cancel,
    /// Positive values scroll away from the user.
    Wheel { delta_y: f32 },
}

pub struct Viewer {
    config: ViewerConfig,
    viewport: Viewport,
    pub scene: Scene,
    pub camera: PerspectiveCamera,
    pub controls: OrbitControls,
    interaction: InteractionStateMachine,
    composer: SceneComposer,
    last_frame: Option<Instant>,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        let (width, height) = config.initial_size;
        let viewport = Viewport::new(
            width as f64,
            height as f64,
            1.0,
            config.renderer.pixel_ratio_cap,
        );

        let mut camera = PerspectiveCamera::new(&config.camera, viewport.aspect());
        let mut controls = OrbitControls::new(&config.controls);
        controls.set_viewport_height(height as f32);
        camera.look_at(controls.target);
        camera.update_view_proj();

        Self {
            scene: Scene::new(&config.lighting),
            camera,
            controls,
            interaction: InteractionStateMachine::new(config.idle.resume_delay),
            composer: SceneComposer::new(config.fit.clone()),
            viewport,
            config,
            last_frame: None,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn interaction(&self) -> &InteractionStateMachine {
        &self.interaction
    }

    /// Ends a drag whose release will never arrive because the window lost
    /// focus. Does nothing when no drag is active.
    pub fn focus_lost(&mut self, now: Instant) {
        if self.controls.is_dragging() {
            log::debug!("focus lost mid-drag, cancelling");
            self.handle_pointer(PointerInput::Cancel, now);
        }
    }

    /// Feeds pointer input to the controls and the interaction machine.
    ///
    /// Raw pointer events and the gesture events the controls report are both
    /// dispatched; the machine treats repeated starts and ends idempotently.
    pub fn handle_pointer(&mut self, input: PointerInput, now: Instant) {
        match input {
            PointerInput::Down { x, y } => {
                let gesture = self.controls.pointer_down(x, y);
                self.dispatch(InteractionEvent::Start, now);
                if let Some(event) = gesture {
                    self.dispatch_controls(event, now);
                }
            }
            PointerInput::Move { x, y } => self.controls.pointer_move(x, y),
            PointerInput::Up | PointerInput::Cancel => {
                let gesture = self.controls.pointer_up();
                if let Some(event) = gesture {
                    self.dispatch_controls(event, now);
                }
                self.dispatch(InteractionEvent::End, now);
            }
            PointerInput::Wheel { delta_y } => {
                for event in self.controls.wheel(delta_y) {
                    self.dispatch_controls(event, now);
                }
                self.dispatch(InteractionEvent::Wheel, now);
            }
        }
    }

    fn dispatch_controls(&mut self, event: ControlsEvent, now: Instant) {
        let event = match event {
            ControlsEvent::Start => InteractionEvent::Start,
            ControlsEvent::End => InteractionEvent::End,
        };
        self.dispatch(event, now);
    }

    fn dispatch(&mut self, event: InteractionEvent, now: Instant) {
        self.interaction.dispatch(event, now, &mut self.controls);
    }

    /// Applies a new window size given in logical pixels.
    ///
    /// Returns the drawable size the surface should be configured to.
    pub fn resize(&mut self, logical_width: f64, logical_height: f64, scale_factor: f64) -> (u32, u32) {
        self.viewport = Viewport::new(
            logical_width,
            logical_height,
            scale_factor,
            self.config.renderer.pixel_ratio_cap,
        );

        let (width, height) = self.viewport.drawable_size();
        self.camera.resize_projection(width, height);
        self.controls
            .set_viewport_height(logical_height.max(1.0) as f32);
        self.camera.update_view_proj();

        log::debug!(
            "viewport resized to {}x{} (drawable {}x{})",
            logical_width,
            logical_height,
            width,
            height
        );
        (width, height)
    }

    /// Advances one frame: fires the resume timer when due, integrates the
    /// controls and refreshes the camera uniform.
    ///
    /// Returns the time since the previous frame.
    pub fn frame(&mut self, now: Instant) -> Duration {
        let delta = self
            .last_frame
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default();
        self.last_frame = Some(now);
        log::trace!("frame delta {:?}", delta);

        self.interaction.poll(now, &mut self.controls);
        self.controls.update(&mut self.camera, None);
        self.camera.update_view_proj();

        delta
    }

    /// Applies the completion of an asset load step.
    ///
    /// Neither failure is fatal: a missing environment leaves the fallback
    /// lights, a missing model leaves the model group empty.
    pub fn apply_asset_event(&mut self, event: AssetEvent) {
        match event {
            AssetEvent::Environment(Ok(environment)) => {
                let levels = environment.levels().len();
                self.composer
                    .install_environment(&mut self.scene, environment);
                log::info!("environment installed ({} radiance levels)", levels);
            }
            AssetEvent::Environment(Err(e)) => {
                log::warn!("{}; continuing with fallback lights", e);
            }
            AssetEvent::Model(Ok(model)) => {
                if let Err(e) = self.composer.compose_model(
                    &mut self.scene,
                    model,
                    &mut self.controls,
                    &mut self.camera,
                ) {
                    log::error!("{}", e);
                }
            }
            AssetEvent::Model(Err(e)) => {
                log::error!("{}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::EnvironmentImage;
    use crate::error::ViewerError;
    use crate::gfx::resources::{environment::EnvironmentMap, material::Material};
    use crate::gfx::scene::{
        object::{Mesh, Model},
        vertex::Vertex3D,
    };
    use crate::interaction::InteractionState;
    use cgmath::{InnerSpace, Vector3};
    use std::path::PathBuf;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn box_model() -> Model {
        let vertex = |position| Vertex3D {
            position,
            normal: [0.0, 1.0, 0.0],
            uv: [0.0, 0.0],
        };
        let mesh = Mesh::new(
            vec![vertex([-1.0, 0.0, -2.0]), vertex([1.0, 1.0, 2.0])],
            vec![0, 1, 0],
            0,
        );
        let materials = vec![
            Material::default().with_double_sided(false),
            Material::default().with_double_sided(false),
        ];
        Model::new("rock", vec![mesh], materials)
    }

    fn environment_failure() -> AssetEvent {
        AssetEvent::Environment(Err(ViewerError::EnvironmentLoad {
            path: PathBuf::from("missing.hdr"),
            source: image::ImageError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "missing",
            )),
        }))
    }

    #[test]
    fn test_viewport_caps_pixel_ratio() {
        let viewport = Viewport::new(800.0, 600.0, 3.0, 2.0);
        assert_eq!(viewport.pixel_ratio(), 2.0);
        assert_eq!(viewport.drawable_size(), (1600, 1200));

        let viewport = Viewport::new(800.0, 600.0, 1.5, 2.0);
        assert_eq!(viewport.drawable_size(), (1200, 900));

        let collapsed = Viewport::new(0.0, 0.0, 1.0, 2.0);
        assert_eq!(collapsed.drawable_size(), (1, 1));
        assert_eq!(collapsed.aspect(), 1.0);
    }

    #[test]
    fn test_resize_updates_aspect_and_surface_size() {
        let mut viewer = Viewer::new(ViewerConfig::default());
        assert!((viewer.camera.aspect - 1.5).abs() < 1e-6);

        let size = viewer.resize(800.0, 600.0, 1.0);
        assert_eq!(size, (800, 600));
        assert_eq!(viewer.viewport().drawable_size(), (800, 600));
        assert!((viewer.camera.aspect - 800.0 / 600.0).abs() < 1e-6);

        viewer.resize(640.0, 640.0, 2.0);
        assert_eq!(viewer.viewport().drawable_size(), (1280, 1280));
        assert!((viewer.camera.aspect - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_end_to_end_composition_after_environment_failure() {
        let mut viewer = Viewer::new(ViewerConfig::default());
        viewer.resize(800.0, 600.0, 1.0);
        assert!((viewer.camera.aspect - 1.3333).abs() < 1e-4);

        viewer.apply_asset_event(environment_failure());
        assert!(!viewer.scene.has_environment());

        viewer.apply_asset_event(AssetEvent::Model(Ok(box_model())));

        let model = viewer.scene.model_group.model().expect("model inserted");
        assert!((model.transform.scale - 0.4).abs() < 1e-6);
        assert!(model.materials.iter().all(|m| m.double_sided));
        assert!((model.bounding_box().center()).magnitude() < 1e-5);
        assert_eq!(viewer.controls.target, Vector3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_environment_then_model() {
        let mut viewer = Viewer::new(ViewerConfig::default());
        let environment = EnvironmentMap::from_equirect(&EnvironmentImage {
            width: 16,
            height: 8,
            pixels: vec![[0.5; 3]; 16 * 8],
        });
        viewer.apply_asset_event(AssetEvent::Environment(Ok(environment)));
        assert!(viewer.scene.has_environment());

        viewer.apply_asset_event(AssetEvent::Model(Ok(box_model())));
        assert!(!viewer.scene.model_group.is_empty());
    }

    #[test]
    fn test_model_failure_leaves_group_empty() {
        let mut viewer = Viewer::new(ViewerConfig::default());
        viewer.apply_asset_event(AssetEvent::Model(Err(ViewerError::EmptyModel {
            path: PathBuf::from("empty.glb"),
        })));
        assert!(viewer.scene.model_group.is_empty());

        // A second successful model is accepted into the still empty group,
        // while a further one is rejected and logged.
        viewer.apply_asset_event(AssetEvent::Model(Ok(box_model())));
        viewer.apply_asset_event(AssetEvent::Model(Ok(box_model())));
        assert_eq!(
            viewer.scene.model_group.model().map(|m| m.name.as_str()),
            Some("rock")
        );
    }

    #[test]
    fn test_drag_pauses_rotation_until_resume_delay() {
        let t0 = Instant::now();
        let mut viewer = Viewer::new(ViewerConfig::default());
        assert!(viewer.controls.auto_rotate);

        viewer.handle_pointer(PointerInput::Down { x: 10.0, y: 10.0 }, t0);
        assert!(!viewer.controls.auto_rotate);
        assert!(viewer.interaction().is_interacting());

        viewer.handle_pointer(PointerInput::Move { x: 60.0, y: 10.0 }, t0 + ms(16));
        viewer.frame(t0 + ms(16));
        viewer.handle_pointer(PointerInput::Up, t0 + ms(100));
        assert!(!viewer.controls.auto_rotate);

        viewer.frame(t0 + ms(999));
        assert!(!viewer.controls.auto_rotate);

        viewer.frame(t0 + ms(1_000));
        assert!(viewer.controls.auto_rotate);
        assert_eq!(viewer.interaction().state(), InteractionState::IdleRotating);
    }

    #[test]
    fn test_focus_loss_ends_drag() {
        let t0 = Instant::now();
        let mut viewer = Viewer::new(ViewerConfig::default());

        viewer.focus_lost(t0);
        assert_eq!(viewer.interaction().state(), InteractionState::IdleRotating);

        viewer.handle_pointer(PointerInput::Down { x: 10.0, y: 10.0 }, t0);
        viewer.focus_lost(t0 + ms(50));
        assert!(!viewer.controls.is_dragging());
        assert!(!viewer.interaction().is_interacting());

        viewer.frame(t0 + ms(949));
        assert!(!viewer.controls.auto_rotate);
        viewer.frame(t0 + ms(950));
        assert!(viewer.controls.auto_rotate);
    }

    #[test]
    fn test_wheel_restarts_countdown_and_dollies() {
        let t0 = Instant::now();
        let mut viewer = Viewer::new(ViewerConfig::default());
        viewer.frame(t0);
        let before = viewer.camera.eye.magnitude();

        viewer.handle_pointer(PointerInput::Wheel { delta_y: 1.0 }, t0);
        assert_eq!(viewer.interaction().next_deadline(), Some(t0 + ms(900)));

        viewer.frame(t0 + ms(16));
        assert!(viewer.camera.eye.magnitude() < before);

        viewer.frame(t0 + ms(900));
        assert!(viewer.controls.auto_rotate);
    }

    #[test]
    fn test_frame_reports_delta() {
        let t0 = Instant::now();
        let mut viewer = Viewer::new(ViewerConfig::default());
        assert_eq!(viewer.frame(t0), Duration::ZERO);
        assert_eq!(viewer.frame(t0 + ms(16)), ms(16));
    }
}
