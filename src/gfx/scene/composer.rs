//! Places loaded assets into the scene
//!
//! The environment becomes the scene's lighting source. The model is moved
//! onto the origin, scaled so its largest bounding dimension matches the
//! configured target size, switched to double-sided rendering and inserted
//! into the model group. The controls are then re-aimed at the origin.

use cgmath::{Vector3, Zero};

use super::{object::Model, scene::Scene};
use crate::config::{CenteringMode, FitConfig};
use crate::error::Result;
use crate::gfx::camera::{orbit_camera::PerspectiveCamera, orbit_controls::OrbitControls};
use crate::gfx::resources::environment::EnvironmentMap;

/// Outcome of fitting a model, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitReport {
    /// Bounding box centre before fitting.
    pub center: Vector3<f32>,
    /// Largest bounding box dimension before fitting.
    pub max_dimension: f32,
    pub scale: f32,
    pub position: Vector3<f32>,
}

#[derive(Debug, Clone)]
pub struct SceneComposer {
    fit: FitConfig,
}

impl SceneComposer {
    pub fn new(fit: FitConfig) -> Self {
        Self { fit }
    }

    /// Makes an already prefiltered environment the scene's lighting source.
    pub fn install_environment(&self, scene: &mut Scene, environment: EnvironmentMap) {
        scene.set_environment(environment);
    }

    /// Moves and scales `model` in place.
    ///
    /// A model whose largest dimension is not positive keeps its scale.
    pub fn fit_model(&self, model: &mut Model) -> FitReport {
        let bounds = model.bounding_box();
        let center = bounds.center();
        let max_dimension = bounds.max_dimension();

        let current = model.transform;
        let scale = if max_dimension > 0.0 {
            self.fit.target_size / max_dimension
        } else {
            current.scale
        };

        let position = match self.fit.centering {
            CenteringMode::Recenter => {
                let ratio = if current.scale != 0.0 {
                    scale / current.scale
                } else {
                    1.0
                };
                -(center - current.position) * ratio
            }
            CenteringMode::MirrorOffset => current.position + (current.position - center),
        };

        model.transform.position = position;
        model.transform.scale = scale;

        FitReport {
            center,
            max_dimension,
            scale,
            position,
        }
    }

    /// Fits `model`, forces double-sided materials and inserts it, then points
    /// the controls at the origin and settles them once.
    pub fn compose_model(
        &self,
        scene: &mut Scene,
        mut model: Model,
        controls: &mut OrbitControls,
        camera: &mut PerspectiveCamera,
    ) -> Result<FitReport> {
        let report = self.fit_model(&mut model);

        for material in model.materials.iter_mut() {
            material.double_sided = true;
            material.needs_update = true;
        }

        let model = scene.model_group.insert(model)?;
        log::info!(
            "placed model '{}': {} vertices, {} triangles, scale {:.4}",
            model.name,
            model.vertex_count(),
            model.triangle_count(),
            report.scale
        );

        controls.set_target(Vector3::zero());
        controls.update(camera, None);
        camera.update_view_proj();

        Ok(report)
    }
}
