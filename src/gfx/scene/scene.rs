use cgmath::{InnerSpace, Vector3};

use super::object::Model;
use crate::config::{hex_to_linear, LightingConfig};
use crate::error::{Result, ViewerError};
use crate::gfx::resources::environment::EnvironmentMap;

/// Sky/ground gradient light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HemisphereLight {
    /// Linear RGB
    pub sky_color: [f32; 3],
    /// Linear RGB
    pub ground_color: [f32; 3],
    pub intensity: f32,
}

/// Directional light shining from `position` towards the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Linear RGB
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: Vector3<f32>,
}

impl DirectionalLight {
    /// Unit vector from the surface towards the light.
    pub fn direction(&self) -> Vector3<f32> {
        if self.position.magnitude2() > 0.0 {
            self.position.normalize()
        } else {
            Vector3::unit_y()
        }
    }
}

/// Named container holding at most one model.
#[derive(Debug)]
pub struct ModelGroup {
    name: String,
    model: Option<Model>,
}

impl ModelGroup {
    pub const NAME: &'static str = "model";

    pub fn new() -> Self {
        Self {
            name: Self::NAME.to_string(),
            model: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds `model`. A group that already holds one rejects the second.
    pub fn insert(&mut self, model: Model) -> Result<&mut Model> {
        if self.model.is_some() {
            return Err(ViewerError::ModelGroupOccupied);
        }
        Ok(self.model.insert(model))
    }

    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    pub fn model_mut(&mut self) -> Option<&mut Model> {
        self.model.as_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.model.is_none()
    }
}

impl Default for ModelGroup {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything that is drawn: optional environment lighting, the two
/// fallback lights and the model group.
///
/// There is no background; pixels not covered by the model keep the clear
/// colour.
#[derive(Debug)]
pub struct Scene {
    pub environment: Option<EnvironmentMap>,
    pub environment_intensity: f32,
    pub hemisphere: HemisphereLight,
    pub directional: DirectionalLight,
    pub model_group: ModelGroup,
    environment_dirty: bool,
}

impl Scene {
    pub fn new(lighting: &LightingConfig) -> Self {
        Self {
            environment: None,
            environment_intensity: lighting.environment_intensity,
            hemisphere: HemisphereLight {
                sky_color: hex_to_linear(lighting.hemisphere_sky),
                ground_color: hex_to_linear(lighting.hemisphere_ground),
                intensity: lighting.hemisphere_intensity,
            },
            directional: DirectionalLight {
                color: hex_to_linear(lighting.directional_color),
                intensity: lighting.directional_intensity,
                position: lighting.directional_position,
            },
            model_group: ModelGroup::new(),
            environment_dirty: false,
        }
    }

    /// Installs the global lighting source. Nothing else in the scene changes.
    pub fn set_environment(&mut self, environment: EnvironmentMap) {
        self.environment = Some(environment);
        self.environment_dirty = true;
    }

    pub fn has_environment(&self) -> bool {
        self.environment.is_some()
    }

    /// Returns true once after each environment change so the renderer can
    /// re-upload it.
    pub fn take_environment_change(&mut self) -> bool {
        std::mem::take(&mut self.environment_dirty)
    }
}
