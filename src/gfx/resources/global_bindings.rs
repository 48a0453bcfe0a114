//! Global uniform bindings for camera and lighting data
//!
//! Manages the uniform buffer and bind group shared by every draw call:
//! camera matrices, the fallback lights, the environment's irradiance
//! coefficients and its radiance texture.

use crate::{
    config::{RendererConfig, ToneMapping},
    gfx::{
        camera::camera_utils::CameraUniform,
        resources::{environment::EnvironmentMap, texture_resource::TextureResource},
        scene::scene::Scene,
    },
    wgpu_utils::{
        binding_builder::{BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc},
        binding_types,
        uniform_buffer::UniformBuffer,
    },
};

/// Global uniform buffer content structure
///
/// MUST match the `Globals` struct in `pbr.wgsl` exactly.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlobalUBOContent {
    view_proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    /// rgb premultiplied by intensity
    sky_color: [f32; 4],
    ground_color: [f32; 4],
    /// Towards the light, w unused
    light_direction: [f32; 4],
    light_color: [f32; 4],
    sh: [[f32; 4]; 9],
    /// x has environment, y exposure, z max lod, w environment intensity
    env_params: [f32; 4],
    /// x tone mapping (0 none, 1 ACES filmic)
    render_params: [f32; 4],
}
// Total: 64 + 16 * 6 + 144 + 16 = 320 bytes

/// Type alias for the global uniform buffer
pub type GlobalUBO = UniformBuffer<GlobalUBOContent>;

impl GlobalUBOContent {
    pub fn new(camera: &CameraUniform, scene: &Scene, renderer: &RendererConfig) -> Self {
        let hemisphere = &scene.hemisphere;
        let directional = &scene.directional;
        let scaled = |rgb: [f32; 3], k: f32| [rgb[0] * k, rgb[1] * k, rgb[2] * k, 0.0];
        let direction = directional.direction();

        let mut sh = [[0.0f32; 4]; 9];
        let (has_env, max_lod) = match &scene.environment {
            Some(env) => {
                for (dst, src) in sh.iter_mut().zip(env.irradiance_sh()) {
                    *dst = [src[0], src[1], src[2], 0.0];
                }
                (1.0, env.max_lod())
            }
            None => (0.0, 0.0),
        };

        Self {
            view_proj: camera.view_proj,
            camera_position: camera.view_position,
            sky_color: scaled(hemisphere.sky_color, hemisphere.intensity),
            ground_color: scaled(hemisphere.ground_color, hemisphere.intensity),
            light_direction: [direction.x, direction.y, direction.z, 0.0],
            light_color: scaled(directional.color, directional.intensity),
            sh,
            env_params: [
                has_env,
                renderer.exposure,
                max_lod,
                scene.environment_intensity,
            ],
            render_params: [
                match renderer.tone_mapping {
                    ToneMapping::None => 0.0,
                    ToneMapping::AcesFilmic => 1.0,
                },
                0.0,
                0.0,
                0.0,
            ],
        }
    }
}

/// Updates the global uniform buffer from the camera and scene lighting.
///
/// Should be called each frame before drawing.
pub fn update_global_ubo(
    ubo: &mut GlobalUBO,
    queue: &wgpu::Queue,
    camera: &CameraUniform,
    scene: &Scene,
    renderer: &RendererConfig,
) {
    ubo.update_content(queue, GlobalUBOContent::new(camera, scene, renderer));
}

/// Manages bind group layouts and bind groups for global uniforms
///
/// Bound to slot 0 in all render pipelines. The bind group is rebuilt when
/// the environment texture changes.
pub struct GlobalBindings {
    bind_group_layout: BindGroupLayoutWithDesc,
    bind_group: Option<wgpu::BindGroup>,
    environment_texture: Option<TextureResource>,
}

impl GlobalBindings {
    /// Sets up the bind group layout for global uniforms but doesn't
    /// create the actual bind group until `create_bind_group()` is called.
    pub fn new(device: &wgpu::Device) -> Self {
        let bind_group_layout = BindGroupLayoutBuilder::new()
            .next_binding_rendering(binding_types::uniform())
            .next_binding_fragment(binding_types::texture_2d())
            .next_binding_fragment(binding_types::sampler(
                wgpu::SamplerBindingType::Filtering,
            ))
            .create(device, "Globals Bind Group");

        GlobalBindings {
            bind_group_layout,
            bind_group: None,
            environment_texture: None,
        }
    }

    /// Creates the bind group with the placeholder environment.
    pub fn create_bind_group(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, ubo: &GlobalUBO) {
        let placeholder = EnvironmentMap::placeholder_texture(device, queue);
        self.set_environment_texture(device, ubo, placeholder);
    }

    /// Swaps in a new environment radiance texture.
    pub fn set_environment_texture(
        &mut self,
        device: &wgpu::Device,
        ubo: &GlobalUBO,
        texture: TextureResource,
    ) {
        let bind_group = BindGroupBuilder::new(&self.bind_group_layout)
            .resource(ubo.binding_resource())
            .texture(&texture.view)
            .sampler(&texture.sampler)
            .create(device, "Global Bind Group");
        self.bind_group = Some(bind_group);
        self.environment_texture = Some(texture);
    }

    /// Used when creating render pipelines that need access to global uniforms.
    pub fn bind_group_layouts(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout.layout
    }

    pub fn environment_texture(&self) -> Option<&TextureResource> {
        self.environment_texture.as_ref()
    }

    /// Returns the bind group, if `create_bind_group()` has been called.
    pub fn bind_groups(&self) -> Option<&wgpu::BindGroup> {
        self.bind_group.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::EnvironmentImage;
    use crate::config::LightingConfig;

    #[test]
    fn test_content_size_matches_shader_layout() {
        assert_eq!(std::mem::size_of::<GlobalUBOContent>(), 320);
    }

    #[test]
    fn test_content_without_environment() {
        let scene = Scene::new(&LightingConfig::default());
        let content = GlobalUBOContent::new(
            &CameraUniform::default(),
            &scene,
            &RendererConfig::default(),
        );

        assert_eq!(content.env_params[0], 0.0);
        assert_eq!(content.sh, [[0.0; 4]; 9]);
        assert!((content.sky_color[0] - 0.4).abs() < 1e-5);
        assert!((content.light_color[1] - 0.6).abs() < 1e-5);
        assert_eq!(content.render_params[0], 1.0);
    }

    #[test]
    fn test_content_with_environment() {
        let mut scene = Scene::new(&LightingConfig::default());
        scene.set_environment(EnvironmentMap::from_equirect(&EnvironmentImage {
            width: 64,
            height: 32,
            pixels: vec![[1.0; 3]; 64 * 32],
        }));
        let content = GlobalUBOContent::new(
            &CameraUniform::default(),
            &scene,
            &RendererConfig::default(),
        );

        assert_eq!(content.env_params[0], 1.0);
        assert_eq!(content.env_params[2], 3.0);
        assert!(content.sh[0][0] > 0.0);
    }
}
