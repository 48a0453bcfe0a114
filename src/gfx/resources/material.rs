//! Material system for PBR rendering
//!
//! Materials hold metallic-roughness properties decoded from the model file.
//! GPU state is created lazily and re-synchronised whenever `needs_update` is
//! raised, which is how edits such as forcing double-sided rendering reach
//! the renderer.

use crate::gfx::resources::texture_resource::TextureResource;
use crate::wgpu_utils::{
    binding_builder::{BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc},
    binding_types,
    uniform_buffer::UniformBuffer,
};

/// GPU uniform data for materials
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub base_color: [f32; 4],
    /// rgb emissive, w unused
    pub emissive: [f32; 4],
    /// x metallic, y roughness, z double sided, w has base colour texture
    pub params: [f32; 4],
}

type MaterialUBO = UniformBuffer<MaterialUniform>;

/// Bind group layout shared by every material: uniform, base colour
/// texture, sampler.
pub struct MaterialBindings {
    bind_group_layout: BindGroupLayoutWithDesc,
}

impl MaterialBindings {
    pub fn new(device: &wgpu::Device) -> Self {
        let bind_group_layout = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_types::uniform())
            .next_binding_fragment(binding_types::texture_2d())
            .next_binding_fragment(binding_types::sampler(
                wgpu::SamplerBindingType::Filtering,
            ))
            .create(device, "Material Bind Group Layout");

        MaterialBindings { bind_group_layout }
    }

    pub fn bind_group_layouts(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout.layout
    }

    pub fn layout_with_desc(&self) -> &BindGroupLayoutWithDesc {
        &self.bind_group_layout
    }
}

struct MaterialGpu {
    ubo: MaterialUBO,
    bind_group: wgpu::BindGroup,
}

/// Metallic-roughness material
pub struct Material {
    pub name: String,
    /// Linear RGBA
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: [f32; 3],
    /// Index into the owning model's texture list.
    pub base_color_texture: Option<usize>,
    /// Render front and back faces.
    pub double_sided: bool,
    /// Set when properties changed and the GPU copy is stale.
    pub needs_update: bool,

    gpu: Option<MaterialGpu>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 1.0,
            roughness: 1.0,
            emissive: [0.0, 0.0, 0.0],
            base_color_texture: None,
            double_sided: false,
            needs_update: true,
            gpu: None,
        }
    }
}

impl std::fmt::Debug for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Material")
            .field("name", &self.name)
            .field("base_color", &self.base_color)
            .field("metallic", &self.metallic)
            .field("roughness", &self.roughness)
            .field("double_sided", &self.double_sided)
            .field("needs_update", &self.needs_update)
            .finish()
    }
}

impl Material {
    pub fn new(name: &str, base_color: [f32; 4], metallic: f32, roughness: f32) -> Self {
        Self {
            name: name.to_string(),
            base_color,
            metallic: metallic.clamp(0.0, 1.0),
            roughness: roughness.clamp(0.0, 1.0),
            ..Default::default()
        }
    }

    pub fn with_emission(mut self, r: f32, g: f32, b: f32) -> Self {
        self.emissive = [r, g, b];
        self
    }

    pub fn with_texture(mut self, texture: Option<usize>) -> Self {
        self.base_color_texture = texture;
        self
    }

    pub fn with_double_sided(mut self, double_sided: bool) -> Self {
        self.double_sided = double_sided;
        self
    }

    pub fn uniform(&self) -> MaterialUniform {
        MaterialUniform {
            base_color: self.base_color,
            emissive: [self.emissive[0], self.emissive[1], self.emissive[2], 0.0],
            params: [
                self.metallic,
                self.roughness,
                if self.double_sided { 1.0 } else { 0.0 },
                if self.base_color_texture.is_some() { 1.0 } else { 0.0 },
            ],
        }
    }

    /// Creates the GPU copy on first use and uploads pending changes.
    ///
    /// `texture` is the resolved base colour texture (or a white fallback).
    pub fn sync_gpu(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bindings: &MaterialBindings,
        texture: &TextureResource,
    ) {
        if self.gpu.is_none() {
            let ubo = MaterialUBO::new_with_data(device, &self.uniform());
            let bind_group = BindGroupBuilder::new(bindings.layout_with_desc())
                .resource(ubo.binding_resource())
                .texture(&texture.view)
                .sampler(&texture.sampler)
                .create(device, &format!("Material '{}'", self.name));
            self.gpu = Some(MaterialGpu { ubo, bind_group });
            self.needs_update = false;
            return;
        }

        if self.needs_update {
            let uniform = self.uniform();
            if let Some(gpu) = self.gpu.as_mut() {
                gpu.ubo.update_content(queue, uniform);
            }
            self.needs_update = false;
        }
    }

    pub fn get_bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.gpu.as_ref().map(|gpu| &gpu.bind_group)
    }
}
