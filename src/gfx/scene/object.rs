use std::ops::Range;

use cgmath::{Matrix4, Vector3};
use wgpu::Device;

use super::{bounds::Aabb, vertex::Vertex3D};
use crate::gfx::resources::{
    material::{Material, MaterialBindings},
    texture_resource::TextureResource,
};
use crate::wgpu_utils::{
    binding_builder::{BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc},
    binding_types,
    uniform_buffer::UniformBuffer,
};

/// Decoded RGBA8 image owned by a model.
#[derive(Clone)]
pub struct TextureData {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Debug for TextureData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TextureData({}x{})", self.width, self.height)
    }
}

pub struct Mesh {
    pub vertices: Vec<Vertex3D>,
    pub indices: Vec<u32>,
    /// Index into the owning model's material list.
    pub material: usize,
    vertex_buffer: Option<wgpu::Buffer>,
    index_buffer: Option<wgpu::Buffer>,
    index_count: u32,
}

impl std::fmt::Debug for Mesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mesh")
            .field("vertices", &self.vertices.len())
            .field("indices", &self.indices.len())
            .field("material", &self.material)
            .finish()
    }
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex3D>, indices: Vec<u32>, material: usize) -> Self {
        let index_count = indices.len() as u32;
        Self {
            vertices,
            indices,
            material,
            vertex_buffer: None,
            index_buffer: None,
            index_count,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Bounds in the model's root space.
    pub fn local_bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(|v| &v.position))
    }

    /// Area-weighted vertex normals for meshes that ship without any.
    pub fn calculate_face_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
        let mut normals = vec![[0.0f32; 3]; positions.len()];

        for triangle in indices.chunks_exact(3) {
            let (i0, i1, i2) = (
                triangle[0] as usize,
                triangle[1] as usize,
                triangle[2] as usize,
            );
            if i0 >= positions.len() || i1 >= positions.len() || i2 >= positions.len() {
                continue;
            }
            let v0 = Vector3::from(positions[i0]);
            let edge1 = Vector3::from(positions[i1]) - v0;
            let edge2 = Vector3::from(positions[i2]) - v0;
            let face_normal = edge1.cross(edge2);

            for &vertex_idx in &[i0, i1, i2] {
                normals[vertex_idx][0] += face_normal.x;
                normals[vertex_idx][1] += face_normal.y;
                normals[vertex_idx][2] += face_normal.z;
            }
        }

        for n in normals.iter_mut() {
            let length = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            if length > 0.0 {
                n[0] /= length;
                n[1] /= length;
                n[2] /= length;
            } else {
                *n = [0.0, 1.0, 0.0];
            }
        }

        normals
    }

    fn init_gpu_resources(&mut self, device: &Device) {
        let vertex_buffer = wgpu::util::DeviceExt::create_buffer_init(
            device,
            &wgpu::util::BufferInitDescriptor {
                label: Some("Vertex Buffer"),
                contents: bytemuck::cast_slice(&self.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            },
        );

        let index_buffer = wgpu::util::DeviceExt::create_buffer_init(
            device,
            &wgpu::util::BufferInitDescriptor {
                label: Some("Index Buffer"),
                contents: bytemuck::cast_slice(&self.indices),
                usage: wgpu::BufferUsages::INDEX,
            },
        );

        self.vertex_buffer = Some(vertex_buffer);
        self.index_buffer = Some(index_buffer);
    }
}

/// Position and uniform scale of a model root. World matrix is `T * S`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            scale: 1.0,
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position) * Matrix4::from_scale(self.scale)
    }
}

/// Bind group layout for the per-model transform uniform.
pub struct TransformBindings {
    bind_group_layout: BindGroupLayoutWithDesc,
}

impl TransformBindings {
    pub fn new(device: &Device) -> Self {
        let bind_group_layout = BindGroupLayoutBuilder::new()
            .next_binding_vertex(binding_types::uniform())
            .create(device, "Transform Bind Group Layout");
        Self { bind_group_layout }
    }

    pub fn bind_group_layouts(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout.layout
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct TransformUniform {
    model: [[f32; 4]; 4],
}

struct ModelGpuResources {
    transform_ubo: UniformBuffer<TransformUniform>,
    transform_bind_group: wgpu::BindGroup,
    textures: Vec<TextureResource>,
    fallback_texture: TextureResource,
}

/// A loaded model: a root transform over meshes baked into root space.
pub struct Model {
    pub name: String,
    pub transform: Transform,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub textures: Vec<TextureData>,
    gpu_resources: Option<ModelGpuResources>,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("transform", &self.transform)
            .field("meshes", &self.meshes)
            .field("materials", &self.materials)
            .field("textures", &self.textures)
            .finish()
    }
}

impl Model {
    pub fn new(name: impl Into<String>, meshes: Vec<Mesh>, materials: Vec<Material>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            meshes,
            materials,
            textures: Vec::new(),
            gpu_resources: None,
        }
    }

    pub fn with_textures(mut self, textures: Vec<TextureData>) -> Self {
        self.textures = textures;
        self
    }

    /// World-space bounds including the root transform.
    pub fn bounding_box(&self) -> Aabb {
        let local = self
            .meshes
            .iter()
            .fold(Aabb::empty(), |acc, mesh| acc.union(&mesh.local_bounds()));
        local.transformed(&self.transform.matrix())
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertices.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(Mesh::triangle_count).sum()
    }

    pub fn material_for(&self, mesh: &Mesh) -> Option<&Material> {
        self.materials.get(mesh.material)
    }

    pub fn has_gpu_resources(&self) -> bool {
        self.gpu_resources.is_some()
    }

    /// Uploads meshes, textures and the transform on first call, then keeps
    /// the transform and any flagged materials in sync.
    pub fn sync_gpu(
        &mut self,
        device: &Device,
        queue: &wgpu::Queue,
        transform_bindings: &TransformBindings,
        material_bindings: &MaterialBindings,
    ) {
        if self.gpu_resources.is_none() {
            for mesh in self.meshes.iter_mut() {
                mesh.init_gpu_resources(device);
            }

            let textures = self
                .textures
                .iter()
                .enumerate()
                .map(|(i, tex)| {
                    TextureResource::create_from_rgba_data(
                        device,
                        queue,
                        &tex.pixels,
                        tex.width,
                        tex.height,
                        &format!("{} texture {}", self.name, i),
                    )
                })
                .collect();

            let transform_ubo = UniformBuffer::new_with_data(
                device,
                &TransformUniform {
                    model: self.transform.matrix().into(),
                },
            );
            let transform_bind_group = BindGroupBuilder::new(&transform_bindings.bind_group_layout)
                .resource(transform_ubo.binding_resource())
                .create(device, "Transform Bind Group");

            self.gpu_resources = Some(ModelGpuResources {
                transform_ubo,
                transform_bind_group,
                textures,
                fallback_texture: TextureResource::create_white(device, queue),
            });
            log::debug!("uploaded model '{}' to the GPU", self.name);
        }

        let Some(gpu) = self.gpu_resources.as_mut() else {
            return;
        };

        gpu.transform_ubo.update_content(
            queue,
            TransformUniform {
                model: self.transform.matrix().into(),
            },
        );

        for material in self.materials.iter_mut() {
            let texture = material
                .base_color_texture
                .and_then(|i| gpu.textures.get(i))
                .unwrap_or(&gpu.fallback_texture);
            material.sync_gpu(device, queue, material_bindings, texture);
        }
    }

    pub fn get_transform_bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.gpu_resources
            .as_ref()
            .map(|res| &res.transform_bind_group)
    }
}

pub trait DrawModel<'a> {
    fn draw_mesh(&mut self, mesh: &'a Mesh);
    fn draw_mesh_instanced(&mut self, mesh: &'a Mesh, instances: Range<u32>);
}

impl<'a, 'b> DrawModel<'b> for wgpu::RenderPass<'a>
where
    'b: 'a,
{
    fn draw_mesh(&mut self, mesh: &'b Mesh) {
        self.draw_mesh_instanced(mesh, 0..1);
    }

    fn draw_mesh_instanced(&mut self, mesh: &'b Mesh, instances: Range<u32>) {
        let (Some(vertex_buffer), Some(index_buffer)) = (&mesh.vertex_buffer, &mesh.index_buffer)
        else {
            return; // Skip drawing if not uploaded
        };

        self.set_vertex_buffer(0, vertex_buffer.slice(..));
        self.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.draw_indexed(0..mesh.index_count, 0, instances);
    }
}
