// src/wgpu_utils/uniform_buffer.rs
use std::marker::PhantomData;

use wgpu::util::DeviceExt;

/// Typed uniform buffer holding a single `Content` value.
///
/// The last uploaded bytes are kept on the CPU side so that per-frame
/// updates with unchanged content never reach the queue.
pub struct UniformBuffer<Content> {
    buffer: wgpu::Buffer,
    last_upload: Vec<u8>,
    _content: PhantomData<Content>,
}

impl<Content: bytemuck::Pod> UniformBuffer<Content> {
    /// Buffer label: the content type without its module path.
    fn label() -> String {
        let type_name = std::any::type_name::<Content>();
        let short = type_name.rsplit("::").next().unwrap_or(type_name);
        format!("{} Uniform", short)
    }

    /// Zero-initialised buffer.
    pub fn new(device: &wgpu::Device) -> Self {
        Self::new_with_data(device, &Content::zeroed())
    }

    pub fn new_with_data(device: &wgpu::Device, initial_content: &Content) -> Self {
        let bytes = bytemuck::bytes_of(initial_content);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&Self::label()),
            contents: bytes,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            buffer,
            last_upload: bytes.to_vec(),
            _content: PhantomData,
        }
    }

    /// Writes `content` unless it equals the last upload.
    pub fn update_content(&mut self, queue: &wgpu::Queue, content: Content) {
        let bytes = bytemuck::bytes_of(&content);
        if self.last_upload.as_slice() != bytes {
            queue.write_buffer(&self.buffer, 0, bytes);
            self.last_upload.clear();
            self.last_upload.extend_from_slice(bytes);
        }
    }

    pub fn binding_resource(&self) -> wgpu::BindingResource {
        self.buffer.as_entire_binding()
    }
}
