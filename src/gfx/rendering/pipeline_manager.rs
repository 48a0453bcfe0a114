//! Render pipeline management system for wgpu
//!
//! Pipelines are described by a [`PipelineConfig`], registered under a name
//! and built in one batch once the surface format and bind group layouts are
//! known. Every pipeline draws [`Vertex3D`] triangle lists through the
//! `vs_main`/`fs_main` entry points of its shader.

use std::{collections::HashMap, sync::Arc};
use wgpu::*;

use crate::gfx::scene::vertex::Vertex3D;

const VERTEX_ENTRY: &str = "vs_main";
const FRAGMENT_ENTRY: &str = "fs_main";

/// Everything that differs between the viewer's pipelines
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub label: String,
    pub shader: String,
    pub bind_group_layouts: Vec<BindGroupLayout>,
    pub cull_mode: Option<Face>,
    pub depth_format: Option<TextureFormat>,
    pub sample_count: u32,
    pub color_format: TextureFormat,
    pub blend: Option<BlendState>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            label: "Pipeline".to_string(),
            shader: String::new(),
            bind_group_layouts: Vec::new(),
            cull_mode: Some(Face::Back),
            depth_format: None,
            sample_count: 1,
            color_format: TextureFormat::Bgra8UnormSrgb,
            blend: Some(BlendState::REPLACE),
        }
    }
}

impl PipelineConfig {
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_owned();
        self
    }

    pub fn with_shader(mut self, shader: &str) -> Self {
        self.shader = shader.to_owned();
        self
    }

    /// Bind group layouts in group order
    pub fn with_bind_group_layouts(mut self, layouts: Vec<BindGroupLayout>) -> Self {
        self.bind_group_layouts = layouts;
        self
    }

    /// `None` draws both faces
    pub fn with_cull_mode(mut self, face: Option<Face>) -> Self {
        self.cull_mode = face;
        self
    }

    /// Enables depth test and write against a target of `format`
    pub fn with_depth_stencil(mut self, format: TextureFormat) -> Self {
        self.depth_format = Some(format);
        self
    }

    pub fn with_sample_count(mut self, count: u32) -> Self {
        self.sample_count = count.max(1);
        self
    }

    pub fn with_color_target(mut self, format: TextureFormat, blend: Option<BlendState>) -> Self {
        self.color_format = format;
        self.blend = blend;
        self
    }

    fn primitive_state(&self) -> PrimitiveState {
        PrimitiveState {
            topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            cull_mode: self.cull_mode,
            ..Default::default()
        }
    }

    fn depth_stencil_state(&self) -> Option<DepthStencilState> {
        self.depth_format.map(|format| DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        })
    }

    fn multisample_state(&self) -> MultisampleState {
        MultisampleState {
            count: self.sample_count,
            ..Default::default()
        }
    }

    fn color_targets(&self) -> [Option<ColorTargetState>; 1] {
        [Some(ColorTargetState {
            format: self.color_format,
            blend: self.blend,
            write_mask: ColorWrites::ALL,
        })]
    }
}

/// Owns compiled shaders and the pipelines built from them
pub struct PipelineManager {
    device: Arc<Device>,
    shader_modules: HashMap<String, ShaderModule>,
    configs: HashMap<String, PipelineConfig>,
    pipelines: HashMap<String, RenderPipeline>,
}

impl PipelineManager {
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            shader_modules: HashMap::new(),
            configs: HashMap::new(),
            pipelines: HashMap::new(),
        }
    }

    /// Compiles a WGSL shader module under `name`
    pub fn load_shader(&mut self, name: &str, source: &str) {
        let module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(name),
            source: ShaderSource::Wgsl(source.into()),
        });
        self.shader_modules.insert(name.to_owned(), module);
    }

    /// Registers a configuration; the pipeline is built by
    /// [`create_all_pipelines`](Self::create_all_pipelines).
    ///
    /// Registering an existing name replaces the old pipeline.
    pub fn register_pipeline(&mut self, name: &str, config: PipelineConfig) {
        self.pipelines.remove(name);
        self.configs.insert(name.to_owned(), config);
    }

    /// Builds every registered pipeline that does not exist yet
    ///
    /// # Returns
    /// One message per pipeline that could not be built
    pub fn create_all_pipelines(&mut self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for (name, config) in &self.configs {
            if self.pipelines.contains_key(name) {
                continue;
            }
            let Some(shader) = self.shader_modules.get(&config.shader) else {
                errors.push(format!(
                    "pipeline '{}': shader '{}' not loaded",
                    name, config.shader
                ));
                continue;
            };
            let pipeline = Self::build(&self.device, shader, config);
            log::debug!("created pipeline '{}'", name);
            self.pipelines.insert(name.clone(), pipeline);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn build(device: &Device, shader: &ShaderModule, config: &PipelineConfig) -> RenderPipeline {
        let layouts: Vec<&BindGroupLayout> = config.bind_group_layouts.iter().collect();
        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(&format!("{} Layout", config.label)),
            bind_group_layouts: &layouts,
            push_constant_ranges: &[],
        });
        let targets = config.color_targets();

        device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(&config.label),
            layout: Some(&layout),
            vertex: VertexState {
                module: shader,
                entry_point: Some(VERTEX_ENTRY),
                buffers: &[Vertex3D::desc()],
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: shader,
                entry_point: Some(FRAGMENT_ENTRY),
                targets: &targets,
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive: config.primitive_state(),
            depth_stencil: config.depth_stencil_state(),
            multisample: config.multisample_state(),
            multiview: None,
            cache: None,
        })
    }

    pub fn get_pipeline(&self, name: &str) -> Option<&RenderPipeline> {
        self.pipelines.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_sided_config() {
        let config = PipelineConfig::default()
            .with_label("MeshDoubleSided")
            .with_shader("pbr")
            .with_cull_mode(None)
            .with_depth_stencil(TextureFormat::Depth32Float)
            .with_sample_count(4);

        assert_eq!(config.label, "MeshDoubleSided");
        assert_eq!(config.primitive_state().cull_mode, None);
        assert_eq!(
            config.primitive_state().topology,
            PrimitiveTopology::TriangleList
        );
        assert_eq!(config.multisample_state().count, 4);

        let depth = config.depth_stencil_state().expect("depth enabled");
        assert_eq!(depth.format, TextureFormat::Depth32Float);
        assert!(depth.depth_write_enabled);
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default().with_sample_count(0);
        assert_eq!(config.primitive_state().cull_mode, Some(Face::Back));
        assert!(config.depth_stencil_state().is_none());
        assert_eq!(config.multisample_state().count, 1);
    }

    #[test]
    fn test_color_target() {
        let config = PipelineConfig::default().with_color_target(
            TextureFormat::Rgba8UnormSrgb,
            Some(BlendState::PREMULTIPLIED_ALPHA_BLENDING),
        );
        let [target] = config.color_targets();
        let target = target.expect("one colour target");
        assert_eq!(target.format, TextureFormat::Rgba8UnormSrgb);
        assert_eq!(target.blend, Some(BlendState::PREMULTIPLIED_ALPHA_BLENDING));
    }
}
