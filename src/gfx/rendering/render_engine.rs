//! WGPU-based rendering engine for the viewer
//!
//! Owns the surface, device and queue, the multisampled colour and depth
//! targets, the global bindings and the mesh pipelines. A frame is a single
//! pass that clears to transparent and draws the model group.

use std::sync::Arc;
use wgpu::TextureFormat;

use crate::config::RendererConfig;
use crate::error::Result;
use crate::gfx::{
    camera::camera_utils::CameraUniform,
    resources::{
        global_bindings::{update_global_ubo, GlobalBindings, GlobalUBO},
        material::MaterialBindings,
        texture_resource::TextureResource,
    },
    scene::{
        object::{DrawModel, TransformBindings},
        scene::Scene,
    },
};

use super::pipeline_manager::{PipelineConfig, PipelineManager};

const SHADER: &str = "pbr";
const MESH_PIPELINE: &str = "Mesh";
const DOUBLE_SIDED_PIPELINE: &str = "MeshDoubleSided";

/// Core rendering engine managing GPU resources and draw calls
pub struct RenderEngine {
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: wgpu::SurfaceConfiguration,
    renderer: RendererConfig,
    sample_count: u32,
    depth_texture: TextureResource,
    msaa_target: Option<TextureResource>,
    pipeline_manager: PipelineManager,
    global_ubo: GlobalUBO,
    global_bindings: GlobalBindings,
    transform_bindings: TransformBindings,
    material_bindings: MaterialBindings,
}

impl RenderEngine {
    /// Creates a new render engine for the given window
    ///
    /// # Arguments
    /// * `window` - Window surface target for rendering
    /// * `width` - Initial surface width in physical pixels
    /// * `height` - Initial surface height in physical pixels
    /// * `renderer` - Output configuration (format, transparency, MSAA, tone mapping)
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        renderer: RendererConfig,
    ) -> Result<RenderEngine> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        let info = adapter.get_info();
        log::info!("using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("WGPU Device"),
                required_features: wgpu::Features::default(),
                required_limits: wgpu::Limits {
                    max_texture_dimension_2d: 4096,
                    ..wgpu::Limits::downlevel_defaults()
                },
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let surface_capabilities = surface.get_capabilities(&adapter);
        let format = choose_format(&surface_capabilities.formats, renderer.srgb_output);
        let alpha_mode = choose_alpha_mode(&surface_capabilities.alpha_modes);
        log::info!("surface format {:?}, alpha mode {:?}", format, alpha_mode);

        let mut sample_count = renderer.sample_count();
        if !adapter
            .get_texture_format_features(format)
            .flags
            .sample_count_supported(sample_count)
        {
            log::warn!(
                "{}x MSAA is not supported for {:?}, rendering without it",
                sample_count,
                format
            );
            sample_count = 1;
        }

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let depth_texture =
            TextureResource::create_depth_texture(&device, &config, sample_count, "depth_texture");
        let msaa_target = (sample_count > 1)
            .then(|| TextureResource::create_msaa_target(&device, &config, sample_count));

        let global_ubo = GlobalUBO::new(&device);
        let mut global_bindings = GlobalBindings::new(&device);
        global_bindings.create_bind_group(&device, &queue, &global_ubo);
        let transform_bindings = TransformBindings::new(&device);
        let material_bindings = MaterialBindings::new(&device);

        let mut pipeline_manager = PipelineManager::new(device.clone());
        pipeline_manager.load_shader(SHADER, include_str!("shaders/pbr.wgsl"));

        let base_config = PipelineConfig::default()
            .with_shader(SHADER)
            .with_bind_group_layouts(vec![
                global_bindings.bind_group_layouts().clone(),
                transform_bindings.bind_group_layouts().clone(),
                material_bindings.bind_group_layouts().clone(),
            ])
            .with_depth_stencil(TextureResource::DEPTH_FORMAT)
            .with_sample_count(sample_count)
            .with_color_target(format, Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING));
        pipeline_manager.register_pipeline(
            MESH_PIPELINE,
            base_config
                .clone()
                .with_label(MESH_PIPELINE)
                .with_cull_mode(Some(wgpu::Face::Back)),
        );
        pipeline_manager.register_pipeline(
            DOUBLE_SIDED_PIPELINE,
            base_config
                .with_label(DOUBLE_SIDED_PIPELINE)
                .with_cull_mode(None),
        );
        if let Err(errors) = pipeline_manager.create_all_pipelines() {
            for error in errors {
                log::error!("{}", error);
            }
        }

        Ok(Self {
            surface,
            device,
            queue,
            config,
            renderer,
            sample_count,
            depth_texture,
            msaa_target,
            pipeline_manager,
            global_ubo,
            global_bindings,
            transform_bindings,
            material_bindings,
        })
    }

    /// Uploads whatever in `scene` changed since the last frame: a newly
    /// installed environment, a newly inserted model, flagged materials and
    /// the model transform.
    pub fn prepare(&mut self, scene: &mut Scene) {
        if scene.take_environment_change() {
            if let Some(environment) = &scene.environment {
                let texture = environment.upload(&self.device, &self.queue);
                self.global_bindings
                    .set_environment_texture(&self.device, &self.global_ubo, texture);
                log::debug!("uploaded environment ({} levels)", environment.levels().len());
            }
        }

        if let Some(model) = scene.model_group.model_mut() {
            model.sync_gpu(
                &self.device,
                &self.queue,
                &self.transform_bindings,
                &self.material_bindings,
            );
        }
    }

    /// Writes camera and lighting uniforms for the next frame
    pub fn update(&mut self, camera_uniform: &CameraUniform, scene: &Scene) {
        update_global_ubo(
            &mut self.global_ubo,
            &self.queue,
            camera_uniform,
            scene,
            &self.renderer,
        );
    }

    /// Renders the scene into the next surface texture and presents it
    ///
    /// Surface errors are returned to the caller, which decides whether to
    /// reconfigure, skip the frame or exit.
    pub fn render_frame(&self, scene: &Scene) -> std::result::Result<(), wgpu::SurfaceError> {
        let surface_texture = self.surface.get_current_texture()?;

        let surface_texture_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let [r, g, b, a] = self.renderer.clear_color;
        let (view, resolve_target, store) = match &self.msaa_target {
            Some(msaa) => (
                &msaa.view,
                Some(&surface_texture_view),
                wgpu::StoreOp::Discard,
            ),
            None => (&surface_texture_view, None, wgpu::StoreOp::Store),
        };

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Main Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if let (Some(globals), Some(model)) = (
                self.global_bindings.bind_groups(),
                scene.model_group.model(),
            ) {
                render_pass.set_bind_group(0, globals, &[]);

                if let Some(transform) = model.get_transform_bind_group() {
                    render_pass.set_bind_group(1, transform, &[]);

                    for mesh in &model.meshes {
                        let Some(material) = model.material_for(mesh) else {
                            continue;
                        };
                        let Some(material_bind_group) = material.get_bind_group() else {
                            continue;
                        };
                        let pipeline_name = if material.double_sided {
                            DOUBLE_SIDED_PIPELINE
                        } else {
                            MESH_PIPELINE
                        };
                        let Some(pipeline) = self.pipeline_manager.get_pipeline(pipeline_name)
                        else {
                            continue;
                        };

                        render_pass.set_pipeline(pipeline);
                        render_pass.set_bind_group(2, material_bind_group, &[]);
                        render_pass.draw_mesh(mesh);
                    }
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        Ok(())
    }

    /// Resizes the surface and recreates the depth and MSAA targets
    ///
    /// Zero sizes (minimised windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);

        self.depth_texture = TextureResource::create_depth_texture(
            &self.device,
            &self.config,
            self.sample_count,
            "depth_texture",
        );
        if self.msaa_target.is_some() {
            self.msaa_target = Some(TextureResource::create_msaa_target(
                &self.device,
                &self.config,
                self.sample_count,
            ));
        }
        log::debug!("surface resized to {}x{}", width, height);
    }

    /// Re-applies the current configuration after the surface was lost or
    /// became outdated.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }
}

/// Picks an sRGB surface format when `srgb` is set, a linear one otherwise,
/// falling back to the first supported format.
pub fn choose_format(formats: &[TextureFormat], srgb: bool) -> TextureFormat {
    formats
        .iter()
        .copied()
        .find(|f| f.is_srgb() == srgb)
        .or_else(|| formats.first().copied())
        .unwrap_or(TextureFormat::Bgra8UnormSrgb)
}

/// Picks a compositing mode that lets the window background show through
/// transparent pixels.
pub fn choose_alpha_mode(modes: &[wgpu::CompositeAlphaMode]) -> wgpu::CompositeAlphaMode {
    use wgpu::CompositeAlphaMode;

    for preferred in [
        CompositeAlphaMode::PreMultiplied,
        CompositeAlphaMode::PostMultiplied,
    ] {
        if modes.contains(&preferred) {
            return preferred;
        }
    }

    let fallback = modes.first().copied().unwrap_or(CompositeAlphaMode::Auto);
    log::warn!(
        "surface does not support transparent compositing, using {:?}",
        fallback
    );
    fallback
}
