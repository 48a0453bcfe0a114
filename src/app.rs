use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, Touch, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use crate::assets::{spawn_loader, AssetEvent};
use crate::config::ViewerConfig;
use crate::error::{Result, ViewerError};
use crate::gfx::rendering::render_engine::RenderEngine;
use crate::viewer::{PointerInput, Viewer};

/// Desktop host for a [`Viewer`]: one transparent window, a render loop
/// that redraws continuously and a background asset loader.
pub struct ModelViewer {
    event_loop: EventLoop<AssetEvent>,
    app_state: AppState,
}

struct AppState {
    viewer: Viewer,
    proxy: EventLoopProxy<AssetEvent>,
    window: Option<Arc<Window>>,
    render_engine: Option<RenderEngine>,
    loader: Option<JoinHandle<()>>,
    cursor: (f32, f32),
    active_touch: Option<u64>,
    startup_error: Option<ViewerError>,
}

impl ModelViewer {
    pub fn new(config: ViewerConfig) -> Result<Self> {
        let event_loop = EventLoop::<AssetEvent>::with_user_event().build()?;
        let proxy = event_loop.create_proxy();

        Ok(Self {
            event_loop,
            app_state: AppState {
                viewer: Viewer::new(config),
                proxy,
                window: None,
                render_engine: None,
                loader: None,
                cursor: (0.0, 0.0),
                active_touch: None,
                startup_error: None,
            },
        })
    }

    /// Runs the event loop until the window is closed.
    ///
    /// Fails only when the window or the GPU could not be set up.
    pub fn run(mut self) -> Result<()> {
        self.event_loop.set_control_flow(ControlFlow::Poll);
        self.event_loop.run_app(&mut self.app_state)?;

        match self.app_state.startup_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl AppState {
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: ViewerError) {
        log::error!("{}", error);
        self.startup_error = Some(error);
        event_loop.exit();
    }

    fn window_attributes(&self) -> WindowAttributes {
        let config = self.viewer.config();
        let (width, height) = config.initial_size;
        Window::default_attributes()
            .with_title(config.container_id.clone())
            .with_inner_size(LogicalSize::new(width, height))
            .with_transparent(true)
    }

    /// Resizes viewer and surface from a physical window size.
    fn resize(&mut self, size: PhysicalSize<u32>, scale_factor: f64) {
        let logical: LogicalSize<f64> = size.to_logical(scale_factor);
        let (width, height) = self
            .viewer
            .resize(logical.width, logical.height, scale_factor);
        if let Some(render_engine) = self.render_engine.as_mut() {
            render_engine.resize(width, height);
        }
    }

    fn pointer(&mut self, input: PointerInput) {
        self.viewer.handle_pointer(input, Instant::now());
    }

    fn touch(&mut self, touch: Touch, scale_factor: f64) {
        let location = touch.location.to_logical::<f32>(scale_factor);
        let (x, y) = (location.x, location.y);

        match touch.phase {
            TouchPhase::Started => {
                if self.active_touch.is_none() {
                    self.active_touch = Some(touch.id);
                    self.pointer(PointerInput::Down { x, y });
                }
            }
            TouchPhase::Moved if self.active_touch == Some(touch.id) => {
                self.pointer(PointerInput::Move { x, y });
            }
            TouchPhase::Ended if self.active_touch == Some(touch.id) => {
                self.active_touch = None;
                self.pointer(PointerInput::Up);
            }
            TouchPhase::Cancelled if self.active_touch == Some(touch.id) => {
                self.active_touch = None;
                self.pointer(PointerInput::Cancel);
            }
            _ => {}
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(render_engine) = self.render_engine.as_mut() else {
            return;
        };

        self.viewer.frame(Instant::now());
        render_engine.prepare(&mut self.viewer.scene);
        render_engine.update(&self.viewer.camera.uniform, &self.viewer.scene);

        match render_engine.render_frame(&self.viewer.scene) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                render_engine.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("out of GPU memory, exiting");
                event_loop.exit();
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("surface timeout, skipping frame");
            }
            Err(e) => {
                log::warn!("failed to acquire surface texture: {}", e);
            }
        }
    }
}

impl ApplicationHandler<AssetEvent> for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match event_loop.create_window(self.window_attributes()) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(event_loop, e.into());
                return;
            }
        };

        let scale_factor = window.scale_factor();
        let size = window.inner_size();
        let logical: LogicalSize<f64> = size.to_logical(scale_factor);
        let (width, height) = self
            .viewer
            .resize(logical.width, logical.height, scale_factor);

        let renderer = self.viewer.config().renderer.clone();
        let window_clone = window.clone();
        let render_engine = match pollster::block_on(async move {
            RenderEngine::new(window_clone, width, height, renderer).await
        }) {
            Ok(render_engine) => render_engine,
            Err(e) => {
                self.fail(event_loop, e);
                return;
            }
        };

        self.window = Some(window);
        self.render_engine = Some(render_engine);

        match spawn_loader(self.viewer.config().assets.clone(), self.proxy.clone()) {
            Ok(handle) => self.loader = Some(handle),
            Err(e) => log::error!("failed to start asset loader: {}", e),
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: AssetEvent) {
        self.viewer.apply_asset_event(event);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.clone() else {
            return;
        };
        let scale_factor = window.scale_factor();

        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            }
            | WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                self.resize(size, scale_factor);
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.resize(window.inner_size(), scale_factor);
            }
            WindowEvent::CursorMoved { position, .. } => {
                let position = position.to_logical::<f32>(scale_factor);
                self.cursor = (position.x, position.y);
                self.pointer(PointerInput::Move {
                    x: position.x,
                    y: position.y,
                });
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                let (x, y) = self.cursor;
                match state {
                    ElementState::Pressed => self.pointer(PointerInput::Down { x, y }),
                    ElementState::Released => self.pointer(PointerInput::Up),
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta_y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32,
                };
                if delta_y != 0.0 {
                    self.pointer(PointerInput::Wheel { delta_y });
                }
            }
            WindowEvent::Focused(false) => {
                self.viewer.focus_lost(Instant::now());
            }
            WindowEvent::Touch(touch) => {
                self.touch(touch, scale_factor);
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => (),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(handle) = self.loader.take() {
            if handle.is_finished() && handle.join().is_err() {
                log::warn!("asset loader panicked");
            }
        }
    }
}
