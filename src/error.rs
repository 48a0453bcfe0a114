//! Error types for the viewer
//!
//! Asset failures are reported and absorbed by the viewer; the remaining
//! variants only occur during start-up and are propagated to `main`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("failed to load environment image {}: {source}", path.display())]
    EnvironmentLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to load model {}: {source}", path.display())]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },

    #[error("model {} contains no renderable geometry", path.display())]
    EmptyModel { path: PathBuf },

    #[error("the model group already holds a model")]
    ModelGroupOccupied,

    #[error("no compatible graphics adapter")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create graphics device")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("failed to create window surface")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("event loop error")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("failed to create window")]
    Window(#[from] winit::error::OsError),
}

pub type Result<T, E = ViewerError> = std::result::Result<T, E>;
