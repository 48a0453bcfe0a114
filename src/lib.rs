//! orbit_viewer
//!
//! A single-model glTF viewer built on wgpu and winit. The model is lit by an
//! HDR environment (with a hemisphere and a directional light as fallback),
//! fitted to a fixed size at the origin and shown through orbit controls that
//! rotate on their own whenever the user leaves them alone.

pub mod app;
pub mod assets;
pub mod config;
pub mod error;
pub mod gfx;
pub mod interaction;
pub mod viewer;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use app::ModelViewer;
pub use config::ViewerConfig;
pub use error::{Result, ViewerError};
pub use viewer::Viewer;

/// Opens the viewer window with the given configuration and blocks until it
/// is closed.
pub fn run(config: ViewerConfig) -> Result<()> {
    ModelViewer::new(config)?.run()
}
