//! # Graphics Module
//!
//! Everything between loaded assets and pixels on the window surface.
//!
//! ## Architecture Overview
//!
//! - **Camera System** ([`camera`]) - Perspective camera and orbit controls with damping and idle rotation
//! - **Rendering Pipeline** ([`rendering`]) - Surface, MSAA targets and the physically based mesh pipelines
//! - **Scene Management** ([`scene`]) - Lights, the model group and model placement
//! - **Resource Management** ([`resources`]) - Materials, textures, the environment map and global uniforms
//!
//! The [`RenderEngine`] only reads the [`Scene`]; all scene mutation goes
//! through the viewer on the event loop thread.
//!
//! [`Scene`]: scene::Scene

pub mod camera;
pub mod rendering;
pub mod resources;
pub mod scene;

// Re-export commonly used types
pub use camera::{orbit_camera::PerspectiveCamera, orbit_controls::OrbitControls};
pub use rendering::render_engine::RenderEngine;
