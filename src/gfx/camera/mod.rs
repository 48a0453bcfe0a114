pub mod camera_utils;
pub mod orbit_camera;
pub mod orbit_controls;

// Re-export main types
pub use camera_utils::CameraUniform;
pub use orbit_camera::PerspectiveCamera;
pub use orbit_controls::{ControlsEvent, OrbitControls};
