//! Viewer configuration
//!
//! Every tunable of the viewer lives here as a plain struct with a `Default`
//! implementation. Asset paths are configuration constants; nothing is read
//! from the command line or from disk.

use std::path::PathBuf;
use std::time::Duration;

use cgmath::Vector3;

/// Identifier of the viewport container. Used as the window title.
pub const CONTAINER_ID: &str = "viewer";

/// Default environment image, relative to the working directory.
pub const HDR_PATH: &str = "./assets/hdri/mountain_1.hdr";

/// Default model file, relative to the working directory.
pub const GLB_PATH: &str = "./assets/models/rock-2.glb";

/// Largest bounding dimension a fitted model is scaled to.
pub const DEFAULT_TARGET_SIZE: f32 = 1.6;

/// Delay after the last interaction before idle rotation resumes.
pub const RESUME_DELAY: Duration = Duration::from_millis(900);

/// Top-level configuration for a [`crate::ModelViewer`].
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub container_id: String,
    /// Initial window size in logical pixels.
    pub initial_size: (u32, u32),
    pub assets: AssetPaths,
    pub renderer: RendererConfig,
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub lighting: LightingConfig,
    pub fit: FitConfig,
    pub idle: IdleConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            container_id: CONTAINER_ID.to_string(),
            initial_size: (1200, 800),
            assets: AssetPaths::default(),
            renderer: RendererConfig::default(),
            camera: CameraConfig::default(),
            controls: ControlsConfig::default(),
            lighting: LightingConfig::default(),
            fit: FitConfig::default(),
            idle: IdleConfig::default(),
        }
    }
}

/// The two assets the viewer loads, in load order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    pub environment: PathBuf,
    pub model: PathBuf,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            environment: PathBuf::from(HDR_PATH),
            model: PathBuf::from(GLB_PATH),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneMapping {
    None,
    AcesFilmic,
}

#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Enables 4x multisampling.
    pub antialias: bool,
    /// Upper bound applied to the window scale factor.
    pub pixel_ratio_cap: f64,
    pub tone_mapping: ToneMapping,
    pub exposure: f32,
    /// Premultiplied RGBA. Alpha 0 keeps the window background visible.
    pub clear_color: [f64; 4],
    /// Prefer an sRGB surface format so the output is gamma encoded.
    pub srgb_output: bool,
}

impl RendererConfig {
    pub const MSAA_SAMPLES: u32 = 4;

    pub fn sample_count(&self) -> u32 {
        if self.antialias {
            Self::MSAA_SAMPLES
        } else {
            1
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            antialias: true,
            pixel_ratio_cap: 2.0,
            tone_mapping: ToneMapping::AcesFilmic,
            exposure: 1.0,
            clear_color: [0.0, 0.0, 0.0, 0.0],
            srgb_output: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vector3<f32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 40.0,
            near: 0.1,
            far: 1000.0,
            position: Vector3::new(0.0, 1.2, 2.8),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControlsConfig {
    /// Panning is not implemented; `true` only produces a warning.
    pub enable_pan: bool,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub auto_rotate: bool,
    /// 1.0 is one full orbit per minute at 60 updates per second.
    pub auto_rotate_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            enable_pan: false,
            enable_damping: true,
            damping_factor: 0.07,
            rotate_speed: 0.8,
            zoom_speed: 1.0,
            auto_rotate: true,
            auto_rotate_speed: 0.6,
            min_distance: 0.6,
            max_distance: 8.0,
            min_polar_angle: 0.0,
            max_polar_angle: std::f32::consts::PI,
        }
    }
}

/// Fallback lights plus the environment multiplier.
///
/// Colours are given as sRGB hex values, the way artists pick them, and are
/// linearised before they reach the GPU.
#[derive(Debug, Clone)]
pub struct LightingConfig {
    pub hemisphere_sky: u32,
    pub hemisphere_ground: u32,
    pub hemisphere_intensity: f32,
    pub directional_color: u32,
    pub directional_intensity: f32,
    pub directional_position: Vector3<f32>,
    pub environment_intensity: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            hemisphere_sky: 0xffffff,
            hemisphere_ground: 0x444444,
            hemisphere_intensity: 0.4,
            directional_color: 0xffffff,
            directional_intensity: 0.6,
            directional_position: Vector3::new(5.0, 10.0, 7.5),
            environment_intensity: 1.0,
        }
    }
}

/// How the loaded model is moved onto the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CenteringMode {
    /// Bounding box centre lands on the origin after scaling.
    #[default]
    Recenter,
    /// `position += position - center`, scale applied afterwards.
    MirrorOffset,
}

#[derive(Debug, Clone)]
pub struct FitConfig {
    pub target_size: f32,
    pub centering: CenteringMode,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            centering: CenteringMode::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdleConfig {
    pub resume_delay: Duration,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            resume_delay: RESUME_DELAY,
        }
    }
}

/// Converts a `0xRRGGBB` sRGB colour to linear RGB.
pub fn hex_to_linear(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
    [channel(16), channel(8), channel(0)]
}

pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}
