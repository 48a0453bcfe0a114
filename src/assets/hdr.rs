//! Equirectangular environment images

use std::path::Path;

use image::DynamicImage;

use crate::config::srgb_to_linear;
use crate::error::{Result, ViewerError};

/// Decoded panorama in linear RGB radiance, row 0 at the top.
#[derive(Clone, PartialEq)]
pub struct EnvironmentImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 3]>,
}

impl std::fmt::Debug for EnvironmentImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EnvironmentImage({}x{})", self.width, self.height)
    }
}

impl EnvironmentImage {
    /// Float images (Radiance HDR, OpenEXR) are already linear. Integer
    /// formats are treated as sRGB encoded.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        let linear = matches!(
            image,
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_)
        );
        let rgb = image.into_rgb32f();
        let (width, height) = rgb.dimensions();
        let pixels = rgb
            .pixels()
            .map(|p| {
                if linear {
                    p.0
                } else {
                    p.0.map(srgb_to_linear)
                }
            })
            .collect();

        Self {
            width,
            height,
            pixels,
        }
    }
}

pub fn load_environment(path: &Path) -> Result<EnvironmentImage> {
    let image = image::open(path).map_err(|source| ViewerError::EnvironmentLoad {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(EnvironmentImage::from_dynamic(image))
}
