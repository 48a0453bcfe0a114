//! Image based lighting from an equirectangular environment
//!
//! The environment is prefiltered once on the CPU into two parts:
//!
//! - nine spherical harmonic coefficients of the irradiance, already
//!   convolved with the clamped cosine lobe and divided by pi, so the diffuse
//!   term of a Lambert surface is `albedo * sh(normal)`;
//! - a radiance mip chain whose coarser levels stand in for rougher specular
//!   lobes.
//!
//! Directions map to texture coordinates with `u = atan2(z, x) / 2pi + 0.5`
//! and `v = asin(y) / pi + 0.5`; row 0 of every level is the top (`v = 1`).
//! The shader uses the same mapping.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Vector3};

use crate::assets::EnvironmentImage;
use crate::gfx::resources::texture_resource::{MipLevel, TextureResource};

pub const SH_COEFFICIENTS: usize = 9;

/// Texel format of the uploaded radiance chain.
pub const RADIANCE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgb9e5Ufloat;

// Cosine lobe convolution per band, divided by pi.
const BAND_FACTORS: [f32; 3] = [1.0, 2.0 / 3.0, 0.25];

/// One level of the radiance chain in linear RGB.
#[derive(Debug, Clone, PartialEq)]
pub struct RadianceLevel {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<[f32; 3]>,
}

impl RadianceLevel {
    pub fn texel(&self, x: u32, y: u32) -> [f32; 3] {
        self.texels[(y * self.width + x) as usize]
    }
}

/// Prefiltered environment lighting.
#[derive(Debug, Clone)]
pub struct EnvironmentMap {
    sh: [[f32; 3]; SH_COEFFICIENTS],
    levels: Vec<RadianceLevel>,
}

impl EnvironmentMap {
    pub const MAX_BASE_WIDTH: u32 = 256;
    pub const MIN_LEVEL_WIDTH: u32 = 8;

    pub fn from_equirect(image: &EnvironmentImage) -> Self {
        let sh = project_irradiance(image);

        let base_width = base_level_width(image.width);
        let base = box_resample(
            image.width,
            image.height,
            &image.pixels,
            base_width,
            base_width / 2,
        );

        let mut levels = vec![base];
        while let Some(last) = levels.last() {
            if last.width <= Self::MIN_LEVEL_WIDTH {
                break;
            }
            let next = box_resample(
                last.width,
                last.height,
                &last.texels,
                last.width / 2,
                (last.height / 2).max(1),
            );
            levels.push(next);
        }

        log::debug!(
            "prefiltered environment {}x{} into {} radiance levels",
            image.width,
            image.height,
            levels.len()
        );

        Self { sh, levels }
    }

    /// Irradiance coefficients, already divided by pi.
    pub fn irradiance_sh(&self) -> &[[f32; 3]; SH_COEFFICIENTS] {
        &self.sh
    }

    /// Evaluates the irradiance (over pi) arriving at a surface with `normal`.
    pub fn irradiance(&self, normal: Vector3<f32>) -> [f32; 3] {
        let basis = sh_basis(normal.normalize());
        let mut out = [0.0f32; 3];
        for (coeff, y) in self.sh.iter().zip(basis.iter()) {
            for c in 0..3 {
                out[c] += coeff[c] * y;
            }
        }
        out.map(|c| c.max(0.0))
    }

    pub fn levels(&self) -> &[RadianceLevel] {
        &self.levels
    }

    /// Highest mip level index, used to map roughness onto the chain.
    pub fn max_lod(&self) -> f32 {
        self.levels.len().saturating_sub(1) as f32
    }

    /// Uploads the radiance chain as an `Rgb9e5Ufloat` texture.
    pub fn upload(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> TextureResource {
        let packed: Vec<Vec<u32>> = self
            .levels
            .iter()
            .map(|level| level.texels.iter().map(|&t| pack_rgb9e5(t)).collect())
            .collect();
        let mips: Vec<MipLevel<'_>> = self
            .levels
            .iter()
            .zip(packed.iter())
            .map(|(level, data)| MipLevel {
                width: level.width,
                height: level.height,
                data: bytemuck::cast_slice(data),
            })
            .collect();

        TextureResource::create_mip_chain(device, queue, &mips, RADIANCE_FORMAT, "Environment")
    }

    /// Black 1x1 stand-in bound while no environment is installed.
    pub fn placeholder_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> TextureResource {
        let data = [0u32];
        let mips = [MipLevel {
            width: 1,
            height: 1,
            data: bytemuck::cast_slice(&data),
        }];
        TextureResource::create_mip_chain(device, queue, &mips, RADIANCE_FORMAT, "No Environment")
    }
}

/// Maps a unit direction to equirectangular coordinates in `[0, 1]`.
pub fn direction_to_equirect(dir: Vector3<f32>) -> (f32, f32) {
    let u = dir.z.atan2(dir.x) / (2.0 * PI) + 0.5;
    let v = dir.y.clamp(-1.0, 1.0).asin() / PI + 0.5;
    (u, v)
}

/// Direction through the centre of texel `(x, y)` of a `width x height` map.
pub fn texel_direction(x: u32, y: u32, width: u32, height: u32) -> Vector3<f32> {
    let u = (x as f32 + 0.5) / width as f32;
    let v = 1.0 - (y as f32 + 0.5) / height as f32;
    let lon = (u - 0.5) * 2.0 * PI;
    let lat = (v - 0.5) * PI;
    Vector3::new(lat.cos() * lon.cos(), lat.sin(), lat.cos() * lon.sin())
}

fn sh_basis(d: Vector3<f32>) -> [f32; SH_COEFFICIENTS] {
    [
        0.282_095,
        0.488_603 * d.y,
        0.488_603 * d.z,
        0.488_603 * d.x,
        1.092_548 * d.x * d.y,
        1.092_548 * d.y * d.z,
        0.315_392 * (3.0 * d.z * d.z - 1.0),
        1.092_548 * d.x * d.z,
        0.546_274 * (d.x * d.x - d.y * d.y),
    ]
}

fn band(index: usize) -> usize {
    match index {
        0 => 0,
        1..=3 => 1,
        _ => 2,
    }
}

fn project_irradiance(image: &EnvironmentImage) -> [[f32; 3]; SH_COEFFICIENTS] {
    let mut sh = [[0.0f32; 3]; SH_COEFFICIENTS];
    if image.width == 0 || image.height == 0 {
        return sh;
    }

    let texel_area = (2.0 * PI / image.width as f32) * (PI / image.height as f32);
    for y in 0..image.height {
        for x in 0..image.width {
            let dir = texel_direction(x, y, image.width, image.height);
            // cos(latitude) is the horizontal extent of the direction.
            let weight = texel_area * (dir.x * dir.x + dir.z * dir.z).sqrt();
            let radiance = image.pixels[(y * image.width + x) as usize];
            for (coeff, basis) in sh.iter_mut().zip(sh_basis(dir)) {
                for c in 0..3 {
                    coeff[c] += radiance[c] * basis * weight;
                }
            }
        }
    }

    for (i, coeff) in sh.iter_mut().enumerate() {
        let factor = BAND_FACTORS[band(i)];
        for c in coeff.iter_mut() {
            *c *= factor;
        }
    }
    sh
}

fn base_level_width(source_width: u32) -> u32 {
    let capped = source_width.min(EnvironmentMap::MAX_BASE_WIDTH);
    let pow2 = if capped == 0 {
        0
    } else {
        1 << (31 - capped.leading_zeros())
    };
    pow2.max(EnvironmentMap::MIN_LEVEL_WIDTH)
}

/// Averages every source texel covered by each destination texel. Falls back
/// to nearest sampling when the destination is larger than the source.
fn box_resample(
    src_width: u32,
    src_height: u32,
    src: &[[f32; 3]],
    width: u32,
    height: u32,
) -> RadianceLevel {
    let mut texels = Vec::with_capacity((width * height) as usize);
    if src_width == 0 || src_height == 0 {
        texels.resize((width * height) as usize, [0.0; 3]);
        return RadianceLevel {
            width,
            height,
            texels,
        };
    }

    let span = |i: u32, dst: u32, src_len: u32| {
        let start = (i as u64 * src_len as u64 / dst as u64) as u32;
        let end = ((i as u64 + 1) * src_len as u64 / dst as u64) as u32;
        (start.min(src_len - 1), end.max(start + 1).min(src_len))
    };

    for y in 0..height {
        let (y0, y1) = span(y, height, src_height);
        for x in 0..width {
            let (x0, x1) = span(x, width, src_width);
            let mut sum = [0.0f32; 3];
            for sy in y0..y1 {
                for sx in x0..x1 {
                    let t = src[(sy * src_width + sx) as usize];
                    sum[0] += t[0];
                    sum[1] += t[1];
                    sum[2] += t[2];
                }
            }
            let n = ((y1 - y0) * (x1 - x0)).max(1) as f32;
            texels.push(sum.map(|c| c / n));
        }
    }

    RadianceLevel {
        width,
        height,
        texels,
    }
}

const RGB9E5_MANTISSA_BITS: i32 = 9;
const RGB9E5_EXP_BIAS: i32 = 15;
const RGB9E5_MAX_EXP: i32 = 31;
const RGB9E5_MAX: f32 = 65408.0;

/// Packs linear RGB into the shared exponent `Rgb9e5Ufloat` layout.
pub fn pack_rgb9e5(rgb: [f32; 3]) -> u32 {
    let [r, g, b] = rgb.map(|c| c.max(0.0).min(RGB9E5_MAX));
    let max_c = r.max(g).max(b);
    if max_c <= 0.0 {
        return 0;
    }

    let mut exp_shared =
        (max_c.log2().floor() as i32).max(-RGB9E5_EXP_BIAS - 1) + 1 + RGB9E5_EXP_BIAS;
    let mut denom = 2f32.powi(exp_shared - RGB9E5_EXP_BIAS - RGB9E5_MANTISSA_BITS);
    if (max_c / denom + 0.5).floor() as u32 == 1 << RGB9E5_MANTISSA_BITS {
        denom *= 2.0;
        exp_shared += 1;
    }
    let exp_shared = exp_shared.min(RGB9E5_MAX_EXP) as u32;

    let mantissa = |c: f32| ((c / denom + 0.5).floor() as u32).min(511);
    mantissa(r) | (mantissa(g) << 9) | (mantissa(b) << 18) | (exp_shared << 27)
}

pub fn unpack_rgb9e5(packed: u32) -> [f32; 3] {
    let exp = (packed >> 27) as i32;
    let scale = 2f32.powi(exp - RGB9E5_EXP_BIAS - RGB9E5_MANTISSA_BITS);
    [
        (packed & 0x1ff) as f32 * scale,
        ((packed >> 9) & 0x1ff) as f32 * scale,
        ((packed >> 18) & 0x1ff) as f32 * scale,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_image(width: u32, height: u32, value: [f32; 3]) -> EnvironmentImage {
        EnvironmentImage {
            width,
            height,
            pixels: vec![value; (width * height) as usize],
        }
    }

    fn assert_close(a: [f32; 3], b: [f32; 3], eps: f32) {
        for c in 0..3 {
            assert!((a[c] - b[c]).abs() < eps, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_uniform_environment_irradiance_equals_radiance() {
        let env = EnvironmentMap::from_equirect(&uniform_image(128, 64, [0.5, 1.0, 2.0]));
        for normal in [
            Vector3::unit_x(),
            Vector3::unit_y(),
            -Vector3::unit_y(),
            Vector3::new(1.0, -1.0, 0.5),
        ] {
            assert_close(env.irradiance(normal), [0.5, 1.0, 2.0], 0.02);
        }
    }

    #[test]
    fn test_bright_sky_lights_upward_normals() {
        // Top half white, bottom half black.
        let mut image = uniform_image(64, 32, [0.0; 3]);
        for texel in image.pixels.iter_mut().take(64 * 16) {
            *texel = [1.0; 3];
        }
        let env = EnvironmentMap::from_equirect(&image);

        let up = env.irradiance(Vector3::unit_y())[0];
        let down = env.irradiance(-Vector3::unit_y())[0];
        let side = env.irradiance(Vector3::unit_x())[0];
        assert!(up > 0.9);
        assert!(down < 0.1);
        assert!((side - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_mip_chain_halves_down_to_min_width() {
        let env = EnvironmentMap::from_equirect(&uniform_image(1024, 512, [1.0; 3]));
        let widths: Vec<u32> = env.levels().iter().map(|l| l.width).collect();
        assert_eq!(widths, vec![256, 128, 64, 32, 16, 8]);
        for level in env.levels() {
            assert_eq!(level.height * 2, level.width);
            assert_eq!(level.texels.len(), (level.width * level.height) as usize);
        }
        assert_eq!(env.max_lod(), 5.0);
    }

    #[test]
    fn test_small_source_is_resampled_to_minimum() {
        let env = EnvironmentMap::from_equirect(&uniform_image(4, 2, [0.25; 3]));
        assert_eq!(env.levels().len(), 1);
        assert_eq!(env.levels()[0].width, 8);
        assert_close(env.levels()[0].texel(7, 3), [0.25; 3], 1e-6);
    }

    #[test]
    fn test_box_downsample_averages() {
        let src = [[0.0; 3], [1.0; 3], [2.0; 3], [3.0; 3]];
        let level = box_resample(2, 2, &src, 1, 1);
        assert_close(level.texel(0, 0), [1.5; 3], 1e-6);
    }

    #[test]
    fn test_direction_mapping_round_trips_through_texels() {
        let (u, v) = direction_to_equirect(texel_direction(10, 3, 64, 32));
        assert!((u - 10.5 / 64.0).abs() < 1e-5);
        assert!((v - (1.0 - 3.5 / 32.0)).abs() < 1e-5);

        let (_, v_up) = direction_to_equirect(Vector3::unit_y());
        assert!((v_up - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rgb9e5_packing() {
        assert_eq!(pack_rgb9e5([0.0; 3]), 0);
        assert_eq!(pack_rgb9e5([-1.0, f32::NAN, 0.0]), 0);

        let one = pack_rgb9e5([1.0, 1.0, 1.0]);
        assert_eq!(one, 256 | (256 << 9) | (256 << 18) | (16 << 27));
        assert_eq!(unpack_rgb9e5(one), [1.0, 1.0, 1.0]);

        let hdr = unpack_rgb9e5(pack_rgb9e5([300.0, 2.0, 0.5]));
        assert!((hdr[0] - 300.0).abs() / 300.0 < 0.01);
        assert!((hdr[1] - 2.0).abs() < 0.5);

        let clamped = unpack_rgb9e5(pack_rgb9e5([1.0e9, 0.0, 0.0]));
        assert_eq!(clamped[0], RGB9E5_MAX);
    }
}
