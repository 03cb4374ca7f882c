//! 2D textures: decoding, mipmap construction, and filtered sampling.
//!
//! A texture owns an ordered chain of immutable [`TextureStorage`] levels,
//! full resolution first. With mipmaps enabled the source image is padded
//! to a square power of two (edge-clamped resample) so every 2x2 box-filter
//! halving divides evenly, down to a 2x2 level.

pub mod storage;

use std::fmt;
use std::path::Path;

use rayon::prelude::*;

use crate::math::{Vec2, Vec4};
pub use storage::{TexelLayout, TextureStorage};

/// Largest accepted texture edge; anything larger is a decode error
/// upstream or a corrupt header.
const MAX_TEXTURE_DIM: u32 = 65535;

/// How UV coordinates outside [0, 1] are remapped, per axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WrapMode {
    #[default]
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

/// Texel reconstruction filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Bilinear,
}

/// Texture creation failures. These are load-time hard errors; sampling
/// itself never fails.
#[derive(Debug)]
pub enum TextureError {
    Image(image::ImageError),
    InvalidDimensions { width: u32, height: u32 },
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(err) => write!(f, "image decode failed: {}", err),
            Self::InvalidDimensions { width, height } => {
                write!(f, "invalid texture dimensions {}x{}", width, height)
            }
        }
    }
}

impl std::error::Error for TextureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Image(err) => Some(err),
            Self::InvalidDimensions { .. } => None,
        }
    }
}

impl From<image::ImageError> for TextureError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err)
    }
}

/// An immutable 2D texture with optional mipmaps.
pub struct Texture {
    levels: Vec<TextureStorage>,
    wrap: WrapMode,
    filter: FilterMode,
    mipmapped: bool,
}

impl Texture {
    /// Decode an image file into a texture (PNG, JPG, ...).
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        wrap: WrapMode,
        filter: FilterMode,
        mipmaps: bool,
    ) -> Result<Self, TextureError> {
        let img = image::open(path)?.to_rgba8();
        let (width, height) = img.dimensions();
        Self::from_rgba(img.as_raw(), width, height, wrap, filter, mipmaps)
    }

    /// Build a texture from tightly-packed RGBA bytes using the default
    /// (Morton-swizzled) level layout.
    pub fn from_rgba(
        rgba: &[u8],
        width: u32,
        height: u32,
        wrap: WrapMode,
        filter: FilterMode,
        mipmaps: bool,
    ) -> Result<Self, TextureError> {
        Self::with_layout(rgba, width, height, wrap, filter, mipmaps, TexelLayout::default())
    }

    /// Build a texture with an explicit texel layout for its levels.
    pub fn with_layout(
        rgba: &[u8],
        width: u32,
        height: u32,
        wrap: WrapMode,
        filter: FilterMode,
        mipmaps: bool,
        layout: TexelLayout,
    ) -> Result<Self, TextureError> {
        if width == 0 || height == 0 || width > MAX_TEXTURE_DIM || height > MAX_TEXTURE_DIM {
            return Err(TextureError::InvalidDimensions { width, height });
        }
        let levels = if mipmaps {
            build_mip_chain(rgba, width, height, layout)
        } else {
            vec![TextureStorage::new(layout, rgba, width, height)]
        };
        Ok(Self {
            levels,
            wrap,
            filter,
            mipmapped: mipmaps,
        })
    }

    /// Width of the base level (after any power-of-two padding).
    pub fn width(&self) -> u32 {
        self.levels[0].width()
    }

    /// Height of the base level (after any power-of-two padding).
    pub fn height(&self) -> u32 {
        self.levels[0].height()
    }

    pub fn has_mipmaps(&self) -> bool {
        self.mipmapped
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, index: usize) -> &TextureStorage {
        &self.levels[index]
    }

    /// Sample the base level.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let (u, v) = self.wrap_uv(uv);
        self.filter_level(&self.levels[0], u, v)
    }

    /// Sample with a fractional level of detail, blending the two
    /// bracketing mip levels by the LOD fraction.
    pub fn sample_lod(&self, uv: Vec2, lod: f32) -> Vec4 {
        if !self.mipmapped {
            return self.sample(uv);
        }
        let lod = lod.max(0.0);
        let (u, v) = self.wrap_uv(uv);
        let last = self.levels.len() - 1;
        let lower = (lod as usize).min(last);
        let upper = (lower + 1).min(last);
        let near = self.filter_level(&self.levels[lower], u, v);
        if lower == upper {
            return near;
        }
        let far = self.filter_level(&self.levels[upper], u, v);
        near.lerp(far, lod.fract())
    }

    fn wrap_uv(&self, uv: Vec2) -> (f32, f32) {
        (self.wrap_coord(uv.x), self.wrap_coord(uv.y))
    }

    fn wrap_coord(&self, coord: f32) -> f32 {
        if (0.0..=1.0).contains(&coord) {
            return coord;
        }
        match self.wrap {
            WrapMode::Repeat => coord.rem_euclid(1.0),
            WrapMode::ClampToEdge => coord.clamp(0.0, 1.0),
            WrapMode::MirroredRepeat => {
                let period = coord.rem_euclid(2.0);
                if period > 1.0 {
                    2.0 - period
                } else {
                    period
                }
            }
        }
    }

    fn filter_level(&self, level: &TextureStorage, u: f32, v: f32) -> Vec4 {
        match self.filter {
            FilterMode::Nearest => {
                let x = (u * (level.width() - 1) as f32).round() as u32;
                let y = (v * (level.height() - 1) as f32).round() as u32;
                unpack(level.read_rgba(x.min(level.width() - 1), y.min(level.height() - 1)))
            }
            FilterMode::Bilinear => {
                let fx = u * (level.width() - 1) as f32;
                let fy = v * (level.height() - 1) as f32;
                let x0 = fx.floor() as u32;
                let y0 = fy.floor() as u32;
                let tx = fx - x0 as f32;
                let ty = fy - y0 as f32;
                let x1 = (x0 + 1).min(level.width() - 1);
                let y1 = (y0 + 1).min(level.height() - 1);
                let c00 = unpack(level.read_rgba(x0, y0));
                let c10 = unpack(level.read_rgba(x1, y0));
                let c01 = unpack(level.read_rgba(x0, y1));
                let c11 = unpack(level.read_rgba(x1, y1));
                c00.lerp(c10, tx).lerp(c01.lerp(c11, tx), ty)
            }
        }
    }
}

#[inline]
fn unpack(rgba: [u8; 4]) -> Vec4 {
    Vec4::new(
        rgba[0] as f32 / 255.0,
        rgba[1] as f32 / 255.0,
        rgba[2] as f32 / 255.0,
        rgba[3] as f32 / 255.0,
    )
}

/// Build the full mip chain: pad to a square power of two if needed, then
/// box-filter 2x2 -> 1 repeatedly until reaching a 2x2 level.
fn build_mip_chain(rgba: &[u8], width: u32, height: u32, layout: TexelLayout) -> Vec<TextureStorage> {
    let padded_dim = width.next_power_of_two().max(height.next_power_of_two());
    let (mut current, mut dim) = if padded_dim != width || padded_dim != height {
        (resample_to_square(rgba, width, height, padded_dim), padded_dim)
    } else {
        (rgba.to_vec(), width)
    };

    let mut levels = vec![TextureStorage::new(layout, &current, dim, dim)];
    while dim > 2 {
        let next_dim = dim / 2;
        let mut next = vec![0u8; (next_dim * next_dim * 4) as usize];
        next.par_chunks_mut(4).enumerate().for_each(|(i, texel)| {
            let x = (i as u32 % next_dim) * 2;
            let y = (i as u32 / next_dim) * 2;
            for ch in 0..4 {
                let sum = current[((y * dim + x) * 4 + ch as u32) as usize] as u32
                    + current[((y * dim + x + 1) * 4 + ch as u32) as usize] as u32
                    + current[(((y + 1) * dim + x) * 4 + ch as u32) as usize] as u32
                    + current[(((y + 1) * dim + x + 1) * 4 + ch as u32) as usize] as u32;
                texel[ch] = (sum / 4) as u8;
            }
        });
        levels.push(TextureStorage::new(layout, &next, next_dim, next_dim));
        current = next;
        dim = next_dim;
    }
    levels
}

/// Bilinear resample onto a square grid, clamping reads at the source
/// edges.
fn resample_to_square(rgba: &[u8], width: u32, height: u32, dim: u32) -> Vec<u8> {
    let read = |x: u32, y: u32, ch: usize| -> f32 {
        let x = x.min(width - 1);
        let y = y.min(height - 1);
        rgba[((y * width + x) * 4) as usize + ch] as f32
    };
    let mut out = vec![0u8; (dim * dim * 4) as usize];
    out.par_chunks_mut(4).enumerate().for_each(|(i, texel)| {
        let fx = (i as u32 % dim) as f32 / (dim - 1) as f32 * (width - 1) as f32;
        let fy = (i as u32 / dim) as f32 / (dim - 1) as f32 * (height - 1) as f32;
        let x0 = fx.floor() as u32;
        let y0 = fy.floor() as u32;
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;
        for (ch, out_ch) in texel.iter_mut().enumerate() {
            let top = read(x0, y0, ch) * (1.0 - tx) + read(x0 + 1, y0, ch) * tx;
            let bottom = read(x0, y0 + 1, ch) * (1.0 - tx) + read(x0 + 1, y0 + 1, ch) * tx;
            *out_ch = (top * (1.0 - ty) + bottom * ty) as u8;
        }
    });
    out
}
