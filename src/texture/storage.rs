//! Texel storage layouts.
//!
//! All layouts hold packed 32-bit RGBA texels and answer `(x, y)` lookups
//! in O(1); they differ in how the 2D coordinate maps onto the 1D array:
//!
//! - [`Linear`](TextureStorage::Linear): plain row-major, `y * width + x`.
//! - [`Tiled`](TextureStorage::Tiled): 4x4 tiles stored contiguously, so a
//!   2D neighborhood spans fewer cache lines than row-major order.
//! - [`Swizzled`](TextureStorage::Swizzled): 32x32 blocks with Morton
//!   (Z-order) addressing inside each block. Bilinear sampling touches 2x2
//!   neighborhoods; the Z-order curve keeps those neighborhoods within a
//!   handful of cache lines at the cost of the index bit-twiddling.
//!
//! Refs: <https://fgiesen.wordpress.com/2011/01/17/texture-tiling-and-swizzling/>

/// Tile edge length of the tiled layout.
const TILE_DIM: u32 = 4;
/// Texels per tile (4x4).
const TILE_TEXELS: u32 = 16;
/// Block edge length of the swizzled layout.
const BLOCK_DIM: u32 = 32;
/// Texels per block (32x32).
const BLOCK_TEXELS: u32 = 1024;
/// log2 of the block edge.
const BLOCK_BITS: u32 = 5;

/// Which addressing strategy a texture level should use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TexelLayout {
    Linear,
    Tiled,
    #[default]
    Swizzled,
}

/// Interleave the low bits of x and y into a Z-order index within a block.
#[inline]
pub fn morton_encode(x: u32, y: u32) -> u32 {
    let mut index = 0;
    for bit in 0..BLOCK_BITS {
        index |= ((x >> bit) & 1) << (2 * bit);
        index |= ((y >> bit) & 1) << (2 * bit + 1);
    }
    index
}

/// Inverse of [`morton_encode`].
#[inline]
pub fn morton_decode(index: u32) -> (u32, u32) {
    let mut x = 0;
    let mut y = 0;
    for bit in 0..BLOCK_BITS {
        x |= ((index >> (2 * bit)) & 1) << bit;
        y |= ((index >> (2 * bit + 1)) & 1) << bit;
    }
    (x, y)
}

/// One immutable level of texel storage.
pub enum TextureStorage {
    Linear {
        width: u32,
        height: u32,
        texels: Vec<u32>,
    },
    Tiled {
        width: u32,
        height: u32,
        width_in_tiles: u32,
        texels: Vec<u32>,
    },
    Swizzled {
        width: u32,
        height: u32,
        width_in_blocks: u32,
        texels: Vec<u32>,
    },
}

impl TextureStorage {
    /// Pack tightly-packed RGBA bytes into the requested layout.
    pub fn new(layout: TexelLayout, rgba: &[u8], width: u32, height: u32) -> Self {
        debug_assert_eq!(rgba.len(), (width * height * 4) as usize);
        let mut storage = match layout {
            TexelLayout::Linear => Self::Linear {
                width,
                height,
                texels: vec![0; (width * height) as usize],
            },
            TexelLayout::Tiled => {
                let width_in_tiles = width.div_ceil(TILE_DIM);
                let height_in_tiles = height.div_ceil(TILE_DIM);
                Self::Tiled {
                    width,
                    height,
                    width_in_tiles,
                    texels: vec![0; (width_in_tiles * height_in_tiles * TILE_TEXELS) as usize],
                }
            }
            TexelLayout::Swizzled => {
                let width_in_blocks = width.div_ceil(BLOCK_DIM);
                let height_in_blocks = height.div_ceil(BLOCK_DIM);
                Self::Swizzled {
                    width,
                    height,
                    width_in_blocks,
                    texels: vec![0; (width_in_blocks * height_in_blocks * BLOCK_TEXELS) as usize],
                }
            }
        };

        for y in 0..height {
            for x in 0..width {
                let src = ((y * width + x) * 4) as usize;
                let texel = ((rgba[src] as u32) << 24)
                    | ((rgba[src + 1] as u32) << 16)
                    | ((rgba[src + 2] as u32) << 8)
                    | (rgba[src + 3] as u32);
                let index = storage.index(x, y);
                match &mut storage {
                    Self::Linear { texels, .. }
                    | Self::Tiled { texels, .. }
                    | Self::Swizzled { texels, .. } => texels[index] = texel,
                }
            }
        }
        storage
    }

    pub fn width(&self) -> u32 {
        match self {
            Self::Linear { width, .. }
            | Self::Tiled { width, .. }
            | Self::Swizzled { width, .. } => *width,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Linear { height, .. }
            | Self::Tiled { height, .. }
            | Self::Swizzled { height, .. } => *height,
        }
    }

    /// Number of texel slots allocated (tile/block layouts round up).
    pub fn capacity(&self) -> usize {
        match self {
            Self::Linear { texels, .. }
            | Self::Tiled { texels, .. }
            | Self::Swizzled { texels, .. } => texels.len(),
        }
    }

    /// Map a texel coordinate to its array index.
    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        match self {
            Self::Linear { width, .. } => (y * width + x) as usize,
            Self::Tiled { width_in_tiles, .. } => {
                let tile = (y / TILE_DIM) * width_in_tiles + (x / TILE_DIM);
                (tile * TILE_TEXELS + (y % TILE_DIM) * TILE_DIM + (x % TILE_DIM)) as usize
            }
            Self::Swizzled { width_in_blocks, .. } => {
                let block = (y >> BLOCK_BITS) * width_in_blocks + (x >> BLOCK_BITS);
                let within = morton_encode(x & (BLOCK_DIM - 1), y & (BLOCK_DIM - 1));
                (block * BLOCK_TEXELS + within) as usize
            }
        }
    }

    /// Read one packed texel.
    #[inline]
    pub fn read(&self, x: u32, y: u32) -> u32 {
        let index = self.index(x, y);
        match self {
            Self::Linear { texels, .. }
            | Self::Tiled { texels, .. }
            | Self::Swizzled { texels, .. } => texels[index],
        }
    }

    /// Read one texel as RGBA bytes.
    #[inline]
    pub fn read_rgba(&self, x: u32, y: u32) -> [u8; 4] {
        let texel = self.read(x, y);
        [
            (texel >> 24) as u8,
            (texel >> 16) as u8,
            (texel >> 8) as u8,
            texel as u8,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn gradient_rgba(width: u32, height: u32) -> Vec<u8> {
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                rgba.extend_from_slice(&[x as u8, y as u8, (x ^ y) as u8, 255]);
            }
        }
        rgba
    }

    #[test]
    fn test_morton_roundtrip() {
        for y in 0..BLOCK_DIM {
            for x in 0..BLOCK_DIM {
                let index = morton_encode(x, y);
                assert!(index < BLOCK_TEXELS);
                assert_eq!(morton_decode(index), (x, y));
            }
        }
    }

    #[test]
    fn test_morton_neighbors_stay_close() {
        // The first 2x2 quad occupies the first four slots.
        assert_eq!(morton_encode(0, 0), 0);
        assert_eq!(morton_encode(1, 0), 1);
        assert_eq!(morton_encode(0, 1), 2);
        assert_eq!(morton_encode(1, 1), 3);
    }

    #[test]
    fn test_linear_index_is_row_major() {
        let storage = TextureStorage::new(TexelLayout::Linear, &gradient_rgba(8, 4), 8, 4);
        assert_eq!(storage.index(3, 2), 19);
    }

    #[test]
    fn test_addressing_bijection_on_tile_multiples() {
        // Exact tile/block multiples: (x, y) -> index is a bijection onto
        // the full allocated range.
        for layout in [TexelLayout::Tiled, TexelLayout::Swizzled] {
            let (w, h) = (64, 32);
            let storage = TextureStorage::new(layout, &gradient_rgba(w, h), w, h);
            let mut seen = HashSet::new();
            for y in 0..h {
                for x in 0..w {
                    let index = storage.index(x, y);
                    assert!(index < storage.capacity());
                    assert!(seen.insert(index), "index {} hit twice", index);
                }
            }
            assert_eq!(seen.len(), storage.capacity());
        }
    }

    #[test]
    fn test_addressing_injective_on_partial_tiles() {
        for layout in [TexelLayout::Tiled, TexelLayout::Swizzled] {
            let (w, h) = (37, 21);
            let storage = TextureStorage::new(layout, &gradient_rgba(w, h), w, h);
            let mut seen = HashSet::new();
            for y in 0..h {
                for x in 0..w {
                    let index = storage.index(x, y);
                    assert!(index < storage.capacity());
                    assert!(seen.insert(index));
                }
            }
        }
    }

    #[test]
    fn test_read_returns_written_texels() {
        let (w, h) = (40, 40);
        let rgba = gradient_rgba(w, h);
        for layout in [TexelLayout::Linear, TexelLayout::Tiled, TexelLayout::Swizzled] {
            let storage = TextureStorage::new(layout, &rgba, w, h);
            for &(x, y) in &[(0, 0), (3, 7), (33, 2), (39, 39)] {
                assert_eq!(
                    storage.read_rgba(x, y),
                    [x as u8, y as u8, (x ^ y) as u8, 255],
                    "layout {:?} at ({}, {})",
                    layout,
                    x,
                    y
                );
            }
        }
    }
}
