//! Multi-sample framebuffer with per-pixel locking.
//!
//! Every pixel owns [`SAMPLE_COUNT`](crate::render::sampling::SAMPLE_COUNT)
//! color and depth samples, stored behind a per-pixel mutex so that
//! fragment-stage workers from different in-flight batches can write the
//! same coordinate without racing on depth/color state. Exclusive code
//! paths (clear, resolve, presentation commit) go through `get_mut` and
//! never touch the lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rayon::prelude::*;

use crate::colors;
use crate::math::Vec4;
use crate::render::sampling::{CoverageMask, SampleColors, SampleDepths, SAMPLE_COUNT};

/// The color and depth samples of one pixel.
#[derive(Clone, Copy)]
pub struct PixelState {
    pub color: SampleColors,
    pub depth: SampleDepths,
}

impl PixelState {
    /// Replace the color of every covered sample.
    pub fn write_color_masked(&mut self, color: Vec4, mask: &CoverageMask) {
        let bytes = colors::rgba_to_bytes(color);
        for s in 0..SAMPLE_COUNT {
            if mask[s] {
                self.color[s] = bytes;
            }
        }
    }

    /// Source-over blend the color into every covered sample.
    pub fn blend_color_masked(&mut self, color: Vec4, mask: &CoverageMask) {
        let bytes = colors::rgba_to_bytes(color);
        let src_alpha = color.w.clamp(0.0, 1.0);
        let dst_alpha = 1.0 - src_alpha;
        for s in 0..SAMPLE_COUNT {
            if mask[s] {
                for ch in 0..4 {
                    self.color[s][ch] = (src_alpha * bytes[ch] as f32
                        + dst_alpha * self.color[s][ch] as f32)
                        as u8;
                }
            }
        }
    }

    /// Store per-sample depth for every covered sample.
    pub fn write_depth_masked(&mut self, depths: &SampleDepths, mask: &CoverageMask) {
        for s in 0..SAMPLE_COUNT {
            if mask[s] {
                self.depth[s] = depths[s];
            }
        }
    }
}

/// N-sample color + depth storage for a render target.
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Mutex<PixelState>>,
    /// Set by pixel locking and clears; taken by resolve. Keeps repeated
    /// resolves from re-averaging their own slot-0 output.
    dirty: AtomicBool,
}

impl FrameBuffer {
    /// Depth value meaning "infinitely far" (depth is 1/w; w -> infinity).
    pub const FAR_DEPTH: f32 = 0.0;

    pub fn new(width: u32, height: u32) -> Self {
        let cleared = PixelState {
            color: SampleColors::splat(colors::BLACK),
            depth: SampleDepths::splat(Self::FAR_DEPTH),
        };
        Self {
            width,
            height,
            pixels: (0..width as usize * height as usize)
                .map(|_| Mutex::new(cleared))
                .collect(),
            dirty: AtomicBool::new(true),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Lock one pixel for a fragment-stage write. Returns `None` for
    /// out-of-bounds coordinates.
    pub fn lock_pixel(&self, x: u32, y: u32) -> Option<MutexGuard<'_, PixelState>> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.dirty.store(true, Ordering::Relaxed);
        let lock = &self.pixels[(y * self.width + x) as usize];
        // A poisoned lock means a worker died mid-write; the stored
        // samples are still consistent, so keep rendering.
        Some(lock.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Exclusive, lock-free access to one pixel.
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> Option<&mut PixelState> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = (y * self.width + x) as usize;
        Some(
            self.pixels[index]
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Read one depth sample. Out-of-bounds reads report "far".
    pub fn read_depth(&mut self, x: u32, y: u32, sample: usize) -> f32 {
        self.pixel_mut(x, y)
            .map(|p| p.depth[sample])
            .unwrap_or(Self::FAR_DEPTH)
    }

    /// Read one color sample. Out-of-bounds reads report white.
    pub fn read_color(&mut self, x: u32, y: u32, sample: usize) -> [u8; 4] {
        self.pixel_mut(x, y)
            .map(|p| p.color[sample])
            .unwrap_or(colors::WHITE)
    }

    pub fn clear_color(&mut self, color: Vec4) {
        let bytes = colors::rgba_to_bytes(color);
        self.dirty.store(true, Ordering::Relaxed);
        self.pixels.par_iter_mut().for_each(|pixel| {
            let state = pixel.get_mut().unwrap_or_else(PoisonError::into_inner);
            state.color = SampleColors::splat(bytes);
        });
    }

    pub fn clear_depth(&mut self, depth: f32) {
        self.dirty.store(true, Ordering::Relaxed);
        self.pixels.par_iter_mut().for_each(|pixel| {
            let state = pixel.get_mut().unwrap_or_else(PoisonError::into_inner);
            state.depth = SampleDepths::splat(depth);
        });
    }

    pub fn clear(&mut self, color: Vec4, depth: f32) {
        let bytes = colors::rgba_to_bytes(color);
        self.dirty.store(true, Ordering::Relaxed);
        self.pixels.par_iter_mut().for_each(|pixel| {
            let state = pixel.get_mut().unwrap_or_else(PoisonError::into_inner);
            state.color = SampleColors::splat(bytes);
            state.depth = SampleDepths::splat(depth);
        });
    }

    /// Box-filter every pixel's samples down to one color, stored in
    /// sample slot 0. Slots 1..N are left untouched; only slot 0 is read
    /// for presentation. Pixels are independent, so the sweep runs in
    /// parallel.
    ///
    /// With no writes since the previous resolve the call is a no-op,
    /// which keeps slot 0 stable across repeated resolves.
    pub fn resolve(&mut self) {
        if !self.dirty.swap(false, Ordering::Relaxed) {
            return;
        }
        self.pixels.par_iter_mut().for_each(|pixel| {
            let state = pixel.get_mut().unwrap_or_else(PoisonError::into_inner);
            let mut sum = [0.0f32; 4];
            for s in 0..SAMPLE_COUNT {
                for ch in 0..4 {
                    sum[ch] += state.color[s][ch] as f32;
                }
            }
            state.color[0] = [
                (sum[0] / SAMPLE_COUNT as f32) as u8,
                (sum[1] / SAMPLE_COUNT as f32) as u8,
                (sum[2] / SAMPLE_COUNT as f32) as u8,
                (sum[3] / SAMPLE_COUNT as f32) as u8,
            ];
        });
    }

    /// Pack every pixel's resolved sample 0 into ARGB8888 words for the
    /// presentation blit.
    pub fn commit_to(&mut self, out: &mut [u32]) {
        debug_assert_eq!(out.len(), (self.width * self.height) as usize);
        out.par_iter_mut()
            .zip(self.pixels.par_iter_mut())
            .for_each(|(word, pixel)| {
                let state = pixel.get_mut().unwrap_or_else(PoisonError::into_inner);
                *word = colors::pack_argb(state.color[0]);
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_mask() -> CoverageMask {
        CoverageMask::splat(true)
    }

    #[test]
    fn test_masked_write_touches_only_covered_samples() {
        let mut fb = FrameBuffer::new(4, 4);
        let mut mask = CoverageMask::splat(false);
        mask[0] = true;
        fb.lock_pixel(1, 1)
            .unwrap()
            .write_color_masked(Vec4::new(1.0, 0.0, 0.0, 1.0), &mask);
        assert_eq!(fb.read_color(1, 1, 0), [255, 0, 0, 255]);
        if SAMPLE_COUNT > 1 {
            assert_eq!(fb.read_color(1, 1, 1), colors::BLACK);
        }
    }

    #[test]
    fn test_blend_is_source_over() {
        let mut fb = FrameBuffer::new(2, 2);
        fb.clear_color(Vec4::new(0.0, 0.0, 1.0, 1.0));
        // 50% red over blue: half of each.
        fb.lock_pixel(0, 0)
            .unwrap()
            .blend_color_masked(Vec4::new(1.0, 0.0, 0.0, 0.5), &full_mask());
        let [r, _, b, _] = fb.read_color(0, 0, 0);
        assert!((126..=128).contains(&r));
        assert!((126..=128).contains(&b));
    }

    #[test]
    fn test_depth_write_and_read() {
        let mut fb = FrameBuffer::new(2, 2);
        let depths = SampleDepths::splat(0.5);
        fb.lock_pixel(1, 0)
            .unwrap()
            .write_depth_masked(&depths, &full_mask());
        assert_eq!(fb.read_depth(1, 0, 0), 0.5);
        assert_eq!(fb.read_depth(0, 0, 0), FrameBuffer::FAR_DEPTH);
    }

    #[test]
    fn test_out_of_bounds_access() {
        let mut fb = FrameBuffer::new(2, 2);
        assert!(fb.lock_pixel(2, 0).is_none());
        assert_eq!(fb.read_depth(5, 5, 0), FrameBuffer::FAR_DEPTH);
        assert_eq!(fb.read_color(5, 5, 0), colors::WHITE);
    }

    #[test]
    fn test_resolve_averages_samples_into_slot_0() {
        let mut fb = FrameBuffer::new(1, 1);
        if SAMPLE_COUNT > 1 {
            let mut mask = CoverageMask::splat(false);
            mask[0] = true;
            fb.lock_pixel(0, 0)
                .unwrap()
                .write_color_masked(Vec4::new(1.0, 1.0, 1.0, 1.0), &mask);
            fb.resolve();
            let expected = 255 / SAMPLE_COUNT as u32;
            let resolved = fb.read_color(0, 0, 0);
            assert!((resolved[0] as u32).abs_diff(expected) <= 1);
            // Slots past 0 are untouched by resolve.
            assert_eq!(fb.read_color(0, 0, 1), colors::BLACK);
        } else {
            fb.lock_pixel(0, 0)
                .unwrap()
                .write_color_masked(Vec4::new(1.0, 1.0, 1.0, 1.0), &full_mask());
            fb.resolve();
            assert_eq!(fb.read_color(0, 0, 0), [255, 255, 255, 255]);
        }
    }

    #[test]
    fn test_resolve_idempotent_without_writes() {
        let mut fb = FrameBuffer::new(2, 2);
        let mut mask = CoverageMask::splat(false);
        mask[0] = true;
        fb.lock_pixel(0, 0)
            .unwrap()
            .write_color_masked(Vec4::new(0.8, 0.4, 0.2, 1.0), &mask);
        fb.resolve();
        let first = fb.read_color(0, 0, 0);
        fb.resolve();
        let second = fb.read_color(0, 0, 0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_clear_resets_every_sample() {
        let mut fb = FrameBuffer::new(2, 2);
        fb.lock_pixel(0, 0)
            .unwrap()
            .write_color_masked(Vec4::ONE, &full_mask());
        fb.clear(Vec4::ZERO, FrameBuffer::FAR_DEPTH);
        for s in 0..SAMPLE_COUNT {
            assert_eq!(fb.read_color(0, 0, s), colors::BLACK);
            assert_eq!(fb.read_depth(0, 0, s), FrameBuffer::FAR_DEPTH);
        }
    }
}
