//! The rasterization and shading pipeline.
//!
//! Data flows leaf to root: [`clipper`] turns clip-space triangles into
//! visible polygons, [`rasterizer`] scans them into multi-sample fragment
//! quads, [`pipeline`] orchestrates the two parallel stages, and
//! [`framebuffer`] holds the per-sample color/depth state they write.

pub mod clipper;
pub mod framebuffer;
pub mod pipeline;
pub mod rasterizer;
pub mod sampling;
pub mod vertex;

pub use framebuffer::FrameBuffer;
pub use pipeline::{DrawCall, SchedulerMode, PIPELINE_BATCH_SIZE};
pub use sampling::SAMPLE_COUNT;

/// Which screen-space winding to discard before rasterization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CullMode {
    Disabled,
    Front,
    #[default]
    Back,
}

/// How fragment alpha interacts with the framebuffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Opaque replace.
    #[default]
    Disabled,
    /// Source-over compositing; forces serial in-order scheduling.
    AlphaBlend,
    /// Thin the coverage mask by fragment alpha instead of blending.
    AlphaToCoverage,
}

/// Immutable per-draw-call render state.
#[derive(Clone, Copy, Debug)]
pub struct ShadingState {
    pub cull: CullMode,
    pub depth_test: bool,
    pub depth_write: bool,
    pub blend: BlendMode,
}

impl Default for ShadingState {
    fn default() -> Self {
        Self {
            cull: CullMode::default(),
            depth_test: true,
            depth_write: true,
            blend: BlendMode::default(),
        }
    }
}
