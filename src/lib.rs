//! A CPU-resident multi-sample triangle rasterization engine.
//!
//! Triangles in clip-space homogeneous coordinates flow through a
//! two-stage parallel pipeline - clipping and edge-function rasterization
//! feed fragment shading and locked framebuffer writes - producing a
//! shaded, anti-aliased image without any GPU backend. SDL2 is used only
//! to present the committed frame.
//!
//! # Quick Start
//!
//! ```ignore
//! use softrast::prelude::*;
//!
//! let mut window = Window::new("My App", 800, 600)?;
//! let mut renderer = Renderer::new(800, 600);
//! let cube = DrawMesh::cube();
//! renderer.clear(Vec4::new(0.1, 0.1, 0.1, 1.0));
//! renderer.draw(&cube);
//! window.present(renderer.present())?;
//! ```

// Public API - exposed to library consumers
pub mod colors;
pub mod light;
pub mod math;
pub mod mesh;
pub mod renderer;
pub mod shader;
pub mod texture;
pub mod window;

// Internal modules - used within the crate only
pub(crate) mod render;

// Re-export commonly needed types at crate root for convenience
pub use light::Light;
pub use mesh::{DrawMesh, LoadError, MeshVertex};
pub use render::{BlendMode, CullMode, ShadingState, SAMPLE_COUNT};
pub use renderer::Renderer;
pub use shader::{Material, RenderContext, ShadingModel};
pub use texture::{FilterMode, TexelLayout, Texture, TextureError, WrapMode};

/// Prelude module for convenient imports.
///
/// # Example
/// ```ignore
/// use softrast::prelude::*;
/// ```
pub mod prelude {
    // Renderer
    pub use crate::renderer::Renderer;

    // Scene content
    pub use crate::light::Light;
    pub use crate::mesh::{DrawMesh, MeshVertex};
    pub use crate::shader::{Material, ShadingModel};
    pub use crate::texture::{FilterMode, Texture, WrapMode};

    // Render state
    pub use crate::render::{BlendMode, CullMode, ShadingState};

    // Math
    pub use crate::math::mat4::Mat4;
    pub use crate::math::vec2::Vec2;
    pub use crate::math::vec3::Vec3;
    pub use crate::math::vec4::Vec4;

    // Window & presentation
    pub use crate::window::{FrameLimiter, Window, WindowEvent};
}

/// Module exposing internals for benchmarking. Not part of the stable API.
pub mod bench {
    pub use crate::render::framebuffer::FrameBuffer;
    pub use crate::render::pipeline::{execute, DrawCall};
    pub use crate::render::rasterizer::rasterize;
    pub use crate::render::vertex::{FragmentQuad, VertexAttributes};
    pub use crate::shader::BoundShader;
}
