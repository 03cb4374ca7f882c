//! The renderer facade: double-buffered render targets, per-frame
//! matrices, and the draw-call entry point.
//!
//! Draw calls render into the back buffer. [`Renderer::present`] resolves
//! the back buffer, swaps it with the front buffer, and commits the front
//! buffer's resolved samples to a packed ARGB byte buffer for the
//! presentation layer, so presentation always reads a stable, fully
//! resolved image while the next frame renders into the other target.

use crate::math::{Mat4, Vec3, Vec4};
use crate::mesh::DrawMesh;
use crate::render::pipeline::{self, DrawCall};
use crate::render::FrameBuffer;
use crate::shader::{BoundShader, RenderContext};

const DEFAULT_FOV_DEGREES: f32 = 45.0;
const DEFAULT_NEAR: f32 = 0.1;
const DEFAULT_FAR: f32 = 100.0;

pub struct Renderer {
    width: u32,
    height: u32,
    back_buffer: FrameBuffer,
    front_buffer: FrameBuffer,
    committed: Vec<u32>,
    context: RenderContext,
    model_matrix: Mat4,
    view_matrix: Mat4,
    projection_matrix: Mat4,
    viewport_matrix: Mat4,
    near: f32,
    far: f32,
}

impl Renderer {
    pub fn new(width: u32, height: u32) -> Self {
        let aspect = width as f32 / height as f32;
        Self {
            width,
            height,
            back_buffer: FrameBuffer::new(width, height),
            front_buffer: FrameBuffer::new(width, height),
            committed: vec![0; (width * height) as usize],
            context: RenderContext::new(),
            model_matrix: Mat4::identity(),
            view_matrix: Mat4::identity(),
            projection_matrix: Mat4::perspective_lh(
                DEFAULT_FOV_DEGREES.to_radians(),
                aspect,
                DEFAULT_NEAR,
                DEFAULT_FAR,
            ),
            viewport_matrix: Mat4::viewport(width, height),
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Recreate the render targets for a new surface size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.back_buffer = FrameBuffer::new(width, height);
        self.front_buffer = FrameBuffer::new(width, height);
        self.committed = vec![0; (width * height) as usize];
        self.viewport_matrix = Mat4::viewport(width, height);
        let aspect = width as f32 / height as f32;
        self.projection_matrix =
            Mat4::perspective_lh(DEFAULT_FOV_DEGREES.to_radians(), aspect, self.near, self.far);
    }

    /// The texture/light registries and viewer state shared with shaders.
    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.context
    }

    pub fn set_model_matrix(&mut self, model: Mat4) {
        self.model_matrix = model;
    }

    pub fn set_view_matrix(&mut self, view: Mat4) {
        self.view_matrix = view;
    }

    pub fn set_projection_matrix(&mut self, projection: Mat4, near: f32, far: f32) {
        self.projection_matrix = projection;
        self.near = near;
        self.far = far;
    }

    pub fn set_viewer_pos(&mut self, viewer: Vec3) {
        self.context.viewer_pos = viewer;
    }

    pub fn set_exposure(&mut self, exposure: f32) {
        self.context.exposure = exposure;
    }

    pub fn clear_color(&mut self, color: Vec4) {
        self.back_buffer.clear_color(color);
    }

    pub fn clear_depth(&mut self, depth: f32) {
        self.back_buffer.clear_depth(depth);
    }

    pub fn clear(&mut self, color: Vec4) {
        self.back_buffer.clear(color, FrameBuffer::FAR_DEPTH);
    }

    /// Render one mesh into the back buffer. Returns the number of
    /// triangles submitted.
    pub fn draw(&mut self, mesh: &DrawMesh) -> usize {
        let shader = BoundShader::new(
            mesh.material,
            self.model_matrix,
            self.projection_matrix * self.view_matrix,
        );
        let draw = DrawCall {
            vertices: mesh.vertices(),
            indices: mesh.indices(),
            shader: &shader,
            context: &self.context,
            state: mesh.state,
            viewport: self.viewport_matrix,
            near: self.near,
            far: self.far,
        };
        pipeline::execute(&draw, &self.back_buffer);
        mesh.triangle_count()
    }

    /// Render a list of meshes in submission order.
    pub fn draw_all(&mut self, meshes: &[DrawMesh]) -> usize {
        meshes.iter().map(|mesh| self.draw(mesh)).sum()
    }

    /// Resolve the back buffer, swap it to the front, and commit the
    /// front buffer for presentation. Returns the committed ARGB8888
    /// bytes, row-major, one u32 word per pixel.
    pub fn present(&mut self) -> &[u8] {
        self.back_buffer.resolve();
        std::mem::swap(&mut self.back_buffer, &mut self.front_buffer);
        self.front_buffer.commit_to(&mut self.committed);
        self.frame_bytes()
    }

    /// The most recently committed frame.
    pub fn frame_bytes(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(
                self.committed.as_ptr() as *const u8,
                self.committed.len() * 4,
            )
        }
    }

    #[cfg(test)]
    fn committed_pixel(&self, x: u32, y: u32) -> u32 {
        self.committed[(y * self.width + x) as usize]
    }
}
