//! The two-stage draw-call pipeline.
//!
//! Triangles are processed in fixed-size batches. Stage A (vertex shade ->
//! clip -> project -> cull -> rasterize) runs on a pool of workers that
//! claim face indices off a shared atomic counter; each claimed face fills
//! a batch-local slot keyed by its submission order and ships it over a
//! bounded channel. Stage B (perspective correction -> derivatives ->
//! fragment shade -> depth test -> alpha handling -> write) consumes
//! completed slots on its own workers, serializing framebuffer access with
//! the per-pixel locks.
//!
//! Scheduling obeys the blending contract: opaque and alpha-to-coverage
//! draws are order independent (the depth test commutes), so both stages
//! run fully parallel. True alpha blending composites later triangles over
//! earlier ones, so both stages run on the calling thread in strict
//! submission order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crossbeam_channel::bounded;

use crate::math::{Mat3, Mat4, Vec2, Vec2i, Vec3};
use crate::mesh::MeshVertex;
use crate::render::clipper::clip_triangle;
use crate::render::framebuffer::FrameBuffer;
use crate::render::rasterizer::{rasterize, signed_area};
use crate::render::sampling::SAMPLE_COUNT;
use crate::render::vertex::{FragmentAttributes, FragmentQuad, VertexAttributes};
use crate::render::{BlendMode, CullMode, ShadingState};
use crate::shader::{BoundShader, RenderContext};

/// Faces per pipeline batch.
pub const PIPELINE_BATCH_SIZE: usize = 512;

/// Stage-B slots allowed in flight per worker.
const IN_FLIGHT_SLOTS_PER_WORKER: usize = 4;

/// How the two stages are scheduled for a draw call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerMode {
    /// Order-independent: atomic work claiming, parallel shading.
    Parallel,
    /// Strict submission order on the calling thread.
    SerialInOrder,
}

impl SchedulerMode {
    /// Blending is the only non-commutative framebuffer operation.
    pub fn for_blend(blend: BlendMode) -> Self {
        match blend {
            BlendMode::AlphaBlend => Self::SerialInOrder,
            BlendMode::Disabled | BlendMode::AlphaToCoverage => Self::Parallel,
        }
    }
}

/// Everything one draw call needs, snapshotted before rendering starts.
pub struct DrawCall<'a> {
    pub vertices: &'a [MeshVertex],
    pub indices: &'a [u32],
    pub shader: &'a BoundShader,
    pub context: &'a RenderContext,
    pub state: ShadingState,
    pub viewport: Mat4,
    pub near: f32,
    pub far: f32,
}

/// Render one draw call into the framebuffer.
pub fn execute(draw: &DrawCall, framebuffer: &FrameBuffer) {
    let face_count = draw.indices.len() / 3;
    if face_count == 0 {
        return;
    }
    match SchedulerMode::for_blend(draw.state.blend) {
        SchedulerMode::SerialInOrder => {
            for face in 0..face_count {
                let quads = rasterize_face(draw, face, framebuffer.width(), framebuffer.height());
                shade_slot(draw, framebuffer, &quads);
            }
        }
        SchedulerMode::Parallel => execute_parallel(draw, framebuffer, face_count),
    }
}

/// Parallel scheduling: one batch at a time, two worker pools connected by
/// a bounded channel of completed slots.
fn execute_parallel(draw: &DrawCall, framebuffer: &FrameBuffer, face_count: usize) {
    let workers = thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    let width = framebuffer.width();
    let height = framebuffer.height();

    for batch_start in (0..face_count).step_by(PIPELINE_BATCH_SIZE) {
        let batch_end = (batch_start + PIPELINE_BATCH_SIZE).min(face_count);
        let next_face = AtomicUsize::new(batch_start);
        let (sender, receiver) =
            bounded::<(usize, Vec<FragmentQuad>)>(workers * IN_FLIGHT_SLOTS_PER_WORKER);

        thread::scope(|scope| {
            for _ in 0..workers {
                let sender = sender.clone();
                let next_face = &next_face;
                scope.spawn(move || loop {
                    let face = next_face.fetch_add(1, Ordering::Relaxed);
                    if face >= batch_end {
                        break;
                    }
                    let quads = rasterize_face(draw, face, width, height);
                    if !quads.is_empty() && sender.send((face - batch_start, quads)).is_err() {
                        break;
                    }
                });
            }
            // Senders must all be dropped for the receivers to terminate.
            drop(sender);

            for _ in 0..workers {
                let receiver = receiver.clone();
                scope.spawn(move || {
                    for (_slot, quads) in receiver.iter() {
                        shade_slot(draw, framebuffer, &quads);
                    }
                });
            }
        });
    }
}

/// Stage A for one face: vertex shade, clip, project, cull, rasterize.
fn rasterize_face(draw: &DrawCall, face: usize, width: u32, height: u32) -> Vec<FragmentQuad> {
    let mut corners = [VertexAttributes::new(Vec3::ZERO, Vec3::ZERO, Vec2::ZERO); 3];
    for (i, corner) in corners.iter_mut().enumerate() {
        let Some(&index) = draw.indices.get(face * 3 + i) else {
            return Vec::new();
        };
        let Some(vertex) = draw.vertices.get(index as usize) else {
            return Vec::new();
        };
        *corner = VertexAttributes::new(vertex.position, vertex.normal, vertex.texcoord);
        corner.tbn = Mat3::from_columns(vertex.tangent, vertex.bitangent, vertex.normal);
        draw.shader.vertex(corner);
    }

    let mut polygon = clip_triangle(&corners[0], &corners[1], &corners[2], draw.near, draw.far);
    if polygon.is_empty() {
        return Vec::new();
    }

    for vertex in &mut polygon {
        vertex.pre_perspective_correct();
        let screen = draw.viewport * vertex.clip_pos;
        vertex.screen = Vec2i::new((screen.x + 0.5) as i32, (screen.y + 0.5) as i32);
    }

    // Fan-triangulate the convex polygon and rasterize each triangle into
    // the same slot.
    let mut quads = Vec::new();
    for i in 1..polygon.len().saturating_sub(1) {
        let (v0, v1, v2) = (&polygon[0], &polygon[i], &polygon[i + 1]);
        if culled(v0.screen, v1.screen, v2.screen, draw.state.cull) {
            continue;
        }
        rasterize(v0, v1, v2, width, height, &mut quads);
    }
    quads
}

/// Screen-space face culling. Positive orientation is clockwise in the
/// Y-down convention, i.e. a back face.
fn culled(a: Vec2i, b: Vec2i, c: Vec2i, mode: CullMode) -> bool {
    match mode {
        CullMode::Disabled => false,
        CullMode::Back => signed_area(a, b, c) > 0,
        CullMode::Front => signed_area(a, b, c) < 0,
    }
}

/// Stage B for one completed slot.
fn shade_slot(draw: &DrawCall, framebuffer: &FrameBuffer, quads: &[FragmentQuad]) {
    for quad in quads {
        let mut quad = *quad;
        quad.perspective_correct_all();
        let (duv_dx, duv_dy) = quad.uv_derivatives();
        for fragment in &quad.fragments {
            shade_fragment(draw, framebuffer, fragment, duv_dx, duv_dy);
        }
    }
}

/// Shade one fragment and write it under the pixel lock.
///
/// Shading (texture sampling, lighting) happens before the lock is taken;
/// the critical section covers only the depth test and the sample writes.
fn shade_fragment(
    draw: &DrawCall,
    framebuffer: &FrameBuffer,
    fragment: &FragmentAttributes,
    duv_dx: Vec2,
    duv_dy: Vec2,
) {
    if fragment.is_sentinel() {
        return;
    }

    let color = draw.shader.fragment(draw.context, fragment, duv_dx, duv_dy);

    let mut coverage = fragment.coverage;
    if draw.state.blend == BlendMode::AlphaToCoverage && SAMPLE_COUNT >= 4 {
        // Thin the mask by alpha. Which samples get cancelled is a
        // don't-care; cancelling from slot 0 upward is commutative per
        // pixel up to sample assignment order.
        let cancelled = SAMPLE_COUNT - (SAMPLE_COUNT as f32 * color.w.clamp(0.0, 1.0)) as usize;
        if cancelled == SAMPLE_COUNT {
            return;
        }
        for s in 0..cancelled {
            coverage[s] = false;
        }
    }

    let Some(mut pixel) = framebuffer.lock_pixel(fragment.screen.x as u32, fragment.screen.y as u32)
    else {
        return;
    };

    if draw.state.depth_test {
        for s in 0..SAMPLE_COUNT {
            if coverage[s] && pixel.depth[s] >= fragment.depths[s] {
                coverage[s] = false;
            }
        }
    }
    if !coverage.any() {
        return;
    }

    match draw.state.blend {
        BlendMode::Disabled | BlendMode::AlphaToCoverage => {
            pixel.write_color_masked(color, &coverage)
        }
        BlendMode::AlphaBlend => pixel.blend_color_masked(color, &coverage),
    }
    if draw.state.depth_write {
        pixel.write_depth_masked(&fragment.depths, &coverage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Vec2, Vec3, Vec4};
    use crate::shader::{Material, ShadingModel};

    /// NDC position that lands on the given pixel of a 100x100 target.
    fn ndc(x: f32, y: f32) -> Vec3 {
        Vec3::new(x / 50.0 - 1.0, 1.0 - y / 50.0, 0.0)
    }

    fn screen_mesh(points: &[(f32, f32)]) -> (Vec<MeshVertex>, Vec<u32>) {
        let vertices = points
            .iter()
            .map(|&(x, y)| {
                MeshVertex::new(ndc(x, y), Vec3::new(0.0, 0.0, 1.0), Vec2::new(0.5, 0.5))
            })
            .collect();
        let indices = (0..points.len() as u32).collect();
        (vertices, indices)
    }

    fn draw_call<'a>(
        vertices: &'a [MeshVertex],
        indices: &'a [u32],
        shader: &'a BoundShader,
        context: &'a RenderContext,
        state: ShadingState,
    ) -> DrawCall<'a> {
        DrawCall {
            vertices,
            indices,
            shader,
            context,
            state,
            viewport: Mat4::viewport(100, 100),
            near: 0.1,
            far: 100.0,
        }
    }

    fn passthrough(emission: Vec3, model: ShadingModel, transparency: f32) -> BoundShader {
        // Identity matrices: vertex positions are already NDC.
        let material = Material {
            model,
            emission,
            transparency,
            ..Material::default()
        };
        BoundShader::new(material, Mat4::identity(), Mat4::identity())
    }

    #[test]
    fn test_end_to_end_coverage_and_resolve() {
        // Axis-aligned triangle fully inside a 100x100 target, depth test
        // off, opaque fill.
        let (vertices, indices) = screen_mesh(&[(10.0, 10.0), (50.0, 10.0), (10.0, 50.0)]);
        let shader = passthrough(Vec3::ONE, ShadingModel::Unlit, 1.0);
        let context = RenderContext::new();
        let state = ShadingState {
            cull: CullMode::Disabled,
            depth_test: false,
            depth_write: false,
            blend: BlendMode::Disabled,
        };
        let mut fb = FrameBuffer::new(100, 100);
        fb.clear(Vec4::new(0.0, 0.0, 0.0, 1.0), FrameBuffer::FAR_DEPTH);
        execute(&draw_call(&vertices, &indices, &shader, &context, state), &fb);

        // (11, 11) is covered; every sample carries the fill color.
        let covered = fb.read_color(11, 11, 0);
        assert_eq!(covered, [255, 255, 255, 255]);
        // (90, 90) is untouched.
        let clear = [0, 0, 0, 255];
        assert_eq!(fb.read_color(90, 90, 0), clear);

        fb.resolve();
        assert_eq!(fb.read_color(90, 90, 0), clear);
        assert_eq!(fb.read_color(11, 11, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn test_blend_order_is_submission_order() {
        // Two overlapping half-transparent triangles, A then B. At a pixel
        // covered by both, B must composite over A.
        let (a_vertices, a_indices) = screen_mesh(&[(5.0, 5.0), (80.0, 5.0), (5.0, 80.0)]);
        let (b_vertices, b_indices) = screen_mesh(&[(5.0, 5.0), (80.0, 5.0), (80.0, 80.0)]);
        let red = passthrough(Vec3::new(1.0, 0.0, 0.0), ShadingModel::AlphaBlend, 0.5);
        let blue = passthrough(Vec3::new(0.0, 0.0, 1.0), ShadingModel::AlphaBlend, 0.5);
        let context = RenderContext::new();
        let state = ShadingState {
            cull: CullMode::Disabled,
            depth_test: false,
            depth_write: false,
            blend: BlendMode::AlphaBlend,
        };
        let mut fb = FrameBuffer::new(100, 100);
        fb.clear(Vec4::new(0.0, 0.0, 0.0, 1.0), FrameBuffer::FAR_DEPTH);

        // Pixel (50, 20) lies in the overlap of the two triangles.
        execute(&draw_call(&a_vertices, &a_indices, &red, &context, state), &fb);
        execute(&draw_call(&b_vertices, &b_indices, &blue, &context, state), &fb);

        let [r, _, b, _] = fb.read_color(50, 20, 0);
        // red first: 0.5 red over black = 127; blue second halves it
        // again and contributes 127 blue on top.
        assert!(b > r, "expected blue over red, got r={} b={}", r, b);
        assert!((55..=75).contains(&r));
        assert!((115..=135).contains(&b));
    }

    #[test]
    fn test_blending_forces_serial_scheduling() {
        assert_eq!(
            SchedulerMode::for_blend(BlendMode::AlphaBlend),
            SchedulerMode::SerialInOrder
        );
        assert_eq!(
            SchedulerMode::for_blend(BlendMode::Disabled),
            SchedulerMode::Parallel
        );
        assert_eq!(
            SchedulerMode::for_blend(BlendMode::AlphaToCoverage),
            SchedulerMode::Parallel
        );
    }

    #[test]
    fn test_depth_test_keeps_nearer_geometry() {
        // Two full-screen triangles at different depths rendered with a
        // perspective projection; the farther one is drawn second and must
        // lose the depth test.
        let view_proj = Mat4::perspective_lh(60f32.to_radians(), 1.0, 0.1, 100.0);
        let near_tri = vec![
            MeshVertex::new(Vec3::new(-10.0, -10.0, 5.0), Vec3::new(0.0, 0.0, -1.0), Vec2::ZERO),
            MeshVertex::new(Vec3::new(10.0, -10.0, 5.0), Vec3::new(0.0, 0.0, -1.0), Vec2::ZERO),
            MeshVertex::new(Vec3::new(0.0, 10.0, 5.0), Vec3::new(0.0, 0.0, -1.0), Vec2::ZERO),
        ];
        let far_tri = vec![
            MeshVertex::new(Vec3::new(-20.0, -20.0, 9.0), Vec3::new(0.0, 0.0, -1.0), Vec2::ZERO),
            MeshVertex::new(Vec3::new(20.0, -20.0, 9.0), Vec3::new(0.0, 0.0, -1.0), Vec2::ZERO),
            MeshVertex::new(Vec3::new(0.0, 20.0, 9.0), Vec3::new(0.0, 0.0, -1.0), Vec2::ZERO),
        ];
        let indices = vec![0u32, 1, 2];
        let green = Material {
            model: ShadingModel::Unlit,
            emission: Vec3::new(0.0, 1.0, 0.0),
            ..Material::default()
        };
        let magenta = Material {
            model: ShadingModel::Unlit,
            emission: Vec3::new(1.0, 0.0, 1.0),
            ..Material::default()
        };
        let near_shader = BoundShader::new(green, Mat4::identity(), view_proj);
        let far_shader = BoundShader::new(magenta, Mat4::identity(), view_proj);
        let context = RenderContext::new();
        let state = ShadingState {
            cull: CullMode::Disabled,
            ..ShadingState::default()
        };

        let mut fb = FrameBuffer::new(100, 100);
        fb.clear(Vec4::new(0.0, 0.0, 0.0, 1.0), FrameBuffer::FAR_DEPTH);
        execute(
            &DrawCall {
                vertices: &near_tri,
                indices: &indices,
                shader: &near_shader,
                context: &context,
                state,
                viewport: Mat4::viewport(100, 100),
                near: 0.1,
                far: 100.0,
            },
            &fb,
        );
        execute(
            &DrawCall {
                vertices: &far_tri,
                indices: &indices,
                shader: &far_shader,
                context: &context,
                state,
                viewport: Mat4::viewport(100, 100),
                near: 0.1,
                far: 100.0,
            },
            &fb,
        );

        // Center of the screen: both triangles cover it, green is nearer.
        assert_eq!(fb.read_color(50, 50, 0), [0, 255, 0, 255]);
    }

    #[test]
    fn test_culling_drops_back_faces() {
        let (vertices, indices) = screen_mesh(&[(10.0, 10.0), (50.0, 10.0), (10.0, 50.0)]);
        let shader = passthrough(Vec3::ONE, ShadingModel::Unlit, 1.0);
        let context = RenderContext::new();

        // This vertex order is clockwise on screen (positive orientation
        // in Y-down coordinates), i.e. a back face: back culling drops it.
        let state = ShadingState {
            cull: CullMode::Back,
            depth_test: false,
            depth_write: false,
            blend: BlendMode::Disabled,
        };
        let mut fb = FrameBuffer::new(100, 100);
        fb.clear(Vec4::new(0.0, 0.0, 0.0, 1.0), FrameBuffer::FAR_DEPTH);
        execute(&draw_call(&vertices, &indices, &shader, &context, state), &fb);
        assert_eq!(fb.read_color(11, 11, 0), [0, 0, 0, 255]);

        // Front culling keeps the same face.
        let state = ShadingState {
            cull: CullMode::Front,
            ..state
        };
        execute(&draw_call(&vertices, &indices, &shader, &context, state), &fb);
        assert_eq!(fb.read_color(11, 11, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn test_fully_clipped_face_contributes_nothing() {
        // Entirely off to the right of the frustum.
        let (vertices, indices) = screen_mesh(&[(500.0, 10.0), (600.0, 10.0), (500.0, 80.0)]);
        let shader = passthrough(Vec3::ONE, ShadingModel::Unlit, 1.0);
        let context = RenderContext::new();
        let state = ShadingState {
            cull: CullMode::Disabled,
            depth_test: false,
            depth_write: false,
            blend: BlendMode::Disabled,
        };
        let mut fb = FrameBuffer::new(100, 100);
        fb.clear(Vec4::new(0.0, 0.0, 0.0, 1.0), FrameBuffer::FAR_DEPTH);
        execute(&draw_call(&vertices, &indices, &shader, &context, state), &fb);
        for &(x, y) in &[(10u32, 10u32), (50, 50), (99, 99)] {
            assert_eq!(fb.read_color(x, y, 0), [0, 0, 0, 255]);
        }
    }

    #[test]
    fn test_alpha_to_coverage_discards_transparent_fragments() {
        if SAMPLE_COUNT < 4 {
            return; // coverage thinning needs enough samples to matter
        }
        let (vertices, indices) = screen_mesh(&[(10.0, 10.0), (50.0, 10.0), (10.0, 50.0)]);
        // Alpha of 0.1 cancels every sample at 4x.
        let shader = passthrough(Vec3::ONE, ShadingModel::AlphaBlend, 0.1);
        let context = RenderContext::new();
        let state = ShadingState {
            cull: CullMode::Disabled,
            depth_test: false,
            depth_write: false,
            blend: BlendMode::AlphaToCoverage,
        };
        let mut fb = FrameBuffer::new(100, 100);
        fb.clear(Vec4::new(0.0, 0.0, 0.0, 1.0), FrameBuffer::FAR_DEPTH);
        execute(&draw_call(&vertices, &indices, &shader, &context, state), &fb);
        assert_eq!(fb.read_color(20, 20, 0), [0, 0, 0, 255]);
    }
}
