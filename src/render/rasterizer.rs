//! Edge-function triangle rasterization over 2x2 fragment quads.
//!
//! Each triangle edge defines a linear function `E(x, y) = I*x + J*y + K`
//! whose sign tells which side of the edge a point lies on; a sample is
//! inside the triangle when all three edge values are negative (vertices
//! are normalized to counter-clockwise order in the Y-down screen
//! convention first). The three functions are evaluated once at the
//! bounding-box corner and stepped incrementally — by two pixels, matching
//! the quad granularity — which keeps the inner loop to additions.
//!
//! Output is a sequence of [`FragmentQuad`]s: 2x2 blocks with at least one
//! covered member. Uncovered members are kept as sentinel placeholders so
//! the shading stage can still form finite-difference UV derivatives.
//!
//! Refs: Juan Pineda, "A Parallel Algorithm for Polygon Rasterization" (1988).

use crate::math::{Vec2i, Vec3};
use crate::render::sampling::{CoverageMask, SampleDepths, SAMPLE_OFFSETS};
use crate::render::vertex::{FragmentQuad, VertexAttributes, SENTINEL};

/// Twice the signed area of a screen-space triangle.
/// Positive = clockwise in Y-down screen coordinates.
#[inline]
pub(crate) fn signed_area(a: Vec2i, b: Vec2i, c: Vec2i) -> i32 {
    let e1 = b - a;
    let e2 = c - a;
    e1.x * e2.y - e1.y * e2.x
}

/// One screen-space edge function in `I*x + J*y + K` form.
#[derive(Clone, Copy)]
struct Edge {
    i: i32,
    j: i32,
    k: i32,
    /// Whether a sample exactly on this edge counts as covered. The two
    /// triangles sharing an edge see it with opposite orientations, so
    /// exactly one of them accepts the boundary — shared-edge samples are
    /// rasterized exactly once at every sample count.
    accepts_boundary: bool,
}

impl Edge {
    /// Edge from `a` to `b` of a CCW-ordered triangle. Interior points
    /// evaluate negative.
    fn new(a: Vec2i, b: Vec2i) -> Self {
        Self {
            i: a.y - b.y,
            j: b.x - a.x,
            k: a.x * b.y - a.y * b.x,
            // Top-left rule: left edges descend (b.y > a.y), top edges run
            // rightward along a scanline.
            accepts_boundary: b.y > a.y || (a.y == b.y && a.x < b.x),
        }
    }

    #[inline]
    fn eval(&self, x: i32, y: i32) -> i32 {
        self.i * x + self.j * y + self.k
    }

    /// Coverage test for an edge value at a sub-pixel sample.
    #[inline]
    fn covers(&self, e: f32) -> bool {
        e < 0.0 || (e == 0.0 && self.accepts_boundary)
    }
}

/// Rasterize a screen-projected triangle, appending 2x2 fragment quads to
/// `output`. Vertices may arrive in either winding; degenerate (zero-area)
/// triangles produce nothing.
pub fn rasterize(
    v0: &VertexAttributes,
    v1: &VertexAttributes,
    v2: &VertexAttributes,
    width: u32,
    height: u32,
    output: &mut Vec<FragmentQuad>,
) {
    let mut v = [*v0, *v1, *v2];

    // Normalize to CCW so interior edge values are uniformly negative.
    if signed_area(v[0].screen, v[1].screen, v[2].screen) > 0 {
        v.swap(1, 2);
    }

    let a = v[0].screen;
    let b = v[1].screen;
    let c = v[2].screen;

    let min_x = a.x.min(b.x).min(c.x).max(0);
    let min_y = a.y.min(b.y).min(c.y).max(0);
    let max_x = a.x.max(b.x).max(c.x).min(width as i32 - 1);
    let max_y = a.y.max(b.y).max(c.y).min(height as i32 - 1);
    if min_x > max_x || min_y > max_y {
        return;
    }

    let e01 = Edge::new(a, b);
    let e12 = Edge::new(b, c);
    let e20 = Edge::new(c, a);

    // The I and J terms cancel across the three edges, so this sum equals
    // the constant K01 + K12 + K20 = -2 * area. Zero means the vertices
    // collapsed onto a line or point.
    let delta = e01.eval(min_x, min_y) + e12.eval(min_x, min_y) + e20.eval(min_x, min_y);
    if delta == 0 {
        return;
    }
    let one_over_delta = 1.0 / delta as f32;

    // Screen-space barycentric weights at an arbitrary point; used only
    // for sentinel placeholders, which feed derivatives rather than
    // shading, so plain (non-perspective-weighted) screen interpolation
    // is sufficient.
    let barycentric_at = |x: f32, y: f32| -> Vec3 {
        let s0 = Vec3::new((c.x - a.x) as f32, (b.x - a.x) as f32, a.x as f32 - x);
        let s1 = Vec3::new((c.y - a.y) as f32, (b.y - a.y) as f32, a.y as f32 - y);
        let u = s0.cross(s1);
        if u.z.abs() < f32::EPSILON {
            return Vec3::new(1.0, 0.0, 0.0);
        }
        Vec3::new(1.0 - (u.x + u.y) / u.z, u.y / u.z, u.x / u.z)
    };

    // Per-sample coverage and depth at one pixel, given the three edge
    // values at its center. None when no sample is covered.
    let sample_pixel = |x: i32, y: i32, e: [i32; 3]| -> Option<(CoverageMask, SampleDepths)> {
        if x > max_x || y > max_y {
            return None;
        }
        let mut coverage = CoverageMask::splat(false);
        let mut depths = SampleDepths::splat(0.0);
        let mut any = false;
        for (s, offset) in SAMPLE_OFFSETS.iter().enumerate() {
            let s1 = e[0] as f32 + offset.x * e01.i as f32 + offset.y * e01.j as f32;
            let s2 = e[1] as f32 + offset.x * e12.i as f32 + offset.y * e12.j as f32;
            let s3 = e[2] as f32 + offset.x * e20.i as f32 + offset.y * e20.j as f32;
            if e01.covers(s1) && e12.covers(s2) && e20.covers(s3) {
                any = true;
                coverage[s] = true;
                let w = Vec3::new(s2, s3, s1) * one_over_delta;
                depths[s] =
                    VertexAttributes::barycentric_scalar(v[0].rhw, v[1].rhw, v[2].rhw, w);
            }
        }
        any.then_some((coverage, depths))
    };

    // Assemble one quad member: interpolated attributes for a covered
    // pixel, or a sentinel carrying screen-space lerp attributes.
    let member = |x: i32, y: i32, e: [i32; 3]| {
        match sample_pixel(x, y, e) {
            Some((coverage, depths)) => {
                let w = Vec3::new(e[1] as f32, e[2] as f32, e[0] as f32) * one_over_delta;
                let mut frag = VertexAttributes::barycentric_lerp(&v[0], &v[1], &v[2], w);
                frag.screen = Vec2i::new(x, y);
                frag.coverage = coverage;
                frag.depths = depths;
                frag
            }
            None => {
                let mut frag = VertexAttributes::barycentric_lerp(
                    &v[0],
                    &v[1],
                    &v[2],
                    barycentric_at(x as f32, y as f32),
                );
                frag.screen = SENTINEL;
                frag
            }
        }
    };

    let mut fy = [
        e01.eval(min_x, min_y),
        e12.eval(min_x, min_y),
        e20.eval(min_x, min_y),
    ];
    let step = [
        [e01.i, e12.i, e20.i], // +1 in x
        [e01.j, e12.j, e20.j], // +1 in y
    ];

    let mut y = min_y;
    while y <= max_y {
        let mut fx = fy;
        let mut x = min_x;
        while x <= max_x {
            let right = [fx[0] + step[0][0], fx[1] + step[0][1], fx[2] + step[0][2]];
            let down = [fx[0] + step[1][0], fx[1] + step[1][1], fx[2] + step[1][2]];
            let diag = [right[0] + step[1][0], right[1] + step[1][1], right[2] + step[1][2]];

            // A member is a sentinel exactly when none of its samples are
            // covered, so quads survive iff any member is non-sentinel.
            let fragments = [
                member(x, y, fx),
                member(x + 1, y, right),
                member(x, y + 1, down),
                member(x + 1, y + 1, diag),
            ];
            if fragments.iter().any(|f| !f.is_sentinel()) {
                output.push(FragmentQuad { fragments });
            }

            fx[0] += 2 * step[0][0];
            fx[1] += 2 * step[0][1];
            fx[2] += 2 * step[0][2];
            x += 2;
        }
        fy[0] += 2 * step[1][0];
        fy[1] += 2 * step[1][1];
        fy[2] += 2 * step[1][2];
        y += 2;
    }
}
