//! Homogeneous clip-space triangle clipping.
//!
//! Clipping runs after projection, before the perspective divide. The clip
//! volume is `-w <= x, y, z <= w`; a final pass against a small positive-w
//! plane protects the later 1/w division. That pass must come after the six
//! frustum passes: interpolating across the w sign change is only
//! meaningful once x/y/z already agree with w's sign convention.

use crate::render::vertex::VertexAttributes;

/// Smallest w kept by the final clipping pass.
pub const W_CLIP_EPSILON: f32 = 1e-5;

/// The clip planes, each a linear inequality on (x, y, z, w).
#[derive(Clone, Copy, Debug)]
enum ClipPlane {
    /// x >= -w
    Left,
    /// x <= w
    Right,
    /// y >= -w
    Bottom,
    /// y <= w
    Top,
    /// z >= -w
    Near,
    /// z <= w
    Far,
    /// w >= epsilon, guarding the perspective divide
    PositiveW,
}

/// The six frustum half-spaces, excluding the w guard.
const FRUSTUM_PLANES: [ClipPlane; 6] = [
    ClipPlane::Left,
    ClipPlane::Right,
    ClipPlane::Bottom,
    ClipPlane::Top,
    ClipPlane::Near,
    ClipPlane::Far,
];

impl ClipPlane {
    /// Signed distance from a vertex to this plane.
    /// Positive = inside the clip volume, negative = outside.
    fn signed_distance(&self, v: &VertexAttributes) -> f32 {
        let p = v.clip_pos;
        match self {
            Self::Left => p.w + p.x,
            Self::Right => p.w - p.x,
            Self::Bottom => p.w + p.y,
            Self::Top => p.w - p.y,
            Self::Near => p.w + p.z,
            Self::Far => p.w - p.z,
            Self::PositiveW => p.w - W_CLIP_EPSILON,
        }
    }
}

/// Clip a triangle against the view frustum, returning the vertices of the
/// visible convex polygon in order (3 to 7 vertices), or an empty vector if
/// the triangle is entirely outside.
///
/// `near`/`far` bound the homogeneous w of the trivial-accept test (w equals
/// view depth under the projection convention used here).
pub fn clip_triangle(
    v0: &VertexAttributes,
    v1: &VertexAttributes,
    v2: &VertexAttributes,
    near: f32,
    far: f32,
) -> Vec<VertexAttributes> {
    let vertices = [v0, v1, v2];

    // Trivial accept: every vertex inside every half-space.
    let fully_inside = vertices.iter().all(|v| {
        let p = v.clip_pos;
        p.x.abs() <= p.w && p.y.abs() <= p.w && p.z.abs() <= p.w && p.w >= near && p.w <= far
    });
    if fully_inside {
        return vec![*v0, *v1, *v2];
    }

    // Trivial reject: every vertex outside a single half-space. Each plane
    // is tested independently; one full-outside plane is enough.
    for plane in FRUSTUM_PLANES {
        if vertices.iter().all(|v| plane.signed_distance(v) < 0.0) {
            return Vec::new();
        }
    }

    // Sutherland-Hodgeman: each pass consumes the previous polygon.
    let mut polygon = vec![*v0, *v1, *v2];
    for plane in FRUSTUM_PLANES.iter().chain([ClipPlane::PositiveW].iter()) {
        if polygon.len() < 3 {
            return Vec::new();
        }
        polygon = clip_against_plane(&polygon, *plane);
    }

    if polygon.len() < 3 {
        Vec::new()
    } else {
        polygon
    }
}

/// One Sutherland-Hodgeman pass: walk the polygon edges and keep the part
/// on the inner side of the plane, inserting intersection vertices at sign
/// changes.
fn clip_against_plane(polygon: &[VertexAttributes], plane: ClipPlane) -> Vec<VertexAttributes> {
    let mut output = Vec::with_capacity(polygon.len() + 1);

    for i in 0..polygon.len() {
        let current = &polygon[i];
        let next = &polygon[(i + 1) % polygon.len()];

        let d1 = plane.signed_distance(current);
        let d2 = plane.signed_distance(next);

        let current_inside = d1 >= 0.0;
        let next_inside = d2 >= 0.0;

        if current_inside {
            output.push(*current);
        }
        if current_inside != next_inside {
            // Zero-length edges have d1 == d2; skipping the intersection
            // keeps the division from producing NaN.
            let denom = d1 - d2;
            if denom.abs() > f32::EPSILON {
                output.push(current.lerp(next, d1 / denom));
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Vec2, Vec3, Vec4};
    use approx::assert_relative_eq;

    fn clip_vertex(x: f32, y: f32, z: f32, w: f32) -> VertexAttributes {
        let mut v = VertexAttributes::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0), Vec2::ZERO);
        v.clip_pos = Vec4::new(x, y, z, w);
        v
    }

    #[test]
    fn test_fully_inside_passes_through_unchanged() {
        let v0 = clip_vertex(0.0, 0.0, 0.0, 1.0);
        let v1 = clip_vertex(0.5, 0.0, 0.0, 1.0);
        let v2 = clip_vertex(0.0, 0.5, 0.0, 1.0);
        let result = clip_triangle(&v0, &v1, &v2, 0.1, 100.0);
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].clip_pos, v0.clip_pos);
        assert_eq!(result[1].clip_pos, v1.clip_pos);
        assert_eq!(result[2].clip_pos, v2.clip_pos);
    }

    #[test]
    fn test_fully_outside_one_plane_rejects() {
        // All three have x > w: outside the right plane.
        let v0 = clip_vertex(2.0, 0.0, 0.0, 1.0);
        let v1 = clip_vertex(3.0, 0.5, 0.0, 1.0);
        let v2 = clip_vertex(2.5, -0.5, 0.0, 1.0);
        assert!(clip_triangle(&v0, &v1, &v2, 0.1, 100.0).is_empty());
    }

    #[test]
    fn test_one_vertex_clipped_yields_quad() {
        // v1 pokes out of the right plane; the polygon gains a vertex.
        let v0 = clip_vertex(0.0, 0.0, 0.0, 1.0);
        let v1 = clip_vertex(2.0, 0.0, 0.0, 1.0);
        let v2 = clip_vertex(0.0, 0.5, 0.0, 1.0);
        let result = clip_triangle(&v0, &v1, &v2, 0.1, 100.0);
        assert_eq!(result.len(), 4);
        for v in &result {
            assert!(v.clip_pos.x <= v.clip_pos.w + 1e-5);
        }
    }

    #[test]
    fn test_intersection_point_on_plane() {
        let v0 = clip_vertex(0.0, 0.0, 0.0, 1.0);
        let v1 = clip_vertex(2.0, 0.0, 0.0, 1.0);
        let v2 = clip_vertex(0.0, 0.5, 0.0, 1.0);
        let result = clip_triangle(&v0, &v1, &v2, 0.1, 100.0);
        // The vertices introduced by clipping sit exactly on x = w.
        let introduced: Vec<_> = result
            .iter()
            .filter(|v| (v.clip_pos.x - v.clip_pos.w).abs() < 1e-5)
            .collect();
        assert_eq!(introduced.len(), 2);
        for v in introduced {
            assert_relative_eq!(v.clip_pos.x, 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_negative_w_triangle_clipped_away() {
        // Behind the eye: w < 0 everywhere, so w + x < 0 for every vertex
        // and the left-plane trivial reject fires.
        let v0 = clip_vertex(0.0, 0.0, 0.0, -1.0);
        let v1 = clip_vertex(0.1, 0.0, 0.0, -1.0);
        let v2 = clip_vertex(0.0, 0.1, 0.0, -2.0);
        assert!(clip_triangle(&v0, &v1, &v2, 0.1, 100.0).is_empty());
    }

    #[test]
    fn test_attributes_interpolate_at_clip_boundary() {
        let mut v0 = clip_vertex(0.0, 0.0, 0.0, 1.0);
        v0.texcoord = Vec2::new(0.0, 0.0);
        let mut v1 = clip_vertex(3.0, 0.0, 0.0, 1.0);
        v1.texcoord = Vec2::new(1.0, 0.0);
        let mut v2 = clip_vertex(0.0, 0.5, 0.0, 1.0);
        v2.texcoord = Vec2::new(0.0, 1.0);
        let result = clip_triangle(&v0, &v1, &v2, 0.1, 100.0);
        // The v0->v1 edge crosses x = w at t = 1/3.
        let boundary = result
            .iter()
            .find(|v| (v.clip_pos.x - 1.0).abs() < 1e-5 && v.clip_pos.y == 0.0)
            .expect("clipped vertex on the right plane");
        assert_relative_eq!(boundary.texcoord.x, 1.0 / 3.0, epsilon = 1e-5);
    }
}
