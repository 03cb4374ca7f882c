//! Interpolatable vertex and fragment attributes.
//!
//! A [`VertexAttributes`] travels from the vertex shader through clipping
//! and projection; the rasterizer combines three of them barycentrically
//! into [`FragmentAttributes`]. Attribute interpolation is perspective
//! correct: before rasterization every attribute is pre-divided by the
//! homogeneous w ([`VertexAttributes::pre_perspective_correct`]) and after
//! interpolation the division is undone
//! ([`FragmentAttributes::perspective_correct`]).

use crate::math::{Mat3, Vec2, Vec2i, Vec3, Vec4};
use crate::render::sampling::{CoverageMask, SampleDepths};

/// Per-vertex attributes flowing through clipping and projection.
#[derive(Clone, Copy)]
pub struct VertexAttributes {
    /// World-space position (written by the vertex shader).
    pub world_pos: Vec3,
    /// World-space normal.
    pub normal: Vec3,
    /// Texture coordinates.
    pub texcoord: Vec2,
    /// Homogeneous clip-space position.
    pub clip_pos: Vec4,
    /// Integer screen position (valid after viewport projection).
    pub screen: Vec2i,
    /// Tangent-bitangent-normal frame for normal mapping.
    pub tbn: Mat3,
    /// Whether the TBN frame participates in interpolation.
    pub interpolate_tbn: bool,
    /// Reciprocal homogeneous w (1/clip_pos.w), set by pre-correction.
    pub rhw: f32,
}

impl VertexAttributes {
    pub fn new(position: Vec3, normal: Vec3, texcoord: Vec2) -> Self {
        Self {
            world_pos: position,
            normal,
            texcoord,
            clip_pos: Vec4::ZERO,
            screen: Vec2i::new(0, 0),
            tbn: Mat3::identity(),
            interpolate_tbn: false,
            rhw: 1.0,
        }
    }

    /// Linearly interpolate all attributes between two vertices.
    /// Used when a polygon edge crosses a clipping plane.
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            world_pos: self.world_pos.lerp(other.world_pos, t),
            normal: self.normal.lerp(other.normal, t),
            texcoord: self.texcoord.lerp(other.texcoord, t),
            clip_pos: self.clip_pos.lerp(other.clip_pos, t),
            screen: Vec2i::new(
                ((1.0 - t) * self.screen.x as f32 + t * other.screen.x as f32) as i32,
                ((1.0 - t) * self.screen.y as f32 + t * other.screen.y as f32) as i32,
            ),
            tbn: if self.interpolate_tbn {
                self.tbn.lerp(&other.tbn, t)
            } else {
                self.tbn
            },
            interpolate_tbn: self.interpolate_tbn,
            rhw: self.rhw + (other.rhw - self.rhw) * t,
        }
    }

    /// Divide interpolatable attributes by homogeneous w and store 1/w.
    ///
    /// Also rescales the clip position itself, leaving NDC coordinates
    /// ready for the viewport transform.
    pub fn pre_perspective_correct(&mut self) {
        self.rhw = 1.0 / self.clip_pos.w;
        self.world_pos = self.world_pos * self.rhw;
        self.texcoord = self.texcoord * self.rhw;
        self.normal = self.normal * self.rhw;
        self.clip_pos = self.clip_pos * self.rhw;
    }

    /// Combine three vertices with barycentric weights into a fragment.
    ///
    /// Coverage and depth start empty; the rasterizer fills them in.
    pub fn barycentric_lerp(v0: &Self, v1: &Self, v2: &Self, w: Vec3) -> FragmentAttributes {
        FragmentAttributes {
            world_pos: v0.world_pos * w.x + v1.world_pos * w.y + v2.world_pos * w.z,
            normal: v0.normal * w.x + v1.normal * w.y + v2.normal * w.z,
            texcoord: v0.texcoord * w.x + v1.texcoord * w.y + v2.texcoord * w.z,
            screen: Vec2i::new(
                (w.x * v0.screen.x as f32 + w.y * v1.screen.x as f32 + w.z * v2.screen.x as f32)
                    as i32,
                (w.x * v0.screen.y as f32 + w.y * v1.screen.y as f32 + w.z * v2.screen.y as f32)
                    as i32,
            ),
            tbn: if v0.interpolate_tbn {
                v0.tbn * w.x + v1.tbn * w.y + v2.tbn * w.z
            } else {
                v0.tbn
            },
            rhw: v0.rhw * w.x + v1.rhw * w.y + v2.rhw * w.z,
            coverage: CoverageMask::splat(false),
            depths: SampleDepths::splat(0.0),
        }
    }

    /// Barycentric combination of a scalar attribute.
    #[inline]
    pub fn barycentric_scalar(d0: f32, d1: f32, d2: f32, w: Vec3) -> f32 {
        w.x * d0 + w.y * d1 + w.z * d2
    }
}

/// Sentinel screen position marking a fragment that exists only to supply
/// finite-difference derivatives for its quad.
pub const SENTINEL: Vec2i = Vec2i::splat(-1);

/// Per-fragment interpolated attributes plus multi-sample coverage/depth.
#[derive(Clone, Copy)]
pub struct FragmentAttributes {
    pub world_pos: Vec3,
    pub normal: Vec3,
    pub texcoord: Vec2,
    pub screen: Vec2i,
    pub tbn: Mat3,
    pub rhw: f32,
    /// Which sub-pixel samples this fragment covers.
    pub coverage: CoverageMask,
    /// Interpolated 1/w at each covered sample.
    pub depths: SampleDepths,
}

impl FragmentAttributes {
    /// Whether this fragment is a derivative-only placeholder.
    #[inline]
    pub fn is_sentinel(&self) -> bool {
        self.screen.x == SENTINEL.x
    }

    /// Undo the perspective pre-division after barycentric interpolation.
    pub fn perspective_correct(&mut self) {
        let w = 1.0 / self.rhw;
        self.world_pos = self.world_pos * w;
        self.texcoord = self.texcoord * w;
        self.normal = self.normal * w;
    }
}

/// A 2x2 block of fragments, the atomic shading unit.
///
/// Fragment order is (x, y), (x+1, y), (x, y+1), (x+1, y+1); texture
/// coordinate derivatives come from finite differences between members.
#[derive(Clone, Copy)]
pub struct FragmentQuad {
    pub fragments: [FragmentAttributes; 4],
}

impl FragmentQuad {
    #[inline]
    pub fn du_dx(&self) -> f32 {
        self.fragments[1].texcoord.x - self.fragments[0].texcoord.x
    }

    #[inline]
    pub fn du_dy(&self) -> f32 {
        self.fragments[2].texcoord.x - self.fragments[0].texcoord.x
    }

    #[inline]
    pub fn dv_dx(&self) -> f32 {
        self.fragments[1].texcoord.y - self.fragments[0].texcoord.y
    }

    #[inline]
    pub fn dv_dy(&self) -> f32 {
        self.fragments[2].texcoord.y - self.fragments[0].texcoord.y
    }

    /// Screen-space UV derivative vectors (dUV/dx, dUV/dy).
    pub fn uv_derivatives(&self) -> (Vec2, Vec2) {
        (
            Vec2::new(self.du_dx(), self.dv_dx()),
            Vec2::new(self.du_dy(), self.dv_dy()),
        )
    }

    /// Perspective-correct all four members before derivative estimation.
    pub fn perspective_correct_all(&mut self) {
        for fragment in &mut self.fragments {
            fragment.perspective_correct();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn vertex(pos: Vec3, tex: Vec2) -> VertexAttributes {
        VertexAttributes::new(pos, Vec3::new(0.0, 0.0, 1.0), tex)
    }

    #[test]
    fn test_lerp_midpoint() {
        let a = vertex(Vec3::ZERO, Vec2::new(0.0, 0.0));
        let b = vertex(Vec3::new(2.0, 0.0, 0.0), Vec2::new(1.0, 1.0));
        let mid = a.lerp(&b, 0.5);
        assert_relative_eq!(mid.world_pos.x, 1.0);
        assert_relative_eq!(mid.texcoord.x, 0.5);
    }

    #[test]
    fn test_perspective_roundtrip() {
        let mut v = vertex(Vec3::new(3.0, 0.0, 0.0), Vec2::new(0.5, 0.25));
        v.clip_pos = Vec4::new(0.0, 0.0, 0.0, 4.0);
        v.pre_perspective_correct();
        assert_relative_eq!(v.rhw, 0.25);
        assert_relative_eq!(v.texcoord.x, 0.125);

        // A "fragment" that is exactly this vertex should recover the
        // original attribute values.
        let mut frag =
            VertexAttributes::barycentric_lerp(&v, &v, &v, Vec3::new(1.0, 0.0, 0.0));
        frag.perspective_correct();
        assert_relative_eq!(frag.texcoord.x, 0.5);
        assert_relative_eq!(frag.world_pos.x, 3.0);
    }

    #[test]
    fn test_barycentric_weights_sum_to_attribute() {
        let v0 = vertex(Vec3::ZERO, Vec2::new(0.0, 0.0));
        let v1 = vertex(Vec3::new(1.0, 0.0, 0.0), Vec2::new(1.0, 0.0));
        let v2 = vertex(Vec3::new(0.0, 1.0, 0.0), Vec2::new(0.0, 1.0));
        let frag = VertexAttributes::barycentric_lerp(
            &v0,
            &v1,
            &v2,
            Vec3::new(1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0),
        );
        assert_relative_eq!(frag.texcoord.x, 1.0 / 3.0, epsilon = 1e-6);
        assert_relative_eq!(frag.texcoord.y, 1.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_quad_derivatives() {
        let mut base = VertexAttributes::barycentric_lerp(
            &vertex(Vec3::ZERO, Vec2::new(0.0, 0.0)),
            &vertex(Vec3::ZERO, Vec2::new(0.0, 0.0)),
            &vertex(Vec3::ZERO, Vec2::new(0.0, 0.0)),
            Vec3::new(1.0, 0.0, 0.0),
        );
        let mut quad = FragmentQuad {
            fragments: [base; 4],
        };
        quad.fragments[1].texcoord = Vec2::new(0.1, 0.0);
        quad.fragments[2].texcoord = Vec2::new(0.0, 0.2);
        let (duv_dx, duv_dy) = quad.uv_derivatives();
        assert_relative_eq!(duv_dx.x, 0.1);
        assert_relative_eq!(duv_dy.y, 0.2);
        base.screen = SENTINEL;
        assert!(base.is_sentinel());
    }
}
