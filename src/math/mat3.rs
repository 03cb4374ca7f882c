//! 3x3 matrix for tangent frames and normal transforms.

use std::ops::{Add, Mul};

use super::mat4::Mat4;
use super::vec3::Vec3;

/// 3x3 matrix stored as `data[row][col]`, column-vector convention.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat3 {
    data: [[f32; 3]; 3],
}

impl Mat3 {
    pub const fn new(data: [[f32; 3]; 3]) -> Self {
        Self { data }
    }

    pub const fn identity() -> Self {
        Self::new([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Build from three column vectors (e.g. a tangent/bitangent/normal frame).
    pub fn from_columns(c0: Vec3, c1: Vec3, c2: Vec3) -> Self {
        Self::new([
            [c0.x, c1.x, c2.x],
            [c0.y, c1.y, c2.y],
            [c0.z, c1.z, c2.z],
        ])
    }

    pub fn column(&self, i: usize) -> Vec3 {
        Vec3::new(self.data[0][i], self.data[1][i], self.data[2][i])
    }

    pub fn transpose(&self) -> Self {
        let m = &self.data;
        Self::new([
            [m[0][0], m[1][0], m[2][0]],
            [m[0][1], m[1][1], m[2][1]],
            [m[0][2], m[1][2], m[2][2]],
        ])
    }

    pub fn determinant(&self) -> f32 {
        let m = &self.data;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// Inverse via the adjugate, or `None` for a singular matrix.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() < f32::EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let m = &self.data;
        Some(Self::new([
            [
                (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
                (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
                (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
            ],
            [
                (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
                (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
                (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
            ],
            [
                (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
                (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
                (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
            ],
        ]))
    }

    /// Normal-correction matrix: inverse-transpose of the upper-left 3x3 of a
    /// model matrix. Falls back to the untransposed block for singular inputs.
    pub fn normal_from(model: &Mat4) -> Self {
        let block = Self::from_mat4(model);
        block
            .inverse()
            .map(|inv| inv.transpose())
            .unwrap_or(block)
    }

    /// Upper-left 3x3 block of a 4x4 matrix.
    pub fn from_mat4(m: &Mat4) -> Self {
        let d = m.rows();
        Self::new([
            [d[0][0], d[0][1], d[0][2]],
            [d[1][0], d[1][1], d[1][2]],
            [d[2][0], d[2][1], d[2][2]],
        ])
    }

    /// Linearly interpolate component-wise (used for tangent-frame interpolation).
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        let mut data = [[0.0; 3]; 3];
        for r in 0..3 {
            for c in 0..3 {
                let a = self.data[r][c];
                data[r][c] = a + (other.data[r][c] - a) * t;
            }
        }
        Self::new(data)
    }
}

impl Mul<Vec3> for Mat3 {
    type Output = Vec3;

    fn mul(self, v: Vec3) -> Self::Output {
        let m = &self.data;
        Vec3::new(
            m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        )
    }
}

/// Component-wise addition (barycentric combination of tangent frames).
impl Add<Mat3> for Mat3 {
    type Output = Mat3;

    fn add(self, rhs: Mat3) -> Self::Output {
        let mut data = [[0.0; 3]; 3];
        for r in 0..3 {
            for c in 0..3 {
                data[r][c] = self.data[r][c] + rhs.data[r][c];
            }
        }
        Self::new(data)
    }
}

/// Component-wise scaling (barycentric combination of tangent frames).
impl Mul<f32> for Mat3 {
    type Output = Mat3;

    fn mul(self, rhs: f32) -> Self::Output {
        let mut data = [[0.0; 3]; 3];
        for r in 0..3 {
            for c in 0..3 {
                data[r][c] = self.data[r][c] * rhs;
            }
        }
        Self::new(data)
    }
}
