//! Light sources for the shading strategies.
//!
//! The light set is fixed and known at design time, so the variants live
//! in one tagged enum rather than behind dynamic dispatch.

use crate::math::Vec3;

#[derive(Clone, Copy, Debug)]
pub enum Light {
    /// Omnidirectional emitter with quadratic distance attenuation
    /// (constant, linear, quadratic coefficients).
    Point {
        intensity: Vec3,
        position: Vec3,
        attenuation: Vec3,
    },
    /// Point light restricted to a cone, with smooth falloff between the
    /// inner and outer cutoff cosines.
    Spot {
        intensity: Vec3,
        position: Vec3,
        attenuation: Vec3,
        direction: Vec3,
        inner_cutoff: f32,
        outer_cutoff: f32,
    },
    /// Parallel rays from an infinitely distant source (no attenuation).
    Directional { intensity: Vec3, direction: Vec3 },
}

impl Light {
    pub fn intensity(&self) -> Vec3 {
        match self {
            Self::Point { intensity, .. }
            | Self::Spot { intensity, .. }
            | Self::Directional { intensity, .. } => *intensity,
        }
    }

    /// Unit vector from the shaded point toward the light.
    pub fn direction(&self, frag_pos: Vec3) -> Vec3 {
        match self {
            Self::Point { position, .. } | Self::Spot { position, .. } => {
                (*position - frag_pos).normalize()
            }
            Self::Directional { direction, .. } => *direction,
        }
    }

    /// Distance falloff factor at the shaded point.
    pub fn attenuation(&self, frag_pos: Vec3) -> f32 {
        match self {
            Self::Point {
                position,
                attenuation,
                ..
            }
            | Self::Spot {
                position,
                attenuation,
                ..
            } => {
                let distance = (*position - frag_pos).magnitude();
                1.0 / (attenuation.x + attenuation.y * distance + attenuation.z * distance * distance)
            }
            Self::Directional { .. } => 1.0,
        }
    }

    /// Cone falloff in [0, 1] given the direction toward the light.
    pub fn cutoff(&self, light_dir: Vec3) -> f32 {
        match self {
            Self::Spot {
                direction,
                inner_cutoff,
                outer_cutoff,
                ..
            } => {
                let theta = light_dir.dot(direction.normalize());
                let epsilon = inner_cutoff - outer_cutoff;
                ((theta - outer_cutoff) / epsilon).clamp(0.0, 1.0)
            }
            Self::Point { .. } | Self::Directional { .. } => 1.0,
        }
    }
}
