//! Drawable meshes: vertex/index buffers plus per-mesh material and state.
//!
//! A [`DrawMesh`] is the unit of one draw call: an ordered vertex buffer,
//! an index buffer whose length is a multiple of three, and the material /
//! shading-state snapshot the pipeline reads while rendering it.

use std::fmt;
use std::path::Path;

use crate::math::{Vec2, Vec3};
use crate::render::ShadingState;
use crate::shader::Material;

/// One vertex of a drawable mesh.
#[derive(Clone, Copy, Debug)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub texcoord: Vec2,
    pub tangent: Vec3,
    pub bitangent: Vec3,
}

impl MeshVertex {
    pub fn new(position: Vec3, normal: Vec3, texcoord: Vec2) -> Self {
        Self {
            position,
            normal,
            texcoord,
            tangent: Vec3::new(1.0, 0.0, 0.0),
            bitangent: Vec3::new(0.0, 1.0, 0.0),
        }
    }
}

/// Mesh construction/loading failures.
#[derive(Debug)]
pub enum LoadError {
    Obj(tobj::LoadError),
    /// Index buffer length is not a multiple of three.
    IndexCount { count: usize },
    /// An index points past the vertex buffer.
    InvalidIndex { index: u32, vertex_count: usize },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Obj(err) => write!(f, "OBJ load failed: {}", err),
            Self::IndexCount { count } => {
                write!(f, "index count {} is not a multiple of 3", count)
            }
            Self::InvalidIndex {
                index,
                vertex_count,
            } => write!(
                f,
                "index {} out of range for {} vertices",
                index, vertex_count
            ),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Obj(err) => Some(err),
            _ => None,
        }
    }
}

impl From<tobj::LoadError> for LoadError {
    fn from(err: tobj::LoadError) -> Self {
        Self::Obj(err)
    }
}

/// A mesh ready for the rendering pipeline.
pub struct DrawMesh {
    name: String,
    vertices: Vec<MeshVertex>,
    indices: Vec<u32>,
    pub material: Material,
    pub state: ShadingState,
}

impl DrawMesh {
    /// Build a mesh, validating the index buffer.
    pub fn new(
        name: impl Into<String>,
        vertices: Vec<MeshVertex>,
        indices: Vec<u32>,
    ) -> Result<Self, LoadError> {
        if indices.len() % 3 != 0 {
            return Err(LoadError::IndexCount {
                count: indices.len(),
            });
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(LoadError::InvalidIndex {
                index: bad,
                vertex_count: vertices.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            vertices,
            indices,
            material: Material::default(),
            state: ShadingState::default(),
        })
    }

    /// Load every model of an OBJ file as a separate mesh, generating
    /// tangent frames from the UV layout.
    pub fn from_obj<P: AsRef<Path>>(path: P) -> Result<Vec<Self>, LoadError> {
        let (models, _materials) = tobj::load_obj(path.as_ref(), &tobj::GPU_LOAD_OPTIONS)?;
        let mut meshes = Vec::with_capacity(models.len());
        for model in models {
            let m = model.mesh;
            let count = m.positions.len() / 3;
            let mut vertices = Vec::with_capacity(count);
            for i in 0..count {
                let position =
                    Vec3::new(m.positions[3 * i], m.positions[3 * i + 1], m.positions[3 * i + 2]);
                let normal = if m.normals.len() >= 3 * (i + 1) {
                    Vec3::new(m.normals[3 * i], m.normals[3 * i + 1], m.normals[3 * i + 2])
                } else {
                    Vec3::new(0.0, 0.0, 1.0)
                };
                let texcoord = if m.texcoords.len() >= 2 * (i + 1) {
                    Vec2::new(m.texcoords[2 * i], m.texcoords[2 * i + 1])
                } else {
                    Vec2::ZERO
                };
                vertices.push(MeshVertex::new(position, normal, texcoord));
            }
            let mut mesh = Self::new(model.name, vertices, m.indices)?;
            mesh.generate_tangents();
            meshes.push(mesh);
        }
        Ok(meshes)
    }

    /// Unit cube centered at the origin, one quad per face.
    pub fn cube() -> Self {
        let faces: [([Vec3; 4], Vec3); 6] = [
            // +Z
            (
                [
                    Vec3::new(-1.0, -1.0, 1.0),
                    Vec3::new(1.0, -1.0, 1.0),
                    Vec3::new(1.0, 1.0, 1.0),
                    Vec3::new(-1.0, 1.0, 1.0),
                ],
                Vec3::new(0.0, 0.0, 1.0),
            ),
            // -Z
            (
                [
                    Vec3::new(1.0, -1.0, -1.0),
                    Vec3::new(-1.0, -1.0, -1.0),
                    Vec3::new(-1.0, 1.0, -1.0),
                    Vec3::new(1.0, 1.0, -1.0),
                ],
                Vec3::new(0.0, 0.0, -1.0),
            ),
            // +X
            (
                [
                    Vec3::new(1.0, -1.0, 1.0),
                    Vec3::new(1.0, -1.0, -1.0),
                    Vec3::new(1.0, 1.0, -1.0),
                    Vec3::new(1.0, 1.0, 1.0),
                ],
                Vec3::new(1.0, 0.0, 0.0),
            ),
            // -X
            (
                [
                    Vec3::new(-1.0, -1.0, -1.0),
                    Vec3::new(-1.0, -1.0, 1.0),
                    Vec3::new(-1.0, 1.0, 1.0),
                    Vec3::new(-1.0, 1.0, -1.0),
                ],
                Vec3::new(-1.0, 0.0, 0.0),
            ),
            // +Y
            (
                [
                    Vec3::new(-1.0, 1.0, 1.0),
                    Vec3::new(1.0, 1.0, 1.0),
                    Vec3::new(1.0, 1.0, -1.0),
                    Vec3::new(-1.0, 1.0, -1.0),
                ],
                Vec3::new(0.0, 1.0, 0.0),
            ),
            // -Y
            (
                [
                    Vec3::new(-1.0, -1.0, -1.0),
                    Vec3::new(1.0, -1.0, -1.0),
                    Vec3::new(1.0, -1.0, 1.0),
                    Vec3::new(-1.0, -1.0, 1.0),
                ],
                Vec3::new(0.0, -1.0, 0.0),
            ),
        ];
        let uvs = [
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (corners, normal) in faces {
            let base = vertices.len() as u32;
            for (corner, uv) in corners.iter().zip(uvs.iter()) {
                vertices.push(MeshVertex::new(*corner, normal, *uv));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        let mut mesh = Self {
            name: "cube".into(),
            vertices,
            indices,
            material: Material::default(),
            state: ShadingState::default(),
        };
        mesh.generate_tangents();
        mesh
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertices(&self) -> &[MeshVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Derive per-vertex tangent frames from triangle UV deltas,
    /// accumulating over shared vertices and normalizing at the end.
    pub fn generate_tangents(&mut self) {
        let mut tangents = vec![Vec3::ZERO; self.vertices.len()];
        let mut bitangents = vec![Vec3::ZERO; self.vertices.len()];

        for tri in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let (v0, v1, v2) = (&self.vertices[i0], &self.vertices[i1], &self.vertices[i2]);
            let e1 = v1.position - v0.position;
            let e2 = v2.position - v0.position;
            let duv1 = v1.texcoord - v0.texcoord;
            let duv2 = v2.texcoord - v0.texcoord;

            let det = duv1.x * duv2.y - duv1.y * duv2.x;
            if det.abs() < f32::EPSILON {
                continue; // degenerate UV mapping, keep defaults
            }
            let r = 1.0 / det;
            let tangent = (e1 * duv2.y - e2 * duv1.y) * r;
            let bitangent = (e2 * duv1.x - e1 * duv2.x) * r;
            for &i in &[i0, i1, i2] {
                tangents[i] = tangents[i] + tangent;
                bitangents[i] = bitangents[i] + bitangent;
            }
        }

        for (i, vertex) in self.vertices.iter_mut().enumerate() {
            if tangents[i].magnitude() > f32::EPSILON {
                vertex.tangent = tangents[i].normalize();
            }
            if bitangents[i].magnitude() > f32::EPSILON {
                vertex.bitangent = bitangents[i].normalize();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_has_expected_buffers() {
        let cube = DrawMesh::cube();
        assert_eq!(cube.vertices().len(), 24);
        assert_eq!(cube.indices().len(), 36);
        assert_eq!(cube.triangle_count(), 12);
    }

    #[test]
    fn test_index_validation() {
        let vertices = vec![MeshVertex::new(Vec3::ZERO, Vec3::UP, Vec2::ZERO); 3];
        assert!(matches!(
            DrawMesh::new("bad", vertices.clone(), vec![0, 1]),
            Err(LoadError::IndexCount { count: 2 })
        ));
        assert!(matches!(
            DrawMesh::new("bad", vertices, vec![0, 1, 9]),
            Err(LoadError::InvalidIndex { index: 9, .. })
        ));
    }

    #[test]
    fn test_tangents_follow_uv_axes() {
        // A quad in the XY plane with UVs aligned to X/Y: the tangent
        // must point along +X and the bitangent along +Y.
        let vertices = vec![
            MeshVertex::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0), Vec2::new(0.0, 0.0)),
            MeshVertex::new(
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
                Vec2::new(1.0, 0.0),
            ),
            MeshVertex::new(
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
                Vec2::new(0.0, 1.0),
            ),
        ];
        let mut mesh = DrawMesh::new("quad", vertices, vec![0, 1, 2]).unwrap();
        mesh.generate_tangents();
        let tangent = mesh.vertices()[0].tangent;
        let bitangent = mesh.vertices()[0].bitangent;
        assert_relative_eq!(tangent.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(bitangent.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_degenerate_uvs_keep_default_tangents() {
        let vertices = vec![
            MeshVertex::new(Vec3::ZERO, Vec3::UP, Vec2::ZERO),
            MeshVertex::new(Vec3::new(1.0, 0.0, 0.0), Vec3::UP, Vec2::ZERO),
            MeshVertex::new(Vec3::new(0.0, 0.0, 1.0), Vec3::UP, Vec2::ZERO),
        ];
        let mut mesh = DrawMesh::new("flat-uv", vertices, vec![0, 1, 2]).unwrap();
        mesh.generate_tangents();
        assert_eq!(mesh.vertices()[0].tangent, Vec3::new(1.0, 0.0, 0.0));
    }
}
