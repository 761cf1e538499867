use glam::{Affine3A, Vec3};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::errors::{Result, RigError};

/// Polygon face as vertex indices (triangles and quads stay inline).
pub type Face = SmallVec<[u32; 4]>;

/// Vertex positions and polygon faces of a mesh shape.
///
/// Only what traversal and weight transfer need; UVs and normals belong to
/// the host application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    #[serde(default)]
    pub faces: Vec<Face>,
}

impl MeshData {
    /// Creates mesh data, validating face indices.
    pub fn new(positions: Vec<Vec3>, faces: Vec<Face>) -> Result<Self> {
        let mesh = Self { positions, faces };
        mesh.validate()?;
        Ok(mesh)
    }

    pub fn validate(&self) -> Result<()> {
        let count = self.positions.len();
        for (i, face) in self.faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(RigError::InvalidGeometry(format!(
                    "face {i} has {} vertices",
                    face.len()
                )));
            }
            if let Some(&bad) = face.iter().find(|&&v| v as usize >= count) {
                return Err(RigError::InvalidGeometry(format!(
                    "face {i} references vertex {bad} of {count}"
                )));
            }
        }
        if self.positions.iter().any(|p| !p.is_finite()) {
            return Err(RigError::InvalidGeometry("non-finite vertex position".into()));
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Positions moved by `matrix`.
    #[must_use]
    pub fn transformed_positions(&self, matrix: &Affine3A) -> Vec<Vec3> {
        self.positions.iter().map(|&p| matrix.transform_point3(p)).collect()
    }

    pub fn apply_matrix(&mut self, matrix: &Affine3A) {
        for p in &mut self.positions {
            *p = matrix.transform_point3(*p);
        }
    }

    /// Appends `positions`/`faces` of another mesh, offsetting its indices.
    ///
    /// Returns the index of the first appended vertex.
    pub fn append(&mut self, positions: &[Vec3], faces: &[Face]) -> usize {
        let offset = self.positions.len();
        self.positions.extend_from_slice(positions);
        let base = offset as u32;
        self.faces.extend(
            faces
                .iter()
                .map(|face| face.iter().map(|&v| v + base).collect::<Face>()),
        );
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_validate_rejects_out_of_range() {
        let result = MeshData::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![smallvec![0, 1, 3]],
        );
        assert!(matches!(result, Err(RigError::InvalidGeometry(_))));
    }

    #[test]
    fn test_append_offsets_faces() {
        let mut a = MeshData::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![smallvec![0, 1, 2]]).unwrap();
        let b = a.clone();

        let offset = a.append(&b.positions, &b.faces);

        assert_eq!(offset, 3);
        assert_eq!(a.vertex_count(), 6);
        assert_eq!(a.faces[1].as_slice(), &[3, 4, 5]);
        assert!(a.validate().is_ok());
    }
}
