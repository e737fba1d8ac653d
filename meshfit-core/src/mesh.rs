//! Mesh data structures and functionality

use crate::error::{Error, Result};
use crate::point::*;
use serde::{Deserialize, Serialize};

/// A triangle mesh with vertices, faces and optional per-vertex attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3f>,
    pub faces: Vec<[usize; 3]>,
    pub normals: Option<Vec<Vector3f>>,
    pub colors: Option<Vec<[u8; 3]>>,
    pub uvs: Option<Vec<Point2f>>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            normals: None,
            colors: None,
            uvs: None,
        }
    }

    /// Create a mesh from vertices and faces
    pub fn from_vertices_and_faces(vertices: Vec<Point3f>, faces: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            faces,
            normals: None,
            colors: None,
            uvs: None,
        }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Add a vertex to the mesh
    pub fn add_vertex(&mut self, vertex: Point3f) -> usize {
        let index = self.vertices.len();
        self.vertices.push(vertex);
        index
    }

    /// Add a face to the mesh
    pub fn add_face(&mut self, face: [usize; 3]) {
        self.faces.push(face);
    }

    /// Calculate face normals
    ///
    /// Zero-area faces yield a zero vector instead of NaN components.
    pub fn calculate_face_normals(&self) -> Vec<Vector3f> {
        self.faces
            .iter()
            .map(|face| {
                let v0 = self.vertices[face[0]];
                let v1 = self.vertices[face[1]];
                let v2 = self.vertices[face[2]];

                let edge1 = v1 - v0;
                let edge2 = v2 - v0;

                edge1
                    .cross(&edge2)
                    .try_normalize(f32::EPSILON)
                    .unwrap_or_else(Vector3f::zeros)
            })
            .collect()
    }

    /// Area of a single face
    pub fn face_area(&self, face_index: usize) -> f64 {
        let [a, b, c] = self.faces[face_index];
        let p0 = to_f64(&self.vertices[a]);
        let p1 = to_f64(&self.vertices[b]);
        let p2 = to_f64(&self.vertices[c]);
        (p1 - p0).cross(&(p2 - p0)).norm() * 0.5
    }

    /// Total surface area
    pub fn surface_area(&self) -> f64 {
        (0..self.faces.len()).map(|f| self.face_area(f)).sum()
    }

    /// Set vertex normals
    pub fn set_normals(&mut self, normals: Vec<Vector3f>) {
        if normals.len() == self.vertices.len() {
            self.normals = Some(normals);
        }
    }

    /// Set vertex colors
    pub fn set_colors(&mut self, colors: Vec<[u8; 3]>) {
        if colors.len() == self.vertices.len() {
            self.colors = Some(colors);
        }
    }

    /// Set per-vertex texture coordinates
    pub fn set_uvs(&mut self, uvs: Vec<Point2f>) {
        if uvs.len() == self.vertices.len() {
            self.uvs = Some(uvs);
        }
    }

    /// Whether the mesh carries texture coordinates
    pub fn has_uvs(&self) -> bool {
        self.uvs.is_some()
    }

    /// Check the structural invariants every algorithm relies on.
    ///
    /// Fails with [`Error::InvalidMesh`] for an empty vertex or face buffer,
    /// out-of-range face indices, non-finite positions, or attribute buffers
    /// whose length differs from the vertex count.
    pub fn validate(&self) -> Result<()> {
        if self.vertices.is_empty() {
            return Err(Error::InvalidMesh("vertex buffer is empty".to_string()));
        }
        if self.faces.is_empty() {
            return Err(Error::InvalidMesh("mesh has no faces".to_string()));
        }

        let nv = self.vertices.len();
        if let Some((fi, face)) = self
            .faces
            .iter()
            .enumerate()
            .find(|(_, face)| face.iter().any(|&v| v >= nv))
        {
            return Err(Error::InvalidMesh(format!(
                "face {} references vertex out of bounds: {:?} (vertex count {})",
                fi, face, nv
            )));
        }

        if let Some(vi) = self
            .vertices
            .iter()
            .position(|p| !p.coords.iter().all(|c| c.is_finite()))
        {
            return Err(Error::InvalidMesh(format!("vertex {} is not finite", vi)));
        }

        let attribute_lengths = [
            ("normals", self.normals.as_ref().map(Vec::len)),
            ("colors", self.colors.as_ref().map(Vec::len)),
            ("uvs", self.uvs.as_ref().map(Vec::len)),
        ];
        for (name, len) in attribute_lengths {
            if let Some(len) = len {
                if len != nv {
                    return Err(Error::InvalidMesh(format!(
                        "{} buffer has {} entries for {} vertices",
                        name, len, nv
                    )));
                }
            }
        }

        Ok(())
    }

    /// Clear the mesh
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.faces.clear();
        self.normals = None;
        self.colors = None;
        self.uvs = None;
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn make_quad() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(1.0, 1.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn test_counts_and_area() {
        let mesh = make_quad();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 2);
        assert!(!mesh.is_empty());
        assert_relative_eq!(mesh.surface_area(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_face_normals() {
        let mesh = make_quad();
        for n in mesh.calculate_face_normals() {
            assert_relative_eq!(n.z, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_degenerate_face_normal_is_zero() {
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(2.0, 0.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        assert_eq!(mesh.calculate_face_normals()[0], Vector3f::zeros());
    }

    #[test]
    fn test_validate_accepts_well_formed_mesh() {
        assert!(make_quad().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty() {
        assert!(matches!(
            TriangleMesh::new().validate(),
            Err(Error::InvalidMesh(_))
        ));

        let no_faces = TriangleMesh::from_vertices_and_faces(vec![Point3f::origin()], vec![]);
        assert!(matches!(no_faces.validate(), Err(Error::InvalidMesh(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_bounds() {
        let mut mesh = make_quad();
        mesh.add_face([0, 2, 7]);
        assert!(matches!(mesh.validate(), Err(Error::InvalidMesh(_))));
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        let mut mesh = make_quad();
        mesh.vertices[1].x = f32::NAN;
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_attribute_setters_check_length() {
        let mut mesh = make_quad();
        mesh.set_uvs(vec![Point2f::origin(); 3]);
        assert!(!mesh.has_uvs());
        mesh.set_uvs(vec![Point2f::origin(); 4]);
        assert!(mesh.has_uvs());
        assert!(mesh.validate().is_ok());

        mesh.uvs.as_mut().unwrap().pop();
        assert!(mesh.validate().is_err());
    }
}
