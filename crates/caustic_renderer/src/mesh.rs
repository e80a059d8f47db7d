//! Indexed triangle meshes.
//!
//! A mesh is validated once when it is built. Each face becomes its own
//! primitive ([`MeshFace`]) so the BVH can split inside a mesh; the faces
//! share the mesh data through an `Arc`.

use caustic_math::{Aabb, Mat3, Ray, Vec2, Vec3, RAY_EPSILON};
use std::sync::Arc;

use crate::error::SceneError;
use crate::hit::LocalHit;
use crate::material::{Coefficients, Material};
use crate::sampling::orthonormal_basis;
use crate::shape::LocalShape;

/// Faces with an area below this are rejected as degenerate.
const MIN_FACE_AREA: f32 = 1e-12;

#[derive(Debug, Clone)]
pub struct TriangleMesh {
    name: String,
    vertices: Vec<Vec3>,
    faces: Vec<[u32; 3]>,
    normals: Vec<Vec3>,
    materials: Vec<Coefficients>,
    tex_coords: Vec<Vec2>,
    face_normals: Vec<Vec3>,
    face_tbn: Vec<Mat3>,
}

impl TriangleMesh {
    /// Build a mesh, rejecting out-of-range indices and zero-area faces.
    pub fn new(
        name: impl Into<String>,
        vertices: Vec<Vec3>,
        faces: Vec<[u32; 3]>,
    ) -> Result<Self, SceneError> {
        let name = name.into();
        let mut face_normals = Vec::with_capacity(faces.len());

        for (face, idx) in faces.iter().enumerate() {
            if let Some(&bad) = idx.iter().find(|&&i| i as usize >= vertices.len()) {
                return Err(SceneError::FaceIndexOutOfRange {
                    mesh: name,
                    face,
                    index: bad,
                    count: vertices.len(),
                });
            }
            let [a, b, c] = idx.map(|i| vertices[i as usize]);
            let cross = (b - a).cross(c - a);
            if 0.5 * cross.length() < MIN_FACE_AREA {
                return Err(SceneError::DegenerateTriangle { mesh: name, face });
            }
            face_normals.push(cross.normalize());
        }

        let face_tbn = face_normals
            .iter()
            .map(|&n| {
                let (t, b) = orthonormal_basis(n);
                Mat3::from_cols(t, b, n)
            })
            .collect();

        Ok(Self {
            name,
            vertices,
            faces,
            normals: Vec::new(),
            materials: Vec::new(),
            tex_coords: Vec::new(),
            face_normals,
            face_tbn,
        })
    }

    fn check_count(&self, attribute: &'static str, found: usize) -> Result<(), SceneError> {
        if found != self.vertices.len() {
            return Err(SceneError::AttributeCountMismatch {
                mesh: self.name.clone(),
                attribute,
                expected: self.vertices.len(),
                found,
            });
        }
        Ok(())
    }

    /// Per-vertex shading normals, interpolated across each face.
    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Result<Self, SceneError> {
        self.check_count("normals", normals.len())?;
        self.normals = normals.into_iter().map(Vec3::normalize_or_zero).collect();
        Ok(self)
    }

    /// Per-vertex material coefficients, interpolated across each face.
    pub fn with_vertex_materials(mut self, materials: Vec<Coefficients>) -> Result<Self, SceneError> {
        self.check_count("materials", materials.len())?;
        self.materials = materials;
        Ok(self)
    }

    /// Per-vertex texture coordinates. Also derives a tangent frame per face.
    pub fn with_tex_coords(mut self, tex_coords: Vec<Vec2>) -> Result<Self, SceneError> {
        self.check_count("texture coordinates", tex_coords.len())?;
        self.tex_coords = tex_coords;
        self.face_tbn = (0..self.faces.len()).map(|f| self.uv_tangent_frame(f)).collect();
        Ok(self)
    }

    /// Replace vertex normals with area-weighted averages of adjacent face
    /// normals.
    pub fn generate_normals(&mut self) {
        let mut acc = vec![Vec3::ZERO; self.vertices.len()];
        for idx in &self.faces {
            let [a, b, c] = idx.map(|i| self.vertices[i as usize]);
            // Unnormalized cross product weights by face area
            let n = (b - a).cross(c - a);
            for &i in idx {
                acc[i as usize] += n;
            }
        }
        self.normals = acc.into_iter().map(Vec3::normalize_or_zero).collect();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    /// True if any per-vertex material lets light through.
    pub fn has_transmissive_materials(&self) -> bool {
        self.materials.iter().any(Coefficients::is_transmissive)
    }

    pub fn face_vertices(&self, face: usize) -> [Vec3; 3] {
        self.faces[face].map(|i| self.vertices[i as usize])
    }

    pub fn face_normal(&self, face: usize) -> Vec3 {
        self.face_normals[face]
    }

    fn uv_tangent_frame(&self, face: usize) -> Mat3 {
        let n = self.face_normals[face];
        let [i0, i1, i2] = self.faces[face].map(|i| i as usize);
        let (dp1, dp2) = (
            self.vertices[i1] - self.vertices[i0],
            self.vertices[i2] - self.vertices[i0],
        );
        let (duv1, duv2) = (
            self.tex_coords[i1] - self.tex_coords[i0],
            self.tex_coords[i2] - self.tex_coords[i0],
        );
        let det = duv1.x * duv2.y - duv2.x * duv1.y;
        if det.abs() < 1e-12 {
            let (t, b) = orthonormal_basis(n);
            return Mat3::from_cols(t, b, n);
        }
        let r = 1.0 / det;
        let tangent = ((dp1 * duv2.y - dp2 * duv1.y) * r).normalize_or_zero();
        let bitangent = ((dp2 * duv1.x - dp1 * duv2.x) * r).normalize_or_zero();
        Mat3::from_cols(tangent, bitangent, n)
    }

    /// Möller-Trumbore, double sided.
    fn intersect_face(&self, face: usize, ray: &Ray) -> Option<LocalHit> {
        let [v0, v1, v2] = self.face_vertices(face);
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        let h = ray.direction.cross(edge2);
        let a = edge1.dot(h);
        if a.abs() < 1e-10 {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = f * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(q);
        if t <= RAY_EPSILON {
            return None;
        }

        let w = 1.0 - u - v;
        let [i0, i1, i2] = self.faces[face].map(|i| i as usize);

        let normal = if self.normals.is_empty() {
            self.face_normals[face]
        } else {
            let n = self.normals[i0] * w + self.normals[i1] * u + self.normals[i2] * v;
            if n.length_squared() > 1e-12 {
                n.normalize()
            } else {
                self.face_normals[face]
            }
        };

        let mut hit = LocalHit::new(t, normal);
        let tbn = self.face_tbn[face];
        hit.tbn = Some(Mat3::from_cols(tbn.x_axis, tbn.y_axis, normal));

        if !self.tex_coords.is_empty() {
            hit.uv = Some(self.tex_coords[i0] * w + self.tex_coords[i1] * u + self.tex_coords[i2] * v);
        }
        if !self.materials.is_empty() {
            let coeffs = self.materials[i0] * w + self.materials[i1] * u + self.materials[i2] * v;
            hit.material = Some(Box::new(Material::Phong(coeffs)));
        }
        Some(hit)
    }
}

/// One face of a shared mesh.
#[derive(Debug, Clone)]
pub struct MeshFace {
    mesh: Arc<TriangleMesh>,
    face: usize,
}

impl MeshFace {
    pub fn new(mesh: Arc<TriangleMesh>, face: usize) -> Self {
        Self { mesh, face }
    }

    pub fn mesh(&self) -> &TriangleMesh {
        &self.mesh
    }

    pub fn face(&self) -> usize {
        self.face
    }

    /// Every face of `mesh`, in index order.
    pub fn all(mesh: &Arc<TriangleMesh>) -> Vec<MeshFace> {
        (0..mesh.face_count())
            .map(|face| MeshFace::new(Arc::clone(mesh), face))
            .collect()
    }
}

impl LocalShape for MeshFace {
    fn intersect_local(&self, ray: &Ray) -> Option<LocalHit> {
        self.mesh.intersect_face(self.face, ray)
    }

    fn local_bounds(&self) -> Option<Aabb> {
        Some(Aabb::from_iter_points(self.mesh.face_vertices(self.face)).padded())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> TriangleMesh {
        TriangleMesh::new(
            "quad",
            vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .unwrap()
    }

    #[test]
    fn test_mesh_rejects_bad_index() {
        let err = TriangleMesh::new("bad", vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![[0, 1, 3]]).unwrap_err();
        assert!(matches!(err, SceneError::FaceIndexOutOfRange { index: 3, count: 3, .. }));
    }

    #[test]
    fn test_mesh_rejects_degenerate_face() {
        let err = TriangleMesh::new(
            "flat",
            vec![Vec3::ZERO, Vec3::X, Vec3::new(2.0, 0.0, 0.0)],
            vec![[0, 1, 2]],
        )
        .unwrap_err();
        assert!(matches!(err, SceneError::DegenerateTriangle { face: 0, .. }));
    }

    #[test]
    fn test_mesh_rejects_mismatched_attributes() {
        let err = quad().with_normals(vec![Vec3::Z; 3]).unwrap_err();
        assert!(matches!(err, SceneError::AttributeCountMismatch { expected: 4, found: 3, .. }));
    }

    #[test]
    fn test_face_hit_both_sides() {
        let mesh = Arc::new(quad());
        let face = MeshFace::new(Arc::clone(&mesh), 0);
        let front = Ray::new(Vec3::new(0.5, -0.5, 2.0), -Vec3::Z);
        let back = Ray::new(Vec3::new(0.5, -0.5, -2.0), Vec3::Z);

        let hit = face.intersect_local(&front).unwrap();
        assert!((hit.t - 2.0).abs() < 1e-5);
        assert_eq!(hit.normal, Vec3::Z);
        let hit = face.intersect_local(&back).unwrap();
        // Outward normal regardless of the side hit
        assert_eq!(hit.normal, Vec3::Z);
    }

    #[test]
    fn test_generate_normals_on_flat_mesh() {
        let mut mesh = quad();
        mesh.generate_normals();
        assert!(mesh.has_normals());
        assert!(mesh.normals.iter().all(|n| (*n - Vec3::Z).length() < 1e-5));
    }

    #[test]
    fn test_interpolated_material_and_uv() {
        let red = Coefficients {
            diffuse: Vec3::X,
            ..Default::default()
        };
        let blue = Coefficients {
            diffuse: Vec3::Z,
            ..Default::default()
        };
        let mesh = quad()
            .with_vertex_materials(vec![red, red, blue, blue])
            .unwrap()
            .with_tex_coords(vec![Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y])
            .unwrap();
        let mesh = Arc::new(mesh);
        let face = MeshFace::new(mesh, 0);

        let hit = face.intersect_local(&Ray::new(Vec3::new(0.9, -0.9, 1.0), -Vec3::Z)).unwrap();
        let kd = hit.material.as_ref().unwrap().coefficients().diffuse;
        assert!(kd.x > kd.z, "closer to red corners: {kd:?}");
        let uv = hit.uv.unwrap();
        assert!((uv - Vec2::new(0.95, 0.05)).length() < 1e-4);
    }
}
