// Hierarchical affine transforms.
//
// Every primitive intersects in its own local frame. A transform node stores
// the composed local-to-world matrix, its inverse, and the inverse-transpose
// of the linear part for carrying normals back to world space.

use glam::{Mat3, Mat4, Vec3};

use crate::{Aabb, Ray};

/// Extension trait for Mat4 with the helpers ray tracing needs on top of glam.
pub trait Mat4Ext {
    /// Transform an axis-aligned bounding box.
    /// Computes the bounding box of all 8 transformed corners.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;

    /// Inverse-transpose of the upper 3x3 block, used to transform normals.
    fn normal_matrix(&self) -> Mat3;
}

impl Mat4Ext for Mat4 {
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        if aabb.is_empty() {
            return Aabb::EMPTY;
        }
        Aabb::from_iter_points(aabb.corners().iter().map(|&c| self.transform_point3(c)))
    }

    fn normal_matrix(&self) -> Mat3 {
        Mat3::from_mat4(*self).inverse().transpose()
    }
}

/// A resolved world transform: forward matrix, inverse, and normal matrix.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub xform: Mat4,
    pub inverse: Mat4,
    pub normal_matrix: Mat3,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        xform: Mat4::IDENTITY,
        inverse: Mat4::IDENTITY,
        normal_matrix: Mat3::IDENTITY,
    };

    pub fn from_matrix(xform: Mat4) -> Self {
        Self {
            xform,
            inverse: xform.inverse(),
            normal_matrix: xform.normal_matrix(),
        }
    }

    /// This transform followed (in local space) by `local`.
    pub fn compose(&self, local: Mat4) -> Self {
        Self::from_matrix(self.xform * local)
    }

    /// False for singular matrices, whose inverse is meaningless.
    pub fn is_invertible(&self) -> bool {
        let det = self.xform.determinant();
        det.is_finite() && det.abs() > 1e-12
    }

    pub fn is_identity(&self) -> bool {
        self.xform == Mat4::IDENTITY
    }

    pub fn point_to_local(&self, p: Vec3) -> Vec3 {
        self.inverse.transform_point3(p)
    }

    pub fn point_to_world(&self, p: Vec3) -> Vec3 {
        self.xform.transform_point3(p)
    }

    pub fn vector_to_world(&self, v: Vec3) -> Vec3 {
        self.xform.transform_vector3(v)
    }

    pub fn normal_to_world(&self, n: Vec3) -> Vec3 {
        (self.normal_matrix * n).normalize_or_zero()
    }

    pub fn aabb_to_world(&self, aabb: &Aabb) -> Aabb {
        self.xform.transform_aabb(aabb)
    }

    /// Carry a world ray into local space.
    ///
    /// Returns the local ray (unit direction) and the length the world unit
    /// direction has in local space. A local hit distance `t` corresponds to
    /// the world distance `t / scale`.
    pub fn ray_to_local(&self, ray: &Ray) -> (Ray, f32) {
        let origin = self.point_to_local(ray.origin);
        let dir = self.inverse.transform_vector3(ray.direction);
        let scale = dir.length();
        let local = Ray {
            origin,
            direction: if scale > 0.0 { dir / scale } else { Vec3::ZERO },
            time: ray.time,
            medium_ior: ray.medium_ior,
        };
        (local, scale)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Handle of a node inside a [`TransformTree`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TransformId(usize);

/// A node of the transform hierarchy.
#[derive(Debug, Clone)]
pub struct TransformNode {
    transform: Transform,
    parent: Option<TransformId>,
    children: Vec<TransformId>,
}

impl TransformNode {
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn parent(&self) -> Option<TransformId> {
        self.parent
    }

    pub fn children(&self) -> &[TransformId] {
        &self.children
    }
}

/// Arena-backed transform hierarchy with a single identity root.
///
/// Built once while the scene is assembled and never mutated afterwards;
/// primitives copy the resolved [`Transform`] of the node they attach to.
#[derive(Debug, Clone)]
pub struct TransformTree {
    nodes: Vec<TransformNode>,
}

impl TransformTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![TransformNode {
                transform: Transform::IDENTITY,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> TransformId {
        TransformId(0)
    }

    /// Create a child whose world transform is `parent * local`.
    pub fn add_child(&mut self, parent: TransformId, local: Mat4) -> TransformId {
        let transform = self.nodes[parent.0].transform.compose(local);
        let id = TransformId(self.nodes.len());
        self.nodes.push(TransformNode {
            transform,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn node(&self, id: TransformId) -> &TransformNode {
        &self.nodes[id.0]
    }

    pub fn transform(&self, id: TransformId) -> Transform {
        self.nodes[id.0].transform
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for TransformTree {
    fn default() -> Self {
        Self::new()
    }
}
