//! Caustic light-transport core.
//!
//! CPU ray tracing over an immutable scene: a BVH over transformed
//! primitives (analytic shapes, triangle meshes, CSG trees), Phong,
//! microfacet and Fresnel dielectric materials, Whitted and path-traced
//! integrators, and a caustic photon map gathered through a k-d tree.
//!
//! Scenes are assembled with [`SceneBuilder`], handed to a [`Renderer`]
//! together with a [`Camera`] and [`RenderSettings`], and rendered per pixel,
//! per frame (in parallel buckets) or progressively.

pub mod sampling;
mod error;
mod hit;
mod shape;
mod sphere;
mod cuboid;
mod cylinder;
mod square;
mod mesh;
mod sdf;
mod texture;
mod material;
mod microfacet;
mod dielectric;
mod light;
mod settings;
mod primitive;
mod csg;
mod bvh;
mod scene;
mod kdtree;
mod photon;
mod whitted;
mod path;
mod camera;
mod renderer;
mod bucket;
mod progressive;

pub use error::SceneError;
pub use hit::{Intersection, MaterialId, PrimitiveId};
pub use shape::LocalShape;
pub use sphere::{MovingSphere, Sphere};
pub use cuboid::Cuboid;
pub use cylinder::{Cone, Cylinder};
pub use square::{Plane, Square};
pub use mesh::{MeshFace, TriangleMesh};
pub use sdf::{DistanceField, Metaball, TorusKnot, MARCH_EPSILON};
pub use texture::{PerlinNoise, SolidTexture};
pub use material::{glossy_reflect, BsdfSample, Coefficients, Color, Material};
pub use microfacet::Microfacet;
pub use dielectric::FresnelDielectric;
pub use light::{AmbientLight, AreaLight, DirectionalLight, EmittedPhoton, Falloff, Light, LightSample, PointLight, SpotLight};
pub use settings::{IntegratorMode, PhotonSettings, RenderSettings, SceneOptions, MAX_AA_EXPONENT};
pub use primitive::{Primitive, Shape, SurfaceSample};
pub use csg::{Csg, CsgOp, MAX_CSG_DEPTH};
pub use bvh::{Bvh, BvhNode};
pub use scene::{EmitterSample, EmitterTable, Scene, SceneBuilder};
pub use kdtree::{KdPoint, KdTree};
pub use photon::{Photon, PhotonMap, ProjectionMap, PROJECTION_RESOLUTION};
pub use whitted::WhittedIntegrator;
pub use path::PathIntegrator;
pub use camera::Camera;
pub use renderer::{color_to_rgb8, ImageBuffer, Renderer, Rgb8};
pub use bucket::{generate_buckets, render_bucket, Bucket, BucketResult, DEFAULT_BUCKET_SIZE};
pub use progressive::ProgressiveRender;

/// Re-export Vec3 and common math types from caustic_math
pub use caustic_math::{Aabb, Interval, Mat4, Ray, Transform, TransformId, TransformTree, Vec3, RAY_EPSILON};
