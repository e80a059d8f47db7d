//! Scene construction errors.
//!
//! Everything here is raised while a scene is assembled; render-time numeric
//! edge cases never produce errors and degrade to zero contributions instead.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SceneError {
    #[error("mesh {mesh}: face {face} is degenerate (zero area)")]
    DegenerateTriangle { mesh: String, face: usize },

    #[error("mesh {mesh}: face {face} references vertex {index} but only {count} vertices exist")]
    FaceIndexOutOfRange {
        mesh: String,
        face: usize,
        index: u32,
        count: usize,
    },

    #[error("mesh {mesh}: expected {expected} per-vertex {attribute}, found {found}")]
    AttributeCountMismatch {
        mesh: String,
        attribute: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("primitive {0:?} is defined twice")]
    DuplicatePrimitive(String),

    #[error("CSG {csg}: unknown operand {operand:?}")]
    UnknownPrimitive { csg: String, operand: String },

    #[error("CSG {csg}: operand {operand:?} is already used by another CSG node")]
    OperandReused { csg: String, operand: String },

    #[error("CSG {csg}: operand {operand:?} ({kind}) is not a closed solid")]
    UnsupportedCsgOperand {
        csg: String,
        operand: String,
        kind: &'static str,
    },

    #[error("CSG {csg}: nesting depth {depth} exceeds the maximum of {max}")]
    CsgTooDeep { csg: String, depth: usize, max: usize },

    #[error("primitive {name:?} ({kind}) is emissive but cannot be sampled as an area emitter")]
    UnsupportedEmitter { name: String, kind: &'static str },

    #[error("CSG {0:?}: transforms belong on the operands, not the CSG node")]
    TransformedCsg(String),

    #[error("primitive {0:?} has a singular transform")]
    SingularTransform(String),

    #[error("primitive {name:?} references unknown material #{index}")]
    UnknownMaterial { name: String, index: usize },

    #[error("light #{index}: {reason}")]
    InvalidLight { index: usize, reason: &'static str },

    #[error("camera aspect ratio must be positive, got {0}")]
    InvalidAspectRatio(f32),

    #[error("invalid value for {name}: {value}")]
    InvalidParameter { name: &'static str, value: String },
}
