//! Core data structures and traits for meshfit
//! 
//! This crate provides the fundamental types shared by the decimation,
//! atlas and pipeline crates: points, triangle meshes, essential traits
//! and the common error type.

pub mod point;
pub mod mesh;
pub mod traits;
pub mod error;

pub use point::*;
pub use mesh::*;
pub use traits::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point2, Point3, Vector2, Vector3, Matrix3, Matrix4};

// Type aliases for easier imports
pub type Mesh = TriangleMesh;
