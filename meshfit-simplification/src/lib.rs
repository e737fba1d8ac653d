//! Mesh simplification and decimation algorithms
//! 
//! This crate reduces mesh complexity while preserving shape:
//! - Quadric error metric math
//! - Greedy edge collapse decimation driven by quadric error
//! - Post-decimation repair (welding, degenerate and unreferenced cleanup)

pub mod quadric_error;
pub mod edge_collapse;
pub mod repair;

pub use quadric_error::*;
pub use edge_collapse::*;
pub use repair::*;

use meshfit_core::{TriangleMesh, Result};

/// Simplify a mesh by reducing the number of faces/vertices
pub trait MeshSimplifier {
    /// Decimate `mesh` toward `target_face_count` faces.
    ///
    /// When `preserve_uv` is set, texture coordinates survive only if the
    /// topology was left untouched; any collapse invalidates them.
    fn simplify(
        &self,
        mesh: &TriangleMesh,
        target_face_count: usize,
        preserve_uv: bool,
    ) -> Result<TriangleMesh>;
}
