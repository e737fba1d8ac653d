//! # meshfit
//!
//! Fit 3D meshes to a deployment budget: decimate to a platform's face count
//! and rebuild a clean UV atlas at its texture resolution.
//!
//! This is the umbrella crate that provides convenient access to all meshfit
//! functionality. You can use this crate to get everything in one place, or
//! use individual crates for more granular control over dependencies.
//!
//! ## Features
//!
//! - **Core**: Mesh data structures, errors
//! - **Simplification**: Quadric error edge collapse and mesh repair
//! - **Atlas**: UV charting and skyline atlas packing
//! - **Pipeline**: Platform presets and the end-to-end optimization pipeline
//!
//! ## Quick Start
//!
//! ```rust
//! use meshfit::prelude::*;
//!
//! let mesh = TriangleMesh::from_vertices_and_faces(
//!     vec![
//!         Point3f::new(0.0, 0.0, 0.0),
//!         Point3f::new(1.0, 0.0, 0.0),
//!         Point3f::new(1.0, 1.0, 0.0),
//!         Point3f::new(0.0, 1.0, 0.0),
//!     ],
//!     vec![[0, 1, 2], [0, 2, 3]],
//! );
//!
//! let (optimized, report) = OptimizationPipeline::default()
//!     .optimize_for_platform(&mesh, Platform::Mobile, Quality::Performance)?;
//! assert_eq!(report.texture_resolution, 256);
//! assert!(optimized.has_uvs());
//! # Ok::<(), meshfit::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: Enables simplification, atlas and pipeline
//! - `simplification`: Mesh decimation and repair
//! - `atlas`: UV re-atlasing
//! - `pipeline`: Presets and the optimization pipeline (pulls in the two above)
//! - `all`: Enables all features

// Re-export core functionality
pub use meshfit_core::*;

// Re-export sub-crates
#[cfg(feature = "simplification")]
pub use meshfit_simplification as simplification;

#[cfg(feature = "atlas")]
pub use meshfit_atlas as atlas;

#[cfg(feature = "pipeline")]
pub use meshfit_pipeline as pipeline;

/// Convenient imports for common use cases
pub mod prelude {
    pub use meshfit_core::*;

    #[cfg(feature = "simplification")]
    pub use meshfit_simplification::*;

    #[cfg(feature = "atlas")]
    pub use meshfit_atlas::*;

    #[cfg(feature = "pipeline")]
    pub use meshfit_pipeline::*;
}
