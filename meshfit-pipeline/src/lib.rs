//! Platform-targeted mesh optimization
//!
//! Resolves a (platform, quality) pair to a face budget and texture size,
//! decimates the mesh to that budget and rebuilds its UV atlas.

pub mod preset;
pub mod pipeline;
pub mod report;
pub mod telemetry;

pub use preset::*;
pub use pipeline::*;
pub use report::*;
pub use telemetry::*;
