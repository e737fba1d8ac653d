//! UV re-atlasing for meshfit
//!
//! This crate rebuilds a texture parameterization for a mesh whose topology
//! has changed:
//! - Charting: split the surface into islands of bounded normal deviation
//! - Flattening: project each island and rotate it into its tightest rectangle
//! - Packing: place islands into a square atlas with a skyline bin packer
//!
//! Per-chart flattening runs on a rayon pool; output is identical for any
//! worker count.

pub mod chart;
pub mod flatten;
pub mod pack;
pub mod atlas;
pub mod parallel;

pub use chart::*;
pub use flatten::*;
pub use pack::*;
pub use atlas::*;
pub use parallel::{init_thread_pool, parallel_map, ThreadPoolConfig};
