//! Optimization report

use crate::preset::{Platform, Quality};
use meshfit_atlas::AtlasResult;
use meshfit_simplification::SimplificationStats;
use serde::Serialize;
use std::fmt;

/// Parameters used and results produced by one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationReport {
    /// Platform name as the caller gave it
    pub requested_platform: String,
    /// Quality name as the caller gave it
    pub requested_quality: String,
    /// Preset row actually used
    pub platform: Platform,
    /// Preset column actually used
    pub quality: Quality,
    pub target_face_count: usize,
    pub texture_resolution: u32,
    pub simplification: SimplificationStats,
    pub atlas: AtlasResult,
}

impl OptimizationReport {
    /// Whether the requested names resolved to a fallback preset
    pub fn used_fallback(&self) -> bool {
        !self.requested_platform.trim().eq_ignore_ascii_case(self.platform.as_str())
            || !self.requested_quality.trim().eq_ignore_ascii_case(self.quality.as_str())
    }

    /// Output faces as a fraction of input faces
    pub fn reduction_ratio(&self) -> f64 {
        if self.simplification.input_faces == 0 {
            1.0
        } else {
            self.simplification.output_faces as f64 / self.simplification.input_faces as f64
        }
    }
}

impl fmt::Display for OptimizationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Platform: {} ({})", self.platform, self.quality)?;
        if self.used_fallback() {
            write!(
                f,
                " [requested {}/{}]",
                self.requested_platform, self.requested_quality
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "Faces: {} -> {} (target {}, {} collapses)",
            self.simplification.input_faces,
            self.simplification.output_faces,
            self.target_face_count,
            self.simplification.collapses
        )?;
        writeln!(f, "{}", self.simplification.repair)?;
        write!(
            f,
            "Atlas: {}x{}, {} charts, utilization {:.1}%, {} iteration(s)",
            self.texture_resolution,
            self.texture_resolution,
            self.atlas.stats.chart_count,
            self.atlas.stats.utilization * 100.0,
            self.atlas.stats.iterations
        )
    }
}
