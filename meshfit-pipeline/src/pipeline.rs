//! Decimate-then-atlas optimization pipeline
//!
//! Resolves the preset for a platform and quality tier, simplifies the mesh
//! to the preset's face budget and rebuilds its UV atlas at the preset's
//! texture resolution. Stage errors are returned unchanged; no stage is
//! retried with looser parameters.

use crate::preset::{Platform, PresetResolver, Quality};
use crate::report::OptimizationReport;
use log::{debug, info};
use meshfit_atlas::{AtlasPacker, ChartConfig, PackConfig, ThreadPoolConfig};
use meshfit_core::{Result, TriangleMesh};
use meshfit_simplification::{DecimationConfig, EdgeCollapseSimplifier};
use serde::{Deserialize, Serialize};

/// Stage settings shared by every pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub decimation: DecimationConfig,
    pub chart: ChartConfig,
    pub pack: PackConfig,
    pub threads: ThreadPoolConfig,
    /// Keep input UVs when decimation leaves the topology untouched
    pub preserve_uv: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            decimation: DecimationConfig::default(),
            chart: ChartConfig::default(),
            pack: PackConfig::default(),
            threads: ThreadPoolConfig::default(),
            preserve_uv: true,
        }
    }
}

impl PipelineConfig {
    pub fn with_decimation(mut self, decimation: DecimationConfig) -> Self {
        self.decimation = decimation;
        self
    }

    pub fn with_chart(mut self, chart: ChartConfig) -> Self {
        self.chart = chart;
        self
    }

    pub fn with_pack(mut self, pack: PackConfig) -> Self {
        self.pack = pack;
        self
    }

    pub fn with_threads(mut self, threads: ThreadPoolConfig) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_preserve_uv(mut self, preserve_uv: bool) -> Self {
        self.preserve_uv = preserve_uv;
        self
    }
}

/// Runs preset resolution, simplification and atlas packing in sequence
#[derive(Debug, Clone)]
pub struct OptimizationPipeline {
    config: PipelineConfig,
    simplifier: EdgeCollapseSimplifier,
    packer: AtlasPacker,
}

impl OptimizationPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let simplifier = EdgeCollapseSimplifier::with_config(config.decimation.clone());
        let packer = AtlasPacker::new()
            .with_chart_config(config.chart.clone())
            .with_pack_config(config.pack.clone())
            .with_thread_pool(config.threads.clone());
        Self {
            config,
            simplifier,
            packer,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Optimize `mesh` for a deployment target.
    ///
    /// Returns the decimated mesh, re-indexed so that every vertex carries
    /// its atlas UV, together with the report. The input is never modified.
    pub fn optimize_for_platform(
        &self,
        mesh: &TriangleMesh,
        platform: Platform,
        quality: Quality,
    ) -> Result<(TriangleMesh, OptimizationReport)> {
        self.optimize(mesh, platform, quality, platform.as_str(), quality.as_str())
    }

    /// Same as [`Self::optimize_for_platform`] for raw configuration strings;
    /// unknown values fall back to the default preset row or column. The
    /// report keeps the strings as given.
    pub fn optimize_for_platform_str(
        &self,
        mesh: &TriangleMesh,
        platform: &str,
        quality: &str,
    ) -> Result<(TriangleMesh, OptimizationReport)> {
        self.optimize(
            mesh,
            Platform::parse_lossy(platform),
            Quality::parse_lossy(quality),
            platform,
            quality,
        )
    }

    fn optimize(
        &self,
        mesh: &TriangleMesh,
        platform: Platform,
        quality: Quality,
        requested_platform: &str,
        requested_quality: &str,
    ) -> Result<(TriangleMesh, OptimizationReport)> {
        let preset = PresetResolver::resolve(platform, quality);
        info!(
            "Optimizing {} faces for {}/{}: target {} faces, {}px atlas",
            mesh.face_count(),
            platform,
            quality,
            preset.target_face_count,
            preset.texture_resolution
        );

        let simplified = self.simplifier.simplify_with_stats(
            mesh,
            preset.target_face_count,
            self.config.preserve_uv,
        )?;
        debug!(
            "Simplification stage done: {} faces, surface area {:.4} -> {:.4}, {}",
            simplified.mesh.face_count(),
            mesh.surface_area(),
            simplified.mesh.surface_area(),
            simplified.stats.repair
        );

        let atlas = self.packer.pack(&simplified.mesh, preset.texture_resolution)?;
        let optimized = atlas.apply_to(&simplified.mesh)?;
        debug!(
            "Atlas stage done: {} charts, {} vertices after seam split",
            atlas.stats.chart_count,
            optimized.vertex_count()
        );

        let report = OptimizationReport {
            requested_platform: requested_platform.to_string(),
            requested_quality: requested_quality.to_string(),
            platform,
            quality,
            target_face_count: preset.target_face_count,
            texture_resolution: preset.texture_resolution,
            simplification: simplified.stats,
            atlas,
        };
        Ok((optimized, report))
    }
}

impl Default for OptimizationPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}
