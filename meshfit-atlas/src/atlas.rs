//! Atlas packing
//!
//! Charts are scaled by one shared texels-per-unit factor so texel density
//! is uniform across the atlas. Each chart occupies an integer texel
//! rectangle; the skyline packer reserves that rectangle plus `padding`
//! texels on its right and top, so any two charts end up at least `padding`
//! texels apart. When a layout does not fit, the scale shrinks in proportion
//! to the fraction of charts that failed and packing starts over.

use crate::chart::{build_charts, ChartConfig};
use crate::flatten::{flatten_chart, FlatChart};
use crate::pack::SkylinePacker;
use crate::parallel::{parallel_map, ThreadPoolConfig};
use itertools::Itertools;
use log::{debug, info, warn};
use meshfit_core::{Error, Point2f, Result, TriangleMesh};
use serde::{Deserialize, Serialize};

/// Layout parameters for [`AtlasPacker`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    /// Minimum empty texels between two charts
    pub padding: u32,
    /// Layout attempts before giving up
    pub max_iterations: u32,
    /// Keep every UV half a texel inside its chart so bilinear taps stay in-chart
    pub bilinear: bool,
    /// Fraction of the atlas the first attempt tries to cover
    pub target_utilization: f64,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            padding: 2,
            max_iterations: 4,
            bilinear: true,
            target_utilization: 0.75,
        }
    }
}

impl PackConfig {
    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_bilinear(mut self, bilinear: bool) -> Self {
        self.bilinear = bilinear;
        self
    }

    pub fn with_target_utilization(mut self, utilization: f64) -> Self {
        self.target_utilization = utilization;
        self
    }
}

/// Where a chart landed, in texels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPlacement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub face_count: usize,
}

impl ChartPlacement {
    /// Empty texels between two placements along the axis that separates
    /// them (0 if they overlap).
    pub fn gap(&self, other: &ChartPlacement) -> u32 {
        let gap_x = (other.x.saturating_sub(self.x + self.width))
            .max(self.x.saturating_sub(other.x + other.width));
        let gap_y = (other.y.saturating_sub(self.y + self.height))
            .max(self.y.saturating_sub(other.y + other.height));
        gap_x.max(gap_y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasStats {
    pub resolution: u32,
    pub chart_count: usize,
    /// Share of atlas texels covered by chart rectangles
    pub utilization: f32,
    /// Layout attempts used, including the successful one
    pub iterations: u32,
    pub texels_per_unit: f64,
}

/// New parameterization of a mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasResult {
    /// Original vertex index of every new vertex
    pub vertex_mapping: Vec<usize>,
    /// New triangles, one per input face in input order
    pub indices: Vec<[usize; 3]>,
    /// Per new vertex, in `[0, 1] × [0, 1]`
    pub uvs: Vec<[f32; 2]>,
    /// Per chart, in charting order
    pub charts: Vec<ChartPlacement>,
    pub stats: AtlasStats,
}

impl AtlasResult {
    pub fn vertex_count(&self) -> usize {
        self.vertex_mapping.len()
    }

    /// Rebuild `mesh` with split seam vertices and the new UVs.
    ///
    /// `mesh` must be the mesh this atlas was computed from.
    pub fn apply_to(&self, mesh: &TriangleMesh) -> Result<TriangleMesh> {
        if let Some(&bad) = self.vertex_mapping.iter().find(|&&v| v >= mesh.vertex_count()) {
            return Err(Error::InvalidParameter(format!(
                "atlas references vertex {} but mesh has {}",
                bad,
                mesh.vertex_count()
            )));
        }

        let mut out = TriangleMesh::from_vertices_and_faces(
            self.vertex_mapping.iter().map(|&v| mesh.vertices[v]).collect(),
            self.indices.clone(),
        );
        if let Some(normals) = &mesh.normals {
            out.set_normals(self.vertex_mapping.iter().map(|&v| normals[v]).collect());
        }
        if let Some(colors) = &mesh.colors {
            out.set_colors(self.vertex_mapping.iter().map(|&v| colors[v]).collect());
        }
        out.set_uvs(self.uvs.iter().map(|&[u, v]| Point2f::new(u, v)).collect());
        Ok(out)
    }
}

/// Texel footprint of a chart at `scale` texels per unit.
fn content_size(chart: &FlatChart, scale: f64, bilinear: bool) -> (u32, u32) {
    let texels = |extent: f64| {
        let t = (extent * scale).ceil().max(0.0) as u32;
        if bilinear {
            t + 1
        } else {
            t.max(1)
        }
    };
    (texels(chart.width), texels(chart.height))
}

struct Layout {
    origins: Vec<Option<(u32, u32)>>,
    sizes: Vec<(u32, u32)>,
    placed: usize,
    utilization: f64,
}

/// Charts the surface, flattens the charts and packs them into one atlas
#[derive(Debug, Clone, Default)]
pub struct AtlasPacker {
    chart_config: ChartConfig,
    pack_config: PackConfig,
    threads: ThreadPoolConfig,
}

impl AtlasPacker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chart_config(mut self, config: ChartConfig) -> Self {
        self.chart_config = config;
        self
    }

    pub fn with_pack_config(mut self, config: PackConfig) -> Self {
        self.pack_config = config;
        self
    }

    pub fn with_thread_pool(mut self, config: ThreadPoolConfig) -> Self {
        self.threads = config;
        self
    }

    pub fn chart_config(&self) -> &ChartConfig {
        &self.chart_config
    }

    pub fn pack_config(&self) -> &PackConfig {
        &self.pack_config
    }

    /// Initial texels per unit: aim for the target utilization, but never
    /// let the largest chart outgrow the atlas.
    fn initial_scale(&self, charts: &[FlatChart], resolution: u32) -> f64 {
        let res = resolution as f64;
        let total_area: f64 = charts.iter().map(|c| c.width * c.height).sum();
        let largest = charts
            .iter()
            .map(|c| c.width.max(c.height))
            .fold(0.0, f64::max);

        let mut scale = if total_area > 0.0 {
            (self.pack_config.target_utilization * res * res / total_area).sqrt()
        } else if largest > 0.0 {
            res / largest
        } else {
            1.0
        };
        if largest > 0.0 {
            scale = scale.min((res - 2.0).max(0.0) / largest);
        }
        if scale.is_finite() {
            scale.max(0.0)
        } else {
            1.0
        }
    }

    fn layout(&self, charts: &[FlatChart], order: &[usize], scale: f64, resolution: u32) -> Layout {
        let padding = self.pack_config.padding;
        let sizes: Vec<(u32, u32)> = charts
            .iter()
            .map(|c| content_size(c, scale, self.pack_config.bilinear))
            .collect();

        let bin = resolution.saturating_add(padding);
        let mut packer = SkylinePacker::new(bin, bin);
        let mut origins = vec![None; charts.len()];
        let mut placed = 0;
        let mut covered = 0u64;

        for &i in order {
            let (w, h) = sizes[i];
            if let Some(origin) = packer.insert(w.saturating_add(padding), h.saturating_add(padding)) {
                origins[i] = Some(origin);
                placed += 1;
                covered += w as u64 * h as u64;
            }
        }

        Layout {
            origins,
            sizes,
            placed,
            utilization: covered as f64 / (resolution as f64 * resolution as f64),
        }
    }

    /// Pack `mesh` into a square atlas of `resolution` texels per side.
    pub fn pack(&self, mesh: &TriangleMesh, resolution: u32) -> Result<AtlasResult> {
        mesh.validate()?;
        if resolution == 0 {
            return Err(Error::InvalidParameter(
                "texture resolution must be positive".to_string(),
            ));
        }
        if self.pack_config.max_iterations == 0 {
            return Err(Error::InvalidParameter(
                "max_iterations must be at least 1".to_string(),
            ));
        }

        let charts = build_charts(mesh, &self.chart_config);
        let flat: Vec<FlatChart> =
            parallel_map(&self.threads, &charts, |chart| flatten_chart(mesh, chart));
        debug!("Atlas: {} faces split into {} charts", mesh.face_count(), flat.len());

        // Tallest first suits the skyline; area and index make the order total
        let order: Vec<usize> = (0..flat.len())
            .sorted_by(|&a, &b| {
                flat[b]
                    .height
                    .total_cmp(&flat[a].height)
                    .then(flat[b].area.total_cmp(&flat[a].area))
                    .then(a.cmp(&b))
            })
            .collect();

        let mut scale = self.initial_scale(&flat, resolution);
        let mut best: Option<(f64, usize)> = None;

        for iteration in 1..=self.pack_config.max_iterations {
            let layout = self.layout(&flat, &order, scale, resolution);

            if layout.placed == flat.len() {
                info!(
                    "Packed {} charts at {}x{} in {} iteration(s), utilization {:.3}",
                    flat.len(),
                    resolution,
                    resolution,
                    iteration,
                    layout.utilization
                );
                return Ok(self.assemble(mesh, &flat, layout, scale, resolution, iteration));
            }

            if best.map_or(true, |(u, _)| layout.utilization > u) {
                best = Some((layout.utilization, layout.placed));
            }
            let fraction = layout.placed as f64 / flat.len() as f64;
            let shrink = (0.9 * fraction.sqrt()).clamp(0.5, 0.95);
            warn!(
                "Atlas attempt {}: placed {}/{} charts at {:.3} texels/unit, shrinking by {:.3}",
                iteration,
                layout.placed,
                flat.len(),
                scale,
                shrink
            );
            scale *= shrink;
        }

        let (utilization, placed_charts) = best.unwrap_or((0.0, 0));
        Err(Error::AtlasPacking {
            iterations: self.pack_config.max_iterations,
            utilization: utilization as f32,
            placed_charts,
            total_charts: flat.len(),
        })
    }

    fn assemble(
        &self,
        mesh: &TriangleMesh,
        flat: &[FlatChart],
        layout: Layout,
        scale: f64,
        resolution: u32,
        iterations: u32,
    ) -> AtlasResult {
        let res = resolution as f64;
        let half = if self.pack_config.bilinear { 0.5 } else { 0.0 };
        let total_vertices = flat.iter().map(FlatChart::vertex_count).sum();

        let mut vertex_mapping = Vec::with_capacity(total_vertices);
        let mut uvs = Vec::with_capacity(total_vertices);
        let mut indices = vec![[0usize; 3]; mesh.face_count()];
        let mut charts = Vec::with_capacity(flat.len());

        for (chart, (origin, &(width, height))) in flat.iter().zip(layout.origins.iter().zip(&layout.sizes)) {
            let (x, y) = origin.unwrap_or((0, 0));
            let offset = vertex_mapping.len();

            vertex_mapping.extend_from_slice(&chart.vertex_mapping);
            uvs.extend(chart.coords.iter().map(|p| {
                let u = (x as f64 + half + p.x * scale) / res;
                let v = (y as f64 + half + p.y * scale) / res;
                [u.clamp(0.0, 1.0) as f32, v.clamp(0.0, 1.0) as f32]
            }));
            for &(face, corners) in &chart.faces {
                indices[face] = corners.map(|c| c + offset);
            }

            charts.push(ChartPlacement {
                x,
                y,
                width,
                height,
                face_count: chart.faces.len(),
            });
        }

        AtlasResult {
            vertex_mapping,
            indices,
            uvs,
            charts,
            stats: AtlasStats {
                resolution,
                chart_count: flat.len(),
                utilization: layout.utilization as f32,
                iterations,
                texels_per_unit: scale,
            },
        }
    }
}

/// Pack `mesh` with default charting and the given layout limits.
pub fn pack_atlas(
    mesh: &TriangleMesh,
    resolution: u32,
    padding: u32,
    max_iterations: u32,
) -> Result<AtlasResult> {
    AtlasPacker::new()
        .with_pack_config(
            PackConfig::default()
                .with_padding(padding)
                .with_max_iterations(max_iterations),
        )
        .pack(mesh, resolution)
}
