//! Charting: partition a mesh surface into UV islands
//!
//! Charts grow breadth-first from seed faces taken in face order. A face
//! joins the chart of its neighbor only across a manifold edge whose dihedral
//! angle stays under the crease angle, and only while its normal stays within
//! the maximum deviation of the chart's seed normal. Every face of a chart
//! therefore projects onto the seed plane with positive orientation.
//!
//! A face whose projection would cover part of a face already in the chart
//! is left for a later chart, so the flattened chart never folds over itself
//! (ramps, threads and other surfaces that wind around the axis).

use crate::flatten::tangent_basis;
use meshfit_core::{to_f64, Drawable, TriangleMesh, Vector3d};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Faces closer than this to edge-on (cosine to the axis) flatten to slivers
/// and never join a chart.
const MIN_AXIS_COS: f64 = 1e-3;

/// Upper bound on grid resolution along the mesh diagonal
const MAX_GRID_CELLS: f64 = 256.0;

/// Thresholds controlling where charts are cut
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Largest angle between a face normal and its chart's projection axis
    pub max_normal_deviation_deg: f64,
    /// Dihedral angle above which an edge always becomes a chart seam
    pub crease_angle_deg: f64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            max_normal_deviation_deg: 60.0,
            crease_angle_deg: 45.0,
        }
    }
}

impl ChartConfig {
    pub fn with_max_normal_deviation(mut self, degrees: f64) -> Self {
        self.max_normal_deviation_deg = degrees;
        self
    }

    pub fn with_crease_angle(mut self, degrees: f64) -> Self {
        self.crease_angle_deg = degrees;
        self
    }
}

/// A connected set of faces flattened together
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    /// Face indices in the order they joined the chart
    pub faces: Vec<usize>,
    /// Projection axis (seed face normal)
    pub axis: Vector3d,
    /// Surface area in mesh units
    pub area: f64,
}

/// Unit normal and area of every face; degenerate faces get a zero normal.
pub fn face_normals_and_areas(mesh: &TriangleMesh) -> (Vec<Vector3d>, Vec<f64>) {
    mesh.faces
        .iter()
        .map(|&[a, b, c]| {
            let p0 = to_f64(&mesh.vertices[a]);
            let cross = (to_f64(&mesh.vertices[b]) - p0).cross(&(to_f64(&mesh.vertices[c]) - p0));
            let normal = cross.try_normalize(f64::EPSILON).unwrap_or_else(Vector3d::zeros);
            (normal, cross.norm() * 0.5)
        })
        .unzip()
}

/// Neighbor across each edge `(v0,v1)`, `(v1,v2)`, `(v2,v0)` of every face.
///
/// Only manifold edges (exactly two incident faces) connect faces; boundary
/// and non-manifold edges yield `None`.
pub fn face_adjacency(mesh: &TriangleMesh) -> Vec<[Option<usize>; 3]> {
    let mut edge_faces: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for (fi, face) in mesh.faces.iter().enumerate() {
        for k in 0..3 {
            let (a, b) = (face[k], face[(k + 1) % 3]);
            edge_faces.entry((a.min(b), a.max(b))).or_default().push(fi);
        }
    }

    mesh.faces
        .iter()
        .enumerate()
        .map(|(fi, face)| {
            let mut adjacent = [None; 3];
            for (k, slot) in adjacent.iter_mut().enumerate() {
                let (a, b) = (face[k], face[(k + 1) % 3]);
                if let Some(faces) = edge_faces.get(&(a.min(b), a.max(b))) {
                    if faces.len() == 2 {
                        *slot = faces.iter().copied().find(|&g| g != fi);
                    }
                }
            }
            adjacent
        })
        .collect()
}

/// Whether two counter-clockwise triangles share interior area.
///
/// Triangles that only touch along an edge or at a vertex do not overlap.
/// Separating axis test over the six edge normals.
pub fn triangles_overlap(a: &[Point2<f64>; 3], b: &[Point2<f64>; 3]) -> bool {
    let longest = a
        .iter()
        .zip(a.iter().cycle().skip(1))
        .chain(b.iter().zip(b.iter().cycle().skip(1)))
        .map(|(p, q)| (q - p).norm())
        .fold(0.0, f64::max);
    let tolerance = longest * 1e-9;

    for tri in [a, b] {
        for k in 0..3 {
            let edge = tri[(k + 1) % 3] - tri[k];
            let length = edge.norm();
            if length == 0.0 {
                continue;
            }
            let normal = nalgebra::Vector2::new(-edge.y, edge.x) / length;
            let span = |t: &[Point2<f64>; 3]| {
                t.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                    let d = p.coords.dot(&normal);
                    (lo.min(d), hi.max(d))
                })
            };
            let (min_a, max_a) = span(a);
            let (min_b, max_b) = span(b);
            if max_a <= min_b + tolerance || max_b <= min_a + tolerance {
                return false;
            }
        }
    }
    true
}

/// Projected triangles of one chart, bucketed on a uniform grid
struct ProjectedGrid {
    u: Vector3d,
    v: Vector3d,
    cell_size: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
    triangles: Vec<[Point2<f64>; 3]>,
}

impl ProjectedGrid {
    fn new(axis: &Vector3d, cell_size: f64) -> Self {
        let (u, v) = tangent_basis(axis);
        Self {
            u,
            v,
            cell_size,
            cells: HashMap::new(),
            triangles: Vec::new(),
        }
    }

    fn project(&self, mesh: &TriangleMesh, face: usize) -> [Point2<f64>; 3] {
        mesh.faces[face].map(|vi| {
            let p = to_f64(&mesh.vertices[vi]).coords;
            Point2::new(p.dot(&self.u), p.dot(&self.v))
        })
    }

    fn cell_range(&self, tri: &[Point2<f64>; 3]) -> ((i64, i64), (i64, i64)) {
        let cell = |x: f64| (x / self.cell_size).floor() as i64;
        let (lo, hi) = tri.iter().fold(
            (Point2::new(f64::INFINITY, f64::INFINITY), Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY)),
            |(lo, hi), p| (lo.inf(p), hi.sup(p)),
        );
        ((cell(lo.x), cell(lo.y)), (cell(hi.x), cell(hi.y)))
    }

    fn overlaps(&self, tri: &[Point2<f64>; 3]) -> bool {
        let ((x0, y0), (x1, y1)) = self.cell_range(tri);
        for x in x0..=x1 {
            for y in y0..=y1 {
                let Some(ids) = self.cells.get(&(x, y)) else {
                    continue;
                };
                if ids.iter().any(|&id| triangles_overlap(&self.triangles[id], tri)) {
                    return true;
                }
            }
        }
        false
    }

    fn insert(&mut self, tri: [Point2<f64>; 3]) {
        let id = self.triangles.len();
        let ((x0, y0), (x1, y1)) = self.cell_range(&tri);
        for x in x0..=x1 {
            for y in y0..=y1 {
                self.cells.entry((x, y)).or_default().push(id);
            }
        }
        self.triangles.push(tri);
    }
}

/// Grid cell edge: mean mesh edge length, but never finer than
/// [`MAX_GRID_CELLS`] cells along the bounding box diagonal.
fn grid_cell_size(mesh: &TriangleMesh) -> f64 {
    let total: f64 = mesh
        .faces
        .iter()
        .map(|&[a, b, c]| {
            let (pa, pb, pc) = (to_f64(&mesh.vertices[a]), to_f64(&mesh.vertices[b]), to_f64(&mesh.vertices[c]));
            (pb - pa).norm() + (pc - pb).norm() + (pa - pc).norm()
        })
        .sum();
    let mean = total / (3 * mesh.faces.len()) as f64;
    let size = mean.max(mesh.diagonal() as f64 / MAX_GRID_CELLS);
    if size.is_finite() && size > 0.0 {
        size
    } else {
        1.0
    }
}

/// Split the surface of `mesh` into charts.
///
/// Every face lands in exactly one chart. Charts are returned in the order of
/// their seed face, so the result depends only on mesh topology and geometry.
/// No two faces of a chart overlap once projected onto its axis plane.
pub fn build_charts(mesh: &TriangleMesh, config: &ChartConfig) -> Vec<Chart> {
    let (normals, areas) = face_normals_and_areas(mesh);
    let adjacency = face_adjacency(mesh);
    let min_crease_cos = config.crease_angle_deg.to_radians().cos();
    let min_axis_cos = config.max_normal_deviation_deg.to_radians().cos().max(MIN_AXIS_COS);
    let cell_size = grid_cell_size(mesh);

    let mut assigned = vec![false; mesh.faces.len()];
    let mut charts = Vec::new();
    let mut queue = VecDeque::new();

    for seed in 0..mesh.faces.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;

        let axis = if normals[seed] == Vector3d::zeros() {
            Vector3d::z()
        } else {
            normals[seed]
        };
        let mut chart = Chart {
            faces: vec![seed],
            axis,
            area: areas[seed],
        };
        let mut grid = ProjectedGrid::new(&axis, cell_size);

        // A zero-area face has no meaningful orientation and stays alone
        if normals[seed] != Vector3d::zeros() {
            grid.insert(grid.project(mesh, seed));
            queue.push_back(seed);
        }

        while let Some(face) = queue.pop_front() {
            for neighbor in adjacency[face].iter().flatten().copied() {
                if assigned[neighbor] {
                    continue;
                }
                let n = &normals[neighbor];
                if n.dot(&normals[face]) < min_crease_cos || n.dot(&axis) < min_axis_cos {
                    continue;
                }
                let projected = grid.project(mesh, neighbor);
                if grid.overlaps(&projected) {
                    continue;
                }
                grid.insert(projected);
                assigned[neighbor] = true;
                chart.faces.push(neighbor);
                chart.area += areas[neighbor];
                queue.push_back(neighbor);
            }
        }

        charts.push(chart);
    }

    charts
}
