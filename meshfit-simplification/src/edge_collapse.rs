//! Edge collapse simplification
//!
//! Greedy quadric error metric (QEM) decimation. The working mesh is an arena
//! of vertex and face records addressed by stable indices, with vertex→face
//! incidence lists patched in place on every collapse.
//!
//! Collapse candidates sit in a priority queue ordered by ascending cost.
//! Entries are never removed eagerly: each one records the version stamps of
//! its two endpoints and is skipped on pop if either endpoint has changed
//! since it was queued.

use crate::quadric_error::Quadric;
use crate::repair::{repair_mesh, RepairConfig, RepairSummary, DEGENERATE_SINE};
use crate::MeshSimplifier;
use itertools::Itertools;
use log::{debug, info};
use meshfit_core::{to_f64, Error, Point3d, Point3f, Result, TriangleMesh, Vector3f};
use priority_queue::PriorityQueue;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Face count above which per-face quadrics are computed on the rayon pool
const PARALLEL_QUADRIC_THRESHOLD: usize = 4096;

// ============================================================
// Collapse Arena
// ============================================================

struct CollapseMesh {
    positions: Vec<Point3d>,
    quadrics: Vec<Quadric>,
    /// Bumped every time a vertex moves or dies
    stamps: Vec<u32>,
    vertex_alive: Vec<bool>,
    /// Live incident faces per vertex, ascending
    vertex_faces: Vec<Vec<usize>>,
    faces: Vec<[usize; 3]>,
    face_alive: Vec<bool>,
    active_face_count: usize,
    normals: Option<Vec<Vector3f>>,
    colors: Option<Vec<[u8; 3]>>,
}

impl CollapseMesh {
    fn from_triangle_mesh(mesh: &TriangleMesh) -> Self {
        let nv = mesh.vertices.len();
        let positions: Vec<Point3d> = mesh.vertices.iter().map(to_f64).collect();

        let face_quadric = |face: &[usize; 3]| -> Option<Quadric> {
            if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
                return None;
            }
            Quadric::from_triangle(
                &positions[face[0]],
                &positions[face[1]],
                &positions[face[2]],
            )
        };
        let face_quadrics: Vec<Option<Quadric>> =
            if mesh.faces.len() >= PARALLEL_QUADRIC_THRESHOLD {
                mesh.faces.par_iter().map(face_quadric).collect()
            } else {
                mesh.faces.iter().map(face_quadric).collect()
            };

        let mut quadrics = vec![Quadric::zero(); nv];
        let mut vertex_faces = vec![Vec::new(); nv];
        let mut face_alive = vec![false; mesh.faces.len()];
        let mut active_face_count = 0;

        for (fi, (face, q)) in mesh.faces.iter().zip(&face_quadrics).enumerate() {
            let Some(q) = q else {
                continue;
            };
            for &v in face {
                quadrics[v] += *q;
                vertex_faces[v].push(fi);
            }
            face_alive[fi] = true;
            active_face_count += 1;
        }

        Self {
            positions,
            quadrics,
            stamps: vec![0; nv],
            vertex_alive: vec![true; nv],
            vertex_faces,
            faces: mesh.faces.clone(),
            face_alive,
            active_face_count,
            normals: mesh.normals.clone(),
            colors: mesh.colors.clone(),
        }
    }

    #[inline]
    fn face_contains(&self, f: usize, v: usize) -> bool {
        self.faces[f].contains(&v)
    }

    /// Live faces containing both `a` and `b`.
    fn edge_faces(&self, a: usize, b: usize) -> Vec<usize> {
        self.vertex_faces[a]
            .iter()
            .copied()
            .filter(|&f| self.face_contains(f, b))
            .collect()
    }

    /// Vertices sharing a live face with `v`, ascending.
    fn neighbors(&self, v: usize) -> Vec<usize> {
        self.vertex_faces[v]
            .iter()
            .flat_map(|&f| self.faces[f])
            .filter(|&u| u != v)
            .sorted_unstable()
            .dedup()
            .collect()
    }

    fn is_boundary_vertex(&self, v: usize) -> bool {
        self.neighbors(v)
            .into_iter()
            .any(|n| self.edge_faces(v, n).len() == 1)
    }

    fn third_vertex(&self, f: usize, a: usize, b: usize) -> usize {
        self.faces[f]
            .iter()
            .copied()
            .find(|&v| v != a && v != b)
            .unwrap_or(a)
    }

    fn collapse_cost(&self, a: usize, b: usize) -> (Point3d, f64) {
        (self.quadrics[a] + self.quadrics[b]).optimal_position(&self.positions[a], &self.positions[b])
    }

    /// Check whether merging `remove` into `keep` at `target` keeps the mesh
    /// manifold, orientation-consistent and free of degenerate faces.
    fn can_collapse(&self, keep: usize, remove: usize, target: &Point3d, min_normal_cos: f64) -> bool {
        let shared = self.edge_faces(keep, remove);
        if shared.is_empty() || shared.len() > 2 {
            return false;
        }

        // Link condition: the only common neighbors are the apexes of the
        // faces on the edge.
        let apexes: Vec<usize> = shared
            .iter()
            .map(|&f| self.third_vertex(f, keep, remove))
            .sorted_unstable()
            .collect();
        let n_keep = self.neighbors(keep);
        let n_remove = self.neighbors(remove);
        let common: Vec<usize> = n_keep
            .iter()
            .copied()
            .filter(|v| n_remove.binary_search(v).is_ok())
            .collect();
        if common != apexes {
            return false;
        }

        let surviving_keep: Vec<[usize; 3]> = self.vertex_faces[keep]
            .iter()
            .filter(|f| !shared.contains(*f))
            .map(|&f| {
                let mut key = self.faces[f];
                key.sort_unstable();
                key
            })
            .collect();

        let moved = |v: usize| {
            if v == keep || v == remove {
                *target
            } else {
                self.positions[v]
            }
        };

        for &f in self.vertex_faces[keep].iter().chain(&self.vertex_faces[remove]) {
            if shared.contains(&f) {
                continue;
            }
            let [a, b, c] = self.faces[f];

            let old_n = (self.positions[b] - self.positions[a])
                .cross(&(self.positions[c] - self.positions[a]));
            let (p0, p1, p2) = (moved(a), moved(b), moved(c));
            let e1 = p1 - p0;
            let e2 = p2 - p0;
            let new_n = e1.cross(&e2);

            let new_len = new_n.norm();
            if new_len <= DEGENERATE_SINE * e1.norm() * e2.norm() {
                return false;
            }
            let old_len = old_n.norm();
            if old_len > 0.0 && old_n.dot(&new_n) < min_normal_cos * old_len * new_len {
                return false;
            }

            if self.face_contains(f, remove) {
                let mut key = self.faces[f].map(|v| if v == remove { keep } else { v });
                key.sort_unstable();
                if surviving_keep.contains(&key) {
                    return false;
                }
            }
        }

        true
    }

    /// Merge `remove` into `keep`, placing the result at `target`.
    fn collapse(&mut self, keep: usize, remove: usize, target: Point3d) {
        for f in self.edge_faces(keep, remove) {
            self.face_alive[f] = false;
            for v in self.faces[f] {
                self.vertex_faces[v].retain(|&x| x != f);
            }
            self.active_face_count -= 1;
        }

        let moved = std::mem::take(&mut self.vertex_faces[remove]);
        for f in moved {
            for slot in self.faces[f].iter_mut() {
                if *slot == remove {
                    *slot = keep;
                }
            }
            self.vertex_faces[keep].push(f);
        }
        self.vertex_faces[keep].sort_unstable();

        self.positions[keep] = target;
        let q = self.quadrics[remove];
        self.quadrics[keep] += q;
        self.vertex_alive[remove] = false;
        self.stamps[keep] += 1;
        self.stamps[remove] += 1;

        if let Some(normals) = self.normals.as_mut() {
            let avg = normals[keep] + normals[remove];
            if let Some(n) = avg.try_normalize(f32::EPSILON) {
                normals[keep] = n;
            }
        }

        if let Some(colors) = self.colors.as_mut() {
            let c1 = colors[keep];
            let c2 = colors[remove];
            colors[keep] = [
                ((c1[0] as u16 + c2[0] as u16) / 2) as u8,
                ((c1[1] as u16 + c2[1] as u16) / 2) as u8,
                ((c1[2] as u16 + c2[2] as u16) / 2) as u8,
            ];
        }
    }

    fn to_triangle_mesh(&self) -> TriangleMesh {
        let mut old_to_new = vec![usize::MAX; self.positions.len()];
        let mut new_positions = Vec::new();
        let mut new_normals = self.normals.as_ref().map(|_| Vec::new());
        let mut new_colors = self.colors.as_ref().map(|_| Vec::new());

        for i in 0..self.positions.len() {
            if !self.vertex_alive[i] || self.vertex_faces[i].is_empty() {
                continue;
            }
            old_to_new[i] = new_positions.len();
            let p = self.positions[i];
            new_positions.push(Point3f::new(p.x as f32, p.y as f32, p.z as f32));
            if let (Some(out), Some(normals)) = (new_normals.as_mut(), self.normals.as_ref()) {
                out.push(normals[i]);
            }
            if let (Some(out), Some(colors)) = (new_colors.as_mut(), self.colors.as_ref()) {
                out.push(colors[i]);
            }
        }

        let new_faces = self
            .faces
            .iter()
            .zip(&self.face_alive)
            .filter(|&(_, &alive)| alive)
            .map(|(face, _)| face.map(|v| old_to_new[v]))
            .collect();

        let mut mesh = TriangleMesh::from_vertices_and_faces(new_positions, new_faces);
        if let Some(normals) = new_normals {
            mesh.set_normals(normals);
        }
        if let Some(colors) = new_colors {
            mesh.set_colors(colors);
        }
        mesh
    }
}

// ============================================================
// Edge Cost for Priority Queue
// ============================================================

#[derive(Debug, Clone)]
struct EdgeCost {
    v1: usize,
    v2: usize,
    stamps: (u32, u32),
    position: Point3d,
    cost: f64,
}

impl PartialEq for EdgeCost {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for EdgeCost {}

impl PartialOrd for EdgeCost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeCost {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: smallest cost first, lower vertex ids break ties
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| (other.v1, other.v2).cmp(&(self.v1, self.v2)))
    }
}

// ============================================================
// Configuration
// ============================================================

/// What to do when the target face count is not below the current count
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPolicy {
    /// Perform zero collapses and return the (repaired) input
    #[default]
    PassThrough,
    /// Fail with [`Error::UnreachableTarget`] when the target exceeds the face count
    Reject,
}

/// Tuning for [`EdgeCollapseSimplifier`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecimationConfig {
    /// Stop when the minimum collapse cost exceeds this threshold
    pub error_threshold: Option<f64>,
    /// Never collapse edges touching the mesh boundary
    pub preserve_boundary: bool,
    /// Extra cost added to boundary edges when they are not preserved
    pub boundary_weight: f64,
    /// Largest allowed rotation of a surviving face normal, in degrees
    pub max_normal_deviation_deg: f64,
    pub target_policy: TargetPolicy,
    pub repair: RepairConfig,
}

impl Default for DecimationConfig {
    fn default() -> Self {
        Self {
            error_threshold: None,
            preserve_boundary: true,
            boundary_weight: 100.0,
            max_normal_deviation_deg: 60.0,
            target_policy: TargetPolicy::PassThrough,
            repair: RepairConfig::default(),
        }
    }
}

impl DecimationConfig {
    pub fn with_error_threshold(mut self, threshold: Option<f64>) -> Self {
        self.error_threshold = threshold;
        self
    }

    pub fn with_preserve_boundary(mut self, preserve: bool) -> Self {
        self.preserve_boundary = preserve;
        self
    }

    pub fn with_boundary_weight(mut self, weight: f64) -> Self {
        self.boundary_weight = weight;
        self
    }

    pub fn with_max_normal_deviation(mut self, degrees: f64) -> Self {
        self.max_normal_deviation_deg = degrees;
        self
    }

    pub fn with_target_policy(mut self, policy: TargetPolicy) -> Self {
        self.target_policy = policy;
        self
    }

    pub fn with_repair(mut self, repair: RepairConfig) -> Self {
        self.repair = repair;
        self
    }
}

/// Counters describing one simplification run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplificationStats {
    pub input_faces: usize,
    pub output_faces: usize,
    pub target_faces: usize,
    pub collapses: usize,
    pub repair: RepairSummary,
}

/// Simplified mesh together with its statistics
#[derive(Debug, Clone)]
pub struct SimplificationResult {
    pub mesh: TriangleMesh,
    pub stats: SimplificationStats,
}

// ============================================================
// Edge Collapse Simplifier
// ============================================================

/// Quadric error edge collapse simplifier.
///
/// Collapses are rejected when they would break the link condition (non-
/// manifold result), rotate a surviving face normal by more than the
/// configured angle, produce a zero-area face, or duplicate an existing face.
/// Repair passes always run afterwards, whether or not anything collapsed.
#[derive(Debug, Clone, Default)]
pub struct EdgeCollapseSimplifier {
    config: DecimationConfig,
}

impl EdgeCollapseSimplifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DecimationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecimationConfig {
        &self.config
    }

    fn push_candidate(
        &self,
        mesh: &CollapseMesh,
        queue: &mut PriorityQueue<usize, EdgeCost>,
        next_id: &mut usize,
        a: usize,
        b: usize,
    ) {
        let on_boundary = mesh.is_boundary_vertex(a) || mesh.is_boundary_vertex(b);
        if self.config.preserve_boundary && on_boundary {
            return;
        }

        let (v1, v2) = (a.min(b), a.max(b));
        let (position, mut cost) = mesh.collapse_cost(v1, v2);
        if on_boundary {
            cost += self.config.boundary_weight;
        }

        queue.push(
            *next_id,
            EdgeCost {
                v1,
                v2,
                stamps: (mesh.stamps[v1], mesh.stamps[v2]),
                position,
                cost,
            },
        );
        *next_id += 1;
    }

    /// Run greedy collapses until `target_faces` is reached or no valid
    /// candidate is left. Returns the decimated arena and the collapse count.
    fn decimate(&self, mesh: &TriangleMesh, target_faces: usize) -> (CollapseMesh, usize) {
        let mut hem = CollapseMesh::from_triangle_mesh(mesh);
        let min_normal_cos = self.config.max_normal_deviation_deg.to_radians().cos();

        let mut queue = PriorityQueue::new();
        let mut next_id = 0usize;
        for v in 0..hem.positions.len() {
            for n in hem.neighbors(v) {
                if n > v {
                    self.push_candidate(&hem, &mut queue, &mut next_id, v, n);
                }
            }
        }
        debug!("Edge collapse: {} initial candidates", queue.len());

        let mut collapses = 0usize;
        let mut stale = 0usize;
        let mut rejected = 0usize;

        while hem.active_face_count > target_faces {
            let Some((_, candidate)) = queue.pop() else {
                break;
            };
            let EdgeCost { v1, v2, stamps, position, cost } = candidate;

            if !hem.vertex_alive[v1]
                || !hem.vertex_alive[v2]
                || stamps != (hem.stamps[v1], hem.stamps[v2])
            {
                stale += 1;
                continue;
            }

            if let Some(threshold) = self.config.error_threshold {
                if cost > threshold {
                    debug!("Edge collapse: cost {:.3e} exceeds threshold, stopping", cost);
                    break;
                }
            }

            if !hem.can_collapse(v1, v2, &position, min_normal_cos) {
                rejected += 1;
                continue;
            }

            hem.collapse(v1, v2, position);
            collapses += 1;

            for n in hem.neighbors(v1) {
                self.push_candidate(&hem, &mut queue, &mut next_id, v1, n);
            }
        }

        debug!(
            "Edge collapse: {} collapses, {} stale entries skipped, {} rejected",
            collapses, stale, rejected
        );
        (hem, collapses)
    }

    /// Simplify and report what happened.
    ///
    /// A target at or above the current face count performs zero collapses
    /// (or fails under [`TargetPolicy::Reject`] when strictly above).
    pub fn simplify_with_stats(
        &self,
        mesh: &TriangleMesh,
        target_face_count: usize,
        preserve_uv: bool,
    ) -> Result<SimplificationResult> {
        mesh.validate()?;
        if target_face_count == 0 {
            return Err(Error::InvalidParameter(
                "target face count must be positive".to_string(),
            ));
        }

        let input_faces = mesh.face_count();
        let (mut result, collapses) = if target_face_count >= input_faces {
            if self.config.target_policy == TargetPolicy::Reject && target_face_count > input_faces {
                return Err(Error::UnreachableTarget {
                    target: target_face_count,
                    current: input_faces,
                });
            }
            debug!(
                "Target {} not below current {} faces, skipping decimation",
                target_face_count, input_faces
            );
            (mesh.clone(), 0)
        } else {
            match self.decimate(mesh, target_face_count) {
                (_, 0) => (mesh.clone(), 0),
                (hem, collapses) => (hem.to_triangle_mesh(), collapses),
            }
        };

        // Collapses re-index the surface, so per-vertex UVs only carry over
        // an untouched topology; the atlas stage regenerates them otherwise.
        if !preserve_uv {
            result.uvs = None;
        } else if collapses > 0 && mesh.has_uvs() {
            debug!("UVs invalidated by {} collapses, dropping them", collapses);
        }

        let repair = repair_mesh(&mut result, &self.config.repair);

        let stats = SimplificationStats {
            input_faces,
            output_faces: result.face_count(),
            target_faces: target_face_count,
            collapses,
            repair,
        };
        info!(
            "Simplified {} -> {} faces (target {}, {} collapses)",
            stats.input_faces, stats.output_faces, stats.target_faces, stats.collapses
        );

        Ok(SimplificationResult { mesh: result, stats })
    }
}

impl MeshSimplifier for EdgeCollapseSimplifier {
    fn simplify(
        &self,
        mesh: &TriangleMesh,
        target_face_count: usize,
        preserve_uv: bool,
    ) -> Result<TriangleMesh> {
        self.simplify_with_stats(mesh, target_face_count, preserve_uv)
            .map(|result| result.mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repair::is_degenerate_face;
    use approx::assert_relative_eq;
    use meshfit_core::Point2f;
    use nalgebra::Point3;
    use std::collections::HashSet;

    fn make_single_triangle() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
    }

    fn make_tetrahedron() -> TriangleMesh {
        // Consistently wound: each shared edge appears in opposite directions
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
                Point3::new(0.5, 0.5, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
        )
    }

    fn make_plane_grid(size: usize) -> TriangleMesh {
        let mut vertices = Vec::new();
        for y in 0..size {
            for x in 0..size {
                vertices.push(Point3::new(x as f32, y as f32, 0.0));
            }
        }
        let mut faces = Vec::new();
        for y in 0..(size - 1) {
            for x in 0..(size - 1) {
                let tl = y * size + x;
                let tr = tl + 1;
                let bl = (y + 1) * size + x;
                let br = bl + 1;
                faces.push([tl, bl, tr]);
                faces.push([tr, bl, br]);
            }
        }
        TriangleMesh::from_vertices_and_faces(vertices, faces)
    }

    fn make_curved_surface(size: usize) -> TriangleMesh {
        let mut mesh = make_plane_grid(size);
        for v in &mut mesh.vertices {
            let fx = v.x / (size - 1) as f32 * std::f32::consts::PI;
            let fy = v.y / (size - 1) as f32 * std::f32::consts::PI;
            v.z = (fx.sin() * fy.sin()) * 2.0;
        }
        mesh
    }

    /// Closed box surface on an integer lattice with `n` quads per side.
    fn make_lattice_cube(n: usize) -> TriangleMesh {
        let sides: [([i64; 3], [i64; 3], [i64; 3]); 6] = [
            ([n as i64, 0, 0], [0, 1, 0], [0, 0, 1]),
            ([0, 0, 0], [0, 0, 1], [0, 1, 0]),
            ([0, n as i64, 0], [0, 0, 1], [1, 0, 0]),
            ([0, 0, 0], [1, 0, 0], [0, 0, 1]),
            ([0, 0, n as i64], [1, 0, 0], [0, 1, 0]),
            ([0, 0, 0], [0, 1, 0], [1, 0, 0]),
        ];
        let mut index = std::collections::BTreeMap::new();
        let mut mesh = TriangleMesh::new();
        let mut vertex = |p: [i64; 3], mesh: &mut TriangleMesh| -> usize {
            *index.entry(p).or_insert_with(|| {
                mesh.add_vertex(Point3::new(p[0] as f32, p[1] as f32, p[2] as f32))
            })
        };
        for (origin, u, v) in sides {
            let at = |a: usize, b: usize| -> [i64; 3] {
                [0, 1, 2].map(|k| origin[k] + a as i64 * u[k] + b as i64 * v[k])
            };
            for a in 0..n {
                for b in 0..n {
                    let p00 = vertex(at(a, b), &mut mesh);
                    let p10 = vertex(at(a + 1, b), &mut mesh);
                    let p11 = vertex(at(a + 1, b + 1), &mut mesh);
                    let p01 = vertex(at(a, b + 1), &mut mesh);
                    mesh.add_face([p00, p10, p11]);
                    mesh.add_face([p00, p11, p01]);
                }
            }
        }
        mesh
    }

    fn assert_clean(mesh: &TriangleMesh) {
        assert!(mesh.validate().is_ok());
        let mut referenced = vec![false; mesh.vertex_count()];
        for face in &mesh.faces {
            assert!(!is_degenerate_face(mesh, face), "degenerate face {:?}", face);
            for &v in face {
                referenced[v] = true;
            }
        }
        assert!(referenced.iter().all(|&r| r), "unreferenced vertex survived");

        let epsilon = RepairConfig::default().weld_epsilon;
        for (i, p) in mesh.vertices.iter().enumerate() {
            for (j, q) in mesh.vertices.iter().enumerate().skip(i + 1) {
                assert!(
                    (p - q).norm() >= epsilon,
                    "vertices {} and {} closer than {}",
                    i,
                    j,
                    epsilon
                );
            }
        }
    }

    // ---- Construction tests ----

    #[test]
    fn test_creation() {
        let s = EdgeCollapseSimplifier::new();
        assert!(s.config().preserve_boundary);
        assert!(s.config().error_threshold.is_none());
        assert_eq!(s.config().target_policy, TargetPolicy::PassThrough);
    }

    #[test]
    fn test_config_builders() {
        let config = DecimationConfig::default()
            .with_error_threshold(Some(0.01))
            .with_preserve_boundary(false)
            .with_boundary_weight(50.0)
            .with_target_policy(TargetPolicy::Reject);
        let s = EdgeCollapseSimplifier::with_config(config);
        assert_eq!(s.config().error_threshold, Some(0.01));
        assert!(!s.config().preserve_boundary);
        assert_eq!(s.config().boundary_weight, 50.0);
        assert_eq!(s.config().target_policy, TargetPolicy::Reject);
    }

    // ---- Arena tests ----

    #[test]
    fn test_arena_construction() {
        let hem = CollapseMesh::from_triangle_mesh(&make_tetrahedron());
        assert_eq!(hem.active_face_count, 4);
        for v in 0..4 {
            assert_eq!(hem.vertex_faces[v].len(), 3);
            assert_eq!(hem.neighbors(v).len(), 3);
            assert!(!hem.is_boundary_vertex(v));
        }
    }

    #[test]
    fn test_arena_boundary() {
        let hem = CollapseMesh::from_triangle_mesh(&make_single_triangle());
        for v in 0..3 {
            assert!(hem.is_boundary_vertex(v));
        }
    }

    #[test]
    fn test_tetrahedron_collapse_rejected() {
        // Link condition holds but the result would fold two faces onto each other
        let hem = CollapseMesh::from_triangle_mesh(&make_tetrahedron());
        let (pos, _) = hem.collapse_cost(0, 1);
        assert!(!hem.can_collapse(0, 1, &pos, -1.0));
    }

    #[test]
    fn test_normal_flip_rejected() {
        let hem = CollapseMesh::from_triangle_mesh(&make_plane_grid(4));
        // Moving the shared vertex far outside the fan flips neighbors
        let far = Point3d::new(-10.0, -10.0, 0.0);
        assert!(!hem.can_collapse(5, 6, &far, 0.0));
        let mid = Point3d::new(1.5, 1.0, 0.0);
        assert!(hem.can_collapse(5, 6, &mid, 0.0));
    }

    #[test]
    fn test_collapse_updates_arena() {
        let mut hem = CollapseMesh::from_triangle_mesh(&make_plane_grid(4));
        let before = hem.active_face_count;
        hem.collapse(5, 6, Point3d::new(1.5, 1.0, 0.0));
        assert_eq!(hem.active_face_count, before - 2);
        assert!(!hem.vertex_alive[6]);
        assert!(hem.vertex_faces[6].is_empty());
        assert_eq!(hem.stamps[5], 1);
        assert!(!hem.neighbors(5).contains(&6));
        for &f in &hem.vertex_faces[5] {
            assert!(hem.face_alive[f]);
            assert!(!hem.faces[f].contains(&6));
        }
    }

    // ---- Simplification tests ----

    #[test]
    fn test_empty_mesh() {
        let s = EdgeCollapseSimplifier::new();
        let result = s.simplify(&TriangleMesh::new(), 10, false);
        assert!(matches!(result, Err(Error::InvalidMesh(_))));
    }

    #[test]
    fn test_zero_target_rejected() {
        let s = EdgeCollapseSimplifier::new();
        assert!(matches!(
            s.simplify(&make_single_triangle(), 0, false),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_unreachable_target_passes_through() {
        let s = EdgeCollapseSimplifier::new();
        let mesh = make_curved_surface(6);
        let result = s.simplify_with_stats(&mesh, mesh.face_count() + 10, true).unwrap();
        assert_eq!(result.stats.collapses, 0);
        assert_eq!(result.mesh, mesh);
    }

    #[test]
    fn test_unreachable_target_rejected_by_policy() {
        let s = EdgeCollapseSimplifier::with_config(
            DecimationConfig::default().with_target_policy(TargetPolicy::Reject),
        );
        let mesh = make_single_triangle();
        assert!(matches!(
            s.simplify(&mesh, 2, false),
            Err(Error::UnreachableTarget { target: 2, current: 1 })
        ));
        // Equal target is still a pass-through
        assert_eq!(s.simplify(&mesh, 1, false).unwrap(), mesh);
    }

    #[test]
    fn test_tetrahedron_simplification() {
        let s = EdgeCollapseSimplifier::with_config(
            DecimationConfig::default().with_preserve_boundary(false),
        );
        let mesh = make_tetrahedron();
        let result = s.simplify(&mesh, 2, false).unwrap();
        // No valid collapse exists on a tetrahedron
        assert_eq!(result.face_count(), 4);
        assert_eq!(result.vertex_count(), 4);
    }

    #[test]
    fn test_planar_grid_simplification() {
        let s = EdgeCollapseSimplifier::new();
        let mesh = make_plane_grid(6);
        let original_faces = mesh.face_count();
        assert_eq!(original_faces, 50); // 5*5*2

        let result = s.simplify(&mesh, 25, false).unwrap();
        assert!(result.face_count() < original_faces);
        assert!(result.face_count() > 0);
        assert_clean(&result);
    }

    #[test]
    fn test_near_duplicate_seam_is_welded() {
        // Split the grid along x = 2 with copies a few hundred nanometres off
        let mut mesh = make_plane_grid(6);
        let n = mesh.vertex_count();
        let mut copy_of = vec![None; n];
        for v in 0..n {
            if mesh.vertices[v].x == 2.0 {
                let mut p = mesh.vertices[v];
                p.x += 4e-7;
                copy_of[v] = Some(mesh.add_vertex(p));
            }
        }
        let right: Vec<bool> = mesh
            .faces
            .iter()
            .map(|f| f.iter().any(|&v| mesh.vertices[v].x > 2.5))
            .collect();
        for (face, is_right) in mesh.faces.iter_mut().zip(right) {
            if is_right {
                for v in face.iter_mut() {
                    if let Some(copy) = copy_of[*v] {
                        *v = copy;
                    }
                }
            }
        }
        assert_eq!(mesh.vertex_count(), 42);

        let result = EdgeCollapseSimplifier::new()
            .simplify_with_stats(&mesh, mesh.face_count(), false)
            .unwrap();
        assert_eq!(result.stats.repair.vertices_welded, 6);
        assert_eq!(result.mesh.vertex_count(), 36);
        assert_clean(&result.mesh);
    }

    #[test]
    fn test_curved_surface_simplification() {
        let s = EdgeCollapseSimplifier::new();
        let mesh = make_curved_surface(8);
        let original_faces = mesh.face_count();

        let result = s.simplify(&mesh, original_faces / 2, false).unwrap();
        assert!(result.face_count() < original_faces);
        assert!(result.face_count() > 0);
        assert_clean(&result);
    }

    #[test]
    fn test_closed_cube_reaches_target() {
        let s = EdgeCollapseSimplifier::new();
        let mesh = make_lattice_cube(8);
        assert_eq!(mesh.face_count(), 768);

        let result = s.simplify_with_stats(&mesh, 300, false).unwrap();
        assert!(result.mesh.face_count() <= 300);
        assert!(result.stats.collapses > 0);
        assert_clean(&result.mesh);

        // Flat sides collapse for free, so the box keeps its extent
        let (min, max) = meshfit_core::Drawable::bounding_box(&result.mesh);
        assert_relative_eq!(min, Point3::new(0.0, 0.0, 0.0), epsilon = 1e-4);
        assert_relative_eq!(max, Point3::new(8.0, 8.0, 8.0), epsilon = 1e-4);
    }

    #[test]
    fn test_face_count_is_monotonic() {
        let s = EdgeCollapseSimplifier::new();
        let mesh = make_lattice_cube(6);
        let mut previous = mesh.face_count();
        for target in [400, 200, 100, 50] {
            let result = s.simplify(&mesh, target, false).unwrap();
            assert!(result.face_count() <= mesh.face_count());
            assert!(result.face_count() <= previous);
            previous = result.face_count();
        }
    }

    #[test]
    fn test_boundary_preservation() {
        let s = EdgeCollapseSimplifier::new(); // preserve_boundary = true
        let mesh = make_plane_grid(6);

        let size = 6;
        let mut original_boundary = HashSet::new();
        for i in 0..size {
            for j in 0..size {
                if i == 0 || i == size - 1 || j == 0 || j == size - 1 {
                    let p = mesh.vertices[i * size + j];
                    original_boundary.insert(((p.x * 100.0) as i32, (p.y * 100.0) as i32));
                }
            }
        }

        let result = s.simplify(&mesh, 25, false).unwrap();
        let result_positions: HashSet<(i32, i32)> = result
            .vertices
            .iter()
            .map(|p| ((p.x * 100.0) as i32, (p.y * 100.0) as i32))
            .collect();

        assert!(original_boundary.is_subset(&result_positions));
    }

    #[test]
    fn test_error_threshold() {
        let s = EdgeCollapseSimplifier::with_config(
            DecimationConfig::default().with_error_threshold(Some(1e-9)),
        );
        let mesh = make_curved_surface(8);
        let loose = EdgeCollapseSimplifier::new().simplify(&mesh, 10, false).unwrap();
        let tight = s.simplify(&mesh, 10, false).unwrap();
        assert!(tight.face_count() >= loose.face_count());
    }

    #[test]
    fn test_uv_kept_without_collapses() {
        let mut mesh = make_plane_grid(3);
        let uvs = mesh
            .vertices
            .iter()
            .map(|p| Point2f::new(p.x / 2.0, p.y / 2.0))
            .collect();
        mesh.set_uvs(uvs);

        let s = EdgeCollapseSimplifier::new();
        let kept = s.simplify(&mesh, 100, true).unwrap();
        assert_eq!(kept.uvs, mesh.uvs);

        let dropped = s.simplify(&mesh, 100, false).unwrap();
        assert!(dropped.uvs.is_none());
    }

    #[test]
    fn test_uv_invalidated_by_collapses() {
        let mut mesh = make_lattice_cube(4);
        mesh.set_uvs(vec![Point2f::new(0.5, 0.5); mesh.vertex_count()]);
        let result = EdgeCollapseSimplifier::new().simplify(&mesh, 40, true).unwrap();
        assert!(result.uvs.is_none());
    }

    #[test]
    fn test_attribute_preservation_normals() {
        let mut mesh = make_lattice_cube(4);
        let center = Point3::new(2.0f32, 2.0, 2.0);
        let normals: Vec<Vector3f> = mesh
            .vertices
            .iter()
            .map(|p| (p - center).normalize())
            .collect();
        mesh.set_normals(normals);

        let result = EdgeCollapseSimplifier::new().simplify(&mesh, 60, false).unwrap();
        let result_normals = result.normals.as_ref().expect("normals should be preserved");
        assert_eq!(result_normals.len(), result.vertex_count());
        for n in result_normals {
            assert!((n.norm() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_attribute_preservation_colors() {
        let mut mesh = make_lattice_cube(4);
        let colors: Vec<[u8; 3]> = (0..mesh.vertex_count()).map(|_| [128, 64, 200]).collect();
        mesh.set_colors(colors);

        let result = EdgeCollapseSimplifier::new().simplify(&mesh, 60, false).unwrap();
        let result_colors = result.colors.as_ref().expect("colors should be preserved");
        assert_eq!(result_colors.len(), result.vertex_count());
        assert!(result_colors.iter().all(|&c| c == [128, 64, 200]));
    }

    #[test]
    fn test_deterministic_output() {
        let s = EdgeCollapseSimplifier::new();
        let mesh = make_curved_surface(10);
        let a = s.simplify(&mesh, 60, false).unwrap();
        let b = s.simplify(&mesh, 60, false).unwrap();
        assert_eq!(a, b);
    }
}
