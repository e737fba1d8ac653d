//! Mesh repair passes run after decimation
//!
//! Every pass works in place, keeps face order stable and returns the number
//! of elements it removed or merged.

use meshfit_core::{to_f64, TriangleMesh};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

const INVALID: usize = usize::MAX;

/// Sine of the smallest corner angle below which a triangle counts as
/// collinear.
pub(crate) const DEGENERATE_SINE: f64 = 1e-6;

/// Settings for [`repair_mesh`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Vertices closer than this are merged (0 disables welding)
    pub weld_epsilon: f32,
    /// Drop faces repeating another face's vertex set
    pub remove_duplicate_faces: bool,
    /// Drop vertices referenced by no face
    pub remove_unreferenced: bool,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            weld_epsilon: 1e-6,
            remove_duplicate_faces: true,
            remove_unreferenced: true,
        }
    }
}

impl RepairConfig {
    pub fn with_weld_epsilon(mut self, epsilon: f32) -> Self {
        self.weld_epsilon = epsilon;
        self
    }

    pub fn with_remove_duplicate_faces(mut self, remove: bool) -> Self {
        self.remove_duplicate_faces = remove;
        self
    }

    pub fn with_remove_unreferenced(mut self, remove: bool) -> Self {
        self.remove_unreferenced = remove;
        self
    }
}

/// Counts reported by [`repair_mesh`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairSummary {
    pub vertices_welded: usize,
    pub degenerate_faces_removed: usize,
    pub duplicate_faces_removed: usize,
    pub unreferenced_vertices_removed: usize,
}

impl RepairSummary {
    /// Check if any repairs were performed.
    pub fn had_changes(&self) -> bool {
        self.vertices_welded > 0
            || self.degenerate_faces_removed > 0
            || self.duplicate_faces_removed > 0
            || self.unreferenced_vertices_removed > 0
    }
}

impl std::fmt::Display for RepairSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Repair: {} welded, {} unreferenced, {} degenerate, {} duplicate",
            self.vertices_welded,
            self.unreferenced_vertices_removed,
            self.degenerate_faces_removed,
            self.duplicate_faces_removed
        )
    }
}

/// Run all repair passes: weld, degenerate faces, duplicate faces,
/// unreferenced vertices.
pub fn repair_mesh(mesh: &mut TriangleMesh, config: &RepairConfig) -> RepairSummary {
    let vertices_welded = weld_vertices(mesh, config.weld_epsilon);
    let degenerate_faces_removed = remove_degenerate_faces(mesh);
    let duplicate_faces_removed = if config.remove_duplicate_faces {
        remove_duplicate_faces(mesh)
    } else {
        0
    };
    let unreferenced_vertices_removed = if config.remove_unreferenced {
        remove_unreferenced_vertices(mesh)
    } else {
        0
    };

    RepairSummary {
        vertices_welded,
        degenerate_faces_removed,
        duplicate_faces_removed,
        unreferenced_vertices_removed,
    }
}

/// Merge vertices closer than `epsilon` by redirecting face indices to the
/// lowest-indexed vertex of each cluster.
///
/// When the mesh has UVs, vertices only merge if their UVs also agree, so
/// texture seams stay split. Merged vertices become unreferenced; run
/// [`remove_unreferenced_vertices`] to drop them.
pub fn weld_vertices(mesh: &mut TriangleMesh, epsilon: f32) -> usize {
    if mesh.vertices.is_empty() || epsilon <= 0.0 {
        return 0;
    }

    let epsilon = epsilon as f64;
    let cell_size = epsilon * 2.0;
    let cell_of = |i: usize| {
        let p = to_f64(&mesh.vertices[i]);
        (
            (p.x / cell_size).floor() as i64,
            (p.y / cell_size).floor() as i64,
            (p.z / cell_size).floor() as i64,
        )
    };

    let mut spatial_hash: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
    for i in 0..mesh.vertices.len() {
        spatial_hash.entry(cell_of(i)).or_default().push(i);
    }

    let mut remap: Vec<usize> = (0..mesh.vertices.len()).collect();
    let mut merged = 0;

    for idx in 0..mesh.vertices.len() {
        if remap[idx] != idx {
            continue;
        }
        let cell = cell_of(idx);
        let p = to_f64(&mesh.vertices[idx]);

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = spatial_hash.get(&(cell.0 + dx, cell.1 + dy, cell.2 + dz))
                    else {
                        continue;
                    };
                    for &other in candidates {
                        if other <= idx || remap[other] != other {
                            continue;
                        }
                        if (to_f64(&mesh.vertices[other]) - p).norm() >= epsilon {
                            continue;
                        }
                        if let Some(uvs) = &mesh.uvs {
                            if (uvs[other] - uvs[idx]).norm() as f64 >= epsilon {
                                continue;
                            }
                        }
                        remap[other] = idx;
                        merged += 1;
                    }
                }
            }
        }
    }

    if merged > 0 {
        for face in &mut mesh.faces {
            for v in face.iter_mut() {
                *v = remap[*v];
            }
        }
    }

    merged
}

/// Whether a face repeats an index or spans (nearly) zero area.
pub fn is_degenerate_face(mesh: &TriangleMesh, face: &[usize; 3]) -> bool {
    let [a, b, c] = *face;
    if a == b || b == c || a == c {
        return true;
    }
    let p0 = to_f64(&mesh.vertices[a]);
    let e1 = to_f64(&mesh.vertices[b]) - p0;
    let e2 = to_f64(&mesh.vertices[c]) - p0;
    e1.cross(&e2).norm() <= DEGENERATE_SINE * e1.norm() * e2.norm()
}

/// Remove faces with repeated or collinear vertices.
pub fn remove_degenerate_faces(mesh: &mut TriangleMesh) -> usize {
    let before = mesh.faces.len();
    let keep: Vec<bool> = mesh
        .faces
        .iter()
        .map(|face| !is_degenerate_face(mesh, face))
        .collect();
    let mut keep = keep.into_iter();
    mesh.faces.retain(|_| keep.next().unwrap_or(false));
    before - mesh.faces.len()
}

/// Remove faces whose vertex set (in any order) was already seen.
pub fn remove_duplicate_faces(mesh: &mut TriangleMesh) -> usize {
    let before = mesh.faces.len();
    let mut seen: HashSet<[usize; 3]> = HashSet::with_capacity(before);
    mesh.faces.retain(|face| {
        let mut key = *face;
        key.sort_unstable();
        seen.insert(key)
    });
    before - mesh.faces.len()
}

/// Remove unreferenced vertices and compact all per-vertex buffers.
pub fn remove_unreferenced_vertices(mesh: &mut TriangleMesh) -> usize {
    let original_count = mesh.vertices.len();

    let mut referenced = vec![false; original_count];
    for face in &mesh.faces {
        for &v in face {
            referenced[v] = true;
        }
    }

    let mut remap = vec![INVALID; original_count];
    let mut next = 0;
    for (old, &used) in referenced.iter().enumerate() {
        if used {
            remap[old] = next;
            next += 1;
        }
    }
    if next == original_count {
        return 0;
    }

    fn compact<T: Copy>(values: &[T], referenced: &[bool]) -> Vec<T> {
        values
            .iter()
            .zip(referenced)
            .filter(|&(_, &used)| used)
            .map(|(v, _)| *v)
            .collect()
    }

    mesh.vertices = compact(&mesh.vertices, &referenced);
    if let Some(normals) = mesh.normals.as_mut() {
        *normals = compact(normals, &referenced);
    }
    if let Some(colors) = mesh.colors.as_mut() {
        *colors = compact(colors, &referenced);
    }
    if let Some(uvs) = mesh.uvs.as_mut() {
        *uvs = compact(uvs, &referenced);
    }

    for face in &mut mesh.faces {
        for v in face.iter_mut() {
            *v = remap[*v];
        }
    }

    original_count - next
}
