//! Chart flattening
//!
//! Each chart is projected orthographically onto the plane of its axis, then
//! rotated so that its convex hull fits the smallest enclosing rectangle and
//! that rectangle lies landscape (height ≤ width). Coordinates are in mesh
//! units with the rectangle's lower-left corner at the origin.

use crate::chart::Chart;
use meshfit_core::{to_f64, TriangleMesh, Vector3d};
use nalgebra::{Point2, Vector2};
use std::collections::HashMap;

/// A chart laid out in its own 2D frame
#[derive(Debug, Clone, PartialEq)]
pub struct FlatChart {
    /// Original vertex index of every chart-local vertex
    pub vertex_mapping: Vec<usize>,
    /// `(original face index, chart-local corners)` in chart face order
    pub faces: Vec<(usize, [usize; 3])>,
    /// Chart-local vertex coordinates, all within `[0, width] × [0, height]`
    pub coords: Vec<Point2<f64>>,
    pub width: f64,
    pub height: f64,
    /// Surface area in mesh units
    pub area: f64,
}

impl FlatChart {
    pub fn vertex_count(&self) -> usize {
        self.vertex_mapping.len()
    }
}

/// Orthonormal `(u, v)` with `u × v = axis`.
pub(crate) fn tangent_basis(axis: &Vector3d) -> (Vector3d, Vector3d) {
    let helper = if axis.x.abs() < 0.9 {
        Vector3d::x()
    } else {
        Vector3d::y()
    };
    let u = (helper - axis * axis.dot(&helper)).normalize();
    let v = axis.cross(&u);
    (u, v)
}

fn turn(o: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Counter-clockwise convex hull (Andrew's monotone chain), collinear points dropped.
pub fn convex_hull(points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut hull: Vec<Point2<f64>> = Vec::with_capacity(pts.len() * 2);
    for p in pts.iter() {
        while hull.len() >= 2 && turn(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }
    let lower_len = hull.len() + 1;
    for p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && turn(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(*p);
    }
    hull.pop();
    hull
}

/// Unit direction that, taken as the new x axis, minimizes the area of the
/// axis-aligned rectangle enclosing `hull`. The optimum is always parallel
/// to a hull edge; the first edge wins ties.
pub fn min_area_direction(hull: &[Point2<f64>]) -> Vector2<f64> {
    let mut best = (f64::INFINITY, Vector2::x());
    for (i, p) in hull.iter().enumerate() {
        let q = &hull[(i + 1) % hull.len()];
        let Some(d) = (q - p).try_normalize(f64::EPSILON) else {
            continue;
        };
        let perp = Vector2::new(-d.y, d.x);
        let (mut min_a, mut max_a) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_b, mut max_b) = (f64::INFINITY, f64::NEG_INFINITY);
        for h in hull {
            let a = h.coords.dot(&d);
            let b = h.coords.dot(&perp);
            min_a = min_a.min(a);
            max_a = max_a.max(a);
            min_b = min_b.min(b);
            max_b = max_b.max(b);
        }
        let area = (max_a - min_a) * (max_b - min_b);
        if area < best.0 {
            best = (area, d);
        }
    }
    best.1
}

/// Flatten one chart of `mesh`.
pub fn flatten_chart(mesh: &TriangleMesh, chart: &Chart) -> FlatChart {
    let mut local_of: HashMap<usize, usize> = HashMap::with_capacity(chart.faces.len() * 2);
    let mut vertex_mapping = Vec::new();
    let faces: Vec<(usize, [usize; 3])> = chart
        .faces
        .iter()
        .map(|&f| {
            let corners = mesh.faces[f].map(|v| {
                *local_of.entry(v).or_insert_with(|| {
                    vertex_mapping.push(v);
                    vertex_mapping.len() - 1
                })
            });
            (f, corners)
        })
        .collect();

    let (u, v) = tangent_basis(&chart.axis);
    let projected: Vec<Point2<f64>> = vertex_mapping
        .iter()
        .map(|&vi| {
            let p = to_f64(&mesh.vertices[vi]).coords;
            Point2::new(p.dot(&u), p.dot(&v))
        })
        .collect();

    // Rotations only, so chart winding survives
    let d = min_area_direction(&convex_hull(&projected));
    let perp = Vector2::new(-d.y, d.x);
    let mut coords: Vec<Point2<f64>> = projected
        .iter()
        .map(|p| Point2::new(p.coords.dot(&d), p.coords.dot(&perp)))
        .collect();

    let extent = |coords: &[Point2<f64>]| {
        coords.iter().fold(
            (Point2::new(f64::INFINITY, f64::INFINITY), Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY)),
            |(lo, hi), p| (lo.inf(p), hi.sup(p)),
        )
    };

    let (lo, hi) = extent(&coords);
    if hi.y - lo.y > hi.x - lo.x {
        for p in coords.iter_mut() {
            *p = Point2::new(-p.y, p.x);
        }
    }
    let (lo, hi) = extent(&coords);
    for p in coords.iter_mut() {
        *p -= lo.coords;
    }

    FlatChart {
        vertex_mapping,
        faces,
        coords,
        width: (hi.x - lo.x).max(0.0),
        height: (hi.y - lo.y).max(0.0),
        area: chart.area,
    }
}
