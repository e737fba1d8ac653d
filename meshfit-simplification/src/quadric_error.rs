//! Quadric error metric
//!
//! A quadric accumulates squared distances to a set of planes. Summing the
//! quadrics of two vertices and minimizing over position gives the cost of
//! collapsing the edge between them.

use meshfit_core::{Point3d, Vector3d};
use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};
use std::ops::{Add, AddAssign};

/// Symmetric 4x4 error quadric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadric {
    m: Matrix4<f64>,
}

impl Quadric {
    pub fn zero() -> Self {
        Self {
            m: Matrix4::zeros(),
        }
    }

    /// Quadric of the plane `n·x + d = 0`; `n` is expected to be unit length.
    pub fn from_plane(n: &Vector3d, d: f64) -> Self {
        let p = Vector4::new(n.x, n.y, n.z, d);
        Self { m: p * p.transpose() }
    }

    /// Quadric of the plane through a triangle, or `None` if the triangle
    /// has no well-defined normal.
    pub fn from_triangle(v0: &Point3d, v1: &Point3d, v2: &Point3d) -> Option<Self> {
        let n = (v1 - v0).cross(&(v2 - v0)).try_normalize(f64::EPSILON)?;
        let d = -n.dot(&v0.coords);
        Some(Self::from_plane(&n, d))
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.m
    }

    /// Summed squared plane distance at `p`.
    pub fn evaluate(&self, p: &Point3d) -> f64 {
        let vh = Vector4::new(p.x, p.y, p.z, 1.0);
        (vh.transpose() * self.m * vh)[0].max(0.0)
    }

    /// Position minimizing the quadric, if the 3x3 system is well conditioned.
    pub fn minimizer(&self) -> Option<Point3d> {
        let a: Matrix3<f64> = self.m.fixed_view::<3, 3>(0, 0).into_owned();
        let b: Vector3<f64> = self.m.fixed_view::<3, 1>(0, 3).into_owned();

        let scale = a.amax();
        if scale <= 0.0 {
            return None;
        }
        if a.determinant().abs() <= 1e-10 * scale * scale * scale {
            return None;
        }
        let inv = a.try_inverse()?;
        let p = -(inv * b);
        if p.iter().all(|c| c.is_finite()) {
            Some(Point3d::from(p))
        } else {
            None
        }
    }

    /// Best placement for the merged vertex of edge `(a, b)` and its cost.
    ///
    /// Uses the quadric minimizer when it exists and lies near the edge,
    /// otherwise the cheapest of `a`, `b` and the midpoint (earlier wins ties).
    pub fn optimal_position(&self, a: &Point3d, b: &Point3d) -> (Point3d, f64) {
        let mid = Point3d::from((a.coords + b.coords) * 0.5);
        let edge_len = (b - a).norm();

        if let Some(p) = self.minimizer() {
            if (p - mid).norm() <= 2.0 * edge_len {
                return (p, self.evaluate(&p));
            }
        }

        let mut best = (*a, self.evaluate(a));
        for candidate in [*b, mid] {
            let cost = self.evaluate(&candidate);
            if cost < best.1 {
                best = (candidate, cost);
            }
        }
        best
    }
}

impl Default for Quadric {
    fn default() -> Self {
        Self::zero()
    }
}

impl Add for Quadric {
    type Output = Quadric;

    fn add(self, rhs: Quadric) -> Quadric {
        Quadric { m: self.m + rhs.m }
    }
}

impl AddAssign for Quadric {
    fn add_assign(&mut self, rhs: Quadric) {
        self.m += rhs.m;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cube_corner_quadric() -> Quadric {
        // x = 1, y = 1, z = 1
        Quadric::from_plane(&Vector3d::x(), -1.0)
            + Quadric::from_plane(&Vector3d::y(), -1.0)
            + Quadric::from_plane(&Vector3d::z(), -1.0)
    }

    #[test]
    fn test_plane_distance() {
        let q = Quadric::from_plane(&Vector3d::z(), 0.0);
        assert_relative_eq!(q.evaluate(&Point3d::new(5.0, -3.0, 0.0)), 0.0);
        assert_relative_eq!(q.evaluate(&Point3d::new(0.0, 0.0, 2.0)), 4.0);
    }

    #[test]
    fn test_from_triangle() {
        let q = Quadric::from_triangle(
            &Point3d::new(0.0, 0.0, 1.0),
            &Point3d::new(1.0, 0.0, 1.0),
            &Point3d::new(0.0, 1.0, 1.0),
        )
        .unwrap();
        assert_relative_eq!(q.evaluate(&Point3d::new(3.0, 3.0, 1.0)), 0.0, epsilon = 1e-12);
        assert_relative_eq!(q.evaluate(&Point3d::new(0.0, 0.0, 3.0)), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_triangle_has_no_plane() {
        let q = Quadric::from_triangle(
            &Point3d::new(0.0, 0.0, 0.0),
            &Point3d::new(1.0, 0.0, 0.0),
            &Point3d::new(2.0, 0.0, 0.0),
        );
        assert!(q.is_none());
    }

    #[test]
    fn test_minimizer_three_planes() {
        let p = cube_corner_quadric().minimizer().unwrap();
        assert_relative_eq!(p, Point3d::new(1.0, 1.0, 1.0), epsilon = 1e-9);
    }

    #[test]
    fn test_singular_falls_back_to_cheapest_candidate() {
        // Single plane z = 0: rank one, no unique minimizer
        let q = Quadric::from_plane(&Vector3d::z(), 0.0);
        assert!(q.minimizer().is_none());

        let a = Point3d::new(0.0, 0.0, 1.0);
        let b = Point3d::new(1.0, 0.0, 0.0);
        let (pos, cost) = q.optimal_position(&a, &b);
        assert_eq!(pos, b);
        assert_relative_eq!(cost, 0.0);
    }

    #[test]
    fn test_singular_tie_prefers_first_endpoint() {
        let q = Quadric::from_plane(&Vector3d::z(), 0.0);
        let a = Point3d::new(0.0, 0.0, 0.0);
        let b = Point3d::new(1.0, 0.0, 0.0);
        let (pos, _) = q.optimal_position(&a, &b);
        assert_eq!(pos, a);
    }

    #[test]
    fn test_far_minimizer_is_rejected() {
        // Minimizer sits at (1, 1, 1), far away from this tiny edge
        let q = cube_corner_quadric();
        let a = Point3d::new(-10.0, 0.0, 0.0);
        let b = Point3d::new(-10.1, 0.0, 0.0);
        let (pos, _) = q.optimal_position(&a, &b);
        assert!(pos == a || pos == b || (pos - Point3d::new(-10.05, 0.0, 0.0)).norm() < 1e-9);
    }
}
