use glam::Vec3A;
use nalgebra::{Matrix3, Vector3};
use std::ops::Add;

/// Quadric Error Function
///
/// `x^T A x - 2 b^T x + c`
///
/// Built from plane constraints `n · (x - p) = 0`, so `A = Σ n nᵀ`,
/// `b = Σ (n · p) n` and `c = Σ (n · p)²`. The mass point (mean of all
/// constraint positions) is tracked alongside and anchors the solve when the
/// normals do not span all three dimensions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Qef {
    a00: f32,
    a01: f32,
    a02: f32,
    a11: f32,
    a12: f32,
    a22: f32,

    b: Vec3A,

    c: f32,

    mass_point_sum: Vec3A,
    num_points: u32,
}

impl Qef {
    /// The quadric of a single plane through `p` with normal `n`.
    pub fn plane(p: Vec3A, n: Vec3A) -> Self {
        let d = p.dot(n);
        let [[a00, a01, a02], [_, a11, a12], [_, _, a22]] = self_outer_product(n.into());
        Self {
            a00,
            a01,
            a02,
            a11,
            a12,
            a22,
            b: d * n,
            c: d * d,
            mass_point_sum: p,
            num_points: 1,
        }
    }

    pub fn num_points(&self) -> u32 {
        self.num_points
    }

    /// Mean of the constraint positions, or the origin if there are none.
    pub fn mass_point(&self) -> Vec3A {
        if self.num_points == 0 {
            Vec3A::ZERO
        } else {
            self.mass_point_sum / self.num_points as f32
        }
    }

    /// Residual L2 error. `x^T A x - 2 b^T x + c`
    pub fn error(&self, p: Vec3A) -> f32 {
        let ax = self.mul_a(p);
        p.dot(ax) - 2.0 * p.dot(self.b) + self.c
    }

    /// Minimizes the error with a truncated-SVD pseudo-inverse, expanded
    /// about the mass point.
    ///
    /// Singular values below `truncation` times the largest one are treated
    /// as zero, which leaves the result at the mass point along any direction
    /// the constraints do not pin down. Returns `None` without constraints.
    pub fn solve(&self, truncation: f32) -> Option<Vec3A> {
        if self.num_points == 0 {
            return None;
        }
        let mass_point = self.mass_point();

        let a = Matrix3::new(
            self.a00, self.a01, self.a02, //
            self.a01, self.a11, self.a12, //
            self.a02, self.a12, self.a22,
        );
        let rhs = self.b - self.mul_a(mass_point);
        let rhs = Vector3::new(rhs.x, rhs.y, rhs.z);

        let svd = a.svd(true, true);
        let max_singular = svd
            .singular_values
            .iter()
            .fold(0.0f32, |max, &s| max.max(s));
        if !(max_singular > f32::EPSILON) {
            return Some(mass_point);
        }

        let Ok(pseudo_inverse) = svd.pseudo_inverse(truncation.max(0.0) * max_singular) else {
            return Some(mass_point);
        };
        let offset = pseudo_inverse * rhs;
        let x = mass_point + Vec3A::new(offset.x, offset.y, offset.z);

        Some(if x.is_finite() { x } else { mass_point })
    }

    fn mul_a(&self, p: Vec3A) -> Vec3A {
        Vec3A::new(
            self.a00 * p[0] + self.a01 * p[1] + self.a02 * p[2],
            self.a01 * p[0] + self.a11 * p[1] + self.a12 * p[2],
            self.a02 * p[0] + self.a12 * p[1] + self.a22 * p[2],
        )
    }
}

impl Add for Qef {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            a00: self.a00 + rhs.a00,
            a01: self.a01 + rhs.a01,
            a02: self.a02 + rhs.a02,
            a11: self.a11 + rhs.a11,
            a12: self.a12 + rhs.a12,
            a22: self.a22 + rhs.a22,
            b: self.b + rhs.b,
            c: self.c + rhs.c,
            mass_point_sum: self.mass_point_sum + rhs.mass_point_sum,
            num_points: self.num_points + rhs.num_points,
        }
    }
}

fn self_outer_product([a, b, c]: [f32; 3]) -> [[f32; 3]; 3] {
    [
        [a * a, a * b, a * c],
        [a * b, b * b, b * c],
        [a * c, b * c, c * c],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: Vec3A, b: Vec3A) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn three_planes_meet_at_corner() {
        let corner = Vec3A::new(1.0, 2.0, 3.0);
        let qef = Qef::plane(Vec3A::new(1.0, 0.0, 0.0), Vec3A::X)
            + Qef::plane(Vec3A::new(0.0, 2.0, 0.0), Vec3A::Y)
            + Qef::plane(Vec3A::new(0.0, 0.0, 3.0), Vec3A::Z);
        let x = qef.solve(0.1).unwrap();
        assert!(approx_eq(x, corner), "{x}");
        assert!(qef.error(x).abs() < 1e-4);
    }

    #[test]
    fn parallel_planes_fall_back_to_mass_point() {
        // Rank one: only x is constrained, y and z come from the mass point.
        let qef = Qef::plane(Vec3A::new(0.5, 0.0, 0.0), Vec3A::X)
            + Qef::plane(Vec3A::new(0.5, 1.0, 0.0), Vec3A::X)
            + Qef::plane(Vec3A::new(0.5, 1.0, 1.0), Vec3A::X)
            + Qef::plane(Vec3A::new(0.5, 0.0, 1.0), Vec3A::X);
        let x = qef.solve(0.1).unwrap();
        assert!(approx_eq(x, Vec3A::new(0.5, 0.5, 0.5)), "{x}");
    }

    #[test]
    fn sharp_edge_keeps_both_planes() {
        // Two planes x = 1 and y = 1, with constraint points spread along z.
        let qef = Qef::plane(Vec3A::new(1.0, 0.2, 0.0), Vec3A::X)
            + Qef::plane(Vec3A::new(1.0, 0.6, 1.0), Vec3A::X)
            + Qef::plane(Vec3A::new(0.3, 1.0, 0.0), Vec3A::Y)
            + Qef::plane(Vec3A::new(0.7, 1.0, 1.0), Vec3A::Y);
        let x = qef.solve(0.1).unwrap();
        assert!(approx_eq(x, Vec3A::new(1.0, 1.0, 0.5)), "{x}");
    }

    #[test]
    fn empty_qef_has_no_solution() {
        assert_eq!(Qef::default().solve(0.1), None);
        assert_eq!(Qef::default().mass_point(), Vec3A::ZERO);
    }
}
