use crate::{noise::GradientNoise, sdf_primitives::sphere};
use glam::{IVec3, Vec3A};
use std::sync::OnceLock;

/// A scalar field whose sign separates inside (negative) from outside
/// (non-negative).
///
/// Implementations are evaluated concurrently while the sample cache is
/// built, so they must be `Sync` and free of side effects.
pub trait DensityField: Sync {
    fn density(&self, p: Vec3A) -> f32;

    /// An upper bound on how fast the density changes per unit of distance.
    ///
    /// Octree branches are only pruned for fields that declare one. An
    /// understated bound makes the octree drop real surface.
    fn lipschitz_bound(&self) -> Option<f32> {
        None
    }
}

impl<F> DensityField for F
where
    F: Fn(Vec3A) -> f32 + Sync,
{
    #[inline]
    fn density(&self, p: Vec3A) -> f32 {
        self(p)
    }
}

/// Declares a Lipschitz bound for a field that cannot state its own.
///
/// ```
/// use glam::Vec3A;
/// use octree_isomesh::{sdf_primitives::sphere, DensityField, Lipschitz};
///
/// // Exact distance fields change by at most 1 per unit.
/// let ball = Lipschitz::new(|p: Vec3A| sphere(p, Vec3A::ZERO, 2.0), 1.0);
/// assert_eq!(ball.lipschitz_bound(), Some(1.0));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Lipschitz<F> {
    pub field: F,
    pub bound: f32,
}

impl<F> Lipschitz<F> {
    pub fn new(field: F, bound: f32) -> Self {
        Self { field, bound }
    }
}

impl<F: DensityField> DensityField for Lipschitz<F> {
    #[inline]
    fn density(&self, p: Vec3A) -> f32 {
        self.field.density(p)
    }

    fn lipschitz_bound(&self) -> Option<f32> {
        Some(self.bound)
    }
}

/// Default value the border bias pushes toward: firmly outside.
pub const DEFAULT_BORDER_TARGET: f32 = 4.0;

/// Blend `value` toward `target` as `fraction` goes from 0 to 1.
///
/// `fraction` is clamped to `[0, 1]`. At 0 the value is returned unchanged,
/// at 1 the result is exactly `target`.
#[inline]
pub fn ensure_zero_crossing(value: f32, fraction: f32, target: f32) -> f32 {
    let f = fraction.clamp(0.0, 1.0);
    value * (1.0 - f) + target * f
}

/// Forces a field toward a single sign near the boundary of a cubic domain,
/// so no surface crossing lands exactly on the domain boundary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BorderBias {
    pub center: Vec3A,
    pub half_diagonal: f32,
    pub target: f32,
}

impl BorderBias {
    pub fn for_domain(origin: IVec3, size: u32, target: f32) -> Self {
        let half = 0.5 * size as f32;
        Self {
            center: origin.as_vec3a() + Vec3A::splat(half),
            half_diagonal: Vec3A::splat(half).length(),
            target,
        }
    }

    /// Normalized distance from the domain center, in `[0, 1]`.
    pub fn fraction(&self, p: Vec3A) -> f32 {
        if self.half_diagonal <= 0.0 {
            return 1.0;
        }
        ((p - self.center).length() / self.half_diagonal).clamp(0.0, 1.0)
    }

    pub fn apply(&self, value: f32, p: Vec3A) -> f32 {
        ensure_zero_crossing(value, self.fraction(p), self.target)
    }
}

/// A sphere with its surface displaced by domain-warped gradient noise.
///
/// The raw value is clamped to `[-1, 1]` and then passed through a
/// [`BorderBias`] for the domain it will be meshed in.
#[derive(Debug)]
pub struct BumpySphere {
    pub center: Vec3A,
    pub radius: f32,
    /// Scale of the surface displacement.
    pub amplitude: f32,
    /// Spatial frequency of the displacement noise.
    pub frequency: f32,
    /// How far sample positions are pushed around before the noise lookup.
    pub warp: f32,
    pub border: BorderBias,
    seed: u32,
    noise: OnceLock<GradientNoise>,
}

impl BumpySphere {
    /// A sphere filling roughly a third of the domain, with mild bumps.
    pub fn for_domain(origin: IVec3, size: u32, seed: u32) -> Self {
        let border = BorderBias::for_domain(origin, size, DEFAULT_BORDER_TARGET);
        Self {
            center: border.center,
            radius: 0.3 * size as f32,
            amplitude: 0.1 * size as f32,
            frequency: 4.0 / size as f32,
            warp: 0.5,
            border,
            seed,
            noise: OnceLock::new(),
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    fn noise(&self) -> &GradientNoise {
        self.noise.get_or_init(|| GradientNoise::new(self.seed))
    }

    /// Offsets each axis by an independent noise lookup.
    fn warp_position(&self, p: Vec3A) -> Vec3A {
        let noise = self.noise();
        let q = p * self.frequency;
        let offset = Vec3A::new(
            noise.sample(q + Vec3A::new(0.0, 0.0, 0.0)),
            noise.sample(q + Vec3A::new(5.2, 1.3, 2.8)),
            noise.sample(q + Vec3A::new(1.7, 9.2, 4.1)),
        );
        q + self.warp * offset
    }
}

impl DensityField for BumpySphere {
    fn density(&self, p: Vec3A) -> f32 {
        let warped = self.warp_position(p);
        let raw = sphere(p, self.center, self.radius) + self.amplitude * self.noise().noise3(warped);
        self.border.apply(raw.clamp(-1.0, 1.0), p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_bias_is_identity_at_center() {
        for v in [-0.75, -0.1, 0.0, 0.3, 1.0] {
            assert_eq!(ensure_zero_crossing(v, 0.0, DEFAULT_BORDER_TARGET), v);
        }
        let bias = BorderBias::for_domain(IVec3::ZERO, 16, DEFAULT_BORDER_TARGET);
        assert_eq!(bias.fraction(Vec3A::splat(8.0)), 0.0);
        assert_eq!(bias.apply(-0.5, Vec3A::splat(8.0)), -0.5);
    }

    #[test]
    fn border_bias_saturates_at_corner() {
        let bias = BorderBias::for_domain(IVec3::new(-4, 0, 4), 8, DEFAULT_BORDER_TARGET);
        let corner = Vec3A::new(-4.0, 0.0, 4.0);
        assert_eq!(bias.fraction(corner), 1.0);
        for v in [-1.0, -0.2, 0.0, 0.9] {
            assert_eq!(bias.apply(v, corner), DEFAULT_BORDER_TARGET);
        }
        // Past the corner the fraction stays clamped.
        assert_eq!(ensure_zero_crossing(-1.0, 3.0, -2.0), -2.0);
    }

    #[test]
    fn border_bias_is_monotonic_in_fraction() {
        for v in [-1.0f32, -0.3, 0.4] {
            let mut prev = ensure_zero_crossing(v, 0.0, DEFAULT_BORDER_TARGET);
            for i in 1..=20 {
                let next = ensure_zero_crossing(v, i as f32 / 20.0, DEFAULT_BORDER_TARGET);
                assert!(next >= prev);
                prev = next;
            }
        }
    }

    #[test]
    fn bumpy_sphere_is_inside_at_center_and_outside_at_border() {
        let field = BumpySphere::for_domain(IVec3::ZERO, 32, 3);
        assert!(field.density(Vec3A::splat(16.0)) < 0.0);
        for corner in [Vec3A::ZERO, Vec3A::splat(32.0), Vec3A::new(0.0, 32.0, 0.0)] {
            assert!(field.density(corner) > 0.0);
        }
        // Face centers sit at fraction 1/sqrt(3); the bias must already win there.
        for face in [Vec3A::new(0.0, 16.0, 16.0), Vec3A::new(16.0, 32.0, 16.0)] {
            assert!(field.density(face) > 0.0);
        }
    }

    #[test]
    fn closures_are_density_fields() {
        let field = |p: Vec3A| p.x - 1.0;
        assert_eq!(DensityField::density(&field, Vec3A::new(3.0, 0.0, 0.0)), 2.0);
        assert_eq!(field.lipschitz_bound(), None);
        assert_eq!(BumpySphere::for_domain(IVec3::ZERO, 8, 0).lipschitz_bound(), None);
    }

    #[test]
    fn lipschitz_wrapper_declares_its_bound() {
        let field = Lipschitz::new(|p: Vec3A| 3.0 * p.y, 3.0);
        assert_eq!(field.density(Vec3A::new(0.0, 2.0, 0.0)), 6.0);
        assert_eq!(field.lipschitz_bound(), Some(3.0));
    }
}
