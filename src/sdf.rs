use crate::{density::DensityField, qef::Qef};
use glam::Vec3A;
use ilattice::prelude::Extent;

/// Bit `i` is set when corner `i` is outside (`density >= 0`).
///
/// NaN samples count as inside. Every other sign test in the crate goes
/// through this mask so the two can never disagree.
pub fn sign_mask(samples: &[f32; 8]) -> u8 {
    let mut mask = 0;
    for (i, &d) in samples.iter().enumerate() {
        if d >= 0.0 {
            mask |= 1 << i;
        }
    }
    mask
}

/// True when the cell has corners on both sides of the surface.
#[inline]
pub fn mask_is_bipolar(mask: u8) -> bool {
    mask != 0 && mask != u8::MAX
}

/// May have false negatives, but never has false positives.
///
/// A field that changes by at most `lipschitz` per unit of distance cannot
/// reach zero within `|d| / lipschitz` of a sample `d`. So when some corner's
/// value exceeds `lipschitz * extent_diagonal`, that corner is too far from
/// the surface for the cell to hold any of it. `padding` scales the bound up
/// as a safety margin.
pub fn branch_empty_check(
    extent_diagonal: f32,
    lipschitz: f32,
    padding: f32,
    samples: &[f32; 8],
) -> bool {
    let reach = padding * lipschitz * extent_diagonal;
    if !(reach > 0.0) || !reach.is_finite() {
        return false;
    }
    samples.iter().any(|d| d.abs() > reach)
}

pub fn central_gradient(field: &impl DensityField, p: Vec3A, delta: f32) -> Vec3A {
    let h = 0.5 * delta;
    let dx = Vec3A::new(h, 0.0, 0.0);
    let dy = Vec3A::new(0.0, h, 0.0);
    let dz = Vec3A::new(0.0, 0.0, h);
    Vec3A::new(
        field.density(p + dx) - field.density(p - dx),
        field.density(p + dy) - field.density(p - dy),
        field.density(p + dz) - field.density(p - dz),
    ) / delta
}

/// Hermite data gathered from the bipolar edges of one leaf.
#[derive(Clone, Debug, Default)]
pub struct LeafHermite {
    pub qef: Qef,
    pub normal_sum: Vec3A,
    /// Crossings that produced a finite position and a usable normal.
    pub num_crossings: u8,
}

/// Accumulates one plane constraint per bipolar edge of a leaf.
///
/// Crossings are found by linear interpolation of the two corner samples;
/// normals by central differences on the field itself, since crossings fall
/// between lattice points.
pub fn estimate_leaf_hermite(
    extent: &Extent<Vec3A>,
    samples: &[f32; 8],
    mask: u8,
    field: &impl DensityField,
    gradient_delta: f32,
) -> LeafHermite {
    let mut hermite = LeafHermite::default();

    let corners = extent.corners3();
    for [e1, e2] in Extent::<Vec3A>::EDGES3 {
        let outside1 = mask & (1 << e1) != 0;
        let outside2 = mask & (1 << e2) != 0;
        if outside1 == outside2 {
            continue;
        }

        // Lerp the edge vertices.
        let s1 = samples[e1];
        let s2 = samples[e2];
        let diff = s2 - s1;
        let t = (-s1 / diff).clamp(0.0, 1.0);
        let edge_cross_p = corners[e1].lerp(corners[e2], t);
        if !edge_cross_p.is_finite() {
            continue;
        }

        let normal = central_gradient(field, edge_cross_p, gradient_delta).normalize_or_zero();
        if normal == Vec3A::ZERO {
            continue;
        }

        hermite.qef = hermite.qef + Qef::plane(edge_cross_p, normal);
        hermite.normal_sum += normal;
        hermite.num_crossings += 1;
    }

    hermite
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_uses_corner_bit_order() {
        let mut samples = [-1.0; 8];
        samples[0b001] = 0.5;
        samples[0b110] = 0.0;
        assert_eq!(sign_mask(&samples), 0b0100_0010);
        assert!(mask_is_bipolar(sign_mask(&samples)));
        assert!(!mask_is_bipolar(sign_mask(&[1.0; 8])));
        assert!(!mask_is_bipolar(sign_mask(&[-1.0; 8])));
        assert_eq!(sign_mask(&[f32::NAN; 8]), 0);
    }

    #[test]
    fn empty_check_is_conservative() {
        let diag = 3.0f32.sqrt();
        // Uniform sign but close to the surface: must not be pruned.
        assert!(!branch_empty_check(diag, 1.0, 1.5, &[0.5; 8]));
        // Far from the surface.
        assert!(branch_empty_check(diag, 1.0, 1.5, &[10.0; 8]));
        // The same samples are not far for a field ten times as steep.
        assert!(!branch_empty_check(diag, 10.0, 1.5, &[10.0; 8]));
        // Nonsense bounds never prune.
        assert!(!branch_empty_check(diag, 0.0, 1.5, &[10.0; 8]));
        assert!(!branch_empty_check(diag, f32::NAN, 1.5, &[10.0; 8]));
    }

    #[test]
    fn gradient_of_plane() {
        let field = |p: Vec3A| 2.0 * p.x - p.z;
        let g = central_gradient(&field, Vec3A::new(1.0, 2.0, 3.0), 1e-2);
        assert!((g - Vec3A::new(2.0, 0.0, -1.0)).length() < 1e-3);
    }

    #[test]
    fn hermite_for_axis_plane() {
        // Surface x = 0.25 inside a unit cell.
        let field = |p: Vec3A| p.x - 0.25;
        let extent = Extent::from_min_and_lub(Vec3A::ZERO, Vec3A::ONE);
        let samples = extent.corners3().map(|p| field(p));
        let mask = sign_mask(&samples);
        let hermite = estimate_leaf_hermite(&extent, &samples, mask, &field, 1e-3);

        // Four x-aligned edges cross the plane.
        assert_eq!(hermite.num_crossings, 4);
        let mass = hermite.qef.mass_point();
        assert!((mass.x - 0.25).abs() < 1e-5);
        assert!((hermite.normal_sum.normalize() - Vec3A::X).length() < 1e-3);
    }
}
