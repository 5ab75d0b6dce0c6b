use glam::Vec3A;

pub fn sphere(p: Vec3A, center: Vec3A, radius: f32) -> f32 {
    (p - center).length() - radius
}

/// Exact signed distance to an axis-aligned box centered at the origin.
pub fn cuboid(p: Vec3A, half_extents: Vec3A) -> f32 {
    let q = p.abs() - half_extents;
    q.max(Vec3A::ZERO).length() + q.max_element().min(0.0)
}
