//! Octree Dual Contouring
//!
//! Extracts a closed triangle mesh from a scalar density field over a cubic,
//! integer-aligned domain:
//!
//! 1. corner samples are optionally precomputed in parallel ([`SampleCache`]),
//! 2. an octree is built top-down, keeping only cells that may hold surface
//!    ([`CellOctree::build`]),
//! 3. every bipolar leaf places one vertex by minimizing a quadric error
//!    function over its edge crossings ([`Qef`]),
//! 4. the cell, face and edge procedures connect the vertices of the leaves
//!    around every bipolar edge ([`CellOctree::dual_contour`]),
//! 5. [`MeshBuilder`] collects a vertex buffer and a 16-bit index buffer.
//!
//! ```
//! use glam::{IVec3, Vec3A};
//! use octree_isomesh::{extract_surface, sdf_primitives::sphere, ExtractConfig};
//!
//! let ball = |p: Vec3A| sphere(p, Vec3A::splat(8.0), 4.0);
//! let mesh = extract_surface(IVec3::ZERO, 16, &ExtractConfig::default(), &ball).unwrap();
//! assert!(mesh.num_triangles() > 0);
//! ```
//!
//! # References
//!
//! - Tao Ju, Frank Losasso, Scott Schaefer, Joe Warren ["Dual Contouring of
//!   Hermite Data"](https://www.cs.rice.edu/~jwarren/papers/dualcontour.pdf)
//! - Peter Lindstrom ["Out-of-Core Simplification of Large Polygonal
//!   Models"](https://doi.org/10.1145/344779.344912), for the truncated-SVD
//!   QEF solve about the mass point

mod cell_octree;
mod config;
mod contour_octree;
mod density;
mod error;
mod mesh;
mod noise;
mod qef;
mod sample_cache;
mod sdf;
mod tables;

pub mod sdf_primitives;

pub use cell_octree::*;
pub use config::*;
pub use density::*;
pub use error::*;
pub use mesh::*;
pub use noise::*;
pub use qef::*;
pub use sample_cache::*;
pub use sdf::*;

use glam::IVec3;

/// Meshes the zero level set of `field` over the cube at `origin` with edge
/// length `size`.
///
/// `size` and `config.leaf_resolution` must be powers of two, with the leaf
/// resolution no larger than `size`. A field without a sign change yields an
/// empty mesh. On error nothing is returned; there is no partial mesh.
pub fn extract_surface(
    origin: IVec3,
    size: u32,
    config: &ExtractConfig,
    field: &impl DensityField,
) -> Result<SurfaceMesh> {
    validate_domain(origin, size, config.leaf_resolution)?;

    let cache = if config.sample_cache {
        // One extra layer so the far corners of the domain are cached too.
        let cache_size = size
            .checked_add(1)
            .ok_or(ExtractError::InvalidDomainSize(size))?;
        let cache = match config.worker_threads {
            Some(threads) => SampleCache::build_with_threads(origin, cache_size, threads, field)?,
            None => SampleCache::build(origin, cache_size, field)?,
        };
        Some(cache)
    } else {
        None
    };

    let Some(mut octree) = CellOctree::build(origin, size, config, field, cache.as_ref())? else {
        log::debug!("no surface in {size}^3 at {origin}");
        return Ok(SurfaceMesh::default());
    };

    MeshBuilder::contour(&mut octree)
}
