use crate::{
    config::ExtractConfig,
    density::DensityField,
    error::{ExtractError, Result},
    mesh::{MeshVertexId, NULL_MESH_VERTEX_ID},
    sample_cache::SampleCache,
    sdf::{branch_empty_check, estimate_leaf_hermite, mask_is_bipolar, sign_mask},
    tables::octant_offset,
};
use glam::{IVec3, Vec3, Vec3A};
use ilattice::extent::Extent;

/// Checks the domain preconditions shared by every extraction entry point.
pub fn validate_domain(origin: IVec3, size: u32, leaf_resolution: u32) -> Result<()> {
    if !size.is_power_of_two() {
        return Err(ExtractError::InvalidDomainSize(size));
    }
    // The far corner of the domain must still be addressable.
    let max = origin.max_element() as i64 + size as i64;
    if max > i32::MAX as i64 {
        return Err(ExtractError::InvalidDomainSize(size));
    }
    if !leaf_resolution.is_power_of_two() || leaf_resolution > size {
        return Err(ExtractError::InvalidLeafResolution {
            leaf_resolution,
            size,
        });
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct CellOctree {
    pub(crate) root_id: CellId,

    pub(crate) all_cells: Vec<Cell>,
    pub(crate) cell_stack: Vec<CellId>,
    pub(crate) face_stack: Vec<Face>,
    pub(crate) edge_stack: Vec<Edge>,
}

impl CellOctree {
    fn new(root_id: CellId, all_cells: Vec<Cell>) -> Self {
        Self {
            root_id,
            all_cells,
            ..Default::default()
        }
    }

    pub fn root_id(&self) -> CellId {
        self.root_id
    }

    pub fn all_cells(&self) -> &[Cell] {
        &self.all_cells
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.all_cells[id as usize]
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Cell> {
        self.all_cells.iter().filter(|c| c.is_leaf)
    }

    /// Leaves that will contribute a mesh vertex.
    pub fn num_leaves_with_vertex(&self) -> usize {
        self.leaves().filter(|c| c.has_vertex()).count()
    }

    pub(crate) fn clear_stacks(&mut self) {
        self.cell_stack.clear();
        self.face_stack.clear();
        self.edge_stack.clear();
    }

    /// Builds the octree top-down over the cube at `origin` with edge length
    /// `size`, subdividing every branch that may hold surface down to
    /// `config.leaf_resolution`.
    ///
    /// Corners are read from `cache` when given, otherwise from `field`.
    /// Normals always come from `field`. Returns `None` if no cell carries
    /// surface.
    pub fn build(
        origin: IVec3,
        size: u32,
        config: &ExtractConfig,
        field: &impl DensityField,
        cache: Option<&SampleCache>,
    ) -> Result<Option<Self>> {
        validate_domain(origin, size, config.leaf_resolution)?;

        let ctx = BuildContext {
            config,
            field,
            cache,
        };

        let root_is_leaf = size == config.leaf_resolution;
        let Some(mut root_cell) = Cell::new(&ctx, origin, size, size, 0, root_is_leaf)? else {
            return Ok(None);
        };

        if root_cell.is_leaf {
            root_cell.estimate_vertex(&ctx);
            return Ok(Some(Self::new(0, vec![root_cell])));
        }

        let mut me = Self::new(CellId::MAX, vec![]);
        let maybe_root_id = me.build_recursive_from_branch(&ctx, root_cell)?;

        log::debug!(
            "octree over {size}^3 at {origin}: {} cells, {} surface leaves",
            me.all_cells.len(),
            me.num_leaves_with_vertex()
        );

        Ok(maybe_root_id.map(|root_id| {
            me.root_id = root_id;
            me
        }))
    }

    // Recursive because it's easier and gives a post-order arena, with every
    // child stored before its parent.
    fn build_recursive_from_branch<F: DensityField>(
        &mut self,
        ctx: &BuildContext<'_, F>,
        mut branch: Cell,
    ) -> Result<Option<CellId>> {
        assert!(!branch.is_leaf);

        let child_size = branch.size / 2;
        let child_is_leaf = child_size == ctx.config.leaf_resolution;
        let mut child_cell_ids = [None; 8];
        for (octant, maybe_child_id) in child_cell_ids.iter_mut().enumerate() {
            let child_min = branch.min + IVec3::from(octant_offset(octant)) * child_size as i32;
            let Some(mut child_cell) = Cell::new(
                ctx,
                child_min,
                child_size,
                branch.size,
                branch.depth + 1,
                child_is_leaf,
            )?
            else {
                continue;
            };

            if child_cell.is_leaf {
                child_cell.estimate_vertex(ctx);
                let child_id = self.all_cells.len() as CellId;
                self.all_cells.push(child_cell);
                *maybe_child_id = Some(child_id);
            } else {
                *maybe_child_id = self.build_recursive_from_branch(ctx, child_cell)?;
            }
        }

        if child_cell_ids.iter().all(Option::is_none) {
            // Empty branch.
            return Ok(None);
        }

        branch.children = child_cell_ids;
        let branch_id = self.all_cells.len() as CellId;
        self.all_cells.push(branch);

        Ok(Some(branch_id))
    }
}

struct BuildContext<'a, F> {
    config: &'a ExtractConfig,
    field: &'a F,
    cache: Option<&'a SampleCache>,
}

impl<F: DensityField> BuildContext<'_, F> {
    fn sample(&self, p: Vec3A) -> Result<f32> {
        match self.cache {
            Some(cache) => cache.sample_at(p),
            None => Ok(self.field.density(p)),
        }
    }
}

pub type CellId = u32;

#[derive(Clone, Debug)]
pub struct Cell {
    /// World-space bounds.
    pub extent: Extent<Vec3A>,
    /// Lattice-space minimum corner.
    pub min: IVec3,
    pub size: u32,
    /// Edge length of the parent cell (equal to `size` for the root).
    pub parent_size: u32,

    pub samples: [f32; 8],
    pub sign_mask: u8,
    pub children: [Option<CellId>; 8],

    /// Dual vertex. Only meaningful when [`Cell::has_vertex`] holds.
    pub draw_pos: Vec3,
    pub average_normal: Vec3,
    /// Edge crossings that contributed to the vertex solve.
    pub num_crossings: u8,

    pub mesh_vertex_id: MeshVertexId,

    pub depth: u8,
    pub is_leaf: bool,
}

impl Cell {
    /// Samples the corners of a cell, returning `None` when it provably
    /// carries no surface. Leaves must be bipolar; branches are only dropped
    /// when the conservative distance check allows it.
    fn new<F: DensityField>(
        ctx: &BuildContext<'_, F>,
        min: IVec3,
        size: u32,
        parent_size: u32,
        depth: u8,
        is_leaf: bool,
    ) -> Result<Option<Self>> {
        let min_p = min.as_vec3a();
        let extent = Extent::from_min_and_lub(min_p, min_p + Vec3A::splat(size as f32));

        let mut samples = [0.0; 8];
        for (sample, corner) in samples.iter_mut().zip(extent.corners3()) {
            *sample = ctx.sample(corner)?;
        }
        let mask = sign_mask(&samples);
        let bipolar = mask_is_bipolar(mask);

        // Only fields that bound their own rate of change can be pruned.
        let provably_empty = !bipolar
            && match (ctx.config.prune_padding, ctx.field.lipschitz_bound()) {
                (Some(padding), Some(lipschitz)) => {
                    branch_empty_check(extent.shape.length(), lipschitz, padding, &samples)
                }
                _ => false,
            };
        if (is_leaf && !bipolar) || provably_empty {
            return Ok(None);
        }

        Ok(Some(Self {
            extent,
            min,
            size,
            parent_size,
            samples,
            sign_mask: mask,
            children: [None; 8],
            draw_pos: Vec3::ZERO,
            average_normal: Vec3::ZERO,
            num_crossings: 0,
            mesh_vertex_id: NULL_MESH_VERTEX_ID,
            depth,
            is_leaf,
        }))
    }

    /// Builds a single leaf at `min` with edge length `resolution`, or `None`
    /// if the cell has no sign change.
    pub fn build_leaf(
        min: IVec3,
        resolution: u32,
        config: &ExtractConfig,
        field: &impl DensityField,
        cache: Option<&SampleCache>,
    ) -> Result<Option<Self>> {
        let ctx = BuildContext {
            config,
            field,
            cache,
        };
        let Some(mut leaf) = Self::new(&ctx, min, resolution, resolution, 0, true)? else {
            return Ok(None);
        };
        leaf.estimate_vertex(&ctx);
        Ok(Some(leaf))
    }

    /// True for bipolar leaves whose vertex solve found usable crossings.
    pub fn has_vertex(&self) -> bool {
        self.is_leaf && mask_is_bipolar(self.sign_mask) && self.num_crossings > 0
    }

    pub fn children(&self) -> impl Iterator<Item = CellId> + '_ {
        self.children.iter().flatten().copied()
    }

    fn estimate_vertex<F: DensityField>(&mut self, ctx: &BuildContext<'_, F>) {
        let hermite = estimate_leaf_hermite(
            &self.extent,
            &self.samples,
            self.sign_mask,
            ctx.field,
            ctx.config.gradient_delta,
        );
        self.num_crossings = hermite.num_crossings;
        if hermite.num_crossings == 0 {
            log::warn!(
                "leaf at {} (mask {:#010b}) has no usable edge crossings; skipping its vertex",
                self.min,
                self.sign_mask
            );
            return;
        }

        let min = self.extent.minimum;
        let max = min + self.extent.shape;
        let p = hermite
            .qef
            .solve(ctx.config.svd_truncation)
            .unwrap_or_else(|| self.extent.center());
        self.draw_pos = p.clamp(min, max).into();
        self.average_normal = hermite.normal_sum.normalize_or_zero().into();
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Face {
    pub axis: usize,
    pub cells: [CellId; 2],
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Edge {
    pub axis: usize,
    pub cells: [CellId; 4],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf_primitives::sphere;

    fn ball(p: Vec3A) -> f32 {
        sphere(p, Vec3A::splat(8.0), 4.0)
    }

    #[test]
    fn rejects_bad_domains() {
        assert!(matches!(
            validate_domain(IVec3::ZERO, 12, 1),
            Err(ExtractError::InvalidDomainSize(12))
        ));
        assert!(matches!(
            validate_domain(IVec3::ZERO, 0, 1),
            Err(ExtractError::InvalidDomainSize(0))
        ));
        assert!(matches!(
            validate_domain(IVec3::ZERO, 16, 3),
            Err(ExtractError::InvalidLeafResolution { .. })
        ));
        assert!(matches!(
            validate_domain(IVec3::ZERO, 16, 32),
            Err(ExtractError::InvalidLeafResolution { .. })
        ));
        assert!(matches!(
            validate_domain(IVec3::splat(i32::MAX - 4), 16, 1),
            Err(ExtractError::InvalidDomainSize(16))
        ));
        assert!(validate_domain(IVec3::new(-8, 0, 3), 16, 4).is_ok());
    }

    #[test]
    fn sphere_tree_has_uniform_bipolar_leaves() {
        let config = ExtractConfig::default().with_sample_cache(false);
        let octree = CellOctree::build(IVec3::ZERO, 16, &config, &ball, None)
            .unwrap()
            .unwrap();

        let root = octree.cell(octree.root_id());
        assert_eq!(root.size, 16);
        assert_eq!(root.depth, 0);
        assert!(!root.is_leaf);

        assert!(octree.leaves().count() > 0);
        for leaf in octree.leaves() {
            assert_eq!(leaf.size, 1);
            assert_eq!(leaf.parent_size, 2);
            assert_eq!(leaf.depth, 4);
            assert!(mask_is_bipolar(leaf.sign_mask));
            assert!(leaf.has_vertex());
        }

        // Children are stored before their parents.
        for (id, cell) in octree.all_cells().iter().enumerate() {
            for child in cell.children() {
                assert!((child as usize) < id);
            }
        }
    }

    #[test]
    fn draw_positions_stay_in_their_cells() {
        let config = ExtractConfig::default().with_sample_cache(false);
        let octree = CellOctree::build(IVec3::ZERO, 16, &config, &ball, None)
            .unwrap()
            .unwrap();
        let eps = 1e-4;
        for leaf in octree.leaves() {
            let p = Vec3A::from(leaf.draw_pos);
            let min = leaf.extent.minimum - Vec3A::splat(eps);
            let max = leaf.extent.minimum + leaf.extent.shape + Vec3A::splat(eps);
            assert!(p.cmpge(min).all() && p.cmple(max).all(), "{p} outside {min}..{max}");
            // Normals of a sphere point away from its center.
            let outward = (p - Vec3A::splat(8.0)).normalize();
            assert!(Vec3A::from(leaf.average_normal).dot(outward) > 0.5);
        }
    }

    #[test]
    fn cached_and_direct_builds_agree() {
        let config = ExtractConfig::default();
        let cache = SampleCache::build(IVec3::ZERO, 17, &ball).unwrap();
        let cached = CellOctree::build(IVec3::ZERO, 16, &config, &ball, Some(&cache))
            .unwrap()
            .unwrap();
        let direct = CellOctree::build(IVec3::ZERO, 16, &config, &ball, None)
            .unwrap()
            .unwrap();
        assert_eq!(cached.all_cells().len(), direct.all_cells().len());
        for (a, b) in cached.all_cells().iter().zip(direct.all_cells()) {
            assert_eq!(a.min, b.min);
            assert_eq!(a.sign_mask, b.sign_mask);
            assert_eq!(a.draw_pos, b.draw_pos);
        }
    }

    #[test]
    fn undersized_cache_fails_fast() {
        let config = ExtractConfig::default();
        // Missing the far boundary layer of corners.
        let cache = SampleCache::build(IVec3::ZERO, 16, &ball).unwrap();
        assert!(matches!(
            CellOctree::build(IVec3::ZERO, 16, &config, &ball, Some(&cache)),
            Err(ExtractError::SampleOutOfRange { .. })
        ));
    }

    #[test]
    fn uniform_field_has_no_tree() {
        let config = ExtractConfig::default().with_sample_cache(false);
        let positive = |_: Vec3A| 1.0;
        assert!(CellOctree::build(IVec3::ZERO, 8, &config, &positive, None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn single_leaf() {
        let config = ExtractConfig::default();
        let plane = |p: Vec3A| p.y - 2.5;
        let leaf = Cell::build_leaf(IVec3::new(0, 2, 0), 1, &config, &plane, None)
            .unwrap()
            .unwrap();
        assert!(leaf.has_vertex());
        assert_eq!(leaf.num_crossings, 4);
        assert!((leaf.draw_pos.y - 2.5).abs() < 1e-4);
        assert!((leaf.average_normal - Vec3::Y).length() < 1e-3);

        assert!(Cell::build_leaf(IVec3::new(0, 5, 0), 1, &config, &plane, None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn root_leaf_domain() {
        let config = ExtractConfig::default()
            .with_leaf_resolution(4)
            .with_sample_cache(false);
        let plane = |p: Vec3A| p.z - 1.5;
        let octree = CellOctree::build(IVec3::ZERO, 4, &config, &plane, None)
            .unwrap()
            .unwrap();
        assert_eq!(octree.all_cells().len(), 1);
        assert!(octree.cell(octree.root_id()).has_vertex());
    }
}
