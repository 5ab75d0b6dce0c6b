/// Tuning knobs for [`extract_surface`](crate::extract_surface).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtractConfig {
    /// Edge length of the finest cells. Must be a power of two no larger than
    /// the domain size.
    pub leaf_resolution: u32,
    /// Step used for central-difference normals at edge crossings.
    pub gradient_delta: f32,
    /// Singular values smaller than this fraction of the largest one are
    /// dropped when solving a cell's QEF.
    pub svd_truncation: f32,
    /// Safety factor on the field's
    /// [`lipschitz_bound`](crate::DensityField::lipschitz_bound). A branch is
    /// pruned only if some corner sample exceeds
    /// `padding * bound * cell_diagonal`. Fields without a bound and `None`
    /// never prune.
    pub prune_padding: Option<f32>,
    /// Precompute all corner samples in parallel before building the octree.
    pub sample_cache: bool,
    /// Overrides the hardware thread count used to partition the cache.
    pub worker_threads: Option<usize>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            leaf_resolution: 1,
            gradient_delta: 1e-3,
            svd_truncation: 0.1,
            prune_padding: Some(1.5),
            sample_cache: true,
            worker_threads: None,
        }
    }
}

impl ExtractConfig {
    pub fn with_leaf_resolution(mut self, leaf_resolution: u32) -> Self {
        self.leaf_resolution = leaf_resolution;
        self
    }

    pub fn with_gradient_delta(mut self, gradient_delta: f32) -> Self {
        self.gradient_delta = gradient_delta;
        self
    }

    pub fn with_svd_truncation(mut self, svd_truncation: f32) -> Self {
        self.svd_truncation = svd_truncation;
        self
    }

    pub fn with_prune_padding(mut self, prune_padding: Option<f32>) -> Self {
        self.prune_padding = prune_padding;
        self
    }

    pub fn with_sample_cache(mut self, sample_cache: bool) -> Self {
        self.sample_cache = sample_cache;
        self
    }

    pub fn with_worker_threads(mut self, worker_threads: Option<usize>) -> Self {
        self.worker_threads = worker_threads;
        self
    }
}
