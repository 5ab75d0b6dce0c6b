//! Error types for surface extraction.

use glam::IVec3;
use thiserror::Error;

/// Everything that can make an extraction call fail.
///
/// Numerical trouble inside a single cell (rank-deficient QEF, a leaf with no
/// usable edge crossings) is never reported here; those cells are recovered
/// locally.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// A cache lookup fell outside `[origin, origin + size)`.
    #[error("sample {coord} is outside the cached region starting at {origin} with size {size}")]
    SampleOutOfRange {
        coord: IVec3,
        origin: IVec3,
        size: u32,
    },

    /// The domain edge length is zero or not a power of two.
    #[error("domain size {0} must be a nonzero power of two")]
    InvalidDomainSize(u32),

    /// The leaf resolution is not a power of two dividing the domain size.
    #[error("leaf resolution {leaf_resolution} must be a power of two no larger than the domain size {size}")]
    InvalidLeafResolution { leaf_resolution: u32, size: u32 },

    /// A sample cache was requested with zero samples per axis.
    #[error("sample cache size {0} must be nonzero")]
    InvalidCacheSize(u32),

    /// The mesh needs more vertices than a 16-bit index buffer can address.
    #[error("mesh needs {0} vertices but 16-bit indices address at most 65536")]
    TooManyVertices(usize),

    /// The worker pool for the sample cache could not be created.
    #[error("failed to start sampling workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A specialized Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;
