//! Parallel precomputation of density samples on an integer lattice.
//!
//! The cached region is a cube of `size` samples per axis starting at
//! `origin`. Its `size³` logical indices (`x + size * (y + size * z)`,
//! relative to `origin`) are split into contiguous segments, one per worker
//! task. Every task writes only its own buffer, and the buffers are collected
//! in index order, so lookups never depend on which task finished first.

use crate::{
    density::DensityField,
    error::{ExtractError, Result},
};
use glam::{IVec3, Vec3A};
use rayon::prelude::*;

/// Minimum number of samples a worker task must be given.
pub const MIN_SAMPLES_PER_TASK: usize = 8;

/// Number of worker tasks used for `total` samples.
///
/// Never more tasks than hardware threads, never fewer than
/// [`MIN_SAMPLES_PER_TASK`] samples per task, and always at least one task.
pub fn task_count(total: usize, hardware_threads: usize) -> usize {
    hardware_threads
        .min(total / MIN_SAMPLES_PER_TASK)
        .max(1)
}

#[derive(Clone, Debug)]
pub struct SampleCache {
    origin: IVec3,
    size: u32,
    segment_len: usize,
    segments: Vec<Vec<f32>>,
}

impl SampleCache {
    /// Samples `field` on the global rayon pool, one task per hardware thread.
    pub fn build(origin: IVec3, size: u32, field: &impl DensityField) -> Result<Self> {
        Self::build_partitioned(origin, size, rayon::current_num_threads(), field)
    }

    /// Samples `field` on a dedicated pool of `threads` workers.
    ///
    /// Fails if the pool cannot be started.
    pub fn build_with_threads(
        origin: IVec3,
        size: u32,
        threads: usize,
        field: &impl DensityField,
    ) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("sample-cache-{i}"))
            .build()?;
        pool.install(|| Self::build_partitioned(origin, size, threads, field))
    }

    fn build_partitioned(
        origin: IVec3,
        size: u32,
        hardware_threads: usize,
        field: &impl DensityField,
    ) -> Result<Self> {
        if size == 0 {
            return Err(ExtractError::InvalidCacheSize(size));
        }

        let side = size as usize;
        let total = side
            .checked_mul(side)
            .and_then(|n| n.checked_mul(side))
            .ok_or(ExtractError::InvalidCacheSize(size))?;
        let num_tasks = task_count(total, hardware_threads);
        let segment_len = total / num_tasks;
        log::debug!(
            "sampling {total} points at {origin} in {num_tasks} segments of {segment_len}"
        );

        let segments: Vec<Vec<f32>> = (0..num_tasks)
            .into_par_iter()
            .map(|task| {
                let start = task * segment_len;
                // The final segment absorbs the remainder.
                let end = if task + 1 == num_tasks {
                    total
                } else {
                    start + segment_len
                };
                log::trace!("segment {task}: samples {start}..{end}");
                (start..end)
                    .map(|i| field.density(delinearize(origin, side, i).as_vec3a()))
                    .collect()
            })
            .collect();

        Ok(Self {
            origin,
            size,
            segment_len,
            segments,
        })
    }

    pub fn origin(&self) -> IVec3 {
        self.origin
    }

    /// Samples per axis.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// Length of every segment except possibly the last.
    pub fn segment_len(&self) -> usize {
        self.segment_len
    }

    pub fn segments(&self) -> &[Vec<f32>] {
        &self.segments
    }

    pub fn contains(&self, p: IVec3) -> bool {
        let size = self.size as i64;
        let o = self.origin;
        [(p.x, o.x), (p.y, o.y), (p.z, o.z)]
            .into_iter()
            .all(|(c, o)| (0..size).contains(&(c as i64 - o as i64)))
    }

    /// The cached density at lattice point `p`.
    pub fn sample(&self, p: IVec3) -> Result<f32> {
        if !self.contains(p) {
            return Err(ExtractError::SampleOutOfRange {
                coord: p,
                origin: self.origin,
                size: self.size,
            });
        }

        let side = self.size as usize;
        let rel = (p - self.origin).as_uvec3();
        let index = rel.x as usize + side * (rel.y as usize + side * rel.z as usize);

        // Indices past the last full segment belong to the final one.
        let segment = (index / self.segment_len).min(self.segments.len() - 1);
        let offset = index - segment * self.segment_len;
        Ok(self.segments[segment][offset])
    }

    /// Like [`Self::sample`] for a world position that lies on the lattice.
    pub fn sample_at(&self, p: Vec3A) -> Result<f32> {
        let lattice = p.round().as_ivec3();
        if lattice.as_vec3a() != p {
            return Err(ExtractError::SampleOutOfRange {
                coord: lattice,
                origin: self.origin,
                size: self.size,
            });
        }
        self.sample(lattice)
    }

    /// Copies all samples out in logical index order.
    pub fn to_vec(&self) -> Vec<f32> {
        self.segments.iter().flatten().copied().collect()
    }
}

fn delinearize(origin: IVec3, side: usize, index: usize) -> IVec3 {
    let x = index % side;
    let y = (index / side) % side;
    let z = index / (side * side);
    origin + IVec3::new(x as i32, y as i32, z as i32)
}
