//! Dispatch configuration.
//!
//! The smart-fork rule compares `span volume * (2 + cost per point)` against
//! `min_fork_volume`; below it, or with fewer than two workers, work runs
//! sequentially on the calling thread.

/// Default lower bound on the estimated workload before forking.
/// Tunable; there is no derivation behind the number.
pub const DEFAULT_MIN_FORK_VOLUME: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Number of leading-axis partitions used by `fork`.
    pub parallelism: usize,

    /// Estimated workload below which `smart_fork` loops instead.
    pub min_fork_volume: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallelism: rayon::current_num_threads(),
            min_fork_volume: DEFAULT_MIN_FORK_VOLUME,
        }
    }
}

impl ExecutionConfig {
    /// Sequential configuration, never forks.
    pub fn sequential() -> Self {
        Self {
            parallelism: 1,
            min_fork_volume: DEFAULT_MIN_FORK_VOLUME,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn with_min_fork_volume(mut self, min_fork_volume: usize) -> Self {
        self.min_fork_volume = min_fork_volume;
        self
    }

    /// Whether a workload of the given estimated volume should be forked.
    #[inline]
    pub fn should_fork(&self, volume: usize) -> bool {
        self.parallelism >= 2 && volume >= self.min_fork_volume
    }

    /// [`ExecutionConfig::should_fork`] for `points` visits costing
    /// `operations_per_point` each, estimated as `points * (2 + operations)`.
    #[inline]
    pub fn should_fork_points(&self, points: usize, operations_per_point: usize) -> bool {
        self.should_fork(points.saturating_mul(operations_per_point.saturating_add(2)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_should_fork() {
        let config = ExecutionConfig::default()
            .with_parallelism(4)
            .with_min_fork_volume(100);
        assert!(!config.should_fork(99));
        assert!(config.should_fork(100));

        assert!(!config.should_fork_points(33, 1));
        assert!(config.should_fork_points(25, 2));
        assert!(config.should_fork_points(usize::MAX, usize::MAX));

        let sequential = ExecutionConfig::sequential().with_min_fork_volume(0);
        assert!(!sequential.should_fork(usize::MAX));
    }

    #[test]
    fn test_parallelism_floor() {
        let config = ExecutionConfig::default().with_parallelism(0);
        assert_eq!(config.parallelism, 1);
    }
}
