//! Abstract indexed storage: validity, dispatch and statistics.
//!
//! Implementors supply the size, raw element access and the blanking
//! sentinel. Everything else (sequential loops, forked loops, the smart-fork
//! choice between them, and the reductions built on top) is provided.
//!
//! Dispatch entry points accept an optional `[from, to)` span, defaulting to
//! the whole grid. A span reaching outside the grid fails before any work is
//! done.
//!
//! ```rust
//! use ndgrid::{Grid, Index, IndexedData, Span};
//! use ndgrid::ops::CountPoints;
//!
//! let mut grid: Grid<f64, 2> = Grid::from_fn([4, 4], |_| 1.0);
//! grid.discard(&Index::new([0, 0]));
//!
//! let rows = Span::new(Index::new([0, 0]), Index::new([2, 4]));
//! let n = grid.smart_fork_valid(Some(&rows), CountPoints::default()).unwrap();
//! assert_eq!(n, 7);
//! assert_eq!(grid.count_points(), 15);
//! ```
use log::trace;
use num_traits::Float;
use rayon::prelude::*;

use crate::config::ExecutionConfig;
use crate::error::{GridError, Result};
use crate::index::{Index, Span};
use crate::num::Sample;
use crate::ops::{
    CollectValues, CountPoints, Extremum, ExtremumKind, Moments, ParallelPointOp, PointOp,
    ValueRange, WeightedSum,
};
use crate::weighted::WeightedPoint;

/// Median of `v^2` for unit-variance Gaussian noise; converts a median
/// square into a variance estimate.
pub const MEDIAN_NORMALIZED_VARIANCE: f64 = 0.454937;

pub trait IndexedData<const N: usize>: Sync {
    type Value: Sample;

    /// Grid extent along each axis.
    fn size(&self) -> Index<N>;

    /// Raw stored value of an in-bounds index, blank or not.
    fn get(&self, index: &Index<N>) -> Self::Value;

    /// Sentinel marking "no data".
    fn blanking_value(&self) -> Self::Value;

    fn execution_config(&self) -> ExecutionConfig;

    /// A fresh index of the grid's rank.
    #[inline]
    fn index_instance(&self) -> Index<N> {
        Index::zero()
    }

    #[inline]
    fn full_span(&self) -> Span<N> {
        Span::of_size(&self.size())
    }

    #[inline]
    fn contains(&self, index: &Index<N>) -> bool {
        self.full_span().contains(index)
    }

    /// Whether a value equals the blanking sentinel. NaN is never valid.
    #[inline]
    fn is_blank(&self, value: Self::Value) -> bool {
        value.is_nan() || value == self.blanking_value()
    }

    #[inline]
    fn is_valid(&self, index: &Index<N>) -> bool {
        self.contains(index) && !self.is_blank(self.get(index))
    }

    /// Value at an index if it is in bounds and not blank.
    #[inline]
    fn valid_value(&self, index: &Index<N>) -> Option<Self::Value> {
        if !self.contains(index) {
            return None;
        }
        let v = self.get(index);
        (!self.is_blank(v)).then_some(v)
    }

    /// Resolve an optional span against the grid bounds.
    ///
    /// # Errors
    /// * If the span reaches outside the grid
    fn resolve_span(&self, span: Option<&Span<N>>) -> Result<Span<N>> {
        let full = self.full_span();
        match span {
            None => Ok(full),
            Some(span) if full.encloses(span) => Ok(*span),
            Some(span) => Err(GridError::out_of_range(span, self.size())),
        }
    }

    /// Sequential traversal of every index of the span, last axis fastest.
    ///
    /// # Errors
    /// * If the span reaches outside the grid
    fn loop_over<O: PointOp<N>>(&self, span: Option<&Span<N>>, op: O) -> Result<O::Output> {
        let span = self.resolve_span(span)?;
        Ok(run_loop(&span, op, |_| true))
    }

    /// Sequential traversal of the valid indices of the span.
    ///
    /// # Errors
    /// * If the span reaches outside the grid
    fn loop_valid<O: PointOp<N>>(&self, span: Option<&Span<N>>, op: O) -> Result<O::Output> {
        let span = self.resolve_span(span)?;
        Ok(run_loop(&span, op, |i| self.is_valid(i)))
    }

    /// Parallel traversal, partitioning the leading axis.
    ///
    /// # Errors
    /// * If the span reaches outside the grid
    fn fork<O: ParallelPointOp<N>>(&self, span: Option<&Span<N>>, op: O) -> Result<O::Output> {
        let span = self.resolve_span(span)?;
        let parallelism = self.execution_config().parallelism;
        Ok(run_fork(&span, op, parallelism, |_| true))
    }

    /// Parallel traversal of the valid indices.
    ///
    /// # Errors
    /// * If the span reaches outside the grid
    fn fork_valid<O: ParallelPointOp<N>>(
        &self,
        span: Option<&Span<N>>,
        op: O,
    ) -> Result<O::Output> {
        let span = self.resolve_span(span)?;
        let parallelism = self.execution_config().parallelism;
        Ok(run_fork(&span, op, parallelism, |i| self.is_valid(i)))
    }

    /// Loop or fork, whichever the estimated workload calls for.
    ///
    /// # Errors
    /// * If the span reaches outside the grid
    fn smart_fork<O: ParallelPointOp<N>>(
        &self,
        span: Option<&Span<N>>,
        op: O,
    ) -> Result<O::Output> {
        let span = self.resolve_span(span)?;
        Ok(dispatch(self, &span, op, false))
    }

    /// Loop or fork over the valid indices.
    ///
    /// # Errors
    /// * If the span reaches outside the grid
    fn smart_fork_valid<O: ParallelPointOp<N>>(
        &self,
        span: Option<&Span<N>>,
        op: O,
    ) -> Result<O::Output> {
        let span = self.resolve_span(span)?;
        Ok(dispatch(self, &span, op, true))
    }

    /// Number of valid points.
    fn count_points(&self) -> usize {
        dispatch(self, &self.full_span(), CountPoints::default(), true)
    }

    fn min(&self) -> Option<f64> {
        self.range().map(|(lo, _)| lo)
    }

    fn max(&self) -> Option<f64> {
        self.range().map(|(_, hi)| hi)
    }

    /// Smallest and largest valid value.
    fn range(&self) -> Option<(f64, f64)> {
        dispatch(self, &self.full_span(), ValueRange::new(self), true)
    }

    /// Arithmetic mean, weighted by the number of points.
    fn mean(&self) -> WeightedPoint {
        let (n, sum, _) = dispatch(self, &self.full_span(), Moments::new(self), true);
        if n == 0 {
            return WeightedPoint::no_data();
        }
        WeightedPoint::new(sum / n as f64, n as f64)
    }

    /// Mean weighted by a companion inverse-variance grid.
    ///
    /// # Errors
    /// * If the weights are not the same size as the data
    fn mean_weighted<W>(&self, weights: &W) -> Result<WeightedPoint>
    where
        W: IndexedData<N>,
    {
        if weights.size() != self.size() {
            return Err(GridError::shape_mismatch(self.size(), weights.size()));
        }
        let op = WeightedSum::new(self, weights);
        let (sum, sum_weights) = dispatch(self, &self.full_span(), op, true);
        if sum_weights <= 0.0 {
            return Ok(WeightedPoint::no_data());
        }
        Ok(WeightedPoint::new(sum / sum_weights, sum_weights))
    }

    fn median(&self) -> WeightedPoint {
        let mut values = dispatch(self, &self.full_span(), CollectValues::new(self), true);
        match median(&mut values) {
            Some(m) => WeightedPoint::new(m, values.len() as f64),
            None => WeightedPoint::no_data(),
        }
    }

    /// Mean square about zero, NaN without data.
    fn variance(&self) -> f64 {
        let (n, _, sum_squares) = dispatch(self, &self.full_span(), Moments::new(self), true);
        if n == 0 {
            return f64::NAN;
        }
        sum_squares / n as f64
    }

    fn rms(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Mean of the valid values after dropping `exclude_fraction` of the
    /// points from each tail. Falls back on the median when nothing is left.
    fn robust_mean(&self, exclude_fraction: f64) -> WeightedPoint {
        let mut values = dispatch(self, &self.full_span(), CollectValues::new(self), true);
        let n = values.len();
        if n == 0 {
            return WeightedPoint::no_data();
        }
        values.sort_unstable_by(f64::total_cmp);

        let drop = ((n as f64) * exclude_fraction.clamp(0.0, 0.5)).floor() as usize;
        let kept = &values[drop..n - drop];
        if kept.is_empty() {
            let m = median(&mut values).unwrap_or(f64::NAN);
            return WeightedPoint::new(m, n as f64);
        }
        let mean = kept.iter().sum::<f64>() / kept.len() as f64;
        WeightedPoint::new(mean, kept.len() as f64)
    }

    /// Variance estimate from the median square, insensitive to outliers.
    fn robust_variance(&self) -> f64 {
        let op = CollectValues::mapped(self, |v| v * v);
        let mut squares = dispatch(self, &self.full_span(), op, true);
        match median(&mut squares) {
            Some(m) => m / MEDIAN_NORMALIZED_VARIANCE,
            None => f64::NAN,
        }
    }

    fn robust_rms(&self) -> f64 {
        self.robust_variance().sqrt()
    }

    /// Index of the smallest valid value. Ties resolve to the lowest index.
    fn index_of_min(&self) -> Option<Index<N>> {
        let op = Extremum::new(self, ExtremumKind::Min);
        dispatch(self, &self.full_span(), op, true)
    }

    /// Index of the largest valid value. Ties resolve to the lowest index.
    fn index_of_max(&self) -> Option<Index<N>> {
        let op = Extremum::new(self, ExtremumKind::Max);
        dispatch(self, &self.full_span(), op, true)
    }

    /// Index of the largest absolute valid value. Ties resolve to the lowest index.
    fn index_of_max_dev(&self) -> Option<Index<N>> {
        let op = Extremum::new(self, ExtremumKind::MaxDeviation);
        dispatch(self, &self.full_span(), op, true)
    }
}

/// Median of a scratch array, reordering it. `None` when empty.
pub fn median(values: &mut [f64]) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    let (lower, upper, _) = values.select_nth_unstable_by(n / 2, f64::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        return Some(upper);
    }
    let lower = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(0.5 * (lower + upper))
}

/// Smart-fork dispatch over an already validated span.
pub(crate) fn dispatch<D, O, const N: usize>(
    data: &D,
    span: &Span<N>,
    op: O,
    valid_only: bool,
) -> O::Output
where
    D: IndexedData<N> + ?Sized,
    O: ParallelPointOp<N>,
{
    let config = data.execution_config();
    if !config.should_fork_points(span.volume(), op.number_of_operations()) {
        return if valid_only {
            run_loop(span, op, |i| data.is_valid(i))
        } else {
            run_loop(span, op, |_| true)
        };
    }

    trace!(
        "forking {} points over {} partitions",
        span.volume(),
        config.parallelism
    );
    if valid_only {
        run_fork(span, op, config.parallelism, |i| data.is_valid(i))
    } else {
        run_fork(span, op, config.parallelism, |_| true)
    }
}

fn run_loop<O, F, const N: usize>(span: &Span<N>, mut op: O, filter: F) -> O::Output
where
    O: PointOp<N>,
    F: Fn(&Index<N>) -> bool,
{
    op.init();
    for index in span.iter() {
        if filter(&index) {
            op.process(&index);
        }
    }
    op.result()
}

fn run_fork<O, F, const N: usize>(
    span: &Span<N>,
    op: O,
    parallelism: usize,
    filter: F,
) -> O::Output
where
    O: ParallelPointOp<N>,
    F: Fn(&Index<N>) -> bool + Sync,
{
    // Workers start from clones of the untouched operator; the join happens
    // inside `reduce_with`, merging on whichever thread finishes last
    let merged = span
        .split_leading(parallelism)
        .into_par_iter()
        .map(|part| {
            let mut worker = op.clone();
            worker.init();
            for index in part.iter() {
                if filter(&index) {
                    worker.process(&index);
                }
            }
            worker
        })
        .reduce_with(|mut a, b| {
            a.merge_result(b);
            a
        });

    match merged {
        Some(worker) => worker.result(),
        // Empty span
        None => run_loop(span, op, filter),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Grid;
    use crate::testing::*;

    /// Random 3D grid with a sprinkling of blanks.
    fn random_grid(config: ExecutionConfig) -> Grid<f64, 3> {
        let mut rng = rng_fixed_seed();
        let values = randn::<f64>(&mut rng, 7 * 5 * 3);
        let mut grid = Grid::from_vec([7, 5, 3], values).unwrap();
        grid.set_execution_config(config);
        sprinkle_blanks(&mut grid, &[0, 17, 40, 41, 99]);
        grid
    }

    #[test]
    fn test_loop_equals_fork_for_pool_sizes() {
        let reference = random_grid(ExecutionConfig::sequential());
        let expected_count = reference.loop_valid(None, CountPoints::default()).unwrap();
        let expected_moments = reference.loop_valid(None, Moments::new(&reference)).unwrap();
        let expected_max = reference
            .loop_valid(None, Extremum::new(&reference, ExtremumKind::Max))
            .unwrap();
        assert_eq!(expected_count, 7 * 5 * 3 - 5);

        for parallelism in 1..=9 {
            let config = ExecutionConfig::default()
                .with_parallelism(parallelism)
                .with_min_fork_volume(0);
            let grid = random_grid(config);

            let count = grid.fork_valid(None, CountPoints::default()).unwrap();
            assert_eq!(count, expected_count);

            let (n, sum, sum_squares) = grid.fork_valid(None, Moments::new(&grid)).unwrap();
            assert_eq!(n, expected_moments.0);
            assert!((sum - expected_moments.1).abs() < 1e-12);
            assert!((sum_squares - expected_moments.2).abs() < 1e-12);

            let max = grid
                .fork_valid(None, Extremum::new(&grid, ExtremumKind::Max))
                .unwrap();
            assert_eq!(max, expected_max);

            // All indices, including blanks
            let all = grid.smart_fork(None, CountPoints::default()).unwrap();
            assert_eq!(all, 7 * 5 * 3);
        }
    }

    #[test]
    fn test_sub_span_and_out_of_range() {
        let grid: Grid<f64, 2> = Grid::from_fn([4, 6], |_| 1.0);
        let span = Span::new(Index::new([1, 2]), Index::new([3, 6]));
        assert_eq!(grid.fork(Some(&span), CountPoints::default()).unwrap(), 8);
        assert_eq!(grid.loop_over(Some(&span), CountPoints::default()).unwrap(), 8);

        let outside = Span::new(Index::new([1, 2]), Index::new([5, 6]));
        let err = grid.loop_over(Some(&outside), CountPoints::default());
        assert!(matches!(err, Err(GridError::OutOfRange { .. })));
        let err = grid.smart_fork_valid(Some(&outside), CountPoints::default());
        assert!(matches!(err, Err(GridError::OutOfRange { .. })));
    }

    #[test]
    fn test_nan_is_never_valid() {
        let mut grid: Grid<f32, 1> = Grid::from_fn([4], |_| 1.0).with_blanking_value(-1.0);
        grid.set(&Index::new([1]), f32::NAN);
        grid.set(&Index::new([2]), -1.0);

        assert!(grid.is_blank(f32::NAN));
        assert!(!grid.is_blank(0.0));
        assert_eq!(grid.valid_value(&Index::new([1])), None);
        assert_eq!(grid.count_points(), 2);
    }

    #[test]
    fn test_constant_grid_scenario() {
        let mut grid: Grid<f64, 2> = Grid::from_fn([4, 4], |_| 1.0);
        assert!(grid.blanking_value().is_nan());
        assert_eq!(grid.count_points(), 16);
        assert_eq!(grid.mean(), WeightedPoint::new(1.0, 16.0));

        grid.scale(2.0);
        assert!(grid.data().iter().all(|&v| v == 2.0));

        let i = grid.index_of_max().unwrap();
        assert_eq!(grid.get(&i), 2.0);
    }

    #[test]
    fn test_statistics() {
        let mut grid: Grid<f64, 1> =
            Grid::from_vec([6], vec![3.0, -1.0, 4.0, 1.0, -5.0, 9.0]).unwrap();
        grid.discard(&Index::new([5]));

        assert_eq!(grid.count_points(), 5);
        assert_eq!(grid.range(), Some((-5.0, 4.0)));
        assert_eq!(grid.min(), Some(-5.0));
        assert_eq!(grid.max(), Some(4.0));
        assert!((grid.mean().value - 0.4).abs() < 1e-12);
        assert_eq!(grid.median(), WeightedPoint::new(1.0, 5.0));
        assert!((grid.variance() - 52.0 / 5.0).abs() < 1e-12);
        assert!((grid.rms() - (52.0_f64 / 5.0).sqrt()).abs() < 1e-12);

        assert_eq!(grid.index_of_min(), Some(Index::new([4])));
        assert_eq!(grid.index_of_max(), Some(Index::new([2])));
        assert_eq!(grid.index_of_max_dev(), Some(Index::new([4])));

        // Median square of {9, 1, 16, 1, 25} is 9
        assert!((grid.robust_variance() - 9.0 / MEDIAN_NORMALIZED_VARIANCE).abs() < 1e-12);

        // Dropping one point per tail leaves {-1, 1, 3}
        let trimmed = grid.robust_mean(0.2);
        assert!((trimmed.value - 1.0).abs() < 1e-12);
        assert_eq!(trimmed.weight, 3.0);
    }

    #[test]
    fn test_empty_selection_is_a_value() {
        let grid: Grid<f64, 2> = Grid::blank([3, 3]);
        assert_eq!(grid.count_points(), 0);
        assert!(grid.mean().is_na());
        assert!(grid.median().is_na());
        assert!(grid.robust_mean(0.1).is_na());
        assert!(grid.variance().is_nan());
        assert_eq!(grid.range(), None);
        assert_eq!(grid.index_of_max(), None);
    }

    #[test]
    fn test_mean_weighted() {
        let grid: Grid<f64, 1> = Grid::from_vec([3], vec![1.0, 2.0, 4.0]).unwrap();
        let weights: Grid<f64, 1> = Grid::from_vec([3], vec![1.0, 0.0, 3.0]).unwrap();
        let mean = grid.mean_weighted(&weights).unwrap();
        assert!((mean.value - 3.25).abs() < 1e-12);
        assert_eq!(mean.weight, 4.0);

        let wrong: Grid<f64, 1> = Grid::new([4]);
        assert!(matches!(
            grid.mean_weighted(&wrong),
            Err(GridError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_median_even() {
        let mut values = vec![4.0, 1.0, 3.0, 2.0];
        assert_eq!(median(&mut values), Some(2.5));
        assert_eq!(median(&mut []), None);
    }
}
