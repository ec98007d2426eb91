//! Point operators and the built-in reductions.
//!
//! A [`PointOp`] visits one index at a time and accumulates privately.
//! A [`ParallelPointOp`] can additionally be cloned into workers, each of
//! which visits a disjoint leading-axis partition, and the workers'
//! accumulators are merged afterward. `merge_result` is called in an
//! unspecified order, so it must be commutative and associative.
use crate::index::Index;
use crate::indexed::IndexedData;
use crate::num::to_f64;

/// Visitor over grid indices.
pub trait PointOp<const N: usize> {
    type Output;

    /// Per-context setup, called once before the first `process` of each
    /// sequential loop or fork worker.
    fn init(&mut self) {}

    fn process(&mut self, index: &Index<N>);

    fn result(self) -> Self::Output;

    /// Estimated cost per visited point, used by the smart-fork heuristic.
    fn number_of_operations(&self) -> usize {
        1
    }
}

/// A [`PointOp`] whose partial results can be merged.
///
/// Workers are clones of the operator as it was submitted, so the submitted
/// operator should be in its initial (empty) state.
pub trait ParallelPointOp<const N: usize>: PointOp<N> + Clone + Send + Sync {
    fn merge_result(&mut self, other: Self);
}

/// Number of visited points.
#[derive(Clone, Debug, Default)]
pub struct CountPoints {
    count: usize,
}

impl<const N: usize> PointOp<N> for CountPoints {
    type Output = usize;

    #[inline]
    fn process(&mut self, _index: &Index<N>) {
        self.count += 1;
    }

    fn result(self) -> usize {
        self.count
    }
}

impl<const N: usize> ParallelPointOp<N> for CountPoints {
    fn merge_result(&mut self, other: Self) {
        self.count += other.count;
    }
}

/// Smallest and largest visited value.
pub struct ValueRange<'a, D: ?Sized> {
    data: &'a D,
    range: Option<(f64, f64)>,
}

impl<'a, D: ?Sized> ValueRange<'a, D> {
    pub fn new(data: &'a D) -> Self {
        Self { data, range: None }
    }

    fn include(&mut self, lo: f64, hi: f64) {
        self.range = Some(match self.range {
            Some((min, max)) => (min.min(lo), max.max(hi)),
            None => (lo, hi),
        });
    }
}

impl<D: ?Sized> Clone for ValueRange<'_, D> {
    fn clone(&self) -> Self {
        Self {
            data: self.data,
            range: self.range,
        }
    }
}

impl<D, const N: usize> PointOp<N> for ValueRange<'_, D>
where
    D: IndexedData<N> + ?Sized,
{
    type Output = Option<(f64, f64)>;

    #[inline]
    fn process(&mut self, index: &Index<N>) {
        let v = to_f64(self.data.get(index));
        self.include(v, v);
    }

    fn result(self) -> Option<(f64, f64)> {
        self.range
    }
}

impl<D, const N: usize> ParallelPointOp<N> for ValueRange<'_, D>
where
    D: IndexedData<N> + ?Sized,
{
    fn merge_result(&mut self, other: Self) {
        if let Some((lo, hi)) = other.range {
            self.include(lo, hi);
        }
    }
}

/// Which extremum an [`Extremum`] searches for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtremumKind {
    Min,
    Max,
    /// Largest absolute value
    MaxDeviation,
}

/// Location of an extreme value.
///
/// Ties resolve to the lowest (C-order) index, both within a worker and
/// when merging, so the answer does not depend on the partitioning.
pub struct Extremum<'a, D: ?Sized, const N: usize> {
    data: &'a D,
    kind: ExtremumKind,
    best: Option<(f64, Index<N>)>,
}

impl<'a, D: ?Sized, const N: usize> Extremum<'a, D, N> {
    pub fn new(data: &'a D, kind: ExtremumKind) -> Self {
        Self {
            data,
            kind,
            best: None,
        }
    }

    /// Score such that larger is better.
    #[inline]
    fn score(&self, v: f64) -> f64 {
        match self.kind {
            ExtremumKind::Min => -v,
            ExtremumKind::Max => v,
            ExtremumKind::MaxDeviation => v.abs(),
        }
    }

    fn offer(&mut self, score: f64, index: Index<N>) {
        let better = match self.best {
            None => true,
            Some((s, i)) => score > s || (score == s && index < i),
        };
        if better {
            self.best = Some((score, index));
        }
    }
}

impl<D: ?Sized, const N: usize> Clone for Extremum<'_, D, N> {
    fn clone(&self) -> Self {
        Self {
            data: self.data,
            kind: self.kind,
            best: self.best,
        }
    }
}

impl<D, const N: usize> PointOp<N> for Extremum<'_, D, N>
where
    D: IndexedData<N> + ?Sized,
{
    type Output = Option<Index<N>>;

    #[inline]
    fn process(&mut self, index: &Index<N>) {
        let score = self.score(to_f64(self.data.get(index)));
        self.offer(score, *index);
    }

    fn result(self) -> Option<Index<N>> {
        self.best.map(|(_, index)| index)
    }
}

impl<D, const N: usize> ParallelPointOp<N> for Extremum<'_, D, N>
where
    D: IndexedData<N> + ?Sized,
{
    fn merge_result(&mut self, other: Self) {
        if let Some((score, index)) = other.best {
            self.offer(score, index);
        }
    }
}

/// Count, sum and sum of squares of visited values.
pub struct Moments<'a, D: ?Sized> {
    data: &'a D,
    pub n: usize,
    pub sum: f64,
    pub sum_squares: f64,
}

impl<'a, D: ?Sized> Moments<'a, D> {
    pub fn new(data: &'a D) -> Self {
        Self {
            data,
            n: 0,
            sum: 0.0,
            sum_squares: 0.0,
        }
    }
}

impl<D: ?Sized> Clone for Moments<'_, D> {
    fn clone(&self) -> Self {
        Self {
            data: self.data,
            n: self.n,
            sum: self.sum,
            sum_squares: self.sum_squares,
        }
    }
}

impl<D, const N: usize> PointOp<N> for Moments<'_, D>
where
    D: IndexedData<N> + ?Sized,
{
    type Output = (usize, f64, f64);

    #[inline]
    fn process(&mut self, index: &Index<N>) {
        let v = to_f64(self.data.get(index));
        self.n += 1;
        self.sum += v;
        self.sum_squares += v * v;
    }

    fn result(self) -> (usize, f64, f64) {
        (self.n, self.sum, self.sum_squares)
    }
}

impl<D, const N: usize> ParallelPointOp<N> for Moments<'_, D>
where
    D: IndexedData<N> + ?Sized,
{
    fn merge_result(&mut self, other: Self) {
        self.n += other.n;
        self.sum += other.sum;
        self.sum_squares += other.sum_squares;
    }
}

/// Weighted sum `(Σ w v, Σ w)` using weights from a companion dataset of
/// identical size. Points with non-positive or invalid weights are skipped.
pub struct WeightedSum<'a, D: ?Sized, W: ?Sized> {
    data: &'a D,
    weights: &'a W,
    sum: f64,
    sum_weights: f64,
}

impl<'a, D: ?Sized, W: ?Sized> WeightedSum<'a, D, W> {
    pub fn new(data: &'a D, weights: &'a W) -> Self {
        Self {
            data,
            weights,
            sum: 0.0,
            sum_weights: 0.0,
        }
    }
}

impl<D: ?Sized, W: ?Sized> Clone for WeightedSum<'_, D, W> {
    fn clone(&self) -> Self {
        Self {
            data: self.data,
            weights: self.weights,
            sum: self.sum,
            sum_weights: self.sum_weights,
        }
    }
}

impl<D, W, const N: usize> PointOp<N> for WeightedSum<'_, D, W>
where
    D: IndexedData<N> + ?Sized,
    W: IndexedData<N> + ?Sized,
{
    type Output = (f64, f64);

    #[inline]
    fn process(&mut self, index: &Index<N>) {
        if !self.weights.is_valid(index) {
            return;
        }
        let w = to_f64(self.weights.get(index));
        if w > 0.0 {
            self.sum += w * to_f64(self.data.get(index));
            self.sum_weights += w;
        }
    }

    fn result(self) -> (f64, f64) {
        (self.sum, self.sum_weights)
    }

    fn number_of_operations(&self) -> usize {
        3
    }
}

impl<D, W, const N: usize> ParallelPointOp<N> for WeightedSum<'_, D, W>
where
    D: IndexedData<N> + ?Sized,
    W: IndexedData<N> + ?Sized,
{
    fn merge_result(&mut self, other: Self) {
        self.sum += other.sum;
        self.sum_weights += other.sum_weights;
    }
}

/// Scratch copy of visited values, optionally transformed, for the robust
/// estimators. The merged result is a multiset; its order is unspecified.
pub struct CollectValues<'a, D: ?Sized> {
    data: &'a D,
    map: fn(f64) -> f64,
    values: Vec<f64>,
}

impl<'a, D: ?Sized> CollectValues<'a, D> {
    pub fn new(data: &'a D) -> Self {
        Self::mapped(data, core::convert::identity)
    }

    pub fn mapped(data: &'a D, map: fn(f64) -> f64) -> Self {
        Self {
            data,
            map,
            values: Vec::new(),
        }
    }
}

impl<D: ?Sized> Clone for CollectValues<'_, D> {
    fn clone(&self) -> Self {
        Self {
            data: self.data,
            map: self.map,
            values: self.values.clone(),
        }
    }
}

impl<D, const N: usize> PointOp<N> for CollectValues<'_, D>
where
    D: IndexedData<N> + ?Sized,
{
    type Output = Vec<f64>;

    #[inline]
    fn process(&mut self, index: &Index<N>) {
        self.values.push((self.map)(to_f64(self.data.get(index))));
    }

    fn result(self) -> Vec<f64> {
        self.values
    }
}

impl<D, const N: usize> ParallelPointOp<N> for CollectValues<'_, D>
where
    D: IndexedData<N> + ?Sized,
{
    fn merge_result(&mut self, mut other: Self) {
        self.values.append(&mut other.values);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Grid, Span};

    #[test]
    fn test_extremum_ties_resolve_to_lowest_index() {
        let grid: Grid<f64, 2> = Grid::from_fn([4, 4], |_| 2.0);
        let span = Span::of_size(&grid.size());

        let mut a = Extremum::<_, 2>::new(&grid, ExtremumKind::Max);
        let mut b = a.clone();
        span.with_leading(2, 4).iter().for_each(|i| a.process(&i));
        span.with_leading(0, 2).iter().for_each(|i| b.process(&i));
        a.merge_result(b);

        assert_eq!(a.result(), Some(Index::new([0, 0])));
    }

    #[test]
    fn test_moments_merge() {
        let grid: Grid<f64, 1> = Grid::from_vec([4], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let mut a = Moments::new(&grid);
        let mut b = a.clone();
        PointOp::<1>::process(&mut a, &Index::new([0]));
        PointOp::<1>::process(&mut a, &Index::new([1]));
        PointOp::<1>::process(&mut b, &Index::new([3]));
        ParallelPointOp::<1>::merge_result(&mut a, b);
        assert_eq!(PointOp::<1>::result(a), (3, 7.0, 21.0));
    }
}
