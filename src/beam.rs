//! Convolution kernels: a grid of weights plus a fractional reference
//! position marking the kernel center.
use crate::grid::Grid;
use crate::index::{Index, VectorIndex};
use crate::indexed::IndexedData;
use crate::num::{Sample, from_f64, to_f64};

/// Smoothing kernel.
///
/// The cell at `reference` lines up with the point being smoothed; cell `b`
/// of the beam weighs the data point at `position + b - reference`.
#[derive(Clone, Debug)]
pub struct Beam<T, const N: usize> {
    values: Grid<T, N>,
    reference: VectorIndex<N>,
}

impl<T: Sample, const N: usize> Beam<T, N> {
    pub fn new(values: Grid<T, N>, reference: VectorIndex<N>) -> Self {
        Self { values, reference }
    }

    /// Beam referenced at its geometric center, `(size - 1) / 2`.
    pub fn centered(values: Grid<T, N>) -> Self {
        let size = values.size();
        let mut reference = VectorIndex::zero();
        for i in 0..N {
            reference.set_value(i, 0.5 * (size.value(i) - 1) as f64);
        }
        Self { values, reference }
    }

    /// Unit-peak Gaussian truncated at `extent` standard deviations.
    pub fn gaussian(sigmas: [f64; N], extent: f64) -> Self {
        let mut half = [0_usize; N];
        let mut size = [0_usize; N];
        for i in 0..N {
            half[i] = (extent * sigmas[i]).ceil().max(0.0) as usize;
            size[i] = 2 * half[i] + 1;
        }

        let values = Grid::from_fn(size, |index| {
            let mut r2 = 0.0;
            for i in 0..N {
                let u = (index.value(i) - half[i] as isize) as f64 / sigmas[i];
                r2 += u * u;
            }
            from_f64((-0.5 * r2).exp())
        });
        Self::centered(values)
    }

    /// The 2N nearest neighbours of the center, each with weight one. The
    /// center itself has weight zero.
    pub fn cross() -> Self {
        let values = Grid::from_fn([3; N], |index| {
            let distance: isize = index.values().iter().map(|v| (v - 1).abs()).sum();
            if distance == 1 { T::one() } else { T::zero() }
        });
        Self::new(values, VectorIndex::new([1.0; N]))
    }

    /// Copy scaled so that the valid weights sum to one.
    pub fn normalized(&self) -> Self {
        let mut out = self.clone();
        let sum: f64 = self.valid_weights().sum();
        if sum != 0.0 {
            out.values.scale(from_f64(1.0 / sum));
        }
        out
    }

    /// Sum of the absolute valid weights.
    pub fn abs_sum(&self) -> f64 {
        self.valid_weights().map(f64::abs).sum()
    }

    fn valid_weights(&self) -> impl Iterator<Item = f64> + '_ {
        self.values
            .full_span()
            .iter()
            .filter_map(|i| self.values.valid_value(&i))
            .map(to_f64)
    }

    /// Number of beam cells, the per-point cost of a convolution.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.values.size().volume()
    }

    #[inline]
    pub fn values(&self) -> &Grid<T, N> {
        &self.values
    }

    #[inline]
    pub fn reference(&self) -> &VectorIndex<N> {
        &self.reference
    }

    /// Integer offset of the reference cell, when it lies on one.
    pub fn reference_index(&self) -> Option<Index<N>> {
        self.reference
            .is_integral()
            .then(|| self.reference.round())
    }
}
