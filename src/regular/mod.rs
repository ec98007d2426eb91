//! Regular-grid operations: interpolation, kernel smoothing, resampling,
//! patch addition and iterative point-source removal.
//!
//! Every interpolator treats missing neighbours the same way: taps that fall
//! outside the grid or on blank cells are left out, and the result is the
//! weighted average of the remaining valid taps, renormalized by their total
//! weight. A position with no valid tap has no value, and neither does a
//! non-finite one.
//!
//! ```rust
//! use ndgrid::{Grid, Interpolation, RegularData, VectorIndex};
//!
//! let grid: Grid<f64, 1> = Grid::from_vec([5], vec![0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
//! let v = grid.value_at_position(&VectorIndex::new([2.5])).unwrap();
//! assert!(v > 2.0 && v < 3.0);
//!
//! let nearest = grid.clone().with_interpolation(Interpolation::Nearest);
//! assert_eq!(nearest.value_at_position(&VectorIndex::new([2.4])), Some(2.0));
//! ```
//!
//! Interpolation scratch state ([`SplineSet`]) is passed in explicitly; each
//! thread of a parallel operation owns its own.
use crate::beam::Beam;
use crate::error::Result;
use crate::grid::Grid;
use crate::index::{Index, VectorIndex};
use crate::indexed::IndexedData;
use crate::spline::SplineSet;
use crate::weighted::WeightedPoint;

mod clean;
mod interpolate;
mod resample;
mod smooth;

pub use smooth::Smoothed;

/// Point interpolation method.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Interpolation {
    /// Closest cell
    Nearest,
    /// 2^N corner weighted average
    Linear,
    /// Per-axis parabola through the closest cell and its two neighbours
    Quadratic,
    /// Separable 4^N cubic convolution
    #[default]
    Spline,
}

pub trait RegularData<const N: usize>: IndexedData<N> {
    fn interpolation(&self) -> Interpolation;

    /// Whether a position lies within `[0, size - 1]` on every axis.
    fn contains_position(&self, position: &VectorIndex<N>) -> bool {
        let size = self.size();
        (0..N).all(|i| {
            let x = position.value(i);
            x >= 0.0 && x <= (size.value(i) - 1) as f64
        })
    }

    /// Interpolated value with this grid's interpolation method.
    #[inline]
    fn value_at(
        &self,
        position: &VectorIndex<N>,
        splines: &mut SplineSet<N>,
    ) -> Option<Self::Value> {
        match self.interpolation() {
            Interpolation::Nearest => self.nearest_at(position),
            Interpolation::Linear => self.linear_at(position),
            Interpolation::Quadratic => self.quadratic_at(position),
            Interpolation::Spline => self.spline_at(position, splines),
        }
    }

    /// [`RegularData::value_at`] with throwaway spline state.
    fn value_at_position(&self, position: &VectorIndex<N>) -> Option<Self::Value> {
        let mut splines = SplineSet::new();
        self.value_at(position, &mut splines)
    }

    #[inline]
    fn nearest_at(&self, position: &VectorIndex<N>) -> Option<Self::Value> {
        interpolate::nearest(self, position)
    }

    fn linear_at(&self, position: &VectorIndex<N>) -> Option<Self::Value> {
        interpolate::linear(self, position)
    }

    fn quadratic_at(&self, position: &VectorIndex<N>) -> Option<Self::Value> {
        interpolate::quadratic(self, position)
    }

    fn spline_at(
        &self,
        position: &VectorIndex<N>,
        splines: &mut SplineSet<N>,
    ) -> Option<Self::Value> {
        interpolate::spline(self, position, splines)
    }

    /// Beam-weighted average around a cell.
    fn smoothed_at(
        &self,
        index: &Index<N>,
        beam: &Beam<Self::Value, N>,
        weights: Option<&Grid<Self::Value, N>>,
        splines: &mut SplineSet<N>,
    ) -> WeightedPoint {
        smooth::smoothed_at(self, &index.to_vector(), beam, weights, splines)
    }

    /// Beam-weighted average around a fractional position.
    ///
    /// Each valid sample contributes with `wB = weight(point) * beam(offset)`
    /// and the result is `Σ wB v / Σ |wB|`, with weight `Σ |wB|`.
    fn smoothed_at_position(
        &self,
        position: &VectorIndex<N>,
        beam: &Beam<Self::Value, N>,
        weights: Option<&Grid<Self::Value, N>>,
        splines: &mut SplineSet<N>,
    ) -> WeightedPoint {
        smooth::smoothed_at(self, position, beam, weights, splines)
    }

    /// Direct convolution with a beam at every valid cell.
    ///
    /// # Errors
    /// * If `weights` is not the same size as the data
    fn smoothed(
        &self,
        beam: &Beam<Self::Value, N>,
        weights: Option<&Grid<Self::Value, N>>,
    ) -> Result<Smoothed<Self::Value, N>> {
        smooth::smoothed(self, beam, weights)
    }

    /// Approximate convolution: exact on a coarse sub-grid of stride `step`,
    /// spline-interpolated back to full resolution. A unit step gives
    /// exactly [`RegularData::smoothed`].
    ///
    /// # Errors
    /// * If `weights` is not the same size as the data
    /// * If any step is less than one
    fn fast_smoothed(
        &self,
        beam: &Beam<Self::Value, N>,
        step: &Index<N>,
        weights: Option<&Grid<Self::Value, N>>,
    ) -> Result<Smoothed<Self::Value, N>> {
        smooth::fast_smoothed(self, beam, step, weights)
    }
}

/// Unsigned extents of a size index.
#[inline]
pub(crate) fn extents<const N: usize>(size: &Index<N>) -> [usize; N] {
    let mut out = [0_usize; N];
    for i in 0..N {
        out[i] = size.value(i).max(0) as usize;
    }
    out
}
