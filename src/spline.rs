//! Cubic convolution spline coefficients.
//!
//! [`CubicSpline`] is the one-dimensional primitive: the 4-tap cubic
//! convolution kernel with `a = -0.5` (Catmull-Rom), centered on a fractional
//! position. [`SplineSet`] holds one per axis; the weight of an N-dimensional
//! tap is the product of the per-axis coefficients, so the interpolant is
//! separable.
//!
//! A `SplineSet` is mutable scratch state. Every execution context (each
//! worker of a parallel dispatch, or the caller of a sequential one) owns its
//! own instance and passes it explicitly.
//!
//! ```rust
//! use ndgrid::spline::CubicSpline;
//!
//! let mut spline = CubicSpline::new();
//! spline.center_on(2.5);
//! assert_eq!((spline.min_index(), spline.max_index()), (1, 5));
//!
//! // Coefficients always sum to one
//! let total: f64 = (1..5).map(|i| spline.coefficient(i)).sum();
//! assert!((total - 1.0).abs() < 1e-12);
//! ```
use crunchy::unroll;

use crate::index::{Index, Span, VectorIndex};

/// Number of taps of the cubic convolution kernel.
pub const TAPS: usize = 4;

/// Cubic convolution kernel with `a = -0.5`.
#[inline]
pub fn kernel(x: f64) -> f64 {
    let ax = x.abs();
    if ax <= 1.0 {
        (1.5 * ax - 2.5) * ax * ax + 1.0
    } else if ax <= 2.0 {
        ((-0.5 * ax + 2.5) * ax - 4.0) * ax + 2.0
    } else {
        0.0
    }
}

/// Four kernel coefficients for one axis, cached per center.
#[derive(Clone, Copy, Debug)]
pub struct CubicSpline {
    /// Center of the last evaluation, NaN before the first
    center: f64,

    /// First tap index
    i0: isize,

    coefficients: [f64; TAPS],
}

impl Default for CubicSpline {
    fn default() -> Self {
        Self::new()
    }
}

impl CubicSpline {
    pub const fn new() -> Self {
        Self {
            center: f64::NAN,
            i0: 0,
            coefficients: [0.0; TAPS],
        }
    }

    /// Center the kernel on a fractional position.
    /// Recentering on the same position reuses the cached coefficients.
    #[inline]
    pub fn center_on(&mut self, center: f64) {
        if center == self.center {
            return;
        }
        self.center = center;
        self.i0 = center.floor() as isize - 1;

        let first = self.i0 as f64;
        let coefficients = &mut self.coefficients;
        unroll! {
            for k in 0..4 {
                coefficients[k] = kernel(center - (first + k as f64));
            }
        }
    }

    #[inline]
    pub fn center(&self) -> f64 {
        self.center
    }

    /// First tap index (inclusive).
    #[inline]
    pub fn min_index(&self) -> isize {
        self.i0
    }

    /// One past the last tap index.
    #[inline]
    pub fn max_index(&self) -> isize {
        self.i0 + TAPS as isize
    }

    /// Coefficient of tap `i`, zero outside the support window.
    #[inline]
    pub fn coefficient(&self, i: isize) -> f64 {
        let k = i - self.i0;
        if (0..TAPS as isize).contains(&k) {
            self.coefficients[k as usize]
        } else {
            0.0
        }
    }
}

/// One [`CubicSpline`] per axis.
#[derive(Clone, Copy, Debug)]
pub struct SplineSet<const N: usize> {
    splines: [CubicSpline; N],
}

impl<const N: usize> Default for SplineSet<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SplineSet<N> {
    pub const fn new() -> Self {
        Self {
            splines: [CubicSpline::new(); N],
        }
    }

    #[inline]
    pub fn center_on(&mut self, position: &VectorIndex<N>) {
        for (i, spline) in self.splines.iter_mut().enumerate() {
            spline.center_on(position.value(i));
        }
    }

    #[inline]
    pub fn spline(&self, axis: usize) -> &CubicSpline {
        &self.splines[axis]
    }

    pub fn min_index(&self) -> Index<N> {
        let mut out = Index::zero();
        for i in 0..N {
            out.set_value(i, self.splines[i].min_index());
        }
        out
    }

    pub fn max_index(&self) -> Index<N> {
        let mut out = Index::zero();
        for i in 0..N {
            out.set_value(i, self.splines[i].max_index());
        }
        out
    }

    /// The 4^N tap window of the current center.
    #[inline]
    pub fn window(&self) -> Span<N> {
        Span::new(self.min_index(), self.max_index())
    }

    /// Separable weight of an N-dimensional tap.
    #[inline]
    pub fn coefficient(&self, index: &Index<N>) -> f64 {
        let mut w = 1.0;
        for i in 0..N {
            w *= self.splines[i].coefficient(index.value(i));
        }
        w
    }
}
