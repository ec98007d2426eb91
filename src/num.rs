//! Element type bound and lossless-enough conversions through `f64`.
use core::fmt::Debug;

use num_traits::Float;

/// Element type of a grid.
pub trait Sample: Float + Debug + Send + Sync + 'static {}

impl<T> Sample for T where T: Float + Debug + Send + Sync + 'static {}

/// Widen a sample for accumulation.
#[inline]
pub(crate) fn to_f64<T: Float>(v: T) -> f64 {
    v.to_f64().unwrap_or(f64::NAN)
}

/// Narrow an accumulated value back to the sample type.
#[inline]
pub(crate) fn from_f64<T: Float>(v: f64) -> T {
    T::from(v).unwrap_or_else(T::nan)
}
