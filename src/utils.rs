//! Convenience methods for building coordinates and test fields, echoing
//! (but not exactly matching) methods common in scripting languages.
use itertools::Itertools;
use num_traits::Float;

use crate::grid::Grid;
use crate::num::{Sample, from_f64};

/// Generates evenly spaced values from start to stop,
/// including the endpoint.
pub fn linspace<T>(start: T, stop: T, n: usize) -> Vec<T>
where
    T: Float,
{
    if n < 2 {
        return vec![start; n];
    }
    let dx: T = (stop - start) / from_f64(n as f64 - 1.0);
    (0..n).map(|i| start + from_f64::<T>(i as f64) * dx).collect()
}

/// Generates a meshgrid in C ordering (x0, y0, z0, x0, y0, z1, ..., x0, yn, zn)
pub fn meshgrid<T>(x: Vec<&Vec<T>>) -> Vec<Vec<T>>
where
    T: Float,
{
    x.into_iter()
        .multi_cartesian_product()
        .map(|xx| xx.iter().map(|y| **y).collect())
        .collect()
}

/// Grid sampling `f` at the coordinates formed by one axis vector per
/// dimension, in the same C ordering as [`meshgrid`].
pub fn grid_from_axes<T, F, const N: usize>(axes: [&Vec<T>; N], f: F) -> Grid<T, N>
where
    T: Sample,
    F: Fn(&[T]) -> T,
{
    let size = axes.map(Vec::len);
    let points = meshgrid(axes.to_vec());
    let mut values = points.iter().map(|p| f(p));
    Grid::from_fn(size, |_| values.next().unwrap_or_else(T::nan))
}
