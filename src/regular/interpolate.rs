//! Point interpolators over any [`IndexedData`].
use crate::index::{Index, Span, VectorIndex};
use crate::indexed::IndexedData;
use crate::num::{from_f64, to_f64};
use crate::spline::SplineSet;

/// Whether `position` is finite and no more than `reach` cells outside the
/// grid on any axis. Past that no tap can land on a cell.
fn within_reach<D, const N: usize>(data: &D, position: &VectorIndex<N>, reach: f64) -> bool
where
    D: IndexedData<N> + ?Sized,
{
    let size = data.size();
    position.is_finite()
        && (0..N).all(|i| {
            let x = position.value(i);
            x >= -reach && x <= (size.value(i) - 1) as f64 + reach
        })
}

pub(super) fn nearest<D, const N: usize>(data: &D, position: &VectorIndex<N>) -> Option<D::Value>
where
    D: IndexedData<N> + ?Sized,
{
    if !within_reach(data, position, 1.0) {
        return None;
    }
    data.valid_value(&position.round())
}

/// Weighted average of the valid corners of the containing cell.
pub(super) fn linear<D, const N: usize>(data: &D, position: &VectorIndex<N>) -> Option<D::Value>
where
    D: IndexedData<N> + ?Sized,
{
    if !within_reach(data, position, 1.0) {
        return None;
    }
    let origin = position.floor();
    let mut fractions = [0.0; N];
    for i in 0..N {
        fractions[i] = position.value(i) - origin.value(i) as f64;
    }

    let mut sum = 0.0;
    let mut sum_weights = 0.0;

    // Bit j of the vertex number selects the upper corner on axis j
    for vertex in 0..(1_usize << N) {
        let mut corner = origin;
        let mut w = 1.0;
        for j in 0..N {
            if vertex & (1 << j) != 0 {
                corner.increment(j);
                w *= fractions[j];
            } else {
                w *= 1.0 - fractions[j];
            }
        }
        if w == 0.0 {
            continue;
        }
        if let Some(v) = data.valid_value(&corner) {
            sum += w * to_f64(v);
            sum_weights += w;
        }
    }

    (sum_weights > 0.0).then(|| from_f64(sum / sum_weights))
}

/// Separable parabolic interpolation, one axis at a time.
pub(super) fn quadratic<D, const N: usize>(
    data: &D,
    position: &VectorIndex<N>,
) -> Option<D::Value>
where
    D: IndexedData<N> + ?Sized,
{
    if !within_reach(data, position, 1.5) {
        return None;
    }
    let mut index = position.round();
    quadratic_along(data, position, 0, &mut index).map(from_f64)
}

fn quadratic_along<D, const N: usize>(
    data: &D,
    position: &VectorIndex<N>,
    axis: usize,
    index: &mut Index<N>,
) -> Option<f64>
where
    D: IndexedData<N> + ?Sized,
{
    if axis == N {
        return data.valid_value(index).map(to_f64);
    }

    let center = index.value(axis);
    let d = position.value(axis) - center as f64;

    let b = quadratic_along(data, position, axis + 1, index);
    if d == 0.0 {
        return b;
    }

    index.set_value(axis, center - 1);
    let a = quadratic_along(data, position, axis + 1, index);
    index.set_value(axis, center + 1);
    let c = quadratic_along(data, position, axis + 1, index);
    index.set_value(axis, center);

    match (a, b, c) {
        (Some(a), Some(b), Some(c)) => Some(b + 0.5 * d * (c - a) + 0.5 * d * d * (a + c - 2.0 * b)),
        // Edge or gap: linear toward whichever neighbour is on the side of `d`
        (_, Some(b), Some(c)) if d > 0.0 => Some(b + d * (c - b)),
        (Some(a), Some(b), _) if d < 0.0 => Some(b - d * (a - b)),
        (_, Some(b), _) => Some(b),
        (Some(a), None, Some(c)) => Some(a + 0.5 * (d + 1.0) * (c - a)),
        _ => None,
    }
}

/// Cubic convolution over the 4^N tap window.
pub(super) fn spline<D, const N: usize>(
    data: &D,
    position: &VectorIndex<N>,
    splines: &mut SplineSet<N>,
) -> Option<D::Value>
where
    D: IndexedData<N> + ?Sized,
{
    if !within_reach(data, position, 2.0) {
        return None;
    }
    splines.center_on(position);
    let window = splines.window().intersect(&data.full_span());

    let mut sum = 0.0;
    let mut sum_weights = 0.0;
    for tap in Span::iter(&window) {
        let w = splines.coefficient(&tap);
        if w == 0.0 {
            continue;
        }
        if let Some(v) = data.valid_value(&tap) {
            sum += w * to_f64(v);
            sum_weights += w;
        }
    }

    (sum_weights != 0.0).then(|| from_f64(sum / sum_weights))
}
