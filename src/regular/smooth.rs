//! Beam convolution, direct and coarse-then-interpolate.
use log::debug;

use super::{Interpolation, RegularData, extents};
use crate::beam::Beam;
use crate::error::{GridError, Result};
use crate::grid::{Grid, for_each_cell};
use crate::index::{Index, Span, VectorIndex};
use crate::indexed::IndexedData;
use crate::layout::Shape;
use crate::num::{Sample, from_f64, to_f64};
use crate::spline::SplineSet;
use crate::weighted::WeightedPoint;

/// Output of a smoothing pass: the smoothed values and the total absolute
/// beam-times-weight that went into each of them.
#[derive(Clone, Debug)]
pub struct Smoothed<T, const N: usize> {
    pub values: Grid<T, N>,
    pub weights: Grid<T, N>,
}

impl<T: Sample, const N: usize> Smoothed<T, N> {
    /// Split per-cell results into value and weight grids; no-data cells
    /// are blank in both.
    fn from_points<D>(like: &D, size: [usize; N], points: &[WeightedPoint]) -> Result<Self>
    where
        D: RegularData<N, Value = T> + ?Sized,
    {
        let blank = T::nan();
        let values = points
            .iter()
            .map(|p| if p.is_na() { blank } else { from_f64(p.value) })
            .collect();
        let weights = points
            .iter()
            .map(|p| if p.is_na() { blank } else { from_f64(p.weight) })
            .collect();

        let settle = |mut grid: Grid<T, N>| {
            grid.set_interpolation(like.interpolation());
            grid.set_execution_config(like.execution_config());
            grid
        };
        Ok(Self {
            values: settle(Grid::from_vec(size, values)?),
            weights: settle(Grid::from_vec(size, weights)?),
        })
    }
}

pub(super) fn check_weights<D, T, const N: usize>(
    data: &D,
    weights: Option<&Grid<T, N>>,
) -> Result<()>
where
    D: IndexedData<N> + ?Sized,
    T: Sample,
{
    match weights {
        Some(w) if w.size() != data.size() => {
            Err(GridError::shape_mismatch(data.size(), w.size()))
        }
        _ => Ok(()),
    }
}

pub(super) fn smoothed_at<D, const N: usize>(
    data: &D,
    position: &VectorIndex<N>,
    beam: &Beam<D::Value, N>,
    weights: Option<&Grid<D::Value, N>>,
    splines: &mut SplineSet<N>,
) -> WeightedPoint
where
    D: RegularData<N> + ?Sized,
    D::Value: Sample,
{
    if !position.is_finite() {
        return WeightedPoint::no_data();
    }
    let shape = beam.values();
    let beam_size = shape.size();
    let reference = beam.reference();

    // Data cell `d` sees the beam at `d + shift`
    let shift = *reference - *position;

    let mut from = Index::zero();
    let mut to = Index::zero();
    for i in 0..N {
        let lo = (-shift.value(i)).ceil() as isize;
        let hi = ((-shift.value(i) + (beam_size.value(i) - 1) as f64).floor() as isize)
            .saturating_add(1);
        from.set_value(i, lo);
        to.set_value(i, hi);
    }
    let window = Span::new(from, to).intersect(&data.full_span());

    let integral = shift.is_integral();
    let step = shift.round();

    let mut sum = 0.0;
    let mut sum_weights = 0.0;
    for d in window.iter() {
        let Some(v) = data.valid_value(&d) else {
            continue;
        };
        let w = match weights {
            Some(g) => match g.valid_value(&d) {
                Some(w) => to_f64(w),
                None => continue,
            },
            None => 1.0,
        };
        if w == 0.0 {
            continue;
        }
        let b = if integral {
            shape.valid_value(&(d + step))
        } else {
            shape.value_at(&(d.to_vector() + shift), splines)
        };
        let Some(b) = b else {
            continue;
        };

        let wb = w * to_f64(b);
        sum += wb * to_f64(v);
        sum_weights += wb.abs();
    }

    if sum_weights > 0.0 {
        WeightedPoint::new(sum / sum_weights, sum_weights)
    } else {
        WeightedPoint::no_data()
    }
}

pub(super) fn smoothed<D, const N: usize>(
    data: &D,
    beam: &Beam<D::Value, N>,
    weights: Option<&Grid<D::Value, N>>,
) -> Result<Smoothed<D::Value, N>>
where
    D: RegularData<N> + ?Sized,
    D::Value: Sample,
{
    check_weights(data, weights)?;

    let size = extents(&data.size());
    let shape = Shape::new(size);
    let mut points = vec![WeightedPoint::no_data(); shape.len()];

    for_each_cell(
        &shape,
        &data.execution_config(),
        &mut points,
        beam.capacity(),
        SplineSet::new,
        |splines, i, cell| {
            if data.is_valid(i) {
                *cell = data.smoothed_at(i, beam, weights, splines);
            }
        },
    );

    Smoothed::from_points(data, size, &points)
}

pub(super) fn fast_smoothed<D, const N: usize>(
    data: &D,
    beam: &Beam<D::Value, N>,
    step: &Index<N>,
    weights: Option<&Grid<D::Value, N>>,
) -> Result<Smoothed<D::Value, N>>
where
    D: RegularData<N> + ?Sized,
    D::Value: Sample,
{
    if step.values().iter().any(|&s| s < 1) {
        return Err(GridError::InvalidArgument(format!(
            "Smoothing step must be at least 1 on every axis, got {step}"
        )));
    }
    if step.volume() == 1 {
        return smoothed(data, beam, weights);
    }
    check_weights(data, weights)?;

    let size = data.size();
    let mut coarse_size = [0_usize; N];
    for i in 0..N {
        let n = size.value(i);
        coarse_size[i] = if n > 0 {
            ((n - 1) / step.value(i) + 1) as usize
        } else {
            0
        };
    }
    let config = data.execution_config();
    debug!("Smoothing on coarse grid {coarse_size:?} with step {step}");

    // Exact convolution at every step-th cell, valid or not
    let coarse_shape = Shape::new(coarse_size);
    let mut coarse = vec![WeightedPoint::no_data(); coarse_shape.len()];
    for_each_cell(
        &coarse_shape,
        &config,
        &mut coarse,
        beam.capacity(),
        SplineSet::new,
        |splines, c, cell| {
            let mut fine = Index::zero();
            fine.set_product(c, step);
            *cell = data.smoothed_at(&fine, beam, weights, splines);
        },
    );
    let coarse = Smoothed::from_points(data, coarse_size, &coarse)?;
    let coarse_values = coarse.values.with_interpolation(Interpolation::Spline);
    let coarse_weights = coarse.weights.with_interpolation(Interpolation::Spline);

    // Interpolate back at the valid cells of the full grid
    let fine_size = extents(&size);
    let fine_shape = Shape::new(fine_size);
    let mut points = vec![WeightedPoint::no_data(); fine_shape.len()];
    for_each_cell(
        &fine_shape,
        &config,
        &mut points,
        2 * (1 << (2 * N)),
        SplineSet::new,
        |splines, i, cell| {
            if !data.is_valid(i) {
                return;
            }
            let mut position = VectorIndex::zero();
            for k in 0..N {
                position.set_value(k, i.value(k) as f64 / step.value(k) as f64);
            }
            let v = coarse_values.spline_at(&position, splines);
            let w = coarse_weights.spline_at(&position, splines);
            if let (Some(v), Some(w)) = (v, w) {
                *cell = WeightedPoint::new(to_f64(v), to_f64(w));
            }
        },
    );

    Smoothed::from_points(data, fine_size, &points)
}

#[cfg(test)]
mod test {
    use crate::testing::*;
    use crate::{Beam, ExecutionConfig, Grid, GridError, Index, IndexedData, RegularData};

    fn gaussian() -> Beam<f64, 2> {
        Beam::gaussian([1.5, 1.5], 3.0).normalized()
    }

    #[test]
    fn test_constant_field_is_preserved() {
        let mut grid: Grid<f64, 2> = Grid::from_fn([15, 15], |_| 5.0);
        grid.discard(&Index::new([0, 0]));
        let out = grid.smoothed(&gaussian(), None).unwrap();

        for i in grid.full_span().iter() {
            match grid.valid_value(&i) {
                Some(_) => assert!((out.values.get(&i) - 5.0).abs() < 1e-12),
                None => assert!(!out.values.is_valid(&i)),
            }
        }

        // Interior weight is the beam's total mass
        let w = out.weights.get(&Index::new([7, 7]));
        assert!((w - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weights_size_must_match() {
        let grid: Grid<f64, 2> = Grid::new([4, 4]);
        let weights: Grid<f64, 2> = Grid::new([4, 5]);
        let result = grid.smoothed(&gaussian(), Some(&weights));
        assert!(matches!(result, Err(GridError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_zero_weight_points_are_ignored() {
        let mut grid: Grid<f64, 1> = Grid::from_fn([9], |_| 1.0);
        grid.set(&Index::new([4]), 100.0);
        let mut weights: Grid<f64, 1> = Grid::from_fn([9], |_| 1.0);
        weights.set(&Index::new([4]), 0.0);

        let beam = Beam::gaussian([1.0], 3.0);
        let out = grid.smoothed(&beam, Some(&weights)).unwrap();
        for i in 0..9 {
            assert!((out.values.get(&Index::new([i])) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_unit_step_matches_direct() {
        let mut grid = random_field([12, 9]);
        grid.discard(&Index::new([5, 5]));
        let beam = gaussian();

        let direct = grid.smoothed(&beam, None).unwrap();
        let fast = grid.fast_smoothed(&beam, &Index::new([1, 1]), None).unwrap();

        let same = |a: &[f64], b: &[f64]| {
            a.iter()
                .zip(b)
                .all(|(x, y)| x == y || (x.is_nan() && y.is_nan()))
        };
        assert!(same(direct.values.data(), fast.values.data()));
        assert!(same(direct.weights.data(), fast.weights.data()));
    }

    #[test]
    fn test_fast_smoothing_constant_field() {
        let mut grid: Grid<f64, 2> = Grid::from_fn([17, 14], |_| 5.0);
        grid.set_execution_config(ExecutionConfig::default().with_min_fork_volume(0));
        let out = grid.fast_smoothed(&gaussian(), &Index::new([3, 2]), None).unwrap();

        for i in grid.full_span().iter() {
            assert!((out.values.get(&i) - 5.0).abs() < 1e-9, "{i}");
        }
    }

    #[test]
    fn test_fast_smoothing_tracks_direct() {
        let grid: Grid<f64, 2> = Grid::from_fn([33, 29], |i| {
            let (x, y) = (i.value(0) as f64, i.value(1) as f64);
            2.0 + (0.25 * x).sin() * (0.2 * y).cos()
        });
        let beam = gaussian();
        let direct = grid.smoothed(&beam, None).unwrap();
        let fast = grid.fast_smoothed(&beam, &Index::new([2, 2]), None).unwrap();

        // Away from the edges, where neither the beam nor the spline taps
        // are truncated
        let interior = crate::Span::new(Index::new([8, 8]), Index::new([24, 20]));
        for i in interior.iter() {
            let error = (fast.values.get(&i) - direct.values.get(&i)).abs();
            assert!(error < 1e-2, "{i}: {error}");
            assert!((fast.weights.get(&i) - 1.0).abs() < 1e-9);
        }

        // Coarse nodes are exact convolutions
        let node = Index::new([12, 10]);
        assert!((fast.values.get(&node) - direct.values.get(&node)).abs() < 1e-12);
    }

    #[test]
    fn test_far_position_has_no_data() {
        let grid: Grid<f64, 2> = Grid::from_fn([6, 6], |_| 1.0);
        let mut splines = crate::SplineSet::new();
        for x in [1e30, -1e30, f64::INFINITY, f64::NAN] {
            let p = grid.smoothed_at_position(
                &crate::VectorIndex::new([2.0, x]),
                &gaussian(),
                None,
                &mut splines,
            );
            assert!(p.is_na(), "{x}");
        }
    }

    #[test]
    fn test_fast_smoothing_rejects_step() {
        let grid: Grid<f64, 2> = Grid::new([4, 4]);
        let result = grid.fast_smoothed(&gaussian(), &Index::new([0, 2]), None);
        assert!(matches!(result, Err(GridError::InvalidArgument(_))));
    }

    #[test]
    fn test_fractional_position() {
        let grid: Grid<f64, 2> = Grid::from_fn([10, 10], |_| -2.0);
        let mut splines = crate::SplineSet::new();
        let p = grid.smoothed_at_position(
            &crate::VectorIndex::new([4.3, 5.6]),
            &gaussian(),
            None,
            &mut splines,
        );
        assert!(!p.is_na());
        assert!((p.value + 2.0).abs() < 1e-6);
    }
}
