//! Resampling from another grid and interpolated patch addition.
use log::debug;

use super::{RegularData, extents};
use super::smooth::check_weights;
use crate::beam::Beam;
use crate::error::{GridError, Result};
use crate::grid::Grid;
use crate::index::{Index, Span, VectorIndex};
use crate::indexed::IndexedData;
use crate::num::{Sample, from_f64, to_f64};
use crate::spline::SplineSet;

impl<T: Sample, const N: usize> Grid<T, N> {
    /// Fill this grid by sampling `source` at `to_source(index)` for every
    /// cell. Samples are interpolated, or beam-smoothed when a beam is given.
    /// Cells that map outside the source, or whose sample has no data, are
    /// blanked.
    ///
    /// # Errors
    /// * If `weights` is not the same size as the source
    pub fn resample_from<S, F>(
        &mut self,
        source: &S,
        to_source: F,
        beam: Option<&Beam<T, N>>,
        weights: Option<&Grid<T, N>>,
    ) -> Result<()>
    where
        S: RegularData<N, Value = T> + ?Sized,
        F: Fn(&Index<N>) -> VectorIndex<N> + Sync + Send,
    {
        check_weights(source, weights)?;
        let blank = self.blanking_value();
        let cost = match beam {
            Some(beam) => beam.capacity(),
            None => 1 << (2 * N),
        };
        debug!(
            "Resampling {} cells from grid of size {}",
            self.size().volume(),
            source.size()
        );

        self.transform_init(cost, SplineSet::new, |splines, i, cell| {
            let position = to_source(i);
            if !source.contains_position(&position) {
                *cell = blank;
                return;
            }
            let sample = match beam {
                Some(beam) => {
                    let p = source.smoothed_at_position(&position, beam, weights, splines);
                    (!p.is_na()).then(|| from_f64(p.value))
                }
                None => source.value_at(&position, splines),
            };
            *cell = sample.unwrap_or(blank);
        });
        self.add_history(format!("resample from {}", source.size()));
        Ok(())
    }

    /// Resample to a new size, stretching so that the corner cells of both
    /// grids coincide.
    ///
    /// # Errors
    /// * If any new extent is zero while the old one is not
    pub fn resampled(&self, size: [usize; N]) -> Result<Self> {
        let old = extents(&self.size());
        let mut factors = [0.0; N];
        for i in 0..N {
            if size[i] == 0 && old[i] != 0 {
                return Err(GridError::InvalidArgument(format!(
                    "Cannot resample axis {i} of length {} to zero",
                    old[i]
                )));
            }
            factors[i] = if size[i] > 1 {
                (old[i] as f64 - 1.0) / (size[i] as f64 - 1.0)
            } else {
                0.0
            };
        }

        let mut out = self.zeros_with_settings(size);
        out.resample_from(
            self,
            |i| {
                let mut p = VectorIndex::zero();
                for k in 0..N {
                    p.set_value(k, i.value(k) as f64 * factors[k]);
                }
                p
            },
            None,
            None,
        )?;
        Ok(out)
    }

    /// Add `scale * patch` with the patch's origin at `offset`, interpolating
    /// the patch when the offset is fractional. Only the overlap with this
    /// grid is touched, and blank cells of either grid are left alone.
    pub fn add_patch_at(&mut self, offset: &VectorIndex<N>, patch: &Grid<T, N>, scale: f64) {
        self.add_patch_quietly(offset, patch, scale);
        self.add_history(format!("add patch at {offset} scale={scale}"));
    }

    /// [`Grid::add_patch_at`] without a history entry.
    pub(super) fn add_patch_quietly(
        &mut self,
        offset: &VectorIndex<N>,
        patch: &Grid<T, N>,
        scale: f64,
    ) {
        if !offset.is_finite() {
            return;
        }
        let patch_size = patch.size();
        let mut from = Index::zero();
        let mut to = Index::zero();
        for i in 0..N {
            let lo = offset.value(i).ceil() as isize;
            let hi = ((offset.value(i) + (patch_size.value(i) - 1) as f64).floor() as isize)
                .saturating_add(1);
            from.set_value(i, lo);
            to.set_value(i, hi);
        }
        let window = Span::new(from, to).intersect(&self.full_span());

        let integral = offset.is_integral();
        let shift = offset.round();
        let mut splines = SplineSet::new();

        for d in window.iter() {
            let Some(v) = self.valid_value(&d) else {
                continue;
            };
            let p = if integral {
                patch.valid_value(&(d - shift))
            } else {
                patch.value_at(&(d.to_vector() - *offset), &mut splines)
            };
            if let Some(p) = p {
                self.set(&d, from_f64(to_f64(v) + scale * to_f64(p)));
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{Beam, ExecutionConfig, Grid, Index, IndexedData, Interpolation, VectorIndex};

    fn plane() -> Grid<f64, 2> {
        Grid::from_fn([8, 6], |i| (i.value(0) + 2 * i.value(1)) as f64)
            .with_interpolation(Interpolation::Linear)
    }

    #[test]
    fn test_resample_half_step() {
        let source = plane();
        let mut out: Grid<f64, 2> = Grid::new([15, 11]);
        out.resample_from(
            &source,
            |i| VectorIndex::new([0.5 * i.value(0) as f64, 0.5 * i.value(1) as f64]),
            None,
            None,
        )
        .unwrap();

        for i in out.full_span().iter() {
            let expected = 0.5 * i.value(0) as f64 + i.value(1) as f64;
            assert!((out.get(&i) - expected).abs() < 1e-12, "{i}");
        }
    }

    #[test]
    fn test_resample_outside_is_blank() {
        let source = plane();
        let mut out: Grid<f64, 2> = Grid::new([3, 3]);
        out.resample_from(
            &source,
            |i| VectorIndex::new([i.value(0) as f64 + 6.5, i.value(1) as f64]),
            None,
            None,
        )
        .unwrap();

        assert!(out.is_valid(&Index::new([0, 0])));
        assert!(!out.is_valid(&Index::new([1, 0])));
        assert_eq!(out.count_points(), 3);
    }

    #[test]
    fn test_resample_with_beam() {
        let source: Grid<f64, 2> = Grid::from_fn([12, 12], |_| 3.0);
        let beam = Beam::gaussian([1.0, 1.0], 3.0);
        let mut out: Grid<f64, 2> = Grid::new([5, 5]);
        out.set_execution_config(ExecutionConfig::default().with_min_fork_volume(0));
        out.resample_from(
            &source,
            |i| VectorIndex::new([2.3 * i.value(0) as f64 + 0.7, 2.6 * i.value(1) as f64]),
            Some(&beam),
            None,
        )
        .unwrap();

        for v in out.data() {
            assert!((v - 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_resampled_corners() {
        let source = plane();
        let out = source.resampled([15, 11]).unwrap();
        assert_eq!(out.get(&Index::new([0, 0])), source.get(&Index::new([0, 0])));
        assert!((out.get(&Index::new([14, 10])) - source.get(&Index::new([7, 5]))).abs() < 1e-12);
        assert!(source.resampled([0, 4]).is_err());
    }

    #[test]
    fn test_add_patch_clips_and_skips_blank() {
        let mut grid: Grid<f64, 2> = Grid::new([4, 4]);
        grid.discard(&Index::new([3, 3]));
        let patch: Grid<f64, 2> = Grid::from_fn([3, 3], |_| 1.0);

        grid.add_patch_at(&VectorIndex::new([2.0, 2.0]), &patch, 2.0);
        assert_eq!(grid.get(&Index::new([2, 2])), 2.0);
        assert_eq!(grid.get(&Index::new([2, 3])), 2.0);
        assert_eq!(grid.get(&Index::new([1, 1])), 0.0);
        assert!(!grid.is_valid(&Index::new([3, 3])));

        // Fractional offset of a constant patch adds the constant wherever
        // the patch is defined
        let mut grid: Grid<f64, 1> = Grid::new([6]);
        grid.add_patch_at(&VectorIndex::new([1.5]), &Grid::from_fn([3], |_| 1.0), -1.0);
        let expected = [0.0, 0.0, -1.0, -1.0, 0.0, 0.0];
        for (i, e) in expected.iter().enumerate() {
            assert!((grid.get(&Index::new([i as isize])) - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_add_patch_far_offsets() {
        let patch: Grid<f64, 2> = Grid::from_fn([3, 3], |_| 1.0);
        for x in [1e30, -1e30, f64::INFINITY, f64::NAN] {
            let mut grid: Grid<f64, 2> = Grid::new([4, 4]);
            grid.add_patch_at(&VectorIndex::new([x, 1.0]), &patch, 1.0);
            grid.add_patch_at(&VectorIndex::new([0.5, x]), &patch, 1.0);
            assert!(grid.data().iter().all(|&v| v == 0.0), "{x}");
        }
    }
}
