//! Iterative point-source removal and outlier rejection.
use log::debug;

use super::RegularData;
use crate::beam::Beam;
use crate::error::{GridError, Result};
use crate::grid::{Grid, for_each_cell, is_blank_value};
use crate::index::{Index, Span, VectorIndex};
use crate::indexed::IndexedData;
use crate::num::{Sample, from_f64, to_f64};

impl<T: Sample, const N: usize> Grid<T, N> {
    /// Repeatedly subtract `gain` times the beam at the largest-deviation
    /// cell until every residual is below `threshold` in magnitude, or the
    /// iteration budget `ceil(count_points / gain)` runs out.
    ///
    /// This grid is left holding the residual. The returned grid holds the
    /// removed components, rescaled by the beam's total absolute weight.
    ///
    /// # Errors
    /// * If `gain` is not in `(0, 1]`
    pub fn clean(
        &mut self,
        beam: &Grid<T, N>,
        beam_center: &VectorIndex<N>,
        gain: f64,
        threshold: f64,
    ) -> Result<Self> {
        if !(gain > 0.0 && gain <= 1.0) {
            return Err(GridError::InvalidArgument(format!(
                "Clean gain must be in (0, 1], got {gain}"
            )));
        }

        let mut components = self.zeros_with_settings(*self.shape().dims());
        let budget = (self.count_points() as f64 / gain).ceil() as usize;

        let mut iterations = 0;
        while iterations < budget {
            let Some(peak_index) = self.index_of_max_dev() else {
                break;
            };
            let peak = to_f64(self.get(&peak_index));
            if peak.abs() < threshold {
                break;
            }

            let amount = gain * peak;
            let total = to_f64(components.get(&peak_index)) + amount;
            components.set(&peak_index, from_f64(total));
            self.add_patch_quietly(&(peak_index.to_vector() - *beam_center), beam, -amount);
            iterations += 1;
        }

        let beam_sum = Beam::new(beam.clone(), *beam_center).abs_sum();
        components.scale(from_f64(beam_sum));

        debug!("Clean removed {iterations} components (budget {budget})");
        self.add_history(format!("clean gain={gain} threshold={threshold} n={iterations}"));
        Ok(components)
    }

    /// Discard cells that deviate from the weighted mean of their nearest
    /// neighbours by more than `significance` standard deviations. Returns
    /// the number of cells discarded.
    ///
    /// Each cell is compared to its 2N face neighbours. With `noise_weight`
    /// giving inverse variances, a deviation `Δ` has significance
    /// `|Δ| sqrt(w)` where `w = w_i W / (w_i + W)` combines the cell's weight
    /// `w_i` with the neighbours' total `W`. Without it, all weights are one.
    ///
    /// # Errors
    /// * If `noise_weight` is not the same size as this grid
    pub fn despike(&mut self, significance: f64, noise_weight: Option<&Grid<T, N>>) -> Result<usize> {
        let neighbors = self.smoothed(&Beam::cross(), noise_weight)?;
        let before = self.count_points();
        let blank = self.blanking_value();

        self.transform(4 * N, |i, v| {
            if is_blank_value(*v, blank) {
                return;
            }
            let Some(mean) = neighbors.values.valid_value(i) else {
                return;
            };
            let total = to_f64(neighbors.weights.get(i));
            let own = match noise_weight {
                Some(g) => g.valid_value(i).map_or(0.0, to_f64),
                None => 1.0,
            };
            if total <= 0.0 || own <= 0.0 {
                return;
            }

            let w = own * total / (own + total);
            if (to_f64(*v) - to_f64(mean)).abs() * w.sqrt() > significance {
                *v = blank;
            }
        });

        let discarded = before - self.count_points();
        debug!("Despiking at {significance} sigma discarded {discarded} points");
        self.add_history(format!("despike {significance} sigma n={discarded}"));
        Ok(discarded)
    }

    /// Discard valid cells with fewer than `min_neighbors` valid cells among
    /// their 3^N - 1 neighbours. Returns the number of cells discarded.
    pub fn discard_isolated(&mut self, min_neighbors: usize) -> usize {
        let shape = *self.shape();
        let mut isolated = vec![false; shape.len()];
        let neighborhood = 3_usize.pow(N as u32);

        for_each_cell(
            &shape,
            &self.execution_config(),
            &mut isolated,
            neighborhood,
            || (),
            |_, i, flag| {
                if !self.is_valid(i) {
                    return;
                }
                let window = Span::new(*i - Index::filled(1), *i + Index::filled(2));
                let count = window
                    .iter()
                    .filter(|j| j != i && self.is_valid(j))
                    .count();
                *flag = count < min_neighbors;
            },
        );

        let discarded = isolated.iter().filter(|&&f| f).count();
        if discarded > 0 {
            let blank = self.blanking_value();
            self.transform(1, |i, v| {
                if isolated[shape.offset(i)] {
                    *v = blank;
                }
            });
        }
        debug!("Discarded {discarded} isolated points");
        self.add_history(format!("discard isolated min={min_neighbors} n={discarded}"));
        discarded
    }
}

#[cfg(test)]
mod test {
    use crate::{Beam, Grid, GridError, Index, IndexedData, VectorIndex};

    /// Point source of `flux` at `at`, convolved with a unit-peak beam.
    fn point_source(beam: &Beam<f64, 2>, at: Index<2>, flux: f64) -> Grid<f64, 2> {
        let mut image: Grid<f64, 2> = Grid::new([15, 15]);
        image.add_patch_at(&(at.to_vector() - *beam.reference()), beam.values(), flux);
        image
    }

    #[test]
    fn test_clean_recovers_point_source() {
        let beam = Beam::gaussian([1.5, 1.5], 3.0);
        let at = Index::new([7, 7]);
        let mut image = point_source(&beam, at, 10.0);

        let components = image
            .clean(beam.values(), beam.reference(), 0.1, 1e-3)
            .unwrap();

        let expected = 10.0 * beam.abs_sum();
        let found = components.get(&at);
        assert!((found - expected).abs() < 2e-3 * beam.abs_sum(), "{found} vs {expected}");
        assert_eq!(components.count_points(), 225);
        assert_eq!(components.data().iter().filter(|&&c| c != 0.0).count(), 1);
        assert!(image.data().iter().all(|r| r.abs() < 1e-3));
    }

    #[test]
    fn test_clean_terminates_on_budget() {
        let beam = Beam::gaussian([1.0, 1.0], 3.0);
        let mut image = point_source(&beam, Index::new([5, 9]), 4.0);

        // Zero threshold never stops on its own
        let components = image
            .clean(beam.values(), beam.reference(), 0.5, 0.0)
            .unwrap();
        let total: f64 = components.data().iter().sum();
        assert!((total - 4.0 * beam.abs_sum()).abs() < 1e-9);
    }

    #[test]
    fn test_clean_rejects_gain() {
        let beam: Beam<f64, 2> = Beam::gaussian([1.0, 1.0], 3.0);
        let mut image: Grid<f64, 2> = Grid::new([5, 5]);
        for gain in [0.0, -0.5, 1.5, f64::NAN] {
            let result = image.clean(beam.values(), beam.reference(), gain, 0.1);
            assert!(matches!(result, Err(GridError::InvalidArgument(_))));
        }
        assert!(
            image
                .clean(beam.values(), &VectorIndex::new([3.0, 3.0]), 1.0, 0.1)
                .is_ok()
        );
    }

    #[test]
    fn test_despike_scenario() {
        let spiked = || {
            let mut grid: Grid<f64, 2> = Grid::from_fn([9, 9], |_| 1.0);
            grid.set(&Index::new([4, 4]), 11.0);
            grid
        };

        // Significance of the spike is 10 * sqrt(0.8) ~ 8.94; its
        // neighbours deviate by 2.5 * sqrt(0.8) ~ 2.24
        let mut grid = spiked();
        assert_eq!(grid.despike(5.0, None).unwrap(), 1);
        assert!(!grid.is_valid(&Index::new([4, 4])));
        assert_eq!(grid.count_points(), 80);

        let mut grid = spiked();
        assert_eq!(grid.despike(9.0, None).unwrap(), 0);

        // Noisier data (lower weights) makes the same spike less significant
        let mut grid = spiked();
        let weights: Grid<f64, 2> = Grid::from_fn([9, 9], |_| 0.25);
        assert_eq!(grid.despike(5.0, Some(&weights)).unwrap(), 0);
    }

    #[test]
    fn test_discard_isolated() {
        let mut grid: Grid<f64, 2> = Grid::blank([5, 5]);
        for i in [[1, 1], [1, 2], [2, 1], [2, 2], [4, 4]] {
            grid.set(&Index::new(i), 1.0);
        }

        assert_eq!(grid.discard_isolated(1), 1);
        assert!(!grid.is_valid(&Index::new([4, 4])));
        assert_eq!(grid.count_points(), 4);

        assert_eq!(grid.discard_isolated(4), 4);
        assert_eq!(grid.count_points(), 0);
    }
}
