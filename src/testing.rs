//! Repeatable random fields for unit tests.
use rand::distr::{Distribution, StandardUniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Grid, Index};

/// Fixed random seed to support repeatable testing
const SEED: [u8; 32] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 15, 14, 13, 12, 11, 10, 9, 8, 7, 6,
    5, 4, 3, 2, 1,
];

/// Get a random number generator with a const seed for repeatable testing
pub fn rng_fixed_seed() -> StdRng {
    StdRng::from_seed(SEED)
}

/// Generate `n` uniform random numbers in `[0, 1)` using provided generator
pub fn randn<T>(rng: &mut StdRng, n: usize) -> Vec<T>
where
    StandardUniform: Distribution<T>,
{
    rng.sample_iter(StandardUniform).take(n).collect()
}

/// Grid of uniform random values from the fixed seed
pub fn random_field<const N: usize>(size: [usize; N]) -> Grid<f64, N> {
    let mut rng = rng_fixed_seed();
    Grid::from_fn(size, |_| rng.random::<f64>())
}

/// Blank the cells at the given C-order offsets
pub fn sprinkle_blanks<const N: usize>(grid: &mut Grid<f64, N>, offsets: &[usize]) {
    for &k in offsets {
        let index: Index<N> = grid.index_of_offset(k);
        grid.discard(&index);
    }
}
