//! N-dimensional regular-grid data engine: flat C-ordered storage with a
//! blanking sentinel, parallel point operations and statistics, and
//! interpolation, smoothing and clean on top.
//!
//! # Parallel Dispatch
//! Whole-grid operations are expressed as point operators ([`ops::PointOp`])
//! visiting indices of a [`Span`]. Each one can run as a sequential loop or
//! be forked over leading-axis partitions on the rayon pool and merged
//! afterward. The "smart" entry points fork only when
//! `volume * (2 + operations_per_point)` reaches the configured threshold
//! and more than one worker is allowed; see [`ExecutionConfig`].
//!
//! Every interpolating operation keeps its scratch state ([`SplineSet`])
//! per worker, and the merged result of a forked operation does not depend
//! on the number of workers.
//!
//! | Method                  | Taps per point  |
//! |-------------------------|-----------------|
//! | Nearest                 | 1               |
//! | Linear                  | 2^ndims         |
//! | Quadratic               | 3^ndims         |
//! | Spline                  | 4^ndims         |
//! | Beam smoothing          | beam volume     |
//!
//! # Example: Statistics and Interpolation
//! ```rust
//! use ndgrid::{Grid, Index, IndexedData, RegularData, VectorIndex};
//! use ndgrid::ops::CountPoints;
//!
//! let mut grid: Grid<f64, 2> = Grid::from_fn([4, 5], |i| (i.value(0) + i.value(1)) as f64);
//! grid.discard(&Index::new([0, 0]));
//!
//! assert_eq!(grid.count_points(), 19);
//! assert_eq!(grid.smart_fork_valid(None, CountPoints::default()).unwrap(), 19);
//! assert_eq!(grid.range(), Some((1.0, 7.0)));
//!
//! let v = grid.value_at_position(&VectorIndex::new([1.5, 2.0])).unwrap();
//! assert!((v - 3.5).abs() < 1e-12);
//! ```
//!
//! # Example: Smoothing
//! ```rust
//! use ndgrid::{Beam, Grid, Index, IndexedData, RegularData};
//!
//! let grid: Grid<f64, 2> = Grid::from_fn([16, 16], |_| 1.0);
//! let beam = Beam::gaussian([2.0, 2.0], 3.0);
//! let smoothed = grid.fast_smoothed(&beam, &Index::new([2, 2]), None).unwrap();
//! assert!((smoothed.values.get(&Index::new([8, 8])) - 1.0).abs() < 1e-9);
//! ```
// These "needless" range loops are a significant speedup
#![allow(clippy::needless_range_loop)]

pub mod beam;
pub use beam::Beam;

pub mod config;
pub use config::{DEFAULT_MIN_FORK_VOLUME, ExecutionConfig};

pub mod error;
pub use error::{GridError, Result};

pub mod grid;
pub use grid::Grid;

pub mod index;
pub use index::{Index, Span, SpanIter, VectorIndex};

pub mod indexed;
pub use indexed::{IndexedData, MEDIAN_NORMALIZED_VARIANCE, median};

pub mod layout;
pub use layout::{AnyGrid, ElementKind, Shape};

pub mod num;
pub use num::Sample;

pub mod ops;

pub mod regular;
pub use regular::{Interpolation, RegularData, Smoothed};

pub mod spline;
pub use spline::{CubicSpline, SplineSet};

pub mod weighted;
pub use weighted::WeightedPoint;

pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
