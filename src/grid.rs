//! Flat, C-ordered grid storage.
//!
//! ```rust
//! use ndgrid::{Grid, Index, IndexedData};
//!
//! let mut grid: Grid<f64, 2> = Grid::from_fn([3, 4], |i| (i.value(0) * 4 + i.value(1)) as f64);
//! grid.discard(&Index::new([0, 0]));
//! grid.scale(2.0);
//!
//! assert_eq!(grid.get(&Index::new([2, 3])), 22.0);
//! assert!(!grid.is_valid(&Index::new([0, 0])));
//! assert_eq!(grid.count_points(), 11);
//! ```
//!
//! In-place mutations are dispatched like the read-side reductions: small
//! workloads run on the calling thread, larger ones split the leading axis
//! into contiguous slabs of the buffer, one per worker.
use core::ops::RangeInclusive;

use log::trace;
use rayon::prelude::*;

use crate::config::ExecutionConfig;
use crate::error::{GridError, Result};
use crate::index::{Index, Span};
use crate::indexed::IndexedData;
use crate::layout::Shape;
use crate::num::{Sample, from_f64};
use crate::regular::{Interpolation, RegularData};

/// N-dimensional grid of samples with a blanking sentinel.
#[derive(Clone, Debug)]
pub struct Grid<T, const N: usize> {
    shape: Shape<N>,

    /// Values in C order, size prod(dims)
    data: Vec<T>,

    /// Sentinel marking "no data"
    blanking: T,

    interpolation: Interpolation,

    config: ExecutionConfig,

    /// Append-only audit log, `None` when disabled
    history: Option<Vec<String>>,
}

impl<T: Sample, const N: usize> Grid<T, N> {
    /// Zero-filled grid with a NaN blanking value.
    pub fn new(size: [usize; N]) -> Self {
        let shape = Shape::new(size);
        Self {
            data: vec![T::zero(); shape.len()],
            shape,
            blanking: T::nan(),
            interpolation: Interpolation::default(),
            config: ExecutionConfig::default(),
            history: None,
        }
    }

    /// Grid with every cell blank.
    pub fn blank(size: [usize; N]) -> Self {
        let mut grid = Self::new(size);
        grid.data.fill(grid.blanking);
        grid
    }

    /// Wrap an existing C-ordered buffer.
    ///
    /// # Errors
    /// * If the buffer length does not match the product of the extents
    pub fn from_vec(size: [usize; N], data: Vec<T>) -> Result<Self> {
        let shape = Shape::new(size);
        if data.len() != shape.len() {
            return Err(GridError::shape_mismatch(shape.len(), data.len()));
        }
        Ok(Self {
            shape,
            data,
            blanking: T::nan(),
            interpolation: Interpolation::default(),
            config: ExecutionConfig::default(),
            history: None,
        })
    }

    /// Grid populated from a function of the index, in C order.
    pub fn from_fn(size: [usize; N], mut f: impl FnMut(&Index<N>) -> T) -> Self {
        let mut grid = Self::new(size);
        for (index, cell) in grid.shape.span().iter().zip(grid.data.iter_mut()) {
            *cell = f(&index);
        }
        grid
    }

    /// Blank grid of the same size and settings.
    pub fn blank_like(&self) -> Self {
        Self {
            shape: self.shape,
            data: vec![self.blanking; self.data.len()],
            blanking: self.blanking,
            interpolation: self.interpolation,
            config: self.config,
            history: None,
        }
    }

    /// Zero-filled grid of the given size carrying this grid's settings.
    pub fn zeros_with_settings(&self, size: [usize; N]) -> Self {
        let mut grid = Self::new(size);
        grid.blanking = self.blanking;
        grid.interpolation = self.interpolation;
        grid.config = self.config;
        grid
    }

    pub fn with_blanking_value(mut self, blanking: T) -> Self {
        self.set_blanking_value(blanking);
        self
    }

    /// Change the sentinel, rewriting cells that were blank under the old one.
    pub fn set_blanking_value(&mut self, blanking: T) {
        let old = self.blanking;
        for v in self.data.iter_mut() {
            if is_blank_value(*v, old) {
                *v = blanking;
            }
        }
        self.blanking = blanking;
    }

    #[inline]
    pub fn shape(&self) -> &Shape<N> {
        &self.shape
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.interpolation = interpolation;
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn set_execution_config(&mut self, config: ExecutionConfig) {
        self.config = config;
    }

    pub fn set_parallelism(&mut self, parallelism: usize) {
        self.config = self.config.with_parallelism(parallelism);
    }

    /// Start recording history entries.
    pub fn enable_history(&mut self) {
        self.history.get_or_insert_with(Vec::new);
    }

    /// Append to the history, if recording. Entries are traced either way.
    pub fn add_history(&mut self, entry: impl Into<String>) {
        let entry = entry.into();
        trace!("history: {entry}");
        if let Some(history) = self.history.as_mut() {
            history.push(entry);
        }
    }

    pub fn history(&self) -> &[String] {
        self.history.as_deref().unwrap_or(&[])
    }

    /// Index of the element at a flat buffer offset.
    pub fn index_of_offset(&self, mut offset: usize) -> Index<N> {
        let mut index = Index::zero();
        for i in 0..N {
            let stride = self.shape.strides()[i];
            index.set_value(i, (offset / stride) as isize);
            offset %= stride;
        }
        index
    }

    /// Store a value at an in-bounds index.
    ///
    /// # Panics
    /// * If the index is outside the grid
    #[inline]
    pub fn set(&mut self, index: &Index<N>, value: T) {
        let k = self.checked_offset(index);
        self.data[k] = value;
    }

    /// Blank a single in-bounds cell.
    ///
    /// # Panics
    /// * If the index is outside the grid
    #[inline]
    pub fn discard(&mut self, index: &Index<N>) {
        let blank = self.blanking;
        self.set(index, blank);
    }

    #[inline]
    fn checked_offset(&self, index: &Index<N>) -> usize {
        assert!(
            self.shape.contains(index),
            "Index {index} outside grid of size {}",
            self.shape.size()
        );
        self.shape.offset(index)
    }

    /// Visit every cell mutably through the smart-fork dispatch.
    pub fn transform<F>(&mut self, cost: usize, f: F)
    where
        F: Fn(&Index<N>, &mut T) + Sync + Send,
    {
        let (shape, config) = (self.shape, self.config);
        for_each_cell(&shape, &config, &mut self.data, cost, || (), |_, i, v| f(i, v));
    }

    /// Like [`Grid::transform`], with per-worker scratch state.
    pub fn transform_init<S, I, F>(&mut self, cost: usize, init: I, f: F)
    where
        I: Fn() -> S + Sync + Send,
        F: Fn(&mut S, &Index<N>, &mut T) + Sync + Send,
    {
        let (shape, config) = (self.shape, self.config);
        for_each_cell(&shape, &config, &mut self.data, cost, init, f);
    }

    /// Apply `f` to the valid cells only.
    fn transform_valid<F>(&mut self, f: F)
    where
        F: Fn(&Index<N>, T) -> T + Sync + Send,
    {
        let blank = self.blanking;
        self.transform(1, |i, v| {
            if !is_blank_value(*v, blank) {
                *v = f(i, *v);
            }
        });
    }

    /// Set every cell to zero.
    pub fn clear(&mut self) {
        self.transform(0, |_, v| *v = T::zero());
        self.add_history("clear");
    }

    /// Set every cell to `value`.
    pub fn fill(&mut self, value: T) {
        self.transform(0, |_, v| *v = value);
        self.add_history(format!("fill {value:?}"));
    }

    /// Add a constant to the valid cells.
    pub fn add(&mut self, value: T) {
        self.transform_valid(|_, v| v + value);
        self.add_history(format!("add {value:?}"));
    }

    /// Multiply the valid cells by a constant.
    pub fn scale(&mut self, factor: T) {
        self.transform_valid(|_, v| v * factor);
        self.add_history(format!("scale {factor:?}"));
    }

    /// Discard every valid cell the validator rejects.
    pub fn validate<F>(&mut self, validator: F)
    where
        F: Fn(&Index<N>, T) -> bool + Sync + Send,
    {
        let blank = self.blanking;
        self.transform_valid(|i, v| if validator(i, v) { v } else { blank });
        self.add_history("validate");
    }

    /// Discard valid values inside `range`.
    pub fn discard_range(&mut self, range: RangeInclusive<T>) {
        let blank = self.blanking;
        self.transform_valid(|_, v| if range.contains(&v) { blank } else { v });
        self.add_history("discard range");
    }

    /// Discard valid values outside `range`.
    pub fn restrict_range(&mut self, range: RangeInclusive<T>) {
        let blank = self.blanking;
        self.transform_valid(|_, v| if range.contains(&v) { v } else { blank });
        self.add_history("restrict range");
    }

    /// Copy the valid samples of an identically sized source.
    ///
    /// # Errors
    /// * If the source is not the same size
    pub fn paste<D>(&mut self, source: &D) -> Result<()>
    where
        D: IndexedData<N, Value = T>,
    {
        if source.size() != self.size() {
            return Err(GridError::shape_mismatch(self.size(), source.size()));
        }
        self.transform(1, |i, v| {
            if let Some(s) = source.valid_value(i) {
                *v = s;
            }
        });
        self.add_history("paste");
        Ok(())
    }

    /// Add `factor` times an identically sized grid, where both are valid.
    ///
    /// # Errors
    /// * If the other grid is not the same size
    pub fn add_scaled<D>(&mut self, other: &D, factor: T) -> Result<()>
    where
        D: IndexedData<N, Value = T>,
    {
        if other.size() != self.size() {
            return Err(GridError::shape_mismatch(self.size(), other.size()));
        }
        self.transform_valid(|i, v| match other.valid_value(i) {
            Some(o) => v + factor * o,
            None => v,
        });
        self.add_history(format!("add scaled {factor:?}"));
        Ok(())
    }

    /// Subtract the mean (or, if `robust`, the median) of the valid cells
    /// and return the removed constant. Without data, nothing changes and
    /// zero is returned.
    pub fn level(&mut self, robust: bool) -> f64 {
        let center = if robust { self.median() } else { self.mean() };
        if center.is_na() {
            return 0.0;
        }
        self.add(from_f64::<T>(-center.value));
        center.value
    }

    /// Copy of a sub-span.
    ///
    /// # Errors
    /// * If the span reaches outside the grid
    pub fn cropped(&self, span: &Span<N>) -> Result<Self> {
        let span = self.resolve_span(Some(span))?;
        let mut size = [0_usize; N];
        for i in 0..N {
            size[i] = (span.to.value(i) - span.from.value(i)).max(0) as usize;
        }
        let mut out = self.zeros_with_settings(size);
        out.transform(1, |i, v| *v = self.get(&(*i + span.from)));
        Ok(out)
    }
}

#[inline]
pub(crate) fn is_blank_value<T: Sample>(v: T, blank: T) -> bool {
    v.is_nan() || v == blank
}

/// Visit every cell of a C-ordered buffer with the smart-fork rule.
///
/// This is the write-side counterpart of [`IndexedData::smart_fork`]: the
/// per-cell kernels of smoothing, resampling, despiking and the in-place
/// mutators run through here instead of through a `PointOp`, since each
/// one writes its own cell rather than merging a reduction. Both paths take
/// the fork decision from [`ExecutionConfig::should_fork_points`].
///
/// Forked work is split by leading-axis slabs, each a contiguous slice of
/// the buffer, and each worker gets its own state from `init`.
pub(crate) fn for_each_cell<E, S, I, F, const N: usize>(
    shape: &Shape<N>,
    config: &ExecutionConfig,
    data: &mut [E],
    cost: usize,
    init: I,
    f: F,
) where
    E: Send,
    I: Fn() -> S + Sync + Send,
    F: Fn(&mut S, &Index<N>, &mut E) + Sync + Send,
{
    if data.is_empty() || N == 0 {
        return;
    }
    let span = shape.span();
    let rows = shape.dims()[0];

    if !config.should_fork_points(span.volume(), cost) || rows < 2 {
        let mut state = init();
        for (index, cell) in span.iter().zip(data.iter_mut()) {
            f(&mut state, &index, cell);
        }
        return;
    }

    let rows_per_part = rows.div_ceil(config.parallelism.min(rows));
    let row_len = shape.strides()[0];
    trace!("forking {} cells in slabs of {rows_per_part} rows", data.len());

    data.par_chunks_mut(rows_per_part * row_len)
        .enumerate()
        .for_each_init(init, |state, (part, chunk)| {
            let first = (part * rows_per_part) as isize;
            let last = first + (chunk.len() / row_len) as isize;
            for (index, cell) in span.with_leading(first, last).iter().zip(chunk.iter_mut()) {
                f(state, &index, cell);
            }
        });
}

impl<T: Sample, const N: usize> IndexedData<N> for Grid<T, N> {
    type Value = T;

    #[inline]
    fn size(&self) -> Index<N> {
        self.shape.size()
    }

    #[inline]
    fn get(&self, index: &Index<N>) -> T {
        self.data[self.shape.offset(index)]
    }

    #[inline]
    fn blanking_value(&self) -> T {
        self.blanking
    }

    #[inline]
    fn execution_config(&self) -> ExecutionConfig {
        self.config
    }

    #[inline]
    fn contains(&self, index: &Index<N>) -> bool {
        self.shape.contains(index)
    }
}

impl<T: Sample, const N: usize> RegularData<N> for Grid<T, N> {
    #[inline]
    fn interpolation(&self) -> Interpolation {
        self.interpolation
    }
}
