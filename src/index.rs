//! Integer and real-valued N-dimensional grid coordinates.
//!
//! ```rust
//! use ndgrid::{Index, Span};
//!
//! let span = Span::new(Index::new([0, 0]), Index::new([2, 3]));
//! let visited: Vec<Index<2>> = span.iter().collect();
//!
//! // Last axis fastest (C ordering)
//! assert_eq!(visited[1], Index::new([0, 1]));
//! assert_eq!(visited.len(), span.volume());
//! ```
//!
//! The rank is a const generic, so every binary operation between indices
//! is rank-checked at compile time.
use core::fmt;
use core::ops::{Add, Sub};

use crate::error::{GridError, Result};

/// Integer coordinate of a grid cell.
///
/// Components are signed so that kernel offsets and clipped windows can be
/// expressed without wrapping. Ordering is lexicographic, which is the
/// C-order traversal order of a grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Index<const N: usize>([isize; N]);

impl<const N: usize> Index<N> {
    #[inline]
    pub const fn new(values: [isize; N]) -> Self {
        Self(values)
    }

    #[inline]
    pub const fn zero() -> Self {
        Self([0; N])
    }

    #[inline]
    pub const fn filled(value: isize) -> Self {
        Self([value; N])
    }

    /// Build from unsigned extents, e.g. a grid size.
    #[inline]
    pub fn from_extents(extents: [usize; N]) -> Self {
        let mut values = [0_isize; N];
        for i in 0..N {
            values[i] = extents[i] as isize;
        }
        Self(values)
    }

    #[inline]
    pub const fn dimension(&self) -> usize {
        N
    }

    #[inline]
    pub fn values(&self) -> &[isize; N] {
        &self.0
    }

    #[inline]
    pub fn value(&self, axis: usize) -> isize {
        self.0[axis]
    }

    #[inline]
    pub fn set_value(&mut self, axis: usize, value: isize) {
        self.0[axis] = value;
    }

    #[inline]
    pub fn increment(&mut self, axis: usize) {
        self.0[axis] += 1;
    }

    #[inline]
    pub fn decrement(&mut self, axis: usize) {
        self.0[axis] -= 1;
    }

    #[inline]
    pub fn fill(&mut self, value: isize) {
        self.0 = [value; N];
    }

    #[inline]
    pub fn set_zero(&mut self) {
        self.fill(0);
    }

    /// Product of the components, treating negative extents as empty.
    #[inline]
    pub fn volume(&self) -> usize {
        self.0.iter().map(|&x| x.max(0) as usize).product()
    }

    /// Euclidean distance between two cells.
    pub fn distance_to(&self, other: &Self) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(&a, &b)| {
                let d = (a - b) as f64;
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Write this index with the axis order reversed into `other`.
    #[inline]
    pub fn reverse_to(&self, other: &mut Self) {
        for i in 0..N {
            other.0[i] = self.0[N - 1 - i];
        }
    }

    #[inline]
    pub fn reversed(&self) -> Self {
        let mut out = Self::zero();
        self.reverse_to(&mut out);
        out
    }

    #[inline]
    pub fn set_sum(&mut self, a: &Self, b: &Self) {
        for i in 0..N {
            self.0[i] = a.0[i] + b.0[i];
        }
    }

    #[inline]
    pub fn set_difference(&mut self, a: &Self, b: &Self) {
        for i in 0..N {
            self.0[i] = a.0[i] - b.0[i];
        }
    }

    #[inline]
    pub fn set_product(&mut self, a: &Self, b: &Self) {
        for i in 0..N {
            self.0[i] = a.0[i] * b.0[i];
        }
    }

    /// Element-wise integer division, rounding toward negative infinity.
    ///
    /// # Errors
    /// * If any component of `b` is zero
    pub fn set_ratio(&mut self, a: &Self, b: &Self) -> Result<()> {
        if b.0.contains(&0) {
            return Err(GridError::InvalidArgument(format!(
                "Division of {a} by zero component in {b}"
            )));
        }
        for i in 0..N {
            self.0[i] = a.0[i].div_euclid(b.0[i]);
        }
        Ok(())
    }

    /// Real-valued copy of this index.
    #[inline]
    pub fn to_vector(&self) -> VectorIndex<N> {
        VectorIndex::from(self)
    }
}

impl<const N: usize> From<[isize; N]> for Index<N> {
    fn from(values: [isize; N]) -> Self {
        Self(values)
    }
}

impl<const N: usize> Add for Index<N> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let mut out = Self::zero();
        out.set_sum(&self, &rhs);
        out
    }
}

impl<const N: usize> Sub for Index<N> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        let mut out = Self::zero();
        out.set_difference(&self, &rhs);
        out
    }
}

impl<const N: usize> fmt::Display for Index<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, ")")
    }
}

/// Real-valued grid position, used for sub-cell (interpolated) lookups.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VectorIndex<const N: usize>([f64; N]);

impl<const N: usize> VectorIndex<N> {
    #[inline]
    pub const fn new(values: [f64; N]) -> Self {
        Self(values)
    }

    #[inline]
    pub const fn zero() -> Self {
        Self([0.0; N])
    }

    #[inline]
    pub const fn dimension(&self) -> usize {
        N
    }

    #[inline]
    pub fn values(&self) -> &[f64; N] {
        &self.0
    }

    #[inline]
    pub fn value(&self, axis: usize) -> f64 {
        self.0[axis]
    }

    #[inline]
    pub fn set_value(&mut self, axis: usize, value: f64) {
        self.0[axis] = value;
    }

    /// Containing cell, rounding every component down.
    #[inline]
    pub fn floor(&self) -> Index<N> {
        let mut out = Index::zero();
        for i in 0..N {
            out.0[i] = self.0[i].floor() as isize;
        }
        out
    }

    /// Closest cell.
    #[inline]
    pub fn round(&self) -> Index<N> {
        let mut out = Index::zero();
        for i in 0..N {
            out.0[i] = self.0[i].round() as isize;
        }
        out
    }

    /// Whether every component sits exactly on a grid node.
    #[inline]
    pub fn is_integral(&self) -> bool {
        self.0.iter().all(|x| x.fract() == 0.0)
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|x| x.is_finite())
    }

    pub fn distance_to(&self, other: &Self) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(&a, &b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

impl<const N: usize> From<&Index<N>> for VectorIndex<N> {
    fn from(index: &Index<N>) -> Self {
        let mut values = [0.0; N];
        for i in 0..N {
            values[i] = index.0[i] as f64;
        }
        Self(values)
    }
}

impl<const N: usize> From<[f64; N]> for VectorIndex<N> {
    fn from(values: [f64; N]) -> Self {
        Self(values)
    }
}

impl<const N: usize> Add for VectorIndex<N> {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        for i in 0..N {
            self.0[i] += rhs.0[i];
        }
        self
    }
}

impl<const N: usize> Sub for VectorIndex<N> {
    type Output = Self;

    fn sub(mut self, rhs: Self) -> Self {
        for i in 0..N {
            self.0[i] -= rhs.0[i];
        }
        self
    }
}

impl<const N: usize> fmt::Display for VectorIndex<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, ")")
    }
}

/// Half-open index range `[from, to)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Span<const N: usize> {
    pub from: Index<N>,
    pub to: Index<N>,
}

impl<const N: usize> Span<N> {
    #[inline]
    pub const fn new(from: Index<N>, to: Index<N>) -> Self {
        Self { from, to }
    }

    /// Span covering a grid of the given size.
    #[inline]
    pub fn of_size(size: &Index<N>) -> Self {
        Self::new(Index::zero(), *size)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        (0..N).any(|i| self.to.0[i] <= self.from.0[i])
    }

    /// Number of indices in the span.
    #[inline]
    pub fn volume(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        (self.to - self.from).volume()
    }

    #[inline]
    pub fn contains(&self, index: &Index<N>) -> bool {
        (0..N).all(|i| index.0[i] >= self.from.0[i] && index.0[i] < self.to.0[i])
    }

    /// Whether `other` lies entirely inside this span.
    /// Empty spans are contained anywhere.
    pub fn encloses(&self, other: &Self) -> bool {
        other.is_empty()
            || (0..N).all(|i| other.from.0[i] >= self.from.0[i] && other.to.0[i] <= self.to.0[i])
    }

    /// Overlap of two spans (possibly empty).
    pub fn intersect(&self, other: &Self) -> Self {
        let mut out = *self;
        for i in 0..N {
            out.from.0[i] = self.from.0[i].max(other.from.0[i]);
            out.to.0[i] = self.to.0[i].min(other.to.0[i]);
        }
        out
    }

    /// Same span restricted to `[first, last)` on the leading axis.
    #[inline]
    pub fn with_leading(&self, first: isize, last: isize) -> Self {
        let mut out = *self;
        if N > 0 {
            out.from.0[0] = first;
            out.to.0[0] = last;
        }
        out
    }

    /// Split the leading axis into at most `parts` contiguous, disjoint,
    /// non-empty partitions which together cover the span.
    pub fn split_leading(&self, parts: usize) -> Vec<Self> {
        if N == 0 || self.is_empty() {
            return Vec::new();
        }
        let first = self.from.0[0];
        let extent = (self.to.0[0] - first) as usize;
        let parts = parts.clamp(1, extent);

        (0..parts)
            .map(|p| {
                let lo = first + (extent * p / parts) as isize;
                let hi = first + (extent * (p + 1) / parts) as isize;
                self.with_leading(lo, hi)
            })
            .collect()
    }

    /// Visit every index of the span, last axis fastest.
    #[inline]
    pub fn iter(&self) -> SpanIter<N> {
        SpanIter {
            span: *self,
            next: if self.is_empty() { None } else { Some(self.from) },
        }
    }
}

impl<const N: usize> IntoIterator for &Span<N> {
    type Item = Index<N>;
    type IntoIter = SpanIter<N>;

    fn into_iter(self) -> SpanIter<N> {
        self.iter()
    }
}

impl<const N: usize> fmt::Display for Span<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.from, self.to)
    }
}

/// C-order iterator over a [`Span`].
pub struct SpanIter<const N: usize> {
    span: Span<N>,
    next: Option<Index<N>>,
}

impl<const N: usize> Iterator for SpanIter<N> {
    type Item = Index<N>;

    #[inline]
    fn next(&mut self) -> Option<Index<N>> {
        let current = self.next?;

        // Odometer increment, carrying from the last axis toward the first
        let mut following = current;
        let mut axis = N;
        self.next = loop {
            if axis == 0 {
                break None;
            }
            axis -= 1;
            following.0[axis] += 1;
            if following.0[axis] < self.span.to.0[axis] {
                break Some(following);
            }
            following.0[axis] = self.span.from.0[axis];
        };

        Some(current)
    }
}
