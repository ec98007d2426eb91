//! Explicit shape/stride descriptors and the closed set of element kinds.
//!
//! A grid is a flat C-ordered buffer plus a [`Shape`]; no runtime inspection
//! of nested containers is ever needed to discover its rank or extents.
use crate::error::{GridError, Result};
use crate::grid::Grid;
use crate::index::{Index, Span};
use crate::indexed::IndexedData;

/// Extents and C-order strides of an N-dimensional buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shape<const N: usize> {
    dims: [usize; N],
    strides: [usize; N],
}

impl<const N: usize> Shape<N> {
    pub fn new(dims: [usize; N]) -> Self {
        // Each stride is the cumulative product of the sizes of the
        // dimensions after it
        let mut strides = [1_usize; N];
        let mut acc = 1;
        for i in (0..N).rev() {
            strides[i] = acc;
            acc *= dims[i];
        }
        Self { dims, strides }
    }

    #[inline]
    pub fn dims(&self) -> &[usize; N] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[usize; N] {
        &self.strides
    }

    /// Total number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn size(&self) -> Index<N> {
        Index::from_extents(self.dims)
    }

    #[inline]
    pub fn span(&self) -> Span<N> {
        Span::of_size(&self.size())
    }

    #[inline]
    pub fn contains(&self, index: &Index<N>) -> bool {
        (0..N).all(|i| index.value(i) >= 0 && (index.value(i) as usize) < self.dims[i])
    }

    /// Flat buffer offset of an in-bounds index.
    #[inline]
    pub fn offset(&self, index: &Index<N>) -> usize {
        let mut k = 0;
        for i in 0..N {
            k += index.value(i) as usize * self.strides[i];
        }
        k
    }
}

/// Element kinds a buffer can be declared with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Float32,
    Float64,
    Int32,
    Complex64,
}

/// A grid whose element kind is chosen at run time, resolved once at
/// construction into one of the numerically supported variants.
#[derive(Clone, Debug)]
pub enum AnyGrid<const N: usize> {
    F32(Grid<f32, N>),
    F64(Grid<f64, N>),
}

impl<const N: usize> AnyGrid<N> {
    /// Allocate a zero-initialized grid of the given shape and element kind.
    ///
    /// # Errors
    /// * If the element kind has no additive numeric representation here
    pub fn zeros(size: [usize; N], kind: ElementKind) -> Result<Self> {
        match kind {
            ElementKind::Float32 => Ok(Self::F32(Grid::new(size))),
            ElementKind::Float64 => Ok(Self::F64(Grid::new(size))),
            other => Err(GridError::UnsupportedElementType(other)),
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Self::F32(_) => ElementKind::Float32,
            Self::F64(_) => ElementKind::Float64,
        }
    }

    pub fn size(&self) -> Index<N> {
        match self {
            Self::F32(g) => g.size(),
            Self::F64(g) => g.size(),
        }
    }

    pub fn fill(&mut self, value: f64) {
        match self {
            Self::F32(g) => g.fill(value as f32),
            Self::F64(g) => g.fill(value),
        }
    }

    pub fn scale(&mut self, factor: f64) {
        match self {
            Self::F32(g) => g.scale(factor as f32),
            Self::F64(g) => g.scale(factor),
        }
    }

    pub fn count_points(&self) -> usize {
        match self {
            Self::F32(g) => g.count_points(),
            Self::F64(g) => g.count_points(),
        }
    }
}
