//! Error taxonomy shared by every fallible grid operation.
//!
//! Structural problems (shapes, spans, element kinds, arguments) are errors.
//! Sparse or fully flagged data is not: an empty selection comes back as a
//! value (`WeightedPoint::no_data()`, `None` or NaN).
use thiserror::Error;

use crate::layout::ElementKind;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    /// Operand sizes disagree.
    #[error("Shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: String, found: String },

    /// A requested `[from, to)` span reaches outside the grid.
    #[error("Span {span} is out of range for grid of size {size}")]
    OutOfRange { span: String, size: String },

    /// The element kind cannot be combined numerically.
    #[error("Unsupported element type: {0:?}")]
    UnsupportedElementType(ElementKind),

    /// A scalar argument is outside its admissible domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl GridError {
    pub(crate) fn shape_mismatch(expected: impl ToString, found: impl ToString) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub(crate) fn out_of_range(span: impl ToString, size: impl ToString) -> Self {
        Self::OutOfRange {
            span: span.to_string(),
            size: size.to_string(),
        }
    }
}

pub type Result<T> = core::result::Result<T, GridError>;
