//! Value with an inverse-variance weight.
use core::fmt;

/// A `(value, weight)` pair where the weight is an inverse variance.
///
/// A weight of zero (or NaN) means "no data"; an infinite weight marks an
/// exact, non-statistical value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightedPoint {
    pub value: f64,
    pub weight: f64,
}

impl Default for WeightedPoint {
    fn default() -> Self {
        Self::no_data()
    }
}

impl WeightedPoint {
    #[inline]
    pub const fn new(value: f64, weight: f64) -> Self {
        Self { value, weight }
    }

    #[inline]
    pub const fn no_data() -> Self {
        Self {
            value: 0.0,
            weight: 0.0,
        }
    }

    #[inline]
    pub const fn exact(value: f64) -> Self {
        Self {
            value,
            weight: f64::INFINITY,
        }
    }

    #[inline]
    pub fn is_na(&self) -> bool {
        self.weight == 0.0 || self.weight.is_nan() || self.value.is_nan()
    }

    #[inline]
    pub fn is_exact(&self) -> bool {
        self.weight.is_infinite() && self.weight > 0.0
    }

    /// One-sigma uncertainty implied by the weight.
    #[inline]
    pub fn rms(&self) -> f64 {
        1.0 / self.weight.sqrt()
    }

    /// Weighted average of `self` and `other`, accumulating the weights.
    pub fn average(&mut self, other: &Self) {
        if other.is_na() {
            return;
        }
        if self.is_na() {
            *self = *other;
            return;
        }
        match (self.is_exact(), other.is_exact()) {
            (true, true) => self.value = 0.5 * (self.value + other.value),
            (true, false) => {}
            (false, true) => *self = *other,
            (false, false) => {
                let weight = self.weight + other.weight;
                self.value = (self.weight * self.value + other.weight * other.value) / weight;
                self.weight = weight;
            }
        }
    }

    /// Scale the value, propagating the weight accordingly.
    pub fn scale(&mut self, factor: f64) {
        self.value *= factor;
        self.weight /= factor * factor;
    }
}

impl fmt::Display for WeightedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_na() {
            write!(f, "---")
        } else if self.is_exact() {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{} +- {}", self.value, self.rms())
        }
    }
}
