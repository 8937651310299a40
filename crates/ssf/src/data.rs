//! Observation sequence with a NaN missing-value sentinel.

use crate::error::SsfError;

/// A fixed-length univariate observation sequence.
///
/// `NaN` marks a missing observation. Infinite values are rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct SsfData {
    values: Vec<f64>,
}

impl SsfData {
    /// Wraps `values`.
    ///
    /// # Errors
    ///
    /// - [`SsfError::EmptyData`] if `values` is empty.
    /// - [`SsfError::NonFiniteData`] if any value is infinite.
    pub fn new(values: Vec<f64>) -> Result<Self, SsfError> {
        if values.is_empty() {
            return Err(SsfError::EmptyData);
        }
        if let Some(t) = values.iter().position(|v| v.is_infinite()) {
            return Err(SsfError::NonFiniteData { t });
        }
        Ok(Self { values })
    }

    /// Number of time points, missing ones included.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always `false`; construction rejects empty sequences.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Observation at `t` (NaN when missing).
    pub fn get(&self, t: usize) -> f64 {
        self.values[t]
    }

    pub fn is_missing(&self, t: usize) -> bool {
        self.values[t].is_nan()
    }

    pub fn count_missing(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}
