//! Configuration for filtering runs.

use crate::error::SsfError;
use crate::linalg::TransformationKind;

/// How much of the forward pass is retained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResultsMode {
    /// Prediction errors and variances only. Enough for the likelihood.
    Light,
    /// Every predicted and filtered state. Required for smoothing.
    #[default]
    Full,
}

/// Tolerances and storage options for the diffuse filter.
///
/// # Example
///
/// ```
/// use kalmar_ssf::{FilterConfig, ResultsMode, TransformationKind};
///
/// let config = FilterConfig::new()
///     .with_diffuse_zero(1e-8)
///     .with_mode(ResultsMode::Light)
///     .with_transformation(TransformationKind::Householder);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    /// `fi` below this value is treated as exactly zero.
    diffuse_zero: f64,
    /// `f` below this value is treated as exactly zero.
    variance_zero: f64,
    /// Largest `|e|` tolerated when both `f` and `fi` vanish.
    inconsistency_tol: f64,
    mode: ResultsMode,
    transformation: TransformationKind,
}

impl FilterConfig {
    /// Default tolerances: `diffuse_zero = 1e-9`, `variance_zero = 1e-13`,
    /// `inconsistency_tol = 1e-9`; full results, Givens rotations.
    pub fn new() -> Self {
        Self {
            diffuse_zero: 1e-9,
            variance_zero: 1e-13,
            inconsistency_tol: 1e-9,
            mode: ResultsMode::Full,
            transformation: TransformationKind::Givens,
        }
    }

    pub fn with_diffuse_zero(mut self, value: f64) -> Self {
        self.diffuse_zero = value;
        self
    }

    pub fn with_variance_zero(mut self, value: f64) -> Self {
        self.variance_zero = value;
        self
    }

    pub fn with_inconsistency_tol(mut self, value: f64) -> Self {
        self.inconsistency_tol = value;
        self
    }

    pub fn with_mode(mut self, mode: ResultsMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_transformation(mut self, kind: TransformationKind) -> Self {
        self.transformation = kind;
        self
    }

    pub fn diffuse_zero(&self) -> f64 {
        self.diffuse_zero
    }

    pub fn variance_zero(&self) -> f64 {
        self.variance_zero
    }

    pub fn inconsistency_tol(&self) -> f64 {
        self.inconsistency_tol
    }

    pub fn mode(&self) -> ResultsMode {
        self.mode
    }

    pub fn transformation(&self) -> TransformationKind {
        self.transformation
    }

    /// Validates this configuration.
    ///
    /// Every tolerance must be finite and strictly positive.
    pub fn validate(&self) -> Result<(), SsfError> {
        for (name, value) in [
            ("diffuse_zero", self.diffuse_zero),
            ("variance_zero", self.variance_zero),
            ("inconsistency_tol", self.inconsistency_tol),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SsfError::InvalidTolerance { name, value });
            }
        }
        Ok(())
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::new()
    }
}
