//! Per-step prediction-error information.
//!
//! Each forward step produces one of these records: the one-step-ahead
//! prediction error, its variance, and the gain vector used to correct the
//! state. The diffuse variant adds the variance carried by the diffuse
//! subspace and its own gain.

use ndarray::Array1;

/// Prediction-error information for an ordinary step.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateInformation {
    pub(crate) e: f64,
    pub(crate) f: f64,
    pub(crate) c: Array1<f64>,
    pub(crate) missing: bool,
}

impl UpdateInformation {
    /// Prediction error `e = y − Z a` (0 for a missing observation).
    pub fn e(&self) -> f64 {
        self.e
    }

    /// Prediction-error variance `f = Z P Zᵗ + h`.
    pub fn f(&self) -> f64 {
        self.f
    }

    /// Gain `C = P Zᵗ`.
    pub fn c(&self) -> &Array1<f64> {
        &self.c
    }

    pub fn is_missing(&self) -> bool {
        self.missing
    }

    /// Standardized prediction error `e / √f`, `None` when missing or `f = 0`.
    pub fn standardized(&self) -> Option<f64> {
        if self.missing || self.f <= 0.0 {
            None
        } else {
            Some(self.e / self.f.sqrt())
        }
    }
}

/// Prediction-error information for a diffuse step.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffuseUpdateInformation {
    pub(crate) e: f64,
    pub(crate) f: f64,
    pub(crate) fi: f64,
    pub(crate) c: Array1<f64>,
    pub(crate) ci: Array1<f64>,
    pub(crate) missing: bool,
}

impl DiffuseUpdateInformation {
    pub fn e(&self) -> f64 {
        self.e
    }

    /// Ordinary variance `f = Z P Zᵗ + h`.
    pub fn f(&self) -> f64 {
        self.f
    }

    /// Diffuse variance `fi = ‖Z B‖²`.
    pub fn fi(&self) -> f64 {
        self.fi
    }

    /// Ordinary gain `C = P Zᵗ`.
    pub fn c(&self) -> &Array1<f64> {
        &self.c
    }

    /// Diffuse gain `Ci = B Bᵗ Zᵗ` (zero when `fi = 0`).
    pub fn ci(&self) -> &Array1<f64> {
        &self.ci
    }

    pub fn is_missing(&self) -> bool {
        self.missing
    }

    /// `true` when the observation was present and the diffuse subspace saw it.
    pub fn is_diffuse(&self) -> bool {
        !self.missing && self.fi > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn standardized_error() {
        let u = UpdateInformation {
            e: 2.0,
            f: 4.0,
            c: array![1.0],
            missing: false,
        };
        assert_abs_diff_eq!(u.standardized().unwrap(), 1.0, epsilon = 1e-15);

        let missing = UpdateInformation { missing: true, ..u.clone() };
        assert!(missing.standardized().is_none());

        let degenerate = UpdateInformation { f: 0.0, ..u };
        assert!(degenerate.standardized().is_none());
    }

    #[test]
    fn diffuse_flag() {
        let u = DiffuseUpdateInformation {
            e: 0.0,
            f: 1.0,
            fi: 2.0,
            c: array![1.0],
            ci: array![2.0],
            missing: false,
        };
        assert!(u.is_diffuse());
        assert!(!DiffuseUpdateInformation { missing: true, ..u.clone() }.is_diffuse());
        assert!(!DiffuseUpdateInformation { fi: 0.0, ..u }.is_diffuse());
    }
}
