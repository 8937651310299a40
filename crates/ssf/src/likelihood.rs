//! Diffuse log-likelihood from the prediction-error decomposition.
//!
//! ```text
//! log L = −½ [ m·ln 2π + Σ e²/f + Σ ln f + Σ ln fi ]
//! ```
//!
//! The first two sums run over ordinary steps (`fi = 0`), the last over the
//! informative diffuse steps, and `m` is the number of informative
//! observations minus the number of diffuse steps. Observations with
//! `f = fi = 0` carry no information and are not counted.

use crate::results::FilterOutput;

const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Sufficient statistics of the diffuse likelihood.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffuseLikelihood {
    n_obs: usize,
    n_diffuse: usize,
    ssq: f64,
    log_det: f64,
    diffuse_correction: f64,
}

impl DiffuseLikelihood {
    pub(crate) fn new(n_obs: usize, n_diffuse: usize, ssq: f64, log_det: f64, diffuse_correction: f64) -> Self {
        Self {
            n_obs,
            n_diffuse,
            ssq,
            log_det,
            diffuse_correction,
        }
    }

    /// Accumulates the statistics over every step of a forward pass.
    ///
    /// Light-mode output is sufficient.
    pub fn from_output(output: &FilterOutput) -> Self {
        let (mut n_obs, mut n_diffuse) = (0, 0);
        let (mut ssq, mut log_det, mut diffuse_correction) = (0.0, 0.0, 0.0);
        for t in 0..output.len() {
            let Some((e, f, fi)) = output.prediction_error(t) else {
                continue;
            };
            if fi > 0.0 {
                n_obs += 1;
                n_diffuse += 1;
                diffuse_correction += fi.ln();
            } else if f > 0.0 {
                n_obs += 1;
                ssq += e * e / f;
                log_det += f.ln();
            }
        }
        Self::new(n_obs, n_diffuse, ssq, log_det, diffuse_correction)
    }

    /// Informative observations.
    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    /// Observations absorbed by the diffuse initialization.
    pub fn n_diffuse(&self) -> usize {
        self.n_diffuse
    }

    /// Sum of squared standardized prediction errors `Σ e²/f`.
    pub fn ssq(&self) -> f64 {
        self.ssq
    }

    /// `Σ ln f` over ordinary steps.
    pub fn log_det(&self) -> f64 {
        self.log_det
    }

    /// `Σ ln fi` over diffuse steps.
    pub fn diffuse_correction(&self) -> f64 {
        self.diffuse_correction
    }

    /// `n_obs − n_diffuse`.
    pub fn degrees_of_freedom(&self) -> usize {
        self.n_obs - self.n_diffuse
    }

    /// Diffuse log-likelihood with the variances taken as given.
    pub fn log_likelihood(&self) -> f64 {
        let m = self.degrees_of_freedom() as f64;
        -0.5 * (m * LN_2PI + self.ssq + self.log_det + self.diffuse_correction)
    }

    /// Maximum-likelihood scale factor `ssq / m` (0 when `m = 0`).
    pub fn sigma2(&self) -> f64 {
        match self.degrees_of_freedom() {
            0 => 0.0,
            m => self.ssq / m as f64,
        }
    }

    /// Log-likelihood with the scale factor concentrated out.
    pub fn concentrated_log_likelihood(&self) -> f64 {
        let m = self.degrees_of_freedom();
        if m == 0 {
            return -0.5 * (self.log_det + self.diffuse_correction);
        }
        let m = m as f64;
        -0.5 * (m * LN_2PI + m * self.sigma2().ln() + m + self.log_det + self.diffuse_correction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn ln_2pi_constant() {
        assert_abs_diff_eq!(LN_2PI, (2.0 * std::f64::consts::PI).ln(), epsilon = 1e-15);
    }

    #[test]
    fn hand_computed_values() {
        let ll = DiffuseLikelihood::new(4, 1, 3.0, 0.5, 0.2);
        assert_eq!(ll.degrees_of_freedom(), 3);
        assert_abs_diff_eq!(ll.sigma2(), 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(ll.log_likelihood(), -0.5 * (3.0 * LN_2PI + 3.7), epsilon = 1e-12);
        // sigma2 = 1: the concentrated form differs only by m - ssq = 0.
        assert_abs_diff_eq!(ll.concentrated_log_likelihood(), ll.log_likelihood(), epsilon = 1e-12);
    }

    #[test]
    fn no_degrees_of_freedom() {
        let ll = DiffuseLikelihood::new(2, 2, 0.0, 0.0, 1.0);
        assert_eq!(ll.sigma2(), 0.0);
        assert_abs_diff_eq!(ll.concentrated_log_likelihood(), -0.5, epsilon = 1e-15);
    }
}
