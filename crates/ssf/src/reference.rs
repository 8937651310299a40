//! Reference diffuse initializer with an explicit diffuse covariance.
//!
//! Carries `Pinf = B·Bᵗ` as a full matrix and collapses it by direct
//! subtraction, `Pinf ← Pinf − Ci·Ciᵗ / fi`. Numerically weaker than the
//! square-root form, but straightforward enough to cross-check it.

use ndarray::{Array1, Array2};
use tracing::{debug, warn};

use crate::config::FilterConfig;
use crate::data::SsfData;
use crate::error::SsfError;
use crate::initializer::{OrdinaryStart, zero_below};
use crate::linalg;
use crate::model::StateSpaceModel;
use crate::state::State;
use crate::update::DiffuseUpdateInformation;

/// Diffuse initializer propagating `Pinf` directly.
#[derive(Debug, Clone)]
pub struct ReferenceInitializer {
    diffuse_zero: f64,
    variance_zero: f64,
    inconsistency_tol: f64,
}

impl ReferenceInitializer {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            diffuse_zero: config.diffuse_zero(),
            variance_zero: config.variance_zero(),
            inconsistency_tol: config.inconsistency_tol(),
        }
    }

    /// Runs the diffuse phase, appending one record per step to `updates`.
    ///
    /// The phase ends when the trace of `Pinf` drops below `diffuse_zero`.
    ///
    /// # Errors
    ///
    /// Same conditions as
    /// [`DiffuseSquareRootInitializer::initialize`](crate::DiffuseSquareRootInitializer::initialize).
    #[tracing::instrument(skip_all, fields(n = data.len()))]
    pub fn initialize<M: StateSpaceModel + ?Sized>(
        &self,
        model: &M,
        data: &SsfData,
        updates: &mut Vec<DiffuseUpdateInformation>,
    ) -> Result<OrdinaryStart, SsfError> {
        let n = data.len();
        let b0 = model.diffuse_constraints();
        let mut pinf = b0.dot(&b0.t());
        let mut a = model.a0();
        let mut p = model.pf0();

        let mut t = 0;
        while pinf.diag().sum() >= self.diffuse_zero {
            if t == n {
                let remaining = rank_estimate(&pinf, self.diffuse_zero);
                warn!(remaining, len = n, "diffuse directions left after last observation");
                return Err(SsfError::DiffuseInitializationFailed { remaining, len: n });
            }

            let ci = model.zm(t, pinf.view());
            let fi = zero_below(model.zx(t, ci.view()), self.diffuse_zero);
            let f = zero_below(model.zvz(t, p.view()) + model.error_variance(t), self.variance_zero);
            let c = model.zm(t, p.view());

            let missing = data.is_missing(t);
            let e = if missing { 0.0 } else { data.get(t) - model.zx(t, a.view()) };

            if !missing {
                if fi > 0.0 {
                    linalg::add_outer(&mut p, -1.0 / fi, c.view(), ci.view());
                    linalg::add_outer(&mut p, -1.0 / fi, ci.view(), c.view());
                    linalg::add_outer(&mut p, f / (fi * fi), ci.view(), ci.view());
                    linalg::add_outer(&mut pinf, -1.0 / fi, ci.view(), ci.view());
                    a.scaled_add(e / fi, &ci);
                    linalg::symmetrize(&mut pinf);
                    debug!(t, "diffuse direction collapsed");
                } else if f > 0.0 {
                    linalg::add_outer(&mut p, -1.0 / f, c.view(), c.view());
                    a.scaled_add(e / f, &c);
                } else if e.abs() > self.inconsistency_tol {
                    warn!(t, error = e, "observation contradicts a degenerate prediction");
                    return Err(SsfError::Inconsistent { t, error: e });
                }
                linalg::symmetrize(&mut p);
            }

            updates.push(DiffuseUpdateInformation {
                e,
                f,
                fi,
                ci: if fi > 0.0 && !missing { ci } else { Array1::zeros(c.len()) },
                c,
                missing,
            });

            model.transition(t, a.view_mut());
            model.predict_covariance(t, &mut p);
            model.transition_columns(t, &mut pinf);
            model.transition_rows(t, &mut pinf);
            t += 1;
        }
        Ok(OrdinaryStart::new(t, State::new(a, p)))
    }
}

/// Number of diagonal entries of `pinf` above `tolerance`, at least 1.
fn rank_estimate(pinf: &Array2<f64>, tolerance: f64) -> usize {
    pinf.diag().iter().filter(|&&v| v >= tolerance).count().max(1)
}
