//! Ordinary Kalman filter for the non-diffuse tail of a series.

use tracing::{debug, warn};

use crate::config::FilterConfig;
use crate::data::SsfData;
use crate::error::SsfError;
use crate::initializer::{OrdinaryStart, zero_below};
use crate::linalg;
use crate::model::StateSpaceModel;
use crate::results::OrdinaryResults;
use crate::state::State;
use crate::update::UpdateInformation;

/// Univariate Kalman filter started from a known state.
#[derive(Debug, Clone)]
pub struct OrdinaryFilter {
    variance_zero: f64,
    inconsistency_tol: f64,
}

impl OrdinaryFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            variance_zero: config.variance_zero(),
            inconsistency_tol: config.inconsistency_tol(),
        }
    }

    /// Filters `[start.position(), n)` and returns the state predicted for `n`.
    ///
    /// # Errors
    ///
    /// [`SsfError::Inconsistent`] when an observation has zero prediction
    /// variance but a nonzero prediction error.
    #[tracing::instrument(skip_all, fields(start = start.position(), n = data.len()))]
    pub fn process<M: StateSpaceModel + ?Sized>(
        &self,
        model: &M,
        data: &SsfData,
        start: &OrdinaryStart,
        results: &mut OrdinaryResults,
    ) -> Result<State, SsfError> {
        let mut state = start.state().clone();
        for t in start.position()..data.len() {
            let info = self.update(model, data, t, &state)?;
            results.save(&state, info.clone());
            if !info.missing && info.f > 0.0 {
                let c = info.c.view();
                linalg::add_outer(&mut state.p, -1.0 / info.f, c, c);
                linalg::symmetrize(&mut state.p);
                state.a.scaled_add(info.e / info.f, &c);
            }
            results.save_filtered(&state);

            model.transition(t, state.a.view_mut());
            model.predict_covariance(t, &mut state.p);
        }
        debug!(steps = results.len(), "ordinary filter done");
        Ok(state)
    }

    fn update<M: StateSpaceModel + ?Sized>(
        &self,
        model: &M,
        data: &SsfData,
        t: usize,
        state: &State,
    ) -> Result<UpdateInformation, SsfError> {
        let f = zero_below(model.zvz(t, state.p.view()) + model.error_variance(t), self.variance_zero);
        let c = model.zm(t, state.p.view());
        if data.is_missing(t) {
            return Ok(UpdateInformation {
                e: 0.0,
                f,
                c,
                missing: true,
            });
        }
        let e = data.get(t) - model.zx(t, state.a.view());
        if f == 0.0 && e.abs() > self.inconsistency_tol {
            warn!(t, error = e, "observation contradicts a degenerate prediction");
            return Err(SsfError::Inconsistent { t, error: e });
        }
        Ok(UpdateInformation {
            e,
            f,
            c,
            missing: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResultsMode;
    use crate::model::SsfModel;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn ar1_first_steps() {
        let model = SsfModel::ar1(0.5, 1.0, 0.0).unwrap();
        let data = SsfData::new(vec![1.0, f64::NAN, 2.0]).unwrap();
        let start = OrdinaryStart::new(0, State::from_model(&model));
        let mut results = OrdinaryResults::new(ResultsMode::Full, 0);
        let last = OrdinaryFilter::new(&FilterConfig::default())
            .process(&model, &data, &start, &mut results)
            .unwrap();

        // t=0: noiseless observation pins the state exactly.
        let u0 = results.update(0).unwrap();
        assert_abs_diff_eq!(u0.e(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(u0.f(), 4.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(results.filtered(0).unwrap().a()[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(results.filtered(0).unwrap().p()[[0, 0]], 0.0, epsilon = 1e-12);

        // t=1 missing: a = 0.5, P = 1.
        assert!(results.update(1).unwrap().is_missing());
        assert_abs_diff_eq!(results.predicted(1).unwrap().a()[0], 0.5, epsilon = 1e-12);

        // t=2: a = 0.25, P = 0.25 + 1.
        let u2 = results.update(2).unwrap();
        assert_abs_diff_eq!(u2.e(), 1.75, epsilon = 1e-12);
        assert_abs_diff_eq!(u2.f(), 1.25, epsilon = 1e-12);

        // Predicted for t=3: the observation at t=2 was exact.
        assert_abs_diff_eq!(last.a()[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(last.p()[[0, 0]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_prediction_is_inconsistent() {
        let model = SsfModel::ar1(0.5, 0.0, 0.0).unwrap();
        let data = SsfData::new(vec![0.0, 1.0]).unwrap();
        // Zero noise everywhere: f = 0 at every step, so only e = 0 is admissible.
        let start = OrdinaryStart::new(0, State::new(array![0.0], array![[0.0]]));
        let mut results = OrdinaryResults::new(ResultsMode::Light, 0);
        let err = OrdinaryFilter::new(&FilterConfig::default())
            .process(&model, &data, &start, &mut results)
            .unwrap_err();
        assert_eq!(err, SsfError::Inconsistent { t: 1, error: 1.0 });
        assert_eq!(results.len(), 1);
    }
}
