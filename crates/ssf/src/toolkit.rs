//! One-call entry points.
//!
//! Every call allocates its own augmented state and results stores, so
//! repeated calls (for example from an optimizer evaluating many parameter
//! vectors) never share mutable state.

use crate::config::{FilterConfig, ResultsMode};
use crate::data::SsfData;
use crate::error::SsfError;
use crate::filter::OrdinaryFilter;
use crate::initializer::DiffuseSquareRootInitializer;
use crate::likelihood::DiffuseLikelihood;
use crate::model::StateSpaceModel;
use crate::results::{DiffuseResults, FilterOutput, OrdinaryResults};
use crate::smoother::{DiffuseSquareRootSmoother, SmoothedStates};

/// Runs the diffuse initializer followed by the ordinary filter.
///
/// # Errors
///
/// [`SsfError::InvalidTolerance`] for a bad `config`, otherwise any error of
/// [`DiffuseSquareRootInitializer::initialize`] or [`OrdinaryFilter::process`].
pub fn filter<M: StateSpaceModel + ?Sized>(
    model: &M,
    data: &SsfData,
    config: &FilterConfig,
) -> Result<FilterOutput, SsfError> {
    config.validate()?;
    let mut diffuse = DiffuseResults::new(config.mode());
    let start = DiffuseSquareRootInitializer::new(config).initialize(model, data, &mut diffuse)?;
    let mut ordinary = OrdinaryResults::new(config.mode(), start.position());
    OrdinaryFilter::new(config).process(model, data, &start, &mut ordinary)?;
    Ok(FilterOutput::new(diffuse, start, ordinary))
}

/// Filters in full mode and smooths the whole series.
pub fn smooth<M: StateSpaceModel + ?Sized>(
    model: &M,
    data: &SsfData,
    config: &FilterConfig,
    with_covariance: bool,
) -> Result<SmoothedStates, SsfError> {
    let config = config.clone().with_mode(ResultsMode::Full);
    let output = filter(model, data, &config)?;
    DiffuseSquareRootSmoother::new(&config)
        .with_covariance(with_covariance)
        .smooth(model, &output)
}

/// Filters in light mode and returns the diffuse likelihood.
pub fn likelihood<M: StateSpaceModel + ?Sized>(
    model: &M,
    data: &SsfData,
    config: &FilterConfig,
) -> Result<DiffuseLikelihood, SsfError> {
    let config = config.clone().with_mode(ResultsMode::Light);
    let output = filter(model, data, &config)?;
    Ok(DiffuseLikelihood::from_output(&output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SsfModel;
    use approx::assert_abs_diff_eq;

    #[test]
    fn local_level_likelihood() {
        let model = SsfModel::local_level(1.0, 1.0).unwrap();
        let data = SsfData::new(vec![1.0, 2.0]).unwrap();
        let ll = likelihood(&model, &data, &FilterConfig::default()).unwrap();

        assert_eq!(ll.n_obs(), 2);
        assert_eq!(ll.n_diffuse(), 1);
        assert_abs_diff_eq!(ll.ssq(), 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ll.log_det(), 3.0_f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(ll.diffuse_correction(), 0.0, epsilon = 1e-12);
        let expected = -0.5 * ((2.0 * std::f64::consts::PI).ln() + 3.0_f64.ln() + 1.0 / 3.0);
        assert_abs_diff_eq!(ll.log_likelihood(), expected, epsilon = 1e-12);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let model = SsfModel::local_level(1.0, 1.0).unwrap();
        let data = SsfData::new(vec![1.0]).unwrap();
        let config = FilterConfig::default().with_variance_zero(-1.0);
        let err = filter(&model, &data, &config).unwrap_err();
        assert!(matches!(err, SsfError::InvalidTolerance { name: "variance_zero", .. }));
    }

    #[test]
    fn smooth_forces_full_mode() {
        let model = SsfModel::local_level(1.0, 1.0).unwrap();
        let data = SsfData::new(vec![1.0, 2.0]).unwrap();
        let config = FilterConfig::default().with_mode(ResultsMode::Light);
        let smoothed = smooth(&model, &data, &config, true).unwrap();
        assert_abs_diff_eq!(smoothed.mean(0)[0], 4.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn filter_works_through_trait_object() {
        let model = SsfModel::local_level(1.0, 0.0).unwrap();
        let dynamic: &dyn StateSpaceModel = &model;
        let data = SsfData::new(vec![f64::NAN, 2.0, f64::NAN, 4.0]).unwrap();
        let output = filter(dynamic, &data, &FilterConfig::default()).unwrap();
        assert_eq!(output.transition_index(), 2);
        assert_abs_diff_eq!(output.filtered(1).unwrap().a()[0], 2.0, epsilon = 1e-12);
    }
}
