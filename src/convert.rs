//! Pure conversion functions: TOML config structs -> crate API types.

use anyhow::{Context, Result, bail};

use kalmar_ssf::{FilterConfig, ResultsMode, SsfData, SsfModel, TransformationKind};

use crate::config::{FilterToml, ModelToml, RunConfig};

/// Parses an orthogonal transformation name into the corresponding enum variant.
pub fn parse_transformation(s: &str) -> Result<TransformationKind> {
    match s.to_lowercase().as_str() {
        "givens" => Ok(TransformationKind::Givens),
        "householder" => Ok(TransformationKind::Householder),
        other => bail!("unknown transformation: {other:?}"),
    }
}

/// Builds a [`FilterConfig`] from the TOML filter section.
///
/// Full mode is always requested since every command reads the state records.
pub fn build_filter_config(filter: &FilterToml) -> Result<FilterConfig> {
    let transformation = parse_transformation(&filter.transformation)?;
    let cfg = FilterConfig::new()
        .with_diffuse_zero(filter.diffuse_zero)
        .with_variance_zero(filter.variance_zero)
        .with_inconsistency_tol(filter.inconsistency_tol)
        .with_transformation(transformation)
        .with_mode(ResultsMode::Full);
    cfg.validate().context("invalid [filter] section")?;
    Ok(cfg)
}

/// Builds an [`SsfModel`] from the TOML model section.
pub fn build_model(model: &ModelToml) -> Result<SsfModel> {
    let built = match *model {
        ModelToml::LocalLevel { q, h } => SsfModel::local_level(q, h),
        ModelToml::LocalLinearTrend { q_level, q_slope, h } => {
            SsfModel::local_linear_trend(q_level, q_slope, h)
        }
        ModelToml::LevelSeasonal {
            period,
            q_level,
            q_seasonal,
            h,
        } => SsfModel::level_seasonal(period, q_level, q_seasonal, h),
        ModelToml::Ar1 { phi, q, h } => SsfModel::ar1(phi, q, h),
    };
    built.context("invalid [model] section")
}

/// Wraps the observation list into [`SsfData`].
pub fn build_data(config: &RunConfig) -> Result<SsfData> {
    SsfData::new(config.observations.clone()).context("invalid observations")
}
