use serde::Deserialize;

/// Top-level run description.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Model specification.
    pub model: ModelToml,

    /// Filter tolerances and options.
    #[serde(default)]
    pub filter: FilterToml,

    /// Observed series; `nan` marks a missing value.
    pub observations: Vec<f64>,

    /// Whether smoothed covariances are computed.
    #[serde(default = "default_true")]
    pub covariance: bool,
}

/// Model kinds available from the command line.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelToml {
    LocalLevel {
        q: f64,
        h: f64,
    },
    LocalLinearTrend {
        q_level: f64,
        q_slope: f64,
        h: f64,
    },
    LevelSeasonal {
        period: usize,
        q_level: f64,
        q_seasonal: f64,
        h: f64,
    },
    Ar1 {
        phi: f64,
        q: f64,
        h: f64,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterToml {
    #[serde(default = "default_diffuse_zero")]
    pub diffuse_zero: f64,
    #[serde(default = "default_variance_zero")]
    pub variance_zero: f64,
    #[serde(default = "default_inconsistency_tol")]
    pub inconsistency_tol: f64,
    #[serde(default = "default_transformation")]
    pub transformation: String,
}

impl Default for FilterToml {
    fn default() -> Self {
        Self {
            diffuse_zero: default_diffuse_zero(),
            variance_zero: default_variance_zero(),
            inconsistency_tol: default_inconsistency_tol(),
            transformation: default_transformation(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_diffuse_zero() -> f64 {
    1e-9
}
fn default_variance_zero() -> f64 {
    1e-13
}
fn default_inconsistency_tol() -> f64 {
    1e-9
}
fn default_transformation() -> String {
    "givens".to_string()
}
