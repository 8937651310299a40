//! Diffuse square-root initializer.
//!
//! Runs the exact diffuse forward recursion while the constraint basis `B`
//! still has columns. Each informative observation rotates `B` so that a
//! single column carries the whole projected loading `z = Z·B`; that column
//! is absorbed into the diffuse gain and dropped. The diffuse covariance
//! `B·Bᵗ` is never formed or inverted.
//!
//! ```text
//! t:      0        1        2        t*-1     t*
//!         ├────────┼────────┼── … ───┼────────┤
//! k:      d        d-1      d-1      1        0   → ordinary filter
//!         (missing observations leave k unchanged)
//! ```

use ndarray::Array1;
use tracing::{debug, info, warn};

use crate::config::FilterConfig;
use crate::data::SsfData;
use crate::error::SsfError;
use crate::linalg::{self, Transformation};
use crate::model::StateSpaceModel;
use crate::results::DiffuseResults;
use crate::state::{AugmentedState, State};
use crate::update::DiffuseUpdateInformation;

/// Hand-off from the diffuse to the ordinary phase.
#[derive(Debug, Clone, PartialEq)]
pub struct OrdinaryStart {
    position: usize,
    state: State,
}

impl OrdinaryStart {
    pub(crate) fn new(position: usize, state: State) -> Self {
        Self { position, state }
    }

    /// First time index `t*` of the ordinary phase.
    pub fn position(&self) -> usize {
        self.position
    }

    /// `(a(t*|t*-1), P(t*|t*-1))`.
    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn into_state(self) -> State {
        self.state
    }
}

/// Forward recursion over the diffuse prefix of a series.
///
/// # Example
///
/// ```
/// use kalmar_ssf::{DiffuseResults, DiffuseSquareRootInitializer, FilterConfig, SsfData, SsfModel};
///
/// let model = SsfModel::local_level(1.0, 0.0).unwrap();
/// let data = SsfData::new(vec![f64::NAN, 2.0, f64::NAN, 4.0]).unwrap();
/// let mut results = DiffuseResults::new(Default::default());
///
/// let start = DiffuseSquareRootInitializer::new(&FilterConfig::default())
///     .initialize(&model, &data, &mut results)
///     .unwrap();
/// assert_eq!(start.position(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct DiffuseSquareRootInitializer {
    diffuse_zero: f64,
    variance_zero: f64,
    inconsistency_tol: f64,
    transformation: Transformation,
}

impl DiffuseSquareRootInitializer {
    /// Creates an initializer with the tolerances and transformation of `config`.
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            diffuse_zero: config.diffuse_zero(),
            variance_zero: config.variance_zero(),
            inconsistency_tol: config.inconsistency_tol(),
            transformation: config.transformation().function(),
        }
    }

    /// Injects a custom orthogonal transformation.
    pub fn with_transformation(mut self, transformation: Transformation) -> Self {
        self.transformation = transformation;
        self
    }

    /// Runs the diffuse phase and returns the hand-off to the ordinary filter.
    ///
    /// Every processed step is appended to `results`.
    ///
    /// # Errors
    ///
    /// - [`SsfError::Inconsistent`] if an observation has zero ordinary and
    ///   diffuse variance but a nonzero prediction error.
    /// - [`SsfError::DiffuseInitializationFailed`] if diffuse directions
    ///   remain after the last observation.
    #[tracing::instrument(skip_all, fields(n = data.len(), d = model.diffuse_dim()))]
    pub fn initialize<M: StateSpaceModel + ?Sized>(
        &self,
        model: &M,
        data: &SsfData,
        results: &mut DiffuseResults,
    ) -> Result<OrdinaryStart, SsfError> {
        let n = data.len();
        let mut state = AugmentedState::from_model(model);
        let mut t = 0;
        while state.is_diffuse() {
            if t == n {
                warn!(remaining = state.diffuse_dim(), len = n, "diffuse directions left after last observation");
                return Err(SsfError::DiffuseInitializationFailed {
                    remaining: state.diffuse_dim(),
                    len: n,
                });
            }
            self.update(model, data, t, &mut state, results)?;
            results.save_filtered(&state);
            predict(model, t, &mut state);
            t += 1;
        }
        info!(t_star = t, "diffuse phase complete");
        Ok(OrdinaryStart::new(t, state.into_state()))
    }

    fn update<M: StateSpaceModel + ?Sized>(
        &self,
        model: &M,
        data: &SsfData,
        t: usize,
        state: &mut AugmentedState,
        results: &mut DiffuseResults,
    ) -> Result<(), SsfError> {
        let mut z = model.zm(t, state.b.view());
        let fi = zero_below(z.dot(&z), self.diffuse_zero);
        let f = zero_below(model.zvz(t, state.p.view()) + model.error_variance(t), self.variance_zero);
        let c = model.zm(t, state.p.view());

        if data.is_missing(t) {
            let info = DiffuseUpdateInformation {
                e: 0.0,
                f,
                fi,
                ci: Array1::zeros(c.len()),
                c,
                missing: true,
            };
            results.save(state, info);
            return Ok(());
        }

        let e = data.get(t) - model.zx(t, state.a.view());

        if fi == 0.0 {
            if f == 0.0 && e.abs() > self.inconsistency_tol {
                warn!(t, error = e, "observation contradicts a degenerate prediction");
                return Err(SsfError::Inconsistent { t, error: e });
            }
            let info = DiffuseUpdateInformation {
                e,
                f,
                fi,
                ci: Array1::zeros(c.len()),
                c,
                missing: false,
            };
            results.save(state, info.clone());
            if f > 0.0 {
                ordinary_update(state, &info);
            }
            return Ok(());
        }

        // The rotation works on a copy so that the stored record keeps B(t).
        let mut b = state.b.clone();
        (self.transformation)(z.view_mut(), b.view_mut());
        let ci = &b.column(0) * z[0];

        let info = DiffuseUpdateInformation {
            e,
            f,
            fi,
            c,
            ci,
            missing: false,
        };
        results.save(state, info.clone());
        state.b = b;
        state.drop_first_constraint();
        diffuse_update(state, &info);
        debug!(t, remaining = state.diffuse_dim(), "diffuse direction collapsed");
        Ok(())
    }
}

/// `P ← P − C·Cᵗ/f`, `a ← a + (e/f)·C`.
fn ordinary_update(state: &mut AugmentedState, info: &DiffuseUpdateInformation) {
    let c = info.c.view();
    linalg::add_outer(&mut state.p, -1.0 / info.f, c, c);
    linalg::symmetrize(&mut state.p);
    state.a.scaled_add(info.e / info.f, &c);
}

/// `P ← P − (C·Ciᵗ + Ci·Cᵗ)/fi + (f/fi²)·Ci·Ciᵗ`, `a ← a + (e/fi)·Ci`.
fn diffuse_update(state: &mut AugmentedState, info: &DiffuseUpdateInformation) {
    let (f, fi) = (info.f, info.fi);
    let (c, ci) = (info.c.view(), info.ci.view());
    linalg::add_outer(&mut state.p, -1.0 / fi, c, ci);
    linalg::add_outer(&mut state.p, -1.0 / fi, ci, c);
    linalg::add_outer(&mut state.p, f / (fi * fi), ci, ci);
    linalg::symmetrize(&mut state.p);
    state.a.scaled_add(info.e / fi, &ci);
}

/// `a ← T a`, `P ← T P Tᵗ + V`, `B ← T B`.
pub(crate) fn predict<M: StateSpaceModel + ?Sized>(model: &M, t: usize, state: &mut AugmentedState) {
    model.transition(t, state.a.view_mut());
    model.predict_covariance(t, &mut state.p);
    if state.is_diffuse() {
        model.transition_columns(t, &mut state.b);
    }
}

pub(crate) fn zero_below(value: f64, tolerance: f64) -> f64 {
    if value < tolerance { 0.0 } else { value }
}
