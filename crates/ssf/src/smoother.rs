//! Backward smoothing recursions.
//!
//! The ordinary tail `[t*, n)` is smoothed with the classical recursion on
//! the residual `R` and its precision `N`. The diffuse prefix `[0, t*)`
//! additionally carries the diffuse residual `Ri` and the precisions `N1`
//! (cross term, not symmetric) and `N2`:
//!
//! ```text
//! â(t) = a(t|t-1) + P·R + Pinf·Ri
//! V(t) = P − P·N·P − (Pinf·N1·P + P·N1ᵗ·Pinf) − Pinf·N2·Pinf,    Pinf = B·Bᵗ
//! ```
//!
//! The transition is applied separately from the observation update, so the
//! gains below are written without `T`: with `z = Zᵗ`, an ordinary step uses
//! `L = I − C·zᵗ/f` and a diffuse step uses `L0 = I − Ci·zᵗ/fi` together with
//! `L1 = −(C/fi − Ci·f/fi²)·zᵗ`. All products with these rank-one
//! corrections are expanded instead of forming the `L` matrices.

use ndarray::{Array1, Array2};
use tracing::debug;

use crate::config::FilterConfig;
use crate::error::SsfError;
use crate::linalg::{self, add_outer};
use crate::model::StateSpaceModel;
use crate::results::{FilterOutput, OrdinaryResults};
use crate::update::{DiffuseUpdateInformation, UpdateInformation};

/// Smoothed means and (optionally) covariances for every time index.
#[derive(Debug, Clone)]
pub struct SmoothedStates {
    means: Vec<Array1<f64>>,
    covariances: Option<Vec<Array2<f64>>>,
}

impl SmoothedStates {
    fn with_len(n: usize, dim: usize, with_covariance: bool) -> Self {
        Self {
            means: vec![Array1::zeros(dim); n],
            covariances: with_covariance.then(|| vec![Array2::zeros((dim, dim)); n]),
        }
    }

    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    /// Smoothed mean `E[a(t) | y]`.
    pub fn mean(&self, t: usize) -> &Array1<f64> {
        &self.means[t]
    }

    /// Smoothed covariance `Var[a(t) | y]`, if it was computed.
    pub fn covariance(&self, t: usize) -> Option<&Array2<f64>> {
        self.covariances.as_ref().map(|v| &v[t])
    }

    pub fn means(&self) -> &[Array1<f64>] {
        &self.means
    }

    pub fn covariances(&self) -> Option<&[Array2<f64>]> {
        self.covariances.as_deref()
    }

    /// Smoothed trajectory of state component `i`.
    pub fn component(&self, i: usize) -> Vec<f64> {
        self.means.iter().map(|m| m[i]).collect()
    }

    /// Smoothed variance of state component `i`, if covariances were computed.
    pub fn component_variance(&self, i: usize) -> Option<Vec<f64>> {
        self.covariances
            .as_ref()
            .map(|v| v.iter().map(|p| p[[i, i]]).collect())
    }

    fn set(&mut self, t: usize, mean: Array1<f64>, covariance: Option<Array2<f64>>) {
        self.means[t] = mean;
        if let (Some(all), Some(v)) = (self.covariances.as_mut(), covariance) {
            all[t] = v;
        }
    }
}

/// Backward quantities carried from `t` to `t − 1`.
#[derive(Debug, Clone)]
struct BackwardState {
    r: Array1<f64>,
    n: Array2<f64>,
    ri: Array1<f64>,
    n1: Array2<f64>,
    n2: Array2<f64>,
}

impl BackwardState {
    fn new(dim: usize) -> Self {
        Self {
            r: Array1::zeros(dim),
            n: Array2::zeros((dim, dim)),
            ri: Array1::zeros(dim),
            n1: Array2::zeros((dim, dim)),
            n2: Array2::zeros((dim, dim)),
        }
    }

    /// Pulls every quantity back through `T(t)`: `R ← Tᵗ R`, `N ← Tᵗ N T`, ...
    fn retro<M: StateSpaceModel + ?Sized>(&mut self, model: &M, t: usize, diffuse: bool) {
        model.transition_transposed(t, self.r.view_mut());
        model.retro_precision(t, &mut self.n);
        if diffuse {
            model.transition_transposed(t, self.ri.view_mut());
            model.retro_precision(t, &mut self.n1);
            model.retro_precision(t, &mut self.n2);
        }
    }

    /// Observation step with `fi = 0`, gain `k = C/f`.
    fn ordinary(&mut self, z: &Array1<f64>, e: f64, f: f64, c: &Array1<f64>, diffuse: bool) {
        let k = c / f;
        // R ← z·e/f + Lᵗ R
        let kr = linalg::dot(&k, &self.r);
        self.r.scaled_add(e / f - kr, z);
        // N ← z·zᵗ/f + Lᵗ N L
        let mut n = sandwich(&self.n, &k, &k, z);
        add_outer(&mut n, 1.0 / f, z.view(), z.view());
        linalg::symmetrize(&mut n);
        self.n = n;
        if diffuse {
            // N1 ← N1 L
            let n1k = self.n1.dot(&k);
            add_outer(&mut self.n1, -1.0, n1k.view(), z.view());
        }
    }

    /// Observation step with `fi > 0`.
    fn diffuse(&mut self, z: &Array1<f64>, info: &DiffuseUpdateInformation) {
        let (e, f, fi) = (info.e, info.f, info.fi);
        let k0 = &info.ci / fi;
        let k1 = &info.c / fi - &(&info.ci * (f / (fi * fi)));

        // Ri ← z·e/fi + L1ᵗ R + L0ᵗ Ri
        let k1r = linalg::dot(&k1, &self.r);
        let k0ri = linalg::dot(&k0, &self.ri);
        self.ri.scaled_add(e / fi - k1r - k0ri, z);
        // R ← L0ᵗ R
        let k0r = linalg::dot(&k0, &self.r);
        self.r.scaled_add(-k0r, z);

        let (n, n1, n2) = (&self.n, &self.n1, &self.n2);

        // N2 ← −(f/fi²) z·zᵗ + L0ᵗ N2 L0 + L0ᵗ N1 L1 + L1ᵗ N1ᵗ L0 + L1ᵗ N L1
        let mut new_n2 = sandwich(n2, &k0, &k0, z);
        let cross = l0t_m_l1(n1, &k0, &k1, z);
        new_n2 += &cross;
        new_n2 += &cross.t();
        let k1nk1 = k1.dot(&n.dot(&k1));
        add_outer(&mut new_n2, k1nk1 - f / (fi * fi), z.view(), z.view());
        linalg::symmetrize(&mut new_n2);

        // N1 ← z·zᵗ/fi + L0ᵗ N1 L0 + L1ᵗ N L0
        let mut new_n1 = sandwich(n1, &k0, &k0, z);
        new_n1 += &l1t_m_l0(n, &k1, &k0, z);
        add_outer(&mut new_n1, 1.0 / fi, z.view(), z.view());

        // N ← L0ᵗ N L0
        let mut new_n = sandwich(n, &k0, &k0, z);
        linalg::symmetrize(&mut new_n);

        self.n = new_n;
        self.n1 = new_n1;
        self.n2 = new_n2;
    }
}

/// `(I − z·kaᵗ)·m·(I − kb·zᵗ)`.
fn sandwich(m: &Array2<f64>, ka: &Array1<f64>, kb: &Array1<f64>, z: &Array1<f64>) -> Array2<f64> {
    let kam = ka.dot(m);
    let mkb = m.dot(kb);
    let s = linalg::dot(&kam, kb);
    let mut out = m.clone();
    add_outer(&mut out, -1.0, z.view(), kam.view());
    add_outer(&mut out, -1.0, mkb.view(), z.view());
    add_outer(&mut out, s, z.view(), z.view());
    out
}

/// `L1ᵗ·m·L0 = −z·(k1ᵗ m) + (k1ᵗ m k0)·z·zᵗ`.
fn l1t_m_l0(m: &Array2<f64>, k1: &Array1<f64>, k0: &Array1<f64>, z: &Array1<f64>) -> Array2<f64> {
    let k1m = k1.dot(m);
    let s = linalg::dot(&k1m, k0);
    let mut out = Array2::zeros(m.raw_dim());
    add_outer(&mut out, -1.0, z.view(), k1m.view());
    add_outer(&mut out, s, z.view(), z.view());
    out
}

/// `L0ᵗ·m·L1 = −(m k1)·zᵗ + (k0ᵗ m k1)·z·zᵗ`.
fn l0t_m_l1(m: &Array2<f64>, k0: &Array1<f64>, k1: &Array1<f64>, z: &Array1<f64>) -> Array2<f64> {
    let mk1 = m.dot(k1);
    let s = linalg::dot(k0, &mk1);
    let mut out = Array2::zeros(m.raw_dim());
    add_outer(&mut out, -1.0, mk1.view(), z.view());
    add_outer(&mut out, s, z.view(), z.view());
    out
}

/// `P − P·N·P`, symmetrized.
fn ordinary_variance(p: &Array2<f64>, n: &Array2<f64>) -> Array2<f64> {
    let mut v = p - &p.dot(n).dot(p);
    linalg::symmetrize(&mut v);
    v
}

fn clamp_diagonal(v: &mut Array2<f64>, tolerance: f64) {
    for d in v.diag_mut() {
        if d.abs() < tolerance {
            *d = 0.0;
        }
    }
}

/// Classical fixed-interval smoother over an ordinary results store.
#[derive(Debug, Clone)]
pub struct OrdinarySmoother {
    with_covariance: bool,
    variance_zero: f64,
}

impl OrdinarySmoother {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            with_covariance: true,
            variance_zero: config.variance_zero(),
        }
    }

    pub fn with_covariance(mut self, yes: bool) -> Self {
        self.with_covariance = yes;
        self
    }

    /// Smooths `[results.start(), results.end())`.
    ///
    /// Entries before `results.start()` are left at zero.
    ///
    /// # Errors
    ///
    /// [`SsfError::StatesNotRetained`] for light-mode results.
    pub fn smooth<M: StateSpaceModel + ?Sized>(
        &self,
        model: &M,
        results: &OrdinaryResults,
    ) -> Result<SmoothedStates, SsfError> {
        if !results.has_states() {
            return Err(SsfError::StatesNotRetained);
        }
        let mut out = SmoothedStates::with_len(results.end(), model.dim(), self.with_covariance);
        let mut backward = BackwardState::new(model.dim());
        self.run(model, results, results.end(), &mut backward, &mut out)?;
        Ok(out)
    }

    fn run<M: StateSpaceModel + ?Sized>(
        &self,
        model: &M,
        results: &OrdinaryResults,
        n: usize,
        backward: &mut BackwardState,
        out: &mut SmoothedStates,
    ) -> Result<(), SsfError> {
        let dim = model.dim();
        for t in (results.start()..results.end()).rev() {
            let update: &UpdateInformation = results.update(t).ok_or(SsfError::MissingRecord { t })?;
            let state = results.predicted(t).ok_or(SsfError::MissingRecord { t })?;
            if t + 1 < n {
                backward.retro(model, t, false);
            }
            if !update.missing && update.f > 0.0 {
                let z = model.row(t, dim);
                backward.ordinary(&z, update.e, update.f, &update.c, false);
            }

            let mean = &state.a + &state.p.dot(&backward.r);
            let covariance = self.with_covariance.then(|| {
                let mut v = ordinary_variance(&state.p, &backward.n);
                clamp_diagonal(&mut v, self.variance_zero);
                v
            });
            out.set(t, mean, covariance);
        }
        Ok(())
    }
}

/// Smoother for a complete forward pass, diffuse prefix included.
///
/// # Example
///
/// ```
/// use kalmar_ssf::{DiffuseSquareRootSmoother, FilterConfig, SsfData, SsfModel, toolkit};
///
/// let model = SsfModel::local_level(1.0, 0.0).unwrap();
/// let data = SsfData::new(vec![f64::NAN, 2.0, f64::NAN, 4.0]).unwrap();
/// let config = FilterConfig::default();
/// let output = toolkit::filter(&model, &data, &config).unwrap();
///
/// let smoothed = DiffuseSquareRootSmoother::new(&config).smooth(&model, &output).unwrap();
/// assert_eq!(smoothed.component(0), vec![2.0, 2.0, 3.0, 4.0]);
/// ```
#[derive(Debug, Clone)]
pub struct DiffuseSquareRootSmoother {
    ordinary: OrdinarySmoother,
    with_covariance: bool,
    variance_zero: f64,
}

impl DiffuseSquareRootSmoother {
    /// Creates a smoother that also computes covariances.
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            ordinary: OrdinarySmoother::new(config),
            with_covariance: true,
            variance_zero: config.variance_zero(),
        }
    }

    pub fn with_covariance(mut self, yes: bool) -> Self {
        self.ordinary = self.ordinary.with_covariance(yes);
        self.with_covariance = yes;
        self
    }

    /// Smooths every time index of `output`.
    ///
    /// # Errors
    ///
    /// - [`SsfError::StatesNotRetained`] if `output` was filtered in light mode.
    /// - [`SsfError::MissingRecord`] if a forward record is absent.
    #[tracing::instrument(skip_all, fields(n = output.len(), t_star = output.transition_index()))]
    pub fn smooth<M: StateSpaceModel + ?Sized>(
        &self,
        model: &M,
        output: &FilterOutput,
    ) -> Result<SmoothedStates, SsfError> {
        if !output.has_states() {
            return Err(SsfError::StatesNotRetained);
        }
        let n = output.len();
        let dim = model.dim();
        let mut out = SmoothedStates::with_len(n, dim, self.with_covariance);
        let mut backward = BackwardState::new(dim);

        self.ordinary.run(model, output.ordinary(), n, &mut backward, &mut out)?;

        let diffuse = output.diffuse();
        for t in (0..output.transition_index()).rev() {
            let update = diffuse.update(t).ok_or(SsfError::MissingRecord { t })?;
            let state = diffuse.predicted(t).ok_or(SsfError::MissingRecord { t })?;
            if t + 1 < n {
                backward.retro(model, t, true);
            }
            if !update.missing {
                let z = model.row(t, dim);
                if update.fi > 0.0 {
                    backward.diffuse(&z, update);
                } else if update.f > 0.0 {
                    backward.ordinary(&z, update.e, update.f, &update.c, true);
                }
            }

            let b = state.b();
            let pinf_ri = b.dot(&b.t().dot(&backward.ri));
            let mean = &state.a + &state.p.dot(&backward.r) + &pinf_ri;
            let covariance = self
                .with_covariance
                .then(|| self.diffuse_variance(state.p(), &state.pinf(), &backward));
            out.set(t, mean, covariance);
        }
        debug!(steps = output.transition_index(), "diffuse prefix smoothed");
        Ok(out)
    }

    fn diffuse_variance(&self, p: &Array2<f64>, pinf: &Array2<f64>, backward: &BackwardState) -> Array2<f64> {
        let mut v = p - &p.dot(&backward.n).dot(p);
        let cross = pinf.dot(&backward.n1).dot(p);
        v -= &cross;
        v -= &cross.t();
        v -= &pinf.dot(&backward.n2).dot(pinf);
        linalg::symmetrize(&mut v);
        clamp_diagonal(&mut v, self.variance_zero);
        v
    }
}

/// Smoothed observation `Z(t)·â(t)`, used to re-filter smoothed trajectories.
pub fn smoothed_signal<M: StateSpaceModel + ?Sized>(model: &M, smoothed: &SmoothedStates) -> Vec<f64> {
    smoothed
        .means()
        .iter()
        .enumerate()
        .map(|(t, a)| model.zx(t, a.view()))
        .collect()
}
