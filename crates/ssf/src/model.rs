//! State-space model contract and the data-driven [`SsfModel`].
//!
//! A model is described by three small capabilities rather than a single
//! monolithic type:
//!
//! ```text
//! a[t+1] = T a[t] + η[t],      η[t] ~ N(0, V)        (Dynamics)
//! y[t]   = Z a[t] + ε[t],      ε[t] ~ N(0, h)        (Loading)
//! a[0]   = a0 + B0 δ + u,      u ~ N(0, Pf0), δ ~ N(0, κ I), κ → ∞
//!                                                   (Initialization)
//! ```
//!
//! The filter only ever *applies* `T` and `Z`; it never asks for them as
//! materialized matrices. Implementations with sparse or structured
//! transitions can therefore provide cheaper operators than a dense product.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1};

use crate::error::SsfError;

/// Initial distribution of the state.
pub trait Initialization {
    /// State dimension `r`.
    fn dim(&self) -> usize;

    /// Number of diffuse directions `d` (`0 ≤ d ≤ r`).
    fn diffuse_dim(&self) -> usize;

    /// Initial mean `a0` (length `r`).
    fn a0(&self) -> Array1<f64>;

    /// Covariance of the non-diffuse part of the initial state (`r × r`).
    fn pf0(&self) -> Array2<f64>;

    /// Diffuse constraints `B0` (`r × d`); `B0·B0ᵗ` is the diffuse covariance.
    fn diffuse_constraints(&self) -> Array2<f64>;
}

/// State transition `a[t+1] = T a[t] + η[t]`.
pub trait Dynamics {
    /// `x ← T(t)·x`.
    fn transition(&self, t: usize, x: ArrayViewMut1<'_, f64>);

    /// `x ← T(t)ᵗ·x`.
    fn transition_transposed(&self, t: usize, x: ArrayViewMut1<'_, f64>);

    /// `p ← p + V(t)`.
    fn add_state_noise(&self, t: usize, p: &mut Array2<f64>);

    /// `m ← T(t)·m`.
    fn transition_columns(&self, t: usize, m: &mut Array2<f64>) {
        for col in m.columns_mut() {
            self.transition(t, col);
        }
    }

    /// `m ← m·T(t)ᵗ`.
    fn transition_rows(&self, t: usize, m: &mut Array2<f64>) {
        for row in m.rows_mut() {
            self.transition(t, row);
        }
    }

    /// `m ← T(t)ᵗ·m`.
    fn transposed_columns(&self, t: usize, m: &mut Array2<f64>) {
        for col in m.columns_mut() {
            self.transition_transposed(t, col);
        }
    }

    /// `m ← m·T(t)`.
    fn transposed_rows(&self, t: usize, m: &mut Array2<f64>) {
        for row in m.rows_mut() {
            self.transition_transposed(t, row);
        }
    }

    /// `p ← T(t)·p·T(t)ᵗ + V(t)`.
    fn predict_covariance(&self, t: usize, p: &mut Array2<f64>) {
        self.transition_columns(t, p);
        self.transition_rows(t, p);
        self.add_state_noise(t, p);
    }

    /// `n ← T(t)ᵗ·n·T(t)`, the backward counterpart of [`predict_covariance`](Self::predict_covariance).
    fn retro_precision(&self, t: usize, n: &mut Array2<f64>) {
        self.transposed_columns(t, n);
        self.transposed_rows(t, n);
    }
}

/// Measurement equation `y[t] = Z(t) a[t] + ε[t]`.
pub trait Loading {
    /// `Z(t)·x`.
    fn zx(&self, t: usize, x: ArrayView1<'_, f64>) -> f64;

    /// `x ← x + c·Z(t)ᵗ`.
    fn xpz(&self, t: usize, x: ArrayViewMut1<'_, f64>, c: f64);

    /// Variance `h(t)` of the measurement error (0 when there is none).
    fn error_variance(&self, t: usize) -> f64;

    /// `Z(t)·m`, one entry per column of `m`.
    fn zm(&self, t: usize, m: ArrayView2<'_, f64>) -> Array1<f64> {
        m.columns().into_iter().map(|c| self.zx(t, c)).collect()
    }

    /// `Z(t)·v·Z(t)ᵗ` for a symmetric `v`.
    fn zvz(&self, t: usize, v: ArrayView2<'_, f64>) -> f64 {
        let zv = self.zm(t, v);
        self.zx(t, zv.view())
    }

    /// `Z(t)` materialized as a vector of length `dim`.
    fn row(&self, t: usize, dim: usize) -> Array1<f64> {
        let mut z = Array1::zeros(dim);
        self.xpz(t, z.view_mut(), 1.0);
        z
    }
}

/// A complete linear Gaussian state-space model.
pub trait StateSpaceModel: Initialization + Dynamics + Loading {}

impl<M: Initialization + Dynamics + Loading + ?Sized> StateSpaceModel for M {}

/// Time-invariant state-space model backed by dense matrices.
///
/// # Examples
///
/// ```
/// use kalmar_ssf::{Initialization, SsfModel};
///
/// let model = SsfModel::local_linear_trend(0.5, 0.1, 1.0).unwrap();
/// assert_eq!(model.dim(), 2);
/// assert_eq!(model.diffuse_dim(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct SsfModel {
    transition: Array2<f64>,
    state_noise: Array2<f64>,
    loading: Array1<f64>,
    measurement_variance: f64,
    a0: Array1<f64>,
    pf0: Array2<f64>,
    b0: Array2<f64>,
}

impl SsfModel {
    /// Creates a model with `a0 = 0`, `Pf0 = 0` and no diffuse part.
    ///
    /// # Errors
    ///
    /// - [`SsfError::DimensionMismatch`] if `transition` is not square or
    ///   `state_noise`/`loading` do not match its size.
    /// - [`SsfError::NonFiniteModel`] if any entry is NaN or infinite.
    /// - [`SsfError::InvalidVariance`] if `measurement_variance` or a
    ///   diagonal entry of `state_noise` is negative.
    pub fn new(
        transition: Array2<f64>,
        state_noise: Array2<f64>,
        loading: Array1<f64>,
        measurement_variance: f64,
    ) -> Result<Self, SsfError> {
        let r = transition.nrows();
        check_shape("transition", &transition, r, r)?;
        check_shape("state noise", &state_noise, r, r)?;
        if loading.len() != r {
            return Err(SsfError::DimensionMismatch {
                what: "loading",
                expected: r,
                got: loading.len(),
            });
        }
        check_finite("transition", transition.iter())?;
        check_finite("state noise", state_noise.iter())?;
        check_finite("loading", loading.iter())?;
        check_variance("measurement error variance", measurement_variance)?;
        for &v in state_noise.diag() {
            check_variance("state noise variance", v)?;
        }

        Ok(Self {
            transition,
            state_noise,
            loading,
            measurement_variance,
            a0: Array1::zeros(r),
            pf0: Array2::zeros((r, r)),
            b0: Array2::zeros((r, 0)),
        })
    }

    /// Replaces the initial mean and the non-diffuse initial covariance.
    ///
    /// # Errors
    ///
    /// [`SsfError::DimensionMismatch`] or [`SsfError::NonFiniteModel`] on
    /// malformed input.
    pub fn with_initial_state(mut self, a0: Array1<f64>, pf0: Array2<f64>) -> Result<Self, SsfError> {
        let r = self.transition.nrows();
        if a0.len() != r {
            return Err(SsfError::DimensionMismatch {
                what: "initial mean",
                expected: r,
                got: a0.len(),
            });
        }
        check_shape("initial covariance", &pf0, r, r)?;
        check_finite("initial mean", a0.iter())?;
        check_finite("initial covariance", pf0.iter())?;
        self.a0 = a0;
        self.pf0 = pf0;
        Ok(self)
    }

    /// Replaces the diffuse constraints `B0` (`r × d`).
    ///
    /// # Errors
    ///
    /// [`SsfError::DimensionMismatch`] if `b0` does not have `r` rows or has
    /// more than `r` columns; [`SsfError::NonFiniteModel`] on NaN/infinity.
    pub fn with_diffuse(mut self, b0: Array2<f64>) -> Result<Self, SsfError> {
        let r = self.transition.nrows();
        if b0.nrows() != r {
            return Err(SsfError::DimensionMismatch {
                what: "diffuse constraints rows",
                expected: r,
                got: b0.nrows(),
            });
        }
        if b0.ncols() > r {
            return Err(SsfError::DimensionMismatch {
                what: "diffuse constraints columns",
                expected: r,
                got: b0.ncols(),
            });
        }
        check_finite("diffuse constraints", b0.iter())?;
        self.b0 = b0;
        Ok(self)
    }

    /// Random walk plus noise: `T = 1`, `Z = 1`, `V = q`, fully diffuse.
    pub fn local_level(q: f64, h: f64) -> Result<Self, SsfError> {
        Self::new(
            Array2::from_elem((1, 1), 1.0),
            Array2::from_elem((1, 1), q),
            Array1::ones(1),
            h,
        )?
        .with_diffuse(Array2::eye(1))
    }

    /// Level and slope, both random walks, fully diffuse.
    pub fn local_linear_trend(q_level: f64, q_slope: f64, h: f64) -> Result<Self, SsfError> {
        let transition = ndarray::array![[1.0, 1.0], [0.0, 1.0]];
        let mut noise = Array2::zeros((2, 2));
        noise[[0, 0]] = q_level;
        noise[[1, 1]] = q_slope;
        Self::new(transition, noise, ndarray::array![1.0, 0.0], h)?.with_diffuse(Array2::eye(2))
    }

    /// Random-walk level plus a dummy seasonal of the given period.
    ///
    /// The state is `[level, s(t), s(t-1), …, s(t-period+2)]`, so the
    /// dimension equals `period`. Every component is diffuse.
    ///
    /// # Errors
    ///
    /// [`SsfError::DimensionMismatch`] if `period < 2`.
    pub fn level_seasonal(period: usize, q_level: f64, q_seasonal: f64, h: f64) -> Result<Self, SsfError> {
        if period < 2 {
            return Err(SsfError::DimensionMismatch {
                what: "seasonal period",
                expected: 2,
                got: period,
            });
        }
        let r = period;
        let mut transition = Array2::zeros((r, r));
        transition[[0, 0]] = 1.0;
        for j in 1..r {
            transition[[1, j]] = -1.0;
        }
        for i in 2..r {
            transition[[i, i - 1]] = 1.0;
        }
        let mut noise = Array2::zeros((r, r));
        noise[[0, 0]] = q_level;
        noise[[1, 1]] = q_seasonal;
        let mut loading = Array1::zeros(r);
        loading[0] = 1.0;
        loading[1] = 1.0;
        Self::new(transition, noise, loading, h)?.with_diffuse(Array2::eye(r))
    }

    /// First-order autoregression `x[t+1] = φ x[t] + η[t]` observed with noise.
    ///
    /// Stationary (`|φ| < 1`) processes start from their unconditional
    /// variance `q / (1 − φ²)`; otherwise the state is diffuse.
    pub fn ar1(phi: f64, q: f64, h: f64) -> Result<Self, SsfError> {
        let model = Self::new(
            Array2::from_elem((1, 1), phi),
            Array2::from_elem((1, 1), q),
            Array1::ones(1),
            h,
        )?;
        if phi.abs() < 1.0 {
            model.with_initial_state(Array1::zeros(1), Array2::from_elem((1, 1), q / (1.0 - phi * phi)))
        } else {
            model.with_diffuse(Array2::eye(1))
        }
    }

    /// Transition matrix `T` (`r × r`).
    pub fn transition_matrix(&self) -> &Array2<f64> {
        &self.transition
    }

    /// State noise covariance `V` (`r × r`).
    pub fn state_noise(&self) -> &Array2<f64> {
        &self.state_noise
    }

    /// Loading row `Z` (length `r`).
    pub fn loading(&self) -> &Array1<f64> {
        &self.loading
    }

    /// Measurement error variance `h`.
    pub fn measurement_variance(&self) -> f64 {
        self.measurement_variance
    }

    /// Returns a copy of this model with the measurement error removed.
    pub fn noiseless(&self) -> Self {
        Self {
            measurement_variance: 0.0,
            ..self.clone()
        }
    }
}

impl Initialization for SsfModel {
    fn dim(&self) -> usize {
        self.transition.nrows()
    }

    fn diffuse_dim(&self) -> usize {
        self.b0.ncols()
    }

    fn a0(&self) -> Array1<f64> {
        self.a0.clone()
    }

    fn pf0(&self) -> Array2<f64> {
        self.pf0.clone()
    }

    fn diffuse_constraints(&self) -> Array2<f64> {
        self.b0.clone()
    }
}

impl Dynamics for SsfModel {
    fn transition(&self, _t: usize, mut x: ArrayViewMut1<'_, f64>) {
        let y = self.transition.dot(&x.view());
        x.assign(&y);
    }

    fn transition_transposed(&self, _t: usize, mut x: ArrayViewMut1<'_, f64>) {
        let y = self.transition.t().dot(&x.view());
        x.assign(&y);
    }

    fn add_state_noise(&self, _t: usize, p: &mut Array2<f64>) {
        *p += &self.state_noise;
    }

    fn transition_columns(&self, _t: usize, m: &mut Array2<f64>) {
        *m = self.transition.dot(&*m);
    }

    fn transition_rows(&self, _t: usize, m: &mut Array2<f64>) {
        *m = m.dot(&self.transition.t());
    }

    fn transposed_columns(&self, _t: usize, m: &mut Array2<f64>) {
        *m = self.transition.t().dot(&*m);
    }

    fn transposed_rows(&self, _t: usize, m: &mut Array2<f64>) {
        *m = m.dot(&self.transition);
    }
}

impl Loading for SsfModel {
    fn zx(&self, _t: usize, x: ArrayView1<'_, f64>) -> f64 {
        self.loading.dot(&x)
    }

    fn xpz(&self, _t: usize, mut x: ArrayViewMut1<'_, f64>, c: f64) {
        x.scaled_add(c, &self.loading);
    }

    fn error_variance(&self, _t: usize) -> f64 {
        self.measurement_variance
    }

    fn zm(&self, _t: usize, m: ArrayView2<'_, f64>) -> Array1<f64> {
        self.loading.dot(&m)
    }
}

fn check_shape(what: &'static str, m: &Array2<f64>, rows: usize, cols: usize) -> Result<(), SsfError> {
    if m.nrows() != rows {
        return Err(SsfError::DimensionMismatch {
            what,
            expected: rows,
            got: m.nrows(),
        });
    }
    if m.ncols() != cols {
        return Err(SsfError::DimensionMismatch {
            what,
            expected: cols,
            got: m.ncols(),
        });
    }
    Ok(())
}

fn check_finite<'a>(what: &'static str, mut values: impl Iterator<Item = &'a f64>) -> Result<(), SsfError> {
    if values.all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(SsfError::NonFiniteModel { what })
    }
}

fn check_variance(what: &'static str, value: f64) -> Result<(), SsfError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SsfError::InvalidVariance { what, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn local_level_shape() {
        let m = SsfModel::local_level(1.0, 0.5).unwrap();
        assert_eq!(m.dim(), 1);
        assert_eq!(m.diffuse_dim(), 1);
        assert_abs_diff_eq!(m.error_variance(0), 0.5, epsilon = 1e-15);
        assert_eq!(m.diffuse_constraints(), Array2::<f64>::eye(1));
    }

    #[test]
    fn level_seasonal_transition() {
        let m = SsfModel::level_seasonal(4, 1.0, 0.1, 0.0).unwrap();
        assert_eq!(m.dim(), 4);
        assert_eq!(m.diffuse_dim(), 4);
        // The seasonal row sums the previous period - 1 values with a minus sign.
        let mut x = array![10.0, 1.0, 2.0, 3.0];
        m.transition(0, x.view_mut());
        assert_eq!(x, array![10.0, -6.0, 1.0, 2.0]);
        assert_abs_diff_eq!(m.zx(0, array![10.0, 1.0, 2.0, 3.0].view()), 11.0, epsilon = 1e-15);
    }

    #[test]
    fn level_seasonal_rejects_short_period() {
        let err = SsfModel::level_seasonal(1, 1.0, 1.0, 0.0).unwrap_err();
        assert!(matches!(err, SsfError::DimensionMismatch { what: "seasonal period", .. }));
    }

    #[test]
    fn ar1_stationary_variance() {
        let m = SsfModel::ar1(0.5, 1.0, 0.0).unwrap();
        assert_eq!(m.diffuse_dim(), 0);
        assert_abs_diff_eq!(m.pf0()[[0, 0]], 4.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn ar1_unit_root_is_diffuse() {
        let m = SsfModel::ar1(1.0, 1.0, 0.0).unwrap();
        assert_eq!(m.diffuse_dim(), 1);
    }

    #[test]
    fn rejects_negative_measurement_variance() {
        let err = SsfModel::local_level(1.0, -0.1).unwrap_err();
        assert_eq!(
            err,
            SsfError::InvalidVariance {
                what: "measurement error variance",
                value: -0.1
            }
        );
    }

    #[test]
    fn rejects_non_finite_transition() {
        let err = SsfModel::new(
            array![[f64::NAN]],
            array![[1.0]],
            array![1.0],
            0.0,
        )
        .unwrap_err();
        assert_eq!(err, SsfError::NonFiniteModel { what: "transition" });
    }

    #[test]
    fn rejects_loading_length() {
        let err = SsfModel::new(Array2::eye(2), Array2::zeros((2, 2)), array![1.0], 0.0).unwrap_err();
        assert_eq!(
            err,
            SsfError::DimensionMismatch {
                what: "loading",
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn rejects_too_many_diffuse_columns() {
        let err = SsfModel::local_level(1.0, 0.0)
            .unwrap()
            .with_diffuse(Array2::eye(2))
            .unwrap_err();
        assert!(matches!(err, SsfError::DimensionMismatch { .. }));
    }

    #[test]
    fn dense_overrides_match_default_operators() {
        let m = SsfModel::local_linear_trend(0.3, 0.2, 1.0).unwrap();
        let p = array![[2.0, 0.5], [0.5, 1.0]];

        let mut fast = p.clone();
        m.predict_covariance(0, &mut fast);

        let t = m.transition_matrix();
        let expected = t.dot(&p).dot(&t.t()) + m.state_noise();
        for i in 0..2 {
            for j in 0..2 {
                assert_abs_diff_eq!(fast[[i, j]], expected[[i, j]], epsilon = 1e-12);
            }
        }

        let mut n = p.clone();
        m.retro_precision(0, &mut n);
        let expected = t.t().dot(&p).dot(t);
        for i in 0..2 {
            for j in 0..2 {
                assert_abs_diff_eq!(n[[i, j]], expected[[i, j]], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn loading_helpers() {
        let m = SsfModel::local_linear_trend(0.0, 0.0, 0.0).unwrap();
        assert_eq!(m.row(0, 2), array![1.0, 0.0]);
        let v = array![[3.0, 1.0], [1.0, 2.0]];
        assert_abs_diff_eq!(m.zvz(0, v.view()), 3.0, epsilon = 1e-15);
        assert_eq!(m.zm(0, v.view()), array![3.0, 1.0]);
    }

    #[test]
    fn noiseless_drops_measurement_error() {
        let m = SsfModel::local_level(1.0, 2.0).unwrap().noiseless();
        assert_abs_diff_eq!(m.measurement_variance(), 0.0, epsilon = 1e-15);
        assert_eq!(m.diffuse_dim(), 1);
    }
}
