//! Ordinary and augmented filter states.

use ndarray::{Array1, Array2, ArrayView1};

use crate::linalg;
use crate::model::Initialization;

/// Mean and covariance of the state.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub(crate) a: Array1<f64>,
    pub(crate) p: Array2<f64>,
}

impl State {
    pub fn new(a: Array1<f64>, p: Array2<f64>) -> Self {
        Self { a, p }
    }

    /// Starting state of a model without diffuse part.
    pub fn from_model<M: Initialization + ?Sized>(model: &M) -> Self {
        Self::new(model.a0(), model.pf0())
    }

    pub fn a(&self) -> &Array1<f64> {
        &self.a
    }

    pub fn p(&self) -> &Array2<f64> {
        &self.p
    }

    pub fn dim(&self) -> usize {
        self.a.len()
    }
}

/// Filter state during the diffuse phase.
///
/// Alongside the ordinary mean `a` and covariance `P` it carries the
/// constraint basis `B` (`r × k`) whose columns span the directions of
/// infinite variance not yet resolved by data. `k` never grows; when it
/// reaches zero the state is handed to the ordinary filter.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedState {
    pub(crate) a: Array1<f64>,
    pub(crate) p: Array2<f64>,
    pub(crate) b: Array2<f64>,
}

impl AugmentedState {
    pub fn new(a: Array1<f64>, p: Array2<f64>, b: Array2<f64>) -> Self {
        Self { a, p, b }
    }

    pub fn from_model<M: Initialization + ?Sized>(model: &M) -> Self {
        Self::new(model.a0(), model.pf0(), model.diffuse_constraints())
    }

    pub fn a(&self) -> &Array1<f64> {
        &self.a
    }

    pub fn p(&self) -> &Array2<f64> {
        &self.p
    }

    /// Diffuse constraints `B`.
    pub fn b(&self) -> &Array2<f64> {
        &self.b
    }

    pub fn dim(&self) -> usize {
        self.a.len()
    }

    /// Remaining diffuse directions `k`.
    pub fn diffuse_dim(&self) -> usize {
        self.b.ncols()
    }

    pub fn is_diffuse(&self) -> bool {
        self.b.ncols() > 0
    }

    /// Diffuse covariance `B·Bᵗ`.
    pub fn pinf(&self) -> Array2<f64> {
        self.b.dot(&self.b.t())
    }

    /// First column of `B`.
    pub(crate) fn first_constraint(&self) -> ArrayView1<'_, f64> {
        self.b.column(0)
    }

    /// Removes the first column of `B`.
    pub(crate) fn drop_first_constraint(&mut self) {
        self.b = linalg::drop_first_column(&self.b);
    }

    /// Discards the (empty) diffuse basis.
    pub fn into_state(self) -> State {
        State::new(self.a, self.p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SsfModel;
    use ndarray::array;

    #[test]
    fn augmented_from_model() {
        let model = SsfModel::local_linear_trend(1.0, 1.0, 0.0).unwrap();
        let mut s = AugmentedState::from_model(&model);
        assert_eq!(s.dim(), 2);
        assert_eq!(s.diffuse_dim(), 2);
        assert!(s.is_diffuse());
        assert_eq!(s.pinf(), Array2::<f64>::eye(2));

        s.drop_first_constraint();
        assert_eq!(s.diffuse_dim(), 1);
        assert_eq!(s.b(), &array![[0.0], [1.0]]);
        s.drop_first_constraint();
        assert!(!s.is_diffuse());

        let state = s.into_state();
        assert_eq!(state.a(), &Array1::<f64>::zeros(2));
    }

    #[test]
    fn state_from_stationary_model() {
        let model = SsfModel::ar1(0.0, 2.0, 0.0).unwrap();
        let s = State::from_model(&model);
        assert_eq!(s.dim(), 1);
        assert_eq!(s.p(), &array![[2.0]]);
    }
}
