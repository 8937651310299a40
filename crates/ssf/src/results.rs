//! Filtering results stores.
//!
//! The forward pass appends one record per time step; the backward pass reads
//! them back by index. The diffuse prefix `[0, t*)` and the ordinary tail
//! `[t*, n)` are kept in separate stores because their records differ: only
//! the prefix carries the constraint basis `B`, the diffuse variance `fi` and
//! the diffuse gain `Ci`.
//!
//! In [`ResultsMode::Light`] only the prediction-error information is kept.
//! The predicted and filtered states cost `O(n·r²)` memory and are retained
//! only in [`ResultsMode::Full`].

use ndarray::{Array1, Array2};

use crate::config::ResultsMode;
use crate::initializer::OrdinaryStart;
use crate::state::{AugmentedState, State};
use crate::update::{DiffuseUpdateInformation, UpdateInformation};

/// Forward records of the diffuse prefix `[0, t*)`.
#[derive(Debug, Clone)]
pub struct DiffuseResults {
    mode: ResultsMode,
    updates: Vec<DiffuseUpdateInformation>,
    diffuse_dims: Vec<usize>,
    predicted: Vec<AugmentedState>,
    filtered: Vec<State>,
}

impl DiffuseResults {
    pub fn new(mode: ResultsMode) -> Self {
        Self {
            mode,
            updates: Vec::new(),
            diffuse_dims: Vec::new(),
            predicted: Vec::new(),
            filtered: Vec::new(),
        }
    }

    pub fn mode(&self) -> ResultsMode {
        self.mode
    }

    /// Number of stored steps; equals `t*` after a successful pass.
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// `true` when predicted and filtered states were kept.
    pub fn has_states(&self) -> bool {
        self.mode == ResultsMode::Full
    }

    pub fn update(&self, t: usize) -> Option<&DiffuseUpdateInformation> {
        self.updates.get(t)
    }

    /// Predicted state `(a(t|t-1), P(t|t-1), B(t))`.
    pub fn predicted(&self, t: usize) -> Option<&AugmentedState> {
        self.predicted.get(t)
    }

    /// Filtered state `(a(t|t), P(t|t))`.
    pub fn filtered(&self, t: usize) -> Option<&State> {
        self.filtered.get(t)
    }

    /// Number of diffuse directions entering each step.
    pub fn diffuse_dims(&self) -> &[usize] {
        &self.diffuse_dims
    }

    pub(crate) fn save(&mut self, predicted: &AugmentedState, update: DiffuseUpdateInformation) {
        self.diffuse_dims.push(predicted.diffuse_dim());
        self.updates.push(update);
        if self.mode == ResultsMode::Full {
            self.predicted.push(predicted.clone());
        }
    }

    pub(crate) fn save_filtered(&mut self, filtered: &AugmentedState) {
        if self.mode == ResultsMode::Full {
            self.filtered.push(State::new(filtered.a.clone(), filtered.p.clone()));
        }
    }
}

/// Forward records of the ordinary tail `[t*, n)`, indexed by absolute time.
#[derive(Debug, Clone)]
pub struct OrdinaryResults {
    mode: ResultsMode,
    start: usize,
    updates: Vec<UpdateInformation>,
    predicted: Vec<State>,
    filtered: Vec<State>,
}

impl OrdinaryResults {
    /// Creates an empty store whose first record will be time `start`.
    pub fn new(mode: ResultsMode, start: usize) -> Self {
        Self {
            mode,
            start,
            updates: Vec::new(),
            predicted: Vec::new(),
            filtered: Vec::new(),
        }
    }

    pub fn mode(&self) -> ResultsMode {
        self.mode
    }

    /// First time index covered.
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last stored time index.
    pub fn end(&self) -> usize {
        self.start + self.updates.len()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn has_states(&self) -> bool {
        self.mode == ResultsMode::Full
    }

    pub fn update(&self, t: usize) -> Option<&UpdateInformation> {
        t.checked_sub(self.start).and_then(|i| self.updates.get(i))
    }

    pub fn predicted(&self, t: usize) -> Option<&State> {
        t.checked_sub(self.start).and_then(|i| self.predicted.get(i))
    }

    pub fn filtered(&self, t: usize) -> Option<&State> {
        t.checked_sub(self.start).and_then(|i| self.filtered.get(i))
    }

    pub(crate) fn save(&mut self, predicted: &State, update: UpdateInformation) {
        self.updates.push(update);
        if self.mode == ResultsMode::Full {
            self.predicted.push(predicted.clone());
        }
    }

    pub(crate) fn save_filtered(&mut self, filtered: &State) {
        if self.mode == ResultsMode::Full {
            self.filtered.push(filtered.clone());
        }
    }
}

/// Complete forward pass: diffuse prefix, hand-off state and ordinary tail.
#[derive(Debug, Clone)]
pub struct FilterOutput {
    diffuse: DiffuseResults,
    start: OrdinaryStart,
    ordinary: OrdinaryResults,
}

impl FilterOutput {
    pub(crate) fn new(diffuse: DiffuseResults, start: OrdinaryStart, ordinary: OrdinaryResults) -> Self {
        Self {
            diffuse,
            start,
            ordinary,
        }
    }

    pub fn diffuse(&self) -> &DiffuseResults {
        &self.diffuse
    }

    pub fn ordinary(&self) -> &OrdinaryResults {
        &self.ordinary
    }

    /// Hand-off point `t*` and the state `(a(t*|t*-1), P(t*|t*-1))`.
    pub fn start(&self) -> &OrdinaryStart {
        &self.start
    }

    /// First time index of the ordinary phase.
    pub fn transition_index(&self) -> usize {
        self.start.position()
    }

    /// Length of the filtered sequence.
    pub fn len(&self) -> usize {
        self.ordinary.end().max(self.diffuse.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_states(&self) -> bool {
        self.diffuse.has_states() && self.ordinary.has_states()
    }

    /// `(e, f, fi)` at `t`, or `None` when the observation is missing.
    pub fn prediction_error(&self, t: usize) -> Option<(f64, f64, f64)> {
        if let Some(u) = self.diffuse.update(t) {
            return (!u.is_missing()).then_some((u.e(), u.f(), u.fi()));
        }
        self.ordinary
            .update(t)
            .filter(|u| !u.is_missing())
            .map(|u| (u.e(), u.f(), 0.0))
    }

    /// Prediction errors for every `t`, NaN where missing.
    pub fn errors(&self) -> Vec<f64> {
        (0..self.len())
            .map(|t| self.prediction_error(t).map_or(f64::NAN, |(e, _, _)| e))
            .collect()
    }

    /// Ordinary prediction-error variances for every `t`, NaN where missing.
    pub fn variances(&self) -> Vec<f64> {
        (0..self.len())
            .map(|t| self.prediction_error(t).map_or(f64::NAN, |(_, f, _)| f))
            .collect()
    }

    /// Diffuse variances for every `t`; 0 in the ordinary phase, NaN where missing.
    pub fn diffuse_variances(&self) -> Vec<f64> {
        (0..self.len())
            .map(|t| self.prediction_error(t).map_or(f64::NAN, |(_, _, fi)| fi))
            .collect()
    }

    /// Predicted mean `a(t|t-1)` (full mode only).
    pub fn predicted_mean(&self, t: usize) -> Option<&Array1<f64>> {
        self.diffuse
            .predicted(t)
            .map(AugmentedState::a)
            .or_else(|| self.ordinary.predicted(t).map(State::a))
    }

    /// Predicted covariance `P(t|t-1)` (full mode only).
    pub fn predicted_covariance(&self, t: usize) -> Option<&Array2<f64>> {
        self.diffuse
            .predicted(t)
            .map(AugmentedState::p)
            .or_else(|| self.ordinary.predicted(t).map(State::p))
    }

    /// Filtered state `(a(t|t), P(t|t))` (full mode only).
    pub fn filtered(&self, t: usize) -> Option<&State> {
        self.diffuse.filtered(t).or_else(|| self.ordinary.filtered(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn diffuse_update(e: f64, missing: bool) -> DiffuseUpdateInformation {
        DiffuseUpdateInformation {
            e,
            f: 1.0,
            fi: 2.0,
            c: array![0.5],
            ci: array![1.0],
            missing,
        }
    }

    fn ordinary_update(e: f64) -> UpdateInformation {
        UpdateInformation {
            e,
            f: 3.0,
            c: array![0.5],
            missing: false,
        }
    }

    #[test]
    fn light_mode_keeps_errors_only() {
        let mut store = DiffuseResults::new(ResultsMode::Light);
        let s = AugmentedState::new(array![0.0], array![[1.0]], array![[1.0]]);
        store.save(&s, diffuse_update(0.3, false));
        store.save_filtered(&s);
        assert_eq!(store.len(), 1);
        assert!(!store.has_states());
        assert!(store.update(0).is_some());
        assert!(store.predicted(0).is_none());
        assert!(store.filtered(0).is_none());
        assert_eq!(store.diffuse_dims(), &[1]);
    }

    #[test]
    fn ordinary_store_uses_absolute_time() {
        let mut store = OrdinaryResults::new(ResultsMode::Full, 3);
        let s = State::new(array![1.0], array![[2.0]]);
        store.save(&s, ordinary_update(1.5));
        store.save_filtered(&s);
        assert_eq!(store.start(), 3);
        assert_eq!(store.end(), 4);
        assert!(store.update(2).is_none());
        assert_eq!(store.update(3).map(UpdateInformation::e), Some(1.5));
        assert_eq!(store.predicted(3), Some(&s));
        assert!(store.update(4).is_none());
    }

    #[test]
    fn output_merges_both_phases() {
        let mut diffuse = DiffuseResults::new(ResultsMode::Full);
        let s = AugmentedState::new(array![0.0], array![[1.0]], array![[1.0]]);
        diffuse.save(&s, diffuse_update(0.0, true));
        diffuse.save_filtered(&s);
        diffuse.save(&s, diffuse_update(0.7, false));
        diffuse.save_filtered(&s);

        let start = OrdinaryStart::new(2, State::new(array![0.0], array![[1.0]]));
        let mut ordinary = OrdinaryResults::new(ResultsMode::Full, 2);
        let o = State::new(array![5.0], array![[1.0]]);
        ordinary.save(&o, ordinary_update(-1.0));
        ordinary.save_filtered(&o);

        let out = FilterOutput::new(diffuse, start, ordinary);
        assert_eq!(out.len(), 3);
        assert_eq!(out.transition_index(), 2);
        assert!(out.has_states());
        assert!(out.prediction_error(0).is_none());
        assert_eq!(out.prediction_error(1), Some((0.7, 1.0, 2.0)));
        assert_eq!(out.prediction_error(2), Some((-1.0, 3.0, 0.0)));

        let errors = out.errors();
        assert!(errors[0].is_nan());
        assert_eq!(&errors[1..], &[0.7, -1.0]);
        assert_eq!(out.diffuse_variances()[2], 0.0);
        assert_eq!(out.predicted_mean(2), Some(&array![5.0]));
        assert_eq!(out.filtered(0).map(|s| s.a()[0]), Some(0.0));
    }
}
