//! Error types for the kalmar-ssf crate.

/// Error type for all fallible operations in the kalmar-ssf crate.
///
/// Every variant terminates the filtering run that produced it. Nothing in
/// this crate retries: the caller decides whether to try again with a
/// different model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SsfError {
    /// Returned when the observation sequence is empty.
    #[error("observation sequence is empty")]
    EmptyData,

    /// Returned when an observation is infinite (NaN is the missing-value sentinel).
    #[error("observation at t={t} is infinite")]
    NonFiniteData {
        /// Index of the offending observation.
        t: usize,
    },

    /// Returned when a model matrix or vector has the wrong shape.
    #[error("{what}: expected dimension {expected}, got {got}")]
    DimensionMismatch {
        /// Name of the offending model component.
        what: &'static str,
        /// Expected dimension.
        expected: usize,
        /// Dimension actually supplied.
        got: usize,
    },

    /// Returned when a model matrix or vector contains NaN or infinity.
    #[error("non-finite value in {what}")]
    NonFiniteModel {
        /// Name of the offending model component.
        what: &'static str,
    },

    /// Returned when a variance parameter is negative or non-finite.
    #[error("{what} must be finite and non-negative, got {value}")]
    InvalidVariance {
        /// Name of the variance parameter.
        what: &'static str,
        /// The invalid value.
        value: f64,
    },

    /// Returned when a filter tolerance is non-finite or non-positive.
    #[error("tolerance {name} must be finite and positive, got {value}")]
    InvalidTolerance {
        /// Name of the tolerance.
        name: &'static str,
        /// The invalid value.
        value: f64,
    },

    /// Returned when an observation has zero ordinary and zero diffuse
    /// variance but a nonzero prediction error.
    #[error("inconsistent observation at t={t}: zero prediction variance with error {error}")]
    Inconsistent {
        /// Index of the observation.
        t: usize,
        /// The prediction error that should have been zero.
        error: f64,
    },

    /// Returned when the diffuse subspace is still nonempty after the last
    /// observation.
    #[error("diffuse initialization failed: {remaining} diffuse direction(s) left after {len} observations")]
    DiffuseInitializationFailed {
        /// Number of diffuse directions still unresolved.
        remaining: usize,
        /// Length of the observation sequence.
        len: usize,
    },

    /// Returned when the smoother asks for a forward record that was never stored.
    #[error("no filtering record stored for t={t}")]
    MissingRecord {
        /// The requested time index.
        t: usize,
    },

    /// Returned when smoothing is requested over results filtered in light mode.
    #[error("filtering results were stored in light mode; states are required for smoothing")]
    StatesNotRetained,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_empty_data() {
        let err = SsfError::EmptyData;
        assert_eq!(err.to_string(), "observation sequence is empty");
    }

    #[test]
    fn error_non_finite_data() {
        let err = SsfError::NonFiniteData { t: 4 };
        assert_eq!(err.to_string(), "observation at t=4 is infinite");
    }

    #[test]
    fn error_dimension_mismatch() {
        let err = SsfError::DimensionMismatch {
            what: "loading",
            expected: 3,
            got: 2,
        };
        assert_eq!(err.to_string(), "loading: expected dimension 3, got 2");
    }

    #[test]
    fn error_non_finite_model() {
        let err = SsfError::NonFiniteModel { what: "transition" };
        assert_eq!(err.to_string(), "non-finite value in transition");
    }

    #[test]
    fn error_invalid_variance() {
        let err = SsfError::InvalidVariance {
            what: "measurement error variance",
            value: -1.0,
        };
        assert_eq!(
            err.to_string(),
            "measurement error variance must be finite and non-negative, got -1"
        );
    }

    #[test]
    fn error_invalid_tolerance() {
        let err = SsfError::InvalidTolerance {
            name: "diffuse_zero",
            value: 0.0,
        };
        assert_eq!(
            err.to_string(),
            "tolerance diffuse_zero must be finite and positive, got 0"
        );
    }

    #[test]
    fn error_inconsistent() {
        let err = SsfError::Inconsistent { t: 7, error: 0.5 };
        assert_eq!(
            err.to_string(),
            "inconsistent observation at t=7: zero prediction variance with error 0.5"
        );
    }

    #[test]
    fn error_diffuse_initialization_failed() {
        let err = SsfError::DiffuseInitializationFailed {
            remaining: 2,
            len: 3,
        };
        assert_eq!(
            err.to_string(),
            "diffuse initialization failed: 2 diffuse direction(s) left after 3 observations"
        );
    }

    #[test]
    fn error_missing_record() {
        let err = SsfError::MissingRecord { t: 11 };
        assert_eq!(err.to_string(), "no filtering record stored for t=11");
    }

    #[test]
    fn error_states_not_retained() {
        let err = SsfError::StatesNotRetained;
        assert!(err.to_string().contains("light mode"));
    }

    #[test]
    fn error_is_std_error() {
        fn assert_impl<T: std::error::Error>() {}
        assert_impl::<SsfError>();
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_impl<T: Send + Sync>() {}
        assert_impl::<SsfError>();
    }
}
