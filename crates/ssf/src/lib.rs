//! # kalmar-ssf
//!
//! Exact diffuse Kalman filtering and smoothing for univariate linear
//! Gaussian state-space models, with the diffuse part of the initial state
//! carried as a square-root basis `B` and collapsed by orthogonal
//! transformations.
//!
//! ## Data Flow
//!
//! ```mermaid
//! graph LR
//!     M["SsfModel (Initialization + Dynamics + Loading)"] --> I
//!     Y["SsfData"] --> I
//!     I["DiffuseSquareRootInitializer"] -->|"t*, a(t*|t*-1), P(t*|t*-1)"| F["OrdinaryFilter"]
//!     I -->|"records [0, t*)"| D["DiffuseResults"]
//!     F -->|"records [t*, n)"| O["OrdinaryResults"]
//!     D --> S["DiffuseSquareRootSmoother"]
//!     O --> S
//!     S --> R["SmoothedStates"]
//!     D --> L["DiffuseLikelihood"]
//!     O --> L
//! ```
//!
//! ## Quick start
//!
//! ```
//! use kalmar_ssf::{FilterConfig, SsfData, SsfModel, toolkit};
//!
//! let model = SsfModel::local_level(1.0, 1.0).unwrap();
//! let data = SsfData::new(vec![1.0, 2.0]).unwrap();
//! let config = FilterConfig::default();
//!
//! let smoothed = toolkit::smooth(&model, &data, &config, true).unwrap();
//! assert!((smoothed.mean(0)[0] - 4.0 / 3.0).abs() < 1e-12);
//!
//! let ll = toolkit::likelihood(&model, &data, &config).unwrap();
//! assert_eq!(ll.n_diffuse(), 1);
//! ```
//!
//! ## Glossary
//!
//! | Symbol | Meaning |
//! |--------|---------|
//! | `a`, `P` | Predicted state mean and (finite part of the) covariance |
//! | `B` | Diffuse constraints; `B·Bᵗ` is the diffuse covariance |
//! | `e`, `f` | Prediction error and its ordinary variance |
//! | `fi` | Diffuse variance `‖Z·B‖²` |
//! | `C`, `Ci` | Ordinary gain `P·Zᵗ` and diffuse gain `B·Bᵗ·Zᵗ` |
//! | `t*` | First index of the ordinary phase |

mod error;

pub mod config;
pub mod data;
pub mod filter;
pub mod initializer;
pub mod likelihood;
pub mod linalg;
pub mod model;
pub mod reference;
pub mod results;
pub mod smoother;
pub mod state;
pub mod toolkit;
pub mod update;

pub use config::{FilterConfig, ResultsMode};
pub use data::SsfData;
pub use error::SsfError;
pub use filter::OrdinaryFilter;
pub use initializer::{DiffuseSquareRootInitializer, OrdinaryStart};
pub use likelihood::DiffuseLikelihood;
pub use linalg::{Transformation, TransformationKind};
pub use model::{Dynamics, Initialization, Loading, SsfModel, StateSpaceModel};
pub use reference::ReferenceInitializer;
pub use results::{DiffuseResults, FilterOutput, OrdinaryResults};
pub use smoother::{DiffuseSquareRootSmoother, OrdinarySmoother, SmoothedStates, smoothed_signal};
pub use state::{AugmentedState, State};
pub use update::{DiffuseUpdateInformation, UpdateInformation};
