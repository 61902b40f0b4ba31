#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

//! Maximum-likelihood estimation of censored (Tobit) linear regression.
//!
//! Observations are split by censoring status, the censored negative
//! log-likelihood and its analytic gradient are minimized with BFGS from a
//! least-squares warm start, and Wald inference is drawn from the observed
//! information at the optimum.

pub mod data;
pub mod estimate;
pub mod gradient;
pub mod hessian;
pub mod inference;
pub mod likelihood;
pub mod model;
pub mod partition;
pub mod probability;
pub mod report;

pub use data::{DataError, PredictionData, TobitData, load_prediction_data, load_training_data};
pub use estimate::{EstimationError, OptimizerDiagnostics, WarmStart};
pub use inference::{InferenceError, InferenceSummary, TermInference, TermStatistics};
pub use model::{
    FitConfig, FittedModel, ModelError, TobitModel, mean_absolute_error, mean_squared_error,
};
pub use partition::{CensoredGroups, CensoringCode, ObservationCounts, PartitionError, partition};
pub use report::TobitReport;
