//! Regression models and the statistics used to score them.
//!
//! Everything here works on `ndarray` matrices with one row per sample:
//!
//! - [`forest`]: bootstrap-aggregated CART regression trees with impurity
//!   based feature importances, fitted through the `linfa` traits
//! - [`pca`]: projection onto every principal component, backed by
//!   `linfa-reduction`
//! - [`split`]: seeded train/test index splitting
//! - [`metrics`]: R², mean, median, quantile and Pearson correlation

pub mod forest;
pub mod metrics;
pub mod pca;
pub mod split;

use thiserror::Error;

pub use forest::{ForestParams, RandomForestRegressor};
pub use pca::{project, Projection};
pub use split::train_test_split;

/// Errors raised while fitting or applying a model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("not enough rows: {train} train / {test} test")]
    NotEnoughRows { train: usize, test: usize },

    #[error("feature matrix has {rows} rows but target has {targets}")]
    ShapeMismatch { rows: usize, targets: usize },

    #[error("need at least two samples, got {0}")]
    TooFewSamples(usize),

    #[error("input has no variance to decompose")]
    NoVariance,

    #[error("{0}")]
    Linfa(String),
}

impl From<linfa::Error> for ModelError {
    fn from(err: linfa::Error) -> Self {
        ModelError::Linfa(err.to_string())
    }
}

impl From<linfa_reduction::ReductionError> for ModelError {
    fn from(err: linfa_reduction::ReductionError) -> Self {
        ModelError::Linfa(err.to_string())
    }
}
