//! Resource usage predictability of benchmarked tools.
//!
//! Raw benchmark tables (one file per tool version) are grouped into tools,
//! checked, and evaluated with random forest regressors for each configured
//! resource label. Scores, feature rankings and PCA projections are written
//! as CSV reports per file and per tool, and aggregated over the corpus.

pub mod config;
pub mod data;
pub mod discovery;
pub mod entity;
pub mod ml;
pub mod pipeline;
pub mod report;
pub mod statistics;

pub use config::{Config, ConfigError};
pub use discovery::{Discovery, ToolLoader};
pub use entity::{FileEntity, ToolEntity};
pub use pipeline::{Pipeline, RunOutcome, RunSummary};
pub use statistics::CorpusStatistics;
