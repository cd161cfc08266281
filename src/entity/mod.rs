//! Evaluation entities.
//!
//! A [`ToolEntity`] owns every [`FileEntity`] (benchmark file, one per tool
//! version) discovered for it, plus the synthetic merge files built from
//! them. Each file keeps its per-label [`results::LabelResults`].

pub mod file;
pub mod results;
pub mod tool;

pub use file::{EvaluationError, FileEntity, FileKind, VerificationFailure};
pub use tool::ToolEntity;
