use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use linfa::prelude::{Dataset, Fit, Predict};
use log::{info, warn};
use ndarray::{Array1, Array2, Axis};
use thiserror::Error;

use super::results::{
    is_potential_over_fitting, sort_by_test_score, EvaluationRow, FeatureImportance, LabelResults,
    PcaProjection, PredictedValue,
};
use crate::config::Config;
use crate::data::filter::{drop_zero_rows, partition_bounds};
use crate::data::loader::load_file;
use crate::data::model::DataTable;
use crate::data::preprocess::{preprocess, standardize, variance_selection, NumericFrame, SelectionError};
use crate::ml::metrics::r2_score;
use crate::ml::{project, train_test_split, ModelError};
use crate::report;

/// Name of the tag column recording which version a merged row came from.
pub const VERSION_COLUMN: &str = "Version";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a file was refused for evaluation. Every check runs, so a file can
/// collect several of these at once.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerificationFailure {
    #[error("source could not be read: {0}")]
    Unreadable(String),

    #[error("insufficient rows ({rows} < {minimum})")]
    TooFewRows { rows: usize, minimum: usize },

    #[error("insufficient columns ({columns} < {minimum})")]
    TooFewColumns { columns: usize, minimum: usize },

    #[error("non-finite values in columns {0:?}")]
    NonFiniteValues(Vec<String>),

    #[error("label {label}: {source}")]
    DegenerateFeatures { label: String, source: SelectionError },
}

/// Failure of one evaluation step for one label.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("label '{0}' was not detected")]
    UnknownLabel(String),

    #[error("data of {0} is not loaded")]
    NotLoaded(String),

    #[error("none of the simplified features are present")]
    NoSimplifiedFeatures,

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl EvaluationError {
    /// Whether the failure comes from the data rather than from fitting.
    pub fn is_validation(&self) -> bool {
        !matches!(self, EvaluationError::Model(_))
    }
}

// ---------------------------------------------------------------------------
// FileEntity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// A raw file found on disk.
    Source,
    /// Concatenation of every verified version of a tool.
    Merged,
    /// Concatenation of the best performing versions for one label.
    BestVersionMerge { label: String },
}

/// Output of one fit/score run.
struct Evaluation {
    row: EvaluationRow,
    predicted: Vec<PredictedValue>,
    importances: Vec<FeatureImportance>,
}

/// One tabular dataset of a tool, real or synthesised, with its evaluation state.
#[derive(Debug)]
pub struct FileEntity {
    pub name: String,
    pub version: String,
    pub kind: FileKind,
    /// Labels from the configuration present in the preprocessed table,
    /// in configuration order.
    pub detected_labels: Vec<String>,
    pub verified: bool,
    pub evaluated: bool,
    path: Option<PathBuf>,
    folder: PathBuf,
    raw: Option<DataTable>,
    preprocessed: Option<NumericFrame>,
    load_error: Option<String>,
    results: BTreeMap<String, LabelResults>,
    config: Arc<Config>,
}

impl FileEntity {
    /// Create a file from a source on disk.
    ///
    /// Loading, preprocessing and verification happen right away unless
    /// memory-saving mode defers them to [`load_memory_sensitive_data`].
    /// An unreadable source yields an unverified file.
    ///
    /// [`load_memory_sensitive_data`]: FileEntity::load_memory_sensitive_data
    pub fn from_source(path: &Path, tool_folder: &Path, config: Arc<Config>) -> Self {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut file = FileEntity {
            version: file_version(&name),
            folder: tool_folder.join(&name),
            name,
            kind: FileKind::Source,
            detected_labels: Vec::new(),
            verified: true,
            evaluated: false,
            path: Some(path.to_path_buf()),
            raw: None,
            preprocessed: None,
            load_error: None,
            results: BTreeMap::new(),
            config,
        };

        if !file.config.memory_saving_mode {
            file.load_memory_sensitive_data();
        }
        file
    }

    /// Create a synthetic file from an already concatenated raw table.
    pub fn merged(name: &str, kind: FileKind, raw: DataTable, tool_folder: &Path, config: Arc<Config>) -> Self {
        let mut file = FileEntity {
            name: name.to_string(),
            version: name.to_string(),
            kind,
            detected_labels: Vec::new(),
            verified: true,
            evaluated: false,
            path: None,
            folder: tool_folder.join(name),
            raw: Some(raw),
            preprocessed: None,
            load_error: None,
            results: BTreeMap::new(),
            config,
        };
        file.prepare();
        file.verify();
        file
    }

    /// Load, preprocess, detect labels and verify. No-op once loaded.
    pub fn load_memory_sensitive_data(&mut self) {
        if self.preprocessed.is_some() {
            return;
        }

        if self.raw.is_none() {
            let Some(path) = self.path.clone() else {
                return;
            };
            match load_file(&path) {
                Ok(table) => self.raw = Some(table),
                Err(err) => {
                    warn!("Could not read {}: {err:#}", path.display());
                    self.load_error = Some(format!("{err:#}"));
                    self.verified = false;
                    return;
                }
            }
        }

        self.prepare();
        self.verify();
    }

    fn prepare(&mut self) {
        if let Some(raw) = &self.raw {
            self.preprocessed = Some(preprocess(raw));
        }
        self.detect_labels();
        for label in &self.detected_labels {
            self.results.entry(label.clone()).or_default();
        }
    }

    /// Collect the configured labels present in the preprocessed table.
    pub fn detect_labels(&mut self) {
        let Some(frame) = &self.preprocessed else {
            self.detected_labels.clear();
            return;
        };
        self.detected_labels = self
            .config
            .labels
            .iter()
            .filter(|label| frame.contains(label))
            .cloned()
            .collect();
    }

    /// Check whether the file can be evaluated and update `verified`.
    ///
    /// Skipped (nothing reported) while memory-saving mode has not loaded
    /// the data yet.
    pub fn verify(&mut self) -> Vec<VerificationFailure> {
        if let Some(err) = &self.load_error {
            self.verified = false;
            return vec![VerificationFailure::Unreadable(err.clone())];
        }
        let (Some(raw), Some(frame)) = (&self.raw, &self.preprocessed) else {
            return Vec::new();
        };

        let mut failures = Vec::new();

        if raw.n_rows() < self.config.minimum_row_count {
            failures.push(VerificationFailure::TooFewRows {
                rows: raw.n_rows(),
                minimum: self.config.minimum_row_count,
            });
        }

        if raw.n_columns() < self.config.minimum_column_count {
            failures.push(VerificationFailure::TooFewColumns {
                columns: raw.n_columns(),
                minimum: self.config.minimum_column_count,
            });
        }

        let non_finite = frame.non_finite_columns();
        if !non_finite.is_empty() {
            failures.push(VerificationFailure::NonFiniteValues(
                non_finite.into_iter().map(str::to_string).collect(),
            ));
        }

        for label in &self.detected_labels {
            if let Some((features, _, _)) = frame.split_label(label) {
                if let Err(source) = variance_selection(&features) {
                    failures.push(VerificationFailure::DegenerateFeatures {
                        label: label.clone(),
                        source,
                    });
                }
            }
        }

        if self.config.verbose {
            for failure in &failures {
                warn!("{} will not be evaluated: {failure}", self.name);
            }
        }

        self.verified = failures.is_empty();
        failures
    }

    // -- Prediction --

    /// Fit and score a forest on the whole dataset for `label`.
    ///
    /// On failure the label's previous results stay untouched.
    pub fn predict(&mut self, label: &str) -> Result<(), EvaluationError> {
        let frame = self.frame_for(label)?;
        let (initial_rows, initial_features) = self.raw_row_and_feature_count();

        let evaluation = self.fit_and_score(frame, label, initial_rows, initial_features, None)?;

        let results = self.results.entry(label.to_string()).or_default();
        results.evaluation = vec![evaluation.row];
        results.predicted = evaluation.predicted;
        results.feature_importances = evaluation.importances;
        Ok(())
    }

    /// Fit and score a forest on each contiguous partition of the dataset.
    ///
    /// A failing partition stops the run; rows of earlier partitions are kept.
    pub fn predict_splits(&mut self, label: &str) -> Result<(), EvaluationError> {
        let frame = self.frame_for(label)?;
        let total_rows = frame.n_rows();

        let mut rows = Vec::new();
        let mut outcome = Ok(());
        for range in partition_bounds(total_rows) {
            let part = frame.slice_rows(range.start, range.end);
            let features = part.n_columns().saturating_sub(1);
            match self.fit_and_score(&part, label, part.n_rows(), features, Some(total_rows)) {
                Ok(evaluation) => rows.push(evaluation.row),
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }

        sort_by_test_score(&mut rows);
        self.results.entry(label.to_string()).or_default().split_evaluation = rows;
        outcome
    }

    /// Project the standardised feature matrix onto all principal components.
    pub fn pca_analysis(&mut self, label: &str) -> Result<(), EvaluationError> {
        let frame = self.frame_for(label)?;
        let (features, _, y) = frame
            .split_label(label)
            .ok_or_else(|| EvaluationError::UnknownLabel(label.to_string()))?;

        let (selected, _) = variance_selection(&standardize(&features))?;
        let projection = project(&selected)?;

        self.results.entry(label.to_string()).or_default().pca = Some(PcaProjection {
            explained_variance_ratio: projection.explained_variance_ratio,
            components: projection.components,
            labels: y,
        });
        Ok(())
    }

    /// Re-run the whole-dataset protocol on a reduced feature set.
    pub fn evaluate_simple_data_set(&mut self, label: &str, features: &[String]) -> Result<(), EvaluationError> {
        let frame = self.frame_for(label)?;

        let mut columns: Vec<String> = features
            .iter()
            .filter(|f| f.as_str() != label && frame.contains(f))
            .cloned()
            .collect();
        if columns.is_empty() {
            return Err(EvaluationError::NoSimplifiedFeatures);
        }
        columns.push(label.to_string());

        let simple = frame.select_columns(&columns);
        let (initial_rows, initial_features) = self.raw_row_and_feature_count();
        let evaluation = self.fit_and_score(&simple, label, initial_rows, initial_features, None)?;

        self.results.entry(label.to_string()).or_default().simple_evaluation = vec![evaluation.row];
        Ok(())
    }

    fn frame_for(&self, label: &str) -> Result<&NumericFrame, EvaluationError> {
        if !self.detected_labels.iter().any(|l| l == label) {
            return Err(EvaluationError::UnknownLabel(label.to_string()));
        }
        self.preprocessed
            .as_ref()
            .ok_or_else(|| EvaluationError::NotLoaded(self.name.clone()))
    }

    /// Zero-row removal, variance selection, seeded split, forest fit and
    /// R² scoring of one frame.
    fn fit_and_score(
        &self,
        frame: &NumericFrame,
        label: &str,
        initial_rows: usize,
        initial_features: usize,
        total_rows: Option<usize>,
    ) -> Result<Evaluation, EvaluationError> {
        let (features, names, y) = frame
            .split_label(label)
            .ok_or_else(|| EvaluationError::UnknownLabel(label.to_string()))?;

        let source_rows = features.nrows();
        let (features, y) = drop_zero_rows(&features, &y);
        if features.nrows() != source_rows && self.config.verbose {
            info!(
                "{}: removed {} row(s). Source had {source_rows}.",
                self.name,
                source_rows - features.nrows()
            );
        }

        let (x, kept) = variance_selection(&features)?;
        let (train, test) = train_test_split(x.nrows(), self.config.train_fraction, self.config.random_seed)?;
        let (x_train, y_train) = take_rows(&x, &y, &train);
        let (x_test, y_test) = take_rows(&x, &y, &test);

        let train_set = Dataset::new(x_train, y_train);
        let model = self.config.forest_params().fit(&train_set)?;

        let y_train_hat: Array1<f64> = model.predict(&train_set.records);
        let y_test_hat: Array1<f64> = model.predict(&x_test);
        let train_score = r2_score(&train_set.targets, &y_train_hat);
        let test_score = r2_score(&y_test, &y_test_hat);

        // Importances are reported against the columns before selection;
        // dropped columns carry zero.
        let mut per_column = vec![0.0; names.len()];
        for (fitted, &column) in kept.iter().enumerate() {
            per_column[column] = model.feature_importances()[fitted];
        }
        let mut importances: Vec<FeatureImportance> = names
            .into_iter()
            .zip(per_column)
            .filter(|(_, importance)| *importance > self.config.importance_threshold)
            .map(|(feature, importance)| FeatureImportance { feature, importance })
            .collect();
        importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));

        Ok(Evaluation {
            row: EvaluationRow {
                file_name: self.name.clone(),
                label: label.to_string(),
                train_score,
                test_score,
                potential_over_fitting: is_potential_over_fitting(train_score, test_score),
                initial_row_count: initial_rows,
                initial_feature_count: initial_features,
                processed_row_count: x.nrows(),
                processed_feature_count: x.ncols(),
                total_rows,
            },
            predicted: y_test
                .iter()
                .zip(y_test_hat.iter())
                .map(|(&y, &y_hat)| PredictedValue { y, y_hat })
                .collect(),
            importances,
        })
    }

    // -- Accessors --

    pub fn is_merged(&self) -> bool {
        self.kind != FileKind::Source
    }

    pub fn is_loaded(&self) -> bool {
        self.preprocessed.is_some()
    }

    pub fn raw(&self) -> Option<&DataTable> {
        self.raw.as_ref()
    }

    pub fn preprocessed(&self) -> Option<&NumericFrame> {
        self.preprocessed.as_ref()
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Rows and features (columns minus the label) of the raw table.
    pub fn raw_row_and_feature_count(&self) -> (usize, usize) {
        self.raw
            .as_ref()
            .map(|raw| (raw.n_rows(), raw.n_columns().saturating_sub(1)))
            .unwrap_or((0, 0))
    }

    pub fn results(&self, label: &str) -> Option<&LabelResults> {
        self.results.get(label)
    }

    /// Whole-dataset evaluation rows of a label, empty when not evaluated.
    pub fn evaluation_rows(&self, label: &str) -> &[EvaluationRow] {
        self.results
            .get(label)
            .map(|r| r.evaluation.as_slice())
            .unwrap_or(&[])
    }

    pub fn split_evaluation_rows(&self, label: &str) -> &[EvaluationRow] {
        self.results
            .get(label)
            .map(|r| r.split_evaluation.as_slice())
            .unwrap_or(&[])
    }

    pub fn simple_evaluation_rows(&self, label: &str) -> &[EvaluationRow] {
        self.results
            .get(label)
            .map(|r| r.simple_evaluation.as_slice())
            .unwrap_or(&[])
    }

    // -- Output --

    /// Copy the source file (or export the synthesised raw table) next to
    /// the reports.
    pub fn export_provenance(&self) -> Result<()> {
        std::fs::create_dir_all(&self.folder)
            .with_context(|| format!("creating {}", self.folder.display()))?;

        match (&self.path, &self.raw) {
            (Some(path), _) => {
                let target = self.folder.join(path.file_name().unwrap_or_default());
                std::fs::copy(path, &target)
                    .with_context(|| format!("copying {} to {}", path.display(), target.display()))?;
            }
            (None, Some(raw)) => report::write_table(&self.folder.join("raw_df.csv"), raw)?,
            (None, None) => {}
        }
        Ok(())
    }

    /// Write every non-empty per-label table of this file.
    pub fn generate_reports(&self) -> Result<()> {
        std::fs::create_dir_all(&self.folder)
            .with_context(|| format!("creating {}", self.folder.display()))?;

        for (label, results) in &self.results {
            let path = |suffix: &str| self.folder.join(format!("{label}_{suffix}.csv"));
            report::write_rows(&path("evaluation_report"), &results.evaluation)?;
            report::write_rows(&path("predicted_values_report"), &results.predicted)?;
            report::write_rows(&path("split_evaluation_report"), &results.split_evaluation)?;
            report::write_rows(&path("combined_evaluation_report"), &results.combined_evaluation())?;
            report::write_rows(&path("feature_importance_report"), &results.feature_importances)?;
            report::write_rows(&path("simple_evaluation_report"), &results.simple_evaluation)?;
            if let Some(pca) = &results.pca {
                report::write_pca(&path("pca_report"), label, pca)?;
            }
        }
        Ok(())
    }

    /// Drop the raw and preprocessed tables when memory-saving mode is on.
    pub fn free_memory(&mut self) {
        if !self.config.memory_saving_mode {
            return;
        }
        self.raw = None;
        self.preprocessed = None;
    }
}

/// Version suffix of a file stem: the text after the last `_`, or the whole
/// stem when there is none.
pub fn file_version(stem: &str) -> String {
    stem.rsplit_once('_')
        .map(|(_, version)| version)
        .unwrap_or(stem)
        .to_string()
}

fn take_rows(x: &Array2<f64>, y: &Array1<f64>, rows: &[usize]) -> (Array2<f64>, Array1<f64>) {
    (x.select(Axis(0), rows), y.select(Axis(0), rows))
}
