use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use super::file::{FileEntity, FileKind, VERSION_COLUMN};
use super::results::{sort_by_test_score, EvaluationRow};
use crate::config::Config;
use crate::data::model::{CellValue, DataTable};
use crate::ml::metrics::quantile;
use crate::report;
use crate::statistics::{StatisticsRow, StatisticsSource};

/// Name of the file concatenating every verified version of a tool.
pub const MERGED_FILE_NAME: &str = "merged_tool";

/// A tool and every file (version) found for it.
///
/// Files are never removed: `verified_files` and `excluded_files` are views
/// over the same list, selected by each file's `verified` flag.
#[derive(Debug)]
pub struct ToolEntity {
    pub name: String,
    pub verified: bool,
    folder: PathBuf,
    files: Vec<FileEntity>,
    overview: Vec<EvaluationRow>,
    statistics: Vec<StatisticsRow>,
    config: Arc<Config>,
}

impl PartialEq for ToolEntity {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl ToolEntity {
    /// Create a tool and its report folder below the evaluation directory.
    pub fn new(name: &str, config: Arc<Config>) -> Self {
        let folder = config.evaluation_directory.join(name);
        let verified = match std::fs::create_dir_all(&folder) {
            Ok(()) => true,
            Err(err) => {
                warn!("Could not create folder {}: {err}", folder.display());
                false
            }
        };

        ToolEntity {
            name: name.to_string(),
            verified,
            folder,
            files: Vec::new(),
            overview: Vec::new(),
            statistics: Vec::new(),
            config,
        }
    }

    pub fn add_file(&mut self, path: &Path) {
        let file = FileEntity::from_source(path, &self.folder, self.config.clone());
        if self.config.verbose && !file.verified {
            info!("{}: {} is excluded", self.name, file.name);
        }
        self.files.push(file);
    }

    /// Demote the tool when it has no usable file, otherwise add the merged
    /// file when more than one version is verified.
    pub fn verify(&mut self) {
        if self.files.is_empty() {
            self.demote("does not contain any files");
            return;
        }

        debug!(
            "{}: {} verified file(s), {} excluded",
            self.name,
            self.verified_files().count(),
            self.excluded_files().count()
        );

        if self.verified_files().count() == 0 {
            self.demote("does not contain any verified files");
            return;
        }

        if !self.config.memory_saving_mode {
            self.add_merged_file();
        }
    }

    fn demote(&mut self, reason: &str) {
        if self.config.verbose {
            info!("Tool {} {reason}", self.name);
        }
        self.verified = false;
        if self.folder.exists() {
            if let Err(err) = std::fs::remove_dir_all(&self.folder) {
                warn!("Could not remove {}: {err}", self.folder.display());
            }
        }
    }

    /// Concatenate all verified source versions into one tagged file.
    fn add_merged_file(&mut self) {
        if self.files.iter().any(|f| f.kind == FileKind::Merged) {
            return;
        }
        let sources: Vec<&FileEntity> = self.verified_files().filter(|f| !f.is_merged()).collect();
        if sources.len() <= 1 {
            return;
        }

        let Some(table) = merge_versions(&sources) else {
            return;
        };
        let merged = FileEntity::merged(
            MERGED_FILE_NAME,
            FileKind::Merged,
            table,
            &self.folder,
            self.config.clone(),
        );
        if self.config.verbose && !merged.verified {
            info!("{}: merged file is excluded", self.name);
        }
        self.files.push(merged);
    }

    /// Load data deferred by memory-saving mode, re-check the verified set and
    /// build the merged file.
    pub fn load_deferred_data(&mut self) {
        if !self.config.memory_saving_mode {
            return;
        }
        for file in &mut self.files {
            file.load_memory_sensitive_data();
        }
        if self.verified_files().count() == 0 {
            self.demote("does not contain any verified files");
            return;
        }
        self.add_merged_file();
    }

    // -- Evaluation --

    /// Evaluate every verified file for each of its detected labels.
    pub fn evaluate(&mut self) {
        info!("Evaluating tool {}", self.name);

        if self.config.memory_saving_mode {
            self.load_deferred_data();
            if !self.verified {
                return;
            }
        }

        for file in self.files.iter_mut().filter(|f| f.verified) {
            evaluate_file(file);
        }
    }

    /// Rebuild the per-label overview from the whole-dataset rows.
    pub fn generate_overview_data_sets(&mut self) {
        self.overview = self
            .verified_files()
            .flat_map(|file| {
                file.detected_labels
                    .iter()
                    .flat_map(move |label| file.evaluation_rows(label).iter().cloned())
            })
            .collect();
    }

    /// Add one best-version merge per label. A version qualifies when its test
    /// score reaches the configured quantile of the label's scores; fewer than
    /// two qualifying versions skip the label.
    pub fn prepare_additional_files(&mut self) {
        if self.verified_files().count() <= 1 {
            return;
        }

        for label in self.overview_labels() {
            let name = format!("{label}_best_version_merged_file");
            if self.files.iter().any(|f| f.name == name) {
                continue;
            }

            let rows = self.files_label_overview(&label);
            let scores: Vec<f64> = rows.iter().map(|r| r.test_score).collect();
            let Some(threshold) = quantile(&scores, self.config.best_version_quantile) else {
                continue;
            };
            let best: BTreeSet<&str> = rows
                .iter()
                .filter(|r| r.test_score >= threshold)
                .map(|r| r.file_name.as_str())
                .collect();

            let candidates: Vec<&FileEntity> = self
                .verified_files()
                .filter(|f| !f.is_merged() && best.contains(f.name.as_str()))
                .collect();
            if candidates.len() < 2 {
                debug!("{}: fewer than two best versions for {label}", self.name);
                continue;
            }

            let Some(table) = merge_versions(&candidates) else {
                continue;
            };
            let merged = FileEntity::merged(
                &name,
                FileKind::BestVersionMerge { label: label.clone() },
                table,
                &self.folder,
                self.config.clone(),
            );
            self.files.push(merged);
        }
    }

    /// Evaluate verified files added after the first evaluation pass.
    pub fn evaluate_additional_files(&mut self) {
        for file in self.files.iter_mut().filter(|f| f.verified && !f.evaluated) {
            evaluate_file(file);
        }
    }

    /// Re-evaluate every verified file with the important features of the
    /// label's best performing version.
    pub fn create_simple_data_sets(&mut self) {
        for label in self.overview_labels() {
            let Some(best) = self.get_best_performing_version(&label) else {
                continue;
            };
            let features: Vec<String> = self
                .files
                .iter()
                .find(|f| f.name == best.file_name)
                .and_then(|f| f.results(&label))
                .map(|r| r.feature_importances.iter().map(|i| i.feature.clone()).collect())
                .unwrap_or_default();
            if features.is_empty() {
                debug!("{}: no important features for {label}", self.name);
                continue;
            }

            for file in self
                .files
                .iter_mut()
                .filter(|f| f.verified && f.detected_labels.contains(&label))
            {
                if let Err(err) = file.evaluate_simple_data_set(&label, &features) {
                    warn!("{}: simplified evaluation of {label} failed: {err}", file.name);
                }
            }
        }
    }

    /// Rebuild the mean/median/correlation table from the current results.
    pub fn calculate_tool_statistics(&mut self) {
        let mut statistics = Vec::new();

        for source in StatisticsSource::ALL {
            for label in &self.config.labels {
                let rows: Vec<&EvaluationRow> = self
                    .verified_files()
                    .flat_map(|file| match source {
                        StatisticsSource::WholeDataSet => file.evaluation_rows(label),
                        StatisticsSource::SplitDataSet => file.split_evaluation_rows(label),
                        StatisticsSource::SimpleDataSet => file.simple_evaluation_rows(label),
                        StatisticsSource::BestVersionMerge => match file.kind {
                            FileKind::BestVersionMerge { .. } => file.evaluation_rows(label),
                            _ => &[][..],
                        },
                    })
                    .collect();

                if let Some(row) = StatisticsRow::summarize(source, label, &rows) {
                    statistics.push(row);
                }
            }
        }

        self.statistics = statistics;
    }

    // -- Queries --

    pub fn files(&self) -> &[FileEntity] {
        &self.files
    }

    /// Files discovered on disk, verified or not.
    pub fn all_files(&self) -> impl Iterator<Item = &FileEntity> {
        self.files.iter().filter(|f| !f.is_merged())
    }

    pub fn verified_files(&self) -> impl Iterator<Item = &FileEntity> {
        self.files.iter().filter(|f| f.verified)
    }

    pub fn excluded_files(&self) -> impl Iterator<Item = &FileEntity> {
        self.files.iter().filter(|f| !f.verified)
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn overview(&self) -> &[EvaluationRow] {
        &self.overview
    }

    pub fn statistics(&self) -> &[StatisticsRow] {
        &self.statistics
    }

    /// Labels of the overview, in order of first appearance.
    pub fn overview_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for row in &self.overview {
            if !labels.contains(&row.label) {
                labels.push(row.label.clone());
            }
        }
        labels
    }

    pub fn files_label_overview(&self, label: &str) -> Vec<&EvaluationRow> {
        self.overview.iter().filter(|r| r.label == label).collect()
    }

    /// Overview row with the highest test score for a label.
    pub fn get_best_performing_version(&self, label: &str) -> Option<&EvaluationRow> {
        self.files_label_overview(label)
            .into_iter()
            .max_by(|a, b| a.test_score.total_cmp(&b.test_score))
    }

    /// Overview row with the lowest test score for a label.
    pub fn get_worst_performing_version(&self, label: &str) -> Option<&EvaluationRow> {
        self.files_label_overview(label)
            .into_iter()
            .min_by(|a, b| a.test_score.total_cmp(&b.test_score))
    }

    // -- Output --

    /// Write per-file reports, the sorted per-label overviews and the
    /// statistics table into the tool folder.
    pub fn generate_reports(&self) -> Result<()> {
        std::fs::create_dir_all(&self.folder)
            .with_context(|| format!("creating {}", self.folder.display()))?;

        for file in self.verified_files() {
            file.generate_reports()
                .with_context(|| format!("reports of {}", file.name))?;
        }

        for label in self.overview_labels() {
            let mut rows: Vec<EvaluationRow> = self.files_label_overview(&label).into_iter().cloned().collect();
            sort_by_test_score(&mut rows);
            report::write_rows(&self.folder.join(format!("{label}_overview_files_report.csv")), &rows)?;
        }

        report::write_rows(&self.folder.join("tool_statistics_report.csv"), &self.statistics)?;
        Ok(())
    }

    pub fn free_memory(&mut self) {
        if !self.config.memory_saving_mode {
            return;
        }
        if self.config.verbose {
            info!("{}: releasing data", self.name);
        }
        for file in &mut self.files {
            file.free_memory();
        }
    }
}

/// Prediction, split prediction and PCA for every detected label, then
/// provenance export. Failures are logged and the next step runs.
fn evaluate_file(file: &mut FileEntity) {
    if file.detected_labels.is_empty() {
        warn!("{}: none of the configured labels found", file.name);
    }

    for label in file.detected_labels.clone() {
        let steps = [
            ("prediction", file.predict(&label)),
            ("split prediction", file.predict_splits(&label)),
            ("PCA", file.pca_analysis(&label)),
        ];
        for (step, outcome) in steps {
            match outcome {
                Ok(()) => {}
                Err(err) if err.is_validation() => info!("{}: skipped {step} of {label}: {err}", file.name),
                Err(err) => warn!("{}: {step} of {label} failed: {err}", file.name),
            }
        }
    }

    if let Err(err) = file.export_provenance() {
        warn!("{}: {err:#}", file.name);
    }
    file.evaluated = true;
}

/// Inner-join concatenation of the raw tables, each tagged with its version.
fn merge_versions(files: &[&FileEntity]) -> Option<DataTable> {
    let tables: Vec<DataTable> = files
        .iter()
        .map(|file| {
            file.raw()
                .cloned()
                .map(|raw| raw.with_tag_column(VERSION_COLUMN, CellValue::String(file.version.clone())))
        })
        .collect::<Option<_>>()?;
    Some(DataTable::concat_inner(&tables))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> Arc<Config> {
        Arc::new(Config {
            evaluation_directory: dir.path().join("Evaluations"),
            labels: vec!["runtime".into()],
            minimum_row_count: 10,
            forest_estimators: 6,
            forest_max_depth: Some(5),
            ..Config::default()
        })
    }

    /// `runtime = slope * size + threads`, `rows` rows.
    fn write_version(dir: &Path, name: &str, rows: usize, slope: f64) -> PathBuf {
        let path = dir.join(name);
        let mut content = String::from("size,threads,host,runtime\n");
        for i in 0..rows {
            let threads = (i % 3 + 1) as f64;
            let size = (i + 1) as f64;
            content.push_str(&format!("{size},{threads},node{},{}\n", i % 2, slope * size + threads));
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    fn tool_with_versions(dir: &TempDir, versions: &[(&str, usize)]) -> ToolEntity {
        let raw = dir.path().join("raw");
        std::fs::create_dir_all(&raw).unwrap();

        let mut tool = ToolEntity::new("sorter", config(dir));
        for (i, (version, rows)) in versions.iter().enumerate() {
            let path = write_version(&raw, &format!("sorter_{version}.csv"), *rows, 1.0 + i as f64);
            tool.add_file(&path);
        }
        tool.verify();
        tool
    }

    #[test]
    fn tool_without_files_is_demoted() {
        let dir = TempDir::new().unwrap();
        let mut tool = ToolEntity::new("empty", config(&dir));
        assert!(tool.folder().exists());

        tool.verify();
        assert!(!tool.verified);
        assert!(!tool.folder().exists());
    }

    #[test]
    fn tool_without_verified_files_is_demoted() {
        let dir = TempDir::new().unwrap();
        let tool = tool_with_versions(&dir, &[("1.0", 3)]);
        assert!(!tool.verified);
        assert_eq!(tool.excluded_files().count(), 1);
        assert!(!tool.folder().exists());
    }

    #[test]
    fn equality_is_by_name() {
        let dir = TempDir::new().unwrap();
        let a = ToolEntity::new("bwa", config(&dir));
        let b = ToolEntity::new("bwa", config(&dir));
        let c = ToolEntity::new("star", config(&dir));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn merged_file_concatenates_verified_versions() {
        let dir = TempDir::new().unwrap();
        let tool = tool_with_versions(&dir, &[("1.0", 30), ("2.0", 40), ("3.0", 2)]);

        assert!(tool.verified);
        assert_eq!(tool.all_files().count(), 3);
        let merged = tool.files().iter().find(|f| f.name == MERGED_FILE_NAME).unwrap();
        assert!(merged.verified);

        let raw = merged.raw().unwrap();
        assert_eq!(raw.n_rows(), 70);
        let versions: Vec<String> = raw.unique_values(VERSION_COLUMN).iter().map(|v| v.to_string()).collect();
        assert_eq!(versions, vec!["1.0", "2.0"]);
        // The version tag is text and never reaches the model.
        assert!(!merged.preprocessed().unwrap().contains(VERSION_COLUMN));
    }

    #[test]
    fn single_version_gets_no_merge() {
        let dir = TempDir::new().unwrap();
        let tool = tool_with_versions(&dir, &[("1.0", 30)]);
        assert!(tool.verified);
        assert_eq!(tool.files().len(), 1);
    }

    #[test]
    fn overview_is_rebuilt_not_appended() {
        let dir = TempDir::new().unwrap();
        let mut tool = tool_with_versions(&dir, &[("1.0", 30), ("2.0", 30)]);
        tool.evaluate();

        tool.generate_overview_data_sets();
        let first = tool.overview().to_vec();
        tool.generate_overview_data_sets();
        assert_eq!(tool.overview(), first.as_slice());
        assert_eq!(first.len(), 3);

        let best = tool.get_best_performing_version("runtime").unwrap();
        let worst = tool.get_worst_performing_version("runtime").unwrap();
        assert!(best.test_score >= worst.test_score);
        assert!(tool.get_best_performing_version("memtotal").is_none());
    }

    fn overview_row(file_name: &str, test_score: f64) -> EvaluationRow {
        EvaluationRow {
            file_name: file_name.into(),
            label: "runtime".into(),
            train_score: 0.95,
            test_score,
            potential_over_fitting: false,
            initial_row_count: 30,
            initial_feature_count: 3,
            processed_row_count: 30,
            processed_feature_count: 2,
            total_rows: None,
        }
    }

    fn tool_with_scores(dir: &TempDir, scores: [f64; 3]) -> ToolEntity {
        let mut tool = tool_with_versions(dir, &[("1.0", 30), ("2.0", 30), ("3.0", 30)]);
        tool.overview = ["sorter_1.0", "sorter_2.0", "sorter_3.0"]
            .iter()
            .zip(scores)
            .map(|(name, score)| overview_row(name, score))
            .collect();
        tool
    }

    #[test]
    fn single_best_version_skips_the_merge() {
        let dir = TempDir::new().unwrap();
        // 0.7 quantile of [0.3, 0.8, 0.9] is 0.84: only one version reaches it.
        let mut tool = tool_with_scores(&dir, [0.9, 0.8, 0.3]);

        let before = tool.files().len();
        tool.prepare_additional_files();
        assert_eq!(tool.files().len(), before);
    }

    #[test]
    fn two_best_versions_are_merged() {
        let dir = TempDir::new().unwrap();
        let mut tool = tool_with_scores(&dir, [0.9, 0.9, 0.3]);

        let before = tool.files().len();
        tool.prepare_additional_files();
        assert_eq!(tool.files().len(), before + 1);

        let merge = tool.files().last().unwrap();
        assert_eq!(merge.kind, FileKind::BestVersionMerge { label: "runtime".into() });
        assert_eq!(merge.raw().unwrap().n_rows(), 60);

        // Already present: a second pass adds nothing.
        tool.prepare_additional_files();
        assert_eq!(tool.files().len(), before + 1);
    }

    #[test]
    fn full_tool_run_writes_reports() {
        let dir = TempDir::new().unwrap();
        let mut tool = tool_with_versions(&dir, &[("1.0", 30), ("2.0", 35), ("3.0", 40)]);
        tool.evaluate();
        tool.generate_overview_data_sets();
        tool.prepare_additional_files();
        tool.evaluate_additional_files();
        tool.create_simple_data_sets();
        tool.generate_overview_data_sets();
        tool.calculate_tool_statistics();
        tool.generate_reports().unwrap();

        assert!(tool.files().iter().filter(|f| f.verified).all(|f| f.evaluated));
        assert!(tool
            .statistics()
            .iter()
            .any(|s| s.source == StatisticsSource::WholeDataSet && s.label == "runtime"));

        let folder = tool.folder();
        assert!(folder.join("runtime_overview_files_report.csv").exists());
        assert!(folder.join("tool_statistics_report.csv").exists());
        assert!(folder.join("sorter_1.0").join("sorter_1.0.csv").exists());
        assert!(folder.join("sorter_1.0").join("runtime_evaluation_report.csv").exists());
        assert!(folder.join(MERGED_FILE_NAME).join("raw_df.csv").exists());

        // Statistics are recomputed, never duplicated.
        let count = tool.statistics().len();
        tool.calculate_tool_statistics();
        assert_eq!(tool.statistics().len(), count);
    }

    #[test]
    fn memory_saving_mode_defers_the_merge() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("raw");
        std::fs::create_dir_all(&raw).unwrap();
        let config = Arc::new(Config {
            memory_saving_mode: true,
            ..(*config(&dir)).clone()
        });

        let mut tool = ToolEntity::new("sorter", config);
        tool.add_file(&write_version(&raw, "sorter_1.csv", 30, 1.0));
        tool.add_file(&write_version(&raw, "sorter_2.csv", 30, 2.0));
        tool.verify();
        assert_eq!(tool.files().len(), 2);

        tool.evaluate();
        assert_eq!(tool.files().len(), 3);
        assert!(tool.files().iter().all(|f| f.evaluated));

        tool.free_memory();
        assert!(tool.files().iter().all(|f| f.raw().is_none()));
    }
}
