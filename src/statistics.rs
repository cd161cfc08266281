//! Score statistics per tool and across the whole corpus.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::entity::results::EvaluationRow;
use crate::entity::tool::ToolEntity;
use crate::ml::metrics::{mean, median, pearson};
use crate::report;

/// Which evaluation a statistic is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatisticsSource {
    #[serde(rename = "Whole Data Set")]
    WholeDataSet,
    #[serde(rename = "Split Data Set")]
    SplitDataSet,
    #[serde(rename = "Simple Data Set")]
    SimpleDataSet,
    #[serde(rename = "Best Version Merge")]
    BestVersionMerge,
}

impl StatisticsSource {
    pub const ALL: [StatisticsSource; 4] = [
        StatisticsSource::WholeDataSet,
        StatisticsSource::SplitDataSet,
        StatisticsSource::SimpleDataSet,
        StatisticsSource::BestVersionMerge,
    ];
}

impl fmt::Display for StatisticsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatisticsSource::WholeDataSet => "Whole Data Set",
            StatisticsSource::SplitDataSet => "Split Data Set",
            StatisticsSource::SimpleDataSet => "Simple Data Set",
            StatisticsSource::BestVersionMerge => "Best Version Merge",
        };
        f.write_str(name)
    }
}

/// Mean and median test score of one label, plus the correlation between
/// test score and processed feature count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsRow {
    #[serde(rename = "Data")]
    pub source: StatisticsSource,
    #[serde(rename = "Label")]
    pub label: String,
    #[serde(rename = "Mean")]
    pub mean: f64,
    #[serde(rename = "Median")]
    pub median: f64,
    /// Undefined for fewer than two rows or constant inputs.
    #[serde(rename = "Correlation")]
    pub correlation: Option<f64>,
}

impl StatisticsRow {
    /// `None` when there are no rows to summarise.
    pub fn summarize(source: StatisticsSource, label: &str, rows: &[&EvaluationRow]) -> Option<Self> {
        let scores: Vec<f64> = rows.iter().map(|r| r.test_score).collect();
        let feature_counts: Vec<f64> = rows.iter().map(|r| r.processed_feature_count as f64).collect();

        Some(StatisticsRow {
            source,
            label: label.to_string(),
            mean: mean(&scores)?,
            median: median(&scores)?,
            correlation: pearson(&scores, &feature_counts),
        })
    }
}

// ---------------------------------------------------------------------------
// Corpus-wide tables
// ---------------------------------------------------------------------------

/// Kind of run an evaluation row comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Origin {
    Whole,
    Split,
    Simple,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolEvaluationRow {
    #[serde(rename = "Tool")]
    pub tool: String,
    #[serde(rename = "Origin")]
    pub origin: Origin,
    #[serde(rename = "File Name")]
    pub file_name: String,
    #[serde(rename = "Label")]
    pub label: String,
    #[serde(rename = "Train Score")]
    pub train_score: f64,
    #[serde(rename = "Test Score")]
    pub test_score: f64,
    #[serde(rename = "Potential Over Fitting")]
    pub potential_over_fitting: bool,
    #[serde(rename = "Processed Row Count")]
    pub processed_row_count: usize,
    #[serde(rename = "Processed Feature Count")]
    pub processed_feature_count: usize,
}

impl ToolEvaluationRow {
    fn new(tool: &str, origin: Origin, row: &EvaluationRow) -> Self {
        ToolEvaluationRow {
            tool: tool.to_string(),
            origin,
            file_name: row.file_name.clone(),
            label: row.label.clone(),
            train_score: row.train_score,
            test_score: row.test_score,
            potential_over_fitting: row.potential_over_fitting,
            processed_row_count: row.processed_row_count,
            processed_feature_count: row.processed_feature_count,
        }
    }
}

/// Test-score gap between the best and worst source version of a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceDifferenceRow {
    #[serde(rename = "Tool")]
    pub tool: String,
    #[serde(rename = "Label")]
    pub label: String,
    #[serde(rename = "Best Version")]
    pub best_version: String,
    #[serde(rename = "Worst Version")]
    pub worst_version: String,
    #[serde(rename = "Difference")]
    pub difference: f64,
    #[serde(rename = "Versions")]
    pub versions: usize,
}

/// A tool statistics row tagged with its tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolStatisticsRow {
    #[serde(rename = "Tool")]
    pub tool: String,
    #[serde(rename = "Data")]
    pub source: StatisticsSource,
    #[serde(rename = "Label")]
    pub label: String,
    #[serde(rename = "Mean")]
    pub mean: f64,
    #[serde(rename = "Median")]
    pub median: f64,
    #[serde(rename = "Correlation")]
    pub correlation: Option<f64>,
}

/// Tables aggregated over every verified tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpusStatistics {
    /// Whole, split and simple rows of every verified file.
    pub all_tools_evaluations: Vec<ToolEvaluationRow>,
    pub all_tools_performance_difference: Vec<PerformanceDifferenceRow>,
    /// Subset of the above for tools with at least two source versions.
    pub multi_tools_performance_difference: Vec<PerformanceDifferenceRow>,
    pub whole_data_set_test_scores: Vec<ToolStatisticsRow>,
    pub simple_data_set_test_scores: Vec<ToolStatisticsRow>,
    /// Whole-dataset rows of the synthesised merge files.
    pub all_merged_files_evaluations: Vec<ToolEvaluationRow>,
}

impl CorpusStatistics {
    pub fn from_tools(tools: &[ToolEntity]) -> Self {
        let mut stats = CorpusStatistics::default();

        for tool in tools.iter().filter(|t| t.verified) {
            for file in tool.verified_files() {
                for label in &file.detected_labels {
                    let origins = [
                        (Origin::Whole, file.evaluation_rows(label)),
                        (Origin::Split, file.split_evaluation_rows(label)),
                        (Origin::Simple, file.simple_evaluation_rows(label)),
                    ];
                    for (origin, rows) in origins {
                        stats
                            .all_tools_evaluations
                            .extend(rows.iter().map(|r| ToolEvaluationRow::new(&tool.name, origin, r)));
                    }

                    if file.is_merged() {
                        stats.all_merged_files_evaluations.extend(
                            file.evaluation_rows(label)
                                .iter()
                                .map(|r| ToolEvaluationRow::new(&tool.name, Origin::Whole, r)),
                        );
                    }
                }
            }

            for label in tool.overview_labels() {
                if let Some(row) = performance_difference(tool, &label) {
                    if row.versions >= 2 {
                        stats.multi_tools_performance_difference.push(row.clone());
                    }
                    stats.all_tools_performance_difference.push(row);
                }
            }

            for row in tool.statistics() {
                let tagged = ToolStatisticsRow {
                    tool: tool.name.clone(),
                    source: row.source,
                    label: row.label.clone(),
                    mean: row.mean,
                    median: row.median,
                    correlation: row.correlation,
                };
                match row.source {
                    StatisticsSource::WholeDataSet => stats.whole_data_set_test_scores.push(tagged),
                    StatisticsSource::SimpleDataSet => stats.simple_data_set_test_scores.push(tagged),
                    _ => {}
                }
            }
        }

        stats
    }

    /// Write every non-empty table as `<table name>.csv` into `dir`.
    pub fn write_csv_files(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

        report::write_rows(&dir.join("all_tools_evaluations.csv"), &self.all_tools_evaluations)?;
        report::write_rows(
            &dir.join("all_tools_performance_difference.csv"),
            &self.all_tools_performance_difference,
        )?;
        report::write_rows(
            &dir.join("multi_tools_performance_difference.csv"),
            &self.multi_tools_performance_difference,
        )?;
        report::write_rows(&dir.join("whole_data_set_test_scores.csv"), &self.whole_data_set_test_scores)?;
        report::write_rows(&dir.join("simple_data_set_test_scores.csv"), &self.simple_data_set_test_scores)?;
        report::write_rows(
            &dir.join("all_merged_files_evaluations.csv"),
            &self.all_merged_files_evaluations,
        )?;
        Ok(())
    }
}

/// Best minus worst test score among the tool's source versions.
fn performance_difference(tool: &ToolEntity, label: &str) -> Option<PerformanceDifferenceRow> {
    let sources: Vec<&EvaluationRow> = tool
        .all_files()
        .filter(|f| f.verified)
        .flat_map(|f| f.evaluation_rows(label))
        .collect();

    let best = sources.iter().max_by(|a, b| a.test_score.total_cmp(&b.test_score))?;
    let worst = sources.iter().min_by(|a, b| a.test_score.total_cmp(&b.test_score))?;

    Some(PerformanceDifferenceRow {
        tool: tool.name.clone(),
        label: label.to_string(),
        best_version: best.file_name.clone(),
        worst_version: worst.file_name.clone(),
        difference: best.test_score - worst.test_score,
        versions: sources.len(),
    })
}
