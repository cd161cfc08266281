use ndarray::{Array1, Array2};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Report rows
// ---------------------------------------------------------------------------

/// One model evaluation: a full-set run, one partition of a split run, or a
/// run on a simplified feature set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRow {
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
    #[serde(rename = "Initial Row Count")]
    pub initial_row_count: usize,
    #[serde(rename = "Initial Feature Count")]
    pub initial_feature_count: usize,
    #[serde(rename = "Processed Row Count")]
    pub processed_row_count: usize,
    #[serde(rename = "Processed Feature Count")]
    pub processed_feature_count: usize,
    /// Rows of the whole dataset, only set for partition rows.
    #[serde(rename = "Total Rows")]
    pub total_rows: Option<usize>,
}

/// Heuristic over-fitting guard: the train score exceeds twice the test
/// score. A ratio check, not a statistical test.
pub fn is_potential_over_fitting(train_score: f64, test_score: f64) -> bool {
    train_score > test_score * 2.0
}

/// A held-out target next to its prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictedValue {
    pub y: f64,
    pub y_hat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    #[serde(rename = "Feature")]
    pub feature: String,
    #[serde(rename = "Gini Importance")]
    pub importance: f64,
}

/// A whole-set or split evaluation row flagged by origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedEvaluationRow {
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
    #[serde(rename = "Split")]
    pub split: bool,
}

impl CombinedEvaluationRow {
    fn from_row(row: &EvaluationRow, split: bool) -> Self {
        Self {
            file_name: row.file_name.clone(),
            label: row.label.clone(),
            train_score: row.train_score,
            test_score: row.test_score,
            potential_over_fitting: row.potential_over_fitting,
            processed_row_count: row.processed_row_count,
            processed_feature_count: row.processed_feature_count,
            split,
        }
    }
}

// ---------------------------------------------------------------------------
// Dimensionality analysis
// ---------------------------------------------------------------------------

/// PCA of one label's feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct PcaProjection {
    /// Share of variance per component, descending.
    pub explained_variance_ratio: Array1<f64>,
    /// Samples projected onto all components, one row per sample.
    pub components: Array2<f64>,
    /// Label value of each sample.
    pub labels: Array1<f64>,
}

impl PcaProjection {
    /// The first `k` components of every sample paired with its label.
    pub fn leading(&self, k: usize) -> Vec<(Vec<f64>, f64)> {
        let k = k.min(self.components.ncols());
        self.components
            .rows()
            .into_iter()
            .zip(self.labels.iter())
            .map(|(row, &label)| (row.iter().take(k).copied().collect(), label))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Per-label artifacts
// ---------------------------------------------------------------------------

/// Everything a file produces for one label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelResults {
    /// Full-dataset evaluation, at most one row.
    pub evaluation: Vec<EvaluationRow>,
    /// Held-out `(y, ŷ)` pairs of the full-dataset run.
    pub predicted: Vec<PredictedValue>,
    /// One row per partition, sorted by test score descending.
    pub split_evaluation: Vec<EvaluationRow>,
    /// Features above the importance threshold, most important first.
    pub feature_importances: Vec<FeatureImportance>,
    pub pca: Option<PcaProjection>,
    /// Evaluation on the tool's simplified feature set.
    pub simple_evaluation: Vec<EvaluationRow>,
}

impl LabelResults {
    /// Whole-set and split rows in one table.
    pub fn combined_evaluation(&self) -> Vec<CombinedEvaluationRow> {
        self.split_evaluation
            .iter()
            .map(|row| CombinedEvaluationRow::from_row(row, true))
            .chain(self.evaluation.iter().map(|row| CombinedEvaluationRow::from_row(row, false)))
            .collect()
    }
}

/// Sort evaluation rows by test score, best first.
pub fn sort_by_test_score(rows: &mut [EvaluationRow]) {
    rows.sort_by(|a, b| b.test_score.total_cmp(&a.test_score));
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn row(name: &str, test_score: f64) -> EvaluationRow {
        EvaluationRow {
            file_name: name.to_string(),
            label: "runtime".to_string(),
            train_score: 0.9,
            test_score,
            potential_over_fitting: is_potential_over_fitting(0.9, test_score),
            initial_row_count: 10,
            initial_feature_count: 3,
            processed_row_count: 10,
            processed_feature_count: 3,
            total_rows: None,
        }
    }

    #[test]
    fn over_fitting_is_a_ratio_guard() {
        assert!(is_potential_over_fitting(0.9, 0.4));
        assert!(!is_potential_over_fitting(0.9, 0.45));
        assert!(is_potential_over_fitting(0.1, -0.2));
    }

    #[test]
    fn combined_rows_are_flagged() {
        let results = LabelResults {
            evaluation: vec![row("a", 0.7)],
            split_evaluation: vec![row("a", 0.8), row("a", 0.6)],
            ..Default::default()
        };
        let combined = results.combined_evaluation();
        assert_eq!(combined.len(), 3);
        assert_eq!(combined.iter().filter(|r| r.split).count(), 2);
        assert!(!combined[2].split);
    }

    #[test]
    fn sorting_puts_best_first() {
        let mut rows = vec![row("a", 0.2), row("b", 0.9), row("c", 0.5)];
        sort_by_test_score(&mut rows);
        let names: Vec<_> = rows.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
    }

    #[test]
    fn leading_components_pair_with_labels() {
        let projection = PcaProjection {
            explained_variance_ratio: array![0.7, 0.2, 0.1],
            components: array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            labels: array![10.0, 20.0],
        };
        let leading = projection.leading(2);
        assert_eq!(leading, vec![(vec![1.0, 2.0], 10.0), (vec![4.0, 5.0], 20.0)]);
    }
}
