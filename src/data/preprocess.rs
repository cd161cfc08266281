use ndarray::{Array1, Array2, Axis};
use thiserror::Error;

use super::model::{CellValue, DataTable};

/// Failures of variance-based feature selection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("feature matrix is empty")]
    Empty,

    #[error("no feature survives variance selection ({0} near-constant)")]
    NoFeaturesLeft(usize),
}

// ---------------------------------------------------------------------------
// NumericFrame – the preprocessed table
// ---------------------------------------------------------------------------

/// A cleaned, fully numeric table: named columns over an `Array2<f64>`.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericFrame {
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl Default for NumericFrame {
    fn default() -> Self {
        NumericFrame {
            columns: Vec::new(),
            values: Array2::zeros((0, 0)),
        }
    }
}

impl NumericFrame {
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Separate a label column from the features.
    ///
    /// Returns `None` when the label is not a column of the frame.
    pub fn split_label(&self, label: &str) -> Option<(Array2<f64>, Vec<String>, Array1<f64>)> {
        let label_idx = self.column_index(label)?;
        let feature_idx: Vec<usize> = (0..self.n_columns()).filter(|&i| i != label_idx).collect();
        let features = self.values.select(Axis(1), &feature_idx);
        let names = feature_idx.iter().map(|&i| self.columns[i].clone()).collect();
        let y = self.values.column(label_idx).to_owned();
        Some((features, names, y))
    }

    /// Restrict the frame to the given columns (unknown names are skipped).
    pub fn select_columns(&self, names: &[String]) -> NumericFrame {
        let indices: Vec<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        NumericFrame {
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
            values: self.values.select(Axis(1), &indices),
        }
    }

    /// Contiguous row range `[start, end)`.
    pub fn slice_rows(&self, start: usize, end: usize) -> NumericFrame {
        let indices: Vec<usize> = (start..end).collect();
        NumericFrame {
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), &indices),
        }
    }

    /// Names of the columns holding at least one NaN or infinite value.
    pub fn non_finite_columns(&self) -> Vec<&str> {
        self.values
            .axis_iter(Axis(1))
            .zip(&self.columns)
            .filter(|(col, _)| col.iter().any(|v| !v.is_finite()))
            .map(|(_, name)| name.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Clean a raw table into a numeric frame.
///
/// * integers, floats and booleans become `f64`
/// * null cells become `0.0`
/// * columns holding any non-numeric text are dropped
/// * columns holding nothing but nulls are dropped
pub fn preprocess(table: &DataTable) -> NumericFrame {
    let kept: Vec<usize> = (0..table.n_columns())
        .filter(|&col| {
            let mut any_value = false;
            for row in &table.rows {
                match &row[col] {
                    CellValue::String(_) => return false,
                    CellValue::Null => {}
                    _ => any_value = true,
                }
            }
            any_value
        })
        .collect();

    let mut values = Array2::zeros((table.n_rows(), kept.len()));
    for (r, row) in table.rows.iter().enumerate() {
        for (c, &col) in kept.iter().enumerate() {
            values[[r, c]] = row[col].as_f64().unwrap_or(0.0);
        }
    }

    NumericFrame {
        columns: kept.iter().map(|&i| table.headers[i].clone()).collect(),
        values,
    }
}

/// Remove zero-variance feature columns.
///
/// Returns the filtered matrix together with the indices (into the input)
/// of the surviving columns.
pub fn variance_selection(x: &Array2<f64>) -> Result<(Array2<f64>, Vec<usize>), SelectionError> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(SelectionError::Empty);
    }

    let kept: Vec<usize> = x
        .axis_iter(Axis(1))
        .enumerate()
        .filter(|(_, col)| col.var(0.0) > 0.0)
        .map(|(i, _)| i)
        .collect();

    if kept.is_empty() {
        return Err(SelectionError::NoFeaturesLeft(x.ncols()));
    }

    Ok((x.select(Axis(1), &kept), kept))
}

/// Scale every column to zero mean and unit variance.
/// Constant columns end up all zero.
pub fn standardize(x: &Array2<f64>) -> Array2<f64> {
    let mut out = x.clone();
    for mut col in out.axis_iter_mut(Axis(1)) {
        let mean = col.mean().unwrap_or(0.0);
        let std = col.std(0.0);
        let scale = if std > 0.0 { std } else { 1.0 };
        col.mapv_inplace(|v| (v - mean) / scale);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn raw() -> DataTable {
        DataTable::new(
            vec!["threads".into(), "tool".into(), "empty".into(), "paired".into(), "runtime".into()],
            vec![
                vec![
                    CellValue::Integer(2),
                    CellValue::String("bwa".into()),
                    CellValue::Null,
                    CellValue::Bool(true),
                    CellValue::Float(1.5),
                ],
                vec![
                    CellValue::Null,
                    CellValue::String("bwa".into()),
                    CellValue::Null,
                    CellValue::Bool(false),
                    CellValue::Float(2.5),
                ],
            ],
        )
    }

    #[test]
    fn preprocess_drops_text_and_empty_columns() {
        let frame = preprocess(&raw());
        assert_eq!(frame.columns, vec!["threads", "paired", "runtime"]);
        assert_eq!(frame.values, array![[2.0, 1.0, 1.5], [0.0, 0.0, 2.5]]);
    }

    #[test]
    fn preprocess_is_deterministic() {
        let once = preprocess(&raw());
        let twice = preprocess(&raw());
        assert_eq!(once, twice);
    }

    #[test]
    fn split_label_separates_target() {
        let frame = preprocess(&raw());
        let (x, names, y) = frame.split_label("runtime").unwrap();
        assert_eq!(names, vec!["threads", "paired"]);
        assert_eq!(x.ncols(), 2);
        assert_eq!(y, array![1.5, 2.5]);
        assert!(frame.split_label("memtotal").is_none());
    }

    #[test]
    fn variance_selection_removes_constant_columns() {
        let x = array![[1.0, 5.0, 0.0], [2.0, 5.0, 1.0], [3.0, 5.0, 0.0]];
        let (selected, kept) = variance_selection(&x).unwrap();
        assert_eq!(kept, vec![0, 2]);
        assert_eq!(selected.ncols(), 2);
    }

    #[test]
    fn variance_selection_degenerates_when_everything_is_constant() {
        let x = array![[1.0, 5.0], [1.0, 5.0]];
        assert_eq!(variance_selection(&x), Err(SelectionError::NoFeaturesLeft(2)));
        assert_eq!(variance_selection(&Array2::zeros((0, 3))), Err(SelectionError::Empty));
    }

    #[test]
    fn standardize_centers_and_scales() {
        let x = array![[1.0, 4.0], [3.0, 4.0]];
        let z = standardize(&x);
        assert_abs_diff_eq!(z[[0, 0]], -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(z[[1, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(z[[0, 1]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn detects_non_finite_columns() {
        let frame = NumericFrame {
            columns: vec!["a".into(), "b".into()],
            values: array![[1.0, f64::INFINITY], [2.0, 3.0]],
        };
        assert_eq!(frame.non_finite_columns(), vec!["b"]);
    }
}
