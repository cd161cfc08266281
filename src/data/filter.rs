use std::ops::Range;

use ndarray::{Array1, Array2, Axis};

// ---------------------------------------------------------------------------
// Degenerate rows
// ---------------------------------------------------------------------------

/// Indices of rows where at least one feature is non-zero.
///
/// Rows whose features are all exactly zero are treated as missing
/// measurements and excluded from model fitting.
pub fn non_zero_rows(x: &Array2<f64>) -> Vec<usize> {
    x.axis_iter(Axis(0))
        .enumerate()
        .filter(|(_, row)| row.iter().any(|&v| v != 0.0))
        .map(|(i, _)| i)
        .collect()
}

/// Drop all-zero feature rows from `x` and the matching entries of `y`.
pub fn drop_zero_rows(x: &Array2<f64>, y: &Array1<f64>) -> (Array2<f64>, Array1<f64>) {
    let keep = non_zero_rows(x);
    (x.select(Axis(0), &keep), y.select(Axis(0), &keep))
}

// ---------------------------------------------------------------------------
// Contiguous partitions
// ---------------------------------------------------------------------------

/// Default number of partitions for split evaluation.
pub const MIN_PARTITIONS: usize = 3;
/// Row count above which more partitions are used.
pub const LARGE_DATASET_ROWS: usize = 10_000;
/// Upper bound on rows per partition for large datasets.
pub const MAX_PARTITION_ROWS: f64 = 3333.0;

/// Number of partitions used for a dataset with `n_rows` rows.
pub fn partition_count(n_rows: usize) -> usize {
    let mut parts = MIN_PARTITIONS;
    if n_rows > LARGE_DATASET_ROWS {
        while n_rows as f64 / parts as f64 > MAX_PARTITION_ROWS {
            parts += 1;
        }
    }
    parts
}

/// Row ranges of the contiguous partitions of a dataset.
///
/// Every partition holds `n_rows / parts` rows except the last one, which
/// also absorbs the remainder.
pub fn partition_bounds(n_rows: usize) -> Vec<Range<usize>> {
    let parts = partition_count(n_rows);
    let size = n_rows / parts;

    (0..parts)
        .map(|part| {
            let start = size * part;
            let end = if part + 1 == parts { n_rows } else { size * (part + 1) };
            start..end
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn zero_rows_are_dropped_with_their_targets() {
        let x = array![[0.0, 0.0], [1.0, 0.0], [0.0, 0.0], [0.0, 2.0]];
        let y = array![10.0, 11.0, 12.0, 13.0];

        assert_eq!(non_zero_rows(&x), vec![1, 3]);
        let (x, y) = drop_zero_rows(&x, &y);
        assert_eq!(x.nrows(), 2);
        assert_eq!(y, array![11.0, 13.0]);
    }

    #[test]
    fn small_datasets_use_three_partitions() {
        for n in [0, 1, 2, 3, 100, 101, 9_999, 10_000] {
            let bounds = partition_bounds(n);
            assert_eq!(bounds.len(), 3);
            assert_eq!(bounds.iter().map(|r| r.len()).sum::<usize>(), n);
            for r in &bounds[..2] {
                assert_eq!(r.len(), n / 3);
            }
        }
    }

    #[test]
    fn last_partition_absorbs_remainder() {
        let bounds = partition_bounds(101);
        assert_eq!(bounds, vec![0..33, 33..66, 66..101]);
    }

    #[test]
    fn large_datasets_keep_partitions_small() {
        assert_eq!(partition_count(10_001), 4);
        assert_eq!(partition_count(20_000), 7);

        let bounds = partition_bounds(20_000);
        assert_eq!(bounds.iter().map(|r| r.len()).sum::<usize>(), 20_000);
        assert!(bounds.iter().all(|r| r.len() <= 3334));
    }
}
