use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// CellValue – a single cell of a raw table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring the dtypes a benchmark export carries.
/// Tables are compared and deduplicated downstream, so `CellValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord so we can put CellValue in BTreeSet --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => Ok(()),
        }
    }
}

impl CellValue {
    /// Interpret the value as an `f64`. Booleans count as 0/1, strings and
    /// nulls have no numeric reading.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// DataTable – a raw rows × columns dataset
// ---------------------------------------------------------------------------

/// A raw table as loaded from a source file (or concatenated from several).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    /// Ordered column names.
    pub headers: Vec<String>,
    /// Row-major cells, every row is `headers.len()` long.
    pub rows: Vec<Vec<CellValue>>,
}

impl DataTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        DataTable { headers, rows }
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn n_columns(&self) -> usize {
        self.headers.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// All cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&CellValue>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Append (or overwrite) a column holding the same value in every row.
    pub fn with_tag_column(mut self, name: &str, value: CellValue) -> Self {
        match self.column_index(name) {
            Some(idx) => {
                for row in &mut self.rows {
                    row[idx] = value.clone();
                }
            }
            None => {
                self.headers.push(name.to_string());
                for row in &mut self.rows {
                    row.push(value.clone());
                }
            }
        }
        self
    }

    /// Concatenate tables vertically, keeping only the columns every table
    /// shares. Column order follows the first table.
    pub fn concat_inner(tables: &[DataTable]) -> DataTable {
        let Some(first) = tables.first() else {
            return DataTable::default();
        };

        let shared: Vec<String> = first
            .headers
            .iter()
            .filter(|h| tables.iter().all(|t| t.column_index(h).is_some()))
            .cloned()
            .collect();

        let mut rows = Vec::with_capacity(tables.iter().map(DataTable::n_rows).sum());
        for table in tables {
            let indices: Vec<usize> = shared
                .iter()
                .filter_map(|h| table.column_index(h))
                .collect();
            for row in &table.rows {
                rows.push(indices.iter().map(|&i| row[i].clone()).collect());
            }
        }

        DataTable {
            headers: shared,
            rows,
        }
    }

    /// Distinct values of a column, sorted.
    pub fn unique_values(&self, name: &str) -> BTreeSet<CellValue> {
        self.column(name)
            .map(|cells| cells.into_iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: Vec<Vec<CellValue>>) -> DataTable {
        DataTable::new(headers.iter().map(|h| h.to_string()).collect(), rows)
    }

    #[test]
    fn concat_inner_keeps_shared_columns_in_first_table_order() {
        let a = table(
            &["threads", "input_size", "runtime"],
            vec![
                vec![CellValue::Integer(1), CellValue::Integer(10), CellValue::Float(1.5)],
                vec![CellValue::Integer(2), CellValue::Integer(20), CellValue::Float(2.5)],
            ],
        );
        let b = table(
            &["runtime", "threads", "extra"],
            vec![vec![
                CellValue::Float(3.5),
                CellValue::Integer(4),
                CellValue::String("x".into()),
            ]],
        );

        let merged = DataTable::concat_inner(&[a, b]);
        assert_eq!(merged.headers, vec!["threads", "runtime"]);
        assert_eq!(merged.n_rows(), 3);
        assert_eq!(merged.rows[2], vec![CellValue::Integer(4), CellValue::Float(3.5)]);
    }

    #[test]
    fn tag_column_is_appended_once() {
        let t = table(&["a"], vec![vec![CellValue::Integer(1)], vec![CellValue::Integer(2)]]);
        let t = t
            .with_tag_column("Version", CellValue::String("1.0".into()))
            .with_tag_column("Version", CellValue::String("2.0".into()));

        assert_eq!(t.headers, vec!["a", "Version"]);
        let versions = t.unique_values("Version");
        assert_eq!(versions.len(), 1);
        assert!(versions.contains(&CellValue::String("2.0".into())));
    }

    #[test]
    fn cell_ordering_groups_by_type() {
        let mut cells = vec![
            CellValue::String("b".into()),
            CellValue::Float(0.5),
            CellValue::Null,
            CellValue::Integer(3),
        ];
        cells.sort();
        assert_eq!(cells[0], CellValue::Null);
        assert_eq!(cells[3], CellValue::String("b".into()));
    }
}
