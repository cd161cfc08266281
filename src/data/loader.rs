use std::path::Path;

use anyhow::{Context, Result, bail};

use super::model::{CellValue, DataTable};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// File extensions the loader understands.
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["csv", "tsv"];

/// Whether a path points at a file the loader can parse.
pub fn is_supported(path: &Path) -> bool {
    let ext = extension(path);
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Load a raw benchmark table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` – comma-separated, header row required
/// * `.tsv` – tab-separated, header row required
pub fn load_file(path: &Path) -> Result<DataTable> {
    match extension(path).as_str() {
        "csv" => load_delimited(path, b','),
        "tsv" => load_delimited(path, b'\t'),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// Delimited text loader
// ---------------------------------------------------------------------------

/// Header row with column names, one record per benchmark run.
/// Every cell is type-guessed independently.
fn load_delimited(path: &Path, delimiter: u8) -> Result<DataTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .context("reading headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.is_empty() {
        bail!("{} has no header row", path.display());
    }

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("row {row_no}"))?;
        rows.push(record.iter().map(guess_cell_type).collect());
    }

    Ok(DataTable::new(headers, rows))
}

fn guess_cell_type(s: &str) -> CellValue {
    if s.is_empty() {
        return CellValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return CellValue::Float(f);
    }
    if s == "true" || s == "false" || s == "True" || s == "False" {
        return CellValue::Bool(s.eq_ignore_ascii_case("true"));
    }
    CellValue::String(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loads_tsv_with_typed_cells() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bwa_0.7.17.tsv");
        std::fs::write(&path, "threads\tname\truntime\tpaired\n4\tsample\t1.5\tTrue\n8\t\tinf\tfalse\n")
            .unwrap();

        let table = load_file(&path).unwrap();
        assert_eq!(table.headers, vec!["threads", "name", "runtime", "paired"]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.rows[0][0], CellValue::Integer(4));
        assert_eq!(table.rows[0][1], CellValue::String("sample".into()));
        assert_eq!(table.rows[0][3], CellValue::Bool(true));
        assert_eq!(table.rows[1][1], CellValue::Null);
        assert!(matches!(table.rows[1][2], CellValue::Float(v) if v.is_infinite()));
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        assert!(!is_supported(&path));
        assert!(load_file(&path).is_err());
    }

    #[test]
    fn ragged_rows_are_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.csv");
        std::fs::write(&path, "a,b\n1,2\n3\n").unwrap();

        assert!(load_file(&path).is_err());
    }
}
