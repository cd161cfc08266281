//! CSV export of evaluation tables.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::data::model::DataTable;
use crate::entity::results::PcaProjection;

/// Number of leading principal components written to PCA reports.
pub const PCA_REPORT_COMPONENTS: usize = 2;

/// Serialize `rows` with a header line. Empty tables are not written.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a raw table back out as CSV.
pub fn write_table(path: &Path, table: &DataTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Leading components of every sample next to its label value.
pub fn write_pca(path: &Path, label: &str, projection: &PcaProjection) -> Result<()> {
    let leading = projection.leading(PCA_REPORT_COMPONENTS);
    let Some((first, _)) = leading.first() else {
        return Ok(());
    };

    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    let mut header: Vec<String> = (1..=first.len()).map(|i| format!("Principal Component {i}")).collect();
    header.push(label.to_string());
    writer.write_record(&header)?;

    for (components, value) in &leading {
        let record = components.iter().chain(std::iter::once(value)).map(|v| v.to_string());
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(())
}
