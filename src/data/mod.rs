/// Data layer: raw tables, loading, cleaning and row filtering.
///
/// Architecture:
/// ```text
///  .csv / .tsv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → DataTable
///   └──────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ preprocess  │  coerce types, drop degenerate columns → NumericFrame
///   └────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  drop all-zero rows, cut contiguous partitions
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod preprocess;
