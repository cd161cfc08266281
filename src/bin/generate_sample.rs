//! Write a synthetic corpus of benchmark files.
//!
//! Usage: `generate_sample [output dir]` (default `Data/Raw`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// One tool version to generate.
struct VersionSpec {
    file: &'static str,
    rows: usize,
    /// Seconds per gigabyte of input.
    runtime_slope: f64,
    noise: f64,
    delimiter: u8,
}

const CORPUS: &[VersionSpec] = &[
    VersionSpec { file: "aligner_1.0.csv", rows: 300, runtime_slope: 40.0, noise: 5.0, delimiter: b',' },
    VersionSpec { file: "aligner_1.1.csv", rows: 400, runtime_slope: 35.0, noise: 8.0, delimiter: b',' },
    VersionSpec { file: "aligner_2.0.csv", rows: 250, runtime_slope: 30.0, noise: 40.0, delimiter: b',' },
    VersionSpec { file: "assembler_0.9.tsv", rows: 200, runtime_slope: 120.0, noise: 30.0, delimiter: b'\t' },
    VersionSpec { file: "assembler_1.0.tsv", rows: 220, runtime_slope: 110.0, noise: 25.0, delimiter: b'\t' },
    VersionSpec { file: "sorter.csv", rows: 150, runtime_slope: 5.0, noise: 1.0, delimiter: b',' },
    // Too small to pass verification.
    VersionSpec { file: "indexer_0.1.csv", rows: 8, runtime_slope: 10.0, noise: 1.0, delimiter: b',' },
];

/// Box-Muller transform for normal distribution
fn gauss(rng: &mut ChaCha8Rng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

fn write_version(dir: &Path, spec: &VersionSpec, rng: &mut ChaCha8Rng) -> Result<()> {
    let path = dir.join(spec.file);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(spec.delimiter)
        .from_path(&path)
        .with_context(|| format!("creating {}", path.display()))?;

    writer.write_record([
        "input_size_gb",
        "threads",
        "paired_end",
        "reference",
        "host",
        "runtime",
        "memtotal",
        "processor_count",
    ])?;

    for i in 0..spec.rows {
        // Every 25th run failed before reporting anything.
        if i % 25 == 24 {
            writer.write_record(["0", "0", "false", "", "", "0", "0", "0"])?;
            continue;
        }

        let input_size: f64 = rng.gen_range(0.5..20.0);
        let threads: u32 = 1 << rng.gen_range(0..5u32);
        let paired = rng.gen_bool(0.5);
        let reference = rng.gen_range(1..4u32);
        let host = format!("node{:02}", rng.gen_range(1..9u32));

        let parallel = 0.3 + 0.7 / f64::from(threads);
        let runtime = (spec.runtime_slope * input_size * parallel * if paired { 1.6 } else { 1.0 }
            + gauss(rng, 0.0, spec.noise))
        .max(0.1);
        let memtotal = (2.0 + 1.5 * input_size + 0.25 * f64::from(threads) + gauss(rng, 0.0, 0.5)).max(0.1);
        let processor_count = threads.min(8) + u32::from(rng.gen_bool(0.1));

        writer.write_record([
            format!("{input_size:.3}"),
            threads.to_string(),
            paired.to_string(),
            reference.to_string(),
            host,
            format!("{runtime:.3}"),
            format!("{memtotal:.3}"),
            processor_count.to_string(),
        ])?;
    }

    writer.flush()?;
    println!("Wrote {} rows → {}", spec.rows, path.display());
    Ok(())
}

fn main() -> Result<()> {
    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("Data/Raw"));
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    for spec in CORPUS {
        write_version(&dir, spec, &mut rng)?;
    }
    Ok(())
}
