use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::config::Config;
use crate::discovery::{Discovery, ToolLoader};
use crate::entity::ToolEntity;
use crate::statistics::CorpusStatistics;

// ---------------------------------------------------------------------------
// Run outcome
// ---------------------------------------------------------------------------

/// What a finished run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub verified_tools: usize,
    pub excluded_tools: usize,
    /// Files (including synthesised merges) evaluated across all tools.
    pub evaluated_files: usize,
    pub elapsed: Duration,
    pub corpus: CorpusStatistics,
}

#[derive(Debug)]
pub enum RunOutcome {
    /// The raw data folder did not exist and was created empty.
    MissingInput(PathBuf),
    Completed(RunSummary),
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// End to end evaluation: discovery, per-tool evaluation, reports and corpus
/// statistics.
pub struct Pipeline {
    config: Arc<Config>,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Pipeline {
            config: Arc::new(config),
        }
    }

    pub fn run(&self) -> Result<RunOutcome> {
        let started = Instant::now();

        let raw_dir = &self.config.data_raw_directory;
        if !raw_dir.exists() {
            std::fs::create_dir_all(raw_dir).with_context(|| format!("creating {}", raw_dir.display()))?;
            return Ok(RunOutcome::MissingInput(raw_dir.clone()));
        }
        std::fs::create_dir_all(&self.config.evaluation_directory)
            .with_context(|| format!("creating {}", self.config.evaluation_directory.display()))?;

        let Discovery { mut verified, excluded } = ToolLoader::new(self.config.clone()).load_tools()?;

        for tool in &mut verified {
            self.evaluate_tool(tool);
        }

        let corpus = CorpusStatistics::from_tools(&verified);
        corpus
            .write_csv_files(&self.config.evaluation_directory)
            .context("writing corpus statistics")?;

        let evaluated_files = verified
            .iter()
            .flat_map(|t| t.files())
            .filter(|f| f.evaluated)
            .count();

        let elapsed = started.elapsed();
        info!("Evaluation finished in {:.2}s", elapsed.as_secs_f64());

        Ok(RunOutcome::Completed(RunSummary {
            verified_tools: verified.iter().filter(|t| t.verified).count(),
            excluded_tools: excluded.len() + verified.iter().filter(|t| !t.verified).count(),
            evaluated_files,
            elapsed,
            corpus,
        }))
    }

    /// Full per-tool sequence. Report failures are logged, not fatal.
    pub fn evaluate_tool(&self, tool: &mut ToolEntity) {
        let started = Instant::now();

        tool.evaluate();
        if !tool.verified {
            return;
        }
        tool.generate_overview_data_sets();
        tool.prepare_additional_files();
        tool.evaluate_additional_files();
        tool.create_simple_data_sets();
        tool.generate_overview_data_sets();
        tool.calculate_tool_statistics();

        if let Err(err) = tool.generate_reports() {
            warn!("{}: {err:#}", tool.name);
        }
        tool.free_memory();

        info!("Tool {} done in {:.2}s", tool.name, started.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_raw_folder_is_created_and_run_stops() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("Data").join("Raw");
        let pipeline = Pipeline::new(Config {
            data_raw_directory: raw.clone(),
            evaluation_directory: dir.path().join("Evaluations"),
            ..Config::default()
        });

        let outcome = pipeline.run().unwrap();
        assert!(matches!(outcome, RunOutcome::MissingInput(ref path) if *path == raw));
        assert!(raw.is_dir());
        assert!(!dir.path().join("Evaluations").exists());
    }

    #[test]
    fn empty_raw_folder_completes_with_nothing() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("raw");
        std::fs::create_dir_all(&raw).unwrap();
        let pipeline = Pipeline::new(Config {
            data_raw_directory: raw,
            evaluation_directory: dir.path().join("eval"),
            ..Config::default()
        });

        let RunOutcome::Completed(summary) = pipeline.run().unwrap() else {
            panic!("expected a completed run");
        };
        assert_eq!(summary.verified_tools, 0);
        assert_eq!(summary.evaluated_files, 0);
        assert_eq!(summary.corpus, CorpusStatistics::default());
    }
}
