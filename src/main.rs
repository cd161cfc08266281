use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use resource_predictor::{Config, Pipeline, RunOutcome};

#[derive(Parser)]
#[command(name = "resource-predictor")]
#[command(author, version, about = "Evaluate how predictable tool resource usage is", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Folder holding raw benchmark files
    #[arg(long)]
    data: Option<PathBuf>,

    /// Folder receiving reports
    #[arg(long)]
    output: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Defer loading data until a tool is evaluated
    #[arg(short, long)]
    memory: bool,

    /// Enable debug output (implies verbose)
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    ctrlc::set_handler(|| {
        info!("Received interrupt, shutting down");
        process::exit(0);
    })
    .context("setting Ctrl-C handler")?;

    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(data) = cli.data {
        config.data_raw_directory = data;
    }
    if let Some(output) = cli.output {
        config.evaluation_directory = output;
    }
    config.verbose |= cli.verbose || cli.debug;
    config.debug |= cli.debug;
    config.memory_saving_mode |= cli.memory;
    config.validate()?;

    match Pipeline::new(config).run()? {
        RunOutcome::MissingInput(path) => {
            println!("Created {}. Place benchmark files there and run again.", path.display());
        }
        RunOutcome::Completed(summary) => {
            println!(
                "Evaluated {} file(s) of {} tool(s) ({} excluded) in {:.2}s",
                summary.evaluated_files,
                summary.verified_tools,
                summary.excluded_tools,
                summary.elapsed.as_secs_f64()
            );
        }
    }
    Ok(())
}
