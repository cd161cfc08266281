//! Discovery of tools from the raw data folder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::config::Config;
use crate::data::loader::is_supported;
use crate::entity::ToolEntity;

/// Tools found in the raw data folder, split by verification outcome.
#[derive(Debug, Default)]
pub struct Discovery {
    pub verified: Vec<ToolEntity>,
    pub excluded: Vec<ToolEntity>,
}

/// Groups raw files into tools by their name prefix.
pub struct ToolLoader {
    config: Arc<Config>,
}

impl ToolLoader {
    pub fn new(config: Arc<Config>) -> Self {
        ToolLoader { config }
    }

    /// Scan the raw data folder, build one tool per name and verify it.
    ///
    /// Unsupported files are skipped. Files are visited in name order.
    pub fn load_tools(&self) -> Result<Discovery> {
        let dir = &self.config.data_raw_directory;
        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
            match entry {
                Ok(entry) => paths.push(entry.path()),
                Err(err) => warn!("Skipping entry of {}: {err}", dir.display()),
            }
        }
        paths.sort();

        let mut tools: Vec<ToolEntity> = Vec::new();
        for path in paths.iter().filter(|p| p.is_file() && is_supported(p)) {
            let Some(name) = tool_name(path) else {
                warn!("Skipping {}: no tool name before the version", path.display());
                continue;
            };

            let index = match tools.iter().position(|t| t.name == name) {
                Some(index) => index,
                None => {
                    if self.config.verbose {
                        info!("Detected tool {name}");
                    }
                    tools.push(ToolEntity::new(&name, self.config.clone()));
                    tools.len() - 1
                }
            };
            tools[index].add_file(path);
        }

        let mut discovery = Discovery::default();
        for mut tool in tools {
            tool.verify();
            if tool.verified {
                discovery.verified.push(tool);
            } else {
                discovery.excluded.push(tool);
            }
        }

        info!(
            "{} tool(s) verified, {} excluded",
            discovery.verified.len(),
            discovery.excluded.len()
        );
        Ok(discovery)
    }
}

/// Tool name of a raw file: the stem without its trailing `_<version>`.
/// A stem without `_` is the tool name itself. `None` when the name would
/// be empty, as for `_1.csv`.
pub fn tool_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let name = stem.rsplit_once('_').map(|(name, _)| name).unwrap_or(stem);
    (!name.is_empty()).then(|| name.to_string())
}
