use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use snipgraph_graph::Sizing;
use snipgraph_indexer::IndexerConfig;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "snipgraph.toml";

/// Contents of `snipgraph.toml`; every key is optional
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Module paths are relativized against `<root>/<source_dir>`
    pub source_dir: Option<PathBuf>,

    /// Graph database, relative to the project root unless absolute
    pub database: PathBuf,

    /// Default context budget
    pub budget: usize,

    pub sizing: Sizing,

    /// Extension -> command line of an out-of-process parser
    pub external_parsers: BTreeMap<String, Vec<String>>,

    /// Seconds an external parser may spend on one file
    pub parser_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_dir: None,
            database: PathBuf::from(".snipgraph/graph.db"),
            budget: 16_000,
            sizing: Sizing::Chars,
            external_parsers: BTreeMap::new(),
            parser_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Read `explicit`, or `<root>/snipgraph.toml` when present, else defaults
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = root.join(CONFIG_FILE_NAME);
                if !candidate.exists() {
                    log::debug!("No {CONFIG_FILE_NAME} in {}, using defaults", root.display());
                    return Ok(Self::default());
                }
                candidate
            }
        };

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn database_path(&self, root: &Path) -> PathBuf {
        if self.database.is_absolute() {
            self.database.clone()
        } else {
            root.join(&self.database)
        }
    }

    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            source_dir: self.source_dir.clone(),
            external_parsers: self.external_parsers.clone(),
            parser_timeout: Some(Duration::from_secs(self.parser_timeout_secs)),
        }
    }
}
