use snipgraph_chunker::{ChunkerRegistry, ExternalParser};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Project-level indexing settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexerConfig {
    /// Module paths are computed relative to `<root>/<source_dir>` for files under it
    pub source_dir: Option<PathBuf>,

    /// Extension -> command line of an out-of-process parser
    pub external_parsers: BTreeMap<String, Vec<String>>,

    /// Per-file limit for external parsers; `None` keeps the chunker default
    pub parser_timeout: Option<Duration>,
}

impl IndexerConfig {
    #[must_use]
    pub fn with_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_external_parser(mut self, extension: &str, command: Vec<String>) -> Self {
        self.external_parsers.insert(extension.to_string(), command);
        self
    }

    #[must_use]
    pub fn with_parser_timeout(mut self, timeout: Duration) -> Self {
        self.parser_timeout = Some(timeout);
        self
    }

    /// Built-in chunkers plus the configured external parsers
    pub fn registry(&self) -> ChunkerRegistry {
        self.external_parsers
            .iter()
            .filter(|(ext, command)| {
                if command.is_empty() {
                    log::warn!("Ignoring external parser for {ext}: empty command");
                }
                !command.is_empty()
            })
            .fold(ChunkerRegistry::new(), |registry, (ext, command)| {
                let mut parser = ExternalParser::new(command.clone());
                if let Some(timeout) = self.parser_timeout {
                    parser = parser.with_timeout(timeout);
                }
                registry.with_external(ext, parser)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snipgraph_chunker::Backend;

    #[test]
    fn test_registry_includes_external_parsers() {
        let config = IndexerConfig::default()
            .with_external_parser(".go", vec!["go-snippets".into()])
            .with_external_parser("rb", Vec::new());
        let registry = config.registry();

        assert!(matches!(registry.backend_for("main.go"), Some(Backend::External(_))));
        assert!(registry.backend_for("app.rb").is_none());
        assert!(registry.supports("lib.py"));
    }
}
