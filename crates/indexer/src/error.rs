use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Chunker error: {0}")]
    ChunkerError(#[from] snipgraph_chunker::ChunkerError),

    #[error("Graph store error: {0}")]
    StoreError(#[from] snipgraph_store::StoreError),

    #[error("Watcher error: {0}")]
    WatcherError(#[from] notify::Error),

    #[error("Invalid project path: {0}")]
    InvalidPath(String),

    #[error("Malformed TOML manifest: {0}")]
    TomlManifest(#[from] toml::de::Error),

    #[error("Malformed JSON manifest: {0}")]
    JsonManifest(#[from] serde_json::Error),
}
