use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A writer panicked while holding the store lock
    #[error("Store lock poisoned")]
    LockPoisoned,

    /// Edge written for a snippet id that is not stored
    #[error("Unknown snippet: {0}")]
    UnknownSnippet(String),
}
