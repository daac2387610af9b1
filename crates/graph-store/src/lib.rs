//! # Snipgraph Store
//!
//! Persistence for the snippet graph: a snippets table keyed by id and an
//! edges table keyed by `(snippet_id, dependency_reference)`.
//!
//! ## Architecture
//!
//! ```text
//! GraphStore (trait, &self, Send + Sync)
//!     │
//!     ├──> SqliteStore   rusqlite, WAL, one connection behind a Mutex
//!     │    └─> replace_file = prefix delete + inserts in one transaction
//!     │
//!     └──> MemoryStore   RwLock<BTreeMap>, same contract
//! ```
//!
//! Edge targets may be dangling; only the `snippet_id` side is checked.

mod error;
mod memory;
mod sqlite;
mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::GraphStore;
