//! # Snipgraph Graph
//!
//! Dependency resolution over chunked snippets and budget-bounded context
//! assembly from the stored graph.
//!
//! ## Architecture
//!
//! ```text
//! Snippet[] + References (one file)
//!     │
//!     ├──> DependencyResolver
//!     │      ├─ imported names used   → module.name
//!     │      ├─ sibling declarations  → module.decl
//!     │      └─ implicit              → module._imports_
//!     │
//!     └──> GraphStore (persisted edges)
//!             │
//!             └──> ContextAssembler
//!                    ├─ BFS from seeds (visited set, FIFO)
//!                    ├─ Budget cut via Sizer
//!                    └─ presentation_order → render_markdown / render_json
//! ```

mod assembler;
mod builder;
mod error;
mod ordering;
mod render;

pub use assembler::{CharSizer, ContextAssembler, Direction, Sizer, Sizing, TokenEstimateSizer};
pub use builder::DependencyResolver;
pub use error::{GraphError, Result};
pub use ordering::presentation_order;
pub use render::{render_json, render_markdown};
