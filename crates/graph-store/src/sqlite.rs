use crate::error::{Result, StoreError};
use crate::store::GraphStore;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use snipgraph_chunker::{DependencyEdge, Snippet, SnippetKind};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS snippets (
    id          TEXT PRIMARY KEY,
    source      TEXT NOT NULL,
    module      TEXT NOT NULL,
    name        TEXT,
    content     TEXT NOT NULL,
    start_line  INTEGER NOT NULL,
    end_line    INTEGER NOT NULL,
    kind        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_snippets_source ON snippets(source);

CREATE TABLE IF NOT EXISTS dependencies (
    snippet_id            TEXT NOT NULL REFERENCES snippets(id) ON DELETE CASCADE,
    dependency_reference  TEXT NOT NULL,
    PRIMARY KEY (snippet_id, dependency_reference)
);

CREATE INDEX IF NOT EXISTS idx_dependencies_reference ON dependencies(dependency_reference);
"#;

const SNIPPET_COLUMNS: &str = "id, source, module, name, content, start_line, end_line, kind";

/// SQLite-backed graph store.
///
/// One connection behind a mutex; per-file replaces run in an immediate
/// transaction so concurrent readers see whole files only.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories.
    ///
    /// Sets WAL mode and busy timeout, then creates the schema if missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        log::debug!("Opened graph database at {}", path.display());
        Self::init(conn)
    }

    /// Private in-memory database, mainly for tests
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

fn row_to_snippet(row: &rusqlite::Row<'_>) -> rusqlite::Result<Snippet> {
    let kind: String = row.get(7)?;
    Ok(Snippet {
        id: row.get(0)?,
        source: row.get(1)?,
        module: row.get(2)?,
        name: row.get(3)?,
        content: row.get(4)?,
        start_line: row.get::<_, i64>(5)? as usize,
        end_line: row.get::<_, i64>(6)? as usize,
        kind: SnippetKind::parse(&kind),
    })
}

fn write_snippet(conn: &Connection, snippet: &Snippet) -> Result<()> {
    conn.execute(
        "INSERT INTO snippets (id, source, module, name, content, start_line, end_line, kind)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
             source = excluded.source,
             module = excluded.module,
             name = excluded.name,
             content = excluded.content,
             start_line = excluded.start_line,
             end_line = excluded.end_line,
             kind = excluded.kind",
        rusqlite::params![
            snippet.id,
            snippet.source,
            snippet.module,
            snippet.name,
            snippet.content,
            snippet.start_line as i64,
            snippet.end_line as i64,
            snippet.kind.as_str(),
        ],
    )?;
    Ok(())
}

fn snippet_exists(conn: &Connection, id: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM snippets WHERE id = ?1",
            rusqlite::params![id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn write_edge(conn: &Connection, edge: &DependencyEdge) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO dependencies (snippet_id, dependency_reference) VALUES (?1, ?2)",
        rusqlite::params![edge.snippet_id, edge.dependency_reference],
    )?;
    Ok(())
}

fn delete_prefix(conn: &Connection, prefix: &str) -> Result<usize> {
    // Cascades to the dependencies rows of removed snippets
    let removed = conn.execute(
        "DELETE FROM snippets WHERE substr(source, 1, length(?1)) = ?1",
        rusqlite::params![prefix],
    )?;
    Ok(removed)
}

fn query_strings(conn: &Connection, sql: &str, key: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(rusqlite::params![key], |row| row.get::<_, String>(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

impl GraphStore for SqliteStore {
    fn upsert_snippet(&self, snippet: &Snippet) -> Result<()> {
        write_snippet(&*self.conn()?, snippet)
    }

    fn upsert_edge(&self, edge: &DependencyEdge) -> Result<()> {
        let conn = self.conn()?;
        if !snippet_exists(&conn, &edge.snippet_id)? {
            return Err(StoreError::UnknownSnippet(edge.snippet_id.clone()));
        }
        write_edge(&conn, edge)
    }

    fn replace_file(
        &self,
        source: &str,
        snippets: &[Snippet],
        edges: &[DependencyEdge],
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let removed = delete_prefix(&tx, source)?;
        for snippet in snippets {
            write_snippet(&tx, snippet)?;
        }
        for edge in edges {
            if snippet_exists(&tx, &edge.snippet_id)? {
                write_edge(&tx, edge)?;
            } else {
                log::debug!("Skipping edge from unknown snippet {}", edge.snippet_id);
            }
        }

        tx.commit()?;
        log::debug!(
            "Replaced {source}: -{removed} +{} snippets, {} edges",
            snippets.len(),
            edges.len()
        );
        Ok(())
    }

    fn delete_by_source_prefix(&self, prefix: &str) -> Result<usize> {
        delete_prefix(&*self.conn()?, prefix)
    }

    fn get_snippet(&self, id: &str) -> Result<Option<Snippet>> {
        let conn = self.conn()?;
        let snippet = conn
            .query_row(
                &format!("SELECT {SNIPPET_COLUMNS} FROM snippets WHERE id = ?1"),
                rusqlite::params![id],
                row_to_snippet,
            )
            .optional()?;
        Ok(snippet)
    }

    fn get_snippets_by_source(&self, prefix: &str) -> Result<Vec<Snippet>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SNIPPET_COLUMNS} FROM snippets
             WHERE substr(source, 1, length(?1)) = ?1
             ORDER BY source, start_line, id"
        ))?;
        let rows = stmt.query_map(rusqlite::params![prefix], row_to_snippet)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_direct_dependencies(&self, id: &str) -> Result<Vec<String>> {
        query_strings(
            &*self.conn()?,
            "SELECT dependency_reference FROM dependencies WHERE snippet_id = ?1 ORDER BY rowid",
            id,
        )
    }

    fn get_direct_dependents(&self, id: &str) -> Result<Vec<String>> {
        query_strings(
            &*self.conn()?,
            "SELECT snippet_id FROM dependencies WHERE dependency_reference = ?1 ORDER BY rowid",
            id,
        )
    }

    fn get_dependencies_for(&self, ids: &[String]) -> Result<Vec<DependencyEdge>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT dependency_reference FROM dependencies WHERE snippet_id = ?1 ORDER BY rowid",
        )?;

        let mut edges = Vec::new();
        for id in ids {
            let refs = stmt.query_map(rusqlite::params![id], |row| row.get::<_, String>(0))?;
            for reference in refs {
                edges.push(DependencyEdge::new(id.clone(), reference?));
            }
        }
        Ok(edges)
    }

    fn list_snippet_ids(&self, source_prefix: &str) -> Result<Vec<String>> {
        query_strings(
            &*self.conn()?,
            "SELECT id FROM snippets WHERE substr(source, 1, length(?1)) = ?1 ORDER BY id",
            source_prefix,
        )
    }

    fn snippet_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM snippets", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn edge_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM dependencies", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn sweep_orphan_edges(&self) -> Result<usize> {
        let removed = self.conn()?.execute(
            "DELETE FROM dependencies WHERE snippet_id NOT IN (SELECT id FROM snippets)",
            [],
        )?;
        if removed > 0 {
            log::info!("Swept {removed} orphan edges");
        }
        Ok(removed)
    }
}
