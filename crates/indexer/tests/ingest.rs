use pretty_assertions::assert_eq;
use snipgraph_indexer::{IndexerConfig, ProjectIndexer};
use snipgraph_store::{GraphStore, SqliteStore};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: impl AsRef<[u8]>) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn sample_project() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "shop/models.py", "class Item:\n    pass\n\nclass Stock:\n    pass\n");
    write(
        root,
        "shop/inventory.py",
        "from shop.models import Item\n\ndef lookup():\n    return Item()\n",
    );
    write(root, "web/api.js", "export function lookup() {\n  return 1;\n}\n");
    write(
        root,
        "web/app.js",
        "import { lookup } from './api';\n\nfunction main() {\n  return lookup();\n}\n",
    );
    write(root, "README.md", "# sample\n");
    write(root, "node_modules/pkg/index.js", "function vendored() {}\n");
    write(root, "broken.py", [0xff, 0xfe, 0x00]);
    temp
}

fn open(temp: &TempDir) -> (Arc<dyn GraphStore>, ProjectIndexer) {
    let store: Arc<dyn GraphStore> =
        Arc::new(SqliteStore::open(temp.path().join(".snipgraph").join("graph.db")).unwrap());
    let indexer =
        ProjectIndexer::new(temp.path(), &IndexerConfig::default(), Arc::clone(&store)).unwrap();
    (store, indexer)
}

#[test]
fn full_ingest_indexes_tracked_sources() {
    let temp = sample_project();
    let (store, indexer) = open(&temp);

    let stats = indexer.index_all().unwrap();

    assert_eq!(stats.files, 4);
    assert_eq!(stats.languages.get("python"), Some(&2));
    assert_eq!(stats.languages.get("javascript"), Some(&2));
    assert_eq!(stats.errors.len(), 1);
    assert!(stats.errors[0].contains("broken.py"));
    assert_eq!(stats.snippets, store.snippet_count().unwrap());

    assert!(store.get_snippet("node_modules.pkg.index").unwrap().is_none());
    assert_eq!(
        store.get_direct_dependencies("shop.inventory.lookup").unwrap(),
        vec!["shop.inventory._imports_", "shop.models.Item"]
    );
    assert!(store
        .get_direct_dependencies("web.app.main")
        .unwrap()
        .contains(&"web.api.lookup".to_string()));
    let dependents: BTreeSet<String> = store
        .get_direct_dependents("shop.models.Item")
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(
        dependents,
        BTreeSet::from([
            "shop.inventory".to_string(),
            "shop.inventory.lookup".to_string(),
            "shop.models".to_string(),
        ])
    );
}

#[test]
fn reingest_is_idempotent() {
    let temp = sample_project();
    let (store, indexer) = open(&temp);

    indexer.index_all().unwrap();
    let snippets = store.snippet_count().unwrap();
    let edges = store.edge_count().unwrap();

    indexer.index_all().unwrap();
    assert_eq!(store.snippet_count().unwrap(), snippets);
    assert_eq!(store.edge_count().unwrap(), edges);
}

#[test]
fn reingest_forgets_deleted_files() {
    let temp = sample_project();
    let (store, indexer) = open(&temp);
    indexer.index_all().unwrap();

    fs::remove_file(temp.path().join("shop/models.py")).unwrap();
    indexer.index_all().unwrap();

    assert!(store.get_snippet("shop.models.Item").unwrap().is_none());
    // The dangling reference survives on the importing side
    assert!(store
        .get_direct_dependencies("shop.inventory.lookup")
        .unwrap()
        .contains(&"shop.models.Item".to_string()));
}

#[test]
fn source_dir_shortens_module_paths() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/pkg/core.py", "def run():\n    helper()\n\ndef helper():\n    pass\n");
    write(temp.path(), "scripts/tool.py", "from pkg.core import run\n\nrun()\n");

    let store: Arc<dyn GraphStore> = Arc::new(snipgraph_store::MemoryStore::new());
    let indexer = ProjectIndexer::new(
        temp.path(),
        &IndexerConfig::default().with_source_dir("src"),
        Arc::clone(&store),
    )
    .unwrap();
    indexer.index_all().unwrap();

    assert_eq!(
        store.get_direct_dependencies("pkg.core.run").unwrap(),
        vec!["pkg.core.helper"]
    );
    assert!(store
        .get_direct_dependencies("scripts.tool.line3")
        .unwrap()
        .contains(&"pkg.core.run".to_string()));
}

#[cfg(unix)]
#[test]
fn external_parser_output_is_rekeyed_and_stored() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "svc/main.go", "package main\n\nfunc Main() {}\n");
    write(
        temp.path(),
        "svc/main.go.json",
        r#"{
          "chunks": [
            {"id": "g.main", "name": null, "content": "package main\n\nfunc Main() {}", "start_line": 1, "end_line": 3, "type": "file"},
            {"id": "g.main.Main", "name": "Main", "content": "func Main() {}", "start_line": 3, "end_line": 3, "type": "function"}
          ],
          "dependencies": [{"snippet_id": "g.main.Main", "dependency_name": "fmt.Println"}]
        }"#,
    );

    let config = IndexerConfig::default().with_external_parser(
        ".go",
        vec!["sh".into(), "-c".into(), "cat \"$0.json\"".into()],
    );
    let store: Arc<dyn GraphStore> = Arc::new(snipgraph_store::MemoryStore::new());
    let indexer = ProjectIndexer::new(temp.path(), &config, Arc::clone(&store)).unwrap();

    let stats = indexer.index_all().unwrap();
    assert_eq!(stats.files, 1);
    assert_eq!(stats.languages.get("go"), Some(&1));
    assert_eq!(
        store.list_snippet_ids("").unwrap(),
        vec!["svc.main", "svc.main.Main"]
    );
    assert_eq!(
        store.get_direct_dependencies("svc.main.Main").unwrap(),
        vec!["fmt.Println"]
    );
}

#[cfg(unix)]
#[test]
fn hung_external_parser_is_reported_not_awaited() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "svc/main.go", "package main\n");
    write(temp.path(), "svc/util.py", "def helper():\n    pass\n");

    let config = IndexerConfig::default()
        .with_external_parser(".go", vec!["sh".into(), "-c".into(), "exec sleep 30".into()])
        .with_parser_timeout(std::time::Duration::from_millis(200));
    let store: Arc<dyn GraphStore> = Arc::new(snipgraph_store::MemoryStore::new());
    let indexer = ProjectIndexer::new(temp.path(), &config, Arc::clone(&store)).unwrap();

    let started = std::time::Instant::now();
    let stats = indexer.index_all().unwrap();

    assert!(started.elapsed() < std::time::Duration::from_secs(10));
    assert_eq!(stats.files, 1);
    assert_eq!(stats.errors.len(), 1);
    assert!(stats.errors[0].contains("timed out"), "{:?}", stats.errors);
    assert!(store.get_snippet("svc.util.helper").unwrap().is_some());
}
