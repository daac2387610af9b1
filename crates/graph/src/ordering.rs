use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction as EdgeDirection;
use snipgraph_chunker::{DependencyEdge, Snippet};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Deterministic display order for a bundle of snippets.
///
/// Files are sorted topologically (a file comes after the files its snippets
/// depend on), ties and cycle leftovers broken by path. Inside a file,
/// snippets follow their start line.
#[must_use]
pub fn presentation_order(snippets: Vec<Snippet>, edges: &[DependencyEdge]) -> Vec<Snippet> {
    let mut by_file: BTreeMap<String, Vec<Snippet>> = BTreeMap::new();
    let source_of: HashMap<String, String> = snippets
        .iter()
        .map(|s| (s.id.clone(), s.source.clone()))
        .collect();
    for snippet in snippets {
        by_file.entry(snippet.source.clone()).or_default().push(snippet);
    }

    let files: Vec<&str> = by_file.keys().map(String::as_str).collect();
    let order = file_order(&files, edges, &source_of);

    let mut out = Vec::with_capacity(source_of.len());
    for file in order {
        if let Some(mut group) = by_file.remove(&file) {
            group.sort_by(|a, b| (a.start_line, &a.id).cmp(&(b.start_line, &b.id)));
            out.extend(group);
        }
    }
    out
}

/// Kahn's algorithm over the file graph, always taking the smallest ready path
fn file_order(
    files: &[&str],
    edges: &[DependencyEdge],
    source_of: &HashMap<String, String>,
) -> Vec<String> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let nodes: HashMap<&str, NodeIndex> = files
        .iter()
        .map(|file| (*file, graph.add_node(*file)))
        .collect();

    // dependency file -> dependent file
    let mut file_edges = BTreeSet::new();
    for edge in edges {
        let (Some(from), Some(to)) = (
            source_of.get(&edge.snippet_id),
            source_of.get(&edge.dependency_reference),
        ) else {
            continue;
        };
        if from != to {
            file_edges.insert((to.as_str(), from.as_str()));
        }
    }
    for (dependency, dependent) in file_edges {
        if let (Some(&a), Some(&b)) = (nodes.get(dependency), nodes.get(dependent)) {
            graph.add_edge(a, b, ());
        }
    }

    let mut in_degree: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .map(|idx| {
            let degree = graph.neighbors_directed(idx, EdgeDirection::Incoming).count();
            (idx, degree)
        })
        .collect();

    let mut ready: BTreeSet<&str> = graph
        .node_indices()
        .filter(|idx| in_degree.get(idx) == Some(&0))
        .map(|idx| graph[idx])
        .collect();

    let mut order = Vec::with_capacity(files.len());
    let mut placed: BTreeSet<&str> = BTreeSet::new();
    while let Some(file) = ready.pop_first() {
        order.push(file.to_string());
        placed.insert(file);

        let idx = nodes[file];
        for next in graph.neighbors_directed(idx, EdgeDirection::Outgoing) {
            if let Some(degree) = in_degree.get_mut(&next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(graph[next]);
                }
            }
        }
    }

    // Files stuck in a cycle go last, by path
    let leftover: Vec<String> = files
        .iter()
        .filter(|file| !placed.contains(**file))
        .map(|file| (*file).to_string())
        .collect();
    if !leftover.is_empty() {
        log::debug!("Dependency cycle among {} files, ordering by path", leftover.len());
    }
    order.extend(leftover);
    order
}
