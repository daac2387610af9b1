use crate::error::Result;
use serde::Serialize;
use snipgraph_chunker::Snippet;

/// Markdown bundle: one `## <source>:` section with a fenced block per file.
///
/// Expects presentation-ordered input; a file that reappears after another
/// file starts a new section.
#[must_use]
pub fn render_markdown(snippets: &[Snippet]) -> String {
    let mut out = String::new();
    let mut current: Option<&str> = None;

    for snippet in snippets {
        if current == Some(snippet.source.as_str()) {
            out.push('\n');
        } else {
            if current.is_some() {
                out.push_str("```\n\n");
            }
            out.push_str(&format!("## {}:\n```\n", snippet.source));
            current = Some(&snippet.source);
        }
        out.push_str(snippet.content.trim_end_matches('\n'));
        out.push('\n');
    }

    if current.is_some() {
        out.push_str("```\n");
    }
    out
}

#[derive(Serialize)]
struct JsonBundle<'a> {
    count: usize,
    snippets: &'a [Snippet],
}

/// Pretty JSON `{count, snippets}` for machine consumers
pub fn render_json(snippets: &[Snippet]) -> Result<String> {
    let bundle = JsonBundle {
        count: snippets.len(),
        snippets,
    };
    Ok(serde_json::to_string_pretty(&bundle)?)
}
