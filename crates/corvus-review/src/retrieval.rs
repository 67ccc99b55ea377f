use std::path::Path;

/// A snippet of repository context attached to a review prompt.
#[derive(Debug, Clone)]
pub struct ContextSnippet {
    /// Where the snippet came from.
    pub source: String,
    /// The snippet text.
    pub text: String,
}

/// Supplies extra repository context for a file under review.
///
/// Retrieval is optional; when no retriever is configured the engine
/// reviews the diff alone. Implementations must be cheap enough to call
/// once per file.
pub trait ContextRetriever: Send + Sync {
    /// Return context snippets relevant to `path`, most relevant first.
    fn retrieve(&self, path: &Path) -> Vec<ContextSnippet>;
}

/// Render snippets into a prompt section, or `None` when there are none.
pub fn render_context(snippets: &[ContextSnippet]) -> Option<String> {
    if snippets.is_empty() {
        return None;
    }
    let mut out = String::from("Repository context:\n");
    for snippet in snippets {
        out.push_str(&format!("\n--- {} ---\n{}\n", snippet.source, snippet.text));
    }
    Some(out)
}
