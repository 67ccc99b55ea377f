use std::path::Path;

/// Detect the language tag for a file path from its extension.
///
/// The tag is a lowercase identifier used to select review instructions
/// and to label the diff in the model prompt. Unrecognized or missing
/// extensions map to `"unknown"`; detection never fails.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use corvus_review::language::detect_language;
///
/// assert_eq!(detect_language(Path::new("src/main.rs")), "rust");
/// assert_eq!(detect_language(Path::new("app.py")), "python");
/// assert_eq!(detect_language(Path::new("LICENSE")), "unknown");
/// ```
pub fn detect_language(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return "unknown";
    };
    match ext.to_ascii_lowercase().as_str() {
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "javascript",
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "typescript",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "rb" => "ruby",
        "php" => "php",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" => "cpp",
        "cs" => "csharp",
        "swift" => "swift",
        "scala" => "scala",
        "sh" | "bash" => "shell",
        "sql" => "sql",
        "html" | "htm" => "html",
        "css" | "scss" | "less" => "css",
        "yml" | "yaml" => "yaml",
        "json" => "json",
        "toml" => "toml",
        "md" | "markdown" => "markdown",
        "tf" => "terraform",
        "proto" => "protobuf",
        _ => "unknown",
    }
}
