use std::path::Path;

use corvus_core::{CorvusError, Result};

const GENERIC_INSTRUCTIONS: &str = "\
Focus on correctness: logic errors, unhandled edge cases, off-by-one \
mistakes, resource leaks, and security vulnerabilities. Ignore style and \
formatting unless it hides a defect.";

/// Load review instructions for a language tag.
///
/// Resolution order:
/// 1. `<root>/<language>.md`
/// 2. `<root>/default.md`
/// 3. Built-in generic instructions.
///
/// A missing file falls through to the next step; a file that exists but
/// cannot be read is an error.
///
/// # Errors
///
/// Returns [`CorvusError::Io`] if an instruction file exists but reading
/// it fails.
///
/// # Examples
///
/// ```
/// use corvus_review::instructions::load_instructions;
///
/// // No instructions directory configured: built-in fallback.
/// let text = load_instructions("rust", None).unwrap();
/// assert!(text.contains("correctness"));
/// ```
pub fn load_instructions(language: &str, root: Option<&Path>) -> Result<String> {
    let Some(root) = root else {
        return Ok(GENERIC_INSTRUCTIONS.to_string());
    };

    for candidate in [
        root.join(format!("{language}.md")),
        root.join("default.md"),
    ] {
        match std::fs::read_to_string(&candidate) {
            Ok(text) => return Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(CorvusError::Io(e)),
        }
    }

    Ok(GENERIC_INSTRUCTIONS.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rust.md"), "Check lifetimes.").unwrap();
        std::fs::write(dir.path().join("default.md"), "Be thorough.").unwrap();

        let text = load_instructions("rust", Some(dir.path())).unwrap();
        assert_eq!(text, "Check lifetimes.");
    }

    #[test]
    fn default_file_used_when_language_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("default.md"), "Be thorough.").unwrap();

        let text = load_instructions("python", Some(dir.path())).unwrap();
        assert_eq!(text, "Be thorough.");
    }

    #[test]
    fn builtin_fallback_when_directory_empty() {
        let dir = tempfile::tempdir().unwrap();
        let text = load_instructions("go", Some(dir.path())).unwrap();
        assert!(text.contains("correctness"));
    }

    #[test]
    fn builtin_fallback_without_root() {
        let text = load_instructions("unknown", None).unwrap();
        assert!(text.contains("correctness"));
    }
}
