use std::fmt;
use std::path::{Path, PathBuf};

use corvus_core::{ChangeKind, CorvusError};
use serde::{Deserialize, Serialize};

/// A complete diff for a single file, containing zero or more hunks.
///
/// Binary files and pure renames carry no hunks; binary files additionally
/// set [`is_binary`](FileDiff::is_binary) and are never sent to the model.
///
/// # Examples
///
/// ```
/// use corvus_diff::parser::parse_unified_diff;
///
/// let diff = "diff --git a/hello.rs b/hello.rs\n--- a/hello.rs\n+++ b/hello.rs\n@@ -1,2 +1,3 @@\n fn main() {\n+    println!(\"hello\");\n }\n";
/// let parsed = parse_unified_diff(diff);
/// assert_eq!(parsed.files.len(), 1);
/// assert!(parsed.failures.is_empty());
/// assert_eq!(parsed.files[0].hunks.len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDiff {
    /// Path in the old version.
    pub old_path: PathBuf,
    /// Path in the new version.
    pub new_path: PathBuf,
    /// How this file changed.
    pub change_kind: ChangeKind,
    /// Parsed hunks, in the order they appear in the diff text.
    pub hunks: Vec<DiffHunk>,
    /// Whether the platform marked this file as binary.
    pub is_binary: bool,
}

impl FileDiff {
    /// The path inline comments should anchor to: the old path for
    /// deletions, the new path otherwise.
    pub fn path(&self) -> &Path {
        if self.change_kind == ChangeKind::Deleted {
            &self.old_path
        } else {
            &self.new_path
        }
    }

    /// Whether any line of this diff exists on the new side at `line`.
    /// Only added and context lines can anchor a platform comment.
    pub fn anchors_new_line(&self, line: u32) -> bool {
        self.hunks
            .iter()
            .flat_map(|h| &h.lines)
            .any(|l| l.new_line == Some(line))
    }

    /// Render the hunks back into unified-diff text for the model prompt.
    /// Only changed lines plus the context the diff already carries — never
    /// whole files.
    pub fn to_prompt_text(&self) -> String {
        use std::fmt::Write;
        let mut text = String::new();
        if self.old_path == Path::new("/dev/null") {
            let _ = writeln!(text, "--- /dev/null");
        } else {
            let _ = writeln!(text, "--- a/{}", self.old_path.display());
        }
        if self.new_path == Path::new("/dev/null") {
            let _ = writeln!(text, "+++ /dev/null");
        } else {
            let _ = writeln!(text, "+++ b/{}", self.new_path.display());
        }
        for hunk in &self.hunks {
            let _ = writeln!(
                text,
                "@@ -{},{} +{},{} @@",
                hunk.old_start, hunk.old_lines, hunk.new_start, hunk.new_lines
            );
            for line in &hunk.lines {
                let marker = match line.kind {
                    LineKind::Context => ' ',
                    LineKind::Added => '+',
                    LineKind::Removed => '-',
                };
                let _ = writeln!(text, "{marker}{}", line.content);
            }
        }
        text
    }
}

impl fmt::Display for FileDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} hunks)", self.path().display(), self.hunks.len())
    }
}

/// A single hunk from a unified diff, with every line's resolved position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffHunk {
    /// Starting line in the old version.
    pub old_start: u32,
    /// Number of old-side lines declared by the header.
    pub old_lines: u32,
    /// Starting line in the new version.
    pub new_start: u32,
    /// Number of new-side lines declared by the header.
    pub new_lines: u32,
    /// Lines in diff order.
    pub lines: Vec<DiffLine>,
}

/// One line within a hunk.
///
/// Line numbers track the hunk header arithmetic exactly: context lines
/// carry both sides, added lines only the new side, removed lines only the
/// old side. Inline comments are anchored through `new_line`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffLine {
    /// Classification of the line.
    pub kind: LineKind,
    /// Line content without the leading marker.
    pub content: String,
    /// Resolved line number in the old file (context and removed lines).
    pub old_line: Option<u32>,
    /// Resolved line number in the new file (context and added lines).
    pub new_line: Option<u32>,
}

/// Classification of a diff line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    /// Unchanged line present on both sides.
    Context,
    /// Line added on the new side.
    Added,
    /// Line removed from the old side.
    Removed,
}

/// One file section that could not be parsed. Local to that file; the rest
/// of the diff is unaffected.
#[derive(Debug)]
pub struct ParseFailure {
    /// Best-known path for the failed section.
    pub path: String,
    /// The underlying [`CorvusError::MalformedDiff`].
    pub error: CorvusError,
}

/// Outcome of parsing a whole unified diff: the files that parsed plus the
/// sections that did not.
#[derive(Debug, Default)]
pub struct ParsedDiff {
    /// Successfully parsed files, in diff order.
    pub files: Vec<FileDiff>,
    /// Per-file parse failures, in diff order.
    pub failures: Vec<ParseFailure>,
}

/// Parse a unified diff (as produced by `git diff` or the platform APIs)
/// into structured per-file records.
///
/// Pure function, no I/O. A malformed hunk header, or a hunk whose body does
/// not match the lengths its header declares, fails only that file: the
/// section lands in [`ParsedDiff::failures`] and parsing continues at the
/// next `diff --git` boundary.
///
/// # Examples
///
/// ```
/// use corvus_diff::parser::parse_unified_diff;
///
/// let parsed = parse_unified_diff("");
/// assert!(parsed.files.is_empty());
/// assert!(parsed.failures.is_empty());
/// ```
pub fn parse_unified_diff(input: &str) -> ParsedDiff {
    let mut result = ParsedDiff::default();
    let mut current: Option<PendingFile> = None;
    let mut skipping = false;

    for line in input.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            finish_file(current.take(), &mut result);
            skipping = false;
            current = Some(PendingFile::from_git_header(rest));
            continue;
        }

        if skipping {
            continue;
        }

        // Inside an unfinished hunk body every line is content, including
        // ones that happen to start with "---".
        if let Some(file) = current.as_mut() {
            if file.hunk.as_ref().is_some_and(PendingHunk::expects_lines) {
                if let Err(e) = file.push_hunk_line(line) {
                    result.failures.push(ParseFailure {
                        path: file.best_path(),
                        error: e,
                    });
                    current = None;
                    skipping = true;
                }
                continue;
            }
        }

        // Implicitly start a file on a bare patch without a git header. A
        // second "---" after a completed hunk is the next file's boundary.
        if line.starts_with("--- ") {
            if current
                .as_ref()
                .is_some_and(|f| f.hunk.is_some() || !f.hunks.is_empty())
            {
                finish_file(current.take(), &mut result);
            }
            if current.is_none() {
                current = Some(PendingFile::default());
            }
        }

        let Some(file) = current.as_mut() else {
            continue;
        };

        let outcome = file.push_meta_line(line);
        if let Err(e) = outcome {
            result.failures.push(ParseFailure {
                path: file.best_path(),
                error: e,
            });
            current = None;
            skipping = true;
        }
    }

    finish_file(current.take(), &mut result);
    result
}

fn finish_file(pending: Option<PendingFile>, result: &mut ParsedDiff) {
    let Some(mut file) = pending else {
        return;
    };
    let path = file.best_path();
    match file.finish() {
        Ok(Some(diff)) => result.files.push(diff),
        Ok(None) => {}
        Err(error) => result.failures.push(ParseFailure { path, error }),
    }
}

#[derive(Default)]
struct PendingFile {
    old_path: PathBuf,
    new_path: PathBuf,
    hunks: Vec<DiffHunk>,
    hunk: Option<PendingHunk>,
    is_new_file: bool,
    is_deleted_file: bool,
    is_rename: bool,
    is_binary: bool,
}

impl PendingFile {
    /// Seed paths from the `diff --git a/... b/...` line; later `---`/`+++`
    /// or rename headers override them. Paths containing spaces are only
    /// recovered from the later headers.
    fn from_git_header(rest: &str) -> Self {
        let mut file = Self::default();
        let parts: Vec<&str> = rest.split(' ').collect();
        if parts.len() == 2 {
            file.old_path = parse_path(parts[0]);
            file.new_path = parse_path(parts[1]);
        }
        file
    }

    fn best_path(&self) -> String {
        let path = if self.is_deleted_file || self.new_path.as_os_str().is_empty() {
            &self.old_path
        } else {
            &self.new_path
        };
        if path.as_os_str().is_empty() {
            "<unknown>".into()
        } else {
            path.display().to_string()
        }
    }

    fn push_meta_line(&mut self, line: &str) -> Result<(), CorvusError> {
        if line.starts_with("Binary files ") && line.ends_with(" differ")
            || line.starts_with("GIT binary patch")
        {
            self.is_binary = true;
            return Ok(());
        }
        if line.starts_with("new file mode") {
            self.is_new_file = true;
            return Ok(());
        }
        if line.starts_with("deleted file mode") {
            self.is_deleted_file = true;
            return Ok(());
        }
        if let Some(path) = line.strip_prefix("rename from ") {
            self.is_rename = true;
            self.old_path = parse_path(path);
            return Ok(());
        }
        if let Some(path) = line.strip_prefix("rename to ") {
            self.is_rename = true;
            self.new_path = parse_path(path);
            return Ok(());
        }
        if line.starts_with("index ")
            || line.starts_with("similarity index")
            || line.starts_with("old mode")
            || line.starts_with("new mode")
        {
            return Ok(());
        }
        if let Some(path) = line.strip_prefix("--- ") {
            self.old_path = parse_path(path);
            return Ok(());
        }
        if let Some(path) = line.strip_prefix("+++ ") {
            self.new_path = parse_path(path);
            if path.trim_matches('"') == "/dev/null" {
                self.is_deleted_file = true;
            }
            return Ok(());
        }
        if line.starts_with("@@ ") {
            self.flush_hunk()?;
            let (old_start, old_lines, new_start, new_lines) = parse_hunk_header(line)?;
            self.hunk = Some(PendingHunk::new(old_start, old_lines, new_start, new_lines));
            return Ok(());
        }
        // A body-marker line arriving after the hunk satisfied its header
        // means the body runs longer than declared.
        if let Some(hunk) = &self.hunk {
            if line.is_empty() || line.starts_with(['+', '-', ' ']) {
                return Err(CorvusError::MalformedDiff(format!(
                    "hunk body exceeds header lengths (-{},{} +{},{})",
                    hunk.old_start, hunk.old_lines, hunk.new_start, hunk.new_lines
                )));
            }
        }
        // Anything else between hunks is noise (mode lines, extended headers).
        Ok(())
    }

    fn push_hunk_line(&mut self, line: &str) -> Result<(), CorvusError> {
        let Some(hunk) = self.hunk.as_mut() else {
            return Err(CorvusError::MalformedDiff(
                "hunk content outside any hunk".into(),
            ));
        };
        if line == "\\ No newline at end of file" {
            return Ok(());
        }
        hunk.push_line(line)
    }

    fn flush_hunk(&mut self) -> Result<(), CorvusError> {
        if let Some(hunk) = self.hunk.take() {
            self.hunks.push(hunk.finish()?);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<FileDiff>, CorvusError> {
        self.flush_hunk()?;

        let change_kind = if self.is_rename {
            ChangeKind::Renamed
        } else if self.is_new_file || self.old_path == Path::new("/dev/null") {
            ChangeKind::Added
        } else if self.is_deleted_file || self.new_path == Path::new("/dev/null") {
            ChangeKind::Deleted
        } else {
            ChangeKind::Modified
        };

        // A section with no paths and no hunks carries nothing reviewable.
        if self.old_path.as_os_str().is_empty()
            && self.new_path.as_os_str().is_empty()
            && self.hunks.is_empty()
            && !self.is_binary
        {
            return Ok(None);
        }

        if change_kind != ChangeKind::Deleted && self.new_path.as_os_str().is_empty() {
            return Err(CorvusError::MalformedDiff(
                "file section has no usable path".into(),
            ));
        }

        Ok(Some(FileDiff {
            old_path: std::mem::take(&mut self.old_path),
            new_path: std::mem::take(&mut self.new_path),
            change_kind,
            hunks: std::mem::take(&mut self.hunks),
            is_binary: self.is_binary,
        }))
    }
}

struct PendingHunk {
    old_start: u32,
    old_lines: u32,
    new_start: u32,
    new_lines: u32,
    lines: Vec<DiffLine>,
    next_old: u32,
    next_new: u32,
    old_seen: u32,
    new_seen: u32,
}

impl PendingHunk {
    fn new(old_start: u32, old_lines: u32, new_start: u32, new_lines: u32) -> Self {
        Self {
            old_start,
            old_lines,
            new_start,
            new_lines,
            lines: Vec::new(),
            next_old: old_start,
            next_new: new_start,
            old_seen: 0,
            new_seen: 0,
        }
    }

    /// True while the body has fewer lines than the header declared.
    fn expects_lines(&self) -> bool {
        self.old_seen < self.old_lines || self.new_seen < self.new_lines
    }

    fn push_line(&mut self, line: &str) -> Result<(), CorvusError> {
        let (kind, content) = if let Some(rest) = line.strip_prefix('+') {
            (LineKind::Added, rest)
        } else if let Some(rest) = line.strip_prefix('-') {
            (LineKind::Removed, rest)
        } else if let Some(rest) = line.strip_prefix(' ') {
            (LineKind::Context, rest)
        } else if line.is_empty() {
            // Some producers emit blank context lines without the marker.
            (LineKind::Context, "")
        } else {
            return Err(CorvusError::MalformedDiff(format!(
                "unexpected line inside hunk: {line}"
            )));
        };

        let (old_line, new_line) = match kind {
            LineKind::Context => {
                self.old_seen += 1;
                self.new_seen += 1;
                let pair = (Some(self.next_old), Some(self.next_new));
                self.next_old += 1;
                self.next_new += 1;
                pair
            }
            LineKind::Added => {
                self.new_seen += 1;
                let n = Some(self.next_new);
                self.next_new += 1;
                (None, n)
            }
            LineKind::Removed => {
                self.old_seen += 1;
                let o = Some(self.next_old);
                self.next_old += 1;
                (o, None)
            }
        };

        if self.old_seen > self.old_lines || self.new_seen > self.new_lines {
            return Err(CorvusError::MalformedDiff(format!(
                "hunk body exceeds header lengths (-{},{} +{},{})",
                self.old_start, self.old_lines, self.new_start, self.new_lines
            )));
        }

        self.lines.push(DiffLine {
            kind,
            content: content.to_string(),
            old_line,
            new_line,
        });
        Ok(())
    }

    fn finish(self) -> Result<DiffHunk, CorvusError> {
        if self.old_seen != self.old_lines || self.new_seen != self.new_lines {
            return Err(CorvusError::MalformedDiff(format!(
                "hunk body has {} old / {} new lines but header declares -{},{} +{},{}",
                self.old_seen,
                self.new_seen,
                self.old_start,
                self.old_lines,
                self.new_start,
                self.new_lines
            )));
        }
        Ok(DiffHunk {
            old_start: self.old_start,
            old_lines: self.old_lines,
            new_start: self.new_start,
            new_lines: self.new_lines,
            lines: self.lines,
        })
    }
}

fn parse_path(raw: &str) -> PathBuf {
    let normalized = raw.trim_matches('"');

    if normalized == "/dev/null" {
        return PathBuf::from("/dev/null");
    }

    let stripped = normalized
        .strip_prefix("a/")
        .or_else(|| normalized.strip_prefix("b/"))
        .unwrap_or(normalized);

    PathBuf::from(stripped)
}

fn parse_hunk_header(line: &str) -> Result<(u32, u32, u32, u32), CorvusError> {
    let inner = line
        .strip_prefix("@@ ")
        .and_then(|s| {
            let end = s.find(" @@")?;
            Some(&s[..end])
        })
        .ok_or_else(|| CorvusError::MalformedDiff(format!("invalid hunk header: {line}")))?;

    let parts: Vec<&str> = inner.split(' ').collect();
    if parts.len() != 2 {
        return Err(CorvusError::MalformedDiff(format!(
            "invalid hunk header: {line}"
        )));
    }

    let old = parts[0].strip_prefix('-').ok_or_else(|| {
        CorvusError::MalformedDiff(format!("invalid old range in hunk: {line}"))
    })?;
    let new = parts[1].strip_prefix('+').ok_or_else(|| {
        CorvusError::MalformedDiff(format!("invalid new range in hunk: {line}"))
    })?;

    let (old_start, old_lines) = parse_range(old, line)?;
    let (new_start, new_lines) = parse_range(new, line)?;

    Ok((old_start, old_lines, new_start, new_lines))
}

// Lengths may be omitted, implying 1: "@@ -3 +3 @@".
fn parse_range(range: &str, context: &str) -> Result<(u32, u32), CorvusError> {
    if let Some((start, count)) = range.split_once(',') {
        let s = start.parse().map_err(|_| {
            CorvusError::MalformedDiff(format!("invalid range number in: {context}"))
        })?;
        let c = count.parse().map_err(|_| {
            CorvusError::MalformedDiff(format!("invalid range count in: {context}"))
        })?;
        Ok((s, c))
    } else {
        let s = range.parse().map_err(|_| {
            CorvusError::MalformedDiff(format!("invalid range number in: {context}"))
        })?;
        Ok((s, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_diff_returns_nothing() {
        let parsed = parse_unified_diff("");
        assert!(parsed.files.is_empty());
        assert!(parsed.failures.is_empty());
    }

    #[test]
    fn single_file_single_hunk_resolves_line_numbers() {
        let diff = "\
diff --git a/src/main.rs b/src/main.rs
index abc1234..def5678 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -1,3 +1,4 @@
 fn main() {
+    println!(\"hello\");
     let x = 1;
 }
";
        let parsed = parse_unified_diff(diff);
        assert_eq!(parsed.files.len(), 1);
        let file = &parsed.files[0];
        assert_eq!(file.new_path, PathBuf::from("src/main.rs"));
        assert_eq!(file.change_kind, ChangeKind::Modified);

        let hunk = &file.hunks[0];
        assert_eq!((hunk.old_start, hunk.old_lines), (1, 3));
        assert_eq!((hunk.new_start, hunk.new_lines), (1, 4));

        // fn main() { — context, both sides line 1
        assert_eq!(hunk.lines[0].old_line, Some(1));
        assert_eq!(hunk.lines[0].new_line, Some(1));
        // added println — new side only, line 2
        assert_eq!(hunk.lines[1].kind, LineKind::Added);
        assert_eq!(hunk.lines[1].old_line, None);
        assert_eq!(hunk.lines[1].new_line, Some(2));
        // let x — context, old 2 / new 3
        assert_eq!(hunk.lines[2].old_line, Some(2));
        assert_eq!(hunk.lines[2].new_line, Some(3));
        // } — context, old 3 / new 4
        assert_eq!(hunk.lines[3].old_line, Some(3));
        assert_eq!(hunk.lines[3].new_line, Some(4));
    }

    // Re-derived counts must reproduce the header arithmetic exactly.
    #[test]
    fn line_numbers_roundtrip_header_arithmetic() {
        let diff = "\
diff --git a/lib.rs b/lib.rs
--- a/lib.rs
+++ b/lib.rs
@@ -10,4 +12,5 @@
 ctx1
-gone
+new1
+new2
 ctx2
 ctx3
@@ -40,3 +43,2 @@
 keep
-dropped
 tail
";
        let parsed = parse_unified_diff(diff);
        assert!(parsed.failures.is_empty());
        for hunk in &parsed.files[0].hunks {
            let old_count = hunk
                .lines
                .iter()
                .filter(|l| l.kind != LineKind::Added)
                .count() as u32;
            let new_count = hunk
                .lines
                .iter()
                .filter(|l| l.kind != LineKind::Removed)
                .count() as u32;
            assert_eq!(old_count, hunk.old_lines);
            assert_eq!(new_count, hunk.new_lines);

            // Numbers are consecutive from the declared starts.
            let mut expect_old = hunk.old_start;
            let mut expect_new = hunk.new_start;
            for line in &hunk.lines {
                if let Some(o) = line.old_line {
                    assert_eq!(o, expect_old);
                    expect_old += 1;
                }
                if let Some(n) = line.new_line {
                    assert_eq!(n, expect_new);
                    expect_new += 1;
                }
            }
        }
    }

    #[test]
    fn deletion_only_file_numbers_old_side() {
        let diff = "\
diff --git a/old.rs b/old.rs
deleted file mode 100644
--- a/old.rs
+++ /dev/null
@@ -1,3 +0,0 @@
-fn goodbye() {
-    println!(\"old\");
-}
";
        let parsed = parse_unified_diff(diff);
        let file = &parsed.files[0];
        assert_eq!(file.change_kind, ChangeKind::Deleted);
        assert_eq!(file.path(), Path::new("old.rs"));
        for (i, line) in file.hunks[0].lines.iter().enumerate() {
            assert_eq!(line.kind, LineKind::Removed);
            assert_eq!(line.old_line, Some(i as u32 + 1));
            assert_eq!(line.new_line, None);
        }
    }

    #[test]
    fn addition_only_file_numbers_new_side() {
        let diff = "\
diff --git a/new.rs b/new.rs
new file mode 100644
--- /dev/null
+++ b/new.rs
@@ -0,0 +1,3 @@
+fn hello() {
+    println!(\"new\");
+}
";
        let parsed = parse_unified_diff(diff);
        let file = &parsed.files[0];
        assert_eq!(file.change_kind, ChangeKind::Added);
        for (i, line) in file.hunks[0].lines.iter().enumerate() {
            assert_eq!(line.kind, LineKind::Added);
            assert_eq!(line.old_line, None);
            assert_eq!(line.new_line, Some(i as u32 + 1));
        }
    }

    #[test]
    fn omitted_length_implies_one() {
        let diff = "\
diff --git a/f.rs b/f.rs
--- a/f.rs
+++ b/f.rs
@@ -1 +1 @@
-old
+new
";
        let parsed = parse_unified_diff(diff);
        assert!(parsed.failures.is_empty());
        let hunk = &parsed.files[0].hunks[0];
        assert_eq!(hunk.old_lines, 1);
        assert_eq!(hunk.new_lines, 1);
    }

    #[test]
    fn malformed_header_fails_only_that_file() {
        let diff = "\
diff --git a/bad.rs b/bad.rs
--- a/bad.rs
+++ b/bad.rs
@@ not a header @@
+garbage
diff --git a/good.rs b/good.rs
--- a/good.rs
+++ b/good.rs
@@ -1 +1,2 @@
 line1
+line2
";
        let parsed = parse_unified_diff(diff);
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.files[0].new_path, PathBuf::from("good.rs"));
        assert_eq!(parsed.failures.len(), 1);
        assert_eq!(parsed.failures[0].path, "bad.rs");
        assert!(matches!(
            parsed.failures[0].error,
            CorvusError::MalformedDiff(_)
        ));
    }

    #[test]
    fn body_count_mismatch_is_malformed() {
        let diff = "\
diff --git a/short.rs b/short.rs
--- a/short.rs
+++ b/short.rs
@@ -1,3 +1,3 @@
 only one line
";
        let parsed = parse_unified_diff(diff);
        assert!(parsed.files.is_empty());
        assert_eq!(parsed.failures.len(), 1);
        assert!(parsed.failures[0]
            .error
            .to_string()
            .contains("header declares"));
    }

    #[test]
    fn hunk_body_longer_than_header_fails_that_file() {
        let diff = "\
diff --git a/over.rs b/over.rs
--- a/over.rs
+++ b/over.rs
@@ -1,1 +1,1 @@
 ctx
+extra
diff --git a/good.rs b/good.rs
--- a/good.rs
+++ b/good.rs
@@ -1 +1,2 @@
 line1
+line2
";
        let parsed = parse_unified_diff(diff);
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.files[0].new_path, PathBuf::from("good.rs"));
        assert_eq!(parsed.failures.len(), 1);
        assert_eq!(parsed.failures[0].path, "over.rs");
        assert!(parsed.failures[0]
            .error
            .to_string()
            .contains("exceeds header lengths"));
    }

    #[test]
    fn trailing_context_beyond_header_fails_that_file() {
        let diff = "\
diff --git a/over.rs b/over.rs
--- a/over.rs
+++ b/over.rs
@@ -1,2 +1,2 @@
 one
 two
 three
";
        let parsed = parse_unified_diff(diff);
        assert!(parsed.files.is_empty());
        assert_eq!(parsed.failures.len(), 1);
        assert!(parsed.failures[0]
            .error
            .to_string()
            .contains("exceeds header lengths"));
    }

    #[test]
    fn bare_dev_null_old_side_is_an_addition() {
        let diff = "\
--- /dev/null
+++ b/new.rs
@@ -0,0 +1,2 @@
+fn hello() {}
+fn world() {}
";
        let parsed = parse_unified_diff(diff);
        assert!(parsed.failures.is_empty());
        let file = &parsed.files[0];
        assert_eq!(file.change_kind, ChangeKind::Added);
        assert_eq!(file.path(), Path::new("new.rs"));

        let text = file.to_prompt_text();
        assert!(text.starts_with("--- /dev/null\n+++ b/new.rs\n"));
    }

    #[test]
    fn binary_file_kept_with_flag_and_no_hunks() {
        let diff = "\
diff --git a/image.png b/image.png
Binary files a/image.png and b/image.png differ
diff --git a/code.rs b/code.rs
--- a/code.rs
+++ b/code.rs
@@ -1 +1,2 @@
 line1
+line2
";
        let parsed = parse_unified_diff(diff);
        assert_eq!(parsed.files.len(), 2);
        assert!(parsed.files[0].is_binary);
        assert!(parsed.files[0].hunks.is_empty());
        assert_eq!(parsed.files[0].new_path, PathBuf::from("image.png"));
        assert!(!parsed.files[1].is_binary);
    }

    #[test]
    fn rename_without_content_has_zero_hunks() {
        let diff = "\
diff --git a/old_name.rs b/new_name.rs
similarity index 100%
rename from old_name.rs
rename to new_name.rs
";
        let parsed = parse_unified_diff(diff);
        assert_eq!(parsed.files.len(), 1);
        let file = &parsed.files[0];
        assert_eq!(file.change_kind, ChangeKind::Renamed);
        assert_eq!(file.old_path, PathBuf::from("old_name.rs"));
        assert_eq!(file.new_path, PathBuf::from("new_name.rs"));
        assert!(file.hunks.is_empty());
    }

    #[test]
    fn removed_line_starting_with_dashes_is_content() {
        let diff = "\
diff --git a/f.py b/f.py
--- a/f.py
+++ b/f.py
@@ -1,2 +1,1 @@
--- not a file header
 keep
";
        let parsed = parse_unified_diff(diff);
        assert!(parsed.failures.is_empty());
        let hunk = &parsed.files[0].hunks[0];
        assert_eq!(hunk.lines[0].kind, LineKind::Removed);
        assert_eq!(hunk.lines[0].content, "-- not a file header");
    }

    #[test]
    fn no_newline_marker_is_skipped() {
        let diff = "\
diff --git a/f.rs b/f.rs
--- a/f.rs
+++ b/f.rs
@@ -1 +1 @@
-old
\\ No newline at end of file
+new
\\ No newline at end of file
";
        let parsed = parse_unified_diff(diff);
        assert!(parsed.failures.is_empty());
        let lines = &parsed.files[0].hunks[0].lines;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].content, "old");
        assert_eq!(lines[1].content, "new");
    }

    #[test]
    fn quoted_paths_are_parsed() {
        let diff = r#"--- "a/src/my file.rs"
+++ "b/src/my file.rs"
@@ -1 +1,2 @@
 old
+new
"#;
        let parsed = parse_unified_diff(diff);
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.files[0].old_path, PathBuf::from("src/my file.rs"));
        assert_eq!(parsed.files[0].new_path, PathBuf::from("src/my file.rs"));
    }

    #[test]
    fn anchors_new_line_only_on_added_and_context() {
        let diff = "\
diff --git a/f.rs b/f.rs
--- a/f.rs
+++ b/f.rs
@@ -5,2 +5,2 @@
 ctx
-removed
+added
";
        let parsed = parse_unified_diff(diff);
        let file = &parsed.files[0];
        assert!(file.anchors_new_line(5)); // context
        assert!(file.anchors_new_line(6)); // added
        assert!(!file.anchors_new_line(7)); // beyond the hunk
    }

    #[test]
    fn prompt_text_roundtrips_markers() {
        let diff = "\
diff --git a/f.rs b/f.rs
--- a/f.rs
+++ b/f.rs
@@ -1,2 +1,2 @@
 ctx
-old
+new
";
        // Deliberately a modify hunk: -1,2 covers ctx+old, +1,2 covers ctx+new.
        let parsed = parse_unified_diff(diff);
        assert!(parsed.failures.is_empty());
        let text = parsed.files[0].to_prompt_text();
        assert!(text.contains("@@ -1,2 +1,2 @@"));
        assert!(text.contains("\n-old\n"));
        assert!(text.contains("\n+new\n"));
        assert!(text.contains("\n ctx\n"));
    }
}
