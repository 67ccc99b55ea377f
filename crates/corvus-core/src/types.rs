use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Hosting platform for the request under review.
///
/// # Examples
///
/// ```
/// use corvus_core::Platform;
///
/// let p: Platform = "gitlab".parse().unwrap();
/// assert_eq!(p, Platform::GitLab);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// GitHub pull requests.
    GitHub,
    /// GitLab merge requests.
    GitLab,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::GitHub => write!(f, "github"),
            Platform::GitLab => write!(f, "gitlab"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(Platform::GitHub),
            "gitlab" => Ok(Platform::GitLab),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// Identifies one review job: where the request lives and which
/// instructions apply. Immutable once constructed.
///
/// # Examples
///
/// ```
/// use corvus_core::{Platform, ReviewRequest};
/// use std::path::PathBuf;
///
/// let request = ReviewRequest {
///     platform: Platform::GitHub,
///     repository: "octocat/hello-world".into(),
///     number: 42,
///     instructions_dir: Some(PathBuf::from("docs/review")),
/// };
/// assert_eq!(request.number, 42);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    /// Hosting platform.
    pub platform: Platform,
    /// Repository identifier (`owner/repo` on GitHub, project path or id on GitLab).
    pub repository: String,
    /// Pull/merge request number.
    pub number: u64,
    /// Directory holding per-language review instructions.
    pub instructions_dir: Option<PathBuf>,
}

/// Request metadata returned alongside the raw diff.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    /// Request title.
    pub title: String,
    /// Author login.
    pub author: String,
    /// Base branch name.
    pub base_ref: String,
    /// Head branch name.
    pub head_ref: String,
    /// Head commit SHA (GitHub anchors inline comments to this).
    pub head_sha: String,
    /// Base commit SHA (GitLab discussion positions need it).
    pub base_sha: String,
    /// Start commit SHA (GitLab only; equals `base_sha` elsewhere).
    pub start_sha: String,
}

/// How a file changed within the diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// New file.
    Added,
    /// Existing file modified in place.
    Modified,
    /// File removed.
    Deleted,
    /// File renamed (with or without content changes).
    Renamed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Deleted => write!(f, "deleted"),
            ChangeKind::Renamed => write!(f, "renamed"),
        }
    }
}

/// Finding severity reported by the reviewer model.
///
/// # Examples
///
/// ```
/// use corvus_core::Severity;
///
/// let s: Severity = serde_json::from_str("\"bug\"").unwrap();
/// assert_eq!(s, Severity::Bug);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A likely defect that should block the merge.
    Bug,
    /// A potential issue worth investigating.
    Warning,
    /// An optional improvement.
    Suggestion,
    /// Informational observation.
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Bug => write!(f, "bug"),
            Severity::Warning => write!(f, "warning"),
            Severity::Suggestion => write!(f, "suggestion"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bug" => Ok(Severity::Bug),
            "warning" => Ok(Severity::Warning),
            "suggestion" => Ok(Severity::Suggestion),
            "info" => Ok(Severity::Info),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

impl Severity {
    /// Returns `true` if `self` is at least as severe as `threshold`.
    ///
    /// Severity order: Bug > Warning > Suggestion > Info.
    ///
    /// # Examples
    ///
    /// ```
    /// use corvus_core::Severity;
    ///
    /// assert!(Severity::Bug.meets_threshold(Severity::Warning));
    /// assert!(Severity::Warning.meets_threshold(Severity::Warning));
    /// assert!(!Severity::Suggestion.meets_threshold(Severity::Warning));
    /// ```
    pub fn meets_threshold(self, threshold: Severity) -> bool {
        self.rank() <= threshold.rank()
    }

    /// Ordering key: lower is more severe (bug = 0, info = 3).
    pub fn rank(self) -> u8 {
        match self {
            Severity::Bug => 0,
            Severity::Warning => 1,
            Severity::Suggestion => 2,
            Severity::Info => 3,
        }
    }
}

/// One piece of review feedback produced by the model for a file.
///
/// `line` is `None` for file-level findings (and for findings demoted to
/// file level because their anchor was rejected by the platform).
///
/// # Examples
///
/// ```
/// use corvus_core::{ReviewFinding, Severity};
/// use std::path::PathBuf;
///
/// let finding = ReviewFinding {
///     file_path: PathBuf::from("src/auth.rs"),
///     line: Some(42),
///     severity: Severity::Bug,
///     message: "Possible null dereference".into(),
///     suggestion: Some("Check for None before unwrapping".into()),
/// };
/// assert_eq!(finding.severity, Severity::Bug);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewFinding {
    /// Path to the file being commented on.
    pub file_path: PathBuf,
    /// Line number in the new version of the file, if anchorable.
    pub line: Option<u32>,
    /// Severity of the finding.
    pub severity: Severity,
    /// Explanation of the issue.
    pub message: String,
    /// Optional suggested replacement.
    pub suggestion: Option<String>,
}

/// Overall review outcome submitted to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    /// No findings across all reviewed files.
    Approve,
    /// At least one finding meets the configured severity threshold.
    RequestChanges,
    /// Findings exist but none meets the threshold.
    CommentOnly,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Approve => write!(f, "approve"),
            Verdict::RequestChanges => write!(f, "request-changes"),
            Verdict::CommentOnly => write!(f, "comment-only"),
        }
    }
}

/// One inline comment inside an [`AggregatedReview`], anchored to a
/// new-side line of the diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineComment {
    /// Path the comment anchors to.
    pub file_path: PathBuf,
    /// New-side line number.
    pub line: u32,
    /// Rendered comment body.
    pub body: String,
}

/// The final review submission: built once per request by the aggregator,
/// consumed exactly once by the platform client.
///
/// # Examples
///
/// ```
/// use corvus_core::{AggregatedReview, Verdict};
///
/// let review = AggregatedReview {
///     summary: "no reviewable changes".into(),
///     comments: vec![],
///     verdict: Verdict::Approve,
/// };
/// assert_eq!(review.verdict, Verdict::Approve);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedReview {
    /// Overall summary posted as the review body.
    pub summary: String,
    /// Inline comments ordered by (path, line).
    pub comments: Vec<InlineComment>,
    /// Overall outcome.
    pub verdict: Verdict,
}

/// Output format for CLI results.
///
/// Implements [`FromStr`] so it can be used directly with `clap`.
///
/// # Examples
///
/// ```
/// use corvus_core::OutputFormat;
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary (default).
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
