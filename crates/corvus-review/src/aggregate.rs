use std::fmt::Write;

use corvus_core::{AggregatedReview, InlineComment, ReviewFinding, Severity, Verdict};

use crate::engine::{FileOutcome, FileStatus};

/// Merge per-file outcomes into one review.
///
/// Inline comments are the anchored findings, capped at `max_comments`
/// (highest severity kept) and sorted by path then line so repeated runs
/// over the same outcomes produce identical output. File-level findings
/// and per-file failures are folded into the summary. The verdict is
/// [`Verdict::RequestChanges`] when any finding meets `threshold`,
/// [`Verdict::Approve`] when nothing was found and nothing failed, and
/// [`Verdict::CommentOnly`] otherwise.
///
/// # Examples
///
/// ```
/// use corvus_core::{Severity, Verdict};
/// use corvus_review::aggregate::aggregate;
///
/// let review = aggregate(&[], Severity::Bug, 25);
/// assert_eq!(review.verdict, Verdict::Approve);
/// assert!(review.summary.contains("no reviewable changes"));
/// ```
pub fn aggregate(
    outcomes: &[FileOutcome],
    threshold: Severity,
    max_comments: usize,
) -> AggregatedReview {
    let mut findings: Vec<&ReviewFinding> = Vec::new();
    let mut failures: Vec<(&std::path::Path, &str)> = Vec::new();
    let mut reviewed = 0usize;
    let mut skipped = 0usize;

    for outcome in outcomes {
        match &outcome.status {
            FileStatus::Reviewed { findings: f } => {
                reviewed += 1;
                findings.extend(f.iter());
            }
            FileStatus::Failed { reason } => failures.push((&outcome.path, reason)),
            FileStatus::Skipped { .. } => skipped += 1,
        }
    }
    failures.sort_by_key(|(path, _)| *path);

    if findings.is_empty() && failures.is_empty() && reviewed == 0 {
        return AggregatedReview {
            summary: "Corvus found no reviewable changes in this request.".into(),
            comments: Vec::new(),
            verdict: Verdict::Approve,
        };
    }

    let blocking = findings.iter().any(|f| f.severity.meets_threshold(threshold));
    let verdict = if blocking {
        Verdict::RequestChanges
    } else if findings.is_empty() && failures.is_empty() {
        Verdict::Approve
    } else {
        Verdict::CommentOnly
    };

    let (comments, overflow) = build_comments(&findings, max_comments);
    let summary = build_summary(&findings, &failures, reviewed, skipped, overflow, verdict);

    AggregatedReview {
        summary,
        comments,
        verdict,
    }
}

fn build_comments(findings: &[&ReviewFinding], max_comments: usize) -> (Vec<InlineComment>, usize) {
    let mut anchored: Vec<&ReviewFinding> =
        findings.iter().copied().filter(|f| f.line.is_some()).collect();

    // Severity decides what survives the cap; path/line decides the order.
    anchored.sort_by(|a, b| {
        (a.severity.rank(), &a.file_path, a.line).cmp(&(b.severity.rank(), &b.file_path, b.line))
    });
    let overflow = anchored.len().saturating_sub(max_comments);
    anchored.truncate(max_comments);
    anchored.sort_by(|a, b| (&a.file_path, a.line).cmp(&(&b.file_path, b.line)));

    let comments = anchored
        .into_iter()
        .map(|f| InlineComment {
            file_path: f.file_path.clone(),
            line: f.line.unwrap_or(1),
            body: render_finding(f),
        })
        .collect();
    (comments, overflow)
}

fn render_finding(finding: &ReviewFinding) -> String {
    let mut body = format!(
        "**{} {}**\n\n{}",
        severity_emoji(finding.severity),
        severity_label(finding.severity),
        finding.message
    );
    if let Some(s) = &finding.suggestion {
        let _ = write!(body, "\n\n**Suggestion:** {s}");
    }
    body
}

fn build_summary(
    findings: &[&ReviewFinding],
    failures: &[(&std::path::Path, &str)],
    reviewed: usize,
    skipped: usize,
    overflow: usize,
    verdict: Verdict,
) -> String {
    let mut out = String::from("## Corvus review\n\n");

    let count = |s: Severity| findings.iter().filter(|f| f.severity == s).count();
    let _ = writeln!(
        out,
        "Reviewed {reviewed} file(s) ({skipped} skipped): \
         {} bug(s), {} warning(s), {} suggestion(s), {} info.",
        count(Severity::Bug),
        count(Severity::Warning),
        count(Severity::Suggestion),
        count(Severity::Info),
    );

    let file_level: Vec<&&ReviewFinding> = findings.iter().filter(|f| f.line.is_none()).collect();
    if !file_level.is_empty() {
        out.push_str("\n### File-level findings\n\n");
        for f in file_level {
            let _ = writeln!(
                out,
                "- **{}** ({}): {}",
                f.file_path.display(),
                severity_label(f.severity),
                f.message
            );
        }
    }

    if !failures.is_empty() {
        out.push_str("\n### Files that could not be reviewed\n\n");
        for (path, reason) in failures {
            let _ = writeln!(out, "- **{}**: {reason}", path.display());
        }
    }

    if overflow > 0 {
        let _ = writeln!(
            out,
            "\n{overflow} lower-severity finding(s) were left out to stay under the comment limit."
        );
    }

    if verdict == Verdict::Approve {
        out.push_str("\nNo issues found.\n");
    }

    out
}

fn severity_label(s: Severity) -> &'static str {
    match s {
        Severity::Bug => "Bug",
        Severity::Warning => "Warning",
        Severity::Suggestion => "Suggestion",
        Severity::Info => "Info",
    }
}

fn severity_emoji(s: Severity) -> &'static str {
    match s {
        Severity::Bug => "\u{1f41b}",
        Severity::Warning => "\u{26a0}\u{fe0f}",
        Severity::Suggestion => "\u{1f4a1}",
        Severity::Info => "\u{2139}\u{fe0f}",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn reviewed(path: &str, findings: Vec<ReviewFinding>) -> FileOutcome {
        FileOutcome {
            path: PathBuf::from(path),
            status: FileStatus::Reviewed { findings },
        }
    }

    fn finding(path: &str, line: Option<u32>, severity: Severity, message: &str) -> ReviewFinding {
        ReviewFinding {
            file_path: PathBuf::from(path),
            line,
            severity,
            message: message.into(),
            suggestion: None,
        }
    }

    #[test]
    fn empty_outcomes_approve_with_no_changes_note() {
        let review = aggregate(&[], Severity::Bug, 25);
        assert_eq!(review.verdict, Verdict::Approve);
        assert!(review.comments.is_empty());
        assert!(review.summary.contains("no reviewable changes"));
    }

    #[test]
    fn clean_reviews_approve() {
        let outcomes = vec![reviewed("a.rs", vec![]), reviewed("b.rs", vec![])];
        let review = aggregate(&outcomes, Severity::Bug, 25);
        assert_eq!(review.verdict, Verdict::Approve);
        assert!(review.summary.contains("No issues found"));
    }

    #[test]
    fn bug_at_threshold_requests_changes() {
        let outcomes = vec![reviewed(
            "a.rs",
            vec![finding("a.rs", Some(3), Severity::Bug, "overflow")],
        )];
        let review = aggregate(&outcomes, Severity::Bug, 25);
        assert_eq!(review.verdict, Verdict::RequestChanges);
        assert_eq!(review.comments.len(), 1);
        assert_eq!(review.comments[0].line, 3);
    }

    #[test]
    fn below_threshold_findings_comment_only() {
        let outcomes = vec![reviewed(
            "a.rs",
            vec![finding("a.rs", Some(3), Severity::Warning, "smell")],
        )];
        let review = aggregate(&outcomes, Severity::Bug, 25);
        assert_eq!(review.verdict, Verdict::CommentOnly);
    }

    #[test]
    fn lower_threshold_promotes_warnings() {
        let outcomes = vec![reviewed(
            "a.rs",
            vec![finding("a.rs", Some(3), Severity::Warning, "smell")],
        )];
        let review = aggregate(&outcomes, Severity::Warning, 25);
        assert_eq!(review.verdict, Verdict::RequestChanges);
    }

    #[test]
    fn failures_prevent_approval_and_are_named() {
        let outcomes = vec![
            reviewed("a.rs", vec![]),
            FileOutcome {
                path: PathBuf::from("broken.rs"),
                status: FileStatus::Failed {
                    reason: "model response did not match the review schema".into(),
                },
            },
        ];
        let review = aggregate(&outcomes, Severity::Bug, 25);
        assert_eq!(review.verdict, Verdict::CommentOnly);
        assert!(review.summary.contains("broken.rs"));
        assert!(review.summary.contains("could not be reviewed"));
    }

    #[test]
    fn comments_sort_by_path_then_line() {
        let outcomes = vec![
            reviewed(
                "b.rs",
                vec![
                    finding("b.rs", Some(9), Severity::Warning, "late"),
                    finding("b.rs", Some(2), Severity::Warning, "early"),
                ],
            ),
            reviewed("a.rs", vec![finding("a.rs", Some(5), Severity::Info, "first file")]),
        ];
        let review = aggregate(&outcomes, Severity::Bug, 25);
        let keys: Vec<(String, u32)> = review
            .comments
            .iter()
            .map(|c| (c.file_path.display().to_string(), c.line))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("a.rs".to_string(), 5),
                ("b.rs".to_string(), 2),
                ("b.rs".to_string(), 9)
            ]
        );
    }

    #[test]
    fn comment_cap_keeps_highest_severity() {
        let outcomes = vec![reviewed(
            "a.rs",
            vec![
                finding("a.rs", Some(1), Severity::Info, "minor"),
                finding("a.rs", Some(2), Severity::Bug, "major"),
                finding("a.rs", Some(3), Severity::Suggestion, "medium"),
            ],
        )];
        let review = aggregate(&outcomes, Severity::Bug, 1);
        assert_eq!(review.comments.len(), 1);
        assert!(review.comments[0].body.contains("major"));
        assert!(review.summary.contains("left out"));
    }

    #[test]
    fn file_level_findings_go_into_the_summary() {
        let outcomes = vec![reviewed(
            "a.rs",
            vec![finding("a.rs", None, Severity::Info, "module is getting large")],
        )];
        let review = aggregate(&outcomes, Severity::Bug, 25);
        assert!(review.comments.is_empty());
        assert!(review.summary.contains("module is getting large"));
        assert_eq!(review.verdict, Verdict::CommentOnly);
    }

    #[test]
    fn comment_bodies_carry_severity_and_suggestion() {
        let mut f = finding("a.rs", Some(4), Severity::Bug, "leaks the handle");
        f.suggestion = Some("close it in Drop".into());
        let outcomes = vec![reviewed("a.rs", vec![f])];
        let review = aggregate(&outcomes, Severity::Bug, 25);
        let body = &review.comments[0].body;
        assert!(body.contains("Bug"));
        assert!(body.contains("leaks the handle"));
        assert!(body.contains("close it in Drop"));
    }
}
