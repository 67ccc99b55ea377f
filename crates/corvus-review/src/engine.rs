use std::path::PathBuf;

use corvus_core::{CorvusError, ReviewFinding};
use corvus_diff::parser::FileDiff;

use crate::instructions::load_instructions;
use crate::language::detect_language;
use crate::llm::ModelInvoker;
use crate::prompt;
use crate::retrieval::{render_context, ContextRetriever};

/// What happened to one file during the review stage.
#[derive(Debug, Clone)]
pub enum FileStatus {
    /// The model reviewed the file; findings may be empty.
    Reviewed {
        /// Validated findings, anchored to this file.
        findings: Vec<ReviewFinding>,
    },
    /// The file could not be reviewed. The reason is surfaced in the
    /// aggregated summary; the run continues.
    Failed {
        /// Human-readable cause.
        reason: String,
    },
    /// The file was deliberately not sent to the model.
    Skipped {
        /// Why it was skipped (binary, no hunks).
        reason: String,
    },
}

/// Per-file result of the review stage.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    /// Review-relevant path (new path, or old path for deletions).
    pub path: PathBuf,
    /// Outcome for this file.
    pub status: FileStatus,
}

/// Reviews one file at a time: builds the prompt, invokes the model,
/// validates the response, and anchors findings to the diff.
///
/// A schema-invalid response gets exactly one corrective retry that
/// carries the validation error back to the model. A second invalid
/// response fails the file without aborting the run.
pub struct ReviewEngine<M> {
    model: M,
    instructions_dir: Option<PathBuf>,
    retriever: Option<Box<dyn ContextRetriever>>,
}

impl<M: ModelInvoker> ReviewEngine<M> {
    /// Create an engine over a model invoker.
    pub fn new(model: M, instructions_dir: Option<PathBuf>) -> Self {
        Self {
            model,
            instructions_dir,
            retriever: None,
        }
    }

    /// Attach a repository context retriever.
    pub fn with_retriever(mut self, retriever: Box<dyn ContextRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Review one parsed file diff.
    ///
    /// Never returns an error: everything that can go wrong with a single
    /// file folds into its [`FileOutcome`] so one bad file cannot take
    /// down the rest of the run.
    pub async fn review_file(&self, file: &FileDiff) -> FileOutcome {
        let path = file.path().to_path_buf();

        if file.is_binary {
            return FileOutcome {
                path,
                status: FileStatus::Skipped {
                    reason: "binary file".into(),
                },
            };
        }
        if file.hunks.is_empty() {
            return FileOutcome {
                path,
                status: FileStatus::Skipped {
                    reason: "no reviewable hunks".into(),
                },
            };
        }

        let language = detect_language(&path);
        let instructions = match load_instructions(language, self.instructions_dir.as_deref()) {
            Ok(text) => text,
            Err(e) => {
                return FileOutcome {
                    path,
                    status: FileStatus::Failed {
                        reason: format!("could not load review instructions: {e}"),
                    },
                }
            }
        };

        let system = prompt::build_system_prompt(language, &instructions);
        let mut user = prompt::build_file_prompt(&file.to_prompt_text());
        if let Some(retriever) = &self.retriever {
            if let Some(context) = render_context(&retriever.retrieve(&path)) {
                user.push('\n');
                user.push_str(&context);
            }
        }

        let findings = match self.invoke_with_one_retry(&system, &user, file).await {
            Ok(findings) => findings,
            Err(e) => {
                return FileOutcome {
                    path,
                    status: FileStatus::Failed {
                        reason: e.to_string(),
                    },
                }
            }
        };

        FileOutcome {
            path,
            status: FileStatus::Reviewed {
                findings: anchor_findings(findings, file),
            },
        }
    }

    async fn invoke_with_one_retry(
        &self,
        system: &str,
        user: &str,
        file: &FileDiff,
    ) -> corvus_core::Result<Vec<ReviewFinding>> {
        let response = self.model.invoke(system, user).await?;
        match prompt::parse_review_response(&response, file.path()) {
            Ok(findings) => Ok(findings),
            Err(schema_err @ CorvusError::ModelSchema(_)) => {
                eprintln!(
                    "warning: {} response rejected ({schema_err}); retrying once",
                    file.path().display()
                );
                let retry = self
                    .model
                    .correct(system, user, &response, &schema_err.to_string())
                    .await?;
                prompt::parse_review_response(&retry, file.path())
            }
            Err(other) => Err(other),
        }
    }
}

/// Keep file-level findings and findings whose line exists on the new
/// side of the diff; drop the rest with a warning.
fn anchor_findings(findings: Vec<ReviewFinding>, file: &FileDiff) -> Vec<ReviewFinding> {
    findings
        .into_iter()
        .filter(|f| match f.line {
            None => true,
            Some(line) if file.anchors_new_line(line) => true,
            Some(line) => {
                eprintln!(
                    "warning: dropping finding at {}:{line}; line is not part of the diff",
                    file.path().display()
                );
                false
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvus_core::{Result, Severity};
    use corvus_diff::parser::parse_unified_diff;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Model stub that returns canned responses in order.
    struct ScriptedModel {
        responses: Mutex<Vec<String>>,
        calls: AtomicU32,
        corrections: AtomicU32,
    }

    impl ScriptedModel {
        fn new(responses: Vec<&str>) -> Self {
            let mut responses: Vec<String> = responses.into_iter().map(String::from).collect();
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                calls: AtomicU32::new(0),
                corrections: AtomicU32::new(0),
            }
        }

        fn next_response(&self) -> String {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| r#"{"findings":[]}"#.into())
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn corrections(&self) -> u32 {
            self.corrections.load(Ordering::SeqCst)
        }
    }

    impl ModelInvoker for ScriptedModel {
        async fn invoke(&self, _system: &str, _user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.next_response())
        }

        async fn correct(
            &self,
            _system: &str,
            _user: &str,
            rejected: &str,
            error: &str,
        ) -> Result<String> {
            assert!(!rejected.is_empty());
            assert!(!error.is_empty());
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.corrections.fetch_add(1, Ordering::SeqCst);
            Ok(self.next_response())
        }
    }

    fn sample_diff() -> FileDiff {
        let diff = "\
diff --git a/src/lib.rs b/src/lib.rs
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,2 +1,3 @@
 fn main() {
+    let x = compute();
 }
";
        parse_unified_diff(diff).files.remove(0)
    }

    #[tokio::test]
    async fn clean_response_reviews_in_one_call() {
        let model = ScriptedModel::new(vec![
            r#"{"findings":[{"file":"src/lib.rs","line":2,"severity":"bug","message":"compute() can panic"}]}"#,
        ]);
        let engine = ReviewEngine::new(model, None);
        let outcome = engine.review_file(&sample_diff()).await;

        let FileStatus::Reviewed { findings } = outcome.status else {
            panic!("expected a reviewed outcome");
        };
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Bug);
        assert_eq!(engine.model.calls(), 1);
        assert_eq!(engine.model.corrections(), 0);
    }

    #[tokio::test]
    async fn schema_failure_gets_exactly_one_retry() {
        let model = ScriptedModel::new(vec![
            "not json at all",
            r#"{"findings":[]}"#,
        ]);
        let engine = ReviewEngine::new(model, None);
        let outcome = engine.review_file(&sample_diff()).await;

        assert!(matches!(
            outcome.status,
            FileStatus::Reviewed { ref findings } if findings.is_empty()
        ));
        assert_eq!(engine.model.calls(), 2);
        assert_eq!(engine.model.corrections(), 1);
    }

    #[tokio::test]
    async fn second_schema_failure_fails_the_file() {
        let model = ScriptedModel::new(vec!["garbage", "still garbage"]);
        let engine = ReviewEngine::new(model, None);
        let outcome = engine.review_file(&sample_diff()).await;

        assert!(matches!(outcome.status, FileStatus::Failed { .. }));
        assert_eq!(engine.model.calls(), 2);
        assert_eq!(engine.model.corrections(), 1);
    }

    #[tokio::test]
    async fn binary_files_are_skipped_without_model_calls() {
        let diff = "\
diff --git a/logo.png b/logo.png
Binary files a/logo.png and b/logo.png differ
";
        let file = parse_unified_diff(diff).files.remove(0);
        let model = ScriptedModel::new(vec![]);
        let engine = ReviewEngine::new(model, None);
        let outcome = engine.review_file(&file).await;

        assert!(matches!(outcome.status, FileStatus::Skipped { .. }));
        assert_eq!(engine.model.calls(), 0);
    }

    #[tokio::test]
    async fn unanchorable_findings_are_dropped() {
        let model = ScriptedModel::new(vec![
            r#"{"findings":[
                {"file":"src/lib.rs","line":2,"severity":"bug","message":"anchored"},
                {"file":"src/lib.rs","line":999,"severity":"bug","message":"off the diff"},
                {"file":"src/lib.rs","line":null,"severity":"info","message":"file-level"}
            ]}"#,
        ]);
        let engine = ReviewEngine::new(model, None);
        let outcome = engine.review_file(&sample_diff()).await;

        let FileStatus::Reviewed { findings } = outcome.status else {
            panic!("expected a reviewed outcome");
        };
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].line, Some(2));
        assert_eq!(findings[1].line, None);
    }
}
