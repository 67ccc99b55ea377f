use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use corvus_core::{
    AggregatedReview, CorvusError, RequestMetadata, Result, ReviewConfig,
};
use corvus_diff::parser::parse_unified_diff;
use corvus_platform::retry::retry_with_backoff;
use corvus_platform::PlatformClient;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::aggregate::aggregate;
use crate::engine::{FileOutcome, FileStatus, ReviewEngine};
use crate::llm::ModelInvoker;

/// Stage of a review run.
///
/// Transitions are strictly forward; a fatal error leaves the run in the
/// stage where it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Pulling the diff and metadata from the platform.
    Fetching,
    /// Splitting the raw diff into per-file changes.
    Parsing,
    /// Per-file model reviews, fanned out under the concurrency cap.
    Reviewing,
    /// Merging per-file outcomes into one review.
    Aggregating,
    /// Writing the review back to the platform.
    Submitting,
    /// The run finished.
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Fetching => "fetching",
            RunState::Parsing => "parsing",
            RunState::Reviewing => "reviewing",
            RunState::Aggregating => "aggregating",
            RunState::Submitting => "submitting",
            RunState::Done => "done",
        };
        write!(f, "{s}")
    }
}

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The review that was (or would have been) submitted.
    pub review: AggregatedReview,
    /// Request metadata from the fetch stage.
    pub metadata: RequestMetadata,
    /// Files the model reviewed.
    pub files_reviewed: usize,
    /// Files that failed parsing or reviewing.
    pub files_failed: usize,
    /// Files skipped (binary, no hunks).
    pub files_skipped: usize,
    /// `false` on a dry run.
    pub submitted: bool,
}

/// Drives one review run end to end: fetch, parse, review, aggregate,
/// submit.
///
/// The whole run lives under one wall-clock budget; when it expires all
/// in-flight work is cancelled and nothing is submitted. Fetches are
/// retried with backoff, submissions never are.
pub struct Orchestrator<P, M> {
    platform: P,
    engine: Arc<ReviewEngine<M>>,
    config: ReviewConfig,
    max_attempts: u32,
    dry_run: bool,
    state: Mutex<RunState>,
}

impl<P, M> Orchestrator<P, M>
where
    P: PlatformClient,
    M: ModelInvoker + 'static,
{
    /// Create an orchestrator for one request.
    pub fn new(
        platform: P,
        engine: ReviewEngine<M>,
        config: ReviewConfig,
        max_attempts: u32,
    ) -> Self {
        Self {
            platform,
            engine: Arc::new(engine),
            config,
            max_attempts,
            dry_run: false,
            state: Mutex::new(RunState::Fetching),
        }
    }

    /// Skip the submit stage and report what would have been posted.
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// The platform client this run reads from and writes to.
    pub fn platform_ref(&self) -> &P {
        &self.platform
    }

    /// Current stage of the run.
    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn enter(&self, next: RunState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }

    /// Run the review to completion under the configured time budget.
    ///
    /// # Errors
    ///
    /// Returns [`CorvusError::Timeout`] when the budget expires (in-flight
    /// reviews are cancelled, nothing is submitted), or any fatal platform
    /// error from the fetch or submit stages.
    pub async fn run(&self) -> Result<RunReport> {
        let budget = Duration::from_secs(self.config.timeout_secs);
        match tokio::time::timeout(budget, self.execute()).await {
            Ok(result) => result,
            Err(_) => Err(CorvusError::Timeout(budget)),
        }
    }

    async fn execute(&self) -> Result<RunReport> {
        self.enter(RunState::Fetching);
        let (raw_diff, metadata) = retry_with_backoff(self.max_attempts, || {
            self.platform.fetch_request_diff()
        })
        .await?;

        self.enter(RunState::Parsing);
        let parsed = parse_unified_diff(&raw_diff);
        let mut outcomes: Vec<FileOutcome> = parsed
            .failures
            .into_iter()
            .map(|failure| FileOutcome {
                path: failure.path.into(),
                status: FileStatus::Failed {
                    reason: failure.error.to_string(),
                },
            })
            .collect();

        self.enter(RunState::Reviewing);
        outcomes.extend(self.review_files(parsed.files).await);

        self.enter(RunState::Aggregating);
        let review = aggregate(
            &outcomes,
            self.config.verdict_threshold,
            self.config.max_comments,
        );

        let mut submitted = false;
        if self.dry_run {
            eprintln!("dry run: skipping submission");
        } else {
            self.enter(RunState::Submitting);
            self.platform.submit_review(&review, &metadata).await?;
            submitted = true;

            if let Err(e) = self.platform.assign_reviewer().await {
                eprintln!("warning: could not assign reviewer: {e}");
            }
        }

        self.enter(RunState::Done);

        let mut files_reviewed = 0;
        let mut files_failed = 0;
        let mut files_skipped = 0;
        for outcome in &outcomes {
            match outcome.status {
                FileStatus::Reviewed { .. } => files_reviewed += 1,
                FileStatus::Failed { .. } => files_failed += 1,
                FileStatus::Skipped { .. } => files_skipped += 1,
            }
        }

        Ok(RunReport {
            review,
            metadata,
            files_reviewed,
            files_failed,
            files_skipped,
            submitted,
        })
    }

    /// Fan the per-file reviews out under a semaphore, fan the outcomes
    /// back in. Output order does not matter; the aggregator sorts.
    async fn review_files(
        &self,
        files: Vec<corvus_diff::parser::FileDiff>,
    ) -> Vec<FileOutcome> {
        let progress = ProgressBar::new(files.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{spinner} reviewing {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for file in files {
            let engine = Arc::clone(&self.engine);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return FileOutcome {
                            path: file.path().to_path_buf(),
                            status: FileStatus::Failed {
                                reason: "concurrency limiter closed".into(),
                            },
                        }
                    }
                };
                engine.review_file(&file).await
            });
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    progress.inc(1);
                    outcomes.push(outcome);
                }
                Err(e) => eprintln!("warning: review task failed: {e}"),
            }
        }
        progress.finish_and_clear();
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_states_display_lowercase() {
        assert_eq!(RunState::Fetching.to_string(), "fetching");
        assert_eq!(RunState::Reviewing.to_string(), "reviewing");
        assert_eq!(RunState::Done.to_string(), "done");
    }
}
