use corvus_core::{
    AggregatedReview, CorvusError, RequestMetadata, Result, Verdict,
};
use serde::Deserialize;

use crate::{classify_status, retry_after_from_headers, PlatformClient};

/// GitHub pull request client for fetching diffs and posting reviews.
///
/// # Examples
///
/// ```
/// use corvus_platform::github::parse_repo_reference;
///
/// let (owner, repo) = parse_repo_reference("rust-lang/rust").unwrap();
/// assert_eq!(owner, "rust-lang");
/// assert_eq!(repo, "rust");
/// ```
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
    http: reqwest::Client,
    token: String,
    owner: String,
    repo: String,
    number: u64,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    title: String,
    user: ActorRef,
    base: BranchRef,
    head: BranchRef,
}

#[derive(Debug, Deserialize)]
struct ActorRef {
    login: String,
}

#[derive(Debug, Deserialize)]
struct BranchRef {
    #[serde(rename = "ref")]
    branch: String,
    sha: String,
}

impl GitHubClient {
    /// Create a client for one pull request, from an explicit token or the
    /// `GITHUB_TOKEN` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`CorvusError::Config`] if no token is available or the
    /// repository reference is malformed, [`CorvusError::Network`] if the
    /// client cannot be built.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use corvus_platform::github::GitHubClient;
    ///
    /// let client = GitHubClient::new("octocat/hello-world", 42, Some("ghp_xxxx")).unwrap();
    /// ```
    pub fn new(repository: &str, number: u64, token: Option<&str>) -> Result<Self> {
        let token = match token {
            Some(t) => t.to_string(),
            None => std::env::var("GITHUB_TOKEN").map_err(|_| {
                CorvusError::Config(
                    "GITHUB_TOKEN not set. Pass --token or set GITHUB_TOKEN env var".into(),
                )
            })?,
        };

        let (owner, repo) = parse_repo_reference(repository)?;

        let octocrab = octocrab::Octocrab::builder()
            .personal_token(token.clone())
            .build()
            .map_err(|e| CorvusError::Network(format!("failed to create GitHub client: {e}")))?;

        let http = reqwest::Client::new();

        Ok(Self {
            octocrab,
            http,
            token,
            owner,
            repo,
            number,
        })
    }

    fn pull_url(&self) -> String {
        format!(
            "https://api.github.com/repos/{}/{}/pulls/{}",
            self.owner, self.repo, self.number
        )
    }

    async fn get_diff(&self) -> Result<String> {
        let response = self
            .http
            .get(self.pull_url())
            .header("Accept", "application/vnd.github.v3.diff")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "corvus")
            .send()
            .await
            .map_err(|e| CorvusError::Network(format!("failed to fetch PR diff: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.error_from_response("fetch PR diff", response).await);
        }

        response
            .text()
            .await
            .map_err(|e| CorvusError::Network(format!("failed to read diff response: {e}")))
    }

    async fn get_metadata(&self) -> Result<RequestMetadata> {
        let response = self
            .http
            .get(self.pull_url())
            .header("Accept", "application/vnd.github.v3+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "corvus")
            .send()
            .await
            .map_err(|e| CorvusError::Network(format!("failed to fetch PR metadata: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.error_from_response("fetch PR metadata", response).await);
        }

        let pull: PullResponse = response
            .json()
            .await
            .map_err(|e| CorvusError::Network(format!("failed to parse PR metadata: {e}")))?;

        // GitHub reviews anchor against the head commit; there is no
        // separate start SHA like GitLab's diff_refs, so head stands in.
        Ok(RequestMetadata {
            title: pull.title,
            author: pull.user.login,
            base_ref: pull.base.branch,
            head_ref: pull.head.branch,
            head_sha: pull.head.sha.clone(),
            base_sha: pull.base.sha,
            start_sha: pull.head.sha,
        })
    }

    async fn error_from_response(&self, context: &str, response: reqwest::Response) -> CorvusError {
        let status = response.status();
        let retry_after = retry_after_from_headers(response.headers());
        let body = response.text().await.unwrap_or_default();
        match classify_status(status, context, &body) {
            CorvusError::RateLimited { .. } => CorvusError::RateLimited { retry_after },
            other => other,
        }
    }

    async fn post_review_payload(&self, body: &serde_json::Value) -> octocrab::Result<serde_json::Value> {
        let route = format!(
            "/repos/{}/{}/pulls/{}/reviews",
            self.owner, self.repo, self.number
        );
        self.octocrab.post(route, Some(body)).await
    }
}

impl PlatformClient for GitHubClient {
    async fn fetch_request_diff(&self) -> Result<(String, RequestMetadata)> {
        let metadata = self.get_metadata().await?;
        let diff = self.get_diff().await?;
        Ok((diff, metadata))
    }

    /// Post the review in a single call to the PR review API.
    ///
    /// GitHub validates every inline anchor and rejects the whole review
    /// with a 422 when any anchor is stale. On that rejection the review is
    /// resubmitted once with the inline findings folded into the summary
    /// body, so no finding is lost.
    async fn submit_review(&self, review: &AggregatedReview, _meta: &RequestMetadata) -> Result<()> {
        let comments: Vec<serde_json::Value> = review
            .comments
            .iter()
            .map(|c| {
                serde_json::json!({
                    "path": c.file_path.to_string_lossy(),
                    "line": c.line,
                    "side": "RIGHT",
                    "body": c.body,
                })
            })
            .collect();

        let payload = serde_json::json!({
            "event": review_event(review.verdict),
            "body": review.summary,
            "comments": comments,
        });

        match self.post_review_payload(&payload).await {
            Ok(_) => Ok(()),
            Err(err) if is_unprocessable(&err) && !review.comments.is_empty() => {
                eprintln!(
                    "warning: GitHub rejected inline anchors; resubmitting findings in the review body"
                );
                let folded = serde_json::json!({
                    "event": review_event(review.verdict),
                    "body": fold_comments_into_body(review),
                });
                self.post_review_payload(&folded)
                    .await
                    .map_err(|e| map_octocrab_error("post review", e))?;
                Ok(())
            }
            Err(err) => Err(map_octocrab_error("post review", err)),
        }
    }

    async fn assign_reviewer(&self) -> Result<()> {
        let me = self
            .octocrab
            .current()
            .user()
            .await
            .map_err(|e| map_octocrab_error("fetch authenticated user", e))?;

        let route = format!(
            "/repos/{}/{}/pulls/{}/requested_reviewers",
            self.owner, self.repo, self.number
        );
        let body = serde_json::json!({ "reviewers": [me.login] });
        let _: serde_json::Value = self
            .octocrab
            .post(route, Some(&body))
            .await
            .map_err(|e| map_octocrab_error("request reviewer", e))?;
        Ok(())
    }
}

fn review_event(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Approve => "APPROVE",
        Verdict::RequestChanges => "REQUEST_CHANGES",
        Verdict::CommentOnly => "COMMENT",
    }
}

fn fold_comments_into_body(review: &AggregatedReview) -> String {
    let mut body = review.summary.clone();
    body.push_str("\n\n---\n\n");
    for comment in &review.comments {
        body.push_str(&format!(
            "**{}:{}**\n{}\n\n",
            comment.file_path.display(),
            comment.line,
            comment.body
        ));
    }
    body
}

fn is_unprocessable(err: &octocrab::Error) -> bool {
    matches!(
        err,
        octocrab::Error::GitHub { source, .. }
            if source.status_code.as_u16() == 422
    )
}

fn map_octocrab_error(context: &str, err: octocrab::Error) -> CorvusError {
    if let octocrab::Error::GitHub { source, .. } = &err {
        return match source.status_code.as_u16() {
            401 | 403 => CorvusError::Auth(format!("{context}: {}", source.message)),
            404 => CorvusError::NotFound(context.to_string()),
            429 => CorvusError::RateLimited { retry_after: None },
            _ => CorvusError::Network(format!("{context}: {err}")),
        };
    }
    CorvusError::Network(format!("{context}: {err}"))
}

/// Parse a repository reference (`owner/repo`) into its components.
///
/// # Errors
///
/// Returns [`CorvusError::Config`] if the format is invalid.
///
/// # Examples
///
/// ```
/// use corvus_platform::github::parse_repo_reference;
///
/// let (owner, repo) = parse_repo_reference("octocat/hello-world").unwrap();
/// assert_eq!(owner, "octocat");
/// assert_eq!(repo, "hello-world");
/// ```
pub fn parse_repo_reference(repository: &str) -> Result<(String, String)> {
    let Some((owner, repo)) = repository.split_once('/') else {
        return Err(CorvusError::Config(format!(
            "invalid repository reference '{repository}', expected owner/repo"
        )));
    };
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return Err(CorvusError::Config(format!(
            "invalid repository reference '{repository}', expected owner/repo"
        )));
    }
    Ok((owner.to_string(), repo.to_string()))
}
