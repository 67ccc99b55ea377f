use corvus_core::{
    AggregatedReview, CorvusError, InlineComment, RequestMetadata, Result, Verdict,
};
use serde::Deserialize;

use crate::{classify_status, retry_after_from_headers, PlatformClient};

/// GitLab merge request client for fetching diffs and posting reviews.
///
/// Talks to the REST API directly with a `PRIVATE-TOKEN` header. Inline
/// comments become positioned discussions; when GitLab rejects a position
/// the finding is reposted as a plain note naming the file and line.
pub struct GitLabClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
    project: String,
    number: u64,
}

#[derive(Debug, Deserialize)]
struct MergeRequestResponse {
    title: String,
    author: AuthorRef,
    source_branch: String,
    target_branch: String,
    diff_refs: DiffRefs,
}

#[derive(Debug, Deserialize)]
struct AuthorRef {
    username: String,
}

#[derive(Debug, Deserialize)]
struct DiffRefs {
    base_sha: String,
    head_sha: String,
    start_sha: String,
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    id: u64,
}

impl GitLabClient {
    /// Create a client for one merge request, from an explicit token or the
    /// `GITLAB_TOKEN` environment variable.
    ///
    /// `repository` is the full project path, e.g. `group/project`.
    ///
    /// # Errors
    ///
    /// Returns [`CorvusError::Config`] if no token is available.
    pub fn new(
        repository: &str,
        number: u64,
        token: Option<&str>,
        api_url: &str,
    ) -> Result<Self> {
        let token = match token {
            Some(t) => t.to_string(),
            None => std::env::var("GITLAB_TOKEN").map_err(|_| {
                CorvusError::Config(
                    "GITLAB_TOKEN not set. Pass --token or set GITLAB_TOKEN env var".into(),
                )
            })?,
        };

        Ok(Self {
            http: reqwest::Client::new(),
            token,
            base_url: api_url.trim_end_matches('/').to_string(),
            project: encode_project_path(repository),
            number,
        })
    }

    fn mr_url(&self, suffix: &str) -> String {
        format!(
            "{}/projects/{}/merge_requests/{}{}",
            self.base_url, self.project, self.number, suffix
        )
    }

    async fn get(&self, url: String, context: &str) -> Result<reqwest::Response> {
        let response = self
            .http
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await
            .map_err(|e| CorvusError::Network(format!("{context}: {e}")))?;
        self.check(context, response).await
    }

    async fn post_json(
        &self,
        url: String,
        body: &serde_json::Value,
        context: &str,
    ) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(url)
            .header("PRIVATE-TOKEN", &self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| CorvusError::Network(format!("{context}: {e}")))?;
        self.check(context, response).await
    }

    async fn check(&self, context: &str, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let retry_after = retry_after_from_headers(response.headers());
        let body = response.text().await.unwrap_or_default();
        Err(match classify_status(status, context, &body) {
            CorvusError::RateLimited { .. } => CorvusError::RateLimited { retry_after },
            other => other,
        })
    }

    async fn get_metadata(&self) -> Result<RequestMetadata> {
        let response = self
            .get(self.mr_url(""), "fetch MR metadata")
            .await?;
        let mr: MergeRequestResponse = response
            .json()
            .await
            .map_err(|e| CorvusError::Network(format!("failed to parse MR metadata: {e}")))?;

        Ok(RequestMetadata {
            title: mr.title,
            author: mr.author.username,
            base_ref: mr.target_branch,
            head_ref: mr.source_branch,
            head_sha: mr.diff_refs.head_sha,
            base_sha: mr.diff_refs.base_sha,
            start_sha: mr.diff_refs.start_sha,
        })
    }

    async fn get_diff(&self) -> Result<String> {
        let response = self
            .get(self.mr_url("/raw_diffs"), "fetch MR diff")
            .await?;
        response
            .text()
            .await
            .map_err(|e| CorvusError::Network(format!("failed to read diff response: {e}")))
    }

    async fn post_summary_note(&self, review: &AggregatedReview) -> Result<()> {
        let body = serde_json::json!({
            "body": format!("{}\n\n**Verdict:** {}", review.summary, verdict_label(review.verdict)),
        });
        self.post_json(self.mr_url("/notes"), &body, "post summary note")
            .await?;
        Ok(())
    }

    async fn post_discussion(&self, comment: &InlineComment, meta: &RequestMetadata) -> Result<()> {
        let body = serde_json::json!({
            "body": comment.body,
            "position": {
                "base_sha": meta.base_sha,
                "start_sha": meta.start_sha,
                "head_sha": meta.head_sha,
                "position_type": "text",
                "new_path": comment.file_path.to_string_lossy(),
                "new_line": comment.line,
            },
        });
        self.post_json(self.mr_url("/discussions"), &body, "post discussion")
            .await?;
        Ok(())
    }

    async fn post_fallback_note(&self, comment: &InlineComment) -> Result<()> {
        let body = serde_json::json!({
            "body": format!(
                "**{}** (line {}):\n\n{}",
                comment.file_path.display(),
                comment.line,
                comment.body
            ),
        });
        self.post_json(self.mr_url("/notes"), &body, "post fallback note")
            .await?;
        Ok(())
    }
}

impl PlatformClient for GitLabClient {
    async fn fetch_request_diff(&self) -> Result<(String, RequestMetadata)> {
        let metadata = self.get_metadata().await?;
        let diff = self.get_diff().await?;
        Ok((diff, metadata))
    }

    /// Post the summary as a note, then each inline comment as a positioned
    /// discussion. A discussion GitLab refuses to position degrades to a
    /// plain note for that finding; fatal errors stop the submission.
    async fn submit_review(&self, review: &AggregatedReview, meta: &RequestMetadata) -> Result<()> {
        self.post_summary_note(review).await?;

        for comment in &review.comments {
            match self.post_discussion(comment, meta).await {
                Ok(()) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    eprintln!(
                        "warning: could not anchor comment at {}:{} ({err}); posting as a note",
                        comment.file_path.display(),
                        comment.line
                    );
                    self.post_fallback_note(comment).await?;
                }
            }
        }
        Ok(())
    }

    async fn assign_reviewer(&self) -> Result<()> {
        let response = self
            .get(
                format!("{}/user", self.base_url),
                "fetch authenticated user",
            )
            .await?;
        let me: CurrentUser = response
            .json()
            .await
            .map_err(|e| CorvusError::Network(format!("failed to parse user response: {e}")))?;

        let url = format!("{}?reviewer_ids[]={}", self.mr_url(""), me.id);
        let response = self
            .http
            .put(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await
            .map_err(|e| CorvusError::Network(format!("assign reviewer: {e}")))?;
        self.check("assign reviewer", response).await?;
        Ok(())
    }
}

fn verdict_label(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Approve => "Approve",
        Verdict::RequestChanges => "Request changes",
        Verdict::CommentOnly => "Comment only",
    }
}

/// Percent-encode a project path for use as a GitLab project id.
///
/// # Examples
///
/// ```
/// use corvus_platform::gitlab::encode_project_path;
///
/// assert_eq!(encode_project_path("group/sub/project"), "group%2Fsub%2Fproject");
/// ```
pub fn encode_project_path(path: &str) -> String {
    path.replace('/', "%2F")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_path_is_percent_encoded() {
        assert_eq!(encode_project_path("group/project"), "group%2Fproject");
        assert_eq!(encode_project_path("solo"), "solo");
    }

    #[test]
    fn verdict_labels_are_human_readable() {
        assert_eq!(verdict_label(Verdict::Approve), "Approve");
        assert_eq!(verdict_label(Verdict::RequestChanges), "Request changes");
        assert_eq!(verdict_label(Verdict::CommentOnly), "Comment only");
    }

    #[test]
    fn mr_urls_are_rooted_at_the_project() {
        let client = GitLabClient::new(
            "group/project",
            7,
            Some("glpat-test"),
            "https://gitlab.example.com/api/v4/",
        )
        .unwrap();
        assert_eq!(
            client.mr_url("/notes"),
            "https://gitlab.example.com/api/v4/projects/group%2Fproject/merge_requests/7/notes"
        );
        assert_eq!(
            client.mr_url(""),
            "https://gitlab.example.com/api/v4/projects/group%2Fproject/merge_requests/7"
        );
    }
}
