//! Platform clients for Corvus: one capability interface, two
//! implementations (GitHub pull requests, GitLab merge requests).
//!
//! Both clients wrap the platform REST API with token auth, rate-limit
//! handling, and graceful inline-anchor degradation. Retry policy lives in
//! [`retry::retry_with_backoff`] and applies to fetches and transient
//! network errors only — never to a submission the platform has
//! acknowledged.

pub mod github;
pub mod gitlab;
pub mod retry;

use corvus_core::{AggregatedReview, RequestMetadata, Result};

/// Capability interface over a code-hosting platform.
///
/// Implementations are selected by a [`Platform`](corvus_core::Platform)
/// tag at orchestrator construction and dispatched statically.
pub trait PlatformClient {
    /// Fetch the raw unified diff and request metadata.
    ///
    /// # Errors
    ///
    /// [`CorvusError::NotFound`](corvus_core::CorvusError::NotFound) on 404,
    /// [`CorvusError::Auth`](corvus_core::CorvusError::Auth) on 401/403,
    /// [`CorvusError::RateLimited`](corvus_core::CorvusError::RateLimited)
    /// on 429, [`CorvusError::Network`](corvus_core::CorvusError::Network)
    /// on transport failures.
    fn fetch_request_diff(
        &self,
    ) -> impl std::future::Future<Output = Result<(String, RequestMetadata)>> + Send;

    /// Post the aggregated review: summary plus inline comments. `meta` is
    /// the metadata returned by the fetch; it carries the commit SHAs the
    /// platforms want comments anchored against.
    ///
    /// Writes carry no dedup key, so callers must not retry once any part
    /// of the submission is acknowledged. Rejected line anchors degrade to
    /// file-level placement; findings are never dropped.
    fn submit_review(
        &self,
        review: &AggregatedReview,
        meta: &RequestMetadata,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Assign the token owner as reviewer. Best-effort: callers log
    /// failures and keep going.
    fn assign_reviewer(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub(crate) fn classify_status(status: reqwest::StatusCode, context: &str, body: &str) -> corvus_core::CorvusError {
    use corvus_core::CorvusError;
    match status.as_u16() {
        401 | 403 => CorvusError::Auth(format!("{context}: {status}")),
        404 => CorvusError::NotFound(context.to_string()),
        429 => CorvusError::RateLimited { retry_after: None },
        _ => CorvusError::Network(format!("{context}: {status} {body}")),
    }
}

pub(crate) fn retry_after_from_headers(
    headers: &reqwest::header::HeaderMap,
) -> Option<std::time::Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(std::time::Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvus_core::CorvusError;

    #[test]
    fn status_classification() {
        let s = |code: u16| reqwest::StatusCode::from_u16(code).unwrap();
        assert!(matches!(
            classify_status(s(401), "fetch", ""),
            CorvusError::Auth(_)
        ));
        assert!(matches!(
            classify_status(s(403), "fetch", ""),
            CorvusError::Auth(_)
        ));
        assert!(matches!(
            classify_status(s(404), "fetch", ""),
            CorvusError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(s(429), "fetch", ""),
            CorvusError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_status(s(502), "fetch", ""),
            CorvusError::Network(_)
        ));
    }

    #[test]
    fn retry_after_parses_seconds() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "2".parse().unwrap());
        assert_eq!(
            retry_after_from_headers(&headers),
            Some(std::time::Duration::from_secs(2))
        );

        let empty = reqwest::header::HeaderMap::new();
        assert_eq!(retry_after_from_headers(&empty), None);
    }
}
