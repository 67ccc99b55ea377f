use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur across the Corvus platform.
///
/// Variants map onto the run's failure policy: per-file errors
/// ([`MalformedDiff`](CorvusError::MalformedDiff),
/// [`ModelSchema`](CorvusError::ModelSchema)) are captured into that file's
/// review result; transient errors ([`RateLimited`](CorvusError::RateLimited),
/// [`Network`](CorvusError::Network)) are retried with backoff during the
/// fetch stage; everything [`is_fatal`](CorvusError::is_fatal) aborts the run
/// before any write to the platform. Library crates use this type directly;
/// the binary converts to `miette` diagnostics at the boundary.
///
/// # Examples
///
/// ```
/// use corvus_core::CorvusError;
///
/// let err = CorvusError::Auth("bad credentials".into());
/// assert!(err.is_fatal());
/// assert!(err.to_string().contains("bad credentials"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CorvusError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A diff section that cannot be parsed. Local to one file, never
    /// retried, never fatal to the run.
    #[error("malformed diff: {0}")]
    MalformedDiff(String),

    /// The model response failed structural validation after the single
    /// corrective retry. Downgrades the file, never aborts the run.
    #[error("model response did not match the review schema: {0}")]
    ModelSchema(String),

    /// Credentials rejected by the platform (401/403). Fatal, not retried.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Repository or request does not exist (404). Fatal, not retried.
    #[error("not found: {0}")]
    NotFound(String),

    /// Platform asked us to slow down (429 or quota signal). Retried with
    /// backoff up to the configured attempt ceiling.
    #[error("rate limited by platform{}", match .retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    })]
    RateLimited {
        /// Advertised wait, if the platform sent one.
        retry_after: Option<Duration>,
    },

    /// Retries against the platform were exhausted. Fatal.
    #[error("platform unavailable: {0}")]
    PlatformUnavailable(String),

    /// The run-level wall-clock budget expired. Fatal, cancels in-flight work.
    #[error("review run timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Transport-level failure talking to a remote API. Transient; retried
    /// during fetch, fatal elsewhere.
    #[error("network error: {0}")]
    Network(String),

    /// LLM API error that is not a schema problem.
    #[error("LLM error: {0}")]
    Llm(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

impl CorvusError {
    /// Whether this error must abort the whole run.
    ///
    /// Per-file and transient errors return `false`; they are either
    /// captured into a file's result or retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CorvusError::Auth(_)
                | CorvusError::NotFound(_)
                | CorvusError::PlatformUnavailable(_)
                | CorvusError::Timeout(_)
                | CorvusError::Config(_)
        )
    }

    /// Whether a fetch-stage retry loop may try this call again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CorvusError::RateLimited { .. } | CorvusError::Network(_)
        )
    }
}
