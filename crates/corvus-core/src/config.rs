use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CorvusError;
use crate::types::Severity;

/// Top-level configuration loaded from `.corvus.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use corvus_core::CorvusConfig;
///
/// let config = CorvusConfig::default();
/// assert_eq!(config.review.max_concurrency, 4);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorvusConfig {
    /// LLM provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Review behavior settings.
    #[serde(default)]
    pub review: ReviewConfig,
    /// Platform API settings.
    #[serde(default)]
    pub platform: PlatformConfig,
}

impl CorvusConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CorvusError::Io`] if the file cannot be read, or
    /// [`CorvusError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, CorvusError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`CorvusError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use corvus_core::CorvusConfig;
    ///
    /// let toml = r#"
    /// [review]
    /// max_concurrency = 8
    /// "#;
    /// let config = CorvusConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.review.max_concurrency, 8);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, CorvusError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// LLM provider configuration.
///
/// # Examples
///
/// ```
/// use corvus_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.model, "gpt-4o");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name (e.g. `"openai"`, `"anthropic"`, `"ollama"`).
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    "gpt-4o".into()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
        }
    }
}

/// Review behavior configuration.
///
/// # Examples
///
/// ```
/// use corvus_core::{ReviewConfig, Severity};
///
/// let config = ReviewConfig::default();
/// assert_eq!(config.verdict_threshold, Severity::Bug);
/// assert_eq!(config.timeout_secs, 600);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Maximum files reviewed concurrently (default: 4).
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Findings at or above this severity force a request-changes verdict
    /// (default: bug).
    #[serde(default = "default_verdict_threshold")]
    pub verdict_threshold: Severity,
    /// Maximum inline comments per review (default: 25).
    #[serde(default = "default_max_comments")]
    pub max_comments: usize,
    /// Wall-clock budget for one whole run, in seconds (default: 600).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Directory holding per-language instruction files.
    pub instructions_dir: Option<PathBuf>,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_verdict_threshold() -> Severity {
    Severity::Bug
}

fn default_max_comments() -> usize {
    25
}

fn default_timeout_secs() -> u64 {
    600
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            verdict_threshold: default_verdict_threshold(),
            max_comments: default_max_comments(),
            timeout_secs: default_timeout_secs(),
            instructions_dir: None,
        }
    }
}

/// Platform API configuration.
///
/// Tokens may also come from `GITHUB_TOKEN` / `GITLAB_TOKEN` environment
/// variables; values here take precedence. Tokens are never logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// GitHub personal access token.
    pub github_token: Option<String>,
    /// GitLab private token.
    pub gitlab_token: Option<String>,
    /// GitLab API base URL (default: `https://gitlab.com/api/v4`).
    #[serde(default = "default_gitlab_api_url")]
    pub gitlab_api_url: String,
    /// Maximum attempts per rate-limited platform call (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_gitlab_api_url() -> String {
    "https://gitlab.com/api/v4".into()
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            gitlab_token: None,
            gitlab_api_url: default_gitlab_api_url(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = CorvusConfig::default();
        assert_eq!(config.review.max_concurrency, 4);
        assert_eq!(config.review.verdict_threshold, Severity::Bug);
        assert_eq!(config.review.max_comments, 25);
        assert_eq!(config.review.timeout_secs, 600);
        assert!(config.review.instructions_dir.is_none());
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.platform.gitlab_api_url, "https://gitlab.com/api/v4");
        assert_eq!(config.platform.max_attempts, 5);
    }

    #[test]
    fn parse_minimal_toml() {
        let toml = r#"
[review]
max_concurrency = 2
verdict_threshold = "warning"
"#;
        let config = CorvusConfig::from_toml(toml).unwrap();
        assert_eq!(config.review.max_concurrency, 2);
        assert_eq!(config.review.verdict_threshold, Severity::Warning);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[llm]
provider = "anthropic"
model = "claude-sonnet-4-20250514"
base_url = "https://api.anthropic.com"

[review]
max_concurrency = 3
max_comments = 10
timeout_secs = 120
instructions_dir = "docs/review-instructions"

[platform]
gitlab_api_url = "https://gitlab.example.com/api/v4"
max_attempts = 3
"#;
        let config = CorvusConfig::from_toml(toml).unwrap();
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.review.max_concurrency, 3);
        assert_eq!(config.review.timeout_secs, 120);
        assert_eq!(
            config.review.instructions_dir,
            Some(PathBuf::from("docs/review-instructions"))
        );
        assert_eq!(
            config.platform.gitlab_api_url,
            "https://gitlab.example.com/api/v4"
        );
        assert_eq!(config.platform.max_attempts, 3);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = CorvusConfig::from_toml("").unwrap();
        assert_eq!(config.review.max_concurrency, 4);
        assert_eq!(config.llm.model, "gpt-4o");
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = CorvusConfig::from_toml("{{invalid}}");
        assert!(result.is_err());
    }
}
