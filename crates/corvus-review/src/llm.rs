//! OpenAI-compatible chat client that speaks the structured review
//! contract: JSON-object responses, and an in-context correction turn when
//! a response fails schema validation.

use std::future::Future;
use std::time::Duration;

use corvus_core::{CorvusError, LlmConfig, Result};
use serde::{Deserialize, Serialize};

use crate::prompt::build_correction_message;

/// Something that can produce structured review responses.
///
/// [`LlmClient`] is the production implementation; tests substitute canned
/// responders so the review engine can run without a network.
pub trait ModelInvoker: Send + Sync {
    /// One review invocation: system instructions plus the file prompt.
    fn invoke(
        &self,
        system: &str,
        user: &str,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Retry after a response failed schema validation. The rejected reply
    /// and the validation error go back as conversation turns so the model
    /// corrects its own output instead of answering from scratch.
    fn correct(
        &self,
        system: &str,
        user: &str,
        rejected: &str,
        error: &str,
    ) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [WireMessage<'a>],
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: String,
}

/// Chat client for any provider exposing `/v1/chat/completions`: OpenAI,
/// Ollama, vLLM, LiteLLM, etc. Every request pins the review contract
/// (`response_format: json_object`, temperature 0.1).
///
/// # Examples
///
/// ```
/// use corvus_core::LlmConfig;
/// use corvus_review::llm::LlmClient;
///
/// let config = LlmConfig {
///     api_key: Some("test-key".into()),
///     ..LlmConfig::default()
/// };
/// let client = LlmClient::new(&config).unwrap();
/// ```
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl LlmClient {
    /// Create a client from configuration. The API key comes from the
    /// config file or, failing that, the provider's environment variable
    /// (`OPENAI_API_KEY` / `ANTHROPIC_API_KEY`); it is never logged.
    ///
    /// # Errors
    ///
    /// Returns [`CorvusError::Llm`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| CorvusError::Llm(format!("failed to create HTTP client: {e}")))?;

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(api_key_env_var(&config.provider)).ok());

        Ok(Self {
            http,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            api_key,
            model: config.model.clone(),
        })
    }

    async fn complete(&self, messages: &[WireMessage<'_>]) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: 0.1,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let mut request = self.http.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| CorvusError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CorvusError::Llm(format!(
                "LLM API error {status}: {body_text}"
            )));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| CorvusError::Llm(format!("failed to parse response: {e}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CorvusError::Llm("response carried no choices".into()))
    }
}

impl ModelInvoker for LlmClient {
    async fn invoke(&self, system: &str, user: &str) -> Result<String> {
        self.complete(&[
            WireMessage {
                role: "system",
                content: system,
            },
            WireMessage {
                role: "user",
                content: user,
            },
        ])
        .await
    }

    async fn correct(
        &self,
        system: &str,
        user: &str,
        rejected: &str,
        error: &str,
    ) -> Result<String> {
        let followup = build_correction_message(error);
        self.complete(&[
            WireMessage {
                role: "system",
                content: system,
            },
            WireMessage {
                role: "user",
                content: user,
            },
            WireMessage {
                role: "assistant",
                content: rejected,
            },
            WireMessage {
                role: "user",
                content: &followup,
            },
        ])
        .await
    }
}

fn api_key_env_var(provider: &str) -> &'static str {
    match provider {
        "anthropic" => "ANTHROPIC_API_KEY",
        _ => "OPENAI_API_KEY",
    }
}
