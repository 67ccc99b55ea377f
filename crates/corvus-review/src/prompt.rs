use std::path::PathBuf;

use corvus_core::{CorvusError, Result, ReviewFinding, Severity};
use serde::Deserialize;

const SYSTEM_PROMPT_HEADER: &str = "\
You are Corvus, an expert code reviewer. Your job is to find genuine bugs, \
security issues, and significant problems in code changes.

Rules:
- Only report issues you are confident about
- Reference line numbers from the NEW side of the diff
- Do not speculate about code behavior you cannot verify
- Do not comment on style, formatting, or naming unless it creates a bug
- If a finding applies to the file as a whole, use null for the line

Respond with a JSON object:
{
  \"findings\": [
    {
      \"file\": \"path/to/file\",
      \"line\": 42,
      \"severity\": \"bug\" | \"warning\" | \"suggestion\" | \"info\",
      \"message\": \"Clear explanation of the issue\",
      \"suggestion\": \"Optional fix suggestion\"
    }
  ]
}

If you find no issues, return: { \"findings\": [] }";

/// Build the system prompt for reviewing one file.
///
/// # Examples
///
/// ```
/// use corvus_review::prompt::build_system_prompt;
///
/// let prompt = build_system_prompt("rust", "Check lifetimes.");
/// assert!(prompt.contains("Corvus"));
/// assert!(prompt.contains("rust"));
/// assert!(prompt.contains("Check lifetimes."));
/// ```
pub fn build_system_prompt(language: &str, instructions: &str) -> String {
    format!(
        "{SYSTEM_PROMPT_HEADER}\n\nLanguage: {language}\n\nProject review instructions:\n{instructions}"
    )
}

/// Build the user prompt containing one file's diff.
///
/// # Examples
///
/// ```
/// use corvus_review::prompt::build_file_prompt;
///
/// let prompt = build_file_prompt("+new line");
/// assert!(prompt.contains("+new line"));
/// assert!(prompt.contains("```diff"));
/// ```
pub fn build_file_prompt(diff_text: &str) -> String {
    format!("Review the following change:\n\n```diff\n{diff_text}\n```\n")
}

/// Build the follow-up message sent after a schema-invalid response.
///
/// Goes out as the next user turn of the same conversation, after the
/// rejected reply, so the model fixes the specific problem rather than
/// guess.
pub fn build_correction_message(error: &str) -> String {
    format!(
        "Your previous response could not be used: {error}.\n\
         Respond again with ONLY a JSON object matching the schema. No prose, no code fences."
    )
}

#[derive(Deserialize)]
struct ModelResponse {
    findings: Vec<ModelFinding>,
}

#[derive(Deserialize)]
struct ModelFinding {
    #[allow(dead_code)]
    file: Option<String>,
    line: Option<u32>,
    severity: Severity,
    message: String,
    #[serde(default)]
    suggestion: Option<String>,
}

/// Parse and validate the model's JSON response for one file.
///
/// Markdown code fences around the JSON are tolerated. Anything else that
/// deviates from the schema is a validation failure: the caller sends one
/// corrective retry before giving up on the file.
///
/// `file_path` is the file under review; findings are anchored to it
/// regardless of what the model put in its `file` field.
///
/// # Errors
///
/// Returns [`CorvusError::ModelSchema`] when the response is not valid
/// JSON, is missing required fields, carries an unknown severity, uses
/// line 0, or has an empty message.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use corvus_review::prompt::parse_review_response;
///
/// let findings = parse_review_response(r#"{"findings":[]}"#, Path::new("a.rs")).unwrap();
/// assert!(findings.is_empty());
///
/// assert!(parse_review_response("not json", Path::new("a.rs")).is_err());
/// ```
pub fn parse_review_response(
    response: &str,
    file_path: &std::path::Path,
) -> Result<Vec<ReviewFinding>> {
    let cleaned = strip_code_fences(response);

    let parsed: ModelResponse = serde_json::from_str(cleaned)
        .map_err(|e| CorvusError::ModelSchema(format!("invalid JSON: {e}")))?;

    let mut findings = Vec::with_capacity(parsed.findings.len());
    for f in parsed.findings {
        if f.line == Some(0) {
            return Err(CorvusError::ModelSchema(
                "line numbers are 1-based; got 0".into(),
            ));
        }
        if f.message.trim().is_empty() {
            return Err(CorvusError::ModelSchema("finding has an empty message".into()));
        }
        findings.push(ReviewFinding {
            file_path: PathBuf::from(file_path),
            line: f.line,
            severity: f.severity,
            message: f.message,
            suggestion: f.suggestion.filter(|s| !s.trim().is_empty()),
        });
    }

    Ok(findings)
}

fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    if let Some(rest) = trimmed.strip_prefix("```") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    trimmed
}
