//! The Corvus review pipeline: per-file LLM reviews over a parsed diff,
//! aggregated into one platform review.
//!
//! The flow is: [`orchestrator::Orchestrator`] fetches the diff through a
//! [`PlatformClient`](corvus_platform::PlatformClient), parses it, fans
//! per-file reviews out to [`engine::ReviewEngine`] under a concurrency
//! cap, merges the outcomes with [`aggregate::aggregate`], and submits
//! the result. One bad file never takes down the run: parse and model
//! failures are folded into that file's outcome and surfaced in the
//! review summary.

pub mod aggregate;
pub mod engine;
pub mod instructions;
pub mod language;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod retrieval;

pub use engine::{FileOutcome, FileStatus, ReviewEngine};
pub use llm::{LlmClient, ModelInvoker};
pub use orchestrator::{Orchestrator, RunReport, RunState};
