//! Core types, configuration, and error handling for the Corvus platform.
//!
//! This crate provides the shared foundation used by all other Corvus crates:
//! - [`CorvusError`] — unified error type using `thiserror`
//! - [`CorvusConfig`] — configuration loaded from `.corvus.toml`
//! - Shared types: [`Platform`], [`ReviewRequest`], [`RequestMetadata`],
//!   [`ChangeKind`], [`Severity`], [`ReviewFinding`], [`AggregatedReview`],
//!   [`Verdict`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{CorvusConfig, LlmConfig, PlatformConfig, ReviewConfig};
pub use error::CorvusError;
pub use types::{
    AggregatedReview, ChangeKind, InlineComment, OutputFormat, Platform, RequestMetadata,
    ReviewFinding, ReviewRequest, Severity, Verdict,
};

/// A convenience `Result` type for Corvus operations.
pub type Result<T> = std::result::Result<T, CorvusError>;
