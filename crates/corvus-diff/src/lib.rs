//! Unified diff parsing for Corvus.
//!
//! Turns raw diff text into per-file, per-hunk, per-line records with
//! resolved line numbers on both sides, isolating malformed sections so one
//! broken file never sinks the rest of the diff.

pub mod parser;

pub use parser::{DiffHunk, DiffLine, FileDiff, LineKind, ParseFailure, ParsedDiff};
