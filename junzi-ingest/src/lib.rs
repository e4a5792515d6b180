//! # Junzi Ingest (junzi-ingest)
//!
//! Operator tooling around the passage store: raw corpus ingest, chunking,
//! review-gated splitting, translation audit and publication.

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{run, IngestContext};
