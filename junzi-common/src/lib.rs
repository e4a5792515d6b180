//! # Junzi Common Library
//!
//! Passage store core shared by the Junzi ingestion tooling and reader:
//! - Data model (works, chapters, aligned passages) and reference grammar
//! - Passage validator
//! - Review-gated splitting of paragraph-level passages
//! - Atomic JSON document store and processing status manifest
//! - Raw corpus ingest, chunking and translation audit
//! - Configuration loading

pub mod artifacts;
pub mod audit;
pub mod config;
pub mod error;
pub mod ingest;
pub mod manifest;
pub mod model;
pub mod refs;
pub mod split;
pub mod store;
pub mod text;
pub mod validation;

pub use error::{Error, Result};
pub use model::{Alignment, Chapter, ChunkDocument, Passage, Work, NO_TRANSLATION};
pub use refs::{PassageRef, RefScheme};
pub use store::PassageStore;
pub use validation::{ValidationOutcome, ValidationReport, Validator};
