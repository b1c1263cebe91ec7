//! Corpus and vector ingestion for the research gateway

pub mod loader;
pub mod processor;

pub use processor::{run_pipeline, IngestOptions, IngestSummary};
