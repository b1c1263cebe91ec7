//! Rishi Common Library
//!
//! Shared code for all Rishi services including:
//! - Corpus store (SQLite) and vector index (Qdrant REST) clients
//! - Embedding and chat model abstractions
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod vector;

// Re-export commonly used types
pub use config::AppConfig;
pub use corpus::{CorpusStore, Verse};
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use llm::ChatModel;
pub use vector::VectorIndex;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source identifier for the Valmiki Ramayana corpus
pub const RAMAYANA_SOURCE_ID: &str = "ramayana";
