//! Configuration management for Rishi services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Corpus store configuration (SQLite)
    #[serde(default)]
    pub corpus: CorpusConfig,

    /// Vector index configuration
    #[serde(default)]
    pub vector: VectorConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chat model configuration
    #[serde(default)]
    pub chat: ChatConfig,

    /// Agent run configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Synthesis policy configuration
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorpusConfig {
    /// SQLite database URL
    #[serde(default = "default_corpus_url")]
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Shloka JSON export consumed by the ingestion job
    #[serde(default = "default_corpus_data_file")]
    pub data_file: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorConfig {
    /// Vector index base URL (Qdrant-compatible REST endpoint)
    #[serde(default = "default_vector_url")]
    pub url: String,

    /// API key, if the index requires one
    pub api_key: Option<String>,

    /// Collection holding per-verse points
    #[serde(default = "default_verse_collection")]
    pub verse_collection: String,

    /// Collection holding per-sarga (chapter) roll-up points
    #[serde(default = "default_sarga_collection")]
    pub sarga_collection: String,

    /// Request timeout in seconds
    #[serde(default = "default_vector_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    /// Chat completions endpoint
    #[serde(default = "default_chat_endpoint")]
    pub endpoint: String,

    /// API key; when absent the agent runs in degraded mode
    /// (unfiltered retrieval, mock synthesis)
    pub api_key: Option<String>,

    /// Model name
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_chat_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Minimum steps in a generated plan
    #[serde(default = "default_plan_min")]
    pub plan_min_steps: usize,

    /// Maximum steps in a generated plan
    #[serde(default = "default_plan_max")]
    pub plan_max_steps: usize,

    /// Maximum state transitions before a run is force-terminated
    #[serde(default = "default_run_ceiling")]
    pub run_ceiling: u32,

    /// Per-step capability timeout in seconds
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,

    /// Planning call timeout in seconds
    #[serde(default = "default_planning_timeout")]
    pub planning_timeout_secs: u64,

    /// Synthesis call timeout in seconds
    #[serde(default = "default_synthesis_timeout")]
    pub synthesis_timeout_secs: u64,

    /// Nearest-neighbor candidates retrieved per ranking run
    #[serde(default = "default_retrieval_k")]
    pub retrieval_k: usize,

    /// Candidates per classification batch
    #[serde(default = "default_rank_batch_size")]
    pub rank_batch_size: usize,

    /// Curated evidence returned per ranking run
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SynthesisConfig {
    /// Figures that must never receive negative characterization
    #[serde(default = "default_revered_figures")]
    pub revered_figures: Vec<String>,

    /// Figures the synthesizer may critique freely
    #[serde(default = "default_critique_allowed")]
    pub critique_allowed: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_corpus_url() -> String { "sqlite://./ramayana_agent.db".to_string() }
fn default_max_connections() -> u32 { 10 }
fn default_corpus_data_file() -> String { "Valmiki_Ramayan_Shlokas.json".to_string() }
fn default_vector_url() -> String { "http://localhost:6333".to_string() }
fn default_verse_collection() -> String { "ramayana_verses".to_string() }
fn default_sarga_collection() -> String { "ramayana_sargas".to_string() }
fn default_vector_timeout() -> u64 { 30 }
fn default_embedding_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_dimension() -> usize { 1536 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_retries() -> u32 { 3 }
fn default_chat_endpoint() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_chat_model() -> String { "gpt-4o-mini".to_string() }
fn default_chat_timeout() -> u64 { 60 }
fn default_plan_min() -> usize { 3 }
fn default_plan_max() -> usize { 7 }
fn default_run_ceiling() -> u32 { 100 }
fn default_step_timeout() -> u64 { 90 }
fn default_planning_timeout() -> u64 { 60 }
fn default_synthesis_timeout() -> u64 { 120 }
fn default_retrieval_k() -> usize { 20 }
fn default_rank_batch_size() -> usize { 15 }
fn default_final_limit() -> usize { 10 }
fn default_revered_figures() -> Vec<String> {
    vec!["Rama".to_string(), "Sita".to_string(), "Hanuman".to_string()]
}
fn default_critique_allowed() -> Vec<String> {
    vec!["Ravana".to_string(), "Kaikeyi".to_string(), "Manthara".to_string()]
}
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "rishi".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8001
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get per-step capability timeout as Duration
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.agent.step_timeout_secs)
    }

    /// Get planning timeout as Duration
    pub fn planning_timeout(&self) -> Duration {
        Duration::from_secs(self.agent.planning_timeout_secs)
    }

    /// Get synthesis timeout as Duration
    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.agent.synthesis_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            url: default_corpus_url(),
            max_connections: default_max_connections(),
            data_file: default_corpus_data_file(),
        }
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            url: default_vector_url(),
            api_key: None,
            verse_collection: default_verse_collection(),
            sarga_collection: default_sarga_collection(),
            timeout_secs: default_vector_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_retries(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: default_chat_endpoint(),
            api_key: None,
            model: default_chat_model(),
            timeout_secs: default_chat_timeout(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            plan_min_steps: default_plan_min(),
            plan_max_steps: default_plan_max(),
            run_ceiling: default_run_ceiling(),
            step_timeout_secs: default_step_timeout(),
            planning_timeout_secs: default_planning_timeout(),
            synthesis_timeout_secs: default_synthesis_timeout(),
            retrieval_k: default_retrieval_k(),
            rank_batch_size: default_rank_batch_size(),
            final_limit: default_final_limit(),
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            revered_figures: default_revered_figures(),
            critique_allowed: default_critique_allowed(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            corpus: CorpusConfig::default(),
            vector: VectorConfig::default(),
            embedding: EmbeddingConfig::default(),
            chat: ChatConfig::default(),
            agent: AgentConfig::default(),
            synthesis: SynthesisConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.agent.run_ceiling, 100);
        assert_eq!(config.agent.retrieval_k, 20);
        assert_eq!(config.agent.rank_batch_size, 15);
    }

    #[test]
    fn test_plan_bounds() {
        let config = AppConfig::default();
        assert!(config.agent.plan_min_steps >= 3);
        assert!(config.agent.plan_max_steps <= 7);
    }

    #[test]
    fn test_protected_figures_default() {
        let config = AppConfig::default();
        assert!(config.synthesis.revered_figures.contains(&"Rama".to_string()));
        assert!(config.synthesis.critique_allowed.contains(&"Ravana".to_string()));
    }
}
