//! Health check handlers

use crate::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Dependency checks are bounded so a hung index cannot hang the probe
const DETAILED_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub agent: String,
}

#[derive(Serialize)]
pub struct DetailedHealthResponse {
    pub status: String,
    pub agent: String,
    pub vector: VectorHealth,
    pub ingestion: IngestionHealth,
    pub model: ModelHealth,
}

#[derive(Serialize)]
pub struct VectorHealth {
    pub connected: bool,
    pub collections: BTreeMap<String, CollectionHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct CollectionHealth {
    pub exists: bool,
    pub points: u64,
}

#[derive(Serialize)]
pub struct IngestionHealth {
    /// complete, incomplete, or unknown
    pub status: String,
    pub collections: BTreeMap<String, IngestionCollection>,
}

#[derive(Serialize)]
pub struct IngestionCollection {
    pub name: String,
    pub points: u64,
    /// ok, empty, or missing
    pub status: String,
}

#[derive(Serialize)]
pub struct ModelHealth {
    pub embedder: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<String>,
}

/// Liveness probe
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        agent: "Digital Rishi".to_string(),
    })
}

/// Detailed readiness: vector index connectivity, per-collection point
/// counts, and model configuration. Failures are reported in the body,
/// never as an HTTP error.
pub async fn health_detailed(State(state): State<AppState>) -> Json<DetailedHealthResponse> {
    let required = [
        ("verses", state.config.vector.verse_collection.clone()),
        ("sargas", state.config.vector.sarga_collection.clone()),
    ];

    let mut vector = VectorHealth {
        connected: true,
        collections: BTreeMap::new(),
        error: None,
    };
    let mut ingestion = IngestionHealth {
        status: "complete".to_string(),
        collections: BTreeMap::new(),
    };

    for (key, name) in required {
        let check = tokio::time::timeout(
            DETAILED_CHECK_TIMEOUT,
            state.services.index.collection_status(&name),
        )
        .await;

        match check {
            Ok(Ok(status)) => {
                vector.collections.insert(
                    name.clone(),
                    CollectionHealth {
                        exists: status.exists,
                        points: status.points,
                    },
                );
                let collection_status = if !status.exists {
                    "missing"
                } else if status.points == 0 {
                    "empty"
                } else {
                    "ok"
                };
                if collection_status != "ok" {
                    ingestion.status = "incomplete".to_string();
                }
                ingestion.collections.insert(
                    key.to_string(),
                    IngestionCollection {
                        name,
                        points: status.points,
                        status: collection_status.to_string(),
                    },
                );
            }
            Ok(Err(e)) => {
                vector.connected = false;
                vector.error = Some(e.to_string());
                ingestion.status = "unknown".to_string();
            }
            Err(_) => {
                vector.connected = false;
                vector.error = Some(format!(
                    "Connection timeout after {}s",
                    DETAILED_CHECK_TIMEOUT.as_secs()
                ));
                ingestion.status = "unknown".to_string();
            }
        }
    }

    let status = if !vector.connected {
        "error"
    } else if ingestion.status != "complete" {
        "warning"
    } else {
        "ok"
    };

    Json(DetailedHealthResponse {
        status: status.to_string(),
        agent: "Digital Rishi".to_string(),
        vector,
        ingestion,
        model: ModelHealth {
            embedder: state.services.embedder.model_name().to_string(),
            chat: state
                .services
                .chat
                .as_ref()
                .map(|c| c.model_name().to_string()),
        },
    })
}
