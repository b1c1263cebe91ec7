//! Vector index abstraction
//!
//! A Qdrant-compatible REST client plus an in-memory implementation for
//! tests. The index is an external collaborator: query serving only reads
//! from it, the ingestion job only writes to it.

use crate::config::VectorConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// One nearest-neighbor hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPoint {
    /// Cosine similarity score
    pub score: f32,
    /// Opaque payload stored alongside the vector
    pub payload: Value,
}

/// Equality filter on a single payload field
#[derive(Debug, Clone)]
pub struct FieldFilter {
    pub key: String,
    pub value: Value,
}

/// Point count and existence for one collection
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStatus {
    pub name: String,
    pub exists: bool,
    pub points: u64,
}

/// Vector index interface
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace one point
    async fn upsert(
        &self,
        collection: &str,
        id: u64,
        vector: Vec<f32>,
        payload: Value,
    ) -> Result<()>;

    /// Nearest-neighbor query by cosine similarity
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&FieldFilter>,
    ) -> Result<Vec<ScoredPoint>>;

    /// Create the collection if it does not exist yet
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()>;

    /// Existence and point count for one collection
    async fn collection_status(&self, collection: &str) -> Result<CollectionStatus>;
}

/// Qdrant REST client
pub struct QdrantIndex {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct UpsertRequest {
    points: Vec<UpsertPoint>,
}

#[derive(Serialize)]
struct UpsertPoint {
    id: u64,
    vector: Vec<f32>,
    payload: Value,
}

#[derive(Serialize)]
struct QueryRequest {
    query: Vec<f32>,
    limit: usize,
    with_payload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Deserialize)]
struct QueryResponse {
    result: QueryResult,
}

#[derive(Deserialize)]
struct QueryResult {
    points: Vec<QueryPoint>,
}

#[derive(Deserialize)]
struct QueryPoint {
    score: f32,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct CollectionInfoResponse {
    result: CollectionInfo,
}

#[derive(Deserialize)]
struct CollectionInfo {
    #[serde(default)]
    points_count: u64,
}

impl QdrantIndex {
    /// Create a client from configuration
    pub fn new(config: &VectorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    async fn check_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::VectorIndex {
                message: format!("{} failed with {}: {}", what, status, body),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(
        &self,
        collection: &str,
        id: u64,
        vector: Vec<f32>,
        payload: Value,
    ) -> Result<()> {
        let request = UpsertRequest {
            points: vec![UpsertPoint { id, vector, payload }],
        };

        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/collections/{}/points?wait=true", collection),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::VectorIndex {
                message: format!("Upsert request failed: {}", e),
            })?;

        Self::check_status(response, "Upsert").await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&FieldFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        let filter = filter.map(|f| {
            serde_json::json!({
                "must": [{ "key": f.key, "match": { "value": f.value } }]
            })
        });

        let request = QueryRequest {
            query: vector.to_vec(),
            limit,
            with_payload: true,
            filter,
        };

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/query", collection),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::VectorIndex {
                message: format!("Query request failed: {}", e),
            })?;

        let response = Self::check_status(response, "Query").await?;
        let parsed: QueryResponse =
            response.json().await.map_err(|e| AppError::VectorIndex {
                message: format!("Failed to parse query response: {}", e),
            })?;

        Ok(parsed
            .result
            .points
            .into_iter()
            .map(|p| ScoredPoint {
                score: p.score,
                payload: p.payload,
            })
            .collect())
    }

    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        let status = self.collection_status(collection).await;
        if matches!(status, Ok(ref s) if s.exists) {
            return Ok(());
        }

        let body = serde_json::json!({
            "vectors": { "size": dimension, "distance": "Cosine" }
        });

        let response = self
            .request(reqwest::Method::PUT, &format!("/collections/{}", collection))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::VectorIndex {
                message: format!("Create collection failed: {}", e),
            })?;

        Self::check_status(response, "Create collection").await?;
        Ok(())
    }

    async fn collection_status(&self, collection: &str) -> Result<CollectionStatus> {
        let response = self
            .request(reqwest::Method::GET, &format!("/collections/{}", collection))
            .send()
            .await
            .map_err(|e| AppError::VectorIndex {
                message: format!("Collection info request failed: {}", e),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(CollectionStatus {
                name: collection.to_string(),
                exists: false,
                points: 0,
            });
        }

        let response = Self::check_status(response, "Collection info").await?;
        let parsed: CollectionInfoResponse =
            response.json().await.map_err(|e| AppError::VectorIndex {
                message: format!("Failed to parse collection info: {}", e),
            })?;

        Ok(CollectionStatus {
            name: collection.to_string(),
            exists: true,
            points: parsed.result.points_count,
        })
    }
}

/// In-memory vector index with exact cosine scoring, for tests
#[derive(Default)]
pub struct MemoryIndex {
    collections: RwLock<HashMap<String, Vec<(u64, Vec<f32>, Value)>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(
        &self,
        collection: &str,
        id: u64,
        vector: Vec<f32>,
        payload: Value,
    ) -> Result<()> {
        let mut collections = self.collections.write().unwrap();
        let points = collections.entry(collection.to_string()).or_default();
        points.retain(|(existing, _, _)| *existing != id);
        points.push((id, vector, payload));
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&FieldFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().unwrap();
        let points = match collections.get(collection) {
            Some(points) => points,
            None => {
                return Err(AppError::VectorIndex {
                    message: format!("Collection '{}' does not exist", collection),
                })
            }
        };

        let mut scored: Vec<ScoredPoint> = points
            .iter()
            .filter(|(_, _, payload)| match filter {
                Some(f) => payload.get(&f.key) == Some(&f.value),
                None => true,
            })
            .map(|(_, v, payload)| ScoredPoint {
                score: cosine(vector, v),
                payload: payload.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn ensure_collection(&self, collection: &str, _dimension: usize) -> Result<()> {
        self.collections
            .write()
            .unwrap()
            .entry(collection.to_string())
            .or_default();
        Ok(())
    }

    async fn collection_status(&self, collection: &str) -> Result<CollectionStatus> {
        let collections = self.collections.read().unwrap();
        match collections.get(collection) {
            Some(points) => Ok(CollectionStatus {
                name: collection.to_string(),
                exists: true,
                points: points.len() as u64,
            }),
            None => Ok(CollectionStatus {
                name: collection.to_string(),
                exists: false,
                points: 0,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cosine_orthogonal() {
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_memory_query_orders_by_score() {
        let index = MemoryIndex::new();
        index.ensure_collection("verses", 2).await.unwrap();
        index
            .upsert("verses", 1, vec![1.0, 0.0], json!({"verse": 1}))
            .await
            .unwrap();
        index
            .upsert("verses", 2, vec![0.6, 0.8], json!({"verse": 2}))
            .await
            .unwrap();

        let hits = index.query("verses", &[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].payload["verse"], 1);
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_memory_query_filter() {
        let index = MemoryIndex::new();
        index.ensure_collection("verses", 2).await.unwrap();
        index
            .upsert("verses", 1, vec![1.0, 0.0], json!({"kanda": "Bala"}))
            .await
            .unwrap();
        index
            .upsert("verses", 2, vec![1.0, 0.0], json!({"kanda": "Ayodhya"}))
            .await
            .unwrap();

        let filter = FieldFilter {
            key: "kanda".into(),
            value: json!("Bala"),
        };
        let hits = index
            .query("verses", &[1.0, 0.0], 10, Some(&filter))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload["kanda"], "Bala");
    }

    #[tokio::test]
    async fn test_missing_collection_is_an_error() {
        let index = MemoryIndex::new();
        let err = index.query("absent", &[1.0], 5, None).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let index = MemoryIndex::new();
        index
            .upsert("verses", 1, vec![1.0], json!({"v": 1}))
            .await
            .unwrap();
        index
            .upsert("verses", 1, vec![1.0], json!({"v": 2}))
            .await
            .unwrap();
        let status = index.collection_status("verses").await.unwrap();
        assert_eq!(status.points, 1);
    }
}
