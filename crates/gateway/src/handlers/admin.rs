//! Admin handlers

use crate::AppState;
use axum::extract::{Query, State};
use axum::Json;
use rishi_ingestion::IngestOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Deserialize)]
pub struct IngestParams {
    /// Skip the slow sarga roll-up ingestion
    #[serde(default)]
    pub skip_sargas: bool,

    /// Skip populating the corpus store
    #[serde(default)]
    pub skip_corpus: bool,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub message: String,
    pub skipped: SkippedSteps,
}

#[derive(Serialize)]
pub struct SkippedSteps {
    pub sargas: bool,
    pub corpus: bool,
}

/// POST /admin/ingest
///
/// Spawns the ingestion pipeline in the background and returns
/// immediately. Query serving keeps running; it only ever reads.
pub async fn trigger_ingestion(
    State(state): State<AppState>,
    Query(params): Query<IngestParams>,
) -> Json<IngestResponse> {
    let services = state.services.clone();
    let options = IngestOptions {
        data_path: PathBuf::from(&state.config.corpus.data_file),
        skip_sargas: params.skip_sargas,
        skip_corpus: params.skip_corpus,
    };

    tokio::spawn(async move {
        tracing::info!("Starting ingestion pipeline");
        let result = rishi_ingestion::run_pipeline(
            services.corpus.as_ref(),
            services.index.as_ref(),
            services.embedder.as_ref(),
            &services.config,
            &options,
        )
        .await;

        match result {
            Ok(summary) => tracing::info!(
                verses = summary.verses,
                verse_points = summary.verse_points,
                sarga_points = summary.sarga_points,
                "Ingestion pipeline completed"
            ),
            Err(e) => tracing::error!(error = %e, "Ingestion pipeline failed"),
        }
    });

    Json(IngestResponse {
        message: "Ingestion started in background.".to_string(),
        skipped: SkippedSteps {
            sargas: params.skip_sargas,
            corpus: params.skip_corpus,
        },
    })
}
