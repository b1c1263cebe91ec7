//! Verse lookup handler

use crate::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use rishi_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct VerseQuery {
    pub kanda: String,
    pub sarga: i64,
    pub shloka: i64,
}

#[derive(Serialize)]
pub struct VerseResponse {
    pub id: i64,
    pub kanda: String,
    pub sarga: i64,
    pub shloka: i64,
    pub sanskrit: String,
    pub translation: String,
    pub explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

/// Fetch full details for one verse; the kanda name is normalized before
/// matching, so "Ayodhya Kanda:" finds "Ayodhya Kanda".
pub async fn get_verse(
    State(state): State<AppState>,
    Query(params): Query<VerseQuery>,
) -> Result<Json<VerseResponse>> {
    let verse = state
        .services
        .corpus
        .find_verse(&params.kanda, params.sarga, params.shloka)
        .await?
        .ok_or(AppError::VerseNotFound {
            kanda: params.kanda,
            sarga: params.sarga,
            shloka: params.shloka,
        })?;

    Ok(Json(VerseResponse {
        id: verse.id,
        kanda: verse.kanda,
        sarga: verse.sarga,
        shloka: verse.verse_number,
        sanskrit: verse.text,
        translation: verse.translation,
        explanation: verse.explanation,
        speaker: verse.speaker,
    }))
}
