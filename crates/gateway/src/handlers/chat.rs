//! NDJSON research stream handler
//!
//! Starts a research run and streams projected events as newline-delimited
//! JSON. The response ends after the terminal answer or error event; a
//! client disconnect drops the snapshot receiver, which cancels delivery.

use crate::AppState;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream;
use rishi_agent::{AgentEvent, AgentState, EventProjector, Orchestrator};
use rishi_common::errors::{AppError, Result};
use serde::Deserialize;
use std::collections::VecDeque;
use std::convert::Infallible;
use tokio::sync::mpsc;
use validator::Validate;

#[derive(Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 2000))]
    pub query: String,

    #[serde(default = "default_thread_id")]
    pub thread_id: String,
}

fn default_thread_id() -> String {
    "default_thread".to_string()
}

/// POST /chat_stream
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Response> {
    req.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("query".to_string()),
    })?;

    tracing::info!(query = %req.query, thread_id = %req.thread_id, "Received research query");

    let orchestrator = Orchestrator::new(state.services.clone());
    let rx = orchestrator.spawn_run(req.query);

    let body = Body::from_stream(event_stream(rx));
    Ok((
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        body,
    )
        .into_response())
}

struct StreamState {
    rx: mpsc::Receiver<AgentState>,
    projector: EventProjector,
    pending: VecDeque<AgentEvent>,
    done: bool,
}

fn event_stream(
    rx: mpsc::Receiver<AgentState>,
) -> impl futures::Stream<Item = std::result::Result<Bytes, Infallible>> {
    let state = StreamState {
        rx,
        projector: EventProjector::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut s| async move {
        loop {
            if let Some(event) = s.pending.pop_front() {
                if event.is_terminal() {
                    s.done = true;
                }
                match event.to_ndjson_line() {
                    Ok(line) => return Some((Ok(Bytes::from(line)), s)),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize event, skipping");
                        continue;
                    }
                }
            }
            if s.done {
                return None;
            }
            match s.rx.recv().await {
                Some(snapshot) => {
                    let events = s.projector.project(&snapshot);
                    s.pending.extend(events);
                }
                // Producer gone without a terminal event; end the stream.
                None => return None,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use rishi_agent::types::{AgentMessage, MessageKind, Step};
    use serde_json::Map;

    #[tokio::test]
    async fn test_stream_ends_after_terminal_event() {
        let (tx, rx) = mpsc::channel(8);

        let mut state = AgentState::new("grief");
        state.plan = vec![Step::new("one", "search_narrative", Map::new())];
        tx.send(state.clone()).await.unwrap();

        state.push_message(AgentMessage::new(MessageKind::Answer, "done"));
        tx.send(state.clone()).await.unwrap();

        // Even if more snapshots arrive, nothing follows the answer.
        tx.send(state.clone()).await.unwrap();
        drop(tx);

        let lines: Vec<String> = event_stream(rx)
            .map(|chunk| String::from_utf8(chunk.unwrap().to_vec()).unwrap())
            .collect()
            .await;

        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"type\":\"plan\""));
        assert!(lines[1].contains("\"type\":\"answer\""));
        assert!(lines.iter().all(|l| l.ends_with('\n')));
    }
}
