//! Evidence-ranking pipeline (retrieve, classify, curate)
//!
//! Retrieval casts a wide net over the verse collection; a batched
//! classification pass then rejects narrative and keeps only generalizable
//! maxims. Failure handling is deliberately asymmetric: a short
//! classification output drops the unmentioned candidates, while a failed
//! batch call keeps the whole batch so retrieval quality degrades to
//! unfiltered rather than to silence.

use crate::services::ResearchServices;
use crate::types::{EvidenceCandidate, RankedEvidence};
use metrics::{counter, gauge};
use rishi_common::errors::{AppError, Result};
use rishi_common::llm::{ChatModel, ChatOptions};
use rishi_common::vector::ScoredPoint;
use serde::Deserialize;
use std::sync::Arc;

const CLASSIFIER_SYSTEM_PROMPT: &str = "You are a ruthless editor. You REJECT almost \
everything. You NEVER hallucinate a lesson from a simple description.";

/// Classification verdict for one candidate, positional within its batch
#[derive(Debug, Clone, Deserialize)]
struct Verdict {
    #[serde(default)]
    keep: bool,
    #[serde(default)]
    category: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    modern_take: Option<String>,
}

impl Verdict {
    fn missing() -> Self {
        Self {
            keep: false,
            category: "Missing".into(),
            reason: "Classifier output incomplete".into(),
            modern_take: None,
        }
    }

    fn batch_error() -> Self {
        Self {
            keep: true,
            category: "Error".into(),
            reason: "Batch Error".into(),
            modern_take: None,
        }
    }
}

#[derive(Deserialize)]
struct BatchVerdicts {
    #[serde(default)]
    results: Vec<Verdict>,
}

pub struct EvidenceRanker {
    services: ResearchServices,
}

impl EvidenceRanker {
    pub fn new(services: ResearchServices) -> Self {
        Self { services }
    }

    /// Retrieve, classify in batches, and curate evidence for `query`.
    ///
    /// Without a configured classifier the pipeline degrades to the raw
    /// top-`final_limit` retrieval hits tagged `Standard Search`.
    pub async fn rank(&self, query: &str, final_limit: usize) -> Result<Vec<RankedEvidence>> {
        let vector = self.services.embedder.embed(query).await?;
        let hits = self
            .services
            .index
            .query(
                &self.services.config.vector.verse_collection,
                &vector,
                self.services.config.agent.retrieval_k,
                None,
            )
            .await?;

        let candidates: Vec<EvidenceCandidate> =
            hits.iter().map(candidate_from_point).collect();
        counter!("rishi_rank_candidates_total").increment(candidates.len() as u64);

        let chat = match &self.services.chat {
            Some(chat) => Arc::clone(chat),
            None => {
                tracing::info!(query, "No classifier configured, returning unfiltered hits");
                return Ok(candidates
                    .into_iter()
                    .take(final_limit)
                    .map(|candidate| RankedEvidence {
                        candidate,
                        keep: true,
                        category: "Standard Search".into(),
                        reason: String::new(),
                        modern_take: None,
                    })
                    .collect());
            }
        };

        let batch_size = self.services.config.agent.rank_batch_size;
        let mut kept = Vec::new();

        for (batch_no, batch) in candidates.chunks(batch_size).enumerate() {
            let contents: Vec<String> = batch
                .iter()
                .map(|c| format!("{} {}", c.translation, c.explanation))
                .collect();

            let verdicts = match classify_batch(chat.as_ref(), &contents, query).await {
                Ok(mut verdicts) => {
                    // Output length must equal batch length: surplus entries
                    // are dropped, shortfalls padded as rejected.
                    verdicts.truncate(batch.len());
                    while verdicts.len() < batch.len() {
                        verdicts.push(Verdict::missing());
                    }
                    verdicts
                }
                Err(e) => {
                    tracing::warn!(
                        batch = batch_no + 1,
                        error = %e,
                        "Classification batch failed, keeping whole batch"
                    );
                    counter!("rishi_rank_batch_errors_total").increment(1);
                    batch.iter().map(|_| Verdict::batch_error()).collect()
                }
            };

            for (candidate, verdict) in batch.iter().zip(verdicts) {
                if verdict.keep {
                    kept.push(RankedEvidence {
                        candidate: candidate.clone(),
                        keep: true,
                        category: verdict.category,
                        reason: verdict.reason,
                        modern_take: verdict.modern_take,
                    });
                }
            }
        }

        gauge!("rishi_rank_kept_count").set(kept.len() as f64);
        tracing::info!(
            query,
            retrieved = hits.len(),
            kept = kept.len(),
            "Evidence ranking complete"
        );

        kept.truncate(final_limit);
        Ok(kept)
    }
}

async fn classify_batch(
    chat: &dyn ChatModel,
    batch: &[String],
    query: &str,
) -> Result<Vec<Verdict>> {
    let options = ChatOptions {
        temperature: 0.0,
        json_output: true,
    };
    let prompt = classification_prompt(batch, query);
    let raw = chat.complete(CLASSIFIER_SYSTEM_PROMPT, &prompt, &options).await?;

    let parsed: BatchVerdicts =
        serde_json::from_str(&raw).map_err(|e| AppError::ClassificationMalformed {
            message: format!("Not a results object: {}", e),
        })?;
    Ok(parsed.results)
}

fn classification_prompt(batch: &[String], query: &str) -> String {
    let verses_text = batch
        .iter()
        .enumerate()
        .map(|(i, v)| format!("Verse {}:\n{}", i + 1, v))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"Analyze the following {count} Ramayana verses for the query: "{query}"

{verses_text}

TASK: IDENTIFY ONLY UNIVERSAL WISDOM ("SUBHASHITAS").

We are building a "Book of General Leadership Quotes".
WE MUST REJECT 95% of the verses because they are narrative (story-telling).

EXAMPLES:
-----------------------
Verse: "Rama, the son of Dasaratha, took his bow and looked at the ocean."
-> REJECT (Narrative/Descriptive)

Verse: "Sugriva said to Angada: 'Go south and find Sita'."
-> REJECT (Specific Instruction/Dialog)

Verse: "Enthusiasm is the root of prosperity; there is no greater enemy than laziness."
-> KEEP (Universal Maxim)

Verse: "A king who does not protect his subjects is like a barren cloud."
-> KEEP (Universal Principle)
-----------------------

INSTRUCTIONS FOR EACH VERSE:
1. "Is this a story beat (action/dialog)?" -> If YES, DISCARD immediately.
2. "Does it mention specific names (Rama, Sugriva, Ravana) as the *subject* of the action?" -> If YES, DISCARD (usually).
3. "Is it a general rule asking 'How should one behave?'" -> If YES, KEEP.

Output ONLY JSON:
{{
    "results": [
        {{ "index": 1, "keep": false, "category": "Narrative", "reason": "Describes specific action of a character" }},
        {{ "index": 2, "keep": true,  "category": "Wisdom",    "reason": "Universal rule about [Topic]", "modern_take": "..." }}
    ]
}}"#,
        count = batch.len(),
        query = query,
        verses_text = verses_text,
    )
}

fn candidate_from_point(point: &ScoredPoint) -> EvidenceCandidate {
    let payload = &point.payload;
    let field = |key: &str| {
        payload
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };

    EvidenceCandidate {
        identifier: field("verse_id"),
        kanda: field("kanda"),
        sarga: payload.get("sarga").and_then(|v| v.as_i64()).unwrap_or(0),
        shloka: payload.get("shloka").and_then(|v| v.as_i64()),
        score: point.score,
        text: field("shloka_text"),
        translation: field("translation"),
        explanation: field("explanation"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rishi_common::config::AppConfig;
    use rishi_common::corpus::MemoryCorpus;
    use rishi_common::embeddings::{Embedder, MockEmbedder};
    use rishi_common::llm::MockChat;
    use rishi_common::vector::{MemoryIndex, VectorIndex};
    use serde_json::json;

    async fn seeded_services(chat: Option<Arc<dyn ChatModel>>) -> ResearchServices {
        let config = AppConfig::default();
        let embedder = Arc::new(MockEmbedder::new(16));
        let index = MemoryIndex::new();
        index
            .ensure_collection(&config.vector.verse_collection, 16)
            .await
            .unwrap();

        for i in 0..20u64 {
            let vector = embedder.embed(&format!("verse {}", i)).await.unwrap();
            index
                .upsert(
                    &config.vector.verse_collection,
                    i,
                    vector,
                    json!({
                        "verse_id": format!("R-{}", i),
                        "kanda": "Ayodhya Kanda",
                        "sarga": 10,
                        "shloka": i,
                        "shloka_text": format!("sanskrit-{}", i),
                        "translation": format!("translation {}", i),
                        "explanation": format!("explanation {}", i),
                    }),
                )
                .await
                .unwrap();
        }

        ResearchServices::new(
            Arc::new(MemoryCorpus::new()),
            Arc::new(index),
            embedder,
            chat,
            config,
        )
    }

    fn keep_first_two() -> String {
        json!({
            "results": [
                { "index": 1, "keep": true, "category": "Wisdom",
                  "reason": "Universal rule", "modern_take": "Stay steady" },
                { "index": 2, "keep": true, "category": "Wisdom", "reason": "Maxim" },
                { "index": 3, "keep": false, "category": "Narrative", "reason": "Story beat" }
            ]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_failed_batch_is_kept_whole() {
        // 20 candidates -> batches of 15 and 5; second batch call fails.
        let chat: Arc<dyn ChatModel> = Arc::new(MockChat::scripted(vec![
            Ok(keep_first_two()),
            Err("upstream unavailable".into()),
        ]));
        let services = seeded_services(Some(chat)).await;
        let ranker = EvidenceRanker::new(services);

        let ranked = ranker.rank("leadership", 10).await.unwrap();

        // First batch: 2 keeps + 12 padded rejections. Second batch: all 5
        // kept conservatively.
        assert_eq!(ranked.len(), 7);
        let error_tagged: Vec<_> =
            ranked.iter().filter(|r| r.category == "Error").collect();
        assert_eq!(error_tagged.len(), 5);
        assert!(ranked.len() <= 10);
    }

    #[tokio::test]
    async fn test_short_output_pads_as_rejected() {
        let one_verdict = json!({
            "results": [
                { "index": 1, "keep": true, "category": "Wisdom", "reason": "Maxim" }
            ]
        })
        .to_string();
        let chat: Arc<dyn ChatModel> = Arc::new(MockChat::always(&one_verdict));
        let services = seeded_services(Some(chat)).await;
        let ranker = EvidenceRanker::new(services);

        // Each batch keeps exactly its first candidate.
        let ranked = ranker.rank("leadership", 10).await.unwrap();
        assert_eq!(ranked.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_json_counts_as_batch_error() {
        let chat: Arc<dyn ChatModel> = Arc::new(MockChat::always("not json at all"));
        let services = seeded_services(Some(chat)).await;
        let ranker = EvidenceRanker::new(services);

        let ranked = ranker.rank("leadership", 10).await.unwrap();
        assert_eq!(ranked.len(), 10);
        assert!(ranked.iter().all(|r| r.category == "Error"));
    }

    #[tokio::test]
    async fn test_degraded_mode_returns_unfiltered_hits() {
        let services = seeded_services(None).await;
        let ranker = EvidenceRanker::new(services);

        let ranked = ranker.rank("leadership", 10).await.unwrap();
        assert_eq!(ranked.len(), 10);
        assert!(ranked.iter().all(|r| r.category == "Standard Search"));
    }
}
