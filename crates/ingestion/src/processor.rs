//! Ingestion pipeline
//!
//! Three passes over the shloka export: corpus rows, per-verse vector
//! points, and per-sarga roll-up points. The pipeline runs while query
//! serving stays up; serving only ever reads.

use crate::loader::{self, ShlokaRecord};
use metrics::counter;
use rishi_common::config::AppConfig;
use rishi_common::corpus::CorpusStore;
use rishi_common::embeddings::Embedder;
use rishi_common::errors::Result;
use rishi_common::vector::VectorIndex;
use rishi_common::RAMAYANA_SOURCE_ID;
use serde_json::json;
use std::path::PathBuf;

/// Corpus rows inserted per transaction
const CORPUS_BATCH: usize = 1000;

/// Verses embedded per batch request
const EMBED_BATCH: usize = 64;

/// Explanations forming the searchable anchor of a sarga point
const SARGA_ANCHOR_VERSES: usize = 15;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub data_path: PathBuf,
    pub skip_sargas: bool,
    pub skip_corpus: bool,
}

#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub verses: u64,
    pub verse_points: u64,
    pub sarga_points: u64,
}

/// Run the full pipeline against the given collaborators
pub async fn run_pipeline(
    corpus: &dyn CorpusStore,
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    config: &AppConfig,
    options: &IngestOptions,
) -> Result<IngestSummary> {
    let records = loader::load_records(&options.data_path)?;
    let mut summary = IngestSummary::default();

    if options.skip_corpus {
        tracing::info!("Skipping corpus ingestion");
    } else {
        summary.verses = ingest_corpus(corpus, &records).await?;
    }

    if options.skip_sargas {
        tracing::info!("Skipping sarga ingestion");
    } else {
        summary.sarga_points = ingest_sargas(index, embedder, config, &records).await?;
    }

    summary.verse_points = ingest_verses(index, embedder, config, &records).await?;
    Ok(summary)
}

async fn ingest_corpus(corpus: &dyn CorpusStore, records: &[ShlokaRecord]) -> Result<u64> {
    let cleared = corpus.clear_source(RAMAYANA_SOURCE_ID).await?;
    tracing::info!(cleared, "Cleared previous corpus rows");

    let mut inserted = 0u64;
    for batch in records.chunks(CORPUS_BATCH) {
        let verses: Vec<_> = batch.iter().map(loader::record_to_verse).collect();
        inserted += corpus.insert_verses(&verses).await?;
        tracing::info!(inserted, "Corpus ingestion progress");
    }

    counter!("rishi_verses_ingested_total").increment(inserted);
    Ok(inserted)
}

async fn ingest_verses(
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    config: &AppConfig,
    records: &[ShlokaRecord],
) -> Result<u64> {
    let collection = &config.vector.verse_collection;
    index
        .ensure_collection(collection, embedder.dimension())
        .await?;

    let mut next_id = 0u64;
    for batch in records.chunks(EMBED_BATCH) {
        let texts: Vec<String> = batch.iter().map(ShlokaRecord::embedding_text).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        for (record, vector) in batch.iter().zip(vectors) {
            index
                .upsert(
                    collection,
                    next_id,
                    vector,
                    json!({
                        "verse_id": record.verse_id(),
                        "kanda": record.kanda,
                        "sarga": record.sarga,
                        "shloka": record.shloka,
                        "shloka_text": record.shloka_text.as_deref().unwrap_or_default(),
                        "translation": record.translation.as_deref().unwrap_or_default(),
                        "explanation": record.explanation.as_deref().unwrap_or_default(),
                    }),
                )
                .await?;
            next_id += 1;
        }
        tracing::info!(points = next_id, "Verse point ingestion progress");
    }

    counter!("rishi_points_upserted_total").increment(next_id);
    Ok(next_id)
}

async fn ingest_sargas(
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    config: &AppConfig,
    records: &[ShlokaRecord],
) -> Result<u64> {
    let collection = &config.vector.sarga_collection;
    index
        .ensure_collection(collection, embedder.dimension())
        .await?;

    // Group by (kanda, sarga), preserving first-seen order.
    let mut order: Vec<(String, i64)> = Vec::new();
    let mut groups: std::collections::HashMap<(String, i64), Vec<&ShlokaRecord>> =
        std::collections::HashMap::new();
    for record in records {
        let key = (record.kanda.clone(), record.sarga);
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(record);
    }

    tracing::info!(sargas = order.len(), "Ingesting sarga roll-ups");

    let mut count = 0u64;
    for (id, key) in order.iter().enumerate() {
        let verses = &groups[key];
        let (kanda, sarga) = key;

        let full_text: String = verses
            .iter()
            .map(|v| {
                format!(
                    "Verse {}: {}",
                    v.shloka,
                    v.explanation.as_deref().unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        // A short anchor embeds better than the whole chapter.
        let anchor = format!(
            "{} Sarga {}\n{}",
            kanda,
            sarga,
            verses
                .iter()
                .take(SARGA_ANCHOR_VERSES)
                .map(|v| v.explanation.as_deref().unwrap_or_default())
                .collect::<Vec<_>>()
                .join("\n")
        );
        let vector = embedder.embed(&anchor).await?;

        index
            .upsert(
                collection,
                id as u64,
                vector,
                json!({
                    "kanda": kanda,
                    "sarga": sarga,
                    "full_text": full_text,
                    "verse_count": verses.len(),
                }),
            )
            .await?;
        count += 1;
    }

    counter!("rishi_points_upserted_total").increment(count);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rishi_common::corpus::MemoryCorpus;
    use rishi_common::embeddings::MockEmbedder;
    use rishi_common::vector::MemoryIndex;
    use std::io::Write;

    fn export_file() -> PathBuf {
        let records = serde_json::json!([
            {"kanda": "Bala Kanda", "sarga": 1, "shloka": 1,
             "shloka_text": "s1", "translation": "t1", "explanation": "Rama said hello."},
            {"kanda": "Bala Kanda", "sarga": 1, "shloka": 2,
             "shloka_text": "s2", "translation": "t2", "explanation": "The city rejoiced."},
            {"kanda": "Bala Kanda", "sarga": 2, "shloka": 1,
             "shloka_text": "s3", "translation": "t3", "explanation": "A sage arrived."}
        ]);
        let path = std::env::temp_dir().join(format!(
            "rishi-ingest-test-{}.json",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(records.to_string().as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_pipeline_populates_all_stores() {
        let corpus = MemoryCorpus::new();
        let index = MemoryIndex::new();
        let embedder = MockEmbedder::new(16);
        let config = AppConfig::default();
        let options = IngestOptions {
            data_path: export_file(),
            skip_sargas: false,
            skip_corpus: false,
        };

        let summary = run_pipeline(&corpus, &index, &embedder, &config, &options)
            .await
            .unwrap();

        assert_eq!(summary.verses, 3);
        assert_eq!(summary.verse_points, 3);
        // Two distinct (kanda, sarga) groups.
        assert_eq!(summary.sarga_points, 2);

        assert_eq!(corpus.count().await.unwrap(), 3);
        let verse = corpus.find_verse("Bala Kanda", 1, 1).await.unwrap().unwrap();
        assert_eq!(verse.speaker.as_deref(), Some("Rama"));

        let status = index
            .collection_status(&config.vector.sarga_collection)
            .await
            .unwrap();
        assert_eq!(status.points, 2);

        std::fs::remove_file(&options.data_path).ok();
    }

    #[tokio::test]
    async fn test_skip_flags_are_honored() {
        let corpus = MemoryCorpus::new();
        let index = MemoryIndex::new();
        let embedder = MockEmbedder::new(16);
        let config = AppConfig::default();
        let options = IngestOptions {
            data_path: export_file(),
            skip_sargas: true,
            skip_corpus: true,
        };

        let summary = run_pipeline(&corpus, &index, &embedder, &config, &options)
            .await
            .unwrap();

        assert_eq!(summary.verses, 0);
        assert_eq!(summary.sarga_points, 0);
        assert_eq!(summary.verse_points, 3);
        assert_eq!(corpus.count().await.unwrap(), 0);

        std::fs::remove_file(&options.data_path).ok();
    }
}
