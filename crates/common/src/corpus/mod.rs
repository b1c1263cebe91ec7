//! Corpus store abstraction
//!
//! Structured store of source text units keyed by hierarchical location
//! (kanda/sarga/verse). Backends:
//! - SQLite via sqlx (production)
//! - In-memory (tests)
//!
//! Query serving only ever reads; writes happen through the bulk ingestion
//! job, so a query may observe a partially ingested store but never a torn
//! row.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::sync::RwLock;

/// One verse of the corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verse {
    /// Row id (0 before insertion)
    #[serde(default)]
    pub id: i64,

    /// Source corpus identifier, e.g. "ramayana"
    pub source_id: String,

    /// Book name, e.g. "Ayodhya Kanda"
    pub kanda: String,

    /// Chapter number within the kanda
    pub sarga: i64,

    /// Verse number within the sarga
    pub verse_number: i64,

    /// Original Sanskrit text
    pub text: String,

    /// English translation
    pub translation: String,

    /// Purport / meaning
    pub explanation: String,

    /// Speaker, when one could be attributed
    pub speaker: Option<String>,
}

/// Normalize a kanda name for lookup: strip colons, dots and
/// surrounding whitespace so "Ayodhya Kanda:" matches "Ayodhya Kanda".
pub fn normalize_kanda(kanda: &str) -> String {
    kanda.trim().replace([':', '.'], "")
}

/// Read/write interface over the verse corpus
#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Point lookup by location; kanda matched case-insensitively
    /// as a substring after normalization.
    async fn find_verse(&self, kanda: &str, sarga: i64, verse_number: i64)
        -> Result<Option<Verse>>;

    /// Keyword filter over translation and explanation, optional
    /// speaker filter, ordered by location.
    async fn narrative_search(
        &self,
        query: &str,
        speaker: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Verse>>;

    /// Ordered range `[max(1, v-window), v+window]` within one sarga.
    async fn verse_window(
        &self,
        kanda: &str,
        sarga: i64,
        verse_number: i64,
        window: i64,
    ) -> Result<Vec<Verse>>;

    /// Bulk insert used by the ingestion job.
    async fn insert_verses(&self, verses: &[Verse]) -> Result<u64>;

    /// Remove all rows for a source (re-ingestion).
    async fn clear_source(&self, source_id: &str) -> Result<u64>;

    /// Total verse count.
    async fn count(&self) -> Result<i64>;
}

/// SQLite-backed corpus store
pub struct SqliteCorpus {
    pool: SqlitePool,
}

impl SqliteCorpus {
    /// Connect and ensure the schema exists
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect to corpus at {}: {}", url, e),
            })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS verses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id TEXT NOT NULL,
                kanda TEXT NOT NULL,
                sarga INTEGER NOT NULL,
                verse_number INTEGER NOT NULL,
                text TEXT NOT NULL,
                translation TEXT NOT NULL,
                explanation TEXT NOT NULL,
                speaker TEXT
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_verses_location
                ON verses (kanda, sarga, verse_number)
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    fn row_to_verse(row: &sqlx::sqlite::SqliteRow) -> Verse {
        Verse {
            id: row.get("id"),
            source_id: row.get("source_id"),
            kanda: row.get("kanda"),
            sarga: row.get("sarga"),
            verse_number: row.get("verse_number"),
            text: row.get("text"),
            translation: row.get("translation"),
            explanation: row.get("explanation"),
            speaker: row.get("speaker"),
        }
    }
}

#[async_trait]
impl CorpusStore for SqliteCorpus {
    async fn find_verse(
        &self,
        kanda: &str,
        sarga: i64,
        verse_number: i64,
    ) -> Result<Option<Verse>> {
        let pattern = format!("%{}%", normalize_kanda(kanda));
        let row = sqlx::query(
            r#"
            SELECT * FROM verses
            WHERE kanda LIKE ?1 AND sarga = ?2 AND verse_number = ?3
            LIMIT 1
            "#,
        )
        .bind(pattern)
        .bind(sarga)
        .bind(verse_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::row_to_verse))
    }

    async fn narrative_search(
        &self,
        query: &str,
        speaker: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Verse>> {
        let pattern = format!("%{}%", query);
        let rows = match speaker {
            Some(speaker) => {
                let speaker_pattern = format!("%{}%", speaker);
                sqlx::query(
                    r#"
                    SELECT * FROM verses
                    WHERE (explanation LIKE ?1 OR translation LIKE ?1)
                      AND speaker LIKE ?2
                    ORDER BY kanda, sarga, verse_number
                    LIMIT ?3
                    "#,
                )
                .bind(&pattern)
                .bind(speaker_pattern)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT * FROM verses
                    WHERE explanation LIKE ?1 OR translation LIKE ?1
                    ORDER BY kanda, sarga, verse_number
                    LIMIT ?2
                    "#,
                )
                .bind(&pattern)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().map(Self::row_to_verse).collect())
    }

    async fn verse_window(
        &self,
        kanda: &str,
        sarga: i64,
        verse_number: i64,
        window: i64,
    ) -> Result<Vec<Verse>> {
        let start = (verse_number - window).max(1);
        let end = verse_number + window;
        let pattern = format!("%{}%", normalize_kanda(kanda));

        let rows = sqlx::query(
            r#"
            SELECT * FROM verses
            WHERE kanda LIKE ?1 AND sarga = ?2
              AND verse_number >= ?3 AND verse_number <= ?4
            ORDER BY verse_number
            "#,
        )
        .bind(pattern)
        .bind(sarga)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_verse).collect())
    }

    async fn insert_verses(&self, verses: &[Verse]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for verse in verses {
            sqlx::query(
                r#"
                INSERT INTO verses
                    (source_id, kanda, sarga, verse_number, text,
                     translation, explanation, speaker)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&verse.source_id)
            .bind(&verse.kanda)
            .bind(verse.sarga)
            .bind(verse.verse_number)
            .bind(&verse.text)
            .bind(&verse.translation)
            .bind(&verse.explanation)
            .bind(&verse.speaker)
            .execute(&mut *tx)
            .await?;
            inserted += 1;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn clear_source(&self, source_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM verses WHERE source_id = ?1")
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM verses")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}

/// In-memory corpus store for tests
#[derive(Default)]
pub struct MemoryCorpus {
    verses: RwLock<Vec<Verse>>,
}

impl MemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with verses, assigning ids in insertion order
    pub fn with_verses(verses: Vec<Verse>) -> Self {
        let store = Self::new();
        {
            let mut guard = store.verses.write().unwrap();
            for (i, mut verse) in verses.into_iter().enumerate() {
                verse.id = i as i64 + 1;
                guard.push(verse);
            }
        }
        store
    }
}

#[async_trait]
impl CorpusStore for MemoryCorpus {
    async fn find_verse(
        &self,
        kanda: &str,
        sarga: i64,
        verse_number: i64,
    ) -> Result<Option<Verse>> {
        let needle = normalize_kanda(kanda).to_lowercase();
        let verses = self.verses.read().unwrap();
        Ok(verses
            .iter()
            .find(|v| {
                v.kanda.to_lowercase().contains(&needle)
                    && v.sarga == sarga
                    && v.verse_number == verse_number
            })
            .cloned())
    }

    async fn narrative_search(
        &self,
        query: &str,
        speaker: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Verse>> {
        let needle = query.to_lowercase();
        let speaker_needle = speaker.map(|s| s.to_lowercase());
        let verses = self.verses.read().unwrap();

        Ok(verses
            .iter()
            .filter(|v| {
                let text_match = v.explanation.to_lowercase().contains(&needle)
                    || v.translation.to_lowercase().contains(&needle);
                let speaker_match = match &speaker_needle {
                    Some(s) => v
                        .speaker
                        .as_deref()
                        .map(|sp| sp.to_lowercase().contains(s))
                        .unwrap_or(false),
                    None => true,
                };
                text_match && speaker_match
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn verse_window(
        &self,
        kanda: &str,
        sarga: i64,
        verse_number: i64,
        window: i64,
    ) -> Result<Vec<Verse>> {
        let start = (verse_number - window).max(1);
        let end = verse_number + window;
        let needle = normalize_kanda(kanda).to_lowercase();
        let verses = self.verses.read().unwrap();

        let mut hits: Vec<Verse> = verses
            .iter()
            .filter(|v| {
                v.kanda.to_lowercase().contains(&needle)
                    && v.sarga == sarga
                    && v.verse_number >= start
                    && v.verse_number <= end
            })
            .cloned()
            .collect();
        hits.sort_by_key(|v| v.verse_number);
        Ok(hits)
    }

    async fn insert_verses(&self, new: &[Verse]) -> Result<u64> {
        let mut verses = self.verses.write().unwrap();
        let base = verses.len() as i64;
        for (i, verse) in new.iter().enumerate() {
            let mut verse = verse.clone();
            verse.id = base + i as i64 + 1;
            verses.push(verse);
        }
        Ok(new.len() as u64)
    }

    async fn clear_source(&self, source_id: &str) -> Result<u64> {
        let mut verses = self.verses.write().unwrap();
        let before = verses.len();
        verses.retain(|v| v.source_id != source_id);
        Ok((before - verses.len()) as u64)
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.verses.read().unwrap().len() as i64)
    }
}

#[cfg(test)]
pub mod test_fixtures {
    use super::*;

    /// A small, deterministic corpus shared by tests
    pub fn sample_verses() -> Vec<Verse> {
        vec![
            Verse {
                id: 0,
                source_id: "ramayana".into(),
                kanda: "Ayodhya Kanda".into(),
                sarga: 10,
                verse_number: 4,
                text: "sanskrit-4".into(),
                translation: "The prince prepared to leave.".into(),
                explanation: "Rama resolves to honor his father's word.".into(),
                speaker: None,
            },
            Verse {
                id: 0,
                source_id: "ramayana".into(),
                kanda: "Ayodhya Kanda".into(),
                sarga: 10,
                verse_number: 5,
                text: "sanskrit-5".into(),
                translation: "I am going to the forest.".into(),
                explanation: "Rama announces his departure to the forest.".into(),
                speaker: Some("Rama".into()),
            },
            Verse {
                id: 0,
                source_id: "ramayana".into(),
                kanda: "Ayodhya Kanda".into(),
                sarga: 10,
                verse_number: 6,
                text: "sanskrit-6".into(),
                translation: "Grief seized the city.".into(),
                explanation: "The citizens grieve at the news.".into(),
                speaker: None,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::test_fixtures::sample_verses;
    use super::*;

    #[test]
    fn test_normalize_kanda() {
        assert_eq!(normalize_kanda(" Ayodhya Kanda: "), "Ayodhya Kanda");
        assert_eq!(normalize_kanda("Bala.Kanda"), "BalaKanda");
    }

    #[tokio::test]
    async fn test_memory_find_verse_normalizes_kanda() {
        let store = MemoryCorpus::with_verses(sample_verses());
        let verse = store.find_verse("Ayodhya Kanda:", 10, 5).await.unwrap();
        assert_eq!(verse.unwrap().verse_number, 5);
    }

    #[tokio::test]
    async fn test_memory_narrative_search_with_speaker() {
        let store = MemoryCorpus::with_verses(sample_verses());
        let hits = store
            .narrative_search("forest", Some("Rama"), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].verse_number, 5);

        let none = store
            .narrative_search("forest", Some("Sita"), 10)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_memory_verse_window_clamps_start() {
        let store = MemoryCorpus::with_verses(sample_verses());
        let window = store.verse_window("Ayodhya", 10, 5, 10).await.unwrap();
        // Window start clamps to 1; all three sample verses fall inside.
        assert_eq!(window.len(), 3);
        assert_eq!(window.first().unwrap().verse_number, 4);
        assert_eq!(window.last().unwrap().verse_number, 6);
    }

    #[tokio::test]
    async fn test_sqlite_roundtrip() {
        let store = SqliteCorpus::connect("sqlite::memory:", 1).await.unwrap();
        store.insert_verses(&sample_verses()).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 3);

        let verse = store.find_verse("ayodhya", 10, 5).await.unwrap().unwrap();
        assert_eq!(verse.speaker.as_deref(), Some("Rama"));

        let hits = store.narrative_search("grief", None, 10).await.unwrap();
        assert_eq!(hits.len(), 1);

        let cleared = store.clear_source("ramayana").await.unwrap();
        assert_eq!(cleared, 3);
    }
}
