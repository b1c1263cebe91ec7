//! Capability registry and dispatch
//!
//! The registry is a closed enum: every capability the planner may name is
//! a variant here, and dispatch is an exhaustive match. The planner's raw
//! name string is parsed only at execution time, so a plan naming an
//! unregistered capability still runs; the bad step fails inline.

use crate::ranker::EvidenceRanker;
use crate::services::ResearchServices;
use rishi_common::errors::{AppError, Result};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Verses fetched around a target by `get_verse_context`
const DEFAULT_CONTEXT_WINDOW: i64 = 5;

/// Verses returned by `search_narrative`
const NARRATIVE_LIMIT: usize = 10;

/// Sarga summaries returned by `search_chapters`
const CHAPTER_LIMIT: usize = 2;

/// Curated verses returned by `search_principles`
const PRINCIPLES_LIMIT: usize = 5;

/// Chapter text cap, guarding the synthesis context window
const CHAPTER_TEXT_MAX_CHARS: usize = 15_000;

/// The closed set of research capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    /// Macro view: whole-sarga thematic summaries
    SearchChapters,
    /// Curated wisdom verses via the ranking pipeline
    SearchPrinciples,
    /// Keyword search over story events, optionally by speaker
    SearchNarrative,
    /// Surrounding verses for one target verse
    GetVerseContext,
}

impl CapabilityKind {
    pub fn name(&self) -> &'static str {
        match self {
            CapabilityKind::SearchChapters => "search_chapters",
            CapabilityKind::SearchPrinciples => "search_principles",
            CapabilityKind::SearchNarrative => "search_narrative",
            CapabilityKind::GetVerseContext => "get_verse_context",
        }
    }

    /// Execute this capability against the shared services
    pub async fn execute(
        &self,
        services: &ResearchServices,
        args: &Map<String, Value>,
    ) -> Result<String> {
        match self {
            CapabilityKind::SearchChapters => search_chapters(services, args).await,
            CapabilityKind::SearchPrinciples => search_principles(services, args).await,
            CapabilityKind::SearchNarrative => search_narrative(services, args).await,
            CapabilityKind::GetVerseContext => get_verse_context(services, args).await,
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CapabilityKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "search_chapters" => Ok(CapabilityKind::SearchChapters),
            "search_principles" => Ok(CapabilityKind::SearchPrinciples),
            "search_narrative" => Ok(CapabilityKind::SearchNarrative),
            "get_verse_context" => Ok(CapabilityKind::GetVerseContext),
            other => Err(AppError::CapabilityNotFound {
                name: other.to_string(),
            }),
        }
    }
}

/// Human-friendly one-liner for a capability invocation, streamed to the
/// client as a step detail.
pub fn describe_invocation(name: &str, args: &Map<String, Value>) -> String {
    let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("");
    match name {
        "search_principles" => format!("Searching wisdom for '{}'", query),
        "search_narrative" => format!("Searching stories for '{}'", query),
        "search_chapters" => format!("Scanning chapter summaries for '{}'", query),
        "get_verse_context" => {
            let kanda = args.get("kanda").and_then(|v| v.as_str()).unwrap_or("?");
            let sarga = args.get("sarga").and_then(|v| v.as_i64()).unwrap_or(0);
            let verse = args.get("verse_number").and_then(|v| v.as_i64()).unwrap_or(0);
            format!("Reading context around {} {}:{}", kanda, sarga, verse)
        }
        other => format!("call {}({})", other, Value::Object(args.clone())),
    }
}

async fn search_chapters(services: &ResearchServices, args: &Map<String, Value>) -> Result<String> {
    let query = require_str(args, "query")?;
    tracing::debug!(query, "Chapter search");

    let vector = services.embedder.embed(&query).await?;
    let hits = services
        .index
        .query(
            &services.config.vector.sarga_collection,
            &vector,
            CHAPTER_LIMIT,
            None,
        )
        .await?;

    let mut blocks = Vec::with_capacity(hits.len());
    for hit in &hits {
        let payload = &hit.payload;
        let kanda = payload.get("kanda").and_then(|v| v.as_str()).unwrap_or("");
        let sarga = payload.get("sarga").and_then(|v| v.as_i64()).unwrap_or(0);
        let verse_count = payload
            .get("verse_count")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        let text = payload
            .get("full_text")
            .and_then(|v| v.as_str())
            .unwrap_or("No text found.");

        blocks.push(format!(
            "SOURCE: CHAPTER SUMMARY\n\
             Chapter: {} Sarga {}\n\
             Full Chapter Context:\n{}\n\
             Total Verses: {}\n",
            kanda,
            sarga,
            truncate_chapter_text(text),
            verse_count
        ));
    }
    Ok(blocks.join("\n---\n"))
}

async fn search_principles(
    services: &ResearchServices,
    args: &Map<String, Value>,
) -> Result<String> {
    let query = require_str(args, "query")?;
    tracing::debug!(query, "Principle search");

    let ranker = EvidenceRanker::new(services.clone());
    let ranked = ranker.rank(&query, PRINCIPLES_LIMIT).await?;

    let blocks: Vec<String> = ranked
        .iter()
        .map(|r| {
            let c = &r.candidate;
            let shloka = c.shloka.map(|s| s.to_string()).unwrap_or_default();
            format!(
                "SOURCE: SPECIFIC VERSE\n\
                 Verse: {}\n\
                 Location: {} {}:{}\n\
                 Sanskrit: {}\n\
                 Translation: {}\n\
                 Explanation: {}\n\
                 Modern Take: {}\n\
                 Relevance: {}\n",
                c.identifier,
                c.kanda,
                c.sarga,
                shloka,
                or_na(&c.text),
                or_na(&c.translation),
                c.explanation,
                r.modern_take.as_deref().unwrap_or("N/A"),
                or_na(&r.reason),
            )
        })
        .collect();
    Ok(blocks.join("\n---\n"))
}

async fn search_narrative(
    services: &ResearchServices,
    args: &Map<String, Value>,
) -> Result<String> {
    let query = require_str(args, "query")?;
    let speaker = optional_str(args, "speaker");
    tracing::debug!(query, speaker = speaker.as_deref(), "Narrative search");

    let verses = services
        .corpus
        .narrative_search(&query, speaker.as_deref(), NARRATIVE_LIMIT)
        .await?;

    if verses.is_empty() {
        return Ok("No narrative verses found.".to_string());
    }

    let blocks: Vec<String> = verses
        .iter()
        .map(|v| {
            format!(
                "SOURCE: SPECIFIC VERSE\n\
                 Location: {} {}:{}\n\
                 Speaker: {}\n\
                 Text: {}\n",
                v.kanda,
                v.sarga,
                v.verse_number,
                v.speaker.as_deref().unwrap_or("Narrator"),
                v.explanation
            )
        })
        .collect();
    Ok(blocks.join("\n---\n"))
}

async fn get_verse_context(
    services: &ResearchServices,
    args: &Map<String, Value>,
) -> Result<String> {
    let kanda = require_str(args, "kanda")?;
    let sarga = require_i64(args, "sarga")?;
    let verse_number = require_i64(args, "verse_number")?;
    let window = match args.get("window") {
        Some(_) => require_i64(args, "window")?,
        None => DEFAULT_CONTEXT_WINDOW,
    };

    let verses = services
        .corpus
        .verse_window(&kanda, sarga, verse_number, window)
        .await?;

    let lines: Vec<String> = verses
        .iter()
        .map(|v| {
            let marker = if v.verse_number == verse_number {
                ">>> "
            } else {
                "    "
            };
            format!(
                "{}[{}] {}: {}",
                marker,
                v.verse_number,
                v.speaker.as_deref().unwrap_or("Narrator"),
                v.explanation
            )
        })
        .collect();
    Ok(lines.join("\n"))
}

fn truncate_chapter_text(text: &str) -> String {
    match text.char_indices().nth(CHAPTER_TEXT_MAX_CHARS) {
        Some((idx, _)) => format!(
            "{}\n... [Truncated for Context Window] ...",
            &text[..idx]
        ),
        None => text.to_string(),
    }
}

fn or_na(s: &str) -> &str {
    if s.is_empty() {
        "N/A"
    } else {
        s
    }
}

fn require_str(args: &Map<String, Value>, key: &str) -> Result<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| AppError::InvalidFormat {
            message: format!("Missing required argument '{}'", key),
        })
}

fn optional_str(args: &Map<String, Value>, key: &str) -> Option<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn require_i64(args: &Map<String, Value>, key: &str) -> Result<i64> {
    match args.get(key) {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| AppError::InvalidFormat {
            message: format!("Argument '{}' is not an integer", key),
        }),
        // Planners sometimes emit numbers as strings
        Some(Value::String(s)) => s.trim().parse().map_err(|_| AppError::InvalidFormat {
            message: format!("Argument '{}' is not an integer", key),
        }),
        _ => Err(AppError::InvalidFormat {
            message: format!("Missing required argument '{}'", key),
        }),
    }
}
