//! Shloka JSON export loading

use regex_lite::Regex;
use rishi_common::corpus::Verse;
use rishi_common::errors::{AppError, Result};
use rishi_common::RAMAYANA_SOURCE_ID;
use serde::Deserialize;
use std::path::Path;
use std::sync::OnceLock;

/// One record of the shloka JSON export
#[derive(Debug, Clone, Deserialize)]
pub struct ShlokaRecord {
    pub kanda: String,
    pub sarga: i64,
    pub shloka: i64,
    #[serde(default)]
    pub shloka_text: Option<String>,
    #[serde(default)]
    pub translation: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl ShlokaRecord {
    /// Stable identifier used in vector payloads and citations
    pub fn verse_id(&self) -> String {
        format!("{} {}:{}", self.kanda, self.sarga, self.shloka)
    }

    /// Text embedded for semantic retrieval
    pub fn embedding_text(&self) -> String {
        format!(
            "{} {}",
            self.translation.as_deref().unwrap_or_default(),
            self.explanation.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }
}

/// Load and parse the whole export
pub fn load_records(path: &Path) -> Result<Vec<ShlokaRecord>> {
    let raw = std::fs::read_to_string(path).map_err(|e| AppError::Configuration {
        message: format!("Cannot read corpus export {}: {}", path.display(), e),
    })?;
    let records: Vec<ShlokaRecord> = serde_json::from_str(&raw)?;
    tracing::info!(path = %path.display(), records = records.len(), "Loaded shloka export");
    Ok(records)
}

/// Attribute a speaker from "<Name> said" phrasing in the explanation
pub fn extract_speaker(text: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"([A-Z][a-z]+) said").expect("static pattern")
    });
    pattern
        .captures(text)
        .map(|captures| captures[1].to_string())
}

/// Convert an export record to a corpus row
pub fn record_to_verse(record: &ShlokaRecord) -> Verse {
    let explanation = record.explanation.clone().unwrap_or_default();
    Verse {
        id: 0,
        source_id: RAMAYANA_SOURCE_ID.to_string(),
        kanda: record.kanda.clone(),
        sarga: record.sarga,
        verse_number: record.shloka,
        text: record.shloka_text.clone().unwrap_or_default(),
        translation: record.translation.clone().unwrap_or_default(),
        speaker: extract_speaker(&explanation),
        explanation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_speaker() {
        assert_eq!(
            extract_speaker("Then Rama said to his brother: hold fast."),
            Some("Rama".to_string())
        );
        assert_eq!(
            extract_speaker("Kaikeyi said these harsh words."),
            Some("Kaikeyi".to_string())
        );
        assert_eq!(extract_speaker("The city mourned in silence."), None);
    }

    #[test]
    fn test_record_parses_with_missing_fields() {
        let record: ShlokaRecord = serde_json::from_str(
            r#"{"kanda": "Bala Kanda", "sarga": 1, "shloka": 2, "explanation": null}"#,
        )
        .unwrap();
        assert_eq!(record.verse_id(), "Bala Kanda 1:2");

        let verse = record_to_verse(&record);
        assert_eq!(verse.source_id, "ramayana");
        assert!(verse.explanation.is_empty());
        assert!(verse.speaker.is_none());
    }

    #[test]
    fn test_embedding_text_joins_translation_and_explanation() {
        let record: ShlokaRecord = serde_json::from_str(
            r#"{"kanda": "Bala Kanda", "sarga": 1, "shloka": 2,
                "translation": "A king spoke.", "explanation": "Sita said so."}"#,
        )
        .unwrap();
        assert_eq!(record.embedding_text(), "A king spoke. Sita said so.");
        assert_eq!(
            record_to_verse(&record).speaker.as_deref(),
            Some("Sita")
        );
    }
}
