//! Ingestion CLI
//!
//! Usage: rishi-ingestion [--skip-sargas] [--skip-corpus] [--data <path>]

use rishi_common::config::AppConfig;
use rishi_common::corpus::SqliteCorpus;
use rishi_common::embeddings::create_embedder;
use rishi_common::errors::{AppError, Result};
use rishi_common::vector::QdrantIndex;
use rishi_ingestion::IngestOptions;
use std::path::PathBuf;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .json()
        .init();

    let config = AppConfig::load().map_err(|e| AppError::Configuration {
        message: format!("Failed to load configuration: {e}"),
    })?;
    let options = parse_args(std::env::args().skip(1), &config)?;

    info!(
        data = %options.data_path.display(),
        skip_sargas = options.skip_sargas,
        skip_corpus = options.skip_corpus,
        "Starting ingestion v{}",
        rishi_common::VERSION
    );

    let corpus = SqliteCorpus::connect(&config.corpus.url, config.corpus.max_connections).await?;
    let index = QdrantIndex::new(&config.vector)?;
    let embedder = create_embedder(&config.embedding)?;

    let summary =
        rishi_ingestion::run_pipeline(&corpus, &index, embedder.as_ref(), &config, &options)
            .await?;

    info!(
        verses = summary.verses,
        verse_points = summary.verse_points,
        sarga_points = summary.sarga_points,
        "Ingestion complete"
    );
    Ok(())
}

fn parse_args(args: impl Iterator<Item = String>, config: &AppConfig) -> Result<IngestOptions> {
    let mut options = IngestOptions {
        data_path: PathBuf::from(&config.corpus.data_file),
        skip_sargas: false,
        skip_corpus: false,
    };

    let mut args = args.peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--skip-sargas" => options.skip_sargas = true,
            "--skip-corpus" => options.skip_corpus = true,
            "--data" => {
                let path = args.next().ok_or_else(|| AppError::Configuration {
                    message: "--data requires a path argument".to_string(),
                })?;
                options.data_path = PathBuf::from(path);
            }
            other => {
                return Err(AppError::Configuration {
                    message: format!("Unknown argument: {other}"),
                });
            }
        }
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let config = AppConfig::default();
        let options = parse_args(
            ["--skip-sargas", "--data", "export.json"]
                .iter()
                .map(|s| s.to_string()),
            &config,
        )
        .unwrap();
        assert!(options.skip_sargas);
        assert!(!options.skip_corpus);
        assert_eq!(options.data_path, PathBuf::from("export.json"));

        assert!(parse_args(["--bogus".to_string()].into_iter(), &config).is_err());
    }
}
