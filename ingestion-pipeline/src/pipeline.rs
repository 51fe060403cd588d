use std::{collections::HashSet, path::Path, sync::Arc};

use common::{
    corpus::Source,
    error::AppError,
    storage::{db::SurrealDbClient, types::document_chunk::DocumentChunk},
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};
use text_splitter::{ChunkConfig, TextSplitter};
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::utils::{
    pdf_text_extraction::extract_pdf_text, url_text_retrieval::extract_text_from_url,
};

// Ad-hoc indexes repeat tiny chunk lists so random sampling has variety.
const MIN_ADHOC_CHUNKS: usize = 4;
const ADHOC_TOPIC: &str = "ADHOC";

/// Fills the durable index with chunks for every registered source.
pub struct IngestionPipeline {
    db: Arc<SurrealDbClient>,
    embeddings: Arc<EmbeddingProvider>,
    config: AppConfig,
}

impl IngestionPipeline {
    pub fn new(
        db: Arc<SurrealDbClient>,
        embeddings: Arc<EmbeddingProvider>,
        config: AppConfig,
    ) -> Self {
        Self {
            db,
            embeddings,
            config,
        }
    }

    /// Ensures the index contains chunks for every given source. Sources
    /// already present (exact source-identifier match) are skipped, so
    /// re-running over an ingested list is a no-op. Unreadable sources are
    /// logged and skipped. Returns the number of newly ingested sources.
    pub async fn ensure_sources(&self, sources: &[Source]) -> Result<usize, AppError> {
        let existing: HashSet<String> = DocumentChunk::ingested_sources(&self.db)
            .await?
            .into_iter()
            .collect();

        let pending: Vec<&Source> = sources
            .iter()
            .filter(|source| !existing.contains(&source.location))
            .collect();

        if pending.is_empty() {
            debug!("All {} sources already ingested", sources.len());
            return Ok(0);
        }

        info!("Ingesting {} new sources", pending.len());

        let mut ingested = 0;
        for source in pending {
            match self.ingest_source(source).await {
                Ok(chunk_count) => {
                    info!(
                        source = %source.location,
                        chunks = chunk_count,
                        "Ingested source"
                    );
                    ingested += 1;
                }
                Err(e) => {
                    warn!(
                        source = %source.location,
                        error = %e,
                        "Skipping unreadable source"
                    );
                }
            }
        }

        Ok(ingested)
    }

    async fn ingest_source(&self, source: &Source) -> Result<usize, AppError> {
        let text = load_source_text(&source.location).await?;
        let chunks = prepare_chunks(
            &text,
            self.config.chunk_size,
            self.config.chunk_overlap,
            &self.config.chunk_separator,
        )?;

        store_chunks(
            &self.db,
            &self.embeddings,
            &source.topic,
            &source.location,
            chunks,
        )
        .await
    }
}

/// Builds a throwaway in-memory index from ad-hoc text (the `--stdin` mode).
pub async fn adhoc_index_from_text(
    text: &str,
    label: &str,
    embeddings: &EmbeddingProvider,
    config: &AppConfig,
) -> Result<SurrealDbClient, AppError> {
    let db = SurrealDbClient::memory("quizdrill", &Uuid::new_v4().to_string()).await?;
    db.ensure_indexes(embeddings.dimension()).await?;

    let mut chunks = prepare_chunks(
        text,
        config.chunk_size,
        config.chunk_overlap,
        &config.chunk_separator,
    )?;
    if chunks.len() < MIN_ADHOC_CHUNKS {
        chunks = chunks
            .iter()
            .cloned()
            .cycle()
            .take(chunks.len() * MIN_ADHOC_CHUNKS)
            .collect();
    }

    store_chunks(&db, embeddings, ADHOC_TOPIC, label, chunks).await?;

    Ok(db)
}

/// Builds a throwaway in-memory index from a single page (the `--url` mode
/// and the bot's ad-hoc URL questions).
pub async fn adhoc_index_from_url(
    url: &str,
    embeddings: &EmbeddingProvider,
    config: &AppConfig,
) -> Result<SurrealDbClient, AppError> {
    let text = extract_text_from_url(url).await?;
    adhoc_index_from_text(&text, url, embeddings, config).await
}

async fn load_source_text(location: &str) -> Result<String, AppError> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return extract_text_from_url(location).await;
    }

    let path = Path::new(location);
    if !path.is_file() {
        return Err(AppError::NotFound(format!(
            "Source file {location} does not exist"
        )));
    }

    if location.ends_with(".pdf") {
        extract_pdf_text(path).await
    } else {
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

async fn store_chunks(
    db: &SurrealDbClient,
    embeddings: &EmbeddingProvider,
    topic: &str,
    location: &str,
    chunks: Vec<String>,
) -> Result<usize, AppError> {
    let retry_strategy = ExponentialBackoff::from_millis(100).map(jitter).take(3);
    let vectors = Retry::spawn(retry_strategy, || embeddings.embed_batch(chunks.clone())).await?;

    let stored = chunks.len();
    for (position, (content, embedding)) in chunks.into_iter().zip(vectors).enumerate() {
        db.store_item(DocumentChunk::new(
            location.to_string(),
            topic.to_string(),
            position,
            content,
            embedding,
        ))
        .await?;
    }

    Ok(stored)
}

/// Splits text into chunks of at most `chunk_size` characters overlapping by
/// `chunk_overlap`. Occurrences of the configured separator are widened to
/// paragraph breaks first so the splitter prefers them as boundaries.
pub fn prepare_chunks(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separator: &str,
) -> Result<Vec<String>, AppError> {
    if chunk_size == 0 {
        return Err(AppError::Validation("chunk_size must be positive".into()));
    }
    if chunk_overlap >= chunk_size {
        return Err(AppError::Validation(format!(
            "chunk_overlap of {chunk_overlap} must be smaller than chunk_size of {chunk_size}"
        )));
    }

    let normalized = if separator.is_empty() || separator == "\n\n" {
        text.to_owned()
    } else {
        text.replace(separator, "\n\n")
    };

    let chunk_config = ChunkConfig::new(chunk_size)
        .with_overlap(chunk_overlap)
        .map_err(|e| AppError::Validation(format!("invalid chunk overlap: {e}")))?
        .with_trim(false);
    let splitter = TextSplitter::new(chunk_config);

    let mut chunks: Vec<String> = splitter.chunks(&normalized).map(str::to_owned).collect();

    if chunks.is_empty() {
        chunks.push(String::new());
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_DIM: usize = 8;

    async fn setup_test_db() -> Arc<SurrealDbClient> {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");
        db.ensure_indexes(TEST_DIM).await.expect("indexes");
        Arc::new(db)
    }

    fn test_config() -> AppConfig {
        AppConfig {
            chunk_size: 200,
            chunk_overlap: 0,
            ..Default::default()
        }
    }

    async fn write_temp_source(name: &str, content: &str) -> String {
        let dir = std::env::temp_dir().join(format!("quizdrill_ingest_{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir)
            .await
            .expect("failed to create temp dir");
        let path = dir.join(name);
        tokio::fs::write(&path, content)
            .await
            .expect("failed to write temp source");
        path.to_string_lossy().into_owned()
    }

    /// 3000 characters of non-repeating text, so every chunk has a unique
    /// position in the original.
    fn unique_text() -> String {
        (0..600).map(|i| format!("w{i:03} ")).collect()
    }

    #[test]
    fn test_prepare_chunks_overlap_covers_input() {
        let text = unique_text();
        assert_eq!(text.len(), 3000);
        let chunks = prepare_chunks(&text, 1000, 500, "\n").expect("chunking failed");

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 1000));

        // Walk the chunks and confirm their union covers the whole text.
        let mut covered_until = 0;
        for chunk in &chunks {
            let start = text.find(chunk.as_str()).expect("chunk not in original");
            assert!(start <= covered_until, "gap in chunk coverage");
            covered_until = covered_until.max(start + chunk.len());
        }
        assert_eq!(covered_until, text.len());
    }

    #[test]
    fn test_prepare_chunks_consecutive_chunks_overlap() {
        let text = unique_text();
        let chunks = prepare_chunks(&text, 1000, 500, "\n").expect("chunking failed");

        for pair in chunks.windows(2) {
            let prev_start = text.find(pair[0].as_str()).expect("chunk not in original");
            let next_start = text.find(pair[1].as_str()).expect("chunk not in original");
            assert!(
                next_start < prev_start + pair[0].len(),
                "consecutive chunks do not overlap"
            );
        }
    }

    #[test]
    fn test_prepare_chunks_normalizes_separator() {
        let text = format!("{}|{}", "a".repeat(40), "b".repeat(40));
        let chunks = prepare_chunks(&text, 50, 0, "|").expect("chunking failed");

        assert!(chunks.iter().all(|c| !c.contains('|')));
        assert!(chunks.concat().contains(&"a".repeat(40)));
        assert!(chunks.concat().contains(&"b".repeat(40)));
    }

    #[test]
    fn test_prepare_chunks_rejects_bad_bounds() {
        assert!(prepare_chunks("text", 0, 0, "\n").is_err());
        assert!(prepare_chunks("text", 100, 100, "\n").is_err());
    }

    #[test]
    fn test_prepare_chunks_empty_input() {
        let chunks = prepare_chunks("", 100, 0, "\n").expect("chunking failed");
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_sources_ingests_and_skips_on_rerun() {
        let db = setup_test_db().await;
        let embeddings = Arc::new(EmbeddingProvider::new_hashed(TEST_DIM));
        let pipeline = IngestionPipeline::new(db.clone(), embeddings, test_config());

        let location_a =
            write_temp_source("a.txt", &"OAuth access tokens expire. ".repeat(30)).await;
        let location_b =
            write_temp_source("b.txt", &"Identity proofing has levels. ".repeat(30)).await;
        let sources = vec![
            Source::new("OAUTH", location_a.clone()),
            Source::new("NIST", location_b.clone()),
        ];

        let ingested = pipeline.ensure_sources(&sources).await.expect("ingest");
        assert_eq!(ingested, 2);

        let count_after_first = DocumentChunk::count(&db).await.expect("count");
        assert!(count_after_first > 0);

        let mut ingested_sources = DocumentChunk::ingested_sources(&db).await.expect("sources");
        ingested_sources.sort();
        let mut expected = vec![location_a, location_b];
        expected.sort();
        assert_eq!(ingested_sources, expected);

        // Re-ingesting the same list must be a no-op.
        let ingested_again = pipeline.ensure_sources(&sources).await.expect("re-ingest");
        assert_eq!(ingested_again, 0);
        assert_eq!(
            DocumentChunk::count(&db).await.expect("count"),
            count_after_first
        );
    }

    #[tokio::test]
    async fn test_ensure_sources_skips_unreadable_source() {
        let db = setup_test_db().await;
        let embeddings = Arc::new(EmbeddingProvider::new_hashed(TEST_DIM));
        let pipeline = IngestionPipeline::new(db.clone(), embeddings, test_config());

        let good = write_temp_source("good.txt", &"Readable content here. ".repeat(20)).await;
        let sources = vec![
            Source::new("NIST", "./missing/nowhere.pdf"),
            Source::new("NIST", good.clone()),
        ];

        let ingested = pipeline.ensure_sources(&sources).await.expect("ingest");
        assert_eq!(ingested, 1);

        let ingested_sources = DocumentChunk::ingested_sources(&db).await.expect("sources");
        assert_eq!(ingested_sources, vec![good]);
    }

    #[tokio::test]
    async fn test_adhoc_index_pads_small_inputs() {
        let embeddings = EmbeddingProvider::new_hashed(TEST_DIM);
        let db = adhoc_index_from_text(
            "A single short passage about DPoP.",
            "stdin",
            &embeddings,
            &test_config(),
        )
        .await
        .expect("adhoc index");

        let count = DocumentChunk::count(&db).await.expect("count");
        assert!(count >= MIN_ADHOC_CHUNKS);

        let sources = DocumentChunk::ingested_sources(&db).await.expect("sources");
        assert_eq!(sources, vec!["stdin".to_string()]);
    }
}
