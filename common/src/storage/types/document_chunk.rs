use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};
use uuid::Uuid;

stored_object!(DocumentChunk, "document_chunk", {
    source: String,
    topic: String,
    position: usize,
    content: String,
    embedding: Vec<f32>
});

impl DocumentChunk {
    pub fn new(
        source: String,
        topic: String,
        position: usize,
        content: String,
        embedding: Vec<f32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            source,
            topic,
            position,
            content,
            embedding,
        }
    }

    /// All chunks of one source document, in document order.
    pub async fn for_source(
        source: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let chunks: Vec<Self> = db
            .client
            .query("SELECT * FROM type::table($table_name) WHERE source = $source ORDER BY position")
            .bind(("table_name", Self::table_name()))
            .bind(("source", source.to_string()))
            .await?
            .take(0)?;

        Ok(chunks)
    }

    /// The distinct source identifiers present in the index. Re-run
    /// detection during ingestion is an exact string match against these.
    pub async fn ingested_sources(db: &SurrealDbClient) -> Result<Vec<String>, AppError> {
        #[derive(serde::Deserialize)]
        struct SourceRow {
            source: String,
        }

        let rows: Vec<SourceRow> = db
            .client
            .query("SELECT source FROM type::table($table_name) GROUP BY source")
            .bind(("table_name", Self::table_name()))
            .await?
            .take(0)?;

        Ok(rows.into_iter().map(|row| row.source).collect())
    }

    pub async fn count(db: &SurrealDbClient) -> Result<usize, AppError> {
        #[derive(serde::Deserialize)]
        struct CountRow {
            count: usize,
        }

        let rows: Vec<CountRow> = db
            .client
            .query("SELECT count() FROM type::table($table_name) GROUP ALL")
            .bind(("table_name", Self::table_name()))
            .await?
            .take(0)?;

        Ok(rows.first().map(|row| row.count).unwrap_or(0))
    }

    /// KNN search over the chunk embeddings, nearest first. Requires the
    /// HNSW index from `ensure_indexes` with a matching dimension.
    pub async fn find_similar(
        embedding: &[f32],
        take: u8,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let closest_query = format!(
            "SELECT *, vector::distance::knn() AS distance FROM {} WHERE embedding <|{},40|> {:?} ORDER BY distance",
            Self::table_name(),
            take,
            embedding
        );

        let closest: Vec<Self> = db.client.query(closest_query).await?.take(0)?;

        Ok(closest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, position: usize, content: &str, embedding: Vec<f32>) -> DocumentChunk {
        DocumentChunk::new(
            source.to_string(),
            "NIST".to_string(),
            position,
            content.to_string(),
            embedding,
        )
    }

    #[tokio::test]
    async fn test_document_chunk_creation() {
        let chunk = chunk("./pdf_docs/a.pdf", 2, "Digital identity guidelines", vec![0.1, 0.2, 0.3]);

        assert_eq!(chunk.source, "./pdf_docs/a.pdf");
        assert_eq!(chunk.topic, "NIST");
        assert_eq!(chunk.position, 2);
        assert_eq!(chunk.content, "Digital identity guidelines");
        assert!(!chunk.id.is_empty());
    }

    #[tokio::test]
    async fn test_for_source_returns_ordered_chunks() {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");

        db.store_item(chunk("doc_a", 1, "second part", vec![0.0, 1.0, 0.0]))
            .await
            .expect("store");
        db.store_item(chunk("doc_a", 0, "first part", vec![1.0, 0.0, 0.0]))
            .await
            .expect("store");
        db.store_item(chunk("doc_b", 0, "other doc", vec![0.0, 0.0, 1.0]))
            .await
            .expect("store");

        let chunks = DocumentChunk::for_source("doc_a", &db)
            .await
            .expect("query failed");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].position, 0);
        assert_eq!(chunks[1].position, 1);
        assert!(chunks.iter().all(|c| c.source == "doc_a"));
    }

    #[tokio::test]
    async fn test_ingested_sources_are_distinct() {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");

        for position in 0..3 {
            db.store_item(chunk("doc_a", position, "text", vec![1.0, 0.0, 0.0]))
                .await
                .expect("store");
        }
        db.store_item(chunk("doc_b", 0, "text", vec![0.0, 1.0, 0.0]))
            .await
            .expect("store");

        let mut sources = DocumentChunk::ingested_sources(&db).await.expect("query");
        sources.sort();

        assert_eq!(sources, vec!["doc_a".to_string(), "doc_b".to_string()]);
    }

    #[tokio::test]
    async fn test_count_empty_and_filled() {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");

        assert_eq!(DocumentChunk::count(&db).await.expect("count"), 0);

        db.store_item(chunk("doc_a", 0, "text", vec![1.0, 0.0, 0.0]))
            .await
            .expect("store");

        assert_eq!(DocumentChunk::count(&db).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn test_find_similar_orders_by_distance() {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");
        db.ensure_indexes(3).await.expect("indexes");

        db.store_item(chunk("doc_near", 0, "near", vec![0.9, 0.1, 0.0]))
            .await
            .expect("store");
        db.store_item(chunk("doc_far", 0, "far", vec![0.0, 0.1, 0.9]))
            .await
            .expect("store");

        let results = DocumentChunk::find_similar(&[1.0, 0.0, 0.0], 2, &db)
            .await
            .expect("knn query");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, "doc_near");
        assert_eq!(results[1].source, "doc_far");
    }
}
