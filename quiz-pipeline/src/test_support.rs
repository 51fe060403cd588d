use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{db::SurrealDbClient, types::document_chunk::DocumentChunk},
    utils::embedding::EmbeddingProvider,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::llm::ChatModel;

pub const TEST_DIM: usize = 8;

pub async fn setup_test_db() -> Arc<SurrealDbClient> {
    let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
        .await
        .expect("Failed to start in-memory surrealdb");
    db.ensure_indexes(TEST_DIM).await.expect("indexes");
    Arc::new(db)
}

/// Stores `count` chunks for a source, embedded with the hashed test backend
/// so similarity queries against the same backend line up.
pub async fn seed_chunks(db: &SurrealDbClient, source: &str, topic: &str, count: usize) {
    let embeddings = EmbeddingProvider::new_hashed(TEST_DIM);
    for position in 0..count {
        let content = format!("{source} passage {position} about tokens and identity");
        let embedding = embeddings.embed(&content).await.expect("embed");
        db.store_item(DocumentChunk::new(
            source.to_string(),
            topic.to_string(),
            position,
            content,
            embedding,
        ))
        .await
        .expect("store chunk");
    }
}

/// Deterministic [`ChatModel`]: replays queued responses, falls back to a
/// fixed default, and records every call it sees.
pub struct StubModel {
    default: String,
    responses: Mutex<VecDeque<String>>,
    pub calls: Mutex<Vec<(String, String, f32)>>,
}

impl StubModel {
    pub fn canned(text: &str) -> Self {
        Self {
            default: text.to_string(),
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_responses(responses: &[&str]) -> Self {
        Self {
            default: "stub response".to_string(),
            responses: Mutex::new(responses.iter().map(|r| (*r).to_string()).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatModel for StubModel {
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
        temperature: f32,
    ) -> Result<String, AppError> {
        self.calls.lock().await.push((
            system_prompt.to_string(),
            user_message.to_string(),
            temperature,
        ));

        let mut responses = self.responses.lock().await;
        Ok(responses.pop_front().unwrap_or_else(|| self.default.clone()))
    }
}
