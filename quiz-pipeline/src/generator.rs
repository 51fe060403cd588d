use std::{collections::BTreeSet, sync::Arc};

use common::{
    corpus,
    error::AppError,
    storage::{db::SurrealDbClient, types::document_chunk::DocumentChunk},
    utils::embedding::EmbeddingProvider,
};
use rand::seq::SliceRandom;
use tracing::debug;

use crate::{
    llm::ChatModel,
    prompts::{
        create_question_user_message, format_context, CHAT_TEMPERATURE, KEYWORD_SYSTEM_PROMPT,
        QUESTION_SYSTEM_PROMPT, QUESTION_TEMPERATURE,
    },
};

// Chunks sampled (with repetition) from one source per question.
const CHUNKS_PER_QUESTION: usize = 3;
// Chunks retrieved for keyword-driven questions.
const KEYWORD_TOP_K: u8 = 5;

/// A generated multiple-choice question plus the chunks it is grounded in.
#[derive(Debug, Clone)]
pub struct GeneratedQuestion {
    pub question: String,
    pub grounding: Vec<DocumentChunk>,
}

impl GeneratedQuestion {
    /// The distinct source documents behind the question.
    pub fn cited_sources(&self) -> BTreeSet<String> {
        self.grounding
            .iter()
            .map(|chunk| chunk.source.clone())
            .collect()
    }

    /// Question text followed by its citations, either as a source list or
    /// with the full page contents.
    pub fn render(&self, show_page_content: bool) -> String {
        let mut text = format!("{}\n\n", self.question);
        if show_page_content {
            text.push_str("---------- page contents\n");
            for chunk in &self.grounding {
                text.push_str(&format!("{}\n{}\n\n", chunk.source, chunk.content));
            }
            text.push_str("----------\n");
        } else {
            for source in self.cited_sources() {
                text.push_str(&format!("{source}\n"));
            }
        }
        text
    }
}

/// Drives the model to produce questions grounded in index chunks.
pub struct QuestionGenerator {
    db: Arc<SurrealDbClient>,
    model: Arc<dyn ChatModel>,
    embeddings: Arc<EmbeddingProvider>,
}

impl QuestionGenerator {
    pub fn new(
        db: Arc<SurrealDbClient>,
        model: Arc<dyn ChatModel>,
        embeddings: Arc<EmbeddingProvider>,
    ) -> Self {
        Self {
            db,
            model,
            embeddings,
        }
    }

    /// Dispatches on the user's target the way the REPL and the bot expect:
    /// an URL questions that page, a topic name questions the topic, an
    /// empty target questions anything ingested, and any other word is
    /// treated as a keyword.
    pub async fn for_target(
        &self,
        target: &str,
        doc_number: Option<usize>,
    ) -> Result<GeneratedQuestion, AppError> {
        if target.starts_with("https://") {
            return self.from_locations(&[target.to_string()]).await;
        }
        if corpus::sources_for(target).is_some() {
            return self.by_source(target).await;
        }
        if let Some(n) = doc_number {
            return self.by_index(target, n).await;
        }
        if target.is_empty() {
            return self.random().await;
        }
        self.by_keyword(target).await
    }

    /// Questions one source picked at random from the topic's list.
    pub async fn by_source(&self, topic: &str) -> Result<GeneratedQuestion, AppError> {
        let sources = corpus::sources_for(topic)
            .ok_or_else(|| AppError::NotFound(format!("Unknown topic {topic}")))?;
        let locations: Vec<String> = sources.into_iter().map(|s| s.location).collect();

        self.from_locations(&locations).await
    }

    /// Deterministic selection of the n-th source of a topic, for
    /// exhaustive sweeps over a topic's documents.
    pub async fn by_index(&self, topic: &str, n: usize) -> Result<GeneratedQuestion, AppError> {
        let sources = corpus::sources_for(topic)
            .ok_or_else(|| AppError::NotFound(format!("Unknown topic {topic}")))?;
        let source = sources.get(n).ok_or_else(|| {
            AppError::Validation(format!(
                "Source index {n} out of range for topic {topic} with {} sources",
                sources.len()
            ))
        })?;

        self.from_location(&source.location).await
    }

    /// Questions any source present in the index, picked uniformly from the
    /// ingested metadata.
    pub async fn random(&self) -> Result<GeneratedQuestion, AppError> {
        let ingested = DocumentChunk::ingested_sources(&self.db).await?;
        let location = {
            let mut rng = rand::thread_rng();
            ingested
                .choose(&mut rng)
                .cloned()
                .ok_or_else(|| AppError::NotFound("The index contains no sources".into()))?
        };

        self.from_location(&location).await
    }

    /// Expands a keyword through the model, then questions the chunks most
    /// similar to the expansion.
    pub async fn by_keyword(&self, term: &str) -> Result<GeneratedQuestion, AppError> {
        let expanded = self
            .model
            .complete(KEYWORD_SYSTEM_PROMPT, term, CHAT_TEMPERATURE)
            .await?;
        debug!(term, expanded = %expanded, "Expanded keyword for retrieval");

        let embedding = self.embeddings.embed(&expanded).await?;
        let grounding = DocumentChunk::find_similar(&embedding, KEYWORD_TOP_K, &self.db).await?;
        if grounding.is_empty() {
            return Err(AppError::NotFound(format!(
                "No chunks found for keyword {term}"
            )));
        }

        self.generate(grounding).await
    }

    /// Questions one location picked at random from an explicit list.
    pub async fn from_locations(&self, locations: &[String]) -> Result<GeneratedQuestion, AppError> {
        let location = {
            let mut rng = rand::thread_rng();
            locations
                .choose(&mut rng)
                .ok_or_else(|| AppError::Validation("Empty source list".into()))?
        };

        self.from_location(location).await
    }

    async fn from_location(&self, location: &str) -> Result<GeneratedQuestion, AppError> {
        let chunks = DocumentChunk::for_source(location, &self.db).await?;
        if chunks.is_empty() {
            return Err(AppError::NotFound(format!(
                "No chunks ingested for source {location}"
            )));
        }

        let grounding: Vec<DocumentChunk> = {
            let mut rng = rand::thread_rng();
            (0..CHUNKS_PER_QUESTION)
                .filter_map(|_| chunks.choose(&mut rng).cloned())
                .collect()
        };

        self.generate(grounding).await
    }

    async fn generate(&self, grounding: Vec<DocumentChunk>) -> Result<GeneratedQuestion, AppError> {
        let user_message = create_question_user_message(&format_context(&grounding));
        let question = self
            .model
            .complete(QUESTION_SYSTEM_PROMPT, &user_message, QUESTION_TEMPERATURE)
            .await?;

        Ok(GeneratedQuestion {
            question,
            grounding,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_chunks, setup_test_db, StubModel, TEST_DIM};

    #[tokio::test]
    async fn test_by_source_cites_exactly_one_topic_source() {
        let db = setup_test_db().await;
        let sources = corpus::sources_for("ENISA").expect("topic");
        for source in &sources {
            seed_chunks(&db, &source.location, &source.topic, 3).await;
        }

        let generator = QuestionGenerator::new(
            db,
            Arc::new(StubModel::canned("Question: which one?")),
            Arc::new(EmbeddingProvider::new_hashed(TEST_DIM)),
        );

        let question = generator.by_source("ENISA").await.expect("question");

        assert_eq!(question.question, "Question: which one?");
        assert!(!question.grounding.is_empty());

        let cited = question.cited_sources();
        assert_eq!(cited.len(), 1, "one question cites one source document");
        let registered: BTreeSet<String> =
            sources.into_iter().map(|s| s.location).collect();
        assert!(cited.iter().all(|s| registered.contains(s)));
    }

    #[tokio::test]
    async fn test_by_index_sweep_visits_every_source() {
        let db = setup_test_db().await;
        let sources = corpus::sources_for("ENISA").expect("topic");
        for source in &sources {
            seed_chunks(&db, &source.location, &source.topic, 2).await;
        }

        let generator = QuestionGenerator::new(
            db,
            Arc::new(StubModel::canned("Question: swept?")),
            Arc::new(EmbeddingProvider::new_hashed(TEST_DIM)),
        );

        let mut visited = BTreeSet::new();
        for n in 0..sources.len() {
            let question = generator.by_index("ENISA", n).await.expect("question");
            let cited = question.cited_sources();
            assert_eq!(cited.len(), 1);
            visited.extend(cited);
        }

        let registered: BTreeSet<String> = sources.into_iter().map(|s| s.location).collect();
        assert_eq!(visited, registered, "sweep must visit every source once");
    }

    #[tokio::test]
    async fn test_by_index_out_of_range() {
        let db = setup_test_db().await;
        let generator = QuestionGenerator::new(
            db,
            Arc::new(StubModel::canned("unused")),
            Arc::new(EmbeddingProvider::new_hashed(TEST_DIM)),
        );

        let result = generator.by_index("ENISA", 99).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_random_requires_ingested_sources() {
        let db = setup_test_db().await;
        let generator = QuestionGenerator::new(
            db,
            Arc::new(StubModel::canned("unused")),
            Arc::new(EmbeddingProvider::new_hashed(TEST_DIM)),
        );

        let result = generator.random().await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_random_cites_an_ingested_source() {
        let db = setup_test_db().await;
        seed_chunks(&db, "doc_a", "NIST", 2).await;
        seed_chunks(&db, "doc_b", "NIST", 2).await;

        let generator = QuestionGenerator::new(
            db,
            Arc::new(StubModel::canned("Question: random?")),
            Arc::new(EmbeddingProvider::new_hashed(TEST_DIM)),
        );

        let question = generator.random().await.expect("question");
        let cited = question.cited_sources();
        assert_eq!(cited.len(), 1);
        assert!(cited.contains("doc_a") || cited.contains("doc_b"));
    }

    #[tokio::test]
    async fn test_by_keyword_grounds_on_similar_chunks() {
        let db = setup_test_db().await;
        seed_chunks(&db, "doc_tokens", "OAUTH", 4).await;

        let model = Arc::new(StubModel::canned("access token bearer refresh"));
        let generator = QuestionGenerator::new(
            db,
            model.clone(),
            Arc::new(EmbeddingProvider::new_hashed(TEST_DIM)),
        );

        let question = generator.by_keyword("tokens").await.expect("question");

        assert!(!question.grounding.is_empty());
        assert!(question.grounding.len() <= KEYWORD_TOP_K as usize);

        // First call expands the keyword, second builds the question.
        let calls = model.calls.lock().await;
        assert_eq!(calls.len(), 2);
        assert!(calls[0].1.contains("tokens"));
    }

    #[tokio::test]
    async fn test_for_target_dispatch() {
        let db = setup_test_db().await;
        seed_chunks(&db, "https://example.org/page", "ADHOC", 2).await;

        let generator = QuestionGenerator::new(
            db,
            Arc::new(StubModel::canned("Question: from url?")),
            Arc::new(EmbeddingProvider::new_hashed(TEST_DIM)),
        );

        let question = generator
            .for_target("https://example.org/page", None)
            .await
            .expect("question");

        assert_eq!(
            question.cited_sources().into_iter().collect::<Vec<_>>(),
            vec!["https://example.org/page".to_string()]
        );
    }

    #[tokio::test]
    async fn test_render_lists_distinct_sources() {
        let db = setup_test_db().await;
        seed_chunks(&db, "doc_a", "NIST", 3).await;

        let generator = QuestionGenerator::new(
            db,
            Arc::new(StubModel::canned("Question: rendered?")),
            Arc::new(EmbeddingProvider::new_hashed(TEST_DIM)),
        );

        let question = generator.from_location("doc_a").await.expect("question");

        let plain = question.render(false);
        assert!(plain.starts_with("Question: rendered?\n\n"));
        assert_eq!(plain.matches("doc_a").count(), 1);

        let verbose = question.render(true);
        assert!(verbose.contains("---------- page contents"));
    }
}
