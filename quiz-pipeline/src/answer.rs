use std::{collections::BTreeSet, sync::Arc};

use common::{
    error::AppError,
    storage::{db::SurrealDbClient, types::document_chunk::DocumentChunk},
    utils::{config::AppConfig, embedding::EmbeddingProvider, tokens::count_tokens},
};

use crate::{
    llm::ChatModel,
    prompts::{create_answer_user_message, format_context, ANSWER_SYSTEM_PROMPT, ANSWER_TEMPERATURE},
};

/// A justified answer plus the chunks it is grounded in.
#[derive(Debug, Clone)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub grounding: Vec<DocumentChunk>,
}

impl GeneratedAnswer {
    pub fn cited_sources(&self) -> BTreeSet<String> {
        self.grounding
            .iter()
            .map(|chunk| chunk.source.clone())
            .collect()
    }

    pub fn render(&self) -> String {
        let mut text = format!("{}\n\n", self.answer);
        for source in self.cited_sources() {
            text.push_str(&format!("{source}\n"));
        }
        text
    }
}

/// Answers a posed question from chunks retrieved out of the index.
#[derive(Clone)]
pub struct AnswerGenerator {
    db: Arc<SurrealDbClient>,
    model: Arc<dyn ChatModel>,
    embeddings: Arc<EmbeddingProvider>,
    top_k: u8,
    max_context_tokens: usize,
}

impl AnswerGenerator {
    pub fn new(
        db: Arc<SurrealDbClient>,
        model: Arc<dyn ChatModel>,
        embeddings: Arc<EmbeddingProvider>,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            model,
            embeddings,
            top_k: config.answer_top_k,
            max_context_tokens: config.max_context_tokens,
        }
    }

    pub async fn answer(&self, question: &str) -> Result<GeneratedAnswer, AppError> {
        let grounding = self.retrieve(question).await?;
        let user_message = create_answer_user_message(&format_context(&grounding), question);
        let answer = self
            .model
            .complete(ANSWER_SYSTEM_PROMPT, &user_message, ANSWER_TEMPERATURE)
            .await?;

        Ok(GeneratedAnswer { answer, grounding })
    }

    /// Retrieves the chunks most similar to the query, trimmed to the token
    /// budget. Also used by the conversational chain.
    pub(crate) async fn retrieve(&self, query: &str) -> Result<Vec<DocumentChunk>, AppError> {
        let embedding = self.embeddings.embed(query).await?;
        let chunks = DocumentChunk::find_similar(&embedding, self.top_k, &self.db).await?;

        Ok(reduce_below_token_limit(chunks, self.max_context_tokens))
    }
}

/// Drops trailing chunks until the total token count fits the budget. The
/// nearest chunk is always kept so answers stay grounded.
fn reduce_below_token_limit(chunks: Vec<DocumentChunk>, limit: usize) -> Vec<DocumentChunk> {
    let token_counts: Vec<usize> = chunks
        .iter()
        .map(|chunk| count_tokens(&chunk.content))
        .collect();

    let mut keep = chunks.len();
    let mut total: usize = token_counts.iter().sum();
    while keep > 1 && total > limit {
        keep -= 1;
        total -= token_counts[keep];
    }

    let mut chunks = chunks;
    chunks.truncate(keep);
    chunks
}
