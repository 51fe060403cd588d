use std::sync::Arc;

use common::{
    storage::db::SurrealDbClient,
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};
use quiz_pipeline::ChatModel;

use crate::slack::SlackClient;

#[derive(Clone)]
pub struct BotState {
    pub db: Arc<SurrealDbClient>,
    pub model: Arc<dyn ChatModel>,
    pub embeddings: Arc<EmbeddingProvider>,
    pub slack: SlackClient,
    pub config: AppConfig,
}
