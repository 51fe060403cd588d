use std::sync::Arc;

use axum::Router;
use bot_router::{bot_routes, slack::SlackClient, BotState};
use common::{
    corpus,
    storage::db::SurrealDbClient,
    utils::{config::get_config, embedding::EmbeddingProvider},
};
use ingestion_pipeline::IngestionPipeline;
use quiz_pipeline::{ChatModel, OpenAiChatModel};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;

    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));
    let embeddings = Arc::new(EmbeddingProvider::new_openai(
        Arc::clone(&openai_client),
        &config,
    ));
    let model: Arc<dyn ChatModel> = Arc::new(OpenAiChatModel::new(
        openai_client,
        config.chat_model.clone(),
    ));

    let db = Arc::new(
        SurrealDbClient::new(
            &config.index_address,
            &config.index_namespace,
            &config.index_database,
        )
        .await?,
    );
    db.ensure_indexes(embeddings.dimension()).await?;

    // Fill the durable index before accepting events.
    let pipeline = IngestionPipeline::new(Arc::clone(&db), Arc::clone(&embeddings), config.clone());
    pipeline.ensure_sources(&corpus::all_sources()).await?;

    let slack = SlackClient::new(config.slack_bot_token.clone())?;
    let state = BotState {
        db,
        model,
        embeddings,
        slack,
        config: config.clone(),
    };

    let app = Router::new().merge(bot_routes()).with_state(state);

    info!("Starting bot listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
