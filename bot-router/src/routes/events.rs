use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::{error::AppError, storage::types::document_chunk::DocumentChunk};
use ingestion_pipeline::adhoc_index_from_url;
use quiz_pipeline::{
    AnswerGenerator, ChatLog, ConversationChain, GeneratedQuestion, QuestionGenerator, TurnRole,
};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::{
    slack::{extract_url, question_blocks, strip_mention, SlackMessage},
    state::BotState,
};

/// Event subscription endpoint: answers the URL-verification challenge and
/// handles mentions. A failing event is logged and dropped so one bad event
/// cannot take the server down.
pub async fn slack_events(State(state): State<BotState>, Json(payload): Json<Value>) -> Response {
    match payload.get("type").and_then(Value::as_str) {
        Some("url_verification") => {
            let challenge = payload
                .get("challenge")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Json(json!({ "challenge": challenge })).into_response()
        }
        Some("event_callback") => {
            if let Some(event) = payload.get("event") {
                if event.get("type").and_then(Value::as_str) == Some("app_mention") {
                    if let Err(e) = handle_mention(&state, event).await {
                        error!("Failed to handle mention event: {e}");
                    }
                }
            }
            StatusCode::OK.into_response()
        }
        _ => StatusCode::OK.into_response(),
    }
}

async fn handle_mention(state: &BotState, event: &Value) -> Result<(), AppError> {
    let channel = event
        .get("channel")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Validation("Mention event missing channel".into()))?;
    let text = event.get("text").and_then(Value::as_str).unwrap_or_default();

    match event.get("thread_ts").and_then(Value::as_str) {
        None => post_question(state, channel, text).await,
        Some(thread_ts) => answer_follow_up(state, channel, thread_ts).await,
    }
}

/// A mention outside a thread asks for a fresh question.
async fn post_question(state: &BotState, channel: &str, text: &str) -> Result<(), AppError> {
    let target = strip_mention(text, &state.config.slack_bot_user_id);
    info!(channel, topic = %target, "Generating question for mention");

    let question = question_for_message(state, &target).await?;
    let rendered = question.render(false);

    state
        .slack
        .post_message(channel, &rendered, Some(question_blocks(&rendered)), None)
        .await
}

/// A mention naming a page that is not in the durable index gets an ad-hoc
/// index built from that page; everything else questions the main index.
async fn question_for_message(
    state: &BotState,
    target: &str,
) -> Result<GeneratedQuestion, AppError> {
    if let Some(url) = extract_url(target) {
        let ingested = DocumentChunk::ingested_sources(&state.db).await?;
        if !ingested.contains(&url) {
            let adhoc = Arc::new(
                adhoc_index_from_url(&url, &state.embeddings, &state.config).await?,
            );
            let generator = QuestionGenerator::new(
                adhoc,
                Arc::clone(&state.model),
                Arc::clone(&state.embeddings),
            );
            return generator.from_locations(&[url]).await;
        }
    }

    let generator = QuestionGenerator::new(
        Arc::clone(&state.db),
        Arc::clone(&state.model),
        Arc::clone(&state.embeddings),
    );
    generator.for_target(target, None).await
}

/// A mention inside a thread is a follow-up on the running conversation.
async fn answer_follow_up(
    state: &BotState,
    channel: &str,
    thread_ts: &str,
) -> Result<(), AppError> {
    let replies = state.slack.replies(channel, thread_ts).await?;

    // Only threads rooted at one of our own messages are conversations.
    let Some(root) = replies.first() else {
        return Ok(());
    };
    let bot_user_id = &state.config.slack_bot_user_id;
    if root.bot_id.is_none() && root.user.as_deref() != Some(bot_user_id.as_str()) {
        return Ok(());
    }

    let (log, query) = chat_log_from_replies(&replies, bot_user_id);
    let Some(query) = query else {
        return Ok(());
    };
    let query = strip_mention(&query, bot_user_id);

    let answers = AnswerGenerator::new(
        Arc::clone(&state.db),
        Arc::clone(&state.model),
        Arc::clone(&state.embeddings),
        &state.config,
    );
    let chain = ConversationChain::new(answers, Arc::clone(&state.model));
    let result = chain.follow_up(&log, &query).await?;

    state
        .slack
        .post_message(channel, &result.render(), None, Some(thread_ts))
        .await
}

/// Rebuilds the conversation log from thread replies. The newest user
/// message becomes the follow-up query; everything before it is history.
pub(crate) fn chat_log_from_replies(
    replies: &[SlackMessage],
    bot_user_id: &str,
) -> (ChatLog, Option<String>) {
    let mut turns: Vec<(TurnRole, String)> = replies
        .iter()
        .filter_map(|message| {
            let text = message.text.clone()?;
            let role = if message.bot_id.is_some()
                || message.user.as_deref() == Some(bot_user_id)
            {
                TurnRole::Assistant
            } else {
                TurnRole::User
            };
            Some((role, text))
        })
        .collect();

    let query = if matches!(turns.last(), Some((TurnRole::User, _))) {
        turns.pop().map(|(_, text)| text)
    } else {
        None
    };

    let mut log = ChatLog::new();
    for (role, text) in turns {
        log.push(role, text);
    }

    (log, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bot_routes, slack::SlackClient};
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use common::{
        storage::db::SurrealDbClient,
        utils::{config::AppConfig, embedding::EmbeddingProvider},
    };
    use quiz_pipeline::ChatModel;
    use tower::ServiceExt;
    use uuid::Uuid;

    struct SilentModel;

    #[async_trait]
    impl ChatModel for SilentModel {
        async fn complete(
            &self,
            _system_prompt: &str,
            _user_message: &str,
            _temperature: f32,
        ) -> Result<String, AppError> {
            Ok("stub".to_string())
        }
    }

    async fn test_state() -> BotState {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");

        BotState {
            db: Arc::new(db),
            model: Arc::new(SilentModel),
            embeddings: Arc::new(EmbeddingProvider::new_hashed(8)),
            slack: SlackClient::new("test-token").expect("slack client"),
            config: AppConfig::default(),
        }
    }

    fn message(user: Option<&str>, bot_id: Option<&str>, text: &str) -> SlackMessage {
        SlackMessage {
            user: user.map(str::to_string),
            bot_id: bot_id.map(str::to_string),
            text: Some(text.to_string()),
            ts: Some("1234.5678".to_string()),
        }
    }

    #[tokio::test]
    async fn test_url_verification_echoes_challenge() {
        let app = bot_routes().with_state(test_state().await);

        let request = Request::builder()
            .method("POST")
            .uri("/slack/events")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&json!({
                    "type": "url_verification",
                    "challenge": "challenge-token"
                }))
                .expect("serialize"),
            ))
            .expect("request");

        let response = app.oneshot(request).await.expect("router response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value: Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(value["challenge"], "challenge-token");
    }

    #[tokio::test]
    async fn test_unknown_event_types_are_acknowledged() {
        let app = bot_routes().with_state(test_state().await);

        let request = Request::builder()
            .method("POST")
            .uri("/slack/events")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&json!({"type": "app_rate_limited"})).expect("serialize"),
            ))
            .expect("request");

        let response = app.oneshot(request).await.expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_chat_log_from_replies_roles_and_query() {
        let replies = vec![
            message(Some("U_BOT"), Some("B1"), "Question: which flow?"),
            message(Some("U_HUMAN"), None, "is PKCE required?"),
            message(Some("U_BOT"), Some("B1"), "Yes, for public clients."),
            message(Some("U_HUMAN"), None, "what about confidential clients?"),
        ];

        let (log, query) = chat_log_from_replies(&replies, "U_BOT");

        assert_eq!(query.as_deref(), Some("what about confidential clients?"));
        assert_eq!(log.len(), 3);
        assert_eq!(log.turns()[0].role, TurnRole::Assistant);
        assert_eq!(log.turns()[1].role, TurnRole::User);
        assert_eq!(log.turns()[2].role, TurnRole::Assistant);
    }

    #[test]
    fn test_chat_log_from_replies_without_trailing_user_turn() {
        let replies = vec![message(Some("U_BOT"), Some("B1"), "Question: which flow?")];

        let (log, query) = chat_log_from_replies(&replies, "U_BOT");

        assert!(query.is_none());
        assert_eq!(log.len(), 1);
    }
}
