use std::sync::Arc;

use axum::{
    extract::{Form, State},
    http::StatusCode,
};
use common::{error::AppError, storage::types::document_chunk::DocumentChunk};
use ingestion_pipeline::adhoc_index_from_url;
use quiz_pipeline::{AnswerGenerator, GeneratedAnswer};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use crate::{
    slack::{extract_url, plain_section_blocks},
    state::BotState,
};

// Interaction payloads arrive form-encoded with the JSON in one field.
#[derive(Deserialize)]
pub struct InteractionForm {
    payload: String,
}

/// Interactivity endpoint: the "Answer" button under a posted question.
pub async fn slack_interactions(
    State(state): State<BotState>,
    Form(form): Form<InteractionForm>,
) -> StatusCode {
    match serde_json::from_str::<Value>(&form.payload) {
        Ok(payload) => {
            if let Err(e) = handle_interaction(&state, &payload).await {
                error!("Failed to handle interaction: {e}");
            }
        }
        Err(e) => error!("Malformed interaction payload: {e}"),
    }

    StatusCode::OK
}

async fn handle_interaction(state: &BotState, payload: &Value) -> Result<(), AppError> {
    let action_id = payload
        .get("actions")
        .and_then(|actions| actions.get(0))
        .and_then(|action| action.get("action_id"))
        .and_then(Value::as_str);
    if action_id != Some("answer_question") {
        return Ok(());
    }

    let channel = payload
        .get("channel")
        .and_then(|channel| channel.get("id"))
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Validation("Interaction payload missing channel".into()))?;
    let message = payload
        .get("message")
        .ok_or_else(|| AppError::Validation("Interaction payload missing message".into()))?;
    let ts = message
        .get("ts")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Validation("Interaction payload missing ts".into()))?;
    let question = question_text(message)
        .ok_or_else(|| AppError::Validation("Interaction payload missing question text".into()))?;

    info!(channel, ts, "Answering question via button");

    // Drop the button now that the question is being answered.
    state
        .slack
        .update_message(channel, ts, question, plain_section_blocks(question))
        .await?;

    let answer = answer_for_question(state, question).await?;

    state
        .slack
        .post_message(channel, &answer.render(), None, Some(ts))
        .await
}

fn question_text(message: &Value) -> Option<&str> {
    message
        .get("blocks")
        .and_then(|blocks| blocks.get(0))
        .and_then(|block| block.get("text"))
        .and_then(|text| text.get("text"))
        .and_then(Value::as_str)
        .or_else(|| message.get("text").and_then(Value::as_str))
}

/// Questions drawn from an ad-hoc page are answered from an ad-hoc index of
/// the same page; everything else is answered from the durable index.
async fn answer_for_question(
    state: &BotState,
    question: &str,
) -> Result<GeneratedAnswer, AppError> {
    if let Some(url) = extract_url(question) {
        let ingested = DocumentChunk::ingested_sources(&state.db).await?;
        if !ingested.contains(&url) {
            let adhoc = Arc::new(
                adhoc_index_from_url(&url, &state.embeddings, &state.config).await?,
            );
            let answers = AnswerGenerator::new(
                adhoc,
                Arc::clone(&state.model),
                Arc::clone(&state.embeddings),
                &state.config,
            );
            return answers.answer(question).await;
        }
    }

    let answers = AnswerGenerator::new(
        Arc::clone(&state.db),
        Arc::clone(&state.model),
        Arc::clone(&state.embeddings),
        &state.config,
    );
    answers.answer(question).await
}
