use std::time::Duration;

use common::error::AppError;
use serde::Deserialize;
use serde_json::{json, Value};

const SLACK_API_BASE: &str = "https://slack.com/api";

/// Thin client for the chat platform's Web API.
#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

/// One message of a thread, as returned by `conversations.replies`.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackMessage {
    pub user: Option<String>,
    pub bot_id: Option<String>,
    pub text: Option<String>,
    pub ts: Option<String>,
}

impl SlackClient {
    pub fn new(token: impl Into<String>) -> Result<Self, AppError> {
        let http = reqwest::ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            token: token.into(),
            base_url: SLACK_API_BASE.to_string(),
        })
    }

    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        blocks: Option<Value>,
        thread_ts: Option<&str>,
    ) -> Result<(), AppError> {
        let mut payload = json!({
            "channel": channel,
            "text": text,
        });
        if let Some(blocks) = blocks {
            payload["blocks"] = blocks;
        }
        if let Some(thread_ts) = thread_ts {
            payload["thread_ts"] = json!(thread_ts);
        }

        self.call("chat.postMessage", payload).await?;
        Ok(())
    }

    pub async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
        blocks: Value,
    ) -> Result<(), AppError> {
        let payload = json!({
            "channel": channel,
            "ts": ts,
            "text": text,
            "blocks": blocks,
        });

        self.call("chat.update", payload).await?;
        Ok(())
    }

    pub async fn replies(
        &self,
        channel: &str,
        thread_ts: &str,
    ) -> Result<Vec<SlackMessage>, AppError> {
        let response = self
            .http
            .get(format!("{}/conversations.replies", self.base_url))
            .bearer_auth(&self.token)
            .query(&[("channel", channel), ("ts", thread_ts)])
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        ensure_slack_ok("conversations.replies", &response)?;

        let messages = response
            .get("messages")
            .cloned()
            .unwrap_or_else(|| json!([]));
        serde_json::from_value(messages)
            .map_err(|e| AppError::LLMParsing(format!("Malformed thread replies: {e}")))
    }

    async fn call(&self, method: &str, payload: Value) -> Result<Value, AppError> {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        ensure_slack_ok(method, &response)?;

        Ok(response)
    }
}

fn ensure_slack_ok(method: &str, response: &Value) -> Result<(), AppError> {
    if response.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        return Ok(());
    }
    let error = response
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    Err(AppError::InternalError(format!(
        "Slack API {method} failed: {error}"
    )))
}

/// Block Kit section carrying a question with its "Answer" button.
pub fn question_blocks(question: &str) -> Value {
    json!([
        {
            "type": "section",
            "text": {"type": "mrkdwn", "text": question},
            "accessory": {
                "type": "button",
                "text": {"type": "plain_text", "text": "Answer"},
                "action_id": "answer_question"
            }
        }
    ])
}

/// The same section without the button, used once the question is answered.
pub fn plain_section_blocks(text: &str) -> Value {
    json!([
        {
            "type": "section",
            "text": {"type": "mrkdwn", "text": text},
        }
    ])
}

/// First URL mentioned in a message. The platform wraps links in angle
/// brackets, so those are stripped.
pub fn extract_url(text: &str) -> Option<String> {
    text.split_whitespace().find_map(|token| {
        let trimmed = token
            .trim_start_matches('<')
            .trim_end_matches('>')
            .trim_end_matches('|');
        (trimmed.starts_with("https://") || trimmed.starts_with("http://"))
            .then(|| trimmed.to_string())
    })
}

/// Removes the bot's own mention tag from a message.
pub fn strip_mention(text: &str, bot_user_id: &str) -> String {
    text.replace(&format!("<@{bot_user_id}>"), "")
        .trim()
        .to_string()
}
