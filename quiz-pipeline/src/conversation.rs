use std::{fmt, sync::Arc};

use common::error::AppError;

use crate::{
    answer::{AnswerGenerator, GeneratedAnswer},
    llm::ChatModel,
    prompts::{
        create_answer_user_message, create_condense_user_message, format_context,
        CHAT_SYSTEM_PROMPT, CHAT_TEMPERATURE, CONDENSE_SYSTEM_PROMPT,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => write!(f, "User"),
            TurnRole::Assistant => write!(f, "Assistant"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub text: String,
}

impl fmt::Display for ChatTurn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role, self.text)
    }
}

/// Append-only history of one conversation. Strictly linear, no rollback.
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    turns: Vec<ChatTurn>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: TurnRole, text: impl Into<String>) {
        self.turns.push(ChatTurn {
            role,
            text: text.into(),
        });
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(|turn| format!("{turn}"))
            .collect::<Vec<String>>()
            .join("\n")
    }
}

/// Answers follow-up queries against the running history: the follow-up is
/// first condensed into a standalone question, which then drives retrieval
/// and the answer.
pub struct ConversationChain {
    answers: AnswerGenerator,
    model: Arc<dyn ChatModel>,
}

impl ConversationChain {
    pub fn new(answers: AnswerGenerator, model: Arc<dyn ChatModel>) -> Self {
        Self { answers, model }
    }

    pub async fn follow_up(
        &self,
        log: &ChatLog,
        query: &str,
    ) -> Result<GeneratedAnswer, AppError> {
        let standalone = if log.is_empty() {
            query.to_owned()
        } else {
            let user_message = create_condense_user_message(&log.render(), query);
            self.model
                .complete(CONDENSE_SYSTEM_PROMPT, &user_message, CHAT_TEMPERATURE)
                .await?
        };

        let grounding = self.answers.retrieve(&standalone).await?;
        let user_message = create_answer_user_message(&format_context(&grounding), &standalone);
        let answer = self
            .model
            .complete(CHAT_SYSTEM_PROMPT, &user_message, CHAT_TEMPERATURE)
            .await?;

        Ok(GeneratedAnswer { answer, grounding })
    }
}
