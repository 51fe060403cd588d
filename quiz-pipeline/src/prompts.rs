//! Prompt texts and the message formatting shared by the generators.

use common::storage::types::document_chunk::DocumentChunk;

pub const QUESTION_SYSTEM_PROMPT: &str = r"
Please create one multiple-choice question related to the specified question and context.

Make sure there is only one correct answer. Please don't provide obviously incorrect options.

Don't reveal the answer.

Feel free to create a question that asks for the best solution in a hypothetical organization's situation.

Use the following examples as reference for the question format:

    Question: (Situation example: Company A has decided to replace its authentication and authorization system as it scales up, which laws should they be concerned about?)
    Choose the correct answer from the options below:
    1. (Option 1)
    2. (Option 2)
    3. (Option 3)
    4. (Option 4)

    Question: (Specific topic example: Authentication) Choose the correct answer from the options below:
    1. (Option 1)
    2. (Option 2)
    3. (Option 3)
    4. (Option 4)
";

pub const ANSWER_SYSTEM_PROMPT: &str = r"
Please choose the correct answer for the following question and explain why it is the correct answer.
";

pub const CHAT_SYSTEM_PROMPT: &str = r"
Use the following pieces of context to answer the question at the end. The answer must be explained why.
";

pub const KEYWORD_SYSTEM_PROMPT: &str = r"
Please list 3 random words related to the term provided.
";

pub const CONDENSE_SYSTEM_PROMPT: &str = r"
Given the following conversation and a follow up question, rephrase the follow up question to be a standalone question.
";

// Question generation wants variety, answers want precision.
pub const QUESTION_TEMPERATURE: f32 = 1.0;
pub const ANSWER_TEMPERATURE: f32 = 0.1;
pub const CHAT_TEMPERATURE: f32 = 0.5;

/// Renders grounding chunks into the context block fed to the model.
pub fn format_context(chunks: &[DocumentChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| format!("[{}]\n{}", chunk.source, chunk.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn create_question_user_message(context: &str) -> String {
    format!(
        r"
        Context Information:
        ==================
        {context}
        "
    )
}

pub fn create_answer_user_message(context: &str, question: &str) -> String {
    format!(
        r"
        Context Information:
        ==================
        {context}

        Question:
        ==================
        {question}
        "
    )
}

pub fn create_condense_user_message(history: &str, question: &str) -> String {
    format!(
        r"
        Chat History:
        ==================
        {history}

        Follow Up Input:
        ==================
        {question}

        Standalone question:
        "
    )
}
