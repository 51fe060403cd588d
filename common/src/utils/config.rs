use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default = "default_index_address")]
    pub index_address: String,
    #[serde(default = "default_index_namespace")]
    pub index_namespace: String,
    #[serde(default = "default_index_database")]
    pub index_database: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_chunk_separator")]
    pub chunk_separator: String,
    #[serde(default = "default_answer_top_k")]
    pub answer_top_k: u8,
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
    #[serde(default)]
    pub slack_bot_token: String,
    #[serde(default)]
    pub slack_bot_user_id: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimensions() -> u32 {
    1536
}

fn default_index_address() -> String {
    "rocksdb://db".to_string()
}

fn default_index_namespace() -> String {
    "quizdrill".to_string()
}

fn default_index_database() -> String {
    "corpus".to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    0
}

fn default_chunk_separator() -> String {
    "\n".to_string()
}

fn default_answer_top_k() -> u8 {
    4
}

fn default_max_context_tokens() -> usize {
    3000
}

fn default_http_port() -> u16 {
    3000
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: default_base_url(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            index_address: default_index_address(),
            index_namespace: default_index_namespace(),
            index_database: default_index_database(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            chunk_separator: default_chunk_separator(),
            answer_top_k: default_answer_top_k(),
            max_context_tokens: default_max_context_tokens(),
            slack_bot_token: String::new(),
            slack_bot_user_id: String::new(),
            http_port: default_http_port(),
        }
    }
}
