pub mod pipeline;
pub mod utils;

pub use pipeline::{adhoc_index_from_text, adhoc_index_from_url, IngestionPipeline};
