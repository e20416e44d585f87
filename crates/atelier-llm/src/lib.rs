//! OpenAI-compatible capability implementations: chat completion,
//! JSON-constrained structured generation, and embeddings.

pub mod openai;

pub use openai::{extract_json, OpenAiClient, OpenAiEmbeddings};
