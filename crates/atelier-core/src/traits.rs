use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::{ChatMessage, Task};

/// State threaded through a graph run.
///
/// A node transition returns a partial `Update`; `apply` merges it into
/// the state. Merge semantics (replace vs append) are declared once, in
/// the `apply` implementation of the concrete state type.
pub trait GraphState: Clone + Send + Sync + 'static {
    type Update: Send + 'static;

    /// Merge a partial update into the state.
    fn apply(&mut self, update: Self::Update);
}

/// Free-text generation capability (single-shot chat completion).
pub trait CompletionClient: Send + Sync + 'static {
    fn complete(&self, messages: Vec<ChatMessage>) -> BoxFuture<'_, Result<String>>;
}

/// Structured-generation capability.
///
/// Implementations return `AtelierError::InvalidStructure` when the model
/// output is not a JSON value at all, so callers can distinguish
/// malformed output (retryable) from transport failures (not).
pub trait StructuredClient: Send + Sync + 'static {
    fn generate_json(&self, prompt: &str) -> BoxFuture<'_, Result<serde_json::Value>>;
}

/// Embedding capability: text to a fixed-length vector.
///
/// Dimensionality must stay constant across all calls used by one
/// reflection store instance.
pub trait EmbeddingClient: Send + Sync + 'static {
    fn embed(&self, text: &str) -> BoxFuture<'_, Result<Vec<f32>>>;
}

/// Task-execution capability, opaque to the workflow engine.
///
/// Takes the task (with its assigned role) and the results of prior
/// tasks, returns the outcome text.
pub trait TaskRunner: Send + Sync + 'static {
    fn run_task<'a>(&'a self, task: &'a Task, prior_results: &'a [String])
        -> BoxFuture<'a, Result<String>>;
}
