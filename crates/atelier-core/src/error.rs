use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtelierError {
    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    /// Structured output did not conform to the expected schema.
    /// Callers with a retry budget (the reflector) retry on this variant
    /// and only this variant; everything else propagates.
    #[error("structured output invalid: {0}")]
    InvalidStructure(String),

    #[error("structured generation exhausted after {attempts} attempts: {last_error}")]
    GenerationExhausted { attempts: usize, last_error: String },

    // Graph errors
    #[error("execution limit exceeded after {0} steps without reaching a terminal node")]
    ExecutionLimitExceeded(usize),

    #[error("node '{0}' not found in graph")]
    UnknownNode(String),

    #[error("graph has no entry node")]
    MissingEntry,

    #[error("graph entry node is already set to '{0}'")]
    EntryAlreadySet(String),

    #[error("node '{0}' has no outgoing edge")]
    NoOutgoingEdge(String),

    #[error("edge predicate on node '{node}' yielded unmapped label '{label}'")]
    UnknownEdgeLabel { node: String, label: String },

    // Pipeline errors
    #[error("task '{0}' has no assigned role")]
    MissingRole(String),

    #[error("pipeline error: {0}")]
    Pipeline(String),

    // Storage errors
    #[error("reflection store corrupted: {0}")]
    CorruptStore(String),

    // Config errors
    #[error("config error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AtelierError>;
