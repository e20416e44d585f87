use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use atelier_core::error::{AtelierError, Result};
use atelier_core::traits::StructuredClient;
use atelier_core::types::{Judgement, ReflectionRecord};
use atelier_memory::ReflectionStore;

/// Upper bound on structured-generation attempts per reflection.
const MAX_ATTEMPTS: usize = 5;

const REFLECTION_PROMPT: &str = r#"The task that was given:
{task}

The result of executing the task:
{result}

You are an AI agent with advanced reasoning ability. Analyze the result above and introspect on whether your approach to this task was adequate.

Respond with JSON of the shape:
{
  "reflection": "Look back on your thought process for this task. Was there anything that could be improved? State, in two or three sentences, the lessons that would produce a better result next time.",
  "judgement": {
    "needs_retry": <true if the result was inadequate and the task should be retried>,
    "confidence": <your confidence in that verdict, as a number between 0 and 1>,
    "reasons": ["concise reasons behind the verdict and the confidence"]
  }
}"#;

#[derive(Deserialize)]
struct ReflectionDraft {
    reflection: String,
    judgement: Judgement,
}

/// Orchestrates one reflection cycle: generate a structured critique of
/// a task attempt, persist it, return the record with its store id.
pub struct TaskReflector {
    llm: Arc<dyn StructuredClient>,
    store: Arc<ReflectionStore>,
}

impl TaskReflector {
    pub fn new(llm: Arc<dyn StructuredClient>, store: Arc<ReflectionStore>) -> Self {
        Self { llm, store }
    }

    /// Generate and persist a reflection for one task attempt.
    ///
    /// Structural/validation failures of the model output are retried up
    /// to [`MAX_ATTEMPTS`] times; capability failures propagate
    /// immediately. All retries exhausted fails with
    /// [`AtelierError::GenerationExhausted`].
    pub async fn run(&self, task: &str, result: &str) -> Result<ReflectionRecord> {
        let prompt = REFLECTION_PROMPT
            .replace("{task}", task)
            .replace("{result}", result);

        let mut last_error = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            let outcome = self
                .llm
                .generate_json(&prompt)
                .await
                .and_then(|value| parse_draft(value));

            match outcome {
                Ok(draft) => {
                    let mut record =
                        ReflectionRecord::new(task, draft.reflection, draft.judgement);
                    let id = self.store.save(record.clone()).await?;
                    record.id = id;
                    debug!(id = %record.id, attempt, "reflection recorded");
                    return Ok(record);
                }
                Err(AtelierError::InvalidStructure(msg)) => {
                    warn!(attempt, max = MAX_ATTEMPTS, error = %msg, "malformed reflection, retrying");
                    last_error = msg;
                }
                Err(e) => return Err(e),
            }
        }

        Err(AtelierError::GenerationExhausted {
            attempts: MAX_ATTEMPTS,
            last_error,
        })
    }
}

fn parse_draft(value: serde_json::Value) -> Result<ReflectionDraft> {
    let draft: ReflectionDraft = serde_json::from_value(value)
        .map_err(|e| AtelierError::InvalidStructure(format!("reflection: {}", e)))?;

    if draft.reflection.trim().is_empty() {
        return Err(AtelierError::InvalidStructure(
            "reflection narrative is empty".into(),
        ));
    }
    if !(0.0..=1.0).contains(&draft.judgement.confidence) {
        return Err(AtelierError::InvalidStructure(format!(
            "confidence {} outside [0, 1]",
            draft.judgement.confidence
        )));
    }
    Ok(draft)
}
