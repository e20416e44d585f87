use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use atelier_core::error::{AtelierError, Result};
use atelier_core::traits::{CompletionClient, TaskRunner};
use atelier_core::types::{ChatMessage, Task};

/// Runs one task through the task-execution capability.
///
/// A task reaching execution without an assigned role is a fatal
/// precondition violation, never silently proceeded past.
#[derive(Clone)]
pub struct Executor {
    runner: Arc<dyn TaskRunner>,
}

impl Executor {
    pub fn new(runner: Arc<dyn TaskRunner>) -> Self {
        Self { runner }
    }

    pub async fn run(&self, task: &Task, prior_results: &[String]) -> Result<String> {
        if task.role.is_none() {
            return Err(AtelierError::MissingRole(task.description.clone()));
        }
        debug!(task = %task.description, prior = prior_results.len(), "executing task");
        self.runner.run_task(task, prior_results).await
    }
}

/// Task runner backed by the free-text completion capability: the
/// assigned role becomes the system prompt, prior results become
/// numbered context.
pub struct CompletionTaskRunner {
    llm: Arc<dyn CompletionClient>,
}

impl CompletionTaskRunner {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }
}

impl TaskRunner for CompletionTaskRunner {
    fn run_task<'a>(
        &'a self,
        task: &'a Task,
        prior_results: &'a [String],
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let role = task
                .role
                .as_ref()
                .ok_or_else(|| AtelierError::MissingRole(task.description.clone()))?;

            let system = format!(
                "You are {}.\nDescription: {}\nKey skills: {}\nCarry out the given task to the best of your ability, acting in this role.",
                role.name,
                role.description,
                role.skills.join(", "),
            );

            let results_str = prior_results
                .iter()
                .enumerate()
                .map(|(i, r)| format!("Info {}:\n{}", i + 1, r))
                .collect::<Vec<_>>()
                .join("\n\n");
            let user = format!(
                "Carry out the following task:\n{}\n\nResults of the tasks so far:\n{}",
                task.description, results_str,
            );

            self.llm
                .complete(vec![ChatMessage::system(system), ChatMessage::user(user)])
                .await
        })
    }
}
