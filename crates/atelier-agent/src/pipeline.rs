use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use atelier_core::error::{AtelierError, Result};
use atelier_core::traits::{CompletionClient, StructuredClient, TaskRunner};
use atelier_core::types::{WorkflowState, WorkflowUpdate};
use atelier_graph::{GraphEngine, END};

use crate::executor::Executor;
use crate::planner::{Planner, RoleAssigner};
use crate::reporter::Reporter;

/// The role-based cooperation workflow:
/// planner → role_assigner → executor (conditional self-loop) → reporter.
///
/// The executor node runs one task, increments `current_task_index`, and
/// appends one result in the same update; the conditional edge compares
/// `current_task_index < tasks.len()` on the post-merge state. This is
/// how iteration is expressed without a native loop construct, and why
/// the step bound matters operationally.
pub struct Pipeline {
    engine: GraphEngine<WorkflowState>,
    max_steps: usize,
}

impl Pipeline {
    pub fn new(
        structured: Arc<dyn StructuredClient>,
        completion: Arc<dyn CompletionClient>,
        runner: Arc<dyn TaskRunner>,
        max_steps: usize,
    ) -> Result<Self> {
        let planner = Planner::new(structured.clone());
        let assigner = RoleAssigner::new(structured);
        let executor = Executor::new(runner);
        let reporter = Reporter::new(completion);

        let mut engine = GraphEngine::new();

        engine.register("planner", move |state: WorkflowState| {
            let planner = planner.clone();
            async move {
                let tasks = planner.run(&state.query).await?;
                Ok(WorkflowUpdate {
                    tasks: Some(tasks),
                    ..Default::default()
                })
            }
        });

        engine.register("role_assigner", move |state: WorkflowState| {
            let assigner = assigner.clone();
            async move {
                let tasks = assigner.run(&state.tasks).await?;
                Ok(WorkflowUpdate {
                    tasks: Some(tasks),
                    ..Default::default()
                })
            }
        });

        engine.register("executor", move |state: WorkflowState| {
            let executor = executor.clone();
            async move {
                let task = state
                    .tasks
                    .get(state.current_task_index)
                    .cloned()
                    .ok_or_else(|| {
                        AtelierError::Pipeline(format!(
                            "task index {} out of range ({} tasks)",
                            state.current_task_index,
                            state.tasks.len()
                        ))
                    })?;
                let result = executor.run(&task, &state.results).await?;
                Ok(WorkflowUpdate {
                    current_task_index: Some(state.current_task_index + 1),
                    results: vec![result],
                    ..Default::default()
                })
            }
        });

        engine.register("reporter", move |state: WorkflowState| {
            let reporter = reporter.clone();
            async move {
                let report = reporter.run(&state.query, &state.results).await?;
                Ok(WorkflowUpdate {
                    final_output: Some(report),
                    ..Default::default()
                })
            }
        });

        engine.set_entry("planner")?;
        engine.add_edge("planner", "role_assigner");
        engine.add_edge("role_assigner", "executor");
        engine.add_conditional_edge(
            "executor",
            |state: &WorkflowState| {
                if state.current_task_index < state.tasks.len() {
                    "continue"
                } else {
                    "done"
                }
                .to_string()
            },
            HashMap::from([
                ("continue".to_string(), "executor".to_string()),
                ("done".to_string(), "reporter".to_string()),
            ]),
        );
        engine.add_edge("reporter", END);

        Ok(Self { engine, max_steps })
    }

    /// Run the workflow for a query, returning the final state.
    pub async fn run(&self, query: &str) -> Result<WorkflowState> {
        info!(query, "starting workflow run");
        let state = self
            .engine
            .run(WorkflowState::new(query), self.max_steps)
            .await?;
        info!(
            tasks = state.tasks.len(),
            results = state.results.len(),
            "workflow run complete"
        );
        Ok(state)
    }
}
