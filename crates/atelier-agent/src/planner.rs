use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use atelier_core::error::{AtelierError, Result};
use atelier_core::traits::StructuredClient;
use atelier_core::types::{Role, Task};

const DECOMPOSE_PROMPT: &str = r#"Decompose the following query into 3 to 5 concrete, independently executable tasks. Order them so that later tasks can build on the results of earlier ones. Each task description must be a single self-contained sentence.

Query:
{query}

Respond with JSON of the shape: {"tasks": ["task one", "task two", ...]}"#;

const ASSIGN_ROLES_PROMPT: &str = r#"Tasks:
{tasks}

Assign a role to each of these tasks, following these instructions:
1. Devise a unique, creative role for every task. Do not feel bound to existing job titles or generic role names.
2. Make each role name memorable and reflective of the essence of its task.
3. For each role, provide a detailed description of why it is the best fit for its task.
4. List three key skills or attributes the role needs to carry out its task effectively.

Respond with JSON of the shape:
{"tasks": [{"description": "...", "role": {"name": "...", "description": "...", "skills": ["...", "...", "..."]}}, ...]}
Return exactly one entry per input task, in the same order."#;

#[derive(Deserialize)]
struct DecomposedTasks {
    tasks: Vec<String>,
}

#[derive(Deserialize)]
struct AssignedTask {
    description: String,
    role: Role,
}

#[derive(Deserialize)]
struct TasksWithRoles {
    tasks: Vec<AssignedTask>,
}

/// Decomposes a query into role-less tasks.
#[derive(Clone)]
pub struct Planner {
    llm: Arc<dyn StructuredClient>,
}

impl Planner {
    pub fn new(llm: Arc<dyn StructuredClient>) -> Self {
        Self { llm }
    }

    pub async fn run(&self, query: &str) -> Result<Vec<Task>> {
        let prompt = DECOMPOSE_PROMPT.replace("{query}", query);
        let value = self.llm.generate_json(&prompt).await?;

        let decomposed: DecomposedTasks = serde_json::from_value(value)
            .map_err(|e| AtelierError::InvalidStructure(format!("decomposition: {}", e)))?;
        if decomposed.tasks.is_empty() {
            return Err(AtelierError::InvalidStructure(
                "decomposition yielded no tasks".into(),
            ));
        }

        debug!(count = decomposed.tasks.len(), "query decomposed");
        Ok(decomposed.tasks.into_iter().map(Task::new).collect())
    }
}

/// Assigns a role to every task in one structured call, replacing the
/// whole task sequence.
#[derive(Clone)]
pub struct RoleAssigner {
    llm: Arc<dyn StructuredClient>,
}

impl RoleAssigner {
    pub fn new(llm: Arc<dyn StructuredClient>) -> Self {
        Self { llm }
    }

    pub async fn run(&self, tasks: &[Task]) -> Result<Vec<Task>> {
        let tasks_str = tasks
            .iter()
            .map(|t| t.description.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = ASSIGN_ROLES_PROMPT.replace("{tasks}", &tasks_str);
        let value = self.llm.generate_json(&prompt).await?;

        let assigned: TasksWithRoles = serde_json::from_value(value)
            .map_err(|e| AtelierError::InvalidStructure(format!("role assignment: {}", e)))?;

        if assigned.tasks.len() != tasks.len() {
            return Err(AtelierError::InvalidStructure(format!(
                "role assignment returned {} tasks, expected {}",
                assigned.tasks.len(),
                tasks.len()
            )));
        }
        if let Some(bad) = assigned.tasks.iter().find(|t| t.role.skills.is_empty()) {
            return Err(AtelierError::InvalidStructure(format!(
                "role '{}' has no skills",
                bad.role.name
            )));
        }

        Ok(assigned
            .tasks
            .into_iter()
            .map(|t| Task {
                description: t.description,
                role: Some(t.role),
            })
            .collect())
    }
}
