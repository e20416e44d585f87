use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::traits::GraphState;

/// A role assigned to a task by the role-assignment step.
///
/// Immutable once created and owned by exactly one [`Task`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Role {
    /// Name of the role.
    pub name: String,
    /// Detailed description of the role.
    pub description: String,
    /// Key skills the role needs to carry out its task (non-empty).
    pub skills: Vec<String>,
}

/// A unit of work produced by query decomposition.
///
/// The role is `None` at creation and filled exactly once by the
/// role-assignment step; tasks are read-only during execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// What this task asks for.
    pub description: String,
    /// Role assigned to the task, if any.
    #[serde(default)]
    pub role: Option<Role>,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            role: None,
        }
    }
}

/// The mutable-by-replacement record threaded through a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    /// The user's query; set once at creation.
    pub query: String,
    /// Tasks to execute; set by decomposition, wholly replaced by role
    /// assignment, never mutated in place afterwards.
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Index of the task currently up for execution. Strictly
    /// non-decreasing, bounded by `tasks.len()`.
    #[serde(default)]
    pub current_task_index: usize,
    /// One entry per completed task, in completion order. Append-only.
    #[serde(default)]
    pub results: Vec<String>,
    /// Empty until the terminal node runs; set exactly once.
    #[serde(default)]
    pub final_output: String,
}

impl WorkflowState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            tasks: Vec::new(),
            current_task_index: 0,
            results: Vec::new(),
            final_output: String::new(),
        }
    }
}

/// Partial update returned by a workflow node transition.
///
/// Merge semantics are declared here, once: `Option` fields replace
/// (last write wins), `results` appends in order.
#[derive(Debug, Clone, Default)]
pub struct WorkflowUpdate {
    pub tasks: Option<Vec<Task>>,
    pub current_task_index: Option<usize>,
    pub results: Vec<String>,
    pub final_output: Option<String>,
}

impl GraphState for WorkflowState {
    type Update = WorkflowUpdate;

    fn apply(&mut self, update: WorkflowUpdate) {
        if let Some(tasks) = update.tasks {
            self.tasks = tasks;
        }
        if let Some(index) = update.current_task_index {
            self.current_task_index = index;
        }
        self.results.extend(update.results);
        if let Some(output) = update.final_output {
            self.final_output = output;
        }
    }
}

/// Verdict portion of a reflection: should the task be retried, and why.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Judgement {
    /// Whether the task result was inadequate and the task should be retried.
    pub needs_retry: bool,
    /// Confidence in the verdict, in `[0, 1]`.
    pub confidence: f64,
    /// Reasons behind the verdict, in order of importance.
    pub reasons: Vec<String>,
}

/// A structured self-critique recorded after a task attempt.
///
/// Immutable once persisted; the id is always assigned by the store,
/// never by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReflectionRecord {
    /// Store-assigned identifier.
    pub id: String,
    /// The task that was attempted.
    pub task: String,
    /// Narrative self-critique; the embedding is computed from this text.
    pub reflection: String,
    /// Retry verdict.
    pub judgement: Judgement,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl ReflectionRecord {
    /// Build a record with an empty id; the store assigns the real one.
    pub fn new(task: impl Into<String>, reflection: impl Into<String>, judgement: Judgement) -> Self {
        Self {
            id: String::new(),
            task: task.into(),
            reflection: reflection.into(),
            judgement,
            created_at: Utc::now(),
        }
    }
}

/// Role in a chat exchange with a completion capability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}
