//! Role-based cooperation pipeline and the task reflector.
//!
//! The [`Pipeline`] wires planner, role-assigner, executor, and reporter
//! nodes over the graph engine; the [`TaskReflector`] records a
//! structured self-critique of a task attempt into the reflection store.

pub mod executor;
pub mod pipeline;
pub mod planner;
pub mod reflector;
pub mod reporter;

pub use executor::{CompletionTaskRunner, Executor};
pub use pipeline::Pipeline;
pub use planner::{Planner, RoleAssigner};
pub use reflector::TaskReflector;
pub use reporter::Reporter;
