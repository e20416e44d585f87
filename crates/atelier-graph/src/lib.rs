//! Graph Execution Engine — sequential multi-step workflow orchestration.
//!
//! A workflow is a set of named nodes whose transitions map the current
//! state to a partial update, connected by unconditional or
//! predicate-selected edges. [`GraphEngine::run`] walks the graph from
//! the entry node, merging each update into state before resolving the
//! outgoing edge, until an edge targets the [`END`] sentinel or the step
//! bound is exhausted.

pub mod engine;

pub use engine::{EdgePredicate, GraphEngine, Transition, END};
