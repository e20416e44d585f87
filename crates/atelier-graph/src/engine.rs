use std::collections::HashMap;
use std::future::Future;

use futures::future::BoxFuture;
use tracing::{debug, error};

use atelier_core::error::{AtelierError, Result};
use atelier_core::traits::GraphState;

/// Terminal sentinel: an edge targeting `END` ends the run.
pub const END: &str = "__end__";

/// A node transition: maps a state snapshot to a partial update.
pub type Transition<S> =
    Box<dyn Fn(S) -> BoxFuture<'static, Result<<S as GraphState>::Update>> + Send + Sync>;

/// Predicate for a conditional edge: yields a label that selects the
/// next node from the edge's label-to-node map.
pub type EdgePredicate<S> = Box<dyn Fn(&S) -> String + Send + Sync>;

enum EdgeKind<S: GraphState> {
    /// Unconditional transition.
    Direct(String),
    /// Predicate-selected transition.
    Conditional {
        predicate: EdgePredicate<S>,
        targets: HashMap<String, String>,
    },
}

/// Executes a workflow graph strictly sequentially from an entry node
/// to the terminal sentinel, enforcing a hard step bound.
///
/// Each step invokes the current node's transition, merges the returned
/// partial update into state via [`GraphState::apply`], then resolves
/// the outgoing edge from the post-merge state. Iteration is expressed
/// as a conditional self-loop, which is why the step bound matters
/// operationally: it is the only safety valve against a predicate that
/// never turns false.
pub struct GraphEngine<S: GraphState> {
    nodes: HashMap<String, Transition<S>>,
    edges: HashMap<String, EdgeKind<S>>,
    entry: Option<String>,
}

impl<S: GraphState> Default for GraphEngine<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: GraphState> GraphEngine<S> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            entry: None,
        }
    }

    /// Register a named node with its transition function.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, transition: F)
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S::Update>> + Send + 'static,
    {
        self.nodes
            .insert(name.into(), Box::new(move |state| Box::pin(transition(state))));
    }

    /// Set the entry node. Exactly one entry node per graph; a second
    /// call is an error.
    pub fn set_entry(&mut self, name: impl Into<String>) -> Result<()> {
        if let Some(existing) = &self.entry {
            return Err(AtelierError::EntryAlreadySet(existing.clone()));
        }
        self.entry = Some(name.into());
        Ok(())
    }

    /// Add an unconditional edge.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.edges.insert(from.into(), EdgeKind::Direct(to.into()));
    }

    /// Add a conditional edge. The predicate observes the post-merge
    /// state and yields a label; `targets[label]` selects the next node.
    /// Map one label to [`END`] to guarantee an exit path exists.
    pub fn add_conditional_edge<P>(
        &mut self,
        from: impl Into<String>,
        predicate: P,
        targets: HashMap<String, String>,
    ) where
        P: Fn(&S) -> String + Send + Sync + 'static,
    {
        self.edges.insert(
            from.into(),
            EdgeKind::Conditional {
                predicate: Box::new(predicate),
                targets,
            },
        );
    }

    /// Execute the graph, returning the final state.
    ///
    /// Fails with [`AtelierError::ExecutionLimitExceeded`] if `max_steps`
    /// node executions complete without reaching the terminal sentinel.
    pub async fn run(&self, initial: S, max_steps: usize) -> Result<S> {
        let entry = self.entry.as_ref().ok_or(AtelierError::MissingEntry)?;

        let mut state = initial;
        let mut current = entry.clone();

        for step in 0..max_steps {
            let transition = self
                .nodes
                .get(&current)
                .ok_or_else(|| AtelierError::UnknownNode(current.clone()))?;

            debug!(node = %current, step, "executing graph node");
            let update = transition(state.clone()).await?;
            state.apply(update);

            // Edge resolution only happens after the merge completes, so
            // the predicate always observes fully-updated state.
            let next = match self.edges.get(&current) {
                Some(EdgeKind::Direct(to)) => to.clone(),
                Some(EdgeKind::Conditional { predicate, targets }) => {
                    let label = predicate(&state);
                    targets
                        .get(&label)
                        .ok_or_else(|| AtelierError::UnknownEdgeLabel {
                            node: current.clone(),
                            label,
                        })?
                        .clone()
                }
                None => return Err(AtelierError::NoOutgoingEdge(current.clone())),
            };

            if next == END {
                debug!(node = %current, steps = step + 1, "graph run complete");
                return Ok(state);
            }
            current = next;
        }

        error!(max_steps, node = %current, "graph run hit the step bound");
        Err(AtelierError::ExecutionLimitExceeded(max_steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct CountState {
        count: usize,
        log: Vec<String>,
    }

    #[derive(Debug, Default)]
    struct CountUpdate {
        count: Option<usize>,
        log: Vec<String>,
    }

    impl GraphState for CountState {
        type Update = CountUpdate;

        fn apply(&mut self, update: CountUpdate) {
            if let Some(count) = update.count {
                self.count = count;
            }
            self.log.extend(update.log);
        }
    }

    /// A graph that increments `count` in a conditional self-loop until
    /// it reaches `limit`, then transitions to a finishing node.
    fn counting_graph(limit: usize) -> GraphEngine<CountState> {
        let mut engine = GraphEngine::new();

        engine.register("increment", move |state: CountState| async move {
            Ok(CountUpdate {
                count: Some(state.count + 1),
                log: vec![format!("step {}", state.count + 1)],
            })
        });
        engine.register("finish", |_state: CountState| async move {
            Ok(CountUpdate {
                log: vec!["finished".into()],
                ..Default::default()
            })
        });

        engine.set_entry("increment").unwrap();
        engine.add_conditional_edge(
            "increment",
            move |state: &CountState| {
                if state.count < limit { "continue" } else { "done" }.to_string()
            },
            HashMap::from([
                ("continue".to_string(), "increment".to_string()),
                ("done".to_string(), "finish".to_string()),
            ]),
        );
        engine.add_edge("finish", END);

        engine
    }

    #[tokio::test]
    async fn test_bounded_self_loop() {
        let engine = counting_graph(3);
        let finished = engine.run(CountState::default(), 100).await.unwrap();

        assert_eq!(finished.count, 3);
        assert_eq!(
            finished.log,
            vec!["step 1", "step 2", "step 3", "finished"]
        );
    }

    #[tokio::test]
    async fn test_zero_iterations() {
        // Predicate is false immediately; the loop body still runs once
        // (the entry node executes before the edge is evaluated).
        let engine = counting_graph(0);
        let finished = engine.run(CountState::default(), 100).await.unwrap();
        assert_eq!(finished.count, 1);
    }

    #[tokio::test]
    async fn test_never_false_predicate_hits_step_bound() {
        let mut engine = GraphEngine::new();
        // The transition never increments, so the predicate never flips.
        engine.register("stuck", |_state: CountState| async move {
            Ok(CountUpdate::default())
        });
        engine.set_entry("stuck").unwrap();
        engine.add_conditional_edge(
            "stuck",
            |_state: &CountState| "again".to_string(),
            HashMap::from([
                ("again".to_string(), "stuck".to_string()),
                ("done".to_string(), END.to_string()),
            ]),
        );

        let err = engine.run(CountState::default(), 7).await.unwrap_err();
        match err {
            AtelierError::ExecutionLimitExceeded(steps) => assert_eq!(steps, 7),
            other => panic!("expected ExecutionLimitExceeded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_entry() {
        let engine: GraphEngine<CountState> = GraphEngine::new();
        let err = engine.run(CountState::default(), 10).await.unwrap_err();
        assert!(matches!(err, AtelierError::MissingEntry));
    }

    #[tokio::test]
    async fn test_double_entry_rejected() {
        let mut engine: GraphEngine<CountState> = GraphEngine::new();
        engine.set_entry("a").unwrap();
        let err = engine.set_entry("b").unwrap_err();
        assert!(matches!(err, AtelierError::EntryAlreadySet(name) if name == "a"));
    }

    #[tokio::test]
    async fn test_unknown_node_target() {
        let mut engine = GraphEngine::new();
        engine.register("start", |_state: CountState| async move {
            Ok(CountUpdate::default())
        });
        engine.set_entry("start").unwrap();
        engine.add_edge("start", "nowhere");

        let err = engine.run(CountState::default(), 10).await.unwrap_err();
        assert!(matches!(err, AtelierError::UnknownNode(name) if name == "nowhere"));
    }

    #[tokio::test]
    async fn test_unmapped_predicate_label() {
        let mut engine = GraphEngine::new();
        engine.register("start", |_state: CountState| async move {
            Ok(CountUpdate::default())
        });
        engine.set_entry("start").unwrap();
        engine.add_conditional_edge(
            "start",
            |_state: &CountState| "mystery".to_string(),
            HashMap::from([("known".to_string(), END.to_string())]),
        );

        let err = engine.run(CountState::default(), 10).await.unwrap_err();
        match err {
            AtelierError::UnknownEdgeLabel { node, label } => {
                assert_eq!(node, "start");
                assert_eq!(label, "mystery");
            }
            other => panic!("expected UnknownEdgeLabel, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_node_without_outgoing_edge() {
        let mut engine = GraphEngine::new();
        engine.register("dangling", |_state: CountState| async move {
            Ok(CountUpdate::default())
        });
        engine.set_entry("dangling").unwrap();

        let err = engine.run(CountState::default(), 10).await.unwrap_err();
        assert!(matches!(err, AtelierError::NoOutgoingEdge(name) if name == "dangling"));
    }

    #[tokio::test]
    async fn test_transition_error_propagates() {
        let mut engine = GraphEngine::new();
        engine.register("boom", |_state: CountState| async move {
            Err::<CountUpdate, _>(AtelierError::Pipeline("boom".into()))
        });
        engine.set_entry("boom").unwrap();
        engine.add_edge("boom", END);

        let err = engine.run(CountState::default(), 10).await.unwrap_err();
        assert!(matches!(err, AtelierError::Pipeline(msg) if msg == "boom"));
    }

    #[tokio::test]
    async fn test_predicate_observes_post_merge_state() {
        // The predicate sees count == 1 on the first evaluation, proving
        // the merge happened before edge resolution.
        let mut engine = GraphEngine::new();
        engine.register("bump", |state: CountState| async move {
            Ok(CountUpdate {
                count: Some(state.count + 1),
                ..Default::default()
            })
        });
        engine.set_entry("bump").unwrap();
        engine.add_conditional_edge(
            "bump",
            |state: &CountState| {
                assert!(state.count >= 1);
                "done".to_string()
            },
            HashMap::from([("done".to_string(), END.to_string())]),
        );

        let finished = engine.run(CountState::default(), 10).await.unwrap();
        assert_eq!(finished.count, 1);
    }
}
