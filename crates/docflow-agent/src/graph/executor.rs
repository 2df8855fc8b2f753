use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use docflow_core::error::{DocflowError, Result};
use docflow_core::event::EventBus;
use docflow_core::types::{RunId, WorkflowEvent};

use super::edge::{ConditionalEdge, END};
use super::node::NodeHandler;

/// One node invocation in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    /// 1-based step number.
    pub step: usize,
    /// Node that ran.
    pub node: String,
    /// Label returned by the node's router, if it has one.
    pub label: Option<String>,
    /// Where traversal went next (possibly [`END`]).
    pub next: String,
    /// Handler plus routing time in milliseconds.
    pub elapsed_ms: u64,
}

/// Result of running a graph to the terminal sentinel.
#[derive(Debug, Clone)]
pub struct ExecutionResult<S> {
    pub run_id: RunId,
    /// Final state.
    pub state: S,
    /// Per-step history in execution order.
    pub trace: Vec<StepRecord>,
    /// Total execution time in milliseconds.
    pub total_elapsed_ms: u64,
}

impl<S> ExecutionResult<S> {
    /// Node names in the order they ran.
    pub fn visited(&self) -> Vec<&str> {
        self.trace.iter().map(|r| r.node.as_str()).collect()
    }

    /// Labels produced by routers, in order.
    pub fn labels(&self) -> Vec<&str> {
        self.trace.iter().filter_map(|r| r.label.as_deref()).collect()
    }

    pub fn steps(&self) -> usize {
        self.trace.len()
    }
}

/// Compiled, immutable graph.
///
/// Starting from the entry node, runs one handler at a time against the
/// state, then picks the successor: the conditional router if the node
/// has one (unmapped labels end the run), else its unconditional edge,
/// else the run ends. Produced by [`StateGraph::compile`](super::StateGraph::compile).
pub struct GraphExecutor<S> {
    nodes: HashMap<String, Arc<dyn NodeHandler<S>>>,
    edges: HashMap<String, String>,
    conditional_edges: HashMap<String, ConditionalEdge<S>>,
    entry_node: String,
    max_steps: Option<usize>,
    cancel: Option<CancellationToken>,
    event_bus: Option<Arc<EventBus>>,
}

impl<S: Send + 'static> GraphExecutor<S> {
    pub(crate) fn new(
        nodes: HashMap<String, Arc<dyn NodeHandler<S>>>,
        edges: HashMap<String, String>,
        conditional_edges: HashMap<String, ConditionalEdge<S>>,
        entry_node: String,
    ) -> Self {
        Self {
            nodes,
            edges,
            conditional_edges,
            entry_node,
            max_steps: None,
            cancel: None,
            event_bus: None,
        }
    }

    /// Fail with `GraphStepLimitExceeded` once `max_steps` handlers have run
    /// without reaching the terminal sentinel.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Abort with `Cancelled` when the token fires.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Publish run events to the given bus.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn entry_node(&self) -> &str {
        &self.entry_node
    }

    /// Run the graph and return only the final state.
    pub async fn invoke(&self, initial_state: S) -> Result<S> {
        self.execute(initial_state).await.map(|r| r.state)
    }

    /// Run the graph to completion, keeping the traversal history.
    pub async fn execute(&self, initial_state: S) -> Result<ExecutionResult<S>> {
        let run_id = RunId::new();
        let start = Instant::now();

        self.publish(WorkflowEvent::RunStarted {
            run_id: run_id.clone(),
            entry: self.entry_node.clone(),
        });
        info!(run_id = %run_id, entry = %self.entry_node, "Graph run started");

        match self.traverse(&run_id, initial_state).await {
            Ok((state, trace)) => {
                let total_elapsed_ms = start.elapsed().as_millis() as u64;
                info!(
                    run_id = %run_id,
                    steps = trace.len(),
                    elapsed_ms = total_elapsed_ms,
                    "Graph run complete"
                );
                self.publish(WorkflowEvent::RunComplete {
                    run_id: run_id.clone(),
                    steps: trace.len(),
                    elapsed_ms: total_elapsed_ms,
                });
                Ok(ExecutionResult {
                    run_id,
                    state,
                    trace,
                    total_elapsed_ms,
                })
            }
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Graph run failed");
                self.publish(WorkflowEvent::RunError {
                    run_id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn traverse(&self, run_id: &RunId, mut state: S) -> Result<(S, Vec<StepRecord>)> {
        let mut trace: Vec<StepRecord> = Vec::new();
        let mut current = self.entry_node.clone();

        while current != END {
            if self.is_cancelled() {
                warn!(node = %current, "Cancellation requested, stopping graph");
                return Err(DocflowError::Cancelled);
            }

            if let Some(limit) = self.max_steps {
                if trace.len() >= limit {
                    warn!(node = %current, limit, "Step limit reached, stopping graph");
                    return Err(DocflowError::GraphStepLimitExceeded(limit));
                }
            }

            let handler = self
                .nodes
                .get(&current)
                .ok_or_else(|| DocflowError::UnknownNode(current.clone()))?;

            let step = trace.len() + 1;
            debug!(node = %current, step, "Executing graph node");
            self.publish(WorkflowEvent::NodeStarted {
                run_id: run_id.clone(),
                node: current.clone(),
                step,
            });

            let node_start = Instant::now();
            // Failures are wrapped inside the race so that a cancellation
            // surfaces as a bare `Cancelled`.
            let call = handler.call(state);
            let node = current.clone();
            state = self
                .cancellable(async move {
                    call.await.map_err(|e| DocflowError::HandlerFailure {
                        node,
                        source: Box::new(e),
                    })
                })
                .await?;

            let (next, label) = if let Some(edge) = self.conditional_edges.get(&current) {
                let call = edge.router.route(state);
                let node = current.clone();
                let (routed, label) = self
                    .cancellable(async move {
                        call.await.map_err(|e| DocflowError::RouterFailure {
                            node,
                            source: Box::new(e),
                        })
                    })
                    .await?;
                state = routed;
                let next = edge.resolve(&label).to_string();
                if !edge.branches.contains_key(&label) {
                    debug!(node = %current, label = %label, "Unmapped label, routing to end");
                }
                (next, Some(label))
            } else if let Some(next) = self.edges.get(&current) {
                (next.clone(), None)
            } else {
                debug!(node = %current, "No outgoing edges, graph complete");
                (END.to_string(), None)
            };

            let elapsed_ms = node_start.elapsed().as_millis() as u64;
            debug!(
                node = %current,
                next = %next,
                label = label.as_deref().unwrap_or("-"),
                elapsed_ms,
                "Node execution complete"
            );
            self.publish(WorkflowEvent::NodeCompleted {
                run_id: run_id.clone(),
                node: current.clone(),
                step,
                elapsed_ms,
            });
            self.publish(WorkflowEvent::Routed {
                run_id: run_id.clone(),
                from: current.clone(),
                label: label.clone(),
                to: next.clone(),
            });

            trace.push(StepRecord {
                step,
                node: std::mem::replace(&mut current, next.clone()),
                label,
                next,
                elapsed_ms,
            });
        }

        Ok((state, trace))
    }

    /// Race a handler or router future against the cancellation token.
    async fn cancellable<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        match &self.cancel {
            Some(cancel) => {
                tokio::select! {
                    result = fut => result,
                    _ = cancel.cancelled() => Err(DocflowError::Cancelled),
                }
            }
            None => fut.await,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }

    fn publish(&self, event: WorkflowEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::branches;
    use crate::graph::StateGraph;
    use std::time::Duration;

    fn linear() -> StateGraph<Vec<String>> {
        let mut graph = StateGraph::new();
        graph
            .add_node("a", |mut s: Vec<String>| async move {
                s.push("a".into());
                Ok(s)
            })
            .add_node("b", |mut s: Vec<String>| async move {
                s.push("b".into());
                Ok(s)
            })
            .add_edge("a", "b")
            .add_edge("b", END)
            .set_entry_point("a");
        graph
    }

    #[tokio::test]
    async fn test_reaches_end_normally() {
        let result = linear().compile().unwrap().execute(vec![]).await.unwrap();
        assert_eq!(result.state, vec!["a", "b"]);
        assert_eq!(result.visited(), vec!["a", "b"]);
        assert_eq!(result.trace[1].next, END);
        assert_eq!(result.steps(), 2);
    }

    #[tokio::test]
    async fn test_dead_end_node_terminates() {
        let mut graph = StateGraph::new();
        graph
            .add_node("only", |n: u32| async move { Ok(n + 1) })
            .set_entry_point("only");
        let result = graph.compile().unwrap().execute(0).await.unwrap();
        assert_eq!(result.state, 1);
        assert_eq!(result.trace[0].next, END);
    }

    #[tokio::test]
    async fn test_unmapped_label_terminates() {
        let mut graph = StateGraph::new();
        graph
            .add_node("a", |n: u32| async move { Ok(n) })
            .add_node("b", |n: u32| async move { Ok(n + 1) })
            .add_conditional_edges(
                "a",
                |n: u32| async move { Ok((n, "mystery".to_string())) },
                branches([("known", "b")]),
            )
            .set_entry_point("a");
        let result = graph.compile().unwrap().execute(0).await.unwrap();
        assert_eq!(result.visited(), vec!["a"]);
        assert_eq!(result.labels(), vec!["mystery"]);
        assert_eq!(result.state, 0);
    }

    #[tokio::test]
    async fn test_router_mutation_is_kept() {
        let mut graph = StateGraph::new();
        graph
            .add_node("work", |n: u32| async move { Ok(n) })
            .add_conditional_edges(
                "work",
                |n: u32| async move {
                    let next = n + 1;
                    let label = if next >= 3 { "stop" } else { "loop" };
                    Ok((next, label.to_string()))
                },
                branches([("loop", "work"), ("stop", END)]),
            )
            .set_entry_point("work");
        let result = graph.compile().unwrap().execute(0).await.unwrap();
        assert_eq!(result.state, 3);
        assert_eq!(result.labels(), vec!["loop", "loop", "stop"]);
    }

    #[tokio::test]
    async fn test_step_limit_on_inescapable_cycle() {
        let mut graph = StateGraph::new();
        graph
            .add_node("ping", |n: u32| async move { Ok(n + 1) })
            .add_node("pong", |n: u32| async move { Ok(n + 1) })
            .add_edge("ping", "pong")
            .add_edge("pong", "ping")
            .set_entry_point("ping");

        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = counter.clone();
        let mut counted = StateGraph::new();
        counted
            .add_node("ping", move |n: u32| {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Ok(n)
                }
            })
            .add_edge("ping", "ping")
            .set_entry_point("ping");

        let err = graph.compile().unwrap().with_max_steps(7).invoke(0).await.unwrap_err();
        assert!(matches!(err, DocflowError::GraphStepLimitExceeded(7)));

        let err = counted.compile().unwrap().with_max_steps(5).invoke(0).await.unwrap_err();
        assert!(matches!(err, DocflowError::GraphStepLimitExceeded(5)));
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_step_limit_not_hit_when_run_fits() {
        let result = linear().compile().unwrap().with_max_steps(2).execute(vec![]).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_handler_failure_wraps_node_name() {
        let mut graph = StateGraph::new();
        graph
            .add_node("explode", |_n: u32| async move {
                Err(DocflowError::collaborator("generator", "offline"))
            })
            .set_entry_point("explode");
        let err = graph.compile().unwrap().invoke(0).await.unwrap_err();
        match err {
            DocflowError::HandlerFailure { node, source } => {
                assert_eq!(node, "explode");
                assert!(matches!(*source, DocflowError::Collaborator { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_router_failure_wraps_node_name() {
        let mut graph = StateGraph::new();
        graph
            .add_node("a", |n: u32| async move { Ok(n) })
            .add_conditional_edges(
                "a",
                |_n: u32| async move {
                    Err::<(u32, String), _>(DocflowError::collaborator("router", "bad state"))
                },
                branches([("x", END)]),
            )
            .set_entry_point("a");
        let err = graph.compile().unwrap().invoke(0).await.unwrap_err();
        assert!(matches!(err, DocflowError::RouterFailure { ref node, .. } if node == "a"));
    }

    #[tokio::test]
    async fn test_unknown_node_at_runtime() {
        let executor: GraphExecutor<u32> =
            GraphExecutor::new(HashMap::new(), HashMap::new(), HashMap::new(), "ghost".into());
        let err = executor.invoke(0).await.unwrap_err();
        assert!(matches!(err, DocflowError::UnknownNode(ref n) if n == "ghost"));
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = linear()
            .compile()
            .unwrap()
            .with_cancel_token(cancel)
            .invoke(vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, DocflowError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_in_flight_handler() {
        let mut graph = StateGraph::new();
        graph
            .add_node("slow", |n: u32| async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(n)
            })
            .set_entry_point("slow");

        let cancel = CancellationToken::new();
        let executor = graph.compile().unwrap().with_cancel_token(cancel.clone());
        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let err = executor.invoke(0).await.unwrap_err();
        assert!(matches!(err, DocflowError::Cancelled));
        trigger.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_interrupts_in_flight_router() {
        let mut graph = StateGraph::new();
        graph
            .add_node("a", |n: u32| async move { Ok(n) })
            .add_conditional_edges(
                "a",
                |n: u32| async move {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok((n, "x".to_string()))
                },
                branches([("x", END)]),
            )
            .set_entry_point("a");

        let cancel = CancellationToken::new();
        let executor = graph.compile().unwrap().with_cancel_token(cancel.clone());
        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let err = executor.invoke(0).await.unwrap_err();
        assert!(matches!(err, DocflowError::Cancelled));
        trigger.await.unwrap();
    }

    #[tokio::test]
    async fn test_events_published() {
        let bus = Arc::new(EventBus::new(64));
        let mut rx = bus.subscribe();
        linear()
            .compile()
            .unwrap()
            .with_event_bus(bus.clone())
            .invoke(vec![])
            .await
            .unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event {
                WorkflowEvent::RunStarted { .. } => "start",
                WorkflowEvent::NodeStarted { .. } => "node_start",
                WorkflowEvent::NodeCompleted { .. } => "node_done",
                WorkflowEvent::Routed { .. } => "routed",
                WorkflowEvent::RunComplete { .. } => "complete",
                WorkflowEvent::RunError { .. } => "error",
            });
        }
        assert_eq!(kinds.first(), Some(&"start"));
        assert_eq!(kinds.last(), Some(&"complete"));
        assert_eq!(kinds.iter().filter(|k| **k == "routed").count(), 2);
    }
}
