use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use docflow_core::error::{DocflowError, Result};

use super::edge::{ConditionalEdge, Router, END};
use super::executor::GraphExecutor;
use super::node::NodeHandler;

/// Mutable graph definition.
///
/// Register nodes, edges, conditional edges and the entry point, then
/// [`compile`](StateGraph::compile) into an immutable [`GraphExecutor`].
///
/// Registration policies:
/// - `add_node` with an existing name replaces the handler (last write wins).
/// - `add_conditional_edges` with an existing source replaces the router.
/// - Several `add_edge` calls from one source are kept; only the first is followed.
/// - A source with both an unconditional and a conditional edge fails to compile.
pub struct StateGraph<S> {
    nodes: HashMap<String, Arc<dyn NodeHandler<S>>>,
    edges: HashMap<String, Vec<String>>,
    conditional_edges: HashMap<String, ConditionalEdge<S>>,
    entry_point: Option<String>,
}

impl<S: Send + 'static> Default for StateGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Send + 'static> StateGraph<S> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            conditional_edges: HashMap::new(),
            entry_point: None,
        }
    }

    /// Register a handler under `name`.
    pub fn add_node(&mut self, name: impl Into<String>, handler: impl NodeHandler<S>) -> &mut Self {
        let name = name.into();
        if self.nodes.insert(name.clone(), Arc::new(handler)).is_some() {
            debug!(node = %name, "Node re-registered, replacing handler");
        }
        self
    }

    /// Append an unconditional successor for `from`.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.edges.entry(from.into()).or_default().push(to.into());
        self
    }

    /// Register the router and label table for `from`.
    pub fn add_conditional_edges(
        &mut self,
        from: impl Into<String>,
        router: impl Router<S>,
        branches: HashMap<String, String>,
    ) -> &mut Self {
        let from = from.into();
        let edge = ConditionalEdge::new(Arc::new(router), branches);
        if self.conditional_edges.insert(from.clone(), edge).is_some() {
            debug!(node = %from, "Conditional edge re-registered, replacing router");
        }
        self
    }

    /// Record the starting node.
    pub fn set_entry_point(&mut self, name: impl Into<String>) -> &mut Self {
        self.entry_point = Some(name.into());
        self
    }

    /// Validate the definition and produce an executor.
    ///
    /// The definition is borrowed, so compiling twice yields two independent
    /// executors with identical behaviour.
    pub fn compile(&self) -> Result<GraphExecutor<S>> {
        let entry = self
            .entry_point
            .clone()
            .ok_or_else(|| DocflowError::GraphDefinition("entry point is not set".to_string()))?;

        if self.nodes.contains_key(END) {
            return Err(DocflowError::GraphDefinition(format!(
                "'{}' is reserved for the terminal sentinel",
                END
            )));
        }

        if !self.nodes.contains_key(&entry) {
            return Err(DocflowError::GraphDefinition(format!(
                "entry point '{}' is not a registered node",
                entry
            )));
        }

        let mut edges = HashMap::with_capacity(self.edges.len());
        for (from, targets) in &self.edges {
            self.check_source(from)?;
            for to in targets {
                self.check_target(from, to)?;
            }
            if self.conditional_edges.contains_key(from) {
                return Err(DocflowError::GraphDefinition(format!(
                    "node '{}' has both an unconditional and a conditional edge",
                    from
                )));
            }
            if targets.len() > 1 {
                warn!(
                    node = %from,
                    count = targets.len(),
                    used = %targets[0],
                    "Multiple unconditional edges registered, only the first is followed"
                );
            }
            if let Some(first) = targets.first() {
                edges.insert(from.clone(), first.clone());
            }
        }

        for (from, edge) in &self.conditional_edges {
            self.check_source(from)?;
            for to in edge.targets() {
                self.check_target(from, to)?;
            }
        }

        debug!(
            entry = %entry,
            nodes = self.nodes.len(),
            edges = edges.len(),
            conditional_edges = self.conditional_edges.len(),
            "Graph compiled"
        );

        Ok(GraphExecutor::new(
            self.nodes.clone(),
            edges,
            self.conditional_edges.clone(),
            entry,
        ))
    }

    fn check_source(&self, from: &str) -> Result<()> {
        if self.nodes.contains_key(from) {
            Ok(())
        } else {
            Err(DocflowError::GraphDefinition(format!(
                "edge source '{}' is not a registered node",
                from
            )))
        }
    }

    fn check_target(&self, from: &str, to: &str) -> Result<()> {
        if to == END || self.nodes.contains_key(to) {
            Ok(())
        } else {
            Err(DocflowError::GraphDefinition(format!(
                "edge '{}' -> '{}' targets an unregistered node",
                from, to
            )))
        }
    }
}
