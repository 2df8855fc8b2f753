//! Graph execution engine: state-machine workflows over a shared state.
//!
//! A workflow is a directed graph of named node handlers. Each handler
//! takes the state and returns the next state. Successors are either a
//! fixed edge or a router that inspects (and may update) the state and
//! returns a label, which a label table maps to the next node.
//!
//! `StateGraph` collects the definition; `compile` validates it and yields
//! an immutable `GraphExecutor`, which walks the graph from the entry node,
//! one handler at a time, until it reaches the `END` sentinel.

pub mod builder;
pub mod edge;
pub mod executor;
pub mod node;

pub use builder::StateGraph;
pub use edge::{branches, ConditionalEdge, Router, END};
pub use executor::{ExecutionResult, GraphExecutor, StepRecord};
pub use node::NodeHandler;
