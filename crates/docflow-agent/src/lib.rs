pub mod graph;
pub mod quality_gate;
pub mod run_log;
pub mod workflow;

pub use graph::{
    ExecutionResult, GraphExecutor, NodeHandler, Router, StateGraph, StepRecord, END,
};
pub use quality_gate::{GateDecision, QualityGate};
pub use run_log::RunLogger;
pub use workflow::{Collaborators, DocumentationWorkflow};
