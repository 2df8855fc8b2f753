//! Collaborators that connect the documentation workflow to the outside world.

pub mod publisher;
pub mod scanner;
pub mod simulated;

pub use publisher::{render_report, FilePublisher, REPORT_FILE};
pub use scanner::WorkspaceScanner;
pub use simulated::{parse_score, SimulatedModel, DEFAULT_QUALITY_SCORE};
