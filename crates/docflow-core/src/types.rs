use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one workflow run.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_str(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rough complexity bucket for a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

impl Complexity {
    /// Numeric weight (1..=3) used for averaging.
    pub fn weight(self) -> u32 {
        match self {
            Self::Simple => 1,
            Self::Medium => 2,
            Self::Complex => 3,
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Simple => "Simple",
            Self::Medium => "Medium",
            Self::Complex => "Complex",
        };
        f.write_str(s)
    }
}

/// How much documentation a repository already has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentationStatus {
    None,
    Basic,
    Comprehensive,
}

impl fmt::Display for DocumentationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "None",
            Self::Basic => "Basic",
            Self::Comprehensive => "Comprehensive",
        };
        f.write_str(s)
    }
}

/// Descriptor of a repository discovered in the workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub name: String,
    pub path: String,
    pub language: String,
    /// Non-blank lines across code files.
    pub size: usize,
    pub complexity: Complexity,
    pub documentation_status: DocumentationStatus,
    pub priority: u32,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl RepositoryInfo {
    /// Minimal descriptor; the remaining fields take neutral defaults.
    pub fn new(name: impl Into<String>, language: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            language: language.into(),
            size: 0,
            complexity: Complexity::Simple,
            documentation_status: DocumentationStatus::None,
            priority: 0,
            dependencies: vec![],
        }
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }
}

/// Kind of generated document. Ordering follows generation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DocKind {
    #[serde(rename = "README")]
    Readme,
    Architecture,
    #[serde(rename = "API")]
    Api,
}

impl DocKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Readme => "README",
            Self::Architecture => "Architecture",
            Self::Api => "API",
        }
    }

    /// File name the document is published under.
    pub fn file_name(self) -> String {
        format!("{}.md", self.as_str())
    }
}

impl fmt::Display for DocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The documents generated for one repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSet {
    pub documents: BTreeMap<DocKind, String>,
    /// Tokens spent producing this set.
    #[serde(default)]
    pub tokens_used: u64,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: DocKind, content: impl Into<String>) {
        self.documents.insert(kind, content.into());
    }

    pub fn get(&self, kind: DocKind) -> Option<&str> {
        self.documents.get(&kind).map(String::as_str)
    }

    pub fn kinds(&self) -> Vec<DocKind> {
        self.documents.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Coarse progress marker written by each workflow node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Initialized,
    RepositoriesScanned,
    StrategySelected,
    ContentGenerated,
    QualityAssessed,
    ContentImproved,
    AllReposProcessed,
    Completed,
}

/// Quality band a score falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    High,
    Acceptable,
    Low,
}

impl QualityTier {
    pub fn classify(score: f64, high_threshold: f64, acceptable_threshold: f64) -> Self {
        if score >= high_threshold {
            Self::High
        } else if score >= acceptable_threshold {
            Self::Acceptable
        } else {
            Self::Low
        }
    }
}

/// Counters accumulated over one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub repositories_scanned: usize,
    pub documents_generated: usize,
    pub total_tokens_used: u64,
    pub improvement_passes: usize,
    pub forced_skips: usize,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ProcessingStats {
    /// Wall-clock seconds between start and finish (0 when either is missing).
    pub fn duration_secs(&self) -> f64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => {
                (end - start).num_milliseconds().max(0) as f64 / 1000.0
            }
            _ => 0.0,
        }
    }
}

/// The working record threaded through every node of the documentation workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentationState {
    pub repositories: Vec<RepositoryInfo>,
    pub current_repo_index: usize,
    pub generated_docs: BTreeMap<String, DocumentSet>,
    pub quality_scores: BTreeMap<String, f64>,
    pub retry_count: u32,
    pub workflow_status: WorkflowStatus,
    pub error_log: Vec<String>,
    #[serde(default)]
    pub documentation_strategy: Option<String>,
    #[serde(default)]
    pub stats: ProcessingStats,
    /// Free-form keys for collaborators.
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DocumentationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the state with an already-known repository list.
    pub fn with_repositories(repositories: Vec<RepositoryInfo>) -> Self {
        Self {
            repositories,
            ..Self::default()
        }
    }

    /// The repository under the cursor, if the cursor is still in range.
    pub fn current_repository(&self) -> Option<&RepositoryInfo> {
        self.repositories.get(self.current_repo_index)
    }

    /// Whether the cursor has moved past the last repository.
    pub fn is_exhausted(&self) -> bool {
        self.current_repo_index >= self.repositories.len()
    }

    /// Score of the current repository; absent scores count as 0.
    pub fn current_score(&self) -> f64 {
        self.current_repository()
            .and_then(|repo| self.quality_scores.get(&repo.name))
            .copied()
            .unwrap_or(0.0)
    }

    /// Mean of all recorded scores.
    pub fn average_quality(&self) -> Option<f64> {
        if self.quality_scores.is_empty() {
            return None;
        }
        let sum: f64 = self.quality_scores.values().sum();
        Some(sum / self.quality_scores.len() as f64)
    }

    /// Record a non-fatal problem.
    pub fn log_error(&mut self, message: impl Into<String>) {
        self.error_log.push(message.into());
    }
}

/// Events emitted while a graph runs.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    RunStarted {
        run_id: RunId,
        entry: String,
    },
    NodeStarted {
        run_id: RunId,
        node: String,
        step: usize,
    },
    NodeCompleted {
        run_id: RunId,
        node: String,
        step: usize,
        elapsed_ms: u64,
    },
    Routed {
        run_id: RunId,
        from: String,
        label: Option<String>,
        to: String,
    },
    RunComplete {
        run_id: RunId,
        steps: usize,
        elapsed_ms: u64,
    },
    RunError {
        run_id: RunId,
        error: String,
    },
}

impl WorkflowEvent {
    pub fn run_id(&self) -> &RunId {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::NodeStarted { run_id, .. }
            | Self::NodeCompleted { run_id, .. }
            | Self::Routed { run_id, .. }
            | Self::RunComplete { run_id, .. }
            | Self::RunError { run_id, .. } => run_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_score_defaults_to_zero() {
        let state = DocumentationState::with_repositories(vec![RepositoryInfo::new("a", "Rust")]);
        assert_eq!(state.current_score(), 0.0);
        assert!(!state.is_exhausted());
    }

    #[test]
    fn test_exhausted_when_cursor_past_end() {
        let mut state =
            DocumentationState::with_repositories(vec![RepositoryInfo::new("a", "Rust")]);
        state.current_repo_index = 1;
        assert!(state.is_exhausted());
        assert!(state.current_repository().is_none());
        assert_eq!(state.current_score(), 0.0);
    }

    #[test]
    fn test_average_quality() {
        let mut state = DocumentationState::new();
        assert!(state.average_quality().is_none());
        state.quality_scores.insert("a".into(), 0.5);
        state.quality_scores.insert("b".into(), 1.0);
        assert_eq!(state.average_quality(), Some(0.75));
    }

    #[test]
    fn test_quality_tier_boundaries() {
        assert_eq!(QualityTier::classify(0.8, 0.8, 0.6), QualityTier::High);
        assert_eq!(QualityTier::classify(0.79, 0.8, 0.6), QualityTier::Acceptable);
        assert_eq!(QualityTier::classify(0.6, 0.8, 0.6), QualityTier::Acceptable);
        assert_eq!(QualityTier::classify(0.59, 0.8, 0.6), QualityTier::Low);
    }

    #[test]
    fn test_doc_kind_serializes_as_label() {
        let json = serde_json::to_string(&DocKind::Api).unwrap();
        assert_eq!(json, "\"API\"");
        assert_eq!(DocKind::Readme.file_name(), "README.md");
    }

    #[test]
    fn test_duration_secs() {
        let mut stats = ProcessingStats::default();
        assert_eq!(stats.duration_secs(), 0.0);
        let start = Utc::now();
        stats.started_at = Some(start);
        stats.finished_at = Some(start + chrono::Duration::milliseconds(1500));
        assert_eq!(stats.duration_secs(), 1.5);
    }
}
