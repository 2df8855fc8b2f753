//! The documentation workflow: scan → strategy → generate → assess, with a
//! quality-gated improvement loop and a final publish step.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use docflow_core::error::Result;
use docflow_core::traits::{
    ContentGenerator, ContentImprover, Publisher, QualityAssessor, RepositoryScanner,
};
use docflow_core::types::{
    DocumentSet, DocumentationState, DocumentationStatus, RepositoryInfo, WorkflowStatus,
};

use crate::graph::{branches, GraphExecutor, StateGraph, END};
use crate::quality_gate::{GateDecision, QualityGate};

pub const SCAN_REPOSITORIES: &str = "scan_repositories";
pub const ANALYZE_STRATEGY: &str = "analyze_strategy";
pub const GENERATE_CONTENT: &str = "generate_content";
pub const ASSESS_QUALITY: &str = "assess_quality";
pub const IMPROVE_CONTENT: &str = "improve_content";
pub const FINALIZE_DOCS: &str = "finalize_docs";

/// The external capabilities the workflow drives.
#[derive(Clone)]
pub struct Collaborators {
    pub scanner: Arc<dyn RepositoryScanner>,
    pub generator: Arc<dyn ContentGenerator>,
    pub assessor: Arc<dyn QualityAssessor>,
    pub improver: Arc<dyn ContentImprover>,
    pub publisher: Arc<dyn Publisher>,
}

/// Builds the documentation graph around a set of collaborators.
pub struct DocumentationWorkflow {
    collaborators: Collaborators,
    gate: QualityGate,
}

impl DocumentationWorkflow {
    pub fn new(collaborators: Collaborators, gate: QualityGate) -> Self {
        Self {
            collaborators,
            gate,
        }
    }

    /// The uncompiled graph definition.
    pub fn definition(&self) -> StateGraph<DocumentationState> {
        let mut graph = StateGraph::new();

        let scanner = self.collaborators.scanner.clone();
        graph.add_node(SCAN_REPOSITORIES, move |state: DocumentationState| {
            let scanner = scanner.clone();
            async move { scan_repositories(scanner.as_ref(), state).await }
        });

        graph.add_node(ANALYZE_STRATEGY, |state: DocumentationState| async move {
            Ok(analyze_strategy(state))
        });

        let generator = self.collaborators.generator.clone();
        graph.add_node(GENERATE_CONTENT, move |state: DocumentationState| {
            let generator = generator.clone();
            async move { generate_content(generator.as_ref(), state).await }
        });

        let assessor = self.collaborators.assessor.clone();
        graph.add_node(ASSESS_QUALITY, move |state: DocumentationState| {
            let assessor = assessor.clone();
            async move { assess_quality(assessor.as_ref(), state).await }
        });

        let improver = self.collaborators.improver.clone();
        graph.add_node(IMPROVE_CONTENT, move |state: DocumentationState| {
            let improver = improver.clone();
            async move { improve_content(improver.as_ref(), state).await }
        });

        let publisher = self.collaborators.publisher.clone();
        graph.add_node(FINALIZE_DOCS, move |state: DocumentationState| {
            let publisher = publisher.clone();
            async move { finalize_docs(publisher.as_ref(), state).await }
        });

        graph
            .add_edge(SCAN_REPOSITORIES, ANALYZE_STRATEGY)
            .add_edge(ANALYZE_STRATEGY, GENERATE_CONTENT)
            .add_edge(GENERATE_CONTENT, ASSESS_QUALITY)
            .add_conditional_edges(
                ASSESS_QUALITY,
                self.gate,
                branches([
                    (GateDecision::Improve.label(), IMPROVE_CONTENT),
                    (GateDecision::NextRepo.label(), GENERATE_CONTENT),
                    (GateDecision::Finalize.label(), FINALIZE_DOCS),
                ]),
            )
            .add_edge(IMPROVE_CONTENT, ASSESS_QUALITY)
            .add_edge(FINALIZE_DOCS, END)
            .set_entry_point(SCAN_REPOSITORIES);

        graph
    }

    /// Compile the workflow graph.
    pub fn compile(&self) -> Result<GraphExecutor<DocumentationState>> {
        self.definition().compile()
    }
}

async fn scan_repositories(
    scanner: &dyn RepositoryScanner,
    mut state: DocumentationState,
) -> Result<DocumentationState> {
    info!("Scanning workspace for repositories");
    let repositories = scanner.scan().await?;

    for repo in &repositories {
        info!(
            repo = %repo.name,
            language = %repo.language,
            priority = repo.priority,
            "Repository queued"
        );
    }

    state.stats.repositories_scanned = repositories.len();
    state.stats.started_at.get_or_insert_with(Utc::now);
    state.repositories = repositories;
    state.current_repo_index = 0;
    state.retry_count = 0;
    state.generated_docs.clear();
    state.quality_scores.clear();
    state.error_log.clear();
    state.workflow_status = WorkflowStatus::RepositoriesScanned;

    info!(count = state.repositories.len(), "Repositories found");
    Ok(state)
}

/// Pick a processing strategy from the shape of the workspace.
fn analyze_strategy(mut state: DocumentationState) -> DocumentationState {
    state.documentation_strategy = select_strategy(&state.repositories);
    state.workflow_status = WorkflowStatus::StrategySelected;
    if let Some(strategy) = &state.documentation_strategy {
        info!(strategy = %strategy, "Documentation strategy selected");
    }
    state
}

pub fn select_strategy(repositories: &[RepositoryInfo]) -> Option<String> {
    if repositories.is_empty() {
        return None;
    }

    let languages: BTreeSet<&str> = repositories.iter().map(|r| r.language.as_str()).collect();
    let total_weight: u32 = repositories.iter().map(|r| r.complexity.weight()).sum();
    let avg_complexity = total_weight as f64 / repositories.len() as f64;

    let strategy = if repositories
        .iter()
        .any(|r| r.documentation_status == DocumentationStatus::None)
    {
        "priority_first"
    } else if languages.len() == 1 {
        "batch_processing"
    } else {
        "incremental"
    };

    Some(format!(
        "{}: {} repositories, languages [{}], average complexity {:.1}/3.0",
        strategy,
        repositories.len(),
        languages.into_iter().collect::<Vec<_>>().join(", "),
        avg_complexity
    ))
}

async fn generate_content(
    generator: &dyn ContentGenerator,
    mut state: DocumentationState,
) -> Result<DocumentationState> {
    let Some(repo) = state.current_repository().cloned() else {
        state.workflow_status = WorkflowStatus::AllReposProcessed;
        return Ok(state);
    };

    info!(repo = %repo.name, "Generating documentation");
    let docs = generator.generate(&repo).await?;

    state.stats.documents_generated += docs.len();
    state.stats.total_tokens_used += docs.tokens_used;
    info!(repo = %repo.name, documents = docs.len(), "Documentation generated");

    state.generated_docs.insert(repo.name, docs);
    state.workflow_status = WorkflowStatus::ContentGenerated;
    Ok(state)
}

async fn assess_quality(
    assessor: &dyn QualityAssessor,
    mut state: DocumentationState,
) -> Result<DocumentationState> {
    let Some(repo) = state.current_repository().cloned() else {
        return Ok(state);
    };

    let empty = DocumentSet::default();
    let docs = state.generated_docs.get(&repo.name).unwrap_or(&empty);
    let score = assessor.assess(&repo, docs).await?;

    info!(repo = %repo.name, score, "Quality assessed");
    state.quality_scores.insert(repo.name, score);
    state.workflow_status = WorkflowStatus::QualityAssessed;
    Ok(state)
}

async fn improve_content(
    improver: &dyn ContentImprover,
    mut state: DocumentationState,
) -> Result<DocumentationState> {
    let Some(repo) = state.current_repository().cloned() else {
        return Ok(state);
    };

    let score = state.current_score();
    let Some(docs) = state.generated_docs.get(&repo.name) else {
        warn!(repo = %repo.name, "No documents to improve");
        state.log_error(format!("{}: improvement requested without documents", repo.name));
        return Ok(state);
    };

    info!(repo = %repo.name, score, "Improving documentation");
    let improved = improver.improve(&repo, docs, score).await?;

    state.stats.improvement_passes += 1;
    state.stats.total_tokens_used += improved.tokens_used;
    state.generated_docs.insert(repo.name, improved);
    state.workflow_status = WorkflowStatus::ContentImproved;
    Ok(state)
}

async fn finalize_docs(
    publisher: &dyn Publisher,
    mut state: DocumentationState,
) -> Result<DocumentationState> {
    info!("Finalizing documentation");
    state.stats.finished_at = Some(Utc::now());

    if let Some(location) = publisher.publish(&state).await? {
        info!(path = %location.display(), "Documentation published");
    }

    state.workflow_status = WorkflowStatus::Completed;
    Ok(state)
}
