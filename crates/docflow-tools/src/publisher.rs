use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tracing::{debug, info};

use docflow_core::config::QualityConfig;
use docflow_core::error::Result;
use docflow_core::traits::Publisher;
use docflow_core::types::{DocumentationState, QualityTier};

pub const REPORT_FILE: &str = "generation_report.md";

/// Writes generated documents and a summary report under one output directory.
///
/// Layout: `<output_dir>/<repo>/<KIND>.md` plus `<output_dir>/generation_report.md`.
pub struct FilePublisher {
    output_dir: PathBuf,
    quality: QualityConfig,
}

impl FilePublisher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            quality: QualityConfig::default(),
        }
    }

    /// Thresholds used for the report's quality distribution.
    pub fn with_quality(mut self, quality: QualityConfig) -> Self {
        self.quality = quality;
        self
    }

    async fn write_all(&self, state: &DocumentationState) -> Result<Option<PathBuf>> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        for (repo, docs) in &state.generated_docs {
            let repo_dir = self.output_dir.join(repo);
            tokio::fs::create_dir_all(&repo_dir).await?;
            for (kind, content) in &docs.documents {
                let path = repo_dir.join(kind.file_name());
                tokio::fs::write(&path, content).await?;
                debug!(path = %path.display(), "Document written");
            }
        }

        let report = render_report(state, &self.quality, Utc::now());
        tokio::fs::write(self.output_dir.join(REPORT_FILE), report).await?;

        info!(
            dir = %self.output_dir.display(),
            repositories = state.generated_docs.len(),
            "Documentation written"
        );
        Ok(Some(self.output_dir.clone()))
    }
}

impl Publisher for FilePublisher {
    fn publish<'a>(
        &'a self,
        state: &'a DocumentationState,
    ) -> BoxFuture<'a, Result<Option<PathBuf>>> {
        Box::pin(self.write_all(state))
    }
}

/// Render the markdown run report.
pub fn render_report(
    state: &DocumentationState,
    quality: &QualityConfig,
    generated_at: DateTime<Utc>,
) -> String {
    let stats = &state.stats;
    let duration = stats.duration_secs();
    let processed = state.generated_docs.len();
    let mut out = String::new();

    let _ = writeln!(out, "# Documentation Generation Report\n");
    let _ = writeln!(
        out,
        "**Generated on:** {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    );

    let _ = writeln!(out, "## Summary\n");
    let _ = writeln!(out, "- **Repositories Scanned:** {}", stats.repositories_scanned);
    let _ = writeln!(out, "- **Repositories Processed:** {}", processed);
    let _ = writeln!(out, "- **Total Documents Generated:** {}", stats.documents_generated);
    let _ = writeln!(out, "- **Processing Time:** {:.2} seconds", duration);
    match state.average_quality() {
        Some(avg) => {
            let _ = writeln!(out, "- **Average Quality Score:** {:.2}", avg);
        }
        None => {
            let _ = writeln!(out, "- **Average Quality Score:** n/a");
        }
    }
    let _ = writeln!(out, "- **Total Tokens Used:** {}", stats.total_tokens_used);
    let _ = writeln!(out, "- **Improvement Passes:** {}", stats.improvement_passes);
    let _ = writeln!(out, "- **Repositories Skipped:** {}", stats.forced_skips);
    if let Some(strategy) = &state.documentation_strategy {
        let _ = writeln!(out, "- **Strategy:** {}", strategy);
    }

    let _ = writeln!(out, "\n## Repository Analysis\n");
    let _ = writeln!(
        out,
        "| Repository | Language | Complexity | Documents | Quality Score |"
    );
    let _ = writeln!(
        out,
        "|------------|----------|------------|-----------|---------------|"
    );
    for repo in &state.repositories {
        let Some(docs) = state.generated_docs.get(&repo.name) else {
            continue;
        };
        let score = state.quality_scores.get(&repo.name).copied().unwrap_or(0.0);
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {:.2} |",
            repo.name,
            repo.language,
            repo.complexity,
            docs.len(),
            score
        );
    }

    let (mut high, mut acceptable, mut low) = (0, 0, 0);
    for score in state.quality_scores.values() {
        match QualityTier::classify(*score, quality.high_threshold, quality.acceptable_threshold) {
            QualityTier::High => high += 1,
            QualityTier::Acceptable => acceptable += 1,
            QualityTier::Low => low += 1,
        }
    }
    let _ = writeln!(out, "\n## Quality Distribution\n");
    let _ = writeln!(
        out,
        "- **High Quality (>={:.1}):** {} repositories",
        quality.high_threshold, high
    );
    let _ = writeln!(
        out,
        "- **Acceptable Quality ({:.1}-{:.1}):** {} repositories",
        quality.acceptable_threshold, quality.high_threshold, acceptable
    );
    let _ = writeln!(
        out,
        "- **Low Quality (<{:.1}):** {} repositories",
        quality.acceptable_threshold, low
    );

    let _ = writeln!(out, "\n## Generated Documentation Structure\n");
    for (repo, docs) in &state.generated_docs {
        let _ = writeln!(out, "### {}", repo);
        for kind in docs.kinds() {
            let _ = writeln!(out, "- {}", kind.file_name());
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "## Performance Metrics\n");
    let _ = writeln!(
        out,
        "- **Average Processing Time per Repository:** {:.2} seconds",
        duration / processed.max(1) as f64
    );
    let _ = writeln!(
        out,
        "- **Token Efficiency:** {:.0} tokens per document",
        stats.total_tokens_used as f64 / stats.documents_generated.max(1) as f64
    );

    if !state.error_log.is_empty() {
        let _ = writeln!(out, "\n## Issues\n");
        for error in &state.error_log {
            let _ = writeln!(out, "- {}", error);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_core::types::{DocKind, DocumentSet, RepositoryInfo};

    fn finished_state() -> DocumentationState {
        let mut state = DocumentationState::with_repositories(vec![
            RepositoryInfo::new("backend", "Python"),
            RepositoryInfo::new("frontend", "JavaScript"),
            RepositoryInfo::new("legacy", "C"),
        ]);
        let mut backend = DocumentSet::new();
        backend.insert(DocKind::Readme, "# backend");
        backend.insert(DocKind::Api, "# backend API");
        let mut frontend = DocumentSet::new();
        frontend.insert(DocKind::Readme, "# frontend");
        state.generated_docs.insert("backend".into(), backend);
        state.generated_docs.insert("frontend".into(), frontend);
        state.quality_scores.insert("backend".into(), 0.9);
        state.quality_scores.insert("frontend".into(), 0.4);
        state.stats.documents_generated = 3;
        state.stats.total_tokens_used = 300;
        state.stats.repositories_scanned = 3;
        state
    }

    #[test]
    fn test_report_sections() {
        let report = render_report(&finished_state(), &QualityConfig::default(), Utc::now());
        assert!(report.starts_with("# Documentation Generation Report"));
        assert!(report.contains("- **Repositories Processed:** 2"));
        assert!(report.contains("- **Average Quality Score:** 0.65"));
        assert!(report.contains("| backend | Python | Simple | 2 | 0.90 |"));
        assert!(!report.contains("| legacy |"));
        assert!(report.contains("- **High Quality (>=0.8):** 1 repositories"));
        assert!(report.contains("- **Low Quality (<0.6):** 1 repositories"));
        assert!(report.contains("### backend\n- README.md\n- API.md\n"));
        assert!(report.contains("100 tokens per document"));
    }

    #[test]
    fn test_report_without_scores() {
        let state = DocumentationState::new();
        let report = render_report(&state, &QualityConfig::default(), Utc::now());
        assert!(report.contains("- **Average Quality Score:** n/a"));
        assert!(!report.contains("## Issues"));
    }

    #[tokio::test]
    async fn test_publish_writes_documents_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("agentic_documentation");
        let publisher = FilePublisher::new(&out);

        let location = publisher.publish(&finished_state()).await.unwrap();
        assert_eq!(location, Some(out.clone()));

        let readme = std::fs::read_to_string(out.join("backend/README.md")).unwrap();
        assert_eq!(readme, "# backend");
        assert!(out.join("backend/API.md").exists());
        assert!(out.join("frontend/README.md").exists());
        assert!(!out.join("legacy").exists());
        assert!(out.join(REPORT_FILE).exists());
    }
}
