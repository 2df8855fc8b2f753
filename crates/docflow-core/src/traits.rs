use std::path::PathBuf;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::*;

/// Produces the ordered repository list for a run.
pub trait RepositoryScanner: Send + Sync + 'static {
    /// Scan and return repositories, highest priority first.
    fn scan(&self) -> BoxFuture<'_, Result<Vec<RepositoryInfo>>>;
}

/// Generates one document set per repository.
pub trait ContentGenerator: Send + Sync + 'static {
    fn generate<'a>(&'a self, repo: &'a RepositoryInfo) -> BoxFuture<'a, Result<DocumentSet>>;
}

/// Quality assessment of a generated document set.
///
/// Implementations should collapse malformed upstream output into a
/// default score instead of failing.
pub trait QualityAssessor: Send + Sync + 'static {
    fn assess<'a>(
        &'a self,
        repo: &'a RepositoryInfo,
        docs: &'a DocumentSet,
    ) -> BoxFuture<'a, Result<f64>>;
}

/// Rewrites a document set given its last score.
pub trait ContentImprover: Send + Sync + 'static {
    fn improve<'a>(
        &'a self,
        repo: &'a RepositoryInfo,
        docs: &'a DocumentSet,
        score: f64,
    ) -> BoxFuture<'a, Result<DocumentSet>>;
}

/// Publishing of the final state (files, reports, ...).
pub trait Publisher: Send + Sync + 'static {
    /// Publish and return the output location, if any.
    fn publish<'a>(
        &'a self,
        state: &'a DocumentationState,
    ) -> BoxFuture<'a, Result<Option<PathBuf>>>;
}
