//! Scripted collaborators and fixtures for docflow tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use futures::future::BoxFuture;

use docflow_core::error::{DocflowError, Result};
use docflow_core::traits::{
    ContentGenerator, ContentImprover, Publisher, QualityAssessor, RepositoryScanner,
};
use docflow_core::types::{DocKind, DocumentSet, DocumentationState, RepositoryInfo};

/// A repository descriptor with test defaults.
pub fn repo(name: &str) -> RepositoryInfo {
    RepositoryInfo::new(name, "Python")
}

/// Create `relative` under `root` with `content`, making parent dirs.
pub fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dirs");
    }
    std::fs::write(&path, content).expect("write fixture file");
    path
}

/// Scanner returning a fixed list.
pub struct FixedScanner {
    repositories: Vec<RepositoryInfo>,
}

impl FixedScanner {
    pub fn new(repositories: Vec<RepositoryInfo>) -> Self {
        Self { repositories }
    }
}

impl RepositoryScanner for FixedScanner {
    fn scan(&self) -> BoxFuture<'_, Result<Vec<RepositoryInfo>>> {
        let repos = self.repositories.clone();
        Box::pin(async move { Ok(repos) })
    }
}

/// Generator producing a one-line README per repository.
pub struct StaticGenerator;

impl ContentGenerator for StaticGenerator {
    fn generate<'a>(&'a self, repo: &'a RepositoryInfo) -> BoxFuture<'a, Result<DocumentSet>> {
        Box::pin(async move {
            let mut docs = DocumentSet::new();
            docs.insert(DocKind::Readme, format!("# {}", repo.name));
            docs.tokens_used = 10;
            Ok(docs)
        })
    }
}

/// Assessor replaying a script of scores per repository.
///
/// Each call pops the next score for the repository; once the script runs
/// out the last score repeats. Unscripted repositories score 0.9.
#[derive(Default)]
pub struct ScriptedAssessor {
    scripts: Mutex<HashMap<String, VecDeque<f64>>>,
    last: Mutex<HashMap<String, f64>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAssessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(self, repo: &str, scores: &[f64]) -> Self {
        self.scripts
            .lock()
            .expect("scripts lock")
            .insert(repo.to_string(), scores.iter().copied().collect());
        self
    }

    /// Repository names in the order they were assessed.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn next_score(&self, repo: &str) -> f64 {
        self.calls.lock().expect("calls lock").push(repo.to_string());
        let popped = self
            .scripts
            .lock()
            .expect("scripts lock")
            .get_mut(repo)
            .and_then(VecDeque::pop_front);
        let mut last = self.last.lock().expect("last lock");
        match popped {
            Some(score) => {
                last.insert(repo.to_string(), score);
                score
            }
            None => last.get(repo).copied().unwrap_or(0.9),
        }
    }
}

impl QualityAssessor for ScriptedAssessor {
    fn assess<'a>(
        &'a self,
        repo: &'a RepositoryInfo,
        _docs: &'a DocumentSet,
    ) -> BoxFuture<'a, Result<f64>> {
        let score = self.next_score(&repo.name);
        Box::pin(async move { Ok(score) })
    }
}

/// Assessor that always fails.
pub struct FailingAssessor;

impl QualityAssessor for FailingAssessor {
    fn assess<'a>(
        &'a self,
        _repo: &'a RepositoryInfo,
        _docs: &'a DocumentSet,
    ) -> BoxFuture<'a, Result<f64>> {
        Box::pin(async { Err(DocflowError::collaborator("assessor", "model unavailable")) })
    }
}

/// Improver that tags every document as improved.
pub struct EchoImprover;

impl ContentImprover for EchoImprover {
    fn improve<'a>(
        &'a self,
        _repo: &'a RepositoryInfo,
        docs: &'a DocumentSet,
        _score: f64,
    ) -> BoxFuture<'a, Result<DocumentSet>> {
        Box::pin(async move {
            let mut improved = DocumentSet::new();
            for (kind, content) in &docs.documents {
                improved.insert(*kind, format!("{}\n(improved)", content));
            }
            improved.tokens_used = 5;
            Ok(improved)
        })
    }
}

/// Publisher that writes nothing.
pub struct NullPublisher;

impl Publisher for NullPublisher {
    fn publish<'a>(
        &'a self,
        _state: &'a DocumentationState,
    ) -> BoxFuture<'a, Result<Option<PathBuf>>> {
        Box::pin(async { Ok(None) })
    }
}
