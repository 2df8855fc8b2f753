use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use docflow_core::error::{DocflowError, Result};
use docflow_core::traits::RepositoryScanner;
use docflow_core::types::{Complexity, DocumentationStatus, RepositoryInfo};

/// Files whose presence marks a directory as a repository.
const REPOSITORY_INDICATORS: &[&str] = &[
    ".git",
    "package.json",
    "requirements.txt",
    "go.mod",
    "Cargo.toml",
    "pom.xml",
    ".gitignore",
];

/// Entry points tried, in order, before falling back to any source file.
const MAIN_FILES: &[&str] = &["main.py", "app.py", "index.js", "main.js", "main.go"];

const SAMPLE_EXTENSIONS: &[&str] = &["py", "js", "ts", "java", "go"];

const DOC_MARKERS: &[&str] = &["README.md", "README.rst", "docs", "documentation"];

/// Language for a source file extension (lowercase, no dot).
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "py" => Some("Python"),
        "js" => Some("JavaScript"),
        "ts" => Some("TypeScript"),
        "java" => Some("Java"),
        "go" => Some("Go"),
        "rs" => Some("Rust"),
        "cpp" => Some("C++"),
        "c" => Some("C"),
        _ => None,
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

fn is_code_file(path: &Path) -> bool {
    extension_of(path)
        .as_deref()
        .and_then(language_for_extension)
        .is_some()
}

/// Discovers repositories among the immediate sub-directories of a workspace.
pub struct WorkspaceScanner {
    root: PathBuf,
    skip_dirs: Vec<String>,
}

impl WorkspaceScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            skip_dirs: Vec::new(),
        }
    }

    /// Never treat a sub-directory with this name as a repository.
    pub fn skip_dir(mut self, name: impl Into<String>) -> Self {
        self.skip_dirs.push(name.into());
        self
    }

    /// Synchronous scan. Repositories come back highest priority first,
    /// ties broken by name.
    pub fn scan_blocking(&self) -> Result<Vec<RepositoryInfo>> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| DocflowError::Scan {
            path: self.root.display().to_string(),
            message: e.to_string(),
        })?;

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .filter(|p| {
                let name = p
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                !name.starts_with('.') && !self.skip_dirs.contains(&name)
            })
            .collect();
        candidates.sort();

        let mut repositories = Vec::new();
        for path in candidates {
            if !is_code_repository(&path) {
                debug!(path = %path.display(), "Not a repository, skipping");
                continue;
            }
            match analyze_repository(&path) {
                Ok(repo) => repositories.push(repo),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to analyze repository"),
            }
        }

        repositories.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        info!(
            root = %self.root.display(),
            count = repositories.len(),
            "Workspace scan complete"
        );
        Ok(repositories)
    }
}

impl RepositoryScanner for WorkspaceScanner {
    fn scan(&self) -> BoxFuture<'_, Result<Vec<RepositoryInfo>>> {
        let scanner = WorkspaceScanner {
            root: self.root.clone(),
            skip_dirs: self.skip_dirs.clone(),
        };
        Box::pin(async move {
            tokio::task::spawn_blocking(move || scanner.scan_blocking())
                .await
                .map_err(|e| DocflowError::collaborator("scanner", e.to_string()))?
        })
    }
}

/// Every file below `path`, skipping `.git` internals, in a stable order.
fn walk_files(path: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
}

pub fn is_code_repository(path: &Path) -> bool {
    REPOSITORY_INDICATORS
        .iter()
        .any(|indicator| path.join(indicator).exists())
        || walk_files(path).any(|f| is_code_file(&f))
}

fn analyze_repository(path: &Path) -> Result<RepositoryInfo> {
    // Surface unreadable directories before doing any work.
    std::fs::read_dir(path).map_err(|e| DocflowError::Scan {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let language = detect_language(path);
    let size = count_code_lines(path);
    let (complexity, dependencies) = profile(path);
    let documentation_status = documentation_status(path);
    let priority = priority(size, complexity, documentation_status);

    debug!(
        repo = %name,
        language = %language,
        size,
        %complexity,
        docs = %documentation_status,
        priority,
        "Repository analyzed"
    );

    Ok(RepositoryInfo {
        name,
        path: path.display().to_string(),
        language,
        size,
        complexity,
        documentation_status,
        priority,
        dependencies,
    })
}

/// Most frequent source language; ties go to the alphabetically first.
pub fn detect_language(path: &Path) -> String {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for file in walk_files(path) {
        if let Some(lang) = extension_of(&file).as_deref().and_then(language_for_extension) {
            *counts.entry(lang).or_default() += 1;
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (lang, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((lang, count));
        }
    }
    best.map(|(lang, _)| lang.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Non-blank lines across all source files. Unreadable files count as zero.
pub fn count_code_lines(path: &Path) -> usize {
    walk_files(path)
        .filter(|f| is_code_file(f))
        .filter_map(|f| std::fs::read(&f).ok())
        .map(|bytes| {
            String::from_utf8_lossy(&bytes)
                .lines()
                .filter(|l| !l.trim().is_empty())
                .count()
        })
        .sum()
}

/// The file that best represents the repository's code.
fn sample_file(path: &Path) -> Option<PathBuf> {
    MAIN_FILES
        .iter()
        .map(|f| path.join(f))
        .find(|p| p.is_file())
        .or_else(|| {
            walk_files(path).find(|f| {
                extension_of(f)
                    .map(|e| SAMPLE_EXTENSIONS.contains(&e.as_str()))
                    .unwrap_or(false)
            })
        })
}

/// Complexity and typical dependencies, inferred from the sample file kind.
pub fn profile(path: &Path) -> (Complexity, Vec<String>) {
    let ext = sample_file(path).and_then(|f| extension_of(&f));
    let deps = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
    match ext.as_deref() {
        Some("py") => (Complexity::Medium, deps(&["flask", "requests", "sqlalchemy"])),
        Some("js") => (Complexity::Simple, deps(&["react", "axios", "lodash"])),
        _ => (Complexity::Simple, Vec::new()),
    }
}

pub fn documentation_status(path: &Path) -> DocumentationStatus {
    let existing: Vec<&str> = DOC_MARKERS
        .iter()
        .copied()
        .filter(|m| path.join(m).exists())
        .collect();

    match existing.as_slice() {
        [] => DocumentationStatus::None,
        [only] if only.starts_with("README") => DocumentationStatus::Basic,
        _ => DocumentationStatus::Comprehensive,
    }
}

/// Size factor + complexity factor + documentation gap.
pub fn priority(size: usize, complexity: Complexity, docs: DocumentationStatus) -> u32 {
    let size_factor = if size > 5000 {
        30
    } else if size > 1000 {
        20
    } else {
        10
    };
    let complexity_factor = complexity.weight() * 10;
    let doc_gap = match docs {
        DocumentationStatus::None => 40,
        DocumentationStatus::Basic => 20,
        DocumentationStatus::Comprehensive => 5,
    };
    size_factor + complexity_factor + doc_gap
}
