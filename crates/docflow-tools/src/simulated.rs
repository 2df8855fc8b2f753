//! Template-backed stand-in for a documentation language model.
//!
//! Generation, assessment and improvement all go through [`SimulatedModel`],
//! which charges tokens per prompt word and can sleep to mimic latency.
//! Quality scores are drawn uniformly from `[0.70, 0.95]`; a seed makes a
//! run reproducible.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use docflow_core::config::ModelConfig;
use docflow_core::error::{DocflowError, Result};
use docflow_core::traits::{ContentGenerator, ContentImprover, QualityAssessor};
use docflow_core::types::{Complexity, DocKind, DocumentSet, RepositoryInfo};

/// Score used when the assessment text is not a usable number.
pub const DEFAULT_QUALITY_SCORE: f64 = 0.75;

const TOKENS_PER_WORD: u64 = 2;
const SCORE_RANGE: std::ops::RangeInclusive<f64> = 0.70..=0.95;

/// Parse an assessment into a score, falling back to `default` for
/// non-numeric or non-finite text.
pub fn parse_score(text: &str, default: f64) -> f64 {
    match text.trim().parse::<f64>() {
        Ok(score) if score.is_finite() => score,
        _ => default,
    }
}

pub struct SimulatedModel {
    latency: Duration,
    rng: Mutex<StdRng>,
    tokens: AtomicU64,
    default_score: f64,
}

impl SimulatedModel {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            latency: Duration::ZERO,
            rng: Mutex::new(rng),
            tokens: AtomicU64::new(0),
            default_score: DEFAULT_QUALITY_SCORE,
        }
    }

    pub fn from_config(config: &ModelConfig, default_score: f64) -> Self {
        let model = match config.seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::new(),
        };
        model
            .with_latency(Duration::from_millis(config.latency_ms))
            .with_default_score(default_score)
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_default_score(mut self, score: f64) -> Self {
        self.default_score = score;
        self
    }

    /// Tokens charged across every call so far.
    pub fn tokens_used(&self) -> u64 {
        self.tokens.load(Ordering::Relaxed)
    }

    /// Charge for a prompt and wait out the simulated latency.
    async fn charge(&self, prompt: &str) -> u64 {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let tokens = prompt.split_whitespace().count() as u64 * TOKENS_PER_WORD;
        self.tokens.fetch_add(tokens, Ordering::Relaxed);
        tokens
    }

    fn draw_score(&self) -> Result<String> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| DocflowError::collaborator("model", "score generator poisoned"))?;
        Ok(format!("{:.2}", rng.gen_range(SCORE_RANGE)))
    }

    /// Document kinds worth producing for a repository.
    pub fn plan(repo: &RepositoryInfo) -> Vec<DocKind> {
        let mut kinds = vec![DocKind::Readme];
        if matches!(repo.complexity, Complexity::Medium | Complexity::Complex) {
            kinds.push(DocKind::Architecture);
        }
        let serves_api = repo.dependencies.iter().any(|dep| {
            let dep = dep.to_lowercase();
            dep.contains("api") || dep.contains("flask") || dep.contains("express")
        });
        if serves_api {
            kinds.push(DocKind::Api);
        }
        kinds
    }

    async fn generate_set(&self, repo: &RepositoryInfo) -> Result<DocumentSet> {
        let mut docs = DocumentSet::new();
        for kind in Self::plan(repo) {
            let prompt = generation_prompt(repo, kind);
            docs.tokens_used += self.charge(&prompt).await;
            docs.insert(kind, render_template(repo, kind));
        }
        debug!(repo = %repo.name, documents = docs.len(), tokens = docs.tokens_used, "Generated");
        Ok(docs)
    }

    async fn assess_set(&self, repo: &RepositoryInfo, docs: &DocumentSet) -> Result<f64> {
        let kinds: Vec<&str> = docs.kinds().into_iter().map(DocKind::as_str).collect();
        let prompt = format!(
            "Assess the quality of documentation for {}. Documents generated: [{}]. \
             Repository complexity: {}. Rate overall quality from 0.0 to 1.0 considering \
             completeness, clarity, technical accuracy and presentation. \
             Provide only the numeric score.",
            repo.name,
            kinds.join(", "),
            repo.complexity
        );
        self.charge(&prompt).await;
        let reply = self.draw_score()?;
        Ok(parse_score(&reply, self.default_score))
    }

    async fn improve_set(
        &self,
        repo: &RepositoryInfo,
        docs: &DocumentSet,
        score: f64,
    ) -> Result<DocumentSet> {
        let mut improved = DocumentSet::new();
        for (kind, content) in &docs.documents {
            let prompt = format!(
                "Improve this {} documentation (current quality: {:.2}):\n\n{}\n\n\
                 Focus on missing information, clarity, formatting and practical examples.",
                kind, score, content
            );
            improved.tokens_used += self.charge(&prompt).await;
            improved.insert(
                *kind,
                format!(
                    "{}\n---\n_Revised after a quality score of {:.2}._\n",
                    render_template(repo, *kind),
                    score
                ),
            );
        }
        Ok(improved)
    }
}

impl Default for SimulatedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentGenerator for SimulatedModel {
    fn generate<'a>(&'a self, repo: &'a RepositoryInfo) -> BoxFuture<'a, Result<DocumentSet>> {
        Box::pin(self.generate_set(repo))
    }
}

impl QualityAssessor for SimulatedModel {
    fn assess<'a>(
        &'a self,
        repo: &'a RepositoryInfo,
        docs: &'a DocumentSet,
    ) -> BoxFuture<'a, Result<f64>> {
        Box::pin(self.assess_set(repo, docs))
    }
}

impl ContentImprover for SimulatedModel {
    fn improve<'a>(
        &'a self,
        repo: &'a RepositoryInfo,
        docs: &'a DocumentSet,
        score: f64,
    ) -> BoxFuture<'a, Result<DocumentSet>> {
        Box::pin(self.improve_set(repo, docs, score))
    }
}

fn generation_prompt(repo: &RepositoryInfo, kind: DocKind) -> String {
    match kind {
        DocKind::Readme => format!(
            "Generate comprehensive README documentation for repository {} \
             (language {}, complexity {}, dependencies: {}). \
             Include installation, usage, and configuration sections.",
            repo.name,
            repo.language,
            repo.complexity,
            repo.dependencies.join(", ")
        ),
        DocKind::Architecture => format!(
            "Generate architecture documentation for {}. \
             Focus on system design, components, and data flow.",
            repo.name
        ),
        DocKind::Api => format!(
            "Generate API documentation for {}. \
             Include endpoints, authentication, and examples.",
            repo.name
        ),
    }
}

fn render_template(repo: &RepositoryInfo, kind: DocKind) -> String {
    let deps = if repo.dependencies.is_empty() {
        "- none detected".to_string()
    } else {
        repo.dependencies
            .iter()
            .map(|d| format!("- `{}`", d))
            .collect::<Vec<_>>()
            .join("\n")
    };

    match kind {
        DocKind::Readme => format!(
            "# {name}\n\n\
             ## Overview\n\
             {name} is a {language} project of {complexity} complexity \
             ({size} lines of code).\n\n\
             ## Dependencies\n{deps}\n\n\
             ## Installation\n\
             Clone the repository and install the {language} toolchain.\n\n\
             ## Usage\n\
             See the architecture notes for the main entry points.\n\n\
             ## Contributing\n\
             1. Fork the repository\n\
             2. Create a feature branch\n\
             3. Submit a pull request\n",
            name = repo.name,
            language = repo.language,
            complexity = repo.complexity,
            size = repo.size,
            deps = deps,
        ),
        DocKind::Architecture => format!(
            "# {name} Architecture\n\n\
             ## Overview\n\
             The codebase is organised around a small set of {language} modules.\n\n\
             ## Components\n\
             - Entry point and configuration loading\n\
             - Domain logic\n\
             - Integrations:\n{deps}\n\n\
             ## Data Flow\n\
             Requests enter through the entry point, pass through the domain \
             layer and reach external services through the integrations above.\n",
            name = repo.name,
            language = repo.language,
            deps = deps,
        ),
        DocKind::Api => format!(
            "# {name} API\n\n\
             ## Base URL\n\
             ```\nhttp://localhost:8000/api/v1\n```\n\n\
             ## Authentication\n\
             Send `Authorization: Bearer <token>` with every request.\n\n\
             ## Errors\n\
             - `400` invalid parameters\n\
             - `401` missing or invalid credentials\n\
             - `404` resource not found\n\
             - `500` internal error\n",
            name = repo.name,
        ),
    }
}
