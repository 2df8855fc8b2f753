use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use docflow_core::config::QualityConfig;
use docflow_core::error::Result;
use docflow_core::types::{DocumentationState, QualityTier};

use crate::graph::Router;

/// Routing decision taken after a quality assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Score too low, retries left: improve and re-assess.
    Improve,
    /// Cursor advanced to another repository.
    NextRepo,
    /// No repositories left.
    Finalize,
}

impl GateDecision {
    pub fn label(self) -> &'static str {
        match self {
            Self::Improve => "improve",
            Self::NextRepo => "next_repo",
            Self::Finalize => "finalize",
        }
    }
}

/// Bounded-retry quality gate.
///
/// Evaluated in order:
/// 1. cursor past the last repository: `finalize`;
/// 2. score >= `high_threshold`: advance, then `finalize` if that was the
///    last repository, else `next_repo`;
/// 3. score >= `acceptable_threshold`: same as 2;
/// 4. otherwise `improve` while fewer than `max_retries` retries were spent
///    on this repository, else advance and `next_repo`.
///
/// Advancing always resets the retry counter, so each repository starts
/// with a fresh budget. Missing scores count as 0.
///
/// Cases 2 and 3 route identically: an acceptable score never triggers an
/// improvement pass. Raise `acceptable_threshold` to `high_threshold` to
/// make every sub-high score retry instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityGate {
    pub high_threshold: f64,
    pub acceptable_threshold: f64,
    pub max_retries: u32,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self {
            high_threshold: 0.8,
            acceptable_threshold: 0.6,
            max_retries: 2,
        }
    }
}

impl From<&QualityConfig> for QualityGate {
    fn from(config: &QualityConfig) -> Self {
        Self {
            high_threshold: config.high_threshold,
            acceptable_threshold: config.acceptable_threshold,
            max_retries: config.max_retries,
        }
    }
}

impl QualityGate {
    pub fn tier(&self, score: f64) -> QualityTier {
        QualityTier::classify(score, self.high_threshold, self.acceptable_threshold)
    }

    /// Decide the next branch, updating cursor and retry counter in place.
    pub fn decide(&self, state: &mut DocumentationState) -> GateDecision {
        let Some(repo) = state.current_repository() else {
            return GateDecision::Finalize;
        };
        let name = repo.name.clone();
        let score = state.current_score();

        match self.tier(score) {
            tier @ (QualityTier::High | QualityTier::Acceptable) => {
                debug!(repo = %name, score, ?tier, "Quality gate passed");
                Self::advance(state)
            }
            QualityTier::Low if state.retry_count < self.max_retries => {
                state.retry_count += 1;
                info!(
                    repo = %name,
                    score,
                    attempt = state.retry_count,
                    max_retries = self.max_retries,
                    "Quality below threshold, requesting improvement"
                );
                GateDecision::Improve
            }
            QualityTier::Low => {
                warn!(
                    repo = %name,
                    score,
                    retries = state.retry_count,
                    "Retries exhausted, skipping repository"
                );
                state.stats.forced_skips += 1;
                state.log_error(format!(
                    "{}: quality {:.2} still below {:.2} after {} improvement attempts",
                    name, score, self.acceptable_threshold, state.retry_count
                ));
                state.current_repo_index += 1;
                state.retry_count = 0;
                GateDecision::NextRepo
            }
        }
    }

    fn advance(state: &mut DocumentationState) -> GateDecision {
        state.current_repo_index += 1;
        state.retry_count = 0;
        if state.is_exhausted() {
            GateDecision::Finalize
        } else {
            GateDecision::NextRepo
        }
    }
}

impl Router<DocumentationState> for QualityGate {
    fn route(
        &self,
        mut state: DocumentationState,
    ) -> BoxFuture<'static, Result<(DocumentationState, String)>> {
        let decision = self.decide(&mut state);
        Box::pin(async move { Ok((state, decision.label().to_string())) })
    }
}
