use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocflowError, Result};

/// Top-level docflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub log: Option<LogConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Maximum node invocations per run. `0` removes the limit.
    #[serde(default = "default_max_steps")]
    pub max_steps: Option<usize>,
    /// Default workspace to scan when none is given on the command line.
    #[serde(default = "default_workspace")]
    pub workspace: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            workspace: default_workspace(),
        }
    }
}

fn default_max_steps() -> Option<usize> {
    Some(1_000)
}

fn default_workspace() -> String {
    ".".to_string()
}

/// Quality gate thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Scores at or above this are "high quality".
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    /// Scores at or above this (and below high) are "acceptable".
    #[serde(default = "default_acceptable_threshold")]
    pub acceptable_threshold: f64,
    /// Improvement attempts per repository before it is skipped.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Score used when an assessment is not a number.
    #[serde(default = "default_score")]
    pub default_score: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            high_threshold: default_high_threshold(),
            acceptable_threshold: default_acceptable_threshold(),
            max_retries: default_max_retries(),
            default_score: default_score(),
        }
    }
}

fn default_high_threshold() -> f64 { 0.8 }
fn default_acceptable_threshold() -> f64 { 0.6 }
fn default_max_retries() -> u32 { 2 }
fn default_score() -> f64 { 0.75 }

/// Simulated model settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Artificial latency per model call, in milliseconds.
    #[serde(default)]
    pub latency_ms: u64,
    /// Seed for reproducible quality scores.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory (under the workspace) receiving generated docs.
    #[serde(default = "default_output_dir")]
    pub dir_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir_name: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "agentic_documentation".to_string()
}

/// JSONL run log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Enable the run log (default: true when section is present).
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// Directory for log files. Default: <workspace>/<output>/logs
    #[serde(default)]
    pub log_dir: Option<String>,
    /// 1 = run summary, 2 = + routing decisions, 3 = + every node.
    #[serde(default = "default_log_level")]
    pub level: u8,
}

fn default_log_enabled() -> bool { true }
fn default_log_level() -> u8 { 2 }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| DocflowError::ConfigNotFound(path.display().to_string()))?;

        Self::from_toml(&content)
    }

    /// Parse config text, expanding `${ENV_VAR}` references first.
    pub fn from_toml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);

        let config: Self =
            toml::from_str(&expanded).map_err(|e| DocflowError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject threshold combinations the quality gate cannot honour.
    pub fn validate(&self) -> Result<()> {
        let q = &self.quality;
        if !(0.0..=1.0).contains(&q.acceptable_threshold) || !(0.0..=1.0).contains(&q.high_threshold) {
            return Err(DocflowError::Config(
                "quality thresholds must lie in [0, 1]".to_string(),
            ));
        }
        if q.acceptable_threshold > q.high_threshold {
            return Err(DocflowError::Config(format!(
                "acceptable_threshold ({}) exceeds high_threshold ({})",
                q.acceptable_threshold, q.high_threshold
            )));
        }
        Ok(())
    }

    /// Effective step limit, with `0` meaning unbounded.
    pub fn step_limit(&self) -> Option<usize> {
        self.workflow.max_steps.filter(|&limit| limit > 0)
    }

    /// Resolve the workspace directory (expand ~).
    pub fn workspace_dir(&self) -> PathBuf {
        let ws = &self.workflow.workspace;
        if let Some(rest) = ws.strip_prefix("~/") {
            if let Some(home) = dirs_home() {
                return home.join(rest);
            }
        }
        PathBuf::from(ws)
    }

    /// Directory for JSONL run logs under a given workspace, if logging is on.
    pub fn log_dir(&self, workspace: &Path) -> Option<PathBuf> {
        let log = self.log.as_ref().filter(|l| l.enabled)?;
        Some(match &log.log_dir {
            Some(dir) => PathBuf::from(dir),
            None => workspace.join(&self.output.dir_name).join("logs"),
        })
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_DOCFLOW_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_DOCFLOW_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_DOCFLOW_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_DOCFLOW_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_DOCFLOW_VAR}\"");
    }

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.workflow.max_steps, Some(1_000));
        assert_eq!(config.quality.high_threshold, 0.8);
        assert_eq!(config.quality.acceptable_threshold, 0.6);
        assert_eq!(config.quality.max_retries, 2);
        assert_eq!(config.quality.default_score, 0.75);
        assert_eq!(config.output.dir_name, "agentic_documentation");
        assert!(config.log.is_none());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let toml_str = r#"
[quality]
high_threshold = 0.5
acceptable_threshold = 0.7
"#;
        let err = AppConfig::from_toml(toml_str).unwrap_err();
        assert!(matches!(err, DocflowError::Config(_)));
    }

    #[test]
    fn test_zero_step_limit_means_unbounded() {
        let toml_str = r#"
[workflow]
max_steps = 0
"#;
        let config = AppConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.step_limit(), None);
        assert_eq!(AppConfig::default().step_limit(), Some(1_000));
    }

    #[test]
    fn test_log_dir_resolution() {
        let toml_str = r#"
[log]
"#;
        let config = AppConfig::from_toml(toml_str).unwrap();
        let dir = config.log_dir(Path::new("/ws")).unwrap();
        assert_eq!(dir, PathBuf::from("/ws/agentic_documentation/logs"));

        let config = AppConfig::default();
        assert!(config.log_dir(Path::new("/ws")).is_none());
    }
}
