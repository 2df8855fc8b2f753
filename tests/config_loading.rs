use std::io::Write;
use std::path::Path;

use docflow_core::config::AppConfig;
use docflow_core::error::DocflowError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[workflow]
max_steps = 250
workspace = "/tmp/docflow-test"

[quality]
high_threshold = 0.85
acceptable_threshold = 0.65
max_retries = 3
default_score = 0.7

[model]
latency_ms = 20
seed = 42

[output]
dir_name = "generated_docs"

[log]
log_dir = "/tmp/docflow-logs"
level = 3
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.workflow.max_steps, Some(250));
    assert_eq!(config.workspace_dir(), Path::new("/tmp/docflow-test"));
    assert_eq!(config.quality.high_threshold, 0.85);
    assert_eq!(config.quality.acceptable_threshold, 0.65);
    assert_eq!(config.quality.max_retries, 3);
    assert_eq!(config.quality.default_score, 0.7);
    assert_eq!(config.model.latency_ms, 20);
    assert_eq!(config.model.seed, Some(42));
    assert_eq!(config.output.dir_name, "generated_docs");

    let log = config.log.as_ref().expect("log section");
    assert!(log.enabled);
    assert_eq!(log.level, 3);
    assert_eq!(
        config.log_dir(Path::new("/ws")),
        Some(Path::new("/tmp/docflow-logs").to_path_buf())
    );
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("DOCFLOW_TEST_WORKSPACE", "/srv/repos");
    let toml_content = r#"
[workflow]
workspace = "${DOCFLOW_TEST_WORKSPACE}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.workflow.workspace, "/srv/repos");
    std::env::remove_var("DOCFLOW_TEST_WORKSPACE");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[model]\nseed = 1\n").expect("write");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.workflow.max_steps, Some(1_000));
    assert_eq!(config.quality.max_retries, 2);
    assert_eq!(config.model.latency_ms, 0);
    assert_eq!(config.output.dir_name, "agentic_documentation");
    assert!(config.log_dir(Path::new("/ws")).is_none());
}

#[test]
fn test_disabled_log_section() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[log]\nenabled = false\n").expect("write");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert!(config.log_dir(Path::new("/ws")).is_none());
}

#[test]
fn test_missing_file_is_config_not_found() {
    let err = AppConfig::load(Path::new("/nonexistent/docflow.toml")).unwrap_err();
    assert!(matches!(err, DocflowError::ConfigNotFound(_)));
}

#[test]
fn test_malformed_toml_is_config_error() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[quality\nhigh_threshold = ").expect("write");

    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, DocflowError::Config(_)));
}

#[test]
fn test_out_of_range_threshold_rejected() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[quality]\nhigh_threshold = 1.5\n").expect("write");

    assert!(AppConfig::load(tmp.path()).is_err());
}
