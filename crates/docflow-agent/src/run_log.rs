use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use docflow_core::event::EventBus;
use docflow_core::types::WorkflowEvent;

/// JSONL run logger.
///
/// Subscribes to the EventBus and writes one JSON object per line. The
/// file is append-only, so lines written before a crash stay intact.
pub struct RunLogger {
    log_dir: PathBuf,
    level: u8,
}

/// A single log entry written to the JSONL file.
#[derive(Serialize)]
struct LogEntry {
    timestamp: String,
    run_id: String,
    event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<serde_json::Value>,
}

impl RunLogger {
    /// Create a new RunLogger.
    ///
    /// Logs are written to `{log_dir}/{timestamp}.jsonl`.
    /// `level` controls verbosity: 1=summary, 2=routing, 3=per-node.
    pub fn new(log_dir: PathBuf, level: u8) -> Self {
        Self { log_dir, level }
    }

    /// Subscribe now and write in a background task.
    ///
    /// Subscribing before spawning means no event published after this call
    /// is missed.
    pub fn spawn(
        self,
        event_bus: &EventBus,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let rx = event_bus.subscribe();
        tokio::spawn(self.run(rx, cancel))
    }

    /// Write events until cancellation, RunComplete or RunError.
    pub async fn run(self, mut rx: Receiver<WorkflowEvent>, cancel: CancellationToken) {
        if let Err(e) = tokio::fs::create_dir_all(&self.log_dir).await {
            error!(error = %e, "Failed to create log directory");
            return;
        }

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let log_path = self.log_dir.join(format!("{}.jsonl", timestamp));

        let file = match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await
        {
            Ok(f) => f,
            Err(e) => {
                error!(error = %e, path = %log_path.display(), "Failed to open log file");
                return;
            }
        };

        info!(path = %log_path.display(), "RunLogger started");

        let mut writer = tokio::io::BufWriter::new(file);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("RunLogger cancelled");
                    break;
                }
                result = rx.recv() => {
                    match result {
                        Ok(event) => {
                            let entry = match self.event_to_entry(&event) {
                                Some(e) => e,
                                None => continue,
                            };

                            if let Ok(json) = serde_json::to_string(&entry) {
                                let line = format!("{}\n", json);
                                if let Err(e) = writer.write_all(line.as_bytes()).await {
                                    error!(error = %e, "Failed to write log entry");
                                    break;
                                }
                                // Flush after each entry for crash resilience
                                if let Err(e) = writer.flush().await {
                                    error!(error = %e, "Failed to flush log");
                                }
                            }

                            if matches!(event, WorkflowEvent::RunComplete { .. } | WorkflowEvent::RunError { .. }) {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            debug!(skipped = n, "RunLogger lagged, skipped events");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                            debug!("EventBus closed, RunLogger stopping");
                            break;
                        }
                    }
                }
            }
        }

        writer.flush().await.ok();
        debug!(path = %log_path.display(), "RunLogger finished");
    }

    /// Convert a WorkflowEvent to a log entry (None if filtered by level).
    fn event_to_entry(&self, event: &WorkflowEvent) -> Option<LogEntry> {
        let entry = |event_type: &str, node: Option<&str>, detail: Option<serde_json::Value>| {
            LogEntry {
                timestamp: Utc::now().to_rfc3339(),
                run_id: event.run_id().to_string(),
                event_type: event_type.to_string(),
                node: node.map(str::to_string),
                detail,
            }
        };

        match event {
            // L1: run summary
            WorkflowEvent::RunStarted { entry: start, .. } => Some(entry(
                "run_started",
                None,
                Some(serde_json::json!({ "entry": start })),
            )),
            WorkflowEvent::RunComplete {
                steps, elapsed_ms, ..
            } => Some(entry(
                "run_complete",
                None,
                Some(serde_json::json!({ "steps": steps, "elapsed_ms": elapsed_ms })),
            )),
            WorkflowEvent::RunError { error, .. } => Some(entry(
                "run_error",
                None,
                Some(serde_json::json!({ "error": error })),
            )),

            // L2: routing decisions
            WorkflowEvent::Routed {
                from, label, to, ..
            } if self.level >= 2 => Some(entry(
                "routed",
                Some(from.as_str()),
                Some(serde_json::json!({ "label": label, "to": to })),
            )),

            // L3: every node
            WorkflowEvent::NodeStarted { node, step, .. } if self.level >= 3 => Some(entry(
                "node_started",
                Some(node.as_str()),
                Some(serde_json::json!({ "step": step })),
            )),
            WorkflowEvent::NodeCompleted {
                node,
                step,
                elapsed_ms,
                ..
            } if self.level >= 3 => Some(entry(
                "node_completed",
                Some(node.as_str()),
                Some(serde_json::json!({ "step": step, "elapsed_ms": elapsed_ms })),
            )),

            _ => None,
        }
    }
}
