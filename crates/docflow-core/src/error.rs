use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocflowError {
    // Graph definition errors
    #[error("Graph definition error: {0}")]
    GraphDefinition(String),

    // Traversal errors
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Node '{node}' failed: {source}")]
    HandlerFailure {
        node: String,
        #[source]
        source: Box<DocflowError>,
    },

    #[error("Router for node '{node}' failed: {source}")]
    RouterFailure {
        node: String,
        #[source]
        source: Box<DocflowError>,
    },

    #[error("Graph exceeded step limit ({0})")]
    GraphStepLimitExceeded(usize),

    #[error("Workflow cancelled")]
    Cancelled,

    // Collaborator errors
    #[error("Scan failed: {path}: {message}")]
    Scan { path: String, message: String },

    #[error("{collaborator} failed: {message}")]
    Collaborator {
        collaborator: String,
        message: String,
    },

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DocflowError {
    /// Shorthand for a failed collaborator call.
    pub fn collaborator(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }

    /// Whether this error (or the error it wraps) is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::HandlerFailure { source, .. } | Self::RouterFailure { source, .. } => {
                source.is_cancelled()
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DocflowError>;
