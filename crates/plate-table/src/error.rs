use crate::tree::TreeError;

/// Reasons a table command refuses to run. All of them are recovered inside
/// [`crate::Editor::run_command`]: the document is left untouched and the host
/// only sees [`crate::CommandOutcome::Aborted`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("no enclosing {expected} found for the anchor")]
    TargetNotFound { expected: &'static str },
    #[error("structural guard: {0}")]
    StructuralGuardViolation(&'static str),
    #[error("the anchor is not inside a table")]
    NotATable,
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

impl TableError {
    pub(crate) fn target(expected: &'static str) -> Self {
        TableError::TargetNotFound { expected }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct QueryError {
    message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    #[error("invalid tree operation: {0}")]
    Tree(#[from] TreeError),
    #[error("normalization did not converge")]
    NormalizeDidNotConverge,
}

#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported document schema `{0}`")]
    Schema(String),
    #[error("document version {found} is newer than supported version {supported}")]
    Version { found: u32, supported: u32 },
}
