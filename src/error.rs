use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid process inputs: {0}")]
    InvalidInputs(String),

    #[error("Unknown process: {0}")]
    UnknownProcess(String),

    #[error("Task executor error: {0}")]
    Executor(String),

    #[error("Claude API error: {0}")]
    ClaudeApi(String),

    #[error("Claude API rate limited: {0}")]
    ClaudeRateLimited(String),

    #[error("Task {task} output violates its schema: {message}")]
    SchemaViolation { task: String, message: String },

    /// A task reported `success: false`. Ends the run with a failure record.
    #[error("{error}")]
    TaskFailed {
        task: String,
        error: String,
        details: serde_json::Value,
    },

    /// A reviewer rejected a breakpoint. Ends the run with a failure record.
    #[error("Rejected at breakpoint '{title}'{}", reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    ReviewRejected {
        title: String,
        reason: Option<String>,
    },

    #[error("Review error: {0}")]
    Review(String),

    #[error("Run store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Whether this error ends the run with a failure record rather than
    /// propagating to the caller.
    pub fn is_run_failure(&self) -> bool {
        matches!(
            self,
            AppError::TaskFailed { .. } | AppError::ReviewRejected { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
