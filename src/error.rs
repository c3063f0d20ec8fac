use thiserror::Error;

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("GitLab API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("GitLab API error (status {status}) persisted after {retries} retries")]
    ApiErrorAfterRetries { status: u16, retries: u32 },

    #[error("Response from {endpoint} did not report a total item count")]
    MissingTotal { endpoint: String },

    #[error("Package file {file_id} of package {package_id} has no creation timestamp")]
    MissingCreatedAt { package_id: u64, file_id: u64 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("Stage worker panicked: {0}")]
    Panicked(String),

    #[error("Downstream stream closed before all items were delivered")]
    StreamClosed,

    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SweepError>;
