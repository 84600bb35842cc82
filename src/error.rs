use thiserror::Error;

#[derive(Error, Debug)]
pub enum DubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication required: {0}")]
    Unauthorized(String),

    #[error("Not authorized: {0}")]
    Forbidden(String),

    /// An external AI/media provider failed or was unreachable. Always
    /// recovered inside the owning pipeline stage with a degraded output.
    #[error("Provider error: {0}")]
    Provider(String),

    /// No output artifact could be produced at all. The only error class
    /// that fails a running job.
    #[error("Fatal stage error: {0}")]
    FatalStage(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Payment error: {0}")]
    Payment(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DubError>;
