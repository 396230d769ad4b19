use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoordError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unknown recipient agent: {0}")]
    UnknownRecipient(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, CoordError>;
