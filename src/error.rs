use thiserror::Error;

/// Positioning engine error types
#[derive(Error, Debug)]
pub enum PositioningError {
    #[error("Strategy '{strategy}' needs at least {needed} candidates, got {available}")]
    InsufficientData {
        strategy: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Fingerprint store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Positioning engine has stopped")]
    EngineStopped,
}

/// Result type for positioning operations
pub type Result<T> = std::result::Result<T, PositioningError>;
