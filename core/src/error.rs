use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Required field '{field}' missing for property '{property_id}'")]
    MissingField { field: String, property_id: String },

    #[error("Field '{field}' is not numeric: '{value}'")]
    NonNumeric { field: String, value: String },

    #[error("Invalid transaction date: '{value}'")]
    InvalidDate { value: String },

    #[error("Unknown field '{field}'")]
    UnknownField { field: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ControlResult<T> = Result<T, ControlError>;
