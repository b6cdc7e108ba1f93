use thiserror::Error;

use crate::domain::entities::api_key::Capability;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("missing API key")]
    MissingApiKey,

    #[error("invalid or expired API key")]
    InvalidApiKey,

    #[error("API key lacks the {} permission", .0.as_str())]
    Forbidden(Capability),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;
