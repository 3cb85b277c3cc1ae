use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Icon not found")]
    IconNotFound,
}

pub type Result<T> = std::result::Result<T, ApiError>;
