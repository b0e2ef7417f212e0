use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("ticket not found: {0}")]
    TicketNotFound(String),
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    #[error("invalid skill pattern: {0}")]
    InvalidSkillPattern(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("language model error: {0}")]
    LanguageModel(String),
    #[error("mail error: {0}")]
    Mail(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl AppError {
    /// Whether a failed step may be attempted again.
    pub fn is_retriable(&self) -> bool {
        match self {
            AppError::Configuration(_)
            | AppError::TicketNotFound(_)
            | AppError::InvalidEvent(_)
            | AppError::InvalidSkillPattern(_) => false,
            AppError::Storage(_)
            | AppError::LanguageModel(_)
            | AppError::Mail(_)
            | AppError::Io(_) => true,
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
