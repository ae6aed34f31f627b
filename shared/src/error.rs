use thiserror::Error;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ErrorCode {
    #[error("Invalid input provided")]
    InvalidInput,
    #[error("Counter store unavailable")]
    StoreUnavailable,
}

impl ErrorCode {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCode::InvalidInput => 400,
            ErrorCode::StoreUnavailable => 503,
        }
    }
}
