use rocket::http::Status;
use rocket::response::Responder;
use shared::{ErrorCode, ValidationError};
use thiserror::Error;
use tracing::{error, warn};

use crate::metrics;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Counter store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
    #[error("{0}")]
    InvalidVote(#[from] ValidationError),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            ApiError::InvalidVote(_) => ErrorCode::InvalidInput,
        }
    }

    pub fn status(&self) -> Status {
        Status::from_code(self.code().status_code()).unwrap_or(Status::InternalServerError)
    }
}

/// Details stay in the log; the client gets the catcher page for the status.
impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        match &self {
            ApiError::StoreUnavailable(e) => {
                metrics::record_store_failure();
                error!(uri = %req.uri(), code = ?self.code(), "Store call failed: {}", e);
            }
            ApiError::InvalidVote(e) => warn!(uri = %req.uri(), code = ?self.code(), "Rejected request: {}", e),
        }

        Err(self.status())
    }
}
