//! Errors of the request handlers.
use crate::store::StoreError;
use hyper::StatusCode;
use thiserror::Error;

/// Errors of the request handlers, each mapped to an HTTP status.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or invalid request.
    #[error("{0}")]
    BadRequest(String),

    /// No route for the path.
    #[error("Not found")]
    NotFound,

    /// The route does not accept the method.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The delta was computed against another version of the model.
    #[error("stale version: expected {current}, got {base}")]
    Stale {
        /// Current version of the model.
        current: u64,
        /// Version the delta was computed against.
        base: i64,
    },

    /// The store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A stored value could not be decoded.
    #[error("Corrupt record {key}: {reason}")]
    Corrupt {
        /// Key of the record.
        key: String,
        /// Decoder message.
        reason: String,
    },

    /// A value could not be encoded.
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ServiceError {
    /// HTTP status of the error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Stale { .. } => StatusCode::CONFLICT,
            Self::Store(_) | Self::Corrupt { .. } | Self::Encode(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
