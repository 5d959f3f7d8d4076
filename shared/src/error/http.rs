//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,

            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,

            // 500 Internal Server Error
            Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (request shape and validation)
            Self::InvalidRequest
            | Self::InvalidProductId
            | Self::InvalidQuantity
            | Self::InvalidIdempotencyKey => StatusCode::BAD_REQUEST,
        }
    }
}
