//! Error codes for the order ingestion stack
//!
//! Error codes are organized by category:
//! - 0xxx: General errors (request shape, protocol)
//! - 4xxx: Order errors (order-specific validation)
//! - 9xxx: System errors (store, internal)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Codes are serialized as plain `u16` values so that any client, whatever
/// its language, can match on them without a string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Invalid request (malformed body)
    InvalidRequest = 5,
    /// HTTP method not allowed on this route
    MethodNotAllowed = 9,
    /// Request body exceeds the configured limit
    PayloadTooLarge = 10,

    // ==================== 4xxx: Order ====================
    /// Product identifier rejected
    InvalidProductId = 4101,
    /// Quantity rejected
    InvalidQuantity = 4102,
    /// Idempotency key rejected
    InvalidIdempotencyKey = 4103,

    // ==================== 9xxx: System ====================
    /// Database error
    DatabaseError = 9002,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::InvalidRequest => "Invalid request body",
            ErrorCode::MethodNotAllowed => "Method not allowed",
            ErrorCode::PayloadTooLarge => "Request body too large",

            // Order
            ErrorCode::InvalidProductId => "Invalid product identifier",
            ErrorCode::InvalidQuantity => "Invalid quantity",
            ErrorCode::InvalidIdempotencyKey => "Invalid idempotency key",

            // System
            ErrorCode::DatabaseError => "Database error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error returned when converting an unknown `u16` into an [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            5 => Ok(ErrorCode::InvalidRequest),
            9 => Ok(ErrorCode::MethodNotAllowed),
            10 => Ok(ErrorCode::PayloadTooLarge),

            // Order
            4101 => Ok(ErrorCode::InvalidProductId),
            4102 => Ok(ErrorCode::InvalidQuantity),
            4103 => Ok(ErrorCode::InvalidIdempotencyKey),

            // System
            9002 => Ok(ErrorCode::DatabaseError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
