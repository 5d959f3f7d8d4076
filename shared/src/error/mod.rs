//! Unified error system for the order ingestion stack
//!
//! - [`ErrorCode`]: Standardized error codes
//! - [`AppError`]: Rich error type with codes, messages, and details
//! - [`ApiResponse`]: JSON envelope rendered for every error response
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ApiResponse};
//!
//! let err = AppError::with_message(ErrorCode::InvalidQuantity, "quantity must be >= 0")
//!     .with_detail("field", "quantity");
//!
//! let response = ApiResponse::error(&err);
//! assert_eq!(response.code, 4102);
//! ```

mod codes;
mod http;
mod types;

pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult};
