//! Input sanitization for untrusted purchase requests
//!
//! [`sanitize`] strips a fixed deny-list of characters; it transforms and
//! never rejects. It is not a complete injection defense: anything outside
//! the deny-list passes through. [`ProductIdPolicy::Strict`] layers an
//! allow-list on top for deployments that know their identifier format.

use std::str::FromStr;

use shared::error::{AppError, ErrorCode};
use shared::order::PRODUCT_ID_MAX_LEN;

/// Characters removed from product identifiers
pub const DENYLIST: [char; 4] = ['<', '>', '\'', ';'];

/// Maximum idempotency key length (matches the column width)
pub const IDEMPOTENCY_KEY_MAX_LEN: usize = 128;

/// Remove every deny-listed character. Idempotent.
pub fn sanitize(input: &str) -> String {
    input.chars().filter(|c| !DENYLIST.contains(c)).collect()
}

/// Product identifier acceptance policy, applied after [`sanitize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductIdPolicy {
    /// Deny-list transform only, plus the column length bound
    #[default]
    Denylist,
    /// Additionally require 1..=50 characters from `[A-Za-z0-9_.:-]`
    Strict,
}

impl FromStr for ProductIdPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "denylist" => Ok(Self::Denylist),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown product id policy: {other}")),
        }
    }
}

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

/// Check an already-sanitized product identifier against `policy`
pub fn validate_product_id(product_id: &str, policy: ProductIdPolicy) -> Result<(), AppError> {
    let len = product_id.chars().count();
    if len > PRODUCT_ID_MAX_LEN {
        return Err(AppError::with_message(
            ErrorCode::InvalidProductId,
            format!("product_id must be at most {PRODUCT_ID_MAX_LEN} characters"),
        )
        .with_detail("length", len));
    }

    if policy == ProductIdPolicy::Strict {
        if product_id.is_empty() {
            return Err(AppError::with_message(
                ErrorCode::InvalidProductId,
                "product_id is required",
            ));
        }
        if let Some(bad) = product_id.chars().find(|c| !is_allowed_char(*c)) {
            return Err(AppError::with_message(
                ErrorCode::InvalidProductId,
                "product_id contains a character outside [A-Za-z0-9_.:-]",
            )
            .with_detail("character", bad.to_string()));
        }
    }

    Ok(())
}

/// Quantities are non-negative
pub fn validate_quantity(quantity: i32) -> Result<(), AppError> {
    if quantity < 0 {
        return Err(
            AppError::with_message(ErrorCode::InvalidQuantity, "quantity must not be negative")
                .with_detail("quantity", quantity),
        );
    }
    Ok(())
}

/// Idempotency keys are 1..=128 visible ASCII characters
pub fn validate_idempotency_key(key: &str) -> Result<(), AppError> {
    let valid = !key.is_empty()
        && key.len() <= IDEMPOTENCY_KEY_MAX_LEN
        && key.chars().all(|c| c.is_ascii_graphic());
    if !valid {
        return Err(AppError::with_message(
            ErrorCode::InvalidIdempotencyKey,
            format!("Idempotency-Key must be 1-{IDEMPOTENCY_KEY_MAX_LEN} visible ASCII characters"),
        ));
    }
    Ok(())
}
