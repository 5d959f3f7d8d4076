//! POST /buy: place an order
//!
//! The first JSON value of the body is decoded whatever the Content-Type
//! says; anything after it is ignored. An optional
//! `Idempotency-Key` header makes retries safe.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::order::{BuyRequest, BuyResponse};

use crate::service::Purchase;
use crate::state::AppState;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

pub async fn buy(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<Json<BuyResponse>> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::new(ErrorCode::PayloadTooLarge)
        } else {
            AppError::new(ErrorCode::InvalidRequest)
        }
    })?;

    let request = BuyRequest::from_first_value(&body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected request body");
        AppError::new(ErrorCode::InvalidRequest)
    })?;

    let purchase = Purchase {
        product_id: request.product_id().to_string(),
        quantity: request.quantity(),
        idempotency_key: idempotency_key(&headers)?,
    };

    let response = state.orders.handle_purchase(purchase).await?;
    Ok(Json(response))
}

fn idempotency_key(headers: &HeaderMap) -> AppResult<Option<String>> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };
    let key = value.to_str().map_err(|_| {
        AppError::with_message(
            ErrorCode::InvalidIdempotencyKey,
            "Idempotency-Key must be visible ASCII",
        )
    })?;
    Ok(Some(key.to_string()))
}

/// Any method other than POST on /buy
pub async fn method_not_allowed() -> impl IntoResponse {
    ([(header::ALLOW, "POST")], AppError::method_not_allowed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_missing_key_is_none() {
        assert_eq!(idempotency_key(&HeaderMap::new()).unwrap(), None);
    }

    #[test]
    fn test_key_is_read_verbatim() {
        let mut headers = HeaderMap::new();
        headers.insert(IDEMPOTENCY_KEY_HEADER, HeaderValue::from_static("abc-123"));
        assert_eq!(idempotency_key(&headers).unwrap().as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_non_ascii_key_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(
            IDEMPOTENCY_KEY_HEADER,
            HeaderValue::from_bytes(b"caf\xc3\xa9").unwrap(),
        );
        let err = idempotency_key(&headers).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidIdempotencyKey);
    }
}
