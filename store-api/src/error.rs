//! Error types for store-api
//!
//! Each layer owns its own error enum:
//! - [`PersistenceError`]: the store rejected or could not run an insert
//! - [`NotifyError`]: a publish on the channel failed (never surfaced to clients)
//! - [`StartupError`]: anything that must stop the process before it serves
//!
//! `ServiceError` bridges service-layer failures into the shared `AppError`
//! so handlers can use `?` without hand-written `map_err` blocks.

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

use crate::bootstrap::StartupPhase;

/// Store Connector failure. No row exists when this is returned.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to encode outbox payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Notifier failure
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("publish failed: {0}")]
    Publish(#[from] redis::RedisError),
    #[error("channel unavailable: {0}")]
    Unavailable(String),
}

/// Fatal startup condition: the listener is never bound.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("{dependency} unreachable after {attempts} attempt(s): {reason}")]
    Unreachable {
        dependency: &'static str,
        attempts: u32,
        reason: String,
    },
    #[error("schema migration failed: {0}")]
    Schema(#[from] sqlx::migrate::MigrateError),
    #[error("invalid startup transition {from:?} -> {to:?}")]
    Transition { from: StartupPhase, to: StartupPhase },
}

/// Service-layer error
///
/// - `Persistence`: store failure (logged, mapped to `DatabaseError`)
/// - `App`: request-level error (transparent pass-through to client)
#[derive(Debug)]
pub enum ServiceError {
    Persistence(PersistenceError),
    App(AppError),
}

impl From<PersistenceError> for ServiceError {
    fn from(e: PersistenceError) -> Self {
        ServiceError::Persistence(e)
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Persistence(err) => {
                tracing::error!(error = %err, "DB insert error");
                AppError::new(ErrorCode::DatabaseError)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

/// Convenience type alias for service-layer results
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::http::StatusCode;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    #[test]
    fn test_persistence_error_maps_to_500() {
        let err = ServiceError::from(PersistenceError::Unavailable("down".into()));
        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::DatabaseError);
        assert_eq!(app.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
        // cause stays in the log, not in the response
        assert_eq!(app.message, "Database error");
    }

    #[test]
    fn test_app_error_passes_through() {
        let err = ServiceError::from(AppError::with_message(ErrorCode::InvalidQuantity, "nope"));
        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::InvalidQuantity);
        assert_eq!(app.message, "nope");
    }

    /// Counts ERROR events
    struct ErrorCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for ErrorCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_persistence_failure_is_logged_once() {
        let errors = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorCounter(errors.clone()));

        let response = tracing::subscriber::with_default(subscriber, || {
            ServiceError::from(PersistenceError::Unavailable("down".into())).into_response()
        });

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_client_error_is_not_logged() {
        let errors = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorCounter(errors.clone()));

        tracing::subscriber::with_default(subscriber, || {
            ServiceError::from(AppError::new(ErrorCode::InvalidRequest)).into_response()
        });

        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_startup_error_display() {
        let err = StartupError::Unreachable {
            dependency: "postgres",
            attempts: 10,
            reason: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "postgres unreachable after 10 attempt(s): connection refused"
        );
    }
}
