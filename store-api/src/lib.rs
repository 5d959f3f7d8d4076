//! store-api: order ingestion service
//!
//! Accepts purchase requests over HTTP, stores each order durably in
//! PostgreSQL, then announces it on a Redis publish/subscribe channel for
//! downstream workers.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod notifier;
pub mod relay;
pub mod sanitize;
pub mod service;
pub mod state;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use config::Config;
pub use error::{NotifyError, PersistenceError, ServiceError, StartupError};
