//! Shared types for the order ingestion stack
//!
//! Error envelope and order wire types used by `store-api` and by anything
//! that consumes the order-created channel.

pub mod error;
pub mod order;
