//! taskhive-server: HTTP backend for the taskhive platform
//!
//! Layered the usual way: axum route handlers call per-entity
//! repositories, which own the SQL. A read-through cache sits in front
//! of the hot entities (challenges, users), and every task status
//! change is recorded in an append-only action log for reporting.

pub mod cache;
pub mod db;
pub mod http;
pub mod models;

pub use http::{run_server, ApiError, ServerConfig};
