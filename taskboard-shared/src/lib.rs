//! # Taskboard Shared Library
//!
//! Types and business rules shared by the Taskboard API server and the
//! notification worker.
//!
//! ## Module Organization
//!
//! - `models`: Database models (users, projects, tasks, categories, comments,
//!   notification outbox)
//! - `auth`: Password hashing, JWT tokens, request auth context and the
//!   access-control predicates
//! - `db`: Connection pool and migrations
//! - `notify`: Composition of notification emails for board events

pub mod auth;
pub mod db;
pub mod models;
pub mod notify;

/// Current version of the Taskboard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
