//! # Taskboard API Server Library
//!
//! HTTP surface of the board: registration and login, projects, tasks,
//! comments and categories, with role-based access control and queued email
//! notifications.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Request body extraction with validation
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
