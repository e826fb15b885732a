//! # Taskboard Worker Library
//!
//! Delivers the notification emails the API queues in the `notifications`
//! table.
//!
//! ## Modules
//!
//! - `config`: Worker settings from the environment
//! - `mailer`: Mail transports (log, http)
//! - `queue`: Claiming due notifications and recording outcomes
//! - `dispatcher`: Poll loop, concurrent delivery and retry policy

pub mod config;
pub mod dispatcher;
pub mod mailer;
pub mod queue;
