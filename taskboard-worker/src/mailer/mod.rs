//! Mail transports
//!
//! The dispatcher hands every claimed notification to a [`Mailer`]. Two
//! transports exist:
//!
//! - **log**: writes the mail to the tracing output; the default in development
//! - **http**: POSTs the mail as JSON to a mail-sending service
//!
//! # Example
//!
//! ```no_run
//! use taskboard_worker::mailer::{Mailer, MailerResult};
//! use taskboard_shared::notify::OutgoingMail;
//! use async_trait::async_trait;
//!
//! struct Discard;
//!
//! #[async_trait]
//! impl Mailer for Discard {
//!     fn name(&self) -> &str {
//!         "discard"
//!     }
//!
//!     async fn send(&self, _mail: &OutgoingMail, _from: &str) -> MailerResult<()> {
//!         Ok(())
//!     }
//! }
//! ```

pub mod http;
pub mod log;

pub use http::HttpMailer;
pub use log::LogMailer;

use crate::config::{MailConfig, MailTransport};
use async_trait::async_trait;
use std::sync::Arc;
use taskboard_shared::notify::OutgoingMail;

/// Mail delivery error
#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    /// The service answered with a non-success status
    #[error("Mail service rejected the message: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The request never got an answer
    #[error("Mail transport error: {0}")]
    Transport(String),

    /// Transport can't be built from the configuration
    #[error("Invalid mail configuration: {0}")]
    InvalidConfig(String),
}

/// Mailer result type alias
pub type MailerResult<T> = Result<T, MailerError>;

/// Sends one email to all of its recipients
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Transport name, for logs
    fn name(&self) -> &str;

    /// Delivers `mail` from the `from` address
    ///
    /// An error means nothing is known to have been delivered; the
    /// notification is retried.
    async fn send(&self, mail: &OutgoingMail, from: &str) -> MailerResult<()>;
}

/// Builds the transport selected by `MAIL_TRANSPORT`
pub fn build_mailer(config: &MailConfig) -> MailerResult<Arc<dyn Mailer>> {
    let mailer: Arc<dyn Mailer> = match &config.transport {
        MailTransport::Log => Arc::new(LogMailer::new()),
        MailTransport::Http { url, api_key } => Arc::new(HttpMailer::new(url, api_key)?),
    };

    tracing::info!(transport = mailer.name(), from = %config.from, "Mail transport ready");
    Ok(mailer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_log_mailer() {
        let config = MailConfig {
            from: "noreply@taskboard.local".to_string(),
            transport: MailTransport::Log,
        };

        assert_eq!(build_mailer(&config).unwrap().name(), "log");
    }

    #[test]
    fn test_build_http_mailer_requires_key() {
        let config = MailConfig {
            from: "noreply@taskboard.local".to_string(),
            transport: MailTransport::Http {
                url: "https://mail.example.com/send".to_string(),
                api_key: String::new(),
            },
        };

        assert!(matches!(
            build_mailer(&config),
            Err(MailerError::InvalidConfig(_))
        ));
    }
}
