//! # Epistle Mail
//!
//! Compose RFC 5322/MIME email messages and dispatch them through
//! interchangeable backends.
//!
//! ## Features
//!
//! - **EmailMessage**: subject, body, sender, to/cc/bcc, reply-to, extra
//!   headers, attachments and alternative bodies, rendered lazily and
//!   idempotently into a MIME tree
//! - **Header injection guard**: any header value containing CR or LF fails
//!   rendering with [`EmailError::InvalidHeader`], regardless of
//!   fail-silently
//! - **Address sanitizer**: RFC 2047 encoded display names and IDNA domains
//! - **Backends**: SMTP (via `lettre`), console, in-memory outbox, dummy and
//!   file, selected by name through a [`BackendRegistry`](backends::BackendRegistry)
//! - **Dispatch signal**: observers notified after every delivered message
//! - **Mailer**: settings plus one backend, with scoped connections and an
//!   in-process message recorder
//!
//! ## Example
//!
//! ```
//! use epistle_conf::MailSettings;
//! use epistle_mail::Mailer;
//! use epistle_mail::backends::Outbox;
//!
//! let mut settings = MailSettings::default();
//! settings.backend = "memory".to_string();
//! settings.from_email = Some("noreply@example.com".to_string());
//!
//! let outbox = Outbox::new();
//! let mailer = Mailer::builder(settings).outbox(outbox.clone()).build().unwrap();
//!
//! let sent = mailer
//!     .message()
//!     .subject("Welcome!")
//!     .body("Thanks for signing up.")
//!     .to(["user@example.com"])
//!     .build()
//!     .send(false)
//!     .unwrap();
//!
//! assert_eq!(sent, 1);
//! assert_eq!(outbox.len(), 1);
//! ```

pub mod address;
pub mod backends;
pub mod encoding;
pub mod headers;
pub mod mailer;
pub mod message;
pub mod mime;
pub mod signals;
pub mod utils;

use thiserror::Error;

pub use address::{Address, sanitize_address};
pub use backends::{
	ConsoleBackend, DummyBackend, EmailBackend, FileBackend, MemoryBackend, Outbox,
	ScopedConnection, SmtpBackend, SmtpSecurity, backend_from_settings,
};
pub use headers::{ExtraHeaders, guard_header};
pub use mailer::{Mailer, MailerBuilder};
pub use message::{Alternative, Attached, Attachment, EmailMessage, EmailMessageBuilder};
pub use mime::MimePart;
pub use signals::{DispatchEvent, DispatchSignal, RecordedMessages};
pub use utils::{
	SendMailOptions, mail_admins, mail_managers, send_mail, send_mail_with_options, send_mass_mail,
};

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EmailError {
	#[error("Invalid header: {0}")]
	InvalidHeader(String),

	#[error("Invalid email address: {0}")]
	InvalidAddress(String),

	#[error("Transport error: {0}")]
	Transport(String),

	#[error("SMTP error: {0}")]
	Smtp(#[from] lettre::transport::smtp::Error),

	#[error("Configuration error: {0}")]
	Configuration(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Unknown email backend: {0}")]
	UnknownBackend(String),

	#[error("Settings error: {0}")]
	Settings(#[from] epistle_conf::SettingsError),
}

impl EmailError {
	/// Whether fail-silently may swallow this error.
	///
	/// Only transport-class failures qualify. Header and address errors point
	/// at a caller bug or an injection attempt and always propagate.
	pub fn is_transport_failure(&self) -> bool {
		matches!(
			self,
			Self::Transport(_) | Self::Smtp(_) | Self::Configuration(_) | Self::Io(_)
		)
	}
}

pub type EmailResult<T> = std::result::Result<T, EmailError>;

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(EmailError::Transport("refused".into()), true)]
	#[case(EmailError::Configuration("no host".into()), true)]
	#[case(EmailError::Io(std::io::Error::other("disk full")), true)]
	#[case(EmailError::InvalidHeader("newline".into()), false)]
	#[case(EmailError::InvalidAddress("bad".into()), false)]
	#[case(EmailError::UnknownBackend("pigeon".into()), false)]
	fn test_transport_failure_classification(#[case] error: EmailError, #[case] expected: bool) {
		assert_eq!(error.is_transport_failure(), expected);
	}
}
