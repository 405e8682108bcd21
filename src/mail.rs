//! Email module.
//!
//! Messages, the backends that carry them, and the convenience functions
//! built on [`Mailer`].
//!
//! # Examples
//!
//! ```
//! use epistle::mail::{EmailBackend, EmailMessage, MemoryBackend, Outbox};
//!
//! let outbox = Outbox::new();
//! let backend = MemoryBackend::with_outbox(outbox.clone());
//! let message = EmailMessage::builder()
//!     .from("app@example.com")
//!     .to(["user@example.com"])
//!     .subject("Hi")
//!     .build();
//!
//! assert_eq!(backend.send_messages(&[message]).unwrap(), 1);
//! ```

#[cfg(feature = "mail")]
pub use epistle_mail::*;
