//! # Epistle
//!
//! Compose RFC 5322/MIME email messages and hand them to interchangeable
//! transports.
//!
//! ## Feature Flags
//!
//! - `conf` - layered mail settings (in-memory map, TOML file, environment)
//! - `mail` (default, implies `conf`) - messages, backends, the dispatch
//!   signal and the `send_mail` family
//!
//! ## Quick Example
//!
//! ```
//! use epistle::conf::SettingsBuilder;
//! use epistle::conf::sources::MapSource;
//! use epistle::mail::{Mailer, Outbox, send_mail};
//! use serde_json::json;
//!
//! let settings = SettingsBuilder::new()
//!     .add_source(
//!         MapSource::new()
//!             .with_value("backend", json!("memory"))
//!             .with_value("from_email", json!("noreply@example.com")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let outbox = Outbox::new();
//! let mailer = Mailer::builder(settings).outbox(outbox.clone()).build().unwrap();
//! send_mail(&mailer, "Hello", "It works.", None, ["user@example.com"], false).unwrap();
//!
//! assert_eq!(outbox.len(), 1);
//! ```

#[cfg(feature = "conf")]
pub mod conf;
#[cfg(feature = "mail")]
pub mod mail;

#[cfg(feature = "conf")]
pub use epistle_conf::{MailSettings, SettingsBuilder, SettingsError};

#[cfg(feature = "mail")]
pub use epistle_mail::{
	EmailBackend, EmailError, EmailMessage, EmailResult, Mailer, mail_admins, mail_managers,
	send_mail, send_mass_mail,
};
