//! # Epistle Conf
//!
//! Mail configuration for Epistle.
//!
//! Settings are resolved once, when a backend is built, with the precedence
//! explicit constructor argument > configuration source > hard-coded default.
//! The sources are merged by [`SettingsBuilder`]:
//!
//! - [`sources::MapSource`]: in-memory key/value store (an application's config object)
//! - [`sources::TomlFileSource`]: a TOML file, skipped when missing
//! - [`sources::EnvSource`]: environment variables, usually with a `MAIL_` prefix
//!
//! ```
//! use epistle_conf::{MailSettings, SettingsBuilder};
//! use epistle_conf::sources::MapSource;
//! use serde_json::json;
//!
//! let settings = SettingsBuilder::new()
//!     .add_source(
//!         MapSource::new()
//!             .with_value("backend", json!("console"))
//!             .with_value("from_email", json!("app@example.com")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(settings.backend, "console");
//! assert_eq!(settings.from_email.as_deref(), Some("app@example.com"));
//! ```

pub mod builder;
pub mod settings;
pub mod sources;

pub use builder::SettingsBuilder;
pub use settings::{MailSettings, SettingsError};
pub use sources::{ConfigSource, EnvSource, MapSource, SourceError, TomlFileSource};
