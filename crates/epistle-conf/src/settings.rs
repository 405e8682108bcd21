//! Resolved mail settings
//!
//! [`MailSettings`] is the single struct every backend reads at construction
//! time. It is produced either directly (`MailSettings::default()` plus field
//! assignment) or by merging configuration sources with
//! [`SettingsBuilder`](crate::builder::SettingsBuilder).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Mail settings
///
/// # Examples
///
/// ```
/// use epistle_conf::MailSettings;
///
/// let mut settings = MailSettings::default();
/// settings.backend = "console".to_string();
/// settings.from_email = Some("noreply@example.com".to_string());
///
/// assert_eq!(settings.port, 25);
/// assert!(settings.validate().is_ok());
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
	/// Backend name resolved through the backend registry
	/// (`smtp`, `console`, `memory`, `dummy`, `file` or a custom name)
	pub backend: String,
	pub host: String,
	pub port: u16,
	pub username: Option<String>,
	pub password: Option<String>,
	/// Upgrade the session with STARTTLS after connecting
	pub use_tls: bool,
	/// Connect over implicit TLS
	pub use_ssl: bool,
	/// Connection timeout in seconds
	pub timeout: Option<u64>,

	/// Sender used when a message does not name one
	pub from_email: Option<String>,

	/// Character set for message bodies and encoded headers
	#[serde(default = "default_charset")]
	pub default_charset: String,

	/// Swallow transport errors instead of propagating them
	pub fail_silently: bool,

	/// List of (name, email) tuples for site administrators
	/// Used by mail_admins() helper
	pub admins: Vec<(String, String)>,

	/// List of (name, email) tuples for site managers
	/// Used by mail_managers() helper
	pub managers: Vec<(String, String)>,

	/// Sender address for admin/manager notifications
	#[serde(default = "default_server_email")]
	pub server_email: String,

	/// Prefix for admin/manager subjects
	#[serde(default = "default_subject_prefix")]
	pub subject_prefix: String,

	/// Directory path for file-based email backend.
	/// Required when backend is "file".
	pub file_path: Option<PathBuf>,
}

fn default_charset() -> String {
	"utf-8".to_string()
}

fn default_server_email() -> String {
	"root@localhost".to_string()
}

fn default_subject_prefix() -> String {
	"[Epistle] ".to_string()
}

impl Default for MailSettings {
	fn default() -> Self {
		Self {
			backend: "smtp".to_string(),
			host: "localhost".to_string(),
			port: 25,
			username: None,
			password: None,
			use_tls: false,
			use_ssl: false,
			timeout: None,
			from_email: None,
			default_charset: default_charset(),
			fail_silently: false,
			admins: Vec::new(),
			managers: Vec::new(),
			server_email: default_server_email(),
			subject_prefix: default_subject_prefix(),
			file_path: None,
		}
	}
}

impl MailSettings {
	/// Check cross-field constraints that serde cannot express.
	pub fn validate(&self) -> Result<(), SettingsError> {
		if self.use_tls && self.use_ssl {
			return Err(SettingsError::ValidationError(
				"use_tls and use_ssl are mutually exclusive, set only one of them".to_string(),
			));
		}
		if self.port == 0 {
			return Err(SettingsError::ValidationError(
				"port must be greater than zero".to_string(),
			));
		}
		if self.backend.trim().is_empty() {
			return Err(SettingsError::ValidationError(
				"backend name must not be empty".to_string(),
			));
		}
		Ok(())
	}

	/// Parse settings from a TOML document.
	///
	/// Keys mirror the field names; anything missing keeps its default.
	///
	/// ```
	/// use epistle_conf::MailSettings;
	///
	/// let settings = MailSettings::from_toml_str(r#"
	///     backend = "console"
	///     port = 2525
	///     admins = [["Ops", "ops@example.com"]]
	/// "#).unwrap();
	///
	/// assert_eq!(settings.backend, "console");
	/// assert_eq!(settings.port, 2525);
	/// assert_eq!(settings.admins.len(), 1);
	/// ```
	pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
		let settings: Self =
			toml::from_str(content).map_err(|e| SettingsError::ParseError(e.to_string()))?;
		settings.validate()?;
		Ok(settings)
	}
}

/// Settings error
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("Source error: {0}")]
	Source(#[from] crate::sources::SourceError),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_defaults() {
		let settings = MailSettings::default();
		assert_eq!(settings.backend, "smtp");
		assert_eq!(settings.host, "localhost");
		assert_eq!(settings.default_charset, "utf-8");
		assert_eq!(settings.server_email, "root@localhost");
		assert_eq!(settings.subject_prefix, "[Epistle] ");
		assert!(!settings.fail_silently);
		assert!(settings.from_email.is_none());
	}

	#[rstest]
	fn test_tls_and_ssl_are_exclusive() {
		let mut settings = MailSettings::default();
		settings.use_tls = true;
		settings.use_ssl = true;
		assert!(matches!(
			settings.validate(),
			Err(SettingsError::ValidationError(_))
		));
	}

	#[rstest]
	fn test_zero_port_rejected() {
		let mut settings = MailSettings::default();
		settings.port = 0;
		assert!(settings.validate().is_err());
	}

	#[rstest]
	fn test_from_toml_partial_document() {
		let settings = MailSettings::from_toml_str(
			r#"
			host = "smtp.example.com"
			use_tls = true
			from_email = "app@example.com"
			"#,
		)
		.unwrap();

		assert_eq!(settings.host, "smtp.example.com");
		assert!(settings.use_tls);
		assert_eq!(settings.from_email.as_deref(), Some("app@example.com"));
		// untouched keys keep their defaults
		assert_eq!(settings.port, 25);
		assert_eq!(settings.subject_prefix, "[Epistle] ");
	}

	#[rstest]
	fn test_from_toml_rejects_wrong_type() {
		let result = MailSettings::from_toml_str("port = \"not a number\"");
		assert!(matches!(result, Err(SettingsError::ParseError(_))));
	}
}
