//! Configuration sources for layered mail settings
//!
//! Provides different sources of configuration that can be merged together
//! in priority order (environment variables > config files > in-memory map).

use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

/// Keys whose values are parsed as booleans when read from text sources.
const BOOL_KEYS: &[&str] = &["use_tls", "use_ssl", "fail_silently"];

/// Keys whose values are parsed as integers when read from text sources.
const NUMBER_KEYS: &[&str] = &["port", "timeout"];

/// Keys holding `(name, address)` lists.
const LIST_KEYS: &[&str] = &["admins", "managers"];

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync {
	/// Load configuration from this source
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError>;

	/// Get the priority of this source (higher = more important)
	fn priority(&self) -> u8;

	/// Get a description of this source
	fn description(&self) -> String;
}

/// Error type for configuration sources
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Parse error: {0}")]
	Parse(String),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

/// In-memory key/value source
///
/// Stands in for an application's configuration object: callers set keys
/// programmatically and the builder reads them like any other layer.
///
/// # Examples
///
/// ```
/// use epistle_conf::sources::{ConfigSource, MapSource};
/// use serde_json::json;
///
/// let source = MapSource::new()
///     .with_value("host", json!("smtp.example.com"))
///     .with_value("port", json!(587));
///
/// let values = source.load().unwrap();
/// assert_eq!(values["port"], json!(587));
/// ```
#[derive(Debug, Clone)]
pub struct MapSource {
	values: IndexMap<String, Value>,
	priority: u8,
}

impl MapSource {
	pub fn new() -> Self {
		Self {
			values: IndexMap::new(),
			priority: 50,
		}
	}

	/// Add a value for a configuration key
	pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
		self.set(key, value);
		self
	}

	/// Set a value in place; keys are normalised to lowercase.
	pub fn set(&mut self, key: impl Into<String>, value: Value) {
		self.values.insert(key.into().to_lowercase(), value);
	}

	/// Override the default priority (50)
	pub fn with_priority(mut self, priority: u8) -> Self {
		self.priority = priority;
		self
	}
}

impl Default for MapSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for MapSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		Ok(self.values.clone())
	}

	fn priority(&self) -> u8 {
		self.priority
	}

	fn description(&self) -> String {
		format!("In-memory map ({} keys)", self.values.len())
	}
}

/// Environment variable configuration source
pub struct EnvSource {
	prefix: Option<String>,
}

impl EnvSource {
	/// Create a new environment variable configuration source
	///
	/// # Examples
	///
	/// ```
	/// use epistle_conf::sources::EnvSource;
	///
	/// // Reads MAIL_HOST, MAIL_PORT, ...
	/// let source = EnvSource::new().with_prefix("MAIL_");
	/// ```
	pub fn new() -> Self {
		Self { prefix: None }
	}

	/// Set a prefix filter for environment variables
	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = Some(prefix.into());
		self
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for EnvSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		let mut config = IndexMap::new();

		for (key, value) in std::env::vars() {
			let clean_key = match &self.prefix {
				Some(prefix) => match key.strip_prefix(prefix.as_str()) {
					Some(stripped) => stripped,
					None => continue,
				},
				None => key.as_str(),
			};

			let lower_key = clean_key.to_lowercase();
			let parsed_value = parse_text_value(&lower_key, value)?;
			config.insert(lower_key, parsed_value);
		}

		Ok(config)
	}

	fn priority(&self) -> u8 {
		100 // Highest priority
	}

	fn description(&self) -> String {
		match &self.prefix {
			Some(prefix) => format!("Environment variables (prefix: {})", prefix),
			None => "Environment variables".to_string(),
		}
	}
}

/// Convert a raw text value into the JSON shape expected for `key`.
fn parse_text_value(key: &str, value: String) -> Result<Value, SourceError> {
	if BOOL_KEYS.contains(&key) {
		return match value.trim().to_lowercase().as_str() {
			"true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
			"false" | "0" | "no" | "off" | "" => Ok(Value::Bool(false)),
			other => Err(SourceError::Parse(format!(
				"invalid boolean {:?} for {}",
				other, key
			))),
		};
	}

	if NUMBER_KEYS.contains(&key) {
		return value
			.trim()
			.parse::<u64>()
			.map(|n| Value::Number(n.into()))
			.map_err(|e| SourceError::Parse(format!("invalid number for {}: {}", key, e)));
	}

	if LIST_KEYS.contains(&key) {
		// JSON array of pairs, e.g. [["Ops","ops@example.com"]]
		if value.trim().is_empty() {
			return Ok(Value::Array(Vec::new()));
		}
		return Ok(serde_json::from_str(&value)?);
	}

	Ok(Value::String(value))
}

/// TOML file configuration source
pub struct TomlFileSource {
	path: PathBuf,
}

impl TomlFileSource {
	/// Create a new TOML file configuration source
	///
	/// # Examples
	///
	/// ```
	/// use epistle_conf::sources::TomlFileSource;
	/// use std::path::PathBuf;
	///
	/// let source = TomlFileSource::new(PathBuf::from("mail.toml"));
	/// ```
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlFileSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		if !self.path.exists() {
			tracing::debug!(path = %self.path.display(), "mail config file not found, skipping");
			return Ok(IndexMap::new());
		}

		let content = fs::read_to_string(&self.path)?;
		let toml_value: toml::Value = toml::from_str(&content)?;

		let mut config = IndexMap::new();
		if let toml::Value::Table(table) = toml_value {
			for (key, value) in table {
				config.insert(key.to_lowercase(), serde_json::to_value(value)?);
			}
		}
		Ok(config)
	}

	fn priority(&self) -> u8 {
		80
	}

	fn description(&self) -> String {
		format!("TOML file: {}", self.path.display())
	}
}
