//! Merge configuration sources into [`MailSettings`]

use crate::settings::{MailSettings, SettingsError};
use crate::sources::ConfigSource;
use indexmap::IndexMap;
use serde_json::Value;

/// Builder that layers configuration sources on top of the defaults
///
/// Sources are applied in ascending priority, so a key present in a
/// higher-priority source wins. Keys that no source provides keep the value
/// from [`MailSettings::default`].
///
/// # Examples
///
/// ```
/// use epistle_conf::SettingsBuilder;
/// use epistle_conf::sources::MapSource;
/// use serde_json::json;
///
/// let settings = SettingsBuilder::new()
///     .add_source(MapSource::new().with_value("backend", json!("memory")))
///     .add_source(
///         MapSource::new()
///             .with_value("backend", json!("console"))
///             .with_priority(90),
///     )
///     .build()
///     .unwrap();
///
/// assert_eq!(settings.backend, "console");
/// ```
#[derive(Default)]
pub struct SettingsBuilder {
	sources: Vec<Box<dyn ConfigSource>>,
}

impl SettingsBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add a configuration source
	pub fn add_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
		self.sources.push(Box::new(source));
		self
	}

	/// Merge every source without deserializing, mostly useful for debugging
	pub fn merged(&self) -> Result<IndexMap<String, Value>, SettingsError> {
		let mut ordered: Vec<&dyn ConfigSource> = self.sources.iter().map(|s| s.as_ref()).collect();
		// stable: equal priorities keep insertion order
		ordered.sort_by_key(|s| s.priority());

		let mut merged = IndexMap::new();
		for source in ordered {
			let values = source.load()?;
			tracing::debug!(
				source = %source.description(),
				keys = values.len(),
				"loaded mail configuration layer"
			);
			merged.extend(values);
		}
		Ok(merged)
	}

	/// Resolve and validate the final settings
	pub fn build(self) -> Result<MailSettings, SettingsError> {
		let merged = self.merged()?;

		let mut base = serde_json::to_value(MailSettings::default())
			.map_err(|e| SettingsError::ParseError(e.to_string()))?;
		if let Value::Object(map) = &mut base {
			for (key, value) in merged {
				map.insert(key, value);
			}
		}

		let settings: MailSettings =
			serde_json::from_value(base).map_err(|e| SettingsError::ParseError(e.to_string()))?;
		settings.validate()?;
		Ok(settings)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sources::MapSource;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_empty_builder_yields_defaults() {
		let settings = SettingsBuilder::new().build().unwrap();
		assert_eq!(settings, MailSettings::default());
	}

	#[rstest]
	fn test_higher_priority_wins_regardless_of_order() {
		let settings = SettingsBuilder::new()
			.add_source(
				MapSource::new()
					.with_value("host", json!("high.example.com"))
					.with_priority(90),
			)
			.add_source(MapSource::new().with_value("host", json!("low.example.com")))
			.build()
			.unwrap();

		assert_eq!(settings.host, "high.example.com");
	}

	#[rstest]
	fn test_unknown_keys_are_ignored() {
		let settings = SettingsBuilder::new()
			.add_source(MapSource::new().with_value("secret_key", json!("nope")))
			.build()
			.unwrap();
		assert_eq!(settings.backend, "smtp");
	}

	#[rstest]
	fn test_invalid_combination_fails_validation() {
		let result = SettingsBuilder::new()
			.add_source(
				MapSource::new()
					.with_value("use_tls", json!(true))
					.with_value("use_ssl", json!(true)),
			)
			.build();
		assert!(matches!(result, Err(SettingsError::ValidationError(_))));
	}

	#[rstest]
	fn test_type_mismatch_is_parse_error() {
		let result = SettingsBuilder::new()
			.add_source(MapSource::new().with_value("port", json!("twenty-five")))
			.build();
		assert!(matches!(result, Err(SettingsError::ParseError(_))));
	}
}
