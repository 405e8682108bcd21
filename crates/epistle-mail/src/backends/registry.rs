//! Backend lookup by configured name
//!
//! The built-in names are `smtp`, `console`, `memory` (alias `locmem`),
//! `dummy` and `file` (alias `filebased`). Applications can register their
//! own factories under new names or replace a built-in one.
//!
//! ```
//! use epistle_conf::MailSettings;
//! use epistle_mail::backends::{BackendContext, BackendRegistry, DummyBackend};
//! use epistle_mail::{DispatchSignal, EmailBackend};
//! use std::sync::Arc;
//!
//! let mut registry = BackendRegistry::new();
//! registry.register("pigeon", Arc::new(|_ctx: &BackendContext<'_>| {
//!     Ok(Arc::new(DummyBackend::new()) as Arc<dyn EmailBackend>)
//! }));
//!
//! let settings = MailSettings::default();
//! let signal = DispatchSignal::new();
//! let context = BackendContext::new(&settings, &signal);
//! assert_eq!(registry.create("Pigeon", &context).unwrap().name(), "dummy");
//! ```

use super::{
	ConsoleBackend, DummyBackend, EmailBackend, FileBackend, MemoryBackend, Outbox, SmtpBackend,
};
use crate::signals::DispatchSignal;
use crate::{EmailError, EmailResult};
use epistle_conf::MailSettings;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a factory may draw on when building a backend.
pub struct BackendContext<'a> {
	pub settings: &'a MailSettings,
	pub signal: &'a DispatchSignal,
	/// Outbox for the memory backend; the process-wide one when absent.
	pub outbox: Option<&'a Outbox>,
}

impl<'a> BackendContext<'a> {
	pub fn new(settings: &'a MailSettings, signal: &'a DispatchSignal) -> Self {
		Self {
			settings,
			signal,
			outbox: None,
		}
	}

	pub fn with_outbox(mut self, outbox: &'a Outbox) -> Self {
		self.outbox = Some(outbox);
		self
	}
}

pub type BackendFactory =
	Arc<dyn Fn(&BackendContext<'_>) -> EmailResult<Arc<dyn EmailBackend>> + Send + Sync>;

/// Name to factory map. Names are matched case-insensitively.
#[derive(Clone)]
pub struct BackendRegistry {
	factories: HashMap<String, BackendFactory>,
}

impl BackendRegistry {
	/// Registry holding the built-in backends.
	pub fn new() -> Self {
		let mut registry = Self::empty();

		let smtp: BackendFactory = Arc::new(|ctx: &BackendContext<'_>| {
			let backend = SmtpBackend::from_settings(ctx.settings).with_signal(ctx.signal.clone());
			Ok(Arc::new(backend) as Arc<dyn EmailBackend>)
		});
		registry.register("smtp", smtp);

		let console: BackendFactory = Arc::new(|ctx: &BackendContext<'_>| {
			let backend = ConsoleBackend::new()
				.with_fail_silently(ctx.settings.fail_silently)
				.with_signal(ctx.signal.clone());
			Ok(Arc::new(backend) as Arc<dyn EmailBackend>)
		});
		registry.register("console", console);

		let memory: BackendFactory = Arc::new(|ctx: &BackendContext<'_>| {
			let outbox = ctx.outbox.cloned().unwrap_or_else(Outbox::global);
			let backend = MemoryBackend::with_outbox(outbox)
				.with_fail_silently(ctx.settings.fail_silently)
				.with_signal(ctx.signal.clone());
			Ok(Arc::new(backend) as Arc<dyn EmailBackend>)
		});
		registry.register("memory", memory.clone());
		registry.register("locmem", memory);

		let dummy: BackendFactory =
			Arc::new(|_: &BackendContext<'_>| Ok(Arc::new(DummyBackend::new()) as Arc<dyn EmailBackend>));
		registry.register("dummy", dummy);

		let file: BackendFactory = Arc::new(|ctx: &BackendContext<'_>| {
			let directory = ctx.settings.file_path.clone().ok_or_else(|| {
				EmailError::Configuration(
					"the file backend needs `file_path` to be set".to_string(),
				)
			})?;
			let backend = FileBackend::new(directory)?
				.with_fail_silently(ctx.settings.fail_silently)
				.with_signal(ctx.signal.clone());
			Ok(Arc::new(backend) as Arc<dyn EmailBackend>)
		});
		registry.register("file", file.clone());
		registry.register("filebased", file);

		registry
	}

	/// Registry with no backends at all.
	pub fn empty() -> Self {
		Self {
			factories: HashMap::new(),
		}
	}

	/// Add or replace the factory for `name`.
	pub fn register(&mut self, name: &str, factory: BackendFactory) -> &mut Self {
		self.factories.insert(name.to_ascii_lowercase(), factory);
		self
	}

	pub fn contains(&self, name: &str) -> bool {
		self.factories.contains_key(&name.to_ascii_lowercase())
	}

	/// Registered names, sorted.
	pub fn names(&self) -> Vec<String> {
		let mut names: Vec<String> = self.factories.keys().cloned().collect();
		names.sort();
		names
	}

	pub fn create(&self, name: &str, context: &BackendContext<'_>) -> EmailResult<Arc<dyn EmailBackend>> {
		let key = name.trim().to_ascii_lowercase();
		let factory = self
			.factories
			.get(&key)
			.ok_or_else(|| EmailError::UnknownBackend(name.to_string()))?;
		let backend = factory(context)?;
		tracing::debug!(backend = backend.name(), requested = %key, "created mail backend");
		Ok(backend)
	}
}

impl Default for BackendRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for BackendRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BackendRegistry")
			.field("names", &self.names())
			.finish()
	}
}

/// Build the backend named by `settings.backend` from the built-in set,
/// with a private dispatch signal.
///
/// # Examples
///
/// ```
/// use epistle_conf::MailSettings;
/// use epistle_mail::backend_from_settings;
///
/// let mut settings = MailSettings::default();
/// settings.backend = "console".to_string();
/// assert_eq!(backend_from_settings(&settings).unwrap().name(), "console");
///
/// settings.backend = "carrier-pigeon".to_string();
/// assert!(backend_from_settings(&settings).is_err());
/// ```
pub fn backend_from_settings(settings: &MailSettings) -> EmailResult<Arc<dyn EmailBackend>> {
	let signal = DispatchSignal::new();
	BackendRegistry::new().create(&settings.backend, &BackendContext::new(settings, &signal))
}
