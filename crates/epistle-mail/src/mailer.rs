//! The mail extension object
//!
//! A [`Mailer`] owns resolved [`MailSettings`], one backend built from them
//! and the dispatch signal that backend fires. Settings are resolved once in
//! [`MailerBuilder::build`]; nothing is looked up again while sending.

use crate::backends::{BackendContext, BackendRegistry, EmailBackend, Outbox, ScopedConnection};
use crate::message::{EmailMessage, EmailMessageBuilder};
use crate::signals::{DispatchSignal, RecordedMessages};
use crate::EmailResult;
use epistle_conf::{MailSettings, SettingsBuilder};
use std::sync::Arc;

/// Settings plus a ready backend.
///
/// # Examples
///
/// ```
/// use epistle_conf::MailSettings;
/// use epistle_mail::Mailer;
///
/// let mut settings = MailSettings::default();
/// settings.backend = "dummy".to_string();
/// settings.from_email = Some("app@example.com".to_string());
/// let mailer = Mailer::new(settings).unwrap();
///
/// let message = mailer.message().to(["user@example.com"]).build();
/// assert_eq!(message.from_email().unwrap(), "app@example.com");
/// assert_eq!(mailer.send(&message).unwrap(), 1);
/// ```
#[derive(Clone)]
pub struct Mailer {
	settings: MailSettings,
	backend: Arc<dyn EmailBackend>,
	signal: DispatchSignal,
}

impl Mailer {
	/// Mailer using the backend named in `settings`.
	pub fn new(settings: MailSettings) -> EmailResult<Self> {
		Self::builder(settings).build()
	}

	/// Resolve settings from layered sources, then build.
	pub fn from_sources(sources: SettingsBuilder) -> EmailResult<Self> {
		Self::new(sources.build()?)
	}

	pub fn builder(settings: MailSettings) -> MailerBuilder {
		MailerBuilder::new(settings)
	}

	pub fn settings(&self) -> &MailSettings {
		&self.settings
	}

	pub fn backend(&self) -> &Arc<dyn EmailBackend> {
		&self.backend
	}

	pub fn signal(&self) -> &DispatchSignal {
		&self.signal
	}

	/// Message builder with the default sender, the default charset and this
	/// mailer's backend already bound.
	pub fn message(&self) -> EmailMessageBuilder {
		let builder = EmailMessage::builder()
			.encoding(self.settings.default_charset.clone())
			.connection(Arc::clone(&self.backend));
		match &self.settings.from_email {
			Some(from) if !from.is_empty() => builder.from(from.clone()),
			_ => builder,
		}
	}

	/// Send one message through this mailer's backend, whatever connection
	/// the message itself is bound to.
	pub fn send(&self, message: &EmailMessage) -> EmailResult<usize> {
		if message.recipients().is_empty() {
			return Ok(0);
		}
		self.backend.send_message(message)
	}

	pub fn send_messages(&self, messages: &[EmailMessage]) -> EmailResult<usize> {
		self.backend.send_messages(messages)
	}

	/// Open the backend for a run of sends. The session is closed when the
	/// returned guard is closed or dropped.
	pub fn connect(&self) -> EmailResult<ScopedConnection> {
		ScopedConnection::open(Arc::clone(&self.backend))
	}

	/// Record every message dispatched until the guard is dropped.
	pub fn record_messages(&self) -> RecordedMessages {
		self.signal.record()
	}
}

impl std::fmt::Debug for Mailer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Mailer")
			.field("backend", &self.backend.name())
			.field("fail_silently", &self.settings.fail_silently)
			.field("from_email", &self.settings.from_email)
			.finish()
	}
}

/// Builder for [`Mailer`]. Explicit values here take precedence over the
/// settings they are applied to.
pub struct MailerBuilder {
	settings: MailSettings,
	backend_name: Option<String>,
	from_email: Option<String>,
	fail_silently: Option<bool>,
	registry: Option<BackendRegistry>,
	outbox: Option<Outbox>,
	signal: Option<DispatchSignal>,
	backend: Option<Arc<dyn EmailBackend>>,
}

impl MailerBuilder {
	pub fn new(settings: MailSettings) -> Self {
		Self {
			settings,
			backend_name: None,
			from_email: None,
			fail_silently: None,
			registry: None,
			outbox: None,
			signal: None,
			backend: None,
		}
	}

	/// Backend name, overriding `settings.backend`.
	pub fn backend_name(mut self, name: impl Into<String>) -> Self {
		self.backend_name = Some(name.into());
		self
	}

	pub fn from_email(mut self, from: impl Into<String>) -> Self {
		self.from_email = Some(from.into());
		self
	}

	pub fn fail_silently(mut self, fail_silently: bool) -> Self {
		self.fail_silently = Some(fail_silently);
		self
	}

	/// Look backend names up in `registry` instead of the built-in one.
	pub fn registry(mut self, registry: BackendRegistry) -> Self {
		self.registry = Some(registry);
		self
	}

	/// Outbox for the memory backend.
	pub fn outbox(mut self, outbox: Outbox) -> Self {
		self.outbox = Some(outbox);
		self
	}

	pub fn signal(mut self, signal: DispatchSignal) -> Self {
		self.signal = Some(signal);
		self
	}

	/// Use a ready-made backend and skip the registry. The backend keeps
	/// whatever signal it was built with.
	pub fn with_backend(mut self, backend: Arc<dyn EmailBackend>) -> Self {
		self.backend = Some(backend);
		self
	}

	pub fn build(self) -> EmailResult<Mailer> {
		let mut settings = self.settings;
		if let Some(name) = self.backend_name {
			settings.backend = name;
		}
		if let Some(from) = self.from_email {
			settings.from_email = Some(from);
		}
		if let Some(fail_silently) = self.fail_silently {
			settings.fail_silently = fail_silently;
		}
		settings.validate()?;

		let signal = self.signal.unwrap_or_default();
		let backend = match self.backend {
			Some(backend) => backend,
			None => {
				let registry = self.registry.unwrap_or_default();
				let mut context = BackendContext::new(&settings, &signal);
				if let Some(outbox) = &self.outbox {
					context = context.with_outbox(outbox);
				}
				registry.create(&settings.backend, &context)?
			}
		};

		tracing::debug!(backend = backend.name(), "mailer ready");
		Ok(Mailer {
			settings,
			backend,
			signal,
		})
	}
}
