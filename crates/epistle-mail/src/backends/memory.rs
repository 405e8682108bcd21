use super::{EmailBackend, deliver_each};
use crate::message::EmailMessage;
use crate::signals::DispatchSignal;
use crate::EmailResult;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::Arc;

static GLOBAL_OUTBOX: Lazy<Outbox> = Lazy::new(Outbox::new);

/// Shared list of messages "sent" through [`MemoryBackend`].
///
/// Handles are cheap clones of one list. [`Outbox::global`] is the
/// process-wide list used when no outbox is injected; tests that rely on it
/// must clear it themselves.
///
/// Messages are stored as clones taken at send time, so later changes to the
/// original message do not show up here.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
	messages: Arc<Mutex<Vec<EmailMessage>>>,
}

impl Outbox {
	/// A fresh, empty outbox.
	pub fn new() -> Self {
		Self::default()
	}

	/// Handle to the process-wide outbox.
	pub fn global() -> Self {
		GLOBAL_OUTBOX.clone()
	}

	pub fn push(&self, message: EmailMessage) {
		self.messages.lock().push(message);
	}

	pub fn len(&self) -> usize {
		self.messages.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.messages.lock().is_empty()
	}

	/// Snapshot of the stored messages.
	pub fn messages(&self) -> Vec<EmailMessage> {
		self.messages.lock().clone()
	}

	pub fn get(&self, index: usize) -> Option<EmailMessage> {
		self.messages.lock().get(index).cloned()
	}

	pub fn clear(&self) {
		self.messages.lock().clear();
	}

	/// Remove and return everything stored so far.
	pub fn take(&self) -> Vec<EmailMessage> {
		std::mem::take(&mut *self.messages.lock())
	}

	/// Whether two handles point at the same list.
	pub fn shares_with(&self, other: &Outbox) -> bool {
		Arc::ptr_eq(&self.messages, &other.messages)
	}
}

/// Test backend that appends messages to an [`Outbox`] instead of sending
/// them. Each message is rendered first so header errors still surface.
///
/// # Examples
///
/// ```
/// use epistle_mail::{EmailBackend, EmailMessage, MemoryBackend, Outbox};
///
/// let outbox = Outbox::new();
/// let backend = MemoryBackend::with_outbox(outbox.clone());
/// let message = EmailMessage::builder()
///     .from("app@example.com")
///     .to(["user@example.com"])
///     .subject("stored")
///     .build();
///
/// backend.send_messages(&[message]).unwrap();
/// assert_eq!(outbox.messages()[0].subject(), "stored");
/// ```
pub struct MemoryBackend {
	outbox: Outbox,
	fail_silently: bool,
	signal: DispatchSignal,
}

impl MemoryBackend {
	/// Backend writing to the process-wide outbox.
	pub fn new() -> Self {
		Self::with_outbox(Outbox::global())
	}

	pub fn with_outbox(outbox: Outbox) -> Self {
		Self {
			outbox,
			fail_silently: false,
			signal: DispatchSignal::new(),
		}
	}

	pub fn with_fail_silently(mut self, fail_silently: bool) -> Self {
		self.fail_silently = fail_silently;
		self
	}

	pub fn with_signal(mut self, signal: DispatchSignal) -> Self {
		self.signal = signal;
		self
	}

	pub fn outbox(&self) -> &Outbox {
		&self.outbox
	}
}

impl Default for MemoryBackend {
	fn default() -> Self {
		Self::new()
	}
}

impl EmailBackend for MemoryBackend {
	fn name(&self) -> &'static str {
		"memory"
	}

	fn send_messages(&self, messages: &[EmailMessage]) -> EmailResult<usize> {
		if messages.is_empty() {
			return Ok(0);
		}
		deliver_each(
			self.name(),
			messages,
			self.fail_silently,
			&self.signal,
			|message| {
				message.render()?;
				self.outbox.push(message.clone());
				Ok(())
			},
		)
	}

	fn fail_silently(&self) -> bool {
		self.fail_silently
	}
}
