use super::{EmailBackend, deliver_each, write_message};
use crate::message::EmailMessage;
use crate::signals::DispatchSignal;
use crate::EmailResult;
use parking_lot::Mutex;
use std::io::Write;

/// Writes every message to a text stream (stdout by default), each followed
/// by a 79-dash separator line. The stream is flushed after every message.
///
/// # Examples
///
/// ```
/// use epistle_mail::{ConsoleBackend, EmailBackend, EmailMessage};
///
/// let backend = ConsoleBackend::new();
/// let message = EmailMessage::builder()
///     .from("dev@example.com")
///     .to(["someone@example.com"])
///     .subject("Printed, not sent")
///     .build();
/// assert_eq!(backend.send_messages(&[message]).unwrap(), 1);
/// ```
pub struct ConsoleBackend {
	stream: Mutex<Box<dyn Write + Send>>,
	fail_silently: bool,
	signal: DispatchSignal,
}

impl ConsoleBackend {
	pub fn new() -> Self {
		Self::with_writer(std::io::stdout())
	}

	/// Write to any stream instead of stdout.
	pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
		Self {
			stream: Mutex::new(Box::new(writer)),
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
}

impl Default for ConsoleBackend {
	fn default() -> Self {
		Self::new()
	}
}

impl EmailBackend for ConsoleBackend {
	fn name(&self) -> &'static str {
		"console"
	}

	fn send_messages(&self, messages: &[EmailMessage]) -> EmailResult<usize> {
		if messages.is_empty() {
			return Ok(0);
		}
		let mut stream = self.stream.lock();
		deliver_each(
			self.name(),
			messages,
			self.fail_silently,
			&self.signal,
			|message| write_message(&mut **stream, message),
		)
	}

	fn fail_silently(&self) -> bool {
		self.fail_silently
	}
}
