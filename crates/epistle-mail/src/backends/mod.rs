//! Email backends
//!
//! Every backend implements [`EmailBackend`]. Those with a real transport
//! session (SMTP, file) share one open/send/close state machine:
//!
//! 1. An empty batch returns 0 without touching the transport.
//! 2. The session slot is locked for the whole batch.
//! 3. A closed session is opened, and this call remembers that it did so.
//! 4. Messages are delivered in order. Undeliverable ones (no `to`, no
//!    sender) are skipped. Each delivery fires the dispatch signal.
//!    Transport failures either abort the batch or, with fail-silently, skip
//!    the message.
//! 5. A session opened by this call is closed before returning, whatever
//!    happened in step 4. A close failure is logged and never replaces the
//!    batch result.

mod console;
mod dummy;
mod file;
mod memory;
pub mod registry;
mod smtp;

pub use console::ConsoleBackend;
pub use dummy::DummyBackend;
pub use file::FileBackend;
pub use memory::{MemoryBackend, Outbox};
pub use registry::{BackendContext, BackendFactory, BackendRegistry, backend_from_settings};
pub use smtp::{SmtpBackend, SmtpSecurity};

use crate::message::EmailMessage;
use crate::signals::DispatchSignal;
use crate::EmailResult;
use parking_lot::Mutex;
use std::io::Write;
use std::ops::Deref;
use std::sync::Arc;

/// Width of the separator written after each message by text backends.
pub(crate) const SEPARATOR_WIDTH: usize = 79;

/// A mail transport.
///
/// `open` and `close` let callers amortize one session over several
/// `send_messages` calls. Backends without a session keep the defaults.
pub trait EmailBackend: Send + Sync {
	/// Registry name of this backend, e.g. `smtp`.
	fn name(&self) -> &'static str;

	/// Open a session if none is live. Returns whether this call opened it.
	fn open(&self) -> EmailResult<bool> {
		Ok(false)
	}

	/// Close the live session, if any.
	fn close(&self) -> EmailResult<()> {
		Ok(())
	}

	/// Send a batch and return how many messages were delivered.
	fn send_messages(&self, messages: &[EmailMessage]) -> EmailResult<usize>;

	fn fail_silently(&self) -> bool {
		false
	}

	fn send_message(&self, message: &EmailMessage) -> EmailResult<usize> {
		self.send_messages(std::slice::from_ref(message))
	}
}

/// A backend opened for the lifetime of this guard.
///
/// The session is closed on [`close`](Self::close) or on drop, but only when
/// this guard was the one that opened it.
///
/// # Examples
///
/// ```
/// use epistle_mail::{DummyBackend, EmailBackend, EmailMessage, ScopedConnection};
/// use std::sync::Arc;
///
/// let backend: Arc<dyn EmailBackend> = Arc::new(DummyBackend::new());
/// let connection = ScopedConnection::open(backend).unwrap();
/// let message = EmailMessage::builder().from("a@example.com").to(["b@example.com"]).build();
/// assert_eq!(connection.send_messages(&[message.clone(), message]).unwrap(), 2);
/// connection.close().unwrap();
/// ```
pub struct ScopedConnection {
	backend: Arc<dyn EmailBackend>,
	opened: bool,
	closed: bool,
}

impl ScopedConnection {
	pub fn open(backend: Arc<dyn EmailBackend>) -> EmailResult<Self> {
		let opened = backend.open()?;
		Ok(Self {
			backend,
			opened,
			closed: false,
		})
	}

	/// Whether this guard opened the session (and so will close it).
	pub fn opened_session(&self) -> bool {
		self.opened
	}

	pub fn backend(&self) -> &Arc<dyn EmailBackend> {
		&self.backend
	}

	pub fn close(mut self) -> EmailResult<()> {
		self.closed = true;
		if self.opened {
			self.backend.close()
		} else {
			Ok(())
		}
	}
}

impl Deref for ScopedConnection {
	type Target = dyn EmailBackend;

	fn deref(&self) -> &Self::Target {
		self.backend.as_ref()
	}
}

impl Drop for ScopedConnection {
	fn drop(&mut self) {
		if self.closed || !self.opened {
			return;
		}
		if let Err(error) = self.backend.close() {
			tracing::warn!(backend = self.backend.name(), %error, "closing scoped mail connection failed");
		}
	}
}

/// Backends with an explicit transport session.
pub(crate) trait SessionTransport: Send + Sync {
	type Session: Send;

	fn backend_name(&self) -> &'static str;
	fn session_slot(&self) -> &Mutex<Option<Self::Session>>;
	fn is_fail_silently(&self) -> bool;
	fn dispatch_signal(&self) -> &DispatchSignal;

	fn connect(&self) -> EmailResult<Self::Session>;
	fn disconnect(&self, session: Self::Session) -> EmailResult<()>;
	fn deliver(&self, session: &mut Self::Session, message: &EmailMessage) -> EmailResult<()>;
}

pub(crate) fn open_session<T: SessionTransport>(transport: &T) -> EmailResult<bool> {
	let mut slot = transport.session_slot().lock();
	open_locked(transport, &mut slot)
}

pub(crate) fn close_session<T: SessionTransport>(transport: &T) -> EmailResult<()> {
	let mut slot = transport.session_slot().lock();
	close_locked(transport, &mut slot)
}

pub(crate) fn send_batch<T: SessionTransport>(
	transport: &T,
	messages: &[EmailMessage],
) -> EmailResult<usize> {
	if messages.is_empty() {
		return Ok(0);
	}

	let mut slot = transport.session_slot().lock();
	let opened_here = open_locked(transport, &mut slot)?;
	let Some(session) = slot.as_mut() else {
		// open failed silently
		return Ok(0);
	};

	let result = deliver_each(
		transport.backend_name(),
		messages,
		transport.is_fail_silently(),
		transport.dispatch_signal(),
		|message| transport.deliver(session, message),
	);

	// Messages already handed over stay sent; a failed close only gets logged.
	if opened_here && let Err(close_error) = close_locked(transport, &mut slot) {
		match &result {
			Ok(sent) => tracing::warn!(
				backend = transport.backend_name(),
				sent = *sent,
				error = %close_error,
				"batch delivered but closing the session failed"
			),
			Err(_) => tracing::warn!(
				backend = transport.backend_name(),
				error = %close_error,
				"closing the session after a failed batch also failed"
			),
		}
	}

	result
}

fn open_locked<T: SessionTransport>(
	transport: &T,
	slot: &mut Option<T::Session>,
) -> EmailResult<bool> {
	if slot.is_some() {
		return Ok(false);
	}
	match transport.connect() {
		Ok(session) => {
			*slot = Some(session);
			tracing::debug!(backend = transport.backend_name(), "mail session opened");
			Ok(true)
		}
		Err(error) if transport.is_fail_silently() && error.is_transport_failure() => {
			tracing::warn!(
				backend = transport.backend_name(),
				%error,
				"opening mail session failed silently"
			);
			Ok(false)
		}
		Err(error) => Err(error),
	}
}

fn close_locked<T: SessionTransport>(
	transport: &T,
	slot: &mut Option<T::Session>,
) -> EmailResult<()> {
	let Some(session) = slot.take() else {
		return Ok(());
	};
	match transport.disconnect(session) {
		Ok(()) => {
			tracing::debug!(backend = transport.backend_name(), "mail session closed");
			Ok(())
		}
		Err(error) if transport.is_fail_silently() => {
			tracing::warn!(
				backend = transport.backend_name(),
				%error,
				"closing mail session failed silently"
			);
			Ok(())
		}
		Err(error) => Err(error),
	}
}

/// Deliver each message in order and count the successes.
///
/// Undeliverable messages are skipped without error. With `fail_silently`, a
/// transport-class failure skips the message; any other error aborts the
/// batch, leaving earlier deliveries in place.
pub(crate) fn deliver_each<F>(
	backend: &str,
	messages: &[EmailMessage],
	fail_silently: bool,
	signal: &DispatchSignal,
	mut deliver: F,
) -> EmailResult<usize>
where
	F: FnMut(&EmailMessage) -> EmailResult<()>,
{
	let mut sent = 0;
	for message in messages {
		if !message.is_deliverable() {
			tracing::debug!(
				backend,
				message_id = message.message_id(),
				"skipping message without recipients or sender"
			);
			continue;
		}
		match deliver(message) {
			Ok(()) => {
				tracing::debug!(backend, message_id = message.message_id(), "message delivered");
				signal.send(message, backend);
				sent += 1;
			}
			Err(error) if fail_silently && error.is_transport_failure() => {
				tracing::warn!(
					backend,
					message_id = message.message_id(),
					%error,
					"delivery failed silently"
				);
			}
			Err(error) => return Err(error),
		}
	}
	Ok(sent)
}

/// Write a rendered message followed by the separator line, then flush.
pub(crate) fn write_message(out: &mut dyn Write, message: &EmailMessage) -> EmailResult<()> {
	let rendered = message.render()?;
	writeln!(out, "{}", rendered.as_string())?;
	writeln!(out, "{}", "-".repeat(SEPARATOR_WIDTH))?;
	out.flush()?;
	Ok(())
}
