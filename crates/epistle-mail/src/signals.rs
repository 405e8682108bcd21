//! Dispatch signal
//!
//! Backends call [`DispatchSignal::send`] once for every message a transport
//! accepted. Receivers run synchronously on the sending thread, after the
//! transport call returned. A signal with no receivers is a no-op.

use crate::message::EmailMessage;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// What a receiver sees for one delivered message.
#[derive(Debug, Clone, Copy)]
pub struct DispatchEvent<'a> {
	pub message: &'a EmailMessage,
	/// Name of the backend that delivered the message
	pub backend: &'a str,
}

type ReceiverFn = Arc<dyn Fn(&DispatchEvent<'_>) + Send + Sync>;

struct ReceiverInfo {
	id: u64,
	dispatch_uid: Option<String>,
	receiver: ReceiverFn,
}

/// Observer list notified after each successful delivery.
///
/// Cloning yields another handle to the same receiver list, so a signal can
/// be shared between a mailer and the backends it builds.
///
/// # Examples
///
/// ```
/// use epistle_mail::{DispatchSignal, EmailMessage};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let signal = DispatchSignal::new();
/// let count = Arc::new(AtomicUsize::new(0));
/// let seen = count.clone();
/// let id = signal.connect(move |_event| {
///     seen.fetch_add(1, Ordering::SeqCst);
/// });
///
/// signal.send(&EmailMessage::builder().build(), "memory");
/// assert_eq!(count.load(Ordering::SeqCst), 1);
///
/// assert!(signal.disconnect(id));
/// signal.send(&EmailMessage::builder().build(), "memory");
/// assert_eq!(count.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone, Default)]
pub struct DispatchSignal {
	receivers: Arc<RwLock<Vec<ReceiverInfo>>>,
	next_id: Arc<AtomicU64>,
}

impl DispatchSignal {
	pub fn new() -> Self {
		Self::default()
	}

	/// Connect a receiver and return its id for [`disconnect`](Self::disconnect).
	pub fn connect<F>(&self, receiver: F) -> u64
	where
		F: Fn(&DispatchEvent<'_>) + Send + Sync + 'static,
	{
		self.connect_with_uid(receiver, None)
	}

	/// Connect a receiver, replacing any receiver registered under the same
	/// `dispatch_uid`.
	pub fn connect_with_uid<F>(&self, receiver: F, dispatch_uid: Option<String>) -> u64
	where
		F: Fn(&DispatchEvent<'_>) + Send + Sync + 'static,
	{
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let mut receivers = self.receivers.write();
		if let Some(uid) = &dispatch_uid {
			receivers.retain(|r| r.dispatch_uid.as_ref() != Some(uid));
		}
		receivers.push(ReceiverInfo {
			id,
			dispatch_uid,
			receiver: Arc::new(receiver),
		});
		id
	}

	/// Remove a receiver. Returns whether it was connected.
	pub fn disconnect(&self, id: u64) -> bool {
		let mut receivers = self.receivers.write();
		let before = receivers.len();
		receivers.retain(|r| r.id != id);
		receivers.len() != before
	}

	pub fn disconnect_all(&self) {
		self.receivers.write().clear();
	}

	pub fn receiver_count(&self) -> usize {
		self.receivers.read().len()
	}

	/// Notify every receiver, in connection order.
	pub fn send(&self, message: &EmailMessage, backend: &str) {
		// snapshot so receivers may connect or disconnect while running
		let receivers: Vec<ReceiverFn> = self
			.receivers
			.read()
			.iter()
			.map(|r| Arc::clone(&r.receiver))
			.collect();
		if receivers.is_empty() {
			return;
		}
		let event = DispatchEvent { message, backend };
		for receiver in receivers {
			receiver(&event);
		}
	}

	/// Record every message dispatched while the returned guard is alive.
	pub fn record(&self) -> RecordedMessages {
		let outbox = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&outbox);
		let id = self.connect(move |event| sink.lock().push(event.message.clone()));
		RecordedMessages {
			signal: self.clone(),
			id,
			outbox,
		}
	}
}

impl std::fmt::Debug for DispatchSignal {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DispatchSignal")
			.field("receivers", &self.receiver_count())
			.finish()
	}
}

/// Messages captured by [`DispatchSignal::record`]. Recording stops when the
/// guard is dropped.
pub struct RecordedMessages {
	signal: DispatchSignal,
	id: u64,
	outbox: Arc<Mutex<Vec<EmailMessage>>>,
}

impl RecordedMessages {
	/// Snapshot of the messages recorded so far.
	pub fn messages(&self) -> Vec<EmailMessage> {
		self.outbox.lock().clone()
	}

	pub fn len(&self) -> usize {
		self.outbox.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.outbox.lock().is_empty()
	}
}

impl Drop for RecordedMessages {
	fn drop(&mut self) {
		self.signal.disconnect(self.id);
	}
}
