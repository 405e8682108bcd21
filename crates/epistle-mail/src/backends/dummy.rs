use super::EmailBackend;
use crate::message::EmailMessage;
use crate::EmailResult;

/// Does nothing and reports every message as sent.
///
/// Messages are not rendered and the dispatch signal is not fired.
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyBackend;

impl DummyBackend {
	pub fn new() -> Self {
		Self
	}
}

impl EmailBackend for DummyBackend {
	fn name(&self) -> &'static str {
		"dummy"
	}

	fn send_messages(&self, messages: &[EmailMessage]) -> EmailResult<usize> {
		Ok(messages.len())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_counts_everything() {
		let undeliverable = EmailMessage::builder().subject("bad\nheader").build();
		assert_eq!(DummyBackend.send_messages(&[undeliverable.clone(), undeliverable]).unwrap(), 2);
		assert_eq!(DummyBackend.send_messages(&[]).unwrap(), 0);
		assert!(!DummyBackend.open().unwrap());
	}
}
