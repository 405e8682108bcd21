//! Header guard and case-insensitive extra headers
//!
//! Every header written to a rendered message passes through
//! [`guard_header`], which refuses values carrying CR or LF and encodes
//! non-ASCII text for the wire.

use crate::address::{sanitize_address, split_addresses};
use crate::encoding::encode_word;
use crate::{EmailError, EmailResult};

/// Header names that carry structured address data (RFC 5322 section 3.6)
pub const ADDRESS_HEADERS: &[&str] = &[
	"from",
	"sender",
	"reply-to",
	"to",
	"cc",
	"bcc",
	"resent-from",
	"resent-sender",
	"resent-to",
	"resent-cc",
	"resent-bcc",
];

pub fn is_address_header(name: &str) -> bool {
	ADDRESS_HEADERS
		.iter()
		.any(|known| known.eq_ignore_ascii_case(name))
}

/// Validate a header field name against RFC 5322 `ftext`: printable ASCII
/// except the colon.
pub fn validate_header_name(name: &str) -> EmailResult<()> {
	if name.is_empty() {
		return Err(EmailError::InvalidHeader(
			"Header name must not be empty".to_string(),
		));
	}
	if let Some(bad) = name.chars().find(|&c| !matches!(c, '!'..='9' | ';'..='~')) {
		return Err(EmailError::InvalidHeader(format!(
			"Header name {:?} contains invalid character {:?}",
			name, bad
		)));
	}
	Ok(())
}

/// Check a header and return the (name, value) pair to write.
///
/// - Values containing `\n` or `\r` are rejected.
/// - Pure ASCII values pass through unchanged. `Subject` goes through the
///   encoder as well, which leaves ASCII untouched.
/// - Non-ASCII values of address headers are split into addresses and each
///   one is sanitized; other non-ASCII values become RFC 2047 encoded words.
///
/// # Examples
///
/// ```
/// use epistle_mail::guard_header;
///
/// let (_, value) = guard_header("Subject", "Hello Wörld", "utf-8").unwrap();
/// assert!(value.starts_with("=?utf-8?"));
/// assert!(value.is_ascii());
///
/// assert!(guard_header("Subject", "hi\nBcc: victim@example.com", "utf-8").is_err());
/// ```
pub fn guard_header(name: &str, value: &str, encoding: &str) -> EmailResult<(String, String)> {
	validate_header_name(name)?;

	if value.contains(['\n', '\r']) {
		return Err(EmailError::InvalidHeader(format!(
			"Header values can't contain newlines (got {:?} for header {:?})",
			value, name
		)));
	}

	let encoded = if value.is_ascii() {
		if name.eq_ignore_ascii_case("subject") {
			encode_word(value, "us-ascii")
		} else {
			value.to_string()
		}
	} else if is_address_header(name) {
		split_addresses(value)
			.iter()
			.map(|address| sanitize_address(address, encoding))
			.collect::<EmailResult<Vec<_>>>()?
			.join(", ")
	} else {
		encode_word(value, encoding)
	};

	Ok((name.to_string(), encoded))
}

/// Extra headers keyed case-insensitively, kept in insertion order.
///
/// Inserting a name that already exists (in any case) replaces the value in
/// place and keeps the original spelling of the name.
///
/// ```
/// use epistle_mail::ExtraHeaders;
///
/// let mut headers = ExtraHeaders::new();
/// headers.insert("X-Mailer", "epistle");
/// headers.insert("x-mailer", "epistle 2");
///
/// assert_eq!(headers.len(), 1);
/// assert_eq!(headers.get("X-MAILER"), Some("epistle 2"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraHeaders {
	entries: Vec<(String, String)>,
}

impl ExtraHeaders {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
		let name = name.into();
		let value = value.into();
		match self
			.entries
			.iter_mut()
			.find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
		{
			Some(entry) => entry.1 = value,
			None => self.entries.push((name, value)),
		}
	}

	pub fn get(&self, name: &str) -> Option<&str> {
		self.entries
			.iter()
			.find(|(existing, _)| existing.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	pub fn contains(&self, name: &str) -> bool {
		self.get(name).is_some()
	}

	pub fn remove(&mut self, name: &str) -> Option<String> {
		let index = self
			.entries
			.iter()
			.position(|(existing, _)| existing.eq_ignore_ascii_case(name))?;
		Some(self.entries.remove(index).1)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for ExtraHeaders {
	fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
		let mut headers = Self::new();
		for (name, value) in iter {
			headers.insert(name, value);
		}
		headers
	}
}
