//! Mail addresses and the address sanitizer
//!
//! Mailbox syntax is read with lettre's RFC 5322 parser. Parsing stays
//! relaxed: anything lettre rejects is kept verbatim as the address with an
//! empty display name. Validation of what the transport will accept happens
//! later, at send time.

use crate::encoding::encode_word;
use crate::{EmailError, EmailResult};
use lettre::message::{Mailbox, Mailboxes};
use std::fmt;

/// Characters that force a display name to be quoted.
const SPECIALS: &[char] = &[
	'(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"',
];

/// A single mailbox, either a header-ready string or a (name, address) pair.
///
/// # Examples
///
/// ```
/// use epistle_mail::Address;
///
/// let raw: Address = "Jane <jane@example.com>".into();
/// let pair: Address = ("Jane", "jane@example.com").into();
///
/// assert_eq!(raw.to_string(), "Jane <jane@example.com>");
/// assert_eq!(pair.to_string(), "Jane <jane@example.com>");
/// assert_eq!(pair.email(), "jane@example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Address {
	/// Header-ready text such as `"Name <local@domain>"` or `local@domain`
	Raw(String),
	/// Display name and address kept apart
	Named { name: String, email: String },
}

impl Address {
	pub fn new(raw: impl Into<String>) -> Self {
		Self::Raw(raw.into())
	}

	pub fn named(name: impl Into<String>, email: impl Into<String>) -> Self {
		Self::Named {
			name: name.into(),
			email: email.into(),
		}
	}

	/// Split into (display name, address) using relaxed parsing.
	pub fn parts(&self) -> (String, String) {
		match self {
			Self::Raw(raw) => parse_address(raw),
			Self::Named { name, email } => (name.clone(), email.clone()),
		}
	}

	/// The bare address without display name.
	pub fn email(&self) -> String {
		self.parts().1
	}

	pub fn is_empty(&self) -> bool {
		match self {
			Self::Raw(raw) => raw.trim().is_empty(),
			Self::Named { email, .. } => email.trim().is_empty(),
		}
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Raw(raw) => f.write_str(raw),
			Self::Named { name, email } => f.write_str(&format_address(name, email)),
		}
	}
}

impl From<&str> for Address {
	fn from(value: &str) -> Self {
		Self::Raw(value.to_string())
	}
}

impl From<String> for Address {
	fn from(value: String) -> Self {
		Self::Raw(value)
	}
}

impl From<&String> for Address {
	fn from(value: &String) -> Self {
		Self::Raw(value.clone())
	}
}

impl<N: Into<String>, E: Into<String>> From<(N, E)> for Address {
	fn from((name, email): (N, E)) -> Self {
		Self::named(name, email)
	}
}

impl PartialEq<str> for Address {
	fn eq(&self, other: &str) -> bool {
		self.to_string() == other
	}
}

impl PartialEq<&str> for Address {
	fn eq(&self, other: &&str) -> bool {
		self.to_string() == *other
	}
}

/// Parse `Name <addr>`, `"Quoted, Name" <addr>` or a bare address into
/// (display name, address). Never fails: input lettre cannot read as a
/// mailbox is kept whole as the address with an empty display name.
///
/// ```
/// use epistle_mail::address::parse_address;
///
/// assert_eq!(
///     parse_address("\"Doe, Jane\" <jane@example.com>"),
///     ("Doe, Jane".to_string(), "jane@example.com".to_string())
/// );
/// assert_eq!(parse_address("jane@example.com"), (String::new(), "jane@example.com".to_string()));
/// assert_eq!(parse_address("broken <x"), (String::new(), "broken <x".to_string()));
/// ```
pub fn parse_address(raw: &str) -> (String, String) {
	let trimmed = raw.trim();
	match trimmed.parse::<Mailbox>() {
		Ok(mailbox) => (mailbox.name.unwrap_or_default(), mailbox.email.to_string()),
		Err(_) => (String::new(), trimmed.to_string()),
	}
}

/// Split a header value holding several addresses.
///
/// A value lettre reads as a mailbox list keeps its display names; anything
/// else is split on commas and each piece kept raw.
///
/// ```
/// use epistle_mail::Address;
/// use epistle_mail::address::split_addresses;
///
/// assert_eq!(
///     split_addresses("\"Doe, Jane\" <jane@example.com>, bob@example.com"),
///     vec![Address::named("Doe, Jane", "jane@example.com"), Address::new("bob@example.com")]
/// );
/// assert_eq!(split_addresses("tester, , other"), vec![Address::new("tester"), Address::new("other")]);
/// ```
pub fn split_addresses(value: &str) -> Vec<Address> {
	match value.parse::<Mailboxes>() {
		Ok(mailboxes) => mailboxes
			.into_iter()
			.map(|mailbox| match mailbox.name {
				Some(name) if !name.is_empty() => Address::named(name, mailbox.email.to_string()),
				_ => Address::new(mailbox.email.to_string()),
			})
			.collect(),
		Err(_) => value
			.split(',')
			.map(str::trim)
			.filter(|piece| !piece.is_empty())
			.map(Address::new)
			.collect(),
	}
}

/// Combine a display name and address, quoting the name when it contains
/// RFC 5322 specials.
///
/// ```
/// use epistle_mail::address::format_address;
///
/// assert_eq!(format_address("", "a@example.com"), "a@example.com");
/// assert_eq!(format_address("Ann", "a@example.com"), "Ann <a@example.com>");
/// assert_eq!(format_address("A. Nn", "a@example.com"), "\"A. Nn\" <a@example.com>");
/// ```
pub fn format_address(name: &str, email: &str) -> String {
	if name.is_empty() {
		return email.to_string();
	}
	if name.contains(SPECIALS) {
		let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
		format!("\"{}\" <{}>", escaped, email)
	} else {
		format!("{} <{}>", name, email)
	}
}

/// Normalize one address into a value safe for a header or SMTP envelope.
///
/// Non-ASCII display names become RFC 2047 encoded words. A non-ASCII address
/// has its local part encoded as an encoded word and its domain converted
/// with IDNA; without an `@` the whole value is encoded. CR or LF anywhere
/// fails with [`EmailError::InvalidHeader`].
///
/// ```
/// use epistle_mail::{Address, sanitize_address};
///
/// assert_eq!(
///     sanitize_address(&Address::new("to@öäü.com"), "utf-8").unwrap(),
///     "to@xn--4ca9at.com"
/// );
///
/// let named = sanitize_address(&Address::named("Sürname", "s@example.com"), "utf-8").unwrap();
/// assert!(named.starts_with("=?utf-8?"));
/// assert!(named.ends_with(" <s@example.com>"));
///
/// assert!(sanitize_address(&Address::new("a@example.com\r\nBcc: x@y.z"), "utf-8").is_err());
/// ```
pub fn sanitize_address(address: &Address, encoding: &str) -> EmailResult<String> {
	let (name, email) = address.parts();
	if name.contains(['\n', '\r']) || email.contains(['\n', '\r']) {
		return Err(EmailError::InvalidHeader(format!(
			"Header values can't contain newlines (got {:?} for an address)",
			address.to_string()
		)));
	}

	let name = if name.is_ascii() {
		name
	} else {
		encode_word(&name, encoding)
	};

	let email = if email.is_ascii() {
		email
	} else if let Some((local, domain)) = email.split_once('@') {
		let local = if local.is_ascii() {
			local.to_string()
		} else {
			encode_word(local, encoding)
		};
		let domain = idna::domain_to_ascii(domain).map_err(|e| {
			EmailError::InvalidAddress(format!("cannot IDNA-encode domain {:?}: {:?}", domain, e))
		})?;
		format!("{}@{}", local, domain)
	} else {
		encode_word(&email, encoding)
	};

	Ok(format_address(&name, &email))
}
