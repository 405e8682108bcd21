//! MIME part tree and its serialization
//!
//! [`MimePart`] is the rendered form of a message: a header list plus either
//! a leaf payload or a list of child parts. Headers are written in exactly
//! the order they were added, which is what keeps rendering byte-for-byte
//! reproducible.

use crate::encoding::{
	attachment_disposition, encode_base64_body, output_charset, text_transfer_encoding,
};
use crate::{EmailError, EmailResult};

/// Header lines longer than this are folded on whitespace when written.
const MAX_LINE_LEN: usize = 78;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Body {
	Leaf(String),
	Multipart { boundary: String, parts: Vec<MimePart> },
}

/// One node of a MIME tree.
///
/// # Examples
///
/// ```
/// use epistle_mail::MimePart;
///
/// let part = MimePart::text("hello", "plain", "utf-8");
/// assert_eq!(part.content_type(), "text/plain");
/// assert_eq!(
///     part.as_string(),
///     "Content-Type: text/plain; charset=\"utf-8\"\n\
///      MIME-Version: 1.0\n\
///      Content-Transfer-Encoding: 7bit\n\
///      \n\
///      hello"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimePart {
	headers: Vec<(String, String)>,
	body: Body,
}

impl MimePart {
	/// A `text/<subtype>` leaf. The payload is carried as-is with a 7bit or
	/// 8bit transfer encoding.
	pub fn text(content: &str, subtype: &str, charset: &str) -> Self {
		let charset = output_charset(charset, content);
		Self {
			headers: vec![
				(
					"Content-Type".to_string(),
					format!("text/{}; charset=\"{}\"", subtype, charset),
				),
				("MIME-Version".to_string(), "1.0".to_string()),
				(
					"Content-Transfer-Encoding".to_string(),
					text_transfer_encoding(content).to_string(),
				),
			],
			body: Body::Leaf(content.to_string()),
		}
	}

	/// A base64-encoded leaf of any MIME type.
	pub fn binary(mimetype: &str, content: &[u8]) -> Self {
		Self {
			headers: vec![
				("Content-Type".to_string(), mimetype.to_string()),
				("MIME-Version".to_string(), "1.0".to_string()),
				("Content-Transfer-Encoding".to_string(), "base64".to_string()),
			],
			body: Body::Leaf(encode_base64_body(content)),
		}
	}

	/// Build a leaf for `content` typed as `mimetype`: text types holding
	/// valid UTF-8 become text parts, everything else is base64-encoded.
	pub fn for_content(content: &[u8], mimetype: &str, charset: &str) -> EmailResult<Self> {
		let parsed: mime::Mime = mimetype.parse().map_err(|e| {
			EmailError::InvalidHeader(format!("Invalid MIME type {:?}: {}", mimetype, e))
		})?;
		if parsed.type_() == mime::TEXT
			&& let Ok(text) = std::str::from_utf8(content)
		{
			return Ok(Self::text(text, parsed.subtype().as_str(), charset));
		}
		Ok(Self::binary(mimetype, content))
	}

	/// A `multipart/<subtype>` container.
	pub fn multipart(subtype: &str, boundary: impl Into<String>, parts: Vec<MimePart>) -> Self {
		let boundary = boundary.into();
		Self {
			headers: vec![
				(
					"Content-Type".to_string(),
					format!("multipart/{}; boundary=\"{}\"", subtype, boundary),
				),
				("MIME-Version".to_string(), "1.0".to_string()),
			],
			body: Body::Multipart { boundary, parts },
		}
	}

	/// Append a header without any checks. Used for headers the renderer
	/// has already guarded.
	pub(crate) fn push_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
		self.headers.push((name.into(), value.into()));
	}

	/// Append a header after validating it with
	/// [`guard_header`](crate::headers::guard_header).
	pub fn add_header(&mut self, name: &str, value: &str, encoding: &str) -> EmailResult<()> {
		let (name, value) = crate::headers::guard_header(name, value, encoding)?;
		self.headers.push((name, value));
		Ok(())
	}

	/// Add `Content-Disposition: attachment` for `filename`.
	///
	/// The name is written as an RFC 2231 parameter, so non-ASCII names use
	/// the `filename*=utf-8''...` form.
	pub fn set_attachment_filename(&mut self, filename: &str) -> EmailResult<()> {
		if filename.contains(['\n', '\r']) {
			return Err(EmailError::InvalidHeader(format!(
				"Header values can't contain newlines (got {:?} for header \"Content-Disposition\")",
				filename
			)));
		}
		self.push_header("Content-Disposition", attachment_disposition(filename));
		Ok(())
	}

	/// Headers in output order.
	pub fn headers(&self) -> &[(String, String)] {
		&self.headers
	}

	/// First header named `name`, compared case-insensitively.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(existing, _)| existing.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	/// Every value of headers named `name`.
	pub fn header_all(&self, name: &str) -> Vec<&str> {
		self.headers
			.iter()
			.filter(|(existing, _)| existing.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
			.collect()
	}

	/// The bare MIME type, without parameters, lowercased.
	pub fn content_type(&self) -> String {
		let Some(value) = self.header("Content-Type") else {
			return "text/plain".to_string();
		};
		match value.parse::<mime::Mime>() {
			Ok(parsed) => parsed.essence_str().to_string(),
			Err(_) => value
				.split(';')
				.next()
				.unwrap_or_default()
				.trim()
				.to_ascii_lowercase(),
		}
	}

	pub fn is_multipart(&self) -> bool {
		matches!(self.body, Body::Multipart { .. })
	}

	/// Child parts; empty for leaves.
	pub fn parts(&self) -> &[MimePart] {
		match &self.body {
			Body::Multipart { parts, .. } => parts,
			Body::Leaf(_) => &[],
		}
	}

	/// Encoded leaf payload; `None` for multiparts.
	pub fn payload(&self) -> Option<&str> {
		match &self.body {
			Body::Leaf(payload) => Some(payload),
			Body::Multipart { .. } => None,
		}
	}

	/// Serialize with `\n` line endings.
	pub fn as_string(&self) -> String {
		let mut out = String::new();
		self.write_to(&mut out);
		out
	}

	/// Serialize with CRLF line endings, as handed to an SMTP server.
	pub fn to_wire(&self) -> Vec<u8> {
		let text = self.as_string().replace("\r\n", "\n");
		text.replace('\n', "\r\n").into_bytes()
	}

	fn write_to(&self, out: &mut String) {
		for (name, value) in &self.headers {
			write_header(out, name, value);
		}
		out.push('\n');

		match &self.body {
			Body::Leaf(payload) => out.push_str(payload),
			Body::Multipart { boundary, parts } => {
				for (index, part) in parts.iter().enumerate() {
					if index > 0 {
						out.push('\n');
					}
					out.push_str("--");
					out.push_str(boundary);
					out.push('\n');
					part.write_to(out);
				}
				if parts.is_empty() {
					out.push_str("--");
					out.push_str(boundary);
					out.push('\n');
				}
				out.push_str("\n--");
				out.push_str(boundary);
				out.push_str("--\n");
			}
		}
	}
}

/// Write one header line, folding before a space whenever the next word
/// would push the line past [`MAX_LINE_LEN`]. A single word longer than the
/// limit stays whole.
fn write_header(out: &mut String, name: &str, value: &str) {
	out.push_str(name);
	out.push_str(": ");
	let mut line_len = name.len() + 2;
	for (index, word) in value.split(' ').enumerate() {
		if index > 0 {
			if !word.is_empty() && line_len + 1 + word.len() > MAX_LINE_LEN {
				out.push('\n');
				line_len = 0;
			}
			out.push(' ');
			line_len += 1;
		}
		out.push_str(word);
		line_len += word.len();
	}
	out.push('\n');
}
