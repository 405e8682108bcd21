//! Charset selection and wire encodings
//!
//! Only UTF-8 and US-ASCII are produced on the wire. Any other declared
//! charset falls back to UTF-8, and US-ASCII is promoted to UTF-8 as soon as
//! the text is not pure ASCII.
//!
//! Encoded words, RFC 2231 parameters and base64 bodies come from
//! `email-encoding`, the encoder behind lettre's message builder. Its header
//! output is folded for a fixed line width; values are unfolded here and
//! folded again only when the whole header line is serialized.

use email_encoding::headers::writer::EmailWriter;
use email_encoding::headers::{rfc2047, rfc2231};
use lettre::message::header::ContentTransferEncoding;
use std::fmt::{self, Write as _};

/// Resolve the charset label that will actually be emitted for `text`.
///
/// ```
/// use epistle_mail::encoding::output_charset;
///
/// assert_eq!(output_charset("us-ascii", "plain"), "us-ascii");
/// assert_eq!(output_charset("us-ascii", "naïve"), "utf-8");
/// assert_eq!(output_charset("UTF8", "plain"), "utf-8");
/// assert_eq!(output_charset("iso-8859-1", "plain"), "utf-8");
/// ```
pub fn output_charset(declared: &str, text: &str) -> &'static str {
	match normalize_charset(declared) {
		"us-ascii" if text.is_ascii() => "us-ascii",
		_ => "utf-8",
	}
}

fn normalize_charset(declared: &str) -> &'static str {
	match declared.trim().to_ascii_lowercase().as_str() {
		"us-ascii" | "ascii" => "us-ascii",
		_ => "utf-8",
	}
}

/// Transfer encoding for a text part carried as-is.
pub fn text_transfer_encoding(text: &str) -> ContentTransferEncoding {
	if text.is_ascii() {
		ContentTransferEncoding::SevenBit
	} else {
		ContentTransferEncoding::EightBit
	}
}

/// Run `write` against a header writer and return its output on one line.
fn header_text(write: impl FnOnce(&mut EmailWriter<'_>) -> fmt::Result) -> String {
	let mut folded = String::new();
	{
		let mut writer = EmailWriter::new(&mut folded, 0, 0, false);
		// a String sink never fails
		let _ = write(&mut writer);
	}
	unfold(&folded)
}

/// Undo header folding: each line break and the whitespace after it collapse
/// into a single space.
///
/// ```
/// use epistle_mail::encoding::unfold;
///
/// assert_eq!(unfold("=?utf-8?b?YQ==?=\r\n =?utf-8?b?Yg==?="), "=?utf-8?b?YQ==?= =?utf-8?b?Yg==?=");
/// assert_eq!(unfold("plain"), "plain");
/// ```
pub fn unfold(value: &str) -> String {
	let mut lines = value.split("\r\n");
	let mut out = lines.next().unwrap_or_default().to_string();
	for line in lines {
		let line = line.trim_start_matches([' ', '\t']);
		if line.is_empty() {
			continue;
		}
		if !out.is_empty() && !out.ends_with(' ') {
			out.push(' ');
		}
		out.push_str(line);
	}
	out
}

/// Encode `text` as RFC 2047 encoded words.
///
/// Pure ASCII text declared as US-ASCII is returned unchanged. Anything
/// else becomes one or more UTF-8 encoded words separated by single spaces,
/// each short enough to sit on its own folded line.
///
/// ```
/// use epistle_mail::encoding::encode_word;
///
/// assert_eq!(encode_word("plain", "us-ascii"), "plain");
///
/// let encoded = encode_word("Firstname Sürname", "utf-8");
/// assert!(encoded.starts_with("=?utf-8?"));
/// assert!(encoded.is_ascii());
/// ```
pub fn encode_word(text: &str, charset: &str) -> String {
	if text.is_empty() || output_charset(charset, text) == "us-ascii" {
		return text.to_string();
	}
	header_text(|writer| rfc2047::encode(text, writer))
}

/// `Content-Disposition` value for an attachment named `filename`.
///
/// The filename parameter follows RFC 2231, so non-ASCII names travel as
/// `filename*=utf-8''...`.
pub fn attachment_disposition(filename: &str) -> String {
	header_text(|writer| {
		writer.write_str("attachment;")?;
		writer.space();
		rfc2231::encode("filename", filename, writer)
	})
}

/// Base64 body encoding with 76-column lines, each terminated by a newline.
pub fn encode_base64_body(content: &[u8]) -> String {
	let mut encoded =
		String::with_capacity(email_encoding::body::base64::encoded_len(content.len()));
	// a String sink never fails
	let _ = email_encoding::body::base64::encode(content, &mut encoded);

	let mut out = encoded.replace("\r\n", "\n");
	if !out.is_empty() && !out.ends_with('\n') {
		out.push('\n');
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	/// Recommended header line width from RFC 5322 section 2.1.1.
	const MAX_LINE_LEN: usize = 78;

	fn decoded(value: &str) -> String {
		let line = format!("Subject: {}", value);
		let (header, _) = mailparse::parse_header(line.as_bytes()).unwrap();
		header.get_value()
	}

	#[rstest]
	#[case("Sürname")]
	#[case("日本語")]
	#[case("Firstname Sürname")]
	#[case("ÄÜÖ → ✓")]
	#[case("Ünïcödé with spaces and = signs?")]
	fn test_encoded_words_decode_back(#[case] input: &str) {
		let encoded = encode_word(input, "utf-8");
		assert!(encoded.is_ascii());
		assert!(!encoded.contains(['\r', '\n']));
		assert_eq!(decoded(&encoded), input);
	}

	#[rstest]
	fn test_ascii_text_under_utf8_is_still_encoded() {
		let encoded = encode_word("abc", "utf-8");
		assert!(encoded.starts_with("=?utf-8?"));
		assert_eq!(decoded(&encoded), "abc");
	}

	#[rstest]
	fn test_unknown_charset_is_labelled_utf8() {
		assert!(encode_word("Zoë", "iso-8859-1").starts_with("=?utf-8?"));
	}

	#[rstest]
	fn test_long_text_splits_into_bounded_words() {
		let text = "ü".repeat(80);
		let encoded = encode_word(&text, "utf-8");
		let words: Vec<&str> = encoded.split(' ').collect();
		assert!(words.len() > 1);
		for word in &words {
			assert!(word.len() < MAX_LINE_LEN, "{} too long", word);
		}
		assert_eq!(decoded(&encoded), text);
	}

	#[rstest]
	#[case("report.pdf")]
	#[case("résumé.txt")]
	fn test_attachment_disposition_round_trips(#[case] filename: &str) {
		let value = attachment_disposition(filename);
		assert!(value.is_ascii());
		assert!(!value.contains(['\r', '\n']));
		let disposition = mailparse::parse_content_disposition(&value);
		assert_eq!(disposition.disposition, mailparse::DispositionType::Attachment);
		assert_eq!(disposition.params.get("filename").map(String::as_str), Some(filename));
	}

	#[rstest]
	fn test_base64_body_wraps_at_76() {
		let body = encode_base64_body(&[0u8; 100]);
		let lines: Vec<&str> = body.lines().collect();
		assert_eq!(lines[0].len(), 76);
		assert!(lines.iter().all(|line| line.len() <= 76));
		assert!(body.ends_with('\n'));
		assert!(!body.contains('\r'));
		assert_eq!(lines.concat(), "A".repeat(132) + "AA==");
	}

	#[rstest]
	fn test_base64_of_nothing_is_empty() {
		assert_eq!(encode_base64_body(&[]), "");
	}

	#[rstest]
	#[case("hello", ContentTransferEncoding::SevenBit)]
	#[case("héllo", ContentTransferEncoding::EightBit)]
	fn test_text_transfer_encoding(#[case] text: &str, #[case] expected: ContentTransferEncoding) {
		assert_eq!(text_transfer_encoding(text), expected);
	}

	#[rstest]
	fn test_unfold_collapses_tabs_and_blank_continuations() {
		assert_eq!(unfold("a;\r\n\tb\r\n \r\n c"), "a; b c");
	}
}
