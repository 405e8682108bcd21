use crate::address::Address;
use crate::backends::EmailBackend;
use crate::headers::ExtraHeaders;
use crate::mime::MimePart;
use crate::{EmailError, EmailResult};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// MIME type for attachments whose type is neither given nor guessable.
pub const DEFAULT_ATTACHMENT_MIME_TYPE: &str = "application/octet-stream";

/// Hostname used in Message-IDs, looked up once per process.
static DNS_NAME: Lazy<String> = Lazy::new(|| {
	hostname::get()
		.ok()
		.map(|name| name.to_string_lossy().into_owned())
		.filter(|name| !name.is_empty())
		.map(|name| idna::domain_to_ascii(&name).unwrap_or(name))
		.unwrap_or_else(|| "localhost".to_string())
});

/// The cached local hostname.
pub fn local_hostname() -> &'static str {
	&DNS_NAME
}

/// Generate an RFC 5322 Message-ID such as
/// `<20240201195627.33539.96671@mail.example.com>`.
///
/// `idstring`, when given, is inserted before the `@` to strengthen
/// uniqueness.
pub fn make_msgid(idstring: Option<&str>) -> String {
	let utcdate = Utc::now().format("%Y%m%d%H%M%S");
	let pid = std::process::id();
	let randint: u32 = rand::thread_rng().gen_range(0..100_000);
	let idstring = idstring.map(|s| format!(".{}", s)).unwrap_or_default();
	format!(
		"<{}.{}.{}{}@{}>",
		utcdate,
		pid,
		randint,
		idstring,
		local_hostname()
	)
}

/// RFC 2822 date in UTC, e.g. `Fri, 09 Nov 2001 01:08:47 -0000`.
pub fn format_date(date: DateTime<Utc>) -> String {
	date.format("%a, %d %b %Y %H:%M:%S -0000").to_string()
}

/// Represents an alternative content type for an email message.
///
/// Alternatives allow providing different representations of the same content,
/// typically used for HTML vs. plain text versions.
///
/// # Examples
///
/// ```
/// use epistle_mail::Alternative;
///
/// let alternative = Alternative::new("text/html", "<h1>Hello!</h1>".as_bytes().to_vec());
/// assert_eq!(alternative.content_type(), "text/html");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternative {
	content_type: String,
	content: Vec<u8>,
}

impl Alternative {
	pub fn new(content_type: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
		Self {
			content_type: content_type.into(),
			content: content.into(),
		}
	}

	/// Create an HTML alternative
	///
	/// ```
	/// use epistle_mail::Alternative;
	///
	/// let html = Alternative::html("<h1>Welcome!</h1>");
	/// assert_eq!(html.content_type(), "text/html");
	/// ```
	pub fn html(content: impl Into<String>) -> Self {
		Self::new("text/html", content.into().into_bytes())
	}

	pub fn content_type(&self) -> &str {
		&self.content_type
	}

	pub fn content(&self) -> &[u8] {
		&self.content
	}

	/// Get the content as string (if valid UTF-8)
	pub fn content_as_string(&self) -> Option<String> {
		String::from_utf8(self.content.clone()).ok()
	}
}

/// A file attachment: optional filename, raw bytes and a MIME type.
///
/// The MIME type is guessed from the filename extension when not given,
/// falling back to `application/octet-stream`.
///
/// # Examples
///
/// ```
/// use epistle_mail::Attachment;
///
/// let attachment = Attachment::new("document.pdf", b"PDF content".to_vec());
/// assert_eq!(attachment.filename(), Some("document.pdf"));
/// assert_eq!(attachment.mime_type(), "application/pdf");
///
/// let unknown = Attachment::new("blob.zzz-unknown", vec![1, 2, 3]);
/// assert_eq!(unknown.mime_type(), "application/octet-stream");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
	filename: Option<String>,
	content: Vec<u8>,
	mime_type: String,
}

impl Attachment {
	pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
		let filename = filename.into();
		Self::with_mimetype(Some(filename), content, None)
	}

	/// Build from every part of the triple; `mimetype` of `None` is guessed.
	pub fn with_mimetype(
		filename: Option<String>,
		content: impl Into<Vec<u8>>,
		mimetype: Option<&str>,
	) -> Self {
		let mime_type = match mimetype {
			Some(mimetype) => mimetype.to_string(),
			None => filename
				.as_deref()
				.map(Self::detect_mime_type)
				.unwrap_or_else(|| DEFAULT_ATTACHMENT_MIME_TYPE.to_string()),
		};
		Self {
			filename,
			content: content.into(),
			mime_type,
		}
	}

	/// Read an attachment from disk, named after the file's base name.
	pub fn from_path(path: impl AsRef<Path>, mimetype: Option<&str>) -> std::io::Result<Self> {
		let path = path.as_ref();
		let content = std::fs::read(path)?;
		let filename = path
			.file_name()
			.map(|name| name.to_string_lossy().into_owned());
		Ok(Self::with_mimetype(filename, content, mimetype))
	}

	pub fn filename(&self) -> Option<&str> {
		self.filename.as_deref()
	}

	pub fn content(&self) -> &[u8] {
		&self.content
	}

	pub fn mime_type(&self) -> &str {
		&self.mime_type
	}

	fn detect_mime_type(filename: &str) -> String {
		mime_guess::from_path(filename)
			.first()
			.map(|mime| mime.to_string())
			.unwrap_or_else(|| DEFAULT_ATTACHMENT_MIME_TYPE.to_string())
	}

	fn to_part(&self, encoding: &str) -> EmailResult<MimePart> {
		let mut part = MimePart::for_content(&self.content, &self.mime_type, encoding)?;
		if let Some(filename) = self.filename.as_deref().filter(|name| !name.is_empty()) {
			part.set_attachment_filename(filename)?;
		}
		Ok(part)
	}
}

/// An entry of a message's attachment list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attached {
	/// Raw triple, converted to a MIME part at render time
	File(Attachment),
	/// Pre-built part inserted verbatim
	Part(MimePart),
}

/// A single email (which can be sent to multiple recipients).
///
/// The message id is fixed at construction. Everything else stays mutable
/// until [`render`](Self::render), which can be called any number of times.
///
/// # Examples
///
/// ```
/// use epistle_mail::EmailMessage;
///
/// let message = EmailMessage::builder()
///     .subject("Hello")
///     .body("Body text")
///     .from("sender@example.com")
///     .to(["a@example.com", "b@example.com"])
///     .cc(["a@example.com"])
///     .build();
///
/// assert_eq!(message.recipients(), vec!["a@example.com", "b@example.com", "a@example.com"]);
/// assert_eq!(message.send_to().len(), 2);
/// ```
#[derive(Clone)]
pub struct EmailMessage {
	subject: String,
	body: String,
	from_email: Option<Address>,
	to: Vec<Address>,
	cc: Vec<Address>,
	bcc: Vec<Address>,
	reply_to: Option<Address>,
	headers: ExtraHeaders,
	attachments: Vec<Attached>,
	alternatives: Vec<Alternative>,
	encoding: String,
	content_subtype: String,
	date: Option<DateTime<Utc>>,
	message_id: String,
	boundary_seed: u64,
	connection: Option<Arc<dyn EmailBackend>>,
}

impl fmt::Debug for EmailMessage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EmailMessage")
			.field("subject", &self.subject)
			.field("from_email", &self.from_email)
			.field("to", &self.to)
			.field("cc", &self.cc)
			.field("bcc", &self.bcc)
			.field("reply_to", &self.reply_to)
			.field("headers", &self.headers)
			.field("attachments", &self.attachments.len())
			.field("alternatives", &self.alternatives.len())
			.field("encoding", &self.encoding)
			.field("message_id", &self.message_id)
			.field("connection", &self.connection.as_ref().map(|c| c.name()))
			.finish()
	}
}

impl EmailMessage {
	pub fn builder() -> EmailMessageBuilder {
		EmailMessageBuilder::default()
	}

	pub fn subject(&self) -> &str {
		&self.subject
	}

	pub fn body(&self) -> &str {
		&self.body
	}

	pub fn from_email(&self) -> Option<&Address> {
		self.from_email.as_ref()
	}

	pub fn to(&self) -> &[Address] {
		&self.to
	}

	pub fn cc(&self) -> &[Address] {
		&self.cc
	}

	pub fn bcc(&self) -> &[Address] {
		&self.bcc
	}

	pub fn reply_to(&self) -> Option<&Address> {
		self.reply_to.as_ref()
	}

	pub fn headers(&self) -> &ExtraHeaders {
		&self.headers
	}

	pub fn headers_mut(&mut self) -> &mut ExtraHeaders {
		&mut self.headers
	}

	pub fn attachments(&self) -> &[Attached] {
		&self.attachments
	}

	pub fn alternatives(&self) -> &[Alternative] {
		&self.alternatives
	}

	/// Declared character set for the body and encoded headers.
	pub fn encoding(&self) -> &str {
		&self.encoding
	}

	pub fn content_subtype(&self) -> &str {
		&self.content_subtype
	}

	pub fn date(&self) -> Option<DateTime<Utc>> {
		self.date
	}

	/// The Message-ID generated at construction.
	pub fn message_id(&self) -> &str {
		&self.message_id
	}

	/// The HTML alternative, if one was registered.
	pub fn html(&self) -> Option<String> {
		self.alternatives
			.iter()
			.find(|alt| alt.content_type().eq_ignore_ascii_case("text/html"))
			.and_then(Alternative::content_as_string)
	}

	pub fn connection(&self) -> Option<&Arc<dyn EmailBackend>> {
		self.connection.as_ref()
	}

	pub fn set_subject(&mut self, subject: impl Into<String>) {
		self.subject = subject.into();
	}

	pub fn set_body(&mut self, body: impl Into<String>) {
		self.body = body.into();
	}

	pub fn set_from(&mut self, from: impl Into<Address>) {
		self.from_email = Some(from.into());
	}

	pub fn set_connection(&mut self, connection: Arc<dyn EmailBackend>) {
		self.connection = Some(connection);
	}

	pub fn add_recipient(&mut self, recipient: impl Into<Address>) -> &mut Self {
		self.to.push(recipient.into());
		self
	}

	/// Attach raw content. A `mimetype` of `None` is guessed from the
	/// filename, falling back to `application/octet-stream`.
	pub fn attach(
		&mut self,
		filename: Option<&str>,
		content: impl Into<Vec<u8>>,
		mimetype: Option<&str>,
	) -> &mut Self {
		self.attachments.push(Attached::File(Attachment::with_mimetype(
			filename.map(str::to_string),
			content,
			mimetype,
		)));
		self
	}

	/// Attach a pre-built MIME part as-is.
	pub fn attach_part(&mut self, part: MimePart) -> &mut Self {
		self.attachments.push(Attached::Part(part));
		self
	}

	/// Attach a file read from disk; read errors propagate.
	pub fn attach_file(
		&mut self,
		path: impl AsRef<Path>,
		mimetype: Option<&str>,
	) -> EmailResult<&mut Self> {
		let attachment = Attachment::from_path(path, mimetype)?;
		self.attachments.push(Attached::File(attachment));
		Ok(self)
	}

	pub fn attach_alternative(
		&mut self,
		content: impl Into<Vec<u8>>,
		mimetype: impl Into<String>,
	) -> &mut Self {
		self.alternatives.push(Alternative::new(mimetype, content));
		self
	}

	/// All recipients: to, then cc, then bcc, duplicates kept.
	pub fn recipients(&self) -> Vec<Address> {
		self.to
			.iter()
			.chain(&self.cc)
			.chain(&self.bcc)
			.cloned()
			.collect()
	}

	/// Distinct recipients.
	pub fn send_to(&self) -> BTreeSet<Address> {
		self.to
			.iter()
			.chain(&self.cc)
			.chain(&self.bcc)
			.cloned()
			.collect()
	}

	/// Whether a backend should attempt delivery: there is a recipient, at
	/// least one of them in `to`, and a non-empty sender.
	pub(crate) fn is_deliverable(&self) -> bool {
		!self.to.is_empty()
			&& self
				.from_email
				.as_ref()
				.is_some_and(|from| !from.is_empty())
	}

	fn boundary(&self, kind: &str) -> String {
		format!("==============={:020}.{}==", self.boundary_seed, kind)
	}

	/// Build the MIME tree for this message.
	///
	/// Fails with [`EmailError::InvalidHeader`] when any header or address
	/// carries a newline. Output is identical across calls once `Date` and
	/// `Message-ID` are fixed.
	pub fn render(&self) -> EmailResult<MimePart> {
		let encoding = self.encoding.as_str();
		let body = MimePart::text(&self.body, &self.content_subtype, encoding);
		let mut msg = self.create_attachments(self.create_alternatives(body)?)?;

		msg.add_header("Subject", &self.subject, encoding)?;

		let from = match self.headers.get("From") {
			Some(value) => value.to_string(),
			None => self
				.from_email
				.as_ref()
				.map(ToString::to_string)
				.unwrap_or_default(),
		};
		if !from.is_empty() {
			msg.add_header("From", &from, encoding)?;
		}

		let to = match self.headers.get("To") {
			Some(value) => value.to_string(),
			None => join_addresses(&self.to),
		};
		msg.add_header("To", &to, encoding)?;

		if !self.cc.is_empty() {
			msg.add_header("Cc", &join_addresses(&self.cc), encoding)?;
		}
		if !self.bcc.is_empty() {
			msg.add_header("Bcc", &join_addresses(&self.bcc), encoding)?;
		}
		if let Some(reply_to) = &self.reply_to {
			msg.add_header("Reply-To", &reply_to.to_string(), encoding)?;
		}
		if !self.headers.contains("Date") {
			let date = self.date.unwrap_or_else(Utc::now);
			msg.add_header("Date", &format_date(date), encoding)?;
		}
		if !self.headers.contains("Message-ID") {
			msg.add_header("Message-ID", &self.message_id, encoding)?;
		}
		for (name, value) in self.headers.iter() {
			if name.eq_ignore_ascii_case("from") || name.eq_ignore_ascii_case("to") {
				continue;
			}
			msg.add_header(name, value, encoding)?;
		}

		Ok(msg)
	}

	/// The rendered message as text with `\n` line endings.
	pub fn as_string(&self) -> EmailResult<String> {
		Ok(self.render()?.as_string())
	}

	/// Send through the bound connection.
	///
	/// Returns 0 without touching any transport when there are no
	/// recipients. With `fail_silently`, transport-class failures (and a
	/// missing connection) yield 0 instead of an error.
	pub fn send(&self, fail_silently: bool) -> EmailResult<usize> {
		if self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty() {
			return Ok(0);
		}

		let Some(connection) = &self.connection else {
			let error = EmailError::Configuration(
				"message has no connection to send through".to_string(),
			);
			if fail_silently {
				tracing::warn!(message_id = %self.message_id, %error, "dropping message");
				return Ok(0);
			}
			return Err(error);
		};

		match connection.send_messages(std::slice::from_ref(self)) {
			Err(error) if fail_silently && error.is_transport_failure() => {
				tracing::warn!(
					message_id = %self.message_id,
					backend = connection.name(),
					%error,
					"send failed silently"
				);
				Ok(0)
			}
			other => other,
		}
	}

	fn create_alternatives(&self, body: MimePart) -> EmailResult<MimePart> {
		if self.alternatives.is_empty() {
			return Ok(body);
		}
		let mut parts = Vec::with_capacity(self.alternatives.len() + 1);
		if !self.body.is_empty() {
			parts.push(body);
		}
		for alternative in &self.alternatives {
			parts.push(MimePart::for_content(
				alternative.content(),
				alternative.content_type(),
				&self.encoding,
			)?);
		}
		Ok(MimePart::multipart(
			"alternative",
			self.boundary("alt"),
			parts,
		))
	}

	fn create_attachments(&self, body: MimePart) -> EmailResult<MimePart> {
		if self.attachments.is_empty() {
			return Ok(body);
		}
		let mut parts = Vec::with_capacity(self.attachments.len() + 1);
		// an alternatives subtree is kept even when the plain body is empty
		if !self.body.is_empty() || !self.alternatives.is_empty() {
			parts.push(body);
		}
		for attachment in &self.attachments {
			parts.push(match attachment {
				Attached::File(file) => file.to_part(&self.encoding)?,
				Attached::Part(part) => part.clone(),
			});
		}
		Ok(MimePart::multipart("mixed", self.boundary("mixed"), parts))
	}
}

fn join_addresses(addresses: &[Address]) -> String {
	addresses
		.iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join(", ")
}

/// Builder for [`EmailMessage`].
///
/// Recipient setters take sequences; a bare string is not a sequence of
/// addresses and does not type-check.
pub struct EmailMessageBuilder {
	subject: String,
	body: String,
	from_email: Option<Address>,
	to: Vec<Address>,
	cc: Vec<Address>,
	bcc: Vec<Address>,
	reply_to: Option<Address>,
	headers: ExtraHeaders,
	attachments: Vec<Attached>,
	alternatives: Vec<Alternative>,
	encoding: String,
	content_subtype: String,
	date: Option<DateTime<Utc>>,
	connection: Option<Arc<dyn EmailBackend>>,
}

impl Default for EmailMessageBuilder {
	fn default() -> Self {
		Self {
			subject: String::new(),
			body: String::new(),
			from_email: None,
			to: Vec::new(),
			cc: Vec::new(),
			bcc: Vec::new(),
			reply_to: None,
			headers: ExtraHeaders::new(),
			attachments: Vec::new(),
			alternatives: Vec::new(),
			encoding: "utf-8".to_string(),
			content_subtype: "plain".to_string(),
			date: None,
			connection: None,
		}
	}
}

impl EmailMessageBuilder {
	pub fn subject(mut self, subject: impl Into<String>) -> Self {
		self.subject = subject.into();
		self
	}

	pub fn body(mut self, body: impl Into<String>) -> Self {
		self.body = body.into();
		self
	}

	/// Sender, either `"addr"`, `"Name <addr>"` or a `(name, addr)` pair.
	pub fn from(mut self, from: impl Into<Address>) -> Self {
		self.from_email = Some(from.into());
		self
	}

	pub fn to<I, A>(mut self, to: I) -> Self
	where
		I: IntoIterator<Item = A>,
		A: Into<Address>,
	{
		self.to = to.into_iter().map(Into::into).collect();
		self
	}

	pub fn cc<I, A>(mut self, cc: I) -> Self
	where
		I: IntoIterator<Item = A>,
		A: Into<Address>,
	{
		self.cc = cc.into_iter().map(Into::into).collect();
		self
	}

	pub fn bcc<I, A>(mut self, bcc: I) -> Self
	where
		I: IntoIterator<Item = A>,
		A: Into<Address>,
	{
		self.bcc = bcc.into_iter().map(Into::into).collect();
		self
	}

	pub fn reply_to(mut self, reply_to: impl Into<Address>) -> Self {
		self.reply_to = Some(reply_to.into());
		self
	}

	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name, value);
		self
	}

	pub fn headers(mut self, headers: ExtraHeaders) -> Self {
		self.headers = headers;
		self
	}

	pub fn attachment(mut self, attachment: Attachment) -> Self {
		self.attachments.push(Attached::File(attachment));
		self
	}

	pub fn attach_part(mut self, part: MimePart) -> Self {
		self.attachments.push(Attached::Part(part));
		self
	}

	pub fn alternative(mut self, alternative: Alternative) -> Self {
		self.alternatives.push(alternative);
		self
	}

	/// Register a `text/html` alternative.
	pub fn html(self, html: impl Into<String>) -> Self {
		self.alternative(Alternative::html(html))
	}

	/// Character set; defaults to `utf-8`.
	pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
		self.encoding = encoding.into();
		self
	}

	/// Subtype of the main body, e.g. `html` for an HTML-only message.
	pub fn content_subtype(mut self, subtype: impl Into<String>) -> Self {
		self.content_subtype = subtype.into();
		self
	}

	/// Fixed `Date` header instead of render time.
	pub fn date(mut self, date: DateTime<Utc>) -> Self {
		self.date = Some(date);
		self
	}

	pub fn connection(mut self, connection: Arc<dyn EmailBackend>) -> Self {
		self.connection = Some(connection);
		self
	}

	pub fn build(self) -> EmailMessage {
		EmailMessage {
			subject: self.subject,
			body: self.body,
			from_email: self.from_email,
			to: self.to,
			cc: self.cc,
			bcc: self.bcc,
			reply_to: self.reply_to,
			headers: self.headers,
			attachments: self.attachments,
			alternatives: self.alternatives,
			encoding: self.encoding,
			content_subtype: self.content_subtype,
			date: self.date,
			message_id: make_msgid(None),
			boundary_seed: rand::thread_rng().r#gen(),
			connection: self.connection,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use rstest::*;

	#[fixture]
	fn message() -> EmailMessage {
		EmailMessage::builder()
			.subject("subject")
			.body("hello")
			.from("from@example.com")
			.to(["to@example.com"])
			.date(Utc.with_ymd_and_hms(2001, 11, 9, 1, 8, 47).unwrap())
			.build()
	}

	#[rstest]
	fn test_msgid_shape() {
		let id = make_msgid(Some("tag"));
		assert!(id.starts_with('<') && id.ends_with('>'));
		assert!(id.contains(".tag@"));
		assert!(id.ends_with(&format!("@{}>", local_hostname())));
	}

	#[rstest]
	fn test_format_date() {
		let date = Utc.with_ymd_and_hms(2001, 11, 9, 1, 8, 47).unwrap();
		assert_eq!(format_date(date), "Fri, 09 Nov 2001 01:08:47 -0000");
	}

	#[rstest]
	fn test_header_order(message: EmailMessage) {
		let mut message = message;
		message.headers_mut().insert("X-Custom", "yes");
		let rendered = message.render().unwrap();
		let names: Vec<&str> = rendered.headers().iter().map(|(n, _)| n.as_str()).collect();
		assert_eq!(
			names,
			vec![
				"Content-Type",
				"MIME-Version",
				"Content-Transfer-Encoding",
				"Subject",
				"From",
				"To",
				"Date",
				"Message-ID",
				"X-Custom",
			]
		);
	}

	#[rstest]
	fn test_extra_headers_override_from_to_date_and_id(message: EmailMessage) {
		let mut message = message;
		message.headers_mut().insert("from", "override@example.com");
		message.headers_mut().insert("To", "list@example.com");
		message.headers_mut().insert("Message-ID", "<fixed@example.com>");
		message.headers_mut().insert("date", "Mon, 01 Jan 2024 00:00:00 -0000");
		let rendered = message.render().unwrap();

		assert_eq!(rendered.header_all("From"), vec!["override@example.com"]);
		assert_eq!(rendered.header_all("To"), vec!["list@example.com"]);
		assert_eq!(rendered.header_all("Message-ID"), vec!["<fixed@example.com>"]);
		assert_eq!(rendered.header_all("Date"), vec!["Mon, 01 Jan 2024 00:00:00 -0000"]);
	}

	#[rstest]
	fn test_render_is_idempotent(message: EmailMessage) {
		let mut message = message;
		message.attach(Some("a.bin"), vec![0u8, 1, 2], None);
		message.attach_alternative("<p>hi</p>", "text/html");
		assert_eq!(message.as_string().unwrap(), message.as_string().unwrap());
	}

	#[rstest]
	fn test_cc_bcc_reply_to_headers() {
		let message = EmailMessage::builder()
			.from(("Sender", "from@example.com"))
			.to(["to@example.com"])
			.cc(["cc1@example.com", "cc2@example.com"])
			.bcc(["hidden@example.com"])
			.reply_to("reply@example.com")
			.build();
		let rendered = message.render().unwrap();
		assert_eq!(rendered.header("From"), Some("Sender <from@example.com>"));
		assert_eq!(rendered.header("Cc"), Some("cc1@example.com, cc2@example.com"));
		assert_eq!(rendered.header("Bcc"), Some("hidden@example.com"));
		assert_eq!(rendered.header("Reply-To"), Some("reply@example.com"));
	}

	#[rstest]
	fn test_empty_body_with_attachment_omits_body_part() {
		let mut message = EmailMessage::builder().to(["to@example.com"]).build();
		message.attach(Some("notes.txt"), "attached text", None);
		let rendered = message.render().unwrap();
		assert_eq!(rendered.content_type(), "multipart/mixed");
		assert_eq!(rendered.parts().len(), 1);
		assert_eq!(
			rendered.parts()[0].header("Content-Disposition"),
			Some("attachment; filename=\"notes.txt\"")
		);
	}

	#[rstest]
	fn test_html_only_with_attachment_keeps_alternatives() {
		let mut message = EmailMessage::builder()
			.to(["to@example.com"])
			.html("<b>hi</b>")
			.build();
		message.attach(None, vec![1u8, 2, 3], Some("application/octet-stream"));
		let rendered = message.render().unwrap();
		assert_eq!(rendered.parts().len(), 2);
		assert_eq!(rendered.parts()[0].content_type(), "multipart/alternative");
		assert_eq!(rendered.parts()[0].parts().len(), 1);
		assert_eq!(rendered.parts()[1].header("Content-Disposition"), None);
	}

	#[rstest]
	fn test_content_subtype_html() {
		let message = EmailMessage::builder()
			.to(["to@example.com"])
			.body("<p>Only HTML</p>")
			.content_subtype("html")
			.build();
		assert_eq!(message.render().unwrap().content_type(), "text/html");
	}

	#[rstest]
	fn test_attach_file_reads_bytes_and_guesses_type() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("report.csv");
		std::fs::write(&path, "a,b\n1,2\n").unwrap();

		let mut message = EmailMessage::builder().build();
		message.attach_file(&path, None).unwrap();
		match &message.attachments()[0] {
			Attached::File(file) => {
				assert_eq!(file.filename(), Some("report.csv"));
				assert_eq!(file.mime_type(), "text/csv");
				assert_eq!(file.content(), b"a,b\n1,2\n");
			}
			Attached::Part(_) => panic!("expected a file attachment"),
		}
	}

	#[rstest]
	fn test_attach_missing_file_is_io_error() {
		let mut message = EmailMessage::builder().build();
		let result = message.attach_file("/no/such/file.txt", None);
		assert!(matches!(result, Err(EmailError::Io(_))));
	}

	#[rstest]
	fn test_pre_built_part_is_inserted_verbatim(message: EmailMessage) {
		let mut message = message;
		let mut part = MimePart::binary("image/png", b"\x89PNG");
		part.add_header("Content-ID", "<logo>", "utf-8").unwrap();
		message.attach_part(part.clone());
		let rendered = message.render().unwrap();
		assert_eq!(rendered.parts()[1], part);
	}

	#[rstest]
	fn test_add_recipient_appends_to(message: EmailMessage) {
		let mut message = message;
		message.add_recipient("second@example.com");
		assert_eq!(message.to(), ["to@example.com", "second@example.com"]);
	}

	#[rstest]
	fn test_send_without_recipients_returns_zero() {
		let message = EmailMessage::builder().from("from@example.com").build();
		assert_eq!(message.send(false).unwrap(), 0);
	}

	#[rstest]
	fn test_send_without_connection(message: EmailMessage) {
		assert!(matches!(message.send(false), Err(EmailError::Configuration(_))));
		assert_eq!(message.send(true).unwrap(), 0);
	}

	#[rstest]
	fn test_deliverability() {
		let bcc_only = EmailMessage::builder()
			.from("from@example.com")
			.bcc(["hidden@example.com"])
			.build();
		assert!(!bcc_only.is_deliverable());

		let no_sender = EmailMessage::builder().to(["to@example.com"]).build();
		assert!(!no_sender.is_deliverable());
	}

	#[rstest]
	fn test_html_accessor() {
		let message = EmailMessage::builder().html("<i>x</i>").build();
		assert_eq!(message.html().as_deref(), Some("<i>x</i>"));
	}
}
