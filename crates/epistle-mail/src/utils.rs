//! Convenience functions over [`Mailer`]

use crate::address::Address;
use crate::headers::ExtraHeaders;
use crate::mailer::Mailer;
use crate::message::EmailMessage;
use crate::EmailResult;

/// Optional parts of a [`send_mail_with_options`] call.
#[derive(Debug, Clone, Default)]
pub struct SendMailOptions {
	pub cc: Vec<Address>,
	pub bcc: Vec<Address>,
	pub reply_to: Option<Address>,
	/// HTML alternative to the plain-text body.
	pub html: Option<String>,
	pub headers: ExtraHeaders,
	pub fail_silently: bool,
}

/// Send one plain-text message through `mailer`.
///
/// `from` falls back to the mailer's default sender. Returns the number of
/// messages delivered (0 or 1).
///
/// # Examples
///
/// ```
/// use epistle_conf::MailSettings;
/// use epistle_mail::{Mailer, Outbox, send_mail};
///
/// let mut settings = MailSettings::default();
/// settings.backend = "memory".to_string();
/// let outbox = Outbox::new();
/// let mailer = Mailer::builder(settings).outbox(outbox.clone()).build().unwrap();
///
/// let sent = send_mail(&mailer, "Hi", "Body", Some("me@example.com"), ["you@example.com"], false).unwrap();
/// assert_eq!(sent, 1);
/// assert_eq!(outbox.messages()[0].subject(), "Hi");
/// ```
pub fn send_mail<I, A>(
	mailer: &Mailer,
	subject: &str,
	body: &str,
	from: Option<&str>,
	to: I,
	fail_silently: bool,
) -> EmailResult<usize>
where
	I: IntoIterator<Item = A>,
	A: Into<Address>,
{
	let options = SendMailOptions {
		fail_silently,
		..SendMailOptions::default()
	};
	send_mail_with_options(mailer, subject, body, from, to, options)
}

/// [`send_mail`] with cc, bcc, reply-to, an HTML alternative and extra headers.
pub fn send_mail_with_options<I, A>(
	mailer: &Mailer,
	subject: &str,
	body: &str,
	from: Option<&str>,
	to: I,
	options: SendMailOptions,
) -> EmailResult<usize>
where
	I: IntoIterator<Item = A>,
	A: Into<Address>,
{
	let mut builder = mailer
		.message()
		.subject(subject)
		.body(body)
		.to(to)
		.cc(options.cc)
		.bcc(options.bcc)
		.headers(options.headers);
	if let Some(from) = from {
		builder = builder.from(from);
	}
	if let Some(reply_to) = options.reply_to {
		builder = builder.reply_to(reply_to);
	}
	if let Some(html) = options.html {
		builder = builder.html(html);
	}
	builder.build().send(options.fail_silently)
}

/// Send many messages over a single connection session.
///
/// Each tuple is `(subject, body, from, recipients)`. Returns how many were
/// delivered.
pub fn send_mass_mail(
	mailer: &Mailer,
	datatuple: &[(&str, &str, Option<&str>, &[&str])],
	fail_silently: bool,
) -> EmailResult<usize> {
	let messages: Vec<EmailMessage> = datatuple
		.iter()
		.map(|(subject, body, from, recipients)| {
			let builder = mailer
				.message()
				.subject(*subject)
				.body(*body)
				.to(recipients.iter().copied());
			let builder = match from {
				Some(from) => builder.from(*from),
				None => builder,
			};
			builder.build()
		})
		.collect();

	let result = mailer
		.connect()
		.and_then(|connection| {
			let sent = connection.send_messages(&messages)?;
			connection.close()?;
			Ok(sent)
		});
	match result {
		Err(error) if fail_silently && error.is_transport_failure() => {
			tracing::warn!(%error, "mass mail failed silently");
			Ok(0)
		}
		other => other,
	}
}

/// Mail the configured admins. Does nothing when there are none.
pub fn mail_admins(
	mailer: &Mailer,
	subject: &str,
	message: &str,
	html_message: Option<&str>,
	fail_silently: bool,
) -> EmailResult<usize> {
	let admins = mailer.settings().admins.clone();
	mail_staff(mailer, &admins, subject, message, html_message, fail_silently)
}

/// Mail the configured managers. Does nothing when there are none.
pub fn mail_managers(
	mailer: &Mailer,
	subject: &str,
	message: &str,
	html_message: Option<&str>,
	fail_silently: bool,
) -> EmailResult<usize> {
	let managers = mailer.settings().managers.clone();
	mail_staff(mailer, &managers, subject, message, html_message, fail_silently)
}

fn mail_staff(
	mailer: &Mailer,
	staff: &[(String, String)],
	subject: &str,
	message: &str,
	html_message: Option<&str>,
	fail_silently: bool,
) -> EmailResult<usize> {
	if staff.is_empty() {
		return Ok(0);
	}
	let settings = mailer.settings();
	let mut builder = mailer
		.message()
		.subject(format!("{}{}", settings.subject_prefix, subject))
		.body(message)
		.from(settings.server_email.as_str())
		.to(staff.iter().map(|(_, email)| email.as_str()));
	if let Some(html) = html_message {
		builder = builder.html(html);
	}
	builder.build().send(fail_silently)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backends::Outbox;
	use epistle_conf::MailSettings;
	use rstest::*;

	struct Harness {
		mailer: Mailer,
		outbox: Outbox,
	}

	#[fixture]
	fn harness() -> Harness {
		let mut settings = MailSettings::default();
		settings.backend = "memory".to_string();
		settings.from_email = Some("default@example.com".to_string());
		settings.admins = vec![
			("Admin One".to_string(), "one@example.com".to_string()),
			("Admin Two".to_string(), "two@example.com".to_string()),
		];
		let outbox = Outbox::new();
		let mailer = Mailer::builder(settings).outbox(outbox.clone()).build().unwrap();
		Harness { mailer, outbox }
	}

	#[rstest]
	fn test_send_mail_uses_default_sender(harness: Harness) {
		send_mail(&harness.mailer, "s", "b", None, ["to@example.com"], false).unwrap();
		assert_eq!(harness.outbox.messages()[0].from_email().unwrap(), "default@example.com");
	}

	#[rstest]
	fn test_send_mail_with_options(harness: Harness) {
		let mut headers = ExtraHeaders::new();
		headers.insert("X-Tag", "welcome");
		let options = SendMailOptions {
			cc: vec!["cc@example.com".into()],
			reply_to: Some("reply@example.com".into()),
			html: Some("<p>b</p>".to_string()),
			headers,
			..SendMailOptions::default()
		};
		let sent = send_mail_with_options(&harness.mailer, "s", "b", None, ["to@example.com"], options).unwrap();
		assert_eq!(sent, 1);

		let stored = harness.outbox.get(0).unwrap();
		assert_eq!(stored.cc(), &["cc@example.com"]);
		assert_eq!(stored.html().as_deref(), Some("<p>b</p>"));
		let rendered = stored.as_string().unwrap();
		assert!(rendered.contains("Reply-To: reply@example.com\n"));
		assert!(rendered.contains("X-Tag: welcome\n"));
	}

	#[rstest]
	fn test_send_mail_without_recipients(harness: Harness) {
		let sent = send_mail(&harness.mailer, "s", "b", None, Vec::<String>::new(), false).unwrap();
		assert_eq!(sent, 0);
		assert!(harness.outbox.is_empty());
	}

	#[rstest]
	fn test_send_mass_mail(harness: Harness) {
		let first: &[&str] = &["a@example.com"];
		let second: &[&str] = &["b@example.com", "c@example.com"];
		let sent = send_mass_mail(
			&harness.mailer,
			&[
				("one", "1", None, first),
				("two", "2", Some("other@example.com"), second),
			],
			false,
		)
		.unwrap();
		assert_eq!(sent, 2);
		let stored = harness.outbox.messages();
		assert_eq!(stored[1].from_email().unwrap(), "other@example.com");
		assert_eq!(stored[1].to().len(), 2);
	}

	#[rstest]
	fn test_mail_admins(harness: Harness) {
		let sent = mail_admins(&harness.mailer, "Disk full", "df says 100%", Some("<b>100%</b>"), false).unwrap();
		assert_eq!(sent, 1);
		let stored = harness.outbox.get(0).unwrap();
		assert_eq!(stored.subject(), "[Epistle] Disk full");
		assert_eq!(stored.from_email().unwrap(), "root@localhost");
		assert_eq!(stored.to(), &["one@example.com", "two@example.com"]);
		assert!(stored.html().is_some());
	}

	#[rstest]
	fn test_mail_managers_without_managers_sends_nothing(harness: Harness) {
		assert_eq!(mail_managers(&harness.mailer, "x", "y", None, false).unwrap(), 0);
		assert!(harness.outbox.is_empty());
	}
}
