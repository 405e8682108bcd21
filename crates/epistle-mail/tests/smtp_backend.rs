//! SMTP backend integration tests
//!
//! Runs the backend against an in-process SMTP server on a loopback port,
//! covering per-call and scoped sessions, the envelope, authentication,
//! rejected recipients, failing QUIT and refused connections.

use epistle_mail::{
	DispatchSignal, EmailBackend, EmailError, EmailMessage, ScopedConnection, SmtpBackend,
};
use parking_lot::Mutex;
use rstest::*;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
struct Delivery {
	mail_from: String,
	rcpt_to: Vec<String>,
	data: String,
}

#[derive(Clone)]
struct Behaviour {
	reject_rcpt: Option<String>,
	quit_reply: &'static str,
}

impl Default for Behaviour {
	fn default() -> Self {
		Self {
			reject_rcpt: None,
			quit_reply: "221 2.0.0 Bye",
		}
	}
}

/// Minimal SMTP server accepting one connection at a time.
struct FakeSmtpServer {
	port: u16,
	deliveries: Arc<Mutex<Vec<Delivery>>>,
	auth_lines: Arc<Mutex<Vec<String>>>,
	connections: Arc<AtomicUsize>,
}

impl FakeSmtpServer {
	fn start(behaviour: Behaviour) -> Self {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();
		let deliveries = Arc::new(Mutex::new(Vec::new()));
		let auth_lines = Arc::new(Mutex::new(Vec::new()));
		let connections = Arc::new(AtomicUsize::new(0));

		let server = Self {
			port,
			deliveries: Arc::clone(&deliveries),
			auth_lines: Arc::clone(&auth_lines),
			connections: Arc::clone(&connections),
		};

		std::thread::spawn(move || {
			for stream in listener.incoming() {
				let Ok(stream) = stream else { break };
				connections.fetch_add(1, Ordering::SeqCst);
				let _ = serve(stream, &behaviour, &deliveries, &auth_lines);
			}
		});

		server
	}

	fn backend(&self) -> SmtpBackend {
		SmtpBackend::new("127.0.0.1", self.port).with_timeout(Duration::from_secs(5))
	}

	fn deliveries(&self) -> Vec<Delivery> {
		self.deliveries.lock().clone()
	}

	fn connections(&self) -> usize {
		self.connections.load(Ordering::SeqCst)
	}
}

fn angle_address(line: &str) -> String {
	match (line.find('<'), line.find('>')) {
		(Some(start), Some(end)) if start < end => line[start + 1..end].to_string(),
		_ => String::new(),
	}
}

fn serve(
	stream: TcpStream,
	behaviour: &Behaviour,
	deliveries: &Mutex<Vec<Delivery>>,
	auth_lines: &Mutex<Vec<String>>,
) -> std::io::Result<()> {
	let mut writer = stream.try_clone()?;
	let mut reader = BufReader::new(stream);
	let mut current = Delivery::default();

	writer.write_all(b"220 fake.smtp ESMTP ready\r\n")?;
	loop {
		let mut line = String::new();
		if reader.read_line(&mut line)? == 0 {
			return Ok(());
		}
		let command = line.trim_end().to_string();
		let upper = command.to_ascii_uppercase();

		if upper.starts_with("EHLO") {
			writer.write_all(b"250-fake.smtp\r\n250-AUTH PLAIN LOGIN\r\n250 8BITMIME\r\n")?;
		} else if upper.starts_with("HELO") {
			writer.write_all(b"250 fake.smtp\r\n")?;
		} else if upper.starts_with("AUTH") {
			auth_lines.lock().push(command.clone());
			writer.write_all(b"235 2.7.0 Authentication successful\r\n")?;
		} else if upper.starts_with("MAIL FROM") {
			current = Delivery {
				mail_from: angle_address(&command),
				..Delivery::default()
			};
			writer.write_all(b"250 2.1.0 Ok\r\n")?;
		} else if upper.starts_with("RCPT TO") {
			let recipient = angle_address(&command);
			if behaviour.reject_rcpt.as_deref() == Some(recipient.as_str()) {
				writer.write_all(b"550 5.1.1 No such user\r\n")?;
			} else {
				current.rcpt_to.push(recipient);
				writer.write_all(b"250 2.1.5 Ok\r\n")?;
			}
		} else if upper == "DATA" {
			writer.write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n")?;
			let mut data = String::new();
			loop {
				let mut data_line = String::new();
				if reader.read_line(&mut data_line)? == 0 {
					return Ok(());
				}
				if data_line == ".\r\n" {
					break;
				}
				data.push_str(&data_line);
			}
			current.data = data;
			deliveries.lock().push(std::mem::take(&mut current));
			writer.write_all(b"250 2.0.0 Ok: queued\r\n")?;
		} else if upper == "RSET" || upper == "NOOP" {
			writer.write_all(b"250 2.0.0 Ok\r\n")?;
		} else if upper == "QUIT" {
			writer.write_all(format!("{}\r\n", behaviour.quit_reply).as_bytes())?;
			return Ok(());
		} else {
			writer.write_all(b"500 5.5.2 Unknown command\r\n")?;
		}
	}
}

fn message(to: &str) -> EmailMessage {
	EmailMessage::builder()
		.from("sender@example.com")
		.to([to])
		.subject(format!("For {}", to))
		.body("Hello over SMTP")
		.build()
}

/// Port with nothing listening on it.
fn closed_port() -> u16 {
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	listener.local_addr().unwrap().port()
}

#[fixture]
fn server() -> FakeSmtpServer {
	FakeSmtpServer::start(Behaviour::default())
}

#[rstest]
fn test_batch_uses_one_session(server: FakeSmtpServer) {
	let backend = server.backend();

	let sent = backend
		.send_messages(&[message("a@example.com"), message("b@example.com")])
		.unwrap();

	assert_eq!(sent, 2);
	assert!(!backend.is_open());
	assert_eq!(server.connections(), 1);

	let deliveries = server.deliveries();
	assert_eq!(deliveries.len(), 2);
	assert_eq!(deliveries[0].mail_from, "sender@example.com");
	assert_eq!(deliveries[0].rcpt_to, vec!["a@example.com"]);
	assert_eq!(deliveries[1].rcpt_to, vec!["b@example.com"]);
	assert!(deliveries[0].data.contains("Subject: For a@example.com\r\n"));
	assert!(deliveries[0].data.contains("\r\n\r\nHello over SMTP"));
}

#[rstest]
fn test_each_call_opens_its_own_session(server: FakeSmtpServer) {
	let backend = server.backend();
	backend.send_messages(&[message("a@example.com")]).unwrap();
	backend.send_messages(&[message("b@example.com")]).unwrap();
	assert_eq!(server.connections(), 2);
}

#[rstest]
fn test_scoped_connection_reuses_session(server: FakeSmtpServer) {
	let backend = Arc::new(server.backend());
	let shared: Arc<dyn EmailBackend> = backend.clone();

	let connection = ScopedConnection::open(shared).unwrap();
	assert!(backend.is_open());
	connection.send_messages(&[message("a@example.com")]).unwrap();
	connection.send_messages(&[message("b@example.com")]).unwrap();
	assert!(backend.is_open());
	connection.close().unwrap();

	assert!(!backend.is_open());
	assert_eq!(server.connections(), 1);
	assert_eq!(server.deliveries().len(), 2);
}

#[rstest]
fn test_empty_batch_does_not_connect(server: FakeSmtpServer) {
	assert_eq!(server.backend().send_messages(&[]).unwrap(), 0);
	assert_eq!(server.connections(), 0);
}

#[rstest]
fn test_envelope_covers_cc_and_bcc(server: FakeSmtpServer) {
	let message = EmailMessage::builder()
		.from(("Sender Name", "sender@example.com"))
		.to(["Someone <to@example.com>"])
		.cc(["cc@example.com"])
		.bcc(["hidden@example.com"])
		.build();

	server.backend().send_messages(&[message]).unwrap();

	let delivery = &server.deliveries()[0];
	assert_eq!(delivery.mail_from, "sender@example.com");
	assert_eq!(
		delivery.rcpt_to,
		vec!["to@example.com", "cc@example.com", "hidden@example.com"]
	);
	assert!(delivery.data.contains("From: Sender Name <sender@example.com>\r\n"));
}

#[rstest]
fn test_authenticates_when_credentials_set(server: FakeSmtpServer) {
	let backend = server.backend().with_credentials("user", "secret");
	backend.send_messages(&[message("a@example.com")]).unwrap();

	let auth = server.auth_lines.lock().clone();
	assert_eq!(auth.len(), 1);
	assert!(auth[0].to_ascii_uppercase().starts_with("AUTH PLAIN"));
}

#[rstest]
fn test_no_auth_without_credentials(server: FakeSmtpServer) {
	server.backend().send_messages(&[message("a@example.com")]).unwrap();
	assert!(server.auth_lines.lock().is_empty());
}

#[rstest]
fn test_signal_fires_per_accepted_message() {
	let server = FakeSmtpServer::start(Behaviour {
		reject_rcpt: Some("nobody@example.com".to_string()),
		..Behaviour::default()
	});
	let signal = DispatchSignal::new();
	let recorded = signal.record();
	let backend = server.backend().with_signal(signal).with_fail_silently(true);

	let sent = backend
		.send_messages(&[
			message("a@example.com"),
			message("nobody@example.com"),
			message("b@example.com"),
		])
		.unwrap();

	assert_eq!(sent, 2);
	let subjects: Vec<String> = recorded.messages().iter().map(|m| m.subject().to_string()).collect();
	assert_eq!(subjects, vec!["For a@example.com", "For b@example.com"]);
}

#[rstest]
fn test_rejected_recipient_aborts_batch() {
	let server = FakeSmtpServer::start(Behaviour {
		reject_rcpt: Some("nobody@example.com".to_string()),
		..Behaviour::default()
	});
	let backend = server.backend();

	let result = backend.send_messages(&[
		message("a@example.com"),
		message("nobody@example.com"),
		message("b@example.com"),
	]);

	assert!(matches!(result, Err(EmailError::Smtp(_))));
	assert_eq!(server.deliveries().len(), 1);
	assert!(!backend.is_open());
}

#[rstest]
fn test_unparseable_recipient_is_skipped_when_failing_silently(server: FakeSmtpServer) {
	let backend = server.backend().with_fail_silently(true);

	let sent = backend
		.send_messages(&[
			message("a@example.com"),
			message("tester"),
			message("b@example.com"),
		])
		.unwrap();

	assert_eq!(sent, 2);
	let recipients: Vec<Vec<String>> = server
		.deliveries()
		.into_iter()
		.map(|delivery| delivery.rcpt_to)
		.collect();
	assert_eq!(
		recipients,
		vec![vec!["a@example.com".to_string()], vec!["b@example.com".to_string()]]
	);
	assert!(!backend.is_open());
}

#[rstest]
fn test_unparseable_recipient_aborts_batch(server: FakeSmtpServer) {
	let backend = server.backend();

	let error = backend
		.send_messages(&[message("a@example.com"), message("tester")])
		.unwrap_err();

	assert!(matches!(error, EmailError::Transport(_)));
	assert!(error.is_transport_failure());
	assert_eq!(server.deliveries().len(), 1);
	assert!(!backend.is_open());
}

#[rstest]
#[case(false)]
#[case(true)]
fn test_failed_quit_keeps_sent_count(#[case] fail_silently: bool) {
	let server = FakeSmtpServer::start(Behaviour {
		quit_reply: "554 5.0.0 Quit failed",
		..Behaviour::default()
	});
	let backend = server.backend().with_fail_silently(fail_silently);

	let result = backend.send_messages(&[message("a@example.com")]);

	assert_eq!(result.unwrap(), 1);
	assert_eq!(server.deliveries().len(), 1);
	assert!(!backend.is_open());
}

#[rstest]
fn test_connection_refused() {
	let backend = SmtpBackend::new("127.0.0.1", closed_port()).with_timeout(Duration::from_secs(2));
	let error = backend.send_messages(&[message("a@example.com")]).unwrap_err();
	assert!(error.is_transport_failure());
	assert!(!backend.is_open());
}

#[rstest]
fn test_connection_refused_fail_silently() {
	let backend = SmtpBackend::new("127.0.0.1", closed_port())
		.with_timeout(Duration::from_secs(2))
		.with_fail_silently(true);
	assert_eq!(backend.send_messages(&[message("a@example.com")]).unwrap(), 0);
	assert!(!backend.open().unwrap());
}

#[rstest]
fn test_message_send_fail_silently_on_refused_connection() {
	let backend: Arc<dyn EmailBackend> =
		Arc::new(SmtpBackend::new("127.0.0.1", closed_port()).with_timeout(Duration::from_secs(2)));
	let message = EmailMessage::builder()
		.from("sender@example.com")
		.to(["a@example.com"])
		.connection(backend)
		.build();

	assert_eq!(message.send(true).unwrap(), 0);
	assert!(message.send(false).is_err());
}
