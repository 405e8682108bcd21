use super::{EmailBackend, SessionTransport, close_session, open_session, send_batch};
use crate::address::{Address, parse_address, sanitize_address};
use crate::message::{EmailMessage, local_hostname};
use crate::signals::DispatchSignal;
use crate::{EmailError, EmailResult};
use epistle_conf::MailSettings;
use lettre::address::Envelope;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{SmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use parking_lot::Mutex;
use std::time::Duration;
use zeroize::Zeroizing;

/// SMTP security mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmtpSecurity {
	/// No encryption
	#[default]
	None,
	/// STARTTLS upgrade after connecting
	StartTls,
	/// Implicit TLS from the first byte
	Tls,
}

/// Delivers messages over SMTP.
///
/// One session is kept at a time. A batch sent while no session is open
/// opens one and closes it again; after an explicit [`open`](EmailBackend::open)
/// the session is reused until [`close`](EmailBackend::close).
///
/// # Examples
///
/// ```
/// use epistle_mail::{SmtpBackend, SmtpSecurity};
/// use std::time::Duration;
///
/// let backend = SmtpBackend::new("smtp.example.com", 587)
///     .with_credentials("user", "secret")
///     .with_security(SmtpSecurity::StartTls)
///     .with_timeout(Duration::from_secs(30));
///
/// assert_eq!(backend.host(), "smtp.example.com");
/// assert!(!backend.is_open());
/// ```
pub struct SmtpBackend {
	host: String,
	port: u16,
	username: Option<String>,
	password: Option<Zeroizing<String>>,
	security: SmtpSecurity,
	timeout: Option<Duration>,
	fail_silently: bool,
	signal: DispatchSignal,
	session: Mutex<Option<SmtpConnection>>,
}

impl SmtpBackend {
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		Self {
			host: host.into(),
			port,
			username: None,
			password: None,
			security: SmtpSecurity::None,
			timeout: None,
			fail_silently: false,
			signal: DispatchSignal::new(),
			session: Mutex::new(None),
		}
	}

	/// Build from resolved settings. `use_ssl` selects implicit TLS and
	/// `use_tls` selects STARTTLS.
	pub fn from_settings(settings: &MailSettings) -> Self {
		let security = if settings.use_ssl {
			SmtpSecurity::Tls
		} else if settings.use_tls {
			SmtpSecurity::StartTls
		} else {
			SmtpSecurity::None
		};
		let mut backend = Self::new(settings.host.clone(), settings.port)
			.with_security(security)
			.with_fail_silently(settings.fail_silently);
		if let Some(timeout) = settings.timeout {
			backend = backend.with_timeout(Duration::from_secs(timeout));
		}
		if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
			backend = backend.with_credentials(username.clone(), password.clone());
		}
		backend
	}

	pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
		self.username = Some(username.into());
		self.password = Some(Zeroizing::new(password.into()));
		self
	}

	pub fn with_security(mut self, security: SmtpSecurity) -> Self {
		self.security = security;
		self
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	pub fn with_fail_silently(mut self, fail_silently: bool) -> Self {
		self.fail_silently = fail_silently;
		self
	}

	pub fn with_signal(mut self, signal: DispatchSignal) -> Self {
		self.signal = signal;
		self
	}

	pub fn host(&self) -> &str {
		&self.host
	}

	pub fn port(&self) -> u16 {
		self.port
	}

	pub fn security(&self) -> SmtpSecurity {
		self.security
	}

	/// Whether a session is currently live.
	pub fn is_open(&self) -> bool {
		self.session.lock().is_some()
	}

	fn credentials(&self) -> Option<Credentials> {
		let username = self.username.as_deref().filter(|u| !u.is_empty())?;
		let password = self.password.as_deref().filter(|p| !p.is_empty())?;
		Some(Credentials::new(username.to_string(), password.to_string()))
	}
}

impl std::fmt::Debug for SmtpBackend {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SmtpBackend")
			.field("host", &self.host)
			.field("port", &self.port)
			.field("username", &self.username)
			.field("password", &self.password.as_ref().map(|_| "***"))
			.field("security", &self.security)
			.field("timeout", &self.timeout)
			.field("fail_silently", &self.fail_silently)
			.finish()
	}
}

/// Sanitize an address and reduce it to the bare mailbox for the envelope.
///
/// Sanitizer errors propagate as they are. A sanitized address the SMTP
/// envelope still cannot carry is a delivery refusal and surfaces as
/// [`EmailError::Transport`], the same class as a server rejecting it.
fn envelope_address(address: &Address, encoding: &str) -> EmailResult<lettre::Address> {
	let sanitized = sanitize_address(address, encoding)?;
	let (_, bare) = parse_address(&sanitized);
	bare.parse::<lettre::Address>().map_err(|e| {
		EmailError::Transport(format!("envelope refused address {:?}: {}", bare, e))
	})
}

fn envelope_for(message: &EmailMessage) -> EmailResult<Envelope> {
	let encoding = message.encoding();
	let from = message
		.from_email()
		.map(|from| envelope_address(from, encoding))
		.transpose()?;
	let recipients = message
		.recipients()
		.iter()
		.map(|recipient| envelope_address(recipient, encoding))
		.collect::<EmailResult<Vec<_>>>()?;
	Envelope::new(from, recipients)
		.map_err(|e| EmailError::Transport(format!("cannot build SMTP envelope: {}", e)))
}

impl SessionTransport for SmtpBackend {
	type Session = SmtpConnection;

	fn backend_name(&self) -> &'static str {
		"smtp"
	}

	fn session_slot(&self) -> &Mutex<Option<SmtpConnection>> {
		&self.session
	}

	fn is_fail_silently(&self) -> bool {
		self.fail_silently
	}

	fn dispatch_signal(&self) -> &DispatchSignal {
		&self.signal
	}

	fn connect(&self) -> EmailResult<SmtpConnection> {
		if self.host.trim().is_empty() {
			return Err(EmailError::Configuration(
				"SMTP host is not configured".to_string(),
			));
		}

		let hello = ClientId::Domain(local_hostname().to_string());
		let tls = match self.security {
			SmtpSecurity::None => None,
			SmtpSecurity::StartTls | SmtpSecurity::Tls => {
				Some(TlsParameters::new(self.host.clone())?)
			}
		};
		let implicit_tls = match self.security {
			SmtpSecurity::Tls => tls.as_ref(),
			_ => None,
		};

		let mut connection = SmtpConnection::connect(
			(self.host.as_str(), self.port),
			self.timeout,
			&hello,
			implicit_tls,
			None,
		)?;

		if self.security == SmtpSecurity::StartTls
			&& let Some(tls) = &tls
		{
			connection.starttls(tls, &hello)?;
		}

		if let Some(credentials) = self.credentials() {
			connection.auth(&[Mechanism::Plain, Mechanism::Login], &credentials)?;
		}

		tracing::debug!(host = %self.host, port = self.port, security = ?self.security, "connected to SMTP server");
		Ok(connection)
	}

	fn disconnect(&self, mut connection: SmtpConnection) -> EmailResult<()> {
		match connection.quit() {
			Ok(_) => Ok(()),
			Err(error) => {
				connection.abort();
				if error.is_transient() || error.is_permanent() {
					Err(error.into())
				} else {
					// TLS shutdown or an already dropped socket: nothing left to close
					tracing::debug!(%error, "SMTP QUIT failed, connection force-closed");
					Ok(())
				}
			}
		}
	}

	fn deliver(&self, connection: &mut SmtpConnection, message: &EmailMessage) -> EmailResult<()> {
		let rendered = message.render()?;
		let envelope = envelope_for(message)?;
		connection.send(&envelope, &rendered.to_wire())?;
		Ok(())
	}
}

impl EmailBackend for SmtpBackend {
	fn name(&self) -> &'static str {
		"smtp"
	}

	fn open(&self) -> EmailResult<bool> {
		open_session(self)
	}

	fn close(&self) -> EmailResult<()> {
		close_session(self)
	}

	fn send_messages(&self, messages: &[EmailMessage]) -> EmailResult<usize> {
		send_batch(self, messages)
	}

	fn fail_silently(&self) -> bool {
		self.fail_silently
	}
}
