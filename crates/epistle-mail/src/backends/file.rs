use super::{
	EmailBackend, SessionTransport, close_session, open_session, send_batch, write_message,
};
use crate::message::EmailMessage;
use crate::signals::DispatchSignal;
use crate::{EmailError, EmailResult};
use chrono::Local;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub(crate) struct FileSession {
	path: PathBuf,
	writer: BufWriter<File>,
}

/// Writes each session's messages to a new `<timestamp>-<uuid>.log` file in
/// a directory, using the console backend's output format.
///
/// Opening the backend creates the file and closing it releases the file, so
/// messages sent over one scoped connection land in the same file while
/// independent `send_messages` calls each get their own.
pub struct FileBackend {
	directory: PathBuf,
	session: Mutex<Option<FileSession>>,
	last_path: Mutex<Option<PathBuf>>,
	fail_silently: bool,
	signal: DispatchSignal,
}

impl FileBackend {
	/// Use `directory` for message files, creating it when missing.
	pub fn new(directory: impl Into<PathBuf>) -> EmailResult<Self> {
		let directory = directory.into();
		if directory.exists() && !directory.is_dir() {
			return Err(EmailError::Configuration(format!(
				"mail file path {} exists and is not a directory",
				directory.display()
			)));
		}
		fs::create_dir_all(&directory).map_err(|e| {
			EmailError::Configuration(format!(
				"could not create mail directory {}: {}",
				directory.display(),
				e
			))
		})?;
		Ok(Self {
			directory,
			session: Mutex::new(None),
			last_path: Mutex::new(None),
			fail_silently: false,
			signal: DispatchSignal::new(),
		})
	}

	pub fn with_fail_silently(mut self, fail_silently: bool) -> Self {
		self.fail_silently = fail_silently;
		self
	}

	pub fn with_signal(mut self, signal: DispatchSignal) -> Self {
		self.signal = signal;
		self
	}

	pub fn directory(&self) -> &Path {
		&self.directory
	}

	/// Path of the most recently opened session file.
	pub fn last_path(&self) -> Option<PathBuf> {
		self.last_path.lock().clone()
	}

	fn session_file_name() -> String {
		format!(
			"{}-{}.log",
			Local::now().format("%Y%m%d-%H%M%S"),
			uuid::Uuid::new_v4().simple()
		)
	}
}

impl SessionTransport for FileBackend {
	type Session = FileSession;

	fn backend_name(&self) -> &'static str {
		"file"
	}

	fn session_slot(&self) -> &Mutex<Option<FileSession>> {
		&self.session
	}

	fn is_fail_silently(&self) -> bool {
		self.fail_silently
	}

	fn dispatch_signal(&self) -> &DispatchSignal {
		&self.signal
	}

	fn connect(&self) -> EmailResult<FileSession> {
		let path = self.directory.join(Self::session_file_name());
		let file = OpenOptions::new().create_new(true).append(true).open(&path)?;
		tracing::debug!(path = %path.display(), "opened mail file");
		*self.last_path.lock() = Some(path.clone());
		Ok(FileSession {
			path,
			writer: BufWriter::new(file),
		})
	}

	fn disconnect(&self, mut session: FileSession) -> EmailResult<()> {
		session.writer.flush()?;
		tracing::debug!(path = %session.path.display(), "closed mail file");
		Ok(())
	}

	fn deliver(&self, session: &mut FileSession, message: &EmailMessage) -> EmailResult<()> {
		write_message(&mut session.writer, message)
	}
}

impl EmailBackend for FileBackend {
	fn name(&self) -> &'static str {
		"file"
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
