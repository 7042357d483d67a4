//! Kernel logging.
//!
//! Logs are kept in a ring buffer regardless of whether they are also
//! written out somewhere visible, so a post-mortem dump is always possible.

use core::cmp::{min, Ordering};
use core::fmt;
use core::fmt::Write;
use utils::lock::IntMutex;

/// Size in bytes of the kernel log ring buffer.
const LOGS_SIZE: usize = 65536;

/// The kernel's logger.
pub static LOGGER: IntMutex<Logger> = IntMutex::new(Logger::new());

/// Kernel logger, storing logs in a ring buffer.
///
/// The teacher's version also mirrors writes to a TTY; that collaborator is
/// out of scope here; a deployment wiring in a console just needs to drain
/// [`Logger::get_content`] or add a `Write` sink of its own on top.
pub struct Logger {
	/// Tells whether output is silenced. Logs are still kept in the buffer.
	pub silent: bool,
	buf: [u8; LOGS_SIZE],
	read_head: usize,
	write_head: usize,
}

impl Logger {
	/// Creates a new, empty logger.
	#[allow(clippy::new_without_default)]
	pub const fn new() -> Self {
		Self {
			silent: false,
			buf: [0; LOGS_SIZE],
			read_head: 0,
			write_head: 0,
		}
	}

	fn available_space(&self) -> usize {
		match self.write_head.cmp(&self.read_head) {
			Ordering::Equal => self.buf.len(),
			Ordering::Greater => self.buf.len() - (self.write_head - self.read_head),
			Ordering::Less => self.read_head - self.write_head - 1,
		}
	}

	/// Returns the full ring buffer's backing storage, oldest data is not
	/// necessarily at index zero; use [`Self::read_head`] to find the start.
	pub fn get_content(&self) -> &[u8] {
		&self.buf
	}

	/// Pushes `s` onto the log buffer, evicting complete oldest lines first
	/// if there isn't enough room.
	pub fn push(&mut self, s: &[u8]) {
		if self.available_space() < s.len() {
			self.pop(s.len() - self.available_space());
		}
		let len = min(self.available_space(), s.len());
		let end = (self.write_head + len) % self.buf.len();
		if end < self.write_head {
			self.buf[self.write_head..].copy_from_slice(&s[0..(len - end)]);
			self.buf[0..end].copy_from_slice(&s[(len - end)..]);
		} else {
			self.buf[self.write_head..end].copy_from_slice(&s[0..len]);
		}
		self.write_head = end;
	}

	/// Evicts at least `n` bytes, rounded up to whole lines so a line is
	/// never truncated in the middle.
	fn pop(&mut self, n: usize) {
		let read_new = (self.read_head + n) % self.buf.len();
		if read_new >= self.write_head && read_new < self.read_head {
			self.read_head = self.write_head;
			return;
		}
		let mut i = 0;
		while i < self.buf.len() {
			let off = (read_new + i) % self.buf.len();
			if off >= self.write_head || self.buf[off] == b'\n' {
				break;
			}
			i += 1;
		}
		self.read_head = (read_new + i) % self.buf.len();
	}
}

impl Write for Logger {
	fn write_str(&mut self, s: &str) -> fmt::Result {
		self.push(s.as_bytes());
		Ok(())
	}
}
