//! The `Filesystem` trait the VFS façade dispatches through (§4.2), and the
//! one implementation of it (§4.1).

pub mod minix;

use crate::file::{Mode, Stat};
use utils::{
	collections::{path::Path, string::String, vec::Vec},
	errno::EResult,
};

/// One directory entry as reported by [`Filesystem::ls`]: a name and the
/// `Stat` of the node it names, fetched eagerly so `ls -l`-style detailed
/// listings don't need a second round-trip per entry.
pub struct DirEntry {
	pub name: String,
	pub stat: Stat,
}

/// The operations a mounted filesystem exposes to the VFS façade (§4.1).
///
/// Every operation takes a full path and re-resolves it; there is no
/// persistent file-handle concept below this trait; the façade's open files
/// (§4.2) are built on top of it.
pub trait Filesystem: Send {
	/// Writes a fresh, empty filesystem image.
	fn format(&mut self) -> EResult<()>;

	/// Reads and validates the on-disk image, loading bitmaps into memory.
	///
	/// Falls back to [`Self::format`] on any validation failure (§4.1, §7 —
	/// a repo convention, not a universal policy).
	fn mount(&mut self) -> EResult<()>;

	fn stat(&mut self, path: &Path) -> EResult<Stat>;

	fn mkdir(&mut self, path: &Path, mode: Mode) -> EResult<()>;

	fn touch(&mut self, path: &Path, mode: Mode) -> EResult<()>;

	fn write_file(&mut self, path: &Path, data: &[u8]) -> EResult<()>;

	/// Reads the whole file into a freshly allocated buffer.
	fn read_file(&mut self, path: &Path) -> EResult<Vec<u8>>;

	fn ls(&mut self, path: &Path) -> EResult<Vec<DirEntry>>;

	fn unlink(&mut self, path: &Path) -> EResult<()>;

	fn rmdir(&mut self, path: &Path) -> EResult<()>;
}
