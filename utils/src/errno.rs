//! The kernel's error vocabulary.
//!
//! Core operations return an [`Errno`] variant (a sum type of error kinds);
//! only the syscall dispatcher maps these to the negative integers user
//! space expects.

use core::fmt;

/// An error kind returned by a core kernel operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Errno {
	/// No such file or directory.
	ENOENT,
	/// Not a directory.
	ENOTDIR,
	/// Is a directory.
	EISDIR,
	/// File exists.
	EEXIST,
	/// Invalid argument.
	EINVAL,
	/// Operation not permitted.
	EPERM,
	/// Out of memory.
	ENOMEM,
	/// No space left on device.
	ENOSPC,
	/// Resource busy.
	EBUSY,
	/// I/O error.
	EIO,
	/// Operation timed out.
	ETIMEDOUT,
	/// Operation not supported.
	ENOSYS,
	/// Bad checksum.
	EBADCHECKSUM,
	/// Bad magic number.
	EBADMAGIC,
	/// Arithmetic overflow.
	EOVERFLOW,
	/// Bad file descriptor.
	EBADF,
	/// Bad address.
	EFAULT,
	/// No such process.
	ESRCH,
	/// Path too long.
	ENAMETOOLONG,
}

impl Errno {
	/// Maps the error kind to the stable negative integer returned to user
	/// space at the syscall boundary.
	pub const fn to_negative_errno(self) -> i64 {
		let code: i64 = match self {
			Self::EPERM => 1,
			Self::ENOENT => 2,
			Self::ESRCH => 3,
			Self::EIO => 5,
			Self::EBADF => 9,
			Self::ENOMEM => 12,
			Self::EFAULT => 14,
			Self::EBUSY => 16,
			Self::EEXIST => 17,
			Self::ENOTDIR => 20,
			Self::EISDIR => 21,
			Self::EINVAL => 22,
			Self::ENOSPC => 28,
			Self::ENAMETOOLONG => 36,
			Self::ENOSYS => 38,
			Self::ETIMEDOUT => 110,
			// The remaining kinds have no direct POSIX errno and are only
			// used internally (checksum/magic/overflow failures are turned
			// into EIO/EINVAL before reaching a syscall return).
			Self::EBADCHECKSUM | Self::EBADMAGIC => 5,
			Self::EOVERFLOW => 75,
		};
		-code
	}
}

impl fmt::Display for Errno {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Self::ENOENT => "no such file or directory",
			Self::ENOTDIR => "not a directory",
			Self::EISDIR => "is a directory",
			Self::EEXIST => "file exists",
			Self::EINVAL => "invalid argument",
			Self::EPERM => "operation not permitted",
			Self::ENOMEM => "out of memory",
			Self::ENOSPC => "no space left on device",
			Self::EBUSY => "resource busy",
			Self::EIO => "I/O error",
			Self::ETIMEDOUT => "operation timed out",
			Self::ENOSYS => "function not implemented",
			Self::EBADCHECKSUM => "bad checksum",
			Self::EBADMAGIC => "bad magic number",
			Self::EOVERFLOW => "overflow",
			Self::EBADF => "bad file descriptor",
			Self::EFAULT => "bad address",
			Self::ESRCH => "no such process",
			Self::ENAMETOOLONG => "path too long",
		};
		f.write_str(s)
	}
}

/// Shorthand result type used across the kernel's core operations.
pub type EResult<T> = Result<T, Errno>;

/// Builds an [`Errno`] value from one of its variant names.
///
/// Mirrors the ergonomics of `errno!(ENOENT)` seen throughout the corpus:
/// a short macro so call sites read like the libc constant they map to.
#[macro_export]
macro_rules! errno {
	($kind:ident) => {
		$crate::errno::Errno::$kind
	};
}
