//! System limits used across the kernel's core.
//!
//! Trimmed down from the teacher's full POSIX limits table to the handful
//! this rewrite's subsystems actually consult; the rest (AIO, pthread,
//! trace, TTY limits, …) belong to features out of scope here.

/// Size in bytes of a page.
pub const PAGE_SIZE: usize = 4096;
/// Maximum number of bytes in a pathname, including the terminating null.
pub const PATH_MAX: usize = 4096;
/// Maximum number of bytes in a single path component.
pub const NAME_MAX: usize = 255;
/// Maximum number of file descriptors open at once per process.
pub const OPEN_MAX: usize = 1024;
/// Maximum number of simultaneous child processes per process.
pub const CHILD_MAX: usize = 25;
