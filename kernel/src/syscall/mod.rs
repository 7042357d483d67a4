//! System call dispatch (§4.9): a table indexed by a small integer selector,
//! plus up to five 64-bit arguments, returning a signed 64-bit result
//! (negative = an [`Errno`] per [`Errno::to_negative_errno`]).
//!
//! There is no address-space separation to enforce here (§1 Non-goals — no
//! security boundary beyond the syscall interface itself), so pointer
//! arguments are read directly out of the flat address space rather than
//! copied in through a checked `MemSpace`, the way the teacher's
//! `SyscallString`/`SyscallPtr` do it. The one check that survives is the
//! null check `SyscallString` also makes — a null user pointer is always
//! `EFAULT`.

use crate::{
	file::vfs::Vfs,
	process::{MapFlags, Prot, Process},
};
use core::slice;
use utils::{
	collections::{path::PathBuf, vec::Vec},
	errno,
	errno::{EResult, Errno},
	limits::PATH_MAX,
};

/// The kernel's one owned mutable process/filesystem state (§9's "single
/// owned object" guidance), threaded through every dispatched syscall.
pub struct Kernel {
	pub vfs: Vfs,
	pub process: Process,
	/// Bytes typed at the keyboard but not yet consumed by `read(0, ...)`.
	/// Pushed to by the keyboard interrupt handler, popped from the front by
	/// `sys_read`; `read` of an empty queue returns `0` rather than blocking
	/// (§4.9, §5).
	stdin: Vec<u8>,
}

impl Kernel {
	pub fn new(vfs: Vfs, process: Process) -> Self {
		Self { vfs, process, stdin: Vec::new() }
	}

	/// Appends a byte to the stdin queue. Called from the keyboard
	/// interrupt handler; it never blocks and never fails.
	pub fn push_stdin(&mut self, byte: u8) {
		self.stdin.push(byte);
	}
}

/// Reads a NUL-terminated path out of the flat address space at `ptr`.
///
/// # Safety
///
/// `ptr`, if non-null, must point to memory the kernel is allowed to read;
/// there is no page-table-backed check available to make this safe in
/// general (§1 Non-goals), so this trusts the caller the same way the rest
/// of this single-address-space kernel does.
unsafe fn read_path(ptr: u64) -> EResult<PathBuf> {
	if ptr == 0 {
		return Err(errno!(EFAULT));
	}
	let bytes = unsafe { slice::from_raw_parts(ptr as *const u8, PATH_MAX) };
	let len = bytes.iter().position(|&b| b == 0).ok_or(errno!(ENAMETOOLONG))?;
	PathBuf::try_from(&bytes[..len])
}

/// Borrows `len` bytes of the flat address space at `ptr` for reading.
unsafe fn read_buf<'a>(ptr: u64, len: u64) -> EResult<&'a [u8]> {
	if ptr == 0 {
		return Err(errno!(EFAULT));
	}
	Ok(unsafe { slice::from_raw_parts(ptr as *const u8, len as usize) })
}

/// Borrows `len` bytes of the flat address space at `ptr` for writing.
unsafe fn write_buf<'a>(ptr: u64, len: u64) -> EResult<&'a mut [u8]> {
	if ptr == 0 {
		return Err(errno!(EFAULT));
	}
	Ok(unsafe { slice::from_raw_parts_mut(ptr as *mut u8, len as usize) })
}

/// Copies as much of `src` as fits into the `len`-byte buffer at `ptr`,
/// returning the number of bytes copied.
fn copy_out(ptr: u64, len: u64, src: &[u8]) -> EResult<i64> {
	let buf = unsafe { write_buf(ptr, len)? };
	let n = src.len().min(buf.len());
	buf[..n].copy_from_slice(&src[..n]);
	Ok(n as i64)
}

fn sys_exit(kernel: &mut Kernel, status: u64) -> EResult<i64> {
	kernel.process.state = crate::process::State::Zombie(status as i32);
	Ok(0)
}

fn sys_write(kernel: &mut Kernel, fd: u64, ptr: u64, len: u64) -> EResult<i64> {
	let buf = unsafe { read_buf(ptr, len)? };
	match fd {
		1 | 2 => {
			crate::logger::LOGGER.lock().push(buf);
			Ok(buf.len() as i64)
		}
		_ => Ok(kernel.vfs.write(fd as usize, buf)? as i64),
	}
}

fn sys_read(kernel: &mut Kernel, fd: u64, ptr: u64, len: u64) -> EResult<i64> {
	let buf = unsafe { write_buf(ptr, len)? };
	if fd == 0 {
		let n = buf.len().min(kernel.stdin.len());
		buf[..n].copy_from_slice(&kernel.stdin[..n]);
		kernel.stdin.drain(..n);
		return Ok(n as i64);
	}
	Ok(kernel.vfs.read(fd as usize, buf)? as i64)
}

fn sys_getpid(kernel: &Kernel) -> EResult<i64> {
	Ok(kernel.process.pid as i64)
}

/// There is exactly one process in this kernel's model (§4.8), so it has no
/// parent; the conventional "no parent" pid is 0.
fn sys_getppid() -> EResult<i64> {
	Ok(0)
}

fn sys_ls(kernel: &mut Kernel, path_ptr: u64, buf_ptr: u64, buf_len: u64) -> EResult<i64> {
	let path = unsafe { read_path(path_ptr)? };
	let entries = kernel.vfs.ls(path.as_path())?;
	let mut rendered = utils::collections::string::String::new();
	for entry in &entries {
		rendered.push_str(&entry.name);
		rendered.push('\n');
	}
	copy_out(buf_ptr, buf_len, rendered.as_bytes())
}

fn sys_mkdir(kernel: &mut Kernel, path_ptr: u64, mode: u64) -> EResult<i64> {
	let path = unsafe { read_path(path_ptr)? };
	kernel.vfs.mkdir(path.as_path(), mode as u16)?;
	Ok(0)
}

fn sys_ps(kernel: &Kernel, buf_ptr: u64, buf_len: u64) -> EResult<i64> {
	let line = alloc::format!("{}\t{:?}\n", kernel.process.pid, kernel.process.state);
	copy_out(buf_ptr, buf_len, line.as_bytes())
}

fn sys_kernel_info(buf_ptr: u64, buf_len: u64) -> EResult<i64> {
	let info = alloc::format!("ir0 ({:?})\n", crate::config::TARGET);
	copy_out(buf_ptr, buf_len, info.as_bytes())
}

fn sys_cat(kernel: &mut Kernel, path_ptr: u64, buf_ptr: u64, buf_len: u64) -> EResult<i64> {
	let path = unsafe { read_path(path_ptr)? };
	let rendered = kernel.vfs.cat(path.as_path())?;
	copy_out(buf_ptr, buf_len, rendered.as_bytes())
}

fn sys_touch(kernel: &mut Kernel, path_ptr: u64, mode: u64) -> EResult<i64> {
	let path = unsafe { read_path(path_ptr)? };
	kernel.vfs.touch(path.as_path(), mode as u16)?;
	Ok(0)
}

fn sys_rm(kernel: &mut Kernel, path_ptr: u64) -> EResult<i64> {
	let path = unsafe { read_path(path_ptr)? };
	kernel.vfs.unlink(path.as_path())?;
	Ok(0)
}

fn sys_rmdir(kernel: &mut Kernel, path_ptr: u64) -> EResult<i64> {
	let path = unsafe { read_path(path_ptr)? };
	kernel.vfs.rmdir(path.as_path())?;
	Ok(0)
}

/// A single current-process slot has nothing to fork into and nothing to
/// wait for (§4.8); both syscalls are in the dispatch table for ABI
/// completeness but are not implemented.
fn sys_fork() -> EResult<i64> {
	Err(errno!(ENOSYS))
}

fn sys_waitpid() -> EResult<i64> {
	Err(errno!(ENOSYS))
}

/// Allocates and frees a `size`-byte buffer through the global allocator, to
/// exercise it the same way a userspace `malloc`/`free` pair would.
fn sys_malloc_test(size: u64) -> EResult<i64> {
	let mut buf = Vec::new();
	buf.resize(size as usize, 0xaau8);
	core::hint::black_box(&buf);
	drop(buf);
	Ok(0)
}

fn sys_brk(kernel: &mut Kernel, addr: u64) -> EResult<i64> {
	Ok(kernel.process.heap.brk(addr as usize)? as i64)
}

fn sys_sbrk(kernel: &mut Kernel, delta: u64) -> EResult<i64> {
	Ok(kernel.process.heap.sbrk(delta as i64 as isize)? as i64)
}

fn sys_mmap(kernel: &mut Kernel, len: u64, prot: u64, flags: u64, fd: u64) -> EResult<i64> {
	let addr = kernel.process.mmap(len as usize, prot as Prot, flags as MapFlags, fd as i64)?;
	Ok(addr as i64)
}

fn sys_munmap(kernel: &mut Kernel, addr: u64, len: u64) -> EResult<i64> {
	kernel.process.munmap(addr as usize, len as usize)?;
	Ok(0)
}

fn sys_mprotect(kernel: &mut Kernel, addr: u64, len: u64, prot: u64) -> EResult<i64> {
	kernel.process.mprotect(addr as usize, len as usize, prot as Prot)?;
	Ok(0)
}

/// Syscall selectors. The numeric values are this kernel's own numbering —
/// §6 says explicitly that the numbering in the source is not normative.
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
	Exit = 0,
	Write = 1,
	Read = 2,
	GetPid = 3,
	GetPpid = 4,
	Ls = 5,
	Mkdir = 6,
	Ps = 7,
	KernelInfo = 8,
	Cat = 9,
	Touch = 10,
	Rm = 11,
	Fork = 12,
	Waitpid = 13,
	Rmdir = 14,
	MallocTest = 15,
	Brk = 16,
	Sbrk = 17,
	Mmap = 18,
	Munmap = 19,
	Mprotect = 20,
}

impl Selector {
	fn from_u64(id: u64) -> Option<Self> {
		Some(match id {
			0 => Self::Exit,
			1 => Self::Write,
			2 => Self::Read,
			3 => Self::GetPid,
			4 => Self::GetPpid,
			5 => Self::Ls,
			6 => Self::Mkdir,
			7 => Self::Ps,
			8 => Self::KernelInfo,
			9 => Self::Cat,
			10 => Self::Touch,
			11 => Self::Rm,
			12 => Self::Fork,
			13 => Self::Waitpid,
			14 => Self::Rmdir,
			15 => Self::MallocTest,
			16 => Self::Brk,
			17 => Self::Sbrk,
			18 => Self::Mmap,
			19 => Self::Munmap,
			20 => Self::Mprotect,
			_ => return None,
		})
	}
}

/// Executes the syscall identified by `id` with up to five arguments,
/// re-casting each argument to the type the individual handler expects; an
/// unrecognized `id` is `ENOSYS` (§4.9).
pub fn dispatch(kernel: &mut Kernel, id: u64, args: [u64; 5]) -> i64 {
	let Some(selector) = Selector::from_u64(id) else {
		return errno!(ENOSYS).to_negative_errno();
	};
	let [a0, a1, a2, a3, _a4] = args;
	let result: EResult<i64> = match selector {
		Selector::Exit => sys_exit(kernel, a0),
		Selector::Write => sys_write(kernel, a0, a1, a2),
		Selector::Read => sys_read(kernel, a0, a1, a2),
		Selector::GetPid => sys_getpid(kernel),
		Selector::GetPpid => sys_getppid(),
		Selector::Ls => sys_ls(kernel, a0, a1, a2),
		Selector::Mkdir => sys_mkdir(kernel, a0, a1),
		Selector::Ps => sys_ps(kernel, a0, a1),
		Selector::KernelInfo => sys_kernel_info(a0, a1),
		Selector::Cat => sys_cat(kernel, a0, a1, a2),
		Selector::Touch => sys_touch(kernel, a0, a1),
		Selector::Rm => sys_rm(kernel, a0),
		Selector::Fork => sys_fork(),
		Selector::Waitpid => sys_waitpid(),
		Selector::Rmdir => sys_rmdir(kernel, a0),
		Selector::MallocTest => sys_malloc_test(a0),
		Selector::Brk => sys_brk(kernel, a0),
		Selector::Sbrk => sys_sbrk(kernel, a0),
		Selector::Mmap => sys_mmap(kernel, a0, a1, a2, a3),
		Selector::Munmap => sys_munmap(kernel, a0, a1),
		Selector::Mprotect => sys_mprotect(kernel, a0, a1, a2),
	};
	result.unwrap_or_else(Errno::to_negative_errno)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{device::block::RamDisk, file::fs::minix::MinixFs, process::Process};
	use utils::boxed::Box;

	fn test_kernel() -> Kernel {
		let disk = RamDisk::new(1024 * 1024 / 512);
		let fs = MinixFs::new(Box::new(disk));
		let mut vfs = Vfs::new();
		vfs.mount(Box::new(fs)).unwrap();
		let process = Process::new(1, 0x1000, 0x10000, 0x100000);
		Kernel::new(vfs, process)
	}

	#[test_case]
	fn unknown_selector_is_enosys() {
		let mut kernel = test_kernel();
		assert_eq!(dispatch(&mut kernel, 0xff, [0; 5]), errno!(ENOSYS).to_negative_errno());
	}

	#[test_case]
	fn getpid_returns_current_pid() {
		let mut kernel = test_kernel();
		assert_eq!(dispatch(&mut kernel, Selector::GetPid as u64, [0; 5]), 1);
	}

	#[test_case]
	fn stdin_read_is_non_blocking_when_empty() {
		let mut kernel = test_kernel();
		let mut buf = [0u8; 8];
		let n = dispatch(&mut kernel, Selector::Read as u64, [0, buf.as_mut_ptr() as u64, buf.len() as u64, 0, 0]);
		assert_eq!(n, 0);
	}

	#[test_case]
	fn stdin_read_drains_pushed_bytes() {
		let mut kernel = test_kernel();
		kernel.push_stdin(b'h');
		kernel.push_stdin(b'i');
		let mut buf = [0u8; 8];
		let n = dispatch(&mut kernel, Selector::Read as u64, [0, buf.as_mut_ptr() as u64, buf.len() as u64, 0, 0]);
		assert_eq!(n, 2);
		assert_eq!(&buf[..2], b"hi");
	}

	#[test_case]
	fn brk_then_sbrk_through_dispatch() {
		let mut kernel = test_kernel();
		let brk = dispatch(&mut kernel, Selector::Brk as u64, [0, 0, 0, 0, 0]);
		assert_eq!(brk, 0x1000);
		let old = dispatch(&mut kernel, Selector::Sbrk as u64, [0x10, 0, 0, 0, 0]);
		assert_eq!(old, 0x1000);
	}

	#[test_case]
	fn fork_is_not_implemented() {
		let mut kernel = test_kernel();
		assert_eq!(dispatch(&mut kernel, Selector::Fork as u64, [0; 5]), errno!(ENOSYS).to_negative_errno());
	}

	#[test_case]
	fn write_to_unknown_fd_is_ebadf() {
		let mut kernel = test_kernel();
		let buf = [0u8; 1];
		let ret = dispatch(&mut kernel, Selector::Write as u64, [5, buf.as_ptr() as u64, 1, 0, 0]);
		assert_eq!(ret, errno!(EBADF).to_negative_errno());
	}

	#[test_case]
	fn null_path_pointer_is_efault() {
		let mut kernel = test_kernel();
		let ret = dispatch(&mut kernel, Selector::Mkdir as u64, [0, 0o755, 0, 0, 0]);
		assert_eq!(ret, errno!(EFAULT).to_negative_errno());
	}

	#[test_case]
	fn mkdir_then_ls_through_dispatch() {
		let mut kernel = test_kernel();
		let path = b"/d\0";
		let mkdir_ret = dispatch(
			&mut kernel,
			Selector::Mkdir as u64,
			[path.as_ptr() as u64, 0o755, 0, 0, 0],
		);
		assert_eq!(mkdir_ret, 0);
		let mut buf = [0u8; 64];
		let root = b"/\0";
		let n = dispatch(
			&mut kernel,
			Selector::Ls as u64,
			[root.as_ptr() as u64, buf.as_mut_ptr() as u64, buf.len() as u64, 0, 0],
		);
		assert!(n > 0);
		assert_eq!(&buf[..n as usize], b"d\n");
	}
}
