//! Allocation-aware collections, the error vocabulary and the locking
//! primitives shared by every kernel subsystem.
//!
//! This crate is intentionally free of anything kernel-specific so that it
//! can be depended on by the `macros` crate's generated code as well as by
//! every subsystem crate in the workspace.

#![cfg_attr(not(feature = "std"), no_std)]
#![allow(clippy::missing_safety_doc)]

extern crate alloc;

pub mod collections;
pub mod errno;
pub mod limits;
pub mod lock;
pub mod math;
pub mod ptr;

pub use alloc::boxed;
pub use alloc::vec;

use core::fmt;
use core::mem::size_of;
use core::slice;

/// Marker trait for types which have no invalid bit pattern and may
/// therefore be safely reinterpreted from an arbitrary, correctly sized byte
/// buffer.
///
/// Derived with `#[derive(macros::AnyRepr)]` on `#[repr(C)]` structs made
/// only of integers, arrays thereof, and other `AnyRepr` types.
///
/// # Safety
///
/// The implementor must have no padding-sensitive invariants and must be
/// valid for any bit pattern of the right size.
pub unsafe trait AnyRepr: Sized {
	/// Reinterprets the first `size_of::<Self>()` bytes of `bytes` as `Self`.
	///
	/// Returns `None` if `bytes` is too small.
	fn from_bytes(bytes: &[u8]) -> Option<&Self> {
		if bytes.len() < size_of::<Self>() {
			return None;
		}
		// Safe: `Self: AnyRepr` guarantees any bit pattern is valid, and the
		// length and alignment are checked (callers place these structures at
		// the front of block/frame buffers, which are at least word-aligned).
		Some(unsafe { &*(bytes.as_ptr() as *const Self) })
	}

	/// Mutable counterpart of [`Self::from_bytes`].
	fn from_bytes_mut(bytes: &mut [u8]) -> Option<&mut Self> {
		if bytes.len() < size_of::<Self>() {
			return None;
		}
		Some(unsafe { &mut *(bytes.as_mut_ptr() as *mut Self) })
	}

	/// Views `self` as a byte slice.
	fn as_bytes(&self) -> &[u8] {
		unsafe { slice::from_raw_parts(self as *const _ as *const u8, size_of::<Self>()) }
	}
}

unsafe impl AnyRepr for u8 {}
unsafe impl AnyRepr for u16 {}
unsafe impl AnyRepr for u32 {}
unsafe impl AnyRepr for u64 {}
unsafe impl AnyRepr for i8 {}
unsafe impl AnyRepr for i16 {}
unsafe impl AnyRepr for i32 {}
unsafe impl AnyRepr for i64 {}
unsafe impl<const N: usize, T: AnyRepr> AnyRepr for [T; N] {}

/// Wraps a byte slice to implement [`fmt::Display`], rendering valid UTF-8
/// as-is and anything else lossily.
///
/// Used by `ls`/`cat`-style output where on-disk names are not guaranteed to
/// be valid UTF-8.
pub struct DisplayableStr<'s>(pub &'s [u8]);

impl fmt::Display for DisplayableStr<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for chunk in self.0.utf8_chunks() {
			f.write_str(chunk.valid())?;
			if !chunk.invalid().is_empty() {
				f.write_str("\u{fffd}")?;
			}
		}
		Ok(())
	}
}

impl fmt::Debug for DisplayableStr<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "\"{self}\"")
	}
}
