//! The block device collaborator (§6): byte-addressable access to a backing
//! disk as fixed-size sectors, consumed by the filesystem.

use utils::{errno, errno::EResult};

/// Size in bytes of one sector, fixed regardless of the backing device.
pub const SECTOR_SIZE: usize = 512;

/// A block device exposing raw sector read/write.
///
/// The filesystem's block size (1024 bytes, §3) is two sectors; callers
/// convert block numbers to `(lba, count)` themselves rather than this trait
/// knowing about filesystem blocks.
pub trait BlockDevice {
	/// Reads `count` sectors starting at `lba` into `buf`.
	///
	/// `buf` must be at least `count * SECTOR_SIZE` bytes.
	fn read_sectors(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> EResult<()>;

	/// Writes `count` sectors starting at `lba` from `buf`.
	fn write_sectors(&mut self, lba: u64, count: u32, buf: &[u8]) -> EResult<()>;

	/// Total number of sectors available on the device.
	fn available(&self) -> u64;
}

/// An in-memory block device, used as a test double and as the initramfs
/// backing store.
pub struct RamDisk {
	data: utils::collections::vec::Vec<u8>,
}

impl RamDisk {
	/// Creates a ram disk of `sectors` sectors, zero-initialized.
	pub fn new(sectors: u64) -> Self {
		let mut data = utils::collections::vec::Vec::new();
		data.resize(sectors as usize * SECTOR_SIZE, 0u8);
		Self { data }
	}
}

impl BlockDevice for RamDisk {
	fn read_sectors(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> EResult<()> {
		let off = lba as usize * SECTOR_SIZE;
		let len = count as usize * SECTOR_SIZE;
		let src = self.data.get(off..off + len).ok_or(errno!(EINVAL))?;
		buf.get_mut(..len).ok_or(errno!(EINVAL))?.copy_from_slice(src);
		Ok(())
	}

	fn write_sectors(&mut self, lba: u64, count: u32, buf: &[u8]) -> EResult<()> {
		let off = lba as usize * SECTOR_SIZE;
		let len = count as usize * SECTOR_SIZE;
		let src = buf.get(..len).ok_or(errno!(EINVAL))?;
		self.data
			.get_mut(off..off + len)
			.ok_or(errno!(EINVAL))?
			.copy_from_slice(src);
		Ok(())
	}

	fn available(&self) -> u64 {
		self.data.len() as u64 / SECTOR_SIZE as u64
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test_case]
	fn ramdisk_roundtrip() {
		let mut disk = RamDisk::new(16);
		let data = [0x42u8; SECTOR_SIZE];
		disk.write_sectors(0, 1, &data).unwrap();
		let mut out = [0u8; SECTOR_SIZE];
		disk.read_sectors(0, 1, &mut out).unwrap();
		assert_eq!(out, data);
	}
}
