//! A tiny ELF64 loader (§4.8): validates the header, walks `PT_LOAD`
//! program headers, and hands back the entry point plus the segments to
//! map. No relocation, no dynamic linking, no interpreter — anything other
//! than a statically linked x86-64 executable is rejected outright.
//!
//! The teacher's loader (`elf::parser`) is bit-width-agnostic, dispatching
//! between 32- and 64-bit headers through a `Parse` trait, because it
//! targets whatever ELF a user hands it. This kernel only ever runs its own
//! x86-64 binaries, so the header is cast directly the same way the MINIX
//! superblock is: host and file agree on both word size and endianness, so
//! there's nothing for a byte-by-byte parser to buy here.

use macros::AnyRepr;
use utils::{
	collections::vec::Vec,
	errno,
	errno::EResult,
	AnyRepr,
};

const EI_NIDENT: usize = 16;
const ELFMAG: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const EM_X86_64: u16 = 62;
const ET_EXEC: u16 = 2;

const PT_LOAD: u32 = 1;

/// Segment permission bits, carried straight through from `p_flags`.
pub const PF_X: u32 = 0x1;
pub const PF_W: u32 = 0x2;
pub const PF_R: u32 = 0x4;

#[repr(C)]
#[derive(AnyRepr, Clone, Copy)]
struct FileHeader {
	e_ident: [u8; EI_NIDENT],
	e_type: u16,
	e_machine: u16,
	e_version: u32,
	e_entry: u64,
	e_phoff: u64,
	e_shoff: u64,
	e_flags: u32,
	e_ehsize: u16,
	e_phentsize: u16,
	e_phnum: u16,
	e_shentsize: u16,
	e_shnum: u16,
	e_shstrndx: u16,
}

impl FileHeader {
	fn is_valid(&self) -> bool {
		self.e_ident[..4] == ELFMAG
			&& self.e_ident[4] == ELFCLASS64
			&& self.e_ident[5] == ELFDATA2LSB
			&& self.e_machine == EM_X86_64
			&& self.e_type == ET_EXEC
	}
}

#[repr(C)]
#[derive(AnyRepr, Clone, Copy)]
struct ProgramHeader {
	p_type: u32,
	p_flags: u32,
	p_offset: u64,
	p_vaddr: u64,
	p_paddr: u64,
	p_filesz: u64,
	p_memsz: u64,
	p_align: u64,
}

/// One `PT_LOAD` segment, ready to be copied into place by the caller; the
/// loader never touches memory itself (§4.8 Non-goals — no MMU, no paging).
pub struct Segment {
	pub vaddr: u64,
	pub flags: u32,
	/// The segment's file contents. Callers zero-extend to `memsz` bytes
	/// when mapping (the BSS tail, `memsz > filesz`, is never stored here).
	pub data: Vec<u8>,
	pub memsz: u64,
}

pub struct Image {
	pub entry: u64,
	pub segments: Vec<Segment>,
}

/// Parses a whole ELF file into an [`Image`]. Fails closed: any header that
/// doesn't validate, or any program header table entry that overruns the
/// file, is rejected rather than partially loaded.
pub fn load(data: &[u8]) -> EResult<Image> {
	let header = *FileHeader::from_bytes(data).ok_or(errno!(EINVAL))?;
	if !header.is_valid() {
		return Err(errno!(EINVAL));
	}
	let mut segments = Vec::new();
	for i in 0..header.e_phnum as usize {
		let off = (header.e_phoff as usize)
			.checked_add(i * header.e_phentsize as usize)
			.ok_or(errno!(EOVERFLOW))?;
		let ph = *data
			.get(off..)
			.and_then(ProgramHeader::from_bytes)
			.ok_or(errno!(EINVAL))?;
		if ph.p_type != PT_LOAD {
			continue;
		}
		if ph.p_filesz > ph.p_memsz {
			return Err(errno!(EINVAL));
		}
		let start = ph.p_offset as usize;
		let end = start.checked_add(ph.p_filesz as usize).ok_or(errno!(EOVERFLOW))?;
		let bytes = data.get(start..end).ok_or(errno!(EINVAL))?;
		segments.push(Segment {
			vaddr: ph.p_vaddr,
			flags: ph.p_flags,
			data: bytes.to_vec(),
			memsz: ph.p_memsz,
		});
	}
	if segments.is_empty() {
		return Err(errno!(EINVAL));
	}
	Ok(Image { entry: header.e_entry, segments })
}

#[cfg(test)]
mod tests {
	use super::*;
	use core::mem::size_of;

	fn header_bytes(phnum: u16, phoff: u64) -> [u8; size_of::<FileHeader>()] {
		let h = FileHeader {
			e_ident: [
				0x7f, b'E', b'L', b'F', ELFCLASS64, ELFDATA2LSB, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0,
			],
			e_type: ET_EXEC,
			e_machine: EM_X86_64,
			e_version: 1,
			e_entry: 0x1000,
			e_phoff: phoff,
			e_shoff: 0,
			e_flags: 0,
			e_ehsize: size_of::<FileHeader>() as u16,
			e_phentsize: size_of::<ProgramHeader>() as u16,
			e_phnum: phnum,
			e_shentsize: 0,
			e_shnum: 0,
			e_shstrndx: 0,
		};
		unsafe { core::mem::transmute(h) }
	}

	#[test_case]
	fn rejects_short_buffer() {
		assert!(matches!(load(&[0u8; 4]), Err(e) if e == errno!(EINVAL)));
	}

	#[test_case]
	fn rejects_bad_magic() {
		let mut bytes = header_bytes(0, size_of::<FileHeader>() as u64).to_vec();
		bytes[0] = 0;
		assert!(matches!(load(&bytes), Err(e) if e == errno!(EINVAL)));
	}

	#[test_case]
	fn loads_single_segment() {
		let ehsize = size_of::<FileHeader>();
		let phsize = size_of::<ProgramHeader>();
		let mut bytes = header_bytes(1, ehsize as u64).to_vec();
		let ph = ProgramHeader {
			p_type: PT_LOAD,
			p_flags: PF_R | PF_X,
			p_offset: (ehsize + phsize) as u64,
			p_vaddr: 0x400000,
			p_paddr: 0,
			p_filesz: 4,
			p_memsz: 8,
			p_align: 0x1000,
		};
		let ph_bytes: [u8; size_of::<ProgramHeader>()] = unsafe { core::mem::transmute(ph) };
		bytes.extend_from_slice(&ph_bytes);
		bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

		let image = load(&bytes).unwrap();
		assert_eq!(image.entry, 0x1000);
		assert_eq!(image.segments.len(), 1);
		let seg = &image.segments[0];
		assert_eq!(seg.vaddr, 0x400000);
		assert_eq!(seg.memsz, 8);
		assert_eq!(seg.data, [0xde, 0xad, 0xbe, 0xef]);
	}
}
