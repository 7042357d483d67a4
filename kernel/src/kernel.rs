//! ir0 is a small x86-64 monolithic kernel core: an on-disk MINIX-style
//! filesystem with a VFS façade, an RTL8139-driven IPv4/ICMP/UDP/DNS network
//! stack, and the process/heap/syscall spine that binds the two together.
//!
//! Boot assembly, GDT/IDT setup, VGA text output, a PS/2 keyboard driver,
//! and everything else needed to actually reach this code on real hardware
//! are out of scope (§1) — this crate picks up once memory, the block
//! device, and the frame device are reachable, and wires them into the
//! filesystem and network stack.

#![no_std]
#![cfg_attr(test, no_main)]
#![feature(custom_test_frameworks)]
#![test_runner(crate::selftest::runner)]
#![reexport_test_harness_main = "kernel_selftest"]

extern crate alloc;

#[macro_use]
pub mod print;
pub mod config;
pub mod device;
pub mod file;
pub mod io;
pub mod logger;
pub mod memory;
pub mod net;
pub mod panic;
pub mod process;
pub mod selftest;
pub mod syscall;
pub mod time;

use crate::{
	device::{block::RamDisk, network::rtl8139::Rtl8139},
	file::{fs::minix::MinixFs, vfs::Vfs},
	net::Stack,
	process::Process,
	syscall::Kernel,
};
use utils::boxed::Box;

/// The kernel's name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
/// Current kernel version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sectors given to the backing [`RamDisk`]; no real disk driver exists in
/// this rewrite's scope (§6 names only the block device *port*, not a
/// concrete disk controller), so the filesystem is always backed by RAM.
const DISK_SECTORS: u64 = 8 * 1024 * 1024 / 512;

/// Base of the current process's heap, its ceiling, and where its `mmap`
/// allocations start counting up from. Arbitrary but disjoint; there is no
/// real address space to place them in (§4.8 Non-goals).
const HEAP_START: usize = 0x0040_0000;
const HEAP_LIMIT: usize = 0x0080_0000;
const MMAP_BASE: usize = 0x1000_0000;

/// The address this kernel answers to on its one interface, and the default
/// route pointing at it. There is no DHCP client in scope, so it's fixed.
const MY_IP: net::Ipv4Addr = [10, 0, 2, 15];
const UNSPECIFIED: net::Ipv4Addr = [0, 0, 0, 0];

/// Brings memory management, the filesystem, the process slot, and the
/// network stack online, in the order §2 lays out: block device →
/// filesystem → VFS, and frame device → IPv4 → {ICMP, UDP → DNS} (UDP and
/// ICMP register themselves against the stack as it dispatches; DNS rides
/// on UDP rather than being wired up front).
pub fn init() -> (Kernel, Stack) {
	println!("{NAME} {VERSION}");

	println!("setup memory management");
	memory::allocator::init();

	println!("setup time management");
	// `time::tick` is driven by whatever timer interrupt a deployment wires
	// up; nothing to initialize here beyond the counter already being zero.

	println!("setup filesystem");
	let disk = RamDisk::new(DISK_SECTORS);
	let fs = MinixFs::new(Box::new(disk));
	let mut vfs = Vfs::new();
	vfs.mount(Box::new(fs)).expect("filesystem mount failed");

	println!("setup process");
	let process = Process::new(1, HEAP_START, HEAP_LIMIT, MMAP_BASE);

	println!("setup network");
	let mut stack = Stack::new();
	match Rtl8139::probe() {
		Ok(dev) => {
			let iface = stack.add_interface(Box::new(dev));
			stack.set_interface_ip(iface, MY_IP);
			stack.add_route(iface, UNSPECIFIED, UNSPECIFIED, UNSPECIFIED);
			log!("net", "interface up");
		}
		Err(e) => log!("net", "no network controller found ({e})"),
	}

	#[cfg(test)]
	kernel_selftest();

	(Kernel::new(vfs, process), stack)
}

/// The cooperative scheduling loop (§5): there is no preemptive scheduler,
/// so the only work that happens between syscalls is driven from here —
/// polling the network stack for received frames and completed
/// transmissions. A real deployment would also dispatch pending syscalls
/// arriving through an interrupt gate; that plumbing lives with the boot
/// glue this crate doesn't implement.
pub fn run(stack: &mut Stack) -> ! {
	loop {
		stack.poll();
		core::hint::spin_loop();
	}
}
