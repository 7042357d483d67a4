//! The freestanding kernel image.
//!
//! This only links the `kernel` library and supplies the entry point; boot
//! assembly (GDT/IDT, long-mode transition, stack setup) that would
//! normally jump here is out of scope (§1) and not reproduced.

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(kernel::selftest::runner)]

extern crate kernel;

/// Entry point. A real boot stub would set up a stack and long mode before
/// jumping here; this crate picks up from there.
#[no_mangle]
pub extern "C" fn _start() -> ! {
	let (_kernel, mut stack) = kernel::init();
	kernel::run(&mut stack)
}
