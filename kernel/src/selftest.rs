//! Self-tests: unit/integration tests that run on the kernel image itself,
//! driven by `#![test_runner(crate::selftest::runner)]`.

use core::any::type_name;
use core::sync::atomic::{AtomicBool, Ordering};

/// Whether self-testing is currently running.
static RUNNING: AtomicBool = AtomicBool::new(false);

/// A testable unit, implemented for any `Fn()`.
pub trait Testable {
	fn run(&self);
}

impl<T: Fn()> Testable for T {
	fn run(&self) {
		let name = type_name::<T>();
		crate::print!("test {name} ... ");
		self();
		crate::println!("ok");
	}
}

/// The test runner invoked for `#[test_case]`-annotated functions.
pub fn runner(tests: &[&dyn Testable]) {
	crate::println!("running {} tests", tests.len());
	RUNNING.store(true, Ordering::Relaxed);
	for test in tests {
		test.run();
	}
	RUNNING.store(false, Ordering::Relaxed);
	crate::println!("no more tests to run");
	crate::panic::halt();
}

/// Tells whether self-testing is currently running.
pub fn is_running() -> bool {
	RUNNING.load(Ordering::Relaxed)
}
