//! The clock collaborator.
//!
//! Spec boundary: `uptime_ms() -> u64`. The PIT/RTC programming that feeds a
//! real clock is out of scope (§1); a tick counter advanced by whatever
//! timer interrupt a deployment wires up is all the rest of the kernel
//! (DNS timeouts, IP reassembly expiry) needs.

use core::sync::atomic::{AtomicU64, Ordering};

static TICKS_MS: AtomicU64 = AtomicU64::new(0);

/// Returns the number of milliseconds elapsed since boot.
pub fn uptime_ms() -> u64 {
	TICKS_MS.load(Ordering::Relaxed)
}

/// Advances the clock by `ms` milliseconds. Called from the timer interrupt
/// handler (out of scope here) or, in tests, directly.
pub fn tick(ms: u64) {
	TICKS_MS.fetch_add(ms, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test_case]
	fn tick_advances_uptime() {
		let before = uptime_ms();
		tick(10);
		assert_eq!(uptime_ms(), before + 10);
	}
}
