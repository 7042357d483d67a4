//! Printing/logging macros.
//!
//! Unlike `std`'s `print!`/`println!`, these log rather than merely print:
//! every message goes through the [`crate::logger::LOGGER`] ring buffer.

use crate::logger::LOGGER;
use core::fmt;

/// Writes formatted arguments to the logger. Used through [`print!`] and
/// [`println!`] only.
#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
	let mut logger = LOGGER.lock();
	fmt::write(&mut *logger, args).ok();
}

/// Prints the given formatted string.
#[macro_export]
macro_rules! print {
	($($arg:tt)*) => {{
		$crate::print::_print(format_args!($($arg)*));
	}};
}

/// Same as [`print!`], with a trailing newline.
#[macro_export]
macro_rules! println {
	() => ($crate::print!("\n"));
	($($arg:tt)*) => {{
		$crate::print::_print(format_args_nl!($($arg)*));
	}};
}

/// Logs a message tagged with a subsystem name, e.g. `log!("net", "dropped
/// malformed frame")` prints `[net] dropped malformed frame`.
#[macro_export]
macro_rules! log {
	($tag:expr, $($arg:tt)*) => {{
		$crate::println!("[{}] {}", $tag, format_args!($($arg)*));
	}};
}
