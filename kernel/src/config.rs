//! Compile-time configuration.
//!
//! The teacher assembles these values from a `.config` file plus a
//! subsystems JSON manifest through a build-time code generator
//! (`build_cfg!`, fed by a dynamic Makefile generator). That pipeline's
//! purpose is selecting *which* subsystems to compile; since this rewrite
//! has a single, fixed subsystem set, the handful of values it actually
//! needs are kept as plain constants instead.

/// A target selector, kept as a marker for the kind of machine profile a
/// deployment targets. Nothing in this crate currently branches on it; it
/// exists so the concept introduced by the teacher's menuconfig tool has a
/// home even though the tool generating it is out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
	Desktop,
	Server,
	IoT,
	Embedded,
	Generic,
}

/// The active target profile.
pub const TARGET: Target = Target::Generic;

/// Size in bytes of the kernel heap arena handed to the global allocator.
pub const HEAP_SIZE: usize = 4 * 1024 * 1024;
/// Maximum number of simultaneously open file descriptors per process.
pub const MAX_OPEN_FILES: usize = utils::limits::OPEN_MAX;
/// Maximum number of live processes.
pub const MAX_PROCESSES: usize = 64;
/// Size in bytes of a filesystem block / network I/O buffer.
pub const BLOCK_SIZE: usize = 1024;
