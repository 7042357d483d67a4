//! Memory management.
//!
//! Paging/MMU design is out of scope (§1 Non-goals): there is no virtual
//! address space per process, so this module is limited to what `alloc`
//! needs — a single kernel heap arena — plus the page-size constant other
//! subsystems (mmap, block I/O) round against.

pub mod allocator;

pub use utils::limits::PAGE_SIZE;
