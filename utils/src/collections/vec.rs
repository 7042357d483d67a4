//! `Vec` re-export.
//!
//! The teacher repository backs its `Vec` with a hand-rolled, allocation
//! failure-aware allocator (`memory/malloc`). This rewrite uses `alloc`'s
//! `Vec` directly: the on-disk/on-wire invariants this crate cares about are
//! unrelated to allocator bookkeeping, so duplicating it added nothing the
//! specification asks for (see DESIGN.md).

pub use alloc::vec::Vec;
