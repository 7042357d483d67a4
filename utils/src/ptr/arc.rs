//! `Arc` re-export, see [`super::super::collections::vec`] for the rationale
//! behind using `alloc`'s implementation directly rather than the teacher's
//! allocation failure-aware one.

pub use alloc::sync::Arc;
