//! `String` re-export, see [`super::vec`] for the rationale.

pub use alloc::string::String;
