//! Allocation-backed collections, re-exported under the same module paths
//! the rest of the workspace imports from.

pub mod path;
pub mod string;
pub mod vec;
