//! Internal implementation modules for `gamerepo-core`.
//!
//! Most callers should go through the crate root re-exports.

pub mod catalog;
pub mod config;
pub mod runtime;
pub mod store;
pub mod tooling;
