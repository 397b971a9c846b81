//! Durable catalog state under the repository root.

mod cache;

pub use cache::{CacheError, CacheStore};
