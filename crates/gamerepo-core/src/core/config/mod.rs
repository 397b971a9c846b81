//! Settings and the shared repository context.

pub mod context;
pub mod settings;

pub use settings::*;
