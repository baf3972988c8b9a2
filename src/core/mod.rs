//! Core types shared across the crate.

pub mod error;

pub use error::Error;

/// Convenience alias used by the library modules.
pub type Result<T> = std::result::Result<T, Error>;
