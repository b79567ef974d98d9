//! Error types for the Mural intersection engine
//!
//! Detection itself never propagates errors across frame boundaries; a
//! failure inside one detection call is logged and stays local to that
//! call. These types are used by the scene mutation and validation APIs.

use std::fmt;

/// Result type for Mural engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Mural engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Malformed geometry (too few vertices, bad index ranges, ...)
    InvalidGeometry(String),

    /// A key or index referred to a missing pool, batch, subset, or stroke
    InvalidReference(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidGeometry(msg) => write!(f, "Invalid geometry: {}", msg),
            Error::InvalidReference(msg) => write!(f, "Invalid reference: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
