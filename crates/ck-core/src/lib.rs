//! # ck-core
//!
//! Core types and error handling for causalkit.
//!
//! This crate provides:
//! - The shared error taxonomy (validation, computation, and the causal
//!   pipeline failures)
//! - Shared result structures (`FitResult`)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::FitResult;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
