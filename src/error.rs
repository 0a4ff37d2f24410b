//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.

use thiserror::Error;

/// Main error type for H-CBN inference operations
#[derive(Error, Debug)]
pub enum HcbnError {
    /// The poset contains a directed cycle; inference cannot proceed
    #[error("poset is not acyclic")]
    NotAcyclic,

    /// Input dimensions are inconsistent (non-square poset, column count
    /// mismatch, vector length mismatch)
    #[error("shape mismatch: {message}")]
    ShapeMismatch { message: String },

    /// A parameter is outside its admissible range (epsilon, lambda, L, thrds)
    #[error("out of range: {message}")]
    OutOfRange { message: String },

    /// A requested feature or proposal is not implemented
    #[error("not implemented: {message}")]
    NotImplemented { message: String },

    /// A non-finite value was produced that cannot be repaired by clamping
    #[error("numerical error: {message}")]
    Numerical { message: String },
}

/// Type alias for Results using HcbnError
pub type Result<T> = std::result::Result<T, HcbnError>;

impl HcbnError {
    /// Create a shape mismatch error
    pub fn shape_mismatch(message: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            message: message.into(),
        }
    }

    /// Create an out-of-range error
    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::OutOfRange {
            message: message.into(),
        }
    }

    /// Create a not-implemented error
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented {
            message: message.into(),
        }
    }

    /// Create a numerical error
    pub fn numerical(message: impl Into<String>) -> Self {
        Self::Numerical {
            message: message.into(),
        }
    }
}
