//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum FedkickError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// The identity is not one of the two participants.
    #[error("Unknown identity: {0}")]
    UnknownIdentity(String),

    /// A flat parameter buffer does not match its declared shape.
    #[error("Shape mismatch for {name}: expected {expected} values, got {actual}")]
    ShapeMismatch {
        /// Name of the parameter tensor.
        name: String,
        /// Number of values implied by the declared shape.
        expected: usize,
        /// Number of values given.
        actual: usize,
    },

    /// A parameter name is not declared in the model spec.
    #[error("Unknown parameter: {0}")]
    UnknownParam(String),

    /// An observation does not have the configured width.
    #[error("Observation has {actual} values, expected {expected}")]
    ObsDimMismatch {
        /// Configured observation width.
        expected: usize,
        /// Width of the given observation.
        actual: usize,
    },
}
