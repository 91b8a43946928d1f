// ABOUTME: Error types for the compile-and-run pipeline

use thiserror::Error;

/// Errors surfaced by the driver layer (checking, module loading, CLI).
///
/// The evaluator itself never raises: runtime misuse produces `Unit` (or
/// `false` from predicates) and keeps going. These errors are for the cases
/// that stop the whole program.
#[derive(Error, Debug)]
pub enum SqaleError {
    /// The checker rejected a top-level form. `index` is the position of the
    /// failing form; `head` is its head symbol when it has one.
    #[error("type error in top-level form {index}")]
    Type { index: usize, head: Option<String> },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
