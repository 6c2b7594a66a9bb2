//! Runtime error kinds (§7).
//!
//! Each prints a diagnostic to standard error and exits non-zero; there is
//! no recovery, matching the compiler side's `CompileError`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// `Div` applied to a zero divisor.
    DivisionByZero,
    /// A `case` scrutinee matched none of the alternatives and there was no
    /// default (the simplifier guarantees this can't happen for
    /// well-formed input, so reaching it at runtime means a broken
    /// invariant upstream).
    PatternMatchFailure,
    /// The host allocator refused a request the heap's own growth policy
    /// already decided it needed.
    OutOfMemory,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::DivisionByZero => write!(f, "division by zero"),
            RuntimeError::PatternMatchFailure => write!(f, "Pattern Match Failure"),
            RuntimeError::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

impl std::error::Error for RuntimeError {}
