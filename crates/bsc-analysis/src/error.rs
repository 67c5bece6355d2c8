//! Unrecoverable engine errors (spec.md §7). Everything else surfaces as a
//! [`bsc_parser::Diagnostic`] attached to a file or scope; this type exists
//! only for the handful of conditions that abort the enclosing batch.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid project root: {0}")]
    InvalidProjectRoot(String),

    #[error("corrupt descriptor XML at {path}: {reason}")]
    CorruptDescriptor { path: String, reason: String },
}

/// The three process exit codes spec.md §6 documents. A CLI collaborator
/// maps a completed `Program`'s diagnostics to one of these; the engine
/// itself never exits a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    DiagnosticsFound = 1,
    EngineError = 2,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}
