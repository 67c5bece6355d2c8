//! The `Diagnostic` value type shared by the parser and, via re-export, by
//! `bsc-analysis`'s validators. Diagnostics are plain data: the parser never
//! panics or returns `Result` for a malformed program, it records one of
//! these and keeps going (see spec.md §4.1 "Parser never throws").

use crate::token::SourceRange;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Severity {
    Hint = 4,
    Info = 3,
    Warn = 2,
    Error = 1,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warn => "warn",
            Severity::Info => "info",
            Severity::Hint => "hint",
        };
        f.write_str(s)
    }
}

/// A secondary location attached to a diagnostic, e.g. the nearest ancestor
/// occurrence in an "overrides ancestor" diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelatedLocation {
    pub file: String,
    pub range: SourceRange,
    pub message: String,
}

/// A structured diagnostic: stable numeric code, severity, message, range,
/// the absolute path of the file it is attached to, and optional related
/// locations. This is the wire-shape described in spec.md §6.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    pub code: u32,
    pub severity: Severity,
    pub message: String,
    pub range: SourceRange,
    pub file: String,
    pub related_information: Vec<RelatedLocation>,
}

impl Diagnostic {
    pub fn new(code: u32, severity: Severity, message: impl Into<String>, range: SourceRange, file: impl Into<String>) -> Self {
        Self { code, severity, message: message.into(), range, file: file.into(), related_information: Vec::new() }
    }

    pub fn with_related(mut self, related: RelatedLocation) -> Self {
        self.related_information.push(related);
        self
    }
}

/// Parser-level diagnostic codes. Analysis-level codes are a disjoint range
/// defined in `bsc-analysis::diagnostics`; both ranges are stable (spec.md
/// §6: "Codes are stable; each diagnostic kind has one code").
pub mod codes {
    pub const UNEXPECTED_TOKEN: u32 = 1000;
    pub const UNTERMINATED_BRACKET: u32 = 1001;
    pub const EXPECTED_EXPRESSION: u32 = 1002;
    pub const RESERVED_WORD_AS_IDENTIFIER: u32 = 1003;
    pub const INVALID_PARAMETER_LIST: u32 = 1004;
}
