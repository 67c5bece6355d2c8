//! Analysis-level diagnostic catalog (spec.md §4.4–§4.6, §7). One
//! `thiserror` variant per diagnosable condition, grounded in the teacher
//! crate's `validation::diagnostics::DiagnosticData` pattern: message text,
//! code, and default severity live together so a new diagnostic kind can't
//! be added without deciding all three.

use bsc_parser::{Diagnostic, Severity, SourceRange};
use thiserror::Error;

/// Stable numeric codes, disjoint from the parser's range (spec.md §6:
/// "Codes are stable; each diagnostic kind has one code").
pub mod codes {
    pub const DUPLICATE_FUNCTION_IMPLEMENTATION: u32 = 2000;
    pub const OVERRIDES_ANCESTOR_FUNCTION: u32 = 2001;
    pub const CALL_TO_UNKNOWN_FUNCTION: u32 = 2002;
    pub const MISMATCH_ARGUMENT_COUNT: u32 = 2003;
    pub const LOCAL_FUNCTION_SHADOWS_STDLIB: u32 = 2004;
    pub const LOCAL_FUNCTION_SHADOWS_SCOPE: u32 = 2005;
    pub const LOCAL_VAR_SHADOWED_BY_SCOPED_FUNCTION: u32 = 2006;
    pub const SCOPE_FUNCTION_SHADOWED_BY_BUILT_IN: u32 = 2007;
    pub const DUPLICATE_ANCESTOR_SCRIPT_IMPORT: u32 = 2100;
    pub const SCRIPT_SRC_CANNOT_BE_EMPTY: u32 = 2101;
    pub const REFERENCED_FILE_DOES_NOT_EXIST: u32 = 2102;
    pub const SCRIPT_IMPORT_CASE_MISMATCH: u32 = 2103;
    pub const UNKNOWN_PARENT_CLASS: u32 = 2200;
    pub const CYCLIC_INHERITANCE: u32 = 2201;
    pub const MEMBER_SIGNATURE_MISMATCH: u32 = 2202;
    pub const OVERRIDE_OF_FINAL_MEMBER: u32 = 2203;
    pub const FIELD_SHADOWS_PARENT_FIELD: u32 = 2204;
    pub const DUPLICATE_MEMBER_NAME: u32 = 2205;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiagnosticData {
    #[error("duplicate implementation of '{name}'")]
    DuplicateFunctionImplementation { name: String },

    #[error("function '{name}' overrides a function of the same name in '{ancestor_scope}'")]
    OverridesAncestorFunction { name: String, ancestor_scope: String, ancestor_range: SourceRange },

    #[error("call to unknown function '{name}'")]
    CallToUnknownFunction { name: String },

    #[error("function '{name}' expects {bounds} argument(s), got {actual}")]
    MismatchArgumentCount { name: String, bounds: String, actual: usize },

    #[error("local variable '{name}' is a function that shadows a built-in function of the same name")]
    LocalFunctionShadowsStdlib { name: String },

    #[error("local variable '{name}' is a function that shadows a scope function of the same name")]
    LocalFunctionShadowsScope { name: String },

    #[error("local variable '{name}' is shadowed by a scope function of the same name")]
    LocalVarShadowedByScopedFunction { name: String },

    #[error("function '{name}' has the same name as a built-in function")]
    ScopeFunctionShadowedByBuiltIn { name: String },

    #[error("script import '{pkg_path}' is already imported by ancestor component '{ancestor_component}'")]
    DuplicateAncestorScriptImport { pkg_path: String, ancestor_component: String },

    #[error("script import path cannot be empty")]
    ScriptSrcCannotBeEmpty,

    #[error("referenced file '{pkg_path}' does not exist")]
    ReferencedFileDoesNotExist { pkg_path: String },

    #[error("script import path '{written}' differs in case from the referenced file '{actual}'")]
    ScriptImportCaseMismatch { written: String, actual: String },

    #[error("class '{class}' extends unknown class '{parent}'")]
    UnknownParentClass { class: String, parent: String },

    #[error("cyclic inheritance detected involving class '{class}'")]
    CyclicInheritance { class: String },

    #[error("member '{member}' of '{class}' does not match the signature of the overridden member in '{parent}'")]
    MemberSignatureMismatch { class: String, parent: String, member: String },

    #[error("member '{member}' overrides a final member of '{parent}'")]
    OverrideOfFinalMember { class: String, parent: String, member: String },

    #[error("field '{field}' of '{class}' shadows a field declared in parent class '{parent}'")]
    FieldShadowsParentField { class: String, parent: String, field: String },

    #[error("'{member}' is declared more than once in class '{class}'")]
    DuplicateMemberName { class: String, member: String },
}

impl DiagnosticData {
    pub fn code(&self) -> u32 {
        use codes::*;
        match self {
            DiagnosticData::DuplicateFunctionImplementation { .. } => DUPLICATE_FUNCTION_IMPLEMENTATION,
            DiagnosticData::OverridesAncestorFunction { .. } => OVERRIDES_ANCESTOR_FUNCTION,
            DiagnosticData::CallToUnknownFunction { .. } => CALL_TO_UNKNOWN_FUNCTION,
            DiagnosticData::MismatchArgumentCount { .. } => MISMATCH_ARGUMENT_COUNT,
            DiagnosticData::LocalFunctionShadowsStdlib { .. } => LOCAL_FUNCTION_SHADOWS_STDLIB,
            DiagnosticData::LocalFunctionShadowsScope { .. } => LOCAL_FUNCTION_SHADOWS_SCOPE,
            DiagnosticData::LocalVarShadowedByScopedFunction { .. } => LOCAL_VAR_SHADOWED_BY_SCOPED_FUNCTION,
            DiagnosticData::ScopeFunctionShadowedByBuiltIn { .. } => SCOPE_FUNCTION_SHADOWED_BY_BUILT_IN,
            DiagnosticData::DuplicateAncestorScriptImport { .. } => DUPLICATE_ANCESTOR_SCRIPT_IMPORT,
            DiagnosticData::ScriptSrcCannotBeEmpty => SCRIPT_SRC_CANNOT_BE_EMPTY,
            DiagnosticData::ReferencedFileDoesNotExist { .. } => REFERENCED_FILE_DOES_NOT_EXIST,
            DiagnosticData::ScriptImportCaseMismatch { .. } => SCRIPT_IMPORT_CASE_MISMATCH,
            DiagnosticData::UnknownParentClass { .. } => UNKNOWN_PARENT_CLASS,
            DiagnosticData::CyclicInheritance { .. } => CYCLIC_INHERITANCE,
            DiagnosticData::MemberSignatureMismatch { .. } => MEMBER_SIGNATURE_MISMATCH,
            DiagnosticData::OverrideOfFinalMember { .. } => OVERRIDE_OF_FINAL_MEMBER,
            DiagnosticData::FieldShadowsParentField { .. } => FIELD_SHADOWS_PARENT_FIELD,
            DiagnosticData::DuplicateMemberName { .. } => DUPLICATE_MEMBER_NAME,
        }
    }

    /// Default severity per the taxonomy in spec.md §7.
    pub fn default_severity(&self) -> Severity {
        match self {
            DiagnosticData::DuplicateFunctionImplementation { .. }
            | DiagnosticData::CallToUnknownFunction { .. }
            | DiagnosticData::MismatchArgumentCount { .. }
            | DiagnosticData::ScriptSrcCannotBeEmpty
            | DiagnosticData::ReferencedFileDoesNotExist { .. }
            | DiagnosticData::UnknownParentClass { .. }
            | DiagnosticData::CyclicInheritance { .. }
            | DiagnosticData::MemberSignatureMismatch { .. }
            | DiagnosticData::OverrideOfFinalMember { .. }
            | DiagnosticData::FieldShadowsParentField { .. }
            | DiagnosticData::DuplicateMemberName { .. } => Severity::Error,

            DiagnosticData::LocalFunctionShadowsStdlib { .. }
            | DiagnosticData::LocalFunctionShadowsScope { .. }
            | DiagnosticData::LocalVarShadowedByScopedFunction { .. }
            | DiagnosticData::ScopeFunctionShadowedByBuiltIn { .. }
            | DiagnosticData::DuplicateAncestorScriptImport { .. }
            | DiagnosticData::ScriptImportCaseMismatch { .. } => Severity::Warn,

            DiagnosticData::OverridesAncestorFunction { .. } => Severity::Info,
        }
    }

    pub fn to_diagnostic(&self, range: SourceRange, file: impl Into<String>) -> Diagnostic {
        let mut diag = Diagnostic::new(self.code(), self.default_severity(), self.to_string(), range, file);
        if let DiagnosticData::OverridesAncestorFunction { ancestor_scope, ancestor_range, .. } = self {
            diag = diag.with_related(bsc_parser::diagnostic::RelatedLocation {
                file: ancestor_scope.clone(),
                range: *ancestor_range,
                message: format!("overridden declaration in '{ancestor_scope}'"),
            });
        }
        diag
    }
}

/// Parses `'bs:disable-next-line [codes…]` and `'bs:disable-line
/// [codes…]` suppression comments out of raw source text. Returns a list
/// of `(affected_line, Option<codes>)` where `None` means "suppress all
/// diagnostics on that line" (no codes listed).
pub fn parse_suppressions(source: &str) -> Vec<(u32, Option<Vec<u32>>)> {
    let mut out = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        let line_no = idx as u32;
        let trimmed = line.trim_start();
        let rest = if let Some(r) = strip_directive(trimmed, "'bs:disable-next-line") {
            Some((line_no + 1, r))
        } else {
            strip_directive(trimmed, "'bs:disable-line").map(|r| (line_no, r))
        };
        if let Some((affected, codes_text)) = rest {
            let codes = parse_codes(codes_text);
            out.push((affected, codes));
        }
    }
    out
}

fn strip_directive<'a>(line: &'a str, directive: &str) -> Option<&'a str> {
    let pos = line.find(directive)?;
    Some(line[pos + directive.len()..].trim())
}

fn parse_codes(text: &str) -> Option<Vec<u32>> {
    if text.is_empty() {
        return None;
    }
    let codes: Vec<u32> = text.split(|c: char| c == ',' || c.is_whitespace()).filter(|s| !s.is_empty()).filter_map(|s| s.parse().ok()).collect();
    if codes.is_empty() {
        None
    } else {
        Some(codes)
    }
}

/// Filters `diagnostics` by the suppression comments found in `source`,
/// dropping any whose range intersects a suppressed line and (when codes
/// are listed) whose code matches. Applied at `getDiagnostics` read time
/// (spec.md §7).
pub fn apply_suppressions(diagnostics: Vec<Diagnostic>, source: &str) -> Vec<Diagnostic> {
    let suppressions = parse_suppressions(source);
    if suppressions.is_empty() {
        return diagnostics;
    }
    diagnostics
        .into_iter()
        .filter(|d| {
            !suppressions.iter().any(|(line, codes)| {
                d.range.intersects_line(*line) && codes.as_ref().map(|cs| cs.contains(&d.code)).unwrap_or(true)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsc_parser::Position;
    use expect_test::expect;

    #[test]
    fn mismatch_argument_count_message_shape() {
        let diagnostic = DiagnosticData::MismatchArgumentCount { name: "greet".to_string(), bounds: "2-3".to_string(), actual: 1 }
            .to_diagnostic(SourceRange::new(Position::new(0, 0), Position::new(0, 5)), "f.brs");
        expect!["function 'greet' expects 2-3 argument(s), got 1"].assert_eq(&diagnostic.message);
    }

    #[test]
    fn disable_next_line_suppresses_following_line() {
        let src = "'bs:disable-next-line\ndoThing()\n";
        let diag = Diagnostic::new(
            codes::CALL_TO_UNKNOWN_FUNCTION,
            Severity::Error,
            "call to unknown function 'doThing'",
            SourceRange::new(Position::new(1, 0), Position::new(1, 9)),
            "f.brs",
        );
        let filtered = apply_suppressions(vec![diag], src);
        assert!(filtered.is_empty());
    }

    #[test]
    fn disable_line_with_specific_code_only_matches_that_code() {
        let src = format!("doThing() 'bs:disable-line {}\n", codes::MISMATCH_ARGUMENT_COUNT);
        let diag = Diagnostic::new(
            codes::CALL_TO_UNKNOWN_FUNCTION,
            Severity::Error,
            "call to unknown function 'doThing'",
            SourceRange::new(Position::new(0, 0), Position::new(0, 9)),
            "f.brs",
        );
        let filtered = apply_suppressions(vec![diag], &src);
        assert_eq!(filtered.len(), 1, "code list should not match an unlisted code");
    }
}
