//! Per-component scope (spec.md §4.6): wraps a base [`Scope`] with the
//! component's inheritance chain, script-import validation, and
//! go-to-definition support for the `parentName` attribute.

use crate::diagnostics::DiagnosticData;
use crate::file::{Callable, DescriptorFile, FileReference};
use crate::paths::{AbsolutePath, PkgPath};
use crate::scope::Scope;
use bsc_parser::{Diagnostic, SourceRange};

pub struct DescriptorScope {
    pub base: Scope,
    pub descriptor_path: AbsolutePath,
}

impl DescriptorScope {
    pub fn new(component_name: impl Into<String>, descriptor_path: impl Into<AbsolutePath>) -> Self {
        Self { base: Scope::new(component_name), descriptor_path: descriptor_path.into() }
    }
}

/// A snapshot of one ancestor component, taken by [`crate::program::Program`]
/// before calling [`validate`] so the validation pipeline never needs to
/// hold borrows across the program's `Rc<RefCell<_>>` file registry.
pub struct ResolvedAncestor {
    pub component_name: String,
    pub script_tag_imports: Vec<FileReference>,
    pub callables: Vec<Callable>,
}

/// Collects every ancestor's script-tag imports, parents-first (spec.md §4.2
/// `getAncestorScriptTagImports`): `ancestors` is ordered nearest-parent
/// first, so this reverses it before flattening.
pub fn ancestor_script_tag_imports(ancestors: &[ResolvedAncestor]) -> Vec<(&str, &FileReference)> {
    ancestors.iter().rev().flat_map(|a| a.script_tag_imports.iter().map(move |r| (a.component_name.as_str(), r))).collect()
}

/// Runs the shared per-file checks (inherited callables from the ancestor
/// chain) plus the component-specific script-import checks (spec.md §4.6).
pub fn validate(
    scope: &DescriptorScope,
    own_descriptor: &DescriptorFile,
    files: &crate::file::FileRegistry,
    ancestors: &[ResolvedAncestor],
) -> Vec<Diagnostic> {
    let inherited: Vec<Callable> = ancestors.iter().flat_map(|a| a.callables.iter().cloned()).collect();
    let mut diagnostics = scope.base.validate(files, &inherited);
    diagnostics.extend(validate_script_imports(own_descriptor, files, ancestors));
    diagnostics
}

fn validate_script_imports(own_descriptor: &DescriptorFile, files: &crate::file::FileRegistry, ancestors: &[ResolvedAncestor]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let ancestor_imports = ancestor_script_tag_imports(ancestors);
    let file_path = &own_descriptor.path_absolute;

    for import in &own_descriptor.script_tag_imports {
        if import.pkg_path.as_str().trim().is_empty() {
            diagnostics.push(DiagnosticData::ScriptSrcCannotBeEmpty.to_diagnostic(import.file_path_range, file_path.clone()));
            continue;
        }

        match find_actual_case(files, &import.pkg_path) {
            None => {
                diagnostics.push(
                    DiagnosticData::ReferencedFileDoesNotExist { pkg_path: import.pkg_path.as_str().to_string() }
                        .to_diagnostic(import.file_path_range, file_path.clone()),
                );
            }
            Some(actual) if actual != import.pkg_path.as_str() => {
                diagnostics.push(
                    DiagnosticData::ScriptImportCaseMismatch { written: import.pkg_path.as_str().to_string(), actual }
                        .to_diagnostic(import.file_path_range, file_path.clone()),
                );
            }
            _ => {}
        }

        if let Some((ancestor_component, _)) = ancestor_imports.iter().find(|(_, r)| r.pkg_path == import.pkg_path) {
            diagnostics.push(
                DiagnosticData::DuplicateAncestorScriptImport {
                    pkg_path: import.pkg_path.as_str().to_string(),
                    ancestor_component: ancestor_component.to_string(),
                }
                .to_diagnostic(import.file_path_range, file_path.clone()),
            );
        }
    }

    diagnostics
}

/// The full scope-membership predicate (spec.md §4.2 `doesReferenceFile`,
/// §4.6): true when `pkg_path` is `own_descriptor` itself, is imported by
/// its own `<script>` tags, or is imported by any resolved ancestor's.
pub fn does_reference_file(own_descriptor: &DescriptorFile, pkg_path: &PkgPath, ancestors: &[ResolvedAncestor]) -> bool {
    own_descriptor.does_reference_file(pkg_path) || ancestor_script_tag_imports(ancestors).iter().any(|(_, r)| &r.pkg_path == pkg_path)
}

fn find_actual_case(files: &crate::file::FileRegistry, pkg_path: &PkgPath) -> Option<String> {
    files.values().find(|f| &f.pkg_path() == pkg_path).map(|f| f.pkg_path().as_str().to_string())
}

/// Go-to-definition target for a `parentName` attribute: the absolute path
/// and the defining range of the named ancestor component, if resolved
/// (spec.md §4.6).
pub fn goto_parent_definition(own_descriptor: &DescriptorFile, parent_descriptor: Option<&DescriptorFile>) -> Option<(AbsolutePath, SourceRange)> {
    let parent = parent_descriptor?;
    own_descriptor.parent_name_range?;
    Some((parent.path_absolute.clone(), parent.component_name_range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::File;
    use bsc_parser::Position;

    fn descriptor(path: &str, imports: Vec<FileReference>) -> DescriptorFile {
        DescriptorFile::new(path, path, "Widget", SourceRange::ZERO, None, None, imports)
    }

    fn import(pkg: &str) -> FileReference {
        FileReference { pkg_path: PkgPath::new(pkg), file_path_range: SourceRange::new(Position::new(0, 0), Position::new(0, 1)) }
    }

    #[test]
    fn empty_script_src_is_flagged() {
        let own = descriptor("Widget.xml", vec![import("")]);
        let files = crate::file::FileRegistry::new();
        let diags = validate_script_imports(&own, &files, &[]);
        assert!(diags.iter().any(|d| d.code == crate::diagnostics::codes::SCRIPT_SRC_CANNOT_BE_EMPTY));
    }

    #[test]
    fn missing_script_target_is_flagged() {
        let own = descriptor("Widget.xml", vec![import("components/Missing.brs")]);
        let files = crate::file::FileRegistry::new();
        let diags = validate_script_imports(&own, &files, &[]);
        assert!(diags.iter().any(|d| d.code == crate::diagnostics::codes::REFERENCED_FILE_DOES_NOT_EXIST));
    }

    #[test]
    fn does_reference_file_covers_self_own_imports_and_ancestor_imports() {
        let own = descriptor("Widget.xml", vec![import("widget.brs")]);
        let ancestors = vec![ResolvedAncestor { component_name: "Base".to_string(), script_tag_imports: vec![import("base.brs")], callables: Vec::new() }];

        assert!(does_reference_file(&own, &PkgPath::new("Widget.xml"), &ancestors));
        assert!(does_reference_file(&own, &PkgPath::new("widget.brs"), &ancestors));
        assert!(does_reference_file(&own, &PkgPath::new("base.brs"), &ancestors));
        assert!(!does_reference_file(&own, &PkgPath::new("unrelated.brs"), &ancestors));
    }

    #[test]
    fn duplicate_ancestor_script_import_is_flagged() {
        use crate::file::CodeFile;
        use bsc_parser::ast::ParseMode;
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut files = crate::file::FileRegistry::new();
        let code = CodeFile::parse("lib.brs", "lib.brs", "sub noop()\nend sub\n", ParseMode::Superset);
        files.insert("lib.brs".to_string(), File::Code(Rc::new(RefCell::new(code))));

        let ancestors = vec![ResolvedAncestor { component_name: "Base".to_string(), script_tag_imports: vec![import("lib.brs")], callables: Vec::new() }];

        let own = descriptor("Widget.xml", vec![import("lib.brs")]);
        let diags = validate_script_imports(&own, &files, &ancestors);
        assert!(diags.iter().any(|d| d.code == crate::diagnostics::codes::DUPLICATE_ANCESTOR_SCRIPT_IMPORT));
    }
}
