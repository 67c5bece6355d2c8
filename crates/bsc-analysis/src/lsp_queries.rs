//! Editor-facing queries layered on top of [`Program`]: go-to-definition
//! and completion catalogs. Neither spec.md module names this surface
//! directly, but both are the natural consumer of the scope/descriptor
//! machinery those modules build (spec.md §4.6 `parentName` navigation,
//! §3 `propertyNameCompletions`).

use crate::file::File;
use crate::paths::AbsolutePath;
use crate::program::Program;
use bsc_parser::{Position, SourceRange};

/// Resolves the definition target for the symbol under `position` in
/// `file_path`. Inside a descriptor's `parentName` attribute this is the
/// parent component's declaring range; inside a code file it's the
/// declaration of the function called at that position, searched in the
/// file itself, then the file's scopes, then their ancestor scopes.
pub fn goto_definition(program: &Program, file_path: &str, position: Position) -> Option<(AbsolutePath, SourceRange)> {
    match program.file(file_path)? {
        File::Descriptor(descriptor) => {
            let descriptor = descriptor.borrow();
            let range = descriptor.parent_name_range?;
            if !range.contains(position) {
                return None;
            }
            let parent_lower = descriptor.parent_name.as_ref()?.to_lowercase();
            let parent_path = program.component_descriptor_path(&parent_lower)?;
            let File::Descriptor(parent) = program.file(&parent_path)? else { return None };
            let parent = parent.borrow();
            Some((parent.path_absolute.clone(), parent.component_name_range))
        }
        File::Code(code) => {
            let code = code.borrow();
            let call = code.function_calls.iter().find(|c| c.name_range.contains(position))?;
            let name_lower = call.callee_name.to_lowercase();

            if let Some(callable) = code.callables.iter().find(|c| c.name_lower() == name_lower) {
                return Some((code.path_absolute.clone(), callable.decl.name.range));
            }

            for component_lower in program.get_scopes_for_file(file_path) {
                if let Some(callable) = program.callables_in_scope(&component_lower).into_iter().find(|c| c.name_lower() == name_lower) {
                    return Some((callable.file_path.clone(), callable.decl.name.range));
                }
                if let Some(callable) = program.ancestor_callables(&component_lower).into_iter().find(|c| c.name_lower() == name_lower) {
                    return Some((callable.file_path.clone(), callable.decl.name.range));
                }
            }
            None
        }
    }
}

/// The full completion catalog visible from `file_path`: platform
/// built-ins, callables in every scope the file belongs to (including
/// their ancestor chains), the file's own declarations, and observed
/// member-access names (spec.md §3 `propertyNameCompletions`).
pub fn completions(program: &Program, file_path: &str) -> Vec<String> {
    let mut names = program.platform.builtin_names();

    let mode = match program.file(file_path) {
        Some(File::Code(code)) => code.borrow().parse_mode,
        _ => bsc_parser::ast::ParseMode::Superset,
    };

    for component_lower in program.get_scopes_for_file(file_path) {
        names.extend(program.callables_as_completions_in_scope(&component_lower, mode).iter().map(|c| c.name().to_string()));
        names.extend(
            program
                .ancestor_callables(&component_lower)
                .iter()
                .filter(|c| mode != bsc_parser::ast::ParseMode::Superset || c.namespace_path.is_empty())
                .map(|c| c.name().to_string()),
        );
    }

    if let Some(File::Code(code)) = program.file(file_path) {
        let code = code.borrow();
        names.extend(
            code.callables
                .iter()
                .filter(|c| mode != bsc_parser::ast::ParseMode::Superset || c.namespace_path.is_empty())
                .map(|c| c.name().to_string()),
        );
        names.extend(code.property_name_completions.iter().cloned());
    }

    names.sort();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileReference;
    use crate::paths::PkgPath;
    use bsc_parser::ast::ParseMode;

    #[test]
    fn goto_definition_finds_call_in_same_file() {
        let mut program = Program::new();
        program.add_code_file("main.brs", "main.brs", "function greet()\nend function\nsub main()\n  greet()\nend sub\n", ParseMode::Superset);
        let call_name_pos = Position::new(3, 2);
        let target = goto_definition(&program, "main.brs", call_name_pos);
        assert!(target.is_some());
        assert_eq!(target.unwrap().0, "main.brs");
    }

    #[test]
    fn goto_definition_follows_parent_name_attribute() {
        let mut program = Program::new();
        program.add_descriptor_file("Base.xml", "Base.xml", "Base", SourceRange::ZERO, None, None, Vec::new());
        let parent_range = SourceRange::new(Position::new(2, 10), Position::new(2, 14));
        program.add_descriptor_file("Child.xml", "Child.xml", "Child", SourceRange::ZERO, Some("Base".to_string()), Some(parent_range), Vec::new());
        let target = goto_definition(&program, "Child.xml", Position::new(2, 12));
        assert_eq!(target.unwrap().0, "Base.xml");
    }

    #[test]
    fn completions_include_ancestor_callables() {
        let mut program = Program::new();
        program.add_code_file("base.brs", "base.brs", "function helper()\nend function\n", ParseMode::Superset);
        program.add_code_file("child.brs", "child.brs", "sub run()\nend sub\n", ParseMode::Superset);
        program.add_descriptor_file(
            "Base.xml",
            "Base.xml",
            "Base",
            SourceRange::ZERO,
            None,
            None,
            vec![FileReference { pkg_path: PkgPath::new("base.brs"), file_path_range: SourceRange::ZERO }],
        );
        program.add_descriptor_file(
            "Child.xml",
            "Child.xml",
            "Child",
            SourceRange::ZERO,
            Some("Base".to_string()),
            Some(SourceRange::new(Position::new(0, 0), Position::new(0, 4))),
            vec![FileReference { pkg_path: PkgPath::new("child.brs"), file_path_range: SourceRange::ZERO }],
        );
        let names = completions(&program, "child.brs");
        assert!(names.iter().any(|n| n == "helper"));
        assert!(names.iter().any(|n| n == "run"));
        assert!(names.iter().any(|n| n == "print"));
    }

    #[test]
    fn completions_omit_namespaced_callables_in_superset_mode() {
        let mut program = Program::new();
        program.add_code_file(
            "main.brs",
            "main.brs",
            "namespace ns\nfunction helper()\nend function\nend namespace\nsub run()\nend sub\n",
            ParseMode::Superset,
        );
        program.add_descriptor_file(
            "Main.xml",
            "Main.xml",
            "Main",
            SourceRange::ZERO,
            None,
            None,
            vec![FileReference { pkg_path: PkgPath::new("main.brs"), file_path_range: SourceRange::ZERO }],
        );
        let names = completions(&program, "main.brs");
        assert!(names.iter().any(|n| n == "run"));
        assert!(!names.iter().any(|n| n == "helper"));
    }
}
