//! Class hierarchy validation (spec.md §4.5): parent resolution, cycle
//! detection, member signature compatibility, final-override and
//! field-shadowing checks, duplicate-member-name checks.

use crate::diagnostics::DiagnosticData;
use bsc_parser::ast::{ClassStatement, FunctionStatement};
use bsc_parser::Diagnostic;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// A class paired with the path of the file that declares it, so emitted
/// diagnostics can be attached to the right file.
pub struct ClassEntry {
    pub file_path: String,
    pub class: Rc<ClassStatement>,
}

/// Names the engine treats as implicit roots: extending one of these is not
/// a diagnosable "unknown parent" even though no declaration exists for it.
const IMPLICIT_ROOTS: &[&str] = &["object", "dynamictype"];

/// Validates every class visible within a scope against the others,
/// returning one diagnostic per violation found (spec.md §4.5, run once
/// the scope's full class set is known).
pub fn validate(entries: &[ClassEntry]) -> Vec<Diagnostic> {
    let by_name: HashMap<String, &ClassEntry> = entries.iter().map(|e| (e.class.fq_name_lower(), e)).collect();
    let mut diagnostics = Vec::new();

    for entry in entries {
        diagnostics.extend(duplicate_members(entry));

        let Some(parent_name) = &entry.class.parent_name else { continue };
        let parent_lower = parent_name.to_lowercase();
        if IMPLICIT_ROOTS.contains(&parent_lower.as_str()) {
            continue;
        }
        let Some(parent_entry) = by_name.get(&parent_lower) else {
            let range = entry.class.parent_name_range.unwrap_or(entry.class.range);
            diagnostics.push(
                DiagnosticData::UnknownParentClass { class: entry.class.name.text.clone(), parent: parent_name.clone() }
                    .to_diagnostic(range, entry.file_path.clone()),
            );
            continue;
        };

        if has_cycle(entry, &by_name) {
            diagnostics.push(
                DiagnosticData::CyclicInheritance { class: entry.class.name.text.clone() }
                    .to_diagnostic(entry.class.range, entry.file_path.clone()),
            );
            continue;
        }

        diagnostics.extend(member_checks(entry, parent_entry, &by_name));
    }

    diagnostics
}

fn has_cycle(start: &ClassEntry, by_name: &HashMap<String, &ClassEntry>) -> bool {
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(start.class.fq_name_lower());
    let mut current = start;
    while let Some(parent_name) = &current.class.parent_name {
        let parent_lower = parent_name.to_lowercase();
        let Some(parent) = by_name.get(&parent_lower) else { return false };
        if !seen.insert(parent.class.fq_name_lower()) {
            return true;
        }
        current = parent;
    }
    false
}

fn duplicate_members(entry: &ClassEntry) -> Vec<Diagnostic> {
    let mut seen: HashMap<String, ()> = HashMap::new();
    let mut diagnostics = Vec::new();
    for field in &entry.class.fields {
        let key = field.name.text.to_lowercase();
        if seen.insert(key, ()).is_some() {
            diagnostics.push(
                DiagnosticData::DuplicateMemberName { class: entry.class.name.text.clone(), member: field.name.text.clone() }
                    .to_diagnostic(field.range, entry.file_path.clone()),
            );
        }
    }
    for method in &entry.class.methods {
        let key = method.name.text.to_lowercase();
        if seen.insert(key, ()).is_some() {
            diagnostics.push(
                DiagnosticData::DuplicateMemberName { class: entry.class.name.text.clone(), member: method.name.text.clone() }
                    .to_diagnostic(method.range, entry.file_path.clone()),
            );
        }
    }
    diagnostics
}

/// Walks the ancestor chain starting at `parent` looking for a member of
/// the same name as `member_name`, applying final-override and
/// signature-compatibility checks against the nearest one found.
fn member_checks(entry: &ClassEntry, parent: &ClassEntry, by_name: &HashMap<String, &ClassEntry>) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for method in &entry.class.methods {
        if let Some((ancestor, ancestor_method)) = find_ancestor_method(parent, &method.name.text.to_lowercase(), by_name) {
            if ancestor_method.is_final {
                diagnostics.push(
                    DiagnosticData::OverrideOfFinalMember {
                        class: entry.class.name.text.clone(),
                        parent: ancestor.class.name.text.clone(),
                        member: method.name.text.clone(),
                    }
                    .to_diagnostic(method.range, entry.file_path.clone()),
                );
            }
            if !signatures_compatible(&method.signature, &ancestor_method.signature) {
                diagnostics.push(
                    DiagnosticData::MemberSignatureMismatch {
                        class: entry.class.name.text.clone(),
                        parent: ancestor.class.name.text.clone(),
                        member: method.name.text.clone(),
                    }
                    .to_diagnostic(method.range, entry.file_path.clone()),
                );
            }
        }
    }

    for field in &entry.class.fields {
        if let Some((ancestor, _)) = find_ancestor_field(parent, &field.name.text.to_lowercase(), by_name) {
            diagnostics.push(
                DiagnosticData::FieldShadowsParentField {
                    class: entry.class.name.text.clone(),
                    parent: ancestor.class.name.text.clone(),
                    field: field.name.text.clone(),
                }
                .to_diagnostic(field.range, entry.file_path.clone()),
            );
        }
    }

    diagnostics
}

fn find_ancestor_method<'a>(
    start: &'a ClassEntry,
    name_lower: &str,
    by_name: &HashMap<String, &'a ClassEntry>,
) -> Option<(&'a ClassEntry, FunctionStatement)> {
    let mut current = start;
    loop {
        if let Some(m) = current.class.methods.iter().find(|m| m.name.text.to_lowercase() == name_lower) {
            return Some((current, m.clone()));
        }
        let parent_name = current.class.parent_name.as_ref()?;
        current = by_name.get(&parent_name.to_lowercase())?;
    }
}

fn find_ancestor_field<'a>(
    start: &'a ClassEntry,
    name_lower: &str,
    by_name: &HashMap<String, &'a ClassEntry>,
) -> Option<(&'a ClassEntry, ())> {
    let mut current = start;
    loop {
        if current.class.fields.iter().any(|f| f.name.text.to_lowercase() == name_lower) {
            return Some((current, ()));
        }
        let parent_name = current.class.parent_name.as_ref()?;
        current = by_name.get(&parent_name.to_lowercase())?;
    }
}

fn signatures_compatible(child: &bsc_parser::ast::FunctionSignature, parent: &bsc_parser::ast::FunctionSignature) -> bool {
    if child.params.len() != parent.params.len() {
        return false;
    }
    child.params.iter().zip(&parent.params).all(|(c, p)| c.type_name == p.type_name && c.is_optional == p.is_optional)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsc_parser::ast::ParseMode;

    fn parse_classes(source: &str) -> Vec<Rc<ClassStatement>> {
        let tokens = bsc_parser::lexer::merge_end_keywords(bsc_parser::lexer::tokenize(source));
        bsc_parser::parser::parse(tokens, ParseMode::Superset, "f.brs").class_statements
    }

    fn entries(source: &str) -> Vec<ClassEntry> {
        parse_classes(source).into_iter().map(|class| ClassEntry { file_path: "f.brs".to_string(), class }).collect()
    }

    #[test]
    fn unknown_parent_is_flagged() {
        let entries = entries("class Widget as Ghost\nend class\n");
        let diags = validate(&entries);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, crate::diagnostics::codes::UNKNOWN_PARENT_CLASS);
    }

    #[test]
    fn self_cycle_is_flagged() {
        let entries = entries("class A as B\nend class\nclass B as A\nend class\n");
        let diags = validate(&entries);
        assert!(diags.iter().any(|d| d.code == crate::diagnostics::codes::CYCLIC_INHERITANCE));
    }

    #[test]
    fn final_override_is_flagged() {
        let entries = entries(
            "class Base\nfinal function greet()\nend function\nend class\nclass Child as Base\nfunction greet()\nend function\nend class\n",
        );
        let diags = validate(&entries);
        assert!(diags.iter().any(|d| d.code == crate::diagnostics::codes::OVERRIDE_OF_FINAL_MEMBER));
    }

    #[test]
    fn duplicate_member_name_is_flagged() {
        let entries = entries("class Widget\nfunction greet()\nend function\nfunction greet()\nend function\nend class\n");
        let diags = validate(&entries);
        assert!(diags.iter().any(|d| d.code == crate::diagnostics::codes::DUPLICATE_MEMBER_NAME));
    }
}
