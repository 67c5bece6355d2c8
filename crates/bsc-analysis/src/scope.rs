//! Base scope: file membership, lazy namespace/class lookup caches, and the
//! shared validation steps every scope kind runs (spec.md §4.4).
//!
//! Lookup caches are versioned rather than flag-invalidated (spec.md §9
//! "lazy-invalidation-flag caches → versioned/epoch derivations"): each
//! scope carries an `epoch` bumped by [`Scope::invalidate`], and a cached
//! lookup table remembers the epoch it was built at. A lookup rebuilds
//! whenever the stored epoch no longer matches current, and never needs an
//! explicit "is this cache dirty" flag.

use crate::class_validator::{self, ClassEntry};
use crate::diagnostics::{self, codes, DiagnosticData};
use crate::file::{Callable, File, FileRegistry};
use crate::paths::AbsolutePath;
use bsc_parser::ast::{ClassStatement, NamespaceStatement, ParseMode};
use bsc_parser::Diagnostic;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

pub struct Scope {
    pub name: String,
    member_paths: Vec<AbsolutePath>,
    epoch: Cell<u64>,
    namespace_cache: RefCell<Option<(u64, HashMap<String, Vec<Rc<NamespaceStatement>>>)>>,
    class_cache: RefCell<Option<(u64, HashMap<String, Rc<ClassStatement>>)>>,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            member_paths: Vec::new(),
            epoch: Cell::new(0),
            namespace_cache: RefCell::new(None),
            class_cache: RefCell::new(None),
        }
    }

    pub fn add_file(&mut self, path: impl Into<AbsolutePath>) {
        let path = path.into();
        if !self.member_paths.contains(&path) {
            self.member_paths.push(path);
            self.invalidate();
        }
    }

    pub fn remove_file(&mut self, path: &str) {
        let before = self.member_paths.len();
        self.member_paths.retain(|p| p != path);
        if self.member_paths.len() != before {
            self.invalidate();
        }
    }

    pub fn is_member(&self, path: &str) -> bool {
        self.member_paths.iter().any(|p| p == path)
    }

    pub fn member_paths(&self) -> &[AbsolutePath] {
        &self.member_paths
    }

    pub fn invalidate(&self) {
        self.epoch.set(self.epoch.get() + 1);
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    /// A declaration "A.B.C" contributes three keys — "a", "a.b", "a.b.c" —
    /// each resolving to the same declaration, so a prefix lookup like
    /// `isKnownNamespace("a.b")` succeeds even though nothing declares the
    /// namespace "A.B" on its own (spec.md §3 "namespace lookup closure").
    fn rebuild_namespace_cache(&self, files: &FileRegistry) -> HashMap<String, Vec<Rc<NamespaceStatement>>> {
        let mut map: HashMap<String, Vec<Rc<NamespaceStatement>>> = HashMap::new();
        for path in &self.member_paths {
            let Some(File::Code(code)) = files.get(path) else { continue };
            for ns in &code.borrow().namespaces {
                for prefix_len in 1..=ns.path.len() {
                    let key = ns.path[..prefix_len].join(".").to_lowercase();
                    map.entry(key).or_default().push(ns.clone());
                }
            }
        }
        map
    }

    /// Every namespace block across member files whose dotted path
    /// lower-cases to `name_lower` (spec.md §4.4: namespaces are merged
    /// across files by name, not unique declarations).
    pub fn namespace_lookup(&self, files: &FileRegistry, name_lower: &str) -> Vec<Rc<NamespaceStatement>> {
        let current_epoch = self.epoch.get();
        {
            let cache = self.namespace_cache.borrow();
            if let Some((epoch, map)) = cache.as_ref() {
                if *epoch == current_epoch {
                    return map.get(name_lower).cloned().unwrap_or_default();
                }
            }
        }
        let map = self.rebuild_namespace_cache(files);
        let result = map.get(name_lower).cloned().unwrap_or_default();
        *self.namespace_cache.borrow_mut() = Some((current_epoch, map));
        result
    }

    /// True if any member file declares a namespace whose lower-cased
    /// dotted path equals `name_lower` or is nested under it (spec.md §4.4
    /// `isKnownNamespace`).
    pub fn is_known_namespace(&self, files: &FileRegistry, name_lower: &str) -> bool {
        !self.namespace_lookup(files, name_lower).is_empty()
    }

    fn rebuild_class_cache(&self, files: &FileRegistry) -> HashMap<String, Rc<ClassStatement>> {
        let mut map = HashMap::new();
        for path in &self.member_paths {
            let Some(File::Code(code)) = files.get(path) else { continue };
            for class in &code.borrow().classes {
                map.insert(class.fq_name_lower(), class.clone());
            }
        }
        map
    }

    pub fn class_lookup(&self, files: &FileRegistry, fq_name_lower: &str) -> Option<Rc<ClassStatement>> {
        let current_epoch = self.epoch.get();
        {
            let cache = self.class_cache.borrow();
            if let Some((epoch, map)) = cache.as_ref() {
                if *epoch == current_epoch {
                    return map.get(fq_name_lower).cloned();
                }
            }
        }
        let map = self.rebuild_class_cache(files);
        let result = map.get(fq_name_lower).cloned();
        *self.class_cache.borrow_mut() = Some((current_epoch, map));
        result
    }

    /// All callables declared by member files, in a stable order: file
    /// insertion order, then declaration order within each file (the
    /// testable property "stable callable ordering", spec.md §8).
    pub fn callables(&self, files: &FileRegistry) -> Vec<Callable> {
        let mut result = Vec::new();
        for path in &self.member_paths {
            if let Some(File::Code(code)) = files.get(path) {
                result.extend(code.borrow().callables.iter().cloned());
            }
        }
        result
    }

    /// Callables suitable for a completion list (spec.md §4.4
    /// `getCallablesAsCompletions`). In superset mode, callables declared
    /// inside a namespace are omitted — they're reached by their dotted
    /// namespace path, not as a bare name in this scope's completions.
    pub fn callables_as_completions(&self, files: &FileRegistry, mode: ParseMode) -> Vec<Callable> {
        self.callables(files).into_iter().filter(|c| mode != ParseMode::Superset || c.namespace_path.is_empty()).collect()
    }

    pub fn class_entries(&self, files: &FileRegistry) -> Vec<ClassEntry> {
        let mut result = Vec::new();
        for path in &self.member_paths {
            if let Some(File::Code(code)) = files.get(path) {
                let code = code.borrow();
                for class in &code.classes {
                    result.push(ClassEntry { file_path: code.path_absolute.clone(), class: class.clone() });
                }
            }
        }
        result
    }

    /// The §4.4 per-file checks shared by every scope kind: unknown calls,
    /// argument-count mismatches, locals shadowing scope/stdlib callables,
    /// and duplicate implementations across member files. `inherited`
    /// supplies callables visible through an ancestor scope, nearest first.
    pub fn validate(&self, files: &FileRegistry, inherited: &[Callable]) -> Vec<Diagnostic> {
        let own_callables = self.callables(files);
        let mut diagnostics = Vec::new();
        diagnostics.extend(duplicate_and_override_checks(&own_callables, inherited));
        diagnostics.extend(class_validator::validate(&self.class_entries(files)));

        for path in &self.member_paths {
            let Some(File::Code(code)) = files.get(path) else { continue };
            let code = code.borrow();
            diagnostics.extend(per_file_checks(&code, &own_callables, inherited));
        }

        diagnostics
    }
}

/// Buckets `own` by qualified name (sorted by file path then name first,
/// per spec.md §3's determinism invariant) and, per bucket: flags every
/// entry when there's more than one (spec.md §4.4.1 "every duplicate is
/// flagged, including the first"), and emits an overrides-ancestor info
/// for each entry that shadows an ancestor callable of the same name —
/// except the bucket named "init", which is exempt from the override
/// diagnostic.
fn duplicate_and_override_checks(own: &[Callable], inherited: &[Callable]) -> Vec<Diagnostic> {
    let mut sorted: Vec<&Callable> = own.iter().collect();
    sorted.sort_by(|a, b| a.file_path.cmp(&b.file_path).then_with(|| a.name_lower().cmp(&b.name_lower())));

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&Callable>> = HashMap::new();
    for callable in sorted {
        let key = callable.qualified_name_lower();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(callable);
    }

    let mut diagnostics = Vec::new();
    for key in &order {
        let group = &groups[key];
        if group.len() > 1 {
            for callable in group {
                diagnostics.push(
                    DiagnosticData::DuplicateFunctionImplementation { name: callable.name().to_string() }
                        .to_diagnostic(callable.decl.range, callable.file_path.clone()),
                );
            }
        }

        if key == "init" {
            continue;
        }
        if let Some(ancestor) = inherited.iter().find(|a| &a.qualified_name_lower() == key) {
            for callable in group {
                diagnostics.push(
                    DiagnosticData::OverridesAncestorFunction {
                        name: callable.name().to_string(),
                        ancestor_scope: ancestor.file_path.clone(),
                        ancestor_range: ancestor.decl.range,
                    }
                    .to_diagnostic(callable.decl.range, callable.file_path.clone()),
                );
            }
        }
    }
    diagnostics
}

fn per_file_checks(code: &crate::file::CodeFile, scope_callables: &[Callable], inherited: &[Callable]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let builtins = crate::platform::builtins();

    for call in &code.function_calls {
        let name_lower = call.callee_name.to_lowercase();

        // A local variable of the same name resolves the call to that
        // value rather than a declared callable (spec.md §4.4.2).
        if code.function_scope_at_position(call.name_range.start).variable(&name_lower).is_some() {
            continue;
        }

        let scope_match = scope_callables.iter().find(|c| c.qualified_name_lower() == name_lower || c.name_lower() == name_lower);
        let inherited_match = inherited.iter().find(|c| c.qualified_name_lower() == name_lower || c.name_lower() == name_lower);
        let builtin_match = crate::platform::lookup(&name_lower);

        match (scope_match.or(inherited_match), builtin_match) {
            (Some(callable), _) => {
                let (min, max) = (callable.decl.signature.min_params(), callable.decl.signature.max_params());
                let actual = call.args.len();
                if actual < min || actual > max {
                    diagnostics.push(
                        DiagnosticData::MismatchArgumentCount {
                            name: call.callee_name.clone(),
                            bounds: bounds_text(min, max),
                            actual,
                        }
                        .to_diagnostic(call.range, code.path_absolute.clone()),
                    );
                }
            }
            (None, Some(builtin)) => {
                let actual = call.args.len();
                if actual < builtin.min_args || actual > builtin.max_args {
                    diagnostics.push(
                        DiagnosticData::MismatchArgumentCount {
                            name: call.callee_name.clone(),
                            bounds: bounds_text(builtin.min_args, builtin.max_args),
                            actual,
                        }
                        .to_diagnostic(call.range, code.path_absolute.clone()),
                    );
                }
            }
            (None, None) => {
                diagnostics.push(
                    DiagnosticData::CallToUnknownFunction { name: call.callee_name.clone() }
                        .to_diagnostic(call.name_range, code.path_absolute.clone()),
                );
            }
        }
    }

    for function_scope in &code.function_scopes {
        for var in function_scope.variables.values() {
            let name_lower = var.name.to_lowercase();
            if var.is_function_typed {
                if crate::platform::lookup(&name_lower).is_some() {
                    diagnostics.push(
                        DiagnosticData::LocalFunctionShadowsStdlib { name: var.name.clone() }
                            .to_diagnostic(var.name_range, code.path_absolute.clone()),
                    );
                } else if scope_callables.iter().any(|c| c.name_lower() == name_lower) {
                    diagnostics.push(
                        DiagnosticData::LocalFunctionShadowsScope { name: var.name.clone() }
                            .to_diagnostic(var.name_range, code.path_absolute.clone()),
                    );
                }
            } else if crate::platform::lookup(&name_lower).is_none() && scope_callables.iter().any(|c| c.name_lower() == name_lower) {
                diagnostics.push(
                    DiagnosticData::LocalVarShadowedByScopedFunction { name: var.name.clone() }
                        .to_diagnostic(var.name_range, code.path_absolute.clone()),
                );
            }
        }
    }

    for callable in scope_callables {
        if builtins.iter().any(|b| b.name_lower() == callable.name_lower()) {
            diagnostics.push(
                DiagnosticData::ScopeFunctionShadowedByBuiltIn { name: callable.name().to_string() }
                    .to_diagnostic(callable.decl.range, code.path_absolute.clone()),
            );
        }
    }

    diagnostics
}

fn bounds_text(min: usize, max: usize) -> String {
    if min == max {
        min.to_string()
    } else if max == usize::MAX {
        format!("at least {min}")
    } else {
        format!("{min}-{max}")
    }
}

/// Applies comment-based suppression on top of the diagnostics a scope
/// produces directly; exposed for callers (`Program`) composing diagnostics
/// from multiple scopes over the same file.
pub fn apply_suppressions(diagnostics: Vec<Diagnostic>, source: &str) -> Vec<Diagnostic> {
    diagnostics::apply_suppressions(diagnostics, source)
}

/// The scope every other scope implicitly inherits from: the platform's
/// built-in callables. Has no member files of its own.
pub struct PlatformScope {
    pub base: Scope,
}

impl PlatformScope {
    pub fn new() -> Self {
        Self { base: Scope::new("platform") }
    }

    pub fn builtin_names(&self) -> Vec<String> {
        crate::platform::builtins().into_iter().map(|b| b.name_lower()).collect()
    }
}

impl Default for PlatformScope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::CodeFile;
    use bsc_parser::ast::ParseMode;
    use std::cell::RefCell as StdRefCell;

    fn registry_with(path: &str, source: &str) -> FileRegistry {
        let mut files = FileRegistry::new();
        let code = CodeFile::parse(path, path, source, ParseMode::Superset);
        files.insert(path.to_string(), File::Code(Rc::new(StdRefCell::new(code))));
        files
    }

    #[test]
    fn unknown_call_is_flagged() {
        let files = registry_with("f.brs", "sub main()\n  doSomething()\nend sub\n");
        let mut scope = Scope::new("scope");
        scope.add_file("f.brs");
        let diags = scope.validate(&files, &[]);
        assert!(diags.iter().any(|d| d.code == codes::CALL_TO_UNKNOWN_FUNCTION));
    }

    #[test]
    fn known_call_with_wrong_arity_is_flagged() {
        let files = registry_with(
            "f.brs",
            "function greet(name as string)\nend function\nsub main()\n  greet()\nend sub\n",
        );
        let mut scope = Scope::new("scope");
        scope.add_file("f.brs");
        let diags = scope.validate(&files, &[]);
        assert!(diags.iter().any(|d| d.code == codes::MISMATCH_ARGUMENT_COUNT));
    }

    #[test]
    fn function_typed_local_colliding_with_builtin_and_scope_prefers_stdlib_diagnostic() {
        let files = registry_with(
            "f.brs",
            "function print()\nend function\nsub main()\n  print = function()\n  end function\nend sub\n",
        );
        let mut scope = Scope::new("scope");
        scope.add_file("f.brs");
        let diags = scope.validate(&files, &[]);
        assert!(diags.iter().any(|d| d.code == codes::LOCAL_FUNCTION_SHADOWS_STDLIB));
        assert!(!diags.iter().any(|d| d.code == codes::LOCAL_FUNCTION_SHADOWS_SCOPE));
    }

    #[test]
    fn non_function_local_named_after_builtin_is_not_flagged_as_shadowing_scope() {
        let files = registry_with("f.brs", "function print()\nend function\nsub main()\n  print = 1\nend sub\n");
        let mut scope = Scope::new("scope");
        scope.add_file("f.brs");
        let diags = scope.validate(&files, &[]);
        assert!(!diags.iter().any(|d| d.code == codes::LOCAL_VAR_SHADOWED_BY_SCOPED_FUNCTION));
    }

    #[test]
    fn non_function_local_shadowing_a_non_builtin_scope_callable_is_still_flagged() {
        let files = registry_with("f.brs", "function helper()\nend function\nsub main()\n  helper = 1\nend sub\n");
        let mut scope = Scope::new("scope");
        scope.add_file("f.brs");
        let diags = scope.validate(&files, &[]);
        assert!(diags.iter().any(|d| d.code == codes::LOCAL_VAR_SHADOWED_BY_SCOPED_FUNCTION));
    }

    #[test]
    fn every_duplicate_implementation_is_flagged_including_the_first() {
        let files = registry_with("f.brs", "function greet()\nend function\nfunction greet()\nend function\n");
        let mut scope = Scope::new("scope");
        scope.add_file("f.brs");
        let diags = scope.validate(&files, &[]);
        assert_eq!(diags.iter().filter(|d| d.code == codes::DUPLICATE_FUNCTION_IMPLEMENTATION).count(), 2);
    }

    #[test]
    fn overriding_init_does_not_emit_info_diagnostic() {
        let ancestor_files = registry_with("base.brs", "function init()\nend function\n");
        let ancestor = Scope::new("base");
        let inherited: Vec<Callable> = {
            let mut s = ancestor;
            s.add_file("base.brs");
            s.callables(&ancestor_files)
        };
        let files = registry_with("child.brs", "function init()\nend function\n");
        let mut scope = Scope::new("child");
        scope.add_file("child.brs");
        let diags = scope.validate(&files, &inherited);
        assert!(!diags.iter().any(|d| d.code == codes::OVERRIDES_ANCESTOR_FUNCTION));
    }

    #[test]
    fn call_matching_local_variable_is_not_flagged_unknown() {
        let files = registry_with("f.brs", "sub main()\n  doThing = 1\n  doThing()\nend sub\n");
        let mut scope = Scope::new("scope");
        scope.add_file("f.brs");
        let diags = scope.validate(&files, &[]);
        assert!(!diags.iter().any(|d| d.code == codes::CALL_TO_UNKNOWN_FUNCTION));
    }

    #[test]
    fn namespace_lookup_rebuilds_after_invalidate() {
        let files = registry_with("f.brs", "namespace Foo\nfunction bar()\nend function\nend namespace\n");
        let mut scope = Scope::new("scope");
        scope.add_file("f.brs");
        assert_eq!(scope.namespace_lookup(&files, "foo").len(), 1);
        scope.invalidate();
        assert_eq!(scope.namespace_lookup(&files, "foo").len(), 1);
    }

    #[test]
    fn namespace_lookup_closure_covers_every_prefix() {
        let files = registry_with("f.brs", "namespace A.B.C\nfunction bar()\nend function\nend namespace\n");
        let mut scope = Scope::new("scope");
        scope.add_file("f.brs");
        assert!(scope.is_known_namespace(&files, "a"));
        assert!(scope.is_known_namespace(&files, "a.b"));
        assert!(scope.is_known_namespace(&files, "a.b.c"));
        assert!(!scope.is_known_namespace(&files, "a.b.c.d"));
    }
}
