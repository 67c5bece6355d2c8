//! The top-level engine object (spec.md §4.7): file and scope registries,
//! the platform scope, and the add/remove/invalidate/validate orchestration
//! that ties the rest of the crate together.

use crate::dependency_graph::DependencyGraph;
use crate::descriptor_scope::{self, DescriptorScope, ResolvedAncestor};
use crate::events::{SignalBus, SubscriptionHandle};
use crate::file::{Callable, CodeFile, DescriptorFile, File, FileReference, FileRegistry};
use crate::paths::{AbsolutePath, PkgPath};
use crate::scope::PlatformScope;
use bsc_parser::ast::ParseMode;
use bsc_parser::{Diagnostic, SourceRange};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum ProgramEvent {
    FileAdded { path: AbsolutePath },
    FileRemoved { path: AbsolutePath },
    ScopeAdded { component: String },
    ScopeRemoved { component: String },
}

fn component_node(name_lower: &str) -> String {
    format!("component:{name_lower}")
}

pub struct Program {
    pub platform: PlatformScope,
    files: FileRegistry,
    descriptor_scopes: IndexMap<String, DescriptorScope>,
    dependency_graph: DependencyGraph,
    diagnostics_cache: RefCell<Option<HashMap<AbsolutePath, Vec<Diagnostic>>>>,
    pub events: SignalBus<ProgramEvent>,
}

impl Program {
    pub fn new() -> Self {
        Self {
            platform: PlatformScope::new(),
            files: FileRegistry::new(),
            descriptor_scopes: IndexMap::new(),
            dependency_graph: DependencyGraph::new(),
            diagnostics_cache: RefCell::new(None),
            events: SignalBus::new(),
        }
    }

    pub fn subscribe(&self, listener: impl FnMut(&ProgramEvent) + 'static) -> SubscriptionHandle<ProgramEvent> {
        self.events.subscribe(listener)
    }

    pub fn add_code_file(&mut self, path_absolute: impl Into<String>, pkg_path: impl Into<PkgPath>, source: &str, parse_mode: ParseMode) {
        let path_absolute = path_absolute.into();
        let code = CodeFile::parse(path_absolute.clone(), pkg_path, source, parse_mode);
        self.files.insert(path_absolute.clone(), File::Code(Rc::new(RefCell::new(code))));
        self.dependency_graph.add_node(path_absolute.clone());
        self.invalidate();
        self.events.emit(&ProgramEvent::FileAdded { path: path_absolute });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_descriptor_file(
        &mut self,
        path_absolute: impl Into<String>,
        pkg_path: impl Into<PkgPath>,
        component_name: impl Into<String>,
        component_name_range: SourceRange,
        parent_name: Option<String>,
        parent_name_range: Option<SourceRange>,
        script_tag_imports: Vec<FileReference>,
    ) {
        let path_absolute = path_absolute.into();
        let component_name = component_name.into();
        let component_lower = component_name.to_lowercase();

        let descriptor = DescriptorFile::new(
            path_absolute.clone(),
            pkg_path,
            component_name.clone(),
            component_name_range,
            parent_name.clone(),
            parent_name_range,
            script_tag_imports.clone(),
        );
        self.files.insert(path_absolute.clone(), File::Descriptor(Rc::new(RefCell::new(descriptor))));

        let mut scope = DescriptorScope::new(component_name.clone(), path_absolute.clone());
        for reference in &script_tag_imports {
            if let Some(resolved) = self.resolve_pkg_path(&reference.pkg_path) {
                scope.base.add_file(resolved);
            }
        }
        self.descriptor_scopes.insert(component_lower.clone(), scope);

        self.dependency_graph.add_node(path_absolute.clone());
        self.dependency_graph.add_node(component_node(&component_lower));
        self.dependency_graph.add_edge(&component_node(&component_lower), &path_absolute);
        for reference in &script_tag_imports {
            if let Some(resolved) = self.resolve_pkg_path(&reference.pkg_path) {
                self.dependency_graph.add_edge(&component_node(&component_lower), &resolved);
            }
        }
        if let Some(parent) = &parent_name {
            let parent_lower = parent.to_lowercase();
            self.dependency_graph.add_node(component_node(&parent_lower));
            self.dependency_graph.add_edge(&component_node(&component_lower), &component_node(&parent_lower));
            if let Some(parent_scope) = self.descriptor_scopes.get(&parent_lower) {
                let parent_pkg = self.files.get(&parent_scope.descriptor_path).map(|f| f.pkg_path());
                if let (Some(File::Descriptor(d)), Some(parent_pkg)) = (self.files.get(&path_absolute), parent_pkg) {
                    d.borrow_mut().attach_parent(parent_pkg);
                }
            }
        }

        self.invalidate();
        self.events.emit(&ProgramEvent::FileAdded { path: path_absolute });
        self.events.emit(&ProgramEvent::ScopeAdded { component: component_name });
    }

    pub fn remove_file(&mut self, path: &str) {
        let Some(removed) = self.files.shift_remove(path) else { return };
        self.dependency_graph.remove_node(path);

        for scope in self.descriptor_scopes.values_mut() {
            scope.base.remove_file(path);
        }

        if let File::Descriptor(descriptor) = &removed {
            let component_lower = descriptor.borrow().component_name.to_lowercase();
            self.descriptor_scopes.shift_remove(&component_lower);
            self.dependency_graph.remove_node(&component_node(&component_lower));
            self.events.emit(&ProgramEvent::ScopeRemoved { component: descriptor.borrow().component_name.clone() });
        }

        self.invalidate();
        self.events.emit(&ProgramEvent::FileRemoved { path: path.to_string() });
    }

    fn resolve_pkg_path(&self, pkg_path: &PkgPath) -> Option<AbsolutePath> {
        self.files.iter().find(|(_, f)| &f.pkg_path() == pkg_path).map(|(path, _)| path.clone())
    }

    /// The component names whose scope includes `path`, in registration
    /// order (spec.md §4.7 `getScopesForFile`).
    pub fn get_scopes_for_file(&self, path: &str) -> Vec<String> {
        self.descriptor_scopes.iter().filter(|(_, s)| s.base.is_member(path)).map(|(name, _)| name.clone()).collect()
    }

    /// Nearest-parent-first ancestor chain for `component_lower`, each
    /// snapshotted as owned data so validation never holds a live borrow
    /// into `self.files` (spec.md §9 "push/pull hybrid": the dependency
    /// graph pushes invalidation, this pulls fresh ancestor data on demand).
    fn resolve_ancestors(&self, component_lower: &str) -> Vec<ResolvedAncestor> {
        let mut ancestors = Vec::new();
        let mut current = component_lower.to_string();
        let mut guard = 0;
        while let Some(scope) = self.descriptor_scopes.get(&current) {
            guard += 1;
            if guard > self.descriptor_scopes.len() + 1 {
                break; // cyclic parentName chain; stop rather than loop forever
            }
            let Some(File::Descriptor(descriptor)) = self.files.get(&scope.descriptor_path) else { break };
            let descriptor = descriptor.borrow();
            let Some(parent_name) = &descriptor.parent_name else { break };
            let parent_lower = parent_name.to_lowercase();
            let Some(parent_scope) = self.descriptor_scopes.get(&parent_lower) else { break };
            ancestors.push(ResolvedAncestor {
                component_name: parent_name.clone(),
                script_tag_imports: {
                    let Some(File::Descriptor(parent_descriptor)) = self.files.get(&parent_scope.descriptor_path) else {
                        break;
                    };
                    parent_descriptor.borrow().script_tag_imports.clone()
                },
                callables: parent_scope.base.callables(&self.files),
            });
            current = parent_lower;
        }
        ancestors
    }

    /// Bumps every scope's cache epoch so the next `validate`/lookup call
    /// recomputes from current file contents, and clears the cached
    /// diagnostics snapshot (spec.md §4.7 "add/remove/change -> invalidate
    /// -> validate").
    pub fn invalidate(&mut self) {
        self.platform.base.invalidate();
        for scope in self.descriptor_scopes.values_mut() {
            scope.base.invalidate();
        }
        *self.diagnostics_cache.borrow_mut() = None;
    }

    /// Runs validation for every scope in ancestors-before-descendants
    /// order and returns the full diagnostic set grouped by file (spec.md
    /// §5 ordering invariant).
    fn validate_all(&self) -> HashMap<AbsolutePath, Vec<Diagnostic>> {
        let mut grouped: HashMap<AbsolutePath, Vec<Diagnostic>> = HashMap::new();

        for (path, file) in self.files.iter() {
            grouped.entry(path.clone()).or_default().extend(file.diagnostics());
        }

        for node in self.dependency_graph.ancestors_first_order() {
            let Some(component_lower) = node.strip_prefix("component:") else { continue };
            let Some(scope) = self.descriptor_scopes.get(component_lower) else { continue };
            let Some(File::Descriptor(descriptor)) = self.files.get(&scope.descriptor_path) else { continue };
            let descriptor = descriptor.borrow();
            let ancestors = self.resolve_ancestors(component_lower);
            for diagnostic in descriptor_scope::validate(scope, &descriptor, &self.files, &ancestors) {
                grouped.entry(diagnostic.file.clone()).or_default().push(diagnostic);
            }
        }

        grouped
    }

    /// Diagnostics for one file, with comment-based suppression applied
    /// (spec.md §7: suppression is evaluated when diagnostics are read, not
    /// baked into storage).
    pub fn get_diagnostics(&self, path: &str) -> Vec<Diagnostic> {
        if self.diagnostics_cache.borrow().is_none() {
            *self.diagnostics_cache.borrow_mut() = Some(self.validate_all());
        }
        let cache = self.diagnostics_cache.borrow();
        let diagnostics = cache.as_ref().and_then(|c| c.get(path)).cloned().unwrap_or_default();
        match self.files.get(path) {
            Some(File::Code(code)) => crate::diagnostics::apply_suppressions(diagnostics, &code.borrow().source),
            _ => diagnostics,
        }
    }

    pub fn file(&self, path: &str) -> Option<&File> {
        self.files.get(path)
    }

    pub fn file_paths(&self) -> impl Iterator<Item = &AbsolutePath> {
        self.files.keys()
    }

    pub fn callables_in_scope(&self, component_name_lower: &str) -> Vec<Callable> {
        self.descriptor_scopes.get(component_name_lower).map(|s| s.base.callables(&self.files)).unwrap_or_default()
    }

    /// As [`Program::callables_in_scope`], but filtered for completion
    /// purposes: in superset mode, namespace-declared callables are left
    /// out (spec.md §4.4 `getCallablesAsCompletions`).
    pub fn callables_as_completions_in_scope(&self, component_name_lower: &str, mode: bsc_parser::ast::ParseMode) -> Vec<Callable> {
        self.descriptor_scopes
            .get(component_name_lower)
            .map(|s| s.base.callables_as_completions(&self.files, mode))
            .unwrap_or_default()
    }

    /// Callables visible through `component_name_lower`'s ancestor chain,
    /// nearest parent first. Exposed so editor-facing queries (goto
    /// definition, completions) can see inherited callables without
    /// reaching into `resolve_ancestors` directly.
    pub fn ancestor_callables(&self, component_name_lower: &str) -> Vec<Callable> {
        self.resolve_ancestors(component_name_lower).iter().flat_map(|a| a.callables.iter().cloned()).collect()
    }

    pub fn component_descriptor_path(&self, component_name_lower: &str) -> Option<AbsolutePath> {
        self.descriptor_scopes.get(component_name_lower).map(|s| s.descriptor_path.clone())
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsc_parser::Position;

    #[test]
    fn unknown_call_surfaces_through_program_diagnostics() {
        let mut program = Program::new();
        program.add_code_file("main.brs", "main.brs", "sub main()\n  doThing()\nend sub\n", ParseMode::Superset);
        program.add_descriptor_file(
            "Main.xml",
            "Main.xml",
            "Main",
            SourceRange::ZERO,
            None,
            None,
            vec![FileReference { pkg_path: PkgPath::new("main.brs"), file_path_range: SourceRange::ZERO }],
        );
        let diags = program.get_diagnostics("main.brs");
        assert!(diags.iter().any(|d| d.code == crate::diagnostics::codes::CALL_TO_UNKNOWN_FUNCTION));
    }

    #[test]
    fn ancestor_function_is_visible_to_child_scope() {
        let mut program = Program::new();
        program.add_code_file("base.brs", "base.brs", "function helper()\nend function\n", ParseMode::Superset);
        program.add_code_file("child.brs", "child.brs", "sub run()\n  helper()\nend sub\n", ParseMode::Superset);
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
        let diags = program.get_diagnostics("child.brs");
        assert!(!diags.iter().any(|d| d.code == crate::diagnostics::codes::CALL_TO_UNKNOWN_FUNCTION));
    }

    #[test]
    fn removing_a_file_clears_its_diagnostics() {
        let mut program = Program::new();
        program.add_code_file("main.brs", "main.brs", "sub main()\n  doThing()\nend sub\n", ParseMode::Superset);
        program.remove_file("main.brs");
        assert!(program.get_diagnostics("main.brs").is_empty());
    }
}
