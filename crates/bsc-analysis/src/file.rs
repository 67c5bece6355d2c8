//! The File Model (spec.md §3, §4.2): two kinds of project file behind a
//! shared capability set (spec.md §9 "Polymorphic file type → capability
//! set").

use crate::paths::PkgPath;
use bsc_parser::ast::{ClassStatement, Expr, FunctionStatement, NamespaceStatement, Stmt};
use bsc_parser::{diagnostic::Diagnostic, parser, ast::ParseMode, Position, SourceRange};
use indexmap::IndexMap;
use std::rc::Rc;

/// A callable exposed by a file: either a free function/sub or a class
/// method, always paired with its declaring namespace path.
#[derive(Debug, Clone)]
pub struct Callable {
    pub decl: Rc<FunctionStatement>,
    pub namespace_path: Vec<String>,
    pub file_path: String,
}

impl Callable {
    pub fn name(&self) -> &str {
        &self.decl.name.text
    }

    pub fn name_lower(&self) -> String {
        self.decl.name.text.to_lowercase()
    }

    pub fn qualified_name_lower(&self) -> String {
        if self.namespace_path.is_empty() {
            self.name_lower()
        } else {
            format!("{}.{}", self.namespace_path.join(".").to_lowercase(), self.name_lower())
        }
    }
}

/// A local variable declaration inside a [`FunctionScope`]: name, inferred
/// type, and — critically for spec.md §4.4.4 — whether the declared value
/// is itself a callable.
#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub name: String,
    pub type_name: Option<String>,
    pub name_range: SourceRange,
    pub is_function_typed: bool,
}

/// One function body's worth of local variables, or the file-level scope
/// for top-level assignments (spec.md §3 `FunctionScope`).
#[derive(Debug, Clone)]
pub struct FunctionScope {
    pub enclosing_function: Option<String>,
    pub range: SourceRange,
    pub variables: IndexMap<String, VariableDecl>,
}

impl FunctionScope {
    pub fn variable(&self, name: &str) -> Option<&VariableDecl> {
        self.variables.get(&name.to_lowercase())
    }
}

/// A reference to another project file by package path, carried by a
/// descriptor file's `<script>` children (spec.md §3 `FileReference`).
#[derive(Debug, Clone)]
pub struct FileReference {
    pub pkg_path: PkgPath,
    pub file_path_range: SourceRange,
}

/// The capability set every stored project file exposes, independent of
/// whether it is a parsed code file or an XML-shaped descriptor.
pub trait ProjectFile {
    fn pkg_path(&self) -> &PkgPath;
    fn path_absolute(&self) -> &str;
    fn diagnostics(&self) -> &[Diagnostic];
    fn callables(&self) -> &[Callable];
    fn function_scopes(&self) -> &[FunctionScope];
    fn function_calls(&self) -> &[Rc<bsc_parser::ast::FunctionCall>];
}

/// A parsed dialect source file.
pub struct CodeFile {
    pub path_absolute: String,
    pub pkg_path: PkgPath,
    pub parse_mode: ParseMode,
    /// Kept so suppression comments can be re-applied whenever diagnostics
    /// are read, rather than baked in at parse time (spec.md §7).
    pub source: String,
    pub statements: Vec<Stmt>,
    pub diagnostics: Vec<Diagnostic>,
    pub callables: Vec<Callable>,
    pub classes: Vec<Rc<ClassStatement>>,
    pub namespaces: Vec<Rc<NamespaceStatement>>,
    pub function_calls: Vec<Rc<bsc_parser::ast::FunctionCall>>,
    pub function_scopes: Vec<FunctionScope>,
    /// Catalog of dotted property-name completions (`foo.bar` member access
    /// targets observed in this file), spec.md §3 `propertyNameCompletions`.
    pub property_name_completions: Vec<String>,
}

impl CodeFile {
    pub fn parse(path_absolute: impl Into<String>, pkg_path: impl Into<PkgPath>, source: &str, parse_mode: ParseMode) -> Self {
        let path_absolute = path_absolute.into();
        let tokens = bsc_parser::lexer::merge_end_keywords(bsc_parser::lexer::tokenize(source));
        let result = parser::parse(tokens, parse_mode, &path_absolute);
        // Suppression comments are applied once, centrally, when diagnostics
        // are read back out of `Program` — not here — so that scope-level
        // diagnostics computed later are suppressed too (spec.md §7).
        let diagnostics = result.diagnostics;

        let mut callables = Vec::new();
        collect_callables(&result.statements, &[], &path_absolute, &mut callables);
        for class in &result.class_statements {
            for method in &class.methods {
                callables.push(Callable {
                    decl: Rc::new(method.clone()),
                    namespace_path: class.namespace_path.clone(),
                    file_path: path_absolute.clone(),
                });
            }
        }

        let mut function_scopes = Vec::new();
        let file_scope_range = SourceRange::new(Position::new(0, 0), Position::new(u32::MAX, u32::MAX));
        let mut file_vars = IndexMap::new();
        index_scope(&result.statements, None, &mut file_vars, &mut function_scopes);
        function_scopes.push(FunctionScope { enclosing_function: None, range: file_scope_range, variables: file_vars });
        for class in &result.class_statements {
            for method in &class.methods {
                let mut vars = IndexMap::new();
                for param in &method.signature.params {
                    vars.insert(
                        param.name.text.to_lowercase(),
                        VariableDecl { name: param.name.text.clone(), type_name: param.type_name.clone(), name_range: param.name.range, is_function_typed: false },
                    );
                }
                index_scope(&method.body, Some(method.name.text.clone()), &mut vars, &mut function_scopes);
                function_scopes.push(FunctionScope { enclosing_function: Some(method.name.text.clone()), range: method.range, variables: vars });
            }
        }

        let mut property_name_completions = Vec::new();
        collect_property_names(&result.statements, &mut property_name_completions);
        property_name_completions.sort();
        property_name_completions.dedup();

        Self {
            path_absolute,
            pkg_path: pkg_path.into(),
            parse_mode,
            source: source.to_string(),
            statements: result.statements,
            diagnostics,
            callables,
            classes: result.class_statements,
            namespaces: result.namespace_statements,
            function_calls: result.function_calls,
            function_scopes,
            property_name_completions,
        }
    }

    /// Finds the narrowest [`FunctionScope`] containing `pos`, falling back
    /// to the file-level scope (spec.md §4.4.2).
    pub fn function_scope_at_position(&self, pos: Position) -> &FunctionScope {
        self.function_scopes
            .iter()
            .filter(|s| s.range.contains(pos) || (s.range.start == pos))
            .min_by_key(|s| range_span(s.range))
            .unwrap_or_else(|| self.function_scopes.last().expect("file-level scope always present"))
    }
}

fn range_span(r: SourceRange) -> u64 {
    let lines = (r.end.line as u64).saturating_sub(r.start.line as u64);
    lines * 100_000 + r.end.column as u64
}

impl ProjectFile for CodeFile {
    fn pkg_path(&self) -> &PkgPath {
        &self.pkg_path
    }
    fn path_absolute(&self) -> &str {
        &self.path_absolute
    }
    fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
    fn callables(&self) -> &[Callable] {
        &self.callables
    }
    fn function_scopes(&self) -> &[FunctionScope] {
        &self.function_scopes
    }
    fn function_calls(&self) -> &[Rc<bsc_parser::ast::FunctionCall>] {
        &self.function_calls
    }
}

fn collect_callables(stmts: &[Stmt], namespace_path: &[String], file_path: &str, out: &mut Vec<Callable>) {
    for stmt in stmts {
        match stmt {
            Stmt::Function(f) => out.push(Callable {
                decl: f.clone(),
                namespace_path: namespace_path.to_vec(),
                file_path: file_path.to_string(),
            }),
            Stmt::Namespace(ns) => collect_callables(&ns.body, &ns.path, file_path, out),
            _ => {}
        }
    }
}

fn collect_property_names(stmts: &[Stmt], out: &mut Vec<String>) {
    fn walk_expr(expr: &Expr, out: &mut Vec<String>) {
        match expr {
            Expr::Member { target, name, .. } => {
                out.push(name.clone());
                walk_expr(target, out);
            }
            Expr::Index { target, index, .. } => {
                walk_expr(target, out);
                walk_expr(index, out);
            }
            Expr::Call(c) => {
                for a in &c.args {
                    walk_expr(a, out);
                }
            }
            Expr::New(n) => {
                for a in &n.args {
                    walk_expr(a, out);
                }
            }
            Expr::Unary { operand, .. } => walk_expr(operand, out),
            Expr::Binary { lhs, rhs, .. } => {
                walk_expr(lhs, out);
                walk_expr(rhs, out);
            }
            Expr::Grouping(inner, _) => walk_expr(inner, out),
            Expr::ArrayLiteral { items, .. } => {
                for i in items {
                    walk_expr(i, out);
                }
            }
            Expr::AaLiteral { entries, .. } => {
                for (k, v) in entries {
                    out.push(k.clone());
                    walk_expr(v, out);
                }
            }
            _ => {}
        }
    }
    fn walk_stmts(stmts: &[Stmt], out: &mut Vec<String>) {
        for stmt in stmts {
            match stmt {
                Stmt::Assign(a) => {
                    walk_expr(&a.target, out);
                    walk_expr(&a.value, out);
                }
                Stmt::ExprStmt(e) => walk_expr(e, out),
                Stmt::If(i) => {
                    walk_expr(&i.condition, out);
                    walk_stmts(&i.then_branch, out);
                    walk_stmts(&i.else_branch, out);
                }
                Stmt::For(f) => walk_stmts(&f.body, out),
                Stmt::ForEach(f) => walk_stmts(&f.body, out),
                Stmt::While(w) => walk_stmts(&w.body, out),
                Stmt::Function(f) => walk_stmts(&f.body, out),
                Stmt::Namespace(ns) => walk_stmts(&ns.body, out),
                Stmt::Return(Some(e), _) => walk_expr(e, out),
                Stmt::Print(vals, _) => {
                    for v in vals {
                        walk_expr(v, out);
                    }
                }
                _ => {}
            }
        }
    }
    walk_stmts(stmts, out);
}

/// Recursively indexes variable declarations from assignment statements
/// into `vars`, and recurses into nested function declarations by pushing
/// a brand-new [`FunctionScope`] onto `scopes` for each one found (spec.md
/// §4.2: "one per function body plus one file-level scope").
fn index_scope(stmts: &[Stmt], enclosing: Option<String>, vars: &mut IndexMap<String, VariableDecl>, scopes: &mut Vec<FunctionScope>) {
    for stmt in stmts {
        match stmt {
            Stmt::Assign(a) => {
                if let Expr::Identifier(name, range) = &a.target {
                    vars.insert(
                        name.to_lowercase(),
                        VariableDecl { name: name.clone(), type_name: a.declared_type.clone(), name_range: *range, is_function_typed: a.value.is_function_typed() },
                    );
                }
            }
            Stmt::If(i) => {
                index_scope(&i.then_branch, enclosing.clone(), vars, scopes);
                index_scope(&i.else_branch, enclosing.clone(), vars, scopes);
            }
            Stmt::For(f) => {
                vars.entry(f.var_name.text.to_lowercase()).or_insert_with(|| VariableDecl {
                    name: f.var_name.text.clone(),
                    type_name: None,
                    name_range: f.var_name.range,
                    is_function_typed: false,
                });
                index_scope(&f.body, enclosing.clone(), vars, scopes);
            }
            Stmt::ForEach(f) => {
                vars.entry(f.var_name.text.to_lowercase()).or_insert_with(|| VariableDecl {
                    name: f.var_name.text.clone(),
                    type_name: None,
                    name_range: f.var_name.range,
                    is_function_typed: false,
                });
                index_scope(&f.body, enclosing.clone(), vars, scopes);
            }
            Stmt::While(w) => index_scope(&w.body, enclosing.clone(), vars, scopes),
            Stmt::Function(f) => {
                let mut fn_vars = IndexMap::new();
                for param in &f.signature.params {
                    fn_vars.insert(
                        param.name.text.to_lowercase(),
                        VariableDecl { name: param.name.text.clone(), type_name: param.type_name.clone(), name_range: param.name.range, is_function_typed: false },
                    );
                }
                index_scope(&f.body, Some(f.name.text.clone()), &mut fn_vars, scopes);
                scopes.push(FunctionScope { enclosing_function: Some(f.name.text.clone()), range: f.range, variables: fn_vars });
            }
            Stmt::Namespace(ns) => index_scope(&ns.body, enclosing.clone(), vars, scopes),
            _ => {}
        }
    }
}

/// An XML-shaped component descriptor (spec.md §4.2, §6).
pub struct DescriptorFile {
    pub path_absolute: String,
    pub pkg_path: PkgPath,
    pub component_name: String,
    pub component_name_range: SourceRange,
    pub parent_name: Option<String>,
    pub parent_name_range: Option<SourceRange>,
    pub script_tag_imports: Vec<FileReference>,
    pub diagnostics: Vec<Diagnostic>,
    resolved_parent_pkg_path: Option<PkgPath>,
    pub attach_events: crate::events::SignalBus<ParentEvent>,
}

#[derive(Debug, Clone)]
pub enum ParentEvent {
    Attached { parent_pkg_path: PkgPath },
    Detached,
}

impl DescriptorFile {
    pub fn new(
        path_absolute: impl Into<String>,
        pkg_path: impl Into<PkgPath>,
        component_name: impl Into<String>,
        component_name_range: SourceRange,
        parent_name: Option<String>,
        parent_name_range: Option<SourceRange>,
        script_tag_imports: Vec<FileReference>,
    ) -> Self {
        Self {
            path_absolute: path_absolute.into(),
            pkg_path: pkg_path.into(),
            component_name: component_name.into(),
            component_name_range,
            parent_name,
            parent_name_range,
            script_tag_imports,
            diagnostics: Vec::new(),
            resolved_parent_pkg_path: None,
            attach_events: crate::events::SignalBus::new(),
        }
    }

    pub fn resolved_parent_pkg_path(&self) -> Option<&PkgPath> {
        self.resolved_parent_pkg_path.as_ref()
    }

    /// True when `pkg_path` is this descriptor itself or is imported by one
    /// of its own `<script>` tags (spec.md §4.2 `doesReferenceFile`). This
    /// is the single-descriptor half of the predicate; ancestor-imported
    /// files also count and are checked by
    /// [`crate::descriptor_scope::does_reference_file`], which has access
    /// to the resolved ancestor chain this type does not.
    pub fn does_reference_file(&self, pkg_path: &PkgPath) -> bool {
        &self.pkg_path == pkg_path || self.script_tag_imports.iter().any(|r| &r.pkg_path == pkg_path)
    }

    /// Mutates the resolved-parent pointer and emits `"attach-parent"`
    /// (spec.md §4.2).
    pub fn attach_parent(&mut self, parent_pkg_path: PkgPath) {
        self.resolved_parent_pkg_path = Some(parent_pkg_path.clone());
        self.attach_events.emit(&ParentEvent::Attached { parent_pkg_path });
    }

    /// Mutates the resolved-parent pointer and emits `"detach-parent"`.
    pub fn detach_parent(&mut self) {
        if self.resolved_parent_pkg_path.take().is_some() {
            self.attach_events.emit(&ParentEvent::Detached);
        }
    }
}

impl ProjectFile for DescriptorFile {
    fn pkg_path(&self) -> &PkgPath {
        &self.pkg_path
    }
    fn path_absolute(&self) -> &str {
        &self.path_absolute
    }
    fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
    fn callables(&self) -> &[Callable] {
        &[]
    }
    fn function_scopes(&self) -> &[FunctionScope] {
        &[]
    }
    fn function_calls(&self) -> &[Rc<bsc_parser::ast::FunctionCall>] {
        &[]
    }
}

/// Storage variant for the Program's file registry (spec.md §9
/// "Polymorphic file type → capability set").
pub enum File {
    Code(Rc<std::cell::RefCell<CodeFile>>),
    Descriptor(Rc<std::cell::RefCell<DescriptorFile>>),
}

impl File {
    pub fn path_absolute(&self) -> String {
        match self {
            File::Code(f) => f.borrow().path_absolute.clone(),
            File::Descriptor(f) => f.borrow().path_absolute.clone(),
        }
    }

    pub fn pkg_path(&self) -> PkgPath {
        match self {
            File::Code(f) => f.borrow().pkg_path.clone(),
            File::Descriptor(f) => f.borrow().pkg_path.clone(),
        }
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            File::Code(f) => f.borrow().diagnostics.clone(),
            File::Descriptor(f) => f.borrow().diagnostics.clone(),
        }
    }

    pub fn as_descriptor(&self) -> Option<Rc<std::cell::RefCell<DescriptorFile>>> {
        match self {
            File::Descriptor(f) => Some(f.clone()),
            _ => None,
        }
    }

    pub fn as_code(&self) -> Option<Rc<std::cell::RefCell<CodeFile>>> {
        match self {
            File::Code(f) => Some(f.clone()),
            _ => None,
        }
    }
}

impl Clone for File {
    fn clone(&self) -> Self {
        match self {
            File::Code(f) => File::Code(f.clone()),
            File::Descriptor(f) => File::Descriptor(f.clone()),
        }
    }
}

/// The program's file registry: every known file keyed by absolute path
/// (spec.md §6: "Scopes index by absolute path").
pub type FileRegistry = IndexMap<crate::paths::AbsolutePath, File>;
