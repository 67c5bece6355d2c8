//! The AST: a closed sum over a fixed set of variants (spec.md §9 "Dynamic
//! tag dispatch on AST nodes → tagged variants"). Every node is immutable
//! once the parser produces it and carries its own [`SourceRange`].

use crate::token::{SourceRange, Token};
use std::rc::Rc;

/// Top-level parse mode. Superset mode accepts namespaces, classes, `new`
/// expressions and imports; baseline mode rejects them (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Baseline,
    Superset,
}

/// A function parameter: name, optional declared type, optional flag, and
/// default-value expression when optional.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Token,
    pub type_name: Option<String>,
    pub is_optional: bool,
    pub default: Option<Expr>,
    pub range: SourceRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub params: Vec<Param>,
    pub return_type: Option<String>,
}

impl FunctionSignature {
    /// Count of parameters that are not optional. Relies on the grammar
    /// invariant that optional parameters follow required ones.
    pub fn min_params(&self) -> usize {
        self.params.iter().take_while(|p| !p.is_optional).count()
    }

    pub fn max_params(&self) -> usize {
        self.params.len()
    }
}

/// `function`/`sub` declaration, at file scope, inside a namespace, or as a
/// class member (in which case `is_method` is true).
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionStatement {
    pub name: Token,
    pub signature: FunctionSignature,
    pub body: Vec<Stmt>,
    pub namespace_path: Vec<String>,
    pub is_sub: bool,
    pub is_method: bool,
    pub is_final: bool,
    pub is_override: bool,
    pub access: Access,
    pub range: SourceRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    #[default]
    Public,
    Private,
    Protected,
}

/// A class field declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldStatement {
    pub name: Token,
    pub type_name: Option<String>,
    pub access: Access,
    pub range: SourceRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassStatement {
    pub name: Token,
    /// Dotted parent-class name, if any, and its source range (used by
    /// go-to-definition and class-hierarchy diagnostics).
    pub parent_name: Option<String>,
    pub parent_name_range: Option<SourceRange>,
    pub fields: Vec<FieldStatement>,
    pub methods: Vec<FunctionStatement>,
    pub namespace_path: Vec<String>,
    pub range: SourceRange,
}

impl ClassStatement {
    /// Fully qualified, lower-cased lookup key (spec.md §3 "Class lookup
    /// keys are lower-cased fully qualified names").
    pub fn fq_name_lower(&self) -> String {
        if self.namespace_path.is_empty() {
            self.name.text.to_lowercase()
        } else {
            format!("{}.{}", self.namespace_path.join(".").to_lowercase(), self.name.text.to_lowercase())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceStatement {
    pub path: Vec<String>,
    pub path_range: SourceRange,
    pub body: Vec<Stmt>,
    pub range: SourceRange,
}

/// A call-expression's callee name, possibly dotted (`ns.Func`), and its
/// arguments. Collected incidentally by the parser into the file's
/// `function_calls` list (spec.md §4.1 "incidentally populated secondary
/// collections").
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub callee_name: String,
    pub args: Vec<Expr>,
    pub name_range: SourceRange,
    pub range: SourceRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewExpression {
    pub class_name: String,
    pub class_name_range: SourceRange,
    pub args: Vec<Expr>,
    pub range: SourceRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Expression nodes. `FunctionCall`/`NewExpression` are boxed behind `Rc` so
/// they can be shared with the file's flat secondary collections without
/// cloning the whole subtree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLiteral(i64, SourceRange),
    FloatLiteral(f64, SourceRange),
    StringLiteral(String, SourceRange),
    BoolLiteral(bool, SourceRange),
    Invalid(SourceRange),
    Identifier(String, SourceRange),
    Member { target: Box<Expr>, name: String, name_range: SourceRange, range: SourceRange },
    Index { target: Box<Expr>, index: Box<Expr>, range: SourceRange },
    Call(Rc<FunctionCall>),
    New(Rc<NewExpression>),
    Unary { op: UnaryOp, operand: Box<Expr>, range: SourceRange },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr>, range: SourceRange },
    Grouping(Box<Expr>, SourceRange),
    ArrayLiteral { items: Vec<Expr>, range: SourceRange },
    AaLiteral { entries: Vec<(String, Expr)>, range: SourceRange },
    FunctionExpr(Rc<FunctionStatement>),
}

impl Expr {
    pub fn range(&self) -> SourceRange {
        match self {
            Expr::IntLiteral(_, r)
            | Expr::FloatLiteral(_, r)
            | Expr::StringLiteral(_, r)
            | Expr::BoolLiteral(_, r)
            | Expr::Invalid(r)
            | Expr::Identifier(_, r) => *r,
            Expr::Member { range, .. }
            | Expr::Index { range, .. }
            | Expr::Unary { range, .. }
            | Expr::Binary { range, .. }
            | Expr::ArrayLiteral { range, .. }
            | Expr::AaLiteral { range, .. } => *range,
            Expr::Grouping(_, r) => *r,
            Expr::Call(c) => c.range,
            Expr::New(n) => n.range,
            Expr::FunctionExpr(f) => f.range,
        }
    }

    /// True for expressions whose *declared* type is a function/callable
    /// value, which is what spec.md §4.4.4 (shadowed-local detection)
    /// needs to distinguish a local holding a function from one holding
    /// data.
    pub fn is_function_typed(&self) -> bool {
        matches!(self, Expr::FunctionExpr(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportStatement {
    pub path: String,
    pub path_range: SourceRange,
    pub range: SourceRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignStatement {
    pub target: Expr,
    pub value: Expr,
    pub declared_type: Option<String>,
    pub range: SourceRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub condition: Expr,
    pub then_branch: Vec<Stmt>,
    pub else_branch: Vec<Stmt>,
    pub range: SourceRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    pub var_name: Token,
    pub start: Expr,
    pub end: Expr,
    pub step: Option<Expr>,
    pub body: Vec<Stmt>,
    pub range: SourceRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForEachStatement {
    pub var_name: Token,
    pub target: Expr,
    pub body: Vec<Stmt>,
    pub range: SourceRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStatement {
    pub condition: Expr,
    pub body: Vec<Stmt>,
    pub range: SourceRange,
}

/// Statement nodes: `Statement{…}` half of spec.md's `AstNode` tagged union.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Namespace(Rc<NamespaceStatement>),
    Class(Rc<ClassStatement>),
    Function(Rc<FunctionStatement>),
    Import(ImportStatement),
    Assign(AssignStatement),
    ExprStmt(Expr),
    If(IfStatement),
    For(ForStatement),
    ForEach(ForEachStatement),
    While(WhileStatement),
    Return(Option<Expr>, SourceRange),
    Exit(SourceRange),
    Print(Vec<Expr>, SourceRange),
    Stop(SourceRange),
    Dim { name: Token, dimensions: Vec<Expr>, range: SourceRange },
    /// Produced only in error recovery: a span skipped after a diagnostic
    /// was emitted for it.
    Invalid(SourceRange),
}

impl Stmt {
    pub fn range(&self) -> SourceRange {
        match self {
            Stmt::Namespace(n) => n.range,
            Stmt::Class(c) => c.range,
            Stmt::Function(f) => f.range,
            Stmt::Import(i) => i.range,
            Stmt::Assign(a) => a.range,
            Stmt::ExprStmt(e) => e.range(),
            Stmt::If(i) => i.range,
            Stmt::For(f) => f.range,
            Stmt::ForEach(f) => f.range,
            Stmt::While(w) => w.range,
            Stmt::Return(_, r) | Stmt::Exit(r) | Stmt::Stop(r) | Stmt::Invalid(r) => *r,
            Stmt::Print(_, r) => *r,
            Stmt::Dim { range, .. } => *range,
        }
    }
}
