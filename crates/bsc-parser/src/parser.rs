//! Recursive-descent parser with Pratt-style expression precedence
//! (spec.md §4.1). The parser never panics and never returns `Result`: any
//! malformed construct becomes a [`Diagnostic`] plus a best-effort AST node,
//! and parsing continues at the next statement boundary.

use crate::ast::*;
use crate::diagnostic::{codes, Diagnostic, Severity};
use crate::token::{Position, SourceRange, Token, TokenKind};
use std::rc::Rc;

/// Everything the parser incidentally discovers while walking the token
/// stream, alongside the top-level statement list (spec.md §4.1: "list of
/// top-level statements, list of diagnostics, plus incidentally populated
/// secondary collections").
pub struct ParseResult {
    pub statements: Vec<Stmt>,
    pub diagnostics: Vec<Diagnostic>,
    pub namespace_statements: Vec<Rc<NamespaceStatement>>,
    pub class_statements: Vec<Rc<ClassStatement>>,
    pub function_statements: Vec<Rc<FunctionStatement>>,
    pub new_expressions: Vec<Rc<NewExpression>>,
    pub function_calls: Vec<Rc<FunctionCall>>,
}

pub fn parse(tokens: Vec<Token>, mode: ParseMode, file: &str) -> ParseResult {
    let mut parser = Parser::new(tokens, mode, file);
    let statements = parser.parse_program();
    ParseResult {
        statements,
        diagnostics: parser.diagnostics,
        namespace_statements: parser.namespace_statements,
        class_statements: parser.class_statements,
        function_statements: parser.function_statements,
        new_expressions: parser.new_expressions,
        function_calls: parser.function_calls,
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    mode: ParseMode,
    file: String,
    diagnostics: Vec<Diagnostic>,
    namespace_statements: Vec<Rc<NamespaceStatement>>,
    class_statements: Vec<Rc<ClassStatement>>,
    function_statements: Vec<Rc<FunctionStatement>>,
    new_expressions: Vec<Rc<NewExpression>>,
    function_calls: Vec<Rc<FunctionCall>>,
    namespace_stack: Vec<String>,
}

impl Parser {
    fn new(tokens: Vec<Token>, mode: ParseMode, file: &str) -> Self {
        Self {
            tokens,
            pos: 0,
            mode,
            file: file.to_string(),
            diagnostics: Vec::new(),
            namespace_statements: Vec::new(),
            class_statements: Vec::new(),
            function_statements: Vec::new(),
            new_expressions: Vec::new(),
            function_calls: Vec::new(),
            namespace_stack: Vec::new(),
        }
    }

    // ---- token stream helpers ----

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_nth_kind(&self, n: usize) -> TokenKind {
        self.tokens.get(self.pos + n).map(|t| t.kind).unwrap_or(TokenKind::Eof)
    }

    fn at_end(&self) -> bool {
        self.peek_kind() == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if !self.at_end() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn match_kind(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            self.error_here(codes::UNEXPECTED_TOKEN, format!("expected {what}, found {:?}", self.peek_kind()));
            None
        }
    }

    fn error_here(&mut self, code: u32, message: impl Into<String>) {
        let range = self.peek().range;
        self.diagnostics.push(Diagnostic::new(code, Severity::Error, message, range, self.file.clone()));
    }

    fn error_at(&mut self, code: u32, message: impl Into<String>, range: SourceRange) {
        self.diagnostics.push(Diagnostic::new(code, Severity::Error, message, range, self.file.clone()));
    }

    /// Skips `Newline` tokens (and nothing else); used between statements
    /// and wherever the grammar treats a run of blank lines as nothing.
    fn skip_newlines(&mut self) {
        while self.check(TokenKind::Newline) {
            self.advance();
        }
    }

    /// Error recovery: advance to the next statement boundary (a newline,
    /// or EOF). Spec.md §4.1: "advance to the next statement boundary
    /// (newline or matching close bracket at the current depth)".
    fn synchronize(&mut self) {
        while !self.at_end() && !self.check(TokenKind::Newline) {
            self.advance();
        }
        self.skip_newlines();
    }

    // ---- program / statement list ----

    fn parse_program(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        self.skip_newlines();
        while !self.at_end() {
            let before = self.pos;
            let stmt = self.parse_statement();
            statements.push(stmt);
            if self.pos == before {
                // guarantee forward progress even on unrecognized input
                self.advance();
            }
            self.skip_newlines();
        }
        statements
    }

    fn parse_block(&mut self, terminators: &[TokenKind]) -> Vec<Stmt> {
        let mut statements = Vec::new();
        self.skip_newlines();
        while !self.at_end() && !terminators.contains(&self.peek_kind()) {
            let before = self.pos;
            statements.push(self.parse_statement());
            if self.pos == before {
                self.advance();
            }
            self.skip_newlines();
        }
        statements
    }

    fn parse_statement(&mut self) -> Stmt {
        match self.peek_kind() {
            TokenKind::Namespace if self.mode == ParseMode::Superset => self.parse_namespace(),
            TokenKind::Class if self.mode == ParseMode::Superset => self.parse_class(),
            TokenKind::Sub | TokenKind::Function => {
                let f = self.parse_function_decl(self.namespace_stack.clone(), false);
                Stmt::Function(f)
            }
            TokenKind::Import if self.mode == ParseMode::Superset => self.parse_import(),
            TokenKind::Dim => self.parse_dim(),
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::While => self.parse_while(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Exit => {
                let tok = self.advance();
                Stmt::Exit(tok.range)
            }
            TokenKind::Print => self.parse_print(),
            TokenKind::Stop => {
                let tok = self.advance();
                Stmt::Stop(tok.range)
            }
            TokenKind::Comment => {
                // suppression comments and ordinary comments are not
                // statements; skip them as a no-op zero-range statement is
                // avoided by just recursing past them.
                self.advance();
                self.parse_statement()
            }
            _ => self.parse_expr_or_assign_statement(),
        }
    }

    // ---- namespace / class / function ----

    fn parse_dotted_path(&mut self) -> (Vec<String>, SourceRange) {
        let first = self.advance();
        let mut range = first.range;
        let mut segments = vec![first.text.clone()];
        while self.check(TokenKind::Dot) {
            self.advance();
            if let Some(seg) = self.match_kind(TokenKind::Identifier) {
                range = range.merge(seg.range);
                segments.push(seg.text);
            } else {
                break;
            }
        }
        (segments, range)
    }

    fn parse_namespace(&mut self) -> Stmt {
        let start = self.advance(); // `namespace`
        let (path, path_range) = self.parse_dotted_path();
        self.namespace_stack.extend(path.iter().cloned());
        let body = self.parse_block(&[TokenKind::EndNamespace]);
        for _ in &path {
            self.namespace_stack.pop();
        }
        let end = self.match_kind(TokenKind::EndNamespace);
        let range = start.range.merge(end.map(|t| t.range).unwrap_or(path_range));
        let node = Rc::new(NamespaceStatement { path, path_range, body, range });
        self.namespace_statements.push(node.clone());
        Stmt::Namespace(node)
    }

    fn parse_class(&mut self) -> Stmt {
        let start = self.advance(); // `class`
        let name = match self.expect(TokenKind::Identifier, "class name") {
            Some(t) => t,
            None => Token::new(TokenKind::Identifier, "", start.range),
        };
        let mut parent_name = None;
        let mut parent_name_range = None;
        if self.check(TokenKind::As) {
            self.advance();
            let (path, range) = self.parse_dotted_path();
            parent_name = Some(path.join("."));
            parent_name_range = Some(range);
        }
        self.skip_newlines();
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.at_end() && !self.check(TokenKind::EndClass) {
            let mut access = Access::Public;
            let mut is_override = false;
            let mut is_final = false;
            loop {
                match self.peek_kind() {
                    TokenKind::Public => {
                        access = Access::Public;
                        self.advance();
                    }
                    TokenKind::Private => {
                        access = Access::Private;
                        self.advance();
                    }
                    TokenKind::Protected => {
                        access = Access::Protected;
                        self.advance();
                    }
                    TokenKind::Override => {
                        is_override = true;
                        self.advance();
                    }
                    TokenKind::Final => {
                        is_final = true;
                        self.advance();
                    }
                    _ => break,
                }
            }
            match self.peek_kind() {
                TokenKind::Sub | TokenKind::Function => {
                    let method = self.parse_method_decl(access, is_final, is_override);
                    methods.push((*method).clone());
                }
                TokenKind::Identifier => {
                    let name = self.advance();
                    let mut type_name = None;
                    if self.check(TokenKind::As) {
                        self.advance();
                        if let Some(t) = self.match_kind(TokenKind::Identifier) {
                            type_name = Some(t.text);
                        }
                    }
                    let range = name.range;
                    fields.push(FieldStatement { name, type_name, access, range });
                }
                TokenKind::Newline => {
                    self.advance();
                }
                _ => {
                    self.error_here(codes::UNEXPECTED_TOKEN, "expected a field or method declaration");
                    self.synchronize();
                }
            }
            self.skip_newlines();
        }
        let end = self.match_kind(TokenKind::EndClass);
        let range = start.range.merge(end.map(|t| t.range).unwrap_or(name.range));
        let node = Rc::new(ClassStatement { name, parent_name, parent_name_range, fields, methods, namespace_path: self.namespace_stack.clone(), range });
        self.class_statements.push(node.clone());
        Stmt::Class(node)
    }

    fn parse_function_decl(&mut self, namespace_path: Vec<String>, is_method: bool) -> Rc<FunctionStatement> {
        self.parse_function_decl_with(namespace_path, is_method, Access::Public, false, false)
    }

    fn parse_method_decl(&mut self, access: Access, is_final: bool, is_override: bool) -> Rc<FunctionStatement> {
        self.parse_function_decl_with(Vec::new(), true, access, is_final, is_override)
    }

    fn parse_function_decl_with(
        &mut self,
        namespace_path: Vec<String>,
        is_method: bool,
        access: Access,
        is_final: bool,
        is_override: bool,
    ) -> Rc<FunctionStatement> {
        let kw = self.advance();
        let is_sub = kw.kind == TokenKind::Sub;
        let name = match self.expect(TokenKind::Identifier, "function name") {
            Some(t) => t,
            None => Token::new(TokenKind::Identifier, "", kw.range),
        };
        if name.is_reserved {
            self.error_at(codes::RESERVED_WORD_AS_IDENTIFIER, format!("'{}' is a reserved word", name.text), name.range);
        }
        let signature = self.parse_signature(is_sub);
        let end_kind = if is_sub { TokenKind::EndSub } else { TokenKind::EndFunction };
        let body = self.parse_block(&[end_kind]);
        let end = self.match_kind(end_kind);
        let range = kw.range.merge(end.map(|t| t.range).unwrap_or(name.range));
        let node = Rc::new(FunctionStatement {
            name,
            signature,
            body,
            namespace_path,
            is_sub,
            is_method,
            is_final,
            is_override,
            access,
            range,
        });
        self.function_statements.push(node.clone());
        node
    }

    fn parse_signature(&mut self, is_sub: bool) -> FunctionSignature {
        let mut params = Vec::new();
        if self.expect(TokenKind::LParen, "'('").is_some() {
            if !self.check(TokenKind::RParen) {
                loop {
                    if let Some(param) = self.parse_param() {
                        params.push(param);
                    } else {
                        self.error_here(codes::INVALID_PARAMETER_LIST, "expected a parameter name");
                        break;
                    }
                    if self.match_kind(TokenKind::Comma).is_some() {
                        continue;
                    }
                    break;
                }
            }
            self.expect(TokenKind::RParen, "')'");
        }
        let mut return_type = None;
        if !is_sub && self.check(TokenKind::As) {
            self.advance();
            if let Some(t) = self.match_kind(TokenKind::Identifier) {
                return_type = Some(t.text);
            }
        }
        FunctionSignature { params, return_type }
    }

    fn parse_param(&mut self) -> Option<Param> {
        let name = self.match_kind(TokenKind::Identifier)?;
        let mut range = name.range;
        let mut type_name = None;
        if self.check(TokenKind::As) {
            self.advance();
            if let Some(t) = self.match_kind(TokenKind::Identifier) {
                range = range.merge(t.range);
                type_name = Some(t.text);
            }
        }
        let mut default = None;
        if self.check(TokenKind::Equal) {
            self.advance();
            let expr = self.parse_expression();
            range = range.merge(expr.range());
            default = Some(expr);
        }
        let is_optional = default.is_some();
        Some(Param { name, type_name, is_optional, default, range })
    }

    fn parse_import(&mut self) -> Stmt {
        let start = self.advance(); // `import`
        let path_tok = self.expect(TokenKind::StringLiteral, "a quoted import path");
        let (path, path_range) = match path_tok {
            Some(t) => (unquote(&t.text), t.range),
            None => (String::new(), start.range),
        };
        let range = start.range.merge(path_range);
        Stmt::Import(ImportStatement { path, path_range, range })
    }

    fn parse_dim(&mut self) -> Stmt {
        let start = self.advance();
        let name = match self.expect(TokenKind::Identifier, "variable name") {
            Some(t) => t,
            None => Token::new(TokenKind::Identifier, "", start.range),
        };
        let mut dimensions = Vec::new();
        if self.match_kind(TokenKind::LBracket).is_some() {
            if !self.check(TokenKind::RBracket) {
                loop {
                    dimensions.push(self.parse_expression());
                    if self.match_kind(TokenKind::Comma).is_none() {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RBracket, "']'");
        }
        let range = start.range.merge(name.range);
        Stmt::Dim { name, dimensions, range }
    }

    fn parse_if(&mut self) -> Stmt {
        let start = self.advance();
        let condition = self.parse_expression();
        self.match_kind(TokenKind::Then);
        let then_branch = self.parse_block(&[TokenKind::Else, TokenKind::ElseIf, TokenKind::EndIf]);
        let mut else_branch = Vec::new();
        if self.check(TokenKind::ElseIf) {
            else_branch.push(self.parse_if_tail());
        } else if self.match_kind(TokenKind::Else).is_some() {
            else_branch = self.parse_block(&[TokenKind::EndIf]);
        }
        let end = self.match_kind(TokenKind::EndIf);
        let range = start.range.merge(end.map(|t| t.range).unwrap_or(condition.range()));
        Stmt::If(IfStatement { condition, then_branch, else_branch, range })
    }

    fn parse_if_tail(&mut self) -> Stmt {
        let start = self.advance(); // `elseif`
        let condition = self.parse_expression();
        self.match_kind(TokenKind::Then);
        let then_branch = self.parse_block(&[TokenKind::Else, TokenKind::ElseIf, TokenKind::EndIf]);
        let mut else_branch = Vec::new();
        if self.check(TokenKind::ElseIf) {
            else_branch.push(self.parse_if_tail());
        } else if self.match_kind(TokenKind::Else).is_some() {
            else_branch = self.parse_block(&[TokenKind::EndIf]);
        }
        let range = start.range.merge(condition.range());
        Stmt::If(IfStatement { condition, then_branch, else_branch, range })
    }

    fn parse_for(&mut self) -> Stmt {
        let start = self.advance(); // `for`
        if self.check(TokenKind::Each) {
            self.advance();
            let var_name = match self.expect(TokenKind::Identifier, "loop variable") {
                Some(t) => t,
                None => Token::new(TokenKind::Identifier, "", start.range),
            };
            self.expect(TokenKind::In, "'in'");
            let target = self.parse_expression();
            let body = self.parse_block(&[TokenKind::EndFor]);
            let end = self.match_kind(TokenKind::EndFor);
            let range = start.range.merge(end.map(|t| t.range).unwrap_or(target.range()));
            return Stmt::ForEach(ForEachStatement { var_name, target, body, range });
        }
        let var_name = match self.expect(TokenKind::Identifier, "loop variable") {
            Some(t) => t,
            None => Token::new(TokenKind::Identifier, "", start.range),
        };
        self.expect(TokenKind::Equal, "'='");
        let from = self.parse_expression();
        self.expect(TokenKind::To, "'to'");
        let to = self.parse_expression();
        let step = if self.match_kind(TokenKind::Step).is_some() { Some(self.parse_expression()) } else { None };
        let body = self.parse_block(&[TokenKind::EndFor]);
        let end = self.match_kind(TokenKind::EndFor);
        let range = start.range.merge(end.map(|t| t.range).unwrap_or(to.range()));
        Stmt::For(ForStatement { var_name, start: from, end: to, step, body, range })
    }

    fn parse_while(&mut self) -> Stmt {
        let start = self.advance();
        let condition = self.parse_expression();
        let body = self.parse_block(&[TokenKind::EndWhile]);
        let end = self.match_kind(TokenKind::EndWhile);
        let range = start.range.merge(end.map(|t| t.range).unwrap_or(condition.range()));
        Stmt::While(WhileStatement { condition, body, range })
    }

    fn parse_return(&mut self) -> Stmt {
        let start = self.advance();
        let value = if self.check(TokenKind::Newline) || self.at_end() { None } else { Some(self.parse_expression()) };
        let range = value.as_ref().map(|v| start.range.merge(v.range())).unwrap_or(start.range);
        Stmt::Return(value, range)
    }

    fn parse_print(&mut self) -> Stmt {
        let start = self.advance();
        let mut values = vec![self.parse_expression()];
        while self.match_kind(TokenKind::Comma).is_some() {
            values.push(self.parse_expression());
        }
        let range = values.last().map(|v| start.range.merge(v.range())).unwrap_or(start.range);
        Stmt::Print(values, range)
    }

    fn parse_expr_or_assign_statement(&mut self) -> Stmt {
        let start_pos = self.pos;
        let expr = self.parse_expression();
        let mut declared_type = None;
        if self.check(TokenKind::As) {
            self.advance();
            if let Some(t) = self.match_kind(TokenKind::Identifier) {
                declared_type = Some(t.text);
            }
        }
        if self.check(TokenKind::Equal) {
            self.advance();
            let value = self.parse_expression();
            let range = expr.range().merge(value.range());
            return Stmt::Assign(AssignStatement { target: expr, value, declared_type, range });
        }
        if self.pos == start_pos {
            // truly stuck: nothing consumed, unexpected token starts a statement
            self.error_here(codes::UNEXPECTED_TOKEN, format!("unexpected token {:?}", self.peek_kind()));
            let tok = self.advance();
            return Stmt::Invalid(tok.range);
        }
        Stmt::ExprStmt(expr)
    }

    // ---- expressions (Pratt) ----

    fn parse_expression(&mut self) -> Expr {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Expr {
        let mut lhs = self.parse_and();
        while self.check(TokenKind::Or) {
            self.advance();
            let rhs = self.parse_and();
            let range = lhs.range().merge(rhs.range());
            lhs = Expr::Binary { op: BinaryOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs), range };
        }
        lhs
    }

    fn parse_and(&mut self) -> Expr {
        let mut lhs = self.parse_comparison();
        while self.check(TokenKind::And) {
            self.advance();
            let rhs = self.parse_comparison();
            let range = lhs.range().merge(rhs.range());
            lhs = Expr::Binary { op: BinaryOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs), range };
        }
        lhs
    }

    fn parse_comparison(&mut self) -> Expr {
        let mut lhs = self.parse_additive();
        loop {
            let op = match self.peek_kind() {
                TokenKind::Equal => BinaryOp::Eq,
                TokenKind::LessGreater => BinaryOp::NotEq,
                TokenKind::Less => BinaryOp::Lt,
                TokenKind::Greater => BinaryOp::Gt,
                TokenKind::LessEqual => BinaryOp::LtEq,
                TokenKind::GreaterEqual => BinaryOp::GtEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive();
            let range = lhs.range().merge(rhs.range());
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), range };
        }
        lhs
    }

    fn parse_additive(&mut self) -> Expr {
        let mut lhs = self.parse_multiplicative();
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative();
            let range = lhs.range().merge(rhs.range());
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), range };
        }
        lhs
    }

    fn parse_multiplicative(&mut self) -> Expr {
        let mut lhs = self.parse_unary();
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary();
            let range = lhs.range().merge(rhs.range());
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), range };
        }
        lhs
    }

    fn parse_unary(&mut self) -> Expr {
        match self.peek_kind() {
            TokenKind::Minus => {
                let tok = self.advance();
                let operand = self.parse_unary();
                let range = tok.range.merge(operand.range());
                Expr::Unary { op: UnaryOp::Neg, operand: Box::new(operand), range }
            }
            TokenKind::Not => {
                let tok = self.advance();
                let operand = self.parse_unary();
                let range = tok.range.merge(operand.range());
                Expr::Unary { op: UnaryOp::Not, operand: Box::new(operand), range }
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Expr {
        let base = self.parse_postfix();
        if self.check(TokenKind::Caret) {
            self.advance();
            let exponent = self.parse_unary(); // right-associative
            let range = base.range().merge(exponent.range());
            return Expr::Binary { op: BinaryOp::Pow, lhs: Box::new(base), rhs: Box::new(exponent), range };
        }
        base
    }

    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let name_tok = self.expect(TokenKind::Identifier, "member name");
                    let (name, name_range) = match name_tok {
                        Some(t) => (t.text, t.range),
                        None => (String::new(), self.peek().range),
                    };
                    let range = expr.range().merge(name_range);
                    expr = Expr::Member { target: Box::new(expr), name, name_range, range };
                }
                TokenKind::LParen => {
                    let (callee_name, name_range) = match dotted_name_of(&expr) {
                        Some(v) => v,
                        None => (String::new(), expr.range()),
                    };
                    self.advance();
                    let args = self.parse_args();
                    let close = self.expect(TokenKind::RParen, "')'");
                    let range = expr.range().merge(close.map(|t| t.range).unwrap_or(expr.range()));
                    let call = Rc::new(FunctionCall { callee_name, args, name_range, range });
                    self.function_calls.push(call.clone());
                    expr = Expr::Call(call);
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression();
                    let close = self.expect(TokenKind::RBracket, "']'");
                    let range = expr.range().merge(close.map(|t| t.range).unwrap_or(index.range()));
                    expr = Expr::Index { target: Box::new(expr), index: Box::new(index), range };
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_args(&mut self) -> Vec<Expr> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expression());
                if self.match_kind(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        args
    }

    fn parse_primary(&mut self) -> Expr {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::IntegerLiteral => {
                self.advance();
                let value = tok.text.parse().unwrap_or(0);
                Expr::IntLiteral(value, tok.range)
            }
            TokenKind::FloatLiteral => {
                self.advance();
                let value = tok.text.parse().unwrap_or(0.0);
                Expr::FloatLiteral(value, tok.range)
            }
            TokenKind::StringLiteral => {
                self.advance();
                Expr::StringLiteral(unquote(&tok.text), tok.range)
            }
            TokenKind::True => {
                self.advance();
                Expr::BoolLiteral(true, tok.range)
            }
            TokenKind::False => {
                self.advance();
                Expr::BoolLiteral(false, tok.range)
            }
            TokenKind::Invalid => {
                self.advance();
                Expr::Invalid(tok.range)
            }
            TokenKind::Identifier => {
                self.advance();
                Expr::Identifier(tok.text, tok.range)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression();
                let close = self.expect(TokenKind::RParen, "')'");
                let range = tok.range.merge(close.map(|t| t.range).unwrap_or(inner.range()));
                Expr::Grouping(Box::new(inner), range)
            }
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_aa_literal(),
            TokenKind::New if self.mode == ParseMode::Superset => self.parse_new_expression(),
            TokenKind::Function | TokenKind::Sub => {
                let f = self.parse_function_decl(Vec::new(), false);
                self.function_statements.pop();
                Expr::FunctionExpr(f)
            }
            _ => {
                self.error_here(codes::EXPECTED_EXPRESSION, format!("expected an expression, found {:?}", tok.kind));
                if !self.at_end() {
                    self.advance();
                }
                Expr::Invalid(tok.range)
            }
        }
    }

    /// Array literal. Items may be separated by commas, newlines, or both,
    /// with trailing separators tolerated; the node's range always spans
    /// opener to closer even across intervening blank lines (spec.md §4.1,
    /// concrete scenarios 1–2).
    fn parse_array_literal(&mut self) -> Expr {
        let open = self.advance(); // `[`
        self.skip_separators();
        let mut items = Vec::new();
        while !self.at_end() && !self.check(TokenKind::RBracket) {
            items.push(self.parse_expression());
            self.skip_separators();
        }
        let close = self.expect(TokenKind::RBracket, "']'");
        let range = open.range.merge(close.map(|t| t.range).unwrap_or(open.range));
        Expr::ArrayLiteral { items, range }
    }

    fn parse_aa_literal(&mut self) -> Expr {
        let open = self.advance(); // `{`
        self.skip_separators();
        let mut entries = Vec::new();
        while !self.at_end() && !self.check(TokenKind::RBrace) {
            let key = match self.peek_kind() {
                TokenKind::Identifier | TokenKind::StringLiteral => {
                    let t = self.advance();
                    if t.kind == TokenKind::StringLiteral {
                        unquote(&t.text)
                    } else {
                        t.text
                    }
                }
                _ => {
                    self.error_here(codes::UNEXPECTED_TOKEN, "expected a key in associative-array literal");
                    break;
                }
            };
            self.expect(TokenKind::Colon, "':'");
            let value = self.parse_expression();
            entries.push((key, value));
            self.skip_separators();
        }
        let close = self.expect(TokenKind::RBrace, "'}'");
        let range = open.range.merge(close.map(|t| t.range).unwrap_or(open.range));
        Expr::AaLiteral { entries, range }
    }

    /// Inside bracketed literals, newlines are absorbed rather than acting
    /// as statement terminators (spec.md §4.1).
    fn skip_separators(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Comma) {
            self.advance();
        }
    }

    fn parse_new_expression(&mut self) -> Expr {
        let start = self.advance(); // `new`
        let (path, path_range) = self.parse_dotted_path();
        let class_name = path.join(".");
        self.expect(TokenKind::LParen, "'('");
        let args = self.parse_args();
        let close = self.expect(TokenKind::RParen, "')'");
        let range = start.range.merge(close.map(|t| t.range).unwrap_or(path_range));
        let node = Rc::new(NewExpression { class_name, class_name_range: path_range, args, range });
        self.new_expressions.push(node.clone());
        Expr::New(node)
    }
}

fn unquote(text: &str) -> String {
    text.trim_matches('"').replace("\"\"", "\"")
}

/// Builds the dotted callee name from a chain of `Identifier`/`Member`
/// nodes (e.g. `ns.Helper.doThing` -> `"ns.Helper.doThing"`), and returns
/// the range of the call's final name segment, which is what diagnostics
/// point at (spec.md §3 `FunctionCall.range of callee name`).
fn dotted_name_of(expr: &Expr) -> Option<(String, SourceRange)> {
    match expr {
        Expr::Identifier(name, range) => Some((name.clone(), *range)),
        Expr::Member { target, name, name_range, .. } => {
            let (prefix, _) = dotted_name_of(target)?;
            Some((format!("{prefix}.{name}"), *name_range))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;

    fn parse_source(src: &str, mode: ParseMode) -> ParseResult {
        let tokens = lexer::merge_end_keywords(lexer::tokenize(src));
        parse(tokens, mode, "test.brs")
    }

    #[test]
    fn empty_array_one_line() {
        let result = parse_source("x = []\n", ParseMode::Baseline);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        assert_eq!(result.statements.len(), 1);
        match &result.statements[0] {
            Stmt::Assign(a) => match &a.value {
                Expr::ArrayLiteral { items, .. } => assert!(items.is_empty()),
                other => panic!("expected array literal, got {other:?}"),
            },
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn array_across_blank_lines_has_full_range() {
        let src = "x = [\n\n\n]\n";
        let result = parse_source(src, ParseMode::Baseline);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        match &result.statements[0] {
            Stmt::Assign(a) => match &a.value {
                Expr::ArrayLiteral { items, range } => {
                    assert!(items.is_empty());
                    assert_eq!(range.start, Position::new(0, 4));
                    assert_eq!(range.end, Position::new(3, 1));
                }
                other => panic!("expected array literal, got {other:?}"),
            },
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn array_items_separated_by_newlines_and_commas() {
        let src = "x = [\n1,\n2\n3,\n]\n";
        let result = parse_source(src, ParseMode::Baseline);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        match &result.statements[0] {
            Stmt::Assign(a) => match &a.value {
                Expr::ArrayLiteral { items, .. } => assert_eq!(items.len(), 3),
                other => panic!("expected array literal, got {other:?}"),
            },
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn collects_function_call() {
        let src = "sub main()\n    doThing()\nend sub\n";
        let result = parse_source(src, ParseMode::Baseline);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        assert_eq!(result.function_calls.len(), 1);
        assert_eq!(result.function_calls[0].callee_name, "doThing");
    }

    #[test]
    fn function_signature_min_max_params() {
        let src = "function f(a, b, c = 1)\nend function\n";
        let result = parse_source(src, ParseMode::Baseline);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let f = &result.function_statements[0];
        assert_eq!(f.signature.min_params(), 2);
        assert_eq!(f.signature.max_params(), 3);
    }

    #[test]
    fn namespace_and_class_require_superset_mode() {
        let src = "namespace ns\nend namespace\n";
        let baseline = parse_source(src, ParseMode::Baseline);
        // In baseline mode `namespace` is parsed as a plain identifier
        // expression statement, not a NamespaceStatement.
        assert!(baseline.namespace_statements.is_empty());
        let superset = parse_source(src, ParseMode::Superset);
        assert_eq!(superset.namespace_statements.len(), 1);
    }

    #[test]
    fn dotted_namespace_path() {
        let src = "namespace a.b.c\nend namespace\n";
        let result = parse_source(src, ParseMode::Superset);
        assert_eq!(result.namespace_statements[0].path, vec!["a", "b", "c"]);
    }

    #[test]
    fn class_with_parent() {
        let src = "class Cat as Animal\n  name as string\nend class\n";
        let result = parse_source(src, ParseMode::Superset);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let class = &result.class_statements[0];
        assert_eq!(class.parent_name.as_deref(), Some("Animal"));
        assert_eq!(class.fields.len(), 1);
    }

    #[test]
    fn unexpected_token_recovers_to_next_statement() {
        let src = ")\nx = 1\n";
        let result = parse_source(src, ParseMode::Baseline);
        assert!(!result.diagnostics.is_empty());
        // recovery still finds the following assignment
        assert!(result.statements.iter().any(|s| matches!(s, Stmt::Assign(_))));
    }
}
