//! A minimal pre-existing collaborator.
//!
//! spec.md places the lexer out of scope: "the lexer is treated as a
//! pre-existing collaborator that produces a token stream with kind, text,
//! and source range — the *parser* is in scope, the *lexer* is not." This
//! module is that stand-in: enough to drive the parser and its tests, not a
//! claim of completeness against the real device lexer (no string escapes
//! beyond `""`, no hex/octal literal forms, no block comments).
//!
//! The parser only ever depends on the `Token`/`TokenKind`/`SourceRange`
//! contract, never on anything in this module directly, so swapping in the
//! production lexer is a drop-in replacement.

use crate::token::{Position, SourceRange, Token, TokenKind};

pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    chars: Vec<char>,
    src: &'a str,
    pos: usize,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        Self { chars: source.chars().collect(), src: source, pos: 0, line: 0, column: 0, tokens: Vec::new() }
    }

    fn run(mut self) -> Vec<Token> {
        while let Some(c) = self.peek() {
            match c {
                '\r' => {
                    self.bump();
                    if self.peek() == Some('\n') {
                        self.bump();
                    }
                    self.push_newline();
                }
                '\n' => {
                    self.bump();
                    self.push_newline();
                }
                ' ' | '\t' => {
                    self.bump();
                }
                '\'' => self.comment(),
                '"' => self.string_literal(),
                c if c.is_ascii_digit() => self.number(),
                c if is_ident_start(c) => self.identifier(),
                _ => self.punct(),
            }
        }
        let eof_pos = Position::new(self.line, self.column);
        self.tokens.push(Token::eof(eof_pos));
        self.tokens
    }

    fn push_newline(&mut self) {
        let start = self.pos_before_line_bump();
        self.tokens.push(Token::new(TokenKind::Newline, "\n", SourceRange::new(start, Position::new(self.line + 1, 0))));
        self.line += 1;
        self.column = 0;
    }

    fn pos_before_line_bump(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        self.column += 1;
        Some(c)
    }

    fn here(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn comment(&mut self) {
        let start = self.here();
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c == '\n' || c == '\r' {
                break;
            }
            text.push(c);
            self.bump();
        }
        self.tokens.push(Token::new(TokenKind::Comment, text, SourceRange::new(start, self.here())));
    }

    fn string_literal(&mut self) {
        let start = self.here();
        self.bump();
        let mut text = String::from("\"");
        loop {
            match self.peek() {
                None | Some('\n') | Some('\r') => break,
                Some('"') if self.peek_at(1) == Some('"') => {
                    text.push('"');
                    text.push('"');
                    self.bump();
                    self.bump();
                }
                Some('"') => {
                    text.push('"');
                    self.bump();
                    break;
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
            }
        }
        self.tokens.push(Token::new(TokenKind::StringLiteral, text, SourceRange::new(start, self.here())));
    }

    fn number(&mut self) {
        let start = self.here();
        let mut text = String::new();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else if c == '.' && !is_float && self.peek_at(1).map(|c| c.is_ascii_digit()).unwrap_or(false) {
                is_float = true;
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let kind = if is_float { TokenKind::FloatLiteral } else { TokenKind::IntegerLiteral };
        self.tokens.push(Token::new(kind, text, SourceRange::new(start, self.here())));
    }

    fn identifier(&mut self) {
        let start = self.here();
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let kind = keyword_kind(&text).unwrap_or(TokenKind::Identifier);
        self.tokens.push(Token::new(kind, text, SourceRange::new(start, self.here())));
    }

    fn punct(&mut self) {
        let start = self.here();
        let c = self.bump().unwrap();
        let two_char = |lex: &mut Self, second: char| -> bool {
            if lex.peek() == Some(second) {
                lex.bump();
                true
            } else {
                false
            }
        };
        let mut text = c.to_string();
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,
            '=' => TokenKind::Equal,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '^' => TokenKind::Caret,
            '<' => {
                if two_char(self, '=') {
                    text.push('=');
                    TokenKind::LessEqual
                } else if two_char(self, '>') {
                    text.push('>');
                    TokenKind::LessGreater
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if two_char(self, '=') {
                    text.push('=');
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            _ => TokenKind::InvalidLiteral,
        };
        self.tokens.push(Token::new(kind, text, SourceRange::new(start, self.here())));
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn keyword_kind(word: &str) -> Option<TokenKind> {
    let lower = word.to_ascii_lowercase();
    Some(match lower.as_str() {
        "sub" => TokenKind::Sub,
        "function" => TokenKind::Function,
        "end" => return None, // handled contextually by the parser ("end sub", "end if", ...)
        "if" => TokenKind::If,
        "then" => TokenKind::Then,
        "else" => TokenKind::Else,
        "elseif" => TokenKind::ElseIf,
        "for" => TokenKind::For,
        "to" => TokenKind::To,
        "step" => TokenKind::Step,
        "each" => TokenKind::Each,
        "in" => TokenKind::In,
        "while" => TokenKind::While,
        "exit" => TokenKind::Exit,
        "return" => TokenKind::Return,
        "namespace" => TokenKind::Namespace,
        "class" => TokenKind::Class,
        "new" => TokenKind::New,
        "import" => TokenKind::Import,
        "as" => TokenKind::As,
        "dim" => TokenKind::Dim,
        "print" => TokenKind::Print,
        "stop" => TokenKind::Stop,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "invalid" => TokenKind::Invalid,
        "public" => TokenKind::Public,
        "private" => TokenKind::Private,
        "protected" => TokenKind::Protected,
        "override" => TokenKind::Override,
        "final" => TokenKind::Final,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "extends" => TokenKind::As, // `class X extends Y` reuses the `as`-like join keyword
        _ => return None,
    })
}

/// Post-processes a raw token stream so that two-word closers
/// (`end sub`, `end if`, `end for`, `end while`, `end namespace`,
/// `end class`, `end function`) become single tokens, the way the real
/// lexer's keyword table would. The parser never sees a bare `end`.
pub fn merge_end_keywords(tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let tok = &tokens[i];
        if tok.kind == TokenKind::Identifier && tok.text.eq_ignore_ascii_case("end") {
            if let Some(next) = tokens[i + 1..].iter().find(|t| t.kind != TokenKind::Comment) {
                let merged_kind = match next.text.to_ascii_lowercase().as_str() {
                    "sub" => Some(TokenKind::EndSub),
                    "function" => Some(TokenKind::EndFunction),
                    "if" => Some(TokenKind::EndIf),
                    "for" => Some(TokenKind::EndFor),
                    "while" => Some(TokenKind::EndWhile),
                    "namespace" => Some(TokenKind::EndNamespace),
                    "class" => Some(TokenKind::EndClass),
                    _ => None,
                };
                if let Some(kind) = merged_kind {
                    let skip = tokens[i + 1..].iter().position(|t| t.kind != TokenKind::Comment).unwrap() + 1;
                    let last = &tokens[i + skip];
                    let text = format!("{} {}", tok.text, last.text);
                    out.push(Token::new(kind, text, SourceRange::new(tok.range.start, last.range.end)));
                    i += skip + 1;
                    continue;
                }
            }
        }
        out.push(tok.clone());
        i += 1;
    }
    out
}
