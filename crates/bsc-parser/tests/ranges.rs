//! Node-range round-trip: an AST node's range must span exactly from its
//! first token to its last, even when the source runs across several blank
//! lines in between.

use bsc_parser::ast::{Expr, ParseMode, Stmt};
use bsc_parser::{lexer, parser, Position, SourceRange};
use pretty_assertions::assert_eq;

#[test]
fn array_literal_range_spans_opener_to_closer_across_blank_lines() {
    let src = "x = [\n\n\n\n\n]\n";
    let tokens = lexer::merge_end_keywords(lexer::tokenize(src));
    let result = parser::parse(tokens, ParseMode::Baseline, "test.brs");
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);

    match &result.statements[0] {
        Stmt::Assign(assign) => match &assign.value {
            Expr::ArrayLiteral { items, range } => {
                assert!(items.is_empty());
                assert_eq!(*range, SourceRange::new(Position::new(0, 4), Position::new(5, 1)));
            }
            other => panic!("expected array literal, got {other:?}"),
        },
        other => panic!("expected assignment, got {other:?}"),
    }
}
