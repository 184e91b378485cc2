use super::*;
use crate::parser::lexer::tokenize;
use std::path::PathBuf;

fn with_parser<T>(text: &str, f: impl FnOnce(&mut Parser) -> T) -> T {
    let source = SourceFile::new(PathBuf::from("t.py"), text.to_string());
    let tokens = tokenize(&source).unwrap();
    let mut parser = Parser::new(tokens, &source);
    f(&mut parser)
}

#[test]
fn test_expression_span_covers_operands() {
    let expr = with_parser("a + bc\n", |p| p.parse_expression().unwrap());
    let span = expr.span();
    assert_eq!((span.start, span.end), (0, 6));
}

#[test]
fn test_parenthesized_with_items_lookahead() {
    assert!(with_parser("(open(a) as f, g):\n", |p| p.parenthesized_with_items()));
    assert!(!with_parser("(a, b):\n", |p| p.parenthesized_with_items()));
    assert!(!with_parser("(open(a)) as f:\n", |p| p.parenthesized_with_items()));
}

#[test]
fn test_recover_skips_indented_block() {
    with_parser("x y\n    z\nw\n", |p| {
        p.recover();
        assert_eq!(p.peek(), &TokenKind::Ident("w".to_string()));
    });
}

#[test]
fn test_error_at_end_of_file_uses_eof_code() {
    let diag = with_parser("(", |p| {
        p.advance();
        p.advance();
        p.error_unexpected("expression")
    });
    assert_eq!(diag.code, "E0008");
}
