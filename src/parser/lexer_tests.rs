use super::*;
use std::path::PathBuf;

fn lex(source: &str) -> Vec<TokenKind> {
    let source_file = SourceFile::new(PathBuf::from("test.py"), source.to_string());
    tokenize(&source_file)
        .expect("lexing failed")
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

fn ident(name: &str) -> TokenKind {
    TokenKind::Ident(name.to_string())
}

fn string(value: &str) -> TokenKind {
    TokenKind::Str(StrLit {
        value: value.to_string(),
        bytes: false,
    })
}

#[test]
fn test_keywords_and_identifiers() {
    assert_eq!(
        lex("def foo None _x"),
        vec![
            TokenKind::Def,
            ident("foo"),
            TokenKind::NoneKw,
            ident("_x"),
            TokenKind::Newline,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_numbers() {
    assert_eq!(
        lex("1 2.5 .5 1e3 3j 0xff"),
        vec![
            TokenKind::Int("1".into()),
            TokenKind::Float("2.5".into()),
            TokenKind::Float(".5".into()),
            TokenKind::Float("1e3".into()),
            TokenKind::Imaginary("3j".into()),
            TokenKind::Int("0xff".into()),
            TokenKind::Newline,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_strings() {
    let tokens = lex("'a' \"b\" b'c' r'\\d'");
    assert_eq!(tokens[0], string("a"));
    assert_eq!(tokens[1], string("b"));
    assert_eq!(
        tokens[2],
        TokenKind::Str(StrLit {
            value: "c".into(),
            bytes: true
        })
    );
    assert_eq!(tokens[3], string("\\d"));
}

#[test]
fn test_triple_quoted_string_spans_lines() {
    let tokens = lex("x = \"\"\"one\ntwo\"\"\"\ny = 1\n");
    assert_eq!(
        tokens,
        vec![
            ident("x"),
            TokenKind::Eq,
            string("one\ntwo"),
            TokenKind::Newline,
            ident("y"),
            TokenKind::Eq,
            TokenKind::Int("1".into()),
            TokenKind::Newline,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_operators() {
    assert_eq!(
        lex("a += b ** c // d -> e := f"),
        vec![
            ident("a"),
            TokenKind::AugAssign(Operator::Add),
            ident("b"),
            TokenKind::DoubleStar,
            ident("c"),
            TokenKind::DoubleSlash,
            ident("d"),
            TokenKind::Arrow,
            ident("e"),
            TokenKind::ColonEq,
            ident("f"),
            TokenKind::Newline,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_indent_and_dedent() {
    let tokens = lex("if x:\n    y\nz\n");
    assert_eq!(
        tokens,
        vec![
            TokenKind::If,
            ident("x"),
            TokenKind::Colon,
            TokenKind::Newline,
            TokenKind::Indent,
            ident("y"),
            TokenKind::Newline,
            TokenKind::Dedent,
            ident("z"),
            TokenKind::Newline,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_dedent_at_end_of_file() {
    let tokens = lex("def f():\n    if x:\n        pass");
    let dedents = tokens
        .iter()
        .filter(|t| **t == TokenKind::Dedent)
        .count();
    assert_eq!(dedents, 2);
    assert_eq!(tokens.last(), Some(&TokenKind::Eof));
}

#[test]
fn test_blank_and_comment_lines_are_ignored() {
    let tokens = lex("x\n\n   # comment\n\ny\n");
    assert_eq!(
        tokens,
        vec![
            ident("x"),
            TokenKind::Newline,
            ident("y"),
            TokenKind::Newline,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_newlines_inside_brackets_are_joined() {
    let tokens = lex("f(a,\n  b)\n");
    assert!(!tokens[..tokens.len() - 2].contains(&TokenKind::Newline));
    assert!(!tokens.contains(&TokenKind::Indent));
}

#[test]
fn test_backslash_continuation() {
    let tokens = lex("x = 1 + \\\n    2\n");
    assert!(!tokens.contains(&TokenKind::Indent));
    assert_eq!(tokens.iter().filter(|t| **t == TokenKind::Newline).count(), 1);
}

#[test]
fn test_inconsistent_dedent_is_reported() {
    let source = SourceFile::new(
        PathBuf::from("bad.py"),
        "if x:\n        y\n    z\n".to_string(),
    );
    let errors = tokenize(&source).unwrap_err();
    assert_eq!(errors.diagnostics()[0].code, "E0004");
}

#[test]
fn test_unterminated_string_is_reported() {
    let source = SourceFile::new(PathBuf::from("bad.py"), "x = 'abc\n".to_string());
    let errors = tokenize(&source).unwrap_err();
    assert_eq!(errors.diagnostics()[0].code, "E0002");
}

#[test]
fn test_tab_indentation_width() {
    assert_eq!(indent_width("\t"), 8);
    assert_eq!(indent_width("  \t"), 8);
    assert_eq!(indent_width("    "), 4);
}
