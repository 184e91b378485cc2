//! Lexer for the analysed Python subset
//!
//! Raw tokens come from `logos`; a second pass over them tracks bracket
//! depth and line starts to synthesize `Indent`/`Dedent` tokens and drop
//! newlines that do not end a logical line.

use crate::diagnostics::{error_codes, Diagnostic, DiagnosticBag, Span};
use crate::parser::ast::Operator;
use crate::parser::span::SourceFile;
use logos::Logos;

/// A string literal with its prefix and quotes removed
#[derive(Debug, Clone, PartialEq)]
pub struct StrLit {
    pub value: String,
    pub bytes: bool,
}

/// Token types
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"([ \t\x0C]+|#[^\r\n]*|\\\r?\n)")]
pub enum TokenKind {
    // Keywords
    #[token("False")]
    FalseKw,
    #[token("None")]
    NoneKw,
    #[token("True")]
    TrueKw,
    #[token("and")]
    And,
    #[token("as")]
    As,
    #[token("assert")]
    Assert,
    #[token("async")]
    Async,
    #[token("await")]
    Await,
    #[token("break")]
    Break,
    #[token("class")]
    Class,
    #[token("continue")]
    Continue,
    #[token("def")]
    Def,
    #[token("del")]
    Del,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("except")]
    Except,
    #[token("finally")]
    Finally,
    #[token("for")]
    For,
    #[token("from")]
    From,
    #[token("global")]
    Global,
    #[token("if")]
    If,
    #[token("import")]
    Import,
    #[token("in")]
    In,
    #[token("is")]
    Is,
    #[token("lambda")]
    Lambda,
    #[token("nonlocal")]
    Nonlocal,
    #[token("not")]
    Not,
    #[token("or")]
    Or,
    #[token("pass")]
    Pass,
    #[token("raise")]
    Raise,
    #[token("return")]
    Return,
    #[token("try")]
    Try,
    #[token("while")]
    While,
    #[token("with")]
    With,
    #[token("yield")]
    Yield,

    // Literals
    #[regex(r"[0-9][0-9_]*", |lex| lex.slice().to_string())]
    #[regex(r"0[xX][0-9a-fA-F_]+", |lex| lex.slice().to_string())]
    #[regex(r"0[oO][0-7_]+", |lex| lex.slice().to_string())]
    #[regex(r"0[bB][01_]+", |lex| lex.slice().to_string())]
    Int(String),

    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9]+", |lex| lex.slice().to_string())]
    Float(String),

    #[regex(r"([0-9][0-9_]*(\.[0-9_]*)?|\.[0-9][0-9_]*)([eE][+-]?[0-9]+)?[jJ]", |lex| lex.slice().to_string())]
    Imaginary(String),

    #[regex(r#"[rRbBuUfF]?[rRbBuUfF]?"([^"\\\r\n]|\\[^\r\n]|\\\r?\n)*""#, |lex| string_literal(lex.slice()))]
    #[regex(r"[rRbBuUfF]?[rRbBuUfF]?'([^'\\\r\n]|\\[^\r\n]|\\\r?\n)*'", |lex| string_literal(lex.slice()))]
    #[regex(r#"[rRbBuUfF]?[rRbBuUfF]?""""#, triple_quoted)]
    #[regex(r"[rRbBuUfF]?[rRbBuUfF]?'''", triple_quoted)]
    Str(StrLit),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("**")]
    DoubleStar,
    #[token("/")]
    Slash,
    #[token("//")]
    DoubleSlash,
    #[token("%")]
    Percent,
    #[token("@")]
    At,
    #[token("<<")]
    LShift,
    #[token(">>")]
    RShift,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,

    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,

    #[token("=")]
    Eq,
    #[token(":=")]
    ColonEq,
    #[token("->")]
    Arrow,
    #[regex(r"(\+|-|\*\*|\*|//|/|%|@|<<|>>|&|\||\^)=", |lex| {
        let s = lex.slice();
        Operator::from_symbol(&s[..s.len() - 1])
    })]
    AugAssign(Operator),

    // Punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,
    #[token("...")]
    Ellipsis,

    // Layout
    #[regex(r"\r?\n")]
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl TokenKind {
    /// Short description used in "expected X, found Y" messages
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::Int(v) | TokenKind::Float(v) | TokenKind::Imaginary(v) => {
                format!("number '{}'", v)
            }
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Indent => "indent".to_string(),
            TokenKind::Dedent => "dedent".to_string(),
            TokenKind::Eof => "end of file".to_string(),
            other => format!("{:?}", other),
        }
    }
}

/// Split a quoted literal into its body and bytes flag
fn string_literal(slice: &str) -> StrLit {
    let quote_at = slice.find(['"', '\'']).unwrap_or(0);
    let prefix = &slice[..quote_at];
    let quoted = &slice[quote_at..];
    let quote_len = if quoted.starts_with("\"\"\"") || quoted.starts_with("'''") {
        3
    } else {
        1
    };
    let body = if quoted.len() >= quote_len * 2 {
        &quoted[quote_len..quoted.len() - quote_len]
    } else {
        ""
    };
    StrLit {
        value: body.to_string(),
        bytes: prefix.contains(['b', 'B']),
    }
}

/// Extend a triple-quote opener to the matching closer
fn triple_quoted(lex: &mut logos::Lexer<TokenKind>) -> Option<StrLit> {
    let slice = lex.slice();
    let closer = slice[slice.len() - 3..].to_string();
    let rest = lex.remainder();
    let mut end = None;
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if rest[i..].starts_with(closer.as_str()) {
            end = Some(i + closer.len());
            break;
        }
    }
    match end {
        Some(end) => {
            lex.bump(end);
            Some(string_literal(lex.slice()))
        }
        None => {
            let len = rest.len();
            lex.bump(len);
            None
        }
    }
}

/// A token with its span
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Turns source text into the token stream consumed by the parser
pub struct Lexer<'a> {
    source: &'a SourceFile,
    tokens: Vec<Token>,
    indents: Vec<usize>,
    depth: usize,
    at_line_start: bool,
    diagnostics: DiagnosticBag,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source file
    pub fn new(source: &'a SourceFile) -> Self {
        Self {
            source,
            tokens: Vec::new(),
            indents: vec![0],
            depth: 0,
            at_line_start: true,
            diagnostics: DiagnosticBag::new(),
        }
    }

    /// Produce the full token stream, ending in `Eof`
    pub fn tokenize(mut self) -> Result<Vec<Token>, DiagnosticBag> {
        let source = self.source;
        let mut raw = TokenKind::lexer(source.content());

        while let Some(result) = raw.next() {
            let range = raw.span();
            let span = source.span(range.start, range.end);
            match result {
                Ok(TokenKind::Newline) => {
                    if self.depth == 0 && !self.at_line_start {
                        self.tokens.push(Token::new(TokenKind::Newline, span));
                        self.at_line_start = true;
                    }
                }
                Ok(kind) => {
                    if self.at_line_start {
                        self.indent_to(range.start, &span);
                        self.at_line_start = false;
                    }
                    match kind {
                        TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                            self.depth += 1
                        }
                        TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                            self.depth = self.depth.saturating_sub(1)
                        }
                        _ => {}
                    }
                    self.tokens.push(Token::new(kind, span));
                }
                Err(()) => {
                    let slice = raw.slice();
                    let diagnostic = if slice.contains(['"', '\'']) {
                        Diagnostic::error(error_codes::syntax::UNTERMINATED_STRING)
                            .message("Unterminated string literal")
                    } else {
                        Diagnostic::error(error_codes::syntax::UNEXPECTED_TOKEN)
                            .message(format!("Unexpected character: {:?}", slice))
                    };
                    self.diagnostics.push(diagnostic.span(span).build());
                    self.at_line_start = false;
                }
            }
        }

        let eof = source.eof_span();
        if !self.at_line_start {
            self.tokens.push(Token::new(TokenKind::Newline, eof.clone()));
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.tokens.push(Token::new(TokenKind::Dedent, eof.clone()));
        }
        self.tokens.push(Token::new(TokenKind::Eof, eof));

        if self.diagnostics.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.diagnostics)
        }
    }

    /// Emit layout tokens for the first token of a logical line
    fn indent_to(&mut self, offset: usize, span: &Span) {
        let source = self.source;
        let content = source.content();
        let line_start = content[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let width = indent_width(&content[line_start..offset]);
        let current = self.current_indent();

        if width > current {
            self.indents.push(width);
            self.tokens.push(Token::new(
                TokenKind::Indent,
                source.span(line_start, offset),
            ));
        } else if width < current {
            while width < self.current_indent() {
                self.indents.pop();
                self.tokens.push(Token::new(TokenKind::Dedent, span.clone()));
            }
            if width != self.current_indent() {
                self.diagnostics.push(
                    Diagnostic::error(error_codes::syntax::INCONSISTENT_DEDENT)
                        .message("Unindent does not match any outer indentation level")
                        .span(span.clone())
                        .build(),
                );
            }
        }
    }

    fn current_indent(&self) -> usize {
        self.indents.last().copied().unwrap_or(0)
    }
}

/// Column width of leading whitespace; tabs advance to the next multiple of 8
fn indent_width(prefix: &str) -> usize {
    prefix.chars().fold(0, |width, c| match c {
        '\t' => (width / 8 + 1) * 8,
        '\x0C' => 0,
        _ => width + 1,
    })
}

/// Tokenize a whole source file
pub fn tokenize(source: &SourceFile) -> Result<Vec<Token>, DiagnosticBag> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
#[path = "lexer_tests.rs"]
mod tests;
