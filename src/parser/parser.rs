//! Recursive descent parser for the analysed Python subset
#![allow(clippy::result_large_err)]

use crate::diagnostics::{error_codes::syntax, Diagnostic, DiagnosticBag, Span};
use crate::parser::ast::*;
use crate::parser::lexer::{Token, TokenKind};
use crate::parser::span::SourceFile;
use std::rc::Rc;

type PResult<T> = Result<T, Diagnostic>;

/// Parser over a complete token stream
pub struct Parser<'a> {
    source: &'a SourceFile,
    tokens: Vec<Token>,
    pos: usize,
    eof: Token,
    last_span: Span,
    errors: DiagnosticBag,
}

impl<'a> Parser<'a> {
    /// Create a new parser
    pub fn new(tokens: Vec<Token>, source: &'a SourceFile) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            eof: Token::new(TokenKind::Eof, source.eof_span()),
            last_span: source.span(0, 0),
            errors: DiagnosticBag::new(),
        }
    }

    /// Parse a complete module
    pub fn parse_module(&mut self) -> Result<Module, DiagnosticBag> {
        let body = self.parse_statements(&TokenKind::Eof);

        if !self.errors.is_empty() {
            return Err(std::mem::take(&mut self.errors));
        }

        Ok(Module {
            span: self.source.span(0, self.source.content().len()),
            file: self.source.path().to_path_buf(),
            body,
        })
    }

    fn parse_statements(&mut self, end: &TokenKind) -> Vec<Stmt> {
        let mut body = Vec::new();
        while !self.check(end) && !self.check(&TokenKind::Eof) {
            if self.eat(&TokenKind::Newline) {
                continue;
            }
            let before = self.pos;
            match self.parse_statement() {
                Ok(mut stmts) => body.append(&mut stmts),
                Err(diag) => {
                    self.errors.push(diag);
                    self.recover();
                    if self.pos == before {
                        self.advance();
                    }
                }
            }
        }
        body
    }

    // Statements

    fn parse_statement(&mut self) -> PResult<Vec<Stmt>> {
        let stmt = match self.peek() {
            TokenKind::Def => self.parse_function_def(Vec::new())?,
            TokenKind::Class => self.parse_class_def(Vec::new())?,
            TokenKind::At => self.parse_decorated()?,
            TokenKind::Async => match self.peek_at(1) {
                TokenKind::Def => self.parse_function_def(Vec::new())?,
                TokenKind::For => self.parse_for()?,
                TokenKind::With => self.parse_with()?,
                _ => {
                    self.advance();
                    return Err(self.error_unexpected("'def', 'for' or 'with' after 'async'"));
                }
            },
            TokenKind::If => self.parse_if()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Try => self.parse_try()?,
            TokenKind::With => self.parse_with()?,
            TokenKind::Indent => {
                return Err(Diagnostic::error(syntax::UNEXPECTED_INDENT)
                    .message("Unexpected indent")
                    .span(self.current_span())
                    .build())
            }
            _ => return self.parse_simple_statements(),
        };
        Ok(vec![stmt])
    }

    /// `:` followed by an indented block or a one-line suite
    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(&TokenKind::Colon, "':'")?;
        if !self.eat(&TokenKind::Newline) {
            return self.parse_simple_statements();
        }
        if !self.eat(&TokenKind::Indent) {
            return Err(self.error_unexpected("an indented block"));
        }
        let body = self.parse_statements(&TokenKind::Dedent);
        self.eat(&TokenKind::Dedent);
        Ok(body)
    }

    fn parse_simple_statements(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = vec![self.parse_small_statement()?];
        while self.eat(&TokenKind::Semicolon) {
            if self.check(&TokenKind::Newline) || self.check(&TokenKind::Eof) {
                break;
            }
            stmts.push(self.parse_small_statement()?);
        }
        if !self.check(&TokenKind::Eof) {
            self.expect(&TokenKind::Newline, "end of line")?;
        }
        Ok(stmts)
    }

    fn parse_small_statement(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        match self.peek() {
            TokenKind::Pass => {
                self.advance();
                Ok(Stmt::Pass { span: start })
            }
            TokenKind::Break => {
                self.advance();
                Ok(Stmt::Break { span: start })
            }
            TokenKind::Continue => {
                self.advance();
                Ok(Stmt::Continue { span: start })
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.at_expression_start() {
                    Some(self.parse_star_expressions()?)
                } else {
                    None
                };
                Ok(Stmt::Return {
                    span: self.finish(&start),
                    value,
                })
            }
            TokenKind::Raise => {
                self.advance();
                let exc = if self.at_expression_start() {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                let cause = if exc.is_some() && self.eat(&TokenKind::From) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                Ok(Stmt::Raise {
                    span: self.finish(&start),
                    exc,
                    cause,
                })
            }
            TokenKind::Global | TokenKind::Nonlocal => {
                let is_global = self.check(&TokenKind::Global);
                self.advance();
                let mut names = vec![self.expect_ident()?];
                while self.eat(&TokenKind::Comma) {
                    names.push(self.expect_ident()?);
                }
                let span = self.finish(&start);
                Ok(if is_global {
                    Stmt::Global { span, names }
                } else {
                    Stmt::Nonlocal { span, names }
                })
            }
            TokenKind::Del => {
                self.advance();
                let targets = match self.parse_star_expressions()? {
                    Expr::Tuple { elts, .. } => elts,
                    target => vec![target],
                };
                for target in &targets {
                    self.check_target(target)?;
                }
                Ok(Stmt::Delete {
                    span: self.finish(&start),
                    targets,
                })
            }
            TokenKind::Assert => {
                self.advance();
                let test = self.parse_expression()?;
                let msg = if self.eat(&TokenKind::Comma) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                Ok(Stmt::Assert {
                    span: self.finish(&start),
                    test,
                    msg,
                })
            }
            TokenKind::Import => self.parse_import(),
            TokenKind::From => self.parse_from_import(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_expression_statement(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        let first = self.parse_yield_or_star_expressions()?;

        match self.peek().clone() {
            TokenKind::Colon => {
                self.advance();
                self.check_target(&first)?;
                let annotation = self.parse_expression()?;
                let value = if self.eat(&TokenKind::Eq) {
                    Some(self.parse_yield_or_star_expressions()?)
                } else {
                    None
                };
                Ok(Stmt::AnnAssign {
                    span: self.finish(&start),
                    target: first,
                    annotation,
                    value,
                })
            }
            TokenKind::AugAssign(op) => {
                self.advance();
                self.check_target(&first)?;
                let value = self.parse_yield_or_star_expressions()?;
                Ok(Stmt::AugAssign {
                    span: self.finish(&start),
                    target: first,
                    op,
                    value,
                })
            }
            TokenKind::Eq => {
                let mut targets = Vec::new();
                let mut value = first;
                while self.eat(&TokenKind::Eq) {
                    self.check_target(&value)?;
                    targets.push(value);
                    value = self.parse_yield_or_star_expressions()?;
                }
                Ok(Stmt::Assign {
                    span: self.finish(&start),
                    targets,
                    value,
                })
            }
            _ => Ok(Stmt::Expr {
                span: self.finish(&start),
                value: first,
            }),
        }
    }

    fn check_target(&self, target: &Expr) -> PResult<()> {
        if target.is_assignable() {
            Ok(())
        } else {
            Err(Diagnostic::error(syntax::INVALID_TARGET)
                .message("Cannot assign to expression")
                .span(target.span().clone())
                .build())
        }
    }

    fn parse_import(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        self.advance();
        let mut names = Vec::new();
        loop {
            let alias_start = self.current_span();
            let name = self.parse_dotted_name()?;
            let asname = if self.eat(&TokenKind::As) {
                Some(self.expect_ident()?)
            } else {
                None
            };
            names.push(Alias {
                span: self.finish(&alias_start),
                name,
                asname,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(Stmt::Import {
            span: self.finish(&start),
            names,
        })
    }

    fn parse_from_import(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        self.advance();

        let mut level = 0;
        loop {
            if self.eat(&TokenKind::Dot) {
                level += 1;
            } else if self.eat(&TokenKind::Ellipsis) {
                level += 3;
            } else {
                break;
            }
        }
        let module = if level > 0 && self.check(&TokenKind::Import) {
            Vec::new()
        } else {
            self.parse_dotted_name()?
        };
        self.expect(&TokenKind::Import, "'import'")?;

        let names = if self.check(&TokenKind::Star) {
            ImportNames::Star(self.advance().span)
        } else {
            let parenthesized = self.eat(&TokenKind::LParen);
            let mut aliases = Vec::new();
            loop {
                if parenthesized && self.check(&TokenKind::RParen) {
                    break;
                }
                let alias_start = self.current_span();
                let name = self.expect_ident()?;
                let asname = if self.eat(&TokenKind::As) {
                    Some(self.expect_ident()?)
                } else {
                    None
                };
                aliases.push(Alias {
                    span: self.finish(&alias_start),
                    name: vec![name],
                    asname,
                });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            if parenthesized {
                self.expect(&TokenKind::RParen, "')'")?;
            }
            if aliases.is_empty() {
                return Err(self.error_unexpected("imported name"));
            }
            ImportNames::Names(aliases)
        };

        Ok(Stmt::ImportFrom {
            span: self.finish(&start),
            module,
            level,
            names,
        })
    }

    fn parse_dotted_name(&mut self) -> PResult<Vec<Ident>> {
        let mut segments = vec![self.expect_ident()?];
        while self.eat(&TokenKind::Dot) {
            segments.push(self.expect_ident()?);
        }
        Ok(segments)
    }

    fn parse_decorated(&mut self) -> PResult<Stmt> {
        let mut decorators = Vec::new();
        while self.eat(&TokenKind::At) {
            decorators.push(self.parse_named_expression()?);
            self.expect(&TokenKind::Newline, "end of line after decorator")?;
        }
        match self.peek() {
            TokenKind::Def | TokenKind::Async => self.parse_function_def(decorators),
            TokenKind::Class => self.parse_class_def(decorators),
            _ => Err(self.error_unexpected("function or class definition")),
        }
    }

    fn parse_function_def(&mut self, decorators: Vec<Expr>) -> PResult<Stmt> {
        let start = self.current_span();
        let is_async = self.eat(&TokenKind::Async);
        self.expect(&TokenKind::Def, "'def'")?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::LParen, "'('")?;
        let params = self.parse_params(&TokenKind::RParen, true)?;
        self.expect(&TokenKind::RParen, "')'")?;
        let returns = if self.eat(&TokenKind::Arrow) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        let header = self.finish(&start);
        let body = self.parse_block()?;

        Ok(Stmt::FunctionDef(Rc::new(FunctionDef {
            span: header,
            name,
            params,
            body,
            decorators,
            returns,
            is_async,
        })))
    }

    /// Parameters up to (not including) `close`
    fn parse_params(&mut self, close: &TokenKind, annotations: bool) -> PResult<Vec<Param>> {
        let mut params = Vec::new();
        let mut keyword_only = false;

        while !self.check(close) {
            if self.eat(&TokenKind::Slash) {
                // positional-only marker
            } else if self.eat(&TokenKind::DoubleStar) {
                let name = self.expect_ident()?;
                let annotation = self.parse_annotation(annotations)?;
                params.push(Param {
                    name,
                    kind: ParamKind::KwArgs,
                    default: None,
                    annotation,
                });
            } else if self.eat(&TokenKind::Star) {
                keyword_only = true;
                if matches!(self.peek(), TokenKind::Ident(_)) {
                    let name = self.expect_ident()?;
                    let annotation = self.parse_annotation(annotations)?;
                    params.push(Param {
                        name,
                        kind: ParamKind::VarArgs,
                        default: None,
                        annotation,
                    });
                }
            } else {
                let name = self.expect_ident()?;
                let annotation = self.parse_annotation(annotations)?;
                let default = if self.eat(&TokenKind::Eq) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                params.push(Param {
                    name,
                    kind: if keyword_only {
                        ParamKind::KeywordOnly
                    } else {
                        ParamKind::Positional
                    },
                    default,
                    annotation,
                });
            }

            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_annotation(&mut self, allowed: bool) -> PResult<Option<Expr>> {
        if allowed && self.eat(&TokenKind::Colon) {
            Ok(Some(self.parse_expression()?))
        } else {
            Ok(None)
        }
    }

    fn parse_class_def(&mut self, decorators: Vec<Expr>) -> PResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::Class, "'class'")?;
        let name = self.expect_ident()?;

        let mut bases = Vec::new();
        let mut keywords = Vec::new();
        if self.eat(&TokenKind::LParen) {
            for arg in self.parse_call_args()? {
                match arg {
                    Arg::Positional(base) | Arg::Star(base) => bases.push(base),
                    Arg::Keyword { name, value } => keywords.push(Keyword { name, value }),
                    Arg::DoubleStar(_) => {}
                }
            }
        }
        let header = self.finish(&start);
        let body = self.parse_block()?;

        Ok(Stmt::ClassDef(Rc::new(ClassDef {
            span: header,
            name,
            bases,
            keywords,
            body,
            decorators,
        })))
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        // `if` or `elif`
        self.advance();
        let test = self.parse_named_expression()?;
        let body = self.parse_block()?;
        let orelse = match self.peek() {
            TokenKind::Elif => vec![self.parse_if()?],
            TokenKind::Else => {
                self.advance();
                self.parse_block()?
            }
            _ => Vec::new(),
        };
        Ok(Stmt::If {
            span: self.finish(&start),
            test,
            body,
            orelse,
        })
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        self.advance();
        let test = self.parse_named_expression()?;
        let body = self.parse_block()?;
        let orelse = self.parse_else_block()?;
        Ok(Stmt::While {
            span: self.finish(&start),
            test,
            body,
            orelse,
        })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        let is_async = self.eat(&TokenKind::Async);
        self.expect(&TokenKind::For, "'for'")?;
        let target = self.parse_target_list()?;
        self.expect(&TokenKind::In, "'in'")?;
        let iter = self.parse_star_expressions()?;
        let body = self.parse_block()?;
        let orelse = self.parse_else_block()?;
        Ok(Stmt::For {
            span: self.finish(&start),
            target,
            iter,
            body,
            orelse,
            is_async,
        })
    }

    fn parse_else_block(&mut self) -> PResult<Vec<Stmt>> {
        if self.eat(&TokenKind::Else) {
            self.parse_block()
        } else {
            Ok(Vec::new())
        }
    }

    fn parse_try(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        self.advance();
        let body = self.parse_block()?;

        let mut handlers = Vec::new();
        while self.check(&TokenKind::Except) {
            let handler_start = self.current_span();
            self.advance();
            self.eat(&TokenKind::Star);
            let (ty, name) = if self.check(&TokenKind::Colon) {
                (None, None)
            } else {
                let ty = self.parse_expression()?;
                let name = if self.eat(&TokenKind::As) {
                    Some(self.expect_ident()?)
                } else {
                    None
                };
                (Some(ty), name)
            };
            let span = self.finish(&handler_start);
            let body = self.parse_block()?;
            handlers.push(ExceptHandler {
                span,
                ty,
                name,
                body,
            });
        }

        let orelse = self.parse_else_block()?;
        let finalbody = if self.eat(&TokenKind::Finally) {
            self.parse_block()?
        } else {
            Vec::new()
        };
        if handlers.is_empty() && finalbody.is_empty() {
            return Err(self.error_unexpected("'except' or 'finally'"));
        }

        Ok(Stmt::Try {
            span: self.finish(&start),
            body,
            handlers,
            orelse,
            finalbody,
        })
    }

    fn parse_with(&mut self) -> PResult<Stmt> {
        let start = self.current_span();
        let is_async = self.eat(&TokenKind::Async);
        self.expect(&TokenKind::With, "'with'")?;

        let parenthesized = self.check(&TokenKind::LParen) && self.parenthesized_with_items();
        if parenthesized {
            self.advance();
        }
        let mut items = Vec::new();
        loop {
            if parenthesized && self.check(&TokenKind::RParen) {
                break;
            }
            let context = self.parse_expression()?;
            let target = if self.eat(&TokenKind::As) {
                let target = self.parse_star_target()?;
                self.check_target(&target)?;
                Some(target)
            } else {
                None
            };
            items.push(WithItem { context, target });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        if parenthesized {
            self.expect(&TokenKind::RParen, "')'")?;
        }

        let body = self.parse_block()?;
        Ok(Stmt::With {
            span: self.finish(&start),
            items,
            body,
            is_async,
        })
    }

    /// True when the `(` after `with` opens a list of `as` items
    fn parenthesized_with_items(&self) -> bool {
        let mut depth = 0usize;
        for token in &self.tokens[self.pos.min(self.tokens.len())..] {
            match token.kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return false;
                    }
                }
                TokenKind::As if depth == 1 => return true,
                TokenKind::Newline | TokenKind::Eof => return false,
                _ => {}
            }
        }
        false
    }

    // Targets

    fn parse_target_list(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        let first = self.parse_star_target()?;
        if !self.check(&TokenKind::Comma) {
            self.check_target(&first)?;
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.check(&TokenKind::In) || self.check(&TokenKind::Eq) {
                break;
            }
            elts.push(self.parse_star_target()?);
        }
        let target = Expr::Tuple {
            span: self.finish(&start),
            elts,
        };
        self.check_target(&target)?;
        Ok(target)
    }

    fn parse_star_target(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        if self.eat(&TokenKind::Star) {
            let value = self.parse_bitor()?;
            return Ok(Expr::Starred {
                span: self.finish(&start),
                value: Box::new(value),
            });
        }
        self.parse_bitor()
    }

    // Expressions

    fn parse_yield_or_star_expressions(&mut self) -> PResult<Expr> {
        if self.check(&TokenKind::Yield) {
            self.parse_yield()
        } else {
            self.parse_star_expressions()
        }
    }

    fn parse_yield(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        self.expect(&TokenKind::Yield, "'yield'")?;
        if self.eat(&TokenKind::From) {
            let value = self.parse_expression()?;
            return Ok(Expr::YieldFrom {
                span: self.finish(&start),
                value: Box::new(value),
            });
        }
        let value = if self.at_expression_start() {
            Some(Box::new(self.parse_star_expressions()?))
        } else {
            None
        };
        Ok(Expr::Yield {
            span: self.finish(&start),
            value,
        })
    }

    /// Comma separated expressions; more than one forms a tuple
    fn parse_star_expressions(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        let first = self.parse_star_or_named()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat(&TokenKind::Comma) {
            if !self.at_expression_start() {
                break;
            }
            elts.push(self.parse_star_or_named()?);
        }
        Ok(Expr::Tuple {
            span: self.finish(&start),
            elts,
        })
    }

    fn parse_star_or_named(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        if self.eat(&TokenKind::Star) {
            let value = self.parse_bitor()?;
            return Ok(Expr::Starred {
                span: self.finish(&start),
                value: Box::new(value),
            });
        }
        self.parse_named_expression()
    }

    fn parse_named_expression(&mut self) -> PResult<Expr> {
        if matches!(self.peek(), TokenKind::Ident(_))
            && matches!(self.peek_at(1), TokenKind::ColonEq)
        {
            let start = self.current_span();
            let target = self.expect_ident()?;
            self.advance();
            let value = self.parse_expression()?;
            return Ok(Expr::NamedExpr {
                span: self.finish(&start),
                target,
                value: Box::new(value),
            });
        }
        self.parse_expression()
    }

    /// Conditional expression or lambda
    fn parse_expression(&mut self) -> PResult<Expr> {
        if self.check(&TokenKind::Lambda) {
            return self.parse_lambda();
        }
        let start = self.current_span();
        let body = self.parse_or_test()?;
        if !self.eat(&TokenKind::If) {
            return Ok(body);
        }
        let test = self.parse_or_test()?;
        self.expect(&TokenKind::Else, "'else'")?;
        let orelse = self.parse_expression()?;
        Ok(Expr::IfExp {
            span: self.finish(&start),
            test: Box::new(test),
            body: Box::new(body),
            orelse: Box::new(orelse),
        })
    }

    fn parse_lambda(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        let keyword = self.advance();
        let params = self.parse_params(&TokenKind::Colon, false)?;
        self.expect(&TokenKind::Colon, "':'")?;
        let body = self.parse_expression()?;
        let span = self.finish(&start);

        let def = FunctionDef {
            span: span.clone(),
            name: Ident {
                name: FunctionDef::LAMBDA.to_string(),
                span: keyword.span,
            },
            params,
            body: vec![Stmt::Return {
                span: body.span().clone(),
                value: Some(body),
            }],
            decorators: Vec::new(),
            returns: None,
            is_async: false,
        };
        Ok(Expr::Lambda {
            span,
            def: Rc::new(def),
        })
    }

    fn parse_or_test(&mut self) -> PResult<Expr> {
        self.parse_bool_op(TokenKind::Or, BoolOperator::Or, Self::parse_and_test)
    }

    fn parse_and_test(&mut self) -> PResult<Expr> {
        self.parse_bool_op(TokenKind::And, BoolOperator::And, Self::parse_not_test)
    }

    fn parse_bool_op(
        &mut self,
        token: TokenKind,
        op: BoolOperator,
        next: fn(&mut Self) -> PResult<Expr>,
    ) -> PResult<Expr> {
        let start = self.current_span();
        let first = next(self)?;
        if !self.check(&token) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat(&token) {
            values.push(next(self)?);
        }
        Ok(Expr::BoolOp {
            span: self.finish(&start),
            op,
            values,
        })
    }

    fn parse_not_test(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        if self.eat(&TokenKind::Not) {
            let operand = self.parse_not_test()?;
            return Ok(Expr::UnaryOp {
                span: self.finish(&start),
                op: UnaryOperator::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        let left = self.parse_bitor()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();

        loop {
            let op = match self.peek() {
                TokenKind::Lt => CmpOperator::Lt,
                TokenKind::Gt => CmpOperator::Gt,
                TokenKind::LtEq => CmpOperator::LtE,
                TokenKind::GtEq => CmpOperator::GtE,
                TokenKind::EqEq => CmpOperator::Eq,
                TokenKind::NotEq => CmpOperator::NotEq,
                TokenKind::In => CmpOperator::In,
                TokenKind::Not if matches!(self.peek_at(1), TokenKind::In) => CmpOperator::NotIn,
                TokenKind::Is if matches!(self.peek_at(1), TokenKind::Not) => CmpOperator::IsNot,
                TokenKind::Is => CmpOperator::Is,
                _ => break,
            };
            self.advance();
            if matches!(op, CmpOperator::NotIn | CmpOperator::IsNot) {
                self.advance();
            }
            ops.push(op);
            comparators.push(self.parse_bitor()?);
        }

        if ops.is_empty() {
            return Ok(left);
        }
        Ok(Expr::Compare {
            span: self.finish(&start),
            left: Box::new(left),
            ops,
            comparators,
        })
    }

    fn parse_binary(
        &mut self,
        next: fn(&mut Self) -> PResult<Expr>,
        ops: &[(TokenKind, Operator)],
    ) -> PResult<Expr> {
        let start = self.current_span();
        let mut left = next(self)?;
        loop {
            let op = match ops.iter().find(|(token, _)| self.check(token)) {
                Some((_, op)) => *op,
                None => break,
            };
            self.advance();
            let right = next(self)?;
            left = Expr::BinOp {
                span: self.finish(&start),
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_bitor(&mut self) -> PResult<Expr> {
        self.parse_binary(Self::parse_bitxor, &[(TokenKind::Pipe, Operator::BitOr)])
    }

    fn parse_bitxor(&mut self) -> PResult<Expr> {
        self.parse_binary(Self::parse_bitand, &[(TokenKind::Caret, Operator::BitXor)])
    }

    fn parse_bitand(&mut self) -> PResult<Expr> {
        self.parse_binary(Self::parse_shift, &[(TokenKind::Amp, Operator::BitAnd)])
    }

    fn parse_shift(&mut self) -> PResult<Expr> {
        self.parse_binary(
            Self::parse_arith,
            &[
                (TokenKind::LShift, Operator::LShift),
                (TokenKind::RShift, Operator::RShift),
            ],
        )
    }

    fn parse_arith(&mut self) -> PResult<Expr> {
        self.parse_binary(
            Self::parse_term,
            &[
                (TokenKind::Plus, Operator::Add),
                (TokenKind::Minus, Operator::Sub),
            ],
        )
    }

    fn parse_term(&mut self) -> PResult<Expr> {
        self.parse_binary(
            Self::parse_factor,
            &[
                (TokenKind::Star, Operator::Mult),
                (TokenKind::Slash, Operator::Div),
                (TokenKind::DoubleSlash, Operator::FloorDiv),
                (TokenKind::Percent, Operator::Mod),
                (TokenKind::At, Operator::MatMult),
            ],
        )
    }

    fn parse_factor(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        let op = match self.peek() {
            TokenKind::Minus => UnaryOperator::Neg,
            TokenKind::Plus => UnaryOperator::Pos,
            TokenKind::Tilde => UnaryOperator::Invert,
            _ => return self.parse_power(),
        };
        self.advance();
        let operand = self.parse_factor()?;
        Ok(Expr::UnaryOp {
            span: self.finish(&start),
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_power(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        let base = self.parse_await()?;
        if !self.eat(&TokenKind::DoubleStar) {
            return Ok(base);
        }
        let exponent = self.parse_factor()?;
        Ok(Expr::BinOp {
            span: self.finish(&start),
            left: Box::new(base),
            op: Operator::Pow,
            right: Box::new(exponent),
        })
    }

    fn parse_await(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        if !self.eat(&TokenKind::Await) {
            return self.parse_primary();
        }
        let value = self.parse_primary()?;
        Ok(Expr::Await {
            span: self.finish(&start),
            value: Box::new(value),
        })
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        let mut expr = self.parse_atom()?;
        loop {
            if self.eat(&TokenKind::Dot) {
                let attr = self.expect_ident()?;
                expr = Expr::Attribute {
                    span: self.finish(&start),
                    value: Box::new(expr),
                    attr,
                };
            } else if self.eat(&TokenKind::LParen) {
                let args = self.parse_call_args()?;
                expr = Expr::Call {
                    span: self.finish(&start),
                    func: Box::new(expr),
                    args,
                };
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.parse_subscript()?;
                self.expect(&TokenKind::RBracket, "']'")?;
                expr = Expr::Subscript {
                    span: self.finish(&start),
                    value: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Arguments after `(`, consuming the closing `)`
    fn parse_call_args(&mut self) -> PResult<Vec<Arg>> {
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let arg = if self.eat(&TokenKind::Star) {
                Arg::Star(self.parse_expression()?)
            } else if self.eat(&TokenKind::DoubleStar) {
                Arg::DoubleStar(self.parse_expression()?)
            } else if matches!(self.peek(), TokenKind::Ident(_))
                && matches!(self.peek_at(1), TokenKind::Eq)
            {
                let name = self.expect_ident()?;
                self.advance();
                Arg::Keyword {
                    name,
                    value: self.parse_expression()?,
                }
            } else {
                let start = self.current_span();
                let value = self.parse_named_expression()?;
                if self.at_comprehension() {
                    let generators = self.parse_comprehension_clauses()?;
                    Arg::Positional(Expr::GeneratorExp {
                        span: self.finish(&start),
                        elt: Box::new(value),
                        generators,
                    })
                } else {
                    Arg::Positional(value)
                }
            };
            args.push(arg);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(args)
    }

    fn parse_subscript(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        let first = self.parse_slice_item()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.check(&TokenKind::RBracket) {
                break;
            }
            elts.push(self.parse_slice_item()?);
        }
        Ok(Expr::Tuple {
            span: self.finish(&start),
            elts,
        })
    }

    fn parse_slice_item(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        let lower = if self.check(&TokenKind::Colon) {
            None
        } else {
            let expr = self.parse_star_or_named()?;
            if !self.check(&TokenKind::Colon) {
                return Ok(expr);
            }
            Some(Box::new(expr))
        };
        self.expect(&TokenKind::Colon, "':'")?;
        let upper = if self.at_slice_end() {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        let step = if self.eat(&TokenKind::Colon) && !self.at_slice_end() {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        Ok(Expr::Slice {
            span: self.finish(&start),
            lower,
            upper,
            step,
        })
    }

    fn at_slice_end(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Colon | TokenKind::Comma | TokenKind::RBracket
        )
    }

    fn parse_atom(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        let expr = match self.peek().clone() {
            TokenKind::Ident(id) => {
                self.advance();
                Expr::Name { span: start, id }
            }
            TokenKind::Int(value) => {
                self.advance();
                Expr::Int { span: start, value }
            }
            TokenKind::Float(value) => {
                self.advance();
                Expr::Float { span: start, value }
            }
            TokenKind::Imaginary(value) => {
                self.advance();
                Expr::Imaginary { span: start, value }
            }
            TokenKind::Str(lit) => {
                self.advance();
                let mut value = lit.value;
                // implicit concatenation of adjacent literals
                while let TokenKind::Str(next) = self.peek().clone() {
                    self.advance();
                    value.push_str(&next.value);
                }
                let span = self.finish(&start);
                if lit.bytes {
                    Expr::Bytes { span, value }
                } else {
                    Expr::Str { span, value }
                }
            }
            TokenKind::TrueKw | TokenKind::FalseKw => {
                let value = self.check(&TokenKind::TrueKw);
                self.advance();
                Expr::Bool { span: start, value }
            }
            TokenKind::NoneKw => {
                self.advance();
                Expr::NoneLit { span: start }
            }
            TokenKind::Ellipsis => {
                self.advance();
                Expr::Ellipsis { span: start }
            }
            TokenKind::LParen => self.parse_paren()?,
            TokenKind::LBracket => self.parse_list_display()?,
            TokenKind::LBrace => self.parse_brace_display()?,
            _ => return Err(self.error_unexpected("expression")),
        };
        Ok(expr)
    }

    fn parse_paren(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        self.advance();
        if self.eat(&TokenKind::RParen) {
            return Ok(Expr::Tuple {
                span: self.finish(&start),
                elts: Vec::new(),
            });
        }
        if self.check(&TokenKind::Yield) {
            let value = self.parse_yield()?;
            self.expect(&TokenKind::RParen, "')'")?;
            return Ok(value);
        }

        let first = self.parse_star_or_named()?;
        if self.at_comprehension() {
            let generators = self.parse_comprehension_clauses()?;
            self.expect(&TokenKind::RParen, "')'")?;
            return Ok(Expr::GeneratorExp {
                span: self.finish(&start),
                elt: Box::new(first),
                generators,
            });
        }
        if !self.check(&TokenKind::Comma) {
            self.expect(&TokenKind::RParen, "')'")?;
            return Ok(first);
        }

        let mut elts = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.check(&TokenKind::RParen) {
                break;
            }
            elts.push(self.parse_star_or_named()?);
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(Expr::Tuple {
            span: self.finish(&start),
            elts,
        })
    }

    fn parse_list_display(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        self.advance();
        if self.eat(&TokenKind::RBracket) {
            return Ok(Expr::List {
                span: self.finish(&start),
                elts: Vec::new(),
            });
        }

        let first = self.parse_star_or_named()?;
        if self.at_comprehension() {
            let generators = self.parse_comprehension_clauses()?;
            self.expect(&TokenKind::RBracket, "']'")?;
            return Ok(Expr::ListComp {
                span: self.finish(&start),
                elt: Box::new(first),
                generators,
            });
        }

        let mut elts = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.check(&TokenKind::RBracket) {
                break;
            }
            elts.push(self.parse_star_or_named()?);
        }
        self.expect(&TokenKind::RBracket, "']'")?;
        Ok(Expr::List {
            span: self.finish(&start),
            elts,
        })
    }

    fn parse_brace_display(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        self.advance();
        if self.eat(&TokenKind::RBrace) {
            return Ok(Expr::Dict {
                span: self.finish(&start),
                items: Vec::new(),
            });
        }

        if self.eat(&TokenKind::DoubleStar) {
            let value = self.parse_bitor()?;
            return self.parse_dict_rest(start, DictItem { key: None, value });
        }

        let first = self.parse_star_or_named()?;
        if self.eat(&TokenKind::Colon) {
            let value = self.parse_expression()?;
            if self.at_comprehension() {
                let generators = self.parse_comprehension_clauses()?;
                self.expect(&TokenKind::RBrace, "'}'")?;
                return Ok(Expr::DictComp {
                    span: self.finish(&start),
                    key: Box::new(first),
                    value: Box::new(value),
                    generators,
                });
            }
            return self.parse_dict_rest(
                start,
                DictItem {
                    key: Some(first),
                    value,
                },
            );
        }

        if self.at_comprehension() {
            let generators = self.parse_comprehension_clauses()?;
            self.expect(&TokenKind::RBrace, "'}'")?;
            return Ok(Expr::SetComp {
                span: self.finish(&start),
                elt: Box::new(first),
                generators,
            });
        }

        let mut elts = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.check(&TokenKind::RBrace) {
                break;
            }
            elts.push(self.parse_star_or_named()?);
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(Expr::Set {
            span: self.finish(&start),
            elts,
        })
    }

    fn parse_dict_rest(&mut self, start: Span, first: DictItem) -> PResult<Expr> {
        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.check(&TokenKind::RBrace) {
                break;
            }
            if self.eat(&TokenKind::DoubleStar) {
                let value = self.parse_bitor()?;
                items.push(DictItem { key: None, value });
            } else {
                let key = self.parse_expression()?;
                self.expect(&TokenKind::Colon, "':'")?;
                let value = self.parse_expression()?;
                items.push(DictItem {
                    key: Some(key),
                    value,
                });
            }
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(Expr::Dict {
            span: self.finish(&start),
            items,
        })
    }

    fn at_comprehension(&self) -> bool {
        self.check(&TokenKind::For)
            || (self.check(&TokenKind::Async) && matches!(self.peek_at(1), TokenKind::For))
    }

    fn parse_comprehension_clauses(&mut self) -> PResult<Vec<Comprehension>> {
        let mut generators = Vec::new();
        while self.at_comprehension() {
            let is_async = self.eat(&TokenKind::Async);
            self.expect(&TokenKind::For, "'for'")?;
            let target = self.parse_target_list()?;
            self.expect(&TokenKind::In, "'in'")?;
            let iter = self.parse_or_test()?;
            let mut ifs = Vec::new();
            while self.eat(&TokenKind::If) {
                ifs.push(self.parse_or_test()?);
            }
            generators.push(Comprehension {
                target,
                iter,
                ifs,
                is_async,
            });
        }
        Ok(generators)
    }

    fn at_expression_start(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Ident(_)
                | TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::Imaginary(_)
                | TokenKind::Str(_)
                | TokenKind::TrueKw
                | TokenKind::FalseKw
                | TokenKind::NoneKw
                | TokenKind::Ellipsis
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::LBrace
                | TokenKind::Minus
                | TokenKind::Plus
                | TokenKind::Tilde
                | TokenKind::Not
                | TokenKind::Lambda
                | TokenKind::Await
                | TokenKind::Star
                | TokenKind::Yield
        )
    }

    // Helper methods

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    fn peek(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.kind)
            .unwrap_or(&self.eof.kind)
    }

    fn current_span(&self) -> Span {
        self.current().span.clone()
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        if !matches!(
            token.kind,
            TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent | TokenKind::Eof
        ) {
            self.last_span = token.span.clone();
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_unexpected(what))
        }
    }

    fn expect_ident(&mut self) -> PResult<Ident> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                let token = self.advance();
                Ok(Ident {
                    name,
                    span: token.span,
                })
            }
            _ => Err(self.error_unexpected("identifier")),
        }
    }

    /// Span from `start` to the last consumed token
    fn finish(&self, start: &Span) -> Span {
        start.merge(&self.last_span)
    }

    fn error_unexpected(&self, expected: &str) -> Diagnostic {
        let token = self.current();
        let code = if matches!(token.kind, TokenKind::Eof) {
            syntax::UNEXPECTED_EOF
        } else {
            syntax::UNEXPECTED_TOKEN
        };
        Diagnostic::error(code)
            .message(format!(
                "Expected {}, found {}",
                expected,
                token.kind.describe()
            ))
            .span(token.span.clone())
            .build()
    }

    /// Skip the rest of the logical line and any block hanging off it
    fn recover(&mut self) {
        loop {
            match self.peek() {
                TokenKind::Eof | TokenKind::Dedent | TokenKind::Indent => break,
                TokenKind::Newline => {
                    self.advance();
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }
        if !self.check(&TokenKind::Indent) {
            return;
        }
        let mut depth = 0usize;
        loop {
            match self.peek() {
                TokenKind::Indent => depth += 1,
                TokenKind::Dedent => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                TokenKind::Eof => return,
                _ => {}
            }
            self.advance();
        }
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
