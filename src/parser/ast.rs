//! Abstract Syntax Tree definitions for the analysed Python subset
//!
//! All AST nodes carry a source span. The span is the node's identity: the
//! analyzer keys its reference table by span, which stays stable when a tree
//! is reloaded from the on-disk cache.

use crate::diagnostics::Span;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::rc::Rc;

/// A parsed source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub span: Span,
    pub file: PathBuf,
    pub body: Vec<Stmt>,
}

/// An identifier occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// Statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Expr {
        span: Span,
        value: Expr,
    },
    /// `a = b = value`
    Assign {
        span: Span,
        targets: Vec<Expr>,
        value: Expr,
    },
    AugAssign {
        span: Span,
        target: Expr,
        op: Operator,
        value: Expr,
    },
    AnnAssign {
        span: Span,
        target: Expr,
        annotation: Expr,
        value: Option<Expr>,
    },
    Return {
        span: Span,
        value: Option<Expr>,
    },
    Pass {
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    If {
        span: Span,
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    While {
        span: Span,
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    For {
        span: Span,
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        is_async: bool,
    },
    FunctionDef(Rc<FunctionDef>),
    ClassDef(Rc<ClassDef>),
    /// `import a.b as c, d`
    Import {
        span: Span,
        names: Vec<Alias>,
    },
    /// `from ..a.b import c as d`
    ImportFrom {
        span: Span,
        module: Vec<Ident>,
        level: usize,
        names: ImportNames,
    },
    Global {
        span: Span,
        names: Vec<Ident>,
    },
    Nonlocal {
        span: Span,
        names: Vec<Ident>,
    },
    Try {
        span: Span,
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finalbody: Vec<Stmt>,
    },
    With {
        span: Span,
        items: Vec<WithItem>,
        body: Vec<Stmt>,
        is_async: bool,
    },
    Raise {
        span: Span,
        exc: Option<Expr>,
        cause: Option<Expr>,
    },
    Assert {
        span: Span,
        test: Expr,
        msg: Option<Expr>,
    },
    Delete {
        span: Span,
        targets: Vec<Expr>,
    },
}

impl Stmt {
    pub fn span(&self) -> &Span {
        match self {
            Stmt::Expr { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::AugAssign { span, .. }
            | Stmt::AnnAssign { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Pass { span }
            | Stmt::Break { span }
            | Stmt::Continue { span }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Import { span, .. }
            | Stmt::ImportFrom { span, .. }
            | Stmt::Global { span, .. }
            | Stmt::Nonlocal { span, .. }
            | Stmt::Try { span, .. }
            | Stmt::With { span, .. }
            | Stmt::Raise { span, .. }
            | Stmt::Assert { span, .. }
            | Stmt::Delete { span, .. } => span,
            Stmt::FunctionDef(def) => &def.span,
            Stmt::ClassDef(def) => &def.span,
        }
    }
}

/// Function definition (also the desugared form of a lambda)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub span: Span,
    pub name: Ident,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub decorators: Vec<Expr>,
    pub returns: Option<Expr>,
    pub is_async: bool,
}

impl FunctionDef {
    /// Name given to desugared lambdas
    pub const LAMBDA: &'static str = "<lambda>";

    pub fn is_lambda(&self) -> bool {
        self.name.name == Self::LAMBDA
    }
}

/// A formal parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: Ident,
    pub kind: ParamKind,
    pub default: Option<Expr>,
    pub annotation: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    Positional,
    /// `*args`
    VarArgs,
    /// declared after `*` or `*args`
    KeywordOnly,
    /// `**kwargs`
    KwArgs,
}

/// Class definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub span: Span,
    pub name: Ident,
    pub bases: Vec<Expr>,
    pub keywords: Vec<Keyword>,
    pub body: Vec<Stmt>,
    pub decorators: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub name: Ident,
    pub value: Expr,
}

/// `a.b.c as d` in an import statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    pub span: Span,
    pub name: Vec<Ident>,
    pub asname: Option<Ident>,
}

impl Alias {
    /// Dotted form of the imported name
    pub fn dotted(&self) -> String {
        dotted_name(&self.name)
    }
}

/// Join identifier segments with `.`
pub fn dotted_name(segments: &[Ident]) -> String {
    segments
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImportNames {
    /// `from m import *`
    Star(Span),
    Names(Vec<Alias>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptHandler {
    pub span: Span,
    pub ty: Option<Expr>,
    pub name: Option<Ident>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithItem {
    pub context: Expr,
    pub target: Option<Expr>,
}

/// Expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Name {
        span: Span,
        id: String,
    },
    Int {
        span: Span,
        value: String,
    },
    Float {
        span: Span,
        value: String,
    },
    Imaginary {
        span: Span,
        value: String,
    },
    Str {
        span: Span,
        value: String,
    },
    Bytes {
        span: Span,
        value: String,
    },
    Bool {
        span: Span,
        value: bool,
    },
    NoneLit {
        span: Span,
    },
    Ellipsis {
        span: Span,
    },
    Attribute {
        span: Span,
        value: Box<Expr>,
        attr: Ident,
    },
    Subscript {
        span: Span,
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        span: Span,
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Call {
        span: Span,
        func: Box<Expr>,
        args: Vec<Arg>,
    },
    BinOp {
        span: Span,
        left: Box<Expr>,
        op: Operator,
        right: Box<Expr>,
    },
    UnaryOp {
        span: Span,
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    BoolOp {
        span: Span,
        op: BoolOperator,
        values: Vec<Expr>,
    },
    Compare {
        span: Span,
        left: Box<Expr>,
        ops: Vec<CmpOperator>,
        comparators: Vec<Expr>,
    },
    IfExp {
        span: Span,
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    Lambda {
        span: Span,
        def: Rc<FunctionDef>,
    },
    List {
        span: Span,
        elts: Vec<Expr>,
    },
    Tuple {
        span: Span,
        elts: Vec<Expr>,
    },
    Set {
        span: Span,
        elts: Vec<Expr>,
    },
    Dict {
        span: Span,
        items: Vec<DictItem>,
    },
    ListComp {
        span: Span,
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    SetComp {
        span: Span,
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    GeneratorExp {
        span: Span,
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    DictComp {
        span: Span,
        key: Box<Expr>,
        value: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    Yield {
        span: Span,
        value: Option<Box<Expr>>,
    },
    YieldFrom {
        span: Span,
        value: Box<Expr>,
    },
    Await {
        span: Span,
        value: Box<Expr>,
    },
    Starred {
        span: Span,
        value: Box<Expr>,
    },
    /// `target := value`
    NamedExpr {
        span: Span,
        target: Ident,
        value: Box<Expr>,
    },
}

impl Expr {
    pub fn span(&self) -> &Span {
        match self {
            Expr::Name { span, .. }
            | Expr::Int { span, .. }
            | Expr::Float { span, .. }
            | Expr::Imaginary { span, .. }
            | Expr::Str { span, .. }
            | Expr::Bytes { span, .. }
            | Expr::Bool { span, .. }
            | Expr::NoneLit { span }
            | Expr::Ellipsis { span }
            | Expr::Attribute { span, .. }
            | Expr::Subscript { span, .. }
            | Expr::Slice { span, .. }
            | Expr::Call { span, .. }
            | Expr::BinOp { span, .. }
            | Expr::UnaryOp { span, .. }
            | Expr::BoolOp { span, .. }
            | Expr::Compare { span, .. }
            | Expr::IfExp { span, .. }
            | Expr::Lambda { span, .. }
            | Expr::List { span, .. }
            | Expr::Tuple { span, .. }
            | Expr::Set { span, .. }
            | Expr::Dict { span, .. }
            | Expr::ListComp { span, .. }
            | Expr::SetComp { span, .. }
            | Expr::GeneratorExp { span, .. }
            | Expr::DictComp { span, .. }
            | Expr::Yield { span, .. }
            | Expr::YieldFrom { span, .. }
            | Expr::Await { span, .. }
            | Expr::Starred { span, .. }
            | Expr::NamedExpr { span, .. } => span,
        }
    }

    /// True for expressions that may appear on the left of `=`
    pub fn is_assignable(&self) -> bool {
        match self {
            Expr::Name { .. } | Expr::Attribute { .. } | Expr::Subscript { .. } => true,
            Expr::Tuple { elts, .. } | Expr::List { elts, .. } => {
                elts.iter().all(|e| e.is_assignable())
            }
            Expr::Starred { value, .. } => value.is_assignable(),
            _ => false,
        }
    }
}

/// A call argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Arg {
    Positional(Expr),
    Keyword { name: Ident, value: Expr },
    /// `*args`
    Star(Expr),
    /// `**kwargs`
    DoubleStar(Expr),
}

impl Arg {
    pub fn value(&self) -> &Expr {
        match self {
            Arg::Positional(value)
            | Arg::Keyword { value, .. }
            | Arg::Star(value)
            | Arg::DoubleStar(value) => value,
        }
    }
}

/// `key: value`, or `**mapping` when `key` is absent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictItem {
    pub key: Option<Expr>,
    pub value: Expr,
}

/// One `for target in iter if cond` clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comprehension {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
    pub is_async: bool,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Add,
    Sub,
    Mult,
    MatMult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
}

impl Operator {
    /// Source spelling of the operator
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mult => "*",
            Operator::MatMult => "@",
            Operator::Div => "/",
            Operator::FloorDiv => "//",
            Operator::Mod => "%",
            Operator::Pow => "**",
            Operator::LShift => "<<",
            Operator::RShift => ">>",
            Operator::BitOr => "|",
            Operator::BitXor => "^",
            Operator::BitAnd => "&",
        }
    }

    /// Parse the spelling used by augmented assignment (without the `=`)
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => Operator::Add,
            "-" => Operator::Sub,
            "*" => Operator::Mult,
            "@" => Operator::MatMult,
            "/" => Operator::Div,
            "//" => Operator::FloorDiv,
            "%" => Operator::Mod,
            "**" => Operator::Pow,
            "<<" => Operator::LShift,
            ">>" => Operator::RShift,
            "|" => Operator::BitOr,
            "^" => Operator::BitXor,
            "&" => Operator::BitAnd,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    Neg,
    Pos,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}
