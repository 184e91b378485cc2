//! Type lattice and the arena that owns module, class and function types.
//!
//! [`Type`] is a small value: structured types refer to their arena entry by
//! id, so a function type can point back at the scope it closes over without
//! creating an ownership cycle.

use super::scope::ScopeId;
use crate::diagnostics::Span;
use crate::parser::ast::{FunctionDef, Operator};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

/// Module type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

/// Class type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

/// Function type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunId(pub u32);

/// Primitive value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Prim {
    Bool,
    Int,
    Float,
    Complex,
    Str,
    Bytes,
    None,
}

impl Prim {
    pub fn name(self) -> &'static str {
        match self {
            Prim::Bool => "bool",
            Prim::Int => "int",
            Prim::Float => "float",
            Prim::Complex => "complex",
            Prim::Str => "str",
            Prim::Bytes => "bytes",
            Prim::None => "None",
        }
    }

    /// Position in the numeric tower `bool < int < float < complex`
    fn numeric_rank(self) -> Option<u8> {
        match self {
            Prim::Bool => Some(0),
            Prim::Int => Some(1),
            Prim::Float => Some(2),
            Prim::Complex => Some(3),
            _ => None,
        }
    }

    fn from_rank(rank: u8) -> Prim {
        match rank {
            0 => Prim::Bool,
            1 => Prim::Int,
            2 => Prim::Float,
            _ => Prim::Complex,
        }
    }

    fn is_integral(self) -> bool {
        matches!(self, Prim::Bool | Prim::Int)
    }
}

impl fmt::Display for Prim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An inferred type
///
/// Invariant: a `Union` holds at least two members, none of which is a
/// `Union` or `Unknown`. Build unions through [`Type::merge`] or
/// [`Type::union`] only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    Unknown,
    Primitive(Prim),
    Module(ModuleId),
    Class(ClassId),
    Instance(ClassId),
    Function(FunId),
    Union(BTreeSet<Type>),
}

impl Type {
    /// Widen two types into one
    ///
    /// Different primitive kinds form a union (`int | str`) rather than
    /// collapsing to `Unknown`; numeric widening belongs to [`binary`].
    pub fn merge(&self, other: &Type) -> Type {
        if self == other {
            return self.clone();
        }
        match (self, other) {
            (Type::Unknown, t) | (t, Type::Unknown) => t.clone(),
            _ => Type::union([self.clone(), other.clone()]),
        }
    }

    /// Flattened, de-duplicated union of `types`
    pub fn union(types: impl IntoIterator<Item = Type>) -> Type {
        let mut members = BTreeSet::new();
        for ty in types {
            match ty {
                Type::Unknown => {}
                Type::Union(inner) => members.extend(inner),
                other => {
                    members.insert(other);
                }
            }
        }
        match members.len() {
            0 => Type::Unknown,
            1 => members.into_iter().next().unwrap_or(Type::Unknown),
            _ => Type::Union(members),
        }
    }

    /// The non-union members of this type (a lone type is its own member)
    pub fn members(&self) -> Vec<&Type> {
        match self {
            Type::Union(members) => members.iter().collect(),
            other => vec![other],
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    pub fn is_union(&self) -> bool {
        matches!(self, Type::Union(_))
    }

    /// Functions and classes (instantiation) can be applied
    pub fn is_callable(&self) -> bool {
        self.members()
            .iter()
            .any(|t| matches!(t, Type::Function(_) | Type::Class(_)))
    }

    /// Class, function and module types are declarations, not values
    pub fn is_declaration(&self) -> bool {
        matches!(self, Type::Class(_) | Type::Function(_) | Type::Module(_))
    }

    pub fn contains(&self, other: &Type) -> bool {
        match self {
            Type::Union(members) => members.contains(other),
            t => t == other,
        }
    }
}

/// Result type of `left op right`, distributed over union members
pub fn binary(op: Operator, left: &Type, right: &Type) -> Type {
    if left.is_unknown() || right.is_unknown() {
        return Type::Unknown;
    }
    let mut results = Vec::new();
    for l in left.members() {
        for r in right.members() {
            let result = binary_member(op, l, r);
            if result.is_unknown() {
                return Type::Unknown;
            }
            results.push(result);
        }
    }
    Type::union(results)
}

fn binary_member(op: Operator, left: &Type, right: &Type) -> Type {
    match (left, right) {
        (Type::Primitive(a), Type::Primitive(b)) => primitive_binary(op, *a, *b)
            .map(Type::Primitive)
            .unwrap_or(Type::Unknown),
        // sequence concatenation
        (Type::Instance(a), Type::Instance(b)) if a == b && op == Operator::Add => left.clone(),
        // sequence repetition
        (Type::Instance(_), Type::Primitive(p)) if op == Operator::Mult && p.is_integral() => {
            left.clone()
        }
        (Type::Primitive(p), Type::Instance(_)) if op == Operator::Mult && p.is_integral() => {
            right.clone()
        }
        _ => Type::Unknown,
    }
}

/// Primitive arithmetic; `None` when the operation is a type error
pub fn primitive_binary(op: Operator, a: Prim, b: Prim) -> Option<Prim> {
    if let (Some(ra), Some(rb)) = (a.numeric_rank(), b.numeric_rank()) {
        let widest = ra.max(rb);
        return match op {
            Operator::Add
            | Operator::Sub
            | Operator::Mult
            | Operator::FloorDiv
            | Operator::Mod
            | Operator::Pow => Some(Prim::from_rank(widest.max(1))),
            Operator::Div => Some(Prim::from_rank(widest.max(2))),
            Operator::BitAnd | Operator::BitOr | Operator::BitXor => {
                if widest == 0 {
                    Some(Prim::Bool)
                } else if widest == 1 {
                    Some(Prim::Int)
                } else {
                    None
                }
            }
            Operator::LShift | Operator::RShift => (widest <= 1).then_some(Prim::Int),
            Operator::MatMult => None,
        };
    }

    match (a, b, op) {
        (Prim::Str, Prim::Str, Operator::Add) => Some(Prim::Str),
        (Prim::Bytes, Prim::Bytes, Operator::Add) => Some(Prim::Bytes),
        (Prim::Str, n, Operator::Mult) | (n, Prim::Str, Operator::Mult) if n.is_integral() => {
            Some(Prim::Str)
        }
        (Prim::Bytes, n, Operator::Mult) | (n, Prim::Bytes, Operator::Mult)
            if n.is_integral() =>
        {
            Some(Prim::Bytes)
        }
        // printf-style formatting accepts any right operand
        (Prim::Str, _, Operator::Mod) => Some(Prim::Str),
        (Prim::Bytes, _, Operator::Mod) => Some(Prim::Bytes),
        _ => None,
    }
}

/// A loaded module
#[derive(Debug, Clone)]
pub struct ModuleType {
    /// Short name (`mod` for `pkg/mod.py`)
    pub name: String,
    /// Canonical qualified name, the memoization key
    pub qname: String,
    /// Source file; `None` for library modules
    pub file: Option<PathBuf>,
    pub scope: ScopeId,
}

/// A class
#[derive(Debug, Clone)]
pub struct ClassType {
    pub name: String,
    pub qname: String,
    pub scope: ScopeId,
    pub bases: Vec<Type>,
    /// Builtin classes whose instances are primitives (`int`, `str`, ...)
    pub prim: Option<Prim>,
    pub builtin: bool,
    /// `class` statement that created it; `None` for builtins
    pub node: Option<Span>,
}

/// A type with user classes and functions named by their definition site
///
/// Each execution of a `def` or `class` statement allocates a new id, so two
/// applications of the same body never produce equal [`Type`]s for them.
/// The recursion guard compares these instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SiteType {
    Exact(Type),
    Class(Span),
    Instance(Span),
    Function(Span),
    Union(BTreeSet<SiteType>),
}

/// How a function defined in a class body receives its first argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Instance,
    Static,
    Class,
    Property,
}

/// Return behaviour of a library function
#[derive(Debug, Clone, PartialEq)]
pub enum NativeReturn {
    Fixed(Type),
    /// Same type as the first positional argument (`abs`, `copy`)
    FirstArgument,
}

/// Where a function's behaviour comes from
#[derive(Debug, Clone)]
pub enum FunBody {
    Source(Rc<FunctionDef>),
    Native(NativeReturn),
}

/// A function or lambda
#[derive(Debug, Clone)]
pub struct FunType {
    pub name: String,
    pub qname: String,
    pub body: FunBody,
    /// Scope the body closes over
    pub closure: ScopeId,
    /// Class whose body defined this function
    pub owner: Option<ClassId>,
    pub method: MethodKind,
    /// Receiver type seen at method-call sites
    pub self_type: Option<Type>,
    /// Default value types, one slot per parameter
    pub defaults: Vec<Option<Type>>,
    pub called: bool,
    /// Memoized return types keyed by bound parameter types
    pub arrows: HashMap<Vec<Type>, Type>,
}

impl FunType {
    pub fn source(&self) -> Option<&Rc<FunctionDef>> {
        match &self.body {
            FunBody::Source(def) => Some(def),
            FunBody::Native(_) => None,
        }
    }

    /// Merged return type over every application so far
    pub fn return_type(&self) -> Type {
        Type::union(self.arrows.values().cloned())
    }
}

/// Arena of structured types
#[derive(Debug, Default)]
pub struct TypeStore {
    modules: Vec<ModuleType>,
    classes: Vec<ClassType>,
    funs: Vec<FunType>,
}

impl TypeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&mut self, module: ModuleType) -> ModuleId {
        self.modules.push(module);
        ModuleId(self.modules.len() as u32 - 1)
    }

    pub fn add_class(&mut self, class: ClassType) -> ClassId {
        self.classes.push(class);
        ClassId(self.classes.len() as u32 - 1)
    }

    pub fn add_fun(&mut self, fun: FunType) -> FunId {
        self.funs.push(fun);
        FunId(self.funs.len() as u32 - 1)
    }

    pub fn module(&self, id: ModuleId) -> &ModuleType {
        &self.modules[id.0 as usize]
    }

    pub fn class(&self, id: ClassId) -> &ClassType {
        &self.classes[id.0 as usize]
    }

    pub fn fun(&self, id: FunId) -> &FunType {
        &self.funs[id.0 as usize]
    }

    pub fn fun_mut(&mut self, id: FunId) -> &mut FunType {
        &mut self.funs[id.0 as usize]
    }

    pub fn fun_count(&self) -> usize {
        self.funs.len()
    }

    /// Scope holding the members of a module or class type
    pub fn member_scope(&self, ty: &Type) -> Option<ScopeId> {
        match ty {
            Type::Module(id) => Some(self.module(*id).scope),
            Type::Class(id) | Type::Instance(id) => Some(self.class(*id).scope),
            _ => None,
        }
    }

    /// Human-readable rendering of a type
    pub fn site_type(&self, ty: &Type) -> SiteType {
        match ty {
            Type::Class(c) => match &self.class(*c).node {
                Some(node) => SiteType::Class(node.clone()),
                None => SiteType::Exact(ty.clone()),
            },
            Type::Instance(c) => match &self.class(*c).node {
                Some(node) => SiteType::Instance(node.clone()),
                None => SiteType::Exact(ty.clone()),
            },
            Type::Function(f) => match self.fun(*f).source() {
                Some(def) => SiteType::Function(def.span.clone()),
                None => SiteType::Exact(ty.clone()),
            },
            Type::Union(members) => {
                SiteType::Union(members.iter().map(|t| self.site_type(t)).collect())
            }
            _ => SiteType::Exact(ty.clone()),
        }
    }

    pub fn describe(&self, ty: &Type) -> String {
        match ty {
            Type::Unknown => "?".to_string(),
            Type::Primitive(p) => p.name().to_string(),
            Type::Module(id) => format!("module {}", self.module(*id).name),
            Type::Class(id) => format!("class {}", self.class(*id).name),
            Type::Instance(id) => self.class(*id).name.clone(),
            Type::Function(id) => {
                let fun = self.fun(*id);
                let ret = fun.return_type();
                if fun.arrows.is_empty() {
                    format!("def {}", fun.name)
                } else {
                    format!("def {} -> {}", fun.name, self.describe(&ret))
                }
            }
            Type::Union(members) => members
                .iter()
                .map(|t| self.describe(t))
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
