//! Bindings: named, typed, located definitions

use super::types::Type;
use crate::diagnostics::Span;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Binding identifier (index into the binding arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub u32);

/// What kind of definition created a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
    Variable,
    Class,
    Function,
    Module,
    Parameter,
    Scope,
    Attribute,
}

impl BindingKind {
    /// Kinds that may hold several bindings for one name in one scope
    pub fn is_declaration(self) -> bool {
        matches!(
            self,
            BindingKind::Class | BindingKind::Function | BindingKind::Module
        )
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindingKind::Variable => "variable",
            BindingKind::Class => "class",
            BindingKind::Function => "function",
            BindingKind::Module => "module",
            BindingKind::Parameter => "parameter",
            BindingKind::Scope => "scope",
            BindingKind::Attribute => "attribute",
        };
        f.write_str(name)
    }
}

/// A definition site with its inferred type and the nodes referencing it
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    /// Defining node
    pub node: Span,
    pub ty: Type,
    pub kind: BindingKind,
    /// Dotted path of the binding (`pkg.mod.Class.method`)
    pub qname: String,
    pub refs: BTreeSet<Span>,
}

impl Binding {
    pub fn new(name: impl Into<String>, node: Span, ty: Type, kind: BindingKind) -> Self {
        Self {
            name: name.into(),
            node,
            ty,
            kind,
            qname: String::new(),
            refs: BTreeSet::new(),
        }
    }

    pub fn add_ref(&mut self, node: Span) {
        self.refs.insert(node);
    }

    pub fn is_referenced(&self) -> bool {
        !self.refs.is_empty()
    }

    /// Library definitions have no source location
    pub fn is_builtin(&self) -> bool {
        self.node.is_synthetic()
    }
}
