//! Scope table: nested namespaces mapping identifiers to bindings
//!
//! Scopes and bindings live in arenas owned by [`ScopeTable`] and refer to
//! each other by id. The root scope (index 0) is the global scope that holds
//! the builtins; every other scope has exactly one parent.

use super::binding::{Binding, BindingId, BindingKind};
use super::types::{ClassId, Type};
use crate::diagnostics::Span;
use std::collections::{BTreeMap, HashSet};

/// Scope identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub const GLOBAL: ScopeId = ScopeId(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Global,
    Module,
    Class,
    Function,
    /// Comprehension and other anonymous block scopes
    Scope,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// Dotted path used for qualified names
    pub path: String,
    /// Class whose body this scope is
    pub class: Option<ClassId>,
    table: BTreeMap<String, Vec<BindingId>>,
    globals: HashSet<String>,
    nonlocals: HashSet<String>,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<ScopeId>, path: String) -> Self {
        Self {
            kind,
            parent,
            path,
            class: None,
            table: BTreeMap::new(),
            globals: HashSet::new(),
            nonlocals: HashSet::new(),
        }
    }

    /// Names bound directly in this scope, in name order
    pub fn names(&self) -> impl Iterator<Item = (&str, &[BindingId])> {
        self.table.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_global(&self, name: &str) -> bool {
        self.globals.contains(name)
    }

    pub fn is_nonlocal(&self, name: &str) -> bool {
        self.nonlocals.contains(name)
    }
}

/// Outcome of [`ScopeTable::insert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    New(BindingId),
    /// The type was merged into an existing binding
    Merged(BindingId),
    /// An identical declaration already existed
    Existing(BindingId),
}

impl Inserted {
    pub fn id(self) -> BindingId {
        match self {
            Inserted::New(id) | Inserted::Merged(id) | Inserted::Existing(id) => id,
        }
    }
}

#[derive(Debug)]
pub struct ScopeTable {
    scopes: Vec<Scope>,
    bindings: Vec<Binding>,
}

impl Default for ScopeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTable {
    /// A table holding only the empty global scope
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(ScopeKind::Global, None, String::new())],
            bindings: Vec::new(),
        }
    }

    pub fn new_scope(&mut self, kind: ScopeKind, parent: ScopeId, path: String) -> ScopeId {
        self.scopes.push(Scope::new(kind, Some(parent), path));
        ScopeId(self.scopes.len() as u32 - 1)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn set_class(&mut self, id: ScopeId, class: ClassId) {
        self.scopes[id.0 as usize].class = Some(class);
    }

    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings[id.0 as usize]
    }

    pub fn binding_mut(&mut self, id: BindingId) -> &mut Binding {
        &mut self.bindings[id.0 as usize]
    }

    pub fn bindings(&self) -> impl Iterator<Item = (BindingId, &Binding)> {
        self.bindings
            .iter()
            .enumerate()
            .map(|(i, b)| (BindingId(i as u32), b))
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Qualified name for `name` defined in `scope`
    pub fn extend_path(&self, scope: ScopeId, name: &str) -> String {
        let path = &self.scope(scope).path;
        if path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", path, name)
        }
    }

    /// Bind `name` in `scope`, merging into an existing binding when there is one
    ///
    /// Class, function and module declarations get a binding of their own
    /// unless an identical one exists; other kinds widen the type of the most
    /// recent non-declaration binding of the name.
    pub fn insert(
        &mut self,
        scope: ScopeId,
        name: &str,
        node: Span,
        ty: Type,
        kind: BindingKind,
    ) -> Inserted {
        let existing = self.scope(scope).table.get(name).cloned().unwrap_or_default();

        if kind.is_declaration() {
            if let Some(&id) = existing.iter().find(|&&id| {
                let b = self.binding(id);
                b.kind == kind && b.ty == ty
            }) {
                return Inserted::Existing(id);
            }
        } else if let Some(&id) = existing
            .iter()
            .rev()
            .find(|&&id| !self.binding(id).kind.is_declaration())
        {
            let binding = self.binding_mut(id);
            binding.ty = binding.ty.merge(&ty);
            return Inserted::Merged(id);
        }

        let mut binding = Binding::new(name, node, ty, kind);
        binding.qname = self.extend_path(scope, name);
        self.bindings.push(binding);
        let id = BindingId(self.bindings.len() as u32 - 1);
        self.scopes[scope.0 as usize]
            .table
            .entry(name.to_string())
            .or_default()
            .push(id);
        Inserted::New(id)
    }

    /// Bindings of `name` defined directly in `scope`
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<&[BindingId]> {
        self.scope(scope)
            .table
            .get(name)
            .map(Vec::as_slice)
            .filter(|b| !b.is_empty())
    }

    /// Bindings of `name` in the nearest enclosing scope that defines it
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&[BindingId]> {
        let mut current = Some(if self.scope(scope).is_global(name) {
            self.module_scope(scope)
        } else {
            scope
        });
        while let Some(id) = current {
            if let Some(found) = self.lookup_local(id, name) {
                return Some(found);
            }
            current = self.scope(id).parent;
        }
        None
    }

    /// Merged type of `name` as seen from `scope`
    pub fn lookup_type(&self, scope: ScopeId, name: &str) -> Option<Type> {
        self.lookup(scope, name)
            .map(|ids| Type::union(ids.iter().map(|&id| self.binding(id).ty.clone())))
    }

    /// Nearest enclosing module scope (or the global scope)
    pub fn module_scope(&self, scope: ScopeId) -> ScopeId {
        let mut current = scope;
        loop {
            let s = self.scope(current);
            match (s.kind, s.parent) {
                (ScopeKind::Module, _) | (_, None) => return current,
                (_, Some(parent)) => current = parent,
            }
        }
    }

    /// Scope that receives an assignment to `name` made in `scope`
    pub fn target_scope(&self, scope: ScopeId, name: &str) -> ScopeId {
        let s = self.scope(scope);
        if s.is_global(name) {
            return self.module_scope(scope);
        }
        if s.is_nonlocal(name) {
            let mut current = s.parent;
            while let Some(id) = current {
                let enclosing = self.scope(id);
                if !matches!(enclosing.kind, ScopeKind::Function | ScopeKind::Scope) {
                    break;
                }
                if enclosing.kind == ScopeKind::Function && self.lookup_local(id, name).is_some() {
                    return id;
                }
                current = enclosing.parent;
            }
        }
        scope
    }

    /// Nearest scope that is not a comprehension scope
    pub fn enclosing_block(&self, scope: ScopeId) -> ScopeId {
        let mut current = scope;
        while self.scope(current).kind == ScopeKind::Scope {
            match self.scope(current).parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }

    pub fn declare_global(&mut self, scope: ScopeId, name: &str) {
        self.scopes[scope.0 as usize].globals.insert(name.to_string());
    }

    pub fn declare_nonlocal(&mut self, scope: ScopeId, name: &str) {
        self.scopes[scope.0 as usize]
            .nonlocals
            .insert(name.to_string());
    }
}

#[cfg(test)]
#[path = "scope_tests.rs"]
mod tests;
