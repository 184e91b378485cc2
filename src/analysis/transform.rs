//! Statement interpretation: binding sites, definitions and imports.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use crate::diagnostics::{error_codes, Diagnostic, Span};
use crate::parser::ast::*;

use super::binding::{BindingId, BindingKind};
use super::expr::CallArgs;
use super::loader::LoadFailure;
use super::scope::{ScopeId, ScopeKind};
use super::types::{self, ClassType, FunBody, FunId, FunType, MethodKind, Prim, Type};
use super::Analyzer;

impl Analyzer {
    pub(crate) fn visit_module(&mut self, module: &Module, scope: ScopeId) {
        self.visit_block(&module.body, scope);
    }

    pub(crate) fn visit_block(&mut self, body: &[Stmt], scope: ScopeId) {
        for stmt in body {
            self.visit_stmt(stmt, scope);
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt, scope: ScopeId) {
        match stmt {
            Stmt::Expr { value, .. } => {
                self.eval(value, scope);
            }
            Stmt::Assign { targets, value, .. } => self.visit_assign(targets, value, scope),
            Stmt::AugAssign {
                target, op, value, ..
            } => {
                let current = self.eval(target, scope);
                let operand = self.eval(value, scope);
                let ty = types::binary(*op, &current, &operand);
                self.bind_target(target, ty, scope);
            }
            Stmt::AnnAssign {
                target,
                annotation,
                value,
                ..
            } => {
                self.eval(annotation, scope);
                if let Some(value) = value {
                    let ty = self.eval(value, scope);
                    self.bind_target(target, ty, scope);
                }
            }
            Stmt::Return { value, .. } => {
                let ty = match value {
                    Some(value) => self.eval(value, scope),
                    None => Type::Primitive(Prim::None),
                };
                self.add_return(ty);
            }
            Stmt::Pass { .. } | Stmt::Break { .. } | Stmt::Continue { .. } => {}
            Stmt::If {
                test, body, orelse, ..
            }
            | Stmt::While {
                test, body, orelse, ..
            } => {
                self.eval(test, scope);
                self.visit_block(body, scope);
                self.visit_block(orelse, scope);
            }
            Stmt::For {
                target,
                iter,
                body,
                orelse,
                ..
            } => {
                let iterable = self.eval(iter, scope);
                let element = self.element_type(&iterable);
                self.bind_target(target, element, scope);
                self.visit_block(body, scope);
                self.visit_block(orelse, scope);
            }
            Stmt::FunctionDef(def) => {
                let fun = self.define_function(def, scope);
                self.bind_name(
                    scope,
                    &def.name.name,
                    &def.name.span,
                    Type::Function(fun),
                    BindingKind::Function,
                );
            }
            Stmt::ClassDef(def) => self.visit_class_def(def, scope),
            Stmt::Import { names, .. } => {
                for alias in names {
                    self.visit_import(alias, scope);
                }
            }
            Stmt::ImportFrom {
                span,
                module,
                level,
                names,
            } => self.visit_import_from(span, module, *level, names, scope),
            Stmt::Global { names, .. } => {
                for name in names {
                    self.scopes.declare_global(scope, &name.name);
                }
            }
            Stmt::Nonlocal { names, .. } => {
                for name in names {
                    self.scopes.declare_nonlocal(scope, &name.name);
                }
            }
            Stmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            } => {
                self.visit_block(body, scope);
                for handler in handlers {
                    self.visit_handler(handler, scope);
                }
                self.visit_block(orelse, scope);
                self.visit_block(finalbody, scope);
            }
            Stmt::With { items, body, .. } => {
                for item in items {
                    let context = self.eval(&item.context, scope);
                    if let Some(target) = &item.target {
                        let entered = self.enter_type(&context);
                        self.bind_target(target, entered, scope);
                    }
                }
                self.visit_block(body, scope);
            }
            Stmt::Raise { exc, cause, .. } => {
                for value in [exc, cause].into_iter().flatten() {
                    self.eval(value, scope);
                }
            }
            Stmt::Assert { test, msg, .. } => {
                self.eval(test, scope);
                if let Some(msg) = msg {
                    self.eval(msg, scope);
                }
            }
            Stmt::Delete { targets, .. } => {
                for target in targets {
                    self.eval(target, scope);
                }
            }
        }
    }

    /// `a = b = value`; a tuple display assigned to a tuple target unpacks pairwise
    fn visit_assign(&mut self, targets: &[Expr], value: &Expr, scope: ScopeId) {
        let parts = match value {
            Expr::Tuple { elts, .. } | Expr::List { elts, .. } if !has_starred(elts) => {
                Some(elts.iter().map(|e| self.eval(e, scope)).collect::<Vec<_>>())
            }
            _ => None,
        };
        let whole = match (&parts, value) {
            (Some(_), Expr::Tuple { .. }) => Type::Instance(self.builtins.tuple),
            (Some(_), _) => Type::Instance(self.builtins.list),
            (None, _) => self.eval(value, scope),
        };

        for target in targets {
            match (target, &parts) {
                (Expr::Tuple { elts, .. } | Expr::List { elts, .. }, Some(parts))
                    if elts.len() == parts.len() && !has_starred(elts) =>
                {
                    for (elt, ty) in elts.iter().zip(parts) {
                        self.bind_target(elt, ty.clone(), scope);
                    }
                }
                _ => self.bind_target(target, whole.clone(), scope),
            }
        }
    }

    /// Bind an assignment target to `ty`
    pub(crate) fn bind_target(&mut self, target: &Expr, ty: Type, scope: ScopeId) {
        match target {
            Expr::Name { span, id } => {
                self.bind_name(scope, id, span, ty, BindingKind::Variable);
            }
            Expr::Tuple { elts, .. } | Expr::List { elts, .. } => {
                let element = self.element_type(&ty);
                for elt in elts {
                    self.bind_target(elt, element.clone(), scope);
                }
            }
            Expr::Starred { value, .. } => {
                let list = Type::Instance(self.builtins.list);
                self.bind_target(value, list, scope);
            }
            Expr::Attribute { value, attr, .. } => {
                let receiver = self.eval(value, scope);
                self.set_attribute(&receiver, attr, ty);
            }
            Expr::Subscript { value, index, .. } => {
                self.eval(value, scope);
                self.eval(index, scope);
            }
            other => self.malformed(other.span(), "cannot assign to this expression"),
        }
    }

    /// Bind `name`, honouring `global` and `nonlocal` declarations
    pub(crate) fn bind_name(
        &mut self,
        scope: ScopeId,
        name: &str,
        node: &Span,
        ty: Type,
        kind: BindingKind,
    ) -> BindingId {
        let target = self.scopes.target_scope(scope, name);
        self.bind(target, name, node, ty, kind)
    }

    /// Create the function type for a `def` or lambda evaluated in `scope`
    pub(crate) fn define_function(&mut self, def: &Rc<FunctionDef>, scope: ScopeId) -> FunId {
        for decorator in &def.decorators {
            self.eval(decorator, scope);
        }
        let mut defaults = Vec::with_capacity(def.params.len());
        for param in &def.params {
            if let Some(annotation) = &param.annotation {
                self.eval(annotation, scope);
            }
            let default = param.default.as_ref().map(|d| self.eval(d, scope));
            defaults.push(default);
        }
        if let Some(returns) = &def.returns {
            self.eval(returns, scope);
        }

        // methods close over the scope enclosing the class, not the class body
        let enclosing = self.scopes.scope(scope);
        let (closure, owner) = match enclosing.class {
            Some(class) => (enclosing.parent.unwrap_or(scope), Some(class)),
            None => (scope, None),
        };
        let id = self.types.add_fun(FunType {
            name: def.name.name.clone(),
            qname: self.scopes.extend_path(scope, &def.name.name),
            body: FunBody::Source(Rc::clone(def)),
            closure,
            owner,
            method: method_kind(&def.decorators),
            self_type: None,
            defaults,
            called: false,
            arrows: HashMap::new(),
        });
        self.add_uncalled(id);
        id
    }

    fn visit_class_def(&mut self, def: &ClassDef, scope: ScopeId) {
        for decorator in &def.decorators {
            self.eval(decorator, scope);
        }
        let bases: Vec<Type> = def.bases.iter().map(|b| self.eval(b, scope)).collect();
        for keyword in &def.keywords {
            self.eval(&keyword.value, scope);
        }

        let qname = self.scopes.extend_path(scope, &def.name.name);
        let body = self
            .scopes
            .new_scope(ScopeKind::Class, scope, qname.clone());
        let id = self.types.add_class(ClassType {
            name: def.name.name.clone(),
            qname,
            scope: body,
            bases,
            prim: None,
            builtin: false,
            node: Some(def.span.clone()),
        });
        self.scopes.set_class(body, id);
        self.bind_name(
            scope,
            &def.name.name,
            &def.name.span,
            Type::Class(id),
            BindingKind::Class,
        );
        self.visit_block(&def.body, body);
    }

    fn visit_handler(&mut self, handler: &ExceptHandler, scope: ScopeId) {
        let caught = match &handler.ty {
            Some(Expr::Tuple { elts, .. }) => {
                let classes: Vec<Type> = elts.iter().map(|e| self.eval(e, scope)).collect();
                Type::union(classes)
            }
            Some(ty) => self.eval(ty, scope),
            None => Type::Unknown,
        };
        if let Some(name) = &handler.name {
            let instance = Type::union(caught.members().into_iter().map(|t| match t {
                Type::Class(c) => Type::Instance(*c),
                _ => Type::Unknown,
            }));
            self.bind_name(scope, &name.name, &name.span, instance, BindingKind::Variable);
        }
        self.visit_block(&handler.body, scope);
    }

    /// `import a.b.c` binds `a`; `import a.b as c` binds `c` to `a.b`
    fn visit_import(&mut self, alias: &Alias, scope: ScopeId) {
        let result = match &alias.asname {
            Some(asname) => self.load_module(&alias.name, None).map(|module| {
                self.bind_name(
                    scope,
                    &asname.name,
                    &asname.span,
                    module,
                    BindingKind::Module,
                );
            }),
            None => self.load_module(&alias.name, Some(scope)).map(|_| ()),
        };
        if let Err(failure) = result {
            self.import_failed(failure, &alias.dotted(), &alias.span);
            if let Some(local) = alias.asname.as_ref().or_else(|| alias.name.first()) {
                let (name, node) = (&local.name, &local.span);
                self.bind_name(scope, name, node, Type::Unknown, BindingKind::Module);
            }
        }
    }

    fn visit_import_from(
        &mut self,
        span: &Span,
        module: &[Ident],
        level: usize,
        names: &ImportNames,
        scope: ScopeId,
    ) {
        let source = if level == 0 {
            self.load_module(module, None)
        } else {
            match self.relative_base(level) {
                None => Err(LoadFailure::NotFound),
                Some(base) if module.is_empty() => self.load_package(&base),
                Some(base) => self.load_segments(base, module, None),
            }
        };
        let package_dir = match (&source, level, module.is_empty()) {
            (Ok(ty), _, _) => self.package_dir(ty),
            // `from . import x` inside a package whose `__init__` is still loading
            (Err(_), l, true) if l > 0 => self.relative_base(l),
            _ => None,
        };
        let from = format!("{}{}", ".".repeat(level), dotted_name(module));

        let aliases = match names {
            ImportNames::Star(_) => {
                match &source {
                    Ok(ty) => self.import_star(ty, scope),
                    Err(failure) => self.import_failed(*failure, &from, span),
                }
                return;
            }
            ImportNames::Names(aliases) => aliases,
        };

        if let (Err(failure), None) = (&source, &package_dir) {
            self.import_failed(*failure, &from, span);
            for alias in aliases {
                if let Some(local) = alias.asname.as_ref().or_else(|| alias.name.first()) {
                    let (name, node) = (&local.name, &local.span);
                    self.bind_name(scope, name, node, Type::Unknown, BindingKind::Variable);
                }
            }
            return;
        }

        for alias in aliases {
            self.import_name(source.as_ref().ok(), package_dir.as_deref(), alias, &from, scope);
        }
    }

    /// Bind one name of a `from m import name` statement
    fn import_name(
        &mut self,
        source: Option<&Type>,
        package_dir: Option<&Path>,
        alias: &Alias,
        from: &str,
        scope: ScopeId,
    ) {
        let Some(ident) = alias.name.first() else {
            return;
        };
        let local = alias.asname.as_ref().unwrap_or(ident);
        let (name, node) = (&local.name, &local.span);

        if let Some(ids) = source.and_then(|m| self.attribute_bindings(m, &ident.name)) {
            self.put_ref(&ident.span, &ids);
            let ty = Type::union(ids.iter().map(|&id| self.scopes.binding(id).ty.clone()));
            let kind = match self.scopes.binding(ids[0]).kind {
                kind if kind.is_declaration() => kind,
                _ => BindingKind::Variable,
            };
            self.bind_name(scope, name, node, ty, kind);
            return;
        }

        if let Some(dir) = package_dir {
            match self.load_submodule(dir, &ident.name) {
                Ok(module) => {
                    self.bind_name(scope, name, node, module, BindingKind::Module);
                    return;
                }
                Err(LoadFailure::NotFound) => {}
                Err(_) => {
                    self.bind_name(scope, name, node, Type::Unknown, BindingKind::Module);
                    return;
                }
            }
        }

        // a package still loading may define the name later
        if source.is_some() {
            self.put_problem(
                Diagnostic::error(error_codes::inference::IMPORT_NAME_NOT_FOUND)
                    .message(format!("cannot import name '{}' from '{}'", ident.name, from))
                    .span(ident.span.clone())
                    .build(),
            );
        }
        self.bind_name(scope, name, node, Type::Unknown, BindingKind::Variable);
    }

    /// `from m import *`: copy every public binding of `m`
    ///
    /// The copies keep the original definition site, so an unused name is
    /// reported once, where it is defined.
    fn import_star(&mut self, module: &Type, scope: ScopeId) {
        let Some(members) = self.types.member_scope(module) else {
            return;
        };
        let public: Vec<(String, Vec<BindingId>)> = self
            .scopes
            .scope(members)
            .names()
            .filter(|(name, _)| !name.starts_with('_'))
            .map(|(name, ids)| (name.to_string(), ids.to_vec()))
            .collect();
        for (name, ids) in public {
            for id in ids {
                let binding = self.scopes.binding(id);
                let (node, ty, kind) = (binding.node.clone(), binding.ty.clone(), binding.kind);
                self.bind_name(scope, &name, &node, ty, kind);
            }
        }
    }

    fn import_failed(&mut self, failure: LoadFailure, name: &str, span: &Span) {
        if failure != LoadFailure::NotFound {
            return;
        }
        self.put_problem(
            Diagnostic::error(error_codes::inference::MODULE_NOT_FOUND)
                .message(format!("module not found: {}", name))
                .span(span.clone())
                .build(),
        );
    }

    /// Record a node the interpreter cannot handle; its subtree is skipped
    pub(crate) fn malformed(&mut self, span: &Span, message: &str) {
        self.put_problem(
            Diagnostic::error(error_codes::inference::MALFORMED_NODE)
                .message(message)
                .span(span.clone())
                .build(),
        );
    }

    pub(crate) fn add_return(&mut self, ty: Type) {
        if let Some(frame) = self.frames.last_mut() {
            frame.ret = Some(match frame.ret.take() {
                Some(ret) => ret.merge(&ty),
                None => ty,
            });
        }
    }

    /// Type bound by `with ... as target`: the result of `__enter__` when the
    /// class defines one
    fn enter_type(&mut self, context: &Type) -> Type {
        let members: Vec<Type> = context.members().into_iter().cloned().collect();
        let mut entered = Vec::with_capacity(members.len());
        for member in members {
            let defines_enter = matches!(member, Type::Instance(c) if !self.types.class(c).builtin);
            let ty = if defines_enter {
                self.call_method(&member, "__enter__", &CallArgs::default())
                    .unwrap_or_else(|| member.clone())
            } else {
                member
            };
            entered.push(ty);
        }
        Type::union(entered)
    }
}

fn has_starred(elts: &[Expr]) -> bool {
    elts.iter().any(|e| matches!(e, Expr::Starred { .. }))
}

/// How a method's decorators change its receiver
fn method_kind(decorators: &[Expr]) -> MethodKind {
    for decorator in decorators {
        let name = match decorator {
            Expr::Name { id, .. } => id.as_str(),
            Expr::Attribute { attr, .. } => attr.name.as_str(),
            _ => continue,
        };
        match name {
            "staticmethod" => return MethodKind::Static,
            "classmethod" => return MethodKind::Class,
            "property" | "cached_property" => return MethodKind::Property,
            _ => {}
        }
    }
    MethodKind::Instance
}
