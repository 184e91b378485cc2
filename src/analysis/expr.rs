//! Expression evaluation, attribute lookup and function application.

use std::collections::HashSet;
use std::path::Path;
use std::rc::Rc;

use crate::diagnostics::Span;
use crate::parser::ast::*;

use super::binding::{BindingId, BindingKind};
use super::scope::{ScopeId, ScopeKind};
use super::types::{self, ClassId, FunBody, FunId, MethodKind, NativeReturn, Prim, Type};
use super::{Analyzer, Frame};

/// Evaluated arguments of one call site
#[derive(Debug, Clone, Default)]
pub(crate) struct CallArgs {
    pub positional: Vec<Type>,
    pub keywords: Vec<(String, Type)>,
    /// The call spreads `*args` or `**kwargs`
    pub spread: bool,
}

impl CallArgs {
    fn take_keyword(&mut self, name: &str) -> Option<Type> {
        let index = self.keywords.iter().position(|(k, _)| k == name)?;
        Some(self.keywords.remove(index).1)
    }
}

impl Analyzer {
    /// Infer the type of `expr` evaluated in `scope`
    pub(crate) fn eval(&mut self, expr: &Expr, scope: ScopeId) -> Type {
        match expr {
            Expr::Name { span, id } => self.lookup_name(id, span, scope),
            Expr::Int { .. } => Type::Primitive(Prim::Int),
            Expr::Float { .. } => Type::Primitive(Prim::Float),
            Expr::Imaginary { .. } => Type::Primitive(Prim::Complex),
            Expr::Str { .. } => Type::Primitive(Prim::Str),
            Expr::Bytes { .. } => Type::Primitive(Prim::Bytes),
            Expr::Bool { .. } => Type::Primitive(Prim::Bool),
            Expr::NoneLit { .. } => Type::Primitive(Prim::None),
            Expr::Ellipsis { .. } => Type::Unknown,

            Expr::Attribute { value, attr, .. } => {
                let receiver = self.eval(value, scope);
                self.get_attribute(&receiver, attr)
            }
            Expr::Subscript { value, index, .. } => {
                let container = self.eval(value, scope);
                let key = self.eval(index, scope);
                self.subscript(&container, index, key)
            }
            Expr::Slice {
                lower, upper, step, ..
            } => {
                for part in [lower, upper, step].into_iter().flatten() {
                    self.eval(part, scope);
                }
                Type::Unknown
            }
            Expr::Call { func, args, .. } => self.visit_call(func, args, scope),

            Expr::BinOp {
                left, op, right, ..
            } => {
                let left = self.eval(left, scope);
                let right = self.eval(right, scope);
                types::binary(*op, &left, &right)
            }
            Expr::UnaryOp { op, operand, .. } => {
                let operand = self.eval(operand, scope);
                unary(*op, &operand)
            }
            Expr::BoolOp { values, .. } => {
                let operands: Vec<Type> = values.iter().map(|v| self.eval(v, scope)).collect();
                Type::union(operands)
            }
            Expr::Compare {
                left, comparators, ..
            } => {
                self.eval(left, scope);
                for comparator in comparators {
                    self.eval(comparator, scope);
                }
                Type::Primitive(Prim::Bool)
            }
            Expr::IfExp {
                test, body, orelse, ..
            } => {
                self.eval(test, scope);
                let body = self.eval(body, scope);
                let orelse = self.eval(orelse, scope);
                body.merge(&orelse)
            }
            Expr::Lambda { def, .. } => Type::Function(self.define_function(def, scope)),

            Expr::List { elts, .. } => {
                self.eval_all(elts, scope);
                Type::Instance(self.builtins.list)
            }
            Expr::Tuple { elts, .. } => {
                self.eval_all(elts, scope);
                Type::Instance(self.builtins.tuple)
            }
            Expr::Set { elts, .. } => {
                self.eval_all(elts, scope);
                Type::Instance(self.builtins.set)
            }
            Expr::Dict { items, .. } => {
                for item in items {
                    if let Some(key) = &item.key {
                        self.eval(key, scope);
                    }
                    self.eval(&item.value, scope);
                }
                Type::Instance(self.builtins.dict)
            }

            Expr::ListComp {
                elt, generators, ..
            } => {
                let inner = self.comprehension(generators, scope);
                self.eval(elt, inner);
                Type::Instance(self.builtins.list)
            }
            Expr::SetComp {
                elt, generators, ..
            } => {
                let inner = self.comprehension(generators, scope);
                self.eval(elt, inner);
                Type::Instance(self.builtins.set)
            }
            Expr::GeneratorExp {
                elt, generators, ..
            } => {
                let inner = self.comprehension(generators, scope);
                self.eval(elt, inner);
                Type::Instance(self.builtins.generator)
            }
            Expr::DictComp {
                key,
                value,
                generators,
                ..
            } => {
                let inner = self.comprehension(generators, scope);
                self.eval(key, inner);
                self.eval(value, inner);
                Type::Instance(self.builtins.dict)
            }

            // yielded values count towards the function's return type
            Expr::Yield { value, .. } => {
                let yielded = match value {
                    Some(value) => self.eval(value, scope),
                    None => Type::Primitive(Prim::None),
                };
                self.add_return(yielded);
                Type::Unknown
            }
            Expr::YieldFrom { value, .. } => {
                self.eval(value, scope);
                Type::Unknown
            }
            Expr::Await { value, .. } => self.eval(value, scope),
            Expr::Starred { value, .. } => {
                self.eval(value, scope);
                Type::Unknown
            }
            Expr::NamedExpr { target, value, .. } => {
                let ty = self.eval(value, scope);
                let block = self.scopes.enclosing_block(scope);
                self.bind_name(
                    block,
                    &target.name,
                    &target.span,
                    ty.clone(),
                    BindingKind::Variable,
                );
                ty
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr], scope: ScopeId) {
        for expr in exprs {
            self.eval(expr, scope);
        }
    }

    fn lookup_name(&mut self, name: &str, site: &Span, scope: ScopeId) -> Type {
        let Some(ids) = self.scopes.lookup(scope, name).map(<[BindingId]>::to_vec) else {
            self.unresolved.insert(site.clone(), name.to_string());
            return Type::Unknown;
        };
        self.put_ref(site, &ids);
        self.resolved.insert(site.clone());
        Type::union(ids.iter().map(|&id| self.scopes.binding(id).ty.clone()))
    }

    /// Scope for the targets of a comprehension's `for` clauses
    fn comprehension(&mut self, generators: &[Comprehension], scope: ScopeId) -> ScopeId {
        let path = self.scopes.scope(scope).path.clone();
        let inner = self.scopes.new_scope(ScopeKind::Scope, scope, path);
        for generator in generators {
            let iterable = self.eval(&generator.iter, inner);
            let element = self.element_type(&iterable);
            self.bind_target(&generator.target, element, inner);
            self.eval_all(&generator.ifs, inner);
        }
        inner
    }

    /// Type of the items produced by iterating over `ty`
    pub(crate) fn element_type(&self, ty: &Type) -> Type {
        Type::union(ty.members().into_iter().map(|member| match member {
            Type::Primitive(Prim::Str) => Type::Primitive(Prim::Str),
            Type::Primitive(Prim::Bytes) => Type::Primitive(Prim::Int),
            Type::Instance(c) if *c == self.builtins.range => Type::Primitive(Prim::Int),
            _ => Type::Unknown,
        }))
    }

    fn subscript(&mut self, container: &Type, index: &Expr, key: Type) -> Type {
        let is_slice = matches!(index, Expr::Slice { .. });
        let members: Vec<Type> = container.members().into_iter().cloned().collect();
        let mut results = Vec::with_capacity(members.len());
        for member in members {
            let ty = match &member {
                Type::Primitive(Prim::Str) => member.clone(),
                Type::Primitive(Prim::Bytes) if is_slice => member.clone(),
                Type::Primitive(Prim::Bytes) => Type::Primitive(Prim::Int),
                Type::Instance(c)
                    if is_slice && (*c == self.builtins.list || *c == self.builtins.tuple) =>
                {
                    member.clone()
                }
                Type::Instance(c) if !self.types.class(*c).builtin => {
                    let args = CallArgs {
                        positional: vec![key.clone()],
                        ..CallArgs::default()
                    };
                    self.call_method(&member, "__getitem__", &args)
                        .unwrap_or(Type::Unknown)
                }
                _ => Type::Unknown,
            };
            results.push(ty);
        }
        Type::union(results)
    }

    /// Bindings of attribute `name` on a value of type `ty`
    pub(crate) fn attribute_bindings(&self, ty: &Type, name: &str) -> Option<Vec<BindingId>> {
        match ty {
            Type::Module(id) => self
                .scopes
                .lookup_local(self.types.module(*id).scope, name)
                .map(<[BindingId]>::to_vec),
            Type::Class(id) | Type::Instance(id) => self.class_attribute(*id, name),
            Type::Primitive(prim) => self.class_attribute(self.builtins.prim_class(*prim), name),
            _ => None,
        }
    }

    /// Look `name` up in a class and then its bases, depth first in base order
    pub(crate) fn class_attribute(&self, class: ClassId, name: &str) -> Option<Vec<BindingId>> {
        let mut visited = HashSet::new();
        self.class_attribute_in(class, name, &mut visited)
    }

    fn class_attribute_in(
        &self,
        class: ClassId,
        name: &str,
        visited: &mut HashSet<ClassId>,
    ) -> Option<Vec<BindingId>> {
        if !visited.insert(class) {
            return None;
        }
        let ty = self.types.class(class);
        if let Some(ids) = self.scopes.lookup_local(ty.scope, name) {
            return Some(ids.to_vec());
        }
        for base in &ty.bases {
            for member in base.members() {
                if let Type::Class(base) = member {
                    if let Some(ids) = self.class_attribute_in(*base, name, visited) {
                        return Some(ids);
                    }
                }
            }
        }
        if ty.bases.is_empty() && class != self.builtins.object {
            return self.class_attribute_in(self.builtins.object, name, visited);
        }
        None
    }

    fn get_attribute(&mut self, receiver: &Type, attr: &Ident) -> Type {
        let members: Vec<Type> = receiver.members().into_iter().cloned().collect();
        let mut results = Vec::new();
        for member in members {
            let Some(ids) = self.attribute_bindings(&member, &attr.name) else {
                continue;
            };
            self.put_ref(&attr.span, &ids);
            for id in ids {
                let ty = self.scopes.binding(id).ty.clone();
                let ty = match ty {
                    Type::Function(f)
                        if matches!(member, Type::Instance(_))
                            && self.types.fun(f).method == MethodKind::Property =>
                    {
                        self.call_function(f, Some(&member), &CallArgs::default())
                    }
                    other => other,
                };
                results.push(ty);
            }
        }
        Type::union(results)
    }

    /// `receiver.attr = value`
    pub(crate) fn set_attribute(&mut self, receiver: &Type, attr: &Ident, value: Type) {
        let members: Vec<Type> = receiver.members().into_iter().cloned().collect();
        for member in members {
            let scope = match member {
                Type::Instance(c) | Type::Class(c) if !self.types.class(c).builtin => {
                    self.types.class(c).scope
                }
                Type::Module(m) if self.types.module(m).file.is_some() => {
                    self.types.module(m).scope
                }
                _ => continue,
            };
            self.bind(
                scope,
                &attr.name,
                &attr.span,
                value.clone(),
                BindingKind::Attribute,
            );
        }
    }

    fn eval_args(&mut self, args: &[Arg], scope: ScopeId) -> CallArgs {
        let mut call = CallArgs::default();
        for arg in args {
            match arg {
                Arg::Positional(value) => {
                    let ty = self.eval(value, scope);
                    call.positional.push(ty);
                }
                Arg::Keyword { name, value } => {
                    let ty = self.eval(value, scope);
                    call.keywords.push((name.name.clone(), ty));
                }
                Arg::Star(value) | Arg::DoubleStar(value) => {
                    self.eval(value, scope);
                    call.spread = true;
                }
            }
        }
        call
    }

    fn visit_call(&mut self, func: &Expr, args: &[Arg], scope: ScopeId) -> Type {
        match func {
            Expr::Attribute { value, attr, .. } => {
                let receiver = self.eval(value, scope);
                let args = self.eval_args(args, scope);
                self.call_attribute(&receiver, attr, &args)
            }
            _ => {
                let callee = self.eval(func, scope);
                let args = self.eval_args(args, scope);
                self.call_type(&callee, &args)
            }
        }
    }

    /// `receiver.attr(args)`; methods found on the receiver's class get it as `self`
    fn call_attribute(&mut self, receiver: &Type, attr: &Ident, args: &CallArgs) -> Type {
        let members: Vec<Type> = receiver.members().into_iter().cloned().collect();
        let mut results = Vec::new();
        for member in members {
            let Some(ids) = self.attribute_bindings(&member, &attr.name) else {
                continue;
            };
            self.put_ref(&attr.span, &ids);
            for id in ids {
                let binding = self.scopes.binding(id);
                let (ty, kind) = (binding.ty.clone(), binding.kind);
                let result = match ty {
                    Type::Function(f) if kind == BindingKind::Function => {
                        self.call_function(f, Some(&member), args)
                    }
                    other => self.call_type(&other, args),
                };
                results.push(result);
            }
        }
        Type::union(results)
    }

    /// Call a value of type `callee`, member by member
    fn call_type(&mut self, callee: &Type, args: &CallArgs) -> Type {
        let members: Vec<Type> = callee.members().into_iter().cloned().collect();
        let mut results = Vec::with_capacity(members.len());
        for member in members {
            let result = match &member {
                Type::Function(f) => self.call_function(*f, None, args),
                Type::Class(c) => self.instantiate(*c, args),
                Type::Instance(c) if !self.types.class(*c).builtin => self
                    .call_method(&member, "__call__", args)
                    .unwrap_or(Type::Unknown),
                _ => Type::Unknown,
            };
            results.push(result);
        }
        Type::union(results)
    }

    /// Call the method `name` found on `receiver`, if there is one
    pub(crate) fn call_method(
        &mut self,
        receiver: &Type,
        name: &str,
        args: &CallArgs,
    ) -> Option<Type> {
        let ids = self.attribute_bindings(receiver, name)?;
        let mut results = Vec::new();
        for id in ids {
            let ty = self.scopes.binding(id).ty.clone();
            if let Type::Function(f) = ty {
                results.push(self.call_function(f, Some(receiver), args));
            }
        }
        (!results.is_empty()).then(|| Type::union(results))
    }

    /// Resolve the receiver a function gets from its decorators, then apply it
    fn call_function(&mut self, fun: FunId, receiver: Option<&Type>, args: &CallArgs) -> Type {
        let (owner, method) = {
            let ty = self.types.fun(fun);
            (ty.owner, ty.method)
        };
        let self_arg = match (owner, method, receiver) {
            (None, _, _) | (Some(_), MethodKind::Static, _) => None,
            (Some(_), MethodKind::Class, Some(Type::Instance(c) | Type::Class(c))) => {
                Some(Type::Class(*c))
            }
            (Some(owner), MethodKind::Class, _) => Some(Type::Class(owner)),
            // `A.method(obj)` passes the receiver explicitly
            (Some(_), _, Some(Type::Class(_))) => None,
            (Some(_), _, receiver) => receiver.cloned(),
        };
        if let Some(instance @ Type::Instance(_)) = &self_arg {
            let fun = self.types.fun_mut(fun);
            fun.self_type = Some(match fun.self_type.take() {
                Some(seen) => seen.merge(instance),
                None => instance.clone(),
            });
        }
        self.apply(fun, self_arg, args)
    }

    /// `C(args)`: run `__init__` on a fresh instance
    fn instantiate(&mut self, class: ClassId, args: &CallArgs) -> Type {
        if let Some(prim) = self.types.class(class).prim {
            return Type::Primitive(prim);
        }
        let instance = Type::Instance(class);
        for id in self.class_attribute(class, "__init__").unwrap_or_default() {
            let ty = self.scopes.binding(id).ty.clone();
            if let Type::Function(init) = ty {
                self.apply(init, Some(instance.clone()), args);
            }
        }
        instance
    }

    /// Interpret a function body with its parameters bound to argument types
    ///
    /// Results are memoized per parameter signature. Applying the same
    /// definition to a signature already in progress further up the call
    /// stack yields `Unknown`; classes and functions in the signature compare
    /// by definition site, so bodies that build a new closure or class on
    /// every call still terminate.
    pub(crate) fn apply(&mut self, fun: FunId, self_arg: Option<Type>, args: &CallArgs) -> Type {
        let (def, defaults, closure, qname) = {
            let ty = self.types.fun(fun);
            match &ty.body {
                FunBody::Native(NativeReturn::Fixed(ret)) => return ret.clone(),
                FunBody::Native(NativeReturn::FirstArgument) => {
                    return args.positional.first().cloned().unwrap_or(Type::Unknown)
                }
                FunBody::Source(def) => (
                    Rc::clone(def),
                    ty.defaults.clone(),
                    ty.closure,
                    ty.qname.clone(),
                ),
            }
        };

        let signature = self.bind_params(&def, &defaults, self_arg, args);
        if let Some(ret) = self.types.fun(fun).arrows.get(&signature) {
            return ret.clone();
        }
        let key = (
            def.span.clone(),
            signature
                .iter()
                .map(|t| self.types.site_type(t))
                .collect::<Vec<_>>(),
        );
        if self.call_stack.contains(&key) {
            return Type::Unknown;
        }

        self.types.fun_mut(fun).called = true;
        self.remove_uncalled(fun);
        self.n_called += 1;
        self.call_stack.insert(key.clone());

        let body = self.scopes.new_scope(ScopeKind::Function, closure, qname);
        for (param, ty) in def.params.iter().zip(&signature) {
            self.bind(
                body,
                &param.name.name,
                &param.name.span,
                ty.clone(),
                BindingKind::Parameter,
            );
        }

        // relative imports in the body resolve against the defining file
        let saved_cwd = self
            .cwd
            .replace(def.span.file.parent().map(Path::to_path_buf).unwrap_or_default());
        self.frames.push(Frame::default());
        self.visit_block(&def.body, body);
        let frame = self.frames.pop().unwrap_or_default();
        self.cwd = saved_cwd;

        let ret = frame.ret.unwrap_or(Type::Primitive(Prim::None));
        self.call_stack.remove(&key);
        self.types
            .fun_mut(fun)
            .arrows
            .insert(signature, ret.clone());
        ret
    }

    /// Parameter types for one call: positional, then keyword, then default
    fn bind_params(
        &self,
        def: &FunctionDef,
        defaults: &[Option<Type>],
        self_arg: Option<Type>,
        args: &CallArgs,
    ) -> Vec<Type> {
        let mut positional = self_arg.into_iter().chain(args.positional.iter().cloned());
        let mut keywords = args.clone();
        // a spread argument may have supplied anything we could not match
        let default = |i: usize| match defaults.get(i).cloned().flatten() {
            Some(ty) if !args.spread => ty,
            _ => Type::Unknown,
        };

        def.params
            .iter()
            .enumerate()
            .map(|(i, param)| match param.kind {
                ParamKind::Positional => positional
                    .next()
                    .or_else(|| keywords.take_keyword(&param.name.name))
                    .unwrap_or_else(|| default(i)),
                ParamKind::VarArgs => {
                    positional.by_ref().for_each(drop);
                    Type::Instance(self.builtins.tuple)
                }
                ParamKind::KeywordOnly => keywords
                    .take_keyword(&param.name.name)
                    .unwrap_or_else(|| default(i)),
                ParamKind::KwArgs => Type::Instance(self.builtins.dict),
            })
            .collect()
    }

    /// Apply a function no call site reached, with `Unknown` for every argument
    pub(crate) fn apply_placeholder(&mut self, fun: FunId) {
        let ty = self.types.fun(fun);
        let Some(def) = ty.source().cloned() else {
            return;
        };
        let receiver = match (ty.owner, ty.method) {
            (Some(owner), MethodKind::Instance | MethodKind::Property) => Some(
                ty.self_type
                    .clone()
                    .unwrap_or(Type::Instance(owner)),
            ),
            (Some(owner), MethodKind::Class) => Some(Type::Class(owner)),
            _ => None,
        };
        log::debug!("applying uncalled function {}", ty.qname);

        let skip = usize::from(receiver.is_some());
        let args = CallArgs {
            positional: def
                .params
                .iter()
                .filter(|p| p.kind == ParamKind::Positional)
                .skip(skip)
                .map(|_| Type::Unknown)
                .collect(),
            keywords: def
                .params
                .iter()
                .filter(|p| p.kind == ParamKind::KeywordOnly)
                .map(|p| (p.name.name.clone(), Type::Unknown))
                .collect(),
            spread: false,
        };
        self.apply(fun, receiver, &args);
    }
}

/// Result type of a unary operator
fn unary(op: UnaryOperator, operand: &Type) -> Type {
    if op == UnaryOperator::Not {
        return Type::Primitive(Prim::Bool);
    }
    Type::union(operand.members().into_iter().map(|member| match (op, member) {
        (_, Type::Primitive(Prim::Bool)) => Type::Primitive(Prim::Int),
        (UnaryOperator::Invert, Type::Primitive(Prim::Int)) => Type::Primitive(Prim::Int),
        (
            UnaryOperator::Neg | UnaryOperator::Pos,
            Type::Primitive(p @ (Prim::Int | Prim::Float | Prim::Complex)),
        ) => Type::Primitive(*p),
        _ => Type::Unknown,
    }))
}

#[cfg(test)]
#[path = "expr_tests.rs"]
mod tests;
