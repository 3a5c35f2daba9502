//! Lexical scope tree
//!
//! Scopes form a tree rooted at the global scope. Each scope can carry
//! local value bindings, type bindings, singleton objects, and free
//! functions; class and method scopes additionally expose their generic
//! parameters to everything nested inside them. Closure scopes are marked
//! as boundaries so the analyzer can tell a plain local reference from a
//! capture.

use std::collections::HashMap;

use crate::ast::Span;
use crate::error::{CompileError, ErrorCode, Result};
use crate::types::{Field, GenericParam, Method, TypeId, TypePool};

/// Index of a scope in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A value binding: local variable, parameter, or `let`
#[derive(Debug, Clone)]
pub struct LocalSymbol {
    pub ty: TypeId,
    pub mutable: bool,
    pub is_param: bool,
    pub span: Span,
}

/// One scope in the tree
#[derive(Debug, Default)]
pub struct ScopeData {
    pub parent: Option<ScopeId>,
    /// Set for the scope introduced by a class body
    pub class: Option<TypeId>,
    /// Generic parameters of the enclosing method signature
    pub method_type_params: Vec<GenericParam>,
    /// True for closure body scopes; lookups that cross this line are captures
    pub closure_boundary: bool,
    locals: HashMap<String, LocalSymbol>,
    types: HashMap<String, TypeId>,
    objects: HashMap<String, TypeId>,
    functions: HashMap<String, Vec<Method>>,
}

/// Where a function lookup found its candidates
#[derive(Debug, Clone)]
pub enum FunctionHit {
    /// Methods on the enclosing class chain; the call goes through `this`
    Member { class: TypeId, methods: Vec<Method> },
    /// Free functions bound directly in a scope
    Free { methods: Vec<Method> },
}

impl FunctionHit {
    pub fn methods(&self) -> &[Method] {
        match self {
            Self::Member { methods, .. } => methods,
            Self::Free { methods } => methods,
        }
    }
}

/// The whole scope tree; scopes are never removed
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<ScopeData>,
}

impl ScopeTree {
    /// Create a tree containing only the root (global) scope
    pub fn new() -> Self {
        Self {
            scopes: vec![ScopeData::default()],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Open a plain child scope
    pub fn push(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeData {
            parent: Some(parent),
            ..ScopeData::default()
        });
        id
    }

    /// Open a class-body scope
    pub fn push_class(&mut self, parent: ScopeId, class: TypeId) -> ScopeId {
        let id = self.push(parent);
        self.scope_mut(id).class = Some(class);
        id
    }

    /// Open a method-body scope carrying the method's generic parameters
    pub fn push_method(&mut self, parent: ScopeId, type_params: Vec<GenericParam>) -> ScopeId {
        let id = self.push(parent);
        self.scope_mut(id).method_type_params = type_params;
        id
    }

    /// Open a closure-body scope
    pub fn push_closure(&mut self, parent: ScopeId) -> ScopeId {
        let id = self.push(parent);
        self.scope_mut(id).closure_boundary = true;
        id
    }

    pub fn scope(&self, id: ScopeId) -> &ScopeData {
        &self.scopes[id.index()]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut ScopeData {
        &mut self.scopes[id.index()]
    }

    /// Bind a local value name. Shadowing an outer binding is fine;
    /// rebinding within the same scope is a front-end bug.
    pub fn declare_local(
        &mut self,
        scope: ScopeId,
        name: impl Into<String>,
        symbol: LocalSymbol,
    ) -> Result<()> {
        let name = name.into();
        let locals = &mut self.scope_mut(scope).locals;
        if locals.contains_key(&name) {
            return Err(CompileError::internal(
                ErrorCode::DuplicateSymbol,
                format!("`{name}` is already bound in this scope"),
            ));
        }
        locals.insert(name, symbol);
        Ok(())
    }

    /// Bind a type name; returns false when the name was already taken
    pub fn bind_type(&mut self, scope: ScopeId, name: impl Into<String>, ty: TypeId) -> bool {
        let name = name.into();
        let types = &mut self.scope_mut(scope).types;
        if types.contains_key(&name) {
            return false;
        }
        types.insert(name, ty);
        true
    }

    /// Bind a singleton object name; returns false on collision
    pub fn bind_object(&mut self, scope: ScopeId, name: impl Into<String>, ty: TypeId) -> bool {
        let name = name.into();
        let objects = &mut self.scope_mut(scope).objects;
        if objects.contains_key(&name) {
            return false;
        }
        objects.insert(name, ty);
        true
    }

    /// Register a free function; overloads accumulate under one name
    pub fn add_function(&mut self, scope: ScopeId, method: Method) {
        self.scope_mut(scope)
            .functions
            .entry(method.name.clone())
            .or_default()
            .push(method);
    }

    /// Innermost local binding visible from `from`
    pub fn lookup_local(&self, from: ScopeId, name: &str) -> Option<&LocalSymbol> {
        self.lookup_local_with_scope(from, name).map(|(_, s)| s)
    }

    /// Like `lookup_local` but also reports the defining scope, which the
    /// closure pass needs to detect captures.
    pub fn lookup_local_with_scope(
        &self,
        from: ScopeId,
        name: &str,
    ) -> Option<(ScopeId, &LocalSymbol)> {
        let mut cur = Some(from);
        while let Some(id) = cur {
            if let Some(sym) = self.scope(id).locals.get(name) {
                return Some((id, sym));
            }
            cur = self.scope(id).parent;
        }
        None
    }

    /// True when walking from `from` up to `target` crosses at least one
    /// closure boundary, i.e. a binding found in `target` is a capture.
    pub fn crosses_closure_boundary(&self, from: ScopeId, target: ScopeId) -> bool {
        let mut cur = from;
        while cur != target {
            if self.scope(cur).closure_boundary {
                return true;
            }
            match self.scope(cur).parent {
                Some(p) => cur = p,
                None => return false,
            }
        }
        false
    }

    /// Resolve a type name: method generic parameters shadow class generic
    /// parameters, which shadow ordinary type bindings; then outward.
    pub fn lookup_type(&self, pool: &TypePool, from: ScopeId, name: &str) -> Option<TypeId> {
        let mut cur = Some(from);
        while let Some(id) = cur {
            let scope = self.scope(id);
            if let Some(p) = scope.method_type_params.iter().find(|p| p.name == name) {
                return Some(p.ty);
            }
            if let Some(class) = scope.class {
                if let Some(p) = pool.data(class).type_params.iter().find(|p| p.name == name) {
                    return Some(p.ty);
                }
            }
            if let Some(ty) = scope.types.get(name) {
                return Some(*ty);
            }
            cur = scope.parent;
        }
        None
    }

    /// Resolve a singleton object name
    pub fn lookup_object(&self, from: ScopeId, name: &str) -> Option<TypeId> {
        let mut cur = Some(from);
        while let Some(id) = cur {
            if let Some(ty) = self.scope(id).objects.get(name) {
                return Some(*ty);
            }
            cur = self.scope(id).parent;
        }
        None
    }

    /// Innermost class a scope is nested in
    pub fn enclosing_class(&self, from: ScopeId) -> Option<TypeId> {
        let mut cur = Some(from);
        while let Some(id) = cur {
            if let Some(class) = self.scope(id).class {
                return Some(class);
            }
            cur = self.scope(id).parent;
        }
        None
    }

    /// Field of the enclosing class (or its bases) visible as a bare name
    pub fn lookup_field(
        &self,
        pool: &mut TypePool,
        from: ScopeId,
        name: &str,
    ) -> Result<Option<Field>> {
        match self.enclosing_class(from) {
            Some(class) => pool.field_named(class, name),
            None => Ok(None),
        }
    }

    /// Resolve a bare call name. Class methods on the innermost enclosing
    /// class win over free functions bound further out.
    pub fn lookup_functions(
        &self,
        pool: &mut TypePool,
        from: ScopeId,
        name: &str,
    ) -> Result<Option<FunctionHit>> {
        let mut cur = Some(from);
        while let Some(id) = cur {
            let scope = self.scope(id);
            if let Some(class) = scope.class {
                let methods = pool.methods_named(class, name)?;
                if !methods.is_empty() {
                    return Ok(Some(FunctionHit::Member { class, methods }));
                }
            }
            if let Some(methods) = scope.functions.get(name) {
                return Ok(Some(FunctionHit::Free {
                    methods: methods.clone(),
                }));
            }
            cur = scope.parent;
        }
        Ok(None)
    }

    /// All generic parameters visible from `from`, outermost first. Closure
    /// boundaries do not hide type parameters.
    pub fn visible_type_params(&self, pool: &TypePool, from: ScopeId) -> Vec<GenericParam> {
        let mut chain = Vec::new();
        let mut cur = Some(from);
        while let Some(id) = cur {
            chain.push(id);
            cur = self.scope(id).parent;
        }
        let mut out = Vec::new();
        for id in chain.into_iter().rev() {
            let scope = self.scope(id);
            if let Some(class) = scope.class {
                out.extend(pool.data(class).type_params.iter().cloned());
            }
            out.extend(scope.method_type_params.iter().cloned());
        }
        out
    }

    /// Every value name visible from `from`, for suggestion hints
    pub fn visible_local_names(&self, from: ScopeId) -> Vec<String> {
        let mut out = Vec::new();
        let mut cur = Some(from);
        while let Some(id) = cur {
            out.extend(self.scope(id).locals.keys().cloned());
            cur = self.scope(id).parent;
        }
        out
    }

    /// Every type name visible from `from`, for suggestion hints
    pub fn visible_type_names(&self, pool: &TypePool, from: ScopeId) -> Vec<String> {
        let mut out = Vec::new();
        let mut cur = Some(from);
        while let Some(id) = cur {
            let scope = self.scope(id);
            out.extend(scope.method_type_params.iter().map(|p| p.name.clone()));
            if let Some(class) = scope.class {
                out.extend(pool.data(class).type_params.iter().map(|p| p.name.clone()));
            }
            out.extend(scope.types.keys().cloned());
            cur = scope.parent;
        }
        out
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}
