//! Semantic analysis
//!
//! Analysis runs as a sequence of whole-program passes over the AST:
//! declare types, wire the inheritance graph, resolve field and method
//! signatures, then type-check bodies. The passes share one type pool and
//! one scope tree; by the time bodies are checked, every cross-class
//! reference can be resolved. Body checking lowers expressions into the
//! typed IR, desugaring closures and match expressions on the way.

pub mod closure;
pub mod infer;
pub mod overload;
pub mod pattern;

use std::collections::HashMap;

use crate::ast::{
    BaseRef, BinOp, ClassDecl, Decl, Expr, FieldDecl, Member, MethodDecl, Program, Span, Spanned,
    TypeRef, UnOp,
};
use crate::error::{CompileError, CompileWarning, ErrorCode, Result};
use crate::hir::{TExpr, TExprKind, TypedField, TypedMethod};
use crate::scope::{FunctionHit, LocalSymbol, ScopeId, ScopeTree};
use crate::types::builtins::Builtins;
use crate::types::{
    Field, FieldFlags, GenericParamDecl, Method, MethodFlags, Param, TypeId, TypeKind, TypePool,
};
use crate::util::{find_similar_name, format_suggestion_hint};

use overload::resolve_overload;

/// Everything the back-end needs from a successful analysis
#[derive(Debug)]
pub struct Analysis {
    pub pool: TypePool,
    pub builtins: Builtins,
    pub typed_methods: Vec<TypedMethod>,
    pub typed_fields: Vec<TypedField>,
    pub warnings: Vec<CompileWarning>,
}

/// Analyze a whole program
pub fn analyze(program: &Program) -> Result<Analysis> {
    let mut analyzer = Analyzer::new();
    analyzer.run(program)?;
    Ok(Analysis {
        pool: analyzer.pool,
        builtins: analyzer.builtins,
        typed_methods: analyzer.typed_methods,
        typed_fields: analyzer.typed_fields,
        warnings: analyzer.warnings,
    })
}

/// Tracks reads and writes of local bindings to warn about unused ones.
/// Frames follow block scopes; names of synthesized temporaries (angle
/// brackets) and deliberately-ignored bindings (underscore prefix) are
/// exempt.
#[derive(Debug, Default)]
struct BindingTracker {
    frames: Vec<Vec<BindingEntry>>,
}

#[derive(Debug)]
struct BindingEntry {
    name: String,
    span: Span,
    mutable: bool,
    read: bool,
    written: bool,
}

impl BindingTracker {
    fn open(&mut self) {
        self.frames.push(Vec::new());
    }

    fn declare(&mut self, name: &str, span: Span, mutable: bool) {
        if name.starts_with('_') || name.starts_with('<') {
            return;
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.push(BindingEntry {
                name: name.to_string(),
                span,
                mutable,
                read: false,
                written: false,
            });
        }
    }

    fn mark_read(&mut self, name: &str) {
        for frame in self.frames.iter_mut().rev() {
            if let Some(entry) = frame.iter_mut().rev().find(|e| e.name == name) {
                entry.read = true;
                return;
            }
        }
    }

    fn mark_written(&mut self, name: &str) {
        for frame in self.frames.iter_mut().rev() {
            if let Some(entry) = frame.iter_mut().rev().find(|e| e.name == name) {
                entry.written = true;
                return;
            }
        }
    }

    fn close(&mut self, warnings: &mut Vec<CompileWarning>) {
        if let Some(frame) = self.frames.pop() {
            for entry in frame {
                if !entry.read {
                    warnings.push(CompileWarning::UnusedBinding {
                        name: entry.name,
                        span: entry.span,
                    });
                } else if entry.mutable && !entry.written {
                    warnings.push(CompileWarning::NeverMutated {
                        name: entry.name,
                        span: entry.span,
                    });
                }
            }
        }
    }
}

pub(crate) struct Analyzer {
    pub(crate) pool: TypePool,
    pub(crate) builtins: Builtins,
    pub(crate) scopes: ScopeTree,
    pub(crate) global: ScopeId,
    pub(crate) typed_methods: Vec<TypedMethod>,
    pub(crate) typed_fields: Vec<TypedField>,
    pub(crate) warnings: Vec<CompileWarning>,
    bindings: BindingTracker,
    /// Owner of free functions
    package: TypeId,
    class_scopes: HashMap<TypeId, ScopeId>,
    closure_count: u32,
    temp_count: u32,
}

impl Analyzer {
    pub(crate) fn new() -> Self {
        let mut pool = TypePool::new();
        let builtins = Builtins::install(&mut pool);
        let mut scopes = ScopeTree::new();
        let global = scopes.root();

        for ty in builtins.named_types() {
            let name = pool.data(ty).name.clone();
            scopes.bind_type(global, name, ty);
        }
        scopes.bind_object(global, "Predef", builtins.predef);
        for m in pool.data(builtins.predef).methods.clone() {
            scopes.add_function(global, m);
        }

        let package = pool.define("<package>", TypeKind::Object);
        pool.data_mut(package).is_synthetic = true;
        pool.data_mut(package).base = Some(builtins.any_ref);

        Self {
            pool,
            builtins,
            scopes,
            global,
            typed_methods: Vec::new(),
            typed_fields: Vec::new(),
            warnings: Vec::new(),
            bindings: BindingTracker::default(),
            package,
            class_scopes: HashMap::new(),
            closure_count: 0,
            temp_count: 0,
        }
    }

    pub(crate) fn run(&mut self, program: &Program) -> Result<()> {
        let ids = self.declare_types(program)?;
        self.wire_hierarchy(program, &ids)?;
        self.resolve_signatures(program, &ids)?;
        self.check_field_initializers(program, &ids)?;
        self.check_bodies(program, &ids)?;
        Ok(())
    }

    // ----- pass 1: type declaration -----

    fn declare_types(&mut self, program: &Program) -> Result<Vec<TypeId>> {
        let mut ids = Vec::with_capacity(program.decls.len());
        for decl in &program.decls {
            match decl {
                Decl::Class(c) | Decl::Object(c) | Decl::Trait(c) => {
                    let kind = match decl {
                        Decl::Object(_) => TypeKind::Object,
                        Decl::Trait(_) => TypeKind::Trait,
                        _ => TypeKind::Class,
                    };
                    let id = self.pool.define(c.name.node.clone(), kind);
                    {
                        let data = self.pool.data_mut(id);
                        data.is_abstract = c.mods.abstract_ || kind == TypeKind::Trait;
                        data.is_sealed = c.mods.sealed;
                        data.is_private = c.mods.private;
                    }
                    if !self.scopes.bind_type(self.global, c.name.node.clone(), id) {
                        return Err(CompileError::duplicate_definition(&c.name.node, c.name.span));
                    }
                    if kind == TypeKind::Object
                        && !self.scopes.bind_object(self.global, c.name.node.clone(), id)
                    {
                        return Err(CompileError::duplicate_definition(&c.name.node, c.name.span));
                    }
                    ids.push(id);
                }
                Decl::Function(_) => ids.push(self.package),
            }
        }
        Ok(ids)
    }

    // ----- pass 2: generic parameters and inheritance -----

    fn wire_hierarchy(&mut self, program: &Program, ids: &[TypeId]) -> Result<()> {
        for (decl, &id) in program.decls.iter().zip(ids) {
            let c = match decl {
                Decl::Class(c) | Decl::Object(c) | Decl::Trait(c) => c,
                Decl::Function(_) => continue,
            };
            let class_scope = self.scopes.push_class(self.global, id);
            self.class_scopes.insert(id, class_scope);

            if !c.type_params.is_empty() {
                let decls: Vec<GenericParamDecl> = c
                    .type_params
                    .iter()
                    .map(|p| GenericParamDecl::with_variance(p.name.node.clone(), p.variance.into()))
                    .collect();
                let params = self.pool.define_generic_params(id, &decls)?;
                // Bounds may reference sibling parameters, so they resolve
                // after all parameters exist.
                for (i, p) in c.type_params.iter().enumerate() {
                    if let Some(bound) = &p.upper_bound {
                        let bound_ty = self.resolve_type_ref(class_scope, bound)?;
                        self.pool.data_mut(id).type_params[i].upper_bound = Some(bound_ty);
                        let param_data = self.pool.data_mut(params[i].ty);
                        param_data.upper_bound = Some(bound_ty);
                        // The bound doubles as the parameter's base, making
                        // its members visible and the parameter assignable
                        // at the bound.
                        param_data.base = Some(bound_ty);
                    }
                }
            }

            let base = match &c.base {
                Some(base_ref) => self.resolve_type_ref(class_scope, &base_ref.ty)?,
                None => self.builtins.any_ref,
            };
            self.pool.data_mut(id).base = Some(base);

            let mut interfaces = Vec::with_capacity(c.interfaces.len());
            for iface in &c.interfaces {
                interfaces.push(self.resolve_type_ref(class_scope, iface)?);
            }
            self.pool.data_mut(id).interfaces = interfaces;
        }
        Ok(())
    }

    // ----- pass 3: signatures -----

    fn resolve_signatures(&mut self, program: &Program, ids: &[TypeId]) -> Result<()> {
        for (decl, &id) in program.decls.iter().zip(ids) {
            match decl {
                Decl::Class(c) | Decl::Object(c) | Decl::Trait(c) => {
                    self.resolve_class_signatures(c, id, matches!(decl, Decl::Trait(_)))?
                }
                Decl::Function(f) => {
                    let method = self.resolve_method_signature(f, self.package, self.global, true)?;
                    self.scopes.add_function(self.global, method.clone());
                    self.pool.data_mut(self.package).methods.push(method);
                }
            }
        }
        Ok(())
    }

    fn resolve_class_signatures(&mut self, c: &ClassDecl, id: TypeId, is_trait: bool) -> Result<()> {
        let class_scope = self.class_scope(id);

        // Primary-constructor parameters become fields plus the `<init>`
        // constructor.
        let mut ctor_params = Vec::with_capacity(c.params.len());
        let mut accessors = Vec::new();
        for p in &c.params {
            let ty = self.resolve_type_ref(class_scope, &p.ty)?;
            self.pool.data_mut(id).fields.push(Field {
                name: p.name.node.clone(),
                owner: id,
                flags: FieldFlags {
                    readonly: !p.mutable,
                    ..FieldFlags::default()
                },
                ty,
            });
            ctor_params.push(Param {
                name: p.name.node.clone(),
                ty,
                variadic: false,
            });
            if p.mutable {
                let (getter, setter) = Field::accessor_names(&p.name.node);
                let flags = MethodFlags {
                    synthetic: true,
                    ..MethodFlags::default()
                };
                accessors.push(Method {
                    name: getter,
                    owner: id,
                    flags,
                    type_params: Vec::new(),
                    params: Vec::new(),
                    ret: ty,
                });
                accessors.push(Method {
                    name: setter,
                    owner: id,
                    flags,
                    type_params: Vec::new(),
                    params: vec![Param {
                        name: "value".to_string(),
                        ty,
                        variadic: false,
                    }],
                    ret: self.builtins.unit,
                });
            }
        }
        if !is_trait {
            self.pool.data_mut(id).ctors.push(Method {
                name: "<init>".to_string(),
                owner: id,
                flags: MethodFlags::default(),
                type_params: Vec::new(),
                params: ctor_params,
                ret: self.builtins.unit,
            });
        }

        for member in &c.members {
            match member {
                Member::Field(f) => self.resolve_field_signature(f, id, class_scope)?,
                Member::Method(m) => {
                    let method = self.resolve_method_signature(m, id, class_scope, false)?;
                    self.pool.data_mut(id).methods.push(method);
                }
            }
        }
        // Accessors go after declared members so body checking can pair
        // declarations with methods positionally.
        self.pool.data_mut(id).methods.extend(accessors);
        Ok(())
    }

    fn resolve_field_signature(
        &mut self,
        f: &FieldDecl,
        owner: TypeId,
        class_scope: ScopeId,
    ) -> Result<()> {
        let ty = match (&f.ty, &f.value) {
            (Some(r), _) => self.resolve_type_ref(class_scope, r)?,
            // Placeholder until the initializer pass infers the type
            (None, Some(_)) => self.builtins.undefined,
            (None, None) => {
                return Err(CompileError::missing_initializer(&f.name.node, f.name.span))
            }
        };
        self.pool.data_mut(owner).fields.push(Field {
            name: f.name.node.clone(),
            owner,
            flags: FieldFlags {
                private: f.mods.private,
                static_: f.mods.static_,
                readonly: !f.mutable,
            },
            ty,
        });
        Ok(())
    }

    fn resolve_method_signature(
        &mut self,
        m: &MethodDecl,
        owner: TypeId,
        outer_scope: ScopeId,
        is_free: bool,
    ) -> Result<Method> {
        let mut method = Method {
            name: m.name.node.clone(),
            owner,
            flags: MethodFlags {
                private: m.mods.private,
                abstract_: m.mods.abstract_ || m.body.is_none(),
                override_: m.mods.override_,
                static_: m.mods.static_ || is_free,
                final_: m.mods.final_,
                synthetic: false,
            },
            type_params: Vec::new(),
            params: Vec::new(),
            ret: self.builtins.unit,
        };

        let sig_scope = if m.type_params.is_empty() {
            outer_scope
        } else {
            let decls: Vec<GenericParamDecl> = m
                .type_params
                .iter()
                .map(|p| GenericParamDecl::with_variance(p.name.node.clone(), p.variance.into()))
                .collect();
            self.pool.define_method_generic_params(&mut method, &decls)?;
            let scope = self
                .scopes
                .push_method(outer_scope, method.type_params.clone());
            for (i, p) in m.type_params.iter().enumerate() {
                if let Some(bound) = &p.upper_bound {
                    let bound_ty = self.resolve_type_ref(scope, bound)?;
                    method.type_params[i].upper_bound = Some(bound_ty);
                    let param_data = self.pool.data_mut(method.type_params[i].ty);
                    param_data.upper_bound = Some(bound_ty);
                    param_data.base = Some(bound_ty);
                }
            }
            scope
        };

        for p in &m.params {
            let ty = self.resolve_type_ref(sig_scope, &p.ty)?;
            method.params.push(Param {
                name: p.name.node.clone(),
                ty,
                variadic: p.variadic,
            });
        }
        if let Some(ret) = &m.ret {
            method.ret = self.resolve_type_ref(sig_scope, ret)?;
        }
        Ok(method)
    }

    // ----- pass 4a: field initializers -----

    fn check_field_initializers(&mut self, program: &Program, ids: &[TypeId]) -> Result<()> {
        for (decl, &id) in program.decls.iter().zip(ids) {
            let c = match decl {
                Decl::Class(c) | Decl::Object(c) | Decl::Trait(c) => c,
                Decl::Function(_) => continue,
            };
            let class_scope = self.class_scope(id);
            for member in &c.members {
                let f = match member {
                    Member::Field(f) => f,
                    Member::Method(_) => continue,
                };
                let Some(value) = &f.value else { continue };

                let init_scope = self.scopes.push(class_scope);
                let init = self.check_expr(init_scope, value)?;

                let index = self
                    .pool
                    .data(id)
                    .fields
                    .iter()
                    .position(|fd| fd.name == f.name.node);
                let Some(index) = index else { continue };
                let declared = self.pool.data(id).fields[index].ty;
                if declared == self.builtins.undefined {
                    self.pool.data_mut(id).fields[index].ty = init.ty;
                } else if !self.assignable_with_widening(declared, init.ty) {
                    return Err(CompileError::type_mismatch(
                        &self.pool.format_type(declared),
                        &self.pool.format_type(init.ty),
                        value.span,
                    ));
                }
                self.typed_fields.push(TypedField {
                    owner: id,
                    name: f.name.node.clone(),
                    init,
                });
            }
        }
        Ok(())
    }

    // ----- pass 4b: method bodies -----

    fn check_bodies(&mut self, program: &Program, ids: &[TypeId]) -> Result<()> {
        // Free functions were appended to `<package>` in declaration order
        let mut free_index = 0;
        for (decl, &id) in program.decls.iter().zip(ids) {
            match decl {
                Decl::Class(c) | Decl::Object(c) | Decl::Trait(c) => {
                    let class_scope = self.class_scope(id);
                    if let Some(base_ref) = &c.base {
                        self.check_base_ctor(id, base_ref, class_scope, matches!(decl, Decl::Trait(_)))?;
                    }
                    let mut method_index = 0;
                    for member in &c.members {
                        let m = match member {
                            Member::Method(m) => m,
                            Member::Field(_) => continue,
                        };
                        let resolved = self.pool.data(id).methods[method_index].clone();
                        method_index += 1;
                        if let Some(body) = &m.body {
                            self.check_method_body(id, &resolved, class_scope, body)?;
                        }
                    }
                }
                Decl::Function(f) => {
                    let resolved = self.pool.data(self.package).methods[free_index].clone();
                    free_index += 1;
                    if let Some(body) = &f.body {
                        self.check_method_body(self.package, &resolved, self.global, body)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Type-check an explicit base-class constructor call (`extends B(...)`)
    /// against the base's constructors and record the lowered call as the
    /// body of the synthesized `<init>`.
    fn check_base_ctor(
        &mut self,
        id: TypeId,
        base_ref: &BaseRef,
        class_scope: ScopeId,
        is_trait: bool,
    ) -> Result<()> {
        let Some(base) = self.pool.data(id).base else {
            return Ok(());
        };
        let init_scope = self.scopes.push(class_scope);
        let mut args_t = Vec::with_capacity(base_ref.args.len());
        for arg in &base_ref.args {
            args_t.push(self.check_expr(init_scope, arg)?);
        }
        let candidates = self.pool.ctors_of(base)?;
        if candidates.is_empty() && args_t.is_empty() {
            // A trait base has no constructor to call
            return Ok(());
        }
        let arg_tys: Vec<TypeId> = args_t.iter().map(|a| a.ty).collect();
        let resolved = resolve_overload(
            &mut self.pool,
            &self.builtins,
            &base_ref.ty.name.node,
            &candidates,
            &[],
            &arg_tys,
            base_ref.ty.name.span,
        )?;
        if is_trait {
            return Ok(());
        }
        let this_ty = self.self_type(id)?;
        let call = TExpr::new(
            self.builtins.unit,
            TExprKind::Call {
                target: Some(Box::new(TExpr::new(this_ty, TExprKind::This))),
                owner: resolved.method.owner,
                method: "<init>".to_string(),
                args: args_t,
            },
        );
        self.typed_methods.push(TypedMethod {
            owner: id,
            name: "<init>".to_string(),
            body: call,
        });
        Ok(())
    }

    fn check_method_body(
        &mut self,
        owner: TypeId,
        method: &Method,
        outer_scope: ScopeId,
        body: &Spanned<Expr>,
    ) -> Result<()> {
        let scope = self
            .scopes
            .push_method(outer_scope, method.type_params.clone());
        for p in &method.params {
            self.scopes.declare_local(
                scope,
                p.name.clone(),
                LocalSymbol {
                    ty: p.ty,
                    mutable: false,
                    is_param: true,
                    span: body.span,
                },
            )?;
        }

        self.bindings.open();
        let body_t = self.check_expr(scope, body)?;
        self.bindings.close(&mut self.warnings);

        if method.ret != self.builtins.unit && !self.assignable_with_widening(method.ret, body_t.ty)
        {
            return Err(CompileError::type_mismatch(
                &self.pool.format_type(method.ret),
                &self.pool.format_type(body_t.ty),
                body.span,
            ));
        }
        self.typed_methods.push(TypedMethod {
            owner,
            name: method.name.clone(),
            body: body_t,
        });
        Ok(())
    }

    // ----- expression checking -----

    pub(crate) fn check_expr(&mut self, scope: ScopeId, expr: &Spanned<Expr>) -> Result<TExpr> {
        // Deeply nested expressions recurse past the default stack
        stacker::maybe_grow(32 * 1024, 1024 * 1024, || self.check_expr_inner(scope, expr))
    }

    fn check_expr_inner(&mut self, scope: ScopeId, expr: &Spanned<Expr>) -> Result<TExpr> {
        let b = &self.builtins;
        match &expr.node {
            Expr::IntLit(v) => Ok(TExpr::new(b.int, TExprKind::Int(*v))),
            Expr::LongLit(v) => Ok(TExpr::new(b.long, TExprKind::Long(*v))),
            Expr::DoubleLit(v) => Ok(TExpr::new(b.double, TExprKind::Double(*v))),
            Expr::BoolLit(v) => Ok(TExpr::new(b.boolean, TExprKind::Bool(*v))),
            Expr::StringLit(v) => Ok(TExpr::new(b.string, TExprKind::Str(v.clone()))),
            Expr::UnitLit => Ok(TExpr::new(b.unit, TExprKind::Unit)),
            Expr::NullLit => Ok(TExpr::new(b.nothing, TExprKind::Null)),
            Expr::Ident(name) => self.check_ident(scope, name, expr.span),
            Expr::This => {
                let class = self.scopes.enclosing_class(scope).ok_or_else(|| {
                    CompileError::value_not_found("this", "", expr.span)
                })?;
                let ty = self.self_type(class)?;
                Ok(TExpr::new(ty, TExprKind::This))
            }
            Expr::Select { target, name } => self.check_select(scope, target, name),
            Expr::Binary { left, op, right } => self.check_binary(scope, left, *op, right, expr.span),
            Expr::Unary { op, expr: inner } => self.check_unary(scope, *op, inner, expr.span),
            Expr::Call {
                target,
                name,
                type_args,
                args,
            } => self.check_call(scope, target.as_deref(), name, type_args, args),
            Expr::New { ty, args } => self.check_new(scope, ty, args),
            Expr::Block(items) => self.check_block(scope, items),
            Expr::Let {
                name,
                mutable,
                ty,
                value,
            } => self.check_let(scope, name, *mutable, ty.as_ref(), value),
            Expr::Assign { target, value } => self.check_assign(scope, target, value, expr.span),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => self.check_if(scope, cond, then_branch, else_branch.as_deref(), expr.span),
            Expr::While { cond, body } => {
                let cond_t = self.check_expr(scope, cond)?;
                self.expect_boolean(&cond_t, cond.span)?;
                let body_scope = self.scopes.push(scope);
                let body_t = self.check_expr(body_scope, body)?;
                Ok(TExpr::new(
                    self.builtins.unit,
                    TExprKind::While {
                        cond: Box::new(cond_t),
                        body: Box::new(body_t),
                    },
                ))
            }
            Expr::Throw { expr: inner } => {
                let inner_t = self.check_expr(scope, inner)?;
                Ok(TExpr::new(
                    self.builtins.nothing,
                    TExprKind::Throw(Box::new(inner_t)),
                ))
            }
            Expr::Closure { params, body } => self.check_closure(scope, params, body, expr.span),
            Expr::Match { scrutinee, cases } => self.check_match(scope, scrutinee, cases, expr.span),
        }
    }

    fn check_ident(&mut self, scope: ScopeId, name: &str, span: Span) -> Result<TExpr> {
        if let Some(sym) = self.scopes.lookup_local(scope, name) {
            let ty = sym.ty;
            self.bindings.mark_read(name);
            return Ok(TExpr::new(ty, TExprKind::Local(name.to_string())));
        }
        if let Some(class) = self.scopes.enclosing_class(scope) {
            if let Some(field) = self.pool.field_named(class, name)? {
                let this_ty = self.self_type(class)?;
                return Ok(TExpr::new(
                    field.ty,
                    TExprKind::GetField {
                        target: Box::new(TExpr::new(this_ty, TExprKind::This)),
                        field: name.to_string(),
                    },
                ));
            }
        }
        if let Some(obj) = self.scopes.lookup_object(scope, name) {
            return Ok(TExpr::new(obj, TExprKind::Object(obj)));
        }
        let candidates = self.scopes.visible_local_names(scope);
        let refs: Vec<&str> = candidates.iter().map(String::as_str).collect();
        let hint = format_suggestion_hint(find_similar_name(name, &refs, 2));
        Err(CompileError::value_not_found(name, &hint, span))
    }

    fn check_select(
        &mut self,
        scope: ScopeId,
        target: &Spanned<Expr>,
        name: &Spanned<String>,
    ) -> Result<TExpr> {
        let target_t = self.check_expr(scope, target)?;
        match self.pool.field_named(target_t.ty, &name.node)? {
            Some(field) => Ok(TExpr::new(
                field.ty,
                TExprKind::GetField {
                    target: Box::new(target_t),
                    field: name.node.clone(),
                },
            )),
            None => {
                let fields = self.pool.fields_of(target_t.ty)?;
                let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
                let hint = format_suggestion_hint(find_similar_name(&name.node, &names, 2));
                Err(CompileError::value_not_found(&name.node, &hint, name.span))
            }
        }
    }

    fn check_binary(
        &mut self,
        scope: ScopeId,
        left: &Spanned<Expr>,
        op: BinOp,
        right: &Spanned<Expr>,
        span: Span,
    ) -> Result<TExpr> {
        let left_t = self.check_expr(scope, left)?;
        let right_t = self.check_expr(scope, right)?;
        let b = &self.builtins;

        let ty = if op.is_logical() {
            if left_t.ty != b.boolean || right_t.ty != b.boolean {
                return Err(CompileError::operator_not_applicable(
                    &op.to_string(),
                    &self.pool.format_type(left_t.ty),
                    &self.pool.format_type(right_t.ty),
                    span,
                ));
            }
            b.boolean
        } else if op.is_equality() {
            b.boolean
        } else if op.is_comparison() {
            self.expect_numeric_pair(&left_t, &right_t, span)?;
            b.boolean
        } else if op == BinOp::Add && (left_t.ty == b.string || right_t.ty == b.string) {
            // String concatenation accepts any right-hand side
            b.string
        } else {
            self.expect_numeric_pair(&left_t, &right_t, span)?;
            b.wider(left_t.ty, right_t.ty)
        };

        Ok(TExpr::new(
            ty,
            TExprKind::Binary {
                op,
                left: Box::new(left_t),
                right: Box::new(right_t),
            },
        ))
    }

    fn expect_numeric_pair(&self, left: &TExpr, right: &TExpr, span: Span) -> Result<()> {
        let b = &self.builtins;
        if !b.is_numeric(left.ty) && !b.is_numeric(right.ty) {
            return Err(CompileError::operator_not_applicable(
                "binary operator",
                &self.pool.format_type(left.ty),
                &self.pool.format_type(right.ty),
                span,
            ));
        }
        for side in [left, right] {
            if !b.is_numeric(side.ty) {
                return Err(CompileError::numeric_type_expected(
                    &self.pool.format_type(side.ty),
                    span,
                ));
            }
        }
        Ok(())
    }

    fn check_unary(
        &mut self,
        scope: ScopeId,
        op: UnOp,
        inner: &Spanned<Expr>,
        span: Span,
    ) -> Result<TExpr> {
        let inner_t = self.check_expr(scope, inner)?;
        let ty = match op {
            UnOp::Neg => {
                if !self.builtins.is_numeric(inner_t.ty) {
                    return Err(CompileError::numeric_type_expected(
                        &self.pool.format_type(inner_t.ty),
                        span,
                    ));
                }
                inner_t.ty
            }
            UnOp::Not => {
                self.expect_boolean(&inner_t, span)?;
                self.builtins.boolean
            }
        };
        Ok(TExpr::new(
            ty,
            TExprKind::Unary {
                op,
                expr: Box::new(inner_t),
            },
        ))
    }

    fn check_call(
        &mut self,
        scope: ScopeId,
        target: Option<&Spanned<Expr>>,
        name: &Spanned<String>,
        type_args: &[TypeRef],
        args: &[Spanned<Expr>],
    ) -> Result<TExpr> {
        let mut args_t = Vec::with_capacity(args.len());
        for arg in args {
            args_t.push(self.check_expr(scope, arg)?);
        }
        let arg_tys: Vec<TypeId> = args_t.iter().map(|a| a.ty).collect();
        let mut explicit = Vec::with_capacity(type_args.len());
        for r in type_args {
            explicit.push(self.resolve_type_ref(scope, r)?);
        }

        if let Some(target) = target {
            let target_t = self.check_expr(scope, target)?;
            let candidates = self.pool.methods_named(target_t.ty, &name.node)?;
            if candidates.is_empty() {
                let methods = self.pool.methods_of(target_t.ty)?;
                let names: Vec<&str> = methods.iter().map(|m| m.name.as_str()).collect();
                let hint = format_suggestion_hint(find_similar_name(&name.node, &names, 2));
                return Err(CompileError::value_not_found(&name.node, &hint, name.span));
            }
            let resolved = resolve_overload(
                &mut self.pool,
                &self.builtins,
                &name.node,
                &candidates,
                &explicit,
                &arg_tys,
                name.span,
            )?;
            return Ok(TExpr::new(
                resolved.method.ret,
                TExprKind::Call {
                    target: Some(Box::new(target_t)),
                    owner: resolved.method.owner,
                    method: name.node.clone(),
                    args: args_t,
                },
            ));
        }

        // A bare call name can be a function-typed local...
        if let Some(sym) = self.scopes.lookup_local(scope, &name.node) {
            let sym_ty = sym.ty;
            if self.is_callable_type(sym_ty) {
                self.bindings.mark_read(&name.node);
                let candidates = self.pool.methods_named(sym_ty, "apply")?;
                let resolved = resolve_overload(
                    &mut self.pool,
                    &self.builtins,
                    &name.node,
                    &candidates,
                    &explicit,
                    &arg_tys,
                    name.span,
                )?;
                return Ok(TExpr::new(
                    resolved.method.ret,
                    TExprKind::Call {
                        target: Some(Box::new(TExpr::new(
                            sym_ty,
                            TExprKind::Local(name.node.clone()),
                        ))),
                        owner: resolved.method.owner,
                        method: "apply".to_string(),
                        args: args_t,
                    },
                ));
            }
        }

        // ...a function-typed field of the enclosing class, which shadows
        // any same-named function further out...
        if let Some(class) = self.scopes.enclosing_class(scope) {
            if let Some(field) = self.pool.field_named(class, &name.node)? {
                if self.is_callable_type(field.ty) {
                    let field_ty = field.ty;
                    let candidates = self.pool.methods_named(field_ty, "apply")?;
                    let resolved = resolve_overload(
                        &mut self.pool,
                        &self.builtins,
                        &name.node,
                        &candidates,
                        &explicit,
                        &arg_tys,
                        name.span,
                    )?;
                    let this_ty = self.self_type(class)?;
                    let getter = TExpr::new(
                        field_ty,
                        TExprKind::GetField {
                            target: Box::new(TExpr::new(this_ty, TExprKind::This)),
                            field: name.node.clone(),
                        },
                    );
                    return Ok(TExpr::new(
                        resolved.method.ret,
                        TExprKind::Call {
                            target: Some(Box::new(getter)),
                            owner: resolved.method.owner,
                            method: "apply".to_string(),
                            args: args_t,
                        },
                    ));
                }
            }
        }

        // ...a method of an enclosing class, or a free function
        match self.scopes.lookup_functions(&mut self.pool, scope, &name.node)? {
            Some(FunctionHit::Member { class, methods }) => {
                let resolved = resolve_overload(
                    &mut self.pool,
                    &self.builtins,
                    &name.node,
                    &methods,
                    &explicit,
                    &arg_tys,
                    name.span,
                )?;
                let this_ty = self.self_type(class)?;
                Ok(TExpr::new(
                    resolved.method.ret,
                    TExprKind::Call {
                        target: Some(Box::new(TExpr::new(this_ty, TExprKind::This))),
                        owner: resolved.method.owner,
                        method: name.node.clone(),
                        args: args_t,
                    },
                ))
            }
            Some(FunctionHit::Free { methods }) => {
                let resolved = resolve_overload(
                    &mut self.pool,
                    &self.builtins,
                    &name.node,
                    &methods,
                    &explicit,
                    &arg_tys,
                    name.span,
                )?;
                Ok(TExpr::new(
                    resolved.method.ret,
                    TExprKind::Call {
                        target: None,
                        owner: resolved.method.owner,
                        method: name.node.clone(),
                        args: args_t,
                    },
                ))
            }
            None => {
                let candidates = self.scopes.visible_local_names(scope);
                let refs: Vec<&str> = candidates.iter().map(String::as_str).collect();
                let hint = format_suggestion_hint(find_similar_name(&name.node, &refs, 2));
                Err(CompileError::value_not_found(&name.node, &hint, name.span))
            }
        }
    }

    fn is_callable_type(&self, ty: TypeId) -> bool {
        let def = self.pool.data(ty).definition.unwrap_or(ty);
        self.builtins.functions.contains(&def) || self.builtins.actions.contains(&def)
    }

    fn check_new(&mut self, scope: ScopeId, ty: &TypeRef, args: &[Spanned<Expr>]) -> Result<TExpr> {
        let mut args_t = Vec::with_capacity(args.len());
        for arg in args {
            args_t.push(self.check_expr(scope, arg)?);
        }
        let arg_tys: Vec<TypeId> = args_t.iter().map(|a| a.ty).collect();
        let span = ty.name.span;

        let class = if ty.args.is_empty() {
            let id = self.lookup_type_name(scope, &ty.name)?;
            if self.pool.data(id).is_generic_definition() {
                // Infer the class's type arguments from the constructor
                // arguments by treating them as the constructor's own
                let class_params = self.pool.data(id).type_params.clone();
                let mut candidates = self.pool.ctors_of(id)?;
                for c in &mut candidates {
                    c.type_params = class_params.clone();
                }
                let resolved = resolve_overload(
                    &mut self.pool,
                    &self.builtins,
                    &ty.name.node,
                    &candidates,
                    &[],
                    &arg_tys,
                    span,
                )?;
                let class = self.pool.make_generic(id, &resolved.type_args)?;
                return Ok(TExpr::new(class, TExprKind::New { class, args: args_t }));
            }
            id
        } else {
            self.resolve_type_ref(scope, ty)?
        };

        let candidates = self.pool.ctors_of(class)?;
        resolve_overload(
            &mut self.pool,
            &self.builtins,
            &ty.name.node,
            &candidates,
            &[],
            &arg_tys,
            span,
        )?;
        Ok(TExpr::new(class, TExprKind::New { class, args: args_t }))
    }

    fn check_block(&mut self, scope: ScopeId, items: &[Spanned<Expr>]) -> Result<TExpr> {
        let child = self.scopes.push(scope);
        self.bindings.open();
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let checked = self.check_expr(child, item);
            match checked {
                Ok(t) => out.push(t),
                Err(e) => {
                    self.bindings.close(&mut self.warnings);
                    return Err(e);
                }
            }
        }
        self.bindings.close(&mut self.warnings);
        let ty = out.last().map(|e| e.ty).unwrap_or(self.builtins.unit);
        Ok(TExpr::new(ty, TExprKind::Block(out)))
    }

    fn check_let(
        &mut self,
        scope: ScopeId,
        name: &Spanned<String>,
        mutable: bool,
        ty: Option<&TypeRef>,
        value: &Spanned<Expr>,
    ) -> Result<TExpr> {
        let value_t = self.check_expr(scope, value)?;
        let declared = match ty {
            Some(r) => {
                let declared = self.resolve_type_ref(scope, r)?;
                if !self.assignable_with_widening(declared, value_t.ty) {
                    return Err(CompileError::type_mismatch(
                        &self.pool.format_type(declared),
                        &self.pool.format_type(value_t.ty),
                        value.span,
                    ));
                }
                declared
            }
            None => value_t.ty,
        };

        if let Some((def_scope, _)) = self.scopes.lookup_local_with_scope(scope, &name.node) {
            if def_scope == scope {
                return Err(CompileError::duplicate_definition(&name.node, name.span));
            }
        }
        self.scopes.declare_local(
            scope,
            name.node.clone(),
            LocalSymbol {
                ty: declared,
                mutable,
                is_param: false,
                span: name.span,
            },
        )?;
        self.bindings.declare(&name.node, name.span, mutable);

        Ok(TExpr::new(
            self.builtins.unit,
            TExprKind::Declare {
                name: name.node.clone(),
                mutable,
                value: Some(Box::new(value_t)),
            },
        ))
    }

    fn check_assign(
        &mut self,
        scope: ScopeId,
        target: &Spanned<Expr>,
        value: &Spanned<Expr>,
        span: Span,
    ) -> Result<TExpr> {
        let value_t = self.check_expr(scope, value)?;
        match &target.node {
            Expr::Ident(name) => {
                if let Some(sym) = self.scopes.lookup_local(scope, name) {
                    if !sym.mutable {
                        return Err(CompileError::semantic(
                            ErrorCode::TypeMismatch,
                            format!("cannot assign to immutable binding `{name}`"),
                            span,
                        ));
                    }
                    let ty = sym.ty;
                    if !self.assignable_with_widening(ty, value_t.ty) {
                        return Err(CompileError::type_mismatch(
                            &self.pool.format_type(ty),
                            &self.pool.format_type(value_t.ty),
                            value.span,
                        ));
                    }
                    self.bindings.mark_written(name);
                    return Ok(TExpr::new(
                        self.builtins.unit,
                        TExprKind::AssignLocal {
                            name: name.clone(),
                            value: Box::new(value_t),
                        },
                    ));
                }
                if let Some(class) = self.scopes.enclosing_class(scope) {
                    if let Some(field) = self.pool.field_named(class, name)? {
                        let this_ty = self.self_type(class)?;
                        let this = TExpr::new(this_ty, TExprKind::This);
                        return self.lower_field_assign(this, &field, value_t, value.span, span);
                    }
                }
                Err(CompileError::value_not_found(name, "", target.span))
            }
            Expr::Select { target: inner, name } => {
                let target_t = self.check_expr(scope, inner)?;
                match self.pool.field_named(target_t.ty, &name.node)? {
                    Some(field) => {
                        self.lower_field_assign(target_t, &field, value_t, value.span, span)
                    }
                    None => Err(CompileError::value_not_found(&name.node, "", name.span)),
                }
            }
            _ => Err(CompileError::semantic(
                ErrorCode::TypeMismatch,
                "invalid assignment target",
                span,
            )),
        }
    }

    fn lower_field_assign(
        &mut self,
        target: TExpr,
        field: &Field,
        value: TExpr,
        value_span: Span,
        span: Span,
    ) -> Result<TExpr> {
        if field.flags.readonly {
            return Err(CompileError::semantic(
                ErrorCode::TypeMismatch,
                format!("cannot assign to readonly field `{}`", field.name),
                span,
            ));
        }
        if !self.assignable_with_widening(field.ty, value.ty) {
            return Err(CompileError::type_mismatch(
                &self.pool.format_type(field.ty),
                &self.pool.format_type(value.ty),
                value_span,
            ));
        }
        Ok(TExpr::new(
            self.builtins.unit,
            TExprKind::SetField {
                target: Box::new(target),
                field: field.name.clone(),
                value: Box::new(value),
            },
        ))
    }

    fn check_if(
        &mut self,
        scope: ScopeId,
        cond: &Spanned<Expr>,
        then_branch: &Spanned<Expr>,
        else_branch: Option<&Spanned<Expr>>,
        span: Span,
    ) -> Result<TExpr> {
        let cond_t = self.check_expr(scope, cond)?;
        self.expect_boolean(&cond_t, cond.span)?;
        let then_scope = self.scopes.push(scope);
        let then_t = self.check_expr(then_scope, then_branch)?;
        match else_branch {
            Some(else_branch) => {
                let else_scope = self.scopes.push(scope);
                let else_t = self.check_expr(else_scope, else_branch)?;
                let ty = self
                    .pool
                    .common_ancestor(then_t.ty, else_t.ty)
                    .ok_or_else(|| {
                        CompileError::type_mismatch(
                            &self.pool.format_type(then_t.ty),
                            &self.pool.format_type(else_t.ty),
                            span,
                        )
                    })?;
                Ok(TExpr::new(
                    ty,
                    TExprKind::If {
                        cond: Box::new(cond_t),
                        then_branch: Box::new(then_t),
                        else_branch: Some(Box::new(else_t)),
                    },
                ))
            }
            None => Ok(TExpr::new(
                self.builtins.unit,
                TExprKind::If {
                    cond: Box::new(cond_t),
                    then_branch: Box::new(then_t),
                    else_branch: None,
                },
            )),
        }
    }

    // ----- shared helpers -----

    fn expect_boolean(&self, expr: &TExpr, span: Span) -> Result<()> {
        if expr.ty != self.builtins.boolean {
            return Err(CompileError::type_mismatch(
                "Boolean",
                &self.pool.format_type(expr.ty),
                span,
            ));
        }
        Ok(())
    }

    pub(crate) fn assignable_with_widening(&self, left: TypeId, right: TypeId) -> bool {
        self.pool.is_assignable(left, right) || self.builtins.widens_to(right, left)
    }

    /// The type of `this` inside a class body: the definition inflated
    /// with its own parameters, so member signatures line up.
    pub(crate) fn self_type(&mut self, class: TypeId) -> Result<TypeId> {
        let params: Vec<TypeId> = self
            .pool
            .data(class)
            .type_params
            .iter()
            .map(|p| p.ty)
            .collect();
        if params.is_empty() {
            Ok(class)
        } else {
            self.pool.make_generic(class, &params)
        }
    }

    fn class_scope(&self, class: TypeId) -> ScopeId {
        self.class_scopes.get(&class).copied().unwrap_or(self.global)
    }

    pub(crate) fn resolve_type_ref(&mut self, scope: ScopeId, r: &TypeRef) -> Result<TypeId> {
        let id = self.lookup_type_name(scope, &r.name)?;
        if r.args.is_empty() {
            return Ok(id);
        }
        let expected = self.pool.data(id).type_params.len();
        if expected != r.args.len() {
            return Err(CompileError::semantic(
                ErrorCode::TypeMismatch,
                format!(
                    "`{}` expects {} type argument(s), got {}",
                    r.name.node,
                    expected,
                    r.args.len()
                ),
                r.name.span,
            ));
        }
        let mut args = Vec::with_capacity(r.args.len());
        for arg in &r.args {
            args.push(self.resolve_type_ref(scope, arg)?);
        }
        self.pool.make_generic(id, &args)
    }

    fn lookup_type_name(&mut self, scope: ScopeId, name: &Spanned<String>) -> Result<TypeId> {
        match self.scopes.lookup_type(&self.pool, scope, &name.node) {
            Some(id) => Ok(id),
            None => {
                let candidates = self.scopes.visible_type_names(&self.pool, scope);
                let refs: Vec<&str> = candidates.iter().map(String::as_str).collect();
                let hint = format_suggestion_hint(find_similar_name(&name.node, &refs, 2));
                Err(CompileError::type_not_found(&name.node, &hint, name.span))
            }
        }
    }

    pub(crate) fn fresh_closure_name(&mut self) -> String {
        let n = self.closure_count;
        self.closure_count += 1;
        format!("<closure${n}>")
    }

    pub(crate) fn fresh_temp(&mut self, prefix: &str) -> String {
        let n = self.temp_count;
        self.temp_count += 1;
        format!("<{prefix}${n}>")
    }

    pub(crate) fn open_binding_frame(&mut self) {
        self.bindings.open();
    }

    pub(crate) fn close_binding_frame(&mut self) {
        let mut warnings = std::mem::take(&mut self.warnings);
        self.bindings.close(&mut warnings);
        self.warnings = warnings;
    }

    pub(crate) fn track_binding(&mut self, name: &str, span: Span, mutable: bool) {
        self.bindings.declare(name, span, mutable);
    }

    pub(crate) fn track_read(&mut self, name: &str) {
        self.bindings.mark_read(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClassParamDecl, Pattern};

    fn sp<T>(node: T) -> Spanned<T> {
        Spanned::new(node, Span::dummy())
    }

    fn name(s: &str) -> Spanned<String> {
        sp(s.to_string())
    }

    fn tref(s: &str) -> TypeRef {
        TypeRef::named(s, Span::dummy())
    }

    fn function(name_s: &str, params: Vec<(&str, &str)>, ret: Option<&str>, body: Expr) -> Decl {
        Decl::Function(MethodDecl {
            name: name(name_s),
            mods: Default::default(),
            type_params: Vec::new(),
            params: params
                .into_iter()
                .map(|(n, t)| crate::ast::ParamDecl {
                    name: name(n),
                    ty: tref(t),
                    variadic: false,
                })
                .collect(),
            ret: ret.map(tref),
            body: Some(sp(body)),
            span: Span::dummy(),
        })
    }

    fn analyze_ok(decls: Vec<Decl>) -> Analysis {
        analyze(&Program { decls }).expect("analysis should succeed")
    }

    fn analyze_err(decls: Vec<Decl>) -> CompileError {
        analyze(&Program { decls }).expect_err("analysis should fail")
    }

    #[test]
    fn test_literal_body() {
        let a = analyze_ok(vec![function("f", vec![], Some("Int"), Expr::IntLit(7))]);
        assert_eq!(a.typed_methods.len(), 1);
        let m = &a.typed_methods[0];
        assert_eq!(m.name, "f");
        assert_eq!(m.body.ty, a.builtins.int);
    }

    #[test]
    fn test_return_type_mismatch() {
        let err = analyze_err(vec![function(
            "f",
            vec![],
            Some("Int"),
            Expr::StringLit("x".to_string()),
        )]);
        assert_eq!(err.code(), Some(ErrorCode::TypeMismatch));
    }

    #[test]
    fn test_arithmetic_widening() {
        let body = Expr::Binary {
            left: Box::new(sp(Expr::IntLit(1))),
            op: BinOp::Add,
            right: Box::new(sp(Expr::DoubleLit(2.0))),
        };
        let a = analyze_ok(vec![function("f", vec![], Some("Double"), body)]);
        assert_eq!(a.typed_methods[0].body.ty, a.builtins.double);
    }

    #[test]
    fn test_string_concat() {
        let body = Expr::Binary {
            left: Box::new(sp(Expr::StringLit("n = ".to_string()))),
            op: BinOp::Add,
            right: Box::new(sp(Expr::IntLit(3))),
        };
        let a = analyze_ok(vec![function("f", vec![], Some("String"), body)]);
        assert_eq!(a.typed_methods[0].body.ty, a.builtins.string);
    }

    #[test]
    fn test_arithmetic_on_bools_rejected() {
        let body = Expr::Binary {
            left: Box::new(sp(Expr::BoolLit(true))),
            op: BinOp::Add,
            right: Box::new(sp(Expr::BoolLit(false))),
        };
        let err = analyze_err(vec![function("f", vec![], None, body)]);
        assert_eq!(err.code(), Some(ErrorCode::OperatorNotApplicable));
    }

    #[test]
    fn test_unknown_identifier_with_hint() {
        let body = Expr::Block(vec![
            sp(Expr::Let {
                name: name("count"),
                mutable: false,
                ty: None,
                value: Box::new(sp(Expr::IntLit(1))),
            }),
            sp(Expr::Ident("conut".to_string())),
        ]);
        let err = analyze_err(vec![function("f", vec![], None, body)]);
        assert_eq!(err.code(), Some(ErrorCode::ValueNotFound));
        assert!(err.message().contains("count"));
    }

    #[test]
    fn test_let_shadowing_across_blocks() {
        let body = Expr::Block(vec![
            sp(Expr::Let {
                name: name("x"),
                mutable: false,
                ty: None,
                value: Box::new(sp(Expr::IntLit(1))),
            }),
            sp(Expr::Block(vec![
                sp(Expr::Let {
                    name: name("x"),
                    mutable: false,
                    ty: None,
                    value: Box::new(sp(Expr::StringLit("s".to_string()))),
                }),
                sp(Expr::Ident("x".to_string())),
            ])),
        ]);
        let a = analyze_ok(vec![function("f", vec![], Some("String"), body)]);
        assert_eq!(a.typed_methods[0].body.ty, a.builtins.string);
    }

    #[test]
    fn test_duplicate_let_in_same_block() {
        let body = Expr::Block(vec![
            sp(Expr::Let {
                name: name("x"),
                mutable: false,
                ty: None,
                value: Box::new(sp(Expr::IntLit(1))),
            }),
            sp(Expr::Let {
                name: name("x"),
                mutable: false,
                ty: None,
                value: Box::new(sp(Expr::IntLit(2))),
            }),
        ]);
        let err = analyze_err(vec![function("f", vec![], None, body)]);
        assert_eq!(err.code(), Some(ErrorCode::DuplicateDefinition));
    }

    #[test]
    fn test_assign_to_immutable_rejected() {
        let body = Expr::Block(vec![
            sp(Expr::Let {
                name: name("x"),
                mutable: false,
                ty: None,
                value: Box::new(sp(Expr::IntLit(1))),
            }),
            sp(Expr::Assign {
                target: Box::new(sp(Expr::Ident("x".to_string()))),
                value: Box::new(sp(Expr::IntLit(2))),
            }),
        ]);
        let err = analyze_err(vec![function("f", vec![], None, body)]);
        assert!(err.message().contains("immutable"));
    }

    #[test]
    fn test_if_branches_unify_to_common_ancestor() {
        let apple = class_decl("Apple", Some("Fruit"));
        let banana = class_decl("Banana", Some("Fruit"));
        let fruit = class_decl("Fruit", None);
        let body = Expr::If {
            cond: Box::new(sp(Expr::BoolLit(true))),
            then_branch: Box::new(sp(Expr::New {
                ty: tref("Apple"),
                args: vec![],
            })),
            else_branch: Some(Box::new(sp(Expr::New {
                ty: tref("Banana"),
                args: vec![],
            }))),
        };
        let a = analyze_ok(vec![
            fruit,
            apple,
            banana,
            function("f", vec![], Some("Fruit"), body),
        ]);
        let f = a
            .typed_methods
            .iter()
            .find(|m| m.name == "f")
            .expect("function f");
        assert_eq!(a.pool.data(f.body.ty).name, "Fruit");
    }

    fn class_decl(class_name: &str, base: Option<&str>) -> Decl {
        Decl::Class(ClassDecl {
            name: name(class_name),
            mods: Default::default(),
            type_params: Vec::new(),
            params: Vec::new(),
            base: base.map(|b| crate::ast::BaseRef {
                ty: tref(b),
                args: Vec::new(),
            }),
            interfaces: Vec::new(),
            members: Vec::new(),
            span: Span::dummy(),
        })
    }

    #[test]
    fn test_duplicate_class_definition() {
        let err = analyze_err(vec![class_decl("Foo", None), class_decl("Foo", None)]);
        assert_eq!(err.code(), Some(ErrorCode::DuplicateDefinition));
    }

    #[test]
    fn test_class_param_becomes_field() {
        let point = Decl::Class(ClassDecl {
            name: name("Point"),
            mods: Default::default(),
            type_params: Vec::new(),
            params: vec![
                ClassParamDecl {
                    name: name("x"),
                    ty: tref("Int"),
                    mutable: false,
                },
                ClassParamDecl {
                    name: name("y"),
                    ty: tref("Int"),
                    mutable: true,
                },
            ],
            base: None,
            interfaces: Vec::new(),
            members: Vec::new(),
            span: Span::dummy(),
        });
        let body = Expr::Select {
            target: Box::new(sp(Expr::New {
                ty: tref("Point"),
                args: vec![sp(Expr::IntLit(1)), sp(Expr::IntLit(2))],
            })),
            name: name("x"),
        };
        let a = analyze_ok(vec![point, function("f", vec![], Some("Int"), body)]);
        assert_eq!(a.typed_methods[0].body.ty, a.builtins.int);
    }

    #[test]
    fn test_field_without_type_or_value_is_missing_initializer() {
        let c = Decl::Class(ClassDecl {
            name: name("C"),
            mods: Default::default(),
            type_params: Vec::new(),
            params: Vec::new(),
            base: None,
            interfaces: Vec::new(),
            members: vec![Member::Field(FieldDecl {
                name: name("x"),
                mods: Default::default(),
                mutable: false,
                ty: None,
                value: None,
                span: Span::dummy(),
            })],
            span: Span::dummy(),
        });
        let err = analyze_err(vec![c]);
        assert_eq!(err.code(), Some(ErrorCode::MissingInitializer));
    }

    #[test]
    fn test_field_type_inferred_from_initializer() {
        let c = Decl::Class(ClassDecl {
            name: name("C"),
            mods: Default::default(),
            type_params: Vec::new(),
            params: Vec::new(),
            base: None,
            interfaces: Vec::new(),
            members: vec![Member::Field(FieldDecl {
                name: name("greeting"),
                mods: Default::default(),
                mutable: false,
                ty: None,
                value: Some(sp(Expr::StringLit("hi".to_string()))),
                span: Span::dummy(),
            })],
            span: Span::dummy(),
        });
        let a = analyze_ok(vec![c]);
        assert_eq!(a.typed_fields.len(), 1);
        assert_eq!(a.typed_fields[0].init.ty, a.builtins.string);
    }

    #[test]
    fn test_local_shadows_field() {
        let c = Decl::Class(ClassDecl {
            name: name("C"),
            mods: Default::default(),
            type_params: Vec::new(),
            params: Vec::new(),
            base: None,
            interfaces: Vec::new(),
            members: vec![
                Member::Field(FieldDecl {
                    name: name("x"),
                    mods: Default::default(),
                    mutable: false,
                    ty: Some(tref("String")),
                    value: Some(sp(Expr::StringLit("field".to_string()))),
                    span: Span::dummy(),
                }),
                Member::Method(MethodDecl {
                    name: name("m"),
                    mods: Default::default(),
                    type_params: Vec::new(),
                    params: Vec::new(),
                    ret: Some(tref("Int")),
                    body: Some(sp(Expr::Block(vec![
                        sp(Expr::Let {
                            name: name("x"),
                            mutable: false,
                            ty: None,
                            value: Box::new(sp(Expr::IntLit(3))),
                        }),
                        sp(Expr::Ident("x".to_string())),
                    ]))),
                    span: Span::dummy(),
                }),
            ],
            span: Span::dummy(),
        });
        let a = analyze_ok(vec![c]);
        let m = a
            .typed_methods
            .iter()
            .find(|m| m.name == "m")
            .expect("method m");
        assert_eq!(m.body.ty, a.builtins.int);
    }

    #[test]
    fn test_free_function_call_via_predef() {
        let body = Expr::Call {
            target: None,
            name: name("println"),
            type_args: vec![],
            args: vec![sp(Expr::StringLit("hello".to_string()))],
        };
        let a = analyze_ok(vec![function("f", vec![], None, body)]);
        assert_eq!(a.typed_methods[0].body.ty, a.builtins.unit);
    }

    #[test]
    fn test_unused_binding_warning() {
        let body = Expr::Block(vec![sp(Expr::Let {
            name: name("unused"),
            mutable: false,
            ty: None,
            value: Box::new(sp(Expr::IntLit(1))),
        })]);
        let a = analyze_ok(vec![function("f", vec![], None, body)]);
        assert!(a
            .warnings
            .iter()
            .any(|w| w.kind() == "unused_binding" && w.to_string().contains("unused")));
    }

    #[test]
    fn test_never_mutated_var_warning() {
        let body = Expr::Block(vec![
            sp(Expr::Let {
                name: name("v"),
                mutable: true,
                ty: None,
                value: Box::new(sp(Expr::IntLit(1))),
            }),
            sp(Expr::Ident("v".to_string())),
        ]);
        let a = analyze_ok(vec![function("f", vec![], Some("Int"), body)]);
        assert!(a.warnings.iter().any(|w| w.kind() == "never_mutated"));
    }

    #[test]
    fn test_generic_class_instantiation_inferred_from_ctor() {
        let boxed = Decl::Class(ClassDecl {
            name: name("Box"),
            mods: Default::default(),
            type_params: vec![crate::ast::TypeParamDecl {
                name: name("T"),
                variance: crate::ast::VarianceAnn::Invariant,
                upper_bound: None,
            }],
            params: vec![ClassParamDecl {
                name: name("value"),
                ty: tref("T"),
                mutable: false,
            }],
            base: None,
            interfaces: Vec::new(),
            members: Vec::new(),
            span: Span::dummy(),
        });
        let body = Expr::Select {
            target: Box::new(sp(Expr::New {
                ty: tref("Box"),
                args: vec![sp(Expr::IntLit(42))],
            })),
            name: name("value"),
        };
        let a = analyze_ok(vec![boxed, function("f", vec![], Some("Int"), body)]);
        assert_eq!(a.typed_methods[0].body.ty, a.builtins.int);
    }

    #[test]
    fn test_pattern_var_is_plain_binding() {
        // Sanity: the AST-level irrefutability check the desugarer relies on
        assert!(Pattern::Var("x".to_string()).is_irrefutable());
    }
}
