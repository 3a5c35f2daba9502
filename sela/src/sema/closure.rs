//! Closure type synthesis
//!
//! A closure literal becomes a private sealed synthetic class extending the
//! builtin `Function{N}`/`Action{N}` base for its arity. Generic parameters
//! visible at the closure site are mirrored one-to-one onto the synthetic
//! class so the lowered body can still name them; the closure's externally
//! visible type is the base specialized with the original (non-mirrored)
//! parameter types, which is what call sites unify against. Free variables
//! referenced by the body are captured into backing fields, boxed into a
//! `Ref` cell when primitive so mutation inside the closure is visible
//! outside.

use std::collections::HashSet;

use crate::ast::{ClosureParam, Expr, Pattern, Span, Spanned};
use crate::error::{CompileError, ErrorCode, Result};
use crate::hir::{TExpr, TExprKind, TypedMethod};
use crate::scope::LocalSymbol;
use crate::scope::ScopeId;
use crate::sema::Analyzer;
use crate::types::builtins::MAX_CLOSURE_ARITY;
use crate::types::{Field, FieldFlags, GenericParamDecl, Method, MethodFlags, Param, TypeId, TypeKind};

impl Analyzer {
    pub(crate) fn check_closure(
        &mut self,
        scope: ScopeId,
        params: &[ClosureParam],
        body: &Spanned<Expr>,
        span: Span,
    ) -> Result<TExpr> {
        let arity = params.len();
        if arity > MAX_CLOSURE_ARITY {
            return Err(CompileError::semantic(
                ErrorCode::TypeMismatch,
                format!("closures take at most {MAX_CLOSURE_ARITY} parameters"),
                span,
            ));
        }

        let mut param_tys = Vec::with_capacity(arity);
        for p in params {
            param_tys.push(self.resolve_type_ref(scope, &p.ty)?);
        }

        let closure_scope = self.scopes.push_closure(scope);
        for (p, &ty) in params.iter().zip(&param_tys) {
            self.scopes.declare_local(
                closure_scope,
                p.name.node.clone(),
                LocalSymbol {
                    ty,
                    mutable: false,
                    is_param: true,
                    span: p.name.span,
                },
            )?;
        }
        self.open_binding_frame();
        let body_t = self.check_expr(closure_scope, body)?;
        self.close_binding_frame();
        let ret = body_t.ty;
        let returns_unit = ret == self.builtins.unit;

        // Synthesize the closure class, mirroring every generic parameter
        // visible at the closure site
        let outer = self.scopes.visible_type_params(&self.pool, scope);
        let class_name = self.fresh_closure_name();
        let class = self.pool.define(class_name, TypeKind::Class);
        {
            let data = self.pool.data_mut(class);
            data.is_private = true;
            data.is_sealed = true;
            data.is_synthetic = true;
        }
        if let Some(declaring) = self.scopes.enclosing_class(scope) {
            self.pool.data_mut(class).declaring = Some(declaring);
        }

        let outer_ids: Vec<TypeId> = outer.iter().map(|p| p.ty).collect();
        let mirror_ids: Vec<TypeId> = if outer.is_empty() {
            Vec::new()
        } else {
            let decls: Vec<GenericParamDecl> = outer
                .iter()
                .map(|p| GenericParamDecl::with_variance(p.name.clone(), p.variance))
                .collect();
            let mirrored = self.pool.define_generic_params(class, &decls)?;
            mirrored.iter().map(|p| p.ty).collect()
        };

        let mut mapped_params = Vec::with_capacity(arity);
        for &ty in &param_tys {
            mapped_params.push(self.pool.substitute(ty, &outer_ids, &mirror_ids)?);
        }
        let mapped_ret = self.pool.substitute(ret, &outer_ids, &mirror_ids)?;

        let base_def = match self.builtins.function_base(arity, returns_unit) {
            Some(def) => def,
            None => {
                return Err(CompileError::internal(
                    ErrorCode::InflateNonGeneric,
                    format!("no function base type for arity {arity}"),
                ))
            }
        };
        let mut base_args = mapped_params.clone();
        if !returns_unit {
            base_args.push(mapped_ret);
        }
        let base = if base_args.is_empty() {
            base_def
        } else {
            self.pool.make_generic(base_def, &base_args)?
        };
        self.pool.data_mut(class).base = Some(base);

        let apply = Method {
            name: "apply".to_string(),
            owner: class,
            flags: MethodFlags {
                override_: true,
                ..MethodFlags::default()
            },
            type_params: Vec::new(),
            params: params
                .iter()
                .zip(&mapped_params)
                .map(|(p, &ty)| Param {
                    name: p.name.node.clone(),
                    ty,
                    variadic: false,
                })
                .collect(),
            ret: if returns_unit { self.builtins.unit } else { mapped_ret },
        };
        self.pool.data_mut(class).methods.push(apply);
        self.typed_methods.push(TypedMethod {
            owner: class,
            name: "apply".to_string(),
            body: body_t,
        });

        let captures = self.collect_captures(scope, params, body, class, &outer_ids, &mirror_ids)?;

        // The runtime instance carries the outer parameters through the
        // mirror; external code sees the plain function type
        let instance = if mirror_ids.is_empty() {
            class
        } else {
            self.pool.make_generic(class, &outer_ids)?
        };
        let mut external_args = param_tys;
        if !returns_unit {
            external_args.push(ret);
        }
        let external = if external_args.is_empty() {
            base_def
        } else {
            self.pool.make_generic(base_def, &external_args)?
        };

        Ok(TExpr::new(
            external,
            TExprKind::MakeClosure {
                class: instance,
                captures,
            },
        ))
    }

    /// Classify the closure body's free variables. Parameters of enclosing
    /// methods are captured by value; plain locals of primitive type are
    /// boxed into a `Ref` cell so writes inside the closure alias the
    /// original binding.
    fn collect_captures(
        &mut self,
        scope: ScopeId,
        params: &[ClosureParam],
        body: &Spanned<Expr>,
        class: TypeId,
        outer_ids: &[TypeId],
        mirror_ids: &[TypeId],
    ) -> Result<Vec<TExpr>> {
        let mut declared: HashSet<String> =
            params.iter().map(|p| p.name.node.clone()).collect();
        let mut referenced = Vec::new();
        collect_idents(&body.node, &mut declared, &mut referenced);

        let mut seen = HashSet::new();
        let mut captures = Vec::new();
        for name in referenced {
            if declared.contains(&name) || !seen.insert(name.clone()) {
                continue;
            }
            let Some(sym) = self.scopes.lookup_local(scope, &name) else {
                continue;
            };
            let (ty, is_param) = (sym.ty, sym.is_param);
            self.track_read(&name);
            let capture = if !is_param && self.builtins.is_primitive(ty) {
                let boxed = self.pool.make_generic(self.builtins.ref_cell, &[ty])?;
                TExpr::new(
                    boxed,
                    TExprKind::New {
                        class: boxed,
                        args: vec![TExpr::new(ty, TExprKind::Local(name.clone()))],
                    },
                )
            } else {
                TExpr::new(ty, TExprKind::Local(name.clone()))
            };
            let field_ty = self.pool.substitute(capture.ty, outer_ids, mirror_ids)?;
            self.pool.data_mut(class).fields.push(Field {
                name,
                owner: class,
                flags: FieldFlags {
                    private: true,
                    ..FieldFlags::default()
                },
                ty: field_ty,
            });
            captures.push(capture);
        }
        Ok(captures)
    }
}

/// Walk an expression recording identifier references and locally declared
/// names. Declarations are an over-approximation (block boundaries are not
/// tracked), which only ever shrinks the capture set.
fn collect_idents(expr: &Expr, declared: &mut HashSet<String>, referenced: &mut Vec<String>) {
    match expr {
        Expr::Ident(name) => referenced.push(name.clone()),
        Expr::Select { target, .. } => collect_idents(&target.node, declared, referenced),
        Expr::Binary { left, right, .. } => {
            collect_idents(&left.node, declared, referenced);
            collect_idents(&right.node, declared, referenced);
        }
        Expr::Unary { expr, .. } => collect_idents(&expr.node, declared, referenced),
        Expr::Call {
            target, name, args, ..
        } => {
            match target {
                Some(target) => collect_idents(&target.node, declared, referenced),
                // A bare call may invoke a function-typed local
                None => referenced.push(name.node.clone()),
            }
            for arg in args {
                collect_idents(&arg.node, declared, referenced);
            }
        }
        Expr::New { args, .. } => {
            for arg in args {
                collect_idents(&arg.node, declared, referenced);
            }
        }
        Expr::Block(items) => {
            for item in items {
                collect_idents(&item.node, declared, referenced);
            }
        }
        Expr::Let { name, value, .. } => {
            collect_idents(&value.node, declared, referenced);
            declared.insert(name.node.clone());
        }
        Expr::Assign { target, value } => {
            collect_idents(&target.node, declared, referenced);
            collect_idents(&value.node, declared, referenced);
        }
        Expr::If {
            cond,
            then_branch,
            else_branch,
        } => {
            collect_idents(&cond.node, declared, referenced);
            collect_idents(&then_branch.node, declared, referenced);
            if let Some(else_branch) = else_branch {
                collect_idents(&else_branch.node, declared, referenced);
            }
        }
        Expr::While { cond, body } => {
            collect_idents(&cond.node, declared, referenced);
            collect_idents(&body.node, declared, referenced);
        }
        Expr::Throw { expr } => collect_idents(&expr.node, declared, referenced),
        Expr::Closure { params, body } => {
            for p in params {
                declared.insert(p.name.node.clone());
            }
            collect_idents(&body.node, declared, referenced);
        }
        Expr::Match { scrutinee, cases } => {
            collect_idents(&scrutinee.node, declared, referenced);
            for case in cases {
                pattern_binds(&case.pattern.node, declared);
                collect_idents(&case.body.node, declared, referenced);
            }
        }
        Expr::IntLit(_)
        | Expr::LongLit(_)
        | Expr::DoubleLit(_)
        | Expr::BoolLit(_)
        | Expr::StringLit(_)
        | Expr::UnitLit
        | Expr::NullLit
        | Expr::This => {}
    }
}

fn pattern_binds(pattern: &Pattern, declared: &mut HashSet<String>) {
    match pattern {
        Pattern::Var(name) => {
            if name != "_" {
                declared.insert(name.clone());
            }
        }
        Pattern::Typed { name, .. } => {
            declared.insert(name.clone());
        }
        Pattern::Constructor { args, .. } => {
            for arg in args {
                pattern_binds(&arg.node, declared);
            }
        }
        Pattern::Literal(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, Decl, MethodDecl, ParamDecl, Program, TypeRef};
    use crate::sema::{analyze, Analysis};

    fn sp<T>(node: T) -> Spanned<T> {
        Spanned::new(node, Span::dummy())
    }

    fn name(s: &str) -> Spanned<String> {
        sp(s.to_string())
    }

    fn tref(s: &str) -> TypeRef {
        TypeRef::named(s, Span::dummy())
    }

    fn function_with_body(ret: Option<&str>, body: Expr) -> Decl {
        Decl::Function(MethodDecl {
            name: name("f"),
            mods: Default::default(),
            type_params: Vec::new(),
            params: Vec::new(),
            ret: ret.map(tref),
            body: Some(sp(body)),
            span: Span::dummy(),
        })
    }

    fn analyze_ok(decls: Vec<Decl>) -> Analysis {
        analyze(&Program { decls }).expect("analysis should succeed")
    }

    fn closure(params: Vec<(&str, &str)>, body: Expr) -> Expr {
        Expr::Closure {
            params: params
                .into_iter()
                .map(|(n, t)| ClosureParam {
                    name: name(n),
                    ty: tref(t),
                })
                .collect(),
            body: Box::new(sp(body)),
        }
    }

    #[test]
    fn test_zero_arity_closure_type() {
        let body = Expr::Block(vec![
            sp(Expr::Let {
                name: name("g"),
                mutable: false,
                ty: None,
                value: Box::new(sp(closure(vec![], Expr::IntLit(42)))),
            }),
            sp(Expr::Call {
                target: None,
                name: name("g"),
                type_args: vec![],
                args: vec![],
            }),
        ]);
        let a = analyze_ok(vec![function_with_body(Some("Int"), body)]);
        assert_eq!(a.typed_methods.last().unwrap().body.ty, a.builtins.int);
    }

    #[test]
    fn test_closure_external_type_is_function_base() {
        let body = closure(
            vec![("x", "Int")],
            Expr::Binary {
                left: Box::new(sp(Expr::Ident("x".to_string()))),
                op: BinOp::Add,
                right: Box::new(sp(Expr::IntLit(1))),
            },
        );
        let a = analyze_ok(vec![function_with_body(None, body)]);
        let ty = a.typed_methods.last().unwrap().body.ty;
        let data = a.pool.data(ty);
        assert_eq!(data.definition, Some(a.builtins.functions[1]));
        assert_eq!(data.type_args, vec![a.builtins.int, a.builtins.int]);
    }

    #[test]
    fn test_unit_closure_gets_action_base() {
        let body = closure(
            vec![("line", "String")],
            Expr::Call {
                target: None,
                name: name("println"),
                type_args: vec![],
                args: vec![sp(Expr::Ident("line".to_string()))],
            },
        );
        let a = analyze_ok(vec![function_with_body(None, body)]);
        let ty = a.typed_methods.last().unwrap().body.ty;
        assert_eq!(a.pool.data(ty).definition, Some(a.builtins.actions[1]));
    }

    #[test]
    fn test_primitive_capture_is_boxed() {
        let body = Expr::Block(vec![
            sp(Expr::Let {
                name: name("counter"),
                mutable: true,
                ty: None,
                value: Box::new(sp(Expr::IntLit(0))),
            }),
            sp(Expr::Assign {
                target: Box::new(sp(Expr::Ident("counter".to_string()))),
                value: Box::new(sp(Expr::IntLit(1))),
            }),
            sp(closure(vec![], Expr::Ident("counter".to_string()))),
        ]);
        let a = analyze_ok(vec![function_with_body(None, body)]);
        let block = &a.typed_methods.last().unwrap().body;
        let TExprKind::Block(items) = &block.kind else {
            panic!("expected block");
        };
        let TExprKind::MakeClosure { captures, .. } = &items.last().unwrap().kind else {
            panic!("expected closure");
        };
        assert_eq!(captures.len(), 1);
        let TExprKind::New { class, .. } = &captures[0].kind else {
            panic!("expected boxed capture, got {:?}", captures[0].kind);
        };
        assert_eq!(a.pool.data(*class).definition, Some(a.builtins.ref_cell));
    }

    #[test]
    fn test_method_param_capture_is_not_boxed() {
        let f = Decl::Function(MethodDecl {
            name: name("f"),
            mods: Default::default(),
            type_params: Vec::new(),
            params: vec![ParamDecl {
                name: name("seed"),
                ty: tref("Int"),
                variadic: false,
            }],
            ret: None,
            body: Some(sp(closure(vec![], Expr::Ident("seed".to_string())))),
            span: Span::dummy(),
        });
        let a = analyze_ok(vec![f]);
        let body = &a.typed_methods.last().unwrap().body;
        let TExprKind::MakeClosure { captures, .. } = &body.kind else {
            panic!("expected closure");
        };
        assert!(matches!(captures[0].kind, TExprKind::Local(_)));
    }

    #[test]
    fn test_closure_mirrors_method_generic_params() {
        let f = Decl::Function(MethodDecl {
            name: name("identityLater"),
            mods: Default::default(),
            type_params: vec![crate::ast::TypeParamDecl {
                name: name("T"),
                variance: crate::ast::VarianceAnn::Invariant,
                upper_bound: None,
            }],
            params: vec![ParamDecl {
                name: name("x"),
                ty: tref("T"),
                variadic: false,
            }],
            ret: None,
            body: Some(sp(closure(vec![], Expr::Ident("x".to_string())))),
            span: Span::dummy(),
        });
        let a = analyze_ok(vec![f]);
        let body = &a.typed_methods.last().unwrap().body;
        let TExprKind::MakeClosure { class, .. } = &body.kind else {
            panic!("expected closure");
        };
        // The synthetic class is instantiated with the method's own
        // parameter, through a mirrored parameter of the same name
        let instance = a.pool.data(*class);
        let definition = instance.definition.expect("generic closure class");
        assert_eq!(a.pool.data(definition).type_params.len(), 1);
        assert_eq!(a.pool.data(definition).type_params[0].name, "T");
        assert!(a.pool.data(definition).is_synthetic);
        // External type: Function0[T] over the original method parameter
        assert_eq!(
            a.pool.data(body.ty).definition,
            Some(a.builtins.functions[0])
        );
        assert_eq!(a.pool.data(body.ty).type_args, instance.type_args);
    }

    #[test]
    fn test_collect_idents_skips_shadowed_names() {
        let mut declared = HashSet::new();
        let mut referenced = Vec::new();
        let expr = Expr::Block(vec![
            sp(Expr::Let {
                name: name("a"),
                mutable: false,
                ty: None,
                value: Box::new(sp(Expr::Ident("b".to_string()))),
            }),
            sp(Expr::Ident("a".to_string())),
        ]);
        collect_idents(&expr, &mut declared, &mut referenced);
        assert!(declared.contains("a"));
        assert_eq!(referenced, vec!["b".to_string(), "a".to_string()]);
    }
}
