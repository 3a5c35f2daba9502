//! Pattern-match desugaring
//!
//! A `match` lowers into a block that binds the scrutinee to a hidden
//! `<in>` local, declares a hidden mutable `<out>` local of the common
//! result type, then runs every case inside a breakable region. Each case
//! becomes a nested conditional: a successful match assigns `<out>` and
//! breaks out of the region, so cases are tried strictly in order and the
//! first hit wins. A non-exhaustive trap ends the region.
//!
//! Constructor patterns destructure through the companion object's
//! `unapply`: a `Boolean` result is a plain test, an `Option` result is
//! tested with `isDefined()` and unwrapped with `get()`, tuple results are
//! unpacked field by field into the nested sub-patterns.

use crate::ast::{Expr, LiteralPattern, MatchCase, Pattern, Span, Spanned};
use crate::error::{CompileError, Result};
use crate::hir::{TExpr, TExprKind};
use crate::scope::{LocalSymbol, ScopeId};
use crate::sema::overload::resolve_overload;
use crate::sema::Analyzer;
use crate::types::{Method, TypeId};

/// A type-checked pattern, ready to lower
pub(crate) enum PatInfo {
    /// Equality test against the scrutinee
    Literal(TExpr),
    /// `_`: matches unconditionally, binds nothing
    Wildcard,
    /// Named catch-all binding
    Bind { name: String },
    /// Runtime type test with binding
    Typed { name: String, ty: TypeId },
    /// Extractor destructuring
    Ctor {
        object: TypeId,
        unapply: Method,
        /// True when `unapply` returns a bare `Boolean`
        boolean: bool,
        components: Vec<(TypeId, Spanned<PatInfo>)>,
    },
}

impl Analyzer {
    pub(crate) fn check_match(
        &mut self,
        scope: ScopeId,
        scrutinee: &Spanned<Expr>,
        cases: &[MatchCase],
        span: Span,
    ) -> Result<TExpr> {
        let scrut = self.check_expr(scope, scrutinee)?;
        if cases.is_empty() {
            return Err(CompileError::case_type_mismatch(span));
        }

        let in_name = self.fresh_temp("in");
        let out_name = self.fresh_temp("out");
        let match_scope = self.scopes.push(scope);
        self.scopes.declare_local(
            match_scope,
            in_name.clone(),
            LocalSymbol {
                ty: scrut.ty,
                mutable: false,
                is_param: false,
                span,
            },
        )?;

        let mut checked = Vec::with_capacity(cases.len());
        let mut result_ty: Option<TypeId> = None;
        for case in cases {
            let case_scope = self.scopes.push(match_scope);
            self.open_binding_frame();
            let outcome = self
                .type_pattern(case_scope, &case.pattern, scrut.ty)
                .and_then(|info| Ok((info, self.check_expr(case_scope, &case.body)?)));
            self.close_binding_frame();
            let (info, body_t) = outcome?;

            result_ty = Some(match result_ty {
                None => body_t.ty,
                Some(prev) => self
                    .pool
                    .common_ancestor(prev, body_t.ty)
                    .ok_or_else(|| CompileError::case_type_mismatch(case.body.span))?,
            });
            checked.push((info, body_t));
        }
        let result_ty = match result_ty {
            Some(ty) => ty,
            None => return Err(CompileError::case_type_mismatch(span)),
        };
        self.scopes.declare_local(
            match_scope,
            out_name.clone(),
            LocalSymbol {
                ty: result_ty,
                mutable: true,
                is_param: false,
                span,
            },
        )?;

        let unit = self.builtins.unit;
        let nothing = self.builtins.nothing;
        let mut region = Vec::with_capacity(checked.len() + 1);
        for (info, body_t) in checked {
            let success = TExpr::new(
                unit,
                TExprKind::Block(vec![
                    TExpr::new(
                        unit,
                        TExprKind::AssignLocal {
                            name: out_name.clone(),
                            value: Box::new(body_t),
                        },
                    ),
                    TExpr::new(nothing, TExprKind::Break),
                ]),
            );
            region.push(self.lower_case(&in_name, scrut.ty, info.node, success)?);
        }
        region.push(TExpr::new(nothing, TExprKind::NonExhaustive));

        let items = vec![
            TExpr::new(
                unit,
                TExprKind::Declare {
                    name: in_name,
                    mutable: false,
                    value: Some(Box::new(scrut)),
                },
            ),
            TExpr::new(
                unit,
                TExprKind::Declare {
                    name: out_name.clone(),
                    mutable: true,
                    value: None,
                },
            ),
            TExpr::new(unit, TExprKind::Breakable(region)),
            TExpr::new(result_ty, TExprKind::Local(out_name)),
        ];
        Ok(TExpr::new(result_ty, TExprKind::Block(items)))
    }

    /// Type-check a pattern against the scrutinee type, declaring the
    /// bindings it introduces into the case scope.
    fn type_pattern(
        &mut self,
        case_scope: ScopeId,
        pattern: &Spanned<Pattern>,
        scrutinee_ty: TypeId,
    ) -> Result<Spanned<PatInfo>> {
        let b = &self.builtins;
        let info = match &pattern.node {
            Pattern::Literal(lit) => PatInfo::Literal(match lit {
                LiteralPattern::Int(v) => TExpr::new(b.int, TExprKind::Int(*v)),
                LiteralPattern::Double(v) => TExpr::new(b.double, TExprKind::Double(*v)),
                LiteralPattern::Bool(v) => TExpr::new(b.boolean, TExprKind::Bool(*v)),
                LiteralPattern::Str(v) => TExpr::new(b.string, TExprKind::Str(v.clone())),
            }),
            Pattern::Var(name) if name == "_" => PatInfo::Wildcard,
            Pattern::Var(name) => {
                self.declare_pattern_binding(case_scope, name, scrutinee_ty, pattern.span)?;
                PatInfo::Bind { name: name.clone() }
            }
            Pattern::Typed { name, ty } => {
                let target = self.resolve_type_ref(case_scope, ty)?;
                self.declare_pattern_binding(case_scope, name, target, pattern.span)?;
                PatInfo::Typed {
                    name: name.clone(),
                    ty: target,
                }
            }
            Pattern::Constructor { name, args } => {
                self.type_ctor_pattern(case_scope, name, args, scrutinee_ty)?
            }
        };
        Ok(Spanned::new(info, pattern.span))
    }

    fn declare_pattern_binding(
        &mut self,
        case_scope: ScopeId,
        name: &str,
        ty: TypeId,
        span: Span,
    ) -> Result<()> {
        self.scopes.declare_local(
            case_scope,
            name.to_string(),
            LocalSymbol {
                ty,
                mutable: false,
                is_param: false,
                span,
            },
        )?;
        self.track_binding(name, span, false);
        Ok(())
    }

    fn type_ctor_pattern(
        &mut self,
        case_scope: ScopeId,
        name: &Spanned<String>,
        args: &[Spanned<Pattern>],
        scrutinee_ty: TypeId,
    ) -> Result<PatInfo> {
        let object = self
            .scopes
            .lookup_object(case_scope, &name.node)
            .ok_or_else(|| CompileError::value_not_found(&name.node, "", name.span))?;
        let candidates = self.pool.methods_named(object, "unapply")?;
        if candidates.is_empty() {
            return Err(CompileError::value_not_found(
                &format!("{}.unapply", name.node),
                "",
                name.span,
            ));
        }
        let resolved = resolve_overload(
            &mut self.pool,
            &self.builtins,
            "unapply",
            &candidates,
            &[],
            &[scrutinee_ty],
            name.span,
        )?;
        let unapply = resolved.method;

        if unapply.ret == self.builtins.boolean {
            if !args.is_empty() {
                return Err(CompileError::type_mismatch(
                    "an extractor yielding components",
                    "Boolean",
                    name.span,
                ));
            }
            return Ok(PatInfo::Ctor {
                object,
                unapply,
                boolean: true,
                components: Vec::new(),
            });
        }

        let ret_data = self.pool.data(unapply.ret);
        if ret_data.definition != Some(self.builtins.option) {
            return Err(CompileError::type_mismatch(
                "Boolean or Option",
                &self.pool.format_type(unapply.ret),
                name.span,
            ));
        }
        let inner = ret_data.type_args[0];

        let component_tys: Vec<TypeId> = if args.len() <= 1 {
            vec![inner]
        } else {
            let inner_data = self.pool.data(inner);
            let is_matching_tuple = inner_data
                .definition
                .map(|def| self.builtins.tuple(args.len()) == Some(def))
                .unwrap_or(false);
            if !is_matching_tuple {
                return Err(CompileError::type_mismatch(
                    &format!("a {}-component extractor", args.len()),
                    &self.pool.format_type(inner),
                    name.span,
                ));
            }
            inner_data.type_args.clone()
        };

        let mut components = Vec::with_capacity(args.len());
        for (arg, &ty) in args.iter().zip(&component_tys) {
            components.push((ty, self.type_pattern(case_scope, arg, ty)?));
        }
        Ok(PatInfo::Ctor {
            object,
            unapply,
            boolean: false,
            components,
        })
    }

    /// Lower one checked pattern into the conditional that guards
    /// `success`, matching against the local named `source`.
    fn lower_case(
        &mut self,
        source: &str,
        source_ty: TypeId,
        info: PatInfo,
        success: TExpr,
    ) -> Result<TExpr> {
        let unit = self.builtins.unit;
        let boolean = self.builtins.boolean;
        match info {
            PatInfo::Wildcard => Ok(success),
            PatInfo::Bind { name } => Ok(TExpr::new(
                unit,
                TExprKind::Block(vec![
                    TExpr::new(
                        unit,
                        TExprKind::Declare {
                            name,
                            mutable: false,
                            value: Some(Box::new(TExpr::new(
                                source_ty,
                                TExprKind::Local(source.to_string()),
                            ))),
                        },
                    ),
                    success,
                ]),
            )),
            PatInfo::Literal(lit) => Ok(TExpr::new(
                unit,
                TExprKind::If {
                    cond: Box::new(TExpr::new(
                        boolean,
                        TExprKind::Binary {
                            op: crate::ast::BinOp::Eq,
                            left: Box::new(TExpr::new(
                                source_ty,
                                TExprKind::Local(source.to_string()),
                            )),
                            right: Box::new(lit),
                        },
                    )),
                    then_branch: Box::new(success),
                    else_branch: None,
                },
            )),
            PatInfo::Typed { name, ty } => {
                let cast = TExpr::new(
                    ty,
                    TExprKind::SafeCast {
                        expr: Box::new(TExpr::new(
                            source_ty,
                            TExprKind::Local(source.to_string()),
                        )),
                        target: ty,
                    },
                );
                let not_null = TExpr::new(
                    boolean,
                    TExprKind::Unary {
                        op: crate::ast::UnOp::Not,
                        expr: Box::new(TExpr::new(
                            boolean,
                            TExprKind::IsNull(Box::new(TExpr::new(
                                ty,
                                TExprKind::Local(name.clone()),
                            ))),
                        )),
                    },
                );
                Ok(TExpr::new(
                    unit,
                    TExprKind::Block(vec![
                        TExpr::new(
                            unit,
                            TExprKind::Declare {
                                name,
                                mutable: false,
                                value: Some(Box::new(cast)),
                            },
                        ),
                        TExpr::new(
                            unit,
                            TExprKind::If {
                                cond: Box::new(not_null),
                                then_branch: Box::new(success),
                                else_branch: None,
                            },
                        ),
                    ]),
                ))
            }
            PatInfo::Ctor {
                object,
                unapply,
                boolean: is_boolean,
                components,
            } => self.lower_ctor(source, source_ty, object, unapply, is_boolean, components, success),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn lower_ctor(
        &mut self,
        source: &str,
        source_ty: TypeId,
        object: TypeId,
        unapply: Method,
        is_boolean: bool,
        components: Vec<(TypeId, Spanned<PatInfo>)>,
        success: TExpr,
    ) -> Result<TExpr> {
        let unit = self.builtins.unit;
        let boolean = self.builtins.boolean;
        let call = TExpr::new(
            unapply.ret,
            TExprKind::Call {
                target: Some(Box::new(TExpr::new(object, TExprKind::Object(object)))),
                owner: unapply.owner,
                method: "unapply".to_string(),
                args: vec![TExpr::new(source_ty, TExprKind::Local(source.to_string()))],
            },
        );

        if is_boolean {
            return Ok(TExpr::new(
                unit,
                TExprKind::If {
                    cond: Box::new(call),
                    then_branch: Box::new(success),
                    else_branch: None,
                },
            ));
        }

        let opt_ty = unapply.ret;
        let inner_ty = self.pool.data(opt_ty).type_args[0];
        let opt_name = self.fresh_temp("u");
        let get = TExpr::new(
            inner_ty,
            TExprKind::Call {
                target: Some(Box::new(TExpr::new(
                    opt_ty,
                    TExprKind::Local(opt_name.clone()),
                ))),
                owner: opt_ty,
                method: "get".to_string(),
                args: Vec::new(),
            },
        );

        let matched = if components.is_empty() {
            success
        } else if components.len() == 1 {
            let (component_ty, sub) = components.into_iter().next().expect("one component");
            let value_name = self.fresh_temp("v");
            let tail = self.lower_case(&value_name, component_ty, sub.node, success)?;
            TExpr::new(
                unit,
                TExprKind::Block(vec![
                    TExpr::new(
                        unit,
                        TExprKind::Declare {
                            name: value_name,
                            mutable: false,
                            value: Some(Box::new(get)),
                        },
                    ),
                    tail,
                ]),
            )
        } else {
            // Unpack the tuple, testing components left to right
            let tuple_name = self.fresh_temp("t");
            let mut tail = success;
            for (index, (component_ty, sub)) in components.into_iter().enumerate().rev() {
                let value_name = self.fresh_temp("v");
                let field = TExpr::new(
                    component_ty,
                    TExprKind::GetField {
                        target: Box::new(TExpr::new(
                            inner_ty,
                            TExprKind::Local(tuple_name.clone()),
                        )),
                        field: format!("_{}", index + 1),
                    },
                );
                let rest = self.lower_case(&value_name, component_ty, sub.node, tail)?;
                tail = TExpr::new(
                    unit,
                    TExprKind::Block(vec![
                        TExpr::new(
                            unit,
                            TExprKind::Declare {
                                name: value_name,
                                mutable: false,
                                value: Some(Box::new(field)),
                            },
                        ),
                        rest,
                    ]),
                );
            }
            TExpr::new(
                unit,
                TExprKind::Block(vec![
                    TExpr::new(
                        unit,
                        TExprKind::Declare {
                            name: tuple_name,
                            mutable: false,
                            value: Some(Box::new(get)),
                        },
                    ),
                    tail,
                ]),
            )
        };

        let is_defined = TExpr::new(
            boolean,
            TExprKind::Call {
                target: Some(Box::new(TExpr::new(
                    opt_ty,
                    TExprKind::Local(opt_name.clone()),
                ))),
                owner: opt_ty,
                method: "isDefined".to_string(),
                args: Vec::new(),
            },
        );
        Ok(TExpr::new(
            unit,
            TExprKind::Block(vec![
                TExpr::new(
                    unit,
                    TExprKind::Declare {
                        name: opt_name,
                        mutable: false,
                        value: Some(Box::new(call)),
                    },
                ),
                TExpr::new(
                    unit,
                    TExprKind::If {
                        cond: Box::new(is_defined),
                        then_branch: Box::new(matched),
                        else_branch: None,
                    },
                ),
            ]),
        ))
    }
}
