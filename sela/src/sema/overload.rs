//! Overload resolution
//!
//! Candidates are filtered by arity, instantiated (explicit type arguments
//! or inference from the argument types), then compared against the actual
//! arguments. An overload whose parameters match the arguments exactly
//! wins immediately; otherwise every candidate reachable through numeric
//! widening or subtype assignability is collected, and anything other than
//! exactly one survivor is a diagnostic.

use crate::ast::Span;
use crate::error::{CompileError, Result};
use crate::sema::infer::infer_type_args;
use crate::types::builtins::Builtins;
use crate::types::{Method, TypeId, TypePool};

/// A successfully resolved call
#[derive(Debug, Clone)]
pub struct ResolvedCall {
    /// The chosen overload with all generic parameters substituted away
    pub method: Method,
    /// The type arguments the substitution used
    pub type_args: Vec<TypeId>,
}

pub fn resolve_overload(
    pool: &mut TypePool,
    builtins: &Builtins,
    name: &str,
    candidates: &[Method],
    explicit_type_args: &[TypeId],
    arg_types: &[TypeId],
    span: Span,
) -> Result<ResolvedCall> {
    let argc = arg_types.len();
    let arity_ok: Vec<&Method> = candidates
        .iter()
        .filter(|m| accepts_arity(m, argc))
        .collect();
    if arity_ok.is_empty() {
        if candidates.iter().any(|m| m.fixed_arity() > argc) {
            return Err(CompileError::not_enough_arguments(name, span));
        }
        return Err(CompileError::no_overload(
            name,
            &format_args_list(pool, arg_types),
            span,
        ));
    }

    let sole_candidate = arity_ok.len() == 1;
    let mut compatible: Vec<ResolvedCall> = Vec::new();
    let mut inference_failure: Option<CompileError> = None;

    for candidate in arity_ok {
        let resolved = match instantiate(
            pool,
            builtins,
            candidate,
            explicit_type_args,
            arg_types,
            span,
        ) {
            Ok(Some(r)) => r,
            Ok(None) => continue,
            Err(err) => {
                if sole_candidate {
                    inference_failure = Some(err);
                }
                continue;
            }
        };
        let param_types = expanded_param_types(&resolved.method, argc);
        if arg_types == param_types.as_slice() {
            return Ok(resolved);
        }
        let fits = arg_types.iter().zip(&param_types).all(|(arg, param)| {
            arg == param
                || builtins.widens_to(*arg, *param)
                || pool.is_assignable(*param, *arg)
        });
        if fits {
            compatible.push(resolved);
        }
    }

    if compatible.len() > 1 {
        return Err(CompileError::ambiguous_overload(name, compatible.len(), span));
    }
    match compatible.pop() {
        Some(r) => Ok(r),
        None => Err(inference_failure.unwrap_or_else(|| {
            CompileError::no_overload(name, &format_args_list(pool, arg_types), span)
        })),
    }
}

fn accepts_arity(m: &Method, argc: usize) -> bool {
    if m.is_variadic() {
        argc >= m.fixed_arity()
    } else {
        argc == m.params.len()
    }
}

/// Substitute the candidate's own generic parameters. Returns `Ok(None)`
/// when explicit type arguments rule the candidate out by count.
fn instantiate(
    pool: &mut TypePool,
    builtins: &Builtins,
    candidate: &Method,
    explicit_type_args: &[TypeId],
    arg_types: &[TypeId],
    span: Span,
) -> Result<Option<ResolvedCall>> {
    if candidate.type_params.is_empty() {
        if !explicit_type_args.is_empty() {
            return Ok(None);
        }
        return Ok(Some(ResolvedCall {
            method: candidate.clone(),
            type_args: Vec::new(),
        }));
    }

    let type_args = if explicit_type_args.is_empty() {
        let targets = expanded_param_types(candidate, arg_types.len());
        infer_type_args(
            pool,
            builtins.undefined,
            &candidate.type_params,
            arg_types,
            &targets,
            span,
        )?
    } else {
        if explicit_type_args.len() != candidate.type_params.len() {
            return Ok(None);
        }
        explicit_type_args.to_vec()
    };

    let param_ids: Vec<TypeId> = candidate.type_params.iter().map(|p| p.ty).collect();
    let mut method = candidate.clone();
    for p in &mut method.params {
        p.ty = pool.substitute(p.ty, &param_ids, &type_args)?;
    }
    method.ret = pool.substitute(method.ret, &param_ids, &type_args)?;
    method.type_params = Vec::new();
    Ok(Some(ResolvedCall { method, type_args }))
}

/// Declared parameter types stretched to the call's arity, repeating the
/// variadic element type as needed
fn expanded_param_types(m: &Method, argc: usize) -> Vec<TypeId> {
    let mut out: Vec<TypeId> = m.params.iter().map(|p| p.ty).collect();
    if m.is_variadic() {
        if let Some(elem) = out.pop() {
            let fixed = out.len();
            out.extend(std::iter::repeat(elem).take(argc - fixed));
        }
    }
    out
}

fn format_args_list(pool: &TypePool, args: &[TypeId]) -> String {
    args.iter()
        .map(|a| pool.format_type(*a))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::{MethodFlags, Param, TypeKind};

    fn env() -> (TypePool, Builtins) {
        let mut pool = TypePool::new();
        let builtins = Builtins::install(&mut pool);
        (pool, builtins)
    }

    fn method(owner: TypeId, name: &str, params: &[TypeId], ret: TypeId) -> Method {
        Method {
            name: name.to_string(),
            owner,
            flags: MethodFlags::default(),
            type_params: Vec::new(),
            params: params
                .iter()
                .enumerate()
                .map(|(i, ty)| Param {
                    name: format!("p{i}"),
                    ty: *ty,
                    variadic: false,
                })
                .collect(),
            ret,
        }
    }

    #[test]
    fn test_exact_match_wins_over_widening() {
        let (mut pool, b) = env();
        let owner = pool.define("M", TypeKind::Object);
        let candidates = vec![
            method(owner, "f", &[b.long], b.string),
            method(owner, "f", &[b.int], b.boolean),
        ];
        let r = resolve_overload(&mut pool, &b, "f", &candidates, &[], &[b.int], Span::dummy())
            .unwrap();
        assert_eq!(r.method.ret, b.boolean);
    }

    #[test]
    fn test_widening_candidate_used_when_no_exact() {
        let (mut pool, b) = env();
        let owner = pool.define("M", TypeKind::Object);
        let candidates = vec![method(owner, "f", &[b.double], b.unit)];
        let r = resolve_overload(&mut pool, &b, "f", &candidates, &[], &[b.int], Span::dummy())
            .unwrap();
        assert_eq!(r.method.params[0].ty, b.double);
    }

    #[test]
    fn test_ambiguous_widening() {
        let (mut pool, b) = env();
        let owner = pool.define("M", TypeKind::Object);
        let candidates = vec![
            method(owner, "f", &[b.long], b.unit),
            method(owner, "f", &[b.double], b.unit),
        ];
        let err = resolve_overload(&mut pool, &b, "f", &candidates, &[], &[b.int], Span::dummy())
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::AmbiguousOverload));
    }

    #[test]
    fn test_no_overload() {
        let (mut pool, b) = env();
        let owner = pool.define("M", TypeKind::Object);
        let candidates = vec![method(owner, "f", &[b.int], b.unit)];
        let err = resolve_overload(
            &mut pool,
            &b,
            "f",
            &candidates,
            &[],
            &[b.string],
            Span::dummy(),
        )
        .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NoOverload));
        assert!(err.message().contains("String"));
    }

    #[test]
    fn test_not_enough_arguments() {
        let (mut pool, b) = env();
        let owner = pool.define("M", TypeKind::Object);
        let candidates = vec![method(owner, "f", &[b.int, b.int], b.unit)];
        let err =
            resolve_overload(&mut pool, &b, "f", &candidates, &[], &[b.int], Span::dummy())
                .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NotEnoughArguments));
    }

    #[test]
    fn test_subtype_argument_is_compatible() {
        let (mut pool, b) = env();
        let owner = pool.define("M", TypeKind::Object);
        let candidates = vec![method(owner, "f", &[b.any], b.unit)];
        let r = resolve_overload(
            &mut pool,
            &b,
            "f",
            &candidates,
            &[],
            &[b.string],
            Span::dummy(),
        )
        .unwrap();
        assert_eq!(r.method.params[0].ty, b.any);
    }

    #[test]
    fn test_variadic_accepts_extra_arguments() {
        let (mut pool, b) = env();
        let printf = pool.methods_named(b.predef, "printf").unwrap();
        let args = [b.string, b.int, b.string];
        let r = resolve_overload(&mut pool, &b, "printf", &printf, &[], &args, Span::dummy())
            .unwrap();
        assert_eq!(r.method.ret, b.unit);

        let r = resolve_overload(&mut pool, &b, "printf", &printf, &[], &[b.string], Span::dummy())
            .unwrap();
        assert_eq!(r.method.ret, b.unit);
    }

    #[test]
    fn test_generic_inference_from_argument() {
        let (mut pool, b) = env();
        let some = pool.methods_named(b.predef, "some").unwrap();
        let r = resolve_overload(&mut pool, &b, "some", &some, &[], &[b.int], Span::dummy())
            .unwrap();
        assert_eq!(r.type_args, vec![b.int]);
        let opt_int = pool.make_generic(b.option, &[b.int]).unwrap();
        assert_eq!(r.method.ret, opt_int);
    }

    #[test]
    fn test_explicit_type_arguments() {
        let (mut pool, b) = env();
        let none = pool.methods_named(b.predef, "none").unwrap();
        let r = resolve_overload(&mut pool, &b, "none", &none, &[b.string], &[], Span::dummy())
            .unwrap();
        let opt_string = pool.make_generic(b.option, &[b.string]).unwrap();
        assert_eq!(r.method.ret, opt_string);
    }

    #[test]
    fn test_uninferable_sole_candidate_reports_inference_error() {
        let (mut pool, b) = env();
        let none = pool.methods_named(b.predef, "none").unwrap();
        let err = resolve_overload(&mut pool, &b, "none", &none, &[], &[], Span::dummy())
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::CannotInferType));
    }
}
