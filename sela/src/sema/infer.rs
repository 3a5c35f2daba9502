//! Structural type-argument inference
//!
//! Given a call to a generic method without explicit type arguments, infer
//! them by matching each argument type against the corresponding declared
//! parameter type. Matching is structural: inflations of the same
//! definition are unzipped pairwise. The first binding for a parameter
//! wins; later occurrences never override it.

use std::collections::HashMap;

use crate::ast::Span;
use crate::error::{CompileError, Result};
use crate::types::{GenericParam, TypeId, TypePool};

/// Infer arguments for `type_params` by matching `sources` (actual types,
/// with `undefined` standing in for unknowns) against `targets` (declared
/// types that may mention the parameters). Fails with a diagnostic when a
/// parameter stays unbound.
pub fn infer_type_args(
    pool: &TypePool,
    undefined: TypeId,
    type_params: &[GenericParam],
    sources: &[TypeId],
    targets: &[TypeId],
    span: Span,
) -> Result<Vec<TypeId>> {
    debug_assert_eq!(sources.len(), targets.len());
    let mut bindings: HashMap<TypeId, TypeId> = HashMap::new();
    for (source, target) in sources.iter().zip(targets) {
        bind(pool, undefined, type_params, *source, *target, &mut bindings);
    }
    type_params
        .iter()
        .map(|p| {
            bindings
                .get(&p.ty)
                .copied()
                .ok_or_else(|| CompileError::cannot_infer_type(&p.name, span))
        })
        .collect()
}

fn bind(
    pool: &TypePool,
    undefined: TypeId,
    type_params: &[GenericParam],
    source: TypeId,
    target: TypeId,
    bindings: &mut HashMap<TypeId, TypeId>,
) {
    if source == undefined {
        return;
    }
    if type_params.iter().any(|p| p.ty == target) {
        bindings.entry(target).or_insert(source);
        return;
    }
    let sd = pool.data(source);
    let td = pool.data(target);
    if let (Some(sdef), Some(tdef)) = (sd.definition, td.definition) {
        if sdef == tdef {
            for (s, t) in sd.type_args.iter().zip(td.type_args.clone()) {
                bind(pool, undefined, type_params, *s, t, bindings);
            }
        }
    }
}
