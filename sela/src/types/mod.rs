//! The type model
//!
//! Types live in an arena (`TypePool`) and are referenced by `TypeId`
//! handles, so partially constructed entries (a class whose base is not yet
//! wired, a closure referencing an unfinished outer scope) can be referenced
//! and patched in place. Generic instantiations are interned: inflating the
//! same definition with the same argument tuple always yields the same
//! `TypeId`, which makes id equality coincide with name equality.

pub mod builtins;

use std::collections::HashMap;

use crate::ast::VarianceAnn;
use crate::error::{CompileError, ErrorCode, Result};

/// Handle to a type in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What kind of entity a pool entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Object,
    Trait,
    GenericParam,
}

/// Subtyping direction of a generic parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variance {
    Invariant,
    Covariant,
    Contravariant,
}

impl From<VarianceAnn> for Variance {
    fn from(ann: VarianceAnn) -> Self {
        match ann {
            VarianceAnn::Invariant => Variance::Invariant,
            VarianceAnn::Covariant => Variance::Covariant,
            VarianceAnn::Contravariant => Variance::Contravariant,
        }
    }
}

/// A generic parameter declared on a type or a method
#[derive(Debug, Clone)]
pub struct GenericParam {
    pub name: String,
    /// Index used for positional substitution
    pub position: usize,
    pub variance: Variance,
    pub upper_bound: Option<TypeId>,
    /// The parameter's own pool entry, so it can appear in signatures
    pub ty: TypeId,
}

/// Plain description of a generic parameter, before pool entries exist
#[derive(Debug, Clone)]
pub struct GenericParamDecl {
    pub name: String,
    pub variance: Variance,
    pub upper_bound: Option<TypeId>,
}

impl GenericParamDecl {
    pub fn invariant(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variance: Variance::Invariant,
            upper_bound: None,
        }
    }

    pub fn with_variance(name: impl Into<String>, variance: Variance) -> Self {
        Self {
            name: name.into(),
            variance,
            upper_bound: None,
        }
    }
}

/// Method parameter
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: TypeId,
    pub variadic: bool,
}

/// Method attribute flags
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodFlags {
    pub private: bool,
    pub abstract_: bool,
    pub override_: bool,
    pub static_: bool,
    pub final_: bool,
    pub synthetic: bool,
}

/// Method or constructor descriptor
#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub owner: TypeId,
    pub flags: MethodFlags,
    /// The method's own generic parameters, distinct from the owner's
    pub type_params: Vec<GenericParam>,
    pub params: Vec<Param>,
    pub ret: TypeId,
}

impl Method {
    /// Minimum number of arguments a call must supply
    pub fn fixed_arity(&self) -> usize {
        if self.is_variadic() {
            self.params.len() - 1
        } else {
            self.params.len()
        }
    }

    pub fn is_variadic(&self) -> bool {
        self.params.last().map(|p| p.variadic).unwrap_or(false)
    }
}

/// Field attribute flags
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldFlags {
    pub private: bool,
    pub static_: bool,
    pub readonly: bool,
}

/// Field descriptor
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub owner: TypeId,
    pub flags: FieldFlags,
    pub ty: TypeId,
}

impl Field {
    /// Accessor names for fields backing mutable class parameters
    pub fn accessor_names(name: &str) -> (String, String) {
        (format!("get_{name}"), format!("set_{name}"))
    }
}

/// A type entry in the pool.
///
/// Exactly one of these holds: `type_params` is non-empty (a generic
/// definition), or `definition` is set (an inflated instantiation), or
/// neither (a plain type). Never both.
#[derive(Debug, Clone)]
pub struct TypeData {
    pub name: String,
    pub kind: TypeKind,
    pub is_abstract: bool,
    pub is_sealed: bool,
    pub is_private: bool,
    pub is_synthetic: bool,
    /// The bottom type is assignable to everything
    pub is_bottom: bool,
    /// The top type accepts everything
    pub is_top: bool,
    pub base: Option<TypeId>,
    pub declaring: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    pub type_params: Vec<GenericParam>,
    /// Set iff this is an inflated type
    pub definition: Option<TypeId>,
    pub type_args: Vec<TypeId>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub ctors: Vec<Method>,
    /// Generic-parameter entries only
    pub position: usize,
    pub variance: Variance,
    pub upper_bound: Option<TypeId>,
    pub owned_by_method: bool,
}

impl TypeData {
    fn new(name: String, kind: TypeKind) -> Self {
        Self {
            name,
            kind,
            is_abstract: false,
            is_sealed: false,
            is_private: false,
            is_synthetic: false,
            is_bottom: false,
            is_top: false,
            base: None,
            declaring: None,
            interfaces: Vec::new(),
            type_params: Vec::new(),
            definition: None,
            type_args: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            ctors: Vec::new(),
            position: 0,
            variance: Variance::Invariant,
            upper_bound: None,
            owned_by_method: false,
        }
    }

    pub fn is_generic_definition(&self) -> bool {
        !self.type_params.is_empty()
    }

    pub fn is_inflated(&self) -> bool {
        self.definition.is_some()
    }

    pub fn is_generic_param(&self) -> bool {
        self.kind == TypeKind::GenericParam
    }
}

/// Arena of types plus the inflation cache
#[derive(Debug, Default)]
pub struct TypePool {
    types: Vec<TypeData>,
    inflation_cache: HashMap<(TypeId, Vec<TypeId>), TypeId>,
}

impl TypePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Create a fresh type entry
    pub fn define(&mut self, name: impl Into<String>, kind: TypeKind) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeData::new(name.into(), kind));
        id
    }

    pub fn data(&self, id: TypeId) -> &TypeData {
        &self.types[id.index()]
    }

    pub fn data_mut(&mut self, id: TypeId) -> &mut TypeData {
        &mut self.types[id.index()]
    }

    /// Create pool entries for a list of generic parameters without
    /// attaching them to an owner; used for method type parameters.
    pub fn fresh_generic_params(
        &mut self,
        decls: &[GenericParamDecl],
        owned_by_method: bool,
    ) -> Vec<GenericParam> {
        let mut params = Vec::with_capacity(decls.len());
        for (position, decl) in decls.iter().enumerate() {
            let ty = self.define(decl.name.clone(), TypeKind::GenericParam);
            {
                let data = self.data_mut(ty);
                data.position = position;
                data.variance = decl.variance;
                data.upper_bound = decl.upper_bound;
                data.base = decl.upper_bound;
                data.owned_by_method = owned_by_method;
            }
            params.push(GenericParam {
                name: decl.name.clone(),
                position,
                variance: decl.variance,
                upper_bound: decl.upper_bound,
                ty,
            });
        }
        params
    }

    /// Declare the generic parameters of a type. Fails if the type already
    /// has parameters.
    pub fn define_generic_params(
        &mut self,
        owner: TypeId,
        decls: &[GenericParamDecl],
    ) -> Result<Vec<GenericParam>> {
        if !self.data(owner).type_params.is_empty() {
            return Err(CompileError::internal(
                ErrorCode::GenericParamsRedefined,
                format!(
                    "generic parameters of `{}` are already defined",
                    self.data(owner).name
                ),
            ));
        }
        let params = self.fresh_generic_params(decls, false);
        for p in &params {
            self.data_mut(p.ty).declaring = Some(owner);
        }
        self.data_mut(owner).type_params = params.clone();
        Ok(params)
    }

    /// Declare the generic parameters of a method. Fails if the method
    /// already has parameters.
    pub fn define_method_generic_params(
        &mut self,
        method: &mut Method,
        decls: &[GenericParamDecl],
    ) -> Result<()> {
        if !method.type_params.is_empty() {
            return Err(CompileError::internal(
                ErrorCode::GenericParamsRedefined,
                format!("generic parameters of `{}` are already defined", method.name),
            ));
        }
        method.type_params = self.fresh_generic_params(decls, true);
        Ok(())
    }

    /// Inflate a generic definition with a fixed argument tuple.
    ///
    /// If `definition` is itself a generic parameter, substitution
    /// short-circuits to `args[position]`; this is what makes nested
    /// substitution come out right when a parameter type is itself a
    /// parameter. Instantiations are interned, so equal argument tuples
    /// yield the same handle.
    pub fn make_generic(&mut self, definition: TypeId, args: &[TypeId]) -> Result<TypeId> {
        let def = self.data(definition);
        if def.is_generic_param() {
            let position = def.position;
            return args.get(position).copied().ok_or_else(|| {
                CompileError::internal(
                    ErrorCode::InflateNonGeneric,
                    format!(
                        "generic parameter position {} out of range for {} arguments",
                        position,
                        args.len()
                    ),
                )
            });
        }
        if !def.is_generic_definition() {
            return Err(CompileError::internal(
                ErrorCode::InflateNonGeneric,
                format!("`{}` is not a generic type definition", def.name),
            ));
        }
        if def.type_params.len() != args.len() {
            return Err(CompileError::internal(
                ErrorCode::InflateNonGeneric,
                format!(
                    "`{}` expects {} type arguments, got {}",
                    def.name,
                    def.type_params.len(),
                    args.len()
                ),
            ));
        }

        let key = (definition, args.to_vec());
        if let Some(cached) = self.inflation_cache.get(&key) {
            return Ok(*cached);
        }

        let id = TypeId(self.types.len() as u32);
        let mut data = TypeData::new(self.data(definition).name.clone(), self.data(definition).kind);
        data.is_abstract = self.data(definition).is_abstract;
        data.is_sealed = self.data(definition).is_sealed;
        data.is_private = self.data(definition).is_private;
        data.is_synthetic = self.data(definition).is_synthetic;
        data.declaring = self.data(definition).declaring;
        data.definition = Some(definition);
        data.type_args = args.to_vec();
        self.types.push(data);
        // Intern before wiring the base so self-referential hierarchies
        // (e.g. F-bounded definitions) terminate.
        self.inflation_cache.insert(key, id);

        let param_ids: Vec<TypeId> = self.data(definition).type_params.iter().map(|p| p.ty).collect();
        let base = self.data(definition).base;
        let interfaces = self.data(definition).interfaces.clone();
        let new_base = match base {
            Some(b) => Some(self.substitute(b, &param_ids, args)?),
            None => None,
        };
        let mut new_interfaces = Vec::with_capacity(interfaces.len());
        for iface in interfaces {
            new_interfaces.push(self.substitute(iface, &param_ids, args)?);
        }
        let data = self.data_mut(id);
        data.base = new_base;
        data.interfaces = new_interfaces;
        Ok(id)
    }

    /// Replace occurrences of `params[i]` by `args[i]` inside `ty`,
    /// recursing through inflated types.
    pub fn substitute(&mut self, ty: TypeId, params: &[TypeId], args: &[TypeId]) -> Result<TypeId> {
        if let Some(pos) = params.iter().position(|p| *p == ty) {
            return Ok(args[pos]);
        }
        let data = self.data(ty);
        if let Some(definition) = data.definition {
            let old_args = data.type_args.clone();
            let mut new_args = Vec::with_capacity(old_args.len());
            let mut changed = false;
            for arg in old_args {
                let new_arg = self.substitute(arg, params, args)?;
                changed |= new_arg != arg;
                new_args.push(new_arg);
            }
            if !changed {
                return Ok(ty);
            }
            return self.make_generic(definition, &new_args);
        }
        Ok(ty)
    }

    fn substitute_method(
        &mut self,
        method: &Method,
        params: &[TypeId],
        args: &[TypeId],
    ) -> Result<Method> {
        let mut out = method.clone();
        for p in &mut out.params {
            p.ty = self.substitute(p.ty, params, args)?;
        }
        out.ret = self.substitute(out.ret, params, args)?;
        Ok(out)
    }

    /// Fields of a type; for inflated types, signatures are derived from
    /// the definition by positional substitution.
    pub fn fields_of(&mut self, id: TypeId) -> Result<Vec<Field>> {
        match self.data(id).definition {
            None => Ok(self.data(id).fields.clone()),
            Some(definition) => {
                let param_ids: Vec<TypeId> =
                    self.data(definition).type_params.iter().map(|p| p.ty).collect();
                let args = self.data(id).type_args.clone();
                let fields = self.data(definition).fields.clone();
                let mut out = Vec::with_capacity(fields.len());
                for mut f in fields {
                    f.ty = self.substitute(f.ty, &param_ids, &args)?;
                    f.owner = id;
                    out.push(f);
                }
                Ok(out)
            }
        }
    }

    /// Methods of a type, substituted for inflated types
    pub fn methods_of(&mut self, id: TypeId) -> Result<Vec<Method>> {
        match self.data(id).definition {
            None => Ok(self.data(id).methods.clone()),
            Some(definition) => {
                let param_ids: Vec<TypeId> =
                    self.data(definition).type_params.iter().map(|p| p.ty).collect();
                let args = self.data(id).type_args.clone();
                let methods = self.data(definition).methods.clone();
                let mut out = Vec::with_capacity(methods.len());
                for m in &methods {
                    let mut s = self.substitute_method(m, &param_ids, &args)?;
                    s.owner = id;
                    out.push(s);
                }
                Ok(out)
            }
        }
    }

    /// Constructors of a type, substituted for inflated types
    pub fn ctors_of(&mut self, id: TypeId) -> Result<Vec<Method>> {
        match self.data(id).definition {
            None => Ok(self.data(id).ctors.clone()),
            Some(definition) => {
                let param_ids: Vec<TypeId> =
                    self.data(definition).type_params.iter().map(|p| p.ty).collect();
                let args = self.data(id).type_args.clone();
                let ctors = self.data(definition).ctors.clone();
                let mut out = Vec::with_capacity(ctors.len());
                for m in &ctors {
                    let mut s = self.substitute_method(m, &param_ids, &args)?;
                    s.owner = id;
                    out.push(s);
                }
                Ok(out)
            }
        }
    }

    /// All methods named `name` on `id` and its base chain, nearest first
    pub fn methods_named(&mut self, id: TypeId, name: &str) -> Result<Vec<Method>> {
        let mut out = Vec::new();
        let mut cur = Some(id);
        while let Some(t) = cur {
            for m in self.methods_of(t)? {
                if m.name == name {
                    out.push(m);
                }
            }
            cur = self.data(t).base;
        }
        Ok(out)
    }

    /// Nearest field named `name` on `id` or its base chain
    pub fn field_named(&mut self, id: TypeId, name: &str) -> Result<Option<Field>> {
        let mut cur = Some(id);
        while let Some(t) = cur {
            for f in self.fields_of(t)? {
                if f.name == name {
                    return Ok(Some(f));
                }
            }
            cur = self.data(t).base;
        }
        Ok(None)
    }

    /// Subclass test by base-chain walk. The bottom type is a subclass of
    /// everything; the top type is a superclass of everything.
    pub fn is_subclass_of(&self, sub: TypeId, sup: TypeId) -> bool {
        if sub == sup || self.data(sub).is_bottom || self.data(sup).is_top {
            return true;
        }
        let mut cur = self.data(sub).base;
        while let Some(t) = cur {
            if t == sup {
                return true;
            }
            cur = self.data(t).base;
        }
        false
    }

    /// Assignability: `right` can be stored where `left` is expected.
    ///
    /// Inflations of the same definition compare argument-wise per each
    /// parameter's declared variance; otherwise the test walks `right`'s
    /// base chain.
    pub fn is_assignable(&self, left: TypeId, right: TypeId) -> bool {
        if left == right || self.data(right).is_bottom || self.data(left).is_top {
            return true;
        }
        let ld = self.data(left);
        let rd = self.data(right);
        if let (Some(ldef), Some(rdef)) = (ld.definition, rd.definition) {
            if ldef == rdef {
                let params = &self.data(ldef).type_params;
                let compatible = params.iter().enumerate().all(|(i, p)| {
                    let la = ld.type_args[i];
                    let ra = rd.type_args[i];
                    match p.variance {
                        Variance::Invariant => la == ra,
                        Variance::Covariant => self.is_subclass_of(ra, la),
                        Variance::Contravariant => self.is_subclass_of(la, ra),
                    }
                });
                if compatible {
                    return true;
                }
            }
        }
        match rd.base {
            Some(b) => self.is_assignable(left, b),
            None => false,
        }
    }

    /// Runtime instance test: same type, an implemented interface (direct
    /// or through the base chain), or recursively true of the base.
    pub fn is_instance_of(&self, ty: TypeId, other: TypeId) -> bool {
        if ty == other {
            return true;
        }
        let data = self.data(ty);
        for iface in &data.interfaces {
            if *iface == other || self.is_instance_of(*iface, other) {
                return true;
            }
        }
        match data.base {
            Some(b) => self.is_instance_of(b, other),
            None => false,
        }
    }

    /// Nearest common ancestor of two types, walking `a`'s base chain for
    /// the closest type that accepts `b`.
    pub fn common_ancestor(&self, a: TypeId, b: TypeId) -> Option<TypeId> {
        if self.data(a).is_bottom {
            return Some(b);
        }
        if self.data(b).is_bottom {
            return Some(a);
        }
        if self.is_assignable(a, b) {
            return Some(a);
        }
        if self.is_assignable(b, a) {
            return Some(b);
        }
        let mut cur = self.data(a).base;
        while let Some(t) = cur {
            if self.is_assignable(t, b) {
                return Some(t);
            }
            cur = self.data(t).base;
        }
        None
    }

    /// Human-readable rendering: `List[Option[Int]]`
    pub fn format_type(&self, id: TypeId) -> String {
        let data = self.data(id);
        if data.type_args.is_empty() {
            data.name.clone()
        } else {
            let args: Vec<String> = data.type_args.iter().map(|a| self.format_type(*a)).collect();
            format!("{}[{}]", data.name, args.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with_any() -> (TypePool, TypeId) {
        let mut pool = TypePool::new();
        let any = pool.define("Any", TypeKind::Class);
        pool.data_mut(any).is_top = true;
        (pool, any)
    }

    fn class(pool: &mut TypePool, name: &str, base: TypeId) -> TypeId {
        let id = pool.define(name, TypeKind::Class);
        pool.data_mut(id).base = Some(base);
        id
    }

    fn list_with_variance(pool: &mut TypePool, any: TypeId, variance: Variance) -> TypeId {
        let list = class(pool, "List", any);
        pool.define_generic_params(list, &[GenericParamDecl::with_variance("A", variance)])
            .unwrap();
        list
    }

    #[test]
    fn test_inflation_identity() {
        let (mut pool, any) = pool_with_any();
        let int = class(&mut pool, "Int", any);
        let string = class(&mut pool, "String", any);
        let list = list_with_variance(&mut pool, any, Variance::Invariant);

        let a = pool.make_generic(list, &[int]).unwrap();
        let b = pool.make_generic(list, &[int]).unwrap();
        let c = pool.make_generic(list, &[string]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_inflate_non_generic_is_internal_error() {
        let (mut pool, any) = pool_with_any();
        let int = class(&mut pool, "Int", any);
        let err = pool.make_generic(int, &[any]).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InflateNonGeneric));
    }

    #[test]
    fn test_inflate_wrong_arity_fails() {
        let (mut pool, any) = pool_with_any();
        let int = class(&mut pool, "Int", any);
        let list = list_with_variance(&mut pool, any, Variance::Invariant);
        assert!(pool.make_generic(list, &[int, int]).is_err());
    }

    #[test]
    fn test_define_generic_params_twice_fails() {
        let (mut pool, any) = pool_with_any();
        let list = class(&mut pool, "List", any);
        pool.define_generic_params(list, &[GenericParamDecl::invariant("A")])
            .unwrap();
        let err = pool
            .define_generic_params(list, &[GenericParamDecl::invariant("B")])
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::GenericParamsRedefined));
    }

    #[test]
    fn test_generic_param_substitution_short_circuits() {
        let (mut pool, any) = pool_with_any();
        let int = class(&mut pool, "Int", any);
        let string = class(&mut pool, "String", any);
        let list = list_with_variance(&mut pool, any, Variance::Invariant);
        let a = pool.data(list).type_params[0].ty;

        // Inflating the parameter itself picks the positional argument.
        assert_eq!(pool.make_generic(a, &[int]).unwrap(), int);
        assert_eq!(pool.make_generic(a, &[string]).unwrap(), string);
    }

    #[test]
    fn test_nested_substitution() {
        let (mut pool, any) = pool_with_any();
        let int = class(&mut pool, "Int", any);
        let list = list_with_variance(&mut pool, any, Variance::Invariant);
        let a = pool.data(list).type_params[0].ty;

        // List[A] with A := Int is List[Int]
        let list_a = pool.make_generic(list, &[a]).unwrap();
        let list_int = pool.substitute(list_a, &[a], &[int]).unwrap();
        assert_eq!(list_int, pool.make_generic(list, &[int]).unwrap());
    }

    #[test]
    fn test_assignability_reflexive() {
        let (mut pool, any) = pool_with_any();
        let fruit = class(&mut pool, "Fruit", any);
        assert!(pool.is_assignable(fruit, fruit));
    }

    #[test]
    fn test_assignability_unrelated_types() {
        let (mut pool, any) = pool_with_any();
        let fruit = class(&mut pool, "Fruit", any);
        let tool = class(&mut pool, "Tool", any);
        assert!(!pool.is_assignable(fruit, tool));
        assert!(!pool.is_assignable(tool, fruit));
    }

    #[test]
    fn test_assignability_base_chain() {
        let (mut pool, any) = pool_with_any();
        let fruit = class(&mut pool, "Fruit", any);
        let apple = class(&mut pool, "Apple", fruit);
        assert!(pool.is_assignable(fruit, apple));
        assert!(!pool.is_assignable(apple, fruit));
    }

    #[test]
    fn test_covariant_argument() {
        let (mut pool, any) = pool_with_any();
        let fruit = class(&mut pool, "Fruit", any);
        let apple = class(&mut pool, "Apple", fruit);
        let list = list_with_variance(&mut pool, any, Variance::Covariant);

        let list_fruit = pool.make_generic(list, &[fruit]).unwrap();
        let list_apple = pool.make_generic(list, &[apple]).unwrap();
        assert!(pool.is_assignable(list_fruit, list_apple));
        assert!(!pool.is_assignable(list_apple, list_fruit));
    }

    #[test]
    fn test_contravariant_argument() {
        let (mut pool, any) = pool_with_any();
        let fruit = class(&mut pool, "Fruit", any);
        let apple = class(&mut pool, "Apple", fruit);
        let sink = list_with_variance(&mut pool, any, Variance::Contravariant);

        let sink_fruit = pool.make_generic(sink, &[fruit]).unwrap();
        let sink_apple = pool.make_generic(sink, &[apple]).unwrap();
        assert!(pool.is_assignable(sink_apple, sink_fruit));
        assert!(!pool.is_assignable(sink_fruit, sink_apple));
    }

    #[test]
    fn test_invariant_argument() {
        let (mut pool, any) = pool_with_any();
        let fruit = class(&mut pool, "Fruit", any);
        let apple = class(&mut pool, "Apple", fruit);
        let list = list_with_variance(&mut pool, any, Variance::Invariant);

        let list_fruit = pool.make_generic(list, &[fruit]).unwrap();
        let list_apple = pool.make_generic(list, &[apple]).unwrap();
        assert!(!pool.is_assignable(list_fruit, list_apple));
        assert!(!pool.is_assignable(list_apple, list_fruit));
        assert!(pool.is_assignable(list_apple, list_apple));
    }

    #[test]
    fn test_inflated_base_chain_is_substituted() {
        let (mut pool, any) = pool_with_any();
        let int = class(&mut pool, "Int", any);
        let seq = pool.define("Seq", TypeKind::Class);
        pool.data_mut(seq).base = Some(any);
        pool.define_generic_params(seq, &[GenericParamDecl::with_variance("A", Variance::Covariant)])
            .unwrap();
        // class List[A] extends Seq[A]
        let list = pool.define("List", TypeKind::Class);
        let params = pool
            .define_generic_params(list, &[GenericParamDecl::with_variance("A", Variance::Covariant)])
            .unwrap();
        let seq_a = pool.make_generic(seq, &[params[0].ty]).unwrap();
        pool.data_mut(list).base = Some(seq_a);

        let list_int = pool.make_generic(list, &[int]).unwrap();
        let seq_int = pool.make_generic(seq, &[int]).unwrap();
        assert_eq!(pool.data(list_int).base, Some(seq_int));
        assert!(pool.is_assignable(seq_int, list_int));
    }

    #[test]
    fn test_is_instance_of_interface() {
        let (mut pool, any) = pool_with_any();
        let ord = pool.define("Ord", TypeKind::Trait);
        let fruit = class(&mut pool, "Fruit", any);
        pool.data_mut(fruit).interfaces.push(ord);
        let apple = class(&mut pool, "Apple", fruit);

        assert!(pool.is_instance_of(fruit, ord));
        // interface is reached through the base chain
        assert!(pool.is_instance_of(apple, ord));
        assert!(!pool.is_instance_of(fruit, apple));
    }

    #[test]
    fn test_common_ancestor() {
        let (mut pool, any) = pool_with_any();
        let fruit = class(&mut pool, "Fruit", any);
        let apple = class(&mut pool, "Apple", fruit);
        let pear = class(&mut pool, "Pear", fruit);
        let tool = class(&mut pool, "Tool", any);

        assert_eq!(pool.common_ancestor(apple, pear), Some(fruit));
        assert_eq!(pool.common_ancestor(apple, fruit), Some(fruit));
        assert_eq!(pool.common_ancestor(apple, tool), Some(any));
    }

    #[test]
    fn test_common_ancestor_with_bottom() {
        let (mut pool, any) = pool_with_any();
        let fruit = class(&mut pool, "Fruit", any);
        let nothing = pool.define("Nothing", TypeKind::Class);
        pool.data_mut(nothing).is_bottom = true;
        assert_eq!(pool.common_ancestor(fruit, nothing), Some(fruit));
        assert_eq!(pool.common_ancestor(nothing, fruit), Some(fruit));
    }

    #[test]
    fn test_inflated_members_are_substituted() {
        let (mut pool, any) = pool_with_any();
        let int = class(&mut pool, "Int", any);
        let unit = class(&mut pool, "Unit", any);
        let cell = pool.define("Cell", TypeKind::Class);
        let params = pool
            .define_generic_params(cell, &[GenericParamDecl::invariant("T")])
            .unwrap();
        let t = params[0].ty;
        pool.data_mut(cell).fields.push(Field {
            name: "value".to_string(),
            owner: cell,
            flags: FieldFlags::default(),
            ty: t,
        });
        pool.data_mut(cell).methods.push(Method {
            name: "set".to_string(),
            owner: cell,
            flags: MethodFlags::default(),
            type_params: Vec::new(),
            params: vec![Param {
                name: "v".to_string(),
                ty: t,
                variadic: false,
            }],
            ret: unit,
        });

        let cell_int = pool.make_generic(cell, &[int]).unwrap();
        let fields = pool.fields_of(cell_int).unwrap();
        assert_eq!(fields[0].ty, int);
        assert_eq!(fields[0].owner, cell_int);
        let methods = pool.methods_of(cell_int).unwrap();
        assert_eq!(methods[0].params[0].ty, int);
        assert_eq!(methods[0].ret, unit);
    }

    #[test]
    fn test_methods_named_walks_base_chain() {
        let (mut pool, any) = pool_with_any();
        let unit = class(&mut pool, "Unit", any);
        let base = class(&mut pool, "Base", any);
        let derived = class(&mut pool, "Derived", base);
        pool.data_mut(base).methods.push(Method {
            name: "touch".to_string(),
            owner: base,
            flags: MethodFlags::default(),
            type_params: Vec::new(),
            params: Vec::new(),
            ret: unit,
        });
        let found = pool.methods_named(derived, "touch").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].owner, base);
    }

    #[test]
    fn test_format_type() {
        let (mut pool, any) = pool_with_any();
        let int = class(&mut pool, "Int", any);
        let list = list_with_variance(&mut pool, any, Variance::Covariant);
        let list_int = pool.make_generic(list, &[int]).unwrap();
        assert_eq!(pool.format_type(int), "Int");
        assert_eq!(pool.format_type(list_int), "List[Int]");
    }

    #[test]
    fn test_accessor_names() {
        let (getter, setter) = Field::accessor_names("count");
        assert_eq!(getter, "get_count");
        assert_eq!(setter, "set_count");
    }
}
