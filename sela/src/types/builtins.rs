//! The builtin type environment
//!
//! Every compilation run constructs its own `Builtins` into a fresh pool
//! and threads it through the passes; there is no process-wide type state.

use super::{
    Field, FieldFlags, GenericParamDecl, Method, MethodFlags, Param, TypeId, TypeKind, TypePool,
    Variance,
};

/// Highest closure arity with a `FunctionN`/`ActionN` base type
pub const MAX_CLOSURE_ARITY: usize = 4;

/// Highest tuple arity used by extractor results
pub const MAX_TUPLE_ARITY: usize = 4;

/// Handles to the builtin types
#[derive(Debug, Clone)]
pub struct Builtins {
    pub any: TypeId,
    pub any_val: TypeId,
    pub any_ref: TypeId,
    pub nothing: TypeId,
    pub unit: TypeId,
    pub boolean: TypeId,
    pub int: TypeId,
    pub long: TypeId,
    pub double: TypeId,
    pub string: TypeId,
    /// `Option[+T]` with `isDefined`/`get`
    pub option: TypeId,
    /// `Ref[T]` mutable cell used for boxed closure captures
    pub ref_cell: TypeId,
    /// `Tuple2`..`Tuple{MAX_TUPLE_ARITY}`
    pub tuples: Vec<TypeId>,
    /// `Function0`..`Function{MAX_CLOSURE_ARITY}`
    pub functions: Vec<TypeId>,
    /// `Action0`..`Action{MAX_CLOSURE_ARITY}`
    pub actions: Vec<TypeId>,
    /// Owner of the predefined global functions (`println`, `some`, ...)
    pub predef: TypeId,
    /// Sentinel for not-yet-known types during inference
    pub undefined: TypeId,
}

impl Builtins {
    /// Populate a fresh pool with the builtin environment.
    ///
    /// Infallible by construction: every inflation below instantiates a
    /// definition created a few lines earlier with the right arity.
    pub fn install(pool: &mut TypePool) -> Builtins {
        let any = pool.define("Any", TypeKind::Class);
        pool.data_mut(any).is_top = true;

        let any_val = pool.define("AnyVal", TypeKind::Class);
        pool.data_mut(any_val).base = Some(any);
        pool.data_mut(any_val).is_abstract = true;

        let any_ref = pool.define("AnyRef", TypeKind::Class);
        pool.data_mut(any_ref).base = Some(any);

        let nothing = pool.define("Nothing", TypeKind::Class);
        pool.data_mut(nothing).base = Some(any);
        pool.data_mut(nothing).is_bottom = true;

        let value = |pool: &mut TypePool, name: &str| {
            let id = pool.define(name, TypeKind::Class);
            pool.data_mut(id).base = Some(any_val);
            id
        };
        let unit = value(pool, "Unit");
        let boolean = value(pool, "Boolean");
        let int = value(pool, "Int");
        let long = value(pool, "Long");
        let double = value(pool, "Double");

        let string = pool.define("String", TypeKind::Class);
        pool.data_mut(string).base = Some(any_ref);
        pool.data_mut(string).methods.push(Method {
            name: "length".to_string(),
            owner: string,
            flags: MethodFlags::default(),
            type_params: Vec::new(),
            params: Vec::new(),
            ret: int,
        });

        // Option[+T] { def isDefined(): Boolean; def get(): T }
        let option = pool.define("Option", TypeKind::Class);
        pool.data_mut(option).base = Some(any_ref);
        let opt_params = pool
            .define_generic_params(
                option,
                &[GenericParamDecl::with_variance("T", Variance::Covariant)],
            )
            .expect("fresh type");
        let opt_t = opt_params[0].ty;
        pool.data_mut(option).methods.push(Method {
            name: "isDefined".to_string(),
            owner: option,
            flags: MethodFlags::default(),
            type_params: Vec::new(),
            params: Vec::new(),
            ret: boolean,
        });
        pool.data_mut(option).methods.push(Method {
            name: "get".to_string(),
            owner: option,
            flags: MethodFlags::default(),
            type_params: Vec::new(),
            params: Vec::new(),
            ret: opt_t,
        });

        // Ref[T] mutable cell: boxed storage for captured primitives
        let ref_cell = pool.define("Ref", TypeKind::Class);
        pool.data_mut(ref_cell).base = Some(any_ref);
        let ref_params = pool
            .define_generic_params(ref_cell, &[GenericParamDecl::invariant("T")])
            .expect("fresh type");
        let ref_t = ref_params[0].ty;
        pool.data_mut(ref_cell).fields.push(Field {
            name: "value".to_string(),
            owner: ref_cell,
            flags: FieldFlags::default(),
            ty: ref_t,
        });
        pool.data_mut(ref_cell).ctors.push(Method {
            name: "<init>".to_string(),
            owner: ref_cell,
            flags: MethodFlags::default(),
            type_params: Vec::new(),
            params: vec![Param {
                name: "value".to_string(),
                ty: ref_t,
                variadic: false,
            }],
            ret: unit,
        });

        // Tuple2..TupleN with readonly fields _1.._n
        let mut tuples = Vec::new();
        for arity in 2..=MAX_TUPLE_ARITY {
            let tuple = pool.define(format!("Tuple{arity}"), TypeKind::Class);
            pool.data_mut(tuple).base = Some(any_ref);
            let decls: Vec<GenericParamDecl> = (1..=arity)
                .map(|i| GenericParamDecl::with_variance(format!("T{i}"), Variance::Covariant))
                .collect();
            let params = pool.define_generic_params(tuple, &decls).expect("fresh type");
            let mut ctor_params = Vec::new();
            for (i, p) in params.iter().enumerate() {
                pool.data_mut(tuple).fields.push(Field {
                    name: format!("_{}", i + 1),
                    owner: tuple,
                    flags: FieldFlags {
                        readonly: true,
                        ..FieldFlags::default()
                    },
                    ty: p.ty,
                });
                ctor_params.push(Param {
                    name: format!("_{}", i + 1),
                    ty: p.ty,
                    variadic: false,
                });
            }
            pool.data_mut(tuple).ctors.push(Method {
                name: "<init>".to_string(),
                owner: tuple,
                flags: MethodFlags::default(),
                type_params: Vec::new(),
                params: ctor_params,
                ret: unit,
            });
            tuples.push(tuple);
        }

        // FunctionN[-P1..-Pn, +R] { def apply(p1..pn): R }
        // ActionN[-P1..-Pn]       { def apply(p1..pn): Unit }
        let mut functions = Vec::new();
        let mut actions = Vec::new();
        for arity in 0..=MAX_CLOSURE_ARITY {
            functions.push(Self::function_type(pool, any_ref, unit, arity, false));
            actions.push(Self::function_type(pool, any_ref, unit, arity, true));
        }

        let predef = pool.define("Predef", TypeKind::Object);
        pool.data_mut(predef).base = Some(any_ref);

        let undefined = pool.define("<undefined>", TypeKind::Class);

        let builtins = Builtins {
            any,
            any_val,
            any_ref,
            nothing,
            unit,
            boolean,
            int,
            long,
            double,
            string,
            option,
            ref_cell,
            tuples,
            functions,
            actions,
            predef,
            undefined,
        };
        builtins.install_predef(pool);
        builtins
    }

    fn function_type(
        pool: &mut TypePool,
        any_ref: TypeId,
        unit: TypeId,
        arity: usize,
        is_action: bool,
    ) -> TypeId {
        let prefix = if is_action { "Action" } else { "Function" };
        let id = pool.define(format!("{prefix}{arity}"), TypeKind::Trait);
        pool.data_mut(id).base = Some(any_ref);
        pool.data_mut(id).is_abstract = true;

        let mut decls: Vec<GenericParamDecl> = (1..=arity)
            .map(|i| GenericParamDecl::with_variance(format!("P{i}"), Variance::Contravariant))
            .collect();
        if !is_action {
            decls.push(GenericParamDecl::with_variance("R", Variance::Covariant));
        }
        // Function0 is generic only in its result; Action0 takes no
        // parameters at all and stays non-generic.
        let params = if decls.is_empty() {
            Vec::new()
        } else {
            pool.define_generic_params(id, &decls).expect("fresh type")
        };

        let apply_params: Vec<Param> = params
            .iter()
            .take(arity)
            .map(|p| Param {
                name: p.name.to_lowercase(),
                ty: p.ty,
                variadic: false,
            })
            .collect();
        let ret = if is_action {
            unit
        } else {
            params.last().map(|p| p.ty).unwrap_or(unit)
        };
        pool.data_mut(id).methods.push(Method {
            name: "apply".to_string(),
            owner: id,
            flags: MethodFlags {
                abstract_: true,
                ..MethodFlags::default()
            },
            type_params: Vec::new(),
            params: apply_params,
            ret,
        });
        id
    }

    /// Global functions owned by `Predef`: `println`, `printf`, `some`,
    /// `none`, `ref`.
    fn install_predef(&self, pool: &mut TypePool) {
        let predef = self.predef;

        let method = |name: &str, params: Vec<Param>, ret: TypeId| Method {
            name: name.to_string(),
            owner: predef,
            flags: MethodFlags {
                static_: true,
                ..MethodFlags::default()
            },
            type_params: Vec::new(),
            params,
            ret,
        };

        let println = method(
            "println",
            vec![Param {
                name: "line".to_string(),
                ty: self.string,
                variadic: false,
            }],
            self.unit,
        );
        pool.data_mut(predef).methods.push(println);

        let printf = method(
            "printf",
            vec![
                Param {
                    name: "format".to_string(),
                    ty: self.string,
                    variadic: false,
                },
                Param {
                    name: "args".to_string(),
                    ty: self.any,
                    variadic: true,
                },
            ],
            self.unit,
        );
        pool.data_mut(predef).methods.push(printf);

        // def some[S](value: S): Option[S]
        let mut some = method("some", Vec::new(), self.unit);
        pool.define_method_generic_params(&mut some, &[GenericParamDecl::invariant("S")])
            .expect("fresh method");
        let s = some.type_params[0].ty;
        some.params.push(Param {
            name: "value".to_string(),
            ty: s,
            variadic: false,
        });
        some.ret = pool.make_generic(self.option, &[s]).expect("option arity");
        pool.data_mut(predef).methods.push(some);

        // def none[S](): Option[S] -- S is never inferable from arguments
        let mut none = method("none", Vec::new(), self.unit);
        pool.define_method_generic_params(&mut none, &[GenericParamDecl::invariant("S")])
            .expect("fresh method");
        let s = none.type_params[0].ty;
        none.ret = pool.make_generic(self.option, &[s]).expect("option arity");
        pool.data_mut(predef).methods.push(none);

        // def ref[S](value: S): Ref[S]
        let mut mkref = method("ref", Vec::new(), self.unit);
        pool.define_method_generic_params(&mut mkref, &[GenericParamDecl::invariant("S")])
            .expect("fresh method");
        let s = mkref.type_params[0].ty;
        mkref.params.push(Param {
            name: "value".to_string(),
            ty: s,
            variadic: false,
        });
        mkref.ret = pool.make_generic(self.ref_cell, &[s]).expect("ref arity");
        pool.data_mut(predef).methods.push(mkref);
    }

    /// Types bound by name in the global scope
    pub fn named_types(&self) -> Vec<TypeId> {
        let mut out = vec![
            self.any,
            self.any_val,
            self.any_ref,
            self.nothing,
            self.unit,
            self.boolean,
            self.int,
            self.long,
            self.double,
            self.string,
            self.option,
            self.ref_cell,
        ];
        out.extend(&self.tuples);
        out.extend(&self.functions);
        out.extend(&self.actions);
        out
    }

    pub fn is_primitive(&self, ty: TypeId) -> bool {
        ty == self.int || ty == self.long || ty == self.double || ty == self.boolean
    }

    pub fn is_numeric(&self, ty: TypeId) -> bool {
        ty == self.int || ty == self.long || ty == self.double
    }

    /// Implicit numeric widening: `Int -> Long -> Double`
    pub fn widens_to(&self, from: TypeId, to: TypeId) -> bool {
        (from == self.int && (to == self.long || to == self.double))
            || (from == self.long && to == self.double)
    }

    /// The wider of two numeric types
    pub fn wider(&self, a: TypeId, b: TypeId) -> TypeId {
        if a == self.double || b == self.double {
            self.double
        } else if a == self.long || b == self.long {
            self.long
        } else {
            self.int
        }
    }

    /// Base type for a closure of the given binding arity
    pub fn function_base(&self, arity: usize, returns_unit: bool) -> Option<TypeId> {
        let table = if returns_unit { &self.actions } else { &self.functions };
        table.get(arity).copied()
    }

    /// Tuple definition for an extractor component count
    pub fn tuple(&self, arity: usize) -> Option<TypeId> {
        if arity < 2 {
            return None;
        }
        self.tuples.get(arity - 2).copied()
    }
}
