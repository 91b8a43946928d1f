//! Option and result constructors and accessors.

use std::sync::Arc;

use crate::eval::Vm;
use crate::gc::{Obj, ObjId, Roots};
use crate::types::Type;
use crate::value::Value;

pub fn builtin_some(vm: &Arc<Vm>, roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [v] => Value::Opt(vm.alloc(roots, Obj::Opt(Some(*v)))),
        _ => Value::Unit,
    }
}

pub fn builtin_none(vm: &Arc<Vm>, roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [] => Value::Opt(vm.alloc(roots, Obj::Opt(None))),
        _ => Value::Unit,
    }
}

pub fn builtin_is_some(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Opt(id)] => vm.with_heap(|h| match h.get(*id) {
            Some(Obj::Opt(inner)) => Value::Bool(inner.is_some()),
            _ => Value::Bool(false),
        }),
        _ => Value::Bool(false),
    }
}

pub fn builtin_is_none(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Opt(id)] => vm.with_heap(|h| match h.get(*id) {
            Some(Obj::Opt(inner)) => Value::Bool(inner.is_none()),
            _ => Value::Bool(false),
        }),
        _ => Value::Bool(false),
    }
}

/// Works on both options and results: `Some`/`Ok` payloads come out,
/// everything else is `Unit`.
pub fn builtin_unwrap(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Opt(id)] => vm.with_heap(|h| match h.get(*id) {
            Some(Obj::Opt(Some(v))) => *v,
            _ => Value::Unit,
        }),
        [Value::Res(id)] => vm.with_heap(|h| match h.get(*id) {
            Some(Obj::Res { ok: true, value }) => *value,
            _ => Value::Unit,
        }),
        _ => Value::Unit,
    }
}

pub fn builtin_unwrap_or(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    let fallback = match args {
        [_, d] => *d,
        _ => return Value::Unit,
    };
    match args[0] {
        Value::Opt(id) => vm.with_heap(|h| match h.get(id) {
            Some(Obj::Opt(Some(v))) => *v,
            _ => fallback,
        }),
        Value::Res(id) => vm.with_heap(|h| match h.get(id) {
            Some(Obj::Res { ok: true, value }) => *value,
            _ => fallback,
        }),
        _ => Value::Unit,
    }
}

pub fn builtin_ok(vm: &Arc<Vm>, roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [v] => Value::Res(vm.alloc(roots, Obj::Res { ok: true, value: *v })),
        _ => Value::Unit,
    }
}

pub fn builtin_err(vm: &Arc<Vm>, roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [v] => Value::Res(vm.alloc(roots, Obj::Res { ok: false, value: *v })),
        _ => Value::Unit,
    }
}

pub fn builtin_is_ok(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Res(id)] => vm.with_heap(|h| match h.get(*id) {
            Some(Obj::Res { ok, .. }) => Value::Bool(*ok),
            _ => Value::Bool(false),
        }),
        _ => Value::Bool(false),
    }
}

pub fn builtin_is_err(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Res(id)] => vm.with_heap(|h| match h.get(*id) {
            Some(Obj::Res { ok, .. }) => Value::Bool(!*ok),
            _ => Value::Bool(false),
        }),
        _ => Value::Bool(false),
    }
}

pub fn builtin_unwrap_err(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Res(id)] => vm.with_heap(|h| match h.get(*id) {
            Some(Obj::Res { ok: false, value }) => *value,
            _ => Value::Unit,
        }),
        _ => Value::Unit,
    }
}

pub fn register(vm: &Arc<Vm>) {
    let opt_any = || Type::option(Type::Any);
    let res_any = || Type::result_of(Type::Any, Type::Any);
    vm.define_native("some", builtin_some, Type::func(vec![Type::Any], opt_any()));
    vm.define_native("none", builtin_none, Type::func(vec![], opt_any()));
    vm.define_native("some?", builtin_is_some, Type::func(vec![opt_any()], Type::Bool));
    vm.define_native("none?", builtin_is_none, Type::func(vec![opt_any()], Type::Bool));
    vm.define_native("unwrap", builtin_unwrap, Type::func(vec![Type::Any], Type::Any));
    vm.define_native(
        "unwrap-or",
        builtin_unwrap_or,
        Type::func(vec![Type::Any, Type::Any], Type::Any),
    );
    vm.define_native("ok", builtin_ok, Type::func(vec![Type::Any], res_any()));
    vm.define_native("err", builtin_err, Type::func(vec![Type::Any], res_any()));
    vm.define_native("ok?", builtin_is_ok, Type::func(vec![res_any()], Type::Bool));
    vm.define_native("err?", builtin_is_err, Type::func(vec![res_any()], Type::Bool));
    vm.define_native("unwrap-err", builtin_unwrap_err, Type::func(vec![res_any()], Type::Any));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_round_trip() {
        let vm = Vm::new();
        let mut roots = Roots::new();
        let globals = vm.globals;
        let some = builtin_some(&vm, &mut roots, globals, &[Value::Int(5)]);
        let none = builtin_none(&vm, &mut roots, globals, &[]);
        assert_eq!(builtin_is_some(&vm, &mut roots, globals, &[some]), Value::Bool(true));
        assert_eq!(builtin_is_none(&vm, &mut roots, globals, &[none]), Value::Bool(true));
        assert_eq!(builtin_unwrap(&vm, &mut roots, globals, &[some]), Value::Int(5));
        assert_eq!(builtin_unwrap(&vm, &mut roots, globals, &[none]), Value::Unit);
        assert_eq!(
            builtin_unwrap_or(&vm, &mut roots, globals, &[none, Value::Int(9)]),
            Value::Int(9)
        );
    }

    #[test]
    fn test_result_round_trip() {
        let vm = Vm::new();
        let mut roots = Roots::new();
        let globals = vm.globals;
        let ok = builtin_ok(&vm, &mut roots, globals, &[Value::Int(1)]);
        let err = builtin_err(&vm, &mut roots, globals, &[Value::Int(2)]);
        assert_eq!(builtin_is_ok(&vm, &mut roots, globals, &[ok]), Value::Bool(true));
        assert_eq!(builtin_is_err(&vm, &mut roots, globals, &[err]), Value::Bool(true));
        assert_eq!(builtin_unwrap(&vm, &mut roots, globals, &[ok]), Value::Int(1));
        assert_eq!(builtin_unwrap_err(&vm, &mut roots, globals, &[err]), Value::Int(2));
        assert_eq!(builtin_unwrap_err(&vm, &mut roots, globals, &[ok]), Value::Unit);
    }
}
