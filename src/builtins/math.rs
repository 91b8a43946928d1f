//! Numeric library wrappers: integer `abs`/`min`/`max` and floating-point
//! `pow`/`sqrt`/`floor`/`ceil`/`round`.

use std::sync::Arc;

use crate::eval::Vm;
use crate::gc::{ObjId, Roots};
use crate::types::Type;
use crate::value::Value;

pub fn builtin_abs(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Int(a)] => Value::Int(a.wrapping_abs()),
        _ => Value::Unit,
    }
}

pub fn builtin_min(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Int(a), Value::Int(b)] => Value::Int(*a.min(b)),
        _ => Value::Unit,
    }
}

pub fn builtin_max(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Int(a), Value::Int(b)] => Value::Int(*a.max(b)),
        _ => Value::Unit,
    }
}

pub fn builtin_pow(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Float(a), Value::Float(b)] => Value::Float(a.powf(*b)),
        _ => Value::Unit,
    }
}

pub fn builtin_sqrt(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Float(a)] => Value::Float(a.sqrt()),
        _ => Value::Unit,
    }
}

pub fn builtin_floor(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Float(a)] => Value::Float(a.floor()),
        _ => Value::Unit,
    }
}

pub fn builtin_ceil(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Float(a)] => Value::Float(a.ceil()),
        _ => Value::Unit,
    }
}

pub fn builtin_round(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Float(a)] => Value::Float(a.round()),
        _ => Value::Unit,
    }
}

pub fn register(vm: &Arc<Vm>) {
    vm.define_native("abs", builtin_abs, Type::func(vec![Type::Int], Type::Int));
    let int2 = || Type::func(vec![Type::Int, Type::Int], Type::Int);
    vm.define_native("min", builtin_min, int2());
    vm.define_native("max", builtin_max, int2());
    vm.define_native("pow", builtin_pow, Type::func(vec![Type::Float, Type::Float], Type::Float));
    let float1 = || Type::func(vec![Type::Float], Type::Float);
    vm.define_native("sqrt", builtin_sqrt, float1());
    vm.define_native("floor", builtin_floor, float1());
    vm.define_native("ceil", builtin_ceil, float1());
    vm.define_native("round", builtin_round, float1());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(
        f: fn(&Arc<Vm>, &mut Roots, ObjId, &[Value]) -> Value,
        args: &[Value],
    ) -> Value {
        let vm = Vm::new();
        let mut roots = Roots::new();
        let globals = vm.globals;
        f(&vm, &mut roots, globals, args)
    }

    #[test]
    fn test_int_helpers() {
        assert_eq!(call(builtin_abs, &[Value::Int(-4)]), Value::Int(4));
        assert_eq!(call(builtin_min, &[Value::Int(2), Value::Int(5)]), Value::Int(2));
        assert_eq!(call(builtin_max, &[Value::Int(2), Value::Int(5)]), Value::Int(5));
    }

    #[test]
    fn test_float_helpers() {
        assert_eq!(call(builtin_sqrt, &[Value::Float(9.0)]), Value::Float(3.0));
        assert_eq!(call(builtin_pow, &[Value::Float(2.0), Value::Float(10.0)]), Value::Float(1024.0));
        assert_eq!(call(builtin_floor, &[Value::Float(1.9)]), Value::Float(1.0));
        assert_eq!(call(builtin_ceil, &[Value::Float(1.1)]), Value::Float(2.0));
        assert_eq!(call(builtin_round, &[Value::Float(1.5)]), Value::Float(2.0));
    }

    #[test]
    fn test_kind_mismatch_yields_unit() {
        assert_eq!(call(builtin_sqrt, &[Value::Int(9)]), Value::Unit);
        assert_eq!(call(builtin_min, &[Value::Float(1.0), Value::Float(2.0)]), Value::Unit);
    }
}
