//! Comparisons. `=`/`!=` accept any two values (string equality is
//! byte-for-byte, `Unit` equals `Unit`); the orderings require two `Int`s
//! or two `Float`s. Misuse answers `false`.

use std::sync::Arc;

use crate::eval::Vm;
use crate::gc::{Obj, ObjId, Roots};
use crate::types::Type;
use crate::value::Value;

fn values_equal(vm: &Arc<Vm>, a: Value, b: Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Unit, Value::Unit) => true,
        (Value::Sym(x), Value::Sym(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => vm.with_heap(|h| {
            match (h.get(x), h.get(y)) {
                (Some(Obj::Str(sx)), Some(Obj::Str(sy))) => sx == sy,
                _ => false,
            }
        }),
        _ => false,
    }
}

pub fn builtin_eq(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [a, b] => Value::Bool(values_equal(vm, *a, *b)),
        _ => Value::Bool(false),
    }
}

pub fn builtin_ne(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [a, b] => Value::Bool(!values_equal(vm, *a, *b)),
        _ => Value::Bool(false),
    }
}

macro_rules! ordering {
    ($name:ident, $op:tt) => {
        pub fn $name(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
            match args {
                [Value::Int(a), Value::Int(b)] => Value::Bool(a $op b),
                [Value::Float(a), Value::Float(b)] => Value::Bool(a $op b),
                _ => Value::Bool(false),
            }
        }
    };
}

ordering!(builtin_lt, <);
ordering!(builtin_gt, >);
ordering!(builtin_le, <=);
ordering!(builtin_ge, >=);

pub fn register(vm: &Arc<Vm>) {
    let any_pred = || Type::func(vec![Type::Any, Type::Any], Type::Bool);
    let int_pred = || Type::func(vec![Type::Int, Type::Int], Type::Bool);
    vm.define_native("=", builtin_eq, any_pred());
    vm.define_native("!=", builtin_ne, any_pred());
    vm.define_native("<", builtin_lt, int_pred());
    vm.define_native(">", builtin_gt, int_pred());
    vm.define_native("<=", builtin_le, int_pred());
    vm.define_native(">=", builtin_ge, int_pred());
}
