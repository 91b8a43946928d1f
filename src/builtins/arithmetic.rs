//! Arithmetic and bitwise operations.
//!
//! Arithmetic is homogeneous: both operands `Int` or both `Float`. Mixed
//! kinds yield `Unit`. Integer division truncates toward zero; division or
//! modulo by zero warns on stderr and yields `Unit`.

use std::sync::Arc;

use crate::eval::Vm;
use crate::gc::{ObjId, Roots};
use crate::types::Type;
use crate::value::Value;

pub fn builtin_add(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Int(a), Value::Int(b)] => Value::Int(a.wrapping_add(*b)),
        [Value::Float(a), Value::Float(b)] => Value::Float(a + b),
        _ => Value::Unit,
    }
}

pub fn builtin_sub(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Int(a), Value::Int(b)] => Value::Int(a.wrapping_sub(*b)),
        [Value::Float(a), Value::Float(b)] => Value::Float(a - b),
        _ => Value::Unit,
    }
}

pub fn builtin_mul(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Int(a), Value::Int(b)] => Value::Int(a.wrapping_mul(*b)),
        [Value::Float(a), Value::Float(b)] => Value::Float(a * b),
        _ => Value::Unit,
    }
}

pub fn builtin_div(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Int(_), Value::Int(0)] => {
            eprintln!("/: division by zero");
            Value::Unit
        }
        [Value::Int(a), Value::Int(b)] => Value::Int(a.wrapping_div(*b)),
        [Value::Float(a), Value::Float(b)] => Value::Float(a / b),
        _ => Value::Unit,
    }
}

pub fn builtin_mod(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Int(_), Value::Int(0)] => {
            eprintln!("mod: division by zero");
            Value::Unit
        }
        [Value::Int(a), Value::Int(b)] => Value::Int(a.wrapping_rem(*b)),
        _ => Value::Unit,
    }
}

pub fn builtin_neg(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Int(a)] => Value::Int(a.wrapping_neg()),
        [Value::Float(a)] => Value::Float(-a),
        _ => Value::Unit,
    }
}

pub fn builtin_bit_and(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Int(a), Value::Int(b)] => Value::Int(a & b),
        _ => Value::Unit,
    }
}

pub fn builtin_bit_or(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Int(a), Value::Int(b)] => Value::Int(a | b),
        _ => Value::Unit,
    }
}

pub fn builtin_bit_xor(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Int(a), Value::Int(b)] => Value::Int(a ^ b),
        _ => Value::Unit,
    }
}

pub fn builtin_bit_not(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Int(a)] => Value::Int(!a),
        _ => Value::Unit,
    }
}

pub fn builtin_shl(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Int(a), Value::Int(b)] => Value::Int(a.wrapping_shl(*b as u32)),
        _ => Value::Unit,
    }
}

pub fn builtin_shr(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Int(a), Value::Int(b)] => Value::Int(a.wrapping_shr(*b as u32)),
        _ => Value::Unit,
    }
}

pub fn register(vm: &Arc<Vm>) {
    let int2 = || Type::func(vec![Type::Int, Type::Int], Type::Int);
    vm.define_native("+", builtin_add, int2());
    vm.define_native("-", builtin_sub, int2());
    vm.define_native("*", builtin_mul, int2());
    vm.define_native("/", builtin_div, int2());
    vm.define_native("mod", builtin_mod, int2());
    vm.define_native("%", builtin_mod, int2());
    vm.define_native("neg", builtin_neg, Type::func(vec![Type::Int], Type::Int));
    vm.define_native("bit-and", builtin_bit_and, int2());
    vm.define_native("bit-or", builtin_bit_or, int2());
    vm.define_native("bit-xor", builtin_bit_xor, int2());
    vm.define_native("bit-not", builtin_bit_not, Type::func(vec![Type::Int], Type::Int));
    vm.define_native("shl", builtin_shl, int2());
    vm.define_native("shr", builtin_shr, int2());
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
    fn test_homogeneous_int_and_float() {
        assert_eq!(call(builtin_add, &[Value::Int(40), Value::Int(2)]), Value::Int(42));
        assert_eq!(
            call(builtin_mul, &[Value::Float(1.5), Value::Float(2.0)]),
            Value::Float(3.0)
        );
    }

    #[test]
    fn test_mixed_kinds_yield_unit() {
        assert_eq!(call(builtin_add, &[Value::Int(1), Value::Float(2.0)]), Value::Unit);
        assert_eq!(call(builtin_sub, &[Value::Bool(true), Value::Int(1)]), Value::Unit);
    }

    #[test]
    fn test_integer_division_truncates() {
        assert_eq!(call(builtin_div, &[Value::Int(7), Value::Int(2)]), Value::Int(3));
        assert_eq!(call(builtin_div, &[Value::Int(-7), Value::Int(2)]), Value::Int(-3));
    }

    #[test]
    fn test_division_by_zero_yields_unit() {
        assert_eq!(call(builtin_div, &[Value::Int(1), Value::Int(0)]), Value::Unit);
        assert_eq!(call(builtin_mod, &[Value::Int(1), Value::Int(0)]), Value::Unit);
    }

    #[test]
    fn test_shifts_mask_the_count() {
        assert_eq!(call(builtin_shl, &[Value::Int(1), Value::Int(3)]), Value::Int(8));
        assert_eq!(call(builtin_shr, &[Value::Int(8), Value::Int(2)]), Value::Int(2));
    }
}
