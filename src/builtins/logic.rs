//! Boolean operations: `not`, `and`, `or`. Non-boolean operands answer
//! `false`.

use std::sync::Arc;

use crate::eval::Vm;
use crate::gc::{ObjId, Roots};
use crate::types::Type;
use crate::value::Value;

pub fn builtin_not(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Bool(b)] => Value::Bool(!b),
        _ => Value::Bool(false),
    }
}

pub fn builtin_and(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Bool(a), Value::Bool(b)] => Value::Bool(*a && *b),
        _ => Value::Bool(false),
    }
}

pub fn builtin_or(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Bool(a), Value::Bool(b)] => Value::Bool(*a || *b),
        _ => Value::Bool(false),
    }
}

pub fn register(vm: &Arc<Vm>) {
    vm.define_native("not", builtin_not, Type::func(vec![Type::Bool], Type::Bool));
    let bool2 = || Type::func(vec![Type::Bool, Type::Bool], Type::Bool);
    vm.define_native("and", builtin_and, bool2());
    vm.define_native("or", builtin_or, bool2());
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
    fn test_truth_tables() {
        assert_eq!(call(builtin_not, &[Value::Bool(true)]), Value::Bool(false));
        assert_eq!(call(builtin_and, &[Value::Bool(true), Value::Bool(false)]), Value::Bool(false));
        assert_eq!(call(builtin_or, &[Value::Bool(true), Value::Bool(false)]), Value::Bool(true));
    }

    #[test]
    fn test_non_bool_operands_answer_false() {
        assert_eq!(call(builtin_not, &[Value::Int(0)]), Value::Bool(false));
        assert_eq!(call(builtin_and, &[Value::Bool(true)]), Value::Bool(false));
    }
}
