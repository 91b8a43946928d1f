//! Struct instances: `struct-new` is variadic with the type name string
//! first; fields are addressed by declaration index.

use std::sync::Arc;

use crate::eval::Vm;
use crate::gc::{Obj, ObjId, Roots};
use crate::types::Type;
use crate::value::Value;

pub fn builtin_struct_new(vm: &Arc<Vm>, roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    let name = match args.first() {
        Some(Value::Str(id)) => vm.with_heap(|h| match h.get(*id) {
            Some(Obj::Str(s)) => Some(s.clone()),
            _ => None,
        }),
        _ => None,
    };
    match name {
        Some(name) => {
            let fields = args[1..].to_vec();
            Value::StructV(vm.alloc(roots, Obj::StructV { name, fields }))
        }
        None => Value::Unit,
    }
}

pub fn builtin_struct_get(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::StructV(id), Value::Int(i)] => vm.with_heap(|h| match h.get(*id) {
            Some(Obj::StructV { fields, .. }) => usize::try_from(*i)
                .ok()
                .and_then(|i| fields.get(i))
                .copied()
                .unwrap_or(Value::Unit),
            _ => Value::Unit,
        }),
        _ => Value::Unit,
    }
}

pub fn builtin_struct_set(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::StructV(id), Value::Int(i), v] => {
            vm.with_heap_mut(|h| {
                if let Some(Obj::StructV { fields, .. }) = h.get_mut(*id) {
                    if let Ok(i) = usize::try_from(*i) {
                        if let Some(slot) = fields.get_mut(i) {
                            *slot = *v;
                        }
                    }
                }
            });
            Value::Unit
        }
        _ => Value::Unit,
    }
}

pub fn register(vm: &Arc<Vm>) {
    vm.define_native("struct-new", builtin_struct_new, Type::func(vec![Type::Any], Type::Any));
    vm.define_native(
        "struct-get",
        builtin_struct_get,
        Type::func(vec![Type::Any, Type::Int], Type::Any),
    );
    vm.define_native(
        "struct-set",
        builtin_struct_set,
        Type::func(vec![Type::Any, Type::Int, Type::Any], Type::Unit),
    );
}
