//! Vectors and maps. Vectors hold `Any` elements; maps are keyed by
//! strings (insertion-ordered, last write wins).

use std::sync::Arc;

use crate::eval::Vm;
use crate::gc::{Heap, Obj, ObjId, Roots};
use crate::types::Type;
use crate::value::Value;

pub fn builtin_vec_new(vm: &Arc<Vm>, roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    Value::Vector(vm.alloc(roots, Obj::Vector(args.to_vec())))
}

pub fn builtin_vec_push(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Vector(id), v] => {
            vm.with_heap_mut(|h| {
                if let Some(Obj::Vector(items)) = h.get_mut(*id) {
                    items.push(*v);
                }
            });
            Value::Unit
        }
        _ => Value::Unit,
    }
}

pub fn builtin_vec_get(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Vector(id), Value::Int(i)] => vm.with_heap(|h| match h.get(*id) {
            Some(Obj::Vector(items)) => {
                usize::try_from(*i).ok().and_then(|i| items.get(i)).copied().unwrap_or(Value::Unit)
            }
            _ => Value::Unit,
        }),
        _ => Value::Unit,
    }
}

pub fn builtin_vec_len(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Vector(id)] => vm.with_heap(|h| match h.get(*id) {
            Some(Obj::Vector(items)) => Value::Int(items.len() as i64),
            _ => Value::Unit,
        }),
        _ => Value::Unit,
    }
}

fn key_string(h: &Heap, v: Value) -> Option<String> {
    match v {
        Value::Str(id) => match h.get(id) {
            Some(Obj::Str(s)) => Some(s.clone()),
            _ => None,
        },
        _ => None,
    }
}

pub fn builtin_map_new(vm: &Arc<Vm>, roots: &mut Roots, _env: ObjId, _args: &[Value]) -> Value {
    Value::Map(vm.alloc(roots, Obj::Map(Vec::new())))
}

pub fn builtin_map_set(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    let (id, k, v) = match args {
        [Value::Map(id), k, v] => (*id, *k, *v),
        _ => return Value::Unit,
    };
    vm.with_heap_mut(|h| {
        let key = match key_string(h, k) {
            Some(key) => key,
            None => return,
        };
        let existing = match h.get(id) {
            Some(Obj::Map(pairs)) => pairs
                .iter()
                .position(|(pk, _)| key_string(h, *pk).as_deref() == Some(key.as_str())),
            _ => return,
        };
        if let Some(Obj::Map(pairs)) = h.get_mut(id) {
            match existing {
                Some(i) => pairs[i].1 = v,
                None => pairs.push((k, v)),
            }
        }
    });
    Value::Unit
}

pub fn builtin_map_get(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    let (id, k) = match args {
        [Value::Map(id), k] => (*id, *k),
        _ => return Value::Unit,
    };
    vm.with_heap(|h| {
        let key = match key_string(h, k) {
            Some(key) => key,
            None => return Value::Unit,
        };
        match h.get(id) {
            Some(Obj::Map(pairs)) => pairs
                .iter()
                .find(|(pk, _)| key_string(h, *pk).as_deref() == Some(key.as_str()))
                .map(|(_, v)| *v)
                .unwrap_or(Value::Unit),
            _ => Value::Unit,
        }
    })
}

pub fn builtin_map_len(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Map(id)] => vm.with_heap(|h| match h.get(*id) {
            Some(Obj::Map(pairs)) => Value::Int(pairs.len() as i64),
            _ => Value::Unit,
        }),
        _ => Value::Unit,
    }
}

pub fn register(vm: &Arc<Vm>) {
    let vec_any = || Type::vec_of(Type::Any);
    vm.define_native("vec", builtin_vec_new, Type::func(vec![], vec_any()));
    vm.define_native(
        "vec-push",
        builtin_vec_push,
        Type::func(vec![vec_any(), Type::Any], Type::Unit),
    );
    vm.define_native(
        "vec-get",
        builtin_vec_get,
        Type::func(vec![vec_any(), Type::Int], Type::Any),
    );
    vm.define_native("vec-len", builtin_vec_len, Type::func(vec![vec_any()], Type::Int));
    let map_si = || Type::map_of(Type::Str, Type::Int);
    vm.define_native("map", builtin_map_new, Type::func(vec![], map_si()));
    vm.define_native(
        "map-set",
        builtin_map_set,
        Type::func(vec![map_si(), Type::Str, Type::Int], Type::Unit),
    );
    vm.define_native(
        "map-get",
        builtin_map_get,
        Type::func(vec![map_si(), Type::Str], Type::Int),
    );
    vm.define_native("map-len", builtin_map_len, Type::func(vec![map_si()], Type::Int));
}
