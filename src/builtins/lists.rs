//! Code-as-data helpers over quoted lists and symbols, used heavily by
//! macro bodies.

use std::sync::Arc;

use crate::eval::Vm;
use crate::gc::{Obj, ObjId, Roots};
use crate::types::Type;
use crate::value::Value;

fn read_list(vm: &Arc<Vm>, v: Value) -> Option<Vec<Value>> {
    match v {
        Value::List(id) => vm.with_heap(|h| match h.get(id) {
            Some(Obj::List(items)) => Some(items.clone()),
            _ => None,
        }),
        _ => None,
    }
}

pub fn builtin_is_list(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    Value::Bool(matches!(args, [Value::List(_)]))
}

pub fn builtin_is_symbol(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    Value::Bool(matches!(args, [Value::Sym(_)]))
}

pub fn builtin_symbol_eq(_vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Sym(a), Value::Sym(b)] => Value::Bool(a == b),
        _ => Value::Bool(false),
    }
}

pub fn builtin_list_len(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args.first().and_then(|v| read_list(vm, *v)) {
        Some(items) if args.len() == 1 => Value::Int(items.len() as i64),
        _ => Value::Unit,
    }
}

pub fn builtin_list_head(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args.first().and_then(|v| read_list(vm, *v)) {
        Some(items) if args.len() == 1 => items.first().copied().unwrap_or(Value::Unit),
        _ => Value::Unit,
    }
}

pub fn builtin_list_tail(vm: &Arc<Vm>, roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args.first().and_then(|v| read_list(vm, *v)) {
        Some(items) if args.len() == 1 => {
            let rest: Vec<Value> = items.into_iter().skip(1).collect();
            Value::List(vm.alloc(roots, Obj::List(rest)))
        }
        _ => Value::Unit,
    }
}

pub fn builtin_list_cons(vm: &Arc<Vm>, roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    if args.len() != 2 {
        return Value::Unit;
    }
    match read_list(vm, args[1]) {
        Some(items) => {
            let mut out = Vec::with_capacity(items.len() + 1);
            out.push(args[0]);
            out.extend(items);
            Value::List(vm.alloc(roots, Obj::List(out)))
        }
        None => Value::Unit,
    }
}

pub fn builtin_list_append(vm: &Arc<Vm>, roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    if args.len() != 2 {
        return Value::Unit;
    }
    match (read_list(vm, args[0]), read_list(vm, args[1])) {
        (Some(mut a), Some(b)) => {
            a.extend(b);
            Value::List(vm.alloc(roots, Obj::List(a)))
        }
        _ => Value::Unit,
    }
}

pub fn register(vm: &Arc<Vm>) {
    let pred = || Type::func(vec![Type::Any], Type::Bool);
    vm.define_native("list?", builtin_is_list, pred());
    vm.define_native("symbol?", builtin_is_symbol, pred());
    vm.define_native(
        "symbol=",
        builtin_symbol_eq,
        Type::func(vec![Type::Any, Type::Any], Type::Bool),
    );
    vm.define_native("list-len", builtin_list_len, Type::func(vec![Type::Any], Type::Int));
    vm.define_native("list-head", builtin_list_head, Type::func(vec![Type::Any], Type::Any));
    vm.define_native("list-tail", builtin_list_tail, Type::func(vec![Type::Any], Type::Any));
    let any2 = || Type::func(vec![Type::Any, Type::Any], Type::Any);
    vm.define_native("list-cons", builtin_list_cons, any2());
    vm.define_native("list-append", builtin_list_append, any2());
}
