//! String operations and numeric conversions. Slicing and equality are
//! byte-oriented; `str-slice` clamps its range and `str-index` answers -1
//! when the needle is absent.

use std::sync::Arc;

use crate::eval::Vm;
use crate::gc::{Obj, ObjId, Roots};
use crate::types::Type;
use crate::value::Value;

fn read_str(vm: &Arc<Vm>, v: Value) -> Option<String> {
    match v {
        Value::Str(id) => vm.with_heap(|h| match h.get(id) {
            Some(Obj::Str(s)) => Some(s.clone()),
            _ => None,
        }),
        _ => None,
    }
}

pub fn builtin_str_concat(vm: &Arc<Vm>, roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    if args.len() != 2 {
        return Value::Unit;
    }
    match (read_str(vm, args[0]), read_str(vm, args[1])) {
        (Some(a), Some(b)) => Value::Str(vm.alloc(roots, Obj::Str(a + &b))),
        _ => Value::Unit,
    }
}

pub fn builtin_str_len(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args.first().and_then(|v| read_str(vm, *v)) {
        Some(s) if args.len() == 1 => Value::Int(s.len() as i64),
        _ => Value::Unit,
    }
}

pub fn builtin_str_slice(vm: &Arc<Vm>, roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    let (s, a, b) = match args {
        [s, Value::Int(a), Value::Int(b)] => match read_str(vm, *s) {
            Some(s) => (s, *a, *b),
            None => return Value::Unit,
        },
        _ => return Value::Unit,
    };
    let len = s.len() as i64;
    let start = a.clamp(0, len) as usize;
    let end = b.clamp(start as i64, len) as usize;
    let out = String::from_utf8_lossy(&s.as_bytes()[start..end]).into_owned();
    Value::Str(vm.alloc(roots, Obj::Str(out)))
}

pub fn builtin_str_index(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    if args.len() != 2 {
        return Value::Unit;
    }
    match (read_str(vm, args[0]), read_str(vm, args[1])) {
        (Some(hay), Some(needle)) => {
            Value::Int(hay.find(&needle).map(|i| i as i64).unwrap_or(-1))
        }
        _ => Value::Unit,
    }
}

pub fn builtin_str_split_ws(vm: &Arc<Vm>, roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    let s = match args.first().and_then(|v| read_str(vm, *v)) {
        Some(s) => s,
        None => return Value::Unit,
    };
    let mark = roots.mark();
    for word in s.split_whitespace() {
        let id = vm.alloc(roots, Obj::Str(word.to_string()));
        roots.temps.push(Value::Str(id));
    }
    let items = roots.temps[mark..].to_vec();
    let vec_id = vm.alloc(roots, Obj::Vector(items));
    roots.release(mark);
    Value::Vector(vec_id)
}

pub fn builtin_str_to_int(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args.first().and_then(|v| read_str(vm, *v)) {
        Some(s) => Value::Int(s.trim().parse::<i64>().unwrap_or(0)),
        None => Value::Unit,
    }
}

pub fn builtin_int_to_str(vm: &Arc<Vm>, roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Int(a)] => Value::Str(vm.alloc(roots, Obj::Str(a.to_string()))),
        _ => Value::Unit,
    }
}

pub fn builtin_str_to_float(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args.first().and_then(|v| read_str(vm, *v)) {
        Some(s) => Value::Float(s.trim().parse::<f64>().unwrap_or(0.0)),
        None => Value::Unit,
    }
}

pub fn builtin_float_to_str(vm: &Arc<Vm>, roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    match args {
        [Value::Float(a)] => Value::Str(vm.alloc(roots, Obj::Str(a.to_string()))),
        _ => Value::Unit,
    }
}

pub fn register(vm: &Arc<Vm>) {
    vm.define_native(
        "str-concat",
        builtin_str_concat,
        Type::func(vec![Type::Str, Type::Str], Type::Str),
    );
    vm.define_native("str-len", builtin_str_len, Type::func(vec![Type::Str], Type::Int));
    vm.define_native(
        "str-slice",
        builtin_str_slice,
        Type::func(vec![Type::Str, Type::Int, Type::Int], Type::Str),
    );
    vm.define_native(
        "str-index",
        builtin_str_index,
        Type::func(vec![Type::Str, Type::Str], Type::Int),
    );
    vm.define_native(
        "str-split-ws",
        builtin_str_split_ws,
        Type::func(vec![Type::Any], Type::vec_of(Type::Str)),
    );
    vm.define_native("str-to-int", builtin_str_to_int, Type::func(vec![Type::Str], Type::Int));
    vm.define_native("int-to-str", builtin_int_to_str, Type::func(vec![Type::Int], Type::Str));
    vm.define_native(
        "str-to-float",
        builtin_str_to_float,
        Type::func(vec![Type::Str], Type::Float),
    );
    vm.define_native(
        "float-to-str",
        builtin_float_to_str,
        Type::func(vec![Type::Float], Type::Str),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc_str(vm: &Arc<Vm>, s: &str) -> Value {
        Value::Str(vm.alloc(&Roots::new(), Obj::Str(s.to_string())))
    }

    fn as_string(vm: &Arc<Vm>, v: Value) -> String {
        read_str(vm, v).expect("string value")
    }

    #[test]
    fn test_concat_len_slice() {
        let vm = Vm::new();
        let mut roots = Roots::new();
        let globals = vm.globals;
        let ab = builtin_str_concat(&vm, &mut roots, globals, &[alloc_str(&vm, "ab"), alloc_str(&vm, "cd")]);
        assert_eq!(as_string(&vm, ab), "abcd");
        assert_eq!(builtin_str_len(&vm, &mut roots, globals, &[ab]), Value::Int(4));
        let mid = builtin_str_slice(&vm, &mut roots, globals, &[ab, Value::Int(1), Value::Int(3)]);
        assert_eq!(as_string(&vm, mid), "bc");
    }

    #[test]
    fn test_slice_clamps_out_of_range() {
        let vm = Vm::new();
        let mut roots = Roots::new();
        let globals = vm.globals;
        let s = alloc_str(&vm, "abc");
        let all = builtin_str_slice(&vm, &mut roots, globals, &[s, Value::Int(-5), Value::Int(99)]);
        assert_eq!(as_string(&vm, all), "abc");
        let none = builtin_str_slice(&vm, &mut roots, globals, &[s, Value::Int(2), Value::Int(1)]);
        assert_eq!(as_string(&vm, none), "");
    }

    #[test]
    fn test_index_answers_minus_one_when_absent() {
        let vm = Vm::new();
        let mut roots = Roots::new();
        let globals = vm.globals;
        let hay = alloc_str(&vm, "hello world");
        assert_eq!(
            builtin_str_index(&vm, &mut roots, globals, &[hay, alloc_str(&vm, "world")]),
            Value::Int(6)
        );
        assert_eq!(
            builtin_str_index(&vm, &mut roots, globals, &[hay, alloc_str(&vm, "xyz")]),
            Value::Int(-1)
        );
    }

    #[test]
    fn test_split_ws_builds_a_vector_of_strings() {
        let vm = Vm::new();
        let mut roots = Roots::new();
        let globals = vm.globals;
        let v = builtin_str_split_ws(&vm, &mut roots, globals, &[alloc_str(&vm, "  a b\tc ")]);
        let words = vm.with_heap(|h| match v {
            Value::Vector(id) => match h.get(id) {
                Some(Obj::Vector(items)) => items.clone(),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        });
        assert_eq!(words.len(), 3);
    }

    #[test]
    fn test_conversions_default_on_garbage() {
        let vm = Vm::new();
        let mut roots = Roots::new();
        let globals = vm.globals;
        assert_eq!(
            builtin_str_to_int(&vm, &mut roots, globals, &[alloc_str(&vm, " 42 ")]),
            Value::Int(42)
        );
        assert_eq!(
            builtin_str_to_int(&vm, &mut roots, globals, &[alloc_str(&vm, "nope")]),
            Value::Int(0)
        );
        assert_eq!(
            builtin_str_to_float(&vm, &mut roots, globals, &[alloc_str(&vm, "2.5")]),
            Value::Float(2.5)
        );
    }
}
