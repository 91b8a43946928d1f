//! Output: `print` renders its arguments space-separated with a trailing
//! newline.

use std::sync::Arc;

use crate::eval::Vm;
use crate::gc::{ObjId, Roots};
use crate::types::Type;
use crate::value::{render, Value};

pub fn builtin_print(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    let line = vm.with_heap(|h| {
        args.iter().map(|v| render(h, *v)).collect::<Vec<_>>().join(" ")
    });
    println!("{}", line);
    Value::Unit
}

pub fn register(vm: &Arc<Vm>) {
    vm.define_native("print", builtin_print, Type::func(vec![Type::Any], Type::Unit));
}
