//! Channels and threads: `chan`, `send`, `recv`, `spawn`.
//!
//! Channels are bounded and blocking; the language-level builtins wait
//! forever. `spawn` starts a detached OS thread running a zero-argument
//! closure. The channel handle is cloned out of the heap before any
//! blocking call, so the heap lock is never held while waiting.

use std::sync::Arc;
use std::thread;

use crate::channel::Channel;
use crate::config;
use crate::eval::Vm;
use crate::gc::{Obj, ObjId, Roots};
use crate::types::Type;
use crate::value::Value;

fn channel_of(vm: &Arc<Vm>, v: Value) -> Option<Arc<Channel>> {
    match v {
        Value::Chan(id) => vm.with_heap(|h| match h.get(id) {
            Some(Obj::Chan(ch)) => Some(Arc::clone(ch)),
            _ => None,
        }),
        _ => None,
    }
}

pub fn builtin_chan(vm: &Arc<Vm>, roots: &mut Roots, _env: ObjId, _args: &[Value]) -> Value {
    let ch = Arc::new(Channel::new(config::CHANNEL_CAPACITY));
    Value::Chan(vm.alloc(roots, Obj::Chan(ch)))
}

pub fn builtin_send(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    if args.len() != 2 {
        return Value::Bool(false);
    }
    match channel_of(vm, args[0]) {
        Some(ch) => Value::Bool(ch.send(args[1], None)),
        None => Value::Bool(false),
    }
}

pub fn builtin_recv(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    if args.len() != 1 {
        return Value::Unit;
    }
    match channel_of(vm, args[0]) {
        Some(ch) => ch.recv(None).unwrap_or(Value::Unit),
        None => Value::Unit,
    }
}

pub fn builtin_spawn(vm: &Arc<Vm>, _roots: &mut Roots, _env: ObjId, args: &[Value]) -> Value {
    let f = match args {
        [f @ Value::Closure(_)] => *f,
        _ => return Value::Unit,
    };
    // Registered before the thread starts: a non-zero worker count holds
    // off collection, keeping the closure and everything it reaches alive
    // for the thread's lifetime.
    vm.worker_started();
    let vm = Arc::clone(vm);
    thread::spawn(move || {
        let mut roots = Roots::new();
        vm.call_closure(&mut roots, f, &[]);
        vm.worker_finished();
    });
    Value::Unit
}

pub fn register(vm: &Arc<Vm>) {
    let chan_int = || Type::chan(Type::Int);
    vm.define_native("chan", builtin_chan, Type::func(vec![], chan_int()));
    vm.define_native(
        "send",
        builtin_send,
        Type::func(vec![chan_int(), Type::Int], Type::Bool),
    );
    vm.define_native("recv", builtin_recv, Type::func(vec![chan_int()], Type::Int));
    vm.define_native(
        "spawn",
        builtin_spawn,
        Type::func(vec![Type::func(vec![], Type::Unit)], Type::Unit),
    );
}
