// ABOUTME: The tree-walking evaluator: VM state, special forms, closures, quasiquote

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::ast::{Node, NodeKind};
use crate::check;
use crate::env::{self, Frame};
use crate::error::SqaleError;
use crate::gc::{Heap, Obj, ObjId, Roots};
use crate::modules;
use crate::types::Type;
use crate::value::{Closure, NativeFn, Value};

/// The virtual machine: one GC heap, one global environment, and the
/// import cache. Module arenas are leaked to process lifetime on load, so
/// module ASTs outlive the import call by construction.
///
/// The heap mutex is taken per operation and never held across a blocking
/// channel call. Automatic collection only runs while no spawned worker
/// thread is live; with workers running, allocation proceeds and collection
/// is deferred until the VM is single-threaded again.
pub struct Vm {
    heap: Mutex<Heap>,
    pub globals: ObjId,
    workers: AtomicUsize,
    imported: Mutex<Vec<String>>,
}

impl Vm {
    pub fn new() -> Arc<Vm> {
        let mut heap = Heap::new();
        let globals = env::new_frame(&mut heap, None);
        let vm = Arc::new(Vm {
            heap: Mutex::new(heap),
            globals,
            workers: AtomicUsize::new(0),
            imported: Mutex::new(Vec::new()),
        });
        crate::builtins::register_builtins(&vm);
        vm
    }

    fn lock_heap(&self) -> MutexGuard<'_, Heap> {
        self.heap.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_heap<R>(&self, f: impl FnOnce(&Heap) -> R) -> R {
        f(&self.lock_heap())
    }

    pub fn with_heap_mut<R>(&self, f: impl FnOnce(&mut Heap) -> R) -> R {
        f(&mut self.lock_heap())
    }

    /// Allocate a heap object, collecting first when the threshold is
    /// exceeded and this is the only running thread.
    pub fn alloc(&self, roots: &Roots, body: Obj) -> ObjId {
        let mut heap = self.lock_heap();
        if heap.should_collect() && self.workers.load(Ordering::SeqCst) == 0 {
            heap.collect(roots, self.globals);
        }
        heap.alloc(body)
    }

    /// Bind a host function in the global environment with its SQALE type.
    pub fn define_native(&self, name: &str, f: NativeFn, ty: Type) {
        let mut heap = self.lock_heap();
        let cell = heap.alloc(Obj::Cell(Value::Native(f)));
        env::define(&mut heap, self.globals, name, Some(ty), Some(cell));
    }

    pub fn worker_started(&self) {
        self.workers.fetch_add(1, Ordering::SeqCst);
    }

    pub fn worker_finished(&self) {
        self.workers.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn already_imported(&self, path: &str) -> bool {
        let cache = self.imported.lock().unwrap_or_else(PoisonError::into_inner);
        cache.iter().any(|p| p == path)
    }

    pub fn mark_imported(&self, path: &str) {
        let mut cache = self.imported.lock().unwrap_or_else(PoisonError::into_inner);
        cache.push(path.to_string());
    }

    pub fn lookup_global(&self, name: &str) -> Option<Value> {
        self.load_symbol(self.globals, name)
    }

    fn load_symbol(&self, env: ObjId, name: &str) -> Option<Value> {
        let heap = self.lock_heap();
        let (_, cell) = env::lookup(&heap, env, name)?;
        let cell = match cell {
            Some(c) => c,
            None => return Some(Value::Unit),
        };
        match heap.get(cell) {
            Some(Obj::Cell(v)) => Some(*v),
            _ => Some(Value::Unit),
        }
    }

    /// Type-check every top-level form, then evaluate them in order.
    /// Imports are resolved eagerly during the checking pass so the bindings
    /// they introduce are visible to subsequent forms.
    pub fn run_program(
        self: &Arc<Self>,
        roots: &mut Roots,
        program: &'static Node,
    ) -> Result<(), SqaleError> {
        self.check_program(roots, program)?;
        for &form in program.as_list().unwrap_or(&[]) {
            self.eval(roots, self.globals, form);
        }
        Ok(())
    }

    pub fn check_program(
        self: &Arc<Self>,
        roots: &mut Roots,
        program: &'static Node,
    ) -> Result<(), SqaleError> {
        for (index, form) in program.as_list().unwrap_or(&[]).iter().copied().enumerate() {
            if let Some(items) = form.as_list() {
                if items.len() == 2 && items[0].is_sym("import") {
                    if let NodeKind::Str(path) = items[1].kind {
                        modules::import(self, roots, path);
                        continue;
                    }
                }
            }
            if !check::check_node(self, roots, self.globals, form) {
                let head = form
                    .as_list()
                    .and_then(|l| l.first())
                    .and_then(|h| h.as_symbol())
                    .map(String::from);
                match &head {
                    Some(h) => eprintln!("Type error in form {} starting with '{}'", index, h),
                    None => eprintln!("Type error in toplevel form {}.", index),
                }
                return Err(SqaleError::Type { index, head });
            }
        }
        Ok(())
    }

    /// Check and evaluate one form; used by the REPL and the macro-time VM.
    pub fn eval_form(
        self: &Arc<Self>,
        roots: &mut Roots,
        form: &'static Node,
    ) -> Result<Value, SqaleError> {
        if !check::check_node(self, roots, self.globals, form) {
            let head = form
                .as_list()
                .and_then(|l| l.first())
                .and_then(|h| h.as_symbol())
                .map(String::from);
            return Err(SqaleError::Type { index: 0, head });
        }
        Ok(self.eval(roots, self.globals, form))
    }

    /// If `main` is bound to a closure, call it with no arguments; an `Int`
    /// result is the process exit code.
    pub fn call_main(self: &Arc<Self>, roots: &mut Roots) -> Option<i64> {
        let v = self.lookup_global("main")?;
        if !matches!(v, Value::Closure(_)) {
            return None;
        }
        match self.call_closure(roots, v, &[]) {
            Value::Int(code) => Some(code),
            _ => Some(0),
        }
    }

    pub fn eval(self: &Arc<Self>, roots: &mut Roots, env: ObjId, n: &'static Node) -> Value {
        match &n.kind {
            NodeKind::Int(v) => Value::Int(*v),
            NodeKind::Float(v) => Value::Float(*v),
            NodeKind::Bool(v) => Value::Bool(*v),
            NodeKind::Str(s) => Value::Str(self.alloc(roots, Obj::Str((*s).to_string()))),
            NodeKind::Symbol(name) => match self.load_symbol(env, name) {
                Some(v) => v,
                None => {
                    eprintln!("unbound symbol: {}", name);
                    Value::Unit
                }
            },
            NodeKind::List(_) => self.eval_list(roots, env, n),
        }
    }

    fn eval_list(self: &Arc<Self>, roots: &mut Roots, env: ObjId, list: &'static Node) -> Value {
        let items = match list.as_list() {
            Some(items) => items,
            None => return Value::Unit,
        };
        if items.is_empty() {
            return Value::Unit;
        }
        let head = items[0];
        if let Some(name) = head.as_symbol() {
            match name {
                // Macros were collected before expansion; nothing left to do.
                "defmacro" => return Value::Unit,
                "def" => return self.eval_def(roots, env, items),
                "fn" => {
                    let closure = Closure { node: list, env, ty: list.ty().cloned() };
                    return Value::Closure(self.alloc(roots, Obj::Closure(closure)));
                }
                "let" => return self.eval_let(roots, env, items),
                "if" => {
                    if items.len() != 4 {
                        return Value::Unit;
                    }
                    let cond = self.eval(roots, env, items[1]);
                    return if matches!(cond, Value::Bool(true)) {
                        self.eval(roots, env, items[2])
                    } else {
                        self.eval(roots, env, items[3])
                    };
                }
                "do" => {
                    let mut v = Value::Unit;
                    for &item in &items[1..] {
                        v = self.eval(roots, env, item);
                    }
                    return v;
                }
                "while" => {
                    if items.len() < 2 {
                        return Value::Unit;
                    }
                    loop {
                        if !matches!(self.eval(roots, env, items[1]), Value::Bool(true)) {
                            break;
                        }
                        for &body in &items[2..] {
                            self.eval(roots, env, body);
                        }
                    }
                    return Value::Unit;
                }
                "set!" => return self.eval_set(roots, env, items),
                "quote" => {
                    if items.len() < 2 {
                        return Value::Unit;
                    }
                    return self.quote_value(roots, items[1]);
                }
                "quasiquote" => {
                    if items.len() < 2 {
                        return Value::Unit;
                    }
                    return self.quasiquote(roots, env, items[1]);
                }
                "defstruct" => return self.eval_defstruct(env, items),
                "defenum" => return self.eval_defenum(roots, env, items),
                "import" => {
                    if items.len() == 2 {
                        if let NodeKind::Str(path) = items[1].kind {
                            modules::import(self, roots, path);
                        }
                    }
                    return Value::Unit;
                }
                _ => {}
            }
        }

        // Ordinary call: head, then arguments, left to right. Everything
        // stays on the temp root stack until the call returns.
        let mark = roots.mark();
        let fval = self.eval(roots, env, head);
        roots.temps.push(fval);
        for &arg in &items[1..] {
            let v = self.eval(roots, env, arg);
            roots.temps.push(v);
        }
        let argv: Vec<Value> = roots.temps[mark + 1..].to_vec();
        let out = match fval {
            Value::Native(f) => f(self, roots, env, &argv),
            Value::Closure(_) => self.call_closure(roots, fval, &argv),
            _ => Value::Unit,
        };
        roots.release(mark);
        out
    }

    // [def name expr] or [def name : Type expr]
    fn eval_def(self: &Arc<Self>, roots: &mut Roots, env: ObjId, items: &[&'static Node]) -> Value {
        if items.len() < 3 {
            return Value::Unit;
        }
        let name = match items[1].as_symbol() {
            Some(n) => n,
            None => return Value::Unit,
        };
        let mut idx = 2;
        if items.get(idx).is_some_and(|n| n.is_sym(":")) {
            idx += 2; // skip ':' and the type expression
        }
        let expr = match items.get(idx) {
            Some(e) => *e,
            None => return Value::Unit,
        };
        let v = self.eval(roots, env, expr);
        let mark = roots.mark();
        roots.temps.push(v);
        let cell = self.alloc(roots, Obj::Cell(v));
        self.with_heap_mut(|h| env::define(h, env, name, expr.ty().cloned(), Some(cell)));
        roots.release(mark);
        Value::Unit
    }

    // [let [[name expr] | [name : T expr] ...] body...]
    //
    // Bindings evaluate in the child environment so earlier ones are visible
    // to later ones. The child frame is heap-owned: an inner closure may
    // have captured it.
    fn eval_let(self: &Arc<Self>, roots: &mut Roots, env: ObjId, items: &[&'static Node]) -> Value {
        if items.len() < 3 {
            return Value::Unit;
        }
        let binds = match items[1].as_list() {
            Some(b) => b,
            None => return Value::Unit,
        };
        let child = self.alloc(roots, Obj::Env(Frame { parent: Some(env), entries: Vec::new() }));
        roots.envs.push(child);
        let mut i = 0;
        while i < binds.len() {
            let pair = match binds[i].as_list() {
                Some(p) if p.len() >= 2 => p,
                _ => {
                    i += 1;
                    continue;
                }
            };
            let name = match pair[0].as_symbol() {
                Some(n) => n,
                None => {
                    i += 1;
                    continue;
                }
            };
            let expr = if pair.len() >= 4 && pair[1].is_sym(":") {
                Some(pair[3])
            } else if pair.len() == 3 && pair[1].is_sym(":") {
                // [name : T] with the expression in the next binding slot
                i += 1;
                binds.get(i).copied()
            } else {
                Some(pair[1])
            };
            if let Some(ex) = expr {
                let v = self.eval(roots, child, ex);
                let mark = roots.mark();
                roots.temps.push(v);
                let cell = self.alloc(roots, Obj::Cell(v));
                self.with_heap_mut(|h| env::define(h, child, name, ex.ty().cloned(), Some(cell)));
                roots.release(mark);
            }
            i += 1;
        }
        let mut result = Value::Unit;
        for &body in &items[2..] {
            result = self.eval(roots, child, body);
        }
        roots.envs.pop();
        result
    }

    // [set! name expr]: overwrite the bound cell in place.
    fn eval_set(self: &Arc<Self>, roots: &mut Roots, env: ObjId, items: &[&'static Node]) -> Value {
        if items.len() != 3 {
            return Value::Unit;
        }
        let name = match items[1].as_symbol() {
            Some(n) => n,
            None => return Value::Unit,
        };
        let cell = self.with_heap(|h| env::lookup(h, env, name).and_then(|(_, cell)| cell));
        let cell = match cell {
            Some(c) => c,
            None => {
                eprintln!("set!: undefined variable: {}", name);
                return Value::Unit;
            }
        };
        let v = self.eval(roots, env, items[2]);
        self.with_heap_mut(|h| {
            if let Some(Obj::Cell(slot)) = h.get_mut(cell) {
                *slot = v;
            }
        });
        Value::Unit
    }

    // [defstruct Name [[field : T] ...]]: a type-level binding, no cell.
    fn eval_defstruct(self: &Arc<Self>, env: ObjId, items: &[&'static Node]) -> Value {
        if items.len() < 3 {
            return Value::Unit;
        }
        let name = match items[1].as_symbol() {
            Some(n) => n,
            None => return Value::Unit,
        };
        let fields_node = match items[2].as_list() {
            Some(f) => f,
            None => return Value::Unit,
        };
        let mut fields = Vec::new();
        for f in fields_node {
            let fitems = match f.as_list() {
                Some(fi) => fi,
                None => continue,
            };
            let fname = match fitems.first().and_then(|n| n.as_symbol()) {
                Some(n) => n,
                None => continue,
            };
            let fty = if fitems.len() >= 3 { Type::from_node(fitems[2]) } else { Type::Any };
            fields.push((fname.to_string(), fty));
        }
        let ty = Type::Struct { name: name.to_string(), fields };
        self.with_heap_mut(|h| env::define(h, env, name, Some(ty), None));
        Value::Unit
    }

    // [defenum Name [V1 V2 ...]]: the name binds the type; each variant
    // binds its 0-based integer tag.
    fn eval_defenum(self: &Arc<Self>, roots: &mut Roots, env: ObjId, items: &[&'static Node]) -> Value {
        if items.len() < 3 {
            return Value::Unit;
        }
        let name = match items[1].as_symbol() {
            Some(n) => n,
            None => return Value::Unit,
        };
        let variants_node = match items[2].as_list() {
            Some(v) => v,
            None => return Value::Unit,
        };
        let variants: Vec<&str> = variants_node.iter().filter_map(|n| n.as_symbol()).collect();
        let ty = Type::Enum {
            name: name.to_string(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
        };
        self.with_heap_mut(|h| env::define(h, env, name, Some(ty), None));
        for (tag, variant) in variants.iter().enumerate() {
            let cell = self.alloc(roots, Obj::Cell(Value::Int(tag as i64)));
            self.with_heap_mut(|h| env::define(h, env, variant, Some(Type::Int), Some(cell)));
        }
        Value::Unit
    }

    /// Convert an unevaluated form into its value analogue, recursively for
    /// lists. Nothing is evaluated here; that is what `quasiquote` is for.
    pub fn quote_value(self: &Arc<Self>, roots: &mut Roots, n: &'static Node) -> Value {
        match &n.kind {
            NodeKind::Int(v) => Value::Int(*v),
            NodeKind::Float(v) => Value::Float(*v),
            NodeKind::Bool(v) => Value::Bool(*v),
            NodeKind::Str(s) => Value::Str(self.alloc(roots, Obj::Str((*s).to_string()))),
            NodeKind::Symbol(s) => Value::Sym(s),
            NodeKind::List(items) => {
                let mark = roots.mark();
                for &item in items {
                    let v = self.quote_value(roots, item);
                    roots.temps.push(v);
                }
                let elems = roots.temps[mark..].to_vec();
                let id = self.alloc(roots, Obj::List(elems));
                roots.release(mark);
                Value::List(id)
            }
        }
    }

    /// Quasiquotation: `[unquote e]` evaluates `e` in place; an element of
    /// the form `[unquote-splicing e]` evaluates `e` and splices a list
    /// result into the surrounding list (a non-list result is inserted as a
    /// single element). Splice tests are depth-1 at each position; nesting
    /// depth is not tracked.
    fn quasiquote(self: &Arc<Self>, roots: &mut Roots, env: ObjId, n: &'static Node) -> Value {
        let items = match n.as_list() {
            Some(items) => items,
            None => return self.quote_value(roots, n),
        };
        if items.len() >= 2 && items[0].is_sym("unquote") {
            return self.eval(roots, env, items[1]);
        }
        let mark = roots.mark();
        for &el in items {
            if let Some(parts) = el.as_list() {
                if parts.len() >= 2 && parts[0].is_sym("unquote-splicing") {
                    let sp = self.eval(roots, env, parts[1]);
                    roots.temps.push(sp);
                    if let Value::List(id) = sp {
                        let elems = self.with_heap(|h| match h.get(id) {
                            Some(Obj::List(vs)) => vs.clone(),
                            _ => Vec::new(),
                        });
                        roots.temps.pop();
                        roots.temps.extend(elems);
                    }
                    continue;
                }
            }
            let v = self.quasiquote(roots, env, el);
            roots.temps.push(v);
        }
        let elems = roots.temps[mark..].to_vec();
        let id = self.alloc(roots, Obj::List(elems));
        roots.release(mark);
        Value::List(id)
    }

    /// Call protocol: a fresh child of the closure's captured environment,
    /// positional parameters bound up to min(declared, provided), surplus
    /// arguments ignored, result is the last body form. The child frame is
    /// not freed here; the collector owns it.
    pub fn call_closure(self: &Arc<Self>, roots: &mut Roots, f: Value, args: &[Value]) -> Value {
        let id = match f {
            Value::Closure(id) => id,
            _ => return Value::Unit,
        };
        let closure = match self.with_heap(|h| match h.get(id) {
            Some(Obj::Closure(c)) => Some(c.clone()),
            _ => None,
        }) {
            Some(c) => c,
            None => return Value::Unit,
        };
        let items = match closure.node.as_list() {
            Some(items) if items.len() >= 2 => items,
            _ => return Value::Unit,
        };
        let params = items[1].as_list().unwrap_or(&[]);
        let mark = roots.mark();
        roots.temps.push(f);
        roots.temps.extend_from_slice(args);
        let callenv =
            self.alloc(roots, Obj::Env(Frame { parent: Some(closure.env), entries: Vec::new() }));
        roots.envs.push(callenv);
        let nbind = params.len().min(args.len());
        for i in 0..nbind {
            let pname = params[i]
                .as_list()
                .and_then(|p| p.first().copied())
                .and_then(|n| n.as_symbol());
            if let Some(pname) = pname {
                let cell = self.alloc(roots, Obj::Cell(args[i]));
                self.with_heap_mut(|h| env::define(h, callenv, pname, None, Some(cell)));
            }
        }
        let mut body_start = 2;
        if items.get(2).is_some_and(|n| n.is_sym(":")) {
            body_start = 4; // skip ': RetType'
        }
        let mut result = Value::Unit;
        for &body in items.get(body_start..).unwrap_or(&[]) {
            result = self.eval(roots, callenv, body);
        }
        roots.envs.pop();
        roots.release(mark);
        result
    }
}
