// ABOUTME: Mark-and-sweep heap for the runtime value universe

use std::sync::Arc;

use crate::channel::Channel;
use crate::config;
use crate::env::Frame;
use crate::value::{Closure, Value};

/// Handle to a heap object. Plain index; freed slots are recycled through a
/// free list, so a correct root set is what keeps handles valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjId(u32);

/// Every heap-allocated value body. Environment frames and value cells are
/// heap objects too: the collector, not scope exit, decides when a captured
/// frame dies.
#[derive(Debug)]
pub enum Obj {
    Str(String),
    /// Runtime list used by quote/quasiquote and macros.
    List(Vec<Value>),
    Vector(Vec<Value>),
    /// Insertion-ordered key/value pairs.
    Map(Vec<(Value, Value)>),
    Opt(Option<Value>),
    Res { ok: bool, value: Value },
    StructV { name: String, fields: Vec<Value> },
    Closure(Closure),
    Chan(Arc<Channel>),
    Env(Frame),
    /// A mutable box holding one value; environments bind cells so `set!`
    /// writes through.
    Cell(Value),
}

struct Slot {
    marked: bool,
    size: usize,
    body: Option<Obj>,
}

/// Explicit root stacks threaded through evaluation. `temps` protects
/// values the evaluator holds in Rust locals; `envs` protects the chain of
/// environments entered by `let` and closure calls.
#[derive(Default)]
pub struct Roots {
    pub temps: Vec<Value>,
    pub envs: Vec<ObjId>,
}

impl Roots {
    pub fn new() -> Self {
        Roots::default()
    }

    /// Current temp watermark; pair with [`Roots::release`].
    pub fn mark(&self) -> usize {
        self.temps.len()
    }

    pub fn release(&mut self, mark: usize) {
        self.temps.truncate(mark);
    }
}

pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    bytes_allocated: usize,
    next_threshold: usize,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            slots: Vec::new(),
            free: Vec::new(),
            bytes_allocated: 0,
            next_threshold: config::GC_INITIAL_THRESHOLD,
        }
    }

    pub fn alloc(&mut self, body: Obj) -> ObjId {
        let size = obj_size(&body);
        self.bytes_allocated += size;
        let slot = Slot { marked: false, size, body: Some(body) };
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx as usize] = slot;
                ObjId(idx)
            }
            None => {
                self.slots.push(slot);
                ObjId((self.slots.len() - 1) as u32)
            }
        }
    }

    pub fn get(&self, id: ObjId) -> Option<&Obj> {
        self.slots.get(id.0 as usize).and_then(|s| s.body.as_ref())
    }

    pub fn get_mut(&mut self, id: ObjId) -> Option<&mut Obj> {
        self.slots.get_mut(id.0 as usize).and_then(|s| s.body.as_mut())
    }

    pub fn contains(&self, id: ObjId) -> bool {
        self.get(id).is_some()
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    pub fn should_collect(&self) -> bool {
        self.bytes_allocated > self.next_threshold
    }

    /// Mark everything reachable from the roots, sweep the rest, and double
    /// the trigger threshold. Returns the number of objects freed.
    pub fn collect(&mut self, roots: &Roots, globals: ObjId) -> usize {
        self.mark_obj(globals);
        for &env in &roots.envs {
            self.mark_obj(env);
        }
        for &v in &roots.temps {
            self.mark_value(v);
        }
        let freed = self.sweep();
        self.next_threshold = self.next_threshold.saturating_mul(2);
        freed
    }

    fn mark_value(&mut self, v: Value) {
        match v {
            Value::Str(id)
            | Value::List(id)
            | Value::Vector(id)
            | Value::Map(id)
            | Value::Opt(id)
            | Value::Res(id)
            | Value::StructV(id)
            | Value::Chan(id)
            | Value::Closure(id) => self.mark_obj(id),
            _ => {}
        }
    }

    fn mark_obj(&mut self, id: ObjId) {
        let idx = id.0 as usize;
        match self.slots.get(idx) {
            Some(slot) if !slot.marked && slot.body.is_some() => {}
            _ => return,
        }
        self.slots[idx].marked = true;
        let (values, ids) = match self.slots[idx].body.as_ref() {
            Some(body) => children(body),
            None => return,
        };
        for v in values {
            self.mark_value(v);
        }
        for child in ids {
            self.mark_obj(child);
        }
    }

    fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if slot.body.is_none() {
                continue;
            }
            if slot.marked {
                slot.marked = false;
            } else {
                slot.body = None;
                self.bytes_allocated = self.bytes_allocated.saturating_sub(slot.size);
                self.free.push(idx as u32);
                freed += 1;
            }
        }
        freed
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

/// The handles one object keeps other objects alive through. Channels count
/// their buffered, not-yet-received values as reachable.
fn children(body: &Obj) -> (Vec<Value>, Vec<ObjId>) {
    match body {
        Obj::Str(_) => (Vec::new(), Vec::new()),
        Obj::List(items) | Obj::Vector(items) => (items.clone(), Vec::new()),
        Obj::Map(pairs) => {
            let mut vs = Vec::with_capacity(pairs.len() * 2);
            for (k, v) in pairs {
                vs.push(*k);
                vs.push(*v);
            }
            (vs, Vec::new())
        }
        Obj::Opt(inner) => (inner.iter().copied().collect(), Vec::new()),
        Obj::Res { value, .. } => (vec![*value], Vec::new()),
        Obj::StructV { fields, .. } => (fields.clone(), Vec::new()),
        Obj::Closure(c) => (Vec::new(), vec![c.env]),
        Obj::Chan(ch) => (ch.snapshot(), Vec::new()),
        Obj::Env(frame) => {
            let ids: Vec<ObjId> = frame
                .parent
                .into_iter()
                .chain(frame.entries.iter().filter_map(|e| e.cell))
                .collect();
            (Vec::new(), ids)
        }
        Obj::Cell(v) => (vec![*v], Vec::new()),
    }
}

fn obj_size(body: &Obj) -> usize {
    let payload = match body {
        Obj::Str(s) => s.len(),
        Obj::List(items) | Obj::Vector(items) => items.capacity() * std::mem::size_of::<Value>(),
        Obj::Map(pairs) => pairs.capacity() * std::mem::size_of::<(Value, Value)>(),
        Obj::StructV { fields, .. } => fields.capacity() * std::mem::size_of::<Value>(),
        Obj::Env(frame) => frame.entries.capacity() * std::mem::size_of::<crate::env::Entry>(),
        _ => 0,
    };
    std::mem::size_of::<Obj>() + payload
}
