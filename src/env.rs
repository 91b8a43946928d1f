// ABOUTME: Chained environment frames mapping names to (type, value cell)

use crate::gc::{Heap, Obj, ObjId};
use crate::types::Type;

/// One scope: a parent link and its entries, newest first in lookup order.
/// Frames live in the GC heap because closures capture them; nothing frees
/// a frame on function return.
#[derive(Debug)]
pub struct Frame {
    pub parent: Option<ObjId>,
    pub entries: Vec<Entry>,
}

/// A binding. The checker populates `ty`; the evaluator populates `cell`
/// with a heap cell so `set!` can mutate in place. Either side may be
/// absent: type declarations (`defstruct`) carry no cell, runtime closure
/// parameters carry no type.
#[derive(Debug)]
pub struct Entry {
    pub name: String,
    pub ty: Option<Type>,
    pub cell: Option<ObjId>,
}

pub fn new_frame(heap: &mut Heap, parent: Option<ObjId>) -> ObjId {
    heap.alloc(Obj::Env(Frame { parent, entries: Vec::new() }))
}

/// Bind `name` in exactly this frame. Later definitions shadow earlier ones
/// because lookup scans newest-first.
pub fn define(heap: &mut Heap, env: ObjId, name: &str, ty: Option<Type>, cell: Option<ObjId>) {
    if let Some(Obj::Env(frame)) = heap.get_mut(env) {
        frame.entries.push(Entry { name: name.to_string(), ty, cell });
    }
}

/// Walk inner to outer frames; return the newest matching entry's type and
/// cell.
pub fn lookup(heap: &Heap, env: ObjId, name: &str) -> Option<(Option<Type>, Option<ObjId>)> {
    let mut cur = Some(env);
    while let Some(id) = cur {
        let frame = match heap.get(id) {
            Some(Obj::Env(frame)) => frame,
            _ => return None,
        };
        if let Some(entry) = frame.entries.iter().rev().find(|e| e.name == name) {
            return Some((entry.ty.clone(), entry.cell));
        }
        cur = frame.parent;
    }
    None
}
