// ABOUTME: Macro environment, built-in rewriters, and user macro collection

use std::sync::Arc;

use crate::arena::Arena;
use crate::ast::Node;
use crate::config;
use crate::env;
use crate::eval::Vm;
use crate::gc::{Obj, Roots};
use crate::types::Type;
use crate::value::Value;

pub type HostRewriter = fn(&'static Arena, &'static Node) -> &'static Node;

/// A macro is either a host rewriter over raw forms or a user closure
/// evaluated in the dedicated macro-time VM.
pub enum MacroDef {
    Host(HostRewriter),
    User { vm: Arc<Vm>, closure: Value },
}

pub struct MacroEnv {
    entries: Vec<(String, MacroDef)>,
}

impl MacroEnv {
    pub fn new() -> Self {
        MacroEnv { entries: Vec::new() }
    }

    /// The macro environment every compilation unit starts from.
    pub fn with_core() -> Self {
        let mut env = MacroEnv::new();
        env.define_host("when", expand_when);
        env.define_host("cond", expand_cond);
        env.define_host("->", expand_thread);
        env
    }

    pub fn define_host(&mut self, name: &str, rewriter: HostRewriter) {
        self.entries.push((name.to_string(), MacroDef::Host(rewriter)));
    }

    pub fn define_closure(&mut self, name: &str, vm: Arc<Vm>, closure: Value) {
        self.entries.push((name.to_string(), MacroDef::User { vm, closure }));
    }

    fn get(&self, name: &str) -> Option<&MacroDef> {
        self.entries.iter().rev().find(|(n, _)| n == name).map(|(_, def)| def)
    }
}

impl Default for MacroEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Rewrite every macro use in `n` to a fixed point, bounded by
/// `MACRO_EXPANSION_LIMIT`.
pub fn expand_all(arena: &'static Arena, menv: &MacroEnv, n: &'static Node) -> &'static Node {
    expand_rec(arena, menv, n, false, 0)
}

fn expand_rec(
    arena: &'static Arena,
    menv: &MacroEnv,
    n: &'static Node,
    in_type: bool,
    depth: usize,
) -> &'static Node {
    if in_type {
        return n;
    }
    if depth > config::MACRO_EXPANSION_LIMIT {
        eprintln!("macro expansion recursion limit reached");
        return n;
    }
    match n.as_list() {
        Some(_) => expand_list(arena, menv, n, depth),
        None => n,
    }
}

/// Lists that read as type expressions are left alone. A function type
/// carries `->` between its parameters and result, never at the head — a
/// head arrow is the threading macro.
fn looks_like_type(items: &[&'static Node]) -> bool {
    items[0].is_sym("Chan") || items.iter().skip(1).any(|it| it.is_sym("->"))
}

fn expand_list(
    arena: &'static Arena,
    menv: &MacroEnv,
    list: &'static Node,
    depth: usize,
) -> &'static Node {
    let items = match list.as_list() {
        Some(items) => items,
        None => return list,
    };
    if items.is_empty() || looks_like_type(items) {
        return list;
    }
    if let Some(name) = items[0].as_symbol() {
        if let Some(def) = menv.get(name) {
            let out = match def {
                MacroDef::Host(rewriter) => rewriter(arena, list),
                MacroDef::User { vm, closure } => apply_user_macro(arena, vm, *closure, items),
            };
            return expand_rec(arena, menv, out, false, depth + 1);
        }
    }
    // Expand children; everything after a ':' marker is a type expression.
    let colon = items.iter().position(|n| n.is_sym(":"));
    let new_items = items
        .iter()
        .copied()
        .enumerate()
        .map(|(i, child)| {
            let in_type = colon.is_some_and(|c| i > c);
            expand_rec(arena, menv, child, in_type, depth + 1)
        })
        .collect();
    Node::list(arena, new_items, list.line, list.col)
}

/// Invoke a user macro: each raw argument form becomes its value analogue,
/// the closure runs in the macro-time VM, and the resulting value converts
/// back into a form tree in this unit's arena.
fn apply_user_macro(
    arena: &'static Arena,
    vm: &Arc<Vm>,
    closure: Value,
    items: &[&'static Node],
) -> &'static Node {
    let mut roots = Roots::new();
    roots.temps.push(closure);
    let mut argv = Vec::with_capacity(items.len() - 1);
    for &arg in &items[1..] {
        let v = vm.quote_value(&mut roots, arg);
        roots.temps.push(v);
        argv.push(v);
    }
    let result = vm.call_closure(&mut roots, closure, &argv);
    roots.temps.push(result);
    value_to_node(vm, arena, result)
}

fn value_to_node(vm: &Arc<Vm>, arena: &'static Arena, v: Value) -> &'static Node {
    match v {
        Value::Int(i) => Node::int(arena, i, 0, 0),
        Value::Float(f) => Node::float(arena, f, 0, 0),
        Value::Bool(b) => Node::bool_(arena, b, 0, 0),
        Value::Sym(s) => Node::symbol(arena, s, 0, 0),
        Value::Str(id) => {
            let s = vm.with_heap(|h| match h.get(id) {
                Some(Obj::Str(s)) => s.clone(),
                _ => String::new(),
            });
            Node::string(arena, &s, 0, 0)
        }
        Value::List(id) => {
            let elems = vm.with_heap(|h| match h.get(id) {
                Some(Obj::List(items)) => items.clone(),
                _ => Vec::new(),
            });
            let children = elems.into_iter().map(|e| value_to_node(vm, arena, e)).collect();
            Node::list(arena, children, 0, 0)
        }
        _ => Node::symbol(arena, "_", 0, 0),
    }
}

/// Scan the top-level forms for `[defmacro name [params...] body]`, rewrite
/// each into an `Any`-typed `fn`, evaluate it in the macro-time VM, and
/// register the closure. The closure is also bound in the macro VM's global
/// environment so its heap object stays rooted between expansions.
pub fn collect_user_macros(
    arena: &'static Arena,
    menv: &mut MacroEnv,
    mvm: &Arc<Vm>,
    program: &'static Node,
) {
    for &form in program.as_list().unwrap_or(&[]) {
        let items = match form.as_list() {
            Some(items) if items.len() >= 4 => items,
            _ => continue,
        };
        if !items[0].is_sym("defmacro") {
            continue;
        }
        let name = match items[1].as_symbol() {
            Some(n) => n,
            None => continue,
        };
        let params = match items[2].as_list() {
            Some(p) => p,
            None => continue,
        };
        let body = items[3];
        let plist: Vec<&'static Node> = params
            .iter()
            .map(|p| {
                Node::list(
                    arena,
                    vec![*p, Node::symbol(arena, ":", 0, 0), Node::symbol(arena, "Any", 0, 0)],
                    0,
                    0,
                )
            })
            .collect();
        let fn_node = Node::list(
            arena,
            vec![
                Node::symbol(arena, "fn", 0, 0),
                Node::list(arena, plist, 0, 0),
                Node::symbol(arena, ":", 0, 0),
                Node::symbol(arena, "Any", 0, 0),
                body,
            ],
            0,
            0,
        );
        let mut roots = Roots::new();
        match mvm.eval_form(&mut roots, fn_node) {
            Ok(closure @ Value::Closure(_)) => {
                roots.temps.push(closure);
                let cell = mvm.alloc(&roots, Obj::Cell(closure));
                mvm.with_heap_mut(|h| {
                    env::define(h, mvm.globals, name, Some(Type::Any), Some(cell))
                });
                menv.define_closure(name, Arc::clone(mvm), closure);
            }
            _ => eprintln!("defmacro: failed to build macro '{}'", name),
        }
    }
}

// [when test body...] => [if test [do body...] [do]]
fn expand_when(arena: &'static Arena, form: &'static Node) -> &'static Node {
    let items = match form.as_list() {
        Some(items) if items.len() >= 2 => items,
        _ => return form,
    };
    let mut then_do = vec![Node::symbol(arena, "do", 0, 0)];
    then_do.extend_from_slice(&items[2..]);
    let else_do = Node::list(arena, vec![Node::symbol(arena, "do", 0, 0)], 0, 0);
    Node::list(
        arena,
        vec![
            Node::symbol(arena, "if", 0, 0),
            items[1],
            Node::list(arena, then_do, 0, 0),
            else_do,
        ],
        0,
        0,
    )
}

// [cond [t a...] [t2 b...] [else e...]] => nested ifs, folded from the last
// clause backwards; an else clause becomes the innermost alternative.
fn expand_cond(arena: &'static Arena, form: &'static Node) -> &'static Node {
    let items = match form.as_list() {
        Some(items) if items.len() >= 2 => items,
        _ => return form,
    };
    let mut acc = Node::list(arena, vec![Node::symbol(arena, "do", 0, 0)], 0, 0);
    for clause in items[1..].iter().rev() {
        let cl = match clause.as_list() {
            Some(c) if !c.is_empty() => c,
            _ => continue,
        };
        let mut body = vec![Node::symbol(arena, "do", 0, 0)];
        body.extend_from_slice(&cl[1..]);
        let body = Node::list(arena, body, 0, 0);
        if cl[0].is_sym("else") {
            acc = body;
        } else {
            acc = Node::list(
                arena,
                vec![Node::symbol(arena, "if", 0, 0), cl[0], body, acc],
                0,
                0,
            );
        }
    }
    acc
}

// [-> x f g [h a b]] => [h [g [f x]] a b]
fn expand_thread(arena: &'static Arena, form: &'static Node) -> &'static Node {
    let items = match form.as_list() {
        Some(items) if items.len() >= 2 => items,
        _ => return form,
    };
    let mut acc = items[1];
    for step in &items[2..] {
        if step.as_symbol().is_some() {
            acc = Node::list(arena, vec![*step, acc], 0, 0);
        } else if let Some(sitems) = step.as_list() {
            if sitems.is_empty() {
                continue;
            }
            let mut call = vec![sitems[0], acc];
            call.extend_from_slice(&sitems[1..]);
            acc = Node::list(arena, call, 0, 0);
        }
    }
    acc
}
