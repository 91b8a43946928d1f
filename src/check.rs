// ABOUTME: Static type checker annotating every form with a type

use std::sync::Arc;

use crate::ast::{Node, NodeKind};
use crate::env::{self, Frame};
use crate::eval::Vm;
use crate::gc::{Obj, Roots};
use crate::types::{ty_eq, Type};

/// Check one form against `env`, caching a type on every node visited.
/// Returns false to stop the whole program; the caller reports which
/// top-level form failed.
pub fn check_node(vm: &Arc<Vm>, roots: &mut Roots, env: crate::gc::ObjId, n: &'static Node) -> bool {
    match &n.kind {
        NodeKind::Int(_) => {
            n.set_ty(Type::Int);
            true
        }
        NodeKind::Float(_) => {
            n.set_ty(Type::Float);
            true
        }
        NodeKind::Bool(_) => {
            n.set_ty(Type::Bool);
            true
        }
        NodeKind::Str(_) => {
            n.set_ty(Type::Str);
            true
        }
        NodeKind::Symbol(name) => match vm.with_heap(|h| env::lookup(h, env, name)) {
            Some((ty, _)) => {
                n.set_ty(ty.unwrap_or(Type::Error));
                true
            }
            None => {
                n.set_ty(Type::Error);
                false
            }
        },
        NodeKind::List(_) => check_list(vm, roots, env, n),
    }
}

fn node_ty(n: &Node) -> Type {
    n.ty().cloned().unwrap_or(Type::Error)
}

fn check_list(vm: &Arc<Vm>, roots: &mut Roots, env: crate::gc::ObjId, list: &'static Node) -> bool {
    let items = match list.as_list() {
        Some(items) => items,
        None => return false,
    };
    if items.is_empty() {
        list.set_ty(Type::Unit);
        return true;
    }
    let head = items[0];
    if let Some(name) = head.as_symbol() {
        match name {
            "defmacro" => {
                list.set_ty(Type::Unit);
                return true;
            }
            "def" => return check_def(vm, roots, env, list, items),
            "fn" => return check_fn(vm, roots, env, list, items),
            "quote" | "quasiquote" => {
                list.set_ty(Type::Any);
                return true;
            }
            "do" => {
                let mut ty = Type::Unit;
                for &item in &items[1..] {
                    if !check_node(vm, roots, env, item) {
                        return false;
                    }
                    ty = node_ty(item);
                }
                list.set_ty(ty);
                return true;
            }
            "import" => {
                if items.len() != 2 || !matches!(items[1].kind, NodeKind::Str(_)) {
                    return false;
                }
                list.set_ty(Type::Unit);
                return true;
            }
            "let" => return check_let(vm, roots, env, list, items),
            "if" => {
                if items.len() != 4 {
                    return false;
                }
                for &arm in &items[1..4] {
                    if !check_node(vm, roots, env, arm) {
                        return false;
                    }
                }
                if !ty_eq(&node_ty(items[2]), &node_ty(items[3])) {
                    return false;
                }
                list.set_ty(node_ty(items[2]));
                return true;
            }
            "while" => {
                if items.len() < 2 {
                    return false;
                }
                if !check_node(vm, roots, env, items[1]) {
                    return false;
                }
                if !ty_eq(&node_ty(items[1]), &Type::Bool) {
                    return false;
                }
                for &body in &items[2..] {
                    if !check_node(vm, roots, env, body) {
                        return false;
                    }
                }
                list.set_ty(Type::Unit);
                return true;
            }
            "set!" => {
                if items.len() != 3 {
                    return false;
                }
                let target = match items[1].as_symbol() {
                    Some(t) => t,
                    None => return false,
                };
                let bound = vm.with_heap(|h| env::lookup(h, env, target));
                let bound_ty = match bound {
                    Some((ty, _)) => ty,
                    None => {
                        eprintln!("set!: undefined variable: {}", target);
                        return false;
                    }
                };
                if !check_node(vm, roots, env, items[2]) {
                    return false;
                }
                if let Some(ty) = bound_ty {
                    if !ty_eq(&ty, &node_ty(items[2])) {
                        return false;
                    }
                }
                list.set_ty(Type::Unit);
                return true;
            }
            // Variadic constructor forms the generic call rule cannot type.
            "vec" => {
                for &item in &items[1..] {
                    if !check_node(vm, roots, env, item) {
                        return false;
                    }
                }
                list.set_ty(Type::vec_of(Type::Any));
                return true;
            }
            "struct-new" => {
                for &item in &items[1..] {
                    if !check_node(vm, roots, env, item) {
                        return false;
                    }
                }
                list.set_ty(Type::Any);
                return true;
            }
            "defstruct" => return check_defstruct(vm, env, list, items),
            "defenum" => return check_defenum(vm, env, list, items),
            _ => {}
        }
    }

    // Ordinary call: the head must be a function, arity exact, every
    // argument compatible with its declared parameter type.
    if !check_node(vm, roots, env, head) {
        return false;
    }
    let (params, ret) = match head.ty() {
        Some(Type::Func { params, ret }) => (params.clone(), (**ret).clone()),
        _ => return false,
    };
    if params.len() != items.len() - 1 {
        return false;
    }
    for (param, &arg) in params.iter().zip(&items[1..]) {
        if !check_node(vm, roots, env, arg) {
            return false;
        }
        if !ty_eq(param, &node_ty(arg)) {
            return false;
        }
    }
    list.set_ty(ret);
    true
}

// [def name : Type expr]: bind the declared type first so recursive
// functions can reference themselves, then require the expression to match.
fn check_def(
    vm: &Arc<Vm>,
    roots: &mut Roots,
    env: crate::gc::ObjId,
    list: &'static Node,
    items: &[&'static Node],
) -> bool {
    if items.len() < 5 {
        eprintln!("def: too few items ({})", items.len());
        return false;
    }
    let name = match items[1].as_symbol() {
        Some(n) => n,
        None => return false,
    };
    if !items[2].is_sym(":") {
        return false;
    }
    let decl = Type::from_node(items[3]);
    if decl == Type::Error {
        eprintln!("def: bad type for '{}'", name);
        return false;
    }
    vm.with_heap_mut(|h| env::define(h, env, name, Some(decl.clone()), None));
    if !check_node(vm, roots, env, items[4]) {
        eprintln!("def: expression for '{}' failed to check", name);
        return false;
    }
    if !ty_eq(&node_ty(items[4]), &decl) {
        eprintln!("def: type mismatch for '{}'", name);
        return false;
    }
    list.set_ty(Type::Unit);
    true
}

// [fn [[p : T] ...] : R body...]
//
// A declared Unit return accepts a body of any type; the value is
// discarded at the call site.
fn check_fn(
    vm: &Arc<Vm>,
    roots: &mut Roots,
    env: crate::gc::ObjId,
    list: &'static Node,
    items: &[&'static Node],
) -> bool {
    if items.len() < 2 {
        return false;
    }
    let params = match items[1].as_list() {
        Some(p) => p,
        None => return false,
    };
    let child = vm.alloc(roots, Obj::Env(Frame { parent: Some(env), entries: Vec::new() }));
    roots.envs.push(child);
    let ok = (|| {
        let mut i = 2;
        let mut ret = Type::Unit;
        if items.get(i).is_some_and(|n| n.is_sym(":")) {
            match items.get(i + 1) {
                Some(r) => ret = Type::from_node(r),
                None => return false,
            }
            i += 2;
        }
        let mut param_tys = Vec::with_capacity(params.len());
        for p in params {
            let slots = match p.as_list() {
                Some(s) if s.len() >= 3 => s,
                _ => return false,
            };
            let pname = match slots[0].as_symbol() {
                Some(n) => n,
                None => return false,
            };
            let pty = Type::from_node(slots[2]);
            vm.with_heap_mut(|h| env::define(h, child, pname, Some(pty.clone()), None));
            param_tys.push(pty);
        }
        let mut body_ty = Type::Unit;
        for &body in &items[i..] {
            if !check_node(vm, roots, child, body) {
                return false;
            }
            body_ty = node_ty(body);
        }
        if ret != Type::Unit && !ty_eq(&body_ty, &ret) {
            return false;
        }
        list.set_ty(Type::func(param_tys, ret));
        true
    })();
    roots.envs.pop();
    ok
}

// [let [[name expr] | [name : T expr] ...] body...]: bindings check left to
// right, each visible to the next; an untyped binding takes its
// expression's type.
fn check_let(
    vm: &Arc<Vm>,
    roots: &mut Roots,
    env: crate::gc::ObjId,
    list: &'static Node,
    items: &[&'static Node],
) -> bool {
    if items.len() < 2 {
        return false;
    }
    let binds = match items[1].as_list() {
        Some(b) => b,
        None => return false,
    };
    let child = vm.alloc(roots, Obj::Env(Frame { parent: Some(env), entries: Vec::new() }));
    roots.envs.push(child);
    let ok = (|| {
        let mut i = 0;
        while i < binds.len() {
            let pair = match binds[i].as_list() {
                Some(p) if p.len() >= 2 => p,
                _ => return false,
            };
            let name = match pair[0].as_symbol() {
                Some(n) => n,
                None => return false,
            };
            let (decl, expr) = if pair.len() >= 4 && pair[1].is_sym(":") {
                (Some(Type::from_node(pair[2])), Some(pair[3]))
            } else if pair.len() == 3 && pair[1].is_sym(":") {
                i += 1;
                (Some(Type::from_node(pair[2])), binds.get(i).copied())
            } else {
                (None, Some(pair[1]))
            };
            let expr = match expr {
                Some(e) => e,
                None => return false,
            };
            if !check_node(vm, roots, child, expr) {
                return false;
            }
            let ty = decl.unwrap_or_else(|| node_ty(expr));
            if !ty_eq(&node_ty(expr), &ty) {
                return false;
            }
            vm.with_heap_mut(|h| env::define(h, child, name, Some(ty), None));
            i += 1;
        }
        let mut ty = Type::Unit;
        for &body in &items[2..] {
            if !check_node(vm, roots, child, body) {
                return false;
            }
            ty = node_ty(body);
        }
        list.set_ty(ty);
        true
    })();
    roots.envs.pop();
    ok
}

fn check_defstruct(
    vm: &Arc<Vm>,
    env: crate::gc::ObjId,
    list: &'static Node,
    items: &[&'static Node],
) -> bool {
    if items.len() < 3 {
        return false;
    }
    let name = match items[1].as_symbol() {
        Some(n) => n,
        None => return false,
    };
    let fields_node = match items[2].as_list() {
        Some(f) => f,
        None => return false,
    };
    let mut fields = Vec::new();
    for f in fields_node {
        let slots = match f.as_list() {
            Some(s) if !s.is_empty() => s,
            _ => return false,
        };
        let fname = match slots[0].as_symbol() {
            Some(n) => n,
            None => return false,
        };
        let fty = if slots.len() >= 3 { Type::from_node(slots[2]) } else { Type::Any };
        fields.push((fname.to_string(), fty));
    }
    let ty = Type::Struct { name: name.to_string(), fields };
    vm.with_heap_mut(|h| env::define(h, env, name, Some(ty), None));
    list.set_ty(Type::Unit);
    true
}

fn check_defenum(
    vm: &Arc<Vm>,
    env: crate::gc::ObjId,
    list: &'static Node,
    items: &[&'static Node],
) -> bool {
    if items.len() < 3 {
        return false;
    }
    let name = match items[1].as_symbol() {
        Some(n) => n,
        None => return false,
    };
    let variants_node = match items[2].as_list() {
        Some(v) => v,
        None => return false,
    };
    let variants: Vec<String> =
        variants_node.iter().filter_map(|n| n.as_symbol()).map(String::from).collect();
    let ty = Type::Enum { name: name.to_string(), variants: variants.clone() };
    vm.with_heap_mut(|h| env::define(h, env, name, Some(ty), None));
    for variant in &variants {
        vm.with_heap_mut(|h| env::define(h, env, variant, Some(Type::Int), None));
    }
    list.set_ty(Type::Unit);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::parser::Parser;

    fn check_src(src: &str) -> bool {
        let arena = Arena::new().leak();
        let program = Parser::new(arena, src).parse_toplevel();
        let vm = Vm::new();
        let mut roots = Roots::new();
        vm.check_program(&mut roots, program).is_ok()
    }

    #[test]
    fn test_def_with_matching_type_checks() {
        assert!(check_src("[def x : Int 41]"));
        assert!(check_src("[def s : Str \"hi\"]"));
    }

    #[test]
    fn test_def_mismatch_rejected() {
        assert!(!check_src("[def x : Int \"oops\"]"));
        assert!(!check_src("[def x : Bool 1]"));
    }

    #[test]
    fn test_call_arity_and_argument_types() {
        assert!(check_src("[+ 1 2]"));
        assert!(!check_src("[+ 1]"));
        assert!(!check_src("[+ 1 \"two\"]"));
    }

    #[test]
    fn test_unbound_symbol_rejected() {
        assert!(!check_src("[+ nope 1]"));
    }

    #[test]
    fn test_if_arms_must_agree() {
        assert!(check_src("[if true 1 2]"));
        assert!(!check_src("[if true 1 \"two\"]"));
    }

    #[test]
    fn test_while_needs_bool_condition() {
        assert!(check_src("[def n : Int 0] [while [< n 3] [set! n [+ n 1]]]"));
        assert!(!check_src("[while 1 [+ 1 2]]"));
    }

    #[test]
    fn test_set_requires_bound_target_with_same_type() {
        assert!(check_src("[def n : Int 0] [set! n 5]"));
        assert!(!check_src("[set! ghost 5]"));
        assert!(!check_src("[def n : Int 0] [set! n \"five\"]"));
    }

    #[test]
    fn test_recursive_function_sees_its_own_name() {
        let src = "[def fact : [Int -> Int] [fn [[n : Int]] : Int \
                     [if [= n 0] 1 [* n [fact [- n 1]]]]]]";
        assert!(check_src(src));
    }

    #[test]
    fn test_fn_return_must_match_unless_unit() {
        assert!(!check_src("[def f : [Int -> Str] [fn [[n : Int]] : Str n]]"));
        // Unit-returning functions discard their body value.
        assert!(check_src("[def f : [Int -> Unit] [fn [[n : Int]] : Unit [+ n 1]]]"));
    }

    #[test]
    fn test_let_binding_inherits_expression_type() {
        assert!(check_src("[let [[a 1] [b : Int [+ a 1]]] [+ a b]]"));
        assert!(!check_src("[let [[a : Str 1]] a]"));
    }

    #[test]
    fn test_quote_and_quasiquote_are_any() {
        assert!(check_src("[def q : Any [quote [a b c]]]"));
        assert!(check_src("[def q : Any [quasiquote [a b]]]"));
    }

    #[test]
    fn test_vec_form_is_variadic() {
        assert!(check_src("[def xs : [Vec Int] [vec]]"));
        assert!(check_src("[def xs : [Vec Any] [vec 1 \"two\" true]]"));
    }

    #[test]
    fn test_channel_program_checks() {
        assert!(check_src(
            "[def c : [Chan Int] [chan]] [spawn [fn [] : Unit [send c 7]]] [print [recv c]]"
        ));
    }

    #[test]
    fn test_defenum_variants_are_ints() {
        assert!(check_src("[defenum Color [Red Green]] [def x : Int Green]"));
    }
}
