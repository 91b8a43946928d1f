// ABOUTME: End-to-end interpreter tests: parse, expand, check, evaluate

use std::sync::Arc;

use sqale::arena::Arena;
use sqale::eval::Vm;
use sqale::gc::{Obj, Roots};
use sqale::modules::parse_and_expand;
use sqale::value::Value;

/// Run a program through the full pipeline and return the last form's value.
fn run(src: &str) -> (Arc<Vm>, Value) {
    let arena = Arena::new().leak();
    let program = parse_and_expand(arena, src);
    let vm = Vm::new();
    let mut roots = Roots::new();
    vm.check_program(&mut roots, program).expect("program should typecheck");
    let mut last = Value::Unit;
    for &form in program.as_list().unwrap_or(&[]) {
        last = vm.eval(&mut roots, vm.globals, form);
    }
    (vm, last)
}

fn str_of(vm: &Arc<Vm>, v: Value) -> String {
    vm.with_heap(|h| match v {
        Value::Str(id) => match h.get(id) {
            Some(Obj::Str(s)) => s.clone(),
            _ => panic!("dangling string"),
        },
        other => panic!("expected string, got {:?}", other),
    })
}

#[test]
fn test_defs_chain_through_arithmetic() {
    let (_, v) = run("[def x : Int 41] [def y : Int [+ x 1]] y");
    assert_eq!(v, Value::Int(42));
}

#[test]
fn test_recursive_factorial() {
    let src = "[def fact : [Int -> Int] [fn [[n : Int]] : Int \
                 [if [= n 0] 1 [* n [fact [- n 1]]]]]] \
               [fact 5]";
    let (_, v) = run(src);
    assert_eq!(v, Value::Int(120));
}

#[test]
fn test_vector_push_and_len() {
    let (_, v) = run("[def xs : [Vec Int] [vec]] [vec-push xs 1] [vec-push xs 2] [vec-len xs]");
    assert_eq!(v, Value::Int(2));
}

#[test]
fn test_user_macro_twice() {
    let src = "[defmacro twice [x] [quasiquote [+ [unquote x] [unquote x]]]] [twice 21]";
    let (_, v) = run(src);
    assert_eq!(v, Value::Int(42));
}

#[test]
fn test_cond_picks_first_true_clause() {
    let src = "[cond [[= 1 2] \"a\"] [[= 2 2] \"b\"] [else \"c\"]]";
    let (vm, v) = run(src);
    assert_eq!(str_of(&vm, v), "b");
}

#[test]
fn test_cond_falls_through_to_else() {
    let src = "[cond [[= 1 2] \"a\"] [[= 1 3] \"b\"] [else \"c\"]]";
    let (vm, v) = run(src);
    assert_eq!(str_of(&vm, v), "c");
}

#[test]
fn test_when_runs_body_only_on_true() {
    let (_, v) = run("[def n : Int 0] [when [= 1 1] [set! n 5]] n");
    assert_eq!(v, Value::Int(5));
    let (_, v) = run("[def n : Int 0] [when [= 1 2] [set! n 5]] n");
    assert_eq!(v, Value::Int(0));
}

#[test]
fn test_threading_macro() {
    let src = "[def inc : [Int -> Int] [fn [[x : Int]] : Int [+ x 1]]] \
               [def dbl : [Int -> Int] [fn [[x : Int]] : Int [* x 2]]] \
               [-> 5 inc dbl]";
    let (_, v) = run(src);
    assert_eq!(v, Value::Int(12));
}

#[test]
fn test_closures_share_captured_state() {
    let src = "[def counter : Int 0] \
               [def bump : [-> Unit] [fn [] : Unit [set! counter [+ counter 1]]]] \
               [bump] [bump] [bump] \
               counter";
    let (_, v) = run(src);
    assert_eq!(v, Value::Int(3));
}

#[test]
fn test_let_shadowing_leaves_outer_binding_alone() {
    let (_, v) = run("[def x : Int 1] [let [[x 10]] x]");
    assert_eq!(v, Value::Int(10));
    let (_, v) = run("[def x : Int 1] [let [[x 10]] x] x");
    assert_eq!(v, Value::Int(1));
}

#[test]
fn test_string_builtins_compose() {
    let src = "[str-len [str-concat \"abc\" \"defg\"]]";
    let (_, v) = run(src);
    assert_eq!(v, Value::Int(7));
}

#[test]
fn test_option_flow() {
    let (_, v) = run("[unwrap-or [some 4] 9]");
    assert_eq!(v, Value::Int(4));
    let (_, v) = run("[unwrap-or [none] 9]");
    assert_eq!(v, Value::Int(9));
}

#[test]
fn test_struct_declaration_and_instances() {
    let src = "[defstruct Point [[x : Int] [y : Int]]] \
               [def p : Any [struct-new \"Point\" 3 4]] \
               [+ [struct-get p 0] [struct-get p 1]]";
    let (_, v) = run(src);
    assert_eq!(v, Value::Int(7));
}

#[test]
fn test_enum_variants_evaluate_to_tags() {
    let (_, v) = run("[defenum Color [Red Green Blue]] [+ Green Blue]");
    assert_eq!(v, Value::Int(3));
}

#[test]
fn test_quote_quasiquote_equivalence_without_unquotes() {
    // With no unquote forms inside, quasiquote behaves exactly like quote.
    let (vm_a, va) = run("[quote [x 1 [y 2] \"s\" true]]");
    let (vm_b, vb) = run("[quasiquote [x 1 [y 2] \"s\" true]]");
    assert_eq!(show(&vm_a, va), show(&vm_b, vb));
    assert_eq!(show(&vm_a, va), "[x 1 [y 2] \"s\" true]");
}

fn show(vm: &Arc<Vm>, v: Value) -> String {
    match v {
        Value::List(id) => {
            let items = vm.with_heap(|h| match h.get(id) {
                Some(Obj::List(items)) => items.clone(),
                _ => Vec::new(),
            });
            let inner: Vec<String> = items.iter().map(|e| show(vm, *e)).collect();
            format!("[{}]", inner.join(" "))
        }
        Value::Sym(s) => s.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format!("{:?}", f),
        Value::Bool(b) => b.to_string(),
        Value::Str(_) => format!("\"{}\"", str_of(vm, v)),
        other => format!("{:?}", other),
    }
}

#[test]
fn test_collection_survives_automatic_gc_pressure() {
    // Enough transient garbage to cross the collection threshold several
    // times; the live bindings must come through intact.
    let src = "[def chunk : Str \"0123456789abcdef\"] \
               [def i : Int 0] \
               [while [< i 10] [do [set! chunk [str-concat chunk chunk]] [set! i [+ i 1]]]] \
               [set! i 0] \
               [while [< i 300] [let [[junk [str-concat chunk chunk]]] [set! i [+ i 1]]]] \
               [str-len chunk]";
    let (_, v) = run(src);
    assert_eq!(v, Value::Int(16 * 1024));
}

#[test]
fn test_import_binds_module_definitions() {
    let dir = std::env::temp_dir().join("sqale-eval-tests");
    std::fs::create_dir_all(&dir).expect("mkdir");
    let path = dir.join("lib.sq");
    std::fs::write(&path, "[def shared : Int 99]").expect("write module");
    let src = format!("[import \"{}\"] [+ shared 1]", path.display());
    let (_, v) = run(&src);
    assert_eq!(v, Value::Int(100));
}
