// ABOUTME: Tests for channels and spawned threads at the language level

use std::sync::Arc;

use sqale::arena::Arena;
use sqale::eval::Vm;
use sqale::gc::Roots;
use sqale::modules::parse_and_expand;
use sqale::value::Value;

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

#[test]
fn test_spawned_thread_sends_to_channel() {
    let src = "[def c : [Chan Int] [chan]] \
               [spawn [fn [] : Unit [send c 7]]] \
               [recv c]";
    let (_, v) = run(src);
    assert_eq!(v, Value::Int(7));
}

#[test]
fn test_channel_is_fifo_across_a_spawned_producer() {
    let src = "[def c : [Chan Int] [chan]] \
               [def i : Int 0] \
               [spawn [fn [] : Unit \
                 [let [[n 0]] \
                   [while [< n 50] [do [send c n] [set! n [+ n 1]]]]]]] \
               [def sum : Int 0] \
               [def expected : Int 0] \
               [while [< i 50] [do \
                 [def got : Int [recv c]] \
                 [set! sum [+ sum got]] \
                 [set! expected [+ expected i]] \
                 [set! i [+ i 1]]]] \
               [if [= sum expected] 1 0]";
    let (_, v) = run(src);
    assert_eq!(v, Value::Int(1));
}

#[test]
fn test_send_blocks_until_consumer_drains() {
    // Channel capacity is 16; a producer pushing 40 values must block and
    // resume as the main thread drains.
    let src = "[def c : [Chan Int] [chan]] \
               [spawn [fn [] : Unit \
                 [let [[n 0]] \
                   [while [< n 40] [do [send c n] [set! n [+ n 1]]]]]]] \
               [def i : Int 0] \
               [def last : Int 0] \
               [while [< i 40] [do [set! last [recv c]] [set! i [+ i 1]]]] \
               last";
    let (_, v) = run(src);
    assert_eq!(v, Value::Int(39));
}

#[test]
fn test_two_producers_both_arrive() {
    let src = "[def c : [Chan Int] [chan]] \
               [spawn [fn [] : Unit [send c 1]]] \
               [spawn [fn [] : Unit [send c 2]]] \
               [def a : Int [recv c]] \
               [def b : Int [recv c]] \
               [+ a b]";
    let (_, v) = run(src);
    assert_eq!(v, Value::Int(3));
}

#[test]
fn test_heap_values_cross_threads_through_channels() {
    // Strings are heap handles; the spawned thread reads the shared heap.
    let src = "[def c : [Chan Int] [chan]] \
               [def s : Str \"over the wire\"] \
               [spawn [fn [] : Unit [send c [str-len s]]]] \
               [recv c]";
    let (_, v) = run(src);
    assert_eq!(v, Value::Int(13));
}
